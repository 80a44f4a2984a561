//! Client configuration.

use std::time::Duration;

use crate::{
    connection::{ConnectionOptions, DEFAULT_KEEP_ALIVE_INTERVAL, DEFAULT_SERVER_TIMEOUT},
    domain::{ReconnectPolicy, RenewalPolicy, typing::TYPING_WINDOW},
};

/// Hub the client talks to when no URL is given
pub const DEFAULT_HUB_URL: &str = "https://asp-dotnet-projects.onrender.com/chathub";

/// How the local user's own messages end up in the message list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EchoMode {
    /// Append locally once the hub acknowledges the send and drop the echo
    /// the hub broadcasts back.
    #[default]
    Optimistic,
    /// Append nothing locally; the hub's broadcast is the only copy.
    Broadcast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub hub_url: String,
    pub echo_mode: EchoMode,
    pub typing_window: Duration,
    pub typing_renewal: RenewalPolicy,
    pub reconnect: ReconnectPolicy,
    pub keep_alive_interval: Duration,
    pub server_timeout: Duration,
    /// Connect to the hub URL directly instead of negotiating first
    pub skip_negotiation: bool,
}

impl ClientConfig {
    /// Default settings pointed at `hub_url`
    pub fn new(hub_url: impl Into<String>) -> Self {
        Self {
            hub_url: hub_url.into(),
            ..Default::default()
        }
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            reconnect: self.reconnect.clone(),
            keep_alive_interval: self.keep_alive_interval,
            server_timeout: self.server_timeout,
            ..Default::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hub_url: DEFAULT_HUB_URL.to_string(),
            echo_mode: EchoMode::default(),
            typing_window: TYPING_WINDOW,
            typing_renewal: RenewalPolicy::default(),
            reconnect: ReconnectPolicy::automatic(),
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            server_timeout: DEFAULT_SERVER_TIMEOUT,
            skip_negotiation: false,
        }
    }
}
