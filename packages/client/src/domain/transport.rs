//! Transport seam between the hub connection and the network.
//!
//! The connection only needs a pair of text channels. The WebSocket
//! implementation lives in the infrastructure layer; tests plug in an
//! in-memory hub.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ClientError;

/// Open text channels to the hub
///
/// Dropping `outbound` closes the underlying transport. `inbound` yields
/// `None` once the transport is gone.
#[derive(Debug)]
pub struct TransportChannel {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HubTransport: Send + Sync {
    /// Open a transport to the hub at `url`.
    async fn connect(&self, url: &str) -> Result<TransportChannel, ClientError>;
}
