//! Group chat client for SignalR-style real-time hubs.
//!
//! The crate is layered the same way as the rest of the workspace:
//!
//! - `domain`: value objects, entities, and the pure typing/reconnect logic
//! - `infrastructure`: hub protocol codec, DTOs, and the WebSocket transport
//! - `connection`: the hub connection lifecycle (start, invoke, subscribe, stop)
//! - `session`: chat session state driven by inbound hub events
//! - `ui`: the terminal front end

pub mod config;
pub mod connection;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod session;
pub mod ui;

pub use config::{ClientConfig, EchoMode};
pub use connection::{ConnectionOptions, HubConnection, Subscription};
pub use error::ClientError;
pub use session::{ChatSession, SessionSnapshot};
