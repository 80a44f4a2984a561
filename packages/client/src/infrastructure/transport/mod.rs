//! Network transports implementing [`HubTransport`](crate::domain::HubTransport).

mod negotiate;
pub mod websocket;

pub use websocket::WebSocketTransport;
