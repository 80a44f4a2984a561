//! Domain layer of the chat client.
//!
//! Nothing here performs I/O. The typing tracker and reconnect policy are
//! pure state machines driven by the session and the connection.

pub mod entity;
pub mod hub_api;
pub mod reconnect;
pub mod transport;
pub mod typing;
pub mod value_object;

pub use entity::{ChatMessage, ConnectionState, TypingIndicator};
pub use reconnect::ReconnectPolicy;
pub use transport::{HubTransport, TransportChannel};
pub use typing::{RenewalPolicy, TypingTracker};
pub use value_object::{GroupName, MessageBody, Timestamp, UserName, ValidationError};
