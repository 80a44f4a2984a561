//! Infrastructure layer: wire formats and the network transport.

pub mod dto;
pub mod protocol;
pub mod transport;
