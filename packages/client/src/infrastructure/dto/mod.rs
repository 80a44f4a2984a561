//! Data Transfer Objects (DTOs) for the hub wire formats.
//!
//! - `hub`: hub protocol frames, handshake, and negotiate response
//! - `conversion`: mapping between DTOs and protocol messages

pub mod conversion;
pub mod hub;
