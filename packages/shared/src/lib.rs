//! Utilities shared by the hubchat crates.

pub mod logger;
pub mod time;
