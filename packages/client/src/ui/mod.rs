//! Terminal front end.

pub mod command;
pub mod formatter;
pub mod input;
pub mod prompt;
pub mod runner;

pub use command::{Command, CommandError};
pub use formatter::{MessageFormatter, ViewRenderer};
pub use input::{InputEvent, KeystrokeNotifier};
pub use runner::run_client;
