//! Automatic reconnect policy.
//!
//! The policy only answers "how long to wait before attempt N". Attempts are
//! unbounded by default: once the delay table is exhausted the last delay
//! repeats forever.

use std::time::Duration;

/// Delays before each reconnect attempt: 0s, 2s, 10s, then 30s from then on
pub const DEFAULT_RETRY_DELAYS: [Duration; 4] = [
    Duration::ZERO,
    Duration::from_secs(2),
    Duration::from_secs(10),
    Duration::from_secs(30),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// A dropped connection stays down
    Disabled,
    /// Retry forever, waiting `delays[n]` before attempt `n` and repeating the
    /// last entry once the table runs out
    Automatic { delays: Vec<Duration> },
}

impl ReconnectPolicy {
    /// Automatic reconnect with [`DEFAULT_RETRY_DELAYS`]
    pub fn automatic() -> Self {
        Self::Automatic {
            delays: DEFAULT_RETRY_DELAYS.to_vec(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Automatic { .. })
    }

    /// Delay before the next reconnect attempt.
    ///
    /// # Arguments
    ///
    /// * `previous_attempts` - Number of reconnect attempts already made since the connection dropped
    ///
    /// # Returns
    ///
    /// `None` when no further attempt should be made
    pub fn next_retry_delay(&self, previous_attempts: u32) -> Option<Duration> {
        match self {
            Self::Disabled => None,
            Self::Automatic { delays } => {
                let index = previous_attempts as usize;
                Some(
                    delays
                        .get(index)
                        .or_else(|| delays.last())
                        .copied()
                        .unwrap_or(Duration::ZERO),
                )
            }
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::automatic()
    }
}
