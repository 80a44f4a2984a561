//! Typing presence tracking.
//!
//! The tracker keeps the ordered set of users currently shown as typing and
//! the deadlines at which they drop out. It never sleeps itself: the session
//! event loop asks for [`TypingTracker::next_expiry`], waits until then, and
//! calls [`TypingTracker::expire`].

use std::time::Duration;

use tokio::time::Instant;

use super::entity::TypingIndicator;

/// How long a typing notification keeps its user visible
pub const TYPING_WINDOW: Duration = Duration::from_millis(3000);

/// What a repeated notification for an already-typing user does to its timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenewalPolicy {
    /// Every notification schedules its own removal. The first one to fire
    /// removes the user, whatever arrived after it.
    #[default]
    Independent,
    /// A newer notification replaces the pending removal for that user.
    ResetOnRenewal,
}

#[derive(Debug, Clone)]
pub struct TypingTracker {
    window: Duration,
    policy: RenewalPolicy,
    /// Insertion-ordered, no duplicates
    active: Vec<String>,
    expirations: Vec<TypingIndicator>,
}

impl TypingTracker {
    pub fn new(window: Duration, policy: RenewalPolicy) -> Self {
        Self {
            window,
            policy,
            active: Vec::new(),
            expirations: Vec::new(),
        }
    }

    /// Record a typing notification for `user` received at `now`.
    ///
    /// Notifications for `local_user` are ignored.
    ///
    /// # Returns
    ///
    /// `true` if the user was newly added to the active set
    pub fn observe(&mut self, user: &str, local_user: Option<&str>, now: Instant) -> bool {
        if local_user == Some(user) {
            return false;
        }

        if self.policy == RenewalPolicy::ResetOnRenewal {
            self.expirations.retain(|pending| pending.user != user);
        }
        self.expirations.push(TypingIndicator {
            user: user.to_string(),
            expires_at: now + self.window,
        });

        if self.is_typing(user) {
            return false;
        }
        self.active.push(user.to_string());
        true
    }

    /// Remove every user whose removal is due at `now`.
    ///
    /// # Returns
    ///
    /// The users that left the active set, in removal order
    pub fn expire(&mut self, now: Instant) -> Vec<String> {
        let (due, pending): (Vec<_>, Vec<_>) = self
            .expirations
            .drain(..)
            .partition(|indicator| indicator.expires_at <= now);
        self.expirations = pending;

        let mut removed = Vec::new();
        for indicator in due {
            if let Some(position) = self.active.iter().position(|u| *u == indicator.user) {
                removed.push(self.active.remove(position));
            }
        }
        removed
    }

    /// Earliest pending removal, if any
    pub fn next_expiry(&self) -> Option<Instant> {
        self.expirations
            .iter()
            .map(|indicator| indicator.expires_at)
            .min()
    }

    pub fn active_users(&self) -> &[String] {
        &self.active
    }

    pub fn is_typing(&self, user: &str) -> bool {
        self.active.iter().any(|u| u == user)
    }

    /// Drop all users and pending removals.
    pub fn clear(&mut self) {
        self.active.clear();
        self.expirations.clear();
    }
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new(TYPING_WINDOW, RenewalPolicy::default())
    }
}
