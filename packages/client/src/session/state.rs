//! Session state and the snapshots published to the view.

use std::sync::Arc;

use tokio::time::Instant;

use crate::domain::{ChatMessage, ConnectionState, TypingTracker};

/// Read-only copy of the session state, as seen by the view
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub connection_state: ConnectionState,
    /// Result of the last user action, or a connection failure
    pub status_message: Option<String>,
    /// Shared with the session; only copied when a message is appended
    pub messages: Arc<Vec<ChatMessage>>,
    /// Remote users currently typing, in arrival order
    pub typing_users: Vec<String>,
    /// Whether the local user has typed within the typing window
    pub self_typing: bool,
    pub group_name: String,
    pub user_name: String,
    pub draft: String,
    /// Last group joined successfully and not left since
    pub joined_group: Option<String>,
}

#[derive(Debug)]
pub(crate) struct SessionState {
    pub connection_state: ConnectionState,
    pub status_message: Option<String>,
    pub messages: Arc<Vec<ChatMessage>>,
    pub typing: TypingTracker,
    pub self_typing_until: Option<Instant>,
    pub group_name: String,
    pub user_name: String,
    pub draft: String,
    pub joined_group: Option<String>,
    /// Set once by `close`; every later mutation is ignored
    pub closed: bool,
}

impl SessionState {
    pub fn new(typing: TypingTracker) -> Self {
        Self {
            connection_state: ConnectionState::Disconnected,
            status_message: None,
            messages: Arc::default(),
            typing,
            self_typing_until: None,
            group_name: String::new(),
            user_name: String::new(),
            draft: String::new(),
            joined_group: None,
            closed: false,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connection_state: self.connection_state,
            status_message: self.status_message.clone(),
            messages: self.messages.clone(),
            typing_users: self.typing.active_users().to_vec(),
            self_typing: self.self_typing_until.is_some(),
            group_name: self.group_name.clone(),
            user_name: self.user_name.clone(),
            draft: self.draft.clone(),
            joined_group: self.joined_group.clone(),
        }
    }

    pub fn push_message(&mut self, message: ChatMessage) {
        Arc::make_mut(&mut self.messages).push(message);
    }

    /// The local user name, or `None` while it is unset
    pub fn local_user(&self) -> Option<&str> {
        (!self.user_name.is_empty()).then_some(self.user_name.as_str())
    }

    /// Earliest instant at which some typing state has to be cleared
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.typing.next_expiry(), self.self_typing_until) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Clear every typing state that is due at `now`.
    ///
    /// # Returns
    ///
    /// Whether anything visible changed
    pub fn expire(&mut self, now: Instant) -> bool {
        let removed = self.typing.expire(now);
        let self_expired = self.self_typing_until.is_some_and(|until| until <= now);
        if self_expired {
            self.self_typing_until = None;
        }
        !removed.is_empty() || self_expired
    }
}
