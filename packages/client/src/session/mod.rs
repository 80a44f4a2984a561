//! Chat session.
//!
//! [`ChatSession`] owns the hub connection, the message list, the typing
//! tracker, and the status line. Every mutation goes through its operations
//! or its event loop, and each one publishes a fresh [`SessionSnapshot`].

mod event_loop;
mod normalizer;
mod state;

use std::sync::Arc;

use hubchat_shared::time::{Clock, timestamp_to_rfc3339};
use serde_json::Value;
use tokio::{
    sync::{Mutex, Notify, mpsc, watch},
    task::JoinHandle,
    time::Instant,
};

use crate::{
    config::{ClientConfig, EchoMode},
    connection::HubConnection,
    domain::{
        ChatMessage, GroupName, HubTransport, MessageBody, Timestamp, TypingTracker, UserName,
        ValidationError, hub_api,
    },
    error::ClientError,
};

pub use normalizer::{EventNormalizer, HubEvent};
pub use state::SessionSnapshot;
use state::SessionState;

pub const STATUS_CONNECTION_FAILED: &str = "Connection failed. Please try again later.";
pub const STATUS_MESSAGE_SENT: &str = "Message sent successfully!";
pub const STATUS_JOIN_FAILED: &str = "Failed to join group. Please try again.";
pub const STATUS_LEAVE_FAILED: &str = "Failed to leave group. Please try again.";
pub const STATUS_SEND_FAILED: &str = "Failed to send message. Please try again.";
pub const STATUS_GROUP_REQUIRED_TO_JOIN: &str = "Please enter a group name to join.";
pub const STATUS_GROUP_REQUIRED_TO_LEAVE: &str = "Please enter a group name to leave.";
pub const STATUS_GROUP_REQUIRED_TO_SEND: &str = "Please enter a group name to send a message.";
pub const STATUS_USER_REQUIRED: &str = "Please enter your name.";
pub const STATUS_MESSAGE_REQUIRED: &str = "Please enter a message to send.";
/// Followed by the group name once membership is restored after a reconnect
pub const STATUS_REJOINED_PREFIX: &str = "Rejoined group: ";

pub struct ChatSession {
    inner: Arc<SessionInner>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

pub(crate) struct SessionInner {
    config: ClientConfig,
    connection: HubConnection,
    clock: Arc<dyn Clock>,
    state: Mutex<SessionState>,
    snapshot: watch::Sender<SessionSnapshot>,
    wake: Notify,
}

impl ChatSession {
    /// Build a session and start its connection.
    ///
    /// Never fails: if the hub cannot be reached the session stays usable,
    /// its connection is `Failed`, and the status line says so.
    pub async fn connect(
        config: ClientConfig,
        transport: Arc<dyn HubTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let connection = HubConnection::new(
            config.hub_url.clone(),
            transport,
            config.connection_options(),
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        register_event_handlers(&connection, events_tx).await;

        let state = SessionState::new(TypingTracker::new(
            config.typing_window,
            config.typing_renewal,
        ));
        let (snapshot, _) = watch::channel(state.snapshot());
        let connection_state = connection.watch_state();

        let inner = Arc::new(SessionInner {
            config,
            connection,
            clock,
            state: Mutex::new(state),
            snapshot,
            wake: Notify::new(),
        });
        let event_loop = tokio::spawn(event_loop::run(
            inner.clone(),
            events_rx,
            connection_state,
        ));

        let session = Self {
            inner,
            event_loop: Mutex::new(Some(event_loop)),
        };
        session.start_connection().await;
        session
    }

    /// Receiver that yields a new snapshot after every change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub async fn set_group_name(&self, group_name: impl Into<String>) {
        let group_name = group_name.into();
        self.inner
            .update(|state| state.group_name = group_name)
            .await;
    }

    pub async fn set_user_name(&self, user_name: impl Into<String>) {
        let user_name = user_name.into();
        self.inner.update(|state| state.user_name = user_name).await;
    }

    pub async fn set_draft(&self, draft: impl Into<String>) {
        let draft = draft.into();
        self.inner.update(|state| state.draft = draft).await;
    }

    /// Join the group currently entered.
    ///
    /// Requires a group name and a user name. On success the status line
    /// reads "Joined group: {group}".
    pub async fn join_group(&self) -> Result<(), ClientError> {
        let (group_name, user_name) = self.inner.names().await;
        let group = match validate_group_and_user(group_name, user_name) {
            Ok((group, _)) => group,
            Err(e) => {
                self.report_validation(e, STATUS_GROUP_REQUIRED_TO_JOIN).await;
                return Err(e.into());
            }
        };

        match self
            .inner
            .connection
            .invoke(hub_api::ADD_TO_GROUP, vec![Value::from(group.as_str())])
            .await
        {
            Ok(_) => {
                tracing::info!("Joined group '{}'", group);
                let status = format!("Joined group: {}", group);
                self.inner
                    .update(|state| {
                        state.joined_group = Some(group.into_string());
                        state.status_message = Some(status);
                    })
                    .await;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to join group '{}': {}", group, e);
                self.inner.set_status(STATUS_JOIN_FAILED).await;
                Err(e)
            }
        }
    }

    /// Leave the group currently entered. Only the group name is required.
    pub async fn leave_group(&self) -> Result<(), ClientError> {
        let (group_name, _) = self.inner.names().await;
        let group = match GroupName::new(group_name) {
            Ok(group) => group,
            Err(e) => {
                self.report_validation(e, STATUS_GROUP_REQUIRED_TO_LEAVE).await;
                return Err(e.into());
            }
        };

        match self
            .inner
            .connection
            .invoke(hub_api::REMOVE_FROM_GROUP, vec![Value::from(group.as_str())])
            .await
        {
            Ok(_) => {
                tracing::info!("Left group '{}'", group);
                let status = format!("Left group: {}", group);
                self.inner
                    .update(|state| {
                        if state.joined_group.as_deref() == Some(group.as_str()) {
                            state.joined_group = None;
                        }
                        state.status_message = Some(status);
                    })
                    .await;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to leave group '{}': {}", group, e);
                self.inner.set_status(STATUS_LEAVE_FAILED).await;
                Err(e)
            }
        }
    }

    /// Send the current draft to the current group.
    ///
    /// The draft is cleared only after the hub acknowledges the send, and
    /// only if it still holds the text that was sent. In
    /// [`EchoMode::Optimistic`] the message is appended locally at that point.
    pub async fn send_message(&self) -> Result<(), ClientError> {
        let (group_name, user_name, draft) = {
            let state = self.inner.state.lock().await;
            (
                state.group_name.clone(),
                state.user_name.clone(),
                state.draft.clone(),
            )
        };

        let (group, user) = match validate_group_and_user(group_name, user_name) {
            Ok(names) => names,
            Err(e) => {
                self.report_validation(e, STATUS_GROUP_REQUIRED_TO_SEND).await;
                return Err(e.into());
            }
        };
        let body = match MessageBody::new(draft) {
            Ok(body) => body,
            Err(e) => {
                self.report_validation(e, STATUS_GROUP_REQUIRED_TO_SEND).await;
                return Err(e.into());
            }
        };

        let arguments = vec![
            Value::from(group.as_str()),
            Value::from(user.as_str()),
            Value::from(body.as_str()),
        ];
        match self
            .inner
            .connection
            .invoke(hub_api::SEND_MESSAGE_TO_GROUP, arguments)
            .await
        {
            Ok(_) => {
                tracing::debug!("Message sent to group '{}'", group);
                let received_at = Timestamp::new(self.inner.clock.now_millis());
                let echo_mode = self.inner.config.echo_mode;
                let body = body.into_string();
                self.inner
                    .update(|state| {
                        // The draft may have been edited while the send was in flight
                        if state.draft == body {
                            state.draft.clear();
                        }
                        if echo_mode == EchoMode::Optimistic {
                            state.push_message(ChatMessage {
                                sender: user.into_string(),
                                body,
                                received_at,
                                is_own: true,
                            });
                        }
                        state.status_message = Some(STATUS_MESSAGE_SENT.to_string());
                    })
                    .await;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to send message to group '{}': {}", group, e);
                self.inner.set_status(STATUS_SEND_FAILED).await;
                Err(e)
            }
        }
    }

    /// Announce that the local user is typing.
    ///
    /// Does nothing unless connected with both names set. The notification is
    /// sent in the background and failures are only logged.
    pub async fn on_keystroke(&self) {
        let mut state = self.inner.state.lock().await;
        if state.closed
            || !self.inner.connection.state().is_connected()
            || state.group_name.is_empty()
            || state.user_name.is_empty()
        {
            return;
        }

        let connection = self.inner.connection.clone();
        let arguments = vec![
            Value::from(state.group_name.as_str()),
            Value::from(state.user_name.as_str()),
        ];
        tokio::spawn(async move {
            if let Err(e) = connection
                .invoke(hub_api::SEND_TYPING_NOTIFICATION, arguments)
                .await
            {
                tracing::warn!("Failed to send typing notification: {}", e);
            }
        });

        state.self_typing_until = Some(Instant::now() + self.inner.config.typing_window);
        self.inner.publish(&state);
        drop(state);
        self.inner.wake.notify_one();
    }

    /// Start the connection again after it failed or was closed by the hub.
    ///
    /// Does nothing if the connection is up or already trying.
    pub async fn reconnect(&self) {
        if self.inner.state.lock().await.closed {
            return;
        }
        self.start_connection().await;
    }

    /// Tear the session down. Idempotent.
    ///
    /// Stops the connection, cancels pending typing expiries, and ignores any
    /// event that arrives afterwards.
    pub async fn close(&self) {
        {
            let mut state = self.inner.state.lock().await;
            if state.closed {
                return;
            }
            state.closed = true;
            state.typing.clear();
            state.self_typing_until = None;
        }

        if let Some(event_loop) = self.event_loop.lock().await.take() {
            event_loop.abort();
        }
        self.inner.connection.stop().await;

        let mut state = self.inner.state.lock().await;
        state.connection_state = self.inner.connection.state();
        self.inner.publish(&state);
        tracing::info!("Session closed");
    }

    async fn start_connection(&self) {
        let result = self.inner.connection.start().await;
        let connection_state = self.inner.connection.state();
        if let Err(e) = &result {
            tracing::error!("Connection failed: {}", e);
        }
        self.inner
            .update(|state| {
                state.connection_state = connection_state;
                if result.is_err() {
                    state.status_message = Some(STATUS_CONNECTION_FAILED.to_string());
                }
            })
            .await;

        if result.is_ok() {
            self.inner.rejoin_group().await;
        }
    }

    async fn report_validation(&self, error: ValidationError, group_required: &str) {
        let status = match error {
            ValidationError::EmptyGroupName => group_required,
            ValidationError::EmptyUserName => STATUS_USER_REQUIRED,
            ValidationError::EmptyMessage => STATUS_MESSAGE_REQUIRED,
        };
        tracing::debug!("Blocked by validation: {}", error);
        self.inner.set_status(status).await;
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Ok(mut event_loop) = self.event_loop.try_lock()
            && let Some(handle) = event_loop.take()
        {
            handle.abort();
        }
        self.inner.connection.abort_driver();
    }
}

impl SessionInner {
    fn publish(&self, state: &SessionState) {
        self.snapshot.send_replace(state.snapshot());
    }

    /// Apply `mutate` and publish, unless the session is closed
    async fn update(&self, mutate: impl FnOnce(&mut SessionState)) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        mutate(&mut *state);
        self.publish(&state);
    }

    async fn set_status(&self, status: &str) {
        let status = status.to_string();
        self.update(|state| state.status_message = Some(status))
            .await;
    }

    async fn names(&self) -> (String, String) {
        let state = self.state.lock().await;
        (state.group_name.clone(), state.user_name.clone())
    }

    pub(super) async fn apply_event(&self, event: HubEvent) {
        match event {
            HubEvent::MessageReceived { sender, body } => {
                self.receive_message(sender, body).await
            }
            HubEvent::UserTyping { user } => {
                self.update(|state| {
                    let local_user =
                        (!state.user_name.is_empty()).then_some(state.user_name.as_str());
                    if state.typing.observe(&user, local_user, Instant::now()) {
                        tracing::debug!("{} started typing", user);
                    }
                })
                .await
            }
            HubEvent::Reconnected => self.rejoin_group().await,
        }
    }

    async fn receive_message(&self, sender: String, body: String) {
        let received_at = Timestamp::new(self.clock.now_millis());
        tracing::debug!(
            "Message from {} at {}",
            sender,
            timestamp_to_rfc3339(received_at.value())
        );
        let echo_mode = self.config.echo_mode;
        self.update(|state| {
            let from_local_user = state.local_user() == Some(sender.as_str());
            if let Some(message) = EventNormalizer::normalize_message(
                sender,
                body,
                state.local_user(),
                echo_mode,
                received_at,
            ) {
                state.push_message(message);
            }
            // The send acknowledgement reports on our own messages
            if !from_local_user {
                state.status_message = None;
            }
        })
        .await;
    }

    /// Join the last joined group again on a fresh connection.
    ///
    /// The hub forgets group membership when the transport changes. If the
    /// join fails the session no longer claims membership.
    async fn rejoin_group(&self) {
        let Some(group) = self.state.lock().await.joined_group.clone() else {
            return;
        };

        match self
            .connection
            .invoke(hub_api::ADD_TO_GROUP, vec![Value::from(group.as_str())])
            .await
        {
            Ok(_) => {
                tracing::info!("Rejoined group '{}'", group);
                let status = format!("{}{}", STATUS_REJOINED_PREFIX, group);
                self.update(|state| state.status_message = Some(status))
                    .await;
            }
            Err(e) => {
                tracing::error!("Failed to rejoin group '{}': {}", group, e);
                self.update(|state| {
                    if state.joined_group.as_deref() == Some(group.as_str()) {
                        state.joined_group = None;
                    }
                    state.status_message = Some(STATUS_JOIN_FAILED.to_string());
                })
                .await;
            }
        }
    }

    /// Mirror the connection's current state; stale notifications are harmless
    pub(super) async fn sync_connection_state(&self) {
        self.update(|state| state.connection_state = self.connection.state())
            .await;
    }

    pub(super) async fn expire(&self, now: Instant) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }
        if state.expire(now) {
            self.publish(&state);
        }
    }
}

/// Route inbound hub events into the session event loop
async fn register_event_handlers(
    connection: &HubConnection,
    events: mpsc::UnboundedSender<HubEvent>,
) {
    let message_events = events.clone();
    connection
        .on(hub_api::RECEIVE_MESSAGE, move |arguments| {
            match EventNormalizer::message_received(arguments) {
                Ok(event) => {
                    let _ = message_events.send(event);
                }
                Err(e) => tracing::warn!("Dropping malformed message event: {}", e),
            }
        })
        .await;

    let typing_events = events.clone();
    connection
        .on(hub_api::USER_TYPING, move |arguments| {
            match EventNormalizer::user_typing(arguments) {
                Ok(event) => {
                    let _ = typing_events.send(event);
                }
                Err(e) => tracing::warn!("Dropping malformed typing event: {}", e),
            }
        })
        .await;

    connection
        .on_reconnected(move || {
            let _ = events.send(HubEvent::Reconnected);
        })
        .await;
}

fn validate_group_and_user(
    group_name: String,
    user_name: String,
) -> Result<(GroupName, UserName), ValidationError> {
    Ok((GroupName::new(group_name)?, UserName::new(user_name)?))
}
