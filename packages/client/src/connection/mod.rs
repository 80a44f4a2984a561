//! Hub connection lifecycle.
//!
//! A [`HubConnection`] owns one logical connection to the hub. After
//! [`start`](HubConnection::start) succeeds a driver task reads the transport,
//! dispatches inbound invocations to the registered handlers in delivery
//! order, resolves pending invocations, and sends keep-alive pings. When an
//! established transport drops, the driver reconnects according to the
//! [`ReconnectPolicy`]. A failed `start` does not retry.

mod handler;

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use serde_json::Value;
use tokio::{
    sync::{Mutex, mpsc, oneshot, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    domain::{ConnectionState, HubTransport, ReconnectPolicy, TransportChannel},
    error::ClientError,
    infrastructure::protocol::{self, HubMessage},
};

use handler::HandlerRegistry;
pub use handler::{EventHandler, Subscription};

/// Interval between client keep-alive pings
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Silence from the hub after which the transport is considered dead
pub const DEFAULT_SERVER_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum wait for the handshake answer
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub reconnect: ReconnectPolicy,
    pub keep_alive_interval: Duration,
    pub server_timeout: Duration,
    pub handshake_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::automatic(),
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            server_timeout: DEFAULT_SERVER_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

/// Handle to a hub connection; clones share the same connection
#[derive(Clone)]
pub struct HubConnection {
    inner: Arc<ConnectionInner>,
}

struct PendingInvocation {
    target: String,
    responder: oneshot::Sender<Result<Value, ClientError>>,
}

/// Why the driver stopped reading a transport
enum PumpOutcome {
    /// Transport gone; reconnect if the policy allows
    Lost(String),
    /// Hub closed the connection and asked us not to come back
    Closed { error: Option<String> },
}

type ReconnectedHandler = Arc<dyn Fn() + Send + Sync>;

struct ConnectionInner {
    url: String,
    transport: Arc<dyn HubTransport>,
    options: ConnectionOptions,
    state: watch::Sender<ConnectionState>,
    handlers: Mutex<HandlerRegistry>,
    reconnected: Mutex<Vec<ReconnectedHandler>>,
    pending: Mutex<HashMap<String, PendingInvocation>>,
    /// Present only while connected
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
    next_invocation_id: AtomicU64,
}

impl HubConnection {
    /// Create a connection in the `Disconnected` state. Nothing is opened yet.
    pub fn new(
        url: impl Into<String>,
        transport: Arc<dyn HubTransport>,
        options: ConnectionOptions,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(ConnectionInner {
                url: url.into(),
                transport,
                options,
                state,
                handlers: Mutex::new(HandlerRegistry::default()),
                reconnected: Mutex::new(Vec::new()),
                pending: Mutex::new(HashMap::new()),
                outbound: Mutex::new(None),
                driver: Mutex::new(None),
                next_invocation_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every state transition
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Open the transport and complete the protocol handshake.
    ///
    /// Does nothing if the connection is already starting, connected, or
    /// reconnecting.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConnectionEstablishment`] and leaves the
    /// connection in `Failed` when the transport or handshake fails.
    pub async fn start(&self) -> Result<(), ClientError> {
        let current = self.state();
        if !matches!(
            current,
            ConnectionState::Disconnected | ConnectionState::Failed
        ) {
            tracing::debug!("Ignoring start: connection is {}", current);
            return Ok(());
        }

        self.inner.set_state(ConnectionState::Connecting);
        tracing::info!("Connecting to {}", self.inner.url);

        let (channel, leftover) = match self.inner.open().await {
            Ok(opened) => opened,
            Err(e) => {
                tracing::error!("Connection to {} failed: {}", self.inner.url, e);
                self.inner.set_state(ConnectionState::Failed);
                return Err(e);
            }
        };

        if self.state() != ConnectionState::Connecting {
            return Err(ClientError::ConnectionEstablishment(
                "connection was stopped while starting".to_string(),
            ));
        }

        *self.inner.outbound.lock().await = Some(channel.outbound.clone());
        self.inner.set_state(ConnectionState::Connected);
        tracing::info!("Connected to {}", self.inner.url);

        let driver = tokio::spawn(self.inner.clone().drive(channel, leftover));
        *self.inner.driver.lock().await = Some(driver);
        Ok(())
    }

    /// Invoke a hub method and wait for its completion.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotConnected`] if called outside `Connected`; nothing is sent
    /// - [`ClientError::InvocationRejected`] if the hub answers with an error
    /// - [`ClientError::ConnectionLost`] if the connection drops or stops first
    pub async fn invoke(&self, target: &str, arguments: Vec<Value>) -> Result<Value, ClientError> {
        if !self.state().is_connected() {
            return Err(ClientError::NotConnected);
        }
        let Some(outbound) = self.inner.outbound.lock().await.clone() else {
            return Err(ClientError::NotConnected);
        };

        let invocation_id = self
            .inner
            .next_invocation_id
            .fetch_add(1, Ordering::Relaxed)
            .to_string();
        let record = protocol::write_message(&HubMessage::invocation(
            Some(invocation_id.clone()),
            target,
            arguments,
        ))?;

        let (responder, response) = oneshot::channel();
        self.inner.pending.lock().await.insert(
            invocation_id.clone(),
            PendingInvocation {
                target: target.to_string(),
                responder,
            },
        );

        // The driver changes state before failing pending invocations, so an
        // entry inserted after that point has to clean itself up.
        if !self.state().is_connected() || outbound.send(record).is_err() {
            self.inner.pending.lock().await.remove(&invocation_id);
            return Err(ClientError::ConnectionLost(target.to_string()));
        }
        tracing::debug!("Invoked '{}' (invocation {})", target, invocation_id);

        response
            .await
            .unwrap_or_else(|_| Err(ClientError::ConnectionLost(target.to_string())))
    }

    /// Register a handler for an inbound hub event.
    ///
    /// Handlers run on the driver task, one inbound invocation at a time, in
    /// the order the transport delivered them. They must not block.
    pub async fn on<F>(&self, target: &str, handler: F) -> Subscription
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.inner
            .handlers
            .lock()
            .await
            .register(target, Arc::new(handler))
    }

    /// Remove one handler. Returns `false` if it was already removed.
    pub async fn off(&self, subscription: &Subscription) -> bool {
        self.inner.handlers.lock().await.unregister(subscription)
    }

    /// Register a callback for every successful automatic reconnect.
    ///
    /// The hub treats the new transport as a fresh connection, so anything
    /// tied to the old one (such as group membership) has to be restored
    /// here. Callbacks run on the driver task and must not block.
    pub async fn on_reconnected<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.reconnected.lock().await.push(Arc::new(handler));
    }

    /// Stop the connection and release everything it holds.
    ///
    /// Idempotent. Pending invocations fail with
    /// [`ClientError::ConnectionLost`] and all handlers are unregistered.
    pub async fn stop(&self) {
        if let Some(driver) = self.inner.driver.lock().await.take() {
            driver.abort();
        }
        self.inner.outbound.lock().await.take();
        let previous = self
            .inner
            .state
            .send_replace(ConnectionState::Disconnected);
        self.inner.fail_pending().await;
        self.inner.handlers.lock().await.clear();
        self.inner.reconnected.lock().await.clear();

        if previous != ConnectionState::Disconnected {
            tracing::info!("Connection to {} stopped", self.inner.url);
        }
    }

    /// Abort the driver without waiting; used from `Drop` where `stop` cannot run.
    pub(crate) fn abort_driver(&self) {
        if let Ok(mut driver) = self.inner.driver.try_lock()
            && let Some(handle) = driver.take()
        {
            handle.abort();
        }
    }
}

impl fmt::Debug for HubConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubConnection")
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .finish()
    }
}

impl ConnectionInner {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!("Connection state: {} -> {}", previous, state);
        }
    }

    /// Open a transport and run the handshake.
    ///
    /// # Returns
    ///
    /// The channel plus whatever arrived after the handshake record
    async fn open(&self) -> Result<(TransportChannel, String), ClientError> {
        let mut channel = self.transport.connect(&self.url).await?;

        channel
            .outbound
            .send(protocol::handshake_request()?)
            .map_err(|_| {
                ClientError::ConnectionEstablishment(
                    "transport closed before the handshake".to_string(),
                )
            })?;

        let response = tokio::time::timeout(self.options.handshake_timeout, channel.inbound.recv())
            .await
            .map_err(|_| {
                ClientError::ConnectionEstablishment(
                    "timed out waiting for the handshake response".to_string(),
                )
            })?
            .ok_or_else(|| {
                ClientError::ConnectionEstablishment(
                    "transport closed during the handshake".to_string(),
                )
            })?;

        let leftover = protocol::parse_handshake_response(&response)?.to_string();
        tracing::debug!("Handshake with {} complete", self.url);
        Ok((channel, leftover))
    }

    async fn drive(self: Arc<Self>, mut channel: TransportChannel, mut leftover: String) {
        loop {
            let outcome = self
                .pump(&mut channel, std::mem::take(&mut leftover))
                .await;
            drop(channel);
            self.outbound.lock().await.take();

            match outcome {
                PumpOutcome::Closed { error } => {
                    match &error {
                        Some(error) => {
                            tracing::error!("Hub closed the connection with an error: {}", error)
                        }
                        None => tracing::info!("Hub closed the connection"),
                    }
                    self.set_state(ConnectionState::Disconnected);
                    self.fail_pending().await;
                    return;
                }
                PumpOutcome::Lost(reason) if !self.options.reconnect.is_enabled() => {
                    tracing::warn!("Connection lost: {}", reason);
                    self.set_state(ConnectionState::Disconnected);
                    self.fail_pending().await;
                    return;
                }
                PumpOutcome::Lost(reason) => {
                    tracing::warn!("Connection lost: {}. Reconnecting...", reason);
                    self.set_state(ConnectionState::Reconnecting);
                    self.fail_pending().await;
                }
            }

            match self.reconnect().await {
                Some((next_channel, rest)) => {
                    channel = next_channel;
                    leftover = rest;
                }
                None => {
                    self.set_state(ConnectionState::Disconnected);
                    return;
                }
            }
        }
    }

    async fn reconnect(&self) -> Option<(TransportChannel, String)> {
        let mut attempts = 0u32;
        while let Some(delay) = self.options.reconnect.next_retry_delay(attempts) {
            tokio::time::sleep(delay).await;
            attempts += 1;

            match self.open().await {
                Ok((channel, leftover)) => {
                    *self.outbound.lock().await = Some(channel.outbound.clone());
                    self.set_state(ConnectionState::Connected);
                    tracing::info!(
                        "Reconnected to {} after {} attempt(s)",
                        self.url,
                        attempts
                    );
                    let callbacks = self.reconnected.lock().await.clone();
                    for callback in callbacks {
                        callback();
                    }
                    return Some((channel, leftover));
                }
                Err(e) => tracing::debug!("Reconnect attempt {} failed: {}", attempts, e),
            }
        }
        None
    }

    async fn pump(&self, channel: &mut TransportChannel, leftover: String) -> PumpOutcome {
        if let Some(outcome) = self.process_payload(&leftover).await {
            return outcome;
        }

        let period = self.options.keep_alive_interval;
        let mut keep_alive = tokio::time::interval_at(Instant::now() + period, period);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut server_deadline = Instant::now() + self.options.server_timeout;

        loop {
            tokio::select! {
                payload = channel.inbound.recv() => {
                    let Some(payload) = payload else {
                        return PumpOutcome::Lost("transport closed".to_string());
                    };
                    server_deadline = Instant::now() + self.options.server_timeout;
                    if let Some(outcome) = self.process_payload(&payload).await {
                        return outcome;
                    }
                }
                _ = keep_alive.tick() => {
                    match protocol::write_message(&HubMessage::Ping) {
                        Ok(ping) => {
                            if channel.outbound.send(ping).is_err() {
                                return PumpOutcome::Lost("transport closed".to_string());
                            }
                        }
                        Err(e) => tracing::warn!("Failed to encode ping: {}", e),
                    }
                }
                _ = tokio::time::sleep_until(server_deadline) => {
                    return PumpOutcome::Lost(format!(
                        "no message from the hub for {:?}",
                        self.options.server_timeout
                    ));
                }
            }
        }
    }

    async fn process_payload(&self, payload: &str) -> Option<PumpOutcome> {
        for message in protocol::parse_messages(payload) {
            match message {
                Ok(HubMessage::Invocation {
                    target, arguments, ..
                }) => self.dispatch(&target, &arguments).await,
                Ok(HubMessage::Completion {
                    invocation_id,
                    result,
                    error,
                }) => self.complete(&invocation_id, result, error).await,
                Ok(HubMessage::Ping) => {}
                Ok(HubMessage::Close {
                    error,
                    allow_reconnect,
                }) => {
                    return Some(if allow_reconnect {
                        PumpOutcome::Lost(
                            error.unwrap_or_else(|| "hub closed the connection".to_string()),
                        )
                    } else {
                        PumpOutcome::Closed { error }
                    });
                }
                Ok(HubMessage::Unsupported(kind)) => {
                    tracing::debug!("Ignoring hub message of type {}", kind)
                }
                Err(e) => tracing::warn!("Dropping undecodable frame: {}", e),
            }
        }
        None
    }

    async fn dispatch(&self, target: &str, arguments: &[Value]) {
        let handlers = self.handlers.lock().await.handlers_for(target);
        if handlers.is_empty() {
            tracing::warn!("No client method with the name '{}' found", target);
            return;
        }
        for handler in handlers {
            handler(arguments);
        }
    }

    async fn complete(&self, invocation_id: &str, result: Option<Value>, error: Option<String>) {
        let Some(pending) = self.pending.lock().await.remove(invocation_id) else {
            tracing::debug!("Completion for unknown invocation {}", invocation_id);
            return;
        };
        let outcome = match error {
            Some(message) => Err(ClientError::InvocationRejected {
                target: pending.target,
                message,
            }),
            None => Ok(result.unwrap_or(Value::Null)),
        };
        // The caller may have gone away; nothing to do then
        let _ = pending.responder.send(outcome);
    }

    async fn fail_pending(&self) {
        let pending: Vec<_> = self
            .pending
            .lock()
            .await
            .drain()
            .map(|(_, invocation)| invocation)
            .collect();
        for invocation in pending {
            let _ = invocation
                .responder
                .send(Err(ClientError::ConnectionLost(invocation.target)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transport::MockHubTransport;
    use std::collections::VecDeque;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - HubConnection の接続ライフサイクル（start, stop, 再接続）
    // - invoke と Completion の対応付け
    // - 受信イベントのハンドラへの配送順序
    //
    // 【どのようなシナリオをテストするか】
    // 1. ハンドシェイク成功 / 接続失敗
    // 2. 未接続時の invoke はトランスポートに触れずエラー
    // 3. Completion の結果とエラー
    // 4. stop の冪等性と保留中 invoke の失敗
    // 5. Close メッセージとトランスポート切断後の再接続
    // ========================================

    const HUB_URL: &str = "http://hub.test/chathub";
    const HANDSHAKE: &str = "{\"protocol\":\"json\",\"version\":1}\u{1e}";

    /// The hub side of an in-memory transport
    struct ScriptedHub {
        frames: mpsc::UnboundedReceiver<String>,
        sender: mpsc::UnboundedSender<String>,
    }

    fn scripted_channel() -> (TransportChannel, ScriptedHub) {
        let (client_tx, hub_rx) = mpsc::unbounded_channel();
        let (hub_tx, client_rx) = mpsc::unbounded_channel();
        // Handshake answer is queued up front
        hub_tx.send("{}\u{1e}".to_string()).unwrap();
        (
            TransportChannel {
                outbound: client_tx,
                inbound: client_rx,
            },
            ScriptedHub {
                frames: hub_rx,
                sender: hub_tx,
            },
        )
    }

    fn scripted_transport() -> (MockHubTransport, ScriptedHub) {
        let (channel, hub) = scripted_channel();
        let mut transport = MockHubTransport::new();
        transport
            .expect_connect()
            .times(1)
            .return_once(move |_| Ok(channel));
        (transport, hub)
    }

    fn connection_with(transport: MockHubTransport, reconnect: ReconnectPolicy) -> HubConnection {
        HubConnection::new(
            HUB_URL,
            Arc::new(transport),
            ConnectionOptions {
                reconnect,
                ..Default::default()
            },
        )
    }

    async fn wait_for_state(connection: &HubConnection, expected: ConnectionState) {
        let mut state = connection.watch_state();
        tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| *s == expected))
            .await
            .expect("timed out waiting for connection state")
            .expect("state channel closed");
    }

    #[tokio::test]
    async fn test_start_performs_handshake() {
        // テスト項目: start でハンドシェイクが送信され、Connected になる
        // given (前提条件):
        let (transport, mut hub) = scripted_transport();
        let connection = connection_with(transport, ReconnectPolicy::Disabled);

        // when (操作):
        let result = connection.start().await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(connection.state(), ConnectionState::Connected);
        assert_eq!(hub.frames.recv().await.unwrap(), HANDSHAKE);
    }

    #[tokio::test]
    async fn test_start_failure_moves_to_failed() {
        // テスト項目: トランスポートの接続失敗で Failed になり、エラーが返される
        // given (前提条件):
        let mut transport = MockHubTransport::new();
        transport.expect_connect().times(1).returning(|_| {
            Err(ClientError::ConnectionEstablishment(
                "connection refused".to_string(),
            ))
        });
        let connection = connection_with(transport, ReconnectPolicy::automatic());

        // when (操作):
        let result = connection.start().await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(ClientError::ConnectionEstablishment(_))
        ));
        assert_eq!(connection.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_start_rejected_handshake() {
        // テスト項目: ハンドシェイクがエラーで返された場合は Failed になる
        // given (前提条件):
        let (client_tx, _hub_rx) = mpsc::unbounded_channel();
        let (hub_tx, client_rx) = mpsc::unbounded_channel();
        hub_tx
            .send("{\"error\":\"Requested protocol 'json' is not available.\"}\u{1e}".to_string())
            .unwrap();
        let mut transport = MockHubTransport::new();
        transport.expect_connect().times(1).return_once(move |_| {
            Ok(TransportChannel {
                outbound: client_tx,
                inbound: client_rx,
            })
        });
        let connection = connection_with(transport, ReconnectPolicy::Disabled);

        // when (操作):
        let result = connection.start().await;

        // then (期待する結果):
        assert!(result.is_err());
        assert_eq!(connection.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn test_invoke_when_not_connected() {
        // テスト項目: 未接続時の invoke はトランスポートを使わずに NotConnected を返す
        // given (前提条件):
        // 期待値を設定しないモックなので connect が呼ばれるとパニックする
        let connection = connection_with(MockHubTransport::new(), ReconnectPolicy::Disabled);

        // when (操作):
        let result = connection
            .invoke("AddToGroup", vec![Value::from("lobby")])
            .await;

        // then (期待する結果):
        assert_eq!(result, Err(ClientError::NotConnected));
        assert_eq!(connection.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_invoke_resolves_with_completion() {
        // テスト項目: invoke が対応する Completion の結果で完了する
        // given (前提条件):
        let (transport, mut hub) = scripted_transport();
        let connection = connection_with(transport, ReconnectPolicy::Disabled);
        connection.start().await.unwrap();
        assert_eq!(hub.frames.recv().await.unwrap(), HANDSHAKE);

        // when (操作):
        let invoker = connection.clone();
        let call = tokio::spawn(async move {
            invoker
                .invoke("AddToGroup", vec![Value::from("lobby")])
                .await
        });
        let frame = hub.frames.recv().await.unwrap();
        hub.sender
            .send("{\"type\":3,\"invocationId\":\"0\",\"result\":true}\u{1e}".to_string())
            .unwrap();

        // then (期待する結果):
        assert_eq!(
            frame,
            "{\"type\":1,\"invocationId\":\"0\",\"target\":\"AddToGroup\",\"arguments\":[\"lobby\"]}\u{1e}"
        );
        assert_eq!(call.await.unwrap(), Ok(Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_invoke_rejected_by_hub() {
        // テスト項目: エラー付きの Completion で InvocationRejected が返される
        // given (前提条件):
        let (transport, mut hub) = scripted_transport();
        let connection = connection_with(transport, ReconnectPolicy::Disabled);
        connection.start().await.unwrap();
        hub.frames.recv().await.unwrap();

        // when (操作):
        let invoker = connection.clone();
        let call = tokio::spawn(async move {
            invoker
                .invoke("RemoveFromGroup", vec![Value::from("lobby")])
                .await
        });
        hub.frames.recv().await.unwrap();
        hub.sender
            .send("{\"type\":3,\"invocationId\":\"0\",\"error\":\"Not in group\"}\u{1e}".to_string())
            .unwrap();

        // then (期待する結果):
        assert_eq!(
            call.await.unwrap(),
            Err(ClientError::InvocationRejected {
                target: "RemoveFromGroup".to_string(),
                message: "Not in group".to_string(),
            })
        );
        // 接続状態は変わらない
        assert_eq!(connection.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_handlers_receive_events_in_delivery_order() {
        // テスト項目: 受信したイベントが配送順にハンドラへ渡される
        // given (前提条件):
        let (transport, hub) = scripted_transport();
        let connection = connection_with(transport, ReconnectPolicy::Disabled);
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection
            .on("ReceiveMessage", move |args| {
                let _ = tx.send(args.to_vec());
            })
            .await;
        connection.start().await.unwrap();

        // when (操作):
        hub.sender
            .send(concat!(
                "{\"type\":1,\"target\":\"ReceiveMessage\",\"arguments\":[\"Bob\",\"one\"]}\u{1e}",
                "{\"type\":1,\"target\":\"ReceiveMessage\",\"arguments\":[\"Bob\",\"two\"]}\u{1e}",
            )
            .to_string())
            .unwrap();
        hub.sender
            .send("{\"type\":1,\"target\":\"receivemessage\",\"arguments\":[\"Carol\",\"three\"]}\u{1e}".to_string())
            .unwrap();

        // then (期待する結果):
        let mut bodies = Vec::new();
        for _ in 0..3 {
            let args = rx.recv().await.unwrap();
            bodies.push(args[1].as_str().unwrap().to_string());
        }
        assert_eq!(bodies, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_off_stops_delivery() {
        // テスト項目: 購読解除したハンドラにはイベントが届かない
        // given (前提条件):
        let (transport, hub) = scripted_transport();
        let connection = connection_with(transport, ReconnectPolicy::Disabled);
        let (removed_tx, mut removed_rx) = mpsc::unbounded_channel::<()>();
        let (kept_tx, mut kept_rx) = mpsc::unbounded_channel::<()>();
        let removed = connection
            .on("UserTyping", move |_| {
                let _ = removed_tx.send(());
            })
            .await;
        connection
            .on("UserTyping", move |_| {
                let _ = kept_tx.send(());
            })
            .await;
        connection.start().await.unwrap();

        // when (操作):
        assert!(connection.off(&removed).await);
        hub.sender
            .send("{\"type\":1,\"target\":\"UserTyping\",\"arguments\":[\"Bob\"]}\u{1e}".to_string())
            .unwrap();

        // then (期待する結果):
        kept_rx.recv().await.unwrap();
        assert!(removed_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        // テスト項目: stop を 2 回呼んでもパニックせず Disconnected のまま
        // given (前提条件):
        let (transport, _hub) = scripted_transport();
        let connection = connection_with(transport, ReconnectPolicy::automatic());
        connection.start().await.unwrap();

        // when (操作):
        connection.stop().await;
        connection.stop().await;

        // then (期待する結果):
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert_eq!(
            connection.invoke("AddToGroup", vec![]).await,
            Err(ClientError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_stop_fails_pending_invocations() {
        // テスト項目: stop で完了待ちの invoke が ConnectionLost で失敗する
        // given (前提条件):
        let (transport, mut hub) = scripted_transport();
        let connection = connection_with(transport, ReconnectPolicy::Disabled);
        connection.start().await.unwrap();
        hub.frames.recv().await.unwrap();
        let invoker = connection.clone();
        let call = tokio::spawn(async move {
            invoker
                .invoke("SendMessageToGroup", vec![Value::from("lobby")])
                .await
        });
        hub.frames.recv().await.unwrap();

        // when (操作):
        connection.stop().await;

        // then (期待する結果):
        assert_eq!(
            call.await.unwrap(),
            Err(ClientError::ConnectionLost("SendMessageToGroup".to_string()))
        );
    }

    #[tokio::test]
    async fn test_close_message_disconnects_without_reconnect() {
        // テスト項目: 再接続不可の Close メッセージで Disconnected になり、再接続しない
        // given (前提条件):
        let (transport, hub) = scripted_transport();
        let connection = connection_with(transport, ReconnectPolicy::automatic());
        connection.start().await.unwrap();

        // when (操作):
        hub.sender
            .send("{\"type\":7,\"error\":\"Server is shutting down\"}\u{1e}".to_string())
            .unwrap();

        // then (期待する結果):
        // times(1) のモックなので再接続が試みられればテストは失敗する
        wait_for_state(&connection, ConnectionState::Disconnected).await;
    }

    #[tokio::test]
    async fn test_transport_loss_without_reconnect_policy() {
        // テスト項目: 再接続が無効な場合、トランスポート切断で Disconnected になる
        // given (前提条件):
        let (transport, hub) = scripted_transport();
        let connection = connection_with(transport, ReconnectPolicy::Disabled);
        connection.start().await.unwrap();

        // when (操作):
        drop(hub);

        // then (期待する結果):
        wait_for_state(&connection, ConnectionState::Disconnected).await;
    }

    #[tokio::test]
    async fn test_reconnects_after_transport_loss() {
        // テスト項目: トランスポート切断後に自動で再接続し、ハンドラが維持される
        // given (前提条件):
        let (first, first_hub) = scripted_channel();
        let (second, mut second_hub) = scripted_channel();
        let channels = std::sync::Mutex::new(VecDeque::from([first, second]));
        let mut transport = MockHubTransport::new();
        transport.expect_connect().times(2).returning(move |_| {
            channels.lock().unwrap().pop_front().ok_or_else(|| {
                ClientError::ConnectionEstablishment("no more channels".to_string())
            })
        });
        let connection = connection_with(
            transport,
            ReconnectPolicy::Automatic {
                delays: vec![Duration::ZERO],
            },
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection
            .on("ReceiveMessage", move |args| {
                let _ = tx.send(args.to_vec());
            })
            .await;
        connection.start().await.unwrap();

        // when (操作):
        drop(first_hub);

        // then (期待する結果):
        assert_eq!(second_hub.frames.recv().await.unwrap(), HANDSHAKE);
        wait_for_state(&connection, ConnectionState::Connected).await;
        second_hub
            .sender
            .send("{\"type\":1,\"target\":\"ReceiveMessage\",\"arguments\":[\"Bob\",\"back\"]}\u{1e}".to_string())
            .unwrap();
        let args = rx.recv().await.unwrap();
        assert_eq!(args[1], Value::from("back"));
    }

    #[tokio::test]
    async fn test_reconnected_callback_runs_after_reconnect_only() {
        // テスト項目: 再接続コールバックは初回接続では呼ばれず、自動再接続の成功後に呼ばれる
        // given (前提条件):
        let (first, first_hub) = scripted_channel();
        let (second, _second_hub) = scripted_channel();
        let channels = std::sync::Mutex::new(VecDeque::from([first, second]));
        let mut transport = MockHubTransport::new();
        transport.expect_connect().times(2).returning(move |_| {
            channels.lock().unwrap().pop_front().ok_or_else(|| {
                ClientError::ConnectionEstablishment("no more channels".to_string())
            })
        });
        let connection = connection_with(
            transport,
            ReconnectPolicy::Automatic {
                delays: vec![Duration::ZERO],
            },
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection
            .on_reconnected(move || {
                let _ = tx.send(());
            })
            .await;
        connection.start().await.unwrap();
        assert!(rx.try_recv().is_err());

        // when (操作):
        drop(first_hub);

        // then (期待する結果):
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("reconnected callback not called")
            .unwrap();
        assert_eq!(connection.state(), ConnectionState::Connected);
        assert!(rx.try_recv().is_err());
    }
}
