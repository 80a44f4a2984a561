//! In-memory hub shared by the session integration tests.
//!
//! The hub answers the handshake, keeps group membership per connection,
//! fans `SendMessageToGroup` and `SendTypingNotification` out to every
//! member of the group (sender included), and completes every invocation.

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use hubchat_client::{
    ChatSession, ClientConfig, ClientError, SessionSnapshot,
    domain::{HubTransport, ReconnectPolicy, TransportChannel},
};
use hubchat_shared::time::FixedClock;
use serde_json::{Value, json};
use tokio::sync::mpsc;

const RECORD_SEPARATOR: char = '\u{1e}';

/// 2023-01-01 00:00:00 UTC
pub const FIXED_NOW: i64 = 1672531200000;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedInvocation {
    pub target: String,
    pub arguments: Vec<Value>,
}

struct ConnectedClient {
    sender: mpsc::UnboundedSender<String>,
    groups: HashSet<String>,
}

#[derive(Default)]
struct HubState {
    next_client_id: u64,
    clients: HashMap<u64, ConnectedClient>,
    connect_count: usize,
    refuse_connections: bool,
    rejected_targets: HashSet<String>,
    invocations: Vec<RecordedInvocation>,
}

impl HubState {
    fn send(&self, client_id: u64, record: &Value) {
        if let Some(client) = self.clients.get(&client_id) {
            let _ = client
                .sender
                .send(format!("{}{}", record, RECORD_SEPARATOR));
        }
    }

    fn broadcast(&self, group: &str, record: &Value) {
        let mut members: Vec<_> = self
            .clients
            .iter()
            .filter(|(_, client)| client.groups.contains(group))
            .map(|(id, _)| *id)
            .collect();
        members.sort_unstable();
        for id in members {
            self.send(id, record);
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeHub {
    state: Arc<Mutex<HubState>>,
}

impl FakeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A hub that refuses every connection until [`FakeHub::accept_connections`]
    pub fn refusing() -> Self {
        let hub = Self::new();
        hub.state.lock().unwrap().refuse_connections = true;
        hub
    }

    pub fn accept_connections(&self) {
        self.state.lock().unwrap().refuse_connections = false;
    }

    /// Answer every invocation of `target` with an error
    pub fn reject(&self, target: &str) {
        self.state
            .lock()
            .unwrap()
            .rejected_targets
            .insert(target.to_string());
    }

    pub fn invocations(&self, target: &str) -> Vec<RecordedInvocation> {
        self.state
            .lock()
            .unwrap()
            .invocations
            .iter()
            .filter(|invocation| invocation.target == target)
            .cloned()
            .collect()
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().connect_count
    }

    /// Drop every transport from the hub side, as a server restart would
    pub fn drop_connections(&self) {
        self.state.lock().unwrap().clients.clear();
    }

    fn handle_record(&self, client_id: u64, record: &str) {
        let Ok(frame) = serde_json::from_str::<Value>(record) else {
            return;
        };
        if frame["type"] != json!(1) {
            return;
        }

        let target = frame["target"].as_str().unwrap_or_default().to_string();
        let arguments = frame["arguments"].as_array().cloned().unwrap_or_default();
        let argument = |index: usize| {
            arguments
                .get(index)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let mut state = self.state.lock().unwrap();
        state.invocations.push(RecordedInvocation {
            target: target.clone(),
            arguments: arguments.clone(),
        });
        let rejected = state.rejected_targets.contains(&target);

        if !rejected {
            match target.as_str() {
                "AddToGroup" => {
                    if let Some(client) = state.clients.get_mut(&client_id) {
                        client.groups.insert(argument(0));
                    }
                }
                "RemoveFromGroup" => {
                    if let Some(client) = state.clients.get_mut(&client_id) {
                        client.groups.remove(&argument(0));
                    }
                }
                "SendMessageToGroup" => state.broadcast(
                    &argument(0),
                    &json!({
                        "type": 1,
                        "target": "ReceiveMessage",
                        "arguments": [argument(1), argument(2)],
                    }),
                ),
                "SendTypingNotification" => state.broadcast(
                    &argument(0),
                    &json!({
                        "type": 1,
                        "target": "UserTyping",
                        "arguments": [argument(1)],
                    }),
                ),
                _ => {}
            }
        }

        if let Some(invocation_id) = frame["invocationId"].as_str() {
            let completion = if rejected {
                json!({
                    "type": 3,
                    "invocationId": invocation_id,
                    "error": format!("An unexpected error occurred invoking '{}' on the server.", target),
                })
            } else {
                json!({ "type": 3, "invocationId": invocation_id, "result": null })
            };
            state.send(client_id, &completion);
        }
    }
}

#[async_trait]
impl HubTransport for FakeHub {
    async fn connect(&self, _url: &str) -> Result<TransportChannel, ClientError> {
        let (client_tx, mut hub_rx) = mpsc::unbounded_channel::<String>();
        let (hub_tx, client_rx) = mpsc::unbounded_channel::<String>();

        let client_id = {
            let mut state = self.state.lock().unwrap();
            if state.refuse_connections {
                return Err(ClientError::ConnectionEstablishment(
                    "connection refused".to_string(),
                ));
            }
            state.connect_count += 1;
            let id = state.next_client_id;
            state.next_client_id += 1;
            state.clients.insert(
                id,
                ConnectedClient {
                    sender: hub_tx,
                    groups: HashSet::new(),
                },
            );
            id
        };

        let hub = self.clone();
        tokio::spawn(async move {
            let mut handshake_done = false;
            while let Some(payload) = hub_rx.recv().await {
                for record in payload.split(RECORD_SEPARATOR).filter(|r| !r.is_empty()) {
                    if !handshake_done {
                        handshake_done = true;
                        hub.state.lock().unwrap().send(client_id, &json!({}));
                        continue;
                    }
                    hub.handle_record(client_id, record);
                }
            }
            hub.state.lock().unwrap().clients.remove(&client_id);
        });

        Ok(TransportChannel {
            outbound: client_tx,
            inbound: client_rx,
        })
    }
}

/// Default config with an immediate first reconnect attempt
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::new("http://hub.test/chathub");
    config.reconnect = ReconnectPolicy::Automatic {
        delays: vec![Duration::ZERO, Duration::from_millis(100)],
    };
    config
}

pub async fn session_with(hub: &FakeHub, config: ClientConfig, user: &str) -> ChatSession {
    let session = ChatSession::connect(
        config,
        Arc::new(hub.clone()),
        Arc::new(FixedClock::new(FIXED_NOW)),
    )
    .await;
    session.set_user_name(user).await;
    session
}

/// Connected session that has joined `group`
pub async fn joined_session(
    hub: &FakeHub,
    config: ClientConfig,
    user: &str,
    group: &str,
) -> ChatSession {
    let session = session_with(hub, config, user).await;
    session.set_group_name(group).await;
    session
        .join_group()
        .await
        .expect("failed to join the group");
    session
}

/// Wait (at most 5 seconds) until the session publishes a matching snapshot
pub async fn wait_until(
    session: &ChatSession,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut snapshots = session.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), snapshots.wait_for(predicate))
        .await
        .expect("timed out waiting for the session")
        .expect("session dropped")
        .clone();
    snapshot
}
