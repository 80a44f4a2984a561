//! Session event loop.
//!
//! One task per session applies normalized hub events, mirrors the
//! connection state, and fires typing expiries by sleeping until the
//! earliest deadline. Aborting the task cancels every pending expiry.

use std::sync::Arc;

use tokio::{
    sync::{mpsc, watch},
    time::Instant,
};

use crate::domain::ConnectionState;

use super::{SessionInner, normalizer::HubEvent};

pub(super) async fn run(
    session: Arc<SessionInner>,
    mut events: mpsc::UnboundedReceiver<HubEvent>,
    mut connection_state: watch::Receiver<ConnectionState>,
) {
    loop {
        let deadline = session.state.lock().await.next_deadline();

        tokio::select! {
            event = events.recv() => match event {
                Some(event) => session.apply_event(event).await,
                None => break,
            },
            changed = connection_state.changed() => {
                if changed.is_err() {
                    break;
                }
                connection_state.borrow_and_update();
                session.sync_connection_state().await;
            }
            _ = sleep_until_deadline(deadline) => {
                session.expire(Instant::now()).await;
            }
            // A new deadline was armed; recompute it
            _ = session.wake.notified() => {}
        }
    }
    tracing::debug!("Session event loop finished");
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
