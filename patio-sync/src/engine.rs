//! Engine composition root
//!
//! Wires the store, API client, push channel, arbiter, and coordinators
//! together, and runs the event pump that routes push events: recognition
//! results go through the arbiter into the presentation queue, new sessions
//! are prepended to the Sessions collection.

use std::sync::{Arc, Mutex};

use patio_common::config::BackendConfig;
use patio_common::events::PushEvent;
use patio_common::{Error, Result};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::ParkingApi;
use crate::arbiter::{RecognitionArbiter, RecognitionOutcome};
use crate::channel::EventChannel;
use crate::entry::EntrySessionCoordinator;
use crate::exit::ExitSessionCoordinator;
use crate::snapshot::{LoadReport, SnapshotLoader};
use crate::store::CollectionStore;

/// Capacity of the presentation queue; outcomes are consumed one at a time
const OUTCOME_QUEUE_CAPACITY: usize = 16;

/// Capacity of the fatal-error fan-out; a session ends on the first one
const FATAL_QUEUE_CAPACITY: usize = 4;

pub struct Engine {
    pub store: Arc<CollectionStore>,
    pub api: Arc<ParkingApi>,
    pub arbiter: Arc<RecognitionArbiter>,
    pub entry: EntrySessionCoordinator,
    pub exit: ExitSessionCoordinator,
    loader: SnapshotLoader,
    channel: EventChannel,
    fatal_tx: broadcast::Sender<Error>,
    /// Push events buffered here until the snapshot load completes
    events_rx: Mutex<Option<broadcast::Receiver<PushEvent>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Build the engine and open the push subscription
    ///
    /// Returns the engine plus the presentation queue receiver — the single
    /// UI-surfacing callback for recognition outcomes. Events arriving
    /// before the snapshot load completes buffer in the subscription; they
    /// are routed only once the bulk load has stored its collections, so a
    /// session-created event cannot be wiped by the later Sessions replace.
    pub fn new(config: &BackendConfig) -> Result<(Self, mpsc::Receiver<RecognitionOutcome>)> {
        let store = Arc::new(CollectionStore::new());
        let api = Arc::new(ParkingApi::new(config)?);

        let (outcome_tx, outcome_rx) = mpsc::channel(OUTCOME_QUEUE_CAPACITY);
        let (fatal_tx, _) = broadcast::channel(FATAL_QUEUE_CAPACITY);
        let arbiter = Arc::new(RecognitionArbiter::new(store.clone(), outcome_tx));

        let channel = EventChannel::connect(config);
        let events_rx = Mutex::new(Some(channel.subscribe()));

        let entry = EntrySessionCoordinator::new(
            api.clone(),
            store.clone(),
            arbiter.clone(),
            fatal_tx.clone(),
        );
        let exit = ExitSessionCoordinator::new(api.clone(), store.clone(), fatal_tx.clone());
        let loader = SnapshotLoader::new(api.clone(), store.clone());

        Ok((
            Self {
                store,
                api,
                arbiter,
                entry,
                exit,
                loader,
                channel,
                fatal_tx,
                events_rx,
                pump: Mutex::new(None),
            },
            outcome_rx,
        ))
    }

    /// Run the ordered bulk load of all collections, then start routing
    /// buffered and live push events
    pub async fn load_snapshot(&self) -> LoadReport {
        let report = self.loader.load_all().await;
        self.start_pump();
        report
    }

    /// Subscribe to fatal session errors (credential rejection forces
    /// sign-out)
    pub fn subscribe_fatal(&self) -> broadcast::Receiver<Error> {
        self.fatal_tx.subscribe()
    }

    /// Start the event pump; no-op after the first call
    fn start_pump(&self) {
        if let Ok(mut slot) = self.events_rx.lock() {
            if let Some(events) = slot.take() {
                let handle = tokio::spawn(run_event_pump(
                    events,
                    self.store.clone(),
                    self.arbiter.clone(),
                ));
                if let Ok(mut pump) = self.pump.lock() {
                    *pump = Some(handle);
                }
            }
        }
    }

    /// Tear down the push subscription and the event pump
    pub fn shutdown(&self) {
        self.channel.close();
        if let Ok(mut pump) = self.pump.lock() {
            if let Some(handle) = pump.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Routes push events for the remainder of the authenticated session
pub async fn run_event_pump(
    mut events: broadcast::Receiver<PushEvent>,
    store: Arc<CollectionStore>,
    arbiter: Arc<RecognitionArbiter>,
) {
    debug!("event pump started");

    loop {
        match events.recv().await {
            Ok(PushEvent::RecognitionResult(payload)) => {
                arbiter.handle(payload).await;
            }
            Ok(PushEvent::SessionCreated(session)) => {
                debug!(session_id = %session.id, "session-created event");
                store
                    .mutate_sessions(move |mut sessions| {
                        sessions.insert(0, session);
                        sessions
                    })
                    .await;
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event pump lagged; skipped push events are lost");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("push channel closed, event pump stopping");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use patio_common::events::{PlateError, RecognitionPayload};
    use patio_common::models::Session;

    fn session(id: &str, vehicle_id: &str, spot_id: &str) -> Session {
        Session {
            id: id.to_string(),
            entered_at: Utc::now(),
            exited_at: None,
            vehicle_id: vehicle_id.to_string(),
            spot_id: spot_id.to_string(),
            vehicle: None,
            spot: None,
        }
    }

    #[tokio::test]
    async fn test_pump_prepends_created_sessions() {
        let store = Arc::new(CollectionStore::new());
        store.mutate_sessions(|_| vec![session("1", "5", "10")]).await;

        let (outcome_tx, _outcome_rx) = mpsc::channel(4);
        let arbiter = Arc::new(RecognitionArbiter::new(store.clone(), outcome_tx));
        let (tx, rx) = broadcast::channel(8);
        let pump = tokio::spawn(run_event_pump(rx, store.clone(), arbiter));

        tx.send(PushEvent::SessionCreated(session("2", "6", "11")))
            .unwrap();
        drop(tx); // closes the pump after the event drains
        pump.await.unwrap();

        let sessions = store.sessions().await;
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, "2"); // newest first
        assert_eq!(sessions[1].id, "1");
    }

    #[tokio::test]
    async fn test_pump_routes_recognition_to_presentation() {
        let store = Arc::new(CollectionStore::new());
        let (outcome_tx, mut outcome_rx) = mpsc::channel(4);
        let arbiter = Arc::new(RecognitionArbiter::new(store.clone(), outcome_tx));
        let (tx, rx) = broadcast::channel(8);
        let pump = tokio::spawn(run_event_pump(rx, store, arbiter));

        tx.send(PushEvent::RecognitionResult(RecognitionPayload::Failure {
            error: PlateError {
                message: "não encontrado".to_string(),
                plate: "ZZZ9999".to_string(),
            },
        }))
        .unwrap();

        match outcome_rx.recv().await.unwrap() {
            RecognitionOutcome::NotFound { plate, .. } => assert_eq!(plate, "ZZZ9999"),
            other => panic!("unexpected outcome: {other:?}"),
        }

        drop(tx);
        pump.await.unwrap();
    }
}
