//! Recognition arbiter
//!
//! Classifies each `resultado-placa` event into exactly one of three
//! outcomes and forwards it to the single presentation queue. The
//! "already parked" check is a point read of the local open-sessions set:
//! it can race with an in-flight snapshot refresh and read stale data.
//! That staleness is a documented property of the design, not closed here.

use std::sync::Arc;

use patio_common::events::RecognitionPayload;
use patio_common::models::{Spot, Vehicle};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::store::CollectionStore;

/// Message surfaced when a recognized vehicle already has an open session
pub const ALREADY_PARKED_MESSAGE: &str = "Veículo já está no estacionamento";

/// Message surfaced when a recognition event carries no vehicle at all
const EMPTY_RESULT_MESSAGE: &str = "Resultado de reconhecimento vazio";

/// Exactly one of these fires per recognition event
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    /// Vehicle recognized, no open session: surface the entry-confirmation
    /// presentation with the vehicle and the currently free spots
    Confirm {
        vehicle: Vehicle,
        free_spots: Vec<Spot>,
    },
    /// Vehicle recognized but an open session already references it
    AlreadyParked { plate: String, message: String },
    /// The recognizer could not match the plate to a registered vehicle
    NotFound { plate: String, message: String },
}

/// Consumes recognition events and dispatches one presentation per event
pub struct RecognitionArbiter {
    store: Arc<CollectionStore>,
    outcome_tx: mpsc::Sender<RecognitionOutcome>,
    /// Recognized vehicle awaiting entry confirmation; cleared by the
    /// entry coordinator on confirm or cancel
    pending: RwLock<Option<Vehicle>>,
}

impl RecognitionArbiter {
    pub fn new(store: Arc<CollectionStore>, outcome_tx: mpsc::Sender<RecognitionOutcome>) -> Self {
        Self {
            store,
            outcome_tx,
            pending: RwLock::new(None),
        }
    }

    /// Classify a recognition payload against the current local state
    pub async fn classify(&self, payload: &RecognitionPayload) -> RecognitionOutcome {
        match payload {
            RecognitionPayload::Failure { error } => RecognitionOutcome::NotFound {
                plate: error.plate.clone(),
                message: error.message.clone(),
            },
            RecognitionPayload::Matches(vehicles) => {
                let Some(vehicle) = vehicles.first() else {
                    return RecognitionOutcome::NotFound {
                        plate: String::new(),
                        message: EMPTY_RESULT_MESSAGE.to_string(),
                    };
                };

                // Point read against possibly stale local sessions
                if self
                    .store
                    .open_session_for_vehicle(&vehicle.id)
                    .await
                    .is_some()
                {
                    RecognitionOutcome::AlreadyParked {
                        plate: vehicle.plate.clone(),
                        message: ALREADY_PARKED_MESSAGE.to_string(),
                    }
                } else {
                    RecognitionOutcome::Confirm {
                        vehicle: vehicle.clone(),
                        free_spots: self.store.free_spots().await,
                    }
                }
            }
        }
    }

    /// Classify, update the pending-recognition slot, and surface the
    /// outcome through the presentation queue
    pub async fn handle(&self, payload: RecognitionPayload) {
        let outcome = self.classify(&payload).await;

        match &outcome {
            RecognitionOutcome::Confirm { vehicle, .. } => {
                debug!(plate = %vehicle.plate, "recognition confirmed, awaiting entry");
                *self.pending.write().await = Some(vehicle.clone());
            }
            RecognitionOutcome::AlreadyParked { plate, .. } => {
                debug!(plate = %plate, "vehicle already in the lot");
            }
            RecognitionOutcome::NotFound { plate, .. } => {
                debug!(plate = %plate, "plate not recognized");
            }
        }

        if self.outcome_tx.send(outcome).await.is_err() {
            warn!("presentation queue closed, recognition outcome dropped");
        }
    }

    /// The vehicle currently awaiting entry confirmation, if any
    pub async fn pending(&self) -> Option<Vehicle> {
        self.pending.read().await.clone()
    }

    /// Clear the pending-recognition slot (confirm or cancel both end here)
    pub async fn clear_pending(&self) {
        *self.pending.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use patio_common::events::PlateError;
    use patio_common::models::Session;

    fn vehicle(id: &str, plate: &str) -> Vehicle {
        Vehicle {
            id: id.to_string(),
            plate: plate.to_string(),
            model: "Gol".to_string(),
            color: "Prata".to_string(),
            student: None,
            faculty: None,
            active: true,
        }
    }

    fn open_session(vehicle_id: &str, spot_id: &str) -> Session {
        Session {
            id: "77".to_string(),
            entered_at: Utc::now(),
            exited_at: None,
            vehicle_id: vehicle_id.to_string(),
            spot_id: spot_id.to_string(),
            vehicle: None,
            spot: None,
        }
    }

    fn arbiter_with_store(
        store: Arc<CollectionStore>,
    ) -> (RecognitionArbiter, mpsc::Receiver<RecognitionOutcome>) {
        let (tx, rx) = mpsc::channel(8);
        (RecognitionArbiter::new(store, tx), rx)
    }

    #[tokio::test]
    async fn test_confirm_outcome_for_unparked_vehicle() {
        // Scenario: recognized vehicle "5", no open session for it
        let store = Arc::new(CollectionStore::new());
        store
            .mutate_spots(|_| {
                vec![patio_common::models::Spot {
                    id: "10".to_string(),
                    number: "A-10".to_string(),
                    sector: "Bloco A".to_string(),
                    spot_type: patio_common::models::SpotType::Common,
                    occupied: false,
                    vehicle: None,
                }]
            })
            .await;

        let (arbiter, mut rx) = arbiter_with_store(store);
        let payload = RecognitionPayload::Matches(vec![vehicle("5", "ABC1234")]);

        arbiter.handle(payload).await;

        match rx.recv().await.unwrap() {
            RecognitionOutcome::Confirm { vehicle, free_spots } => {
                assert_eq!(vehicle.plate, "ABC1234");
                assert_eq!(free_spots.len(), 1);
                assert_eq!(free_spots[0].id, "10");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // pending slot holds the recognized vehicle for the entry flow
        assert_eq!(arbiter.pending().await.unwrap().id, "5");
    }

    #[tokio::test]
    async fn test_already_parked_outcome() {
        // Scenario: open session exists with vehicleId "5"
        let store = Arc::new(CollectionStore::new());
        store
            .mutate_sessions(|_| vec![open_session("5", "10")])
            .await;

        let (arbiter, mut rx) = arbiter_with_store(store);
        arbiter
            .handle(RecognitionPayload::Matches(vec![vehicle("5", "ABC1234")]))
            .await;

        match rx.recv().await.unwrap() {
            RecognitionOutcome::AlreadyParked { plate, message } => {
                assert_eq!(plate, "ABC1234");
                assert_eq!(message, "Veículo já está no estacionamento");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(arbiter.pending().await.is_none());
    }

    #[tokio::test]
    async fn test_not_found_outcome() {
        // Scenario: recognizer reports an unmatched plate
        let store = Arc::new(CollectionStore::new());
        let (arbiter, mut rx) = arbiter_with_store(store);

        arbiter
            .handle(RecognitionPayload::Failure {
                error: PlateError {
                    message: "não encontrado".to_string(),
                    plate: "ZZZ9999".to_string(),
                },
            })
            .await;

        match rx.recv().await.unwrap() {
            RecognitionOutcome::NotFound { plate, message } => {
                assert_eq!(plate, "ZZZ9999");
                assert_eq!(message, "não encontrado");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_replayed_already_parked_is_idempotent() {
        // The same recognition event twice surfaces AlreadyParked both
        // times and never touches sessions
        let store = Arc::new(CollectionStore::new());
        store
            .mutate_sessions(|_| vec![open_session("5", "10")])
            .await;

        let (arbiter, mut rx) = arbiter_with_store(store.clone());
        let payload = RecognitionPayload::Matches(vec![vehicle("5", "ABC1234")]);

        arbiter.handle(payload.clone()).await;
        arbiter.handle(payload).await;

        for _ in 0..2 {
            assert!(matches!(
                rx.recv().await.unwrap(),
                RecognitionOutcome::AlreadyParked { .. }
            ));
        }
        assert_eq!(store.sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_match_list_is_not_found() {
        let store = Arc::new(CollectionStore::new());
        let (arbiter, _rx) = arbiter_with_store(store);

        let outcome = arbiter
            .classify(&RecognitionPayload::Matches(Vec::new()))
            .await;
        assert!(matches!(outcome, RecognitionOutcome::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_closed_session_does_not_block_confirm() {
        let store = Arc::new(CollectionStore::new());
        let mut closed = open_session("5", "10");
        closed.exited_at = Some(Utc::now());
        store.mutate_sessions(|_| vec![closed]).await;

        let (arbiter, _rx) = arbiter_with_store(store);
        let outcome = arbiter
            .classify(&RecognitionPayload::Matches(vec![vehicle("5", "ABC1234")]))
            .await;
        assert!(matches!(outcome, RecognitionOutcome::Confirm { .. }));
    }
}
