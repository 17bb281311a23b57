//! Entry session coordinator
//!
//! Assigns a vehicle to a free spot, either from the arbiter's pending
//! recognition or from a manually searched vehicle. Follows the
//! mutation-then-sync contract: the local `occupied = true` transform is
//! applied immediately, the create-session request is fired without
//! blocking, and a request failure is logged only — there is no rollback
//! and no user-visible failure notice. The next full snapshot reconciles.
//! The one exception is credential rejection: a 403 is fatal at session
//! scope and is escalated on the fatal-error channel.

use std::sync::Arc;

use patio_common::models::{Spot, Vehicle};
use patio_common::{Error, Result};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::api::ParkingApi;
use crate::arbiter::RecognitionArbiter;
use crate::store::CollectionStore;

pub struct EntrySessionCoordinator {
    api: Arc<ParkingApi>,
    store: Arc<CollectionStore>,
    arbiter: Arc<RecognitionArbiter>,
    fatal_tx: broadcast::Sender<Error>,
}

impl EntrySessionCoordinator {
    pub fn new(
        api: Arc<ParkingApi>,
        store: Arc<CollectionStore>,
        arbiter: Arc<RecognitionArbiter>,
        fatal_tx: broadcast::Sender<Error>,
    ) -> Self {
        Self {
            api,
            store,
            arbiter,
            fatal_tx,
        }
    }

    /// Confirm entry of `vehicle` into `spot`
    ///
    /// Precondition: `spot.occupied` is false at the moment of confirmation;
    /// this is not re-validated against the server. Clears the
    /// pending-recognition state and dismisses the confirmation presentation
    /// whether or not the request later succeeds.
    pub async fn confirm(&self, spot: &Spot, vehicle: &Vehicle) -> Result<()> {
        if spot.occupied {
            return Err(Error::Conflict(format!(
                "spot {} is already occupied",
                spot.number
            )));
        }

        // Optimistic mutation first: occupancy is visible immediately,
        // independent of network latency.
        let spot_id = spot.id.clone();
        self.store
            .mutate_spots(move |spots| {
                spots
                    .into_iter()
                    .map(|mut s| {
                        if s.id == spot_id {
                            s.occupied = true;
                        }
                        s
                    })
                    .collect()
            })
            .await;

        // Fire-and-forget create; failure is logged, never rolled back.
        // Credential rejection alone escalates.
        let api = self.api.clone();
        let fatal_tx = self.fatal_tx.clone();
        let vehicle_id = vehicle.id.clone();
        let spot_id = spot.id.clone();
        tokio::spawn(async move {
            match api.create_session(&vehicle_id, &spot_id).await {
                Ok(session) => {
                    debug!(session_id = %session.id, spot_id = %spot_id, "entry session created");
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "create-session rejected; ending session");
                    let _ = fatal_tx.send(e);
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        vehicle_id = %vehicle_id,
                        spot_id = %spot_id,
                        "create-session request failed; local occupancy left as-is"
                    );
                }
            }
        });

        self.arbiter.clear_pending().await;
        Ok(())
    }

    /// Confirm entry of the arbiter's pending recognized vehicle into `spot`
    pub async fn confirm_pending(&self, spot: &Spot) -> Result<()> {
        let Some(vehicle) = self.arbiter.pending().await else {
            return Err(Error::NotFound(
                "no pending recognized vehicle".to_string(),
            ));
        };
        self.confirm(spot, &vehicle).await
    }

    /// Cancel the entry-confirmation presentation without creating a session
    pub async fn cancel(&self) {
        self.arbiter.clear_pending().await;
    }
}
