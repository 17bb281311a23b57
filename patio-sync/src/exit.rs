//! Exit session coordinator
//!
//! Closes the open session for an occupied spot. Unlike entry there is no
//! confirmation step — the release applies directly. The optimistic
//! `occupied = false` transform and a local exit stamp are applied
//! immediately; the close-session request is fired without blocking and a
//! failure is logged only, never rolled back. Credential rejection is the
//! exception and is escalated on the fatal-error channel.

use std::sync::Arc;

use chrono::Utc;
use patio_common::models::Spot;
use patio_common::{Error, Result};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::api::ParkingApi;
use crate::store::CollectionStore;

/// Payment amount used by the manual-release flow
const DEFAULT_AMOUNT_PAID: f64 = 0.0;

pub struct ExitSessionCoordinator {
    api: Arc<ParkingApi>,
    store: Arc<CollectionStore>,
    fatal_tx: broadcast::Sender<Error>,
}

impl ExitSessionCoordinator {
    pub fn new(
        api: Arc<ParkingApi>,
        store: Arc<CollectionStore>,
        fatal_tx: broadcast::Sender<Error>,
    ) -> Self {
        Self {
            api,
            store,
            fatal_tx,
        }
    }

    /// Release `spot` with the default (zero) payment amount
    pub async fn release(&self, spot: &Spot) -> Result<()> {
        self.release_with_amount(spot, DEFAULT_AMOUNT_PAID).await
    }

    /// Release `spot`, closing its open session with the given payment
    pub async fn release_with_amount(&self, spot: &Spot, amount_paid: f64) -> Result<()> {
        let Some(session) = self.store.open_session_for_spot(&spot.id).await else {
            return Err(Error::NotFound(format!(
                "no open session for spot {}",
                spot.number
            )));
        };

        // Optimistic release, visible immediately
        let spot_id = spot.id.clone();
        self.store
            .mutate_spots(move |spots| {
                spots
                    .into_iter()
                    .map(|mut s| {
                        if s.id == spot_id {
                            s.occupied = false;
                        }
                        s
                    })
                    .collect()
            })
            .await;

        // Stamp the local session so open-session views stop counting it
        // before the next snapshot; the server owns the real timestamp.
        let session_id = session.id.clone();
        let now = Utc::now();
        self.store
            .mutate_sessions(move |sessions| {
                sessions
                    .into_iter()
                    .map(|mut s| {
                        if s.id == session_id {
                            s.exited_at = Some(now);
                        }
                        s
                    })
                    .collect()
            })
            .await;

        // Fire-and-forget close; failure is logged, never rolled back.
        // Credential rejection alone escalates.
        let api = self.api.clone();
        let fatal_tx = self.fatal_tx.clone();
        let session_id = session.id.clone();
        tokio::spawn(async move {
            match api.close_session(&session_id, amount_paid).await {
                Ok(closed) => {
                    debug!(session_id = %closed.id, "exit session closed");
                }
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "close-session rejected; ending session");
                    let _ = fatal_tx.send(e);
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        session_id = %session_id,
                        "close-session request failed; local release left as-is"
                    );
                }
            }
        });

        Ok(())
    }
}
