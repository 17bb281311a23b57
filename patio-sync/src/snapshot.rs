//! Bulk snapshot loading
//!
//! Fetch order matters: Vehicles and Spots are fetched and stored before
//! Sessions are requested, because session denormalization joins
//! `vehicleId`/`spotId` against the in-memory collections rather than
//! relying on server-side joins. Each fetch is independently guarded — one
//! collection failing is logged and recorded as a scoped error without
//! stopping the remaining fetches. The loading flag clears only after every
//! fetch has settled.

use std::sync::Arc;

use patio_common::Error;
use tracing::{info, warn};

use crate::api::ParkingApi;
use crate::store::{Collection, CollectionStore};

/// Outcome of one bulk load: which collections failed, and whether the
/// credential was rejected along the way
#[derive(Debug, Default)]
pub struct LoadReport {
    pub failed: Vec<(Collection, Error)>,
    pub auth_expired: bool,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, store_label: &str, collection: Collection, error: Error) {
        if error.is_fatal() {
            self.auth_expired = true;
        }
        warn!(collection = store_label, error = %error, "snapshot fetch failed");
        self.failed.push((collection, error));
    }
}

/// Performs the ordered bulk load of all five collections on session start
pub struct SnapshotLoader {
    api: Arc<ParkingApi>,
    store: Arc<CollectionStore>,
}

impl SnapshotLoader {
    pub fn new(api: Arc<ParkingApi>, store: Arc<CollectionStore>) -> Self {
        Self { api, store }
    }

    /// Fetch Students, Faculty, Vehicles, Spots, then Sessions
    ///
    /// Students and Faculty are filtered to active records on the way in.
    /// Partial failure is normal operation: the report lists what failed,
    /// and the loading flag is cleared in every case.
    pub async fn load_all(&self) -> LoadReport {
        self.store.set_loading(true).await;
        self.store.clear_load_errors().await;
        let mut report = LoadReport::default();

        match self.api.fetch_students().await {
            Ok(students) => {
                let active: Vec<_> = students.into_iter().filter(|s| s.active).collect();
                self.store.mutate_students(|_| active).await;
            }
            Err(e) => self.scoped_failure(&mut report, "alunos", Collection::Students, e).await,
        }

        match self.api.fetch_faculty().await {
            Ok(faculty) => {
                let active: Vec<_> = faculty.into_iter().filter(|f| f.active).collect();
                self.store.mutate_faculty(|_| active).await;
            }
            Err(e) => self.scoped_failure(&mut report, "docentes", Collection::Faculty, e).await,
        }

        match self.api.fetch_vehicles().await {
            Ok(vehicles) => self.store.mutate_vehicles(|_| vehicles).await,
            Err(e) => self.scoped_failure(&mut report, "veiculos", Collection::Vehicles, e).await,
        }

        match self.api.fetch_spots().await {
            Ok(spots) => self.store.mutate_spots(|_| spots).await,
            Err(e) => self.scoped_failure(&mut report, "vagas", Collection::Spots, e).await,
        }

        // Sessions last: their joins read the Vehicle/Spot collections
        // stored above
        match self.api.fetch_sessions().await {
            Ok(sessions) => self.store.mutate_sessions(|_| sessions).await,
            Err(e) => {
                self.scoped_failure(&mut report, "estacionamentos", Collection::Sessions, e)
                    .await
            }
        }

        self.store.set_loading(false).await;

        if report.is_complete() {
            let stats = self.store.occupancy_stats().await;
            info!(
                spots = stats.total_spots,
                vehicles = stats.vehicles,
                "snapshot load complete"
            );
        }
        report
    }

    async fn scoped_failure(
        &self,
        report: &mut LoadReport,
        label: &str,
        collection: Collection,
        error: Error,
    ) {
        self.store
            .record_load_error(format!("{label}: {error}"))
            .await;
        report.record(label, collection, error);
    }
}
