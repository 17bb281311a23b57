//! Shared collection store
//!
//! Owns the five in-memory collections (Spots, Vehicles, Students, Faculty,
//! Sessions) behind one mutation API: each collection exposes a get-all
//! clone and a `mutate_*` operation taking a pure transform of the previous
//! collection. There is no locking protocol beyond the store's own interior
//! locks — the latest committed write wins, with no versioning or
//! compare-and-swap. Subscribers are notified of every commit and re-derive
//! their views from the new snapshot.

use patio_common::models::{Faculty, Session, Spot, SpotType, Student, Vehicle};
use tokio::sync::{broadcast, RwLock};

/// Names the collection a change notification refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Spots,
    Vehicles,
    Students,
    Faculty,
    Sessions,
}

/// Occupancy and entity counts derived from the current snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OccupancyStats {
    pub total_spots: usize,
    pub free_spots: usize,
    pub occupied_spots: usize,
    pub vehicles: usize,
    pub students: usize,
    pub faculty: usize,
}

/// Shared state accessible by every coordinator for the lifetime of the
/// authenticated session; discarded on sign-out
pub struct CollectionStore {
    spots: RwLock<Vec<Spot>>,
    vehicles: RwLock<Vec<Vehicle>>,
    students: RwLock<Vec<Student>>,
    faculty: RwLock<Vec<Faculty>>,
    sessions: RwLock<Vec<Session>>,

    /// True from the start of a snapshot load until every fetch has settled
    loading: RwLock<bool>,
    /// Scoped messages from per-collection load failures, for the UI banner
    load_errors: RwLock<Vec<String>>,

    /// Change broadcaster; send errors are ignored (no subscribers is OK)
    change_tx: broadcast::Sender<Collection>,
}

impl CollectionStore {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(64);
        Self {
            spots: RwLock::new(Vec::new()),
            vehicles: RwLock::new(Vec::new()),
            students: RwLock::new(Vec::new()),
            faculty: RwLock::new(Vec::new()),
            sessions: RwLock::new(Vec::new()),
            loading: RwLock::new(true),
            load_errors: RwLock::new(Vec::new()),
            change_tx,
        }
    }

    /// Subscribe to change notifications for all collections
    pub fn subscribe(&self) -> broadcast::Receiver<Collection> {
        self.change_tx.subscribe()
    }

    fn notify(&self, collection: Collection) {
        let _ = self.change_tx.send(collection);
    }

    // --- get-all / mutate pairs -------------------------------------------

    pub async fn spots(&self) -> Vec<Spot> {
        self.spots.read().await.clone()
    }

    pub async fn mutate_spots<F>(&self, transform: F)
    where
        F: FnOnce(Vec<Spot>) -> Vec<Spot>,
    {
        let mut guard = self.spots.write().await;
        let previous = std::mem::take(&mut *guard);
        *guard = transform(previous);
        drop(guard);
        self.notify(Collection::Spots);
    }

    pub async fn vehicles(&self) -> Vec<Vehicle> {
        self.vehicles.read().await.clone()
    }

    pub async fn mutate_vehicles<F>(&self, transform: F)
    where
        F: FnOnce(Vec<Vehicle>) -> Vec<Vehicle>,
    {
        let mut guard = self.vehicles.write().await;
        let previous = std::mem::take(&mut *guard);
        *guard = transform(previous);
        drop(guard);
        self.notify(Collection::Vehicles);
    }

    pub async fn students(&self) -> Vec<Student> {
        self.students.read().await.clone()
    }

    pub async fn mutate_students<F>(&self, transform: F)
    where
        F: FnOnce(Vec<Student>) -> Vec<Student>,
    {
        let mut guard = self.students.write().await;
        let previous = std::mem::take(&mut *guard);
        *guard = transform(previous);
        drop(guard);
        self.notify(Collection::Students);
    }

    pub async fn faculty(&self) -> Vec<Faculty> {
        self.faculty.read().await.clone()
    }

    pub async fn mutate_faculty<F>(&self, transform: F)
    where
        F: FnOnce(Vec<Faculty>) -> Vec<Faculty>,
    {
        let mut guard = self.faculty.write().await;
        let previous = std::mem::take(&mut *guard);
        *guard = transform(previous);
        drop(guard);
        self.notify(Collection::Faculty);
    }

    pub async fn sessions(&self) -> Vec<Session> {
        self.sessions.read().await.clone()
    }

    pub async fn mutate_sessions<F>(&self, transform: F)
    where
        F: FnOnce(Vec<Session>) -> Vec<Session>,
    {
        let mut guard = self.sessions.write().await;
        let previous = std::mem::take(&mut *guard);
        *guard = transform(previous);
        drop(guard);
        self.notify(Collection::Sessions);
    }

    // --- loading flag and scoped load errors ------------------------------

    pub async fn is_loading(&self) -> bool {
        *self.loading.read().await
    }

    pub async fn set_loading(&self, loading: bool) {
        *self.loading.write().await = loading;
    }

    pub async fn record_load_error(&self, message: String) {
        self.load_errors.write().await.push(message);
    }

    pub async fn clear_load_errors(&self) {
        self.load_errors.write().await.clear();
    }

    pub async fn load_errors(&self) -> Vec<String> {
        self.load_errors.read().await.clone()
    }

    // --- derived views ----------------------------------------------------

    pub async fn spot_by_id(&self, spot_id: &str) -> Option<Spot> {
        self.spots.read().await.iter().find(|s| s.id == spot_id).cloned()
    }

    pub async fn vehicle_by_id(&self, vehicle_id: &str) -> Option<Vehicle> {
        self.vehicles
            .read()
            .await
            .iter()
            .find(|v| v.id == vehicle_id)
            .cloned()
    }

    /// Spots currently free, unfiltered
    pub async fn free_spots(&self) -> Vec<Spot> {
        self.free_spots_filtered(None, None).await
    }

    /// Spots currently free, optionally narrowed by sector and/or type
    pub async fn free_spots_filtered(
        &self,
        sector: Option<&str>,
        spot_type: Option<SpotType>,
    ) -> Vec<Spot> {
        self.spots
            .read()
            .await
            .iter()
            .filter(|s| !s.occupied)
            .filter(|s| sector.map_or(true, |sec| s.sector == sec))
            .filter(|s| spot_type.map_or(true, |t| s.spot_type == t))
            .cloned()
            .collect()
    }

    /// Case-insensitive substring search over plate and model, for the
    /// manual occupy-spot flow
    pub async fn search_vehicles(&self, query: &str) -> Vec<Vehicle> {
        let needle = query.to_lowercase();
        self.vehicles
            .read()
            .await
            .iter()
            .filter(|v| {
                v.plate.to_lowercase().contains(&needle)
                    || v.model.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    /// Sessions with no exit timestamp
    pub async fn open_sessions(&self) -> Vec<Session> {
        self.sessions
            .read()
            .await
            .iter()
            .filter(|s| s.is_open())
            .cloned()
            .collect()
    }

    /// The open session referencing this vehicle, if any
    ///
    /// Point read against the local Sessions collection; may be stale with
    /// respect to the server while a snapshot refresh is in flight.
    pub async fn open_session_for_vehicle(&self, vehicle_id: &str) -> Option<Session> {
        self.sessions
            .read()
            .await
            .iter()
            .find(|s| s.is_open() && s.vehicle_id == vehicle_id)
            .cloned()
    }

    /// The open session referencing this spot, if any
    pub async fn open_session_for_spot(&self, spot_id: &str) -> Option<Session> {
        self.sessions
            .read()
            .await
            .iter()
            .find(|s| s.is_open() && s.spot_id == spot_id)
            .cloned()
    }

    /// Sessions with `vehicle`/`spot` attached by joining `vehicleId` /
    /// `spotId` against the current Vehicle/Spot collections
    ///
    /// This is the client-side denormalization the screens read; the server
    /// is not relied on for the joined objects.
    ///
    /// Each collection is cloned out one at a time — two collection locks
    /// are never held at once, and there is no cross-collection atomicity.
    pub async fn sessions_view(&self) -> Vec<Session> {
        let vehicles = self.vehicles().await;
        let spots = self.spots().await;
        let sessions = self.sessions().await;
        sessions
            .into_iter()
            .map(|mut joined| {
                joined.vehicle = vehicles.iter().find(|v| v.id == joined.vehicle_id).cloned();
                joined.spot = spots.iter().find(|s| s.id == joined.spot_id).cloned();
                joined
            })
            .collect()
    }

    /// Dashboard counters derived from the current snapshot
    ///
    /// Reads each collection independently, one lock at a time.
    pub async fn occupancy_stats(&self) -> OccupancyStats {
        let spots = self.spots().await;
        let occupied_spots = spots.iter().filter(|s| s.occupied).count();
        let vehicles = self.vehicles.read().await.len();
        let students = self.students.read().await.len();
        let faculty = self.faculty.read().await.len();
        OccupancyStats {
            total_spots: spots.len(),
            free_spots: spots.len() - occupied_spots,
            occupied_spots,
            vehicles,
            students,
            faculty,
        }
    }
}

impl Default for CollectionStore {
    fn default() -> Self {
        Self::new()
    }
}
