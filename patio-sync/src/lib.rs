//! patio-sync — real-time occupancy-synchronization engine
//!
//! Keeps an in-memory view of parking spots, vehicles, and active parking
//! sessions consistent across three inputs:
//! - bulk snapshot loads from the request/response API ([`snapshot`])
//! - push-delivered recognition and session events ([`channel`])
//! - optimistic local mutations from the entry/exit workflows
//!   ([`entry`], [`exit`])
//!
//! All reads and writes go through the [`store::CollectionStore`]; screens
//! derive their views from its snapshots. Admin CRUD, authentication forms,
//! and layout are external collaborators and not part of this crate.

pub mod api;
pub mod arbiter;
pub mod channel;
pub mod engine;
pub mod entry;
pub mod exit;
pub mod snapshot;
pub mod store;

pub use engine::Engine;
