//! # Patio Common Library
//!
//! Shared code for the Patio parking client including:
//! - Data model and wire types (backend field names are Portuguese)
//! - Push event types (PushEvent enum)
//! - Plate format validation
//! - Configuration resolution
//! - Error types

pub mod config;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};
