//! Data model for the parking client
//!
//! Wire types match the backend's JSON field names (Portuguese); Rust-side
//! names follow the domain glossary: Spot (vaga), Vehicle (veículo),
//! Session (registro/estacionamento).
//!
//! Ids are opaque strings end to end — the backend emits string ids and the
//! client never generates entity ids itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

fn default_true() -> bool {
    true
}

/// Physical parking space category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpotType {
    #[serde(rename = "Comum")]
    Common,
    #[serde(rename = "Prioritária")]
    Priority,
    #[serde(rename = "Docente")]
    Faculty,
}

impl SpotType {
    /// Wire label as the backend spells it
    pub fn label(&self) -> &'static str {
        match self {
            SpotType::Common => "Comum",
            SpotType::Priority => "Prioritária",
            SpotType::Faculty => "Docente",
        }
    }
}

/// A physical parking space record
///
/// `occupied` is client-maintained best-effort: it should equal "an open
/// session references this spot", but that is only reconciled by the next
/// full snapshot, never enforced atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spot {
    pub id: String,
    #[serde(rename = "numero")]
    pub number: String,
    #[serde(rename = "setor")]
    pub sector: String,
    #[serde(rename = "tipo")]
    pub spot_type: SpotType,
    #[serde(rename = "ocupada")]
    pub occupied: bool,
    /// Denormalized linked vehicle, when the backend attaches one
    #[serde(rename = "veiculo", default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<Vehicle>,
}

/// A registered vehicle, owned by at most one student or faculty member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    #[serde(rename = "placa")]
    pub plate: String,
    #[serde(rename = "modelo")]
    pub model: String,
    #[serde(rename = "cor")]
    pub color: String,
    #[serde(rename = "aluno", default, skip_serializing_if = "Option::is_none")]
    pub student: Option<Box<Student>>,
    #[serde(rename = "docente", default, skip_serializing_if = "Option::is_none")]
    pub faculty: Option<Box<Faculty>>,
    #[serde(rename = "ativo", default = "default_true")]
    pub active: bool,
}

/// Owner of a vehicle, resolved from the denormalized references
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Owner<'a> {
    Student(&'a Student),
    Faculty(&'a Faculty),
    None,
}

impl Vehicle {
    /// Resolve the owner reference (exactly one of student/faculty, or none)
    pub fn owner(&self) -> Owner<'_> {
        if let Some(student) = &self.student {
            Owner::Student(student)
        } else if let Some(faculty) = &self.faculty {
            Owner::Faculty(faculty)
        } else {
            Owner::None
        }
    }

    /// Owner display name, when an owner is attached
    pub fn owner_name(&self) -> Option<&str> {
        match self.owner() {
            Owner::Student(s) => Some(s.name.as_str()),
            Owner::Faculty(f) => Some(f.name.as_str()),
            Owner::None => None,
        }
    }
}

/// A student record (external CRUD owns its lifecycle)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "matricula")]
    pub registration: String,
    #[serde(rename = "turno", default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<String>,
    #[serde(rename = "veiculos", default)]
    pub vehicles: Vec<Vehicle>,
    #[serde(rename = "telefone", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "ativo", default = "default_true")]
    pub active: bool,
}

/// A faculty record (external CRUD owns its lifecycle)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faculty {
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "matricula")]
    pub registration: String,
    #[serde(rename = "departamento")]
    pub department: String,
    #[serde(rename = "veiculos", default)]
    pub vehicles: Vec<Vehicle>,
    #[serde(rename = "telefone", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "ativo", default = "default_true")]
    pub active: bool,
}

/// One parking episode with entry/exit timestamps
///
/// The `vehicle`/`spot` objects are client-side denormalization, joined
/// against the in-memory Vehicle/Spot collections at read time — the server
/// does not guarantee them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(rename = "data_entrada")]
    pub entered_at: DateTime<Utc>,
    #[serde(rename = "data_saida")]
    pub exited_at: Option<DateTime<Utc>>,
    #[serde(rename = "veiculoId")]
    pub vehicle_id: String,
    #[serde(rename = "vagaId")]
    pub spot_id: String,
    #[serde(rename = "veiculo", default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<Vehicle>,
    #[serde(rename = "vaga", default, skip_serializing_if = "Option::is_none")]
    pub spot: Option<Spot>,
}

impl Session {
    /// A session is open while it has no exit timestamp
    pub fn is_open(&self) -> bool {
        self.exited_at.is_none()
    }
}

/// Validate the 7-character plate format: 3 letters, 1 digit,
/// 1 alphanumeric, 2 digits (e.g. "ABC1D23", "ABC1234")
pub fn validate_plate(plate: &str) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidPlate {
        plate: plate.to_string(),
        reason: reason.to_string(),
    };

    let chars: Vec<char> = plate.chars().collect();
    if chars.len() != 7 {
        return Err(invalid("must be exactly 7 characters"));
    }
    if !chars[..3].iter().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid("positions 1-3 must be letters"));
    }
    if !chars[3].is_ascii_digit() {
        return Err(invalid("position 4 must be a digit"));
    }
    if !chars[4].is_ascii_alphanumeric() {
        return Err(invalid("position 5 must be a letter or digit"));
    }
    if !chars[5..].iter().all(|c| c.is_ascii_digit()) {
        return Err(invalid("positions 6-7 must be digits"));
    }
    Ok(())
}
