//! orgsync Core Library
//!
//! Shared types for the org sync queue and engine.
//!
//! # Modules
//!
//! - [`ids`] - Identifiers (Cvr, ObjectUuid)
//! - [`types`] - Entity kinds and operation types
//! - [`registration`] - Registration payloads sent to the registry
//! - [`error`] - Error types (CoreError)

pub mod error;
pub mod ids;
pub mod registration;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use ids::{Cvr, ObjectUuid, ParseIdError};
pub use registration::{
    ContactPlace, OrgUnitRegistration, OrgUnitType, Person, Position, Registration,
    UserRegistration,
};
pub use types::{EntityKind, OperationType};
