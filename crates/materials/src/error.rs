//! Error taxonomy for the materials ledger.
//!
//! The ledger is the one part of the system with precisely named failures, so
//! it carries its own enums instead of the shared [`DomainError`]; both map
//! into it for dispatch/transport.

use thiserror::Error;

use siteops_core::DomainError;

use crate::request::RequestStatus;

/// Failures from [`crate::material::Material`] command handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MaterialError {
    #[error("material not found")]
    MaterialNotFound,

    #[error("material already exists")]
    AlreadyExists,

    /// Transaction quantities must be strictly positive.
    #[error("invalid quantity: {0} (must be > 0)")]
    InvalidQuantity(i64),

    /// An outflow would drive the on-hand quantity below zero. Nothing is
    /// appended; the ledger and quantity are untouched.
    #[error("insufficient stock: {requested} requested, {on_hand} on hand")]
    InsufficientStock { on_hand: i64, requested: i64 },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("material_id mismatch")]
    IdMismatch,
}

impl From<MaterialError> for DomainError {
    fn from(value: MaterialError) -> Self {
        match value {
            MaterialError::MaterialNotFound => DomainError::NotFound,
            MaterialError::AlreadyExists => DomainError::conflict("material already exists"),
            e @ MaterialError::InvalidQuantity(_) => DomainError::validation(e.to_string()),
            e @ MaterialError::InsufficientStock { .. } => DomainError::invariant(e.to_string()),
            MaterialError::Validation(msg) => DomainError::Validation(msg),
            e @ MaterialError::IdMismatch => DomainError::invariant(e.to_string()),
        }
    }
}

/// Failures from [`crate::request::MaterialRequest`] command handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("material request not found")]
    RequestNotFound,

    #[error("material request already exists")]
    AlreadyExists,

    #[error("invalid quantity: {0} (must be > 0)")]
    InvalidQuantity(i64),

    /// A request is decided at most once; any move away from `pending` on an
    /// already-decided request is rejected.
    #[error("invalid transition: request is already {status}")]
    InvalidTransition { status: RequestStatus },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("request_id mismatch")]
    IdMismatch,
}

impl From<RequestError> for DomainError {
    fn from(value: RequestError) -> Self {
        match value {
            RequestError::RequestNotFound => DomainError::NotFound,
            RequestError::AlreadyExists => DomainError::conflict("material request already exists"),
            e @ RequestError::InvalidQuantity(_) => DomainError::validation(e.to_string()),
            RequestError::InvalidTransition { status } => {
                DomainError::invalid_transition(format!("request is already {status}"))
            }
            RequestError::Validation(msg) => DomainError::Validation(msg),
            e @ RequestError::IdMismatch => DomainError::invariant(e.to_string()),
        }
    }
}
