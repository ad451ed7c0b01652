//! `siteops-materials` — the materials inventory ledger.
//!
//! The on-hand quantity of a [`material::Material`] is derived entirely from
//! its append-only stream of [`material::TransactionRecorded`] events, so the
//! "append transaction, then adjust quantity" pair the dashboard used to issue
//! as two unguarded writes is a single atomic, version-checked append here.
//!
//! [`request::MaterialRequest`] is the advisory approval workflow: a request
//! never moves inventory by itself.

pub mod error;
pub mod material;
pub mod request;

pub use error::{MaterialError, RequestError};
pub use material::{
    CreateMaterial, Material, MaterialCommand, MaterialEvent, MaterialId, RecordTransaction,
    TransactionId, TransactionType, UpdateMaterialDetails,
};
pub use request::{
    DecideRequest, MaterialRequest, RequestCommand, RequestDecision, RequestEvent, RequestId,
    RequestStatus, SubmitRequest,
};
