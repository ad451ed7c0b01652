//! Projection implementations (read model builders).
//!
//! Projections consume published envelopes and build query-optimized read
//! models. All projections are:
//! - **Rebuildable**: can be reconstructed from the event stream
//! - **Idempotent**: safe for at-least-once delivery (sequence cursors)

pub(crate) mod cursors;

pub mod equipment;
pub mod material_stock;
pub mod projects;
pub mod purchase_orders;
pub mod requests;
pub mod tickets;
pub mod vendors;

use thiserror::Error;

/// Shared failure type for projection envelope application.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("envelope does not match its stream: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

pub use equipment::{EquipmentProjection, EquipmentReadModel};
pub use material_stock::{MaterialReadModel, MaterialStockProjection, TransactionReadModel};
pub use projects::{
    ProjectDirectoryProjection, ProjectReadModel, TaskReadModel, TasksProjection,
};
pub use purchase_orders::{OrderLineReadModel, PurchaseOrderReadModel, PurchaseOrdersProjection};
pub use requests::{RequestReadModel, RequestsProjection};
pub use tickets::{NcrReadModel, NcrsProjection, TicketReadModel, TicketsProjection};
pub use vendors::{VendorDirectoryProjection, VendorReadModel};
