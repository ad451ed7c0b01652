//! Procurement -> materials integration.
//!
//! Receiving a purchase order emits `GoodsReceived` with its line items; this
//! handler turns each line into an inflow transaction on the materials ledger
//! (vendor, project, unit price, and the PO number as the reference). That is
//! the reconciliation between orders and stock: received goods always show up
//! in the transaction ledger, priced.
//!
//! The handler is fed published envelopes (at-least-once), so it keeps a
//! sequence cursor per order stream and skips replays.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;

use siteops_core::AggregateId;
use siteops_events::{EventBus, EventEnvelope};
use siteops_materials::{
    Material, MaterialCommand, MaterialId, RecordTransaction, TransactionId, TransactionType,
};
use siteops_procurement::PurchaseOrderEvent;

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

/// Aggregate type tag this handler reacts to.
const PURCHASE_ORDER_AGGREGATE: &str = "procurement.order";

pub struct GoodsReceiptHandler<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    cursors: Mutex<HashMap<AggregateId, u64>>,
}

impl<S, B> GoodsReceiptHandler<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>) -> Self {
        Self {
            dispatcher,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    /// Apply a published envelope. Non-procurement envelopes and events other
    /// than `GoodsReceived` are ignored.
    ///
    /// Failures to record an inflow for one line are logged and do not block
    /// the remaining lines; the event store keeps the `GoodsReceived` fact, so
    /// an operator can reconcile from the ledger.
    pub async fn handle_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), DispatchError> {
        if envelope.aggregate_type() != PURCHASE_ORDER_AGGREGATE {
            return Ok(());
        }

        // Cursor check: skip replays of an already-processed envelope.
        {
            let mut cursors = match self.cursors.lock() {
                Ok(c) => c,
                Err(_) => return Ok(()),
            };
            let last = *cursors.get(&envelope.aggregate_id()).unwrap_or(&0);
            if envelope.sequence_number() <= last {
                return Ok(());
            }
            cursors.insert(envelope.aggregate_id(), envelope.sequence_number());
        }

        let event: PurchaseOrderEvent = match serde_json::from_value(envelope.payload().clone()) {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(%err, "skipping undecodable procurement envelope");
                return Ok(());
            }
        };

        let PurchaseOrderEvent::GoodsReceived(receipt) = event else {
            return Ok(());
        };

        for line in &receipt.lines {
            let command = MaterialCommand::RecordTransaction(RecordTransaction {
                material_id: line.material_id,
                transaction_id: TransactionId::new(AggregateId::new()),
                transaction_type: TransactionType::Inflow,
                quantity: line.quantity,
                unit_price: Some(line.unit_price),
                vendor_id: Some(receipt.vendor_id),
                project_id: receipt.project_id,
                reference_number: Some(receipt.po_number.clone()),
                notes: None,
                recorded_by: receipt.received_by,
                occurred_at: receipt.occurred_at,
            });

            let result = self
                .dispatcher
                .dispatch_with_retry::<Material>(
                    line.material_id.0,
                    "materials.material",
                    command,
                    |id| Material::empty(MaterialId::new(id)),
                )
                .await;

            if let Err(err) = result {
                tracing::error!(
                    material_id = %line.material_id,
                    po_number = %receipt.po_number,
                    ?err,
                    "failed to record inflow for received goods"
                );
            }
        }

        Ok(())
    }
}
