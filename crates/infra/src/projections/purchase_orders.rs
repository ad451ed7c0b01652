//! Purchase order projection.
//!
//! The `total_minor` field is maintained from line items as they are applied;
//! it is never taken from user input.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use siteops_core::{Money, UserId};
use siteops_events::EventEnvelope;
use siteops_materials::MaterialId;
use siteops_procurement::{PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderStatus};
use siteops_projects::ProjectId;
use siteops_vendors::VendorId;

use crate::read_model::ReadStore;

use super::ProjectionError;
use super::cursors::StreamCursors;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineReadModel {
    pub line_no: u32,
    pub material_id: MaterialId,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Queryable purchase order read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderReadModel {
    pub order_id: PurchaseOrderId,
    pub po_number: String,
    pub vendor_id: VendorId,
    pub project_id: Option<ProjectId>,
    pub order_date: NaiveDate,
    pub expected_delivery: Option<NaiveDate>,
    pub actual_delivery: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: PurchaseOrderStatus,
    pub lines: Vec<OrderLineReadModel>,
    pub total: Money,
    pub created_by: UserId,
}

#[derive(Debug)]
pub struct PurchaseOrdersProjection<S>
where
    S: ReadStore<PurchaseOrderId, PurchaseOrderReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> PurchaseOrdersProjection<S>
where
    S: ReadStore<PurchaseOrderId, PurchaseOrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, order_id: &PurchaseOrderId) -> Option<PurchaseOrderReadModel> {
        self.store.get(order_id)
    }

    pub fn list(&self) -> Vec<PurchaseOrderReadModel> {
        self.store.list()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_gated(aggregate_id, envelope.sequence_number(), || {
                let event: PurchaseOrderEvent =
                    serde_json::from_value(envelope.payload().clone())
                        .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                match event {
                    PurchaseOrderEvent::PurchaseOrderOpened {
                        order_id,
                        po_number,
                        vendor_id,
                        project_id,
                        order_date,
                        expected_delivery,
                        notes,
                        created_by,
                        ..
                    } => {
                        if order_id.0 != aggregate_id {
                            return Err(ProjectionError::StreamMismatch(
                                "event order_id does not match envelope aggregate_id".to_string(),
                            ));
                        }
                        self.store.upsert(
                            order_id,
                            PurchaseOrderReadModel {
                                order_id,
                                po_number,
                                vendor_id,
                                project_id,
                                order_date,
                                expected_delivery,
                                actual_delivery: None,
                                notes,
                                status: PurchaseOrderStatus::Draft,
                                lines: Vec::new(),
                                total: Money::ZERO,
                                created_by,
                            },
                        );
                    }
                    PurchaseOrderEvent::OrderLineAdded {
                        order_id,
                        line_no,
                        material_id,
                        quantity,
                        unit_price,
                        ..
                    } => {
                        if let Some(mut rm) = self.store.get(&order_id) {
                            rm.lines.push(OrderLineReadModel {
                                line_no,
                                material_id,
                                quantity,
                                unit_price,
                            });
                            // The aggregate validated the line total, so the
                            // running sum stays representable.
                            rm.total = rm
                                .total
                                .checked_add(
                                    unit_price.checked_mul(quantity).unwrap_or(Money::ZERO),
                                )
                                .unwrap_or(rm.total);
                            self.store.upsert(order_id, rm);
                        }
                    }
                    PurchaseOrderEvent::PurchaseOrderSubmitted { order_id, .. } => {
                        self.set_status(order_id, PurchaseOrderStatus::Submitted);
                    }
                    PurchaseOrderEvent::GoodsReceived(e) => {
                        if let Some(mut rm) = self.store.get(&e.order_id) {
                            rm.status = PurchaseOrderStatus::Received;
                            rm.actual_delivery = Some(e.delivered_on);
                            self.store.upsert(e.order_id, rm);
                        }
                    }
                    PurchaseOrderEvent::PurchaseOrderClosed { order_id, .. } => {
                        self.set_status(order_id, PurchaseOrderStatus::Closed);
                    }
                    PurchaseOrderEvent::PurchaseOrderCancelled { order_id, .. } => {
                        self.set_status(order_id, PurchaseOrderStatus::Cancelled);
                    }
                }

                Ok(())
            })
    }

    fn set_status(&self, order_id: PurchaseOrderId, status: PurchaseOrderStatus) {
        if let Some(mut rm) = self.store.get(&order_id) {
            rm.status = status;
            self.store.upsert(order_id, rm);
        }
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.clear();
        self.store.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use chrono::Utc;
    use uuid::Uuid;

    use siteops_core::AggregateId;

    use crate::read_model::InMemoryReadStore;

    #[test]
    fn running_total_tracks_added_lines() {
        let projection = PurchaseOrdersProjection::new(Arc::new(InMemoryReadStore::<
            PurchaseOrderId,
            PurchaseOrderReadModel,
        >::new()));
        let order_id = PurchaseOrderId::new(AggregateId::new());

        let opened = PurchaseOrderEvent::PurchaseOrderOpened {
            order_id,
            po_number: "PO-9".to_string(),
            vendor_id: VendorId::new(AggregateId::new()),
            project_id: None,
            order_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            expected_delivery: None,
            notes: None,
            created_by: UserId::new(),
            occurred_at: Utc::now(),
        };
        let line = PurchaseOrderEvent::OrderLineAdded {
            order_id,
            line_no: 1,
            material_id: MaterialId::new(AggregateId::new()),
            quantity: 10,
            unit_price: Money::from_minor(250),
            occurred_at: Utc::now(),
        };

        for (sequence, event) in [(1u64, &opened), (2, &line)] {
            projection
                .apply_envelope(&EventEnvelope::new(
                    Uuid::now_v7(),
                    order_id.0,
                    "procurement.order",
                    sequence,
                    serde_json::to_value(event).unwrap(),
                ))
                .unwrap();
        }

        let rm = projection.get(&order_id).unwrap();
        assert_eq!(rm.total, Money::from_minor(2500));
        assert_eq!(rm.lines.len(), 1);
        assert_eq!(rm.status, PurchaseOrderStatus::Draft);
    }
}
