//! Materials stock projection: current on-hand quantity, ledger listing, and
//! the low-stock query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use siteops_core::{Money, UserId};
use siteops_events::EventEnvelope;
use siteops_materials::{MaterialEvent, MaterialId, TransactionId, TransactionType};
use siteops_projects::ProjectId;
use siteops_vendors::VendorId;

use crate::read_model::ReadStore;

use super::ProjectionError;
use super::cursors::StreamCursors;

/// One ledger entry, kept for the audit-trail listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReadModel {
    pub transaction_id: TransactionId,
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub unit_price: Option<Money>,
    pub vendor_id: Option<VendorId>,
    pub project_id: Option<ProjectId>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Queryable material read model: current stock plus its full ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialReadModel {
    pub material_id: MaterialId,
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub quantity: i64,
    pub reorder_level: i64,
    pub transactions: Vec<TransactionReadModel>,
}

impl MaterialReadModel {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}

/// Materials stock projection.
///
/// Consumes published envelopes (JSON payloads) and maintains a read model.
/// Read models are disposable and rebuildable from the event stream.
#[derive(Debug)]
pub struct MaterialStockProjection<S>
where
    S: ReadStore<MaterialId, MaterialReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> MaterialStockProjection<S>
where
    S: ReadStore<MaterialId, MaterialReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// Query read model for one material.
    pub fn get(&self, material_id: &MaterialId) -> Option<MaterialReadModel> {
        self.store.get(material_id)
    }

    /// List all materials.
    pub fn list(&self) -> Vec<MaterialReadModel> {
        self.store.list()
    }

    /// Exactly the set `{m : m.quantity <= m.reorder_level}`, in no
    /// guaranteed order. Used for display/alerting, not automated reordering.
    pub fn low_stock(&self) -> Vec<MaterialReadModel> {
        self.store
            .list()
            .into_iter()
            .filter(MaterialReadModel::is_low_stock)
            .collect()
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Enforces monotonic sequence per aggregate stream
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_gated(aggregate_id, envelope.sequence_number(), || {
                let event: MaterialEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                let material_id = match &event {
                    MaterialEvent::MaterialCreated(e) => e.material_id,
                    MaterialEvent::MaterialDetailsUpdated(e) => e.material_id,
                    MaterialEvent::TransactionRecorded(e) => e.material_id,
                };
                if material_id.0 != aggregate_id {
                    return Err(ProjectionError::StreamMismatch(
                        "event material_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                match event {
                    MaterialEvent::MaterialCreated(e) => {
                        self.store.upsert(
                            e.material_id,
                            MaterialReadModel {
                                material_id: e.material_id,
                                name: e.name,
                                description: e.description,
                                unit: e.unit,
                                quantity: 0,
                                reorder_level: e.reorder_level,
                                transactions: Vec::new(),
                            },
                        );
                    }
                    MaterialEvent::MaterialDetailsUpdated(e) => {
                        if let Some(mut rm) = self.store.get(&e.material_id) {
                            rm.name = e.name;
                            rm.description = e.description;
                            rm.unit = e.unit;
                            rm.reorder_level = e.reorder_level;
                            self.store.upsert(e.material_id, rm);
                        }
                    }
                    MaterialEvent::TransactionRecorded(e) => {
                        let mut rm =
                            self.store
                                .get(&e.material_id)
                                .unwrap_or(MaterialReadModel {
                                    material_id: e.material_id,
                                    name: String::new(),
                                    description: None,
                                    unit: String::new(),
                                    quantity: 0,
                                    reorder_level: 0,
                                    transactions: Vec::new(),
                                });
                        rm.quantity += e.transaction_type.signed(e.quantity);
                        rm.transactions.push(TransactionReadModel {
                            transaction_id: e.transaction_id,
                            transaction_type: e.transaction_type,
                            quantity: e.quantity,
                            unit_price: e.unit_price,
                            vendor_id: e.vendor_id,
                            project_id: e.project_id,
                            reference_number: e.reference_number,
                            notes: e.notes,
                            recorded_by: e.recorded_by,
                            occurred_at: e.occurred_at,
                        });
                        self.store.upsert(e.material_id, rm);
                    }
                }

                Ok(())
            })
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.clear();
        self.store.clear();

        // Deterministic replay order: aggregate, then sequence.
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
    use uuid::Uuid;

    use siteops_core::AggregateId;
    use siteops_events::Event;
    use siteops_materials::material::{MaterialCreated, TransactionRecorded};

    use crate::read_model::InMemoryReadStore;

    type Projection = MaterialStockProjection<Arc<InMemoryReadStore<MaterialId, MaterialReadModel>>>;

    fn projection() -> Projection {
        MaterialStockProjection::new(Arc::new(InMemoryReadStore::new()))
    }

    fn envelope(material_id: MaterialId, sequence: u64, event: &MaterialEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            material_id.0,
            "materials.material",
            sequence,
            serde_json::to_value(event).unwrap(),
        )
    }

    fn created(material_id: MaterialId, reorder_level: i64) -> MaterialEvent {
        MaterialEvent::MaterialCreated(MaterialCreated {
            material_id,
            name: "Cement".to_string(),
            description: None,
            unit: "bags".to_string(),
            reorder_level,
            created_by: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn recorded(
        material_id: MaterialId,
        transaction_type: TransactionType,
        quantity: i64,
    ) -> MaterialEvent {
        MaterialEvent::TransactionRecorded(TransactionRecorded {
            material_id,
            transaction_id: TransactionId::new(AggregateId::new()),
            transaction_type,
            quantity,
            unit_price: None,
            vendor_id: None,
            project_id: None,
            reference_number: None,
            notes: None,
            recorded_by: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn stock_and_ledger_follow_the_stream() {
        let projection = projection();
        let material_id = MaterialId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(material_id, 1, &created(material_id, 10)))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                material_id,
                2,
                &recorded(material_id, TransactionType::Inflow, 50),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                material_id,
                3,
                &recorded(material_id, TransactionType::Outflow, 20),
            ))
            .unwrap();

        let rm = projection.get(&material_id).unwrap();
        assert_eq!(rm.quantity, 30);
        assert_eq!(rm.transactions.len(), 2);
        assert!(!rm.is_low_stock());
    }

    #[test]
    fn duplicate_delivery_is_ignored() {
        let projection = projection();
        let material_id = MaterialId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(material_id, 1, &created(material_id, 10)))
            .unwrap();

        let inflow = envelope(
            material_id,
            2,
            &recorded(material_id, TransactionType::Inflow, 5),
        );
        projection.apply_envelope(&inflow).unwrap();
        projection.apply_envelope(&inflow).unwrap();

        assert_eq!(projection.get(&material_id).unwrap().quantity, 5);
    }

    #[test]
    fn sequence_gaps_are_rejected() {
        let projection = projection();
        let material_id = MaterialId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(material_id, 1, &created(material_id, 10)))
            .unwrap();

        let err = projection
            .apply_envelope(&envelope(
                material_id,
                3,
                &recorded(material_id, TransactionType::Inflow, 5),
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::NonMonotonicSequence { last: 1, found: 3 }
        ));
    }

    #[test]
    fn low_stock_returns_exactly_the_at_or_below_threshold_set() {
        let projection = projection();

        let low = MaterialId::new(AggregateId::new());
        let at_level = MaterialId::new(AggregateId::new());
        let healthy = MaterialId::new(AggregateId::new());

        for (material_id, reorder, inflow) in
            [(low, 20, 15), (at_level, 20, 20), (healthy, 20, 21)]
        {
            projection
                .apply_envelope(&envelope(material_id, 1, &created(material_id, reorder)))
                .unwrap();
            projection
                .apply_envelope(&envelope(
                    material_id,
                    2,
                    &recorded(material_id, TransactionType::Inflow, inflow),
                ))
                .unwrap();
        }

        let low_stock: Vec<MaterialId> = projection
            .low_stock()
            .into_iter()
            .map(|m| m.material_id)
            .collect();
        assert_eq!(low_stock.len(), 2);
        assert!(low_stock.contains(&low));
        assert!(low_stock.contains(&at_level));
        assert!(!low_stock.contains(&healthy));
    }

    #[test]
    fn rebuild_from_scratch_replays_deterministically() {
        let projection = projection();
        let material_id = MaterialId::new(AggregateId::new());

        let envs = vec![
            envelope(material_id, 1, &created(material_id, 10)),
            envelope(
                material_id,
                2,
                &recorded(material_id, TransactionType::Inflow, 12),
            ),
        ];

        for env in &envs {
            projection.apply_envelope(env).unwrap();
        }
        projection.rebuild_from_scratch(envs).unwrap();

        let rm = projection.get(&material_id).unwrap();
        assert_eq!(rm.quantity, 12);
        assert_eq!(rm.transactions.len(), 1);
    }

    #[test]
    fn event_type_tags_are_stable() {
        let material_id = MaterialId::new(AggregateId::new());
        assert_eq!(
            created(material_id, 1).event_type(),
            "materials.material.created"
        );
        assert_eq!(
            recorded(material_id, TransactionType::Inflow, 1).event_type(),
            "materials.material.transaction_recorded"
        );
    }
}
