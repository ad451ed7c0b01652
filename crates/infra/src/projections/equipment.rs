//! Equipment registry projection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use siteops_equipment::{EquipmentEvent, EquipmentId, EquipmentStatus};
use siteops_events::EventEnvelope;
use siteops_projects::ProjectId;

use crate::read_model::ReadStore;

use super::ProjectionError;
use super::cursors::StreamCursors;

/// Queryable equipment read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentReadModel {
    pub equipment_id: EquipmentId,
    pub name: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub location: Option<String>,
    pub status: EquipmentStatus,
    pub allocated_to: Option<ProjectId>,
    pub last_maintenance: Option<NaiveDate>,
    pub next_maintenance: Option<NaiveDate>,
}

#[derive(Debug)]
pub struct EquipmentProjection<S>
where
    S: ReadStore<EquipmentId, EquipmentReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> EquipmentProjection<S>
where
    S: ReadStore<EquipmentId, EquipmentReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, equipment_id: &EquipmentId) -> Option<EquipmentReadModel> {
        self.store.get(equipment_id)
    }

    pub fn list(&self) -> Vec<EquipmentReadModel> {
        self.store.list()
    }

    pub fn available(&self) -> Vec<EquipmentReadModel> {
        self.store
            .list()
            .into_iter()
            .filter(|e| e.status == EquipmentStatus::Available)
            .collect()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_gated(aggregate_id, envelope.sequence_number(), || {
                let event: EquipmentEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                match event {
                    EquipmentEvent::EquipmentRegistered {
                        equipment_id,
                        name,
                        description,
                        quantity,
                        location,
                        next_maintenance,
                        ..
                    } => {
                        if equipment_id.0 != aggregate_id {
                            return Err(ProjectionError::StreamMismatch(
                                "event equipment_id does not match envelope aggregate_id"
                                    .to_string(),
                            ));
                        }
                        self.store.upsert(
                            equipment_id,
                            EquipmentReadModel {
                                equipment_id,
                                name,
                                description,
                                quantity,
                                location,
                                status: EquipmentStatus::Available,
                                allocated_to: None,
                                last_maintenance: None,
                                next_maintenance,
                            },
                        );
                    }
                    EquipmentEvent::EquipmentAllocated {
                        equipment_id,
                        project_id,
                        ..
                    } => {
                        if let Some(mut rm) = self.store.get(&equipment_id) {
                            rm.status = EquipmentStatus::Allocated;
                            rm.allocated_to = Some(project_id);
                            self.store.upsert(equipment_id, rm);
                        }
                    }
                    EquipmentEvent::EquipmentReturned { equipment_id, .. } => {
                        if let Some(mut rm) = self.store.get(&equipment_id) {
                            rm.status = EquipmentStatus::Available;
                            rm.allocated_to = None;
                            self.store.upsert(equipment_id, rm);
                        }
                    }
                    EquipmentEvent::MaintenanceStarted { equipment_id, .. } => {
                        if let Some(mut rm) = self.store.get(&equipment_id) {
                            rm.status = EquipmentStatus::UnderMaintenance;
                            self.store.upsert(equipment_id, rm);
                        }
                    }
                    EquipmentEvent::MaintenanceCompleted {
                        equipment_id,
                        performed_on,
                        next_maintenance,
                        ..
                    } => {
                        if let Some(mut rm) = self.store.get(&equipment_id) {
                            rm.status = EquipmentStatus::Available;
                            rm.last_maintenance = Some(performed_on);
                            rm.next_maintenance = next_maintenance;
                            self.store.upsert(equipment_id, rm);
                        }
                    }
                }

                Ok(())
            })
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
