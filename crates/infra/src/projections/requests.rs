//! Material request projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use siteops_core::UserId;
use siteops_events::EventEnvelope;
use siteops_materials::{MaterialId, RequestEvent, RequestId, RequestStatus};
use siteops_projects::ProjectId;

use crate::read_model::ReadStore;

use super::ProjectionError;
use super::cursors::StreamCursors;

/// Queryable material request read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestReadModel {
    pub request_id: RequestId,
    pub material_id: MaterialId,
    pub project_id: ProjectId,
    pub quantity: i64,
    pub requested_by: UserId,
    pub notes: Option<String>,
    pub status: RequestStatus,
    pub approved_by: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct RequestsProjection<S>
where
    S: ReadStore<RequestId, RequestReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> RequestsProjection<S>
where
    S: ReadStore<RequestId, RequestReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, request_id: &RequestId) -> Option<RequestReadModel> {
        self.store.get(request_id)
    }

    pub fn list(&self) -> Vec<RequestReadModel> {
        self.store.list()
    }

    pub fn pending(&self) -> Vec<RequestReadModel> {
        self.store
            .list()
            .into_iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .collect()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_gated(aggregate_id, envelope.sequence_number(), || {
                let event: RequestEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                match event {
                    RequestEvent::RequestSubmitted {
                        request_id,
                        material_id,
                        project_id,
                        quantity,
                        requested_by,
                        notes,
                        occurred_at,
                    } => {
                        if request_id.0 != aggregate_id {
                            return Err(ProjectionError::StreamMismatch(
                                "event request_id does not match envelope aggregate_id"
                                    .to_string(),
                            ));
                        }
                        self.store.upsert(
                            request_id,
                            RequestReadModel {
                                request_id,
                                material_id,
                                project_id,
                                quantity,
                                requested_by,
                                notes,
                                status: RequestStatus::Pending,
                                approved_by: None,
                                decided_at: None,
                                created_at: occurred_at,
                            },
                        );
                    }
                    RequestEvent::RequestApproved {
                        request_id,
                        approver,
                        occurred_at,
                    } => {
                        if let Some(mut rm) = self.store.get(&request_id) {
                            rm.status = RequestStatus::Approved;
                            rm.approved_by = Some(approver);
                            rm.decided_at = Some(occurred_at);
                            self.store.upsert(request_id, rm);
                        }
                    }
                    RequestEvent::RequestRejected {
                        request_id,
                        approver,
                        occurred_at,
                    } => {
                        if let Some(mut rm) = self.store.get(&request_id) {
                            rm.status = RequestStatus::Rejected;
                            rm.approved_by = Some(approver);
                            rm.decided_at = Some(occurred_at);
                            self.store.upsert(request_id, rm);
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
