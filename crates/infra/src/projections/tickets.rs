//! Ticket and NCR projections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use siteops_core::{Priority, UserId};
use siteops_events::EventEnvelope;
use siteops_issues::{NcrEvent, NcrId, NcrStatus, TicketEvent, TicketId, TicketStatus};
use siteops_projects::ProjectId;

use crate::read_model::ReadStore;

use super::ProjectionError;
use super::cursors::StreamCursors;

/// Queryable ticket read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketReadModel {
    pub ticket_id: TicketId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub raised_by: UserId,
    pub assigned_to: Option<UserId>,
    pub status: TicketStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct TicketsProjection<S>
where
    S: ReadStore<TicketId, TicketReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> TicketsProjection<S>
where
    S: ReadStore<TicketId, TicketReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, ticket_id: &TicketId) -> Option<TicketReadModel> {
        self.store.get(ticket_id)
    }

    pub fn list(&self) -> Vec<TicketReadModel> {
        self.store.list()
    }

    pub fn open(&self) -> Vec<TicketReadModel> {
        self.store
            .list()
            .into_iter()
            .filter(|t| t.status != TicketStatus::Closed)
            .collect()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_gated(aggregate_id, envelope.sequence_number(), || {
                let event: TicketEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                match event {
                    TicketEvent::TicketOpened {
                        ticket_id,
                        project_id,
                        title,
                        description,
                        priority,
                        raised_by,
                        occurred_at,
                    } => {
                        if ticket_id.0 != aggregate_id {
                            return Err(ProjectionError::StreamMismatch(
                                "event ticket_id does not match envelope aggregate_id"
                                    .to_string(),
                            ));
                        }
                        self.store.upsert(
                            ticket_id,
                            TicketReadModel {
                                ticket_id,
                                project_id,
                                title,
                                description,
                                priority,
                                raised_by,
                                assigned_to: None,
                                status: TicketStatus::Open,
                                updated_at: occurred_at,
                            },
                        );
                    }
                    TicketEvent::TicketAssigned {
                        ticket_id,
                        assignee,
                        occurred_at,
                    } => {
                        if let Some(mut rm) = self.store.get(&ticket_id) {
                            rm.assigned_to = Some(assignee);
                            rm.updated_at = occurred_at;
                            self.store.upsert(ticket_id, rm);
                        }
                    }
                    TicketEvent::TicketStarted {
                        ticket_id,
                        occurred_at,
                    } => {
                        self.set_status(ticket_id, TicketStatus::InProgress, occurred_at);
                    }
                    TicketEvent::TicketResolved {
                        ticket_id,
                        occurred_at,
                    } => {
                        self.set_status(ticket_id, TicketStatus::Resolved, occurred_at);
                    }
                    TicketEvent::TicketClosed {
                        ticket_id,
                        occurred_at,
                    } => {
                        self.set_status(ticket_id, TicketStatus::Closed, occurred_at);
                    }
                    TicketEvent::TicketReopened {
                        ticket_id,
                        occurred_at,
                    } => {
                        self.set_status(ticket_id, TicketStatus::Open, occurred_at);
                    }
                }

                Ok(())
            })
    }

    fn set_status(&self, ticket_id: TicketId, status: TicketStatus, at: DateTime<Utc>) {
        if let Some(mut rm) = self.store.get(&ticket_id) {
            rm.status = status;
            rm.updated_at = at;
            self.store.upsert(ticket_id, rm);
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

/// Queryable NCR read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NcrReadModel {
    pub ncr_id: NcrId,
    pub ncr_number: String,
    pub project_id: ProjectId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub severity: Priority,
    pub raised_by: UserId,
    pub assigned_to: Option<UserId>,
    pub status: NcrStatus,
    pub root_cause: Option<String>,
    pub corrective_action: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct NcrsProjection<S>
where
    S: ReadStore<NcrId, NcrReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> NcrsProjection<S>
where
    S: ReadStore<NcrId, NcrReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, ncr_id: &NcrId) -> Option<NcrReadModel> {
        self.store.get(ncr_id)
    }

    pub fn list(&self) -> Vec<NcrReadModel> {
        self.store.list()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_gated(aggregate_id, envelope.sequence_number(), || {
                let event: NcrEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                match event {
                    NcrEvent::NcrRaised {
                        ncr_id,
                        ncr_number,
                        project_id,
                        title,
                        description,
                        category,
                        severity,
                        raised_by,
                        ..
                    } => {
                        if ncr_id.0 != aggregate_id {
                            return Err(ProjectionError::StreamMismatch(
                                "event ncr_id does not match envelope aggregate_id".to_string(),
                            ));
                        }
                        self.store.upsert(
                            ncr_id,
                            NcrReadModel {
                                ncr_id,
                                ncr_number,
                                project_id,
                                title,
                                description,
                                category,
                                severity,
                                raised_by,
                                assigned_to: None,
                                status: NcrStatus::Open,
                                root_cause: None,
                                corrective_action: None,
                                closed_at: None,
                            },
                        );
                    }
                    NcrEvent::NcrAssigned {
                        ncr_id, assignee, ..
                    } => {
                        if let Some(mut rm) = self.store.get(&ncr_id) {
                            rm.assigned_to = Some(assignee);
                            self.store.upsert(ncr_id, rm);
                        }
                    }
                    NcrEvent::InvestigationStarted { ncr_id, .. } => {
                        if let Some(mut rm) = self.store.get(&ncr_id) {
                            rm.status = NcrStatus::Investigating;
                            self.store.upsert(ncr_id, rm);
                        }
                    }
                    NcrEvent::NcrResolved {
                        ncr_id,
                        root_cause,
                        corrective_action,
                        ..
                    } => {
                        if let Some(mut rm) = self.store.get(&ncr_id) {
                            rm.status = NcrStatus::Resolved;
                            rm.root_cause = Some(root_cause);
                            rm.corrective_action = Some(corrective_action);
                            self.store.upsert(ncr_id, rm);
                        }
                    }
                    NcrEvent::NcrClosed {
                        ncr_id,
                        occurred_at,
                    } => {
                        if let Some(mut rm) = self.store.get(&ncr_id) {
                            rm.status = NcrStatus::Closed;
                            rm.closed_at = Some(occurred_at);
                            self.store.upsert(ncr_id, rm);
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
