//! Project directory and task board projections.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use siteops_core::{Money, Priority, UserId};
use siteops_events::EventEnvelope;
use siteops_projects::{
    ProjectEvent, ProjectId, ProjectMember, ProjectStatus, TaskEvent, TaskId, TaskStatus,
};

use crate::read_model::ReadStore;

use super::ProjectionError;
use super::cursors::StreamCursors;

/// Queryable project read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReadModel {
    pub project_id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub budget: Option<Money>,
    pub client_id: Option<UserId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: ProjectStatus,
    pub members: Vec<ProjectMember>,
}

#[derive(Debug)]
pub struct ProjectDirectoryProjection<S>
where
    S: ReadStore<ProjectId, ProjectReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> ProjectDirectoryProjection<S>
where
    S: ReadStore<ProjectId, ProjectReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, project_id: &ProjectId) -> Option<ProjectReadModel> {
        self.store.get(project_id)
    }

    pub fn list(&self) -> Vec<ProjectReadModel> {
        self.store.list()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_gated(aggregate_id, envelope.sequence_number(), || {
                let event: ProjectEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                match event {
                    ProjectEvent::ProjectCreated {
                        project_id,
                        name,
                        description,
                        location,
                        budget,
                        client_id,
                        start_date,
                        end_date,
                        ..
                    } => {
                        if project_id.0 != aggregate_id {
                            return Err(ProjectionError::StreamMismatch(
                                "event project_id does not match envelope aggregate_id"
                                    .to_string(),
                            ));
                        }
                        self.store.upsert(
                            project_id,
                            ProjectReadModel {
                                project_id,
                                name,
                                description,
                                location,
                                budget,
                                client_id,
                                start_date,
                                end_date,
                                status: ProjectStatus::Planning,
                                members: Vec::new(),
                            },
                        );
                    }
                    ProjectEvent::ProjectStarted { project_id, .. } => {
                        self.set_status(project_id, ProjectStatus::InProgress);
                    }
                    ProjectEvent::ProjectPutOnHold { project_id, .. } => {
                        self.set_status(project_id, ProjectStatus::OnHold);
                    }
                    ProjectEvent::ProjectResumed { project_id, .. } => {
                        self.set_status(project_id, ProjectStatus::InProgress);
                    }
                    ProjectEvent::ProjectCompleted { project_id, .. } => {
                        self.set_status(project_id, ProjectStatus::Completed);
                    }
                    ProjectEvent::ProjectCancelled { project_id, .. } => {
                        self.set_status(project_id, ProjectStatus::Cancelled);
                    }
                    ProjectEvent::MemberAssigned {
                        project_id,
                        user_id,
                        role,
                        occurred_at,
                    } => {
                        if let Some(mut rm) = self.store.get(&project_id) {
                            rm.members.push(ProjectMember {
                                user_id,
                                role,
                                assigned_at: occurred_at,
                            });
                            self.store.upsert(project_id, rm);
                        }
                    }
                }

                Ok(())
            })
    }

    fn set_status(&self, project_id: ProjectId, status: ProjectStatus) {
        if let Some(mut rm) = self.store.get(&project_id) {
            rm.status = status;
            self.store.upsert(project_id, rm);
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

/// Queryable task read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReadModel {
    pub task_id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub assigned_to: Option<UserId>,
    pub status: TaskStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct TasksProjection<S>
where
    S: ReadStore<TaskId, TaskReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> TasksProjection<S>
where
    S: ReadStore<TaskId, TaskReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, task_id: &TaskId) -> Option<TaskReadModel> {
        self.store.get(task_id)
    }

    pub fn list(&self) -> Vec<TaskReadModel> {
        self.store.list()
    }

    pub fn list_for_project(&self, project_id: ProjectId) -> Vec<TaskReadModel> {
        self.store
            .list()
            .into_iter()
            .filter(|t| t.project_id == project_id)
            .collect()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();

        self.cursors
            .apply_gated(aggregate_id, envelope.sequence_number(), || {
                let event: TaskEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

                match event {
                    TaskEvent::TaskCreated {
                        task_id,
                        project_id,
                        title,
                        description,
                        priority,
                        due_date,
                        assigned_to,
                        ..
                    } => {
                        if task_id.0 != aggregate_id {
                            return Err(ProjectionError::StreamMismatch(
                                "event task_id does not match envelope aggregate_id".to_string(),
                            ));
                        }
                        self.store.upsert(
                            task_id,
                            TaskReadModel {
                                task_id,
                                project_id,
                                title,
                                description,
                                priority,
                                due_date,
                                assigned_to,
                                status: TaskStatus::Todo,
                                completed_at: None,
                            },
                        );
                    }
                    TaskEvent::TaskAssigned {
                        task_id, assignee, ..
                    } => {
                        if let Some(mut rm) = self.store.get(&task_id) {
                            rm.assigned_to = Some(assignee);
                            self.store.upsert(task_id, rm);
                        }
                    }
                    TaskEvent::TaskStarted { task_id, .. } => {
                        self.set_status(task_id, TaskStatus::InProgress, None);
                    }
                    TaskEvent::TaskSubmittedForReview { task_id, .. } => {
                        self.set_status(task_id, TaskStatus::Review, None);
                    }
                    TaskEvent::TaskCompleted {
                        task_id,
                        occurred_at,
                    } => {
                        self.set_status(task_id, TaskStatus::Completed, Some(occurred_at));
                    }
                    TaskEvent::TaskReopened { task_id, .. } => {
                        self.set_status(task_id, TaskStatus::InProgress, None);
                    }
                }

                Ok(())
            })
    }

    fn set_status(&self, task_id: TaskId, status: TaskStatus, completed_at: Option<DateTime<Utc>>) {
        if let Some(mut rm) = self.store.get(&task_id) {
            rm.status = status;
            if completed_at.is_some() {
                rm.completed_at = completed_at;
            }
            self.store.upsert(task_id, rm);
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
