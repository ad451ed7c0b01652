use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use siteops_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Priority, UserId};
use siteops_events::Event;

use crate::ProjectId;

/// Task identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub AggregateId);

impl TaskId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TaskId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Task status lifecycle: Todo -> InProgress -> Review -> Completed, with
/// reopen from Review back to InProgress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Review,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Completed => "completed",
        }
    }
}

impl core::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
    project_id: Option<ProjectId>,
    title: String,
    priority: Priority,
    due_date: Option<NaiveDate>,
    assigned_to: Option<UserId>,
    status: TaskStatus,
    completed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Task {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: TaskId) -> Self {
        Self {
            id,
            project_id: None,
            title: String::new(),
            priority: Priority::default(),
            due_date: None,
            assigned_to: None,
            status: TaskStatus::Todo,
            completed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TaskId {
        self.id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn assigned_to(&self) -> Option<UserId> {
        self.assigned_to
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

impl AggregateRoot for Task {
    type Id = TaskId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateTask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTask {
    pub task_id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub assigned_to: Option<UserId>,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignTask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignTask {
    pub task_id: TaskId,
    pub assignee: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartTask (Todo -> InProgress).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTask {
    pub task_id: TaskId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitTaskForReview (InProgress -> Review).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitTaskForReview {
    pub task_id: TaskId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteTask (Review -> Completed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteTask {
    pub task_id: TaskId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReopenTask (Review -> InProgress).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReopenTask {
    pub task_id: TaskId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskCommand {
    CreateTask(CreateTask),
    AssignTask(AssignTask),
    StartTask(StartTask),
    SubmitTaskForReview(SubmitTaskForReview),
    CompleteTask(CompleteTask),
    ReopenTask(ReopenTask),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskEvent {
    TaskCreated {
        task_id: TaskId,
        project_id: ProjectId,
        title: String,
        description: Option<String>,
        priority: Priority,
        due_date: Option<NaiveDate>,
        assigned_to: Option<UserId>,
        created_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    TaskAssigned {
        task_id: TaskId,
        assignee: UserId,
        occurred_at: DateTime<Utc>,
    },
    TaskStarted {
        task_id: TaskId,
        occurred_at: DateTime<Utc>,
    },
    TaskSubmittedForReview {
        task_id: TaskId,
        occurred_at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: TaskId,
        occurred_at: DateTime<Utc>,
    },
    TaskReopened {
        task_id: TaskId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for TaskEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TaskEvent::TaskCreated { .. } => "projects.task.created",
            TaskEvent::TaskAssigned { .. } => "projects.task.assigned",
            TaskEvent::TaskStarted { .. } => "projects.task.started",
            TaskEvent::TaskSubmittedForReview { .. } => "projects.task.submitted_for_review",
            TaskEvent::TaskCompleted { .. } => "projects.task.completed",
            TaskEvent::TaskReopened { .. } => "projects.task.reopened",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TaskEvent::TaskCreated { occurred_at, .. }
            | TaskEvent::TaskAssigned { occurred_at, .. }
            | TaskEvent::TaskStarted { occurred_at, .. }
            | TaskEvent::TaskSubmittedForReview { occurred_at, .. }
            | TaskEvent::TaskCompleted { occurred_at, .. }
            | TaskEvent::TaskReopened { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Task {
    type Command = TaskCommand;
    type Event = TaskEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TaskEvent::TaskCreated {
                task_id,
                project_id,
                title,
                priority,
                due_date,
                assigned_to,
                ..
            } => {
                self.id = *task_id;
                self.project_id = Some(*project_id);
                self.title = title.clone();
                self.priority = *priority;
                self.due_date = *due_date;
                self.assigned_to = *assigned_to;
                self.status = TaskStatus::Todo;
                self.created = true;
            }
            TaskEvent::TaskAssigned { assignee, .. } => {
                self.assigned_to = Some(*assignee);
            }
            TaskEvent::TaskStarted { .. } => {
                self.status = TaskStatus::InProgress;
            }
            TaskEvent::TaskSubmittedForReview { .. } => {
                self.status = TaskStatus::Review;
            }
            TaskEvent::TaskCompleted { occurred_at, .. } => {
                self.status = TaskStatus::Completed;
                self.completed_at = Some(*occurred_at);
            }
            TaskEvent::TaskReopened { .. } => {
                self.status = TaskStatus::InProgress;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TaskCommand::CreateTask(cmd) => self.handle_create(cmd),
            TaskCommand::AssignTask(cmd) => self.handle_assign(cmd),
            TaskCommand::StartTask(cmd) => self.handle_status_move(
                cmd.task_id,
                TaskStatus::Todo,
                TaskEvent::TaskStarted {
                    task_id: cmd.task_id,
                    occurred_at: cmd.occurred_at,
                },
            ),
            TaskCommand::SubmitTaskForReview(cmd) => self.handle_status_move(
                cmd.task_id,
                TaskStatus::InProgress,
                TaskEvent::TaskSubmittedForReview {
                    task_id: cmd.task_id,
                    occurred_at: cmd.occurred_at,
                },
            ),
            TaskCommand::CompleteTask(cmd) => self.handle_status_move(
                cmd.task_id,
                TaskStatus::Review,
                TaskEvent::TaskCompleted {
                    task_id: cmd.task_id,
                    occurred_at: cmd.occurred_at,
                },
            ),
            TaskCommand::ReopenTask(cmd) => self.handle_status_move(
                cmd.task_id,
                TaskStatus::Review,
                TaskEvent::TaskReopened {
                    task_id: cmd.task_id,
                    occurred_at: cmd.occurred_at,
                },
            ),
        }
    }
}

impl Task {
    fn ensure_task_id(&self, task_id: TaskId) -> Result<(), DomainError> {
        if self.id != task_id {
            return Err(DomainError::invariant("task_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateTask) -> Result<Vec<TaskEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("task already exists"));
        }
        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }

        Ok(vec![TaskEvent::TaskCreated {
            task_id: cmd.task_id,
            project_id: cmd.project_id,
            title: cmd.title.clone(),
            description: cmd.description.clone(),
            priority: cmd.priority,
            due_date: cmd.due_date,
            assigned_to: cmd.assigned_to,
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_assign(&self, cmd: &AssignTask) -> Result<Vec<TaskEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_task_id(cmd.task_id)?;

        if self.status == TaskStatus::Completed {
            return Err(DomainError::invalid_transition("task is completed"));
        }

        Ok(vec![TaskEvent::TaskAssigned {
            task_id: cmd.task_id,
            assignee: cmd.assignee,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_status_move(
        &self,
        task_id: TaskId,
        required: TaskStatus,
        event: TaskEvent,
    ) -> Result<Vec<TaskEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_task_id(task_id)?;

        if self.status != required {
            return Err(DomainError::invalid_transition(format!(
                "task is {}",
                self.status
            )));
        }

        Ok(vec![event])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_task_id() -> TaskId {
        TaskId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_task(task_id: TaskId) -> Task {
        let mut task = Task::empty(task_id);
        let events = task
            .handle(&TaskCommand::CreateTask(CreateTask {
                task_id,
                project_id: ProjectId::new(AggregateId::new()),
                title: "Pour footing F3".to_string(),
                description: None,
                priority: Priority::High,
                due_date: None,
                assigned_to: None,
                created_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        task.apply(&events[0]);
        task
    }

    #[test]
    fn full_lifecycle_reaches_completed() {
        let task_id = test_task_id();
        let mut task = created_task(task_id);

        for cmd in [
            TaskCommand::StartTask(StartTask {
                task_id,
                occurred_at: test_time(),
            }),
            TaskCommand::SubmitTaskForReview(SubmitTaskForReview {
                task_id,
                occurred_at: test_time(),
            }),
            TaskCommand::CompleteTask(CompleteTask {
                task_id,
                occurred_at: test_time(),
            }),
        ] {
            let events = task.handle(&cmd).unwrap();
            task.apply(&events[0]);
        }

        assert_eq!(task.status(), TaskStatus::Completed);
        assert!(task.completed_at().is_some());
    }

    #[test]
    fn cannot_complete_without_review() {
        let task_id = test_task_id();
        let mut task = created_task(task_id);

        let events = task
            .handle(&TaskCommand::StartTask(StartTask {
                task_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        task.apply(&events[0]);

        let err = task
            .handle(&TaskCommand::CompleteTask(CompleteTask {
                task_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn reopen_from_review_returns_to_in_progress() {
        let task_id = test_task_id();
        let mut task = created_task(task_id);

        for cmd in [
            TaskCommand::StartTask(StartTask {
                task_id,
                occurred_at: test_time(),
            }),
            TaskCommand::SubmitTaskForReview(SubmitTaskForReview {
                task_id,
                occurred_at: test_time(),
            }),
            TaskCommand::ReopenTask(ReopenTask {
                task_id,
                occurred_at: test_time(),
            }),
        ] {
            let events = task.handle(&cmd).unwrap();
            task.apply(&events[0]);
        }

        assert_eq!(task.status(), TaskStatus::InProgress);
    }

    #[test]
    fn assignment_is_blocked_once_completed() {
        let task_id = test_task_id();
        let mut task = created_task(task_id);

        for cmd in [
            TaskCommand::StartTask(StartTask {
                task_id,
                occurred_at: test_time(),
            }),
            TaskCommand::SubmitTaskForReview(SubmitTaskForReview {
                task_id,
                occurred_at: test_time(),
            }),
            TaskCommand::CompleteTask(CompleteTask {
                task_id,
                occurred_at: test_time(),
            }),
        ] {
            let events = task.handle(&cmd).unwrap();
            task.apply(&events[0]);
        }

        let err = task
            .handle(&TaskCommand::AssignTask(AssignTask {
                task_id,
                assignee: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }
}
