use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use siteops_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, UserId};
use siteops_events::Event;

/// Project identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub AggregateId);

impl ProjectId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Project status lifecycle.
///
/// Planning -> InProgress -> OnHold -> InProgress ... -> Completed, with
/// Cancelled reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Planning,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planning => "planning",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::OnHold => "on_hold",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a member holds on a project (mirrors the account roles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Admin,
    Engineer,
    Client,
    Vendor,
}

/// A user assigned to the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub user_id: UserId,
    pub role: ProjectRole,
    pub assigned_at: DateTime<Utc>,
}

/// Aggregate root: Project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    id: ProjectId,
    name: String,
    description: Option<String>,
    location: Option<String>,
    budget: Option<Money>,
    client_id: Option<UserId>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    status: ProjectStatus,
    members: Vec<ProjectMember>,
    version: u64,
    created: bool,
}

impl Project {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProjectId) -> Self {
        Self {
            id,
            name: String::new(),
            description: None,
            location: None,
            budget: None,
            client_id: None,
            start_date: None,
            end_date: None,
            status: ProjectStatus::Planning,
            members: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ProjectStatus {
        self.status
    }

    pub fn members(&self) -> &[ProjectMember] {
        &self.members
    }

    pub fn budget(&self) -> Option<Money> {
        self.budget
    }
}

impl AggregateRoot for Project {
    type Id = ProjectId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProject {
    pub project_id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub budget: Option<Money>,
    pub client_id: Option<UserId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartProject (Planning -> InProgress).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartProject {
    pub project_id: ProjectId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: HoldProject (InProgress -> OnHold).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldProject {
    pub project_id: ProjectId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResumeProject (OnHold -> InProgress).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeProject {
    pub project_id: ProjectId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteProject (InProgress -> Completed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteProject {
    pub project_id: ProjectId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelProject (any non-terminal state -> Cancelled).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelProject {
    pub project_id: ProjectId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignMember.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignMember {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub role: ProjectRole,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectCommand {
    CreateProject(CreateProject),
    StartProject(StartProject),
    HoldProject(HoldProject),
    ResumeProject(ResumeProject),
    CompleteProject(CompleteProject),
    CancelProject(CancelProject),
    AssignMember(AssignMember),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectEvent {
    ProjectCreated {
        project_id: ProjectId,
        name: String,
        description: Option<String>,
        location: Option<String>,
        budget: Option<Money>,
        client_id: Option<UserId>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        created_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    ProjectStarted {
        project_id: ProjectId,
        occurred_at: DateTime<Utc>,
    },
    ProjectPutOnHold {
        project_id: ProjectId,
        occurred_at: DateTime<Utc>,
    },
    ProjectResumed {
        project_id: ProjectId,
        occurred_at: DateTime<Utc>,
    },
    ProjectCompleted {
        project_id: ProjectId,
        occurred_at: DateTime<Utc>,
    },
    ProjectCancelled {
        project_id: ProjectId,
        occurred_at: DateTime<Utc>,
    },
    MemberAssigned {
        project_id: ProjectId,
        user_id: UserId,
        role: ProjectRole,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for ProjectEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProjectEvent::ProjectCreated { .. } => "projects.project.created",
            ProjectEvent::ProjectStarted { .. } => "projects.project.started",
            ProjectEvent::ProjectPutOnHold { .. } => "projects.project.put_on_hold",
            ProjectEvent::ProjectResumed { .. } => "projects.project.resumed",
            ProjectEvent::ProjectCompleted { .. } => "projects.project.completed",
            ProjectEvent::ProjectCancelled { .. } => "projects.project.cancelled",
            ProjectEvent::MemberAssigned { .. } => "projects.project.member_assigned",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProjectEvent::ProjectCreated { occurred_at, .. }
            | ProjectEvent::ProjectStarted { occurred_at, .. }
            | ProjectEvent::ProjectPutOnHold { occurred_at, .. }
            | ProjectEvent::ProjectResumed { occurred_at, .. }
            | ProjectEvent::ProjectCompleted { occurred_at, .. }
            | ProjectEvent::ProjectCancelled { occurred_at, .. }
            | ProjectEvent::MemberAssigned { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Project {
    type Command = ProjectCommand;
    type Event = ProjectEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
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
                self.id = *project_id;
                self.name = name.clone();
                self.description = description.clone();
                self.location = location.clone();
                self.budget = *budget;
                self.client_id = *client_id;
                self.start_date = *start_date;
                self.end_date = *end_date;
                self.status = ProjectStatus::Planning;
                self.members.clear();
                self.created = true;
            }
            ProjectEvent::ProjectStarted { .. } => {
                self.status = ProjectStatus::InProgress;
            }
            ProjectEvent::ProjectPutOnHold { .. } => {
                self.status = ProjectStatus::OnHold;
            }
            ProjectEvent::ProjectResumed { .. } => {
                self.status = ProjectStatus::InProgress;
            }
            ProjectEvent::ProjectCompleted { .. } => {
                self.status = ProjectStatus::Completed;
            }
            ProjectEvent::ProjectCancelled { .. } => {
                self.status = ProjectStatus::Cancelled;
            }
            ProjectEvent::MemberAssigned {
                user_id,
                role,
                occurred_at,
                ..
            } => {
                self.members.push(ProjectMember {
                    user_id: *user_id,
                    role: *role,
                    assigned_at: *occurred_at,
                });
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProjectCommand::CreateProject(cmd) => self.handle_create(cmd),
            ProjectCommand::StartProject(cmd) => self.handle_status_move(
                cmd.project_id,
                &[ProjectStatus::Planning],
                ProjectEvent::ProjectStarted {
                    project_id: cmd.project_id,
                    occurred_at: cmd.occurred_at,
                },
            ),
            ProjectCommand::HoldProject(cmd) => self.handle_status_move(
                cmd.project_id,
                &[ProjectStatus::InProgress],
                ProjectEvent::ProjectPutOnHold {
                    project_id: cmd.project_id,
                    occurred_at: cmd.occurred_at,
                },
            ),
            ProjectCommand::ResumeProject(cmd) => self.handle_status_move(
                cmd.project_id,
                &[ProjectStatus::OnHold],
                ProjectEvent::ProjectResumed {
                    project_id: cmd.project_id,
                    occurred_at: cmd.occurred_at,
                },
            ),
            ProjectCommand::CompleteProject(cmd) => self.handle_status_move(
                cmd.project_id,
                &[ProjectStatus::InProgress],
                ProjectEvent::ProjectCompleted {
                    project_id: cmd.project_id,
                    occurred_at: cmd.occurred_at,
                },
            ),
            ProjectCommand::CancelProject(cmd) => self.handle_status_move(
                cmd.project_id,
                &[
                    ProjectStatus::Planning,
                    ProjectStatus::InProgress,
                    ProjectStatus::OnHold,
                ],
                ProjectEvent::ProjectCancelled {
                    project_id: cmd.project_id,
                    occurred_at: cmd.occurred_at,
                },
            ),
            ProjectCommand::AssignMember(cmd) => self.handle_assign_member(cmd),
        }
    }
}

impl Project {
    fn ensure_project_id(&self, project_id: ProjectId) -> Result<(), DomainError> {
        if self.id != project_id {
            return Err(DomainError::invariant("project_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProject) -> Result<Vec<ProjectEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("project already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if let (Some(start), Some(end)) = (cmd.start_date, cmd.end_date) {
            if end < start {
                return Err(DomainError::validation("end_date cannot precede start_date"));
            }
        }
        if cmd.budget.is_some_and(|b| b.is_negative()) {
            return Err(DomainError::validation("budget cannot be negative"));
        }

        Ok(vec![ProjectEvent::ProjectCreated {
            project_id: cmd.project_id,
            name: cmd.name.clone(),
            description: cmd.description.clone(),
            location: cmd.location.clone(),
            budget: cmd.budget,
            client_id: cmd.client_id,
            start_date: cmd.start_date,
            end_date: cmd.end_date,
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        }])
    }

    /// Shared guard for all status moves: the target event is emitted only if
    /// the current status is one of `allowed_from`.
    fn handle_status_move(
        &self,
        project_id: ProjectId,
        allowed_from: &[ProjectStatus],
        event: ProjectEvent,
    ) -> Result<Vec<ProjectEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_project_id(project_id)?;

        if !allowed_from.contains(&self.status) {
            return Err(DomainError::invalid_transition(format!(
                "project is {}",
                self.status
            )));
        }

        Ok(vec![event])
    }

    fn handle_assign_member(&self, cmd: &AssignMember) -> Result<Vec<ProjectEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_project_id(cmd.project_id)?;

        if self.status.is_terminal() {
            return Err(DomainError::invalid_transition(format!(
                "project is {}",
                self.status
            )));
        }
        if self.members.iter().any(|m| m.user_id == cmd.user_id) {
            return Err(DomainError::conflict("user is already a project member"));
        }

        Ok(vec![ProjectEvent::MemberAssigned {
            project_id: cmd.project_id,
            user_id: cmd.user_id,
            role: cmd.role,
            occurred_at: cmd.occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_project_id() -> ProjectId {
        ProjectId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_project(project_id: ProjectId) -> Project {
        let mut project = Project::empty(project_id);
        let events = project
            .handle(&ProjectCommand::CreateProject(CreateProject {
                project_id,
                name: "Riverside Tower".to_string(),
                description: None,
                location: Some("Dock Road".to_string()),
                budget: Some(Money::from_minor(250_000_00)),
                client_id: None,
                start_date: None,
                end_date: None,
                created_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        project.apply(&events[0]);
        project
    }

    #[test]
    fn create_then_start_moves_to_in_progress() {
        let project_id = test_project_id();
        let mut project = created_project(project_id);
        assert_eq!(project.status(), ProjectStatus::Planning);

        let events = project
            .handle(&ProjectCommand::StartProject(StartProject {
                project_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        project.apply(&events[0]);
        assert_eq!(project.status(), ProjectStatus::InProgress);
    }

    #[test]
    fn cannot_complete_from_planning() {
        let project_id = test_project_id();
        let project = created_project(project_id);

        let err = project
            .handle(&ProjectCommand::CompleteProject(CompleteProject {
                project_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn hold_and_resume_round_trip() {
        let project_id = test_project_id();
        let mut project = created_project(project_id);

        for cmd in [
            ProjectCommand::StartProject(StartProject {
                project_id,
                occurred_at: test_time(),
            }),
            ProjectCommand::HoldProject(HoldProject {
                project_id,
                occurred_at: test_time(),
            }),
            ProjectCommand::ResumeProject(ResumeProject {
                project_id,
                occurred_at: test_time(),
            }),
        ] {
            let events = project.handle(&cmd).unwrap();
            project.apply(&events[0]);
        }

        assert_eq!(project.status(), ProjectStatus::InProgress);
    }

    #[test]
    fn cancelled_project_rejects_further_moves() {
        let project_id = test_project_id();
        let mut project = created_project(project_id);

        let events = project
            .handle(&ProjectCommand::CancelProject(CancelProject {
                project_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        project.apply(&events[0]);
        assert_eq!(project.status(), ProjectStatus::Cancelled);

        let err = project
            .handle(&ProjectCommand::StartProject(StartProject {
                project_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn duplicate_member_assignment_conflicts() {
        let project_id = test_project_id();
        let mut project = created_project(project_id);
        let user_id = UserId::new();

        let events = project
            .handle(&ProjectCommand::AssignMember(AssignMember {
                project_id,
                user_id,
                role: ProjectRole::Engineer,
                occurred_at: test_time(),
            }))
            .unwrap();
        project.apply(&events[0]);
        assert_eq!(project.members().len(), 1);

        let err = project
            .handle(&ProjectCommand::AssignMember(AssignMember {
                project_id,
                user_id,
                role: ProjectRole::Client,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let project_id = test_project_id();
        let project = Project::empty(project_id);

        let err = project
            .handle(&ProjectCommand::CreateProject(CreateProject {
                project_id,
                name: "Backwards".to_string(),
                description: None,
                location: None,
                budget: None,
                client_id: None,
                start_date: NaiveDate::from_ymd_opt(2025, 6, 1),
                end_date: NaiveDate::from_ymd_opt(2025, 5, 1),
                created_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
