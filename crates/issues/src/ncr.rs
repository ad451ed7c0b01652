use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siteops_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Priority, UserId};
use siteops_events::Event;
use siteops_projects::ProjectId;

/// Non-conformance report identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NcrId(pub AggregateId);

impl NcrId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for NcrId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// NCR status lifecycle: Open -> Investigating -> Resolved -> Closed.
///
/// Resolution requires a root cause and a corrective action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NcrStatus {
    #[default]
    Open,
    Investigating,
    Resolved,
    Closed,
}

impl NcrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NcrStatus::Open => "open",
            NcrStatus::Investigating => "investigating",
            NcrStatus::Resolved => "resolved",
            NcrStatus::Closed => "closed",
        }
    }
}

impl core::fmt::Display for NcrStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Ncr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ncr {
    id: NcrId,
    ncr_number: String,
    project_id: Option<ProjectId>,
    severity: Priority,
    assigned_to: Option<UserId>,
    status: NcrStatus,
    root_cause: Option<String>,
    corrective_action: Option<String>,
    closed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Ncr {
    pub fn empty(id: NcrId) -> Self {
        Self {
            id,
            ncr_number: String::new(),
            project_id: None,
            severity: Priority::default(),
            assigned_to: None,
            status: NcrStatus::Open,
            root_cause: None,
            corrective_action: None,
            closed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> NcrId {
        self.id
    }

    pub fn ncr_number(&self) -> &str {
        &self.ncr_number
    }

    pub fn status(&self) -> NcrStatus {
        self.status
    }

    pub fn root_cause(&self) -> Option<&str> {
        self.root_cause.as_deref()
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }
}

impl AggregateRoot for Ncr {
    type Id = NcrId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RaiseNcr.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaiseNcr {
    pub ncr_id: NcrId,
    pub ncr_number: String,
    pub project_id: ProjectId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub severity: Priority,
    pub raised_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignNcr.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignNcr {
    pub ncr_id: NcrId,
    pub assignee: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartInvestigation (Open -> Investigating).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartInvestigation {
    pub ncr_id: NcrId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResolveNcr (Investigating -> Resolved, requires root cause and
/// corrective action).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveNcr {
    pub ncr_id: NcrId,
    pub root_cause: String,
    pub corrective_action: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseNcr (Resolved -> Closed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseNcr {
    pub ncr_id: NcrId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NcrCommand {
    RaiseNcr(RaiseNcr),
    AssignNcr(AssignNcr),
    StartInvestigation(StartInvestigation),
    ResolveNcr(ResolveNcr),
    CloseNcr(CloseNcr),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NcrEvent {
    NcrRaised {
        ncr_id: NcrId,
        ncr_number: String,
        project_id: ProjectId,
        title: String,
        description: String,
        category: String,
        severity: Priority,
        raised_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    NcrAssigned {
        ncr_id: NcrId,
        assignee: UserId,
        occurred_at: DateTime<Utc>,
    },
    InvestigationStarted {
        ncr_id: NcrId,
        occurred_at: DateTime<Utc>,
    },
    NcrResolved {
        ncr_id: NcrId,
        root_cause: String,
        corrective_action: String,
        occurred_at: DateTime<Utc>,
    },
    NcrClosed {
        ncr_id: NcrId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for NcrEvent {
    fn event_type(&self) -> &'static str {
        match self {
            NcrEvent::NcrRaised { .. } => "issues.ncr.raised",
            NcrEvent::NcrAssigned { .. } => "issues.ncr.assigned",
            NcrEvent::InvestigationStarted { .. } => "issues.ncr.investigation_started",
            NcrEvent::NcrResolved { .. } => "issues.ncr.resolved",
            NcrEvent::NcrClosed { .. } => "issues.ncr.closed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            NcrEvent::NcrRaised { occurred_at, .. }
            | NcrEvent::NcrAssigned { occurred_at, .. }
            | NcrEvent::InvestigationStarted { occurred_at, .. }
            | NcrEvent::NcrResolved { occurred_at, .. }
            | NcrEvent::NcrClosed { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Ncr {
    type Command = NcrCommand;
    type Event = NcrEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            NcrEvent::NcrRaised {
                ncr_id,
                ncr_number,
                project_id,
                severity,
                ..
            } => {
                self.id = *ncr_id;
                self.ncr_number = ncr_number.clone();
                self.project_id = Some(*project_id);
                self.severity = *severity;
                self.status = NcrStatus::Open;
                self.created = true;
            }
            NcrEvent::NcrAssigned { assignee, .. } => {
                self.assigned_to = Some(*assignee);
            }
            NcrEvent::InvestigationStarted { .. } => {
                self.status = NcrStatus::Investigating;
            }
            NcrEvent::NcrResolved {
                root_cause,
                corrective_action,
                ..
            } => {
                self.status = NcrStatus::Resolved;
                self.root_cause = Some(root_cause.clone());
                self.corrective_action = Some(corrective_action.clone());
            }
            NcrEvent::NcrClosed { occurred_at, .. } => {
                self.status = NcrStatus::Closed;
                self.closed_at = Some(*occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            NcrCommand::RaiseNcr(cmd) => self.handle_raise(cmd),
            NcrCommand::AssignNcr(cmd) => self.handle_assign(cmd),
            NcrCommand::StartInvestigation(cmd) => self.handle_start(cmd),
            NcrCommand::ResolveNcr(cmd) => self.handle_resolve(cmd),
            NcrCommand::CloseNcr(cmd) => self.handle_close(cmd),
        }
    }
}

impl Ncr {
    fn ensure_ncr_id(&self, ncr_id: NcrId) -> Result<(), DomainError> {
        if self.id != ncr_id {
            return Err(DomainError::invariant("ncr_id mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self, ncr_id: NcrId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_ncr_id(ncr_id)
    }

    fn handle_raise(&self, cmd: &RaiseNcr) -> Result<Vec<NcrEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("ncr already exists"));
        }
        if cmd.ncr_number.trim().is_empty() {
            return Err(DomainError::validation("ncr_number cannot be empty"));
        }
        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if cmd.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }

        Ok(vec![NcrEvent::NcrRaised {
            ncr_id: cmd.ncr_id,
            ncr_number: cmd.ncr_number.clone(),
            project_id: cmd.project_id,
            title: cmd.title.clone(),
            description: cmd.description.clone(),
            category: cmd.category.clone(),
            severity: cmd.severity,
            raised_by: cmd.raised_by,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_assign(&self, cmd: &AssignNcr) -> Result<Vec<NcrEvent>, DomainError> {
        self.ensure_created(cmd.ncr_id)?;

        if self.status == NcrStatus::Closed {
            return Err(DomainError::invalid_transition("ncr is closed"));
        }

        Ok(vec![NcrEvent::NcrAssigned {
            ncr_id: cmd.ncr_id,
            assignee: cmd.assignee,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_start(&self, cmd: &StartInvestigation) -> Result<Vec<NcrEvent>, DomainError> {
        self.ensure_created(cmd.ncr_id)?;

        if self.status != NcrStatus::Open {
            return Err(DomainError::invalid_transition(format!(
                "ncr is {}",
                self.status
            )));
        }

        Ok(vec![NcrEvent::InvestigationStarted {
            ncr_id: cmd.ncr_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_resolve(&self, cmd: &ResolveNcr) -> Result<Vec<NcrEvent>, DomainError> {
        self.ensure_created(cmd.ncr_id)?;

        if self.status != NcrStatus::Investigating {
            return Err(DomainError::invalid_transition(format!(
                "ncr is {}",
                self.status
            )));
        }
        if cmd.root_cause.trim().is_empty() {
            return Err(DomainError::validation("root_cause cannot be empty"));
        }
        if cmd.corrective_action.trim().is_empty() {
            return Err(DomainError::validation("corrective_action cannot be empty"));
        }

        Ok(vec![NcrEvent::NcrResolved {
            ncr_id: cmd.ncr_id,
            root_cause: cmd.root_cause.clone(),
            corrective_action: cmd.corrective_action.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_close(&self, cmd: &CloseNcr) -> Result<Vec<NcrEvent>, DomainError> {
        self.ensure_created(cmd.ncr_id)?;

        if self.status != NcrStatus::Resolved {
            return Err(DomainError::invalid_transition(format!(
                "ncr is {}",
                self.status
            )));
        }

        Ok(vec![NcrEvent::NcrClosed {
            ncr_id: cmd.ncr_id,
            occurred_at: cmd.occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ncr_id() -> NcrId {
        NcrId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn raised_ncr(ncr_id: NcrId) -> Ncr {
        let mut ncr = Ncr::empty(ncr_id);
        let events = ncr
            .handle(&NcrCommand::RaiseNcr(RaiseNcr {
                ncr_id,
                ncr_number: "NCR-2025-007".to_string(),
                project_id: ProjectId::new(AggregateId::new()),
                title: "Slab thickness below drawing".to_string(),
                description: "Measured 140mm against specified 150mm on grid C2.".to_string(),
                category: "structural".to_string(),
                severity: Priority::High,
                raised_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        ncr.apply(&events[0]);
        ncr
    }

    #[test]
    fn resolution_requires_investigation_first() {
        let ncr_id = test_ncr_id();
        let ncr = raised_ncr(ncr_id);

        let err = ncr
            .handle(&NcrCommand::ResolveNcr(ResolveNcr {
                ncr_id,
                root_cause: "formwork deflection".to_string(),
                corrective_action: "re-pour topping".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn resolve_without_root_cause_is_rejected() {
        let ncr_id = test_ncr_id();
        let mut ncr = raised_ncr(ncr_id);

        let events = ncr
            .handle(&NcrCommand::StartInvestigation(StartInvestigation {
                ncr_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        ncr.apply(&events[0]);

        let err = ncr
            .handle(&NcrCommand::ResolveNcr(ResolveNcr {
                ncr_id,
                root_cause: " ".to_string(),
                corrective_action: "re-pour topping".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn full_lifecycle_stamps_close_time() {
        let ncr_id = test_ncr_id();
        let mut ncr = raised_ncr(ncr_id);

        for cmd in [
            NcrCommand::StartInvestigation(StartInvestigation {
                ncr_id,
                occurred_at: test_time(),
            }),
            NcrCommand::ResolveNcr(ResolveNcr {
                ncr_id,
                root_cause: "formwork deflection".to_string(),
                corrective_action: "re-pour topping; shore spans < 2m".to_string(),
                occurred_at: test_time(),
            }),
            NcrCommand::CloseNcr(CloseNcr {
                ncr_id,
                occurred_at: test_time(),
            }),
        ] {
            let events = ncr.handle(&cmd).unwrap();
            ncr.apply(&events[0]);
        }

        assert_eq!(ncr.status(), NcrStatus::Closed);
        assert!(ncr.closed_at().is_some());
        assert_eq!(ncr.root_cause(), Some("formwork deflection"));
    }

    #[test]
    fn closed_ncr_is_terminal() {
        let ncr_id = test_ncr_id();
        let mut ncr = raised_ncr(ncr_id);

        for cmd in [
            NcrCommand::StartInvestigation(StartInvestigation {
                ncr_id,
                occurred_at: test_time(),
            }),
            NcrCommand::ResolveNcr(ResolveNcr {
                ncr_id,
                root_cause: "x".to_string(),
                corrective_action: "y".to_string(),
                occurred_at: test_time(),
            }),
            NcrCommand::CloseNcr(CloseNcr {
                ncr_id,
                occurred_at: test_time(),
            }),
        ] {
            let events = ncr.handle(&cmd).unwrap();
            ncr.apply(&events[0]);
        }

        let err = ncr
            .handle(&NcrCommand::StartInvestigation(StartInvestigation {
                ncr_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }
}
