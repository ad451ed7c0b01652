use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siteops_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Priority, UserId};
use siteops_events::Event;
use siteops_projects::ProjectId;

/// Ticket identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub AggregateId);

impl TicketId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TicketId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Ticket status lifecycle: Open -> InProgress -> Resolved -> Closed, with
/// reopen from Resolved back to Open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }
}

impl core::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    id: TicketId,
    project_id: Option<ProjectId>,
    title: String,
    priority: Priority,
    assigned_to: Option<UserId>,
    status: TicketStatus,
    version: u64,
    created: bool,
}

impl Ticket {
    pub fn empty(id: TicketId) -> Self {
        Self {
            id,
            project_id: None,
            title: String::new(),
            priority: Priority::default(),
            assigned_to: None,
            status: TicketStatus::Open,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TicketId {
        self.id
    }

    pub fn status(&self) -> TicketStatus {
        self.status
    }

    pub fn assigned_to(&self) -> Option<UserId> {
        self.assigned_to
    }
}

impl AggregateRoot for Ticket {
    type Id = TicketId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenTicket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTicket {
    pub ticket_id: TicketId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub raised_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignTicket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignTicket {
    pub ticket_id: TicketId,
    pub assignee: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartTicket (Open -> InProgress).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartTicket {
    pub ticket_id: TicketId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResolveTicket (InProgress -> Resolved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveTicket {
    pub ticket_id: TicketId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseTicket (Resolved -> Closed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseTicket {
    pub ticket_id: TicketId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReopenTicket (Resolved -> Open).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReopenTicket {
    pub ticket_id: TicketId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketCommand {
    OpenTicket(OpenTicket),
    AssignTicket(AssignTicket),
    StartTicket(StartTicket),
    ResolveTicket(ResolveTicket),
    CloseTicket(CloseTicket),
    ReopenTicket(ReopenTicket),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketEvent {
    TicketOpened {
        ticket_id: TicketId,
        project_id: ProjectId,
        title: String,
        description: String,
        priority: Priority,
        raised_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    TicketAssigned {
        ticket_id: TicketId,
        assignee: UserId,
        occurred_at: DateTime<Utc>,
    },
    TicketStarted {
        ticket_id: TicketId,
        occurred_at: DateTime<Utc>,
    },
    TicketResolved {
        ticket_id: TicketId,
        occurred_at: DateTime<Utc>,
    },
    TicketClosed {
        ticket_id: TicketId,
        occurred_at: DateTime<Utc>,
    },
    TicketReopened {
        ticket_id: TicketId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for TicketEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TicketEvent::TicketOpened { .. } => "issues.ticket.opened",
            TicketEvent::TicketAssigned { .. } => "issues.ticket.assigned",
            TicketEvent::TicketStarted { .. } => "issues.ticket.started",
            TicketEvent::TicketResolved { .. } => "issues.ticket.resolved",
            TicketEvent::TicketClosed { .. } => "issues.ticket.closed",
            TicketEvent::TicketReopened { .. } => "issues.ticket.reopened",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TicketEvent::TicketOpened { occurred_at, .. }
            | TicketEvent::TicketAssigned { occurred_at, .. }
            | TicketEvent::TicketStarted { occurred_at, .. }
            | TicketEvent::TicketResolved { occurred_at, .. }
            | TicketEvent::TicketClosed { occurred_at, .. }
            | TicketEvent::TicketReopened { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Ticket {
    type Command = TicketCommand;
    type Event = TicketEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TicketEvent::TicketOpened {
                ticket_id,
                project_id,
                title,
                priority,
                ..
            } => {
                self.id = *ticket_id;
                self.project_id = Some(*project_id);
                self.title = title.clone();
                self.priority = *priority;
                self.status = TicketStatus::Open;
                self.created = true;
            }
            TicketEvent::TicketAssigned { assignee, .. } => {
                self.assigned_to = Some(*assignee);
            }
            TicketEvent::TicketStarted { .. } => {
                self.status = TicketStatus::InProgress;
            }
            TicketEvent::TicketResolved { .. } => {
                self.status = TicketStatus::Resolved;
            }
            TicketEvent::TicketClosed { .. } => {
                self.status = TicketStatus::Closed;
            }
            TicketEvent::TicketReopened { .. } => {
                self.status = TicketStatus::Open;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TicketCommand::OpenTicket(cmd) => self.handle_open(cmd),
            TicketCommand::AssignTicket(cmd) => self.handle_assign(cmd),
            TicketCommand::StartTicket(cmd) => self.handle_status_move(
                cmd.ticket_id,
                TicketStatus::Open,
                TicketEvent::TicketStarted {
                    ticket_id: cmd.ticket_id,
                    occurred_at: cmd.occurred_at,
                },
            ),
            TicketCommand::ResolveTicket(cmd) => self.handle_status_move(
                cmd.ticket_id,
                TicketStatus::InProgress,
                TicketEvent::TicketResolved {
                    ticket_id: cmd.ticket_id,
                    occurred_at: cmd.occurred_at,
                },
            ),
            TicketCommand::CloseTicket(cmd) => self.handle_status_move(
                cmd.ticket_id,
                TicketStatus::Resolved,
                TicketEvent::TicketClosed {
                    ticket_id: cmd.ticket_id,
                    occurred_at: cmd.occurred_at,
                },
            ),
            TicketCommand::ReopenTicket(cmd) => self.handle_status_move(
                cmd.ticket_id,
                TicketStatus::Resolved,
                TicketEvent::TicketReopened {
                    ticket_id: cmd.ticket_id,
                    occurred_at: cmd.occurred_at,
                },
            ),
        }
    }
}

impl Ticket {
    fn ensure_ticket_id(&self, ticket_id: TicketId) -> Result<(), DomainError> {
        if self.id != ticket_id {
            return Err(DomainError::invariant("ticket_id mismatch"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenTicket) -> Result<Vec<TicketEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("ticket already exists"));
        }
        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if cmd.description.trim().is_empty() {
            return Err(DomainError::validation("description cannot be empty"));
        }

        Ok(vec![TicketEvent::TicketOpened {
            ticket_id: cmd.ticket_id,
            project_id: cmd.project_id,
            title: cmd.title.clone(),
            description: cmd.description.clone(),
            priority: cmd.priority,
            raised_by: cmd.raised_by,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_assign(&self, cmd: &AssignTicket) -> Result<Vec<TicketEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_ticket_id(cmd.ticket_id)?;

        if self.status == TicketStatus::Closed {
            return Err(DomainError::invalid_transition("ticket is closed"));
        }

        Ok(vec![TicketEvent::TicketAssigned {
            ticket_id: cmd.ticket_id,
            assignee: cmd.assignee,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_status_move(
        &self,
        ticket_id: TicketId,
        required: TicketStatus,
        event: TicketEvent,
    ) -> Result<Vec<TicketEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_ticket_id(ticket_id)?;

        if self.status != required {
            return Err(DomainError::invalid_transition(format!(
                "ticket is {}",
                self.status
            )));
        }

        Ok(vec![event])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ticket_id() -> TicketId {
        TicketId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn opened_ticket(ticket_id: TicketId) -> Ticket {
        let mut ticket = Ticket::empty(ticket_id);
        let events = ticket
            .handle(&TicketCommand::OpenTicket(OpenTicket {
                ticket_id,
                project_id: ProjectId::new(AggregateId::new()),
                title: "Crane hydraulic leak".to_string(),
                description: "Oil pooling under the tower crane base.".to_string(),
                priority: Priority::Critical,
                raised_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        ticket.apply(&events[0]);
        ticket
    }

    fn step(ticket: &mut Ticket, cmd: TicketCommand) {
        let events = ticket.handle(&cmd).unwrap();
        ticket.apply(&events[0]);
    }

    #[test]
    fn lifecycle_open_to_closed() {
        let ticket_id = test_ticket_id();
        let mut ticket = opened_ticket(ticket_id);

        step(
            &mut ticket,
            TicketCommand::StartTicket(StartTicket {
                ticket_id,
                occurred_at: test_time(),
            }),
        );
        step(
            &mut ticket,
            TicketCommand::ResolveTicket(ResolveTicket {
                ticket_id,
                occurred_at: test_time(),
            }),
        );
        step(
            &mut ticket,
            TicketCommand::CloseTicket(CloseTicket {
                ticket_id,
                occurred_at: test_time(),
            }),
        );

        assert_eq!(ticket.status(), TicketStatus::Closed);
    }

    #[test]
    fn cannot_resolve_an_open_ticket() {
        let ticket_id = test_ticket_id();
        let ticket = opened_ticket(ticket_id);

        let err = ticket
            .handle(&TicketCommand::ResolveTicket(ResolveTicket {
                ticket_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn reopen_resolved_ticket_returns_to_open() {
        let ticket_id = test_ticket_id();
        let mut ticket = opened_ticket(ticket_id);

        step(
            &mut ticket,
            TicketCommand::StartTicket(StartTicket {
                ticket_id,
                occurred_at: test_time(),
            }),
        );
        step(
            &mut ticket,
            TicketCommand::ResolveTicket(ResolveTicket {
                ticket_id,
                occurred_at: test_time(),
            }),
        );
        step(
            &mut ticket,
            TicketCommand::ReopenTicket(ReopenTicket {
                ticket_id,
                occurred_at: test_time(),
            }),
        );

        assert_eq!(ticket.status(), TicketStatus::Open);
    }

    #[test]
    fn closed_ticket_rejects_assignment() {
        let ticket_id = test_ticket_id();
        let mut ticket = opened_ticket(ticket_id);

        step(
            &mut ticket,
            TicketCommand::StartTicket(StartTicket {
                ticket_id,
                occurred_at: test_time(),
            }),
        );
        step(
            &mut ticket,
            TicketCommand::ResolveTicket(ResolveTicket {
                ticket_id,
                occurred_at: test_time(),
            }),
        );
        step(
            &mut ticket,
            TicketCommand::CloseTicket(CloseTicket {
                ticket_id,
                occurred_at: test_time(),
            }),
        );

        let err = ticket
            .handle(&TicketCommand::AssignTicket(AssignTicket {
                ticket_id,
                assignee: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }
}
