use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siteops_core::{Aggregate, AggregateId, AggregateRoot, UserId};
use siteops_events::Event;
use siteops_projects::ProjectId;

use crate::error::RequestError;
use crate::material::MaterialId;

/// Material request identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub AggregateId);

impl RequestId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for RequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Request status: pending until decided, then terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl core::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of deciding a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestDecision {
    Approve,
    Reject,
}

/// Aggregate root: MaterialRequest.
///
/// Advisory only: approval does not move inventory. Fulfillment is recorded
/// separately as an outflow transaction on the material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialRequest {
    id: RequestId,
    material_id: Option<MaterialId>,
    project_id: Option<ProjectId>,
    quantity: i64,
    requested_by: Option<UserId>,
    status: RequestStatus,
    approved_by: Option<UserId>,
    decided_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl MaterialRequest {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: RequestId) -> Self {
        Self {
            id,
            material_id: None,
            project_id: None,
            quantity: 0,
            requested_by: None,
            status: RequestStatus::Pending,
            approved_by: None,
            decided_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RequestId {
        self.id
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        self.decided_at
    }
}

impl AggregateRoot for MaterialRequest {
    type Id = RequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SubmitRequest. Does not touch inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub request_id: RequestId,
    pub material_id: MaterialId,
    pub project_id: ProjectId,
    pub quantity: i64,
    pub requested_by: UserId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DecideRequest. Legal only while the request is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecideRequest {
    pub request_id: RequestId,
    pub decision: RequestDecision,
    pub approver: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestCommand {
    SubmitRequest(SubmitRequest),
    DecideRequest(DecideRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestEvent {
    RequestSubmitted {
        request_id: RequestId,
        material_id: MaterialId,
        project_id: ProjectId,
        quantity: i64,
        requested_by: UserId,
        notes: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    RequestApproved {
        request_id: RequestId,
        approver: UserId,
        occurred_at: DateTime<Utc>,
    },
    RequestRejected {
        request_id: RequestId,
        approver: UserId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for RequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RequestEvent::RequestSubmitted { .. } => "materials.request.submitted",
            RequestEvent::RequestApproved { .. } => "materials.request.approved",
            RequestEvent::RequestRejected { .. } => "materials.request.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RequestEvent::RequestSubmitted { occurred_at, .. }
            | RequestEvent::RequestApproved { occurred_at, .. }
            | RequestEvent::RequestRejected { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for MaterialRequest {
    type Command = RequestCommand;
    type Event = RequestEvent;
    type Error = RequestError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RequestEvent::RequestSubmitted {
                request_id,
                material_id,
                project_id,
                quantity,
                requested_by,
                ..
            } => {
                self.id = *request_id;
                self.material_id = Some(*material_id);
                self.project_id = Some(*project_id);
                self.quantity = *quantity;
                self.requested_by = Some(*requested_by);
                self.status = RequestStatus::Pending;
                self.created = true;
            }
            RequestEvent::RequestApproved {
                approver,
                occurred_at,
                ..
            } => {
                self.status = RequestStatus::Approved;
                self.approved_by = Some(*approver);
                self.decided_at = Some(*occurred_at);
            }
            RequestEvent::RequestRejected {
                approver,
                occurred_at,
                ..
            } => {
                self.status = RequestStatus::Rejected;
                self.approved_by = Some(*approver);
                self.decided_at = Some(*occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RequestCommand::SubmitRequest(cmd) => self.handle_submit(cmd),
            RequestCommand::DecideRequest(cmd) => self.handle_decide(cmd),
        }
    }
}

impl MaterialRequest {
    fn ensure_request_id(&self, request_id: RequestId) -> Result<(), RequestError> {
        if self.id != request_id {
            return Err(RequestError::IdMismatch);
        }
        Ok(())
    }

    fn handle_submit(&self, cmd: &SubmitRequest) -> Result<Vec<RequestEvent>, RequestError> {
        if self.created {
            return Err(RequestError::AlreadyExists);
        }
        if cmd.quantity <= 0 {
            return Err(RequestError::InvalidQuantity(cmd.quantity));
        }

        Ok(vec![RequestEvent::RequestSubmitted {
            request_id: cmd.request_id,
            material_id: cmd.material_id,
            project_id: cmd.project_id,
            quantity: cmd.quantity,
            requested_by: cmd.requested_by,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_decide(&self, cmd: &DecideRequest) -> Result<Vec<RequestEvent>, RequestError> {
        if !self.created {
            return Err(RequestError::RequestNotFound);
        }
        self.ensure_request_id(cmd.request_id)?;

        // Decided at most once: only pending requests may move.
        if self.status != RequestStatus::Pending {
            return Err(RequestError::InvalidTransition {
                status: self.status,
            });
        }

        let event = match cmd.decision {
            RequestDecision::Approve => RequestEvent::RequestApproved {
                request_id: cmd.request_id,
                approver: cmd.approver,
                occurred_at: cmd.occurred_at,
            },
            RequestDecision::Reject => RequestEvent::RequestRejected {
                request_id: cmd.request_id,
                approver: cmd.approver,
                occurred_at: cmd.occurred_at,
            },
        };

        Ok(vec![event])
    }
}
