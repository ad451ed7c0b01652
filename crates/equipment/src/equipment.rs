use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use siteops_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use siteops_events::Event;
use siteops_projects::ProjectId;

/// Equipment identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EquipmentId(pub AggregateId);

impl EquipmentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for EquipmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Equipment availability machine.
///
/// Available -> Allocated(project) -> Available via allocate/return, and
/// Available -> UnderMaintenance -> Available via the maintenance pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    #[default]
    Available,
    Allocated,
    UnderMaintenance,
}

impl EquipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentStatus::Available => "available",
            EquipmentStatus::Allocated => "allocated",
            EquipmentStatus::UnderMaintenance => "under_maintenance",
        }
    }
}

impl core::fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Equipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equipment {
    id: EquipmentId,
    name: String,
    quantity: i64,
    location: Option<String>,
    status: EquipmentStatus,
    allocated_to: Option<ProjectId>,
    last_maintenance: Option<NaiveDate>,
    next_maintenance: Option<NaiveDate>,
    version: u64,
    created: bool,
}

impl Equipment {
    pub fn empty(id: EquipmentId) -> Self {
        Self {
            id,
            name: String::new(),
            quantity: 0,
            location: None,
            status: EquipmentStatus::Available,
            allocated_to: None,
            last_maintenance: None,
            next_maintenance: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> EquipmentId {
        self.id
    }

    pub fn status(&self) -> EquipmentStatus {
        self.status
    }

    pub fn allocated_to(&self) -> Option<ProjectId> {
        self.allocated_to
    }

    pub fn last_maintenance(&self) -> Option<NaiveDate> {
        self.last_maintenance
    }

    pub fn next_maintenance(&self) -> Option<NaiveDate> {
        self.next_maintenance
    }
}

impl AggregateRoot for Equipment {
    type Id = EquipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterEquipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterEquipment {
    pub equipment_id: EquipmentId,
    pub name: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub location: Option<String>,
    pub next_maintenance: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AllocateEquipment (Available -> Allocated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateEquipment {
    pub equipment_id: EquipmentId,
    pub project_id: ProjectId,
    pub allocated_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReturnEquipment (Allocated -> Available).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnEquipment {
    pub equipment_id: EquipmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartMaintenance (Available -> UnderMaintenance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartMaintenance {
    pub equipment_id: EquipmentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteMaintenance (UnderMaintenance -> Available).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteMaintenance {
    pub equipment_id: EquipmentId,
    pub performed_on: NaiveDate,
    pub next_maintenance: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquipmentCommand {
    RegisterEquipment(RegisterEquipment),
    AllocateEquipment(AllocateEquipment),
    ReturnEquipment(ReturnEquipment),
    StartMaintenance(StartMaintenance),
    CompleteMaintenance(CompleteMaintenance),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquipmentEvent {
    EquipmentRegistered {
        equipment_id: EquipmentId,
        name: String,
        description: Option<String>,
        quantity: i64,
        location: Option<String>,
        next_maintenance: Option<NaiveDate>,
        occurred_at: DateTime<Utc>,
    },
    EquipmentAllocated {
        equipment_id: EquipmentId,
        project_id: ProjectId,
        allocated_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    EquipmentReturned {
        equipment_id: EquipmentId,
        project_id: ProjectId,
        occurred_at: DateTime<Utc>,
    },
    MaintenanceStarted {
        equipment_id: EquipmentId,
        occurred_at: DateTime<Utc>,
    },
    MaintenanceCompleted {
        equipment_id: EquipmentId,
        performed_on: NaiveDate,
        next_maintenance: Option<NaiveDate>,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for EquipmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EquipmentEvent::EquipmentRegistered { .. } => "equipment.unit.registered",
            EquipmentEvent::EquipmentAllocated { .. } => "equipment.unit.allocated",
            EquipmentEvent::EquipmentReturned { .. } => "equipment.unit.returned",
            EquipmentEvent::MaintenanceStarted { .. } => "equipment.unit.maintenance_started",
            EquipmentEvent::MaintenanceCompleted { .. } => "equipment.unit.maintenance_completed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            EquipmentEvent::EquipmentRegistered { occurred_at, .. }
            | EquipmentEvent::EquipmentAllocated { occurred_at, .. }
            | EquipmentEvent::EquipmentReturned { occurred_at, .. }
            | EquipmentEvent::MaintenanceStarted { occurred_at, .. }
            | EquipmentEvent::MaintenanceCompleted { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Equipment {
    type Command = EquipmentCommand;
    type Event = EquipmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            EquipmentEvent::EquipmentRegistered {
                equipment_id,
                name,
                quantity,
                location,
                next_maintenance,
                ..
            } => {
                self.id = *equipment_id;
                self.name = name.clone();
                self.quantity = *quantity;
                self.location = location.clone();
                self.status = EquipmentStatus::Available;
                self.next_maintenance = *next_maintenance;
                self.created = true;
            }
            EquipmentEvent::EquipmentAllocated { project_id, .. } => {
                self.status = EquipmentStatus::Allocated;
                self.allocated_to = Some(*project_id);
            }
            EquipmentEvent::EquipmentReturned { .. } => {
                self.status = EquipmentStatus::Available;
                self.allocated_to = None;
            }
            EquipmentEvent::MaintenanceStarted { .. } => {
                self.status = EquipmentStatus::UnderMaintenance;
            }
            EquipmentEvent::MaintenanceCompleted {
                performed_on,
                next_maintenance,
                ..
            } => {
                self.status = EquipmentStatus::Available;
                self.last_maintenance = Some(*performed_on);
                self.next_maintenance = *next_maintenance;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            EquipmentCommand::RegisterEquipment(cmd) => self.handle_register(cmd),
            EquipmentCommand::AllocateEquipment(cmd) => self.handle_allocate(cmd),
            EquipmentCommand::ReturnEquipment(cmd) => self.handle_return(cmd),
            EquipmentCommand::StartMaintenance(cmd) => self.handle_start_maintenance(cmd),
            EquipmentCommand::CompleteMaintenance(cmd) => self.handle_complete_maintenance(cmd),
        }
    }
}

impl Equipment {
    fn ensure_equipment_id(&self, equipment_id: EquipmentId) -> Result<(), DomainError> {
        if self.id != equipment_id {
            return Err(DomainError::invariant("equipment_id mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self, equipment_id: EquipmentId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_equipment_id(equipment_id)
    }

    fn handle_register(&self, cmd: &RegisterEquipment) -> Result<Vec<EquipmentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("equipment already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        Ok(vec![EquipmentEvent::EquipmentRegistered {
            equipment_id: cmd.equipment_id,
            name: cmd.name.clone(),
            description: cmd.description.clone(),
            quantity: cmd.quantity,
            location: cmd.location.clone(),
            next_maintenance: cmd.next_maintenance,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_allocate(&self, cmd: &AllocateEquipment) -> Result<Vec<EquipmentEvent>, DomainError> {
        self.ensure_created(cmd.equipment_id)?;

        if self.status != EquipmentStatus::Available {
            return Err(DomainError::invalid_transition(format!(
                "equipment is {}",
                self.status
            )));
        }

        Ok(vec![EquipmentEvent::EquipmentAllocated {
            equipment_id: cmd.equipment_id,
            project_id: cmd.project_id,
            allocated_by: cmd.allocated_by,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_return(&self, cmd: &ReturnEquipment) -> Result<Vec<EquipmentEvent>, DomainError> {
        self.ensure_created(cmd.equipment_id)?;

        let project_id = match (self.status, self.allocated_to) {
            (EquipmentStatus::Allocated, Some(project_id)) => project_id,
            _ => {
                return Err(DomainError::invalid_transition(format!(
                    "equipment is {}",
                    self.status
                )));
            }
        };

        Ok(vec![EquipmentEvent::EquipmentReturned {
            equipment_id: cmd.equipment_id,
            project_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_start_maintenance(
        &self,
        cmd: &StartMaintenance,
    ) -> Result<Vec<EquipmentEvent>, DomainError> {
        self.ensure_created(cmd.equipment_id)?;

        if self.status != EquipmentStatus::Available {
            return Err(DomainError::invalid_transition(format!(
                "equipment is {}",
                self.status
            )));
        }

        Ok(vec![EquipmentEvent::MaintenanceStarted {
            equipment_id: cmd.equipment_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_complete_maintenance(
        &self,
        cmd: &CompleteMaintenance,
    ) -> Result<Vec<EquipmentEvent>, DomainError> {
        self.ensure_created(cmd.equipment_id)?;

        if self.status != EquipmentStatus::UnderMaintenance {
            return Err(DomainError::invalid_transition(format!(
                "equipment is {}",
                self.status
            )));
        }

        Ok(vec![EquipmentEvent::MaintenanceCompleted {
            equipment_id: cmd.equipment_id,
            performed_on: cmd.performed_on,
            next_maintenance: cmd.next_maintenance,
            occurred_at: cmd.occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_equipment_id() -> EquipmentId {
        EquipmentId::new(AggregateId::new())
    }

    fn test_project_id() -> ProjectId {
        ProjectId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn registered_equipment(equipment_id: EquipmentId) -> Equipment {
        let mut equipment = Equipment::empty(equipment_id);
        let events = equipment
            .handle(&EquipmentCommand::RegisterEquipment(RegisterEquipment {
                equipment_id,
                name: "Concrete mixer CM-500".to_string(),
                description: None,
                quantity: 1,
                location: Some("Yard 2".to_string()),
                next_maintenance: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        equipment.apply(&events[0]);
        equipment
    }

    #[test]
    fn allocate_and_return_round_trip() {
        let equipment_id = test_equipment_id();
        let project_id = test_project_id();
        let mut equipment = registered_equipment(equipment_id);

        let events = equipment
            .handle(&EquipmentCommand::AllocateEquipment(AllocateEquipment {
                equipment_id,
                project_id,
                allocated_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        equipment.apply(&events[0]);
        assert_eq!(equipment.status(), EquipmentStatus::Allocated);
        assert_eq!(equipment.allocated_to(), Some(project_id));

        let events = equipment
            .handle(&EquipmentCommand::ReturnEquipment(ReturnEquipment {
                equipment_id,
                occurred_at: test_time(),
            }))
            .unwrap();

        match &events[0] {
            EquipmentEvent::EquipmentReturned {
                project_id: returned_from,
                ..
            } => assert_eq!(*returned_from, project_id),
            _ => panic!("Expected EquipmentReturned event"),
        }

        equipment.apply(&events[0]);
        assert_eq!(equipment.status(), EquipmentStatus::Available);
        assert_eq!(equipment.allocated_to(), None);
    }

    #[test]
    fn double_allocation_is_rejected() {
        let equipment_id = test_equipment_id();
        let mut equipment = registered_equipment(equipment_id);

        let events = equipment
            .handle(&EquipmentCommand::AllocateEquipment(AllocateEquipment {
                equipment_id,
                project_id: test_project_id(),
                allocated_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        equipment.apply(&events[0]);

        let err = equipment
            .handle(&EquipmentCommand::AllocateEquipment(AllocateEquipment {
                equipment_id,
                project_id: test_project_id(),
                allocated_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn maintenance_updates_schedule() {
        let equipment_id = test_equipment_id();
        let mut equipment = registered_equipment(equipment_id);

        let events = equipment
            .handle(&EquipmentCommand::StartMaintenance(StartMaintenance {
                equipment_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        equipment.apply(&events[0]);
        assert_eq!(equipment.status(), EquipmentStatus::UnderMaintenance);

        let performed = NaiveDate::from_ymd_opt(2025, 4, 2).unwrap();
        let next = NaiveDate::from_ymd_opt(2025, 10, 2).unwrap();
        let events = equipment
            .handle(&EquipmentCommand::CompleteMaintenance(CompleteMaintenance {
                equipment_id,
                performed_on: performed,
                next_maintenance: Some(next),
                occurred_at: test_time(),
            }))
            .unwrap();
        equipment.apply(&events[0]);

        assert_eq!(equipment.status(), EquipmentStatus::Available);
        assert_eq!(equipment.last_maintenance(), Some(performed));
        assert_eq!(equipment.next_maintenance(), Some(next));
    }

    #[test]
    fn cannot_start_maintenance_while_allocated() {
        let equipment_id = test_equipment_id();
        let mut equipment = registered_equipment(equipment_id);

        let events = equipment
            .handle(&EquipmentCommand::AllocateEquipment(AllocateEquipment {
                equipment_id,
                project_id: test_project_id(),
                allocated_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        equipment.apply(&events[0]);

        let err = equipment
            .handle(&EquipmentCommand::StartMaintenance(StartMaintenance {
                equipment_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }
}
