use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siteops_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use siteops_events::Event;

/// Vendor identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorId(pub AggregateId);

impl VendorId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for VendorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Contact fields for a vendor (all optional in the directory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VendorContact {
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Aggregate root: Vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vendor {
    id: VendorId,
    name: String,
    contact: VendorContact,
    version: u64,
    created: bool,
}

impl Vendor {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: VendorId) -> Self {
        Self {
            id,
            name: String::new(),
            contact: VendorContact::default(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> VendorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &VendorContact {
        &self.contact
    }
}

impl AggregateRoot for Vendor {
    type Id = VendorId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterVendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterVendor {
    pub vendor_id: VendorId,
    pub name: String,
    pub contact: VendorContact,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateVendorContact (replaces all contact fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateVendorContact {
    pub vendor_id: VendorId,
    pub contact: VendorContact,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VendorCommand {
    RegisterVendor(RegisterVendor),
    UpdateVendorContact(UpdateVendorContact),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VendorEvent {
    VendorRegistered {
        vendor_id: VendorId,
        name: String,
        contact: VendorContact,
        occurred_at: DateTime<Utc>,
    },
    VendorContactUpdated {
        vendor_id: VendorId,
        contact: VendorContact,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for VendorEvent {
    fn event_type(&self) -> &'static str {
        match self {
            VendorEvent::VendorRegistered { .. } => "vendors.vendor.registered",
            VendorEvent::VendorContactUpdated { .. } => "vendors.vendor.contact_updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            VendorEvent::VendorRegistered { occurred_at, .. } => *occurred_at,
            VendorEvent::VendorContactUpdated { occurred_at, .. } => *occurred_at,
        }
    }
}

impl Aggregate for Vendor {
    type Command = VendorCommand;
    type Event = VendorEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            VendorEvent::VendorRegistered {
                vendor_id,
                name,
                contact,
                ..
            } => {
                self.id = *vendor_id;
                self.name = name.clone();
                self.contact = contact.clone();
                self.created = true;
            }
            VendorEvent::VendorContactUpdated { contact, .. } => {
                self.contact = contact.clone();
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            VendorCommand::RegisterVendor(cmd) => self.handle_register(cmd),
            VendorCommand::UpdateVendorContact(cmd) => self.handle_update_contact(cmd),
        }
    }
}

impl Vendor {
    fn ensure_vendor_id(&self, vendor_id: VendorId) -> Result<(), DomainError> {
        if self.id != vendor_id {
            return Err(DomainError::invariant("vendor_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterVendor) -> Result<Vec<VendorEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("vendor already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![VendorEvent::VendorRegistered {
            vendor_id: cmd.vendor_id,
            name: cmd.name.clone(),
            contact: cmd.contact.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_update_contact(
        &self,
        cmd: &UpdateVendorContact,
    ) -> Result<Vec<VendorEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_vendor_id(cmd.vendor_id)?;

        Ok(vec![VendorEvent::VendorContactUpdated {
            vendor_id: cmd.vendor_id,
            contact: cmd.contact.clone(),
            occurred_at: cmd.occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vendor_id() -> VendorId {
        VendorId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn register_vendor_emits_registered_event() {
        let vendor = Vendor::empty(test_vendor_id());
        let vendor_id = test_vendor_id();

        let cmd = RegisterVendor {
            vendor_id,
            name: "Apex Concrete Supply".to_string(),
            contact: VendorContact {
                contact_person: Some("R. Okafor".to_string()),
                email: Some("sales@apexconcrete.example".to_string()),
                phone: None,
                address: None,
            },
            occurred_at: test_time(),
        };

        let events = vendor
            .handle(&VendorCommand::RegisterVendor(cmd))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            VendorEvent::VendorRegistered { name, .. } => {
                assert_eq!(name, "Apex Concrete Supply");
            }
            _ => panic!("Expected VendorRegistered event"),
        }
    }

    #[test]
    fn register_rejects_empty_name() {
        let vendor = Vendor::empty(test_vendor_id());
        let cmd = RegisterVendor {
            vendor_id: test_vendor_id(),
            name: "  ".to_string(),
            contact: VendorContact::default(),
            occurred_at: test_time(),
        };

        let err = vendor
            .handle(&VendorCommand::RegisterVendor(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn update_contact_replaces_contact_fields() {
        let mut vendor = Vendor::empty(test_vendor_id());
        let vendor_id = test_vendor_id();

        let events = vendor
            .handle(&VendorCommand::RegisterVendor(RegisterVendor {
                vendor_id,
                name: "Steelworks Ltd".to_string(),
                contact: VendorContact {
                    phone: Some("+1 555 0100".to_string()),
                    ..VendorContact::default()
                },
                occurred_at: test_time(),
            }))
            .unwrap();
        vendor.apply(&events[0]);

        let events = vendor
            .handle(&VendorCommand::UpdateVendorContact(UpdateVendorContact {
                vendor_id,
                contact: VendorContact {
                    email: Some("orders@steelworks.example".to_string()),
                    ..VendorContact::default()
                },
                occurred_at: test_time(),
            }))
            .unwrap();
        vendor.apply(&events[0]);

        assert_eq!(
            vendor.contact().email.as_deref(),
            Some("orders@steelworks.example")
        );
        // Full replacement: the old phone is gone.
        assert_eq!(vendor.contact().phone, None);
    }

    #[test]
    fn update_contact_on_unknown_vendor_is_not_found() {
        let vendor = Vendor::empty(test_vendor_id());
        let err = vendor
            .handle(&VendorCommand::UpdateVendorContact(UpdateVendorContact {
                vendor_id: test_vendor_id(),
                contact: VendorContact::default(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }
}
