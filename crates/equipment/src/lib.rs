//! `siteops-equipment` — plant & equipment registry with allocation and
//! maintenance tracking.

pub mod equipment;

pub use equipment::{
    AllocateEquipment, CompleteMaintenance, Equipment, EquipmentCommand, EquipmentEvent,
    EquipmentId, EquipmentStatus, RegisterEquipment, ReturnEquipment, StartMaintenance,
};
