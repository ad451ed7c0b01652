use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siteops_core::{Aggregate, AggregateId, AggregateRoot, Money, UserId};
use siteops_events::Event;
use siteops_projects::ProjectId;
use siteops_vendors::VendorId;

use crate::error::MaterialError;

/// Material identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(pub AggregateId);

impl MaterialId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for MaterialId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Ledger entry identifier. Transactions are entities within the material
/// stream, not aggregates of their own.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub AggregateId);

impl TransactionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Inflow,
    Outflow,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Inflow => "inflow",
            TransactionType::Outflow => "outflow",
        }
    }

    /// The signed effect of a (positive) quantity in this direction.
    pub fn signed(&self, quantity: i64) -> i64 {
        match self {
            TransactionType::Inflow => quantity,
            TransactionType::Outflow => -quantity,
        }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Material.
///
/// The on-hand `quantity` is evolved exclusively through applied
/// `TransactionRecorded` events, so it always equals the net sum of inflow
/// minus outflow quantities in the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    id: MaterialId,
    name: String,
    description: Option<String>,
    unit: String,
    quantity: i64,
    reorder_level: i64,
    version: u64,
    created: bool,
}

impl Material {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: MaterialId) -> Self {
        Self {
            id,
            name: String::new(),
            description: None,
            unit: String::new(),
            quantity: 0,
            reorder_level: 0,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> MaterialId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn reorder_level(&self) -> i64 {
        self.reorder_level
    }

    /// A material is low on stock when its quantity is at or below the
    /// reorder level.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}

impl AggregateRoot for Material {
    type Id = MaterialId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateMaterial.
///
/// A nonzero `initial_quantity` is recorded as an opening inflow transaction
/// so the ledger accounts for every unit from the first event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMaterial {
    pub material_id: MaterialId,
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub reorder_level: i64,
    pub initial_quantity: i64,
    pub opening_transaction_id: TransactionId,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateMaterialDetails (metadata only; never touches quantity).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMaterialDetails {
    pub material_id: MaterialId,
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub reorder_level: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordTransaction — append one immutable ledger entry and move
/// the on-hand quantity with it, as a single atomic unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTransaction {
    pub material_id: MaterialId,
    pub transaction_id: TransactionId,
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub unit_price: Option<Money>,
    pub vendor_id: Option<VendorId>,
    pub project_id: Option<ProjectId>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialCommand {
    CreateMaterial(CreateMaterial),
    UpdateMaterialDetails(UpdateMaterialDetails),
    RecordTransaction(RecordTransaction),
}

/// Event: MaterialCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialCreated {
    pub material_id: MaterialId,
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub reorder_level: i64,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MaterialDetailsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialDetailsUpdated {
    pub material_id: MaterialId,
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub reorder_level: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransactionRecorded — one immutable ledger entry. Never updated or
/// deleted once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecorded {
    pub material_id: MaterialId,
    pub transaction_id: TransactionId,
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub unit_price: Option<Money>,
    pub vendor_id: Option<VendorId>,
    pub project_id: Option<ProjectId>,
    pub reference_number: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialEvent {
    MaterialCreated(MaterialCreated),
    MaterialDetailsUpdated(MaterialDetailsUpdated),
    TransactionRecorded(TransactionRecorded),
}

impl Event for MaterialEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MaterialEvent::MaterialCreated(_) => "materials.material.created",
            MaterialEvent::MaterialDetailsUpdated(_) => "materials.material.details_updated",
            MaterialEvent::TransactionRecorded(_) => "materials.material.transaction_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MaterialEvent::MaterialCreated(e) => e.occurred_at,
            MaterialEvent::MaterialDetailsUpdated(e) => e.occurred_at,
            MaterialEvent::TransactionRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Material {
    type Command = MaterialCommand;
    type Event = MaterialEvent;
    type Error = MaterialError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MaterialEvent::MaterialCreated(e) => {
                self.id = e.material_id;
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.unit = e.unit.clone();
                self.quantity = 0;
                self.reorder_level = e.reorder_level;
                self.created = true;
            }
            MaterialEvent::MaterialDetailsUpdated(e) => {
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.unit = e.unit.clone();
                self.reorder_level = e.reorder_level;
            }
            MaterialEvent::TransactionRecorded(e) => {
                self.quantity += e.transaction_type.signed(e.quantity);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MaterialCommand::CreateMaterial(cmd) => self.handle_create(cmd),
            MaterialCommand::UpdateMaterialDetails(cmd) => self.handle_update(cmd),
            MaterialCommand::RecordTransaction(cmd) => self.handle_record(cmd),
        }
    }
}

impl Material {
    fn ensure_material_id(&self, material_id: MaterialId) -> Result<(), MaterialError> {
        if self.id != material_id {
            return Err(MaterialError::IdMismatch);
        }
        Ok(())
    }

    fn validate_details(
        name: &str,
        unit: &str,
        reorder_level: i64,
    ) -> Result<(), MaterialError> {
        if name.trim().is_empty() {
            return Err(MaterialError::Validation("name cannot be empty".to_string()));
        }
        if unit.trim().is_empty() {
            return Err(MaterialError::Validation("unit cannot be empty".to_string()));
        }
        if reorder_level < 0 {
            return Err(MaterialError::Validation(
                "reorder_level cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateMaterial) -> Result<Vec<MaterialEvent>, MaterialError> {
        if self.created {
            return Err(MaterialError::AlreadyExists);
        }
        Self::validate_details(&cmd.name, &cmd.unit, cmd.reorder_level)?;
        if cmd.initial_quantity < 0 {
            return Err(MaterialError::Validation(
                "initial_quantity cannot be negative".to_string(),
            ));
        }

        let mut events = vec![MaterialEvent::MaterialCreated(MaterialCreated {
            material_id: cmd.material_id,
            name: cmd.name.clone(),
            description: cmd.description.clone(),
            unit: cmd.unit.clone(),
            reorder_level: cmd.reorder_level,
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        })];

        // Opening stock enters through the ledger like any other inflow.
        if cmd.initial_quantity > 0 {
            events.push(MaterialEvent::TransactionRecorded(TransactionRecorded {
                material_id: cmd.material_id,
                transaction_id: cmd.opening_transaction_id,
                transaction_type: TransactionType::Inflow,
                quantity: cmd.initial_quantity,
                unit_price: None,
                vendor_id: None,
                project_id: None,
                reference_number: None,
                notes: Some("opening stock".to_string()),
                recorded_by: cmd.created_by,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_update(
        &self,
        cmd: &UpdateMaterialDetails,
    ) -> Result<Vec<MaterialEvent>, MaterialError> {
        if !self.created {
            return Err(MaterialError::MaterialNotFound);
        }
        self.ensure_material_id(cmd.material_id)?;
        Self::validate_details(&cmd.name, &cmd.unit, cmd.reorder_level)?;

        Ok(vec![MaterialEvent::MaterialDetailsUpdated(
            MaterialDetailsUpdated {
                material_id: cmd.material_id,
                name: cmd.name.clone(),
                description: cmd.description.clone(),
                unit: cmd.unit.clone(),
                reorder_level: cmd.reorder_level,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_record(&self, cmd: &RecordTransaction) -> Result<Vec<MaterialEvent>, MaterialError> {
        if !self.created {
            return Err(MaterialError::MaterialNotFound);
        }
        self.ensure_material_id(cmd.material_id)?;

        if cmd.quantity <= 0 {
            return Err(MaterialError::InvalidQuantity(cmd.quantity));
        }
        if cmd.unit_price.is_some_and(|p| p.is_negative()) {
            return Err(MaterialError::Validation(
                "unit_price cannot be negative".to_string(),
            ));
        }

        // Invariant: quantity stays >= 0. An over-drawing outflow emits
        // nothing, so the ledger shows no partial effect.
        if cmd.transaction_type == TransactionType::Outflow && cmd.quantity > self.quantity {
            return Err(MaterialError::InsufficientStock {
                on_hand: self.quantity,
                requested: cmd.quantity,
            });
        }

        Ok(vec![MaterialEvent::TransactionRecorded(
            TransactionRecorded {
                material_id: cmd.material_id,
                transaction_id: cmd.transaction_id,
                transaction_type: cmd.transaction_type,
                quantity: cmd.quantity,
                unit_price: cmd.unit_price,
                vendor_id: cmd.vendor_id,
                project_id: cmd.project_id,
                reference_number: cmd.reference_number.clone(),
                notes: cmd.notes.clone(),
                recorded_by: cmd.recorded_by,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_material_id() -> MaterialId {
        MaterialId::new(AggregateId::new())
    }

    fn test_transaction_id() -> TransactionId {
        TransactionId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_material(material_id: MaterialId, initial: i64, reorder: i64) -> Material {
        let mut material = Material::empty(material_id);
        let events = material
            .handle(&MaterialCommand::CreateMaterial(CreateMaterial {
                material_id,
                name: "Cement".to_string(),
                description: Some("OPC 42.5".to_string()),
                unit: "bags".to_string(),
                reorder_level: reorder,
                initial_quantity: initial,
                opening_transaction_id: test_transaction_id(),
                created_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for event in &events {
            material.apply(event);
        }
        material
    }

    fn record(
        material: &mut Material,
        transaction_type: TransactionType,
        quantity: i64,
    ) -> Result<(), MaterialError> {
        let events = material.handle(&MaterialCommand::RecordTransaction(RecordTransaction {
            material_id: material.id_typed(),
            transaction_id: test_transaction_id(),
            transaction_type,
            quantity,
            unit_price: None,
            vendor_id: None,
            project_id: None,
            reference_number: None,
            notes: None,
            recorded_by: UserId::new(),
            occurred_at: test_time(),
        }))?;
        for event in &events {
            material.apply(event);
        }
        Ok(())
    }

    #[test]
    fn create_with_opening_stock_records_an_inflow() {
        let material_id = test_material_id();
        let material = Material::empty(material_id);

        let events = material
            .handle(&MaterialCommand::CreateMaterial(CreateMaterial {
                material_id,
                name: "Rebar 12mm".to_string(),
                description: None,
                unit: "pieces".to_string(),
                reorder_level: 50,
                initial_quantity: 400,
                opening_transaction_id: test_transaction_id(),
                created_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();

        assert_eq!(events.len(), 2);
        match &events[1] {
            MaterialEvent::TransactionRecorded(e) => {
                assert_eq!(e.transaction_type, TransactionType::Inflow);
                assert_eq!(e.quantity, 400);
            }
            _ => panic!("Expected TransactionRecorded event"),
        }
    }

    #[test]
    fn create_with_zero_opening_stock_emits_only_created() {
        let material_id = test_material_id();
        let material = created_material(material_id, 0, 10);
        assert_eq!(material.quantity(), 0);
        assert_eq!(material.version(), 1);
    }

    #[test]
    fn inflow_and_outflow_move_quantity() {
        let material_id = test_material_id();
        let mut material = created_material(material_id, 0, 10);

        record(&mut material, TransactionType::Inflow, 120).unwrap();
        record(&mut material, TransactionType::Outflow, 45).unwrap();

        assert_eq!(material.quantity(), 75);
    }

    #[test]
    fn outflow_beyond_stock_fails_with_insufficient_stock_and_no_effect() {
        let material_id = test_material_id();
        let mut material = created_material(material_id, 30, 10);
        let version_before = material.version();

        let err = record(&mut material, TransactionType::Outflow, 31).unwrap_err();
        assert_eq!(
            err,
            MaterialError::InsufficientStock {
                on_hand: 30,
                requested: 31
            }
        );

        // No partial effect: quantity and version untouched.
        assert_eq!(material.quantity(), 30);
        assert_eq!(material.version(), version_before);
    }

    #[test]
    fn non_positive_quantities_are_rejected() {
        let material_id = test_material_id();
        let mut material = created_material(material_id, 10, 5);

        for quantity in [0, -7] {
            let err = record(&mut material, TransactionType::Inflow, quantity).unwrap_err();
            assert_eq!(err, MaterialError::InvalidQuantity(quantity));
        }
        assert_eq!(material.quantity(), 10);
    }

    #[test]
    fn record_on_unknown_material_is_not_found() {
        let mut material = Material::empty(test_material_id());
        let err = record(&mut material, TransactionType::Inflow, 5).unwrap_err();
        assert_eq!(err, MaterialError::MaterialNotFound);
    }

    #[test]
    fn update_details_never_touches_quantity() {
        let material_id = test_material_id();
        let mut material = created_material(material_id, 80, 10);

        let events = material
            .handle(&MaterialCommand::UpdateMaterialDetails(
                UpdateMaterialDetails {
                    material_id,
                    name: "Cement (OPC)".to_string(),
                    description: None,
                    unit: "bags".to_string(),
                    reorder_level: 25,
                    occurred_at: test_time(),
                },
            ))
            .unwrap();
        material.apply(&events[0]);

        assert_eq!(material.quantity(), 80);
        assert_eq!(material.reorder_level(), 25);
        assert_eq!(material.name(), "Cement (OPC)");
    }

    #[test]
    fn low_stock_flag_tracks_reorder_level() {
        // Scenario from the ledger requirements: Cement at 100, reorder 20.
        let material_id = test_material_id();
        let mut material = created_material(material_id, 100, 20);
        assert!(!material.is_low_stock());

        record(&mut material, TransactionType::Outflow, 85).unwrap();
        assert_eq!(material.quantity(), 15);
        assert!(material.is_low_stock());

        record(&mut material, TransactionType::Inflow, 200).unwrap();
        assert_eq!(material.quantity(), 215);
        assert!(!material.is_low_stock());

        let err = record(&mut material, TransactionType::Outflow, 9000).unwrap_err();
        assert!(matches!(err, MaterialError::InsufficientStock { .. }));
        assert_eq!(material.quantity(), 215);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        struct Tx {
            inflow: bool,
            quantity: i64,
        }

        fn tx_strategy() -> impl Strategy<Value = Tx> {
            (any::<bool>(), 1i64..=1000).prop_map(|(inflow, quantity)| Tx { inflow, quantity })
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: after any sequence of accepted transactions, the
            /// on-hand quantity equals initial + sum(inflows) - sum(outflows),
            /// and rejected transactions change nothing.
            #[test]
            fn quantity_equals_net_of_accepted_transactions(
                initial in 0i64..=500,
                txs in proptest::collection::vec(tx_strategy(), 0..40)
            ) {
                let material_id = test_material_id();
                let mut material = created_material(material_id, initial, 10);

                let mut expected = initial;
                for tx in &txs {
                    let transaction_type = if tx.inflow {
                        TransactionType::Inflow
                    } else {
                        TransactionType::Outflow
                    };

                    match record(&mut material, transaction_type, tx.quantity) {
                        Ok(()) => {
                            expected += transaction_type.signed(tx.quantity);
                        }
                        Err(MaterialError::InsufficientStock { on_hand, requested }) => {
                            prop_assert_eq!(on_hand, expected);
                            prop_assert!(requested > on_hand);
                        }
                        Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
                    }
                }

                prop_assert_eq!(material.quantity(), expected);
                prop_assert!(material.quantity() >= 0);
            }

            /// Property: an over-drawing outflow is always rejected, never
            /// partially applied.
            #[test]
            fn overdraw_is_always_rejected(
                initial in 0i64..=100,
                extra in 1i64..=100
            ) {
                let material_id = test_material_id();
                let mut material = created_material(material_id, initial, 0);

                let err = record(&mut material, TransactionType::Outflow, initial + extra).unwrap_err();
                prop_assert!(matches!(err, MaterialError::InsufficientStock { .. }), "expected InsufficientStock error");
                prop_assert_eq!(material.quantity(), initial);
            }
        }
    }
}
