use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use siteops_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, UserId};
use siteops_events::Event;
use siteops_materials::MaterialId;
use siteops_projects::ProjectId;
use siteops_vendors::VendorId;

/// Purchase order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub AggregateId);

impl PurchaseOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Purchase order status lifecycle.
///
/// Draft -> Submitted -> Received -> Closed, with Cancelled reachable from
/// Draft or Submitted. Lines may only change in Draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderStatus {
    #[default]
    Draft,
    Submitted,
    Received,
    Closed,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::Submitted => "submitted",
            PurchaseOrderStatus::Received => "received",
            PurchaseOrderStatus::Closed => "closed",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Purchase order line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub material_id: MaterialId,
    pub quantity: i64,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn line_total(&self) -> Result<Money, DomainError> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    po_number: String,
    vendor_id: Option<VendorId>,
    project_id: Option<ProjectId>,
    order_date: Option<NaiveDate>,
    expected_delivery: Option<NaiveDate>,
    actual_delivery: Option<NaiveDate>,
    status: PurchaseOrderStatus,
    lines: Vec<OrderLine>,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            po_number: String::new(),
            vendor_id: None,
            project_id: None,
            order_date: None,
            expected_delivery: None,
            actual_delivery: None,
            status: PurchaseOrderStatus::Draft,
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn po_number(&self) -> &str {
        &self.po_number
    }

    pub fn vendor_id(&self) -> Option<VendorId> {
        self.vendor_id
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn actual_delivery(&self) -> Option<NaiveDate> {
        self.actual_delivery
    }

    /// Order total, derived from line items. Never stored, never accepted
    /// from callers.
    pub fn total_amount(&self) -> Result<Money, DomainError> {
        let mut total = Money::ZERO;
        for line in &self.lines {
            total = total.checked_add(line.line_total()?)?;
        }
        Ok(total)
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenPurchaseOrder (starts in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPurchaseOrder {
    pub order_id: PurchaseOrderId,
    pub po_number: String,
    pub vendor_id: VendorId,
    pub project_id: Option<ProjectId>,
    pub order_date: NaiveDate,
    pub expected_delivery: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddOrderLine (only allowed in Draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOrderLine {
    pub order_id: PurchaseOrderId,
    pub material_id: MaterialId,
    pub quantity: i64,
    pub unit_price: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitOrder (Draft -> Submitted, requires at least one line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOrder {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveGoods (Submitted -> Received).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveGoods {
    pub order_id: PurchaseOrderId,
    pub delivered_on: NaiveDate,
    pub received_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CloseOrder (Received -> Closed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOrder {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder (Draft | Submitted -> Cancelled).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    OpenPurchaseOrder(OpenPurchaseOrder),
    AddOrderLine(AddOrderLine),
    SubmitOrder(SubmitOrder),
    ReceiveGoods(ReceiveGoods),
    CloseOrder(CloseOrder),
    CancelOrder(CancelOrder),
}

/// Event: GoodsReceived.
///
/// Carries the material and quantity information that must be reflected in
/// stock. The infra layer translates this into one inflow
/// `RecordTransaction` per line against the materials ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceived {
    pub order_id: PurchaseOrderId,
    pub po_number: String,
    pub vendor_id: VendorId,
    pub project_id: Option<ProjectId>,
    pub lines: Vec<OrderLine>,
    pub delivered_on: NaiveDate,
    pub received_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    PurchaseOrderOpened {
        order_id: PurchaseOrderId,
        po_number: String,
        vendor_id: VendorId,
        project_id: Option<ProjectId>,
        order_date: NaiveDate,
        expected_delivery: Option<NaiveDate>,
        notes: Option<String>,
        created_by: UserId,
        occurred_at: DateTime<Utc>,
    },
    OrderLineAdded {
        order_id: PurchaseOrderId,
        line_no: u32,
        material_id: MaterialId,
        quantity: i64,
        unit_price: Money,
        occurred_at: DateTime<Utc>,
    },
    PurchaseOrderSubmitted {
        order_id: PurchaseOrderId,
        occurred_at: DateTime<Utc>,
    },
    GoodsReceived(GoodsReceived),
    PurchaseOrderClosed {
        order_id: PurchaseOrderId,
        occurred_at: DateTime<Utc>,
    },
    PurchaseOrderCancelled {
        order_id: PurchaseOrderId,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::PurchaseOrderOpened { .. } => "procurement.order.opened",
            PurchaseOrderEvent::OrderLineAdded { .. } => "procurement.order.line_added",
            PurchaseOrderEvent::PurchaseOrderSubmitted { .. } => "procurement.order.submitted",
            PurchaseOrderEvent::GoodsReceived(_) => "procurement.order.goods_received",
            PurchaseOrderEvent::PurchaseOrderClosed { .. } => "procurement.order.closed",
            PurchaseOrderEvent::PurchaseOrderCancelled { .. } => "procurement.order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::PurchaseOrderOpened { occurred_at, .. }
            | PurchaseOrderEvent::OrderLineAdded { occurred_at, .. }
            | PurchaseOrderEvent::PurchaseOrderSubmitted { occurred_at, .. }
            | PurchaseOrderEvent::PurchaseOrderClosed { occurred_at, .. }
            | PurchaseOrderEvent::PurchaseOrderCancelled { occurred_at, .. } => *occurred_at,
            PurchaseOrderEvent::GoodsReceived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::PurchaseOrderOpened {
                order_id,
                po_number,
                vendor_id,
                project_id,
                order_date,
                expected_delivery,
                ..
            } => {
                self.id = *order_id;
                self.po_number = po_number.clone();
                self.vendor_id = Some(*vendor_id);
                self.project_id = *project_id;
                self.order_date = Some(*order_date);
                self.expected_delivery = *expected_delivery;
                self.status = PurchaseOrderStatus::Draft;
                self.lines.clear();
                self.created = true;
            }
            PurchaseOrderEvent::OrderLineAdded {
                line_no,
                material_id,
                quantity,
                unit_price,
                ..
            } => {
                self.lines.push(OrderLine {
                    line_no: *line_no,
                    material_id: *material_id,
                    quantity: *quantity,
                    unit_price: *unit_price,
                });
            }
            PurchaseOrderEvent::PurchaseOrderSubmitted { .. } => {
                self.status = PurchaseOrderStatus::Submitted;
            }
            PurchaseOrderEvent::GoodsReceived(e) => {
                self.status = PurchaseOrderStatus::Received;
                self.actual_delivery = Some(e.delivered_on);
            }
            PurchaseOrderEvent::PurchaseOrderClosed { .. } => {
                self.status = PurchaseOrderStatus::Closed;
            }
            PurchaseOrderEvent::PurchaseOrderCancelled { .. } => {
                self.status = PurchaseOrderStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::OpenPurchaseOrder(cmd) => self.handle_open(cmd),
            PurchaseOrderCommand::AddOrderLine(cmd) => self.handle_add_line(cmd),
            PurchaseOrderCommand::SubmitOrder(cmd) => self.handle_submit(cmd),
            PurchaseOrderCommand::ReceiveGoods(cmd) => self.handle_receive(cmd),
            PurchaseOrderCommand::CloseOrder(cmd) => self.handle_close(cmd),
            PurchaseOrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_order_id(&self, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self, order_id: PurchaseOrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_order_id(order_id)
    }

    fn handle_open(&self, cmd: &OpenPurchaseOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        if cmd.po_number.trim().is_empty() {
            return Err(DomainError::validation("po_number cannot be empty"));
        }
        if let Some(expected) = cmd.expected_delivery {
            if expected < cmd.order_date {
                return Err(DomainError::validation(
                    "expected_delivery cannot precede order_date",
                ));
            }
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderOpened {
            order_id: cmd.order_id,
            po_number: cmd.po_number.clone(),
            vendor_id: cmd.vendor_id,
            project_id: cmd.project_id,
            order_date: cmd.order_date,
            expected_delivery: cmd.expected_delivery,
            notes: cmd.notes.clone(),
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_add_line(&self, cmd: &AddOrderLine) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_created(cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invalid_transition(format!(
                "cannot modify a {} purchase order",
                self.status
            )));
        }
        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if cmd.unit_price.is_negative() {
            return Err(DomainError::validation("unit_price cannot be negative"));
        }
        // The new line must yield a representable total.
        cmd.unit_price.checked_mul(cmd.quantity)?;

        let next_line_no = (self.lines.len() as u32) + 1;
        Ok(vec![PurchaseOrderEvent::OrderLineAdded {
            order_id: cmd.order_id,
            line_no: next_line_no,
            material_id: cmd.material_id,
            quantity: cmd.quantity,
            unit_price: cmd.unit_price,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_submit(&self, cmd: &SubmitOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_created(cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Draft {
            return Err(DomainError::invalid_transition(format!(
                "only draft purchase orders can be submitted (order is {})",
                self.status
            )));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation(
                "cannot submit purchase order without lines",
            ));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderSubmitted {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_receive(&self, cmd: &ReceiveGoods) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_created(cmd.order_id)?;

        // Invariant: cannot receive before submission.
        if self.status != PurchaseOrderStatus::Submitted {
            return Err(DomainError::invalid_transition(format!(
                "cannot receive goods for a {} purchase order",
                self.status
            )));
        }

        let vendor_id = self
            .vendor_id
            .ok_or_else(|| DomainError::invariant("vendor must be set"))?;

        Ok(vec![PurchaseOrderEvent::GoodsReceived(GoodsReceived {
            order_id: cmd.order_id,
            po_number: self.po_number.clone(),
            vendor_id,
            project_id: self.project_id,
            lines: self.lines.clone(),
            delivered_on: cmd.delivered_on,
            received_by: cmd.received_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &CloseOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_created(cmd.order_id)?;

        if self.status != PurchaseOrderStatus::Received {
            return Err(DomainError::invalid_transition(format!(
                "only received purchase orders can be closed (order is {})",
                self.status
            )));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderClosed {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_created(cmd.order_id)?;

        if !matches!(
            self.status,
            PurchaseOrderStatus::Draft | PurchaseOrderStatus::Submitted
        ) {
            return Err(DomainError::invalid_transition(format!(
                "cannot cancel a {} purchase order",
                self.status
            )));
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCancelled {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_order_id() -> PurchaseOrderId {
        PurchaseOrderId::new(AggregateId::new())
    }

    fn test_vendor_id() -> VendorId {
        VendorId::new(AggregateId::new())
    }

    fn test_material_id() -> MaterialId {
        MaterialId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn order_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn opened_order(order_id: PurchaseOrderId, vendor_id: VendorId) -> PurchaseOrder {
        let mut order = PurchaseOrder::empty(order_id);
        let events = order
            .handle(&PurchaseOrderCommand::OpenPurchaseOrder(OpenPurchaseOrder {
                order_id,
                po_number: "PO-2025-0041".to_string(),
                vendor_id,
                project_id: None,
                order_date: order_date(),
                expected_delivery: None,
                notes: None,
                created_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);
        order
    }

    fn add_line(order: &mut PurchaseOrder, quantity: i64, unit_price_minor: i64) {
        let events = order
            .handle(&PurchaseOrderCommand::AddOrderLine(AddOrderLine {
                order_id: order.id_typed(),
                material_id: test_material_id(),
                quantity,
                unit_price: Money::from_minor(unit_price_minor),
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);
    }

    #[test]
    fn total_amount_is_derived_from_lines() {
        let order_id = test_order_id();
        let mut order = opened_order(order_id, test_vendor_id());

        add_line(&mut order, 100, 1250); // 100 x 12.50
        add_line(&mut order, 40, 899); // 40 x 8.99

        assert_eq!(
            order.total_amount().unwrap(),
            Money::from_minor(100 * 1250 + 40 * 899)
        );
    }

    #[test]
    fn lines_are_frozen_after_submission() {
        let order_id = test_order_id();
        let mut order = opened_order(order_id, test_vendor_id());
        add_line(&mut order, 10, 500);

        let events = order
            .handle(&PurchaseOrderCommand::SubmitOrder(SubmitOrder {
                order_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);
        assert_eq!(order.status(), PurchaseOrderStatus::Submitted);

        let err = order
            .handle(&PurchaseOrderCommand::AddOrderLine(AddOrderLine {
                order_id,
                material_id: test_material_id(),
                quantity: 1,
                unit_price: Money::from_minor(100),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn cannot_submit_without_lines() {
        let order_id = test_order_id();
        let order = opened_order(order_id, test_vendor_id());

        let err = order
            .handle(&PurchaseOrderCommand::SubmitOrder(SubmitOrder {
                order_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn cannot_receive_before_submission() {
        let order_id = test_order_id();
        let mut order = opened_order(order_id, test_vendor_id());
        add_line(&mut order, 10, 500);

        let err = order
            .handle(&PurchaseOrderCommand::ReceiveGoods(ReceiveGoods {
                order_id,
                delivered_on: order_date(),
                received_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn receive_after_submission_emits_goods_received_with_lines() {
        let order_id = test_order_id();
        let vendor_id = test_vendor_id();
        let mut order = opened_order(order_id, vendor_id);
        add_line(&mut order, 25, 2000);

        let events = order
            .handle(&PurchaseOrderCommand::SubmitOrder(SubmitOrder {
                order_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);

        let delivered = NaiveDate::from_ymd_opt(2025, 3, 18).unwrap();
        let events = order
            .handle(&PurchaseOrderCommand::ReceiveGoods(ReceiveGoods {
                order_id,
                delivered_on: delivered,
                received_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            PurchaseOrderEvent::GoodsReceived(e) => {
                assert_eq!(e.vendor_id, vendor_id);
                assert_eq!(e.po_number, "PO-2025-0041");
                assert_eq!(e.lines.len(), 1);
                assert_eq!(e.lines[0].quantity, 25);
                assert_eq!(e.delivered_on, delivered);
            }
            _ => panic!("Expected GoodsReceived event"),
        }

        order.apply(&events[0]);
        assert_eq!(order.status(), PurchaseOrderStatus::Received);
        assert_eq!(order.actual_delivery(), Some(delivered));
    }

    #[test]
    fn close_requires_received_and_cancel_is_blocked_after_receipt() {
        let order_id = test_order_id();
        let mut order = opened_order(order_id, test_vendor_id());
        add_line(&mut order, 5, 100);

        for cmd in [
            PurchaseOrderCommand::SubmitOrder(SubmitOrder {
                order_id,
                occurred_at: test_time(),
            }),
            PurchaseOrderCommand::ReceiveGoods(ReceiveGoods {
                order_id,
                delivered_on: order_date(),
                received_by: UserId::new(),
                occurred_at: test_time(),
            }),
        ] {
            let events = order.handle(&cmd).unwrap();
            order.apply(&events[0]);
        }

        let err = order
            .handle(&PurchaseOrderCommand::CancelOrder(CancelOrder {
                order_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));

        let events = order
            .handle(&PurchaseOrderCommand::CloseOrder(CloseOrder {
                order_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);
        assert_eq!(order.status(), PurchaseOrderStatus::Closed);
    }

    #[test]
    fn expected_delivery_before_order_date_is_rejected() {
        let order_id = test_order_id();
        let order = PurchaseOrder::empty(order_id);

        let err = order
            .handle(&PurchaseOrderCommand::OpenPurchaseOrder(OpenPurchaseOrder {
                order_id,
                po_number: "PO-1".to_string(),
                vendor_id: test_vendor_id(),
                project_id: None,
                order_date: order_date(),
                expected_delivery: NaiveDate::from_ymd_opt(2025, 3, 1),
                notes: None,
                created_by: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
