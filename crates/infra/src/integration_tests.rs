//! End-to-end tests over the in-memory pipeline: dispatcher + event store +
//! bus + projections + handlers.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;

use siteops_core::{AggregateId, Money, UserId};
use siteops_events::{EventBus, EventEnvelope, InMemoryEventBus};
use siteops_materials::{
    CreateMaterial, DecideRequest, Material, MaterialCommand, MaterialId, MaterialRequest,
    RecordTransaction, RequestCommand, RequestDecision, RequestId, RequestStatus, SubmitRequest,
    TransactionId, TransactionType,
};
use siteops_procurement::{
    AddOrderLine, OpenPurchaseOrder, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderId,
    ReceiveGoods, SubmitOrder,
};
use siteops_projects::ProjectId;
use siteops_vendors::VendorId;

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, InMemoryEventStore};
use crate::handlers::GoodsReceiptHandler;
use crate::projections::{MaterialReadModel, MaterialStockProjection};
use crate::read_model::InMemoryReadStore;

type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<Bus>>;

fn pipeline() -> (Arc<InMemoryEventStore>, Arc<Bus>, Arc<Dispatcher>) {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<Bus> = Arc::new(InMemoryEventBus::new());
    let dispatcher = Arc::new(CommandDispatcher::new(store.clone(), bus.clone()));
    (store, bus, dispatcher)
}

fn stock_projection() -> MaterialStockProjection<Arc<InMemoryReadStore<MaterialId, MaterialReadModel>>>
{
    MaterialStockProjection::new(Arc::new(InMemoryReadStore::new()))
}

async fn create_material(
    dispatcher: &Dispatcher,
    initial_quantity: i64,
    reorder_level: i64,
) -> MaterialId {
    let aggregate_id = AggregateId::new();
    let material_id = MaterialId::new(aggregate_id);

    dispatcher
        .dispatch::<Material>(
            aggregate_id,
            "materials.material",
            MaterialCommand::CreateMaterial(CreateMaterial {
                material_id,
                name: "Cement".to_string(),
                description: None,
                unit: "bags".to_string(),
                reorder_level,
                initial_quantity,
                opening_transaction_id: TransactionId::new(AggregateId::new()),
                created_by: UserId::new(),
                occurred_at: Utc::now(),
            }),
            |id| Material::empty(MaterialId::new(id)),
        )
        .await
        .unwrap();

    material_id
}

fn record_command(
    material_id: MaterialId,
    transaction_type: TransactionType,
    quantity: i64,
) -> MaterialCommand {
    MaterialCommand::RecordTransaction(RecordTransaction {
        material_id,
        transaction_id: TransactionId::new(AggregateId::new()),
        transaction_type,
        quantity,
        unit_price: None,
        vendor_id: None,
        project_id: None,
        reference_number: None,
        notes: None,
        recorded_by: UserId::new(),
        occurred_at: Utc::now(),
    })
}

async fn record(
    dispatcher: &Dispatcher,
    material_id: MaterialId,
    transaction_type: TransactionType,
    quantity: i64,
) -> Result<(), DispatchError> {
    dispatcher
        .dispatch_with_retry::<Material>(
            material_id.0,
            "materials.material",
            record_command(material_id, transaction_type, quantity),
            |id| Material::empty(MaterialId::new(id)),
        )
        .await
        .map(|_| ())
}

#[tokio::test]
async fn sequential_transactions_net_out() {
    let (_store, bus, dispatcher) = pipeline();
    let projection = stock_projection();
    let sub = bus.subscribe();

    let material_id = create_material(&dispatcher, 0, 10).await;

    record(&dispatcher, material_id, TransactionType::Inflow, 120)
        .await
        .unwrap();
    record(&dispatcher, material_id, TransactionType::Outflow, 45)
        .await
        .unwrap();
    record(&dispatcher, material_id, TransactionType::Outflow, 5)
        .await
        .unwrap();

    while let Ok(env) = sub.try_recv() {
        projection.apply_envelope(&env).unwrap();
    }

    let rm = projection.get(&material_id).unwrap();
    assert_eq!(rm.quantity, 120 - 45 - 5);
    assert_eq!(rm.transactions.len(), 3);
}

#[tokio::test]
async fn overdraw_fails_and_appends_nothing() {
    let (store, _bus, dispatcher) = pipeline();
    let material_id = create_material(&dispatcher, 30, 10).await;

    let before = store.load_stream(material_id.0).await.unwrap().len();

    let err = record(&dispatcher, material_id, TransactionType::Outflow, 31)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvariantViolation(_)));

    let after = store.load_stream(material_id.0).await.unwrap().len();
    assert_eq!(before, after);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inflows_converge() {
    // Lost-update regression: two concurrent inflows of 5 from 0 must end at
    // 10, not 5. The second writer conflicts on the stream version and
    // retries against fresh state.
    let (store, _bus, dispatcher) = pipeline();
    let material_id = create_material(&dispatcher, 0, 0).await;

    let a = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            record(&dispatcher, material_id, TransactionType::Inflow, 5).await
        })
    };
    let b = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            record(&dispatcher, material_id, TransactionType::Inflow, 5).await
        })
    };

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    // Rehydrate from the stream: quantity is event-derived.
    let history = store.load_stream(material_id.0).await.unwrap();
    let mut material = Material::empty(material_id);
    for stored in &history {
        let event = serde_json::from_value(stored.payload.clone()).unwrap();
        siteops_core::Aggregate::apply(&mut material, &event);
    }

    assert_eq!(material.quantity(), 10);
}

#[tokio::test]
async fn cement_scenario_end_to_end() {
    // Cement: 100 on hand, reorder 20. Outflow 85 -> 15 (low). Inflow 200 ->
    // 215 (not low). Outflow 9000 -> fails, quantity stays 215.
    let (_store, bus, dispatcher) = pipeline();
    let projection = stock_projection();
    let sub = bus.subscribe();

    let material_id = create_material(&dispatcher, 100, 20).await;

    record(&dispatcher, material_id, TransactionType::Outflow, 85)
        .await
        .unwrap();
    while let Ok(env) = sub.try_recv() {
        projection.apply_envelope(&env).unwrap();
    }
    let rm = projection.get(&material_id).unwrap();
    assert_eq!(rm.quantity, 15);
    assert!(rm.is_low_stock());
    assert_eq!(projection.low_stock().len(), 1);

    record(&dispatcher, material_id, TransactionType::Inflow, 200)
        .await
        .unwrap();
    while let Ok(env) = sub.try_recv() {
        projection.apply_envelope(&env).unwrap();
    }
    let rm = projection.get(&material_id).unwrap();
    assert_eq!(rm.quantity, 215);
    assert!(!rm.is_low_stock());
    assert!(projection.low_stock().is_empty());

    let err = record(&dispatcher, material_id, TransactionType::Outflow, 9000)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvariantViolation(_)));
    while let Ok(env) = sub.try_recv() {
        projection.apply_envelope(&env).unwrap();
    }
    assert_eq!(projection.get(&material_id).unwrap().quantity, 215);
}

#[tokio::test]
async fn request_is_decided_at_most_once() {
    let (_store, _bus, dispatcher) = pipeline();

    let aggregate_id = AggregateId::new();
    let request_id = RequestId::new(aggregate_id);

    dispatcher
        .dispatch::<MaterialRequest>(
            aggregate_id,
            "materials.request",
            RequestCommand::SubmitRequest(SubmitRequest {
                request_id,
                material_id: MaterialId::new(AggregateId::new()),
                project_id: ProjectId::new(AggregateId::new()),
                quantity: 40,
                requested_by: UserId::new(),
                notes: None,
                occurred_at: Utc::now(),
            }),
            |id| MaterialRequest::empty(RequestId::new(id)),
        )
        .await
        .unwrap();

    let decide = |decision: RequestDecision| {
        RequestCommand::DecideRequest(DecideRequest {
            request_id,
            decision,
            approver: UserId::new(),
            occurred_at: Utc::now(),
        })
    };

    dispatcher
        .dispatch::<MaterialRequest>(
            aggregate_id,
            "materials.request",
            decide(RequestDecision::Approve),
            |id| MaterialRequest::empty(RequestId::new(id)),
        )
        .await
        .unwrap();

    let err = dispatcher
        .dispatch::<MaterialRequest>(
            aggregate_id,
            "materials.request",
            decide(RequestDecision::Reject),
            |id| MaterialRequest::empty(RequestId::new(id)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvalidTransition(msg) if msg.contains(RequestStatus::Approved.as_str())));
}

#[tokio::test]
async fn receiving_a_purchase_order_restocks_the_ledger() {
    let (store, bus, dispatcher) = pipeline();
    let handler = GoodsReceiptHandler::new(dispatcher.clone());
    let sub = bus.subscribe();

    let cement = create_material(&dispatcher, 10, 5).await;
    let sand = create_material(&dispatcher, 0, 5).await;

    let order_aggregate = AggregateId::new();
    let order_id = PurchaseOrderId::new(order_aggregate);
    let vendor_id = VendorId::new(AggregateId::new());
    let order_date = chrono::NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();

    let make_order = |id: AggregateId| PurchaseOrder::empty(PurchaseOrderId::new(id));

    dispatcher
        .dispatch::<PurchaseOrder>(
            order_aggregate,
            "procurement.order",
            PurchaseOrderCommand::OpenPurchaseOrder(OpenPurchaseOrder {
                order_id,
                po_number: "PO-2025-0099".to_string(),
                vendor_id,
                project_id: None,
                order_date,
                expected_delivery: None,
                notes: None,
                created_by: UserId::new(),
                occurred_at: Utc::now(),
            }),
            make_order,
        )
        .await
        .unwrap();

    for (material_id, quantity, unit_price) in [(cement, 40, 1250), (sand, 15, 300)] {
        dispatcher
            .dispatch::<PurchaseOrder>(
                order_aggregate,
                "procurement.order",
                PurchaseOrderCommand::AddOrderLine(AddOrderLine {
                    order_id,
                    material_id,
                    quantity,
                    unit_price: Money::from_minor(unit_price),
                    occurred_at: Utc::now(),
                }),
                make_order,
            )
            .await
            .unwrap();
    }

    dispatcher
        .dispatch::<PurchaseOrder>(
            order_aggregate,
            "procurement.order",
            PurchaseOrderCommand::SubmitOrder(SubmitOrder {
                order_id,
                occurred_at: Utc::now(),
            }),
            make_order,
        )
        .await
        .unwrap();

    dispatcher
        .dispatch::<PurchaseOrder>(
            order_aggregate,
            "procurement.order",
            PurchaseOrderCommand::ReceiveGoods(ReceiveGoods {
                order_id,
                delivered_on: order_date,
                received_by: UserId::new(),
                occurred_at: Utc::now(),
            }),
            make_order,
        )
        .await
        .unwrap();

    // Feed published envelopes through the handler (this includes material
    // envelopes, which it ignores).
    while let Ok(env) = sub.try_recv() {
        handler.handle_envelope(&env).await.unwrap();
    }

    let projection = stock_projection();
    projection
        .rebuild_from_scratch(
            store
                .all_envelopes()
                .into_iter()
                .filter(|e| e.aggregate_type() == "materials.material"),
        )
        .unwrap();

    let cement_rm = projection.get(&cement).unwrap();
    assert_eq!(cement_rm.quantity, 50);
    let last = cement_rm.transactions.last().unwrap();
    assert_eq!(last.reference_number.as_deref(), Some("PO-2025-0099"));
    assert_eq!(last.vendor_id, Some(vendor_id));
    assert_eq!(last.unit_price, Some(Money::from_minor(1250)));

    assert_eq!(projection.get(&sand).unwrap().quantity, 15);
}
