//! Infrastructure wiring: event store/bus, dispatcher, projections, and the
//! background subscriber that feeds them.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;

use siteops_core::{Aggregate, AggregateId, DomainError};
use siteops_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use siteops_infra::command_dispatcher::{CommandDispatcher, DispatchError};
use siteops_infra::event_store::{
    EventStore, InMemoryEventStore, PostgresEventStore, StoredEvent,
};
use siteops_infra::handlers::GoodsReceiptHandler;
use siteops_infra::projections::{
    EquipmentProjection, EquipmentReadModel, MaterialReadModel, MaterialStockProjection,
    NcrReadModel, NcrsProjection, ProjectDirectoryProjection, ProjectReadModel,
    PurchaseOrderReadModel, PurchaseOrdersProjection, RequestReadModel, RequestsProjection,
    TaskReadModel, TasksProjection, TicketReadModel, TicketsProjection,
    VendorDirectoryProjection, VendorReadModel,
};
use siteops_infra::read_model::{InMemoryPriceBook, InMemoryReadStore};
use siteops_materials::{MaterialEvent, MaterialId, RequestId};
use siteops_procurement::PurchaseOrderId;
use siteops_projects::{ProjectId, TaskId};
use siteops_issues::{NcrId, TicketId};
use siteops_equipment::EquipmentId;
use siteops_vendors::VendorId;

/// Realtime message broadcast to the dashboard via SSE.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMessage {
    pub topic: String,
    pub payload: JsonValue,
}

type MemBus = InMemoryEventBus<EventEnvelope<JsonValue>>;

type InMemoryDispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<MemBus>>;

#[cfg(not(feature = "redis"))]
type PersistentBus = MemBus;
#[cfg(feature = "redis")]
type PersistentBus = siteops_infra::event_bus::RedisPubSubEventBus;

type PersistentDispatcher = CommandDispatcher<Arc<PostgresEventStore>, Arc<PersistentBus>>;

type Store<K, V> = Arc<InMemoryReadStore<K, V>>;

/// Read models are in-memory in both modes; the event store is the durable
/// source of truth and projections rebuild from it.
pub struct Projections {
    pub materials: Arc<MaterialStockProjection<Store<MaterialId, MaterialReadModel>>>,
    pub requests: Arc<RequestsProjection<Store<RequestId, RequestReadModel>>>,
    pub vendors: Arc<VendorDirectoryProjection<Store<VendorId, VendorReadModel>>>,
    pub purchase_orders: Arc<PurchaseOrdersProjection<Store<PurchaseOrderId, PurchaseOrderReadModel>>>,
    pub projects: Arc<ProjectDirectoryProjection<Store<ProjectId, ProjectReadModel>>>,
    pub tasks: Arc<TasksProjection<Store<TaskId, TaskReadModel>>>,
    pub tickets: Arc<TicketsProjection<Store<TicketId, TicketReadModel>>>,
    pub ncrs: Arc<NcrsProjection<Store<NcrId, NcrReadModel>>>,
    pub equipment: Arc<EquipmentProjection<Store<EquipmentId, EquipmentReadModel>>>,
}

impl Projections {
    fn new() -> Self {
        Self {
            materials: Arc::new(MaterialStockProjection::new(Arc::new(InMemoryReadStore::new()))),
            requests: Arc::new(RequestsProjection::new(Arc::new(InMemoryReadStore::new()))),
            vendors: Arc::new(VendorDirectoryProjection::new(Arc::new(InMemoryReadStore::new()))),
            purchase_orders: Arc::new(PurchaseOrdersProjection::new(Arc::new(
                InMemoryReadStore::new(),
            ))),
            projects: Arc::new(ProjectDirectoryProjection::new(Arc::new(
                InMemoryReadStore::new(),
            ))),
            tasks: Arc::new(TasksProjection::new(Arc::new(InMemoryReadStore::new()))),
            tickets: Arc::new(TicketsProjection::new(Arc::new(InMemoryReadStore::new()))),
            ncrs: Arc::new(NcrsProjection::new(Arc::new(InMemoryReadStore::new()))),
            equipment: Arc::new(EquipmentProjection::new(Arc::new(InMemoryReadStore::new()))),
        }
    }

    /// Apply a published envelope to the projection owning its stream.
    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), String> {
        match envelope.aggregate_type() {
            "materials.material" => self
                .materials
                .apply_envelope(envelope)
                .map_err(|e| e.to_string()),
            "materials.request" => self
                .requests
                .apply_envelope(envelope)
                .map_err(|e| e.to_string()),
            "vendors.vendor" => self
                .vendors
                .apply_envelope(envelope)
                .map_err(|e| e.to_string()),
            "procurement.order" => self
                .purchase_orders
                .apply_envelope(envelope)
                .map_err(|e| e.to_string()),
            "projects.project" => self
                .projects
                .apply_envelope(envelope)
                .map_err(|e| e.to_string()),
            "projects.task" => self.tasks.apply_envelope(envelope).map_err(|e| e.to_string()),
            "issues.ticket" => self
                .tickets
                .apply_envelope(envelope)
                .map_err(|e| e.to_string()),
            "issues.ncr" => self.ncrs.apply_envelope(envelope).map_err(|e| e.to_string()),
            "equipment.unit" => self
                .equipment
                .apply_envelope(envelope)
                .map_err(|e| e.to_string()),
            _ => Ok(()),
        }
    }
}

#[derive(Clone)]
enum DispatcherHandle {
    InMemory(Arc<InMemoryDispatcher>),
    Persistent(Arc<PersistentDispatcher>),
}

#[derive(Clone)]
pub struct AppServices {
    dispatcher: DispatcherHandle,
    projections: Arc<Projections>,
    price_book: Arc<InMemoryPriceBook>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

impl AppServices {
    /// Dispatch a command with per-aggregate retry on concurrency conflicts.
    pub async fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl Fn(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate,
        A::Error: Into<DomainError>,
        A::Event: siteops_events::Event + Serialize + DeserializeOwned,
    {
        match &self.dispatcher {
            DispatcherHandle::InMemory(d) => {
                d.dispatch_with_retry::<A>(aggregate_id, aggregate_type, command, make_aggregate)
                    .await
            }
            DispatcherHandle::Persistent(d) => {
                d.dispatch_with_retry::<A>(aggregate_id, aggregate_type, command, make_aggregate)
                    .await
            }
        }
    }

    pub fn projections(&self) -> &Projections {
        &self.projections
    }

    pub fn price_book(&self) -> &Arc<InMemoryPriceBook> {
        &self.price_book
    }

    pub fn subscribe_realtime(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.realtime_tx.subscribe()
    }
}

pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        build_persistent_services().await
    } else {
        build_in_memory_services()
    }
}

fn build_in_memory_services() -> AppServices {
    eprintln!("DBG build_in_memory_services: start");
    // In-memory infra wiring (dev/test): store + bus + projections.
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Arc<MemBus> = Arc::new(InMemoryEventBus::new());
    eprintln!("DBG build_in_memory_services: store+bus done");

    let projections = Arc::new(Projections::new());
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);
    eprintln!("DBG build_in_memory_services: projections done");

    let dispatcher: Arc<InMemoryDispatcher> =
        Arc::new(CommandDispatcher::new(store.clone(), bus.clone()));
    eprintln!("DBG build_in_memory_services: before spawn_subscriber");

    spawn_subscriber(
        bus.subscribe(),
        dispatcher.clone(),
        projections.clone(),
        realtime_tx.clone(),
    );

    eprintln!("DBG build_in_memory_services: after spawn_subscriber, returning");
    AppServices {
        dispatcher: DispatcherHandle::InMemory(dispatcher),
        projections,
        price_book: Arc::new(InMemoryPriceBook::new()),
        realtime_tx,
    }
}

async fn build_persistent_services() -> AppServices {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for persistent stores");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .expect("failed to connect to Postgres");
    let store = Arc::new(PostgresEventStore::new(pool));

    let bus: Arc<PersistentBus> = build_persistent_bus();

    let projections = Arc::new(Projections::new());
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    let dispatcher: Arc<PersistentDispatcher> =
        Arc::new(CommandDispatcher::new(store.clone(), bus.clone()));

    spawn_subscriber(
        bus.subscribe(),
        dispatcher.clone(),
        projections.clone(),
        realtime_tx.clone(),
    );

    AppServices {
        dispatcher: DispatcherHandle::Persistent(dispatcher),
        projections,
        price_book: Arc::new(InMemoryPriceBook::new()),
        realtime_tx,
    }
}

#[cfg(not(feature = "redis"))]
fn build_persistent_bus() -> Arc<PersistentBus> {
    Arc::new(InMemoryEventBus::new())
}

#[cfg(feature = "redis")]
fn build_persistent_bus() -> Arc<PersistentBus> {
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
    Arc::new(
        siteops_infra::event_bus::RedisPubSubEventBus::new(redis_url, "siteops.events")
            .expect("failed to connect to Redis"),
    )
}

/// Background subscriber: bus -> projections -> alerts/realtime.
///
/// Runs on a blocking thread; the async goods-receipt handler is driven via
/// the runtime handle captured at spawn time.
fn spawn_subscriber<S, B>(
    sub: Subscription<EventEnvelope<JsonValue>>,
    dispatcher: Arc<CommandDispatcher<S, B>>,
    projections: Arc<Projections>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
) where
    S: EventStore + Send + Sync + 'static,
    B: EventBus<EventEnvelope<JsonValue>> + Send + Sync + 'static,
{
    let handle = tokio::runtime::Handle::current();
    let goods_receipt = GoodsReceiptHandler::new(dispatcher);

    tokio::task::spawn_blocking(move || {
        loop {
            let envelope = match sub.recv() {
                Ok(envelope) => envelope,
                Err(_) => break,
            };

            if let Err(e) = projections.apply(&envelope) {
                tracing::warn!("projection apply failed: {e}");
                continue;
            }

            // Procurement receipts restock the ledger.
            if let Err(err) = handle.block_on(goods_receipt.handle_envelope(&envelope)) {
                tracing::error!(?err, "goods receipt handling failed");
            }

            maybe_alert_low_stock(&projections, &realtime_tx, &envelope);

            // Broadcast projection update (lossy; no backpressure on core).
            let aggregate_type = envelope.aggregate_type().to_string();
            let _ = realtime_tx.send(RealtimeMessage {
                topic: format!("{aggregate_type}.projection_updated"),
                payload: serde_json::json!({
                    "kind": "projection_update",
                    "aggregate_type": aggregate_type,
                    "aggregate_id": envelope.aggregate_id().to_string(),
                    "sequence_number": envelope.sequence_number(),
                }),
            });
        }
    });
}

/// Low-stock alerting: re-evaluated after every applied ledger transaction.
fn maybe_alert_low_stock(
    projections: &Projections,
    realtime_tx: &broadcast::Sender<RealtimeMessage>,
    envelope: &EventEnvelope<JsonValue>,
) {
    if envelope.aggregate_type() != "materials.material" {
        return;
    }
    let Ok(MaterialEvent::TransactionRecorded(event)) =
        serde_json::from_value::<MaterialEvent>(envelope.payload().clone())
    else {
        return;
    };

    let Some(material) = projections.materials.get(&event.material_id) else {
        return;
    };

    if material.is_low_stock() {
        tracing::warn!(
            material = %material.name,
            quantity = material.quantity,
            reorder_level = material.reorder_level,
            "material at or below reorder level"
        );
        let _ = realtime_tx.send(RealtimeMessage {
            topic: "materials.low_stock".to_string(),
            payload: serde_json::json!({
                "kind": "alert",
                "material_id": material.material_id.to_string(),
                "name": material.name,
                "quantity": material.quantity,
                "reorder_level": material.reorder_level,
            }),
        });
    }
}
