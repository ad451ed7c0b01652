//! Purchase order routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use siteops_auth::Permission;
use siteops_core::{AggregateId, Money};
use siteops_procurement::{
    AddOrderLine, CancelOrder, CloseOrder, OpenPurchaseOrder, PurchaseOrder, PurchaseOrderCommand,
    PurchaseOrderId, ReceiveGoods, SubmitOrder,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(open_order).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/lines", post(add_line))
        .route("/:id/submit", post(submit_order))
        .route("/:id/receive", post(receive_goods))
        .route("/:id/close", post(close_order))
        .route("/:id/cancel", post(cancel_order))
}

fn make_order(id: AggregateId) -> PurchaseOrder {
    PurchaseOrder::empty(PurchaseOrderId::new(id))
}

pub async fn open_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::OpenPurchaseOrderRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let cmd = PurchaseOrderCommand::OpenPurchaseOrder(OpenPurchaseOrder {
        order_id: PurchaseOrderId::new(agg),
        po_number: body.po_number,
        vendor_id: body.vendor_id,
        project_id: body.project_id,
        order_date: body.order_date,
        expected_delivery: body.expected_delivery,
        notes: body.notes,
        created_by: principal.actor(),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("procurement.orders.manage")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<PurchaseOrder>(agg, "procurement.order", cmd_auth.inner, make_order)
        .await
    {
        Ok(_) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": agg.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn add_line(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddOrderLineRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("purchase order"),
    };

    let cmd = PurchaseOrderCommand::AddOrderLine(AddOrderLine {
        order_id: PurchaseOrderId::new(agg),
        material_id: body.material_id,
        quantity: body.quantity,
        unit_price: Money::from_minor(body.unit_price_minor),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("procurement.orders.manage")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<PurchaseOrder>(agg, "procurement.order", cmd_auth.inner, make_order)
        .await
    {
        Ok(committed) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "id": agg.to_string(),
                "stream_version": committed.last().map(|e| e.sequence_number).unwrap_or(0),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

async fn status_command(
    services: Arc<AppServices>,
    principal: PrincipalContext,
    id: String,
    permission: &'static str,
    build: impl FnOnce(PurchaseOrderId) -> PurchaseOrderCommand,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("purchase order"),
    };

    let cmd_auth = CmdAuth {
        inner: build(PurchaseOrderId::new(agg)),
        required: vec![Permission::new(permission)],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<PurchaseOrder>(agg, "procurement.order", cmd_auth.inner, make_order)
        .await
    {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn submit_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    status_command(services, principal, id, "procurement.orders.manage", |order_id| {
        PurchaseOrderCommand::SubmitOrder(SubmitOrder {
            order_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn receive_goods(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReceiveGoodsRequest>,
) -> axum::response::Response {
    let actor = principal.actor();
    status_command(services, principal, id, "procurement.orders.receive", |order_id| {
        PurchaseOrderCommand::ReceiveGoods(ReceiveGoods {
            order_id,
            delivered_on: body.delivered_on,
            received_by: actor,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn close_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    status_command(services, principal, id, "procurement.orders.manage", |order_id| {
        PurchaseOrderCommand::CloseOrder(CloseOrder {
            order_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    status_command(services, principal, id, "procurement.orders.manage", |order_id| {
        PurchaseOrderCommand::CancelOrder(CancelOrder {
            order_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "procurement.read") {
        return errors::forbidden(e);
    }

    (
        StatusCode::OK,
        Json(services.projections().purchase_orders.list()),
    )
        .into_response()
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "procurement.read") {
        return errors::forbidden(e);
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("purchase order"),
    };

    match services
        .projections()
        .purchase_orders
        .get(&PurchaseOrderId::new(agg))
    {
        Some(rm) => (StatusCode::OK, Json(rm)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "purchase order not found"),
    }
}
