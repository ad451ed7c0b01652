//! Materials inventory routes: the ledger and the request workflow.

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
use siteops_materials::{
    CreateMaterial, DecideRequest, Material, MaterialCommand, MaterialId, MaterialRequest,
    RecordTransaction, RequestCommand, RequestId, SubmitRequest, TransactionId,
    UpdateMaterialDetails,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_material).get(list_materials))
        .route("/low-stock", get(low_stock_materials))
        .route("/:id", get(get_material).put(update_material))
        .route("/:id/transactions", post(record_transaction).get(list_transactions))
}

pub fn requests_router() -> Router {
    Router::new()
        .route("/", post(submit_request).get(list_requests))
        .route("/pending", get(list_pending_requests))
        .route("/:id", get(get_request))
        .route("/:id/decision", post(decide_request))
}

pub async fn create_material(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateMaterialRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();
    let material_id = MaterialId::new(agg);
    let opening_transaction_id = TransactionId::new(AggregateId::new());

    let cmd = MaterialCommand::CreateMaterial(CreateMaterial {
        material_id,
        name: body.name,
        description: body.description,
        unit: body.unit,
        reorder_level: body.reorder_level,
        initial_quantity: body.initial_quantity,
        opening_transaction_id,
        created_by: principal.actor(),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("materials.manage")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    let committed = match services
        .dispatch::<Material>(agg, "materials.material", cmd_auth.inner, |id| {
            Material::empty(MaterialId::new(id))
        })
        .await
    {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let mut response = serde_json::json!({
        "id": agg.to_string(),
        "events_committed": committed.len(),
    });
    if body.initial_quantity > 0 {
        response["opening_transaction_id"] =
            serde_json::Value::String(opening_transaction_id.to_string());
    }

    (StatusCode::CREATED, Json(response)).into_response()
}

pub async fn update_material(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateMaterialRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("material"),
    };

    let cmd = MaterialCommand::UpdateMaterialDetails(UpdateMaterialDetails {
        material_id: MaterialId::new(agg),
        name: body.name,
        description: body.description,
        unit: body.unit,
        reorder_level: body.reorder_level,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("materials.manage")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<Material>(agg, "materials.material", cmd_auth.inner, |id| {
            Material::empty(MaterialId::new(id))
        })
        .await
    {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": agg.to_string(),
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn record_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordTransactionRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("material"),
    };

    let transaction_id = TransactionId::new(AggregateId::new());
    let cmd = MaterialCommand::RecordTransaction(RecordTransaction {
        material_id: MaterialId::new(agg),
        transaction_id,
        transaction_type: body.transaction_type,
        quantity: body.quantity,
        unit_price: body.unit_price_minor.map(Money::from_minor),
        vendor_id: body.vendor_id,
        project_id: body.project_id,
        reference_number: body.reference_number,
        notes: body.notes,
        recorded_by: principal.actor(),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("materials.transactions.record")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<Material>(agg, "materials.material", cmd_auth.inner, |id| {
            Material::empty(MaterialId::new(id))
        })
        .await
    {
        Ok(committed) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "transaction_id": transaction_id.to_string(),
                "material_id": agg.to_string(),
                "stream_version": committed.last().map(|e| e.sequence_number).unwrap_or(0),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_materials(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "materials.read") {
        return errors::forbidden(e);
    }

    (StatusCode::OK, Json(services.projections().materials.list())).into_response()
}

pub async fn low_stock_materials(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "materials.read") {
        return errors::forbidden(e);
    }

    (
        StatusCode::OK,
        Json(services.projections().materials.low_stock()),
    )
        .into_response()
}

pub async fn get_material(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "materials.read") {
        return errors::forbidden(e);
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("material"),
    };

    match services.projections().materials.get(&MaterialId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(rm)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "material not found"),
    }
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "materials.read") {
        return errors::forbidden(e);
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("material"),
    };

    match services.projections().materials.get(&MaterialId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(rm.transactions)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "material not found"),
    }
}

pub async fn submit_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::SubmitMaterialRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();
    let request_id = RequestId::new(agg);

    let cmd = RequestCommand::SubmitRequest(SubmitRequest {
        request_id,
        material_id: body.material_id,
        project_id: body.project_id,
        quantity: body.quantity,
        requested_by: principal.actor(),
        notes: body.notes,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("materials.requests.submit")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<MaterialRequest>(agg, "materials.request", cmd_auth.inner, |id| {
            MaterialRequest::empty(RequestId::new(id))
        })
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

pub async fn decide_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::DecideRequestBody>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("material request"),
    };

    let cmd = RequestCommand::DecideRequest(DecideRequest {
        request_id: RequestId::new(agg),
        decision: body.decision,
        approver: principal.actor(),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("materials.requests.decide")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<MaterialRequest>(agg, "materials.request", cmd_auth.inner, |id| {
            MaterialRequest::empty(RequestId::new(id))
        })
        .await
    {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "materials.read") {
        return errors::forbidden(e);
    }

    (StatusCode::OK, Json(services.projections().requests.list())).into_response()
}

pub async fn list_pending_requests(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "materials.read") {
        return errors::forbidden(e);
    }

    (
        StatusCode::OK,
        Json(services.projections().requests.pending()),
    )
        .into_response()
}

pub async fn get_request(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "materials.read") {
        return errors::forbidden(e);
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("material request"),
    };

    match services.projections().requests.get(&RequestId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(rm)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "material request not found"),
    }
}
