//! Equipment registry routes.

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
use siteops_core::AggregateId;
use siteops_equipment::{
    AllocateEquipment, CompleteMaintenance, Equipment, EquipmentCommand, EquipmentId,
    RegisterEquipment, ReturnEquipment, StartMaintenance,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_equipment).get(list_equipment))
        .route("/available", get(list_available))
        .route("/:id", get(get_equipment))
        .route("/:id/allocate", post(allocate_equipment))
        .route("/:id/return", post(return_equipment))
        .route("/:id/maintenance/start", post(start_maintenance))
        .route("/:id/maintenance/complete", post(complete_maintenance))
}

fn make_equipment(id: AggregateId) -> Equipment {
    Equipment::empty(EquipmentId::new(id))
}

pub async fn register_equipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RegisterEquipmentRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let cmd = EquipmentCommand::RegisterEquipment(RegisterEquipment {
        equipment_id: EquipmentId::new(agg),
        name: body.name,
        description: body.description,
        quantity: body.quantity,
        location: body.location,
        next_maintenance: body.next_maintenance,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("equipment.manage")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<Equipment>(agg, "equipment.unit", cmd_auth.inner, make_equipment)
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

async fn equipment_command(
    services: Arc<AppServices>,
    principal: PrincipalContext,
    id: String,
    build: impl FnOnce(EquipmentId) -> EquipmentCommand,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("equipment"),
    };

    let cmd_auth = CmdAuth {
        inner: build(EquipmentId::new(agg)),
        required: vec![Permission::new("equipment.manage")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<Equipment>(agg, "equipment.unit", cmd_auth.inner, make_equipment)
        .await
    {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn allocate_equipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AllocateEquipmentRequest>,
) -> axum::response::Response {
    let allocated_by = principal.actor();
    let project_id = body.project_id;
    equipment_command(services, principal, id, move |equipment_id| {
        EquipmentCommand::AllocateEquipment(AllocateEquipment {
            equipment_id,
            project_id,
            allocated_by,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn return_equipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    equipment_command(services, principal, id, |equipment_id| {
        EquipmentCommand::ReturnEquipment(ReturnEquipment {
            equipment_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn start_maintenance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    equipment_command(services, principal, id, |equipment_id| {
        EquipmentCommand::StartMaintenance(StartMaintenance {
            equipment_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn complete_maintenance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CompleteMaintenanceRequest>,
) -> axum::response::Response {
    equipment_command(services, principal, id, move |equipment_id| {
        EquipmentCommand::CompleteMaintenance(CompleteMaintenance {
            equipment_id,
            performed_on: body.performed_on,
            next_maintenance: body.next_maintenance,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn list_equipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "equipment.read") {
        return errors::forbidden(e);
    }

    (StatusCode::OK, Json(services.projections().equipment.list())).into_response()
}

pub async fn list_available(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "equipment.read") {
        return errors::forbidden(e);
    }

    (
        StatusCode::OK,
        Json(services.projections().equipment.available()),
    )
        .into_response()
}

pub async fn get_equipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "equipment.read") {
        return errors::forbidden(e);
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("equipment"),
    };

    match services.projections().equipment.get(&EquipmentId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(rm)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "equipment not found"),
    }
}
