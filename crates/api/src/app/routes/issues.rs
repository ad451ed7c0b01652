//! Ticket and NCR routes.

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
use siteops_core::{AggregateId, UserId};
use siteops_issues::{
    AssignNcr, AssignTicket, CloseNcr, CloseTicket, Ncr, NcrCommand, NcrId, OpenTicket,
    RaiseNcr, ReopenTicket, ResolveNcr, ResolveTicket, StartInvestigation, StartTicket, Ticket,
    TicketCommand, TicketId,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn tickets_router() -> Router {
    Router::new()
        .route("/", post(open_ticket).get(list_tickets))
        .route("/open", get(list_open_tickets))
        .route("/:id", get(get_ticket))
        .route("/:id/assign", post(assign_ticket))
        .route("/:id/start", post(start_ticket))
        .route("/:id/resolve", post(resolve_ticket))
        .route("/:id/close", post(close_ticket))
        .route("/:id/reopen", post(reopen_ticket))
}

pub fn ncrs_router() -> Router {
    Router::new()
        .route("/", post(raise_ncr).get(list_ncrs))
        .route("/:id", get(get_ncr))
        .route("/:id/assign", post(assign_ncr))
        .route("/:id/investigate", post(start_investigation))
        .route("/:id/resolve", post(resolve_ncr))
        .route("/:id/close", post(close_ncr))
}

fn make_ticket(id: AggregateId) -> Ticket {
    Ticket::empty(TicketId::new(id))
}

fn make_ncr(id: AggregateId) -> Ncr {
    Ncr::empty(NcrId::new(id))
}

pub async fn open_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::OpenTicketRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let cmd = TicketCommand::OpenTicket(OpenTicket {
        ticket_id: TicketId::new(agg),
        project_id: body.project_id,
        title: body.title,
        description: body.description,
        priority: body.priority,
        raised_by: principal.actor(),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("tickets.open")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<Ticket>(agg, "issues.ticket", cmd_auth.inner, make_ticket)
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

async fn ticket_command(
    services: Arc<AppServices>,
    principal: PrincipalContext,
    id: String,
    build: impl FnOnce(TicketId) -> TicketCommand,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("ticket"),
    };

    let cmd_auth = CmdAuth {
        inner: build(TicketId::new(agg)),
        required: vec![Permission::new("tickets.manage")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<Ticket>(agg, "issues.ticket", cmd_auth.inner, make_ticket)
        .await
    {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn assign_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AssignBody>,
) -> axum::response::Response {
    let assignee = UserId::from_uuid(body.assignee);
    ticket_command(services, principal, id, move |ticket_id| {
        TicketCommand::AssignTicket(AssignTicket {
            ticket_id,
            assignee,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn start_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    ticket_command(services, principal, id, |ticket_id| {
        TicketCommand::StartTicket(StartTicket {
            ticket_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn resolve_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    ticket_command(services, principal, id, |ticket_id| {
        TicketCommand::ResolveTicket(ResolveTicket {
            ticket_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn close_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    ticket_command(services, principal, id, |ticket_id| {
        TicketCommand::CloseTicket(CloseTicket {
            ticket_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn reopen_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    ticket_command(services, principal, id, |ticket_id| {
        TicketCommand::ReopenTicket(ReopenTicket {
            ticket_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn list_tickets(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "issues.read") {
        return errors::forbidden(e);
    }

    (StatusCode::OK, Json(services.projections().tickets.list())).into_response()
}

pub async fn list_open_tickets(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "issues.read") {
        return errors::forbidden(e);
    }

    (StatusCode::OK, Json(services.projections().tickets.open())).into_response()
}

pub async fn get_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "issues.read") {
        return errors::forbidden(e);
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("ticket"),
    };

    match services.projections().tickets.get(&TicketId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(rm)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "ticket not found"),
    }
}

pub async fn raise_ncr(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RaiseNcrRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let cmd = NcrCommand::RaiseNcr(RaiseNcr {
        ncr_id: NcrId::new(agg),
        ncr_number: body.ncr_number,
        project_id: body.project_id,
        title: body.title,
        description: body.description,
        category: body.category,
        severity: body.severity,
        raised_by: principal.actor(),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("ncrs.manage")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<Ncr>(agg, "issues.ncr", cmd_auth.inner, make_ncr)
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

async fn ncr_command(
    services: Arc<AppServices>,
    principal: PrincipalContext,
    id: String,
    build: impl FnOnce(NcrId) -> NcrCommand,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("ncr"),
    };

    let cmd_auth = CmdAuth {
        inner: build(NcrId::new(agg)),
        required: vec![Permission::new("ncrs.manage")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<Ncr>(agg, "issues.ncr", cmd_auth.inner, make_ncr)
        .await
    {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn assign_ncr(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AssignBody>,
) -> axum::response::Response {
    let assignee = UserId::from_uuid(body.assignee);
    ncr_command(services, principal, id, move |ncr_id| {
        NcrCommand::AssignNcr(AssignNcr {
            ncr_id,
            assignee,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn start_investigation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    ncr_command(services, principal, id, |ncr_id| {
        NcrCommand::StartInvestigation(StartInvestigation {
            ncr_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn resolve_ncr(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ResolveNcrRequest>,
) -> axum::response::Response {
    ncr_command(services, principal, id, move |ncr_id| {
        NcrCommand::ResolveNcr(ResolveNcr {
            ncr_id,
            root_cause: body.root_cause,
            corrective_action: body.corrective_action,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn close_ncr(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    ncr_command(services, principal, id, |ncr_id| {
        NcrCommand::CloseNcr(CloseNcr {
            ncr_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn list_ncrs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "issues.read") {
        return errors::forbidden(e);
    }

    (StatusCode::OK, Json(services.projections().ncrs.list())).into_response()
}

pub async fn get_ncr(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "issues.read") {
        return errors::forbidden(e);
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("ncr"),
    };

    match services.projections().ncrs.get(&NcrId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(rm)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "ncr not found"),
    }
}
