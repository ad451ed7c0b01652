//! Project and task routes.

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
use siteops_core::{AggregateId, Money, UserId};
use siteops_projects::{
    AssignMember, AssignTask, CancelProject, CompleteProject, CompleteTask, CreateProject,
    CreateTask, HoldProject, Project, ProjectCommand, ProjectId, ReopenTask, ResumeProject,
    StartProject, StartTask, SubmitTaskForReview, Task, TaskCommand, TaskId,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_project).get(list_projects))
        .route("/:id", get(get_project))
        .route("/:id/start", post(start_project))
        .route("/:id/hold", post(hold_project))
        .route("/:id/resume", post(resume_project))
        .route("/:id/complete", post(complete_project))
        .route("/:id/cancel", post(cancel_project))
        .route("/:id/members", post(assign_member))
        .route("/:id/tasks", get(list_project_tasks))
}

pub fn tasks_router() -> Router {
    Router::new()
        .route("/", post(create_task).get(list_tasks))
        .route("/:id", get(get_task))
        .route("/:id/assign", post(assign_task))
        .route("/:id/start", post(start_task))
        .route("/:id/review", post(submit_task_for_review))
        .route("/:id/complete", post(complete_task))
        .route("/:id/reopen", post(reopen_task))
}

fn make_project(id: AggregateId) -> Project {
    Project::empty(ProjectId::new(id))
}

fn make_task(id: AggregateId) -> Task {
    Task::empty(TaskId::new(id))
}

pub async fn create_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateProjectRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let cmd = ProjectCommand::CreateProject(CreateProject {
        project_id: ProjectId::new(agg),
        name: body.name,
        description: body.description,
        location: body.location,
        budget: body.budget_minor.map(Money::from_minor),
        client_id: body.client_id.map(UserId::from_uuid),
        start_date: body.start_date,
        end_date: body.end_date,
        created_by: principal.actor(),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("projects.manage")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<Project>(agg, "projects.project", cmd_auth.inner, make_project)
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

async fn project_status_command(
    services: Arc<AppServices>,
    principal: PrincipalContext,
    id: String,
    build: impl FnOnce(ProjectId) -> ProjectCommand,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("project"),
    };

    let cmd_auth = CmdAuth {
        inner: build(ProjectId::new(agg)),
        required: vec![Permission::new("projects.manage")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<Project>(agg, "projects.project", cmd_auth.inner, make_project)
        .await
    {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn start_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    project_status_command(services, principal, id, |project_id| {
        ProjectCommand::StartProject(StartProject {
            project_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn hold_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    project_status_command(services, principal, id, |project_id| {
        ProjectCommand::HoldProject(HoldProject {
            project_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn resume_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    project_status_command(services, principal, id, |project_id| {
        ProjectCommand::ResumeProject(ResumeProject {
            project_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn complete_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    project_status_command(services, principal, id, |project_id| {
        ProjectCommand::CompleteProject(CompleteProject {
            project_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn cancel_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    project_status_command(services, principal, id, |project_id| {
        ProjectCommand::CancelProject(CancelProject {
            project_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn assign_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AssignMemberRequest>,
) -> axum::response::Response {
    let user_id = UserId::from_uuid(body.user_id);
    let role = body.role;
    project_status_command(services, principal, id, move |project_id| {
        ProjectCommand::AssignMember(AssignMember {
            project_id,
            user_id,
            role,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn list_projects(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "projects.read") {
        return errors::forbidden(e);
    }

    (StatusCode::OK, Json(services.projections().projects.list())).into_response()
}

pub async fn get_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "projects.read") {
        return errors::forbidden(e);
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("project"),
    };

    match services.projections().projects.get(&ProjectId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(rm)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "project not found"),
    }
}

pub async fn list_project_tasks(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "projects.read") {
        return errors::forbidden(e);
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("project"),
    };

    (
        StatusCode::OK,
        Json(
            services
                .projections()
                .tasks
                .list_for_project(ProjectId::new(agg)),
        ),
    )
        .into_response()
}

pub async fn create_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateTaskRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let cmd = TaskCommand::CreateTask(CreateTask {
        task_id: TaskId::new(agg),
        project_id: body.project_id,
        title: body.title,
        description: body.description,
        priority: body.priority,
        due_date: body.due_date,
        assigned_to: body.assigned_to.map(UserId::from_uuid),
        created_by: principal.actor(),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("tasks.manage")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<Task>(agg, "projects.task", cmd_auth.inner, make_task)
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

async fn task_status_command(
    services: Arc<AppServices>,
    principal: PrincipalContext,
    id: String,
    build: impl FnOnce(TaskId) -> TaskCommand,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("task"),
    };

    let cmd_auth = CmdAuth {
        inner: build(TaskId::new(agg)),
        required: vec![Permission::new("tasks.manage")],
    };

    if let Err(e) = crate::authz::authorize_command(&principal, &cmd_auth) {
        return errors::forbidden(e);
    }

    match services
        .dispatch::<Task>(agg, "projects.task", cmd_auth.inner, make_task)
        .await
    {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn assign_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AssignBody>,
) -> axum::response::Response {
    let assignee = UserId::from_uuid(body.assignee);
    task_status_command(services, principal, id, move |task_id| {
        TaskCommand::AssignTask(AssignTask {
            task_id,
            assignee,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn start_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    task_status_command(services, principal, id, |task_id| {
        TaskCommand::StartTask(StartTask {
            task_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn submit_task_for_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    task_status_command(services, principal, id, |task_id| {
        TaskCommand::SubmitTaskForReview(SubmitTaskForReview {
            task_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn complete_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    task_status_command(services, principal, id, |task_id| {
        TaskCommand::CompleteTask(CompleteTask {
            task_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn reopen_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    task_status_command(services, principal, id, |task_id| {
        TaskCommand::ReopenTask(ReopenTask {
            task_id,
            occurred_at: Utc::now(),
        })
    })
    .await
}

pub async fn list_tasks(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "projects.read") {
        return errors::forbidden(e);
    }

    (StatusCode::OK, Json(services.projections().tasks.list())).into_response()
}

pub async fn get_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, "projects.read") {
        return errors::forbidden(e);
    }

    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("task"),
    };

    match services.projections().tasks.get(&TaskId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(rm)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "task not found"),
    }
}
