use axum::Router;

pub mod common;
pub mod equipment;
pub mod events;
pub mod issues;
pub mod materials;
pub mod projects;
pub mod purchase_orders;
pub mod system;
pub mod vendors;

pub fn router() -> Router {
    Router::new()
        .nest("/materials", materials::router())
        .nest("/material-requests", materials::requests_router())
        .nest("/vendors", vendors::router())
        .nest("/purchase-orders", purchase_orders::router())
        .nest("/projects", projects::router())
        .nest("/tasks", projects::tasks_router())
        .nest("/tickets", issues::tickets_router())
        .nest("/ncrs", issues::ncrs_router())
        .nest("/equipment", equipment::router())
        .merge(events::router())
}
