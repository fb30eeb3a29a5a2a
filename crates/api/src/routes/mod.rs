//! Route registration

pub mod admin;
pub mod plan_changes;
pub mod plans;
pub mod subscriptions;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let tenant_routes = Router::new()
        .route("/plans", get(plans::list_plans))
        .route("/plans/{plan_id}", get(plans::get_plan))
        .route("/subscriptions/me", get(subscriptions::get_my_subscription))
        .route("/subscriptions/me/upsell", get(subscriptions::get_my_upsell))
        .route(
            "/plan-change-requests",
            get(plan_changes::list_my_requests).post(plan_changes::create_plan_change_request),
        )
        .route(
            "/plan-change-requests/{request_id}/cancel",
            post(plan_changes::cancel_plan_change_request),
        );

    let admin_routes = Router::new()
        .route(
            "/plan-change-requests",
            get(admin::list_pending_requests),
        )
        .route(
            "/plan-change-requests/{request_id}/review",
            post(admin::review_plan_change_request),
        )
        .route(
            "/tenants/{tenant_id}/subscription",
            post(admin::assign_subscription),
        )
        .route("/invariants", get(admin::run_invariant_checks));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", tenant_routes)
        .nest("/api/v1/admin", admin_routes)
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
