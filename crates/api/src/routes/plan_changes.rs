//! Tenant-side plan-change request routes

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use talentry_subscriptions::{
    classify_change, CatalogSnapshot, ChangeDirection, PlanChangeRequest,
};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePlanChangeBody {
    pub requested_plan_id: Uuid,
    pub message: Option<String>,
}

/// A request annotated with its display classification. Direction is
/// informational only and is None when either plan has left the catalog.
#[derive(Debug, Serialize)]
pub struct PlanChangeRequestResponse {
    #[serde(flatten)]
    pub request: PlanChangeRequest,
    pub direction: Option<ChangeDirection>,
}

pub(crate) fn annotate(
    snapshot: &CatalogSnapshot,
    request: PlanChangeRequest,
) -> PlanChangeRequestResponse {
    let direction = match (
        snapshot.plan(request.current_plan_id),
        snapshot.plan(request.requested_plan_id),
    ) {
        (Some(current), Some(requested)) => Some(classify_change(
            current.price_monthly,
            requested.price_monthly,
        )),
        _ => None,
    };
    PlanChangeRequestResponse { request, direction }
}

/// POST /api/v1/plan-change-requests
pub async fn create_plan_change_request(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Json(body): Json<CreatePlanChangeBody>,
) -> ApiResult<(StatusCode, Json<PlanChangeRequestResponse>)> {
    let request = state
        .core
        .workflow
        .request_plan_change(&actor, body.requested_plan_id, body.message)
        .await?;

    let snapshot = state.core.catalog.snapshot().await?;
    Ok((StatusCode::CREATED, Json(annotate(&snapshot, request))))
}

/// GET /api/v1/plan-change-requests
///
/// The caller's tenant history, newest first.
pub async fn list_my_requests(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<Json<Vec<PlanChangeRequest>>> {
    let tenant_id = actor.tenant_id.ok_or(ApiError::Forbidden)?;
    let requests = state.core.workflow.requests_for_tenant(tenant_id).await?;
    Ok(Json(requests))
}

/// POST /api/v1/plan-change-requests/{id}/cancel
pub async fn cancel_plan_change_request(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(request_id): Path<Uuid>,
) -> ApiResult<Json<PlanChangeRequest>> {
    let cancelled = state.core.workflow.cancel_request(request_id, &actor).await?;
    Ok(Json(cancelled))
}
