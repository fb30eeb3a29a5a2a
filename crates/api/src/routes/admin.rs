//! Platform-administration routes
//!
//! Review queue, review decisions, initial plan assignment, and the
//! invariant check runner. Every handler requires a platform admin.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use talentry_shared::BillingCycle;
use talentry_subscriptions::{
    InvariantChecker, NewSubscription, PendingRequestSummary, ReviewDecision, SubscriptionRecord,
};

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::plan_changes::{annotate, PlanChangeRequestResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PendingRequestResponse {
    #[serde(flatten)]
    pub request: PlanChangeRequestResponse,
    pub tenant_name: String,
}

/// GET /api/v1/admin/plan-change-requests?status=pending
///
/// The review queue, oldest first. Only the pending filter is served;
/// terminal requests are read through the tenant history endpoint.
pub async fn list_pending_requests(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Query(query): Query<PendingQuery>,
) -> ApiResult<Json<Vec<PendingRequestResponse>>> {
    match query.status.as_deref() {
        None | Some("pending") => {}
        Some(other) => {
            return Err(ApiError::Validation(format!(
                "unsupported status filter: {other}"
            )))
        }
    }

    let summaries = state.core.workflow.pending_requests(&actor).await?;
    let snapshot = state.core.catalog.snapshot().await?;

    let responses = summaries
        .into_iter()
        .map(|PendingRequestSummary { request, tenant_name }| PendingRequestResponse {
            request: annotate(&snapshot, request),
            tenant_name,
        })
        .collect();
    Ok(Json(responses))
}

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
    pub decision: ReviewDecision,
    pub message: Option<String>,
}

/// POST /api/v1/admin/plan-change-requests/{id}/review
pub async fn review_plan_change_request(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Path(request_id): Path<Uuid>,
    Json(body): Json<ReviewBody>,
) -> ApiResult<Json<PlanChangeRequestResponse>> {
    let reviewed = state
        .core
        .workflow
        .review_request(request_id, body.decision, &actor, body.message)
        .await?;

    let snapshot = state.core.catalog.snapshot().await?;
    Ok(Json(annotate(&snapshot, reviewed)))
}

#[derive(Debug, Deserialize)]
pub struct AssignSubscriptionBody {
    pub plan_id: Uuid,
    #[serde(default)]
    pub billing_cycle: BillingCycle,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub trial_end_date: Option<OffsetDateTime>,
}

/// POST /api/v1/admin/tenants/{tenant_id}/subscription
///
/// One-time initial plan assignment at tenant onboarding. Conflicts if
/// the tenant already holds a subscription.
pub async fn assign_subscription(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Path(tenant_id): Path<Uuid>,
    Json(body): Json<AssignSubscriptionBody>,
) -> ApiResult<(StatusCode, Json<SubscriptionRecord>)> {
    let record = state
        .core
        .subscriptions
        .assign_initial_plan(
            &actor,
            NewSubscription {
                tenant_id,
                plan_id: body.plan_id,
                billing_cycle: body.billing_cycle,
                trial_end_date: body.trial_end_date,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/v1/admin/invariants
///
/// Runs every consistency check against the live database.
pub async fn run_invariant_checks(
    State(state): State<AppState>,
    AdminUser(_actor): AdminUser,
) -> ApiResult<Json<talentry_subscriptions::InvariantCheckSummary>> {
    let checker = InvariantChecker::new(state.pool.clone());
    let summary = checker.run_all_checks().await?;
    Ok(Json(summary))
}
