//! Tenant subscription routes

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use talentry_subscriptions::{SubscriptionRecord, UpsellFeature};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::retry::retry_transient;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MySubscriptionResponse {
    /// Absent when the tenant has not been assigned a plan yet.
    pub subscription: Option<SubscriptionRecord>,
}

/// GET /api/v1/subscriptions/me
pub async fn get_my_subscription(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<Json<MySubscriptionResponse>> {
    let tenant_id = actor.tenant_id.ok_or(ApiError::Forbidden)?;
    let subscription =
        retry_transient(|| state.core.subscriptions.subscription_for_tenant(tenant_id)).await?;
    Ok(Json(MySubscriptionResponse { subscription }))
}

#[derive(Debug, Serialize)]
pub struct UpsellResponse {
    pub features: Vec<UpsellFeature>,
}

/// GET /api/v1/subscriptions/me/upsell
///
/// What the next tier(s) would unlock for the caller's tenant.
pub async fn get_my_upsell(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> ApiResult<Json<UpsellResponse>> {
    let tenant_id = actor.tenant_id.ok_or(ApiError::Forbidden)?;
    let features = retry_transient(|| state.core.subscriptions.upsell_for_tenant(tenant_id)).await?;
    Ok(Json(UpsellResponse { features }))
}
