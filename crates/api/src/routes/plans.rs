//! Plan catalog routes (read-only, public to any authenticated user)

use axum::extract::{Path, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use talentry_subscriptions::SubscriptionPlan;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::retry::retry_transient;
use crate::state::AppState;

/// Listing shape: features are not inlined, fetch the plan detail for those.
#[derive(Debug, Serialize)]
pub struct PlanSummary {
    pub id: Uuid,
    pub display_name: String,
    pub price_monthly: Decimal,
    pub max_users: Option<i32>,
    pub max_workflows: Option<i32>,
    pub max_exams: Option<i32>,
}

impl From<SubscriptionPlan> for PlanSummary {
    fn from(plan: SubscriptionPlan) -> Self {
        Self {
            id: plan.id,
            display_name: plan.display_name,
            price_monthly: plan.price_monthly,
            max_users: plan.max_users,
            max_workflows: plan.max_workflows,
            max_exams: plan.max_exams,
        }
    }
}

/// GET /api/v1/plans
pub async fn list_plans(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> ApiResult<Json<Vec<PlanSummary>>> {
    let plans = retry_transient(|| state.core.catalog.list_plans()).await?;
    Ok(Json(plans.into_iter().map(PlanSummary::from).collect()))
}

/// GET /api/v1/plans/{plan_id}
pub async fn get_plan(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(plan_id): Path<Uuid>,
) -> ApiResult<Json<SubscriptionPlan>> {
    let plan = retry_transient(|| state.core.catalog.plan_with_features(plan_id)).await?;
    Ok(Json(plan))
}
