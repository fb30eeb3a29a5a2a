//! Postgres-backed store
//!
//! The two §5-critical operations live here:
//! - `insert_pending_request` relies on the partial unique index
//!   `plan_change_requests_one_pending (tenant_id) WHERE status = 'pending'`
//!   so check-and-insert is a single atomic statement;
//! - `commit_review` runs in one transaction with a `FOR UPDATE` row lock
//!   and a compare-and-swap on `status`, so two concurrent reviewers can
//!   never both apply and the subscription mutation commits with the
//!   status flip or not at all.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use talentry_shared::BillingCycle;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::catalog::{CatalogSnapshot, Feature, SubscriptionPlan};
use crate::error::{SubscriptionError, SubscriptionResult};
use crate::record::{NewSubscription, SubscriptionRecord};
use crate::store::SubscriptionStore;
use crate::workflow::{
    NewPlanChangeRequest, PendingRequestSummary, PlanChangeRequest, RequestStatus, ReviewDecision,
};

const ONE_PENDING_INDEX: &str = "plan_change_requests_one_pending";

#[derive(Clone)]
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: Uuid,
    display_name: String,
    price_monthly: Decimal,
    max_users: Option<i32>,
    max_workflows: Option<i32>,
    max_exams: Option<i32>,
}

impl PlanRow {
    fn into_plan(self, features: Vec<Feature>) -> SubscriptionPlan {
        SubscriptionPlan {
            id: self.id,
            display_name: self.display_name,
            price_monthly: self.price_monthly,
            features,
            max_users: self.max_users,
            max_workflows: self.max_workflows,
            max_exams: self.max_exams,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlanFeatureRow {
    plan_id: Uuid,
    id: Uuid,
    key: String,
    display_name: String,
    description: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    tenant_id: Uuid,
    plan_id: Uuid,
    is_active: bool,
    is_trial: bool,
    trial_end_date: Option<OffsetDateTime>,
    billing_cycle: String,
    version: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<SubscriptionRow> for SubscriptionRecord {
    fn from(row: SubscriptionRow) -> Self {
        SubscriptionRecord {
            tenant_id: row.tenant_id,
            plan_id: row.plan_id,
            is_active: row.is_active,
            is_trial: row.is_trial,
            trial_end_date: row.trial_end_date,
            billing_cycle: BillingCycle::from_str_or_default(&row.billing_cycle),
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    tenant_id: Uuid,
    current_plan_id: Uuid,
    requested_plan_id: Uuid,
    status: String,
    request_message: Option<String>,
    review_message: Option<String>,
    requester_id: Uuid,
    reviewer_id: Option<Uuid>,
    created_at: OffsetDateTime,
    reviewed_at: Option<OffsetDateTime>,
}

impl RequestRow {
    fn into_request(self) -> SubscriptionResult<PlanChangeRequest> {
        let status = RequestStatus::parse(&self.status).ok_or_else(|| {
            SubscriptionError::Database(format!(
                "Unknown plan_change_requests.status '{}' for request {}",
                self.status, self.id
            ))
        })?;
        Ok(PlanChangeRequest {
            id: self.id,
            tenant_id: self.tenant_id,
            current_plan_id: self.current_plan_id,
            requested_plan_id: self.requested_plan_id,
            status,
            request_message: self.request_message,
            review_message: self.review_message,
            requester_id: self.requester_id,
            reviewer_id: self.reviewer_id,
            created_at: self.created_at,
            reviewed_at: self.reviewed_at,
        })
    }
}

const REQUEST_COLUMNS: &str = "id, tenant_id, current_plan_id, requested_plan_id, status, \
     request_message, review_message, requester_id, reviewer_id, created_at, reviewed_at";

/// True when the error is a unique violation on the given constraint.
fn is_unique_violation(e: &sqlx::Error, constraint: &str) -> bool {
    e.as_database_error()
        .map(|db| {
            db.code().as_deref() == Some("23505")
                && (db.constraint() == Some(constraint) || db.constraint().is_none())
        })
        .unwrap_or(false)
}

#[async_trait]
impl SubscriptionStore for PgSubscriptionStore {
    async fn list_plans(&self) -> SubscriptionResult<Vec<SubscriptionPlan>> {
        let rows: Vec<PlanRow> = sqlx::query_as(
            r#"
            SELECT id, display_name, price_monthly, max_users, max_workflows, max_exams
            FROM subscription_plans
            ORDER BY price_monthly ASC, display_name ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_plan(vec![])).collect())
    }

    async fn plan_with_features(&self, plan_id: Uuid) -> SubscriptionResult<SubscriptionPlan> {
        let row: Option<PlanRow> = sqlx::query_as(
            r#"
            SELECT id, display_name, price_monthly, max_users, max_workflows, max_exams
            FROM subscription_plans
            WHERE id = $1
            "#,
        )
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or(SubscriptionError::PlanNotFound(plan_id))?;

        let features: Vec<Feature> = sqlx::query_as(
            r#"
            SELECT f.id, f.key, f.display_name, f.description
            FROM features f
            JOIN plan_features pf ON pf.feature_id = f.id
            WHERE pf.plan_id = $1
            ORDER BY f.key ASC
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(row.into_plan(features))
    }

    async fn catalog_snapshot(&self) -> SubscriptionResult<CatalogSnapshot> {
        let plan_rows: Vec<PlanRow> = sqlx::query_as(
            r#"
            SELECT id, display_name, price_monthly, max_users, max_workflows, max_exams
            FROM subscription_plans
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let feature_rows: Vec<PlanFeatureRow> = sqlx::query_as(
            r#"
            SELECT pf.plan_id, f.id, f.key, f.display_name, f.description
            FROM plan_features pf
            JOIN features f ON f.id = pf.feature_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut features_by_plan: std::collections::HashMap<Uuid, Vec<Feature>> =
            std::collections::HashMap::new();
        for row in feature_rows {
            features_by_plan
                .entry(row.plan_id)
                .or_default()
                .push(Feature {
                    id: row.id,
                    key: row.key,
                    display_name: row.display_name,
                    description: row.description,
                });
        }

        let plans = plan_rows
            .into_iter()
            .map(|row| {
                let features = features_by_plan.remove(&row.id).unwrap_or_default();
                row.into_plan(features)
            })
            .collect();

        Ok(CatalogSnapshot::new(plans))
    }

    async fn subscription_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> SubscriptionResult<Option<SubscriptionRecord>> {
        let row: Option<SubscriptionRow> = sqlx::query_as(
            r#"
            SELECT tenant_id, plan_id, is_active, is_trial, trial_end_date,
                   billing_cycle, version, created_at, updated_at
            FROM subscriptions
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SubscriptionRecord::from))
    }

    async fn insert_subscription(
        &self,
        new: NewSubscription,
        now: OffsetDateTime,
    ) -> SubscriptionResult<SubscriptionRecord> {
        let row: SubscriptionRow = sqlx::query_as(
            r#"
            INSERT INTO subscriptions
                (tenant_id, plan_id, is_active, is_trial, trial_end_date,
                 billing_cycle, version, created_at, updated_at)
            VALUES ($1, $2, true, $3, $4, $5, 1, $6, $6)
            RETURNING tenant_id, plan_id, is_active, is_trial, trial_end_date,
                      billing_cycle, version, created_at, updated_at
            "#,
        )
        .bind(new.tenant_id)
        .bind(new.plan_id)
        .bind(new.is_trial())
        .bind(new.trial_end_date)
        .bind(new.billing_cycle.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "subscriptions_pkey") {
                SubscriptionError::Conflict(format!(
                    "Tenant {} already has a subscription",
                    new.tenant_id
                ))
            } else {
                e.into()
            }
        })?;

        Ok(row.into())
    }

    async fn insert_pending_request(
        &self,
        new: NewPlanChangeRequest,
    ) -> SubscriptionResult<PlanChangeRequest> {
        let row: RequestRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO plan_change_requests
                (tenant_id, current_plan_id, requested_plan_id, status,
                 request_message, requester_id)
            VALUES ($1, $2, $3, 'pending', $4, $5)
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(new.tenant_id)
        .bind(new.current_plan_id)
        .bind(new.requested_plan_id)
        .bind(&new.request_message)
        .bind(new.requester_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, ONE_PENDING_INDEX) {
                SubscriptionError::AlreadyPending(new.tenant_id)
            } else {
                e.into()
            }
        })?;

        row.into_request()
    }

    async fn request_by_id(&self, id: Uuid) -> SubscriptionResult<Option<PlanChangeRequest>> {
        let row: Option<RequestRow> = sqlx::query_as(&format!(
            "SELECT {REQUEST_COLUMNS} FROM plan_change_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RequestRow::into_request).transpose()
    }

    async fn requests_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> SubscriptionResult<Vec<PlanChangeRequest>> {
        let rows: Vec<RequestRow> = sqlx::query_as(&format!(
            r#"
            SELECT {REQUEST_COLUMNS}
            FROM plan_change_requests
            WHERE tenant_id = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RequestRow::into_request).collect()
    }

    async fn pending_requests(&self) -> SubscriptionResult<Vec<PendingRequestSummary>> {
        #[derive(Debug, sqlx::FromRow)]
        struct PendingRow {
            #[sqlx(flatten)]
            request: RequestRow,
            tenant_name: String,
        }

        let rows: Vec<PendingRow> = sqlx::query_as(
            r#"
            SELECT r.id, r.tenant_id, r.current_plan_id, r.requested_plan_id, r.status,
                   r.request_message, r.review_message, r.requester_id, r.reviewer_id,
                   r.created_at, r.reviewed_at,
                   t.name AS tenant_name
            FROM plan_change_requests r
            JOIN tenants t ON t.id = r.tenant_id
            WHERE r.status = 'pending'
            ORDER BY r.created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PendingRequestSummary {
                    request: row.request.into_request()?,
                    tenant_name: row.tenant_name,
                })
            })
            .collect()
    }

    async fn cancel_pending(
        &self,
        request_id: Uuid,
        now: OffsetDateTime,
    ) -> SubscriptionResult<PlanChangeRequest> {
        // CAS: the update applies only if the row is still pending.
        let row: Option<RequestRow> = sqlx::query_as(&format!(
            r#"
            UPDATE plan_change_requests
            SET status = 'cancelled', reviewed_at = $2
            WHERE id = $1 AND status = 'pending'
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(request_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.into_request(),
            None => {
                // Distinguish "never existed" from "already resolved".
                let exists: Option<(Uuid,)> =
                    sqlx::query_as("SELECT id FROM plan_change_requests WHERE id = $1")
                        .bind(request_id)
                        .fetch_optional(&self.pool)
                        .await?;
                match exists {
                    Some(_) => Err(SubscriptionError::InvalidTransition),
                    None => Err(SubscriptionError::RequestNotFound(request_id)),
                }
            }
        }
    }

    async fn commit_review(
        &self,
        request_id: Uuid,
        decision: ReviewDecision,
        reviewer_id: Uuid,
        message: Option<String>,
        now: OffsetDateTime,
    ) -> SubscriptionResult<PlanChangeRequest> {
        let mut tx = self.pool.begin().await?;

        let current: Option<RequestRow> = sqlx::query_as(&format!(
            "SELECT {REQUEST_COLUMNS} FROM plan_change_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?;

        let current = current
            .ok_or(SubscriptionError::RequestNotFound(request_id))?
            .into_request()?;
        if current.status.is_terminal() {
            return Err(SubscriptionError::InvalidTransition);
        }

        let rows_affected = sqlx::query(
            r#"
            UPDATE plan_change_requests
            SET status = $2, reviewer_id = $3, review_message = $4, reviewed_at = $5
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(request_id)
        .bind(decision.as_status().as_str())
        .bind(reviewer_id)
        .bind(&message)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            // Unreachable while the FOR UPDATE lock is held; kept as a guard.
            return Err(SubscriptionError::InvalidTransition);
        }

        if decision == ReviewDecision::Approved {
            let sub_rows = sqlx::query(
                r#"
                UPDATE subscriptions
                SET plan_id = $2,
                    is_trial = false,
                    trial_end_date = NULL,
                    version = version + 1,
                    updated_at = $3
                WHERE tenant_id = $1
                "#,
            )
            .bind(current.tenant_id)
            .bind(current.requested_plan_id)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if sub_rows != 1 {
                // Rolling back via drop: an approval must never commit
                // without the subscription mutation.
                return Err(SubscriptionError::Database(format!(
                    "Tenant {} has no subscription row to apply the approved plan to",
                    current.tenant_id
                )));
            }
        }

        tx.commit().await?;

        Ok(PlanChangeRequest {
            status: decision.as_status(),
            reviewer_id: Some(reviewer_id),
            review_message: message,
            reviewed_at: Some(now),
            ..current
        })
    }
}
