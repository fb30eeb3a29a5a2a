//! Subscription invariants
//!
//! Runnable consistency checks for the subscription system, exposed to
//! platform admins. Useful after an incident or a manual data fix.
//!
//! ## Design Principles
//!
//! 1. **Executable**: each invariant is a real SQL query
//! 2. **Explanatory**: violations include enough context to debug
//! 3. **Non-destructive**: checks only read, never write

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::SubscriptionResult;

/// A single detected inconsistency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated
    pub invariant: String,
    /// Tenant(s) affected
    pub tenant_ids: Vec<Uuid>,
    /// Human-readable description of the violation
    pub description: String,
    /// Additional context for debugging
    pub context: serde_json::Value,
    pub severity: ViolationSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// System may be granting wrong entitlements
    Critical,
    /// Data inconsistency that needs attention
    High,
    /// Potential issue, should investigate
    Medium,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::Critical => write!(f, "CRITICAL"),
            ViolationSeverity::High => write!(f, "HIGH"),
            ViolationSeverity::Medium => write!(f, "MEDIUM"),
        }
    }
}

/// Summary of one checker run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckSummary {
    #[serde(with = "time::serde::rfc3339")]
    pub checked_at: OffsetDateTime,
    pub checks_run: usize,
    pub checks_passed: usize,
    pub checks_failed: usize,
    pub violations: Vec<InvariantViolation>,
    pub healthy: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct MultiplePendingRow {
    tenant_id: Uuid,
    pending_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct UnreviewedTerminalRow {
    request_id: Uuid,
    tenant_id: Uuid,
    status: String,
    reviewer_id: Option<Uuid>,
    reviewed_at: Option<OffsetDateTime>,
}

#[derive(Debug, sqlx::FromRow)]
struct TrialWithoutEndRow {
    tenant_id: Uuid,
    plan_id: Uuid,
}

#[derive(Debug, sqlx::FromRow)]
struct DanglingPlanRow {
    tenant_id: Uuid,
    plan_id: Uuid,
}

/// Service for running subscription invariant checks.
pub struct InvariantChecker {
    pool: PgPool,
}

impl InvariantChecker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all invariant checks and return a summary.
    pub async fn run_all_checks(&self) -> SubscriptionResult<InvariantCheckSummary> {
        let now = OffsetDateTime::now_utc();
        let mut violations = Vec::new();

        violations.extend(self.check_single_pending_request().await?);
        violations.extend(self.check_terminal_requests_reviewed().await?);
        violations.extend(self.check_trial_has_end_date().await?);
        violations.extend(self.check_subscription_plan_exists().await?);

        let checks_run = 4;
        let checks_failed = violations
            .iter()
            .map(|v| &v.invariant)
            .collect::<std::collections::HashSet<_>>()
            .len();
        let checks_passed = checks_run - checks_failed;

        Ok(InvariantCheckSummary {
            checked_at: now,
            checks_run,
            checks_passed,
            checks_failed,
            healthy: violations.is_empty(),
            violations,
        })
    }

    /// Invariant 1: at most one pending plan-change request per tenant.
    ///
    /// The partial unique index enforces this at write time; a violation
    /// here means the index was dropped or rows were edited by hand.
    async fn check_single_pending_request(&self) -> SubscriptionResult<Vec<InvariantViolation>> {
        let rows: Vec<MultiplePendingRow> = sqlx::query_as(
            r#"
            SELECT tenant_id, COUNT(*) as pending_count
            FROM plan_change_requests
            WHERE status = 'pending'
            GROUP BY tenant_id
            HAVING COUNT(*) > 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "single_pending_request".to_string(),
                tenant_ids: vec![row.tenant_id],
                description: format!(
                    "Tenant has {} pending plan-change requests (expected at most 1)",
                    row.pending_count
                ),
                context: serde_json::json!({
                    "pending_count": row.pending_count,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Invariant 2: review metadata matches the state machine.
    ///
    /// Approved/rejected rows must carry a reviewer and a review time;
    /// pending rows must carry neither.
    async fn check_terminal_requests_reviewed(
        &self,
    ) -> SubscriptionResult<Vec<InvariantViolation>> {
        let rows: Vec<UnreviewedTerminalRow> = sqlx::query_as(
            r#"
            SELECT id as request_id, tenant_id, status, reviewer_id, reviewed_at
            FROM plan_change_requests
            WHERE (status IN ('approved', 'rejected')
                   AND (reviewer_id IS NULL OR reviewed_at IS NULL))
               OR (status = 'pending'
                   AND (reviewer_id IS NOT NULL OR reviewed_at IS NOT NULL))
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "terminal_requests_reviewed".to_string(),
                tenant_ids: vec![row.tenant_id],
                description: format!(
                    "Request {} in status '{}' has inconsistent review metadata",
                    row.request_id, row.status
                ),
                context: serde_json::json!({
                    "request_id": row.request_id,
                    "status": row.status,
                    "reviewer_id": row.reviewer_id,
                    "reviewed_at": row.reviewed_at.map(|t| t.to_string()),
                }),
                severity: ViolationSeverity::High,
            })
            .collect())
    }

    /// Invariant 3: trial subscriptions carry a trial end date.
    async fn check_trial_has_end_date(&self) -> SubscriptionResult<Vec<InvariantViolation>> {
        let rows: Vec<TrialWithoutEndRow> = sqlx::query_as(
            r#"
            SELECT tenant_id, plan_id
            FROM subscriptions
            WHERE is_trial = true AND trial_end_date IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "trial_has_end_date".to_string(),
                tenant_ids: vec![row.tenant_id],
                description: "Trial subscription has no trial_end_date".to_string(),
                context: serde_json::json!({
                    "plan_id": row.plan_id,
                }),
                severity: ViolationSeverity::High,
            })
            .collect())
    }

    /// Invariant 4: every subscription references an existing plan.
    async fn check_subscription_plan_exists(&self) -> SubscriptionResult<Vec<InvariantViolation>> {
        let rows: Vec<DanglingPlanRow> = sqlx::query_as(
            r#"
            SELECT s.tenant_id, s.plan_id
            FROM subscriptions s
            LEFT JOIN subscription_plans p ON p.id = s.plan_id
            WHERE p.id IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| InvariantViolation {
                invariant: "subscription_plan_exists".to_string(),
                tenant_ids: vec![row.tenant_id],
                description: "Subscription references a plan that does not exist".to_string(),
                context: serde_json::json!({
                    "plan_id": row.plan_id,
                }),
                severity: ViolationSeverity::Critical,
            })
            .collect())
    }

    /// Run a single invariant check by name.
    pub async fn run_check(&self, name: &str) -> SubscriptionResult<Vec<InvariantViolation>> {
        match name {
            "single_pending_request" => self.check_single_pending_request().await,
            "terminal_requests_reviewed" => self.check_terminal_requests_reviewed().await,
            "trial_has_end_date" => self.check_trial_has_end_date().await,
            "subscription_plan_exists" => self.check_subscription_plan_exists().await,
            _ => Ok(vec![]),
        }
    }

    pub fn available_checks() -> Vec<&'static str> {
        vec![
            "single_pending_request",
            "terminal_requests_reviewed",
            "trial_has_end_date",
            "subscription_plan_exists",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_severity_display() {
        assert_eq!(ViolationSeverity::Critical.to_string(), "CRITICAL");
        assert_eq!(ViolationSeverity::High.to_string(), "HIGH");
        assert_eq!(ViolationSeverity::Medium.to_string(), "MEDIUM");
    }

    #[test]
    fn available_checks_list() {
        let checks = InvariantChecker::available_checks();
        assert_eq!(checks.len(), 4);
        assert!(checks.contains(&"single_pending_request"));
        assert!(checks.contains(&"terminal_requests_reviewed"));
    }
}
