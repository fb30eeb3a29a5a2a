//! Plan-change request workflow
//!
//! The state machine governing a tenant's request to move to a different
//! plan and an administrator's review of it:
//!
//! ```text
//! pending -> approved | rejected | cancelled     (all three terminal)
//! ```
//!
//! All writes go through the injected [`SubscriptionStore`], which is
//! responsible for making the pending-uniqueness check-and-insert and the
//! review transition atomic. This module owns the preconditions and the
//! authorization rules.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use talentry_shared::{PlatformRole, TenantRole};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{SubscriptionError, SubscriptionResult};
use crate::store::SubscriptionStore;

/// Lifecycle state of a plan-change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            "cancelled" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal states are immutable; only `pending` can transition.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An administrator's decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    pub fn as_status(&self) -> RequestStatus {
        match self {
            ReviewDecision::Approved => RequestStatus::Approved,
            ReviewDecision::Rejected => RequestStatus::Rejected,
        }
    }
}

/// A tenant's request to move to a different plan.
///
/// `current_plan_id` is a snapshot taken at request time; a later
/// unrelated plan change does not retroactively alter history. Requests
/// are never physically deleted - resolved rows remain as an audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct PlanChangeRequest {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub current_plan_id: Uuid,
    pub requested_plan_id: Uuid,
    pub status: RequestStatus,
    pub request_message: Option<String>,
    pub review_message: Option<String>,
    pub requester_id: Uuid,
    pub reviewer_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
}

/// Insert payload for a new pending request.
#[derive(Debug, Clone)]
pub struct NewPlanChangeRequest {
    pub tenant_id: Uuid,
    pub current_plan_id: Uuid,
    pub requested_plan_id: Uuid,
    pub requester_id: Uuid,
    pub request_message: Option<String>,
}

/// A pending request annotated with its tenant for the admin queue.
#[derive(Debug, Clone, Serialize)]
pub struct PendingRequestSummary {
    #[serde(flatten)]
    pub request: PlanChangeRequest,
    pub tenant_name: String,
}

/// The authenticated caller, as answered by the authorization collaborator.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub platform_role: PlatformRole,
    pub tenant_role: TenantRole,
}

impl Actor {
    pub fn is_platform_admin(&self) -> bool {
        self.platform_role.is_platform_admin()
    }

    pub fn is_tenant_admin_of(&self, tenant_id: Uuid) -> bool {
        self.tenant_id == Some(tenant_id) && self.tenant_role == TenantRole::Admin
    }
}

/// Service object for the plan-change request workflow.
#[derive(Clone)]
pub struct PlanChangeWorkflow {
    store: Arc<dyn SubscriptionStore>,
}

impl PlanChangeWorkflow {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    /// Create a pending plan-change request for the actor's tenant.
    ///
    /// Outside of trial, a request targeting the current plan is rejected
    /// as `NoOpChange`. A trial tenant may target any plan, including a
    /// price-equal or price-lower one: trial is a temporary state, not a
    /// chosen tier. The duplicate-pending check is enforced atomically by
    /// the store, so a racing second create fails with `AlreadyPending`
    /// rather than producing a second pending row.
    pub async fn request_plan_change(
        &self,
        actor: &Actor,
        requested_plan_id: Uuid,
        message: Option<String>,
    ) -> SubscriptionResult<PlanChangeRequest> {
        let tenant_id = actor.tenant_id.ok_or(SubscriptionError::Unauthorized)?;

        let snapshot = self.store.catalog_snapshot().await?;
        if snapshot.plan(requested_plan_id).is_none() {
            return Err(SubscriptionError::PlanNotFound(requested_plan_id));
        }

        let subscription = self
            .store
            .subscription_for_tenant(tenant_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or(SubscriptionError::NoSubscription(tenant_id))?;

        if !subscription.is_trial && subscription.plan_id == requested_plan_id {
            return Err(SubscriptionError::NoOpChange);
        }

        let request = self
            .store
            .insert_pending_request(NewPlanChangeRequest {
                tenant_id,
                current_plan_id: subscription.plan_id,
                requested_plan_id,
                requester_id: actor.user_id,
                request_message: message,
            })
            .await?;

        tracing::info!(
            tenant_id = %tenant_id,
            request_id = %request.id,
            current_plan_id = %request.current_plan_id,
            requested_plan_id = %requested_plan_id,
            is_trial = subscription.is_trial,
            "Created plan-change request"
        );

        Ok(request)
    }

    /// Cancel a pending request. Allowed for the original requester or a
    /// tenant admin of the owning tenant; never after review.
    pub async fn cancel_request(
        &self,
        request_id: Uuid,
        actor: &Actor,
    ) -> SubscriptionResult<PlanChangeRequest> {
        let request = self
            .store
            .request_by_id(request_id)
            .await?
            .ok_or(SubscriptionError::RequestNotFound(request_id))?;

        if request.status.is_terminal() {
            return Err(SubscriptionError::InvalidTransition);
        }
        if actor.user_id != request.requester_id && !actor.is_tenant_admin_of(request.tenant_id) {
            return Err(SubscriptionError::Unauthorized);
        }

        // CAS in the store guards the race with a concurrent review.
        let cancelled = self
            .store
            .cancel_pending(request_id, OffsetDateTime::now_utc())
            .await?;

        tracing::info!(
            request_id = %request_id,
            tenant_id = %cancelled.tenant_id,
            cancelled_by = %actor.user_id,
            "Cancelled plan-change request"
        );

        Ok(cancelled)
    }

    /// Review a pending request. Platform-admin only.
    ///
    /// The status transition and, on approval, the subscription mutation
    /// commit as one unit of work inside the store: either both apply or
    /// neither does. A second reviewer racing on the same request observes
    /// `InvalidTransition` instead of overwriting the first decision.
    pub async fn review_request(
        &self,
        request_id: Uuid,
        decision: ReviewDecision,
        actor: &Actor,
        message: Option<String>,
    ) -> SubscriptionResult<PlanChangeRequest> {
        if !actor.is_platform_admin() {
            return Err(SubscriptionError::Unauthorized);
        }

        let reviewed = self
            .store
            .commit_review(
                request_id,
                decision,
                actor.user_id,
                message,
                OffsetDateTime::now_utc(),
            )
            .await?;

        tracing::info!(
            request_id = %request_id,
            tenant_id = %reviewed.tenant_id,
            decision = %reviewed.status,
            reviewer_id = %actor.user_id,
            "Reviewed plan-change request"
        );

        Ok(reviewed)
    }

    /// Pending requests across all tenants, annotated for the admin queue.
    pub async fn pending_requests(
        &self,
        actor: &Actor,
    ) -> SubscriptionResult<Vec<PendingRequestSummary>> {
        if !actor.is_platform_admin() {
            return Err(SubscriptionError::Unauthorized);
        }
        self.store.pending_requests().await
    }

    /// Full request history for one tenant, newest first. Unbounded and
    /// append-only.
    pub async fn requests_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> SubscriptionResult<Vec<PlanChangeRequest>> {
        self.store.requests_for_tenant(tenant_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_roundtrip() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RequestStatus::parse("reviewing"), None);
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(RequestStatus::Approved.is_terminal());
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(RequestStatus::Cancelled.is_terminal());
    }

    #[test]
    fn decision_maps_to_terminal_status() {
        assert_eq!(ReviewDecision::Approved.as_status(), RequestStatus::Approved);
        assert_eq!(ReviewDecision::Rejected.as_status(), RequestStatus::Rejected);
        assert!(ReviewDecision::Approved.as_status().is_terminal());
    }

    #[test]
    fn tenant_admin_check_requires_matching_tenant() {
        let tenant = Uuid::new_v4();
        let admin = Actor {
            user_id: Uuid::new_v4(),
            tenant_id: Some(tenant),
            platform_role: PlatformRole::User,
            tenant_role: TenantRole::Admin,
        };
        assert!(admin.is_tenant_admin_of(tenant));
        assert!(!admin.is_tenant_admin_of(Uuid::new_v4()));

        let member = Actor {
            tenant_role: TenantRole::Member,
            ..admin
        };
        assert!(!member.is_tenant_admin_of(tenant));
    }
}
