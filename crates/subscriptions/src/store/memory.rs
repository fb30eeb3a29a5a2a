//! In-memory store
//!
//! Backs the workflow and race tests without a database. A single mutex
//! serializes every operation, so the check-and-insert and review
//! transitions are atomic here by construction - the same guarantees the
//! Postgres store gets from its unique index and transactions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::catalog::{CatalogSnapshot, SubscriptionPlan};
use crate::error::{SubscriptionError, SubscriptionResult};
use crate::record::{NewSubscription, SubscriptionRecord};
use crate::store::SubscriptionStore;
use crate::workflow::{
    NewPlanChangeRequest, PendingRequestSummary, PlanChangeRequest, RequestStatus, ReviewDecision,
};

#[derive(Default)]
struct MemoryState {
    tenants: HashMap<Uuid, String>,
    plans: Vec<SubscriptionPlan>,
    subscriptions: HashMap<Uuid, SubscriptionRecord>,
    /// Insertion-ordered, append-only; requests are never removed.
    requests: Vec<PlanChangeRequest>,
}

#[derive(Clone, Default)]
pub struct MemorySubscriptionStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_tenant(&self, tenant_id: Uuid, name: &str) {
        self.state
            .lock()
            .await
            .tenants
            .insert(tenant_id, name.to_string());
    }

    pub async fn insert_plan(&self, plan: SubscriptionPlan) {
        self.state.lock().await.plans.push(plan);
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn list_plans(&self) -> SubscriptionResult<Vec<SubscriptionPlan>> {
        let state = self.state.lock().await;
        let snapshot = CatalogSnapshot::new(state.plans.clone());
        Ok(snapshot
            .plans()
            .iter()
            .cloned()
            .map(|mut p| {
                p.features.clear();
                p
            })
            .collect())
    }

    async fn plan_with_features(&self, plan_id: Uuid) -> SubscriptionResult<SubscriptionPlan> {
        let state = self.state.lock().await;
        state
            .plans
            .iter()
            .find(|p| p.id == plan_id)
            .cloned()
            .ok_or(SubscriptionError::PlanNotFound(plan_id))
    }

    async fn catalog_snapshot(&self) -> SubscriptionResult<CatalogSnapshot> {
        let state = self.state.lock().await;
        Ok(CatalogSnapshot::new(state.plans.clone()))
    }

    async fn subscription_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> SubscriptionResult<Option<SubscriptionRecord>> {
        let state = self.state.lock().await;
        Ok(state.subscriptions.get(&tenant_id).cloned())
    }

    async fn insert_subscription(
        &self,
        new: NewSubscription,
        now: OffsetDateTime,
    ) -> SubscriptionResult<SubscriptionRecord> {
        let mut state = self.state.lock().await;
        if state.subscriptions.contains_key(&new.tenant_id) {
            return Err(SubscriptionError::Conflict(format!(
                "Tenant {} already has a subscription",
                new.tenant_id
            )));
        }
        let record = SubscriptionRecord {
            tenant_id: new.tenant_id,
            plan_id: new.plan_id,
            is_active: true,
            is_trial: new.is_trial(),
            trial_end_date: new.trial_end_date,
            billing_cycle: new.billing_cycle,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        state.subscriptions.insert(new.tenant_id, record.clone());
        Ok(record)
    }

    async fn insert_pending_request(
        &self,
        new: NewPlanChangeRequest,
    ) -> SubscriptionResult<PlanChangeRequest> {
        let mut state = self.state.lock().await;

        // Check-and-insert under the same lock acquisition.
        let has_pending = state
            .requests
            .iter()
            .any(|r| r.tenant_id == new.tenant_id && r.status == RequestStatus::Pending);
        if has_pending {
            return Err(SubscriptionError::AlreadyPending(new.tenant_id));
        }

        let request = PlanChangeRequest {
            id: Uuid::new_v4(),
            tenant_id: new.tenant_id,
            current_plan_id: new.current_plan_id,
            requested_plan_id: new.requested_plan_id,
            status: RequestStatus::Pending,
            request_message: new.request_message,
            review_message: None,
            requester_id: new.requester_id,
            reviewer_id: None,
            created_at: OffsetDateTime::now_utc(),
            reviewed_at: None,
        };
        state.requests.push(request.clone());
        Ok(request)
    }

    async fn request_by_id(&self, id: Uuid) -> SubscriptionResult<Option<PlanChangeRequest>> {
        let state = self.state.lock().await;
        Ok(state.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn requests_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> SubscriptionResult<Vec<PlanChangeRequest>> {
        let state = self.state.lock().await;
        let mut requests: Vec<PlanChangeRequest> = state
            .requests
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        requests.reverse();
        Ok(requests)
    }

    async fn pending_requests(&self) -> SubscriptionResult<Vec<PendingRequestSummary>> {
        let state = self.state.lock().await;
        Ok(state
            .requests
            .iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .map(|r| PendingRequestSummary {
                request: r.clone(),
                tenant_name: state
                    .tenants
                    .get(&r.tenant_id)
                    .cloned()
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn cancel_pending(
        &self,
        request_id: Uuid,
        now: OffsetDateTime,
    ) -> SubscriptionResult<PlanChangeRequest> {
        let mut state = self.state.lock().await;
        let request = state
            .requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or(SubscriptionError::RequestNotFound(request_id))?;

        if request.status != RequestStatus::Pending {
            return Err(SubscriptionError::InvalidTransition);
        }
        request.status = RequestStatus::Cancelled;
        request.reviewed_at = Some(now);
        Ok(request.clone())
    }

    async fn commit_review(
        &self,
        request_id: Uuid,
        decision: ReviewDecision,
        reviewer_id: Uuid,
        message: Option<String>,
        now: OffsetDateTime,
    ) -> SubscriptionResult<PlanChangeRequest> {
        let mut state = self.state.lock().await;

        let idx = state
            .requests
            .iter()
            .position(|r| r.id == request_id)
            .ok_or(SubscriptionError::RequestNotFound(request_id))?;

        if state.requests[idx].status != RequestStatus::Pending {
            return Err(SubscriptionError::InvalidTransition);
        }

        let (tenant_id, requested_plan_id) = (
            state.requests[idx].tenant_id,
            state.requests[idx].requested_plan_id,
        );

        // On approval, verify the subscription exists before mutating
        // anything, so the two writes stay all-or-nothing.
        if decision == ReviewDecision::Approved && !state.subscriptions.contains_key(&tenant_id) {
            return Err(SubscriptionError::Database(format!(
                "Tenant {tenant_id} has no subscription row to apply the approved plan to"
            )));
        }

        let request = &mut state.requests[idx];
        request.status = decision.as_status();
        request.reviewer_id = Some(reviewer_id);
        request.review_message = message;
        request.reviewed_at = Some(now);
        let reviewed = request.clone();

        if decision == ReviewDecision::Approved {
            if let Some(subscription) = state.subscriptions.get_mut(&tenant_id) {
                subscription.plan_id = requested_plan_id;
                subscription.is_trial = false;
                subscription.trial_end_date = None;
                subscription.version += 1;
                subscription.updated_at = now;
            }
        }

        Ok(reviewed)
    }
}
