//! Subscription record
//!
//! The current plan association for one tenant, including trial state.
//! Owned exclusively by the tenant; mutated only by the workflow's
//! approval transition or by administrative assignment at tenant creation.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use talentry_shared::BillingCycle;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::entitlement::{self, UpsellFeature};
use crate::error::{SubscriptionError, SubscriptionResult};
use crate::store::SubscriptionStore;
use crate::workflow::Actor;

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRecord {
    pub tenant_id: Uuid,
    pub plan_id: Uuid,
    pub is_active: bool,
    pub is_trial: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub trial_end_date: Option<OffsetDateTime>,
    pub billing_cycle: BillingCycle,
    /// Optimistic-lock counter, bumped on every plan mutation.
    pub version: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Input for administrative initial plan assignment.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub tenant_id: Uuid,
    pub plan_id: Uuid,
    pub billing_cycle: BillingCycle,
    pub trial_end_date: Option<OffsetDateTime>,
}

impl NewSubscription {
    /// Enforce the trial invariant: a trial assignment must carry an end
    /// date that lies in the future at creation time.
    pub fn validate(&self, now: OffsetDateTime) -> SubscriptionResult<()> {
        if let Some(end) = self.trial_end_date {
            if end <= now {
                return Err(SubscriptionError::Validation(
                    "trial_end_date must be in the future".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn is_trial(&self) -> bool {
        self.trial_end_date.is_some()
    }
}

/// Tenant-facing subscription reads plus the administrative initial
/// assignment. The only other path that mutates a subscription is the
/// workflow's approval transition.
#[derive(Clone)]
pub struct SubscriptionService {
    store: Arc<dyn SubscriptionStore>,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub async fn subscription_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> SubscriptionResult<Option<SubscriptionRecord>> {
        self.store.subscription_for_tenant(tenant_id).await
    }

    /// Direct plan assignment at tenant creation. Platform-admin only;
    /// tenants that already have a subscription go through the workflow.
    pub async fn assign_initial_plan(
        &self,
        actor: &Actor,
        new: NewSubscription,
    ) -> SubscriptionResult<SubscriptionRecord> {
        if !actor.is_platform_admin() {
            return Err(SubscriptionError::Unauthorized);
        }

        let now = OffsetDateTime::now_utc();
        new.validate(now)?;

        let snapshot = self.store.catalog_snapshot().await?;
        if snapshot.plan(new.plan_id).is_none() {
            return Err(SubscriptionError::PlanNotFound(new.plan_id));
        }

        let record = self.store.insert_subscription(new, now).await?;

        tracing::info!(
            tenant_id = %record.tenant_id,
            plan_id = %record.plan_id,
            is_trial = record.is_trial,
            assigned_by = %actor.user_id,
            "Assigned initial subscription plan"
        );

        Ok(record)
    }

    /// Features a higher-priced plan would unlock for this tenant.
    /// Trial tenants are compared against the trial's underlying plan.
    pub async fn upsell_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> SubscriptionResult<Vec<UpsellFeature>> {
        let snapshot = self.store.catalog_snapshot().await?;
        let subscription = self
            .store
            .subscription_for_tenant(tenant_id)
            .await?
            .filter(|s| s.is_active)
            .ok_or(SubscriptionError::NoSubscription(tenant_id))?;

        let current = snapshot
            .plan(subscription.plan_id)
            .ok_or(SubscriptionError::PlanNotFound(subscription.plan_id))?;

        Ok(entitlement::upsell_features(&snapshot, current))
    }

    /// Feature ids absent from the catalog's cheapest plan, for badging.
    pub async fn premium_feature_ids(&self) -> SubscriptionResult<BTreeSet<Uuid>> {
        let snapshot = self.store.catalog_snapshot().await?;
        Ok(entitlement::premium_only_features(&snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn new_sub(trial_end: Option<OffsetDateTime>) -> NewSubscription {
        NewSubscription {
            tenant_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            billing_cycle: BillingCycle::Monthly,
            trial_end_date: trial_end,
        }
    }

    #[test]
    fn trial_requires_future_end_date() {
        let now = OffsetDateTime::now_utc();

        assert!(new_sub(None).validate(now).is_ok());
        assert!(new_sub(Some(now + Duration::days(14))).validate(now).is_ok());

        let past = new_sub(Some(now - Duration::hours(1)));
        assert!(matches!(
            past.validate(now),
            Err(SubscriptionError::Validation(_))
        ));
    }

    #[test]
    fn trial_flag_follows_end_date() {
        let now = OffsetDateTime::now_utc();
        assert!(!new_sub(None).is_trial());
        assert!(new_sub(Some(now + Duration::days(30))).is_trial());
    }
}
