//! Plan catalog
//!
//! Immutable-per-request view of the available subscription plans and the
//! features each plan grants. Plans and features are globally shared
//! reference data, not tenant-scoped.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SubscriptionResult;
use crate::store::SubscriptionStore;

/// A named capability gate attached to one or more plans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Feature {
    pub id: Uuid,
    /// Stable machine key, e.g. "resume_export" or "calendar_sync"
    pub key: String,
    pub display_name: String,
    pub description: Option<String>,
}

/// A priced tier granting a fixed set of features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub display_name: String,
    pub price_monthly: Decimal,
    pub features: Vec<Feature>,
    pub max_users: Option<i32>,
    pub max_workflows: Option<i32>,
    pub max_exams: Option<i32>,
}

impl SubscriptionPlan {
    pub fn has_feature(&self, feature_id: Uuid) -> bool {
        self.features.iter().any(|f| f.id == feature_id)
    }
}

/// Fully materialized catalog: every plan with its features, ordered by
/// price ascending. The entitlement engine computes over this value so it
/// stays a pure function of one snapshot.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    plans: Vec<SubscriptionPlan>,
}

impl CatalogSnapshot {
    /// Build a snapshot from unordered plans. Ordering is by price
    /// ascending, then display name, then id, so ties on price still
    /// produce a deterministic sequence.
    pub fn new(mut plans: Vec<SubscriptionPlan>) -> Self {
        plans.sort_by(|a, b| {
            a.price_monthly
                .cmp(&b.price_monthly)
                .then_with(|| a.display_name.cmp(&b.display_name))
                .then_with(|| a.id.cmp(&b.id))
        });
        Self { plans }
    }

    /// Plans ordered by `price_monthly` ascending, stable.
    pub fn plans(&self) -> &[SubscriptionPlan] {
        &self.plans
    }

    pub fn plan(&self, plan_id: Uuid) -> Option<&SubscriptionPlan> {
        self.plans.iter().find(|p| p.id == plan_id)
    }

    /// The lowest-priced plan, if the catalog is non-empty.
    pub fn minimum_plan(&self) -> Option<&SubscriptionPlan> {
        self.plans.first()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

/// Read-only catalog service. No side effects anywhere.
#[derive(Clone)]
pub struct PlanCatalog {
    store: Arc<dyn SubscriptionStore>,
}

impl PlanCatalog {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    /// Plans ordered by `price_monthly` ascending, features not inlined.
    pub async fn list_plans(&self) -> SubscriptionResult<Vec<SubscriptionPlan>> {
        self.store.list_plans().await
    }

    /// One plan with its feature set; `PlanNotFound` if the id is unknown.
    pub async fn plan_with_features(&self, plan_id: Uuid) -> SubscriptionResult<SubscriptionPlan> {
        self.store.plan_with_features(plan_id).await
    }

    /// Immutable-per-request view for the entitlement engine.
    pub async fn snapshot(&self) -> SubscriptionResult<CatalogSnapshot> {
        self.store.catalog_snapshot().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn plan(name: &str, price: i64) -> SubscriptionPlan {
        SubscriptionPlan {
            id: Uuid::new_v4(),
            display_name: name.to_string(),
            price_monthly: Decimal::from(price),
            features: vec![],
            max_users: None,
            max_workflows: None,
            max_exams: None,
        }
    }

    #[test]
    fn snapshot_orders_by_price_ascending() {
        let snapshot = CatalogSnapshot::new(vec![
            plan("Enterprise", 20000),
            plan("Basic", 0),
            plan("Pro", 5000),
        ]);
        let names: Vec<&str> = snapshot
            .plans()
            .iter()
            .map(|p| p.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Basic", "Pro", "Enterprise"]);
        assert_eq!(snapshot.minimum_plan().map(|p| p.display_name.as_str()), Some("Basic"));
    }

    #[test]
    fn price_ties_break_on_display_name() {
        let snapshot = CatalogSnapshot::new(vec![
            plan("Beta", 1000),
            plan("Alpha", 1000),
        ]);
        let names: Vec<&str> = snapshot
            .plans()
            .iter()
            .map(|p| p.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);
    }

    #[test]
    fn empty_snapshot_has_no_minimum() {
        let snapshot = CatalogSnapshot::new(vec![]);
        assert!(snapshot.is_empty());
        assert!(snapshot.minimum_plan().is_none());
    }
}
