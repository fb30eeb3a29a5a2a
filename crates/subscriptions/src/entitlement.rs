//! Entitlement diff engine
//!
//! Derives which features are worth surfacing to a tenant given their
//! current plan and the full catalog.
//!
//! ## Design Principles
//!
//! 1. **Pure**: every function here is deterministic given one catalog
//!    snapshot; no IO, no clocks, no tenant state beyond the inputs
//! 2. **Correct independent of rendering**: callers may memoize these
//!    results, but correctness never depends on any cache
//! 3. **Deterministic output order**: results are ordered by feature key
//!    so identical inputs produce identical sequences

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::{CatalogSnapshot, Feature, SubscriptionPlan};

/// A feature a higher-priced plan would unlock, annotated with the
/// cheapest plan that grants it (for display).
#[derive(Debug, Clone, Serialize)]
pub struct UpsellFeature {
    pub feature: Feature,
    pub cheapest_plan_id: Uuid,
    pub cheapest_plan_price: Decimal,
}

/// Display classification of a plan change. Equal price classifies as a
/// downgrade; the only upgrade condition is a strictly higher price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    Upgrade,
    Downgrade,
}

pub fn classify_change(current_price: Decimal, requested_price: Decimal) -> ChangeDirection {
    if requested_price > current_price {
        ChangeDirection::Upgrade
    } else {
        ChangeDirection::Downgrade
    }
}

/// Features present in at least one plan priced strictly above the current
/// plan, minus the features the current plan already grants.
///
/// Trial does not change the comparison: a trial tenant is compared
/// against the trial's underlying plan price. When the same feature
/// appears in several higher plans, the result records the cheapest plan
/// that grants it. Output is ordered by feature key.
pub fn upsell_features(
    snapshot: &CatalogSnapshot,
    current_plan: &SubscriptionPlan,
) -> Vec<UpsellFeature> {
    let owned: BTreeSet<Uuid> = current_plan.features.iter().map(|f| f.id).collect();

    // feature id -> (feature, cheapest granting plan). Plans are already
    // ordered by price ascending, so the first plan seen per feature wins.
    let mut candidates: BTreeMap<Uuid, UpsellFeature> = BTreeMap::new();
    for plan in snapshot.plans() {
        if plan.price_monthly <= current_plan.price_monthly {
            continue;
        }
        for feature in &plan.features {
            if owned.contains(&feature.id) {
                continue;
            }
            candidates.entry(feature.id).or_insert_with(|| UpsellFeature {
                feature: feature.clone(),
                cheapest_plan_id: plan.id,
                cheapest_plan_price: plan.price_monthly,
            });
        }
    }

    let mut result: Vec<UpsellFeature> = candidates.into_values().collect();
    result.sort_by(|a, b| a.feature.key.cmp(&b.feature.key));
    result
}

/// Feature ids NOT granted by the catalog's lowest-priced plan.
///
/// Partitions any tenant's entitlements into "baseline" vs "premium" for
/// UI badging. Independent of any one tenant's subscription. An empty
/// catalog yields an empty set, never an error.
pub fn premium_only_features(snapshot: &CatalogSnapshot) -> BTreeSet<Uuid> {
    let Some(minimum) = snapshot.minimum_plan() else {
        return BTreeSet::new();
    };
    let baseline: BTreeSet<Uuid> = minimum.features.iter().map(|f| f.id).collect();

    snapshot
        .plans()
        .iter()
        .flat_map(|p| p.features.iter())
        .map(|f| f.id)
        .filter(|id| !baseline.contains(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(key: &str) -> Feature {
        Feature {
            id: Uuid::new_v4(),
            key: key.to_string(),
            display_name: key.to_uppercase(),
            description: None,
        }
    }

    fn plan(name: &str, price: i64, features: Vec<Feature>) -> SubscriptionPlan {
        SubscriptionPlan {
            id: Uuid::new_v4(),
            display_name: name.to_string(),
            price_monthly: Decimal::from(price),
            features,
            max_users: None,
            max_workflows: None,
            max_exams: None,
        }
    }

    /// Catalog from the reference scenario: Basic(A), Pro(A,B,C),
    /// Enterprise(A,B,C,D).
    fn scenario_catalog() -> (CatalogSnapshot, [Feature; 4]) {
        let a = feature("a");
        let b = feature("b");
        let c = feature("c");
        let d = feature("d");
        let snapshot = CatalogSnapshot::new(vec![
            plan("Basic", 0, vec![a.clone()]),
            plan("Pro", 5000, vec![a.clone(), b.clone(), c.clone()]),
            plan(
                "Enterprise",
                20000,
                vec![a.clone(), b.clone(), c.clone(), d.clone()],
            ),
        ]);
        (snapshot, [a, b, c, d])
    }

    #[test]
    fn upsell_from_pro_is_exactly_d() {
        let (snapshot, [_, _, _, d]) = scenario_catalog();
        let pro = snapshot
            .plans()
            .iter()
            .find(|p| p.display_name == "Pro")
            .unwrap()
            .clone();

        let upsell = upsell_features(&snapshot, &pro);
        assert_eq!(upsell.len(), 1);
        assert_eq!(upsell[0].feature.id, d.id);
        // Enterprise is the only (and therefore cheapest) plan granting D
        assert_eq!(upsell[0].cheapest_plan_price, Decimal::from(20000));
    }

    #[test]
    fn upsell_records_cheapest_granting_plan() {
        let shared = feature("analytics");
        let snapshot = CatalogSnapshot::new(vec![
            plan("Basic", 0, vec![]),
            plan("Pro", 5000, vec![shared.clone()]),
            plan("Enterprise", 20000, vec![shared.clone()]),
        ]);
        let basic = snapshot.minimum_plan().unwrap().clone();

        let upsell = upsell_features(&snapshot, &basic);
        assert_eq!(upsell.len(), 1);
        assert_eq!(upsell[0].cheapest_plan_price, Decimal::from(5000));
    }

    #[test]
    fn premium_only_excludes_baseline() {
        let (snapshot, [a, b, c, d]) = scenario_catalog();
        let premium = premium_only_features(&snapshot);
        assert!(!premium.contains(&a.id));
        assert!(premium.contains(&b.id));
        assert!(premium.contains(&c.id));
        assert!(premium.contains(&d.id));
        assert_eq!(premium.len(), 3);
    }

    #[test]
    fn empty_catalog_yields_empty_sets() {
        let snapshot = CatalogSnapshot::new(vec![]);
        assert!(premium_only_features(&snapshot).is_empty());

        let orphan = plan("Orphan", 100, vec![feature("x")]);
        assert!(upsell_features(&snapshot, &orphan).is_empty());
    }

    #[test]
    fn zero_feature_plan_grants_nothing_premium() {
        let snapshot = CatalogSnapshot::new(vec![
            plan("Basic", 0, vec![feature("a")]),
            plan("Empty", 3000, vec![]),
        ]);
        // The empty plan contributes nothing to the premium set
        assert!(premium_only_features(&snapshot).is_empty());
    }

    #[test]
    fn engine_is_idempotent_over_unchanged_snapshot() {
        let (snapshot, _) = scenario_catalog();
        let pro = snapshot
            .plans()
            .iter()
            .find(|p| p.display_name == "Pro")
            .unwrap()
            .clone();

        let first: Vec<Uuid> = upsell_features(&snapshot, &pro)
            .iter()
            .map(|u| u.feature.id)
            .collect();
        let second: Vec<Uuid> = upsell_features(&snapshot, &pro)
            .iter()
            .map(|u| u.feature.id)
            .collect();
        assert_eq!(first, second);
        assert_eq!(premium_only_features(&snapshot), premium_only_features(&snapshot));
    }

    #[test]
    fn equal_price_classifies_as_downgrade() {
        assert_eq!(
            classify_change(Decimal::from(5000), Decimal::from(5000)),
            ChangeDirection::Downgrade
        );
        assert_eq!(
            classify_change(Decimal::from(5000), Decimal::from(20000)),
            ChangeDirection::Upgrade
        );
        assert_eq!(
            classify_change(Decimal::from(5000), Decimal::from(0)),
            ChangeDirection::Downgrade
        );
    }
}
