// Subscriptions crate clippy configuration
// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Talentry Subscriptions
//!
//! The subscription plan-change workflow and feature-entitlement engine.
//!
//! ## Features
//!
//! - **Plan Catalog**: ordered view of plans and the features they grant
//! - **Entitlement Diff Engine**: pure upsell / premium-only computations
//! - **Subscription Records**: one plan association per tenant, with trial state
//! - **Plan-Change Workflow**: tenant-requested, admin-reviewed plan moves
//!   (`pending -> approved | rejected | cancelled`)
//! - **Invariants**: runnable consistency checks over the stored state

pub mod catalog;
pub mod entitlement;
pub mod error;
pub mod invariants;
pub mod record;
pub mod store;
pub mod workflow;


// Catalog
pub use catalog::{CatalogSnapshot, Feature, PlanCatalog, SubscriptionPlan};

// Entitlement
pub use entitlement::{
    classify_change, premium_only_features, upsell_features, ChangeDirection, UpsellFeature,
};

// Error
pub use error::{SubscriptionError, SubscriptionResult};

// Invariants
pub use invariants::{
    InvariantCheckSummary, InvariantChecker, InvariantViolation, ViolationSeverity,
};

// Record
pub use record::{NewSubscription, SubscriptionRecord, SubscriptionService};

// Store
pub use store::{MemorySubscriptionStore, PgSubscriptionStore, SubscriptionStore};

// Workflow
pub use workflow::{
    Actor, NewPlanChangeRequest, PendingRequestSummary, PlanChangeRequest, PlanChangeWorkflow,
    RequestStatus, ReviewDecision,
};

use std::sync::Arc;

use sqlx::PgPool;

/// Main service that combines the subscription subsystem behind one
/// injected store.
#[derive(Clone)]
pub struct SubscriptionCore {
    pub catalog: PlanCatalog,
    pub subscriptions: SubscriptionService,
    pub workflow: PlanChangeWorkflow,
}

impl SubscriptionCore {
    /// Build the core over any store implementation.
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            catalog: PlanCatalog::new(store.clone()),
            subscriptions: SubscriptionService::new(store.clone()),
            workflow: PlanChangeWorkflow::new(store),
        }
    }

    /// Build the core over the production Postgres store.
    pub fn postgres(pool: PgPool) -> Self {
        Self::new(Arc::new(PgSubscriptionStore::new(pool)))
    }
}
