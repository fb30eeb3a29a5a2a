//! Storage seam for the subscription domain
//!
//! The trait captures exactly the operational primitives the workflow
//! needs, including the two it needs to be atomic: the pending-uniqueness
//! check-and-insert and the compare-and-swap review transition. Postgres
//! is the production implementation; the in-memory implementation backs
//! the workflow and race tests.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::catalog::{CatalogSnapshot, SubscriptionPlan};
use crate::error::SubscriptionResult;
use crate::record::{NewSubscription, SubscriptionRecord};
use crate::workflow::{
    NewPlanChangeRequest, PendingRequestSummary, PlanChangeRequest, ReviewDecision,
};

mod memory;
mod postgres;

pub use memory::MemorySubscriptionStore;
pub use postgres::PgSubscriptionStore;

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Plans without features inline, ordered by price ascending.
    async fn list_plans(&self) -> SubscriptionResult<Vec<SubscriptionPlan>>;

    /// One plan with its full feature set. `PlanNotFound` if absent.
    async fn plan_with_features(&self, plan_id: Uuid) -> SubscriptionResult<SubscriptionPlan>;

    /// Fully materialized catalog for the entitlement engine. A slightly
    /// stale snapshot is acceptable; plan definitions change far less
    /// often than subscriptions.
    async fn catalog_snapshot(&self) -> SubscriptionResult<CatalogSnapshot>;

    async fn subscription_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> SubscriptionResult<Option<SubscriptionRecord>>;

    /// Insert the tenant's initial subscription. `Conflict` if the tenant
    /// already has one.
    async fn insert_subscription(
        &self,
        new: NewSubscription,
        now: OffsetDateTime,
    ) -> SubscriptionResult<SubscriptionRecord>;

    /// Atomic check-and-insert of a pending request. When the tenant
    /// already has a pending request - including a concurrently inserted
    /// one - this fails with `AlreadyPending` and writes nothing.
    async fn insert_pending_request(
        &self,
        new: NewPlanChangeRequest,
    ) -> SubscriptionResult<PlanChangeRequest>;

    async fn request_by_id(&self, id: Uuid) -> SubscriptionResult<Option<PlanChangeRequest>>;

    /// Tenant history, newest first.
    async fn requests_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> SubscriptionResult<Vec<PlanChangeRequest>>;

    /// All pending requests, tenant-annotated, oldest first.
    async fn pending_requests(&self) -> SubscriptionResult<Vec<PendingRequestSummary>>;

    /// Compare-and-swap `pending -> cancelled`. `RequestNotFound` if the
    /// id is unknown, `InvalidTransition` if the row left pending first.
    async fn cancel_pending(
        &self,
        request_id: Uuid,
        now: OffsetDateTime,
    ) -> SubscriptionResult<PlanChangeRequest>;

    /// Commit a review decision as one unit of work: compare-and-swap the
    /// request out of `pending` and, when approved, move the tenant's
    /// subscription to the requested plan and clear trial state. No
    /// partial application is ever observable.
    async fn commit_review(
        &self,
        request_id: Uuid,
        decision: ReviewDecision,
        reviewer_id: Uuid,
        message: Option<String>,
        now: OffsetDateTime,
    ) -> SubscriptionResult<PlanChangeRequest>;
}
