#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Talentry Shared
//!
//! Types and helpers shared between the subscription domain crate and the
//! API server: database pool construction, the migrations runner, and the
//! reference enums both sides agree on.

pub mod db;
pub mod types;

pub use db::{create_pool, run_migrations};
pub use types::{BillingCycle, PlatformRole, TenantRole};
