//! Reference enums shared across crates
//!
//! String-typed in the database, closed enums in code so that match
//! exhaustiveness is checked by the compiler.

use serde::{Deserialize, Serialize};

/// Billing cycle of a tenant's subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    #[default]
    Monthly,
    Annual,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Annual => "annual",
        }
    }

    /// Unknown values fall back to monthly, matching the column default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s {
            "annual" => BillingCycle::Annual,
            _ => BillingCycle::Monthly,
        }
    }
}

impl std::fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Platform-wide role of a user account.
///
/// Staff can read admin surfaces but not write; admin and superadmin hold
/// the platform-admin capability required to review plan-change requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformRole {
    User,
    Staff,
    Admin,
    Superadmin,
}

impl PlatformRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformRole::User => "user",
            PlatformRole::Staff => "staff",
            PlatformRole::Admin => "admin",
            PlatformRole::Superadmin => "superadmin",
        }
    }

    pub fn from_str_or_default(s: &str) -> Self {
        match s {
            "staff" => PlatformRole::Staff,
            "admin" => PlatformRole::Admin,
            "superadmin" => PlatformRole::Superadmin,
            _ => PlatformRole::User,
        }
    }

    /// Whether this role carries the platform-admin capability.
    pub fn is_platform_admin(&self) -> bool {
        matches!(self, PlatformRole::Admin | PlatformRole::Superadmin)
    }
}

impl std::fmt::Display for PlatformRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role of a user within their own tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantRole {
    Member,
    Admin,
}

impl TenantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantRole::Member => "member",
            TenantRole::Admin => "admin",
        }
    }

    pub fn from_str_or_default(s: &str) -> Self {
        match s {
            "admin" => TenantRole::Admin,
            _ => TenantRole::Member,
        }
    }
}

impl std::fmt::Display for TenantRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_admin_capability() {
        assert!(PlatformRole::Admin.is_platform_admin());
        assert!(PlatformRole::Superadmin.is_platform_admin());
        assert!(!PlatformRole::Staff.is_platform_admin());
        assert!(!PlatformRole::User.is_platform_admin());
    }

    #[test]
    fn roundtrip_role_strings() {
        for role in ["user", "staff", "admin", "superadmin"] {
            assert_eq!(PlatformRole::from_str_or_default(role).as_str(), role);
        }
        assert_eq!(
            PlatformRole::from_str_or_default("something-else"),
            PlatformRole::User
        );
    }

    #[test]
    fn billing_cycle_defaults_to_monthly() {
        assert_eq!(
            BillingCycle::from_str_or_default("weekly"),
            BillingCycle::Monthly
        );
        assert_eq!(
            BillingCycle::from_str_or_default("annual"),
            BillingCycle::Annual
        );
    }
}
