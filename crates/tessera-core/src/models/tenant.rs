//! Tenant domain model.
//!
//! Tenants are isolated business units sharing pooled platform
//! resources. Every data-plane call is scoped to exactly one tenant;
//! all other domain entities reference a `tenant_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TesseraError, TesseraResult};

/// Maximum length of a tenant id.
pub const TENANT_ID_MAX_LEN: usize = 64;

/// Validate a tenant id against the canonical charset
/// `[A-Za-z0-9_-]{1,64}`.
pub fn validate_tenant_id(id: &str) -> TesseraResult<()> {
    if id.is_empty() || id.len() > TENANT_ID_MAX_LEN {
        return Err(TesseraError::InvalidArgument {
            message: format!(
                "tenant id must be 1..={TENANT_ID_MAX_LEN} characters, got {}",
                id.len()
            ),
        });
    }
    if let Some(c) = id
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
    {
        return Err(TesseraError::InvalidArgument {
            message: format!("tenant id contains invalid character {c:?}"),
        });
    }
    Ok(())
}

/// Service tier. Ordering is significant: `Bronze < Silver < Gold <
/// Platinum` governs priority, default quotas, and baseline rates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Bronze, Tier::Silver, Tier::Gold, Tier::Platinum];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
        }
    }

    /// The next tier down, if any. Used for quota-override minima.
    pub fn next_lower(&self) -> Option<Tier> {
        match self {
            Tier::Platinum => Some(Tier::Gold),
            Tier::Gold => Some(Tier::Silver),
            Tier::Silver => Some(Tier::Bronze),
            Tier::Bronze => None,
        }
    }

    /// Default quota set for a tenant of this tier.
    pub fn default_quotas(&self) -> QuotaSet {
        match self {
            Tier::Platinum => QuotaSet {
                max_queries_per_day: 1_000_000,
                max_concurrent: 256,
                max_storage_gb: 10_000.0,
                max_documents: 10_000_000,
                rate_qpm: 6_000,
                cache_quota_gb: 500.0,
                sla_target: 0.999,
                support_level: SupportLevel::Dedicated,
            },
            Tier::Gold => QuotaSet {
                max_queries_per_day: 250_000,
                max_concurrent: 128,
                max_storage_gb: 2_000.0,
                max_documents: 2_000_000,
                rate_qpm: 1_500,
                cache_quota_gb: 100.0,
                sla_target: 0.995,
                support_level: SupportLevel::Priority,
            },
            Tier::Silver => QuotaSet {
                max_queries_per_day: 50_000,
                max_concurrent: 32,
                max_storage_gb: 500.0,
                max_documents: 500_000,
                rate_qpm: 300,
                cache_quota_gb: 20.0,
                sla_target: 0.99,
                support_level: SupportLevel::Standard,
            },
            Tier::Bronze => QuotaSet {
                max_queries_per_day: 10_000,
                max_concurrent: 8,
                max_storage_gb: 100.0,
                max_documents: 100_000,
                rate_qpm: 60,
                cache_quota_gb: 5.0,
                sla_target: 0.95,
                support_level: SupportLevel::Community,
            },
        }
    }

    /// Default cache entry TTL in seconds for this tier.
    pub fn cache_ttl_secs(&self) -> u64 {
        match self {
            Tier::Platinum => 3_600,
            Tier::Gold => 1_800,
            Tier::Silver => 900,
            Tier::Bronze => 600,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Support level granted with a quota set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SupportLevel {
    Community,
    Standard,
    Priority,
    Dedicated,
}

/// Lifecycle status of a tenant. Transitions are governed by the
/// state machine in [`crate::lifecycle`]; `Deleted` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Suspended,
    Migrating,
    Archived,
    Deleted,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Migrating => "migrating",
            TenantStatus::Archived => "archived",
            TenantStatus::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a tenant's data lives relative to other tenants. Informs
/// which stores the cascading operator must touch on lifecycle
/// changes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationModel {
    SharedDb,
    SharedSchema,
    SeparateDb,
    Hybrid,
}

/// Per-tenant resource ceilings. Tier defaults apply where a create
/// request leaves fields unset; overrides must satisfy tier minima.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotaSet {
    pub max_queries_per_day: u64,
    pub max_concurrent: u32,
    pub max_storage_gb: f64,
    pub max_documents: u64,
    pub rate_qpm: u32,
    pub cache_quota_gb: f64,
    /// SLA availability target in `0.0..=1.0`.
    pub sla_target: f64,
    pub support_level: SupportLevel,
}

impl QuotaSet {
    /// Apply partial overrides on top of this quota set.
    pub fn with_overrides(mut self, overrides: &QuotaOverrides) -> Self {
        if let Some(v) = overrides.max_queries_per_day {
            self.max_queries_per_day = v;
        }
        if let Some(v) = overrides.max_concurrent {
            self.max_concurrent = v;
        }
        if let Some(v) = overrides.max_storage_gb {
            self.max_storage_gb = v;
        }
        if let Some(v) = overrides.max_documents {
            self.max_documents = v;
        }
        if let Some(v) = overrides.rate_qpm {
            self.rate_qpm = v;
        }
        if let Some(v) = overrides.cache_quota_gb {
            self.cache_quota_gb = v;
        }
        if let Some(v) = overrides.sla_target {
            self.sla_target = v;
        }
        if let Some(v) = overrides.support_level {
            self.support_level = v;
        }
        self
    }

    /// Validate this quota set for a tenant of the given tier.
    ///
    /// Every ceiling must be at least the default of the next-lower
    /// tier (bronze values only need to be positive), so that tier
    /// ordering stays meaningful under per-tenant overrides.
    pub fn validate_for_tier(&self, tier: Tier) -> TesseraResult<()> {
        if !(0.0..=1.0).contains(&self.sla_target) {
            return Err(TesseraError::InvalidArgument {
                message: format!("sla_target must be in 0..=1, got {}", self.sla_target),
            });
        }
        let floor = match tier.next_lower() {
            Some(lower) => lower.default_quotas(),
            None => {
                if self.max_queries_per_day == 0 || self.rate_qpm == 0 || self.max_concurrent == 0 {
                    return Err(TesseraError::InvalidArgument {
                        message: "quota ceilings must be positive".into(),
                    });
                }
                return Ok(());
            }
        };
        let violations = [
            (
                self.max_queries_per_day < floor.max_queries_per_day,
                "max_queries_per_day",
            ),
            (self.max_concurrent < floor.max_concurrent, "max_concurrent"),
            (self.max_storage_gb < floor.max_storage_gb, "max_storage_gb"),
            (self.max_documents < floor.max_documents, "max_documents"),
            (self.rate_qpm < floor.rate_qpm, "rate_qpm"),
            (
                self.cache_quota_gb < floor.cache_quota_gb,
                "cache_quota_gb",
            ),
        ];
        if let Some((_, field)) = violations.iter().find(|(violated, _)| *violated) {
            return Err(TesseraError::InvalidArgument {
                message: format!("{field} override is below the {tier} tier minimum"),
            });
        }
        Ok(())
    }
}

/// Partial quota overrides supplied at create/update time.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuotaOverrides {
    pub max_queries_per_day: Option<u64>,
    pub max_concurrent: Option<u32>,
    pub max_storage_gb: Option<f64>,
    pub max_documents: Option<u64>,
    pub rate_qpm: Option<u32>,
    pub cache_quota_gb: Option<f64>,
    pub sla_target: Option<f64>,
    pub support_level: Option<SupportLevel>,
}

impl QuotaOverrides {
    pub fn is_empty(&self) -> bool {
        self.max_queries_per_day.is_none()
            && self.max_concurrent.is_none()
            && self.max_storage_gb.is_none()
            && self.max_documents.is_none()
            && self.rate_qpm.is_none()
            && self.cache_quota_gb.is_none()
            && self.sla_target.is_none()
            && self.support_level.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// Stable opaque id, `[A-Za-z0-9_-]{1,64}`. Immutable.
    pub tenant_id: String,
    pub display_name: String,
    pub admin_contact: String,
    pub tier: Tier,
    pub status: TenantStatus,
    pub isolation: IsolationModel,
    /// Required geographic region for this tenant's data. Immutable
    /// once any data exists; changes go through a migration.
    pub residency_region: String,
    pub kms_key_id: Option<String>,
    /// Blocks deletion while set, regardless of pending requests.
    pub legal_hold: bool,
    pub quotas: QuotaSet,
    /// Derived health score, 0..=100. Updated by the health monitor.
    pub health_score: u8,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Monotonic: once set the tenant is invisible to non-admin reads.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields required to create a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub tenant_id: String,
    pub display_name: String,
    pub admin_contact: String,
    pub tier: Tier,
    pub isolation: Option<IsolationModel>,
    pub residency_region: String,
    pub kms_key_id: Option<String>,
    pub quotas: Option<QuotaOverrides>,
    pub metadata: Option<serde_json::Value>,
}

/// Fields that can be updated on an existing tenant.
///
/// `tenant_id`, `created_at`, and `status` are deliberately absent:
/// identity and creation time are immutable, and status changes go
/// through the lifecycle manager.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTenant {
    pub display_name: Option<String>,
    pub admin_contact: Option<String>,
    pub tier: Option<Tier>,
    pub residency_region: Option<String>,
    /// `Some(Some(v))` = set, `Some(None)` = clear, `None` = no change.
    pub kms_key_id: Option<Option<String>>,
    pub legal_hold: Option<bool>,
    pub quotas: Option<QuotaOverrides>,
    pub metadata: Option<serde_json::Value>,
}

/// Filters for tenant listing. All filters are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct TenantFilter {
    pub status: Option<TenantStatus>,
    pub tier: Option<Tier>,
    pub min_health: Option<u8>,
    /// Include soft-deleted tenants (administrative reads only).
    pub include_deleted: bool,
}

impl TenantFilter {
    pub fn matches(&self, tenant: &Tenant) -> bool {
        if !self.include_deleted && tenant.deleted_at.is_some() {
            return false;
        }
        if let Some(status) = self.status
            && tenant.status != status
        {
            return false;
        }
        if let Some(tier) = self.tier
            && tenant.tier != tier
        {
            return false;
        }
        if let Some(min) = self.min_health
            && tenant.health_score < min
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_id_charset() {
        assert!(validate_tenant_id("finance").is_ok());
        assert!(validate_tenant_id("Tenant_42-a").is_ok());
        assert!(validate_tenant_id("").is_err());
        assert!(validate_tenant_id("bad.id").is_err());
        assert!(validate_tenant_id("space id").is_err());
        assert!(validate_tenant_id(&"x".repeat(65)).is_err());
        assert!(validate_tenant_id(&"x".repeat(64)).is_ok());
    }

    #[test]
    fn tier_ordering() {
        assert!(Tier::Platinum > Tier::Gold);
        assert!(Tier::Gold > Tier::Silver);
        assert!(Tier::Silver > Tier::Bronze);
    }

    #[test]
    fn default_quotas_monotone_in_tier() {
        for tier in Tier::ALL {
            if let Some(lower) = tier.next_lower() {
                let hi = tier.default_quotas();
                let lo = lower.default_quotas();
                assert!(hi.max_queries_per_day > lo.max_queries_per_day);
                assert!(hi.rate_qpm > lo.rate_qpm);
                assert!(hi.sla_target > lo.sla_target);
            }
        }
    }

    #[test]
    fn override_below_tier_minimum_rejected() {
        let quotas = Tier::Gold
            .default_quotas()
            .with_overrides(&QuotaOverrides {
                rate_qpm: Some(10), // below silver's 300
                ..Default::default()
            });
        assert!(quotas.validate_for_tier(Tier::Gold).is_err());
    }

    #[test]
    fn override_above_tier_minimum_accepted() {
        let quotas = Tier::Gold
            .default_quotas()
            .with_overrides(&QuotaOverrides {
                rate_qpm: Some(2_000),
                ..Default::default()
            });
        assert!(quotas.validate_for_tier(Tier::Gold).is_ok());
    }
}
