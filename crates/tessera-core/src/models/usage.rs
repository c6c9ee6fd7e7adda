//! Usage metering domain model.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A billing period — one calendar month, identified by its first day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BillingPeriod {
    pub year: i32,
    /// 1..=12
    pub month: u32,
}

impl BillingPeriod {
    /// The period containing the given instant.
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    /// The current billing period.
    pub fn current() -> Self {
        Self::containing(Utc::now())
    }

    pub fn start(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.next().start()
    }

    /// `YYYY-MM` key used in store keys and invoices.
    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Per-tenant usage accumulators for one billing period.
///
/// `storage_gb` is a last-write-wins gauge; the other components are
/// monotonic counters within the period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageMeter {
    pub tenant_id: String,
    pub period: BillingPeriod,
    pub query_count: u64,
    pub storage_gb: f64,
    pub compute_pod_hours: f64,
    pub vector_operations: u64,
}

impl UsageMeter {
    pub fn empty(tenant_id: impl Into<String>, period: BillingPeriod) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            period,
            query_count: 0,
            storage_gb: 0.0,
            compute_pod_hours: 0.0,
            vector_operations: 0,
        }
    }

    pub fn apply(&mut self, delta: &UsageDelta) {
        match *delta {
            UsageDelta::Queries(n) => self.query_count += n,
            UsageDelta::StorageGb(v) => self.storage_gb = v,
            UsageDelta::ComputePodHours(h) => self.compute_pod_hours += h,
            UsageDelta::VectorOps(n) => self.vector_operations += n,
        }
    }
}

/// A single metering event applied to a [`UsageMeter`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum UsageDelta {
    Queries(u64),
    /// Gauge: replaces the stored value.
    StorageGb(f64),
    ComputePodHours(f64),
    VectorOps(u64),
}

/// Long-horizon quota metrics tracked by `note_quota_usage`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuotaMetric {
    QueriesPerDay,
    Documents,
}

impl QuotaMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaMetric::QueriesPerDay => "queries_per_day",
            QuotaMetric::Documents => "documents",
        }
    }
}
