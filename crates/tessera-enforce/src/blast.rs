//! Blast-radius detection.
//!
//! The detector scans per-tenant error and latency signals against
//! recorded baselines:
//!
//! - P0: error rate above 10x baseline sustained for at least 60 s, or
//!   latency p95 above 5x baseline.
//! - P1: 3x..10x on either signal.
//! - P2: customer-reported only.
//!
//! A P0 opens an incident, instructs the noisy-neighbor controller to
//! apply critical mitigation, and emits an alert; closure requires two
//! consecutive normal scan periods. Repeated `Unavailable` answers
//! from the telemetry source raise a latent incident, since blindness
//! over a tenant is itself a finding.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tessera_control::audit::AuditTrail;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::health::HealthSignals;
use tessera_core::models::audit::{AuditOutcome, AuditRecord};
use tessera_core::models::incident::{Incident, IncidentPriority};
use tessera_core::models::tenant::{TenantFilter, TenantStatus};
use tessera_core::repository::{AuditSink, TenantStore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::neighbor::NoisyNeighborController;

/// Source of per-tenant telemetry sampled by the scan loop.
pub trait SignalSource: Send + Sync {
    fn sample(&self, tenant_id: &str)
    -> impl Future<Output = TesseraResult<HealthSignals>> + Send;
}

#[derive(Debug, Clone, Copy)]
pub struct BlastConfig {
    pub p0_error_ratio: f64,
    pub p0_latency_ratio: f64,
    pub p1_ratio: f64,
    /// How long an error spike must persist before it counts as P0.
    pub sustain: Duration,
    pub close_after_normal_periods: u32,
    /// Consecutive `Unavailable` samples before a latent incident.
    pub latent_unavailable_scans: u32,
    pub scan_interval: Duration,
    /// Baselines assumed for tenants that never recorded one.
    pub default_baseline_error_rate: f64,
    pub default_baseline_latency_ms: f64,
}

impl Default for BlastConfig {
    fn default() -> Self {
        Self {
            p0_error_ratio: 10.0,
            p0_latency_ratio: 5.0,
            p1_ratio: 3.0,
            sustain: Duration::from_secs(60),
            close_after_normal_periods: 2,
            latent_unavailable_scans: 3,
            scan_interval: Duration::from_secs(30),
            default_baseline_error_rate: 0.01,
            default_baseline_latency_ms: 200.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TenantWindow {
    baseline_error_rate: Option<f64>,
    baseline_latency_ms: Option<f64>,
    /// When the current error spike began, if one is running.
    elevated_since: Option<Instant>,
    normal_streak: u32,
    unavailable_streak: u32,
}

impl Default for TenantWindow {
    fn default() -> Self {
        Self {
            baseline_error_rate: None,
            baseline_latency_ms: None,
            elevated_since: None,
            normal_streak: 0,
            unavailable_streak: 0,
        }
    }
}

/// What one observation calls for, decided under the window lock and
/// executed after it is released.
enum Verdict {
    Normal,
    CloseIncident,
    Elevated {
        priority: IncidentPriority,
        hint: String,
    },
}

pub struct BlastRadiusDetector<A> {
    neighbor: Arc<NoisyNeighborController<A>>,
    audit: AuditTrail<A>,
    windows: DashMap<String, TenantWindow>,
    open: DashMap<String, Incident>,
    resolved: Mutex<Vec<Incident>>,
    config: BlastConfig,
}

impl<A: AuditSink> BlastRadiusDetector<A> {
    pub fn new(
        neighbor: Arc<NoisyNeighborController<A>>,
        audit: AuditTrail<A>,
        config: BlastConfig,
    ) -> Self {
        Self {
            neighbor,
            audit,
            windows: DashMap::new(),
            open: DashMap::new(),
            resolved: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Record the normal operating point for a tenant.
    pub fn set_baseline(&self, tenant_id: &str, error_rate: f64, latency_p95_ms: f64) {
        let mut window = self.windows.entry(tenant_id.to_string()).or_default();
        window.baseline_error_rate = Some(error_rate);
        window.baseline_latency_ms = Some(latency_p95_ms);
    }

    /// Feed one scan period's signals for a tenant. Returns the
    /// classification, `None` meaning normal.
    pub async fn observe(
        &self,
        tenant_id: &str,
        signals: &HealthSignals,
    ) -> Option<IncidentPriority> {
        let verdict = {
            let mut window = self.windows.entry(tenant_id.to_string()).or_default();
            window.unavailable_streak = 0;

            let baseline_err = window
                .baseline_error_rate
                .unwrap_or(self.config.default_baseline_error_rate)
                .max(f64::EPSILON);
            let baseline_lat = window
                .baseline_latency_ms
                .unwrap_or(self.config.default_baseline_latency_ms)
                .max(f64::EPSILON);
            let error_ratio = signals.error_rate / baseline_err;
            let latency_ratio = signals.latency_p95_ms / baseline_lat;

            let now = Instant::now();
            // The two arms are evaluated independently: a concurrent
            // error spike must not mask an immediate latency P0.
            let error_candidate = if error_ratio > self.config.p0_error_ratio {
                let since = *window.elevated_since.get_or_insert(now);
                if now - since >= self.config.sustain {
                    Some((
                        IncidentPriority::P0,
                        format!("error rate {error_ratio:.1}x baseline, sustained"),
                    ))
                } else {
                    // Spike seen but not yet sustained; treat as P1.
                    Some((
                        IncidentPriority::P1,
                        format!("error rate {error_ratio:.1}x baseline"),
                    ))
                }
            } else {
                window.elevated_since = None;
                None
            };
            let latency_candidate = if latency_ratio > self.config.p0_latency_ratio {
                Some((
                    IncidentPriority::P0,
                    format!("latency p95 {latency_ratio:.1}x baseline"),
                ))
            } else {
                None
            };

            let candidate = match (error_candidate, latency_candidate) {
                (Some(e), Some(l)) => Some(if l.0 > e.0 { l } else { e }),
                (e, l) => e.or(l),
            };
            if let Some((priority, hint)) = candidate {
                Verdict::Elevated { priority, hint }
            } else if error_ratio >= self.config.p1_ratio || latency_ratio >= self.config.p1_ratio {
                Verdict::Elevated {
                    priority: IncidentPriority::P1,
                    hint: format!(
                        "error rate {error_ratio:.1}x, latency {latency_ratio:.1}x baseline"
                    ),
                }
            } else if self.open.contains_key(tenant_id) {
                window.normal_streak += 1;
                if window.normal_streak >= self.config.close_after_normal_periods {
                    window.normal_streak = 0;
                    Verdict::CloseIncident
                } else {
                    Verdict::Normal
                }
            } else {
                window.normal_streak = 0;
                Verdict::Normal
            }
        };

        match verdict {
            Verdict::Normal => None,
            Verdict::CloseIncident => {
                self.close_incident(tenant_id).await;
                None
            }
            Verdict::Elevated { priority, hint } => {
                if let Some(mut w) = self.windows.get_mut(tenant_id) {
                    w.normal_streak = 0;
                }
                self.raise(tenant_id, priority, &hint).await;
                Some(priority)
            }
        }
    }

    /// A telemetry sample came back `Unavailable`. Enough consecutive
    /// misses raise a latent P1 incident.
    pub async fn note_unavailable(&self, tenant_id: &str) {
        let raise = {
            let mut window = self.windows.entry(tenant_id.to_string()).or_default();
            window.unavailable_streak += 1;
            window.unavailable_streak == self.config.latent_unavailable_scans
        };
        if raise {
            self.raise(
                tenant_id,
                IncidentPriority::P1,
                &format!(
                    "telemetry unavailable for {} consecutive scans",
                    self.config.latent_unavailable_scans
                ),
            )
            .await;
        }
    }

    /// Open a P2 incident from a customer report.
    pub async fn report_customer_issue(&self, tenant_id: &str, description: &str) -> Incident {
        let incident = Incident::open(tenant_id, IncidentPriority::P2, description);
        self.audit
            .record(
                AuditRecord::new(tenant_id, "incident_open", "customer", AuditOutcome::Success)
                    .with_after(serde_json::json!({
                        "incident_id": incident.id,
                        "priority": incident.priority.as_str(),
                        "root_hint": incident.root_hint,
                    })),
            )
            .await;
        self.open
            .entry(tenant_id.to_string())
            .or_insert_with(|| incident.clone());
        incident
    }

    async fn raise(&self, tenant_id: &str, priority: IncidentPriority, hint: &str) {
        // P0 re-arms the mitigation on every scan so an expiring
        // circuit break cannot lapse mid-incident.
        let mitigate = match self.open.get_mut(tenant_id) {
            Some(mut incident) => {
                if priority > incident.priority {
                    incident.priority = priority;
                }
                priority == IncidentPriority::P0
            }
            None => {
                let incident = Incident::open(tenant_id, priority, hint);
                error!(
                    tenant_id,
                    incident_id = %incident.id,
                    priority = priority.as_str(),
                    hint,
                    "incident opened"
                );
                self.audit
                    .record(
                        AuditRecord::new(tenant_id, "incident_open", "system", AuditOutcome::Success)
                            .with_after(serde_json::json!({
                                "incident_id": incident.id,
                                "priority": priority.as_str(),
                                "root_hint": hint,
                            })),
                    )
                    .await;
                self.open.insert(tenant_id.to_string(), incident);
                priority == IncidentPriority::P0
            }
        };
        if mitigate {
            self.neighbor.apply_critical(tenant_id, hint).await;
            if let Some(mut incident) = self.open.get_mut(tenant_id)
                && incident.actions_taken.last().map(String::as_str) != Some("circuit-break")
            {
                incident.actions_taken.push("circuit-break".into());
            }
        }
    }

    async fn close_incident(&self, tenant_id: &str) {
        let Some((_, mut incident)) = self.open.remove(tenant_id) else {
            return;
        };
        incident.closed_at = Some(Utc::now());
        self.audit
            .record(
                AuditRecord::new(tenant_id, "incident_close", "system", AuditOutcome::Success)
                    .with_after(serde_json::json!({
                        "incident_id": incident.id,
                        "priority": incident.priority.as_str(),
                        "actions_taken": incident.actions_taken,
                    })),
            )
            .await;
        self.resolved.lock().push(incident);
    }

    /// The open incident for a tenant, if any.
    pub fn open_incident(&self, tenant_id: &str) -> Option<Incident> {
        self.open.get(tenant_id).map(|i| i.clone())
    }

    pub fn resolved_incidents(&self) -> Vec<Incident> {
        self.resolved.lock().clone()
    }

    /// Background scan loop sampling every active tenant.
    pub fn spawn<S, Src>(
        self: Arc<Self>,
        tenants: Arc<S>,
        source: Arc<Src>,
        cancel: CancellationToken,
    ) -> JoinHandle<()>
    where
        S: TenantStore + 'static,
        Src: SignalSource + 'static,
        A: AuditSink + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.scan_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let filter = TenantFilter {
                    status: Some(TenantStatus::Active),
                    ..Default::default()
                };
                let active = match tenants.list(&filter).await {
                    Ok(active) => active,
                    Err(err) => {
                        warn!(error = %err, "blast-radius scan skipped, tenant listing failed");
                        continue;
                    }
                };
                for tenant in active {
                    match source.sample(&tenant.tenant_id).await {
                        Ok(signals) => {
                            self.observe(&tenant.tenant_id, &signals).await;
                        }
                        Err(TesseraError::Unavailable { .. }) => {
                            self.note_unavailable(&tenant.tenant_id).await;
                        }
                        Err(err) => {
                            warn!(tenant_id = %tenant.tenant_id, error = %err,
                                "telemetry sample failed");
                        }
                    }
                }
            }
        })
    }
}
