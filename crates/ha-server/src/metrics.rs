//! Prometheus metrics for the HA control core.

use crate::types::HaRole;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;
use std::time::Duration;

/// Labels for role transition metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TransitionLabels {
    pub from: String,
    pub to: String,
}

/// Labels for probe result metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProbeLabels {
    /// Probed URL
    pub target: String,
    /// Result (healthy, unhealthy, timeout, error)
    pub result: String,
}

/// Labels for per-target latency
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TargetLabels {
    pub target: String,
}

/// Labels for announce metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct AnnounceLabels {
    pub vip: String,
    /// Result (ok, interface, socket, bind, transmit, cancelled)
    pub result: String,
}

/// Metrics registry with all HA metrics
pub struct MetricsRegistry {
    /// Prometheus registry
    pub registry: Registry,

    /// Current role (0=unknown, 1=backup, 2=master, 3=fault)
    role: Gauge,
    transitions_total: Family<TransitionLabels, Counter>,
    probes_total: Family<ProbeLabels, Counter>,
    probe_duration_seconds: Family<TargetLabels, Histogram>,
    announces_total: Family<AnnounceLabels, Counter>,
    degraded: Gauge,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let role = Gauge::default();
        registry.register(
            "ha_role",
            "Current HA role (0=unknown, 1=backup, 2=master, 3=fault)",
            role.clone(),
        );

        let transitions_total = Family::<TransitionLabels, Counter>::default();
        registry.register(
            "ha_transitions",
            "Total HA role transitions",
            transitions_total.clone(),
        );

        let probes_total = Family::<ProbeLabels, Counter>::default();
        registry.register(
            "ha_probes",
            "Total peer probes performed",
            probes_total.clone(),
        );

        // 1ms to ~8s
        let probe_duration_seconds = Family::<TargetLabels, Histogram>::new_with_constructor(|| {
            Histogram::new(exponential_buckets(0.001, 2.0, 14))
        });
        registry.register(
            "ha_probe_duration_seconds",
            "Peer probe duration in seconds",
            probe_duration_seconds.clone(),
        );

        let announces_total = Family::<AnnounceLabels, Counter>::default();
        registry.register(
            "ha_announces",
            "Total gratuitous ARP announce attempts",
            announces_total.clone(),
        );

        let degraded = Gauge::default();
        registry.register(
            "ha_degraded",
            "Degraded health flag (1=degraded)",
            degraded.clone(),
        );

        Self {
            registry,
            role,
            transitions_total,
            probes_total,
            probe_duration_seconds,
            announces_total,
            degraded,
        }
    }

    /// Record a role transition and update the role gauge
    pub fn record_transition(&self, from: HaRole, to: HaRole) {
        self.transitions_total
            .get_or_create(&TransitionLabels {
                from: from.to_string().to_lowercase(),
                to: to.to_string().to_lowercase(),
            })
            .inc();
        self.role.set(to.as_gauge());
    }

    pub fn set_role(&self, role: HaRole) {
        self.role.set(role.as_gauge());
    }

    /// Record one probe result
    pub fn record_probe(&self, target: &str, result: &str, duration: Duration) {
        self.probes_total
            .get_or_create(&ProbeLabels {
                target: target.to_string(),
                result: result.to_string(),
            })
            .inc();

        self.probe_duration_seconds
            .get_or_create(&TargetLabels {
                target: target.to_string(),
            })
            .observe(duration.as_secs_f64());
    }

    pub fn record_announce(&self, vip: &str, result: &str) {
        self.announces_total
            .get_or_create(&AnnounceLabels {
                vip: vip.to_string(),
                result: result.to_string(),
            })
            .inc();
    }

    pub fn set_degraded(&self, degraded: bool) {
        self.degraded.set(if degraded { 1 } else { 0 });
    }
}
