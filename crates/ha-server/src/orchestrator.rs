//! HA role state machine.
//!
//! Transitions:
//! - Unknown → Master (keepalive disabled, or partner down and self-checks pass)
//! - Unknown → Backup (partner reachable)
//! - Backup → Master (consecutive partner probe failures reach the threshold)
//! - Master → Backup (partner takeover event)
//! - Any → Fault (required local resource unusable)
//!
//! One control task owns the role. The partner prober, the local API check,
//! status-only peer monitors and announces all run as separate tasks and hand
//! their results back over channels, so events are never queued behind a
//! probe.

use crate::metrics::MetricsRegistry;
use crate::status::StatusBoard;
use crate::types::{HaEvent, HaRole, HaSettings, KeepaliveMode};
use garp::{announce_with_cancel, AnnounceError, AnnounceOutcome, Announcer};
use neighbors::NeighborRegistry;
use probe::{ProbeMonitor, ProbeReport, ProbeResult, ProbeStatus, Prober};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub(crate) const CHANNEL_SIZE: usize = 64;

/// Failover orchestrator
pub struct Orchestrator {
    settings: HaSettings,
    partner: Option<Arc<dyn Prober>>,
    local_api: Option<Arc<dyn Prober>>,
    announcer: Arc<dyn Announcer>,
    registry: Arc<NeighborRegistry>,
    status: Arc<StatusBoard>,
    metrics: Option<Arc<MetricsRegistry>>,

    role: HaRole,
    partner_failures: u32,
    last_partner_up: bool,
    api_alive: Option<bool>,
    bind_failures: HashMap<Ipv4Addr, u32>,

    /// Cancels announces that have not started yet
    announce_cancel: CancellationToken,
    in_flight: JoinSet<()>,
    outcomes_tx: mpsc::Sender<AnnounceOutcome>,
    outcomes_rx: mpsc::Receiver<AnnounceOutcome>,
    events_tx: mpsc::Sender<HaEvent>,
    events_rx: mpsc::Receiver<HaEvent>,
    partner_tx: mpsc::Sender<ProbeReport>,
    partner_rx: mpsc::Receiver<ProbeReport>,
    api_tx: mpsc::Sender<ProbeReport>,
    api_rx: mpsc::Receiver<ProbeReport>,
    reports_tx: mpsc::Sender<ProbeReport>,
    reports_rx: mpsc::Receiver<ProbeReport>,
}

impl Orchestrator {
    pub fn new(
        settings: HaSettings,
        announcer: Arc<dyn Announcer>,
        registry: Arc<NeighborRegistry>,
        status: Arc<StatusBoard>,
    ) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::channel(CHANNEL_SIZE);
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_SIZE);
        let (partner_tx, partner_rx) = mpsc::channel(CHANNEL_SIZE);
        let (api_tx, api_rx) = mpsc::channel(CHANNEL_SIZE);
        let (reports_tx, reports_rx) = mpsc::channel(CHANNEL_SIZE);

        Self {
            settings,
            partner: None,
            local_api: None,
            announcer,
            registry,
            status,
            metrics: None,
            role: HaRole::Unknown,
            partner_failures: 0,
            last_partner_up: false,
            api_alive: None,
            bind_failures: HashMap::new(),
            announce_cancel: CancellationToken::new(),
            in_flight: JoinSet::new(),
            outcomes_tx,
            outcomes_rx,
            events_tx,
            events_rx,
            partner_tx,
            partner_rx,
            api_tx,
            api_rx,
            reports_tx,
            reports_rx,
        }
    }

    /// Set the HA partner prober
    pub fn with_partner(mut self, partner: Arc<dyn Prober>) -> Self {
        self.partner = Some(partner);
        self
    }

    /// Check the local control API; an unresponsive API marks the node degraded
    pub fn with_local_api(mut self, prober: Arc<dyn Prober>) -> Self {
        self.local_api = Some(prober);
        self
    }

    /// Receive external events on a channel created by the caller
    pub fn with_event_channel(
        mut self,
        events_tx: mpsc::Sender<HaEvent>,
        events_rx: mpsc::Receiver<HaEvent>,
    ) -> Self {
        self.events_tx = events_tx;
        self.events_rx = events_rx;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sender for external HA events
    pub fn event_sender(&self) -> mpsc::Sender<HaEvent> {
        self.events_tx.clone()
    }

    /// Sender for status-only peer probe reports
    pub fn report_sender(&self) -> mpsc::Sender<ProbeReport> {
        self.reports_tx.clone()
    }

    pub fn role(&self) -> HaRole {
        self.role
    }

    /// Consecutive partner probe failures seen while Backup
    pub fn partner_failures(&self) -> u32 {
        self.partner_failures
    }

    /// Run until `shutdown` fires
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            mode = %self.settings.mode,
            interval_ms = self.settings.probe_interval.as_millis(),
            failure_threshold = self.settings.failure_threshold,
            vips = self.settings.announce.len(),
            "Starting HA orchestrator"
        );

        self.start().await;

        let probes = shutdown.child_token();
        let mut monitors = Vec::new();
        if let Some(partner) = self.partner.clone() {
            let monitor =
                ProbeMonitor::new(partner, self.settings.probe_interval, self.partner_tx.clone());
            monitors.push(monitor.spawn(probes.clone()));
        }
        if let Some(api) = self.local_api.clone() {
            let monitor = ProbeMonitor::new(api, self.settings.probe_interval, self.api_tx.clone());
            monitors.push(monitor.spawn(probes.clone()));
        }

        // Without a partner the cycle still runs to apply the startup rules
        let mut cycle = self.partner.is_none().then(|| {
            let mut timer = interval(self.settings.probe_interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        let mut reannounce = self.settings.reannounce_interval.map(|period| {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("HA orchestrator stopping");
                    break;
                }
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event).await;
                }
                Some(outcome) = self.outcomes_rx.recv() => {
                    self.handle_outcome(outcome).await;
                }
                Some(report) = self.partner_rx.recv() => {
                    self.handle_partner(&report.target, &report.result).await;
                }
                Some(report) = self.api_rx.recv() => {
                    self.handle_api_report(report);
                }
                Some(report) = self.reports_rx.recv() => {
                    self.handle_report(report);
                }
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Announce task failed");
                    }
                }
                _ = tick_optional(&mut cycle) => {
                    self.run_cycle().await;
                }
                _ = tick_optional(&mut reannounce), if self.role == HaRole::Master => {
                    debug!("Periodic re-announce");
                    self.announce_all();
                }
            }
        }

        probes.cancel();
        for monitor in monitors {
            if let Err(e) = monitor.await {
                warn!(error = %e, "Probe monitor failed");
            }
        }

        // Pending announces are dropped, started ones report
        self.announce_cancel.cancel();
        self.wait_announces().await;
        info!(role = %self.role, "HA orchestrator stopped");
    }

    /// Apply the startup rule; keepalive disabled pins the role to Master
    pub async fn start(&mut self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_role(self.role);
        }

        if self.settings.mode == KeepaliveMode::Disabled && self.role == HaRole::Unknown {
            info!("Keepalive disabled, claiming Master");
            self.become_master("keepalive disabled").await;
        }
    }

    /// One inline probe cycle: partner first, then adjacency, then the decision
    pub async fn run_cycle(&mut self) {
        match self.partner.clone() {
            Some(partner) => {
                let result = partner.check().await;
                self.handle_partner(partner.target(), &result).await;
            }
            None => self.evaluate(false).await,
        }
    }

    /// Apply one partner probe result
    pub async fn handle_partner(&mut self, target: &str, result: &ProbeResult) {
        let up = result.is_healthy();
        let failures = if up { 0 } else { self.partner_failures + 1 };

        self.status.record_probe(target, result, failures);
        if let Some(metrics) = &self.metrics {
            metrics.record_probe(target, &status_label(result.status), result.duration);
        }

        self.evaluate(up).await;
    }

    /// Check of the local control API
    pub fn handle_api_report(&mut self, report: ProbeReport) {
        let alive = report.result.is_healthy();
        if self.api_alive != Some(alive) {
            if alive {
                info!(url = %report.target, "Local API responding");
            } else {
                warn!(url = %report.target, "Local API not responding");
            }
        }
        self.api_alive = Some(alive);

        self.handle_report(report);
        self.refresh_degraded();
    }

    async fn evaluate(&mut self, partner_up: bool) {
        self.last_partner_up = partner_up;
        self.refresh_degraded();
        self.observe(partner_up).await;
    }

    fn refresh_degraded(&self) {
        let api_down = self.api_alive == Some(false);
        let degraded =
            self.adjacency_degraded(self.last_partner_up) | self.keepalive_degraded() | api_down;

        if degraded != self.status.is_degraded() {
            info!(degraded, "Degraded status changed");
        }
        self.status.set_degraded(degraded);
        if let Some(metrics) = &self.metrics {
            metrics.set_degraded(degraded);
        }
    }

    /// Feed one partner probe outcome into the role machine
    pub async fn observe(&mut self, partner_up: bool) {
        if self.settings.mode == KeepaliveMode::Disabled {
            match self.role {
                HaRole::Unknown => self.become_master("keepalive disabled").await,
                HaRole::Master if partner_up => {
                    debug!("Partner reachable while pinned Master");
                }
                _ => {}
            }
            return;
        }

        match self.role {
            HaRole::Fault => {
                if !partner_up {
                    debug!("Partner down but node is faulted, not claiming Master");
                }
            }
            HaRole::Unknown => {
                if partner_up {
                    self.transition(HaRole::Backup, "partner reachable").await;
                } else {
                    match self.self_check().await {
                        Ok(()) => self.become_master("partner unreachable at startup").await,
                        Err(e) => {
                            self.enter_fault(&format!("self-check failed: {e}")).await;
                        }
                    }
                }
            }
            HaRole::Backup => {
                if partner_up {
                    if self.partner_failures > 0 {
                        debug!(failures = self.partner_failures, "Partner recovered");
                    }
                    self.partner_failures = 0;
                    return;
                }

                self.partner_failures += 1;
                warn!(
                    failures = self.partner_failures,
                    threshold = self.settings.failure_threshold,
                    "Partner probe failed"
                );
                if self.partner_failures >= self.settings.failure_threshold {
                    self.become_master("partner failure threshold reached").await;
                }
            }
            HaRole::Master => {}
        }
    }

    /// Handle an external HA event
    pub async fn handle_event(&mut self, event: HaEvent) {
        match event {
            HaEvent::PeerTakeover => {
                if self.settings.mode == KeepaliveMode::Disabled {
                    debug!("Ignoring partner takeover, keepalive disabled");
                    return;
                }
                if self.role == HaRole::Master {
                    self.stop_announcing();
                    self.transition(HaRole::Backup, "partner takeover").await;
                } else {
                    debug!(role = %self.role, "Ignoring partner takeover");
                }
            }
            HaEvent::ResourceFailure(reason) => {
                self.enter_fault(&reason).await;
            }
        }
    }

    /// Record one status-only peer probe
    pub fn handle_report(&mut self, report: ProbeReport) {
        self.status
            .record_probe(&report.target, &report.result, report.stats.consecutive_failures);
        if let Some(metrics) = &self.metrics {
            metrics.record_probe(&report.target, &status_label(report.result.status), report.result.duration);
        }
    }

    /// Apply the failure policy to one announce result
    pub async fn handle_outcome(&mut self, outcome: AnnounceOutcome) {
        let vip = outcome.request.target_ip;
        self.status.record_announce(&outcome);
        if let Some(metrics) = &self.metrics {
            metrics.record_announce(&vip.to_string(), announce_label(&outcome.result));
        }

        match &outcome.result {
            Ok(()) => {
                self.bind_failures.remove(&vip);
                info!(vip = %vip, interface = %outcome.request.interface, "Announced VIP");
            }
            Err(e @ AnnounceError::Socket(_)) => {
                // Host-wide resource: faults even if the node stepped down meanwhile
                error!(vip = %vip, role = %self.role, error = %e, "Packet socket unavailable");
                self.enter_fault(&e.to_string()).await;
            }
            Err(e @ AnnounceError::Bind { .. }) => {
                let count = self.bind_failures.entry(vip).or_insert(0);
                *count += 1;
                let count = *count;

                warn!(
                    vip = %vip,
                    error = %e,
                    failures = count,
                    threshold = self.settings.bind_fault_threshold,
                    "Announce bind failed"
                );
                if count >= self.settings.bind_fault_threshold {
                    self.enter_fault(&format!("repeated bind failures: {e}")).await;
                }
            }
            Err(e) => {
                warn!(vip = %vip, error = %e, "Announce failed, will retry");
            }
        }
    }

    /// Wait for every in-flight announce and apply its outcome
    pub async fn wait_announces(&mut self) {
        loop {
            tokio::select! {
                Some(outcome) = self.outcomes_rx.recv() => {
                    self.handle_outcome(outcome).await;
                }
                joined = self.in_flight.join_next() => match joined {
                    Some(Err(e)) => warn!(error = %e, "Announce task failed"),
                    Some(Ok(())) => {}
                    None => break,
                },
            }
        }

        while let Ok(outcome) = self.outcomes_rx.try_recv() {
            self.handle_outcome(outcome).await;
        }
    }

    async fn self_check(&self) -> Result<(), AnnounceError> {
        for request in &self.settings.announce {
            self.announcer.ready(request).await?;
        }
        Ok(())
    }

    async fn become_master(&mut self, reason: &str) {
        if self.role == HaRole::Fault {
            warn!(reason, "Refusing Master claim while faulted");
            return;
        }
        if self.role == HaRole::Master {
            return;
        }

        self.transition(HaRole::Master, reason).await;
        self.announce_all();
    }

    async fn enter_fault(&mut self, reason: &str) {
        if self.role == HaRole::Fault {
            return;
        }
        error!(reason, "Required local resource unusable, entering Fault");
        self.stop_announcing();
        self.transition(HaRole::Fault, reason).await;
    }

    async fn transition(&mut self, to: HaRole, reason: &str) {
        let from = self.role;
        if from == to {
            return;
        }

        self.role = to;
        self.partner_failures = 0;
        self.status.set_role(to).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_transition(from, to);
        }

        info!(from = %from, to = %to, reason, "HA role transition");
    }

    /// Fan out one announce task per VIP
    fn announce_all(&mut self) {
        for request in &self.settings.announce {
            let announcer = self.announcer.clone();
            let request = request.clone();
            let cancel = self.announce_cancel.clone();
            let done = self.outcomes_tx.clone();

            self.in_flight.spawn(async move {
                let _ = announce_with_cancel(announcer.as_ref(), &request, &cancel, &done).await;
            });
        }
    }

    fn stop_announcing(&mut self) {
        self.announce_cancel.cancel();
        self.announce_cancel = CancellationToken::new();
    }

    /// Partner answers but its BGP session is not established
    fn adjacency_degraded(&self, partner_up: bool) -> bool {
        let Some(peer) = self.settings.partner_bgp_peer else {
            return false;
        };
        if !partner_up {
            return false;
        }

        match self.registry.lookup(peer) {
            Some(entry) if entry.state.is_established() => false,
            Some(entry) => {
                warn!(peer = %peer, state = %entry.state, "Partner reachable but BGP session down");
                true
            }
            None => {
                warn!(peer = %peer, "Partner reachable but not in BGP neighbor table");
                true
            }
        }
    }

    fn keepalive_degraded(&self) -> bool {
        if !self.settings.mode.ka_mode() {
            return false;
        }
        let Some(pid_file) = &self.settings.keepalive_pid_file else {
            return false;
        };

        if liveness::process_alive(pid_file) == 0 {
            warn!(pid_file = %pid_file.display(), "Keepalive daemon not running");
            return true;
        }
        false
    }
}

async fn tick_optional(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn status_label(status: ProbeStatus) -> String {
    status.to_string().to_lowercase()
}

fn announce_label(result: &Result<(), AnnounceError>) -> &'static str {
    match result {
        Ok(()) => "ok",
        Err(AnnounceError::Interface { .. }) => "interface",
        Err(AnnounceError::Socket(_)) => "socket",
        Err(AnnounceError::Bind { .. }) => "bind",
        Err(AnnounceError::Transmit { .. }) => "transmit",
        Err(AnnounceError::Cancelled) => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use garp::AnnounceRequest;

    struct NullAnnouncer;

    #[async_trait]
    impl Announcer for NullAnnouncer {
        async fn announce(&self, _request: &AnnounceRequest) -> Result<(), AnnounceError> {
            Ok(())
        }

        async fn ready(&self, _request: &AnnounceRequest) -> Result<(), AnnounceError> {
            Ok(())
        }
    }

    fn orchestrator(mode: KeepaliveMode) -> Orchestrator {
        let settings = HaSettings {
            mode,
            ..Default::default()
        };
        Orchestrator::new(
            settings,
            Arc::new(NullAnnouncer),
            Arc::new(NeighborRegistry::new()),
            Arc::new(StatusBoard::new()),
        )
    }

    #[test]
    fn test_labels() {
        assert_eq!(status_label(ProbeStatus::Timeout), "timeout");
        assert_eq!(announce_label(&Ok(())), "ok");
        assert_eq!(announce_label(&Err(AnnounceError::Cancelled)), "cancelled");
    }

    #[tokio::test]
    async fn test_initial_role_unknown() {
        let orch = orchestrator(KeepaliveMode::SpawnIn);
        assert_eq!(orch.role(), HaRole::Unknown);
        assert_eq!(orch.partner_failures(), 0);
    }

    #[tokio::test]
    async fn test_start_pins_master_when_disabled() {
        let mut orch = orchestrator(KeepaliveMode::Disabled);
        orch.start().await;
        assert_eq!(orch.role(), HaRole::Master);

        let mut orch = orchestrator(KeepaliveMode::SpawnOut);
        orch.start().await;
        assert_eq!(orch.role(), HaRole::Unknown);
    }

    fn api_report(up: bool) -> ProbeReport {
        let duration = std::time::Duration::from_millis(2);
        ProbeReport {
            target: "http://127.0.0.1:8080/api/health".to_string(),
            result: if up {
                probe::ProbeResult::healthy(duration)
            } else {
                probe::ProbeResult::error(duration, "connection refused")
            },
            stats: probe::ProbeStats::default(),
        }
    }

    #[tokio::test]
    async fn test_local_api_outage_marks_degraded() {
        let mut orch = orchestrator(KeepaliveMode::Disabled);
        orch.start().await;
        assert!(!orch.status.is_degraded());

        orch.handle_api_report(api_report(false));
        assert!(orch.status.is_degraded());
        assert_eq!(orch.role(), HaRole::Master);

        orch.handle_api_report(api_report(true));
        assert!(!orch.status.is_degraded());
    }

    #[tokio::test]
    async fn test_optional_timer_pends_without_interval() {
        let mut none: Option<Interval> = None;
        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            tick_optional(&mut none),
        )
        .await;
        assert!(pending.is_err());
    }
}
