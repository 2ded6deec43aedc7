//! HA server wiring.

use crate::config::Config;
use crate::http_server::{AppState, MetricsServer};
use crate::metrics::MetricsRegistry;
use crate::orchestrator::{Orchestrator, CHANNEL_SIZE};
use crate::status::StatusBoard;
use crate::types::HaEvent;
use garp::{resolve_link, AnnounceRequest, GarpAnnouncer};
use neighbors::NeighborRegistry;
use probe::{ApiLivenessProber, HttpsProber, ProbeMonitor, Prober};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// HA control server
pub struct HaServer {
    config: Config,
    registry: Arc<NeighborRegistry>,
    status: Arc<StatusBoard>,
    events_tx: mpsc::Sender<HaEvent>,
    events_rx: mpsc::Receiver<HaEvent>,
}

impl HaServer {
    pub fn new(config: Config) -> Self {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_SIZE);
        Self {
            config,
            registry: Arc::new(NeighborRegistry::new()),
            status: Arc::new(StatusBoard::new()),
            events_tx,
            events_rx,
        }
    }

    /// Sender for partner takeover and resource failure events
    pub fn event_sender(&self) -> mpsc::Sender<HaEvent> {
        self.events_tx.clone()
    }

    /// Neighbor registry for the external BGP state source to refresh
    pub fn registry(&self) -> Arc<NeighborRegistry> {
        self.registry.clone()
    }

    /// Read-only status shared with the status API
    pub fn status(&self) -> Arc<StatusBoard> {
        self.status.clone()
    }

    /// Run until `shutdown` fires
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), common::Error> {
        info!("Starting HA server");

        let tls = self.config.tls_identity()?;
        let mut settings = self.config.to_settings();
        settings.announce = usable_announces(&settings.announce);

        let metrics = if self.config.metrics.enabled {
            info!("Metrics enabled on {}", self.config.metrics.listen_addr);
            Some(Arc::new(MetricsRegistry::new()))
        } else {
            info!("Metrics disabled");
            None
        };

        let mut orchestrator = Orchestrator::new(
            settings,
            Arc::new(GarpAnnouncer::new()),
            self.registry.clone(),
            self.status.clone(),
        )
        .with_event_channel(self.events_tx.clone(), self.events_rx);

        if let Some(target) = self.config.partner_target(tls.as_ref()) {
            let prober = HttpsProber::new(target)?;
            info!(url = prober.target(), "Probing HA partner");
            orchestrator = orchestrator.with_partner(Arc::new(prober));
        }
        if let Some(url) = &self.config.probe.api_liveness_url {
            let prober = ApiLivenessProber::new(url.trim())?;
            info!(url = prober.target(), "Checking local API");
            orchestrator = orchestrator.with_local_api(Arc::new(prober));
        }
        if let Some(ref registry) = metrics {
            orchestrator = orchestrator.with_metrics(registry.clone());
        }

        // Status-only peers
        let mut monitor_handles = Vec::new();
        for target in self.config.peer_targets(tls.as_ref()) {
            let prober = HttpsProber::new(target)?;
            let monitor = ProbeMonitor::new(
                Arc::new(prober),
                self.config.probe.interval,
                orchestrator.report_sender(),
            );
            monitor_handles.push(monitor.spawn(shutdown.clone()));
        }

        let metrics_handle = metrics.map(|registry| {
            let server = MetricsServer::new(
                AppState {
                    metrics: registry,
                    status: self.status.clone(),
                    registry: self.registry.clone(),
                },
                self.config.metrics.listen_addr.clone(),
            );
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = server.run(shutdown).await {
                    warn!(error = %e, "Metrics server error");
                }
            })
        });

        let orchestrator_handle = tokio::spawn(orchestrator.run(shutdown.clone()));
        info!("All tasks spawned, server running");

        let result = orchestrator_handle
            .await
            .map_err(|e| common::Error::fatal(format!("orchestrator task failed: {e}")));

        // The orchestrator only returns once shutdown fired
        shutdown.cancel();
        for handle in monitor_handles {
            let _ = handle.await;
        }
        if let Some(handle) = metrics_handle {
            let _ = handle.await;
        }

        info!("HA server stopped");
        result
    }
}

/// Drop VIPs that cannot be announced from this host
///
/// A VIP needs a resolvable interface and must be a local address or fall
/// inside a local subnet.
pub fn usable_announces(requests: &[AnnounceRequest]) -> Vec<AnnounceRequest> {
    requests
        .iter()
        .filter(|request| {
            if let Err(e) = resolve_link(&request.interface) {
                warn!(vip = %request.target_ip, error = %e, "Disabling VIP, interface unusable");
                return false;
            }

            let ip = IpAddr::V4(request.target_ip);
            if !liveness::is_local_address(ip) && !liveness::is_local_subnet(ip) {
                warn!(
                    vip = %request.target_ip,
                    interface = %request.interface,
                    "Disabling VIP, not on any local network"
                );
                return false;
            }
            true
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_interface_disables_vip() {
        let requests = vec![AnnounceRequest::new(
            "10.99.99.99".parse().unwrap(),
            "nosuchif0",
        )];
        assert!(usable_announces(&requests).is_empty());
    }

    #[test]
    fn test_loopback_vip_is_usable_when_lo_resolves() {
        let requests = vec![AnnounceRequest::new("127.0.0.1".parse().unwrap(), "lo")];
        if resolve_link("lo").is_ok() {
            assert_eq!(usable_announces(&requests).len(), 1);
        }
    }

    #[tokio::test]
    async fn test_server_runs_until_shutdown() {
        let server = HaServer::new(Config::default());
        let status = server.status();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server.run(shutdown.clone()));

        // Keepalive disabled by default: pinned Master with no VIPs
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(status.role().await, crate::types::HaRole::Master);

        shutdown.cancel();
        let result = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("server should stop")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_takeover_event_reaches_running_server() {
        let yaml = r#"
keepalive:
  mode: in
probe:
  interval: 50ms
  failure_threshold: 100
  partner:
    url: http://127.0.0.1:1/health
    timeout: 200ms
"#;
        let server = HaServer::new(Config::from_yaml(yaml).unwrap());
        let status = server.status();
        let events = server.event_sender();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server.run(shutdown.clone()));

        // Partner unreachable and no VIPs to check: Master
        wait_for_role(&status, crate::types::HaRole::Master).await;

        events.send(HaEvent::PeerTakeover).await.unwrap();
        wait_for_role(&status, crate::types::HaRole::Backup).await;

        shutdown.cancel();
        let result = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("server should stop")
            .unwrap();
        assert!(result.is_ok());
    }

    async fn wait_for_role(status: &StatusBoard, role: crate::types::HaRole) {
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(3);
        while status.role().await != role {
            assert!(tokio::time::Instant::now() < deadline, "never reached {role}");
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }
}
