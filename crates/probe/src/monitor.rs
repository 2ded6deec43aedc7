//! Periodic peer probing.

use crate::checkers::Prober;
use crate::types::{ProbeReport, ProbeResult, ProbeStats, ProbeStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Probes one peer on a fixed interval and forwards every result
pub struct ProbeMonitor {
    prober: Arc<dyn Prober>,
    interval: Duration,
    stats: Arc<RwLock<ProbeStats>>,
    reports: mpsc::Sender<ProbeReport>,
}

impl ProbeMonitor {
    pub fn new(
        prober: Arc<dyn Prober>,
        interval: Duration,
        reports: mpsc::Sender<ProbeReport>,
    ) -> Self {
        Self {
            prober,
            interval,
            stats: Arc::new(RwLock::new(ProbeStats::default())),
            reports,
        }
    }

    /// Start probing until `shutdown` fires or the report receiver goes away
    pub fn spawn(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let prober = self.prober.clone();
        let stats = self.stats.clone();
        let reports = self.reports.clone();
        let period = self.interval;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        info!(target_url = prober.target(), "Probe monitor stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let result = tokio::select! {
                            biased;
                            _ = shutdown.cancelled() => {
                                debug!(target_url = prober.target(), "Probe abandoned on shutdown");
                                break;
                            }
                            result = prober.check() => result,
                        };
                        let snapshot = Self::record(&stats, &result, prober.target()).await;

                        let report = ProbeReport {
                            target: prober.target().to_string(),
                            result,
                            stats: snapshot,
                        };
                        if reports.send(report).await.is_err() {
                            debug!(target_url = prober.target(), "Report receiver closed");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Get statistics
    pub async fn get_stats(&self) -> ProbeStats {
        *self.stats.read().await
    }

    async fn record(
        stats: &RwLock<ProbeStats>,
        result: &ProbeResult,
        target: &str,
    ) -> ProbeStats {
        let mut guard = stats.write().await;
        guard.update(result);
        let snapshot = *guard;
        drop(guard);

        match result.status {
            ProbeStatus::Healthy => {}
            ProbeStatus::Unhealthy | ProbeStatus::Error => {
                warn!(
                    target_url = target,
                    message = result.message.as_deref().unwrap_or("unknown"),
                    consecutive = snapshot.consecutive_failures,
                    "Peer probe failed"
                );
            }
            ProbeStatus::Timeout => {
                warn!(
                    target_url = target,
                    consecutive = snapshot.consecutive_failures,
                    "Peer probe timed out"
                );
            }
        }

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FixedProber {
        up: AtomicBool,
    }

    #[async_trait]
    impl Prober for FixedProber {
        async fn check(&self) -> ProbeResult {
            if self.up.load(Ordering::SeqCst) {
                ProbeResult::healthy(Duration::from_millis(1))
            } else {
                ProbeResult::error(Duration::from_millis(1), "refused")
            }
        }

        fn target(&self) -> &str {
            "https://peer:11111/health"
        }
    }

    #[tokio::test]
    async fn test_monitor_reports_each_probe() {
        let prober = Arc::new(FixedProber {
            up: AtomicBool::new(false),
        });
        let (tx, mut rx) = mpsc::channel(8);
        let monitor = ProbeMonitor::new(prober.clone(), Duration::from_millis(20), tx);
        let shutdown = CancellationToken::new();
        let handle = monitor.spawn(shutdown.clone());

        let first = rx.recv().await.unwrap();
        assert!(!first.result.is_healthy());
        assert_eq!(first.stats.consecutive_failures, 1);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.stats.consecutive_failures, 2);

        prober.up.store(true, Ordering::SeqCst);
        let mut report = rx.recv().await.unwrap();
        while !report.result.is_healthy() {
            report = rx.recv().await.unwrap();
        }
        assert_eq!(report.stats.consecutive_failures, 0);
        assert_eq!(report.target, "https://peer:11111/health");

        shutdown.cancel();
        handle.await.unwrap();
        assert!(monitor.get_stats().await.total_probes >= 3);
    }

    struct StuckProber;

    #[async_trait]
    impl Prober for StuckProber {
        async fn check(&self) -> ProbeResult {
            tokio::time::sleep(Duration::from_secs(30)).await;
            ProbeResult::healthy(Duration::from_secs(30))
        }

        fn target(&self) -> &str {
            "https://stuck:11111/health"
        }
    }

    #[tokio::test]
    async fn test_shutdown_abandons_in_flight_probe() {
        let (tx, mut rx) = mpsc::channel(8);
        let monitor = ProbeMonitor::new(Arc::new(StuckProber), Duration::from_millis(10), tx);
        let shutdown = CancellationToken::new();
        let handle = monitor.spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor should not wait for the probe")
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_monitor_stops_when_receiver_dropped() {
        let prober = Arc::new(FixedProber {
            up: AtomicBool::new(true),
        });
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let monitor = ProbeMonitor::new(prober, Duration::from_millis(10), tx);
        let handle = monitor.spawn(CancellationToken::new());
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor should exit")
            .unwrap();
    }
}
