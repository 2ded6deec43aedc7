//! Gratuitous ARP integration tests
//!
//! Cancellation tests run everywhere using an in-memory transport. The
//! raw-socket test requires CAP_NET_RAW.
//! Run with: sudo -E GARP_TEST_ENABLED=1 cargo test --test integration_test

use async_trait::async_trait;
use garp::{
    announce_with_cancel, AnnounceError, AnnounceOutcome, AnnounceRequest, Announcer,
    ArpPacket, FrameTransport, GarpAnnouncer, LinkInfo,
};
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

/// Check if privileged tests are enabled
fn integration_tests_enabled() -> bool {
    env::var("GARP_TEST_ENABLED").is_ok()
}

fn request() -> AnnounceRequest {
    AnnounceRequest::new("10.20.30.40".parse().unwrap(), "eth0")
}

/// Counts calls so tests can prove nothing was touched
#[derive(Default)]
struct CountingTransport {
    resolves: AtomicUsize,
    frames: Mutex<Vec<Vec<u8>>>,
}

impl FrameTransport for CountingTransport {
    fn resolve(&self, interface: &str) -> Result<LinkInfo, AnnounceError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        Ok(LinkInfo {
            name: interface.to_string(),
            index: 3,
            mac: [0x02, 0, 0, 0, 0, 0x01],
            up: true,
        })
    }

    fn transmit(&self, _link: &LinkInfo, payload: &[u8]) -> Result<usize, AnnounceError> {
        self.frames.lock().unwrap().push(payload.to_vec());
        Ok(payload.len())
    }
}

/// Announcer that parks inside the attempt until released
struct GatedAnnouncer {
    started: Notify,
    release: Notify,
    sent: AtomicUsize,
}

#[async_trait]
impl Announcer for GatedAnnouncer {
    async fn announce(&self, _request: &AnnounceRequest) -> Result<(), AnnounceError> {
        self.started.notify_one();
        self.release.notified().await;
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ready(&self, _request: &AnnounceRequest) -> Result<(), AnnounceError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_cancel_before_start_sends_nothing() {
    let transport = Arc::new(CountingTransport::default());
    let announcer = GarpAnnouncer::with_transport(ForwardTransport(transport.clone()));
    let (done_tx, mut done_rx) = mpsc::channel::<AnnounceOutcome>(4);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = announce_with_cancel(&announcer, &request(), &cancel, &done_tx).await;
    assert_eq!(result, Err(AnnounceError::Cancelled));

    drop(done_tx);
    assert!(done_rx.recv().await.is_none(), "no outcome after cancellation");
    assert_eq!(transport.resolves.load(Ordering::SeqCst), 0);
    assert!(transport.frames.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_uncancelled_announce_reports_outcome() {
    let transport = Arc::new(CountingTransport::default());
    let announcer = GarpAnnouncer::with_transport(ForwardTransport(transport.clone()));
    let (done_tx, mut done_rx) = mpsc::channel::<AnnounceOutcome>(4);

    let cancel = CancellationToken::new();
    announce_with_cancel(&announcer, &request(), &cancel, &done_tx)
        .await
        .unwrap();

    let outcome = done_rx.recv().await.unwrap();
    assert_eq!(outcome.request, request());
    assert!(outcome.result.is_ok());

    let frames = transport.frames.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert!(ArpPacket::parse(&frames[0]).unwrap().is_gratuitous_reply());
}

#[tokio::test]
async fn test_cancel_after_start_still_reports() {
    let announcer = Arc::new(GatedAnnouncer {
        started: Notify::new(),
        release: Notify::new(),
        sent: AtomicUsize::new(0),
    });
    let (done_tx, mut done_rx) = mpsc::channel::<AnnounceOutcome>(4);
    let cancel = CancellationToken::new();

    let task = {
        let announcer = announcer.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            announce_with_cancel(announcer.as_ref(), &request(), &cancel, &done_tx).await
        })
    };

    announcer.started.notified().await;
    cancel.cancel();
    announcer.release.notify_one();

    let outcome = tokio::time::timeout(Duration::from_secs(1), done_rx.recv())
        .await
        .expect("Timeout waiting for outcome")
        .expect("Channel closed");
    assert!(outcome.result.is_ok());
    assert_eq!(task.await.unwrap(), Ok(()));
    assert_eq!(announcer.sent.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_raw_socket_announce_on_loopback() {
    if !integration_tests_enabled() {
        println!("Skipping integration test (set GARP_TEST_ENABLED=1 to run)");
        return;
    }

    let announcer = GarpAnnouncer::new();
    let request = AnnounceRequest::new("127.0.0.1".parse().unwrap(), "lo");

    match announcer.announce(&request).await {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Failed to announce: {}", e);
            eprintln!("Make sure to run with CAP_NET_RAW: sudo -E cargo test");
            return;
        }
    }

    // Twice in a row is harmless
    assert!(announcer.announce(&request).await.is_ok());
}

/// Shares one counting transport between the announcer and the test
struct ForwardTransport(Arc<CountingTransport>);

impl FrameTransport for ForwardTransport {
    fn resolve(&self, interface: &str) -> Result<LinkInfo, AnnounceError> {
        self.0.resolve(interface)
    }

    fn transmit(&self, link: &LinkInfo, payload: &[u8]) -> Result<usize, AnnounceError> {
        self.0.transmit(link, payload)
    }
}
