//! VIP ownership announcement.

use crate::packet::ArpPacket;
use crate::socket::{resolve_link, ArpSocket};
use crate::types::{AnnounceError, AnnounceOutcome, AnnounceRequest, LinkInfo};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Announces VIP ownership to the local segment
#[async_trait]
pub trait Announcer: Send + Sync {
    /// Send one gratuitous ARP reply for `request`
    async fn announce(&self, request: &AnnounceRequest) -> Result<(), AnnounceError>;

    /// Check that `request` could be announced right now
    async fn ready(&self, request: &AnnounceRequest) -> Result<(), AnnounceError>;
}

/// Moves raw frames onto a link
///
/// Every `transmit` call owns its socket for the duration of the call only.
pub trait FrameTransport: Send + Sync {
    /// Resolve interface details needed to build a frame
    fn resolve(&self, interface: &str) -> Result<LinkInfo, AnnounceError>;

    /// Send exactly one frame payload on `link`
    fn transmit(&self, link: &LinkInfo, payload: &[u8]) -> Result<usize, AnnounceError>;
}

/// `AF_PACKET` transport; opens and closes one socket per frame
#[derive(Debug, Default, Clone, Copy)]
pub struct RawSocketTransport;

impl FrameTransport for RawSocketTransport {
    fn resolve(&self, interface: &str) -> Result<LinkInfo, AnnounceError> {
        resolve_link(interface)
    }

    fn transmit(&self, link: &LinkInfo, payload: &[u8]) -> Result<usize, AnnounceError> {
        let socket = ArpSocket::open(link)?;
        socket.send(payload)
    }
}

/// Gratuitous ARP announcer
pub struct GarpAnnouncer<T = RawSocketTransport> {
    transport: Arc<T>,
}

impl GarpAnnouncer<RawSocketTransport> {
    /// Create an announcer that sends on real packet sockets
    pub fn new() -> Self {
        Self::with_transport(RawSocketTransport)
    }
}

impl Default for GarpAnnouncer<RawSocketTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FrameTransport + 'static> GarpAnnouncer<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }
}

fn send_gratuitous<T: FrameTransport + ?Sized>(
    transport: &T,
    request: &AnnounceRequest,
) -> Result<(), AnnounceError> {
    let link = transport.resolve(&request.interface)?;
    let payload = ArpPacket::gratuitous_reply(link.mac, request.target_ip).to_bytes();

    let sent = transport.transmit(&link, &payload)?;
    debug!(
        vip = %request.target_ip,
        interface = %request.interface,
        bytes = sent,
        "Sent gratuitous ARP"
    );
    Ok(())
}

#[async_trait]
impl<T: FrameTransport + 'static> Announcer for GarpAnnouncer<T> {
    async fn announce(&self, request: &AnnounceRequest) -> Result<(), AnnounceError> {
        let transport = self.transport.clone();
        let owned = request.clone();

        tokio::task::spawn_blocking(move || send_gratuitous(transport.as_ref(), &owned))
            .await
            .map_err(|e| AnnounceError::transmit(&request.interface, e))?
    }

    async fn ready(&self, request: &AnnounceRequest) -> Result<(), AnnounceError> {
        let link = self.transport.resolve(&request.interface)?;
        if !link.up {
            return Err(AnnounceError::interface(&request.interface, "link is down"));
        }
        Ok(())
    }
}

/// Announce with a cancellation point before the attempt starts.
///
/// If `cancel` has fired before the attempt starts this returns
/// `AnnounceError::Cancelled`, touches no socket and sends nothing on `done`.
/// Once started the attempt runs to completion regardless of `cancel` and its
/// outcome is delivered on `done`.
pub async fn announce_with_cancel(
    announcer: &dyn Announcer,
    request: &AnnounceRequest,
    cancel: &CancellationToken,
    done: &mpsc::Sender<AnnounceOutcome>,
) -> Result<(), AnnounceError> {
    if cancel.is_cancelled() {
        info!(vip = %request.target_ip, interface = %request.interface, "Announce cancelled");
        return Err(AnnounceError::Cancelled);
    }

    let result = announcer.announce(request).await;
    let outcome = AnnounceOutcome {
        request: request.clone(),
        result,
    };

    if done.send(outcome).await.is_err() {
        warn!(vip = %request.target_ip, "Announce completion receiver dropped");
    }

    Ok(())
}
