//! Shared fixtures: an in-memory transport, a recording notifier and
//! helpers for scripting the remote end of a connection.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use dpx_core::dictionary::{avp, result_code};
use dpx_core::{read_frame, result_code_avp, Identity, RawAvp, RawMessage, Transport};
use dpx_peer::{LocalNode, Notice, Notifier, Peer};
use tokio::io::{duplex, AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};

/// In-memory transport for driving a connection from a scripted remote.
pub struct TestTransport(DuplexStream);

pub fn transport_pair() -> (TestTransport, DuplexStream) {
    let (local, remote) = duplex(64 * 1024);
    (TestTransport(local), remote)
}

impl AsyncRead for TestTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl AsyncWrite for TestTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.0).poll_shutdown(cx)
    }
}

#[async_trait]
impl Transport for TestTransport {
    fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        Ok("192.0.2.2:3868".parse().unwrap())
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        Ok("192.0.2.1:49152".parse().unwrap())
    }
}

/// Notifier that records every notice for later assertions.
#[derive(Default)]
pub struct RecordingNotifier(Mutex<Vec<Notice>>);

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.0.lock().unwrap().clone()
    }

    /// Whether any recorded notice failed with a message containing
    /// `needle`.
    pub fn saw_error(&self, needle: &str) -> bool {
        self.notices()
            .iter()
            .any(|n| n.err().is_some_and(|e| e.contains(needle)))
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.0.lock().unwrap().push(notice);
    }
}

pub fn local_node() -> Arc<LocalNode> {
    Arc::new(LocalNode::new(
        Identity::new("client.example.com").unwrap(),
        Identity::new("example.com").unwrap(),
    ))
}

pub fn remote_host() -> Identity {
    Identity::new("server.example.net").unwrap()
}

pub fn peer_with(wd_interval: Duration, wd_expired: u32, snd_timeout: Duration) -> Peer {
    let mut peer = Peer::new(remote_host(), Identity::new("example.net").unwrap());
    peer.wd_interval = wd_interval;
    peer.wd_expired = wd_expired;
    peer.snd_timeout = snd_timeout;
    peer
}

/// Peer whose watchdog never fires within a test.
pub fn quiet_peer() -> Peer {
    peer_with(Duration::from_secs(60), 3, Duration::from_secs(5))
}

/// Read and decode the next message the connection wrote.
pub async fn recv_msg(stream: &mut DuplexStream) -> RawMessage {
    let frame = read_frame(stream)
        .await
        .expect("transport read")
        .expect("stream ended");
    RawMessage::decode(&frame).expect("frame decodes")
}

/// Encode and write a message from the scripted remote.
pub async fn send_msg(stream: &mut DuplexStream, msg: &RawMessage) {
    stream
        .write_all(&msg.encode().expect("message encodes"))
        .await
        .expect("transport write");
}

/// Success answer to `req`, identified as the remote node.
pub fn success_answer(req: &RawMessage) -> RawMessage {
    answer_with_code(req, result_code::SUCCESS)
}

/// Answer to `req` with an arbitrary Result-Code.
pub fn answer_with_code(req: &RawMessage, code: u32) -> RawMessage {
    let mut ans = RawMessage::answer_to(req)
        .with_avp(result_code_avp(code))
        .with_avp(RawAvp::identity(avp::ORIGIN_HOST, true, &remote_host()))
        .with_avp(RawAvp::identity(
            avp::ORIGIN_REALM,
            true,
            &Identity::new("example.net").unwrap(),
        ));
    if code != result_code::SUCCESS {
        ans.flags.error = true;
    }
    ans
}
