use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use dpx_core::dictionary::result_code;
use dpx_core::{read_frame, Identity, RawMessage, Transport};
use tokio::io::{AsyncRead, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep, timeout, Sleep};
use tracing::{debug, warn};

use crate::error::{PeerError, Result};
use crate::event::Event;
use crate::handler::{failure_answer, SystemHandlers, TIMEOUT_MESSAGE};
use crate::local::LocalNode;
use crate::notify::{Notice, Notifier};
use crate::peer::Peer;
use crate::pending::PendingTable;
use crate::state::State;

/// Capacity of the state-machine event queue.
const EVENT_QUEUE_DEPTH: usize = 32;

/// Capacity of the inbound request channel. When the application stops
/// draining it, the dispatcher blocks and reads slow down with it.
const INBOUND_QUEUE_DEPTH: usize = 16;

/// One Diameter peer connection: the dispatcher task owning the state
/// machine, the system timer and the transport write half.
///
/// Created with [`Conn::initiator`] or [`Conn::responder`], then driven
/// by awaiting [`Conn::run`] (usually inside `tokio::spawn`). All
/// interaction goes through the returned [`ConnHandle`] and
/// [`IncomingRequests`].
pub struct Conn<T: Transport> {
    pub(crate) local: Arc<LocalNode>,
    pub(crate) peer: Peer,
    pub(crate) state: State,
    pub(crate) wd_counter: u32,

    read_half: Option<ReadHalf<T>>,
    pub(crate) writer: WriteHalf<T>,
    pub(crate) local_addr: Option<SocketAddr>,

    pub(crate) events_tx: mpsc::Sender<Event>,
    events_rx: mpsc::Receiver<Event>,
    pub(crate) pending: Arc<PendingTable>,
    pub(crate) inbound_tx: mpsc::Sender<RawMessage>,
    state_tx: watch::Sender<State>,

    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) handlers: Arc<dyn SystemHandlers>,

    sys_timer: Pin<Box<Sleep>>,
    pub(crate) timer_armed: bool,
    pub(crate) torn_down: bool,
}

impl<T: Transport + 'static> Conn<T> {
    /// Connection where the local node initiates the capability
    /// exchange. Starts in `closed`; call [`ConnHandle::connect`].
    pub fn initiator(
        transport: T,
        local: Arc<LocalNode>,
        peer: Peer,
        handlers: Arc<dyn SystemHandlers>,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, ConnHandle, IncomingRequests) {
        Self::new(transport, State::Closed, local, peer, handlers, notifier)
    }

    /// Connection accepted from a remote initiator. Starts in `waitCER`
    /// and opens once the peer's CER is answered with success.
    pub fn responder(
        transport: T,
        local: Arc<LocalNode>,
        peer: Peer,
        handlers: Arc<dyn SystemHandlers>,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, ConnHandle, IncomingRequests) {
        Self::new(transport, State::WaitCer, local, peer, handlers, notifier)
    }

    fn new(
        transport: T,
        initial: State,
        local: Arc<LocalNode>,
        peer: Peer,
        handlers: Arc<dyn SystemHandlers>,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, ConnHandle, IncomingRequests) {
        let local_addr = transport.local_addr().ok();
        let (read_half, writer) = tokio::io::split(transport);
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_DEPTH);
        let (state_tx, state_rx) = watch::channel(initial);
        let pending = Arc::new(PendingTable::new());

        let handle = ConnHandle {
            peer_host: peer.host.clone(),
            snd_timeout: peer.snd_timeout,
            local: local.clone(),
            events: events_tx.clone(),
            pending: pending.clone(),
            state_rx,
        };

        let conn = Self {
            local,
            peer,
            state: initial,
            wd_counter: 0,
            read_half: Some(read_half),
            writer,
            local_addr,
            events_tx,
            events_rx,
            pending,
            inbound_tx,
            state_tx,
            notifier,
            handlers,
            sys_timer: Box::pin(sleep(Duration::ZERO)),
            timer_armed: false,
            torn_down: false,
        };

        (conn, handle, IncomingRequests { rx: inbound_rx })
    }

    /// Dispatcher loop. Consumes the connection; returns once the
    /// connection has reached `shutdown`.
    pub async fn run(mut self) {
        let Some(read_half) = self.read_half.take() else {
            return;
        };
        let reader = tokio::spawn(read_loop(read_half, self.events_tx.clone()));

        loop {
            enum Wake {
                Queue(Option<Event>),
                Timer,
            }

            let wake = {
                let events = &mut self.events_rx;
                let timer = self.sys_timer.as_mut();
                let armed = self.timer_armed;
                tokio::select! {
                    maybe = events.recv() => Wake::Queue(maybe),
                    () = timer, if armed => Wake::Timer,
                }
            };

            let event = match wake {
                Wake::Queue(Some(event)) => event,
                Wake::Queue(None) => Event::PeerDisc,
                Wake::Timer => {
                    self.timer_armed = false;
                    self.timer_event()
                }
            };

            let name = event.name();
            let old = self.state;
            let result = self.handle(event).await;
            self.notifier.notify(Notice::StateUpdate {
                event: name,
                old,
                new: self.state,
                peer: self.peer.host.clone(),
                err: result.as_ref().err().map(ToString::to_string),
            });

            if self.torn_down {
                break;
            }
        }

        self.set_state(State::Shutdown);
        reader.abort();
    }

    /// What the system timer means depends on the state: the watchdog
    /// tick while open, the transport close deadline while closing.
    fn timer_event(&self) -> Event {
        match self.state {
            State::Open => Event::Watchdog,
            _ => Event::PeerDisc,
        }
    }

    pub(crate) fn set_state(&mut self, state: State) {
        self.state = state;
        let _ = self.state_tx.send(state);
    }

    pub(crate) fn arm_timer(&mut self, after: Duration) {
        self.sys_timer
            .as_mut()
            .reset(tokio::time::Instant::now() + after);
        self.timer_armed = true;
    }
}

async fn read_loop<R>(mut reader: R, events: mpsc::Sender<Event>)
where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) => match RawMessage::decode(&frame) {
                Ok(msg) => {
                    if events.send(Event::classify(msg)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    // A frame that does not decode leaves the byte
                    // stream unsynchronized; the connection must go.
                    warn!(error = %e, "undecodable frame, dropping connection");
                    let _ = events.send(Event::PeerDisc).await;
                    return;
                }
            },
            Ok(None) => {
                let _ = events.send(Event::PeerDisc).await;
                return;
            }
            Err(e) => {
                debug!(error = %e, "transport read ended");
                let _ = events.send(Event::PeerDisc).await;
                return;
            }
        }
    }
}

/// Cloneable application-facing handle to a running connection.
#[derive(Clone)]
pub struct ConnHandle {
    peer_host: Identity,
    snd_timeout: Duration,
    local: Arc<LocalNode>,
    events: mpsc::Sender<Event>,
    pending: Arc<PendingTable>,
    state_rx: watch::Receiver<State>,
}

impl ConnHandle {
    /// Current connection state, as last published by the dispatcher.
    pub fn state(&self) -> State {
        *self.state_rx.borrow()
    }

    pub fn peer_host(&self) -> &Identity {
        &self.peer_host
    }

    /// Wait until the connection state equals `target`.
    ///
    /// Errors with `ConnectionClosed` if the dispatcher exits first
    /// without ever publishing it.
    pub async fn wait_state(&mut self, target: State) -> Result<()> {
        loop {
            if *self.state_rx.borrow_and_update() == target {
                return Ok(());
            }
            self.state_rx
                .changed()
                .await
                .map_err(|_| PeerError::ConnectionClosed)?;
        }
    }

    /// Run the capability exchange. Resolves with the peer's CEA once
    /// the connection is open, or with the failure that closed it.
    pub async fn connect(&self) -> Result<RawMessage> {
        let (tx, rx) = oneshot::channel();
        self.events
            .send(Event::Connect { reply: tx })
            .await
            .map_err(|_| PeerError::ConnectionClosed)?;
        rx.await.map_err(|_| PeerError::ConnectionClosed)?
    }

    /// Disconnect gracefully. Resolves with the peer's DPA.
    pub async fn stop(&self) -> Result<RawMessage> {
        let (tx, rx) = oneshot::channel();
        self.events
            .send(Event::Stop { reply: tx })
            .await
            .map_err(|_| PeerError::ConnectionClosed)?;
        rx.await.map_err(|_| PeerError::ConnectionClosed)?
    }

    /// Send a request and await its answer, correlated by hop-by-hop id.
    ///
    /// Callable from any task; the write itself happens on the
    /// dispatcher. Resolves with the answer, with the SndTimeout
    /// synthesized UnableToDeliver answer (as `FailureAnswer`), or with
    /// `ConnectionClosed` when the connection is torn down first.
    pub async fn send(&self, mut req: RawMessage) -> Result<RawMessage> {
        if self.state() != State::Open {
            return Err(PeerError::NotConnected);
        }
        if !req.flags.request {
            return Err(PeerError::UnknownMessage {
                code: req.code,
                app_id: req.app_id,
            });
        }

        req.hbh_id = self.local.next_hbh();
        req.ete_id = self.local.next_ete();
        let hbh = req.hbh_id;
        let nak = failure_answer(
            &req,
            self.local.host(),
            self.local.realm(),
            result_code::UNABLE_TO_DELIVER,
            TIMEOUT_MESSAGE,
        );

        let (tx, mut rx) = oneshot::channel();
        self.pending.register(hbh, tx)?;
        if self.events.send(Event::SndMsg(req)).await.is_err() {
            self.pending.cancel(hbh);
            return Err(PeerError::ConnectionClosed);
        }

        match timeout(self.snd_timeout, &mut rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(PeerError::ConnectionClosed),
            Err(_) => {
                // No answer in time: deliver the synthesized negative
                // answer through the completion handle, exactly as a
                // real one would arrive. The entry is gone afterwards,
                // so the real answer landing late becomes UnknownId. If
                // it won the race instead, the handle already holds it.
                let _ = self
                    .pending
                    .complete(hbh, Err(PeerError::FailureAnswer(nak)));
                rx.await.map_err(|_| PeerError::ConnectionClosed)?
            }
        }
    }

    /// Send the answer to a previously received request. The caller is
    /// responsible for having copied the request's correlation ids in.
    pub async fn send_answer(&self, ans: RawMessage) -> Result<()> {
        if self.state() != State::Open {
            return Err(PeerError::NotConnected);
        }
        self.events
            .send(Event::SndMsg(ans))
            .await
            .map_err(|_| PeerError::ConnectionClosed)
    }
}

/// Inbound application requests, in wire arrival order.
pub struct IncomingRequests {
    rx: mpsc::Receiver<RawMessage>,
}

impl IncomingRequests {
    /// Next inbound request; `None` once the connection is gone.
    pub async fn recv(&mut self) -> Option<RawMessage> {
        self.rx.recv().await
    }
}
