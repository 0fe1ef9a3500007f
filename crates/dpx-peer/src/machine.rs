//! Event handlers: the transition table of the peer state machine.
//!
//! Every handler runs on the dispatcher task. Illegal (event, state)
//! pairs return `NotAcceptable` and leave everything untouched.

use std::time::Duration;

use dpx_core::dictionary::result_code;
use dpx_core::{RawMessage, Transport};
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::conn::Conn;
use crate::error::{PeerError, Result};
use crate::event::Event;
use crate::handler::{failure_answer, ConnInfo, TIMEOUT_MESSAGE};
use crate::notify::Notice;
use crate::pending::AnswerTx;
use crate::state::State;

impl<T: Transport + 'static> Conn<T> {
    pub(crate) async fn handle(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Connect { reply } => self.on_connect(reply).await,
            Event::Stop { reply } => self.on_stop(reply).await,
            Event::RcvCer(m) => self.on_rcv_cer(m).await,
            Event::RcvCea(m) => self.on_rcv_cea(m).await,
            Event::RcvDwr(m) => self.on_rcv_dwr(m).await,
            Event::RcvDwa(m) => self.on_rcv_dwa(m).await,
            Event::RcvDpr(m) => self.on_rcv_dpr(m).await,
            Event::RcvDpa(m) => self.on_rcv_dpa(m).await,
            Event::RcvMsg(m) => self.on_rcv_msg(m).await,
            Event::Watchdog => self.on_watchdog().await,
            Event::SndMsg(m) => self.on_snd_msg(m).await,
            Event::PeerDisc => self.on_peer_disc().await,
        }
    }

    /// closed → waitCEA: send CER, wait for the CEA under SndTimeout.
    async fn on_connect(&mut self, reply: AnswerTx) -> Result<()> {
        if self.state != State::Closed {
            let _ = reply.send(Err(self.not_acceptable("Connect")));
            return Err(self.not_acceptable("Connect"));
        }
        self.set_state(State::WaitCea);

        let info = self.conn_info();
        let mut cer = self.handlers.make_cer(&info);
        cer.flags.request = true;
        cer.hbh_id = self.local.next_hbh();
        cer.ete_id = self.local.next_ete();

        let nak = self.timeout_answer(&cer);
        self.guard_answer(cer.hbh_id, nak, Event::RcvCea, Some(reply))?;

        let res = self.write_message(&cer).await;
        self.notify_capability(true, true, res.as_ref().err());
        if let Err(e) = res {
            self.teardown().await;
            return Err(e);
        }
        Ok(())
    }

    /// waitCER → open|closed: answer the peer's CER.
    async fn on_rcv_cer(&mut self, m: RawMessage) -> Result<()> {
        if self.state != State::WaitCer {
            return Err(self.not_acceptable("Rcv-CER"));
        }
        self.notify_capability(false, true, None);

        let info = self.conn_info();
        let mut cea = self.handlers.handle_cer(&m, &info);
        cea.flags.request = false;
        cea.hbh_id = m.hbh_id;
        cea.ete_id = m.ete_id;

        let success = cea.is_success();
        if !success {
            cea.flags.error = true;
        }

        let mut res = self.write_message(&cea).await;
        if res.is_ok() && !success {
            res = Err(PeerError::FailureAnswer(cea));
        }
        if res.is_ok() {
            self.set_state(State::Open);
            self.wd_counter = 0;
            self.arm_timer(self.peer.wd_interval);
        }
        self.notify_capability(true, false, res.as_ref().err());
        match res {
            Ok(()) => Ok(()),
            Err(e) => {
                self.teardown().await;
                Err(e)
            }
        }
    }

    /// waitCEA → open|closed: the peer's verdict on our CER.
    async fn on_rcv_cea(&mut self, m: RawMessage) -> Result<()> {
        if self.state != State::WaitCea {
            return Err(self.not_acceptable("Rcv-CEA"));
        }
        let Some(handle) = self.pending.take(m.hbh_id) else {
            return Err(PeerError::UnknownId(m.hbh_id));
        };

        let info = self.conn_info();
        self.handlers.handle_cea(&m, &info);

        if m.is_success() {
            self.set_state(State::Open);
            self.wd_counter = 0;
            self.arm_timer(self.peer.wd_interval);
            self.notify_capability(false, false, None);
            if handle.send(Ok(m)).is_err() {
                debug!("CEA discarded, connect waiter went away");
            }
            Ok(())
        } else {
            // The waiter still sees the raw CEA, wrapped as the failure,
            // before the connection goes down.
            let err = PeerError::FailureAnswer(m.clone());
            self.notify_capability(false, false, Some(&err));
            let _ = handle.send(Err(err));
            self.teardown().await;
            Err(PeerError::FailureAnswer(m))
        }
    }

    /// open: watchdog tick. Trip the counter or probe the peer.
    async fn on_watchdog(&mut self) -> Result<()> {
        if self.state != State::Open {
            return Err(self.not_acceptable("Watchdog"));
        }

        self.wd_counter += 1;
        if self.wd_counter > self.peer.wd_expired {
            self.teardown().await;
            return Err(PeerError::WatchdogExpired);
        }

        let info = self.conn_info();
        let mut dwr = self.handlers.make_dwr(&info);
        dwr.flags.request = true;
        dwr.hbh_id = self.local.next_hbh();
        dwr.ete_id = self.local.next_ete();

        let nak = self.timeout_answer(&dwr);
        self.guard_answer(dwr.hbh_id, nak, Event::RcvDwa, None)?;

        let res = self.write_message(&dwr).await;
        self.notify_watchdog(true, true, res.as_ref().err());
        if let Err(e) = res {
            self.teardown().await;
            return Err(e);
        }
        Ok(())
    }

    /// open: answer the peer's watchdog probe.
    async fn on_rcv_dwr(&mut self, m: RawMessage) -> Result<()> {
        if self.state != State::Open {
            return Err(self.not_acceptable("Rcv-DWR"));
        }
        self.notify_watchdog(false, true, None);

        let info = self.conn_info();
        let mut dwa = self.handlers.handle_dwr(&m, &info);
        dwa.flags.request = false;
        dwa.hbh_id = m.hbh_id;
        dwa.ete_id = m.ete_id;

        let success = dwa.is_success();
        if !success {
            dwa.flags.error = true;
        }

        let mut res = self.write_message(&dwa).await;
        if res.is_ok() && !success {
            res = Err(PeerError::FailureAnswer(dwa));
        }
        if res.is_ok() {
            self.arm_timer(self.peer.wd_interval);
        }
        self.notify_watchdog(true, false, res.as_ref().err());
        match res {
            Ok(()) => Ok(()),
            Err(e) => {
                self.teardown().await;
                Err(e)
            }
        }
    }

    /// open: a watchdog answer, real or synthesized by its SndTimeout.
    async fn on_rcv_dwa(&mut self, m: RawMessage) -> Result<()> {
        if self.state != State::Open {
            return Err(self.not_acceptable("Rcv-DWA"));
        }
        let Some(handle) = self.pending.take(m.hbh_id) else {
            return Err(PeerError::UnknownId(m.hbh_id));
        };

        let info = self.conn_info();
        self.handlers.handle_dwa(&m, &info);

        if m.is_success() {
            self.wd_counter = 0;
            self.arm_timer(self.peer.wd_interval);
            self.notify_watchdog(false, false, None);
            let _ = handle.send(Ok(m));
            Ok(())
        } else {
            // Failed probe: fire the watchdog again right away so
            // consecutive misses walk the counter to the threshold.
            self.arm_timer(Duration::ZERO);
            let err = PeerError::FailureAnswer(m.clone());
            self.notify_watchdog(false, false, Some(&err));
            let _ = handle.send(Err(err));
            Err(PeerError::FailureAnswer(m))
        }
    }

    /// open → closing: send DPR, wait for the DPA under SndTimeout.
    async fn on_stop(&mut self, reply: AnswerTx) -> Result<()> {
        if self.state != State::Open {
            let _ = reply.send(Err(self.not_acceptable("Stop")));
            return Err(self.not_acceptable("Stop"));
        }
        self.set_state(State::Closing);
        self.timer_armed = false;

        let info = self.conn_info();
        let mut dpr = self.handlers.make_dpr(&info);
        dpr.flags.request = true;
        dpr.hbh_id = self.local.next_hbh();
        dpr.ete_id = self.local.next_ete();

        let nak = self.timeout_answer(&dpr);
        self.guard_answer(dpr.hbh_id, nak, Event::RcvDpa, Some(reply))?;

        let res = self.write_message(&dpr).await;
        self.notify_purge(true, true, res.as_ref().err());
        if let Err(e) = res {
            self.teardown().await;
            return Err(e);
        }
        Ok(())
    }

    /// open → closing: the peer wants out. Answer, then close once the
    /// peer had time to read the DPA.
    async fn on_rcv_dpr(&mut self, m: RawMessage) -> Result<()> {
        if self.state != State::Open {
            return Err(self.not_acceptable("Rcv-DPR"));
        }
        self.notify_purge(false, true, None);

        let info = self.conn_info();
        let mut dpa = self.handlers.handle_dpr(&m, &info);
        dpa.flags.request = false;
        dpa.hbh_id = m.hbh_id;
        dpa.ete_id = m.ete_id;

        if dpa.is_success() {
            self.set_state(State::Closing);
            self.arm_timer(self.peer.snd_timeout);
        } else {
            // Refused: the error answer goes out but the connection
            // stays open.
            dpa.flags.error = true;
        }

        let res = self.write_message(&dpa).await;
        self.notify_purge(true, false, res.as_ref().err());
        if let Err(e) = res {
            self.teardown().await;
            return Err(e);
        }
        Ok(())
    }

    /// closing → closed: the peer acknowledged our DPR.
    async fn on_rcv_dpa(&mut self, m: RawMessage) -> Result<()> {
        if self.state != State::Closing {
            return Err(self.not_acceptable("Rcv-DPA"));
        }
        let Some(handle) = self.pending.take(m.hbh_id) else {
            return Err(PeerError::UnknownId(m.hbh_id));
        };

        let info = self.conn_info();
        self.handlers.handle_dpa(&m, &info);

        if m.is_success() {
            self.notify_purge(false, false, None);
            let _ = handle.send(Ok(m));
            self.teardown().await;
            Ok(())
        } else {
            let err = PeerError::FailureAnswer(m.clone());
            self.notify_purge(false, false, Some(&err));
            let _ = handle.send(Err(err));
            self.teardown().await;
            Err(PeerError::FailureAnswer(m))
        }
    }

    /// open: application traffic.
    async fn on_rcv_msg(&mut self, m: RawMessage) -> Result<()> {
        if self.state != State::Open {
            return Err(self.not_acceptable("Rcv-MSG"));
        }

        if m.flags.request {
            if self.inbound_tx.send(m).await.is_err() {
                debug!("inbound request dropped, receiver went away");
            }
            self.arm_timer(self.peer.wd_interval);
            self.notify_message(false, true, None);
            Ok(())
        } else {
            let hbh = m.hbh_id;
            match self.pending.complete(hbh, Ok(m)) {
                Ok(()) => {
                    self.arm_timer(self.peer.wd_interval);
                    self.notify_message(false, false, None);
                    Ok(())
                }
                Err(e) => {
                    // Stray or late answer: report it, touch nothing.
                    self.notify_message(false, false, Some(&e));
                    Err(e)
                }
            }
        }
    }

    /// open: write an application message queued by a caller.
    async fn on_snd_msg(&mut self, m: RawMessage) -> Result<()> {
        if self.state != State::Open {
            return Err(self.not_acceptable("Snd-MSG"));
        }

        let req = m.flags.request;
        let res = self.write_message(&m).await;
        if res.is_ok() {
            self.arm_timer(self.peer.wd_interval);
        }
        self.notify_message(true, req, res.as_ref().err());
        if let Err(e) = res {
            self.teardown().await;
            return Err(e);
        }
        Ok(())
    }

    /// any → closed: the transport is gone.
    async fn on_peer_disc(&mut self) -> Result<()> {
        self.teardown().await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Shared plumbing
    // ------------------------------------------------------------------

    fn not_acceptable(&self, event: &'static str) -> PeerError {
        PeerError::NotAcceptable {
            event,
            state: self.state,
        }
    }

    pub(crate) fn conn_info(&self) -> ConnInfo {
        ConnInfo {
            local_host: self.local.host().clone(),
            local_realm: self.local.realm().clone(),
            peer_host: self.peer.host.clone(),
            peer_realm: self.peer.realm.clone(),
            local_addr: self.local_addr,
            origin_state_id: self.local.state_id(),
            state: self.state,
        }
    }

    /// Negative answer a request falls back to when its SndTimeout
    /// elapses without the real one.
    fn timeout_answer(&self, req: &RawMessage) -> RawMessage {
        failure_answer(
            req,
            self.local.host(),
            self.local.realm(),
            result_code::UNABLE_TO_DELIVER,
            TIMEOUT_MESSAGE,
        )
    }

    /// Register an outstanding system request and arm its SndTimeout.
    ///
    /// The guard task forwards the eventual outcome to `reply`. If no
    /// answer arrives in time it feeds `nak` back through the event
    /// queue, so the timeout takes the same state-machine path as a real
    /// negative answer.
    fn guard_answer(
        &self,
        hbh: u32,
        nak: RawMessage,
        wrap: fn(RawMessage) -> Event,
        reply: Option<AnswerTx>,
    ) -> Result<()> {
        let (tx, mut rx) = oneshot::channel();
        self.pending.register(hbh, tx)?;

        let events = self.events_tx.clone();
        let snd_timeout = self.peer.snd_timeout;
        tokio::spawn(async move {
            let outcome = tokio::select! {
                res = &mut rx => res,
                () = sleep(snd_timeout) => {
                    let _ = events.send(wrap(nak)).await;
                    rx.await
                }
            };
            let outcome = outcome.unwrap_or(Err(PeerError::ConnectionClosed));
            if let Some(reply) = reply {
                let _ = reply.send(outcome);
            }
        });
        Ok(())
    }

    /// Serialize and write one message, bounded by TransportTimeout.
    /// All writes go through here, on the dispatcher task.
    pub(crate) async fn write_message(&mut self, m: &RawMessage) -> Result<()> {
        let wire = m.encode()?;
        match timeout(self.peer.transport_timeout, self.writer.write_all(&wire)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "transport write timed out",
            )
            .into()),
        }
    }

    /// Transition into `closed`: shut the transport, resolve every
    /// outstanding request, stop the timer. Runs at most once.
    pub(crate) async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.timer_armed = false;
        let _ = self.writer.shutdown().await;
        self.set_state(State::Closed);
        self.pending.fail_all();
    }

    fn notify_capability(&self, tx: bool, req: bool, err: Option<&PeerError>) {
        self.notifier.notify(Notice::CapabilityExchange {
            tx,
            req,
            peer: self.peer.host.clone(),
            err: err.map(ToString::to_string),
        });
    }

    fn notify_watchdog(&self, tx: bool, req: bool, err: Option<&PeerError>) {
        self.notifier.notify(Notice::Watchdog {
            tx,
            req,
            peer: self.peer.host.clone(),
            err: err.map(ToString::to_string),
        });
    }

    fn notify_purge(&self, tx: bool, req: bool, err: Option<&PeerError>) {
        self.notifier.notify(Notice::Purge {
            tx,
            req,
            peer: self.peer.host.clone(),
            err: err.map(ToString::to_string),
        });
    }

    fn notify_message(&self, tx: bool, req: bool, err: Option<&PeerError>) {
        self.notifier.notify(Notice::Message {
            tx,
            req,
            peer: self.peer.host.clone(),
            err: err.map(ToString::to_string),
        });
    }
}
