use std::fmt;

use dpx_core::dictionary::cmd;
use dpx_core::RawMessage;

use crate::pending::AnswerTx;

/// Input to the per-connection state machine.
///
/// Received messages arrive pre-classified by the reader; `Connect` and
/// `Stop` carry the caller's single-shot reply handle for the CEA/DPA.
#[derive(Debug)]
pub enum Event {
    Connect { reply: AnswerTx },
    Stop { reply: AnswerTx },
    RcvCer(RawMessage),
    RcvCea(RawMessage),
    RcvDwr(RawMessage),
    RcvDwa(RawMessage),
    RcvDpr(RawMessage),
    RcvDpa(RawMessage),
    RcvMsg(RawMessage),
    Watchdog,
    SndMsg(RawMessage),
    PeerDisc,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Connect { .. } => "Connect",
            Event::Stop { .. } => "Stop",
            Event::RcvCer(_) => "Rcv-CER",
            Event::RcvCea(_) => "Rcv-CEA",
            Event::RcvDwr(_) => "Rcv-DWR",
            Event::RcvDwa(_) => "Rcv-DWA",
            Event::RcvDpr(_) => "Rcv-DPR",
            Event::RcvDpa(_) => "Rcv-DPA",
            Event::RcvMsg(_) => "Rcv-MSG",
            Event::Watchdog => "Watchdog",
            Event::SndMsg(_) => "Snd-MSG",
            Event::PeerDisc => "Peer-Disc",
        }
    }

    /// Classify a decoded inbound message into its state-machine event.
    pub fn classify(msg: RawMessage) -> Event {
        match (msg.code, msg.flags.request) {
            (cmd::CAPABILITIES_EXCHANGE, true) => Event::RcvCer(msg),
            (cmd::CAPABILITIES_EXCHANGE, false) => Event::RcvCea(msg),
            (cmd::DEVICE_WATCHDOG, true) => Event::RcvDwr(msg),
            (cmd::DEVICE_WATCHDOG, false) => Event::RcvDwa(msg),
            (cmd::DISCONNECT_PEER, true) => Event::RcvDpr(msg),
            (cmd::DISCONNECT_PEER, false) => Event::RcvDpa(msg),
            _ => Event::RcvMsg(msg),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
