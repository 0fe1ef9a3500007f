use std::fmt;

use dpx_core::Identity;
use tracing::{debug, info, warn};

use crate::state::State;

/// Trace/error notification emitted by a connection.
///
/// Exchange notices carry the transfer direction (`tx` true when this
/// node wrote the message) and whether it was the request or the answer
/// of the pair.
#[derive(Debug, Clone)]
pub enum Notice {
    /// One dispatched event, with the state before and after it.
    StateUpdate {
        event: &'static str,
        old: State,
        new: State,
        peer: Identity,
        err: Option<String>,
    },
    /// CER/CEA activity.
    CapabilityExchange {
        tx: bool,
        req: bool,
        peer: Identity,
        err: Option<String>,
    },
    /// DWR/DWA activity.
    Watchdog {
        tx: bool,
        req: bool,
        peer: Identity,
        err: Option<String>,
    },
    /// DPR/DPA activity.
    Purge {
        tx: bool,
        req: bool,
        peer: Identity,
        err: Option<String>,
    },
    /// Application request/answer activity.
    Message {
        tx: bool,
        req: bool,
        peer: Identity,
        err: Option<String>,
    },
}

impl Notice {
    pub fn err(&self) -> Option<&str> {
        match self {
            Notice::StateUpdate { err, .. }
            | Notice::CapabilityExchange { err, .. }
            | Notice::Watchdog { err, .. }
            | Notice::Purge { err, .. }
            | Notice::Message { err, .. } => err.as_deref(),
        }
    }

    pub fn peer(&self) -> &Identity {
        match self {
            Notice::StateUpdate { peer, .. }
            | Notice::CapabilityExchange { peer, .. }
            | Notice::Watchdog { peer, .. }
            | Notice::Purge { peer, .. }
            | Notice::Message { peer, .. } => peer,
        }
    }
}

fn exchange_line(
    f: &mut fmt::Formatter<'_>,
    tx: bool,
    req: bool,
    peer: &Identity,
    err: &Option<String>,
    req_name: &str,
    ans_name: &str,
) -> fmt::Result {
    let arrow = if tx { "->" } else { "<-" };
    let name = if req { req_name } else { ans_name };
    write!(f, "{arrow} {name} ({peer})")?;
    if let Some(err) = err {
        write!(f, ": Failed: {err}")?;
    }
    Ok(())
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::StateUpdate {
                event,
                old,
                new,
                peer,
                err,
            } => {
                write!(f, "Event {event}: Peer {peer}")?;
                if old != new {
                    write!(f, ": State {old} -> {new}")?;
                } else {
                    write!(f, ": State {old}")?;
                }
                if let Some(err) = err {
                    write!(f, ": Failed: {err}")?;
                }
                Ok(())
            }
            Notice::CapabilityExchange { tx, req, peer, err } => {
                exchange_line(f, *tx, *req, peer, err, "CER", "CEA")
            }
            Notice::Watchdog { tx, req, peer, err } => {
                exchange_line(f, *tx, *req, peer, err, "DWR", "DWA")
            }
            Notice::Purge { tx, req, peer, err } => {
                exchange_line(f, *tx, *req, peer, err, "DPR", "DPA")
            }
            Notice::Message { tx, req, peer, err } => {
                exchange_line(f, *tx, *req, peer, err, "REQ", "ANS")
            }
        }
    }
}

/// Sink for connection notices.
///
/// Supplied per connection at construction; implementations must be
/// cheap and non-blocking, the dispatcher calls them inline.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Default notifier: routes notices to the `tracing` subscriber.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match &notice {
            _ if notice.err().is_some() => warn!(peer = %notice.peer(), "{notice}"),
            Notice::StateUpdate { .. } => debug!(peer = %notice.peer(), "{notice}"),
            _ => info!(peer = %notice.peer(), "{notice}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> Identity {
        Identity::new("hss01.example.com").unwrap()
    }

    #[test]
    fn test_exchange_display() {
        let n = Notice::CapabilityExchange {
            tx: true,
            req: true,
            peer: peer(),
            err: None,
        };
        assert_eq!(n.to_string(), "-> CER (hss01.example.com)");

        let n = Notice::Watchdog {
            tx: false,
            req: false,
            peer: peer(),
            err: Some("no answer from peer node".to_string()),
        };
        assert_eq!(
            n.to_string(),
            "<- DWA (hss01.example.com): Failed: no answer from peer node"
        );
    }

    #[test]
    fn test_state_update_display() {
        let n = Notice::StateUpdate {
            event: "Connect",
            old: State::Closed,
            new: State::WaitCea,
            peer: peer(),
            err: None,
        };
        assert_eq!(
            n.to_string(),
            "Event Connect: Peer hss01.example.com: State closed -> waitCEA"
        );

        let n = Notice::StateUpdate {
            event: "Watchdog",
            old: State::Open,
            new: State::Open,
            peer: peer(),
            err: None,
        };
        assert_eq!(
            n.to_string(),
            "Event Watchdog: Peer hss01.example.com: State open"
        );
    }
}
