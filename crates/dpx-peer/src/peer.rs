use std::time::Duration;

use dpx_core::Identity;

/// Description of the remote peer and the timers governing one
/// connection to it. Immutable once the connection is created.
#[derive(Debug, Clone)]
pub struct Peer {
    pub host: Identity,
    pub realm: Identity,

    /// Tw: interval between watchdog probes while open.
    pub wd_interval: Duration,

    /// Consecutive unanswered DWRs tolerated before the connection is
    /// declared dead.
    pub wd_expired: u32,

    /// How long to wait for an answer to a locally-originated request.
    pub snd_timeout: Duration,

    /// Per-operation deadline on transport writes.
    pub transport_timeout: Duration,
}

impl Peer {
    pub fn new(host: Identity, realm: Identity) -> Self {
        Self {
            host,
            realm,
            wd_interval: Duration::from_secs(30),
            wd_expired: 3,
            snd_timeout: Duration::from_secs(10),
            transport_timeout: Duration::from_secs(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let peer = Peer::new(
            Identity::new("hss01.example.com").unwrap(),
            Identity::new("example.com").unwrap(),
        );
        assert_eq!(peer.wd_interval, Duration::from_secs(30));
        assert_eq!(peer.wd_expired, 3);
    }
}
