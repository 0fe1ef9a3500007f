use std::collections::HashMap;
use std::sync::Mutex;

use dpx_core::RawMessage;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{PeerError, Result};

/// Outcome delivered to a waiting sender: the raw answer, or the failure
/// that resolved the wait instead.
pub type AnswerOutcome = Result<RawMessage>;

/// Single-shot delivery handle for one outstanding request.
pub type AnswerTx = oneshot::Sender<AnswerOutcome>;

/// Receiving side held by the party awaiting the answer.
pub type AnswerRx = oneshot::Receiver<AnswerOutcome>;

/// Outstanding-request table: hop-by-hop id to completion handle.
///
/// Entries live from send until answer, timeout or connection close.
/// Mutated only by the dispatcher and by the send entrypoints that hand
/// off ownership of the handle.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<u32, AnswerTx>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a completion handle under `hbh`.
    pub fn register(&self, hbh: u32, handle: AnswerTx) -> Result<()> {
        let mut entries = self.entries.lock().expect("pending table poisoned");
        if entries.contains_key(&hbh) {
            return Err(PeerError::DuplicateId(hbh));
        }
        entries.insert(hbh, handle);
        Ok(())
    }

    /// Remove and return the handle for `hbh`, if present.
    pub fn take(&self, hbh: u32) -> Option<AnswerTx> {
        self.entries
            .lock()
            .expect("pending table poisoned")
            .remove(&hbh)
    }

    /// Remove the entry for `hbh` and deliver `outcome` through it.
    ///
    /// A second completion finds nothing and reports `UnknownId`. A
    /// cancelled waiter is harmless: the outcome is discarded.
    pub fn complete(&self, hbh: u32, outcome: AnswerOutcome) -> Result<()> {
        let handle = self.take(hbh).ok_or(PeerError::UnknownId(hbh))?;
        if handle.send(outcome).is_err() {
            debug!("answer for {hbh:#010x} discarded, waiter went away");
        }
        Ok(())
    }

    /// Drop the entry for `hbh` without delivering anything.
    ///
    /// Used when the waiter gives up; a late answer then surfaces as
    /// `UnknownId`.
    pub fn cancel(&self, hbh: u32) -> bool {
        self.take(hbh).is_some()
    }

    /// Resolve every outstanding entry with `ConnectionClosed`.
    pub fn fail_all(&self) {
        let drained: Vec<(u32, AnswerTx)> = self
            .entries
            .lock()
            .expect("pending table poisoned")
            .drain()
            .collect();
        for (hbh, handle) in drained {
            if handle.send(Err(PeerError::ConnectionClosed)).is_err() {
                debug!("close outcome for {hbh:#010x} discarded, waiter went away");
            }
        }
    }

    /// Number of outstanding requests.
    pub fn outstanding(&self) -> usize {
        self.entries.lock().expect("pending table poisoned").len()
    }
}
