use dpx_core::{CodecError, RawMessage};
use thiserror::Error;

use crate::state::State;

/// Errors surfaced by the peer connection engine.
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("no outstanding request for hop-by-hop id {0:#010x}")]
    UnknownId(u32),

    #[error("unrecognized message: command {code}, application {app_id}")]
    UnknownMessage { code: u32, app_id: u32 },

    #[error("answer reported failure result code {}", .0.result_code().unwrap_or(0))]
    FailureAnswer(RawMessage),

    #[error("event {event} is not acceptable in state {state}")]
    NotAcceptable { event: &'static str, state: State },

    #[error("watchdog is expired")]
    WatchdogExpired,

    #[error("connection is not open")]
    NotConnected,

    #[error("hop-by-hop id {0:#010x} already has an outstanding request")]
    DuplicateId(u32),

    #[error("connection closed")]
    ConnectionClosed,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl PeerError {
    /// The raw answer attached to a `FailureAnswer`, if any.
    pub fn answer(&self) -> Option<&RawMessage> {
        match self {
            Self::FailureAnswer(m) => Some(m),
            _ => None,
        }
    }

    /// Map onto the Diameter Result-Code an answer should carry.
    pub fn to_result_code(&self) -> u32 {
        match self {
            Self::UnknownId(_) | Self::UnknownMessage { .. } => 3001, // COMMAND_UNSUPPORTED
            Self::NotConnected | Self::ConnectionClosed => 3002, // UNABLE_TO_DELIVER
            Self::WatchdogExpired => 3002,
            Self::Codec(e) => e.to_result_code(),
            _ => 5012, // UNABLE_TO_COMPLY
        }
    }
}

/// Result type alias for peer operations.
pub type Result<T> = std::result::Result<T, PeerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_acceptable_display() {
        let e = PeerError::NotAcceptable {
            event: "Rcv-CER",
            state: State::Open,
        };
        assert_eq!(e.to_string(), "event Rcv-CER is not acceptable in state open");
    }

    #[test]
    fn test_result_code_mapping() {
        assert_eq!(PeerError::UnknownId(7).to_result_code(), 3001);
        assert_eq!(PeerError::ConnectionClosed.to_result_code(), 3002);
        assert_eq!(
            PeerError::Codec(CodecError::MissingAvp(268)).to_result_code(),
            5005
        );
    }
}
