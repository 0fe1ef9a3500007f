use thiserror::Error;

/// Errors produced while encoding or decoding Diameter wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("malformed AVP: {0}")]
    MalformedAvp(String),

    #[error("truncated AVP: need {need} more bytes, {have} left")]
    TruncatedAvp { need: usize, have: usize },

    #[error("message length {0} exceeds the 24-bit field")]
    EncodingOverflow(usize),

    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("missing required AVP: {0}")]
    MissingAvp(u32),

    #[error("invalid AVP value for code {code}: {reason}")]
    InvalidAvpValue { code: u32, reason: String },

    #[error("identity must be a non-empty UTF-8 string")]
    InvalidIdentity,
}

impl CodecError {
    /// Map onto the Diameter Result-Code an answer should carry.
    pub fn to_result_code(&self) -> u32 {
        match self {
            Self::MalformedHeader(_) => 3008,        // DIAMETER_INVALID_HDR_BITS
            Self::MalformedAvp(_) => 3009,           // DIAMETER_INVALID_AVP_BITS
            Self::TruncatedAvp { .. } => 5014,       // DIAMETER_INVALID_AVP_LENGTH
            Self::UnexpectedMessage(_) => 3001,      // DIAMETER_COMMAND_UNSUPPORTED
            Self::MissingAvp(_) => 5005,             // DIAMETER_MISSING_AVP
            Self::InvalidAvpValue { .. } => 5004,    // DIAMETER_INVALID_AVP_VALUE
            Self::InvalidIdentity => 5004,
            Self::EncodingOverflow(_) => 5012,       // DIAMETER_UNABLE_TO_COMPLY
        }
    }
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;
