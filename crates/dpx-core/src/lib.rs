// Wire codec module
pub mod avp;
pub mod message;

// Protocol constants
pub mod dictionary;

// Identity newtype for hosts and realms
pub mod identity;

// Error types module
pub mod error;

// Transport abstraction module
pub mod transport;

// Re-export commonly used types
pub use avp::{align4, result_code_avp, AvpFlags, RawAvp};
pub use error::{CodecError, Result};
pub use identity::Identity;
pub use message::{read_frame, CommandFlags, RawMessage, HEADER_LEN, MAX_MESSAGE_LEN, VERSION};
pub use transport::Transport;
