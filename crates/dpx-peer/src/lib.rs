// Per-connection peer engine: state machine, correlation, watchdog.

// Connection actor and application-facing handles
pub mod conn;

// State-machine event handlers
mod machine;

// Events and states
pub mod event;
pub mod state;

// Outstanding-request correlation
pub mod pending;

// Local node identity and id sources
pub mod local;

// Remote peer description
pub mod peer;

// Trace/error notification sink
pub mod notify;

// System-message collaborator hooks
pub mod handler;

// Error types module
pub mod error;

// Re-export commonly used types
pub use conn::{Conn, ConnHandle, IncomingRequests};
pub use error::{PeerError, Result};
pub use event::Event;
pub use handler::{failure_answer, BaseHandlers, ConnInfo, SystemHandlers};
pub use local::LocalNode;
pub use notify::{LogNotifier, Notice, Notifier};
pub use peer::Peer;
pub use pending::PendingTable;
pub use state::State;
