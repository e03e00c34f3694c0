//! The per-connection FIX session state machine and the small amount of
//! glue around it: the session registry (§4.3), pluggable sequence-number
//! storage, and the pure outbound-message encoder.
//!
//! Everything here is synchronous. A `Session` is driven by a host loop
//! that owns the transport; see §5 for why suspension points are not
//! allowed inside any of these calls.

pub mod messages_storage;
pub mod proxy;
pub mod session;
pub mod session_id;
pub mod session_registry;
pub mod settings;
mod session_state;

pub use messages_storage::{InMemoryStorage, MessagesStorage, NullStorage};
pub use proxy::SessionProxy;
pub use session::{DisconnectReason, Disposition, Role, Session, SessionPhase};
pub use session_id::SessionKey;
pub use session_registry::{SessionIds, SessionIdsError};
pub use settings::SessionSettings;
