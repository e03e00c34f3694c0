/// Per-direction FIX message counter. 1-origin, monotonic, ASCII on the wire.
pub type SeqNum = u32;

/// Stable 64-bit identifier a `SessionKey` is mapped to by the session
/// registry. Survives reconnects; never reused within a process lifetime.
pub type SessionId = u64;

/// Raft election epoch. Monotonic; at most one leader per term.
pub type Term = u64;

/// Dense, monotonic position in the replicated log.
pub type LogIndex = u64;

/// Stable cluster node identifier, known at startup from configuration.
pub type NodeId = u16;
