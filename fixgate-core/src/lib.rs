//! Shared primitives used across the wire, session and cluster crates:
//! the ASCII `FixStr`/`FixString` pair, the numeric aliases for sequence
//! numbers, terms and indices, and the small `GatewayError` taxonomy that
//! every layer funnels its unrecoverable failures through.

mod fix_str;
mod ids;

pub use fix_str::{FixStr, FixStrError, FixString};
pub use ids::{LogIndex, NodeId, SeqNum, SessionId, Term};

use std::time::Duration;

/// Monotonic process-local clock tick. Every agent is polled with the same
/// `Instant` so timers compared within one `poll`/`do_work` call observe a
/// consistent "now".
pub type Instant = std::time::Instant;

/// Wall-clock timestamp carried on the wire (FIX `SendingTime`, Raft
/// persisted timestamps). Kept separate from `Instant` because it must
/// survive a restart and be compared against a peer's clock.
pub type UtcTimestamp = chrono::DateTime<chrono::Utc>;

/// Taxonomy from the error handling design: every unrecoverable condition
/// that a component cannot resolve by itself as a state transition is
/// reported through one of these variants.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("persisted state is corrupt: {0}")]
    CorruptState(String),
    #[error("transport backpressure exceeded after {attempts} attempts")]
    Backpressure { attempts: u32 },
}

/// Minimum interval at which every agent's `do_work` must be driven, per
/// the concurrency model (§5): timers are only as precise as the poll
/// cadence of their host loop.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);
