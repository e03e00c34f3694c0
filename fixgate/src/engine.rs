//! The cooperative host loop (§5). Every session and the cluster node
//! are `Agent`s; the host drives each with `do_work` and never
//! suspends inside it, whether they end up multiplexed on one worker
//! or each pinned to its own core.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use fixgate_cluster::{CompletionPosition, Transport};
use fixgate_core::{Instant, UtcTimestamp};

use crate::counters::FixCounters;
use crate::errors::ErrorHandler;
use crate::streams::{ClusterableStreams, GatewayPublication};

pub trait Agent {
    fn name(&self) -> &str;
    /// Never suspends. Returns the amount of work performed, used to
    /// drive the idle strategy between host-loop iterations.
    fn do_work(&mut self, now: Instant, wall_now: UtcTimestamp) -> usize;
}

/// Process-wide handles, explicitly constructed and threaded through
/// rather than reached for as globals (§9: "model as explicitly passed
/// handles with defined init/teardown order, not ambient globals").
///
/// `EngineContext`, `Streams` and `ClusterableStreams` form a
/// construction cycle (§9): the cluster node has to exist before its
/// streams can be built, but the streams are then injected back into
/// the context that drives the node. `attach_streams` is the second
/// phase of that two-phase init.
pub struct EngineContext<T> {
    counters: Arc<FixCounters>,
    error_handler: Arc<dyn ErrorHandler>,
    streams: Option<Rc<RefCell<ClusterableStreams<T>>>>,
    completion: Rc<RefCell<CompletionPosition>>,
}

impl<T> EngineContext<T> {
    pub fn new(error_handler: Arc<dyn ErrorHandler>) -> EngineContext<T> {
        EngineContext {
            counters: Arc::new(FixCounters::new()),
            error_handler,
            streams: None,
            completion: Rc::new(RefCell::new(CompletionPosition::new())),
        }
    }

    pub fn attach_streams(&mut self, streams: ClusterableStreams<T>) {
        self.streams = Some(Rc::new(RefCell::new(streams)));
    }

    pub fn counters(&self) -> &Arc<FixCounters> {
        &self.counters
    }

    pub fn error_handler(&self) -> &Arc<dyn ErrorHandler> {
        &self.error_handler
    }

    /// The shutdown latch shared by the host loop and every agent (§5).
    pub fn completion(&self) -> &Rc<RefCell<CompletionPosition>> {
        &self.completion
    }
}

impl<T: Transport + 'static> EngineContext<T> {
    /// A shared handle every session agent can publish accepted inbound
    /// bytes through, erased to the trait object so callers don't need
    /// to carry the transport type parameter around.
    pub fn publication_handle(&self) -> Option<Rc<RefCell<dyn GatewayPublication>>> {
        self.streams.clone().map(|streams| streams as Rc<RefCell<dyn GatewayPublication>>)
    }
}

/// Busy-spin, then yield, then sleep: an idle strategy for the
/// otherwise-unbounded `do_work` loop, trading latency for CPU once
/// every agent reports no work done in an iteration.
pub struct BackoffIdleStrategy {
    spins: u32,
    yields: u32,
}

impl BackoffIdleStrategy {
    const MAX_SPINS: u32 = 100;
    const MAX_YIELDS: u32 = 100;
    const SLEEP: Duration = Duration::from_millis(1);

    pub fn new() -> BackoffIdleStrategy {
        BackoffIdleStrategy { spins: 0, yields: 0 }
    }

    /// Call once per host-loop iteration with the total work done
    /// across every agent that iteration.
    pub fn idle(&mut self, work_count: usize) {
        if work_count > 0 {
            self.spins = 0;
            self.yields = 0;
            return;
        }
        if self.spins < Self::MAX_SPINS {
            self.spins += 1;
            std::hint::spin_loop();
        } else if self.yields < Self::MAX_YIELDS {
            self.yields += 1;
            std::thread::yield_now();
        } else {
            std::thread::sleep(Self::SLEEP);
        }
    }
}

impl Default for BackoffIdleStrategy {
    fn default() -> BackoffIdleStrategy {
        BackoffIdleStrategy::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_strategy_resets_on_work() {
        let mut idle = BackoffIdleStrategy::new();
        idle.idle(0);
        idle.idle(0);
        assert_eq!(idle.spins, 2);
        idle.idle(1);
        assert_eq!(idle.spins, 0);
    }
}
