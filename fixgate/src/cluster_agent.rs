//! Adapts a [`ClusterNode`] to the host loop's [`Agent`] contract so it
//! is driven by the same `do_work` cadence as every session (§4.2,
//! §5). Shares ownership with [`crate::streams::ClusteredPublication`]
//! so both the publication path and the host loop can reach the node.

use std::cell::RefCell;
use std::rc::Rc;

use fixgate_cluster::{ClusterNode, Transport};
use fixgate_core::{Instant, UtcTimestamp};

use crate::engine::Agent;

pub struct ClusterAgent<T> {
    name: String,
    node: Rc<RefCell<ClusterNode<T>>>,
}

impl<T> ClusterAgent<T> {
    pub fn new(name: String, node: Rc<RefCell<ClusterNode<T>>>) -> ClusterAgent<T> {
        ClusterAgent { name, node }
    }
}

impl<T: Transport> Agent for ClusterAgent<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn do_work(&mut self, now: Instant, _wall_now: UtcTimestamp) -> usize {
        self.node.borrow_mut().do_work(now)
    }
}
