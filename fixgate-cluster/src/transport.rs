//! Non-blocking message exchange between cluster nodes. Production
//! deployments sit this on top of the shared-memory ring-buffer
//! transport (out of scope, §1); tests use [`InMemoryTransport`], which
//! can drop frames in either direction to exercise the partition
//! scenarios in §8.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    rc::Rc,
};

use fixgate_core::NodeId;

use crate::rpc::Frame;

/// A single non-blocking send/receive pair. `try_send` mirrors the
/// `tryClaim`-returns-negative-on-backpressure convention from §5: it
/// returns `false` instead of blocking when the destination has no room.
pub trait Transport {
    fn try_send(&mut self, to: NodeId, frame: Frame) -> bool;
    fn poll_recv(&mut self) -> Option<(NodeId, Frame)>;
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DropPolicy {
    pub drop_inbound: bool,
    pub drop_outbound: bool,
}

struct Mailboxes {
    queues: HashMap<NodeId, VecDeque<(NodeId, Frame)>>,
    drop_policy: HashMap<NodeId, DropPolicy>,
}

/// Shared fabric connecting every node in a test cluster. Each node
/// holds an [`InMemoryTransport`] handle into the same fabric.
#[derive(Clone)]
pub struct InMemoryFabric {
    inner: Rc<RefCell<Mailboxes>>,
}

impl InMemoryFabric {
    pub fn new(node_ids: &[NodeId]) -> InMemoryFabric {
        let mut queues = HashMap::new();
        let mut drop_policy = HashMap::new();
        for &id in node_ids {
            queues.insert(id, VecDeque::new());
            drop_policy.insert(id, DropPolicy::default());
        }
        InMemoryFabric {
            inner: Rc::new(RefCell::new(Mailboxes { queues, drop_policy })),
        }
    }

    /// Sets whether frames to/from `node_id` are dropped. Used by tests
    /// to model the four frame-drop combinations in §4.2.
    pub fn set_drop_policy(&self, node_id: NodeId, policy: DropPolicy) {
        self.inner.borrow_mut().drop_policy.insert(node_id, policy);
    }

    pub fn handle(&self, node_id: NodeId) -> InMemoryTransport {
        InMemoryTransport {
            node_id,
            fabric: self.inner.clone(),
        }
    }
}

pub struct InMemoryTransport {
    node_id: NodeId,
    fabric: Rc<RefCell<Mailboxes>>,
}

impl Transport for InMemoryTransport {
    fn try_send(&mut self, to: NodeId, frame: Frame) -> bool {
        let mut mailboxes = self.fabric.borrow_mut();
        let sender_drops_out = mailboxes.drop_policy.get(&self.node_id).copied().unwrap_or_default().drop_outbound;
        let receiver_drops_in = mailboxes.drop_policy.get(&to).copied().unwrap_or_default().drop_inbound;
        if sender_drops_out || receiver_drops_in {
            return true; // the frame is considered "sent" from the caller's perspective
        }
        if let Some(queue) = mailboxes.queues.get_mut(&to) {
            queue.push_back((self.node_id, frame));
            true
        } else {
            false
        }
    }

    fn poll_recv(&mut self) -> Option<(NodeId, Frame)> {
        self.fabric.borrow_mut().queues.get_mut(&self.node_id).and_then(|q| q.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RequestVote;

    fn vote(term: u64) -> Frame {
        Frame::RequestVote(RequestVote { term, candidate_id: 1, last_log_index: 0, last_log_term: 0 })
    }

    #[test]
    fn delivers_across_handles() {
        let fabric = InMemoryFabric::new(&[1, 2]);
        let mut a = fabric.handle(1);
        let mut b = fabric.handle(2);
        assert!(a.try_send(2, vote(1)));
        assert!(matches!(b.poll_recv(), Some((1, Frame::RequestVote(_)))));
    }

    #[test]
    fn drop_inbound_on_receiver_silently_swallows_frame() {
        let fabric = InMemoryFabric::new(&[1, 2]);
        fabric.set_drop_policy(2, DropPolicy { drop_inbound: true, drop_outbound: false });
        let mut a = fabric.handle(1);
        let mut b = fabric.handle(2);
        a.try_send(2, vote(1));
        assert!(b.poll_recv().is_none());
    }
}
