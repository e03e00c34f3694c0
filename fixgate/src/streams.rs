//! §4.2's `ClusterableStreams`: routes accepted inbound bytes through
//! consensus when the gateway is clustered, or straight to a local
//! append-only position counter when it runs solo.

use std::cell::RefCell;
use std::rc::Rc;

use fixgate_cluster::{ClusterNode, Transport};
use fixgate_core::{LogIndex, SessionId};

/// Append-only publication endpoint offered by the layer below a
/// session (§3: "publishes accepted inbound to GatewayPublication").
/// `None` means backpressured; the caller retries on a later
/// `do_work`, mirroring the transport's own `try_send` convention.
pub trait GatewayPublication {
    fn offer(&mut self, session_id: SessionId, payload: Vec<u8>) -> Option<LogIndex>;

    /// The stream's current position, used by the host loop's shutdown
    /// latch (§5: `CompletionPosition`) to know what "fully drained"
    /// means for this stream.
    fn current_position(&self) -> LogIndex;
}

/// Solo mode: no replication, just a monotonic local position.
#[derive(Default)]
pub struct SoloPublication {
    next_index: LogIndex,
}

impl GatewayPublication for SoloPublication {
    fn offer(&mut self, _session_id: SessionId, _payload: Vec<u8>) -> Option<LogIndex> {
        self.next_index += 1;
        Some(self.next_index)
    }

    fn current_position(&self) -> LogIndex {
        self.next_index
    }
}

/// Clustered mode: offers become `propose` calls against the shared
/// node. Proposing against a follower is a silent no-op (`None`), same
/// as any other backpressure signal; there is no request-forwarding to
/// the leader in scope here (§1 Non-goals).
pub struct ClusteredPublication<T> {
    node: Rc<RefCell<ClusterNode<T>>>,
}

impl<T> ClusteredPublication<T> {
    pub fn new(node: Rc<RefCell<ClusterNode<T>>>) -> ClusteredPublication<T> {
        ClusteredPublication { node }
    }
}

impl<T: Transport> GatewayPublication for ClusteredPublication<T> {
    fn offer(&mut self, session_id: SessionId, payload: Vec<u8>) -> Option<LogIndex> {
        self.node.borrow_mut().propose(session_id, payload)
    }

    fn current_position(&self) -> LogIndex {
        self.node.borrow().commit_index()
    }
}

pub enum ClusterableStreams<T> {
    Solo(SoloPublication),
    Clustered(ClusteredPublication<T>),
}

impl<T: Transport> GatewayPublication for ClusterableStreams<T> {
    fn offer(&mut self, session_id: SessionId, payload: Vec<u8>) -> Option<LogIndex> {
        match self {
            ClusterableStreams::Solo(publication) => publication.offer(session_id, payload),
            ClusterableStreams::Clustered(publication) => publication.offer(session_id, payload),
        }
    }

    fn current_position(&self) -> LogIndex {
        match self {
            ClusterableStreams::Solo(publication) => publication.current_position(),
            ClusterableStreams::Clustered(publication) => publication.current_position(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solo_publication_assigns_increasing_positions() {
        let mut streams: ClusterableStreams<fixgate_cluster::InMemoryTransport> =
            ClusterableStreams::Solo(SoloPublication::default());
        assert_eq!(streams.offer(1, b"a".to_vec()), Some(1));
        assert_eq!(streams.offer(1, b"b".to_vec()), Some(2));
    }
}
