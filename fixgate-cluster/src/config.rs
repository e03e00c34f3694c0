use std::time::Duration;

use fixgate_core::NodeId;

/// Raft timing and membership, §6's cluster configuration options.
/// Membership is fixed at startup (§1 Non-goals: no dynamic membership
/// changes).
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    pub node_id: NodeId,
    pub peer_ids: Vec<NodeId>,
    pub election_timeout_min: Duration,
    pub election_timeout_max: Duration,
    pub heartbeat_interval: Duration,
}

impl ClusterConfig {
    pub fn new(node_id: NodeId, peer_ids: Vec<NodeId>) -> ClusterConfig {
        ClusterConfig {
            node_id,
            peer_ids,
            election_timeout_min: Duration::from_millis(150),
            election_timeout_max: Duration::from_millis(300),
            heartbeat_interval: Duration::from_millis(50),
        }
    }

    /// A cluster of `peer_ids.len() + 1` nodes needs this many votes
    /// (including its own) to form a majority.
    pub fn quorum_size(&self) -> usize {
        (self.peer_ids.len() + 1) / 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_node_cluster_needs_two_votes() {
        let config = ClusterConfig::new(1, vec![2, 3]);
        assert_eq!(config.quorum_size(), 2);
    }
}
