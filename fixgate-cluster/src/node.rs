//! The Raft-style cluster node (§4.2). A [`ClusterNode`] is itself one of
//! the cooperative agents from §5: [`ClusterNode::do_work`] never blocks,
//! processes a bounded number of inbound frames per call, and reports how
//! much work it did so the host loop's idle strategy can back off.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use fixgate_core::{Instant, LogIndex, NodeId, SessionId, Term};
use rand::Rng;
use tracing::{debug, info, instrument};

use crate::{
    config::ClusterConfig,
    log::{RaftLog, RaftLogEntry},
    rpc::{AppendEntries, AppendEntriesReply, Frame, RequestVote, RequestVoteReply},
    transport::Transport,
};

/// Bound on frames drained from the transport in a single `do_work` call,
/// the "long operations are chunked across invocations" rule from §5.
const MAX_FRAMES_PER_TICK: usize = 64;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

pub struct ClusterNode<T> {
    config: ClusterConfig,
    transport: T,

    role: Role,
    current_term: Term,
    voted_for: Option<NodeId>,
    log: RaftLog,
    commit_index: LogIndex,
    last_applied: LogIndex,
    leader_session_id: SessionId,

    next_index: HashMap<NodeId, LogIndex>,
    match_index: HashMap<NodeId, LogIndex>,
    votes_received: HashSet<NodeId>,

    election_deadline: Instant,
    next_heartbeat_at: Instant,
    last_leader_contact: Instant,

    applied: VecDeque<RaftLogEntry>,
}

impl<T: Transport> ClusterNode<T> {
    pub fn new(config: ClusterConfig, transport: T, now: Instant) -> ClusterNode<T> {
        let mut node = ClusterNode {
            config,
            transport,
            role: Role::Follower,
            current_term: 0,
            voted_for: None,
            log: RaftLog::new(),
            commit_index: 0,
            last_applied: 0,
            leader_session_id: 0,
            next_index: HashMap::new(),
            match_index: HashMap::new(),
            votes_received: HashSet::new(),
            election_deadline: now,
            next_heartbeat_at: now,
            last_leader_contact: now,
            applied: VecDeque::new(),
        };
        node.reset_election_timer(now);
        node
    }

    pub fn node_id(&self) -> NodeId {
        self.config.node_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_leader(&self) -> bool {
        self.role == Role::Leader
    }

    pub fn is_follower(&self) -> bool {
        self.role == Role::Follower
    }

    pub fn current_term(&self) -> Term {
        self.current_term
    }

    pub fn commit_index(&self) -> LogIndex {
        self.commit_index
    }

    /// Changes on every leadership transition; session-layer consumers
    /// use this to discover the current writer (§4.2).
    pub fn leader_session_id(&self) -> SessionId {
        self.leader_session_id
    }

    /// Leader-only: assigns the entry the next `(term, index)` and queues
    /// it for replication. Returns `None` off the leader.
    pub fn propose(&mut self, session_id: SessionId, payload: Vec<u8>) -> Option<LogIndex> {
        if self.role != Role::Leader {
            return None;
        }
        Some(self.log.append_local(self.current_term, session_id, payload))
    }

    /// Drains entries that have crossed the commit boundary in increasing
    /// index order (§4.2 "Delivery"). At-least-once: a crash and replay of
    /// this node could redeliver; idempotency is the FIX session layer's
    /// job (§4.1).
    pub fn drain_committed(&mut self) -> Vec<RaftLogEntry> {
        self.applied.drain(..).collect()
    }

    /// The cooperative tick. Returns the number of actions performed.
    #[instrument(skip(self), fields(node = self.config.node_id))]
    pub fn do_work(&mut self, now: Instant) -> usize {
        let mut work = 0;

        for _ in 0..MAX_FRAMES_PER_TICK {
            match self.transport.poll_recv() {
                Some((from, frame)) => {
                    self.handle_frame(from, frame, now);
                    work += 1;
                }
                None => break,
            }
        }

        match self.role {
            Role::Follower | Role::Candidate => {
                if now >= self.election_deadline {
                    self.become_candidate(now);
                    work += 1;
                }
            }
            Role::Leader => {
                if now >= self.next_heartbeat_at {
                    self.broadcast_append_entries(now);
                    work += 1;
                }
            }
        }

        work
    }

    fn handle_frame(&mut self, from: NodeId, frame: Frame, now: Instant) {
        match frame {
            Frame::RequestVote(rv) => self.handle_request_vote(from, rv, now),
            Frame::RequestVoteReply(reply) => self.handle_request_vote_reply(from, reply, now),
            Frame::AppendEntries(ae) => self.handle_append_entries(from, ae, now),
            Frame::AppendEntriesReply(reply) => self.handle_append_entries_reply(from, reply, now),
        }
    }

    /// §4.2: a higher term always wins. Returns whether this node stepped
    /// down to FOLLOWER as a result.
    fn check_term(&mut self, term: Term) -> bool {
        if term > self.current_term {
            debug!(node = self.config.node_id, old_term = self.current_term, new_term = term, "observed higher term");
            self.current_term = term;
            self.voted_for = None;
            let was_leader_or_candidate = self.role != Role::Follower;
            self.role = Role::Follower;
            was_leader_or_candidate
        } else {
            false
        }
    }

    fn reset_election_timer(&mut self, now: Instant) {
        let min = self.config.election_timeout_min;
        let max = self.config.election_timeout_max;
        let jitter_ms = rand::thread_rng().gen_range(min.as_millis() as u64..=max.as_millis() as u64);
        self.election_deadline = now + Duration::from_millis(jitter_ms);
    }

    fn log_is_at_least_as_up_to_date(&self, last_log_term: Term, last_log_index: LogIndex) -> bool {
        (last_log_term, last_log_index) >= (self.log.last_term(), self.log.last_index())
    }

    fn become_candidate(&mut self, now: Instant) {
        self.current_term += 1;
        self.role = Role::Candidate;
        self.voted_for = Some(self.config.node_id);
        self.votes_received.clear();
        self.votes_received.insert(self.config.node_id);
        self.reset_election_timer(now);
        info!(node = self.config.node_id, term = self.current_term, "became candidate");

        let request = Frame::RequestVote(RequestVote {
            term: self.current_term,
            candidate_id: self.config.node_id,
            last_log_index: self.log.last_index(),
            last_log_term: self.log.last_term(),
        });
        for &peer in &self.config.peer_ids.clone() {
            self.transport.try_send(peer, request.clone());
        }
    }

    fn become_leader(&mut self, now: Instant) {
        self.role = Role::Leader;
        // Deterministic, collision-free within this node's lifetime:
        // every term this node leads under gets a distinct session id.
        self.leader_session_id = (self.config.node_id as SessionId) << 48 | self.current_term as SessionId;
        let next = self.log.last_index() + 1;
        for &peer in &self.config.peer_ids {
            self.next_index.insert(peer, next);
            self.match_index.insert(peer, 0);
        }
        info!(node = self.config.node_id, term = self.current_term, "became leader");
        self.broadcast_append_entries(now);
    }

    /// §4.2's leader-stickiness guard: a node that has heard from a live
    /// leader (or believes itself to be one) within the last election
    /// timeout refuses to grant votes to a challenger, even one with a
    /// higher term. This is what makes "drop only inbound on a follower"
    /// fail the isolated node's election instead of handing it the
    /// cluster: its RequestVotes still reach healthy peers, but those
    /// peers have heard from the real leader recently and reject them.
    fn sticking_with_known_leader(&self, now: Instant) -> bool {
        self.role != Role::Candidate
            && now.saturating_duration_since(self.last_leader_contact) < self.config.election_timeout_min
    }

    fn handle_request_vote(&mut self, from: NodeId, rv: RequestVote, now: Instant) {
        if self.sticking_with_known_leader(now) {
            self.transport.try_send(
                from,
                Frame::RequestVoteReply(RequestVoteReply {
                    term: self.current_term,
                    voter_id: self.config.node_id,
                    vote_granted: false,
                }),
            );
            return;
        }

        self.check_term(rv.term);

        let grant = rv.term >= self.current_term
            && (self.voted_for.is_none() || self.voted_for == Some(rv.candidate_id))
            && self.log_is_at_least_as_up_to_date(rv.last_log_term, rv.last_log_index);

        if grant {
            self.voted_for = Some(rv.candidate_id);
        }

        self.transport.try_send(
            from,
            Frame::RequestVoteReply(RequestVoteReply {
                term: self.current_term,
                voter_id: self.config.node_id,
                vote_granted: grant,
            }),
        );
    }

    fn handle_request_vote_reply(&mut self, from: NodeId, reply: RequestVoteReply, now: Instant) {
        if self.check_term(reply.term) {
            return;
        }
        if self.role != Role::Candidate || reply.term != self.current_term || !reply.vote_granted {
            return;
        }
        self.votes_received.insert(from);
        if self.votes_received.len() >= self.config.quorum_size() {
            self.become_leader(now);
        }
    }

    fn handle_append_entries(&mut self, from: NodeId, ae: AppendEntries, now: Instant) {
        if ae.term < self.current_term {
            self.transport.try_send(
                from,
                Frame::AppendEntriesReply(AppendEntriesReply {
                    term: self.current_term,
                    follower_id: self.config.node_id,
                    success: false,
                    match_index: 0,
                }),
            );
            return;
        }

        self.check_term(ae.term);
        self.role = Role::Follower;
        self.reset_election_timer(now);
        self.last_leader_contact = now;
        self.leader_session_id = ae.leader_session_id;

        let consistent = ae.prev_log_index == 0 || self.log.term_at(ae.prev_log_index) == Some(ae.prev_log_term);
        if !consistent {
            self.transport.try_send(
                from,
                Frame::AppendEntriesReply(AppendEntriesReply {
                    term: self.current_term,
                    follower_id: self.config.node_id,
                    success: false,
                    match_index: self.log.last_index().min(ae.prev_log_index.saturating_sub(1)),
                }),
            );
            return;
        }

        self.log.replace_from(ae.prev_log_index + 1, &ae.entries);
        let last_new_index = ae.prev_log_index + ae.entries.len() as LogIndex;
        if ae.leader_commit > self.commit_index {
            self.commit_index = ae.leader_commit.min(last_new_index);
            self.apply_committed();
        }

        self.transport.try_send(
            from,
            Frame::AppendEntriesReply(AppendEntriesReply {
                term: self.current_term,
                follower_id: self.config.node_id,
                success: true,
                match_index: last_new_index,
            }),
        );
    }

    fn handle_append_entries_reply(&mut self, from: NodeId, reply: AppendEntriesReply, now: Instant) {
        let _ = now;
        if self.check_term(reply.term) {
            return;
        }
        if self.role != Role::Leader {
            return;
        }
        if reply.success {
            self.match_index.insert(from, reply.match_index);
            self.next_index.insert(from, reply.match_index + 1);
            self.advance_commit_index();
        } else {
            let next = self.next_index.get(&from).copied().unwrap_or(1);
            self.next_index.insert(from, next.saturating_sub(1).max(1));
        }
    }

    /// §4.2's safety property: an entry only becomes committed once it is
    /// on a majority *and* it was proposed in the leader's current term.
    fn advance_commit_index(&mut self) {
        let mut match_indices: Vec<LogIndex> = self.match_index.values().copied().collect();
        match_indices.push(self.log.last_index()); // the leader itself
        match_indices.sort_unstable();
        let quorum = self.config.quorum_size();
        let candidate_index = match_indices[match_indices.len() - quorum];

        if candidate_index > self.commit_index && self.log.term_at(candidate_index) == Some(self.current_term) {
            self.commit_index = candidate_index;
            self.apply_committed();
        }
    }

    fn apply_committed(&mut self) {
        while self.last_applied < self.commit_index {
            self.last_applied += 1;
            if let Some(entry) = self.log.get(self.last_applied) {
                self.applied.push_back(entry.clone());
            }
        }
    }

    fn broadcast_append_entries(&mut self, now: Instant) {
        self.next_heartbeat_at = now + self.config.heartbeat_interval;
        self.last_leader_contact = now;
        for &peer in &self.config.peer_ids.clone() {
            let next = self.next_index.get(&peer).copied().unwrap_or(self.log.last_index() + 1);
            let prev_index = next.saturating_sub(1);
            let prev_term = self.log.term_at(prev_index).unwrap_or(0);
            let entries = self.log.entries_from(next).to_vec();
            self.transport.try_send(
                peer,
                Frame::AppendEntries(AppendEntries {
                    term: self.current_term,
                    leader_id: self.config.node_id,
                    leader_session_id: self.leader_session_id,
                    prev_log_index: prev_index,
                    prev_log_term: prev_term,
                    entries,
                    leader_commit: self.commit_index,
                }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crate::{
        config::ClusterConfig,
        transport::{DropPolicy, InMemoryFabric},
    };

    use super::*;

    fn cluster(ids: &[NodeId]) -> (InMemoryFabric, Vec<ClusterNode<crate::transport::InMemoryTransport>>) {
        let fabric = InMemoryFabric::new(ids);
        let now = Instant::now();
        let nodes = ids
            .iter()
            .map(|&id| {
                let peers: Vec<NodeId> = ids.iter().copied().filter(|&p| p != id).collect();
                ClusterNode::new(ClusterConfig::new(id, peers), fabric.handle(id), now)
            })
            .collect();
        (fabric, nodes)
    }

    fn run_until<F: Fn(&[ClusterNode<crate::transport::InMemoryTransport>]) -> bool>(
        nodes: &mut [ClusterNode<crate::transport::InMemoryTransport>],
        mut now: Instant,
        predicate: F,
    ) -> bool {
        for _ in 0..2000 {
            if predicate(nodes) {
                return true;
            }
            now += Duration::from_millis(5);
            for node in nodes.iter_mut() {
                node.do_work(now);
            }
        }
        predicate(nodes)
    }

    #[test]
    fn cluster_elects_exactly_one_leader() {
        let (_fabric, mut nodes) = cluster(&[1, 2, 3]);
        let now = Instant::now();
        let elected = run_until(&mut nodes, now, |nodes| nodes.iter().filter(|n| n.is_leader()).count() == 1);
        assert!(elected);
        assert_eq!(nodes.iter().filter(|n| n.is_leader()).count(), 1);

        // §8 scenario 1: within bounded time every node agrees on who the
        // leader is, not just that a leader exists.
        run_until(&mut nodes, now, |nodes| {
            nodes.iter().filter(|n| n.is_follower()).count() == 2
        });
        let expected_session = nodes.iter().find(|n| n.is_leader()).unwrap().leader_session_id();
        assert!(nodes.iter().all(|n| n.leader_session_id() == expected_session));
    }

    #[test]
    fn leader_full_netsplit_causes_reelection() {
        let (fabric, mut nodes) = cluster(&[1, 2, 3]);
        let now = Instant::now();
        run_until(&mut nodes, now, |nodes| nodes.iter().any(|n| n.is_leader()));
        let old_leader = nodes.iter().find(|n| n.is_leader()).unwrap().node_id();

        fabric.set_drop_policy(old_leader, DropPolicy { drop_inbound: true, drop_outbound: true });
        let reelected = run_until(&mut nodes, now, |nodes| {
            nodes
                .iter()
                .filter(|n| n.node_id() != old_leader)
                .any(|n| n.is_leader())
        });
        assert!(reelected);

        // §8 scenario 3: once the partition heals, the old leader steps
        // down to FOLLOWER rather than continuing to believe it leads.
        fabric.set_drop_policy(old_leader, DropPolicy::default());
        let rejoined = run_until(&mut nodes, now, |nodes| {
            nodes.iter().find(|n| n.node_id() == old_leader).unwrap().is_follower()
        });
        assert!(rejoined);
        assert_eq!(nodes.iter().filter(|n| n.is_leader()).count(), 1);
    }

    /// §8 scenario 4: dropping only the leader's outbound frames produces
    /// the same outcome as a full netsplit at the leader — followers never
    /// hear a heartbeat either way, so they time out and elect among
    /// themselves.
    #[test]
    fn leader_outbound_only_netsplit_causes_reelection() {
        let (fabric, mut nodes) = cluster(&[1, 2, 3]);
        let now = Instant::now();
        run_until(&mut nodes, now, |nodes| nodes.iter().any(|n| n.is_leader()));
        let old_leader = nodes.iter().find(|n| n.is_leader()).unwrap().node_id();

        fabric.set_drop_policy(old_leader, DropPolicy { drop_inbound: false, drop_outbound: true });
        let reelected = run_until(&mut nodes, now, |nodes| {
            nodes
                .iter()
                .filter(|n| n.node_id() != old_leader)
                .any(|n| n.is_leader())
        });
        assert!(reelected);
    }

    /// §8 scenario 5: a fully-partitioned follower becomes CANDIDATE and
    /// keeps failing its own elections (it can only ever vote for itself),
    /// while the two remaining nodes retain their original leader. Healing
    /// the partition brings it back as FOLLOWER with exactly one leader
    /// left in the cluster.
    #[test]
    fn follower_full_netsplit_fails_election_and_rejoins_as_follower() {
        let (fabric, mut nodes) = cluster(&[1, 2, 3]);
        let now = Instant::now();
        run_until(&mut nodes, now, |nodes| nodes.iter().any(|n| n.is_leader()));
        let leader_id = nodes.iter().find(|n| n.is_leader()).unwrap().node_id();
        let isolated = nodes.iter().find(|n| n.node_id() != leader_id).unwrap().node_id();

        fabric.set_drop_policy(isolated, DropPolicy { drop_inbound: true, drop_outbound: true });
        run_until(&mut nodes, now, |_| false);

        assert!(nodes.iter().find(|n| n.node_id() == leader_id).unwrap().is_leader());
        assert!(!nodes.iter().find(|n| n.node_id() == isolated).unwrap().is_leader());
        assert_eq!(nodes.iter().filter(|n| n.is_leader()).count(), 1);

        fabric.set_drop_policy(isolated, DropPolicy::default());
        let rejoined = run_until(&mut nodes, now, |nodes| {
            nodes.iter().find(|n| n.node_id() == isolated).unwrap().is_follower()
        });
        assert!(rejoined);
        assert_eq!(nodes.iter().filter(|n| n.is_leader()).count(), 1);
        assert_eq!(nodes.iter().filter(|n| n.is_follower()).count(), 2);
    }

    /// §8 scenario 2: a proposed entry is replicated to every node and
    /// surfaces through `drain_committed` once it crosses the commit
    /// boundary.
    #[test]
    fn propose_replicates_and_commits_on_every_node() {
        let (_fabric, mut nodes) = cluster(&[1, 2, 3]);
        let now = Instant::now();
        run_until(&mut nodes, now, |nodes| nodes.iter().any(|n| n.is_leader()));

        let payload = vec![7u8; 16];
        let index = {
            let leader = nodes.iter_mut().find(|n| n.is_leader()).unwrap();
            leader.propose(42, payload.clone()).expect("leader accepts proposal")
        };

        let committed_everywhere =
            run_until(&mut nodes, now, |nodes| nodes.iter().all(|n| n.commit_index() >= index));
        assert!(committed_everywhere);

        for node in nodes.iter_mut() {
            let entries = node.drain_committed();
            let entry = entries.iter().find(|e| e.index == index).expect("entry delivered");
            assert_eq!(entry.session_id, 42);
            assert_eq!(entry.payload, payload);
        }
    }

    /// §8 scenario 6: while a follower is partitioned, the leader keeps
    /// committing with the remaining majority, but the partitioned
    /// follower's view does not advance until the partition heals.
    #[test]
    fn partitioned_follower_makes_no_progress_until_partition_heals() {
        let (fabric, mut nodes) = cluster(&[1, 2, 3]);
        let now = Instant::now();
        run_until(&mut nodes, now, |nodes| nodes.iter().any(|n| n.is_leader()));
        let leader_id = nodes.iter().find(|n| n.is_leader()).unwrap().node_id();
        let partitioned = nodes.iter().find(|n| n.node_id() != leader_id).unwrap().node_id();

        fabric.set_drop_policy(partitioned, DropPolicy { drop_inbound: true, drop_outbound: true });

        let payload = vec![9u8; 16];
        let index = {
            let leader = nodes.iter_mut().find(|n| n.node_id() == leader_id).unwrap();
            leader.propose(7, payload.clone()).expect("leader accepts proposal")
        };

        // Majority (leader + the healthy follower) still commits.
        let committed_on_majority = run_until(&mut nodes, now, |nodes| {
            nodes
                .iter()
                .filter(|n| n.node_id() != partitioned)
                .all(|n| n.commit_index() >= index)
        });
        assert!(committed_on_majority);
        assert!(nodes.iter().find(|n| n.node_id() == partitioned).unwrap().commit_index() < index);

        fabric.set_drop_policy(partitioned, DropPolicy::default());
        let caught_up = run_until(&mut nodes, now, |nodes| {
            nodes.iter().find(|n| n.node_id() == partitioned).unwrap().commit_index() >= index
        });
        assert!(caught_up);
        let healed = nodes.iter_mut().find(|n| n.node_id() == partitioned).unwrap();
        let entries = healed.drain_committed();
        assert!(entries.iter().any(|e| e.index == index && e.payload == payload));
    }

    /// §4.2's frame-drop scenario: "Drop only inbound on a follower → it
    /// stops hearing heartbeats, becomes CANDIDATE, but its elections fail
    /// because its RequestVotes are delivered and peers with a live leader
    /// reject them." The isolated node must never become leader, and the
    /// original leader must keep the job throughout.
    #[test]
    fn drop_inbound_only_on_follower_does_not_steal_leadership() {
        let (fabric, mut nodes) = cluster(&[1, 2, 3]);
        let now = Instant::now();
        run_until(&mut nodes, now, |nodes| nodes.iter().any(|n| n.is_leader()));
        let leader_id = nodes.iter().find(|n| n.is_leader()).unwrap().node_id();
        let isolated = nodes.iter().find(|n| n.node_id() != leader_id).unwrap().node_id();

        fabric.set_drop_policy(isolated, DropPolicy { drop_inbound: true, drop_outbound: false });

        // Run long enough for the isolated node's election timer to fire
        // repeatedly and for its RequestVotes to be rejected each time.
        run_until(&mut nodes, now, |_| false);

        assert!(
            nodes.iter().find(|n| n.node_id() == leader_id).unwrap().is_leader(),
            "original leader must not be deposed by a stale candidate's higher term"
        );
        assert!(
            !nodes.iter().find(|n| n.node_id() == isolated).unwrap().is_leader(),
            "isolated node's elections must fail while peers still hear from a live leader"
        );
        assert_eq!(nodes.iter().filter(|n| n.is_leader()).count(), 1);
    }
}
