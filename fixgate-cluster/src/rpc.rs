use fixgate_core::{LogIndex, NodeId, Term};
use serde::{Deserialize, Serialize};

use crate::log::RaftLogEntry;

/// Cluster wire format (§6): frames exchanged between nodes, bincode
/// serialized and padded to the transport's fragment boundary by the
/// transport layer itself, not by this type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Frame {
    RequestVote(RequestVote),
    RequestVoteReply(RequestVoteReply),
    AppendEntries(AppendEntries),
    AppendEntriesReply(AppendEntriesReply),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestVote {
    pub term: Term,
    pub candidate_id: NodeId,
    pub last_log_index: LogIndex,
    pub last_log_term: Term,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestVoteReply {
    pub term: Term,
    pub voter_id: NodeId,
    pub vote_granted: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppendEntries {
    pub term: Term,
    pub leader_id: NodeId,
    pub leader_session_id: fixgate_core::SessionId,
    pub prev_log_index: LogIndex,
    pub prev_log_term: Term,
    pub entries: Vec<RaftLogEntry>,
    pub leader_commit: LogIndex,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppendEntriesReply {
    pub term: Term,
    pub follower_id: NodeId,
    pub success: bool,
    /// Last index the follower's log agrees with the leader on, used to
    /// fast-rewind `next_index[p]` instead of decrementing one at a time.
    pub match_index: LogIndex,
}

pub fn encode(frame: &Frame) -> Vec<u8> {
    bincode::serialize(frame).expect("Frame serialization is infallible")
}

pub fn decode(bytes: &[u8]) -> Result<Frame, bincode::Error> {
    bincode::deserialize(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_vote_round_trips() {
        let frame = Frame::RequestVote(RequestVote {
            term: 4,
            candidate_id: 2,
            last_log_index: 10,
            last_log_term: 3,
        });
        let bytes = encode(&frame);
        let decoded = decode(&bytes).unwrap();
        match decoded {
            Frame::RequestVote(rv) => assert_eq!(rv.term, 4),
            _ => panic!("expected RequestVote"),
        }
    }
}
