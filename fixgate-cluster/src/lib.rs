//! Raft-style replication layer for the gateway cluster (§4.2). Each
//! [`node::ClusterNode`] is a cooperative agent in the sense of §5: no
//! suspension points, driven by repeated `do_work` calls from the host
//! loop, non-blocking transport.

pub mod completion;
pub mod config;
pub mod log;
pub mod node;
pub mod rpc;
pub mod transport;

pub use completion::CompletionPosition;
pub use config::ClusterConfig;
pub use log::{RaftLog, RaftLogEntry};
pub use node::{ClusterNode, Role};
pub use rpc::{AppendEntries, AppendEntriesReply, Frame, RequestVote, RequestVoteReply};
pub use transport::{DropPolicy, InMemoryFabric, InMemoryTransport, Transport};
