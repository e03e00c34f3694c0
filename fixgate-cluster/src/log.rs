use fixgate_core::{LogIndex, SessionId, Term};
use serde::{Deserialize, Serialize};

/// One replicated entry. `session_id` is carried through so that a
/// consumer subscribing to the committed stream can filter to the
/// session it cares about without re-parsing `payload` (§3).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RaftLogEntry {
    pub term: Term,
    pub index: LogIndex,
    pub session_id: SessionId,
    pub payload: Vec<u8>,
}

/// Append-only, 1-origin log. `index` is dense: there is never a gap
/// between `entries[i].index` and `entries[i+1].index`. Truncation only
/// ever removes a suffix, in keeping with "committed prefix never
/// rewritten" (§3).
#[derive(Default)]
pub struct RaftLog {
    entries: Vec<RaftLogEntry>,
}

impl RaftLog {
    pub fn new() -> RaftLog {
        RaftLog { entries: Vec::new() }
    }

    pub fn last_index(&self) -> LogIndex {
        self.entries.last().map(|e| e.index).unwrap_or(0)
    }

    pub fn last_term(&self) -> Term {
        self.entries.last().map(|e| e.term).unwrap_or(0)
    }

    pub fn get(&self, index: LogIndex) -> Option<&RaftLogEntry> {
        if index == 0 {
            return None;
        }
        self.entries.get((index - 1) as usize)
    }

    pub fn term_at(&self, index: LogIndex) -> Option<Term> {
        self.get(index).map(|e| e.term)
    }

    pub fn entries_from(&self, index: LogIndex) -> &[RaftLogEntry] {
        if index == 0 || index as usize > self.entries.len() + 1 {
            return &[];
        }
        &self.entries[(index - 1) as usize..]
    }

    /// Leader-only: assigns the entry the next dense `(term, index)` and
    /// appends it.
    pub fn append_local(&mut self, term: Term, session_id: SessionId, payload: Vec<u8>) -> LogIndex {
        let index = self.last_index() + 1;
        self.entries.push(RaftLogEntry { term, index, session_id, payload });
        index
    }

    /// Follower-only: truncates any conflicting suffix starting at
    /// `from_index` (inclusive) and appends `entries`.
    pub fn replace_from(&mut self, from_index: LogIndex, entries: &[RaftLogEntry]) {
        if from_index >= 1 {
            self.entries.truncate((from_index - 1) as usize);
        }
        self.entries.extend(entries.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_local_assigns_dense_indices() {
        let mut log = RaftLog::new();
        assert_eq!(log.append_local(1, 7, b"a".to_vec()), 1);
        assert_eq!(log.append_local(1, 7, b"b".to_vec()), 2);
        assert_eq!(log.last_index(), 2);
    }

    #[test]
    fn replace_from_truncates_conflicting_suffix() {
        let mut log = RaftLog::new();
        log.append_local(1, 1, b"a".to_vec());
        log.append_local(1, 1, b"b".to_vec());
        log.append_local(1, 1, b"c".to_vec());

        log.replace_from(2, &[RaftLogEntry { term: 2, index: 2, session_id: 1, payload: b"b2".to_vec() }]);
        assert_eq!(log.last_index(), 2);
        assert_eq!(log.get(2).unwrap().term, 2);
    }
}
