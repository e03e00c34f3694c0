use std::{collections::BTreeMap, convert::Infallible, ops::RangeInclusive};

use fixgate_core::SeqNum;

/// Storage for the two sequence-number counters of a session and the raw
/// outbound bytes needed to answer a `ResendRequest`. The session state
/// machine never inspects message content through this trait: bodies are
/// opaque (§1), stored and fetched by sequence number alone.
pub trait MessagesStorage {
    type Error: std::error::Error;

    fn fetch_range(&mut self, range: RangeInclusive<SeqNum>) -> Result<Vec<Vec<u8>>, Self::Error>;
    fn store(&mut self, seq_num: SeqNum, data: &[u8]) -> Result<(), Self::Error>;

    fn next_sender_msg_seq_num(&self) -> SeqNum;
    fn next_target_msg_seq_num(&self) -> SeqNum;

    fn set_next_sender_msg_seq_num(&mut self, seq_num: SeqNum);
    fn set_next_target_msg_seq_num(&mut self, seq_num: SeqNum);

    fn incr_next_sender_msg_seq_num(&mut self) {
        let next = self.next_sender_msg_seq_num() + 1;
        self.set_next_sender_msg_seq_num(next);
    }

    fn incr_next_target_msg_seq_num(&mut self) {
        let next = self.next_target_msg_seq_num() + 1;
        self.set_next_target_msg_seq_num(next);
    }

    fn reset(&mut self) -> Result<(), Self::Error>;
}

/// Discards everything. Used for sessions that never persist (and never
/// honor a `ResendRequest` beyond an empty reply).
#[derive(Default)]
pub struct NullStorage {
    next_sender_msg_seq_num: SeqNum,
    next_target_msg_seq_num: SeqNum,
}

impl NullStorage {
    pub fn new() -> NullStorage {
        NullStorage {
            next_sender_msg_seq_num: 1,
            next_target_msg_seq_num: 1,
        }
    }
}

impl MessagesStorage for NullStorage {
    type Error = Infallible;

    fn fetch_range(&mut self, _range: RangeInclusive<SeqNum>) -> Result<Vec<Vec<u8>>, Self::Error> {
        Ok(Vec::new())
    }

    fn store(&mut self, _seq_num: SeqNum, _data: &[u8]) -> Result<(), Self::Error> {
        Ok(())
    }

    fn next_sender_msg_seq_num(&self) -> SeqNum {
        self.next_sender_msg_seq_num
    }

    fn next_target_msg_seq_num(&self) -> SeqNum {
        self.next_target_msg_seq_num
    }

    fn set_next_sender_msg_seq_num(&mut self, seq_num: SeqNum) {
        self.next_sender_msg_seq_num = seq_num;
    }

    fn set_next_target_msg_seq_num(&mut self, seq_num: SeqNum) {
        self.next_target_msg_seq_num = seq_num;
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.next_sender_msg_seq_num = 1;
        self.next_target_msg_seq_num = 1;
        Ok(())
    }
}

/// Keeps sent bytes in a `BTreeMap` for the lifetime of the process.
/// Sufficient for tests and for deployments that accept losing resend
/// history across a restart.
#[derive(Default)]
pub struct InMemoryStorage {
    next_sender_msg_seq_num: SeqNum,
    next_target_msg_seq_num: SeqNum,
    sent: BTreeMap<SeqNum, Vec<u8>>,
}

impl InMemoryStorage {
    pub fn new() -> InMemoryStorage {
        InMemoryStorage {
            next_sender_msg_seq_num: 1,
            next_target_msg_seq_num: 1,
            sent: BTreeMap::new(),
        }
    }
}

impl MessagesStorage for InMemoryStorage {
    type Error = Infallible;

    fn fetch_range(&mut self, range: RangeInclusive<SeqNum>) -> Result<Vec<Vec<u8>>, Self::Error> {
        Ok(self.sent.range(range).map(|(_, v)| v.clone()).collect())
    }

    fn store(&mut self, seq_num: SeqNum, data: &[u8]) -> Result<(), Self::Error> {
        self.sent.insert(seq_num, data.to_vec());
        Ok(())
    }

    fn next_sender_msg_seq_num(&self) -> SeqNum {
        self.next_sender_msg_seq_num
    }

    fn next_target_msg_seq_num(&self) -> SeqNum {
        self.next_target_msg_seq_num
    }

    fn set_next_sender_msg_seq_num(&mut self, seq_num: SeqNum) {
        self.next_sender_msg_seq_num = seq_num;
    }

    fn set_next_target_msg_seq_num(&mut self, seq_num: SeqNum) {
        self.next_target_msg_seq_num = seq_num;
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.next_sender_msg_seq_num = 1;
        self.next_target_msg_seq_num = 1;
        self.sent.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_storage_fetches_stored_range() {
        let mut storage = InMemoryStorage::new();
        storage.store(1, b"one").unwrap();
        storage.store(2, b"two").unwrap();
        storage.store(3, b"three").unwrap();
        let fetched = storage.fetch_range(2..=3).unwrap();
        assert_eq!(fetched, vec![b"two".to_vec(), b"three".to_vec()]);
    }

    #[test]
    fn incr_helpers_advance_by_one() {
        let mut storage = NullStorage::new();
        storage.incr_next_sender_msg_seq_num();
        storage.incr_next_target_msg_seq_num();
        assert_eq!(storage.next_sender_msg_seq_num(), 2);
        assert_eq!(storage.next_target_msg_seq_num(), 2);
    }
}
