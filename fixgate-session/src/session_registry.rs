//! Persistent `SessionKey -> session_id` mapping (§4.3). Allocation is
//! monotonic and ids are never reused within a process lifetime, so a
//! reconnecting peer resumes with the sequence-number state it left off
//! with.

use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{self, BufReader, Read, Write},
    path::{Path, PathBuf},
};

use fixgate_core::SessionId;
use tracing::warn;

use crate::session_id::SessionKey;

#[derive(Debug, thiserror::Error)]
pub enum SessionIdsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("registry record at offset {offset} failed its CRC check")]
    CorruptRecord { offset: u64 },
}

/// One `(session_id, key_len, key_bytes)` record plus its CRC32 trailer,
/// the on-disk layout described in §6.
fn encode_record(id: SessionId, key: &SessionKey) -> Vec<u8> {
    let key_bytes = key.to_bytes();
    let mut record = Vec::with_capacity(8 + 2 + key_bytes.len() + 4);
    record.extend_from_slice(&id.to_le_bytes());
    record.extend_from_slice(&(key_bytes.len() as u16).to_le_bytes());
    record.extend_from_slice(&key_bytes);
    let crc = crc32fast::hash(&record);
    record.extend_from_slice(&crc.to_le_bytes());
    record
}

fn decode_records(mut bytes: &[u8]) -> Result<Vec<(SessionId, SessionKey)>, SessionIdsError> {
    let mut out = Vec::new();
    let mut offset = 0u64;
    while !bytes.is_empty() {
        if bytes.len() < 10 {
            return Err(SessionIdsError::CorruptRecord { offset });
        }
        let id = SessionId::from_le_bytes(bytes[0..8].try_into().unwrap());
        let key_len = u16::from_le_bytes(bytes[8..10].try_into().unwrap()) as usize;
        let record_len = 10 + key_len + 4;
        if bytes.len() < record_len {
            return Err(SessionIdsError::CorruptRecord { offset });
        }
        let (record, rest) = bytes.split_at(record_len);
        let (payload, crc_bytes) = record.split_at(record_len - 4);
        let expected = u32::from_le_bytes(crc_bytes.try_into().unwrap());
        if crc32fast::hash(payload) != expected {
            return Err(SessionIdsError::CorruptRecord { offset });
        }
        let key = SessionKey::from_bytes(&payload[10..]).ok_or(SessionIdsError::CorruptRecord { offset })?;
        out.push((id, key));
        offset += record_len as u64;
        bytes = rest;
    }
    Ok(out)
}

/// Small persistent mapping `SessionKey -> session_id`. Operations never
/// touch the network; callers are expected to serialize access through a
/// single owning agent (§5: "the session registry is single-writer").
pub struct SessionIds {
    path: Option<PathBuf>,
    file: Option<File>,
    next_id: SessionId,
    by_key: HashMap<SessionKey, SessionId>,
}

impl SessionIds {
    /// In-memory only, nothing is persisted across process restarts.
    pub fn in_memory() -> SessionIds {
        SessionIds {
            path: None,
            file: None,
            next_id: 1,
            by_key: HashMap::new(),
        }
    }

    /// Opens (creating if necessary) a registry file and replays every
    /// record in it to rebuild the in-memory map.
    pub fn open(path: impl AsRef<Path>) -> Result<SessionIds, SessionIdsError> {
        let path = path.as_ref().to_path_buf();
        let mut contents = Vec::new();
        if path.exists() {
            let mut reader = BufReader::new(File::open(&path)?);
            reader.read_to_end(&mut contents)?;
        }
        let records = decode_records(&contents)?;
        let mut by_key = HashMap::with_capacity(records.len());
        let mut next_id = 1;
        for (id, key) in records {
            next_id = next_id.max(id + 1);
            by_key.insert(key, id);
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(SessionIds {
            path: Some(path),
            file: Some(file),
            next_id,
            by_key,
        })
    }

    /// Returns the existing id for `key`, or allocates and persists a new
    /// one. Allocation is monotonic; released ids are never handed out
    /// again for the lifetime of this registry.
    pub fn lookup_or_allocate(&mut self, key: &SessionKey) -> Result<SessionId, SessionIdsError> {
        if let Some(&id) = self.by_key.get(key) {
            return Ok(id);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.by_key.insert(key.clone(), id);
        if let Some(file) = self.file.as_mut() {
            file.write_all(&encode_record(id, key))?;
            file.flush()?;
        }
        Ok(id)
    }

    /// Drops the in-memory association for `session_id`. The on-disk
    /// record is left in place (the file is append-only); `id` is still
    /// never reallocated because `next_id` only moves forward.
    pub fn release(&mut self, session_id: SessionId) {
        let key = self.by_key.iter().find(|&(_, &v)| v == session_id).map(|(k, _)| k.clone());
        match key {
            Some(key) => {
                self.by_key.remove(&key);
            }
            None => warn!(session_id, "release() called for an id not present in the registry"),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use fixgate_core::FixString;

    use super::*;

    fn key(s: &str) -> SessionKey {
        let f = FixString::from_ascii(s.as_bytes().to_vec()).unwrap();
        SessionKey::new(f.clone(), f.clone(), f)
    }

    #[test]
    fn allocates_monotonically_and_never_reuses() {
        let mut ids = SessionIds::in_memory();
        let a = ids.lookup_or_allocate(&key("A")).unwrap();
        let b = ids.lookup_or_allocate(&key("B")).unwrap();
        assert!(b > a);
        ids.release(a);
        let c = ids.lookup_or_allocate(&key("C")).unwrap();
        assert!(c > b);
    }

    #[test]
    fn same_key_returns_same_id() {
        let mut ids = SessionIds::in_memory();
        let a1 = ids.lookup_or_allocate(&key("A")).unwrap();
        let a2 = ids.lookup_or_allocate(&key("A")).unwrap();
        assert_eq!(a1, a2);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.dat");
        let id = {
            let mut ids = SessionIds::open(&path).unwrap();
            ids.lookup_or_allocate(&key("A")).unwrap()
        };
        let mut reopened = SessionIds::open(&path).unwrap();
        assert_eq!(reopened.lookup_or_allocate(&key("A")).unwrap(), id);
    }
}
