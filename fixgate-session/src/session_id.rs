use core::fmt;

use fixgate_core::{FixStr, FixString};

/// Composite identity of a FIX session: `(sender, target)` plus an optional
/// qualifier for the rare case where more than one logical session shares
/// a comp id pair. Hashed and compared by value so it can key the
/// [`crate::session_registry::SessionIds`] map.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SessionKey {
    begin_string: FixString,
    sender_comp_id: FixString,
    target_comp_id: FixString,
    session_qualifier: FixString,
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.session_qualifier.is_empty() {
            write!(
                f,
                "{}: {} -> {}",
                self.begin_string, self.sender_comp_id, self.target_comp_id
            )
        } else {
            write!(
                f,
                "{}: {} -> {} ({})",
                self.begin_string, self.sender_comp_id, self.target_comp_id, self.session_qualifier
            )
        }
    }
}

impl SessionKey {
    pub fn new(begin_string: FixString, sender_comp_id: FixString, target_comp_id: FixString) -> SessionKey {
        SessionKey {
            begin_string,
            sender_comp_id,
            target_comp_id,
            session_qualifier: FixString::new(),
        }
    }

    pub fn with_qualifier(
        begin_string: FixString,
        sender_comp_id: FixString,
        target_comp_id: FixString,
        session_qualifier: FixString,
    ) -> SessionKey {
        SessionKey {
            begin_string,
            sender_comp_id,
            target_comp_id,
            session_qualifier,
        }
    }

    /// Builds the key as seen by the local side receiving `header`: our
    /// sender id is the message's target and vice versa.
    pub fn from_inbound_header(
        begin_string: &FixStr,
        msg_sender_comp_id: &FixStr,
        msg_target_comp_id: &FixStr,
    ) -> SessionKey {
        SessionKey::new(
            begin_string.to_owned(),
            msg_target_comp_id.to_owned(),
            msg_sender_comp_id.to_owned(),
        )
    }

    pub fn reverse_route(mut self) -> SessionKey {
        std::mem::swap(&mut self.sender_comp_id, &mut self.target_comp_id);
        self
    }

    pub fn begin_string(&self) -> &FixStr {
        &self.begin_string
    }

    pub fn sender_comp_id(&self) -> &FixStr {
        &self.sender_comp_id
    }

    pub fn target_comp_id(&self) -> &FixStr {
        &self.target_comp_id
    }

    pub fn session_qualifier(&self) -> &FixStr {
        &self.session_qualifier
    }

    /// Byte encoding used by [`crate::session_registry`] when persisting
    /// the key next to its allocated `session_id` (§6: `(session_id,
    /// key_len, key_bytes)` records).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for part in [
            self.begin_string.as_bytes(),
            self.sender_comp_id.as_bytes(),
            self.target_comp_id.as_bytes(),
            self.session_qualifier.as_bytes(),
        ] {
            bytes.extend_from_slice(&(part.len() as u16).to_le_bytes());
            bytes.extend_from_slice(part);
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<SessionKey> {
        let mut parts = Vec::with_capacity(4);
        let mut rest = bytes;
        for _ in 0..4 {
            if rest.len() < 2 {
                return None;
            }
            let len = u16::from_le_bytes([rest[0], rest[1]]) as usize;
            rest = &rest[2..];
            if rest.len() < len {
                return None;
            }
            parts.push(FixString::from_ascii(rest[..len].to_vec()).ok()?);
            rest = &rest[len..];
        }
        let mut parts = parts.into_iter();
        Some(SessionKey {
            begin_string: parts.next()?,
            sender_comp_id: parts.next()?,
            target_comp_id: parts.next()?,
            session_qualifier: parts.next()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs(s: &str) -> FixString {
        FixString::from_ascii(s.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn round_trips_through_bytes() {
        let key = SessionKey::new(fs("FIX.4.4"), fs("ACCEPTOR"), fs("INITIATOR"));
        let bytes = key.to_bytes();
        assert_eq!(SessionKey::from_bytes(&bytes), Some(key));
    }

    #[test]
    fn reverse_route_swaps_sender_and_target() {
        let key = SessionKey::new(fs("FIX.4.4"), fs("A"), fs("B"));
        let reversed = key.clone().reverse_route();
        assert_eq!(reversed.sender_comp_id().as_bytes(), b"B");
        assert_eq!(reversed.target_comp_id().as_bytes(), b"A");
    }
}
