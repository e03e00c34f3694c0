use std::{borrow, fmt, mem, ops};

use serde::{Deserialize, Serialize};

/// A FIX tag=value string value: any byte except the SOH separator and the
/// other ASCII control characters. Borrowed form of [`FixString`].
#[derive(Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct FixStr([u8]);

/// Owned FIX string value.
#[derive(Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct FixString(Vec<u8>);

#[derive(Debug)]
pub struct FixStrError {
    idx: usize,
    value: u8,
}

impl fmt::Display for FixStrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unexpected byte {:#04x} at index {}", self.value, self.idx)
    }
}

impl std::error::Error for FixStrError {}

impl FixStr {
    pub fn from_ascii(buf: &[u8]) -> Result<&FixStr, FixStrError> {
        for (idx, &b) in buf.iter().enumerate() {
            if b < 0x20 || b > 0x7f {
                return Err(FixStrError { idx, value: b });
            }
        }
        // SAFETY: just verified every byte is printable ASCII.
        Ok(unsafe { FixStr::from_ascii_unchecked(buf) })
    }

    /// # Safety
    /// `buf` must contain only printable ASCII (no SOH, no control bytes).
    pub unsafe fn from_ascii_unchecked(buf: &[u8]) -> &FixStr {
        // `FixStr` is `#[repr(transparent)]` over `[u8]`.
        mem::transmute(buf)
    }

    pub fn as_utf8(&self) -> &str {
        // SAFETY: constructors only ever admit ASCII bytes.
        unsafe { std::str::from_utf8_unchecked(&self.0) }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for FixStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_utf8().fmt(f)
    }
}

impl fmt::Debug for FixStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixStr({:?})", self.as_utf8())
    }
}

impl ToOwned for FixStr {
    type Owned = FixString;

    fn to_owned(&self) -> FixString {
        // SAFETY: `self` is already verified ASCII.
        unsafe { FixString::from_ascii_unchecked(self.as_bytes().to_owned()) }
    }
}

impl AsRef<FixStr> for FixString {
    fn as_ref(&self) -> &FixStr {
        self
    }
}

impl borrow::Borrow<FixStr> for FixString {
    fn borrow(&self) -> &FixStr {
        self
    }
}

impl ops::Deref for FixString {
    type Target = FixStr;

    fn deref(&self) -> &FixStr {
        // SAFETY: every `FixString` constructor validates ASCII.
        unsafe { FixStr::from_ascii_unchecked(&self.0) }
    }
}

impl FixString {
    pub const fn new() -> FixString {
        FixString(Vec::new())
    }

    pub fn from_ascii(buf: Vec<u8>) -> Result<FixString, FixStrError> {
        FixStr::from_ascii(&buf)?;
        Ok(FixString(buf))
    }

    /// # Safety
    /// `buf` must contain only printable ASCII.
    pub unsafe fn from_ascii_unchecked(buf: Vec<u8>) -> FixString {
        FixString(buf)
    }

    /// Lossily coerce arbitrary bytes into a `FixString`, replacing any
    /// byte outside the printable-ASCII range with `?`. Used to embed
    /// free-form diagnostic text (e.g. a Logout reason) that originates
    /// from error messages rather than the wire.
    pub fn from_ascii_lossy(buf: Vec<u8>) -> FixString {
        let sanitized = buf
            .into_iter()
            .map(|b| if (0x20..=0x7f).contains(&b) { b } else { b'?' })
            .collect();
        FixString(sanitized)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<&FixStr> for FixString {
    fn from(s: &FixStr) -> FixString {
        s.to_owned()
    }
}

impl fmt::Display for FixString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

impl fmt::Debug for FixString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_soh() {
        assert!(FixStr::from_ascii(b"abc\x01def").is_err());
    }

    #[test]
    fn accepts_printable_ascii() {
        assert!(FixStr::from_ascii(b"BuySide").is_ok());
    }

    #[test]
    fn lossy_replaces_control_bytes() {
        let s = FixString::from_ascii_lossy(b"bad\x01text".to_vec());
        assert_eq!(s.as_utf8(), "bad?text");
    }
}
