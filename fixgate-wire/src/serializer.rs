use fixgate_core::{FixStr, SeqNum, UtcTimestamp};

/// Appends `tag=value<SOH>` triples to an output buffer. Kept separate from
/// [`crate::codec::encode`] so the body-length/checksum wrapping logic in
/// the codec never has to know the representation of an individual field.
pub struct Serializer {
    output: Vec<u8>,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer {
    pub fn new() -> Serializer {
        Serializer { output: Vec::new() }
    }

    pub fn take(self) -> Vec<u8> {
        self.output
    }

    fn field_prefix(&mut self, tag: u16) {
        let mut buffer = itoa::Buffer::new();
        self.output.extend_from_slice(buffer.format(tag).as_bytes());
        self.output.push(b'=');
    }

    pub fn field_str(&mut self, tag: u16, value: &FixStr) {
        self.field_prefix(tag);
        self.output.extend_from_slice(value.as_bytes());
        self.output.push(b'\x01');
    }

    pub fn field_int(&mut self, tag: u16, value: i64) {
        self.field_prefix(tag);
        let mut buffer = itoa::Buffer::new();
        self.output.extend_from_slice(buffer.format(value).as_bytes());
        self.output.push(b'\x01');
    }

    pub fn field_seq_num(&mut self, tag: u16, value: SeqNum) {
        self.field_prefix(tag);
        let mut buffer = itoa::Buffer::new();
        self.output.extend_from_slice(buffer.format(value).as_bytes());
        self.output.push(b'\x01');
    }

    pub fn field_bool(&mut self, tag: u16, value: bool) {
        self.field_prefix(tag);
        self.output.push(if value { b'Y' } else { b'N' });
        self.output.push(b'\x01');
    }

    /// `YYYYMMDD-HH:MM:SS.sss` as required for `SendingTime<52>` and
    /// `OrigSendingTime<122>`.
    pub fn field_timestamp(&mut self, tag: u16, value: UtcTimestamp) {
        self.field_prefix(tag);
        self.output
            .extend_from_slice(value.format("%Y%m%d-%H:%M:%S%.3f").to_string().as_bytes());
        self.output.push(b'\x01');
    }

    pub fn raw(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }
}
