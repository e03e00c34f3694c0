use std::str;

use fixgate_core::{FixStr, FixString, SeqNum, UtcTimestamp};
use thiserror::Error;

use crate::{
    fields::{FieldTag, MsgType, SessionRejectReason},
    message::{
        Body, FixMessage, Header, Heartbeat, Logon, Logout, Reject, ResendRequest,
        SequenceReset, TestRequest, Trailer,
    },
    parser::{self, raw_message},
    serializer::Serializer,
};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("checksum mismatch: computed {computed:03} but frame carried {carried:03}")]
    BadChecksum { computed: u8, carried: u8 },
    #[error("malformed tag=value field: {0}")]
    MalformedField(String),
    #[error("required tag missing: {0:?}")]
    RequiredTagMissing(FieldTag),
    #[error("tag {tag} had a value not valid for its type")]
    BadValue { tag: u16 },
}

/// The sum of all bytes up to (but not including) `CheckSum<10>`, modulo
/// 256 — §6's wire-format checksum rule.
pub fn checksum(begin_string_and_body: &[u8]) -> u8 {
    begin_string_and_body
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b))
}

struct FieldIter<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for FieldIter<'a> {
    type Item = Result<(u16, &'a [u8]), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let soh = memchr::memchr(b'\x01', self.rest)?;
        let field = &self.rest[..soh];
        self.rest = &self.rest[soh + 1..];
        let eq = match memchr::memchr(b'=', field) {
            Some(eq) => eq,
            None => {
                return Some(Err(DecodeError::MalformedField(
                    String::from_utf8_lossy(field).into_owned(),
                )))
            }
        };
        let tag: u16 = match str::from_utf8(&field[..eq]).ok().and_then(|s| s.parse().ok()) {
            Some(tag) => tag,
            None => {
                return Some(Err(DecodeError::MalformedField(
                    String::from_utf8_lossy(field).into_owned(),
                )))
            }
        };
        Some(Ok((tag, &field[eq + 1..])))
    }
}

fn parse_timestamp(bytes: &[u8]) -> Result<UtcTimestamp, DecodeError> {
    let s = str::from_utf8(bytes).map_err(|_| DecodeError::BadValue {
        tag: FieldTag::SendingTime as u16,
    })?;
    let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y%m%d-%H:%M:%S%.f")
        .map_err(|_| DecodeError::BadValue { tag: FieldTag::SendingTime as u16 })?;
    Ok(UtcTimestamp::from_naive_utc_and_offset(naive, chrono::Utc))
}

fn parse_bool(bytes: &[u8], tag: u16) -> Result<bool, DecodeError> {
    match bytes {
        b"Y" => Ok(true),
        b"N" => Ok(false),
        _ => Err(DecodeError::BadValue { tag }),
    }
}

fn parse_seq_num(bytes: &[u8], tag: u16) -> Result<SeqNum, DecodeError> {
    str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(DecodeError::BadValue { tag })
}

fn fix_string(bytes: &[u8]) -> FixString {
    FixString::from_ascii_lossy(bytes.to_vec())
}

/// Decode one complete, checksum-verified frame. The caller is responsible
/// for framing (see [`crate::parser::raw_message`]); this never touches
/// the fields of an `App` body beyond what the common header needs.
pub fn decode(bytes: &[u8]) -> Result<FixMessage, DecodeError> {
    let (leftover, raw) =
        raw_message(bytes).map_err(|e| DecodeError::MalformedField(e.to_string()))?;

    let consumed = bytes.len() - leftover.len();
    let checksum_span = 4 + raw.checksum_field.len(); // b"10=" + digits + trailing SOH
    let computed = checksum(&bytes[..consumed - checksum_span]);
    let carried: u8 = str::from_utf8(raw.checksum_field)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(DecodeError::BadValue { tag: FieldTag::CheckSum as u16 })?;
    if computed != carried {
        return Err(DecodeError::BadChecksum { computed, carried });
    }

    let mut msg_type: Option<MsgType> = None;
    let mut sender_comp_id: Option<FixString> = None;
    let mut target_comp_id: Option<FixString> = None;
    let mut msg_seq_num: Option<SeqNum> = None;
    let mut sending_time: Option<UtcTimestamp> = None;
    let mut orig_sending_time: Option<UtcTimestamp> = None;
    let mut poss_dup_flag = false;
    let mut poss_resend = false;

    let mut encrypt_method = 0i32;
    let mut heart_bt_int = 0i32;
    let mut reset_seq_num_flag: Option<bool> = None;
    let mut username: Option<FixString> = None;
    let mut password: Option<FixString> = None;
    let mut text: Option<FixString> = None;
    let mut test_req_id: Option<FixString> = None;
    let mut begin_seq_no: Option<SeqNum> = None;
    let mut end_seq_no: Option<SeqNum> = None;
    let mut new_seq_no: Option<SeqNum> = None;
    let mut gap_fill_flag = false;
    let mut ref_seq_num: Option<SeqNum> = None;
    let mut ref_tag_id: Option<u16> = None;
    let mut ref_msg_type: Option<MsgType> = None;
    let mut session_reject_reason: Option<SessionRejectReason> = None;

    for field in (FieldIter { rest: raw.body }) {
        let (tag, value) = field?;
        match tag {
            t if t == FieldTag::MsgType as u16 => {
                let value = FixStr::from_ascii(value)
                    .map_err(|_| DecodeError::BadValue { tag })?;
                msg_type = Some(MsgType::from_fix_str(value));
            }
            t if t == FieldTag::SenderCompId as u16 => sender_comp_id = Some(fix_string(value)),
            t if t == FieldTag::TargetCompId as u16 => target_comp_id = Some(fix_string(value)),
            t if t == FieldTag::MsgSeqNum as u16 => msg_seq_num = Some(parse_seq_num(value, tag)?),
            t if t == FieldTag::SendingTime as u16 => sending_time = Some(parse_timestamp(value)?),
            t if t == FieldTag::OrigSendingTime as u16 => {
                orig_sending_time = Some(parse_timestamp(value)?)
            }
            t if t == FieldTag::PossDupFlag as u16 => poss_dup_flag = parse_bool(value, tag)?,
            t if t == FieldTag::PossResend as u16 => poss_resend = parse_bool(value, tag)?,
            t if t == FieldTag::EncryptMethod as u16 => {
                encrypt_method = str::from_utf8(value)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or(DecodeError::BadValue { tag })?
            }
            t if t == FieldTag::HeartBtInt as u16 => {
                heart_bt_int = str::from_utf8(value)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or(DecodeError::BadValue { tag })?
            }
            t if t == FieldTag::ResetSeqNumFlag as u16 => {
                reset_seq_num_flag = Some(parse_bool(value, tag)?)
            }
            t if t == FieldTag::Username as u16 => username = Some(fix_string(value)),
            t if t == FieldTag::Password as u16 => password = Some(fix_string(value)),
            t if t == FieldTag::Text as u16 => text = Some(fix_string(value)),
            t if t == FieldTag::TestReqId as u16 => test_req_id = Some(fix_string(value)),
            t if t == FieldTag::BeginSeqNo as u16 => begin_seq_no = Some(parse_seq_num(value, tag)?),
            t if t == FieldTag::EndSeqNo as u16 => end_seq_no = Some(parse_seq_num(value, tag)?),
            t if t == FieldTag::NewSeqNo as u16 => new_seq_no = Some(parse_seq_num(value, tag)?),
            t if t == FieldTag::GapFillFlag as u16 => gap_fill_flag = parse_bool(value, tag)?,
            t if t == FieldTag::RefSeqNum as u16 => ref_seq_num = Some(parse_seq_num(value, tag)?),
            t if t == FieldTag::RefTagId as u16 => {
                ref_tag_id = Some(
                    str::from_utf8(value)
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .ok_or(DecodeError::BadValue { tag })?,
                )
            }
            t if t == FieldTag::RefMsgType as u16 => {
                let value = FixStr::from_ascii(value).map_err(|_| DecodeError::BadValue { tag })?;
                ref_msg_type = Some(MsgType::from_fix_str(value));
            }
            t if t == FieldTag::SessionRejectReason as u16 => {
                let code: i32 = str::from_utf8(value)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or(DecodeError::BadValue { tag })?;
                session_reject_reason = Some(match code {
                    0 => SessionRejectReason::InvalidTagNumber,
                    1 => SessionRejectReason::RequiredTagMissing,
                    2 => SessionRejectReason::TagNotDefinedForThisMessageType,
                    3 => SessionRejectReason::UndefinedTag,
                    4 => SessionRejectReason::TagSpecifiedWithoutAValue,
                    5 => SessionRejectReason::ValueIsIncorrect,
                    6 => SessionRejectReason::IncorrectDataFormat,
                    9 => SessionRejectReason::CompIdProblem,
                    10 => SessionRejectReason::SendingTimeAccuracyProblem,
                    11 => SessionRejectReason::InvalidMsgType,
                    _ => SessionRejectReason::Other,
                });
            }
            _ => {}
        }
    }

    let msg_type = msg_type.ok_or(DecodeError::RequiredTagMissing(FieldTag::MsgType))?;
    let header = Header {
        begin_string: raw.begin_string.to_owned(),
        msg_type: msg_type.clone(),
        sender_comp_id: sender_comp_id.ok_or(DecodeError::RequiredTagMissing(FieldTag::SenderCompId))?,
        target_comp_id: target_comp_id.ok_or(DecodeError::RequiredTagMissing(FieldTag::TargetCompId))?,
        msg_seq_num: msg_seq_num.ok_or(DecodeError::RequiredTagMissing(FieldTag::MsgSeqNum))?,
        sending_time: sending_time.ok_or(DecodeError::RequiredTagMissing(FieldTag::SendingTime))?,
        orig_sending_time,
        poss_dup_flag,
        poss_resend,
    };

    let body = match msg_type {
        MsgType::Logon => Body::Logon(Logon {
            encrypt_method,
            heart_bt_int,
            reset_seq_num_flag,
            username,
            password,
        }),
        MsgType::Logout => Body::Logout(Logout { text }),
        MsgType::Heartbeat => Body::Heartbeat(Heartbeat { test_req_id }),
        MsgType::TestRequest => Body::TestRequest(TestRequest {
            test_req_id: test_req_id.ok_or(DecodeError::RequiredTagMissing(FieldTag::TestReqId))?,
        }),
        MsgType::ResendRequest => Body::ResendRequest(ResendRequest {
            begin_seq_no: begin_seq_no.ok_or(DecodeError::RequiredTagMissing(FieldTag::BeginSeqNo))?,
            end_seq_no: end_seq_no.ok_or(DecodeError::RequiredTagMissing(FieldTag::EndSeqNo))?,
        }),
        MsgType::Reject => Body::Reject(Reject {
            ref_seq_num: ref_seq_num.ok_or(DecodeError::RequiredTagMissing(FieldTag::RefSeqNum))?,
            ref_tag_id,
            ref_msg_type,
            session_reject_reason,
            text,
        }),
        MsgType::SequenceReset => Body::SequenceReset(SequenceReset {
            gap_fill_flag,
            new_seq_no: new_seq_no.ok_or(DecodeError::RequiredTagMissing(FieldTag::NewSeqNo))?,
        }),
        MsgType::Other(_) => Body::App(raw.body.to_vec()),
    };

    Ok(FixMessage {
        header,
        body,
        trailer: Trailer {
            check_sum: FixString::from_ascii_lossy(raw.checksum_field.to_vec()),
        },
    })
}

/// Serialize a complete message, filling in `BodyLength<9>` and
/// `CheckSum<10>` from the encoded content — the caller never computes
/// either by hand.
pub fn encode(msg: &FixMessage) -> Vec<u8> {
    let mut body_buf = Serializer::new();
    body_buf.field_str(FieldTag::MsgType as u16, msg.header.msg_type.as_fix_str());
    body_buf.field_str(FieldTag::SenderCompId as u16, &msg.header.sender_comp_id);
    body_buf.field_str(FieldTag::TargetCompId as u16, &msg.header.target_comp_id);
    body_buf.field_seq_num(FieldTag::MsgSeqNum as u16, msg.header.msg_seq_num);
    body_buf.field_timestamp(FieldTag::SendingTime as u16, msg.header.sending_time);
    if msg.header.poss_dup_flag {
        body_buf.field_bool(FieldTag::PossDupFlag as u16, true);
    }
    if msg.header.poss_resend {
        body_buf.field_bool(FieldTag::PossResend as u16, true);
    }
    if let Some(orig) = msg.header.orig_sending_time {
        body_buf.field_timestamp(FieldTag::OrigSendingTime as u16, orig);
    }

    match &msg.body {
        Body::Logon(logon) => {
            body_buf.field_int(FieldTag::EncryptMethod as u16, logon.encrypt_method as i64);
            body_buf.field_int(FieldTag::HeartBtInt as u16, logon.heart_bt_int as i64);
            if let Some(reset) = logon.reset_seq_num_flag {
                body_buf.field_bool(FieldTag::ResetSeqNumFlag as u16, reset);
            }
            if let Some(ref u) = logon.username {
                body_buf.field_str(FieldTag::Username as u16, u);
            }
            if let Some(ref p) = logon.password {
                body_buf.field_str(FieldTag::Password as u16, p);
            }
        }
        Body::Logout(logout) => {
            if let Some(ref text) = logout.text {
                body_buf.field_str(FieldTag::Text as u16, text);
            }
        }
        Body::Heartbeat(hb) => {
            if let Some(ref id) = hb.test_req_id {
                body_buf.field_str(FieldTag::TestReqId as u16, id);
            }
        }
        Body::TestRequest(tr) => {
            body_buf.field_str(FieldTag::TestReqId as u16, &tr.test_req_id);
        }
        Body::ResendRequest(rr) => {
            body_buf.field_seq_num(FieldTag::BeginSeqNo as u16, rr.begin_seq_no);
            body_buf.field_seq_num(FieldTag::EndSeqNo as u16, rr.end_seq_no);
        }
        Body::Reject(rj) => {
            body_buf.field_seq_num(FieldTag::RefSeqNum as u16, rj.ref_seq_num);
            if let Some(tag) = rj.ref_tag_id {
                body_buf.field_int(FieldTag::RefTagId as u16, tag as i64);
            }
            if let Some(ref mt) = rj.ref_msg_type {
                body_buf.field_str(FieldTag::RefMsgType as u16, mt.as_fix_str());
            }
            if let Some(reason) = rj.session_reject_reason {
                body_buf.field_int(FieldTag::SessionRejectReason as u16, reason as i64);
            }
            if let Some(ref text) = rj.text {
                body_buf.field_str(FieldTag::Text as u16, text);
            }
        }
        Body::SequenceReset(sr) => {
            body_buf.field_bool(FieldTag::GapFillFlag as u16, sr.gap_fill_flag);
            body_buf.field_seq_num(FieldTag::NewSeqNo as u16, sr.new_seq_no);
        }
        Body::App(raw) => body_buf.raw(raw),
    }

    let body_bytes = body_buf.take();

    let mut out = Vec::with_capacity(body_bytes.len() + 32);
    out.extend_from_slice(b"8=");
    out.extend_from_slice(msg.header.begin_string.as_bytes());
    out.push(b'\x01');
    out.extend_from_slice(b"9=");
    out.extend_from_slice(body_bytes.len().to_string().as_bytes());
    out.push(b'\x01');
    out.extend_from_slice(&body_bytes);

    let sum = checksum(&out);
    out.extend_from_slice(b"10=");
    out.extend_from_slice(format!("{:03}", sum).as_bytes());
    out.push(b'\x01');
    out
}

/// Accumulates bytes from a possibly-fragmented transport and yields one
/// decode attempt per complete frame. Mirrors the teacher's `FixDecoder`,
/// minus the `tokio_util::codec::Decoder` plumbing: this crate has no
/// opinion about the transport, only about frame boundaries (§5 forbids
/// suspension inside an agent's `do_work`, so decoding must be a plain
/// synchronous call).
#[derive(Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> FrameDecoder {
        FrameDecoder { buf: Vec::new() }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pull the next decoded frame, if a complete one is buffered.
    /// Garbled frames are skipped byte-by-byte until the next plausible
    /// `8=` boundary, mirroring `drop_broken_bytes` in the teacher codec.
    pub fn next_frame(&mut self) -> Option<Result<FixMessage, DecodeError>> {
        if self.buf.is_empty() {
            return None;
        }
        match raw_message(&self.buf) {
            Ok((leftover, _)) => {
                let consumed = self.buf.len() - leftover.len();
                let frame = self.buf[..consumed].to_vec();
                self.buf.drain(..consumed);
                Some(decode(&frame))
            }
            Err(parser::Err::Incomplete(_)) => None,
            Err(_) => {
                self.drop_broken_bytes();
                Some(Err(DecodeError::MalformedField(
                    "frame did not start with a valid BeginString field".to_owned(),
                )))
            }
        }
    }

    fn drop_broken_bytes(&mut self) {
        if let Some(pos) = self.buf.windows(2).skip(1).position(|w| w == b"8=") {
            self.buf.drain(..pos + 1);
        } else {
            self.buf.clear();
        }
    }
}
