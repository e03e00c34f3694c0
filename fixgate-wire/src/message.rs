use fixgate_core::{FixString, SeqNum, UtcTimestamp};

use crate::fields::{MsgType, SessionRejectReason};

#[derive(Clone, Debug)]
pub struct Header {
    pub begin_string: FixString,
    pub msg_type: MsgType,
    pub sender_comp_id: FixString,
    pub target_comp_id: FixString,
    pub msg_seq_num: SeqNum,
    pub sending_time: UtcTimestamp,
    pub orig_sending_time: Option<UtcTimestamp>,
    pub poss_dup_flag: bool,
    pub poss_resend: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Trailer {
    pub check_sum: FixString,
}

#[derive(Clone, Debug)]
pub struct Logon {
    pub encrypt_method: i32,
    pub heart_bt_int: i32,
    pub reset_seq_num_flag: Option<bool>,
    pub username: Option<FixString>,
    pub password: Option<FixString>,
}

#[derive(Clone, Debug)]
pub struct Logout {
    pub text: Option<FixString>,
}

#[derive(Clone, Debug)]
pub struct Heartbeat {
    pub test_req_id: Option<FixString>,
}

#[derive(Clone, Debug)]
pub struct TestRequest {
    pub test_req_id: FixString,
}

#[derive(Clone, Debug)]
pub struct ResendRequest {
    pub begin_seq_no: SeqNum,
    pub end_seq_no: SeqNum,
}

#[derive(Clone, Debug)]
pub struct Reject {
    pub ref_seq_num: SeqNum,
    pub ref_tag_id: Option<u16>,
    pub ref_msg_type: Option<MsgType>,
    pub session_reject_reason: Option<SessionRejectReason>,
    pub text: Option<FixString>,
}

#[derive(Clone, Debug)]
pub struct SequenceReset {
    pub gap_fill_flag: bool,
    pub new_seq_no: SeqNum,
}

/// Administrative message bodies the session layer acts on directly.
/// Business (application-level) content is never parsed here: the
/// dictionary that would give it meaning is an external collaborator
/// (§1). It travels as [`Body::App`], carrying only the bytes between
/// the header and the trailer.
#[derive(Clone, Debug)]
pub enum Body {
    Logon(Logon),
    Logout(Logout),
    Heartbeat(Heartbeat),
    TestRequest(TestRequest),
    ResendRequest(ResendRequest),
    Reject(Reject),
    SequenceReset(SequenceReset),
    App(Vec<u8>),
}

#[derive(Clone, Debug)]
pub struct FixMessage {
    pub header: Header,
    pub body: Body,
    pub trailer: Trailer,
}

impl FixMessage {
    pub fn msg_type(&self) -> &MsgType {
        &self.header.msg_type
    }
}
