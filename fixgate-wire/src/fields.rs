use fixgate_core::{FixStr, FixString};

/// FIX tags this crate cares about. Everything else belongs to the
/// application dictionary and is out of scope here.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum FieldTag {
    BeginString = 8,
    BodyLength = 9,
    MsgType = 35,
    SenderCompId = 49,
    TargetCompId = 56,
    MsgSeqNum = 34,
    SendingTime = 52,
    OrigSendingTime = 122,
    PossDupFlag = 43,
    PossResend = 97,
    TestReqId = 112,
    EncryptMethod = 98,
    HeartBtInt = 108,
    ResetSeqNumFlag = 141,
    Username = 553,
    Password = 554,
    BeginSeqNo = 7,
    EndSeqNo = 16,
    NewSeqNo = 36,
    GapFillFlag = 123,
    Text = 58,
    RefSeqNum = 45,
    RefTagId = 371,
    RefMsgType = 372,
    SessionRejectReason = 373,
    CheckSum = 10,
}

/// Message type, tag 35. Administrative types get their own variant so the
/// session can dispatch on them without touching the opaque business body;
/// every other value is forwarded untouched.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MsgType {
    Logon,
    Logout,
    Heartbeat,
    TestRequest,
    ResendRequest,
    Reject,
    SequenceReset,
    Other(FixString),
}

impl MsgType {
    pub fn from_fix_str(s: &FixStr) -> MsgType {
        match s.as_bytes() {
            b"A" => MsgType::Logon,
            b"5" => MsgType::Logout,
            b"0" => MsgType::Heartbeat,
            b"1" => MsgType::TestRequest,
            b"2" => MsgType::ResendRequest,
            b"3" => MsgType::Reject,
            b"4" => MsgType::SequenceReset,
            _ => MsgType::Other(s.to_owned()),
        }
    }

    pub fn as_fix_str(&self) -> &FixStr {
        match self {
            MsgType::Logon => FixStr::from_ascii(b"A").unwrap(),
            MsgType::Logout => FixStr::from_ascii(b"5").unwrap(),
            MsgType::Heartbeat => FixStr::from_ascii(b"0").unwrap(),
            MsgType::TestRequest => FixStr::from_ascii(b"1").unwrap(),
            MsgType::ResendRequest => FixStr::from_ascii(b"2").unwrap(),
            MsgType::Reject => FixStr::from_ascii(b"3").unwrap(),
            MsgType::SequenceReset => FixStr::from_ascii(b"4").unwrap(),
            MsgType::Other(s) => s,
        }
    }

    pub fn is_admin(&self) -> bool {
        !matches!(self, MsgType::Other(_))
    }
}

/// Tag 373, `SessionRejectReason`. Subset actually produced by the session
/// state machine; the application dictionary defines many more values that
/// never originate here.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(i32)]
pub enum SessionRejectReason {
    InvalidTagNumber = 0,
    RequiredTagMissing = 1,
    TagNotDefinedForThisMessageType = 2,
    UndefinedTag = 3,
    TagSpecifiedWithoutAValue = 4,
    ValueIsIncorrect = 5,
    IncorrectDataFormat = 6,
    CompIdProblem = 9,
    SendingTimeAccuracyProblem = 10,
    InvalidMsgType = 11,
    Other = 99,
}

impl SessionRejectReason {
    pub fn text(&self) -> &'static str {
        match self {
            SessionRejectReason::InvalidTagNumber => "Invalid tag number",
            SessionRejectReason::RequiredTagMissing => "Required tag missing",
            SessionRejectReason::TagNotDefinedForThisMessageType => {
                "Tag not defined for this message type"
            }
            SessionRejectReason::UndefinedTag => "Undefined tag",
            SessionRejectReason::TagSpecifiedWithoutAValue => "Tag specified without a value",
            SessionRejectReason::ValueIsIncorrect => "Value is incorrect",
            SessionRejectReason::IncorrectDataFormat => "Incorrect data format for value",
            SessionRejectReason::CompIdProblem => "CompID problem",
            SessionRejectReason::SendingTimeAccuracyProblem => "SendingTime accuracy problem",
            SessionRejectReason::InvalidMsgType => "Invalid MsgType",
            SessionRejectReason::Other => "Other",
        }
    }
}
