//! Pure encoder of outbound FIX administrative messages (§2,
//! "SessionProxy ... Pure function of inputs"). Every method here builds
//! a complete [`FixMessage`] from its arguments and the session's static
//! identity; none of them touch a clock, a socket, or `self` mutably.
//! The caller (the session state machine) is the only place sequence
//! numbers and timestamps get decided.

use fixgate_core::{FixString, SeqNum, UtcTimestamp};
use fixgate_wire::{
    Body, FixMessage, Header, Heartbeat, Logon, Logout, MsgType, Reject, ResendRequest,
    SequenceReset, SessionRejectReason, TestRequest, Trailer,
};

#[derive(Clone, Debug)]
pub struct SessionProxy {
    begin_string: FixString,
    sender_comp_id: FixString,
    target_comp_id: FixString,
}

impl SessionProxy {
    pub fn new(begin_string: FixString, sender_comp_id: FixString, target_comp_id: FixString) -> SessionProxy {
        SessionProxy {
            begin_string,
            sender_comp_id,
            target_comp_id,
        }
    }

    fn header(&self, msg_type: MsgType, msg_seq_num: SeqNum, sending_time: UtcTimestamp) -> Header {
        Header {
            begin_string: self.begin_string.clone(),
            msg_type,
            sender_comp_id: self.sender_comp_id.clone(),
            target_comp_id: self.target_comp_id.clone(),
            msg_seq_num,
            sending_time,
            orig_sending_time: None,
            poss_dup_flag: false,
            poss_resend: false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn logon(
        &self,
        heart_bt_int: u32,
        reset_seq_num_flag: bool,
        username: Option<FixString>,
        password: Option<FixString>,
        msg_seq_num: SeqNum,
        sending_time: UtcTimestamp,
    ) -> FixMessage {
        FixMessage {
            header: self.header(MsgType::Logon, msg_seq_num, sending_time),
            body: Body::Logon(Logon {
                encrypt_method: 0,
                heart_bt_int: heart_bt_int as i32,
                reset_seq_num_flag: Some(reset_seq_num_flag),
                username,
                password,
            }),
            trailer: Trailer::default(),
        }
    }

    pub fn logout(
        &self,
        text: Option<FixString>,
        msg_seq_num: SeqNum,
        sending_time: UtcTimestamp,
    ) -> FixMessage {
        FixMessage {
            header: self.header(MsgType::Logout, msg_seq_num, sending_time),
            body: Body::Logout(Logout { text }),
            trailer: Trailer::default(),
        }
    }

    pub fn heartbeat(
        &self,
        test_req_id: Option<FixString>,
        msg_seq_num: SeqNum,
        sending_time: UtcTimestamp,
    ) -> FixMessage {
        FixMessage {
            header: self.header(MsgType::Heartbeat, msg_seq_num, sending_time),
            body: Body::Heartbeat(Heartbeat { test_req_id }),
            trailer: Trailer::default(),
        }
    }

    pub fn test_request(
        &self,
        test_req_id: FixString,
        msg_seq_num: SeqNum,
        sending_time: UtcTimestamp,
    ) -> FixMessage {
        FixMessage {
            header: self.header(MsgType::TestRequest, msg_seq_num, sending_time),
            body: Body::TestRequest(TestRequest { test_req_id }),
            trailer: Trailer::default(),
        }
    }

    pub fn resend_request(
        &self,
        begin_seq_no: SeqNum,
        end_seq_no: SeqNum,
        msg_seq_num: SeqNum,
        sending_time: UtcTimestamp,
    ) -> FixMessage {
        FixMessage {
            header: self.header(MsgType::ResendRequest, msg_seq_num, sending_time),
            body: Body::ResendRequest(ResendRequest { begin_seq_no, end_seq_no }),
            trailer: Trailer::default(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn reject(
        &self,
        ref_seq_num: SeqNum,
        ref_tag_id: Option<u16>,
        ref_msg_type: Option<MsgType>,
        reason: SessionRejectReason,
        msg_seq_num: SeqNum,
        sending_time: UtcTimestamp,
    ) -> FixMessage {
        FixMessage {
            header: self.header(MsgType::Reject, msg_seq_num, sending_time),
            body: Body::Reject(Reject {
                ref_seq_num,
                ref_tag_id,
                ref_msg_type,
                session_reject_reason: Some(reason),
                text: Some(FixString::from_ascii_lossy(reason.text().as_bytes().to_vec())),
            }),
            trailer: Trailer::default(),
        }
    }

    pub fn sequence_reset(
        &self,
        new_seq_no: SeqNum,
        gap_fill_flag: bool,
        msg_seq_num: SeqNum,
        sending_time: UtcTimestamp,
    ) -> FixMessage {
        FixMessage {
            header: self.header(MsgType::SequenceReset, msg_seq_num, sending_time),
            body: Body::SequenceReset(SequenceReset { gap_fill_flag, new_seq_no }),
            trailer: Trailer::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fs(s: &str) -> FixString {
        FixString::from_ascii(s.as_bytes().to_vec()).unwrap()
    }

    fn proxy() -> SessionProxy {
        SessionProxy::new(fs("FIX.4.4"), fs("ACCEPTOR"), fs("INITIATOR"))
    }

    #[test]
    fn logon_carries_requested_heartbeat() {
        let now = UtcTimestamp::from_timestamp(1_700_000_000, 0).unwrap();
        let msg = proxy().logon(30, false, None, None, 1, now);
        match msg.body {
            Body::Logon(logon) => assert_eq!(logon.heart_bt_int, 30),
            _ => panic!("expected Logon"),
        }
        assert_eq!(msg.header.msg_seq_num, 1);
    }

    #[test]
    fn resend_request_uses_zero_as_infinity() {
        let now = UtcTimestamp::from_timestamp(1_700_000_000, 0).unwrap();
        let msg = proxy().resend_request(3, 0, 5, now);
        match msg.body {
            Body::ResendRequest(rr) => {
                assert_eq!(rr.begin_seq_no, 3);
                assert_eq!(rr.end_seq_no, 0);
            }
            _ => panic!("expected ResendRequest"),
        }
    }
}
