//! Tag=value wire format for FIX session-level administrative messages:
//! frame splitting, checksum validation and the handful of message types
//! the session state machine acts on directly. Application-level content
//! is treated as opaque bytes — the dictionary that gives it meaning lives
//! outside this crate.

pub mod codec;
pub mod fields;
pub mod message;
pub mod parser;
pub mod serializer;

pub use codec::{checksum, decode, encode, DecodeError, FrameDecoder};
pub use fields::{FieldTag, MsgType, SessionRejectReason};
pub use message::{
    Body, FixMessage, Header, Heartbeat, Logon, Logout, Reject, ResendRequest, SequenceReset,
    TestRequest, Trailer,
};
pub use parser::{raw_message, RawMessage};
pub use serializer::Serializer;

#[cfg(test)]
mod tests {
    use super::*;
    use fixgate_core::{FixString, UtcTimestamp};

    fn sample_header(msg_type: MsgType, seq: u32) -> Header {
        Header {
            begin_string: FixString::from_ascii(b"FIX.4.4".to_vec()).unwrap(),
            msg_type,
            sender_comp_id: FixString::from_ascii(b"ACCEPTOR".to_vec()).unwrap(),
            target_comp_id: FixString::from_ascii(b"INITIATOR".to_vec()).unwrap(),
            msg_seq_num: seq,
            sending_time: UtcTimestamp::from_timestamp(1_700_000_000, 0).unwrap(),
            orig_sending_time: None,
            poss_dup_flag: false,
            poss_resend: false,
        }
    }

    #[test]
    fn logon_round_trips() {
        let msg = FixMessage {
            header: sample_header(MsgType::Logon, 1),
            body: Body::Logon(Logon {
                encrypt_method: 0,
                heart_bt_int: 30,
                reset_seq_num_flag: Some(true),
                username: None,
                password: None,
            }),
            trailer: Trailer::default(),
        };
        let bytes = encode(&msg);
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(decoded.header.msg_seq_num, 1);
        match decoded.body {
            Body::Logon(logon) => {
                assert_eq!(logon.heart_bt_int, 30);
                assert_eq!(logon.reset_seq_num_flag, Some(true));
            }
            other => panic!("expected Logon, got {other:?}"),
        }
    }

    #[test]
    fn heartbeat_round_trips_through_frame_decoder() {
        let msg = FixMessage {
            header: sample_header(MsgType::Heartbeat, 42),
            body: Body::Heartbeat(Heartbeat { test_req_id: None }),
            trailer: Trailer::default(),
        };
        let bytes = encode(&msg);

        let mut decoder = FrameDecoder::new();
        decoder.push(&bytes[..bytes.len() / 2]);
        assert!(decoder.next_frame().is_none());
        decoder.push(&bytes[bytes.len() / 2..]);
        let decoded = decoder.next_frame().expect("frame ready").expect("decode");
        assert_eq!(decoded.header.msg_seq_num, 42);
        assert!(matches!(decoded.body, Body::Heartbeat(_)));
    }

    #[test]
    fn tampered_checksum_is_rejected() {
        let msg = FixMessage {
            header: sample_header(MsgType::TestRequest, 7),
            body: Body::TestRequest(TestRequest {
                test_req_id: FixString::from_ascii(b"TR1".to_vec()).unwrap(),
            }),
            trailer: Trailer::default(),
        };
        let mut bytes = encode(&msg);
        let last_digit = bytes.len() - 2;
        bytes[last_digit] = if bytes[last_digit] == b'9' { b'0' } else { b'9' };
        assert!(matches!(decode(&bytes), Err(DecodeError::BadChecksum { .. })));
    }

    #[test]
    fn unknown_msg_type_is_forwarded_as_app_body() {
        let msg = FixMessage {
            header: sample_header(MsgType::Other(FixString::from_ascii(b"D".to_vec()).unwrap()), 9),
            body: Body::App(b"11=ORDER1\x0154=1\x01".to_vec()),
            trailer: Trailer::default(),
        };
        let bytes = encode(&msg);
        let decoded = decode(&bytes).expect("decode");
        assert!(matches!(decoded.body, Body::App(_)));
    }
}
