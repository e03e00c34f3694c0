//! Wires one [`Session`] to a non-blocking [`Connection`] and a
//! [`GatewayPublication`], and exposes the result as an [`Agent`]. This
//! is the piece §3's "Session ... consumes decoded inbound messages
//! and wall-clock ticks, emits outbound via SessionProxy, publishes
//! accepted inbound to GatewayPublication" describes end to end.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use fixgate_core::{FixString, GatewayError, Instant, UtcTimestamp};
use fixgate_session::{Disposition, MessagesStorage, Session, SessionKey, SessionPhase};
use fixgate_wire::{Body, FixMessage};
use tracing::warn;

use crate::counters::FixCounters;
use crate::engine::Agent;
use crate::errors::ErrorHandler;
use crate::io::Connection;
use crate::streams::GatewayPublication;

const READ_CHUNK: usize = 4096;

/// Verifies the username/password a peer offers on Logon. Actual
/// identity verification is an external collaborator (no user-store
/// schema is part of this design); [`AllowAllCredentials`] is the
/// default until one is wired in.
pub trait CredentialsChecker: Send + Sync {
    fn check(&self, username: Option<&FixString>, password: Option<&FixString>) -> bool;
}

#[derive(Default)]
pub struct AllowAllCredentials;

impl CredentialsChecker for AllowAllCredentials {
    fn check(&self, _username: Option<&FixString>, _password: Option<&FixString>) -> bool {
        true
    }
}

pub struct SessionAgent<S, C> {
    name: String,
    session: Session<S>,
    connection: C,
    decoder: fixgate_wire::FrameDecoder,
    publication: Rc<RefCell<dyn GatewayPublication>>,
    credentials: Arc<dyn CredentialsChecker>,
    counters: Arc<FixCounters>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl<S: MessagesStorage, C: Connection> SessionAgent<S, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        session: Session<S>,
        connection: C,
        publication: Rc<RefCell<dyn GatewayPublication>>,
        credentials: Arc<dyn CredentialsChecker>,
        counters: Arc<FixCounters>,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> SessionAgent<S, C> {
        SessionAgent {
            name,
            session,
            connection,
            decoder: fixgate_wire::FrameDecoder::new(),
            publication,
            credentials,
            counters,
            error_handler,
        }
    }

    fn pump_inbound(&mut self, wall_now: UtcTimestamp) -> usize {
        let mut work = 0;
        let mut buf = [0u8; READ_CHUNK];
        match self.connection.try_read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                self.decoder.push(&buf[..n]);
                work += 1;
            }
            Err(err) => self.error_handler.on_error(&self.name, &GatewayError::Io(err)),
        }

        while let Some(frame) = self.decoder.next_frame() {
            match frame {
                Ok(msg) => self.dispatch(msg, wall_now),
                Err(err) => {
                    warn!(session = %self.name, %err, "dropping malformed frame, resynchronizing");
                    self.counters.record_reject();
                }
            }
            work += 1;
        }
        work
    }

    fn dispatch(&mut self, msg: FixMessage, wall_now: UtcTimestamp) {
        let header = msg.header;
        let disposition = match msg.body {
            Body::Logon(logon) => {
                let key = SessionKey::from_inbound_header(
                    &header.begin_string,
                    &header.sender_comp_id,
                    &header.target_comp_id,
                );
                let credentials_ok = self.credentials.check(logon.username.as_ref(), logon.password.as_ref());
                self.session.on_logon(
                    logon.heart_bt_int.max(0) as u32,
                    header.msg_seq_num,
                    &key,
                    header.sending_time,
                    wall_now,
                    credentials_ok,
                )
            }
            Body::Logout(_) => self.session.on_logout(header.msg_seq_num, header.sending_time, wall_now),
            Body::Heartbeat(hb) => self.session.on_heartbeat(
                header.msg_seq_num,
                hb.test_req_id.as_ref(),
                header.sending_time,
                wall_now,
            ),
            Body::TestRequest(tr) => {
                self.session.on_test_request(tr.test_req_id, header.msg_seq_num, header.sending_time, wall_now)
            }
            Body::ResendRequest(rr) => self.session.on_resend_request(
                rr.begin_seq_no,
                rr.end_seq_no,
                header.msg_seq_num,
                header.sending_time,
                wall_now,
            ),
            Body::Reject(_) => self.session.on_reject(header.msg_seq_num, header.sending_time, wall_now),
            Body::SequenceReset(sr) => self.session.on_sequence_reset(sr.new_seq_no, sr.gap_fill_flag),
            Body::App(bytes) => {
                let disposition = self.session.on_message(
                    header.msg_seq_num,
                    header.sending_time,
                    header.poss_dup_flag,
                    wall_now,
                );
                if disposition == Disposition::Accept {
                    self.counters.record_message_in();
                    self.publication.borrow_mut().offer(self.session.session_id(), bytes);
                }
                disposition
            }
        };

        if disposition == Disposition::GapDetected {
            self.counters.record_gap_detected();
        }
    }

    fn pump_outbound(&mut self) -> usize {
        let outbound = self.session.take_outbound();
        let work = outbound.len();
        for msg in outbound {
            let bytes = fixgate_wire::encode(&msg);
            match self.connection.try_write(&bytes) {
                Ok(_) => self.counters.record_message_out(),
                Err(err) => self.error_handler.on_error(&self.name, &GatewayError::Io(err)),
            }
        }
        work
    }
}

impl<S: MessagesStorage, C: Connection> Agent for SessionAgent<S, C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn do_work(&mut self, now: Instant, wall_now: UtcTimestamp) -> usize {
        let was_active = self.session.is_active();
        let mut work = self.pump_inbound(wall_now);
        work += self.session.poll(now, wall_now);
        work += self.pump_outbound();
        if was_active && self.session.phase() == SessionPhase::Disconnected {
            self.counters.record_disconnect();
        }
        work
    }
}
