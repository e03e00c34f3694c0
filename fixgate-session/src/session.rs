//! The FIX session state machine (§4.1). A `Session` consumes decoded
//! inbound messages and wall-clock ticks and produces outbound
//! administrative messages through its [`SessionProxy`]; it never
//! touches a socket directly, that is the host loop's job; no method
//! here ever blocks or awaits anything, in keeping with the cooperative
//! agent model (§5).

use fixgate_core::{FixString, Instant, SeqNum, UtcTimestamp};
use fixgate_wire::FixMessage;
use tracing::{instrument, warn};

use crate::{
    messages_storage::MessagesStorage,
    proxy::SessionProxy,
    session_id::SessionKey,
    session_state::State,
    settings::SessionSettings,
};

/// Which side opened the transport connection. Both roles share the
/// sequence-number/heartbeat machinery; only the `CONNECTED` entry
/// transition differs (§4.1, "Initiator-specific" / "Acceptor-specific").
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Initiator,
    Acceptor,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionPhase {
    Connected,
    SentLogon,
    Active,
    AwaitingResend,
    AwaitingLogout,
    Disconnected,
    Disabled,
}

/// Outcome of feeding one inbound message's sequence number through the
/// discipline in §4.1.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Disposition {
    Accept,
    Duplicate,
    GapDetected,
    Reject,
    Disconnect,
}

#[derive(Clone, Copy, Debug)]
pub enum DisconnectReason {
    LocalRequestedLogout,
    RemoteRequestedLogout,
    UserForcedDisconnect,
    SequenceResetViolation,
    SendingTimeOutOfWindow,
    AuthenticationFailure,
    LogonTimeout,
    LogoutTimeout,
    TestRequestTimeout,
}

const RESEND_UNTIL_INFINITY: SeqNum = 0;

pub struct Session<S> {
    role: Role,
    key: SessionKey,
    id: fixgate_core::SessionId,
    proxy: SessionProxy,
    settings: SessionSettings,
    phase: SessionPhase,
    state: State<S>,
    outbox: Vec<FixMessage>,
    connected_at: Instant,
    logout_deadline: Option<Instant>,
    test_request_seq: u32,
}

impl<S: MessagesStorage> Session<S> {
    pub fn new(
        role: Role,
        key: SessionKey,
        id: fixgate_core::SessionId,
        settings: SessionSettings,
        storage: S,
    ) -> Session<S> {
        let begin_string = key.begin_string().to_owned();
        let sender_comp_id = key.target_comp_id().to_owned(); // we send as the local side
        let target_comp_id = key.sender_comp_id().to_owned();
        Session {
            proxy: SessionProxy::new(begin_string, sender_comp_id, target_comp_id),
            state: State::new(role == Role::Initiator, storage),
            role,
            key,
            id,
            settings,
            phase: SessionPhase::Connected,
            outbox: Vec::new(),
            connected_at: Instant::now(),
            logout_deadline: None,
            test_request_seq: 0,
        }
    }

    pub fn session_id(&self) -> fixgate_core::SessionId {
        self.id
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, SessionPhase::Active | SessionPhase::AwaitingResend)
    }

    /// Drains messages queued for the transport since the last call.
    /// The host loop is expected to call this after every `on_*`/`poll`
    /// invocation and hand the contents to [`fixgate_wire::encode`].
    pub fn take_outbound(&mut self) -> Vec<FixMessage> {
        std::mem::take(&mut self.outbox)
    }

    fn queue(&mut self, msg: FixMessage) {
        if self.settings.persist {
            self.state.store(msg.header.msg_seq_num, &fixgate_wire::encode(&msg));
        }
        self.outbox.push(msg);
    }

    fn next_sent_seq(&mut self) -> SeqNum {
        let seq = self.state.next_sender_msg_seq_num();
        self.state.incr_next_sender_msg_seq_num();
        seq
    }

    fn send_logon(&mut self, heart_bt_int: u32, reset_seq_num_flag: bool, now: UtcTimestamp) {
        let seq = self.next_sent_seq();
        let msg = self.proxy.logon(
            heart_bt_int,
            reset_seq_num_flag,
            self.settings.username.clone(),
            self.settings.password.clone(),
            seq,
            now,
        );
        self.state.set_heart_bt_int_secs(heart_bt_int);
        self.state.set_logon_sent(true);
        self.state.set_last_sent_time(Instant::now());
        self.queue(msg);
    }

    fn send_logout(&mut self, text: Option<&str>, now: UtcTimestamp) {
        let seq = self.next_sent_seq();
        let text = text.map(|t| FixString::from_ascii_lossy(t.as_bytes().to_vec()));
        let msg = self.proxy.logout(text, seq, now);
        self.state.set_logout_sent(true);
        self.state.set_last_sent_time(Instant::now());
        self.queue(msg);
    }

    fn send_resend_request(&mut self, begin: SeqNum, now: UtcTimestamp) {
        let seq = self.next_sent_seq();
        let msg = self.proxy.resend_request(begin, RESEND_UNTIL_INFINITY, seq, now);
        self.state.set_last_sent_time(Instant::now());
        self.queue(msg);
    }

    /// §7, `SequenceGap` / `ProtocolViolation`: logs the peer out and
    /// marks this session terminal.
    fn fail(&mut self, reason: DisconnectReason, text: &str, now: UtcTimestamp) -> Disposition {
        warn!(session = %self.key, ?reason, "disconnecting session: {text}");
        self.send_logout(Some(text), now);
        self.phase = SessionPhase::Disconnected;
        Disposition::Disconnect
    }

    fn within_sending_time_window(&self, sending_time: UtcTimestamp, now: UtcTimestamp) -> bool {
        let window = chrono::Duration::from_std(self.settings.sending_time_window).unwrap_or_default();
        let delta = now - sending_time;
        delta >= -window && delta <= window
    }

    /// The core of §4.1: applies the sequence-number discipline to one
    /// inbound `msg_seq`. Does not care what message type carried it.
    #[instrument(skip(self), fields(session = %self.key))]
    pub fn on_message(&mut self, seq_no: SeqNum, sending_time: UtcTimestamp, poss_dup: bool, now: UtcTimestamp) -> Disposition {
        if self.settings.check_latency && !self.within_sending_time_window(sending_time, now) {
            return self.fail(
                DisconnectReason::SendingTimeOutOfWindow,
                "SendingTime accuracy problem",
                now,
            );
        }

        let expected = self.state.next_target_msg_seq_num();
        self.state.set_last_received_time(Instant::now());

        if seq_no == expected {
            self.state.incr_next_target_msg_seq_num();
            if self.phase == SessionPhase::AwaitingResend {
                self.phase = SessionPhase::Active;
                self.state.set_resend_range(None);
            }
            Disposition::Accept
        } else if seq_no > expected {
            if self.phase != SessionPhase::AwaitingResend {
                self.phase = SessionPhase::AwaitingResend;
                self.state.set_resend_range(Some(expected..=RESEND_UNTIL_INFINITY));
                self.send_resend_request(expected, now);
            }
            Disposition::GapDetected
        } else if poss_dup {
            Disposition::Duplicate
        } else {
            self.fail(
                DisconnectReason::SequenceResetViolation,
                &format!("MsgSeqNum too low, expecting {expected} but received {seq_no}"),
                now,
            )
        }
    }

    /// Role-specific entry point (§4.1). `session_key` is the identity
    /// carried by the inbound Logon; it must match the key this session
    /// was constructed with whenever `check_comp_id` is enabled.
    #[allow(clippy::too_many_arguments)]
    pub fn on_logon(
        &mut self,
        heart_bt_int: u32,
        seq_no: SeqNum,
        session_key: &SessionKey,
        sending_time: UtcTimestamp,
        now: UtcTimestamp,
        credentials_ok: bool,
    ) -> Disposition {
        if self.settings.check_comp_id && session_key != &self.key {
            return self.fail(DisconnectReason::AuthenticationFailure, "CompID problem", now);
        }
        if !credentials_ok {
            return self.fail(DisconnectReason::AuthenticationFailure, "invalid credentials", now);
        }

        match (self.role, self.phase) {
            (Role::Acceptor, SessionPhase::Connected) => {
                self.state.set_logon_received(true);
                if self.settings.reset_on_logon {
                    self.state.reset();
                }
                self.phase = SessionPhase::Active;
                self.send_logon(heart_bt_int, self.settings.reset_on_logon, now);
                self.on_message(seq_no, sending_time, false, now)
            }
            (Role::Initiator, SessionPhase::SentLogon) => {
                self.state.set_logon_received(true);
                let expected = self.state.next_target_msg_seq_num();
                if seq_no == expected {
                    self.phase = SessionPhase::Active;
                }
                // Open question in the source design: a non-matching seq-num
                // here is handled exactly like any other inbound message,
                // which can issue a ResendRequest even for a legitimately
                // higher post-reconnect seq-num. Kept as specified.
                self.on_message(seq_no, sending_time, false, now)
            }
            _ => self.on_message(seq_no, sending_time, false, now),
        }
    }

    pub fn on_logout(&mut self, seq_no: SeqNum, sending_time: UtcTimestamp, now: UtcTimestamp) -> Disposition {
        let disposition = self.on_message(seq_no, sending_time, false, now);
        match self.phase {
            SessionPhase::AwaitingLogout => {
                self.phase = SessionPhase::Disconnected;
            }
            SessionPhase::Disconnected => {}
            _ => {
                self.send_logout(None, now);
                self.phase = SessionPhase::Disconnected;
            }
        }
        disposition
    }

    pub fn on_heartbeat(
        &mut self,
        seq_no: SeqNum,
        test_req_id: Option<&FixString>,
        sending_time: UtcTimestamp,
        now: UtcTimestamp,
    ) -> Disposition {
        let disposition = self.on_message(seq_no, sending_time, false, now);
        if let (Some(outstanding), Some(got)) = (self.state.outstanding_test_request(), test_req_id) {
            if outstanding == got {
                self.state.set_outstanding_test_request(None);
            }
        }
        disposition
    }

    pub fn on_test_request(
        &mut self,
        test_req_id: FixString,
        seq_no: SeqNum,
        sending_time: UtcTimestamp,
        now: UtcTimestamp,
    ) -> Disposition {
        let disposition = self.on_message(seq_no, sending_time, false, now);
        if disposition == Disposition::Accept {
            let seq = self.next_sent_seq();
            let msg = self.proxy.heartbeat(Some(test_req_id), seq, now);
            self.state.set_last_sent_time(Instant::now());
            self.queue(msg);
        }
        disposition
    }

    pub fn on_reject(&mut self, seq_no: SeqNum, sending_time: UtcTimestamp, now: UtcTimestamp) -> Disposition {
        self.on_message(seq_no, sending_time, false, now)
    }

    pub fn on_resend_request(
        &mut self,
        begin: SeqNum,
        end: SeqNum,
        seq_no: SeqNum,
        sending_time: UtcTimestamp,
        now: UtcTimestamp,
    ) -> Disposition {
        let disposition = self.on_message(seq_no, sending_time, false, now);
        let last_sent = self.state.next_sender_msg_seq_num().saturating_sub(1);
        let end = if end == RESEND_UNTIL_INFINITY { last_sent } else { end.min(last_sent) };
        if begin <= end {
            for bytes in self.state.fetch_range(begin..=end) {
                match fixgate_wire::decode(&bytes) {
                    Ok(msg) => self.outbox.push(msg),
                    Err(err) => warn!(session = %self.key, %err, "could not replay stored message, skipping"),
                }
            }
        }
        disposition
    }

    /// `GapFillFlag=N`: forcibly sets `expected`. `GapFillFlag=Y`: fills
    /// a gap, requiring `new_seq_no >= expected`.
    pub fn on_sequence_reset(&mut self, new_seq_no: SeqNum, gap_fill: bool) -> Disposition {
        let expected = self.state.next_target_msg_seq_num();
        if gap_fill && new_seq_no < expected {
            return Disposition::Reject;
        }
        self.state.set_next_target_msg_seq_num(new_seq_no);
        if self.phase == SessionPhase::AwaitingResend {
            self.phase = SessionPhase::Active;
            self.state.set_resend_range(None);
        }
        Disposition::Accept
    }

    /// Driven at least every 100ms (§4.1). Emits heartbeats/test-requests
    /// and enforces logon/logout/test-request timeouts. Returns the
    /// number of actions performed, for Agent-style idle strategies.
    pub fn poll(&mut self, now: Instant, wall_now: UtcTimestamp) -> usize {
        let mut work = 0;

        match self.phase {
            SessionPhase::Connected if self.role == Role::Initiator => {
                self.send_logon(self.settings_heart_bt_int(), self.settings.reset_on_logon, wall_now);
                self.phase = SessionPhase::SentLogon;
                work += 1;
            }
            SessionPhase::Connected | SessionPhase::SentLogon => {
                if now.duration_since(self.connected_at) > self.settings.logon_timeout {
                    self.fail(DisconnectReason::LogonTimeout, "no Logon received", wall_now);
                    work += 1;
                }
            }
            SessionPhase::AwaitingLogout => {
                if let Some(deadline) = self.logout_deadline {
                    if now >= deadline {
                        self.phase = SessionPhase::Disconnected;
                        work += 1;
                    }
                }
            }
            SessionPhase::Active | SessionPhase::AwaitingResend => {
                let heartbeat_interval = self.settings.heartbeat_interval;
                if now.duration_since(self.state.last_sent_time()) > heartbeat_interval {
                    let seq = self.next_sent_seq();
                    let msg = self.proxy.heartbeat(None, seq, wall_now);
                    self.state.set_last_sent_time(now);
                    self.queue(msg);
                    work += 1;
                }
                if self.state.outstanding_test_request().is_none()
                    && now.duration_since(self.state.last_received_time())
                        > self.settings.test_request_grace_period()
                {
                    self.test_request_seq += 1;
                    let id = FixString::from_ascii(format!("TEST{}", self.test_request_seq).into_bytes())
                        .expect("generated id is ASCII");
                    let seq = self.next_sent_seq();
                    let msg = self.proxy.test_request(id.clone(), seq, wall_now);
                    self.state.set_outstanding_test_request(Some(id));
                    self.state.set_last_sent_time(now);
                    self.queue(msg);
                    work += 1;
                } else if self.state.outstanding_test_request().is_some()
                    && now.duration_since(self.state.last_received_time())
                        > self.settings.test_request_grace_period() * 2
                {
                    self.fail(DisconnectReason::TestRequestTimeout, "TestRequest not answered", wall_now);
                    work += 1;
                }
            }
            SessionPhase::Disconnected | SessionPhase::Disabled => {}
        }

        work
    }

    fn settings_heart_bt_int(&self) -> u32 {
        self.settings.heartbeat_interval.as_secs() as u32
    }

    pub fn start_logout(&mut self, now: Instant, wall_now: UtcTimestamp) {
        if self.phase != SessionPhase::Active && self.phase != SessionPhase::AwaitingResend {
            return;
        }
        self.send_logout(None, wall_now);
        self.phase = SessionPhase::AwaitingLogout;
        self.logout_deadline = Some(now + self.settings.logout_timeout);
    }

    pub fn disconnect(&mut self) {
        self.phase = SessionPhase::Disconnected;
        if self.settings.reset_on_disconnect {
            self.state.reset();
        }
    }

    pub fn disable(&mut self) {
        self.phase = SessionPhase::Disabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages_storage::InMemoryStorage;

    fn key() -> SessionKey {
        let f = |s: &str| FixString::from_ascii(s.as_bytes().to_vec()).unwrap();
        SessionKey::new(f("FIX.4.4"), f("ACCEPTOR"), f("INITIATOR"))
    }

    fn now() -> UtcTimestamp {
        UtcTimestamp::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn acceptor() -> Session<InMemoryStorage> {
        Session::new(
            Role::Acceptor,
            key(),
            1,
            SessionSettings::default(),
            InMemoryStorage::new(),
        )
    }

    #[test]
    fn acceptor_logon_then_business_message_reaches_active() {
        let mut session = acceptor();
        let logon_key = key();
        let disposition = session.on_logon(30, 1, &logon_key, now(), now(), true);
        assert_eq!(disposition, Disposition::Accept);
        assert_eq!(session.phase(), SessionPhase::Active);

        let disposition = session.on_message(2, now(), false, now());
        assert_eq!(disposition, Disposition::Accept);
        assert_eq!(session.state.next_target_msg_seq_num(), 3);

        let outbound = session.take_outbound();
        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].header.msg_seq_num, 1);
    }

    #[test]
    fn gap_triggers_single_resend_request() {
        let mut session = acceptor();
        session.on_logon(30, 1, &key(), now(), now(), true);
        session.take_outbound();

        let disposition = session.on_message(5, now(), false, now());
        assert_eq!(disposition, Disposition::GapDetected);
        assert_eq!(session.phase(), SessionPhase::AwaitingResend);

        let outbound = session.take_outbound();
        assert_eq!(outbound.len(), 1);
        assert!(matches!(outbound[0].body, fixgate_wire::Body::ResendRequest(_)));

        // A further out-of-order message does not emit a second request.
        let disposition = session.on_message(6, now(), false, now());
        assert_eq!(disposition, Disposition::GapDetected);
        assert!(session.take_outbound().is_empty());
    }

    #[test]
    fn seq_too_low_without_poss_dup_disconnects() {
        let mut session = acceptor();
        session.on_logon(30, 1, &key(), now(), now(), true);
        session.on_message(2, now(), false, now());
        session.take_outbound();

        let disposition = session.on_message(1, now(), false, now());
        assert_eq!(disposition, Disposition::Disconnect);
        assert_eq!(session.phase(), SessionPhase::Disconnected);
    }

    #[test]
    fn seq_too_low_with_poss_dup_is_duplicate() {
        let mut session = acceptor();
        session.on_logon(30, 1, &key(), now(), now(), true);
        session.on_message(2, now(), false, now());

        let disposition = session.on_message(1, now(), true, now());
        assert_eq!(disposition, Disposition::Duplicate);
        assert_eq!(session.phase(), SessionPhase::Active);
    }

    #[test]
    fn out_of_window_sending_time_disconnects_regardless_of_seq() {
        let mut session = acceptor();
        session.on_logon(30, 1, &key(), now(), now(), true);
        session.take_outbound();

        let stale = now() - chrono::Duration::hours(1);
        let disposition = session.on_message(2, stale, false, now());
        assert_eq!(disposition, Disposition::Disconnect);
    }
}
