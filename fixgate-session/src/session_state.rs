use std::ops::RangeInclusive;

use fixgate_core::{FixString, Instant, SeqNum};

use crate::messages_storage::MessagesStorage;

/// Bookkeeping that sits below the [`crate::session::Session`] state
/// machine: sequence counters (delegated to `S`), liveness clocks, and
/// the handshake flags that decide which branch of the Logon/Logout
/// protocol applies. Out-of-order inbound messages are never buffered
/// here (§4.1: they are dropped, the peer is expected to resend them).
#[derive(Debug)]
pub(crate) struct State<S> {
    initiate: bool,
    logon_sent: bool,
    logon_received: bool,
    logout_sent: bool,
    resend_range: Option<RangeInclusive<SeqNum>>,
    heart_bt_int_secs: u32,
    last_sent_time: Instant,
    last_received_time: Instant,
    outstanding_test_request: Option<FixString>,
    messages_storage: S,
}

impl<S: MessagesStorage> State<S> {
    pub(crate) fn new(initiate: bool, messages_storage: S) -> State<S> {
        let now = Instant::now();
        State {
            initiate,
            logon_sent: false,
            logon_received: false,
            logout_sent: false,
            resend_range: None,
            heart_bt_int_secs: 30,
            last_sent_time: now,
            last_received_time: now,
            outstanding_test_request: None,
            messages_storage,
        }
    }

    pub fn initiate(&self) -> bool {
        self.initiate
    }

    pub fn logon_sent(&self) -> bool {
        self.logon_sent
    }

    pub fn set_logon_sent(&mut self, value: bool) {
        self.logon_sent = value;
    }

    pub fn logon_received(&self) -> bool {
        self.logon_received
    }

    pub fn set_logon_received(&mut self, value: bool) {
        self.logon_received = value;
    }

    pub fn logout_sent(&self) -> bool {
        self.logout_sent
    }

    pub fn set_logout_sent(&mut self, value: bool) {
        self.logout_sent = value;
    }

    pub fn resend_range(&self) -> Option<RangeInclusive<SeqNum>> {
        self.resend_range.clone()
    }

    pub fn set_resend_range(&mut self, range: Option<RangeInclusive<SeqNum>>) {
        self.resend_range = range;
    }

    pub fn heart_bt_int_secs(&self) -> u32 {
        self.heart_bt_int_secs
    }

    pub fn set_heart_bt_int_secs(&mut self, secs: u32) {
        self.heart_bt_int_secs = secs;
    }

    pub fn last_sent_time(&self) -> Instant {
        self.last_sent_time
    }

    pub fn set_last_sent_time(&mut self, now: Instant) {
        self.last_sent_time = now;
    }

    pub fn last_received_time(&self) -> Instant {
        self.last_received_time
    }

    pub fn set_last_received_time(&mut self, now: Instant) {
        self.last_received_time = now;
    }

    pub fn outstanding_test_request(&self) -> Option<&FixString> {
        self.outstanding_test_request.as_ref()
    }

    pub fn set_outstanding_test_request(&mut self, id: Option<FixString>) {
        self.outstanding_test_request = id;
    }

    pub fn fetch_range(&mut self, range: RangeInclusive<SeqNum>) -> Vec<Vec<u8>> {
        self.messages_storage
            .fetch_range(range)
            .unwrap_or_else(|_| Vec::new())
    }

    pub fn store(&mut self, seq_num: SeqNum, data: &[u8]) {
        let _ = self.messages_storage.store(seq_num, data);
    }

    pub fn next_sender_msg_seq_num(&self) -> SeqNum {
        self.messages_storage.next_sender_msg_seq_num()
    }

    pub fn next_target_msg_seq_num(&self) -> SeqNum {
        self.messages_storage.next_target_msg_seq_num()
    }

    pub fn set_next_sender_msg_seq_num(&mut self, seq_num: SeqNum) {
        self.messages_storage.set_next_sender_msg_seq_num(seq_num);
    }

    pub fn set_next_target_msg_seq_num(&mut self, seq_num: SeqNum) {
        self.messages_storage.set_next_target_msg_seq_num(seq_num);
    }

    pub fn incr_next_sender_msg_seq_num(&mut self) {
        self.messages_storage.incr_next_sender_msg_seq_num();
    }

    pub fn incr_next_target_msg_seq_num(&mut self) {
        self.messages_storage.incr_next_target_msg_seq_num();
    }

    pub fn reset(&mut self) {
        let _ = self.messages_storage.reset();
    }
}
