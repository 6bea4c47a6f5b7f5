//! Scriptable in-memory transport.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use super::{RawReply, Transport};
use crate::buffer::Buffer;
use crate::constants::ID_GENERATION_FAILED;
use crate::error::GenericError;
use crate::setup;

/// First id handed out by [`MemoryTransport::generate_id`].
const RESOURCE_ID_BASE: u32 = 0x0020_0000;

/// Mask of the id range handed out by [`MemoryTransport::generate_id`].
const RESOURCE_ID_MASK: u32 = 0x001f_ffff;

/// Record of every primitive a [`MemoryTransport`] was asked to perform.
///
/// Shared through an `Rc` so tests can keep observing after the transport
/// has moved into a connection or been dropped.
#[derive(Debug, Default)]
pub struct CallLog {
    flushes: Cell<usize>,
    event_waits: Cell<usize>,
    polls: Cell<usize>,
    id_requests: Cell<usize>,
    reply_waits: RefCell<Vec<u32>>,
    checks: RefCell<Vec<u32>>,
    discards: RefCell<Vec<u32>>,
    disconnects: Cell<usize>,
}

impl CallLog {
    /// Sequence numbers passed to `discard_reply`, in call order.
    pub fn discards(&self) -> Vec<u32> {
        self.discards.borrow().clone()
    }

    /// Sequence numbers passed to `wait_for_reply`, in call order.
    pub fn reply_waits(&self) -> Vec<u32> {
        self.reply_waits.borrow().clone()
    }

    /// Sequence numbers passed to `request_check`, in call order.
    pub fn checks(&self) -> Vec<u32> {
        self.checks.borrow().clone()
    }

    /// Number of times the transport was dropped (at most one).
    pub fn disconnects(&self) -> usize {
        self.disconnects.get()
    }

    /// Number of `flush` calls.
    pub fn flushes(&self) -> usize {
        self.flushes.get()
    }

    /// Total number of sequence-keyed and event primitives invoked.
    pub fn transport_calls(&self) -> usize {
        self.flushes.get()
            + self.event_waits.get()
            + self.polls.get()
            + self.id_requests.get()
            + self.reply_waits.borrow().len()
            + self.checks.borrow().len()
            + self.discards.borrow().len()
    }
}

/// Mutable script state.
#[derive(Debug)]
struct Script {
    next_sequence: u32,
    next_id: u32,
    ids_exhausted: bool,
    failed: bool,
    events: VecDeque<Vec<u8>>,
    replies: HashMap<u32, Vec<u8>>,
    errors: HashMap<u32, Vec<u8>>,
}

/// In-memory [`Transport`] driven by a test script.
///
/// Requests are "issued" with [`issue`](Self::issue), which hands out
/// increasing sequence numbers. Replies, errors and events are queued ahead
/// of time; waits never block and report transport failure when nothing was
/// queued, mirroring what libxcb returns on a broken connection.
#[derive(Debug)]
pub struct MemoryTransport {
    script: RefCell<Script>,
    setup: Vec<u8>,
    log: Rc<CallLog>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Creates a healthy transport with an empty script.
    pub fn new() -> Self {
        Self {
            script: RefCell::new(Script {
                next_sequence: 1,
                next_id: RESOURCE_ID_BASE,
                ids_exhausted: false,
                failed: false,
                events: VecDeque::new(),
                replies: HashMap::new(),
                errors: HashMap::new(),
            }),
            setup: setup::encode_minimal("xcbind memory transport", RESOURCE_ID_BASE, RESOURCE_ID_MASK),
            log: Rc::default(),
        }
    }

    /// Replaces the setup block returned by [`Transport::setup`].
    #[must_use]
    pub fn with_setup(mut self, setup: Vec<u8>) -> Self {
        self.setup = setup;
        self
    }

    /// Returns the shared call log.
    pub fn log(&self) -> Rc<CallLog> {
        Rc::clone(&self.log)
    }

    /// Issues a request, returning its sequence number.
    pub fn issue(&self) -> u32 {
        let mut script = self.script.borrow_mut();
        let sequence = script.next_sequence;
        script.next_sequence = sequence.wrapping_add(1);
        sequence
    }

    /// Queues the reply payload for `sequence`.
    pub fn push_reply(&self, sequence: u32, bytes: Vec<u8>) {
        self.script.borrow_mut().replies.insert(sequence, bytes);
    }

    /// Queues a protocol error for `sequence`.
    pub fn push_error(&self, sequence: u32, error_code: u8, resource_id: u32, major_code: u8) {
        let bytes = GenericError::encode(error_code, sequence, resource_id, major_code, 0);
        self.script.borrow_mut().errors.insert(sequence, bytes);
    }

    /// Queues raw error bytes for `sequence`, malformed ones included.
    pub fn push_raw_error(&self, sequence: u32, bytes: Vec<u8>) {
        self.script.borrow_mut().errors.insert(sequence, bytes);
    }

    /// Queues an event block (see [`event_bytes`](crate::event_bytes)).
    pub fn push_event(&self, bytes: Vec<u8>) {
        self.script.borrow_mut().events.push_back(bytes);
    }

    /// Makes every later `generate_id` return the failure sentinel.
    pub fn exhaust_ids(&self) {
        self.script.borrow_mut().ids_exhausted = true;
    }

    /// Puts the transport into (or out of) its error state.
    pub fn set_failed(&self, failed: bool) {
        self.script.borrow_mut().failed = failed;
    }

    /// Returns `true` if a reply or error for `sequence` is still buffered.
    pub fn is_buffered(&self, sequence: u32) -> bool {
        let script = self.script.borrow();
        script.replies.contains_key(&sequence) || script.errors.contains_key(&sequence)
    }
}

impl Transport for MemoryTransport {
    fn has_error(&self) -> bool {
        self.script.borrow().failed
    }

    fn flush(&self) -> i32 {
        self.log.flushes.set(self.log.flushes.get() + 1);
        i32::from(!self.script.borrow().failed)
    }

    fn file_descriptor(&self) -> i32 {
        -1
    }

    fn generate_id(&self) -> u32 {
        self.log.id_requests.set(self.log.id_requests.get() + 1);
        let mut script = self.script.borrow_mut();
        if script.ids_exhausted || script.failed {
            return ID_GENERATION_FAILED;
        }
        let id = script.next_id;
        script.next_id += 1;
        id
    }

    fn setup(&self) -> Option<&[u8]> {
        Some(&self.setup)
    }

    fn wait_for_event(&self) -> Option<Buffer> {
        self.log.event_waits.set(self.log.event_waits.get() + 1);
        self.script.borrow_mut().events.pop_front().map(Buffer::from_vec)
    }

    fn poll_for_event(&self) -> Option<Buffer> {
        self.log.polls.set(self.log.polls.get() + 1);
        self.script.borrow_mut().events.pop_front().map(Buffer::from_vec)
    }

    fn wait_for_reply(&self, sequence: u32) -> RawReply {
        self.log.reply_waits.borrow_mut().push(sequence);
        let mut script = self.script.borrow_mut();
        RawReply {
            reply: script.replies.remove(&sequence).map(Buffer::from_vec),
            error: script.errors.remove(&sequence).map(Buffer::from_vec),
        }
    }

    fn request_check(&self, sequence: u32) -> Option<Buffer> {
        self.log.checks.borrow_mut().push(sequence);
        self.script
            .borrow_mut()
            .errors
            .remove(&sequence)
            .map(Buffer::from_vec)
    }

    fn discard_reply(&self, sequence: u32) {
        self.log.discards.borrow_mut().push(sequence);
        let mut script = self.script.borrow_mut();
        script.replies.remove(&sequence);
        script.errors.remove(&sequence);
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.log.disconnects.set(self.log.disconnects.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_increase_from_one() {
        let t = MemoryTransport::new();
        assert_eq!(t.issue(), 1);
        assert_eq!(t.issue(), 2);
    }

    #[test]
    fn reply_and_error_are_handed_out_together() {
        let t = MemoryTransport::new();
        let seq = t.issue();
        t.push_reply(seq, vec![1; 32]);
        t.push_error(seq, 2, 0, 1);
        let raw = t.wait_for_reply(seq);
        assert_eq!(raw.reply.map(|r| r.len()), Some(32));
        assert_eq!(raw.error.map(|e| e.len()), Some(36));
        assert!(!t.is_buffered(seq));
    }

    #[test]
    fn raw_errors_are_passed_through_unchanged() {
        let t = MemoryTransport::new();
        let seq = t.issue();
        t.push_raw_error(seq, vec![0, 3, 0]);
        assert_eq!(t.request_check(seq).map(|e| e.len()), Some(3));
    }

    #[test]
    fn discard_drops_buffered_data() {
        let t = MemoryTransport::new();
        let seq = t.issue();
        t.push_reply(seq, vec![1; 32]);
        assert!(t.is_buffered(seq));
        t.discard_reply(seq);
        assert!(!t.is_buffered(seq));
        assert_eq!(t.log().discards(), vec![seq]);
    }

    #[test]
    fn drop_is_logged_once() {
        let t = MemoryTransport::new();
        let log = t.log();
        drop(t);
        assert_eq!(log.disconnects(), 1);
    }

    #[test]
    fn exhausted_ids_return_sentinel() {
        let t = MemoryTransport::new();
        assert_eq!(t.generate_id(), RESOURCE_ID_BASE);
        t.exhaust_ids();
        assert_eq!(t.generate_id(), u32::MAX);
    }
}
