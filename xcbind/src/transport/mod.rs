//! The transport seam.
//!
//! A [`Transport`] supplies the raw request/reply primitives a connection is
//! built from. The native implementation drives libxcb (feature `native`);
//! [`MemoryTransport`] is a scriptable stand-in for tests and for protocol
//! modules that want to exercise their decoders without an X server.
//!
//! Implementations own the underlying connection: dropping the transport is
//! the disconnect.

mod memory;

pub use memory::{CallLog, MemoryTransport};

use crate::buffer::Buffer;

/// Outcome of a blocking reply wait.
///
/// Exactly one of the two is normally present. Both are absent when the
/// transport failed before a reply arrived. If both are present the error
/// wins and the reply is released unread.
#[derive(Debug, Default)]
pub struct RawReply {
    /// Reply payload.
    pub reply: Option<Buffer>,
    /// Protocol error in libxcb layout (see [`GenericError`](crate::GenericError)).
    pub error: Option<Buffer>,
}

/// Request/reply primitives consumed by [`Connection`](crate::Connection)
/// and [`Cookie`](crate::Cookie).
///
/// All methods take `&self`: the connection is driven by a single thread
/// and transports use interior state as libxcb does.
pub trait Transport {
    /// Returns `true` if the transport has entered an error state.
    fn has_error(&self) -> bool;

    /// Forces queued requests out. Returns the transport status code
    /// (positive on success).
    fn flush(&self) -> i32;

    /// Descriptor for external readiness polling, or `-1` if there is none.
    fn file_descriptor(&self) -> i32;

    /// Allocates a resource id. `u32::MAX` signals failure.
    fn generate_id(&self) -> u32;

    /// Raw connection setup block, if available.
    fn setup(&self) -> Option<&[u8]>;

    /// Blocks until an event arrives. `None` means the transport failed.
    fn wait_for_event(&self) -> Option<Buffer>;

    /// Returns a queued event without blocking.
    fn poll_for_event(&self) -> Option<Buffer>;

    /// Blocks until the reply or error for `sequence` arrives.
    fn wait_for_reply(&self, sequence: u32) -> RawReply;

    /// Blocks until a request without a reply is known to have succeeded or
    /// failed. Returns the error, if any.
    fn request_check(&self, sequence: u32) -> Option<Buffer>;

    /// Tells the transport the reply for `sequence` will never be claimed.
    fn discard_reply(&self, sequence: u32);
}
