//! Cookie, reply and event correlation over libxcb.
//!
//! `xcbind` owns the part of an X11 client binding that sits between request
//! encoders and the caller: single-use [`Cookie`]s that resolve an issued
//! request to a reply, a protocol error or an acknowledgment exactly once;
//! automatic discard of abandoned requests; and an [`EventRegistry`] that
//! turns raw events into typed values.
//!
//! The transport is pluggable. [`MemoryTransport`] runs without a display;
//! with the `native` feature `XcbTransport` drives the system libxcb.
//!
//! # Quick start
//!
//! ```
//! use xcbind::{Connection, Error, MemoryTransport};
//!
//! let conn = Connection::from_transport(MemoryTransport::new())?;
//! let seq = conn.with_transport(|t| {
//!     let seq = t.issue();
//!     t.push_error(seq, 3, 0x0040_0001, 12);
//!     seq
//! })?;
//!
//! let mut cookie = conn.checked_cookie(seq);
//! let err = cookie.resolve().unwrap_err();
//! assert_eq!(err.protocol().map(|e| e.error_label.as_str()), Some("BadWindow"));
//! assert!(matches!(cookie.resolve(), Err(Error::CookieUsedTwice)));
//! # Ok::<(), Error>(())
//! ```

mod buffer;
mod connection;
pub mod constants;
mod cookie;
mod error;
mod event;
mod setup;
#[cfg(feature = "native")]
mod sys;
mod transport;
mod wire;
pub mod xproto;

pub use buffer::{Buffer, ReleaseFn, VecTally};
pub use connection::{ConnectOptions, Connection};
pub use cookie::{Cookie, DecodeStrategy, ReplyDecoder, Resolved};
pub use error::{Error, GENERIC_ERROR_LEN, GenericError, Result, error_label, require};
pub use event::{
    DecodedEvent, EVENT_LEN, Event, EventRegistry, FallbackEvent, RawEvent, event_bytes,
    response_type,
};
pub use setup::{Screen, Setup};
#[cfg(feature = "native")]
pub use sys::XcbTransport;
pub use transport::{CallLog, MemoryTransport, RawReply, Transport};
pub use wire::WireReader;
