//! Error types for xcbind operations.

use std::ffi::NulError;
use std::fmt;

use serde::Serialize;

use crate::wire::WireReader;

/// Alias for `Result<T, xcbind::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by connection, cookie and event operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The transport could not be established, or reported an error right
    /// after connecting.
    #[error("xcb_connect failed (XCB provides no further information)")]
    ConnectFailed,

    /// The transport returned the all-bits-set sentinel instead of an id.
    #[error("xcb_generate_id failed")]
    IdGeneration,

    /// The cookie was already resolved or discarded.
    #[error("cookie used twice")]
    CookieUsedTwice,

    /// The cookie's connection was disconnected before it was resolved.
    #[error("cookie used on closed connection")]
    ClosedConnection,

    /// `bind` was called on a cookie that was already bound.
    #[error("cookie already bound to sequence {0}")]
    AlreadyBound(u32),

    /// `disconnect` was called while the transport was borrowed, e.g. from
    /// inside a `with_transport` closure.
    #[error("cannot disconnect while the transport is in use")]
    TransportBusy,

    /// A connection method was called after `disconnect`.
    #[error("attempt to use NULL xcb connection")]
    NullConnection,

    /// The blocking event wait returned nothing.
    #[error("xcb_wait_for_event failed")]
    WaitForEvent,

    /// The transport returned neither a reply nor an error for a request
    /// that expects a reply (the connection has usually failed).
    #[error("no reply or error for sequence {0}")]
    NoReply(u32),

    /// The X server rejected the request.
    #[error("X protocol error: {0}")]
    Protocol(GenericError),

    /// A reply, error, event or setup block was malformed.
    #[error("{what}: {reason}")]
    Decode {
        /// Structure being decoded.
        what: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A required field was absent from caller-supplied input.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Event decoders can only be registered for masked codes.
    #[error("event code {0} is outside 0..=127")]
    EventCode(u8),

    /// A string argument contained an interior NUL byte.
    #[error("interior NUL byte in string argument")]
    Nul(#[from] NulError),
}

impl Error {
    /// Returns the decoded protocol error, if this is one.
    pub const fn protocol(&self) -> Option<&GenericError> {
        match self {
            Self::Protocol(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` for errors caused by misuse of a stale cookie.
    pub const fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::CookieUsedTwice
                | Self::ClosedConnection
                | Self::AlreadyBound(_)
                | Self::TransportBusy
        )
    }
}

/// Unwraps a required input field, failing with [`Error::MissingField`].
pub fn require<T>(value: Option<T>, field: &'static str) -> Result<T> {
    value.ok_or(Error::MissingField(field))
}

/// Size of an error block as libxcb hands it out (32 wire bytes plus the
/// widened sequence number).
pub const GENERIC_ERROR_LEN: usize = 36;

/// Core protocol error names, indexed by error code.
const ERROR_LABELS: [&str; 18] = [
    "Success",
    "BadRequest",
    "BadValue",
    "BadWindow",
    "BadPixmap",
    "BadAtom",
    "BadCursor",
    "BadFont",
    "BadMatch",
    "BadDrawable",
    "BadAccess",
    "BadAlloc",
    "BadColor",
    "BadGC",
    "BadIDChoice",
    "BadName",
    "BadLength",
    "BadImplementation",
];

/// Returns the core protocol name for an error code.
///
/// Extension error codes have no core name and are labelled `"Unknown"`.
pub fn error_label(code: u8) -> &'static str {
    ERROR_LABELS.get(usize::from(code)).copied().unwrap_or("Unknown")
}

/// Decoded snapshot of a protocol error.
///
/// Owns its data; the transport buffer it was read from is released as soon
/// as decoding finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct GenericError {
    /// Always 0 for errors.
    pub response_type: u8,
    /// Error code (see [`error_label`]).
    pub error_code: u8,
    /// Low 16 bits of the failed request's sequence number.
    pub sequence: u16,
    /// Offending resource id or value.
    pub resource_id: u32,
    /// Minor opcode of the failed request.
    pub minor_code: u16,
    /// Major opcode of the failed request.
    pub major_code: u8,
    /// Full 32-bit sequence number.
    pub full_sequence: u32,
    /// Human-readable name of `error_code`.
    pub error_label: String,
}

impl GenericError {
    /// Decodes an error block in libxcb layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let r = WireReader::new(bytes, "xcb_generic_error_t");
        r.require(GENERIC_ERROR_LEN)?;
        let error_code = r.u8(1)?;
        Ok(Self {
            response_type: r.u8(0)?,
            error_code,
            sequence: r.u16(2)?,
            resource_id: r.u32(4)?,
            minor_code: r.u16(8)?,
            major_code: r.u8(10)?,
            full_sequence: r.u32(32)?,
            error_label: error_label(error_code).to_owned(),
        })
    }

    /// Encodes an error block in libxcb layout.
    ///
    /// Used by in-memory transports to inject faults.
    pub fn encode(
        error_code: u8,
        full_sequence: u32,
        resource_id: u32,
        major_code: u8,
        minor_code: u16,
    ) -> Vec<u8> {
        let mut bytes = vec![0u8; GENERIC_ERROR_LEN];
        bytes[1] = error_code;
        #[allow(clippy::cast_possible_truncation)]
        bytes[2..4].copy_from_slice(&(full_sequence as u16).to_ne_bytes());
        bytes[4..8].copy_from_slice(&resource_id.to_ne_bytes());
        bytes[8..10].copy_from_slice(&minor_code.to_ne_bytes());
        bytes[10] = major_code;
        bytes[32..36].copy_from_slice(&full_sequence.to_ne_bytes());
        bytes
    }
}

impl fmt::Display for GenericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (code {}, sequence {}, resource {:#x}, opcode {}.{})",
            self.error_label,
            self.error_code,
            self.full_sequence,
            self.resource_id,
            self.major_code,
            self.minor_code
        )
    }
}
