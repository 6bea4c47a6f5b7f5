//! Protocol constants passed through unchanged from libxcb's headers.

/// X protocol major version.
pub const X_PROTOCOL: u32 = 11;

/// X protocol minor version.
pub const X_PROTOCOL_REVISION: u32 = 0;

/// Base TCP port; display `N` listens on `X_TCP_PORT + N`.
pub const X_TCP_PORT: u32 = 6000;

/// The "no resource" id.
pub const NONE: u32 = 0;

/// Inherit the value from the parent window.
pub const COPY_FROM_PARENT: u32 = 0;

/// The server's current timestamp.
pub const CURRENT_TIME: u32 = 0;

/// Keysym meaning "no symbol".
pub const NO_SYMBOL: u32 = 0;

/// Mask selecting the event code from a `response_type` (bit 7 marks
/// events sent with `SendEvent`).
pub const RESPONSE_TYPE_MASK: u8 = 0x7f;

/// Sentinel `xcb_generate_id` returns when it cannot allocate an id.
pub const ID_GENERATION_FAILED: u32 = u32::MAX;
