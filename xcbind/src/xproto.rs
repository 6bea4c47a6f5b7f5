//! Decoders for a handful of core-protocol replies and events.
//!
//! A protocol module plugs into the core in two places: reply decoders bound
//! into cookies when a request is issued, and event decoders registered into
//! an [`EventRegistry`] at start-up. This module covers the `GetInputFocus`
//! reply, the event-mask values for `ChangeWindowAttributes`, and the
//! keyboard, pointer, exposure and configure events.

use serde::Serialize;

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::event::{EventRegistry, RawEvent};
use crate::wire::WireReader;

/// Major opcode of `ChangeWindowAttributes`.
pub const CHANGE_WINDOW_ATTRIBUTES: u8 = 2;
/// Major opcode of `GetInputFocus`.
pub const GET_INPUT_FOCUS: u8 = 43;
/// Major opcode of `NoOperation`.
pub const NO_OPERATION: u8 = 127;

/// `ChangeWindowAttributes` value-mask bit for the event mask.
pub const CW_EVENT_MASK: u32 = 0x0800;

/// Bits of a window's event mask.
pub mod event_mask {
    /// `KeyPress` events.
    pub const KEY_PRESS: u32 = 0x0000_0001;
    /// `KeyRelease` events.
    pub const KEY_RELEASE: u32 = 0x0000_0002;
    /// `ButtonPress` events.
    pub const BUTTON_PRESS: u32 = 0x0000_0004;
    /// `ButtonRelease` events.
    pub const BUTTON_RELEASE: u32 = 0x0000_0008;
    /// `Expose` events.
    pub const EXPOSURE: u32 = 0x0000_8000;
    /// Changes to the window itself.
    pub const STRUCTURE_NOTIFY: u32 = 0x0002_0000;
    /// Changes to the window's children.
    pub const SUBSTRUCTURE_NOTIFY: u32 = 0x0008_0000;
    /// `FocusIn` and `FocusOut` events.
    pub const FOCUS_CHANGE: u32 = 0x0020_0000;
    /// `PropertyNotify` events.
    pub const PROPERTY_CHANGE: u32 = 0x0040_0000;
}

/// `KeyPress` event code.
pub const KEY_PRESS: u8 = 2;
/// `KeyRelease` event code.
pub const KEY_RELEASE: u8 = 3;
/// `ButtonPress` event code.
pub const BUTTON_PRESS: u8 = 4;
/// `ButtonRelease` event code.
pub const BUTTON_RELEASE: u8 = 5;
/// `Expose` event code.
pub const EXPOSE: u8 = 12;
/// `ConfigureNotify` event code.
pub const CONFIGURE_NOTIFY: u8 = 22;

/// Reply to `GetInputFocus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct GetInputFocusReply {
    /// Where focus reverts to if the focus window becomes unviewable.
    pub revert_to: u8,
    /// Low 16 bits of the request's sequence number.
    pub sequence: u16,
    /// Extra reply length in 4-byte units.
    pub length: u32,
    /// Focus window, or 0 (`None`) / 1 (`PointerRoot`).
    pub focus: u32,
}

impl GetInputFocusReply {
    /// Decodes the reply block. Usable as a [`ReplyDecoder`](crate::ReplyDecoder).
    pub fn decode(reply: &Buffer) -> Result<Self> {
        let r = WireReader::new(reply.as_bytes(), "xcb_get_input_focus_reply_t");
        r.require(12)?;
        Ok(Self {
            revert_to: r.u8(1)?,
            sequence: r.u16(2)?,
            length: r.u32(4)?,
            focus: r.u32(8)?,
        })
    }
}

/// Which of the four input events an [`InputEvent`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum InputKind {
    /// Key went down.
    KeyPress,
    /// Key went up.
    KeyRelease,
    /// Pointer button went down.
    ButtonPress,
    /// Pointer button went up.
    ButtonRelease,
}

/// `KeyPress`, `KeyRelease`, `ButtonPress` and `ButtonRelease` share one layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct InputEvent {
    /// Event kind.
    pub kind: InputKind,
    /// Keycode or button number.
    pub detail: u8,
    /// Low 16 bits of the sequence number.
    pub sequence: u16,
    /// Server timestamp.
    pub time: u32,
    /// Root window of the pointer's screen.
    pub root: u32,
    /// Window the event is reported relative to.
    pub event: u32,
    /// Child of `event` containing the pointer, or 0.
    pub child: u32,
    /// Pointer x relative to `root`.
    pub root_x: i16,
    /// Pointer y relative to `root`.
    pub root_y: i16,
    /// Pointer x relative to `event`.
    pub event_x: i16,
    /// Pointer y relative to `event`.
    pub event_y: i16,
    /// Modifier and button mask.
    pub state: u16,
    /// Whether `event` is on the pointer's screen.
    pub same_screen: bool,
}

impl InputEvent {
    /// Decodes any of the four input events.
    pub fn decode(raw: &RawEvent) -> Result<Self> {
        let kind = match raw.code() {
            KEY_PRESS => InputKind::KeyPress,
            KEY_RELEASE => InputKind::KeyRelease,
            BUTTON_PRESS => InputKind::ButtonPress,
            BUTTON_RELEASE => InputKind::ButtonRelease,
            code => {
                return Err(Error::Decode {
                    what: "xcb_key_press_event_t",
                    reason: format!("event code {code} is not an input event"),
                });
            }
        };
        let r = raw.reader("xcb_key_press_event_t");
        Ok(Self {
            kind,
            detail: r.u8(1)?,
            sequence: r.u16(2)?,
            time: r.u32(4)?,
            root: r.u32(8)?,
            event: r.u32(12)?,
            child: r.u32(16)?,
            root_x: r.i16(20)?,
            root_y: r.i16(22)?,
            event_x: r.i16(24)?,
            event_y: r.i16(26)?,
            state: r.u16(28)?,
            same_screen: r.u8(30)? != 0,
        })
    }
}

/// Part of a window needs repainting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct ExposeEvent {
    /// Low 16 bits of the sequence number.
    pub sequence: u16,
    /// Exposed window.
    pub window: u32,
    /// Left edge of the region.
    pub x: u16,
    /// Top edge of the region.
    pub y: u16,
    /// Width of the region.
    pub width: u16,
    /// Height of the region.
    pub height: u16,
    /// Number of `Expose` events still to follow.
    pub count: u16,
}

impl ExposeEvent {
    /// Decodes an `Expose` event.
    pub fn decode(raw: &RawEvent) -> Result<Self> {
        let r = raw.reader("xcb_expose_event_t");
        Ok(Self {
            sequence: r.u16(2)?,
            window: r.u32(4)?,
            x: r.u16(8)?,
            y: r.u16(10)?,
            width: r.u16(12)?,
            height: r.u16(14)?,
            count: r.u16(16)?,
        })
    }
}

/// A window's geometry or stacking changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct ConfigureNotifyEvent {
    /// Low 16 bits of the sequence number.
    pub sequence: u16,
    /// Window the event was selected on.
    pub event: u32,
    /// Reconfigured window.
    pub window: u32,
    /// Sibling directly below `window`, or 0.
    pub above_sibling: u32,
    /// New x.
    pub x: i16,
    /// New y.
    pub y: i16,
    /// New width.
    pub width: u16,
    /// New height.
    pub height: u16,
    /// New border width.
    pub border_width: u16,
    /// Whether the window manager should ignore this window.
    pub override_redirect: bool,
}

impl ConfigureNotifyEvent {
    /// Decodes a `ConfigureNotify` event.
    pub fn decode(raw: &RawEvent) -> Result<Self> {
        let r = raw.reader("xcb_configure_notify_event_t");
        Ok(Self {
            sequence: r.u16(2)?,
            event: r.u32(4)?,
            window: r.u32(8)?,
            above_sibling: r.u32(12)?,
            x: r.i16(16)?,
            y: r.i16(18)?,
            width: r.u16(20)?,
            height: r.u16(22)?,
            border_width: r.u16(24)?,
            override_redirect: r.u8(26)? != 0,
        })
    }
}

/// Registers every event decoder in this module.
pub fn register_events(registry: &mut EventRegistry) -> Result<()> {
    for code in [KEY_PRESS, KEY_RELEASE, BUTTON_PRESS, BUTTON_RELEASE] {
        registry.register(code, InputEvent::decode)?;
    }
    registry.register(EXPOSE, ExposeEvent::decode)?;
    registry.register(CONFIGURE_NOTIFY, ConfigureNotifyEvent::decode)?;
    Ok(())
}
