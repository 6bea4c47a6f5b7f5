//! libxcb-backed [`Transport`].
//!
//! Every method corresponds 1:1 to an `xcb_*` call. All `unsafe` code for the
//! native backend is confined to this module.

#![allow(unsafe_code)]

use std::ffi::{CString, c_int};
use std::ptr::{self, NonNull};

use xcbind_sys as ffi;

use crate::buffer::Buffer;
use crate::connection::{ConnectOptions, Connection};
use crate::cookie::Cookie;
use crate::error::{Error, GENERIC_ERROR_LEN, Result};
use crate::event::EVENT_LEN;
use crate::transport::{RawReply, Transport};
use crate::xproto::{CW_EVENT_MASK, GetInputFocusReply};

/// Response type of X Generic Events, whose blocks carry a length field.
const GE_GENERIC: u8 = 35;

/// Fixed part of a reply block.
const REPLY_HEADER_LEN: usize = 32;

/// Transport driving a live libxcb connection.
#[derive(Debug)]
pub struct XcbTransport {
    /// Connection returned by `xcb_connect`, released in `Drop`.
    conn: NonNull<ffi::xcb_connection_t>,
}

impl XcbTransport {
    /// Connects to `display` (or `$DISPLAY` when `None`).
    ///
    /// Returns the transport and the preferred screen number.
    pub fn connect(display: Option<&str>) -> Result<(Self, i32)> {
        let display = display.map(CString::new).transpose()?;
        let mut screen: c_int = 0;
        // SAFETY: `display` is a valid C string or null; `screen` is writable.
        let raw = unsafe {
            ffi::xcb_connect(
                display.as_ref().map_or(ptr::null(), |d| d.as_ptr()),
                &raw mut screen,
            )
        };
        let conn = NonNull::new(raw).ok_or(Error::ConnectFailed)?;
        let transport = Self { conn };
        if transport.has_error() {
            // `transport` drops here, which still disconnects the error object.
            return Err(Error::ConnectFailed);
        }
        tracing::debug!(display = ?display, screen, "connected through libxcb");
        Ok((transport, screen))
    }

    /// Issues `GetInputFocus`, returning its sequence number.
    pub fn get_input_focus(&self) -> u32 {
        // SAFETY: `conn` is live for the lifetime of `self`.
        unsafe { ffi::xcb_get_input_focus(self.raw()).sequence }
    }

    /// Issues a checked `NoOperation`, returning its sequence number.
    pub fn no_operation_checked(&self) -> u32 {
        // SAFETY: `conn` is live for the lifetime of `self`.
        unsafe { ffi::xcb_no_operation_checked(self.raw()).sequence }
    }

    /// Issues a checked `ChangeWindowAttributes` that replaces this
    /// client's event mask on `window`, returning its sequence number.
    pub fn select_events(&self, window: u32, mask: u32) -> u32 {
        let values = [mask];
        // SAFETY: `conn` is live; `values` has one word per bit of the value
        // mask and libxcb copies it before returning.
        unsafe {
            ffi::xcb_change_window_attributes_checked(
                self.raw(),
                window,
                CW_EVENT_MASK,
                values.as_ptr().cast(),
            )
            .sequence
        }
    }

    fn raw(&self) -> *mut ffi::xcb_connection_t {
        self.conn.as_ptr()
    }

    /// Adopts an event block, sizing it from its header.
    fn adopt_event(event: *mut ffi::xcb_generic_event_t) -> Option<Buffer> {
        let header = NonNull::new(event)?;
        // SAFETY: libxcb returned a malloc'd event of at least `EVENT_LEN`
        // bytes; generic events append `4 * length` more.
        unsafe {
            let len = if header.as_ref().response_type & 0x7f == GE_GENERIC {
                let extra = ptr::read_unaligned(header.as_ptr().cast::<u8>().add(4).cast::<u32>());
                EVENT_LEN + 4 * extra as usize
            } else {
                EVENT_LEN
            };
            Buffer::from_malloc(header.as_ptr().cast(), len)
        }
    }

    /// Adopts an error block.
    fn adopt_error(error: *mut ffi::xcb_generic_error_t) -> Option<Buffer> {
        // SAFETY: libxcb errors are malloc'd with the full sequence appended.
        unsafe { Buffer::from_malloc(error.cast(), GENERIC_ERROR_LEN) }
    }
}

impl Transport for XcbTransport {
    fn has_error(&self) -> bool {
        // SAFETY: `conn` is live for the lifetime of `self`.
        unsafe { ffi::xcb_connection_has_error(self.raw()) != 0 }
    }

    fn flush(&self) -> i32 {
        // SAFETY: as above.
        unsafe { ffi::xcb_flush(self.raw()) }
    }

    fn file_descriptor(&self) -> i32 {
        // SAFETY: as above.
        unsafe { ffi::xcb_get_file_descriptor(self.raw()) }
    }

    fn generate_id(&self) -> u32 {
        // SAFETY: as above.
        unsafe { ffi::xcb_generate_id(self.raw()) }
    }

    fn setup(&self) -> Option<&[u8]> {
        // SAFETY: the setup block is owned by the connection and lives until
        // `xcb_disconnect`; its length field counts 4-byte units after the
        // first 8 bytes.
        unsafe {
            let setup = ffi::xcb_get_setup(self.raw());
            let setup = setup.as_ref()?;
            let len = 8 + 4 * usize::from(setup.length);
            Some(std::slice::from_raw_parts(ptr::from_ref(setup).cast::<u8>(), len))
        }
    }

    fn wait_for_event(&self) -> Option<Buffer> {
        // SAFETY: as above.
        Self::adopt_event(unsafe { ffi::xcb_wait_for_event(self.raw()) })
    }

    fn poll_for_event(&self) -> Option<Buffer> {
        // SAFETY: as above.
        Self::adopt_event(unsafe { ffi::xcb_poll_for_event(self.raw()) })
    }

    fn wait_for_reply(&self, sequence: u32) -> RawReply {
        let mut error: *mut ffi::xcb_generic_error_t = ptr::null_mut();
        // SAFETY: `error` is a valid out-pointer; the returned reply is
        // malloc'd and at least `REPLY_HEADER_LEN + 4 * length` bytes.
        let reply = unsafe {
            let reply = ffi::xcb_wait_for_reply(self.raw(), sequence, &raw mut error)
                .cast::<ffi::xcb_generic_reply_t>();
            match reply.as_ref() {
                Some(header) => {
                    let len = REPLY_HEADER_LEN + 4 * header.length as usize;
                    Buffer::from_malloc(reply.cast(), len)
                }
                None => None,
            }
        };
        RawReply {
            reply,
            error: Self::adopt_error(error),
        }
    }

    fn request_check(&self, sequence: u32) -> Option<Buffer> {
        let cookie = ffi::xcb_void_cookie_t { sequence };
        // SAFETY: as above.
        Self::adopt_error(unsafe { ffi::xcb_request_check(self.raw(), cookie) })
    }

    fn discard_reply(&self, sequence: u32) {
        // SAFETY: as above.
        unsafe { ffi::xcb_discard_reply(self.raw(), sequence) }
    }
}

impl Drop for XcbTransport {
    fn drop(&mut self) {
        // SAFETY: `conn` came from `xcb_connect` and is released only here.
        unsafe { ffi::xcb_disconnect(self.raw()) }
        tracing::debug!("xcb_disconnect");
    }
}

impl Connection<XcbTransport> {
    /// Connects to `display` (or `$DISPLAY`), returning the connection and
    /// the preferred screen number.
    pub fn connect(display: Option<&str>) -> Result<(Self, i32)> {
        let options = ConnectOptions::new();
        match display {
            Some(name) => options.display(name).connect(),
            None => options.connect(),
        }
    }

    /// Starts building connect options.
    pub fn builder() -> ConnectOptions {
        ConnectOptions::new()
    }

    /// Issues `GetInputFocus` and returns its cookie.
    pub fn get_input_focus(&self) -> Result<Cookie<GetInputFocusReply, XcbTransport>> {
        let sequence = self.with_transport(XcbTransport::get_input_focus)?;
        Ok(self.reply_cookie(sequence, GetInputFocusReply::decode))
    }

    /// Selects the events in `mask` (see [`xproto::event_mask`]) on
    /// `window`. The cookie fails with `BadAccess` if another client holds
    /// an exclusive selection such as button presses on the root.
    ///
    /// [`xproto::event_mask`]: crate::xproto::event_mask
    pub fn select_events(&self, window: u32, mask: u32) -> Result<Cookie<(), XcbTransport>> {
        let sequence = self.with_transport(|t| t.select_events(window, mask))?;
        Ok(self.checked_cookie(sequence))
    }

    /// Issues a checked `NoOperation` and returns its cookie.
    pub fn no_operation_checked(&self) -> Result<Cookie<(), XcbTransport>> {
        let sequence = self.with_transport(XcbTransport::no_operation_checked)?;
        Ok(self.checked_cookie(sequence))
    }
}
