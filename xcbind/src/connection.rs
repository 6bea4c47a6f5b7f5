//! Connection handle and connect options.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::buffer::Buffer;
use crate::constants::ID_GENERATION_FAILED;
use crate::cookie::{Cookie, DecodeStrategy, ReplyDecoder};
use crate::error::{Error, Result};
use crate::event::{Event, EventRegistry, RawEvent};
use crate::setup::Setup;
use crate::transport::Transport;

/// State shared by a connection and every cookie issued from it.
///
/// `None` means disconnected. The slot only ever goes from `Some` to `None`.
pub(crate) struct Shared<T: Transport> {
    /// The live transport.
    transport: RefCell<Option<T>>,
    /// Registry override; `None` means the process-wide registry, looked
    /// up on every dispatch.
    events: Option<Arc<EventRegistry>>,
}

impl<T: Transport> Shared<T> {
    /// Returns `true` while the transport is held.
    pub(crate) fn is_valid(&self) -> bool {
        self.transport.borrow().is_some()
    }

    /// Runs `f` against the live transport, or returns `None` if closed.
    pub(crate) fn with<U>(&self, f: impl FnOnce(&T) -> U) -> Option<U> {
        self.transport.borrow().as_ref().map(f)
    }

    /// Releases the transport. Returns `false` if it was already gone.
    fn disconnect(&self) -> Result<bool> {
        let mut slot = self
            .transport
            .try_borrow_mut()
            .map_err(|_| Error::TransportBusy)?;
        let taken = slot.take();
        // Drop outside the borrow so a transport's own Drop can't observe it.
        drop(slot);
        Ok(taken.is_some())
    }
}

impl<T: Transport> Drop for Shared<T> {
    fn drop(&mut self) {
        if self.transport.get_mut().take().is_some() {
            tracing::debug!("xcb connection released on drop");
        }
    }
}

/// Owning handle to a transport connection.
///
/// Cookies keep the underlying transport alive: dropping the handle while
/// cookies are outstanding defers the disconnect until the last one is gone.
/// An explicit [`disconnect`](Self::disconnect) takes effect immediately for
/// every holder.
///
/// # Example
///
/// ```
/// use xcbind::{ConnectOptions, MemoryTransport, Resolved};
///
/// let conn = ConnectOptions::new().open(MemoryTransport::new())?;
/// let seq = conn.with_transport(MemoryTransport::issue)?;
/// let mut cookie = conn.checked_cookie(seq);
/// assert_eq!(cookie.resolve()?, Resolved::Ack);
/// # Ok::<(), xcbind::Error>(())
/// ```
pub struct Connection<T: Transport> {
    /// State shared with cookies.
    shared: Rc<Shared<T>>,
}

impl<T: Transport> Connection<T> {
    /// Wraps an established transport using the process-wide event registry.
    ///
    /// Fails with [`Error::ConnectFailed`] if the transport is already in an
    /// error state.
    pub fn from_transport(transport: T) -> Result<Self> {
        ConnectOptions::new().open(transport)
    }

    /// Returns `true` until [`disconnect`](Self::disconnect) is called.
    pub fn is_valid(&self) -> bool {
        self.shared.is_valid()
    }

    /// Releases the transport. Safe to call any number of times; only the
    /// first call has an effect. Pending cookies fail with
    /// [`Error::ClosedConnection`] afterwards.
    ///
    /// Fails with [`Error::TransportBusy`], leaving the connection open, when
    /// called from inside [`with_transport`](Self::with_transport).
    pub fn disconnect(&self) -> Result<()> {
        if self.shared.disconnect()? {
            tracing::debug!("xcb connection closed");
        }
        Ok(())
    }

    /// Runs `f` against the live transport.
    ///
    /// This is how protocol modules issue requests. Disconnecting from
    /// inside `f` is refused with [`Error::TransportBusy`].
    pub fn with_transport<U>(&self, f: impl FnOnce(&T) -> U) -> Result<U> {
        self.shared.with(f).ok_or(Error::NullConnection)
    }

    /// Returns `true` if the transport has entered an error state.
    pub fn has_error(&self) -> Result<bool> {
        self.with_transport(T::has_error)
    }

    /// Forces queued requests out and returns the transport status.
    pub fn flush(&self) -> Result<i32> {
        self.with_transport(T::flush)
    }

    /// Descriptor for external readiness polling.
    pub fn file_descriptor(&self) -> Result<i32> {
        self.with_transport(T::file_descriptor)
    }

    /// Allocates a resource id.
    pub fn generate_id(&self) -> Result<u32> {
        match self.with_transport(T::generate_id)? {
            ID_GENERATION_FAILED => {
                tracing::warn!("transport returned the id-generation sentinel");
                Err(Error::IdGeneration)
            }
            id => Ok(id),
        }
    }

    /// Decodes the setup block the server sent at connect time.
    pub fn setup(&self) -> Result<Setup> {
        self.with_transport(|t| t.setup().map(Setup::from_bytes))?
            .unwrap_or_else(|| {
                Err(Error::Decode {
                    what: "xcb_setup_t",
                    reason: "transport returned no setup block".to_owned(),
                })
            })
    }

    /// Blocks until an event arrives and decodes it.
    pub fn wait_for_event(&self) -> Result<Event> {
        let raw = self
            .with_transport(T::wait_for_event)?
            .ok_or(Error::WaitForEvent)?;
        self.dispatch(raw)
    }

    /// Returns the next queued event, or `None` if the queue is empty.
    pub fn poll_for_event(&self) -> Result<Option<Event>> {
        self.with_transport(T::poll_for_event)?
            .map(|raw| self.dispatch(raw))
            .transpose()
    }

    /// Wraps and decodes a raw event block.
    fn dispatch(&self, raw: Buffer) -> Result<Event> {
        self.events().dispatch(RawEvent::new(raw)?)
    }

    /// The event registry this connection dispatches through: the override
    /// given to [`ConnectOptions::events`], or the process-wide registry as
    /// it is right now.
    pub fn events(&self) -> Arc<EventRegistry> {
        self.shared
            .events
            .as_ref()
            .map_or_else(EventRegistry::global, Arc::clone)
    }

    /// Creates an unbound cookie (sequence 0, not pending).
    ///
    /// Request wrappers call [`Cookie::bind`] with the sequence number the
    /// transport returned.
    pub fn new_cookie<R>(&self) -> Cookie<R, T> {
        Cookie::new(Rc::clone(&self.shared))
    }

    /// Creates a cookie for a request that returns a reply.
    pub fn reply_cookie<R>(&self, sequence: u32, decoder: ReplyDecoder<R>) -> Cookie<R, T> {
        Cookie::pending(
            Rc::clone(&self.shared),
            sequence,
            DecodeStrategy::StandardReply(decoder),
        )
    }

    /// Creates a cookie for a checked request without a reply.
    pub fn checked_cookie(&self, sequence: u32) -> Cookie<(), T> {
        Cookie::pending(Rc::clone(&self.shared), sequence, DecodeStrategy::NoReplyCheck)
    }
}

impl<T: Transport> fmt::Display for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            f.write_str("<xcb connection: open>")
        } else {
            f.write_str("<xcb connection: closed>")
        }
    }
}

impl<T: Transport> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Options for opening a [`Connection`].
///
/// Defaults: display taken from `$DISPLAY`, process-wide event registry
/// (looked up per event, so installing it after opening still applies).
#[derive(Debug, Clone, Default)]
#[must_use = "ConnectOptions does nothing until .open() or .connect() is called"]
pub struct ConnectOptions {
    /// Display name (`":0"`, `"host:1.0"`). Empty means `$DISPLAY`.
    display: Option<String>,
    /// Registry override.
    events: Option<Arc<EventRegistry>>,
}

impl ConnectOptions {
    /// Creates options with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the display to connect to.
    pub fn display(mut self, name: impl Into<String>) -> Self {
        self.display = Some(name.into());
        self
    }

    /// Dispatches events through `registry` instead of the process-wide one.
    pub fn events(mut self, registry: Arc<EventRegistry>) -> Self {
        self.events = Some(registry);
        self
    }

    /// The configured display, or `None` to defer to `$DISPLAY`.
    pub fn display_name(&self) -> Option<&str> {
        self.display.as_deref().filter(|name| !name.is_empty())
    }

    /// Wraps an already established transport.
    pub fn open<T: Transport>(self, transport: T) -> Result<Connection<T>> {
        if transport.has_error() {
            tracing::warn!("transport reported an error right after connecting");
            return Err(Error::ConnectFailed);
        }
        tracing::debug!(registry_override = self.events.is_some(), "xcb connection opened");
        Ok(Connection {
            shared: Rc::new(Shared {
                transport: RefCell::new(Some(transport)),
                events: self.events,
            }),
        })
    }

    /// Connects to the configured display through libxcb.
    ///
    /// Returns the connection and the preferred screen number.
    #[cfg(feature = "native")]
    pub fn connect(self) -> Result<(Connection<crate::sys::XcbTransport>, i32)> {
        let (transport, screen) = crate::sys::XcbTransport::connect(self.display_name())?;
        Ok((self.open(transport)?, screen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::event_bytes;
    use crate::transport::MemoryTransport;

    #[test]
    fn disconnect_is_idempotent() {
        let t = MemoryTransport::new();
        let log = t.log();
        let conn = Connection::from_transport(t).unwrap();
        assert!(conn.is_valid());
        conn.disconnect().unwrap();
        conn.disconnect().unwrap();
        assert!(!conn.is_valid());
        assert_eq!(log.disconnects(), 1);
        drop(conn);
        assert_eq!(log.disconnects(), 1);
    }

    #[test]
    fn disconnect_inside_with_transport_is_refused() {
        let t = MemoryTransport::new();
        let log = t.log();
        let conn = Connection::from_transport(t).unwrap();
        let inner = conn.with_transport(|_| conn.disconnect()).unwrap();
        assert!(matches!(inner, Err(Error::TransportBusy)));
        assert!(conn.is_valid());
        assert_eq!(log.disconnects(), 0);

        conn.disconnect().unwrap();
        assert!(!conn.is_valid());
        assert_eq!(log.disconnects(), 1);
    }

    #[test]
    fn closed_handle_rejects_calls() {
        let conn = Connection::from_transport(MemoryTransport::new()).unwrap();
        conn.disconnect().unwrap();
        assert!(matches!(conn.flush(), Err(Error::NullConnection)));
        assert!(matches!(conn.generate_id(), Err(Error::NullConnection)));
        assert!(matches!(conn.poll_for_event(), Err(Error::NullConnection)));
        assert_eq!(conn.to_string(), "<xcb connection: closed>");
    }

    #[test]
    fn failed_transport_does_not_open() {
        let t = MemoryTransport::new();
        t.set_failed(true);
        let err = ConnectOptions::new().open(t).unwrap_err();
        assert_eq!(
            err.to_string(),
            "xcb_connect failed (XCB provides no further information)"
        );
    }

    #[test]
    fn id_sentinel_is_an_error() {
        let conn = Connection::from_transport(MemoryTransport::new()).unwrap();
        assert_eq!(conn.generate_id().unwrap(), 0x0020_0000);
        conn.with_transport(MemoryTransport::exhaust_ids).unwrap();
        assert!(matches!(conn.generate_id(), Err(Error::IdGeneration)));
    }

    #[test]
    fn poll_on_empty_queue_is_none() {
        let conn = Connection::from_transport(MemoryTransport::new()).unwrap();
        assert!(conn.poll_for_event().unwrap().is_none());
    }

    #[test]
    fn wait_without_event_is_an_error() {
        let conn = Connection::from_transport(MemoryTransport::new()).unwrap();
        let err = conn.wait_for_event().unwrap_err();
        assert_eq!(err.to_string(), "xcb_wait_for_event failed");
    }

    #[test]
    fn events_go_through_configured_registry() {
        let mut registry = EventRegistry::new();
        registry.register(12, |raw: &RawEvent| Ok(raw.full_sequence())).unwrap();
        let t = MemoryTransport::new();
        t.push_event(event_bytes(12, 77));
        let conn = ConnectOptions::new()
            .events(Arc::new(registry))
            .open(t)
            .unwrap();
        let Some(Event::Decoded(event)) = conn.poll_for_event().unwrap() else {
            panic!("expected decoded event");
        };
        assert_eq!(event.downcast_ref::<u32>(), Some(&77));
    }

    #[test]
    fn empty_display_defers_to_environment() {
        assert_eq!(ConnectOptions::new().display("").display_name(), None);
        assert_eq!(ConnectOptions::new().display(":1").display_name(), Some(":1"));
        assert_eq!(ConnectOptions::new().display_name(), None);
    }

    #[test]
    fn setup_is_decoded() {
        let conn = Connection::from_transport(MemoryTransport::new()).unwrap();
        let setup = conn.setup().unwrap();
        assert_eq!(setup.vendor, "xcbind memory transport");
        assert_eq!(conn.file_descriptor().unwrap(), -1);
        assert_eq!(conn.flush().unwrap(), 1);
    }
}
