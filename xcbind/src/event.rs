//! Event decoding: raw blocks, the decoder registry, and typed results.
//!
//! Protocol modules register a decoder per event code at start-up (see
//! [`xproto::register_events`](crate::xproto::register_events)). The
//! registry is then installed process-wide with [`EventRegistry::install`]
//! and is read-only from that point on. Events whose code has no decoder
//! come back as a [`FallbackEvent`] carrying only the common header.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::buffer::Buffer;
use crate::constants::RESPONSE_TYPE_MASK;
use crate::error::{Error, Result};
use crate::wire::WireReader;

/// Size of an event block as libxcb hands it out (32 wire bytes plus the
/// widened sequence number).
pub const EVENT_LEN: usize = 36;

/// Number of distinct masked event codes.
const CODES: usize = RESPONSE_TYPE_MASK as usize + 1;

/// Returns the event code of a `response_type` field (low 7 bits).
pub const fn response_type(code: u8) -> u8 {
    code & RESPONSE_TYPE_MASK
}

/// Builds a zeroed event block with the common header filled in.
///
/// Decoders read their fields at the protocol offsets; callers fill the body
/// in before handing the block to a transport.
pub fn event_bytes(response_type: u8, full_sequence: u32) -> Vec<u8> {
    let mut bytes = vec![0u8; EVENT_LEN];
    bytes[0] = response_type;
    #[allow(clippy::cast_possible_truncation)]
    bytes[2..4].copy_from_slice(&(full_sequence as u16).to_ne_bytes());
    bytes[32..36].copy_from_slice(&full_sequence.to_ne_bytes());
    bytes
}

/// A guarded event block straight from the transport.
#[derive(Debug)]
pub struct RawEvent {
    buffer: Buffer,
}

impl RawEvent {
    /// Wraps an event block, checking it is long enough for the header.
    pub fn new(buffer: Buffer) -> Result<Self> {
        WireReader::new(buffer.as_bytes(), "xcb_generic_event_t").require(EVENT_LEN)?;
        Ok(Self { buffer })
    }

    /// The unmasked `response_type` field.
    pub fn response_type(&self) -> u8 {
        self.buffer.as_bytes()[0]
    }

    /// The event code used for dispatch (`response_type & 0x7f`).
    pub fn code(&self) -> u8 {
        response_type(self.response_type())
    }

    /// Returns `true` if the event was generated by a `SendEvent` request.
    pub fn is_synthetic(&self) -> bool {
        self.response_type() & !RESPONSE_TYPE_MASK != 0
    }

    /// Low 16 bits of the sequence number.
    pub fn sequence(&self) -> u16 {
        u16::from_ne_bytes([self.buffer.as_bytes()[2], self.buffer.as_bytes()[3]])
    }

    /// Full 32-bit sequence number.
    pub fn full_sequence(&self) -> u32 {
        let b = self.buffer.as_bytes();
        u32::from_ne_bytes([b[32], b[33], b[34], b[35]])
    }

    /// Reader over the whole block, for decoders.
    pub fn reader(&self, what: &'static str) -> WireReader<'_> {
        WireReader::new(self.buffer.as_bytes(), what)
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }
}

/// Header-only representation of an event nobody registered a decoder for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct FallbackEvent {
    /// The unmasked `response_type`.
    pub response_type: u8,
    /// Low 16 bits of the sequence number.
    pub sequence: u16,
    /// Full 32-bit sequence number.
    pub full_sequence: u32,
}

/// An event produced by a registered decoder.
///
/// The concrete type is whatever the decoder returned; recover it with
/// [`downcast_ref`](Self::downcast_ref) or [`downcast`](Self::downcast).
pub struct DecodedEvent {
    code: u8,
    type_name: &'static str,
    value: Box<dyn Any + Send>,
}

impl DecodedEvent {
    /// Masked event code this value was decoded from.
    pub const fn code(&self) -> u8 {
        self.code
    }

    /// Rust type name of the decoded value.
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the decoded value is an `E`.
    pub fn is<E: Any>(&self) -> bool {
        self.value.is::<E>()
    }

    /// Borrows the decoded value as an `E`.
    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.value.downcast_ref()
    }

    /// Takes the decoded value as an `E`, or gives the event back.
    pub fn downcast<E: Any>(self) -> std::result::Result<E, Self> {
        let Self {
            code,
            type_name,
            value,
        } = self;
        value.downcast::<E>().map(|v| *v).map_err(|value| Self {
            code,
            type_name,
            value,
        })
    }
}

impl fmt::Debug for DecodedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedEvent")
            .field("code", &self.code)
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// A dispatched event.
#[derive(Debug)]
#[non_exhaustive]
pub enum Event {
    /// Produced by a registered decoder.
    Decoded(DecodedEvent),
    /// No decoder was registered for the code.
    Fallback(FallbackEvent),
}

impl Event {
    /// Masked event code.
    pub const fn code(&self) -> u8 {
        match self {
            Self::Decoded(e) => e.code(),
            Self::Fallback(e) => response_type(e.response_type),
        }
    }
}

/// Type-erased decoder stored in the registry.
type ErasedDecoder = Box<dyn Fn(&RawEvent) -> Result<DecodedEvent> + Send + Sync>;

/// Table of event decoders keyed by masked event code.
pub struct EventRegistry {
    decoders: [Option<ErasedDecoder>; CODES],
}

/// The installed process-wide registry.
static GLOBAL: OnceLock<Arc<EventRegistry>> = OnceLock::new();

/// Shared empty registry used until one is installed.
static EMPTY: OnceLock<Arc<EventRegistry>> = OnceLock::new();

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRegistry {
    /// Creates a registry with no decoders.
    pub fn new() -> Self {
        Self {
            decoders: std::array::from_fn(|_| None),
        }
    }

    /// Registers `decoder` for the masked event `code`.
    ///
    /// A second registration for the same code replaces the first; the
    /// overwrite is logged since it usually means two protocol modules
    /// claim the same code.
    pub fn register<E, F>(&mut self, code: u8, decoder: F) -> Result<()>
    where
        E: Any + Send,
        F: Fn(&RawEvent) -> Result<E> + Send + Sync + 'static,
    {
        let slot = self
            .decoders
            .get_mut(usize::from(code))
            .ok_or(Error::EventCode(code))?;
        if slot.is_some() {
            tracing::warn!(code, "replacing previously registered event decoder");
        }
        let type_name = std::any::type_name::<E>();
        *slot = Some(Box::new(move |raw: &RawEvent| {
            decoder(raw).map(|value| DecodedEvent {
                code,
                type_name,
                value: Box::new(value),
            })
        }));
        Ok(())
    }

    /// Returns `true` if a decoder is registered for the masked `code`.
    pub fn is_registered(&self, code: u8) -> bool {
        self.decoders
            .get(usize::from(response_type(code)))
            .is_some_and(Option::is_some)
    }

    /// Decodes a raw event.
    ///
    /// Lookup uses the masked code; a [`FallbackEvent`] keeps the unmasked
    /// `response_type`. The raw block is released before this returns.
    pub fn dispatch(&self, raw: RawEvent) -> Result<Event> {
        match &self.decoders[usize::from(raw.code())] {
            Some(decode) => decode(&raw).map(Event::Decoded),
            None => Ok(Event::Fallback(FallbackEvent {
                response_type: raw.response_type(),
                sequence: raw.sequence(),
                full_sequence: raw.full_sequence(),
            })),
        }
    }

    /// Installs `registry` as the process-wide registry.
    ///
    /// Succeeds once; later calls hand the rejected registry back. Connections
    /// created before installation keep the registry they started with.
    pub fn install(registry: Self) -> std::result::Result<(), Arc<Self>> {
        GLOBAL.set(Arc::new(registry))
    }

    /// Returns the process-wide registry, or an empty one if none has been
    /// installed yet.
    pub fn global() -> Arc<Self> {
        GLOBAL.get().map_or_else(
            || Arc::clone(EMPTY.get_or_init(|| Arc::new(Self::new()))),
            Arc::clone,
        )
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<usize> = self
            .decoders
            .iter()
            .enumerate()
            .filter_map(|(code, d)| d.as_ref().map(|_| code))
            .collect();
        f.debug_struct("EventRegistry")
            .field("codes", &codes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Tagged(u8);

    fn raw(response_type: u8, full_sequence: u32) -> RawEvent {
        RawEvent::new(Buffer::from_vec(event_bytes(response_type, full_sequence))).unwrap()
    }

    #[test]
    fn masks_response_type() {
        assert_eq!(response_type(0x82), 2);
        assert_eq!(response_type(0x7f), 0x7f);
        assert_eq!(response_type(12), 12);
    }

    #[test]
    fn unregistered_code_falls_back_with_unmasked_type() {
        let registry = EventRegistry::new();
        let event = registry.dispatch(raw(0x80 | 33, 0x0002_0005)).unwrap();
        let Event::Fallback(fallback) = event else {
            panic!("expected fallback, got {event:?}");
        };
        assert_eq!(fallback.response_type, 0x80 | 33);
        assert_eq!(fallback.sequence, 5);
        assert_eq!(fallback.full_sequence, 0x0002_0005);
    }

    #[test]
    fn synthetic_events_dispatch_by_masked_code() {
        let mut registry = EventRegistry::new();
        registry
            .register(12, |raw: &RawEvent| Ok(Tagged(raw.response_type())))
            .unwrap();
        let event = registry.dispatch(raw(0x80 | 12, 1)).unwrap();
        let Event::Decoded(decoded) = event else {
            panic!("expected decoded event");
        };
        assert_eq!(decoded.code(), 12);
        assert_eq!(decoded.downcast_ref::<Tagged>(), Some(&Tagged(0x8c)));
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = EventRegistry::new();
        registry.register(7, |_: &RawEvent| Ok(Tagged(1))).unwrap();
        registry.register(7, |_: &RawEvent| Ok(Tagged(2))).unwrap();
        let Event::Decoded(decoded) = registry.dispatch(raw(7, 1)).unwrap() else {
            panic!("expected decoded event");
        };
        assert_eq!(decoded.downcast::<Tagged>().unwrap(), Tagged(2));
    }

    #[test]
    fn codes_above_127_are_rejected() {
        let mut registry = EventRegistry::new();
        let err = registry
            .register(128, |_: &RawEvent| Ok(()))
            .unwrap_err();
        assert!(matches!(err, Error::EventCode(128)));
    }

    #[test]
    fn downcast_to_wrong_type_returns_event() {
        let mut registry = EventRegistry::new();
        registry.register(2, |_: &RawEvent| Ok(Tagged(0))).unwrap();
        let Event::Decoded(decoded) = registry.dispatch(raw(2, 1)).unwrap() else {
            panic!("expected decoded event");
        };
        let decoded = decoded.downcast::<u32>().unwrap_err();
        assert!(decoded.is::<Tagged>());
        assert!(decoded.type_name().ends_with("Tagged"));
    }

    #[test]
    fn short_blocks_are_not_events() {
        let err = RawEvent::new(Buffer::from_vec(vec![2; 32])).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn decoder_failures_propagate() {
        let mut registry = EventRegistry::new();
        registry
            .register(9, |raw: &RawEvent| raw.reader("test_event").u32(64))
            .unwrap();
        assert!(registry.dispatch(raw(9, 1)).is_err());
    }
}
