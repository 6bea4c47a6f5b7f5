//! Single-use request cookies and the reply resolver.
//!
//! A cookie correlates an issued request's sequence number with the way its
//! answer must be collected. It is pending from [`bind`](Cookie::bind) until
//! the first [`resolve`](Cookie::resolve) or [`discard`](Cookie::discard),
//! then retired for good. A cookie binds at most once. Dropping a pending cookie discards it, so an
//! abandoned reply never stays buffered in the transport.

use std::fmt;
use std::rc::Rc;

use crate::buffer::Buffer;
use crate::connection::Shared;
use crate::error::{Error, GenericError, Result};
use crate::transport::{RawReply, Transport};

/// Decoder turning a guarded reply block into a typed reply.
pub type ReplyDecoder<R> = fn(&Buffer) -> Result<R>;

/// How a cookie's answer is collected.
#[non_exhaustive]
pub enum DecodeStrategy<R> {
    /// Wait for a reply and decode it.
    StandardReply(ReplyDecoder<R>),
    /// Checked request without a reply: only an error can come back.
    NoReplyCheck,
}

impl<R> Clone for DecodeStrategy<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for DecodeStrategy<R> {}

impl<R> fmt::Debug for DecodeStrategy<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StandardReply(_) => "StandardReply",
            Self::NoReplyCheck => "NoReplyCheck",
        })
    }
}

/// Successful outcome of [`Cookie::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Resolved<R> {
    /// The decoded reply.
    Reply(R),
    /// A checked request completed without error.
    Ack,
}

impl<R> Resolved<R> {
    /// Returns the reply, or `None` for an acknowledgment.
    pub fn into_reply(self) -> Option<R> {
        match self {
            Self::Reply(reply) => Some(reply),
            Self::Ack => None,
        }
    }

    /// Returns `true` for an acknowledgment.
    pub const fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }
}

/// Single-use token for one in-flight request.
///
/// Holds a reference to its connection's shared state, so the transport
/// outlives every cookie issued from it unless explicitly disconnected.
pub struct Cookie<R, T: Transport> {
    /// Sequence number of the request.
    sequence: u32,
    /// `Some` while pending.
    strategy: Option<DecodeStrategy<R>>,
    /// Set by the first `bind`; never cleared.
    bound: bool,
    /// Connection the request was issued on.
    shared: Rc<Shared<T>>,
}

impl<R, T: Transport> Cookie<R, T> {
    /// Creates an unbound cookie.
    pub(crate) fn new(shared: Rc<Shared<T>>) -> Self {
        Self {
            sequence: 0,
            strategy: None,
            bound: false,
            shared,
        }
    }

    /// Creates a cookie already bound to `sequence`.
    pub(crate) fn pending(
        shared: Rc<Shared<T>>,
        sequence: u32,
        strategy: DecodeStrategy<R>,
    ) -> Self {
        Self {
            sequence,
            strategy: Some(strategy),
            bound: true,
            shared,
        }
    }

    /// Binds a fresh cookie to an issued request, making it pending.
    ///
    /// Fails with [`Error::AlreadyBound`] if the cookie was bound before,
    /// whether it is still pending or already retired.
    pub fn bind(&mut self, sequence: u32, strategy: DecodeStrategy<R>) -> Result<()> {
        if self.bound {
            return Err(Error::AlreadyBound(self.sequence));
        }
        self.bound = true;
        self.sequence = sequence;
        self.strategy = Some(strategy);
        Ok(())
    }

    /// Sequence number of the request (0 before binding).
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Returns `true` until the cookie is resolved or discarded.
    pub const fn is_pending(&self) -> bool {
        self.strategy.is_some()
    }

    /// Collects the request's answer. Blocks until the transport has it.
    ///
    /// Only the first call on a pending cookie reaches the transport; later
    /// calls fail with [`Error::CookieUsedTwice`]. If the connection was
    /// disconnected, fails with [`Error::ClosedConnection`] without touching
    /// the transport. A protocol error comes back as [`Error::Protocol`].
    ///
    /// The cookie is retired before the reply is decoded, so a decoder
    /// failure leaves it retired as well.
    pub fn resolve(&mut self) -> Result<Resolved<R>> {
        let Some(strategy) = self.strategy else {
            return Err(Error::CookieUsedTwice);
        };
        let sequence = self.sequence;
        let raw = self
            .shared
            .with(|t| match strategy {
                DecodeStrategy::StandardReply(_) => t.wait_for_reply(sequence),
                DecodeStrategy::NoReplyCheck => RawReply {
                    reply: None,
                    error: t.request_check(sequence),
                },
            })
            .ok_or(Error::ClosedConnection)?;
        self.strategy = None;
        tracing::trace!(sequence, ?strategy, "cookie resolved");

        if let Some(error) = raw.error {
            let error = GenericError::from_bytes(error.as_bytes())?;
            tracing::debug!(%error, "request failed");
            return Err(Error::Protocol(error));
        }
        match strategy {
            DecodeStrategy::NoReplyCheck => Ok(Resolved::Ack),
            DecodeStrategy::StandardReply(decode) => {
                let reply = raw.reply.ok_or(Error::NoReply(sequence))?;
                decode(&reply).map(Resolved::Reply)
            }
        }
    }

    /// Gives up on the request's answer.
    ///
    /// Tells the transport to drop the buffered reply if the connection is
    /// still open. Does nothing on a retired cookie.
    pub fn discard(&mut self) {
        if self.strategy.take().is_none() {
            return;
        }
        let sequence = self.sequence;
        if self.shared.with(|t| t.discard_reply(sequence)).is_some() {
            tracing::trace!(sequence, "cookie discarded");
        }
    }
}

impl<R, T: Transport> Drop for Cookie<R, T> {
    fn drop(&mut self) {
        self.discard();
    }
}

impl<R, T: Transport> fmt::Display for Cookie<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pending() {
            write!(f, "<cookie: sequence {}>", self.sequence)
        } else {
            f.write_str("<cookie: expired>")
        }
    }
}

impl<R, T: Transport> fmt::Debug for Cookie<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("sequence", &self.sequence)
            .field("strategy", &self.strategy)
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}
