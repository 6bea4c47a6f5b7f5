//! Single-release ownership of transport-allocated memory.
//!
//! Replies, errors and events handed out by the transport live in memory the
//! transport allocated. A [`Buffer`] adopts such a block and releases it
//! exactly once: either when the guard is dropped, or never if ownership is
//! moved out with [`Buffer::into_raw`]. Every early return in the resolver
//! and the dispatcher therefore frees what it received.

#![allow(unsafe_code)]

use std::cell::Cell;
use std::fmt;
use std::mem::ManuallyDrop;
use std::ptr::{self, NonNull};

thread_local! {
    /// Blocks adopted by [`Buffer::from_vec`] on this thread.
    static VEC_ADOPTED: Cell<usize> = const { Cell::new(0) };
    /// Blocks freed by [`release_boxed`] on this thread.
    static VEC_RELEASED: Cell<usize> = const { Cell::new(0) };
}

/// Running totals of [`Buffer::from_vec`] blocks on the current thread.
///
/// `Buffer` is neither `Send` nor `Sync`, so a block is adopted and released
/// on the same thread and the two counters always describe the same blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct VecTally {
    /// Blocks adopted so far.
    pub adopted: usize,
    /// Blocks released so far.
    pub released: usize,
}

impl VecTally {
    /// Blocks adopted but not yet released.
    pub const fn live(&self) -> usize {
        self.adopted.saturating_sub(self.released)
    }

    /// Difference between this tally and an `earlier` one.
    #[must_use]
    pub const fn since(&self, earlier: &Self) -> Self {
        Self {
            adopted: self.adopted.saturating_sub(earlier.adopted),
            released: self.released.saturating_sub(earlier.released),
        }
    }
}

/// Routine returning a block of `len` bytes to the allocator it came from.
pub type ReleaseFn = unsafe fn(NonNull<u8>, usize);

/// Owning guard around a transport-allocated block of bytes.
pub struct Buffer {
    /// Start of the block.
    ptr: NonNull<u8>,
    /// Number of readable bytes at `ptr`.
    len: usize,
    /// How to give the block back.
    release: ReleaseFn,
}

impl Buffer {
    /// Adopts a block from the C heap, released with `free(3)`.
    ///
    /// Returns `None` for a null pointer, which is how libxcb reports
    /// "nothing was returned".
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to at least `len` readable bytes obtained
    /// from `malloc`, and nothing else may free it.
    pub unsafe fn from_malloc(ptr: *mut u8, len: usize) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self {
            ptr,
            len,
            release: release_malloc,
        })
    }

    /// Adopts bytes allocated by Rust (used by in-memory transports).
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        let raw = Box::into_raw(bytes.into_boxed_slice()).cast::<u8>();
        // SAFETY: `Box::into_raw` never returns null, even for empty slices.
        let ptr = unsafe { NonNull::new_unchecked(raw) };
        VEC_ADOPTED.with(|n| n.set(n.get() + 1));
        Self {
            ptr,
            len,
            release: release_boxed,
        }
    }

    /// Adopts a block with a caller-supplied release routine.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` readable bytes that stay valid until
    /// `release` is called, and `release` must be the correct way to free them.
    pub const unsafe fn from_raw_parts(ptr: NonNull<u8>, len: usize, release: ReleaseFn) -> Self {
        Self { ptr, len, release }
    }

    /// Totals of [`from_vec`](Self::from_vec) blocks adopted and released
    /// on this thread. In-memory transports allocate every block this way,
    /// so tests use it to check that each block is released exactly once.
    pub fn vec_tally() -> VecTally {
        VecTally {
            adopted: VEC_ADOPTED.with(Cell::get),
            released: VEC_RELEASED.with(Cell::get),
        }
    }

    /// Returns the guarded bytes.
    pub const fn as_bytes(&self) -> &[u8] {
        // SAFETY: the constructor contracts guarantee `len` readable bytes
        // for as long as the guard is alive.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Number of guarded bytes.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the block is empty.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Moves ownership out of the guard without releasing the block.
    ///
    /// The caller becomes responsible for freeing the returned pointer with
    /// the returned release routine.
    #[must_use = "the block leaks unless the returned release routine is called"]
    pub fn into_raw(self) -> (NonNull<u8>, usize, ReleaseFn) {
        let this = ManuallyDrop::new(self);
        (this.ptr, this.len, this.release)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // SAFETY: the guard owns the block and `Drop` runs at most once;
        // `into_raw` suppresses it entirely.
        unsafe { (self.release)(self.ptr, self.len) }
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer").field("len", &self.len).finish_non_exhaustive()
    }
}

/// Frees a block obtained from the C heap.
unsafe fn release_malloc(ptr: NonNull<u8>, _len: usize) {
    // SAFETY: `from_malloc` only accepts pointers from `malloc`.
    unsafe { libc::free(ptr.as_ptr().cast()) }
}

/// Frees a block produced by [`Buffer::from_vec`].
unsafe fn release_boxed(ptr: NonNull<u8>, len: usize) {
    // SAFETY: `from_vec` leaked a `Box<[u8]>` of exactly `len` bytes.
    drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(ptr.as_ptr(), len)) });
    VEC_RELEASED.with(|n| n.set(n.get() + 1));
}
