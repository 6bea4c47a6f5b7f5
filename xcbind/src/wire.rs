//! Bounds-checked field access for decoders.
//!
//! libxcb hands out structures in host byte order, so every read here uses
//! native endianness.

use crate::error::{Error, Result};

/// Read-only view over a reply, error, event or setup block.
#[derive(Debug, Clone, Copy)]
pub struct WireReader<'a> {
    /// The block being decoded.
    bytes: &'a [u8],
    /// Name of the structure, used in decode errors.
    what: &'static str,
}

impl<'a> WireReader<'a> {
    /// Creates a reader for `bytes`, naming the structure `what` in errors.
    pub const fn new(bytes: &'a [u8], what: &'static str) -> Self {
        Self { bytes, what }
    }

    /// Fails unless at least `len` bytes are present.
    pub fn require(&self, len: usize) -> Result<()> {
        if self.bytes.len() < len {
            return Err(Error::Decode {
                what: self.what,
                reason: format!("expected at least {len} bytes, got {}", self.bytes.len()),
            });
        }
        Ok(())
    }

    /// Returns the `N` bytes at `offset`.
    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        self.bytes
            .get(offset..offset + N)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| Error::Decode {
                what: self.what,
                reason: format!(
                    "field at offset {offset} runs past the end ({} bytes)",
                    self.bytes.len()
                ),
            })
    }

    /// Reads a `u8` at `offset`.
    pub fn u8(&self, offset: usize) -> Result<u8> {
        self.array::<1>(offset).map(|[b]| b)
    }

    /// Reads a native-endian `u16` at `offset`.
    pub fn u16(&self, offset: usize) -> Result<u16> {
        self.array(offset).map(u16::from_ne_bytes)
    }

    /// Reads a native-endian `i16` at `offset`.
    pub fn i16(&self, offset: usize) -> Result<i16> {
        self.array(offset).map(i16::from_ne_bytes)
    }

    /// Reads a native-endian `u32` at `offset`.
    pub fn u32(&self, offset: usize) -> Result<u32> {
        self.array(offset).map(u32::from_ne_bytes)
    }

    /// Returns `len` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        self.bytes
            .get(offset..offset + len)
            .ok_or_else(|| Error::Decode {
                what: self.what,
                reason: format!(
                    "{len} bytes at offset {offset} run past the end ({} bytes)",
                    self.bytes.len()
                ),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_native_endian_fields() {
        let mut bytes = vec![0u8; 8];
        bytes[0] = 7;
        bytes[2..4].copy_from_slice(&0x1234u16.to_ne_bytes());
        bytes[4..8].copy_from_slice(&0xdead_beefu32.to_ne_bytes());
        let r = WireReader::new(&bytes, "test");
        assert_eq!(r.u8(0).unwrap(), 7);
        assert_eq!(r.u16(2).unwrap(), 0x1234);
        assert_eq!(r.u32(4).unwrap(), 0xdead_beef);
    }

    #[test]
    fn short_reads_name_the_structure() {
        let r = WireReader::new(&[0u8; 3], "GetInputFocus reply");
        let err = r.u32(0).unwrap_err();
        assert!(err.to_string().starts_with("GetInputFocus reply:"), "{err}");
        assert!(r.require(4).is_err());
        assert!(r.require(3).is_ok());
    }
}
