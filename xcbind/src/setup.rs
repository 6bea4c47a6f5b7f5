//! Connection setup snapshot.

use serde::Serialize;

use crate::error::Result;
use crate::wire::WireReader;

/// Size of the fixed `xcb_setup_t` header.
const HEADER_LEN: usize = 40;

/// Size of one `xcb_format_t`.
const FORMAT_LEN: usize = 8;

/// Size of the fixed part of `xcb_screen_t`.
const SCREEN_LEN: usize = 40;

/// Size of the fixed part of `xcb_depth_t`.
const DEPTH_LEN: usize = 8;

/// Size of one `xcb_visualtype_t`.
const VISUAL_LEN: usize = 24;

/// Fixed fields of one screen (`xcb_screen_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct Screen {
    /// Root window.
    pub root: u32,
    /// Default colormap.
    pub default_colormap: u32,
    /// White pixel value.
    pub white_pixel: u32,
    /// Black pixel value.
    pub black_pixel: u32,
    /// Event masks selected on the root by all clients when the connection
    /// opened.
    pub current_input_masks: u32,
    /// Width in pixels.
    pub width_in_pixels: u16,
    /// Height in pixels.
    pub height_in_pixels: u16,
    /// Visual of the root window.
    pub root_visual: u32,
    /// Depth of the root window.
    pub root_depth: u8,
}

impl Screen {
    /// Decodes the screen at `offset`, returning it and the offset of the
    /// next one.
    fn decode(r: &WireReader<'_>, offset: usize) -> Result<(Self, usize)> {
        r.slice(offset, SCREEN_LEN)?;
        let screen = Self {
            root: r.u32(offset)?,
            default_colormap: r.u32(offset + 4)?,
            white_pixel: r.u32(offset + 8)?,
            black_pixel: r.u32(offset + 12)?,
            current_input_masks: r.u32(offset + 16)?,
            width_in_pixels: r.u16(offset + 20)?,
            height_in_pixels: r.u16(offset + 22)?,
            root_visual: r.u32(offset + 32)?,
            root_depth: r.u8(offset + 38)?,
        };
        let mut next = offset + SCREEN_LEN;
        for _ in 0..r.u8(offset + 39)? {
            let visuals = usize::from(r.u16(next + 2)?);
            next += DEPTH_LEN + visuals * VISUAL_LEN;
        }
        Ok((screen, next))
    }
}

/// Owned copy of the setup block the server sent when the connection opened.
///
/// The fixed header, vendor and the fixed part of each screen are decoded;
/// pixmap formats, depths and visuals are left in [`raw`](Self::raw) for
/// protocol modules that need them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct Setup {
    /// 1 on success.
    pub status: u8,
    /// Protocol major version.
    pub protocol_major_version: u16,
    /// Protocol minor version.
    pub protocol_minor_version: u16,
    /// Vendor release number.
    pub release_number: u32,
    /// First client resource id.
    pub resource_id_base: u32,
    /// Bits of a resource id the client may set.
    pub resource_id_mask: u32,
    /// Size of the motion history buffer.
    pub motion_buffer_size: u32,
    /// Maximum request length in 4-byte units.
    pub maximum_request_length: u16,
    /// Number of screens.
    pub roots_len: u8,
    /// Number of pixmap formats.
    pub pixmap_formats_len: u8,
    /// 0 = LSB first, 1 = MSB first.
    pub image_byte_order: u8,
    /// Smallest keycode.
    pub min_keycode: u8,
    /// Largest keycode.
    pub max_keycode: u8,
    /// Server vendor string. Bytes that are not UTF-8 are replaced with
    /// U+FFFD.
    pub vendor: String,
    /// Screens, in server order.
    pub screens: Vec<Screen>,
    /// The full block as received.
    #[serde(skip)]
    raw: Vec<u8>,
}

impl Setup {
    /// Decodes the fixed header, vendor string and screens of a setup block.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let r = WireReader::new(bytes, "xcb_setup_t");
        r.require(HEADER_LEN)?;
        let vendor_len = usize::from(r.u16(24)?);
        let vendor = String::from_utf8_lossy(r.slice(HEADER_LEN, vendor_len)?).into_owned();

        let roots_len = r.u8(28)?;
        let pixmap_formats_len = usize::from(r.u8(29)?);
        let mut offset =
            HEADER_LEN + vendor_len.next_multiple_of(4) + pixmap_formats_len * FORMAT_LEN;
        let mut screens = Vec::with_capacity(usize::from(roots_len));
        for _ in 0..roots_len {
            let (screen, next) = Screen::decode(&r, offset)?;
            screens.push(screen);
            offset = next;
        }

        Ok(Self {
            status: r.u8(0)?,
            protocol_major_version: r.u16(2)?,
            protocol_minor_version: r.u16(4)?,
            release_number: r.u32(8)?,
            resource_id_base: r.u32(12)?,
            resource_id_mask: r.u32(16)?,
            motion_buffer_size: r.u32(20)?,
            maximum_request_length: r.u16(26)?,
            roots_len: r.u8(28)?,
            pixmap_formats_len: r.u8(29)?,
            image_byte_order: r.u8(30)?,
            min_keycode: r.u8(34)?,
            max_keycode: r.u8(35)?,
            vendor,
            screens,
            raw: bytes.to_vec(),
        })
    }

    /// Returns screen `number` as reported by `connect`.
    pub fn screen(&self, number: i32) -> Option<&Screen> {
        usize::try_from(number).ok().and_then(|n| self.screens.get(n))
    }

    /// Returns the undecoded setup block.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

/// Encodes a screenless setup block in libxcb layout.
pub(crate) fn encode_minimal(vendor: &str, resource_id_base: u32, resource_id_mask: u32) -> Vec<u8> {
    let vendor = vendor.as_bytes();
    let padded = vendor.len().next_multiple_of(4);
    let total = HEADER_LEN + padded;
    let mut bytes = vec![0u8; total];
    bytes[0] = 1;
    bytes[2..4].copy_from_slice(&11u16.to_ne_bytes());
    #[allow(clippy::cast_possible_truncation)]
    bytes[6..8].copy_from_slice(&(((total - 8) / 4) as u16).to_ne_bytes());
    bytes[8..12].copy_from_slice(&12_101_004u32.to_ne_bytes());
    bytes[12..16].copy_from_slice(&resource_id_base.to_ne_bytes());
    bytes[16..20].copy_from_slice(&resource_id_mask.to_ne_bytes());
    bytes[20..24].copy_from_slice(&256u32.to_ne_bytes());
    #[allow(clippy::cast_possible_truncation)]
    bytes[24..26].copy_from_slice(&(vendor.len() as u16).to_ne_bytes());
    bytes[26..28].copy_from_slice(&u16::MAX.to_ne_bytes());
    bytes[34] = 8;
    bytes[35] = 255;
    bytes[HEADER_LEN..HEADER_LEN + vendor.len()].copy_from_slice(vendor);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn decodes_minimal_block() {
        let bytes = encode_minimal("Test Vendor", 0x0040_0000, 0x003f_ffff);
        assert_eq!(bytes.len() % 4, 0);
        let setup = Setup::from_bytes(&bytes).unwrap();
        assert_eq!(setup.status, 1);
        assert_eq!(setup.protocol_major_version, 11);
        assert_eq!(setup.resource_id_base, 0x0040_0000);
        assert_eq!(setup.resource_id_mask, 0x003f_ffff);
        assert_eq!(setup.min_keycode, 8);
        assert_eq!(setup.max_keycode, 255);
        assert_eq!(setup.vendor, "Test Vendor");
        assert_eq!(setup.raw(), bytes.as_slice());
    }

    /// Appends one pixmap format and one screen with a single depth holding
    /// `visuals` visuals, then a second bare screen.
    fn with_screens(mut bytes: Vec<u8>, visuals: u16) -> Vec<u8> {
        bytes[28] = 2;
        bytes[29] = 1;
        bytes.extend_from_slice(&[24, 32, 32, 0, 0, 0, 0, 0]);

        let mut screen = vec![0u8; SCREEN_LEN];
        screen[0..4].copy_from_slice(&0x0000_0536u32.to_ne_bytes());
        screen[20..22].copy_from_slice(&1920u16.to_ne_bytes());
        screen[22..24].copy_from_slice(&1080u16.to_ne_bytes());
        screen[38] = 24;
        screen[39] = 1;
        bytes.extend_from_slice(&screen);
        let mut depth = vec![0u8; DEPTH_LEN];
        depth[0] = 24;
        depth[2..4].copy_from_slice(&visuals.to_ne_bytes());
        bytes.extend_from_slice(&depth);
        bytes.resize(bytes.len() + usize::from(visuals) * VISUAL_LEN, 0);

        let mut second = vec![0u8; SCREEN_LEN];
        second[0..4].copy_from_slice(&0x0000_0777u32.to_ne_bytes());
        bytes.extend_from_slice(&second);
        bytes
    }

    #[test]
    fn decodes_screens_past_formats_and_depths() {
        let bytes = with_screens(encode_minimal("abc", 0, 0), 2);
        let setup = Setup::from_bytes(&bytes).unwrap();
        assert_eq!(setup.screens.len(), 2);
        let first = setup.screen(0).unwrap();
        assert_eq!(first.root, 0x0000_0536);
        assert_eq!((first.width_in_pixels, first.height_in_pixels), (1920, 1080));
        assert_eq!(first.root_depth, 24);
        assert_eq!(setup.screen(1).map(|s| s.root), Some(0x0000_0777));
        assert!(setup.screen(2).is_none());
        assert!(setup.screen(-1).is_none());
    }

    #[test]
    fn truncated_screen_list_is_rejected() {
        let mut bytes = with_screens(encode_minimal("abc", 0, 0), 1);
        bytes.truncate(bytes.len() - 4);
        assert!(matches!(
            Setup::from_bytes(&bytes),
            Err(Error::Decode { what: "xcb_setup_t", .. })
        ));
    }

    #[test]
    fn non_utf8_vendor_decodes_lossily() {
        let mut bytes = encode_minimal("abcd", 0, 0);
        bytes[HEADER_LEN + 1] = 0xff;
        let setup = Setup::from_bytes(&bytes).unwrap();
        assert_eq!(setup.vendor, "a\u{fffd}cd");
        assert_eq!(setup.resource_id_mask, 0);
    }

    #[test]
    fn truncated_vendor_is_rejected() {
        let mut bytes = encode_minimal("abcd", 0, 0);
        bytes.truncate(42);
        assert!(matches!(
            Setup::from_bytes(&bytes),
            Err(Error::Decode { what: "xcb_setup_t", .. })
        ));
    }

    #[test]
    fn short_header_is_rejected() {
        assert!(Setup::from_bytes(&[1u8; 20]).is_err());
    }
}
