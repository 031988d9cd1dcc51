use crate::error::{AdbError, AdbResult};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Width/height recovered from a PNG's IHDR chunk, without decoding pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngDimensions {
    pub width: u32,
    pub height: u32,
}

/// Parse the width/height out of a PNG byte stream's IHDR chunk.
///
/// A PNG starts with an 8-byte signature, then a sequence of
/// `length(4) + type(4) + data(length) + crc(4)` chunks. IHDR is always
/// first and its data is `width(4) + height(4) + ...`, both big-endian.
/// This only needs the first 33 bytes; it does not validate the CRC or walk
/// further chunks, matching `screencap -p`'s output closely enough that a
/// full decode would be wasted work for a dimensions-only read.
pub fn parse_dimensions(data: &[u8]) -> AdbResult<PngDimensions> {
    if data.len() < 8 || data[..8] != PNG_SIGNATURE {
        return Err(AdbError::Protocol("not a PNG file".into()));
    }

    if data.len() < 8 + 8 + 8 {
        return Err(AdbError::Protocol("PNG truncated before IHDR".into()));
    }

    let chunk_len = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
    let chunk_type = &data[12..16];
    if chunk_type != b"IHDR" {
        return Err(AdbError::Protocol(format!(
            "expected IHDR as first chunk, got {:?}",
            String::from_utf8_lossy(chunk_type)
        )));
    }
    if chunk_len < 8 {
        return Err(AdbError::Protocol("IHDR chunk too short".into()));
    }

    let width = u32::from_be_bytes([data[16], data[17], data[18], data[19]]);
    let height = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);

    if width == 0 || height == 0 {
        return Err(AdbError::Protocol("IHDR reports zero dimension".into()));
    }

    Ok(PngDimensions { width, height })
}
