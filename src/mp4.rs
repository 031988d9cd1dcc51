use crate::error::{AdbError, AdbResult};
use std::time::Duration;

/// Duration and natural (width, height) recovered from a finished
/// `screenrecord` MP4 without a full demux.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingMetadata {
    pub duration: Duration,
    pub width: u32,
    pub height: u32,
}

/// Walk an MP4's box tree (`moov` > `mvhd` for duration, `moov` > `trak` >
/// `tkhd` for the video track's natural size) and recover just those four
/// fields.
///
/// MP4 boxes are length-prefixed big-endian the same shape as the ADB sync
/// protocol's framing (`size(4) + type(4) + payload`), so this follows the
/// same explicit-bounds-check discipline as `sync.rs`'s header parsing
/// rather than pulling in a full MP4 demuxer crate for four fields.
pub fn parse_metadata(data: &[u8]) -> AdbResult<RecordingMetadata> {
    let moov = find_box(data, b"moov")
        .ok_or_else(|| AdbError::Protocol("MP4 missing moov box".into()))?;

    let mvhd = find_box(moov, b"mvhd")
        .ok_or_else(|| AdbError::Protocol("MP4 moov missing mvhd box".into()))?;
    let duration = parse_mvhd_duration(mvhd)?;

    let mut width = 0u32;
    let mut height = 0u32;
    for trak in iter_boxes(moov, b"trak") {
        if let Some(tkhd) = find_box(trak, b"tkhd") {
            if let Some((w, h)) = parse_tkhd_dimensions(tkhd) {
                if w > 0 && h > 0 {
                    width = w;
                    height = h;
                    break;
                }
            }
        }
    }

    if width == 0 || height == 0 {
        return Err(AdbError::Protocol(
            "MP4 has no track with non-zero dimensions".into(),
        ));
    }

    Ok(RecordingMetadata {
        duration,
        width,
        height,
    })
}

/// Find the first top-level box of the given type in `data`.
fn find_box<'a>(data: &'a [u8], box_type: &[u8; 4]) -> Option<&'a [u8]> {
    iter_boxes(data, box_type).next()
}

/// Iterate every box of the given type at the top level of `data`.
fn iter_boxes<'a>(data: &'a [u8], box_type: &'a [u8; 4]) -> impl Iterator<Item = &'a [u8]> {
    BoxIter { data, offset: 0 }.filter_map(move |(ty, body)| (ty == *box_type).then_some(body))
}

struct BoxIter<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for BoxIter<'a> {
    type Item = (&'a [u8; 4], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        while self.offset + 8 <= self.data.len() {
            let size =
                u32::from_be_bytes(self.data[self.offset..self.offset + 4].try_into().unwrap())
                    as usize;
            let box_type: &[u8; 4] = self.data[self.offset + 4..self.offset + 8]
                .try_into()
                .unwrap();

            if size < 8 || self.offset + size > self.data.len() {
                return None;
            }

            let body = &self.data[self.offset + 8..self.offset + size];
            self.offset += size;
            return Some((box_type, body));
        }
        None
    }
}

/// `mvhd` payload: version(1) + flags(3) + (creation/modification time +
/// timescale + duration, sized by version) + rate + ...
fn parse_mvhd_duration(body: &[u8]) -> AdbResult<Duration> {
    if body.is_empty() {
        return Err(AdbError::Protocol("mvhd box empty".into()));
    }
    let version = body[0];
    let (timescale, duration) = if version == 1 {
        if body.len() < 4 + 8 + 8 + 4 + 8 {
            return Err(AdbError::Protocol("mvhd (v1) too short".into()));
        }
        let timescale = u32::from_be_bytes(body[20..24].try_into().unwrap());
        let duration = u64::from_be_bytes(body[24..32].try_into().unwrap());
        (timescale, duration)
    } else {
        if body.len() < 4 + 4 + 4 + 4 {
            return Err(AdbError::Protocol("mvhd (v0) too short".into()));
        }
        let timescale = u32::from_be_bytes(body[12..16].try_into().unwrap());
        let duration = u32::from_be_bytes(body[16..20].try_into().unwrap()) as u64;
        (timescale, duration)
    };

    if timescale == 0 {
        return Err(AdbError::Protocol("mvhd timescale is zero".into()));
    }

    Ok(Duration::from_secs_f64(duration as f64 / timescale as f64))
}

/// `tkhd` payload: version(1) + flags(3) + times/id/reserved + ... +
/// width(4, 16.16 fixed) + height(4, 16.16 fixed) at the tail.
fn parse_tkhd_dimensions(body: &[u8]) -> Option<(u32, u32)> {
    if body.len() < 4 {
        return None;
    }
    let version = body[0];
    let fixed_offset = if version == 1 { 88 } else { 76 };
    if body.len() < fixed_offset + 8 {
        return None;
    }
    let width_fixed = u32::from_be_bytes(body[fixed_offset..fixed_offset + 4].try_into().ok()?);
    let height_fixed =
        u32::from_be_bytes(body[fixed_offset + 4..fixed_offset + 8].try_into().ok()?);
    Some((width_fixed >> 16, height_fixed >> 16))
}
