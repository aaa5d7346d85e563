//! TOC-based aggregate payload framing (RFC 4867 §4.3 style).
//!
//! ```text
//! +--------+-------+-------+-----+-------+--------+--------+-----+
//! | header | TOC 0 | TOC 1 | ... | TOC n | body 0 | body 1 | ... |
//! +--------+-------+-------+-----+-------+--------+--------+-----+
//!
//! TOC entry:  [F|  mode  |Q|P|P]
//!              F    = another TOC entry follows
//!              mode = row in the codec's frame-size table
//! ```
//!
//! The header byte is ignored on receive. Each body's length is implied
//! by its TOC entry's mode; bodies are laid out back-to-back in TOC order.

use crate::error::{FramingError, Result};

/// "Another TOC entry follows" flag.
pub const TOC_FOLLOW_BIT: u8 = 0x80;

/// Header byte prepended to every multiplexed payload.
///
/// This is a fixed constant: it does not carry the mode the encoder
/// actually selected. Peers that interpret it as a TOC entry will read
/// mode 14 with the follow bit set.
pub const MUX_HEADER: u8 = 0xF0;

/// One table-of-contents byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocEntry(u8);

impl TocEntry {
    pub fn new(byte: u8) -> Self {
        Self(byte)
    }

    /// Build a terminating entry (follow bit clear) for `mode`.
    pub fn last(mode: u8) -> Self {
        Self((mode & 0x0f) << 3)
    }

    pub fn byte(self) -> u8 {
        self.0
    }

    pub fn follows(self) -> bool {
        self.0 & TOC_FOLLOW_BIT != 0
    }

    /// Mode index, bits 6..3.
    pub fn mode(self) -> u8 {
        (self.0 >> 3) & 0x0f
    }
}

/// Fixed, per-codec mapping from mode index to frame body length.
///
/// Reserved modes map to 0 and are rejected when demultiplexing.
#[derive(Debug)]
pub struct FrameSizeTable {
    sizes: [usize; 16],
}

impl FrameSizeTable {
    pub const fn new(sizes: [usize; 16]) -> Self {
        Self { sizes }
    }

    /// Body length for `mode`, or `None` when the mode is reserved.
    pub fn body_len(&self, mode: u8) -> Option<usize> {
        match self.sizes.get(mode as usize) {
            Some(&0) | None => None,
            Some(&len) => Some(len),
        }
    }

    /// Modes with a non-zero body length, in index order.
    pub fn usable_modes(&self) -> impl Iterator<Item = (u8, usize)> + '_ {
        self.sizes
            .iter()
            .enumerate()
            .filter(|&(_, &len)| len != 0)
            .map(|(mode, &len)| (mode as u8, len))
    }
}

/// How demultiplexing of one payload ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxStatus {
    /// Every TOC entry produced a frame.
    Complete,
    /// TOC entry `entry` declared `needed` body bytes but only
    /// `remaining` were left.
    Truncated {
        entry: usize,
        needed: usize,
        remaining: usize,
    },
    /// TOC entry `entry` selected a reserved mode.
    InvalidMode { entry: usize, mode: u8 },
}

/// Frames recovered from one aggregate payload.
///
/// `frames` stays valid when `status` is not [`DemuxStatus::Complete`]:
/// frames before the offending entry were fully delimited.
#[derive(Debug)]
pub struct Demuxed {
    /// Each frame in single-frame layout: `[TOC byte][body]`.
    pub frames: Vec<Vec<u8>>,
    pub status: DemuxStatus,
}

/// Count the TOC entries at the start of `tocs`, including the
/// terminating entry.
pub fn toc_list_len(tocs: &[u8]) -> Result<usize> {
    tocs.iter()
        .position(|&b| !TocEntry::new(b).follows())
        .map(|last| last + 1)
        .ok_or(FramingError::MalformedToc {
            available: tocs.len(),
        })
}

/// Split an aggregate payload into discrete frames.
pub fn demux(payload: &[u8], table: &FrameSizeTable) -> Result<Demuxed> {
    if payload.len() < 2 {
        return Err(FramingError::PayloadTooShort(payload.len()));
    }

    let after_header = &payload[1..];
    let toc_len = toc_list_len(after_header)?;
    let (tocs, mut bodies) = after_header.split_at(toc_len);

    let mut frames = Vec::with_capacity(toc_len);
    let mut status = DemuxStatus::Complete;

    for (entry, &byte) in tocs.iter().enumerate() {
        let toc = TocEntry::new(byte);
        let Some(len) = table.body_len(toc.mode()) else {
            status = DemuxStatus::InvalidMode {
                entry,
                mode: toc.mode(),
            };
            break;
        };
        if bodies.len() < len {
            status = DemuxStatus::Truncated {
                entry,
                needed: len,
                remaining: bodies.len(),
            };
            break;
        }

        let (body, rest) = bodies.split_at(len);
        let mut frame = Vec::with_capacity(1 + len);
        frame.push(byte);
        frame.extend_from_slice(body);
        frames.push(frame);
        bodies = rest;
    }

    tracing::trace!(
        toc_entries = toc_len,
        frames = frames.len(),
        trailing = bodies.len(),
        "payload demultiplexed"
    );

    Ok(Demuxed { frames, status })
}

/// Wrap one coded frame (already in `[TOC][body]` layout) into an
/// aggregate payload.
pub fn mux(frame: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(1 + frame.len());
    payload.push(MUX_HEADER);
    payload.extend_from_slice(frame);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: FrameSizeTable =
        FrameSizeTable::new([4, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);

    #[test]
    fn toc_entry_fields() {
        let toc = TocEntry::new(0xBC);
        assert!(toc.follows());
        assert_eq!(toc.mode(), 7);

        let last = TocEntry::last(7);
        assert!(!last.follows());
        assert_eq!(last.byte(), 0x38);
    }

    #[test]
    fn toc_walk_stops_at_first_terminator() {
        assert_eq!(toc_list_len(&[0x80, 0x88, 0x08, 0x80]).unwrap(), 3);
        assert_eq!(toc_list_len(&[0x00]).unwrap(), 1);
    }

    #[test]
    fn toc_walk_without_terminator_is_malformed() {
        let err = toc_list_len(&[0x80, 0x88]).unwrap_err();
        assert!(matches!(err, FramingError::MalformedToc { available: 2 }));
    }

    #[test]
    fn demux_two_frames_in_order() {
        let payload = [0xF0, 0x80, 0x08, 1, 2, 3, 4, 5, 6];
        let out = demux(&payload, &TABLE).unwrap();
        assert_eq!(out.status, DemuxStatus::Complete);
        assert_eq!(out.frames, vec![vec![0x80, 1, 2, 3, 4], vec![0x08, 5, 6]]);
    }

    #[test]
    fn demux_malformed_yields_nothing() {
        let payload = [0xF0, 0x80, 0x80, 0x80];
        assert!(matches!(
            demux(&payload, &TABLE),
            Err(FramingError::MalformedToc { .. })
        ));
    }

    #[test]
    fn demux_short_payload() {
        assert!(matches!(
            demux(&[0xF0], &TABLE),
            Err(FramingError::PayloadTooShort(1))
        ));
        assert!(matches!(
            demux(&[], &TABLE),
            Err(FramingError::PayloadTooShort(0))
        ));
    }

    #[test]
    fn demux_truncated_keeps_earlier_frames() {
        // second entry declares 4 bytes, only 3 left
        let payload = [0xF0, 0x88, 0x00, 9, 9, 1, 2, 3];
        let out = demux(&payload, &TABLE).unwrap();
        assert_eq!(out.frames, vec![vec![0x88, 9, 9]]);
        assert_eq!(
            out.status,
            DemuxStatus::Truncated {
                entry: 1,
                needed: 4,
                remaining: 3,
            }
        );
    }

    #[test]
    fn demux_reserved_mode_stops() {
        let payload = [0xF0, 0x88, 0x10, 7, 7, 1, 1, 1, 1];
        let out = demux(&payload, &TABLE).unwrap();
        assert_eq!(out.frames, vec![vec![0x88, 7, 7]]);
        assert_eq!(out.status, DemuxStatus::InvalidMode { entry: 1, mode: 2 });
    }

    #[test]
    fn mux_prepends_header() {
        assert_eq!(mux(&[0x08, 0xAA, 0xBB]), vec![MUX_HEADER, 0x08, 0xAA, 0xBB]);
    }

    #[test]
    fn mux_then_demux_recovers_frame() {
        let frame = vec![TocEntry::last(0).byte(), 1, 2, 3, 4];
        let out = demux(&mux(&frame), &TABLE).unwrap();
        assert_eq!(out.status, DemuxStatus::Complete);
        assert_eq!(out.frames, vec![frame]);
    }

    #[test]
    fn usable_modes_skip_reserved() {
        let modes: Vec<_> = TABLE.usable_modes().collect();
        assert_eq!(modes, vec![(0, 4), (1, 2)]);
    }
}
