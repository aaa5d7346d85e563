use std::collections::VecDeque;

use super::parameter_sets::{ParameterSetKind, ParameterSetTracker};
use crate::error::{FramingError, Result};

/// Four-byte Annex B start code emitted by the hardware encoder.
pub const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// Leading bytes of the encoder's output buffer that carry no NAL data.
pub const ENCODER_PREFIX_LEN: usize = 4;

const SHORT_START_CODE: [u8; 3] = [0, 0, 1];
const EMULATION_PREVENTION_BYTE: u8 = 0x03;

/// One H.264 NAL unit without start code or emulation prevention.
///
/// The first byte is the NAL header; its low 5 bits are the unit type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodingUnit(Vec<u8>);

impl CodingUnit {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// NAL unit type, `None` for an empty unit.
    pub fn unit_type(&self) -> Option<u8> {
        self.0.first().map(|header| header & 0x1f)
    }

    pub fn parameter_set(&self) -> Option<ParameterSetKind> {
        self.unit_type().and_then(ParameterSetKind::from_unit_type)
    }
}

impl From<Vec<u8>> for CodingUnit {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(START_CODE.len())
        .position(|w| w == START_CODE)
        .map(|pos| from + pos)
}

/// Split one hardware encoder output buffer into coding units.
///
/// The first [`ENCODER_PREFIX_LEN`] bytes are skipped; units are then
/// delimited by 4-byte start codes. Bytes after the last start code form
/// a trailing unit. Units come back in encoder emission order.
pub fn split_encoder_output(buf: &[u8]) -> VecDeque<CodingUnit> {
    let mut units = VecDeque::new();
    let mut cursor = ENCODER_PREFIX_LEN;

    while cursor < buf.len() {
        let (end, next) = match find_start_code(buf, cursor) {
            Some(pos) => (pos, pos + START_CODE.len()),
            None => (buf.len(), buf.len()),
        };

        if end > cursor {
            let unit = CodingUnit::new(buf[cursor..end].to_vec());
            match unit.parameter_set() {
                Some(kind) => tracing::debug!(
                    kind = kind.name(),
                    len = unit.len(),
                    "parameter set being sent"
                ),
                None => tracing::trace!(
                    unit_type = unit.unit_type(),
                    len = unit.len(),
                    "coding unit extracted"
                ),
            }
            units.push_back(unit);
        }
        cursor = next;
    }

    units
}

/// Fixed-capacity decoder input buffer.
///
/// Every write is checked against the capacity; a write that does not fit
/// fails with [`FramingError::BufferCapacity`] and leaves the buffer
/// untouched.
#[derive(Debug)]
pub struct BitstreamBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl BitstreamBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    fn reserve_for(&self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(FramingError::BufferCapacity {
                capacity: self.capacity,
                needed: self.data.len() + n,
            });
        }
        Ok(())
    }

    fn push(&mut self, byte: u8) -> Result<()> {
        self.reserve_for(1)?;
        self.data.push(byte);
        Ok(())
    }

    fn extend(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve_for(bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    fn ends_with_zero_pair(&self) -> bool {
        self.data.ends_with(&[0, 0])
    }
}

/// Summary of one reconstructed access unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessUnit {
    /// Bytes written to the bitstream buffer, i.e. the decode call's frame size.
    pub size: usize,
    /// Coding units written.
    pub units: usize,
    /// An SPS or PPS differed from the cached one.
    pub parameter_sets_changed: bool,
}

/// Rebuilds an escaped Annex B bitstream from depacketized coding units.
///
/// Owns the decoder session's [`ParameterSetTracker`]; the cache lives as
/// long as the assembler.
///
/// Each unit is written as
///
/// ```text
/// [00] 00 00 01 <header> <payload with emulation prevention>
/// ```
///
/// The extra leading zero (4-byte start code) is written for the first unit
/// of each call and for every SPS/PPS; other units get the 3-byte form.
#[derive(Debug, Default)]
pub struct BitstreamAssembler {
    tracker: ParameterSetTracker,
}

impl BitstreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracker(tracker: ParameterSetTracker) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &ParameterSetTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ParameterSetTracker {
        &mut self.tracker
    }

    /// Drain `units` into `out`, appending after whatever `out` holds.
    ///
    /// On a capacity error the access unit is abandoned: the remaining
    /// queued units are dropped and `out` is cleared.
    pub fn assemble(
        &mut self,
        units: &mut VecDeque<CodingUnit>,
        out: &mut BitstreamBuffer,
    ) -> Result<AccessUnit> {
        let start_len = out.len();
        let mut written = 0usize;
        let mut changed = false;

        while let Some(unit) = units.pop_front() {
            let Some(unit_type) = unit.unit_type() else {
                tracing::warn!("skipping empty coding unit");
                continue;
            };

            let kind = ParameterSetKind::from_unit_type(unit_type);
            let long_start_code = written == 0 || kind.is_some();
            if let Err(e) = write_unit(out, unit.as_bytes(), long_start_code) {
                tracing::error!(
                    unit_type,
                    unit_len = unit.len(),
                    dropped = units.len(),
                    error = %e,
                    "bitstream buffer overflow, access unit dropped"
                );
                units.clear();
                out.clear();
                return Err(e);
            }

            // only sets that reached the buffer are cached
            if let Some(kind) = kind {
                changed |= self.tracker.submit(unit.as_bytes(), kind);
            }
            written += 1;
        }

        let size = out.len() - start_len;
        tracing::trace!(units = written, size, changed, "access unit assembled");

        Ok(AccessUnit {
            size,
            units: written,
            parameter_sets_changed: changed,
        })
    }
}

/// Write one start-code-prefixed, escaped unit.
///
/// Emulation prevention looks at the bytes already in `out`, so an
/// inserted `03` resets the zero run.
fn write_unit(out: &mut BitstreamBuffer, unit: &[u8], long_start_code: bool) -> Result<()> {
    let Some((&header, payload)) = unit.split_first() else {
        return Ok(());
    };

    if long_start_code {
        out.push(0)?;
    }
    out.extend(&SHORT_START_CODE)?;
    out.push(header)?;

    for &byte in payload {
        if byte <= EMULATION_PREVENTION_BYTE && out.ends_with_zero_pair() {
            out.push(EMULATION_PREVENTION_BYTE)?;
        }
        out.push(byte)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(list: &[&[u8]]) -> VecDeque<CodingUnit> {
        list.iter().map(|u| CodingUnit::new(u.to_vec())).collect()
    }

    fn assemble(list: &[&[u8]]) -> Vec<u8> {
        let mut a = BitstreamAssembler::new();
        let mut out = BitstreamBuffer::with_capacity(4096);
        let mut q = units(list);
        a.assemble(&mut q, &mut out).unwrap();
        assert!(q.is_empty());
        out.as_bytes().to_vec()
    }

    /// Strip start codes and emulation prevention bytes back out.
    fn unescape(stream: &[u8]) -> Vec<Vec<u8>> {
        let mut nals = Vec::new();
        let mut current: Option<Vec<u8>> = None;
        let mut zeros = 0usize;
        for &b in stream {
            match b {
                0 => zeros += 1,
                1 if zeros >= 2 => {
                    if let Some(n) = current.take() {
                        nals.push(n);
                    }
                    current = Some(Vec::new());
                    zeros = 0;
                }
                3 if zeros == 2 => {
                    let n = current.as_mut().unwrap();
                    n.extend([0, 0]);
                    zeros = 0;
                }
                _ => {
                    let n = current.as_mut().unwrap();
                    n.extend(std::iter::repeat_n(0, zeros));
                    n.push(b);
                    zeros = 0;
                }
            }
        }
        if let Some(mut n) = current {
            n.extend(std::iter::repeat_n(0, zeros));
            nals.push(n);
        }
        nals
    }

    // --- encoder output splitting ---

    #[test]
    fn split_skips_prefix_and_start_codes() {
        let mut buf = vec![0, 0, 0, 1];
        buf.extend_from_slice(&[0x67, 0x42, 0x00, 0x1e]);
        buf.extend_from_slice(&START_CODE);
        buf.extend_from_slice(&[0x68, 0xce]);
        buf.extend_from_slice(&START_CODE);
        buf.extend_from_slice(&[0x65, 0x88, 0x84, 0x00, 0x33]);

        let out = split_encoder_output(&buf);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].as_bytes(), &[0x67, 0x42, 0x00, 0x1e]);
        assert_eq!(out[1].as_bytes(), &[0x68, 0xce]);
        assert_eq!(out[2].as_bytes(), &[0x65, 0x88, 0x84, 0x00, 0x33]);
        assert_eq!(out[0].parameter_set(), Some(ParameterSetKind::Sps));
        assert_eq!(out[2].unit_type(), Some(5));
    }

    #[test]
    fn split_flushes_short_trailing_unit() {
        let mut buf = vec![0xde, 0xad, 0xbe, 0xef, 0x65, 0xaa, 0xbb, 0xcc, 0xdd];
        buf.extend_from_slice(&START_CODE);
        buf.extend_from_slice(&[0x41, 0x9a]);

        let out = split_encoder_output(&buf);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_bytes(), &[0x65, 0xaa, 0xbb, 0xcc, 0xdd]);
        assert_eq!(out[1].as_bytes(), &[0x41, 0x9a]);
    }

    #[test]
    fn split_keeps_three_byte_zero_runs_inside_units() {
        // 00 00 01 is not the encoder's delimiter
        let buf = [0, 0, 0, 1, 0x65, 0x00, 0x00, 0x01, 0x22];
        let out = split_encoder_output(&buf);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_bytes(), &[0x65, 0x00, 0x00, 0x01, 0x22]);
    }

    #[test]
    fn split_short_or_empty_buffers() {
        assert!(split_encoder_output(&[]).is_empty());
        assert!(split_encoder_output(&[0, 0, 0, 1]).is_empty());
        let out = split_encoder_output(&[0, 0, 0, 1, 0x09]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_bytes(), &[0x09]);
    }

    #[test]
    fn split_skips_empty_units_between_adjacent_start_codes() {
        let buf = [0, 0, 0, 1, 0x67, 0x01, 0, 0, 0, 1, 0, 0, 0, 1, 0x68, 0x02];
        let out = split_encoder_output(&buf);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].as_bytes(), &[0x68, 0x02]);
    }

    // --- reassembly ---

    #[test]
    fn first_unit_gets_long_start_code() {
        let out = assemble(&[&[0x65, 0xaa], &[0x41, 0xbb]]);
        assert_eq!(out, vec![0, 0, 0, 1, 0x65, 0xaa, 0, 0, 1, 0x41, 0xbb]);
    }

    #[test]
    fn parameter_sets_get_long_start_code() {
        let out = assemble(&[&[0x41, 0x01], &[0x67, 0x42], &[0x68, 0xce], &[0x65, 0x02]]);
        assert_eq!(
            out,
            vec![
                0, 0, 0, 1, 0x41, 0x01, //
                0, 0, 0, 1, 0x67, 0x42, //
                0, 0, 0, 1, 0x68, 0xce, //
                0, 0, 1, 0x65, 0x02,
            ]
        );
    }

    #[test]
    fn escapes_zero_pair_followed_by_small_byte() {
        let out = assemble(&[&[0x65, 0x00, 0x00, 0x02, 0x7f]]);
        assert_eq!(out, vec![0, 0, 0, 1, 0x65, 0x00, 0x00, 0x03, 0x02, 0x7f]);
    }

    #[test]
    fn escaping_tracks_output_not_input() {
        let out = assemble(&[&[0x65, 0x00, 0x00, 0x00, 0x00, 0x03]]);
        assert_eq!(
            out,
            vec![0, 0, 0, 1, 0x65, 0x00, 0x00, 0x03, 0x00, 0x00, 0x03, 0x03]
        );
    }

    #[test]
    fn escapes_existing_03() {
        let out = assemble(&[&[0x65, 0x00, 0x00, 0x03]]);
        assert_eq!(out, vec![0, 0, 0, 1, 0x65, 0x00, 0x00, 0x03, 0x03]);
    }

    #[test]
    fn no_escape_above_threshold() {
        let out = assemble(&[&[0x65, 0x00, 0x00, 0x04, 0x00]]);
        assert_eq!(out, vec![0, 0, 0, 1, 0x65, 0x00, 0x00, 0x04, 0x00]);
    }

    #[test]
    fn escaped_stream_never_contains_start_code_emulation() {
        for _ in 0..200 {
            let len = 1 + rand::random::<u8>() as usize;
            let mut unit = vec![0x65];
            // bias towards 0..=3 so zero runs are common
            unit.extend((0..len).map(|_| rand::random::<u8>() % 5));

            let out = assemble(&[&unit]);
            let body = &out[5..];
            for w in body.windows(3) {
                assert!(
                    !(w[0] == 0 && w[1] == 0 && w[2] <= 2),
                    "emulated start code in {:?}",
                    body
                );
            }
            assert_eq!(unescape(&out), vec![unit]);
        }
    }

    #[test]
    fn reports_parameter_set_change() {
        let mut a = BitstreamAssembler::new();
        let mut out = BitstreamBuffer::with_capacity(256);

        let mut q = units(&[&[0x67, 0x42], &[0x68, 0xce], &[0x65, 0x01]]);
        let au = a.assemble(&mut q, &mut out).unwrap();
        assert!(!au.parameter_sets_changed);
        assert_eq!(au.units, 3);
        assert_eq!(au.size, out.len());

        out.clear();
        let mut q = units(&[&[0x67, 0x42], &[0x68, 0xce]]);
        assert!(!a.assemble(&mut q, &mut out).unwrap().parameter_sets_changed);

        out.clear();
        let mut q = units(&[&[0x67, 0x4d]]);
        assert!(a.assemble(&mut q, &mut out).unwrap().parameter_sets_changed);
        assert!(a.tracker().pps().is_none());
    }

    #[test]
    fn overflow_aborts_access_unit() {
        let mut a = BitstreamAssembler::new();
        let mut out = BitstreamBuffer::with_capacity(10);
        let mut q = units(&[&[0x65, 1, 2, 3], &[0x41, 4, 5, 6], &[0x41, 7]]);

        let err = a.assemble(&mut q, &mut out).unwrap_err();
        assert!(matches!(err, FramingError::BufferCapacity { capacity: 10, .. }));
        assert!(q.is_empty());
        assert!(out.is_empty());
    }

    #[test]
    fn overflowed_parameter_set_is_not_cached() {
        let mut a = BitstreamAssembler::new();
        let mut out = BitstreamBuffer::with_capacity(6);
        let mut q = units(&[&[0x67, 1, 2, 3, 4, 5]]);
        assert!(a.assemble(&mut q, &mut out).is_err());
        assert!(a.tracker().sps().is_none());
    }

    #[test]
    fn overflowed_sps_change_keeps_previous_sets() {
        let mut a = BitstreamAssembler::new();
        let mut out = BitstreamBuffer::with_capacity(16);
        let mut q = units(&[&[0x67, 0x42], &[0x68, 0xce]]);
        a.assemble(&mut q, &mut out).unwrap();

        out.clear();
        let mut q = units(&[&[0x67, 0x4d, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]]);
        assert!(a.assemble(&mut q, &mut out).is_err());
        assert_eq!(a.tracker().sps(), Some(&[0x67, 0x42][..]));
        assert_eq!(a.tracker().pps(), Some(&[0x68, 0xce][..]));

        // a later copy that does fit is still a change
        out.clear();
        let mut q = units(&[&[0x67, 0x4d]]);
        assert!(a.assemble(&mut q, &mut out).unwrap().parameter_sets_changed);
    }

    #[test]
    fn exact_fit_succeeds() {
        let mut a = BitstreamAssembler::new();
        let mut out = BitstreamBuffer::with_capacity(7);
        let mut q = units(&[&[0x65, 1, 2]]);
        let au = a.assemble(&mut q, &mut out).unwrap();
        assert_eq!(au.size, 7);
        assert_eq!(out.remaining(), 0);
    }

    #[test]
    fn empty_units_skipped() {
        let out = assemble(&[&[], &[0x65, 0x10]]);
        assert_eq!(out, vec![0, 0, 0, 1, 0x65, 0x10]);
    }

    #[test]
    fn split_then_assemble_restores_decoder_layout() {
        let mut enc = vec![0, 0, 0, 1];
        let parts: [&[u8]; 3] = [
            &[0x67, 0x42, 0x00, 0x1e],
            &[0x68, 0xce],
            &[0x65, 0x88, 0x00, 0x00, 0x01],
        ];
        for unit in parts {
            enc.extend_from_slice(unit);
            enc.extend_from_slice(&START_CODE);
        }
        enc.truncate(enc.len() - START_CODE.len());

        let mut q = split_encoder_output(&enc);
        let mut out = BitstreamBuffer::with_capacity(64);
        BitstreamAssembler::new().assemble(&mut q, &mut out).unwrap();
        assert_eq!(
            unescape(out.as_bytes()),
            vec![
                vec![0x67, 0x42, 0x00, 0x1e],
                vec![0x68, 0xce],
                vec![0x65, 0x88, 0x00, 0x00, 0x01],
            ]
        );
    }
}
