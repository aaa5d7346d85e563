use std::collections::VecDeque;

use super::h264::{self, AccessUnit, BitstreamAssembler, BitstreamBuffer, CodingUnit};
use super::parameter_sets::ParameterSetTracker;
use super::{Filter, PictureDecoder, PictureEncoder};
use crate::config::{VideoDecoderConfig, VideoEncoderConfig, fmtp_value};
use crate::error::{CodecError, Result};

/// Raw pictures in, coding units out (for the RTP packetizer).
///
/// SPS/PPS seen in the encoder output are remembered so the session can
/// advertise them in SDP.
pub struct H264EncoderFilter<E> {
    encoder: E,
    config: VideoEncoderConfig,
    parameter_sets: ParameterSetTracker,
    frames: u64,
}

impl<E: PictureEncoder> H264EncoderFilter<E> {
    pub fn new(encoder: E, config: VideoEncoderConfig) -> Self {
        tracing::debug!(
            bitrate = config.bitrate,
            width = config.size.width,
            height = config.size.height,
            fps = config.fps,
            "H.264 encoder initialised"
        );
        Self {
            encoder,
            config,
            parameter_sets: ParameterSetTracker::new(),
            frames: 0,
        }
    }

    pub fn config(&self) -> &VideoEncoderConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut VideoEncoderConfig {
        &mut self.config
    }

    /// Pictures successfully encoded so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Apply negotiated fmtp parameters.
    pub fn add_fmtp(&mut self, fmtp: &str) {
        self.config.apply_fmtp(fmtp);
    }

    /// Video fast update request from the remote side.
    pub fn request_keyframe(&mut self) {
        tracing::debug!("keyframe requested");
        self.encoder.request_keyframe();
    }

    /// SDP fmtp parameters for this stream (RFC 6184 §8.1).
    ///
    /// `profile-level-id` and `sprop-parameter-sets` appear once the
    /// encoder has produced an SPS and PPS.
    pub fn fmtp(&self) -> String {
        let mut fmtp = format!("packetization-mode={}", self.config.packetization_mode);
        if let Some(pl) = self.parameter_sets.profile_level_id() {
            fmtp.push_str(&format!(";profile-level-id={}", pl));
        }
        if let Some(sprop) = self.parameter_sets.sprop_parameter_sets() {
            fmtp.push_str(&format!(";sprop-parameter-sets={}", sprop));
        }
        fmtp
    }
}

impl<E: PictureEncoder> Filter for H264EncoderFilter<E> {
    type Input = Vec<u8>;
    type Output = CodingUnit;

    fn name(&self) -> &'static str {
        "H264Enc"
    }

    fn process(&mut self, inbound: &mut VecDeque<Vec<u8>>, outbound: &mut VecDeque<CodingUnit>) {
        while let Some(picture) = inbound.pop_front() {
            let encoded = match self.encoder.encode(&picture).and_then(|buf| {
                if buf.is_empty() {
                    Err(CodecError::EmptyOutput)
                } else {
                    Ok(buf)
                }
            }) {
                Ok(buf) => buf,
                Err(e) => {
                    tracing::error!(
                        frame = self.frames,
                        error = %e,
                        "failed to encode video buffer"
                    );
                    continue;
                }
            };

            let units = h264::split_encoder_output(&encoded);
            for unit in &units {
                if let Some(kind) = unit.parameter_set() {
                    self.parameter_sets.submit(unit.as_bytes(), kind);
                }
            }

            tracing::trace!(
                frame = self.frames,
                units = units.len(),
                encoded_bytes = encoded.len(),
                "picture encoded"
            );
            outbound.extend(units);
            self.frames += 1;
        }
    }
}

/// Depacketized coding units in, decoded pictures out.
///
/// Every tick's inbound units are reassembled into one escaped bitstream
/// and handed to the engine in a single decode call. The parameter-set
/// cache persists for the life of the filter.
pub struct H264DecoderFilter<D> {
    decoder: D,
    assembler: BitstreamAssembler,
    buffer: BitstreamBuffer,
    access_units: u64,
    last_access_unit: Option<AccessUnit>,
}

impl<D: PictureDecoder> H264DecoderFilter<D> {
    pub fn new(decoder: D, config: VideoDecoderConfig) -> Self {
        tracing::debug!(buffer_capacity = config.buffer_capacity, "H.264 decoder initialised");
        Self {
            decoder,
            assembler: BitstreamAssembler::new(),
            buffer: BitstreamBuffer::with_capacity(config.buffer_capacity),
            access_units: 0,
            last_access_unit: None,
        }
    }

    pub fn parameter_sets(&self) -> &ParameterSetTracker {
        self.assembler.tracker()
    }

    /// Access units handed to the engine so far.
    pub fn access_units(&self) -> u64 {
        self.access_units
    }

    /// Summary of the most recent access unit handed to the engine.
    pub fn last_access_unit(&self) -> Option<&AccessUnit> {
        self.last_access_unit.as_ref()
    }

    /// Apply negotiated fmtp parameters: `sprop-parameter-sets` seeds the
    /// parameter-set cache.
    pub fn add_fmtp(&mut self, fmtp: &str) -> Result<()> {
        if let Some(sprop) = fmtp_value(fmtp, "sprop-parameter-sets") {
            self.assembler.tracker_mut().seed_from_sprop(sprop)?;
        }
        Ok(())
    }

    /// Reassemble and decode one access unit. `None` when no unit
    /// survived reassembly and the engine was not called.
    fn decode_access_unit(
        &mut self,
        units: &mut VecDeque<CodingUnit>,
    ) -> Result<Option<(AccessUnit, Vec<Vec<u8>>)>> {
        self.buffer.clear();
        let au = self.assembler.assemble(units, &mut self.buffer)?;
        if au.units == 0 {
            tracing::trace!("no coding units to decode");
            return Ok(None);
        }

        self.last_access_unit = Some(au);
        let decoded = self.decoder.decode(self.buffer.as_bytes());
        self.buffer.clear();
        Ok(Some((au, decoded?)))
    }
}

impl<D: PictureDecoder> Filter for H264DecoderFilter<D> {
    type Input = CodingUnit;
    type Output = Vec<u8>;

    fn name(&self) -> &'static str {
        "H264Dec"
    }

    fn process(&mut self, inbound: &mut VecDeque<CodingUnit>, outbound: &mut VecDeque<Vec<u8>>) {
        if inbound.is_empty() {
            return;
        }

        match self.decode_access_unit(inbound) {
            Ok(None) => {}
            Ok(Some((au, pictures))) => {
                self.access_units += 1;
                tracing::trace!(
                    size = au.size,
                    units = au.units,
                    pictures = pictures.len(),
                    "access unit decoded"
                );
                outbound.extend(pictures);
            }
            Err(e) => tracing::error!(error = %e, "failed to decode video buffer"),
        }
    }
}
