//! Per-tick speech filters shared by the AMR and G.729 adapters.
//!
//! Both codecs use the same aggregate payload layout; only the
//! [`SpeechProfile`] differs.

use std::collections::VecDeque;

use super::toc::{self, DemuxStatus, FrameSizeTable};
use super::{Filter, FrameDecoder, FrameEncoder};
use crate::config::SpeechParams;
use crate::error::CodecError;

const BYTES_PER_SAMPLE: usize = 2;

/// Fixed, codec-specific framing constants.
#[derive(Debug)]
pub struct SpeechProfile {
    pub name: &'static str,
    pub frame_sizes: &'static FrameSizeTable,
    /// Samples in one coded frame (also the timestamp step).
    pub samples_per_frame: usize,
    pub clock_rate: u32,
}

impl SpeechProfile {
    /// PCM bytes (s16) in one frame.
    pub fn frame_bytes(&self) -> usize {
        self.samples_per_frame * BYTES_PER_SAMPLE
    }
}

/// One outbound aggregate payload and its media timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedPayload {
    pub timestamp: u32,
    pub payload: Vec<u8>,
}

/// Aggregate payloads in, s16 little-endian PCM out (one buffer per frame).
pub struct SpeechDecoderFilter<D> {
    profile: &'static SpeechProfile,
    decoder: D,
}

impl<D: FrameDecoder> SpeechDecoderFilter<D> {
    pub fn new(profile: &'static SpeechProfile, decoder: D) -> Self {
        tracing::debug!(codec = profile.name, "speech decoder initialised");
        Self { profile, decoder }
    }

    pub fn profile(&self) -> &'static SpeechProfile {
        self.profile
    }

    fn decode_frame(&mut self, frame: &[u8]) -> Result<Vec<u8>, CodecError> {
        let samples = self.decoder.decode(frame)?;
        if samples.len() != self.profile.samples_per_frame {
            return Err(CodecError::UnexpectedLength {
                expected: self.profile.samples_per_frame,
                actual: samples.len(),
            });
        }
        Ok(samples.iter().flat_map(|s| s.to_le_bytes()).collect())
    }
}

impl<D: FrameDecoder> Filter for SpeechDecoderFilter<D> {
    type Input = Vec<u8>;
    type Output = Vec<u8>;

    fn name(&self) -> &'static str {
        self.profile.name
    }

    fn process(&mut self, inbound: &mut VecDeque<Vec<u8>>, outbound: &mut VecDeque<Vec<u8>>) {
        while let Some(payload) = inbound.pop_front() {
            let demuxed = match toc::demux(&payload, self.profile.frame_sizes) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(
                        codec = self.profile.name,
                        len = payload.len(),
                        error = %e,
                        "dropping payload"
                    );
                    continue;
                }
            };

            for frame in &demuxed.frames {
                match self.decode_frame(frame) {
                    Ok(pcm) => outbound.push_back(pcm),
                    Err(e) => tracing::warn!(
                        codec = self.profile.name,
                        toc = frame[0],
                        error = %e,
                        "failed to decode frame"
                    ),
                }
            }

            match demuxed.status {
                DemuxStatus::Complete => {}
                DemuxStatus::Truncated {
                    entry,
                    needed,
                    remaining,
                } => tracing::warn!(
                    codec = self.profile.name,
                    entry,
                    needed,
                    remaining,
                    "truncated frame"
                ),
                DemuxStatus::InvalidMode { entry, mode } => {
                    tracing::warn!(codec = self.profile.name, entry, mode, "invalid frame mode")
                }
            }
        }
    }
}

/// s16 little-endian PCM in, timestamped aggregate payloads out.
///
/// Input bytes are buffered until a whole frame is available. Each
/// emitted payload advances the timestamp by one frame's sample count;
/// frames the encoder suppresses (DTX) produce nothing and do not move
/// the timestamp.
pub struct SpeechEncoderFilter<E> {
    profile: &'static SpeechProfile,
    encoder: E,
    params: SpeechParams,
    pending: Vec<u8>,
    timestamp: u32,
}

impl<E: FrameEncoder> SpeechEncoderFilter<E> {
    pub fn new(profile: &'static SpeechProfile, encoder: E, params: SpeechParams) -> Self {
        tracing::debug!(
            codec = profile.name,
            vad = params.vad,
            mode = params.mode,
            "speech encoder initialised"
        );
        Self {
            profile,
            encoder,
            params,
            pending: Vec::new(),
            timestamp: 0,
        }
    }

    pub fn params(&self) -> &SpeechParams {
        &self.params
    }

    /// Timestamp the next payload will carry.
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Bytes buffered towards the next frame.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Push new VAD/mode settings to the encoder.
    pub fn set_params(&mut self, params: SpeechParams) -> Result<(), CodecError> {
        self.encoder.configure(&params)?;
        tracing::info!(
            codec = self.profile.name,
            vad = params.vad,
            mode = params.mode,
            "speech encoder reconfigured"
        );
        self.params = params;
        Ok(())
    }

    /// Discard buffered samples (end of session).
    pub fn flush(&mut self) {
        self.pending.clear();
    }
}

impl<E: FrameEncoder> Filter for SpeechEncoderFilter<E> {
    type Input = Vec<u8>;
    type Output = TimedPayload;

    fn name(&self) -> &'static str {
        self.profile.name
    }

    fn process(&mut self, inbound: &mut VecDeque<Vec<u8>>, outbound: &mut VecDeque<TimedPayload>) {
        for pcm in inbound.drain(..) {
            self.pending.extend_from_slice(&pcm);
        }

        let frame_bytes = self.profile.frame_bytes();
        while self.pending.len() >= frame_bytes {
            let samples: Vec<i16> = self
                .pending
                .drain(..frame_bytes)
                .as_slice()
                .chunks_exact(BYTES_PER_SAMPLE)
                .map(|b| i16::from_le_bytes([b[0], b[1]]))
                .collect();

            let frame = match self.encoder.encode(&samples) {
                Ok(frame) if frame.is_empty() => {
                    tracing::trace!(codec = self.profile.name, "encoder produced no frame");
                    continue;
                }
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(codec = self.profile.name, error = %e, "failed to encode frame");
                    continue;
                }
            };

            outbound.push_back(TimedPayload {
                timestamp: self.timestamp,
                payload: toc::mux(&frame),
            });
            self.timestamp = self
                .timestamp
                .wrapping_add(self.profile.samples_per_frame as u32);
        }
    }
}
