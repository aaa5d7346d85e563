//! Negotiated session parameters.
//!
//! These are pass-through values handed in by the signalling layer; none
//! of them change how payloads are framed.

use crate::media::amr::AmrMode;

/// Default escaped bitstream buffer size for the H.264 decoder.
///
/// The engine asks for far more than a real access unit needs.
pub const DEFAULT_DECODER_BUFFER_SIZE: usize = 500_000;

/// Speech encoder settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechParams {
    /// Voice activity detection / discontinuous transmission.
    pub vad: bool,
    /// Codec mode selector ([`AmrMode`] index; ignored by G.729).
    pub mode: u8,
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self {
            vad: false,
            mode: AmrMode::default().index(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

impl VideoSize {
    pub const QCIF: Self = Self::new(176, 144);
    pub const CIF: Self = Self::new(352, 288);
    pub const VGA: Self = Self::new(640, 480);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// H.264 encoder session settings.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoEncoderConfig {
    /// Target bit rate in bit/s. Negative selects variable bit rate.
    pub bitrate: i32,
    pub size: VideoSize,
    pub fps: f32,
    /// RFC 6184 packetization mode from the negotiated fmtp.
    pub packetization_mode: u8,
    pub keyframe_interval_secs: u32,
}

impl Default for VideoEncoderConfig {
    fn default() -> Self {
        Self {
            bitrate: 384_000,
            size: VideoSize::CIF,
            fps: 30.0,
            packetization_mode: 0,
            keyframe_interval_secs: 10,
        }
    }
}

impl VideoEncoderConfig {
    /// Set the bit rate and pick the matching picture size and frame rate.
    pub fn set_bitrate(&mut self, bitrate: i32) {
        let (size, fps) = match bitrate {
            b if b >= 1_024_000 => (VideoSize::VGA, 25.0),
            b if b >= 512_000 => (VideoSize::VGA, 15.0),
            b if b >= 384_000 => (VideoSize::CIF, 30.0),
            b if b >= 128_000 => (VideoSize::CIF, 15.0),
            b if b >= 64_000 => (VideoSize::CIF, 10.0),
            b if b >= 32_000 => (VideoSize::QCIF, 10.0),
            _ => (VideoSize::QCIF, 5.0),
        };
        self.bitrate = bitrate;
        self.size = size;
        self.fps = fps;
        tracing::info!(
            bitrate,
            width = size.width,
            height = size.height,
            fps,
            "video encoder bitrate set"
        );
    }

    /// Apply fmtp parameters the encoder cares about (`packetization-mode`).
    pub fn apply_fmtp(&mut self, fmtp: &str) {
        let Some(value) = fmtp_value(fmtp, "packetization-mode") else {
            return;
        };
        match value.parse::<u8>() {
            Ok(mode) => {
                self.packetization_mode = mode;
                tracing::info!(mode, "packetization-mode set");
            }
            Err(_) => tracing::warn!(value, "ignoring unparsable packetization-mode"),
        }
    }
}

/// H.264 decoder session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDecoderConfig {
    /// Capacity of the escaped bitstream buffer handed to the engine.
    pub buffer_capacity: usize,
}

impl Default for VideoDecoderConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_DECODER_BUFFER_SIZE,
        }
    }
}

/// Look up `key` in an SDP fmtp parameter list (`a=b;c=d`, RFC 4566 §6).
///
/// Keys are matched case-insensitively; the value is trimmed.
pub fn fmtp_value<'a>(fmtp: &'a str, key: &str) -> Option<&'a str> {
    fmtp.split(';').find_map(|param| {
        let (k, v) = param.split_once('=')?;
        k.trim().eq_ignore_ascii_case(key).then(|| v.trim())
    })
}
