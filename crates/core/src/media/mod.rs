//! Codec payload framing and per-tick filters.
//!
//! This module provides the framing core that sits between network
//! payloads and the hardware codec engine, plus the [`Filter`] trait the
//! host scheduler drives once per tick.
//!
//! ## Framing
//!
//! | Direction | Audio ([`toc`]) | Video ([`h264`]) |
//! |-----------|-----------------|------------------|
//! | receive   | payload → `[TOC][body]` frames | coding units → escaped Annex B |
//! | send      | coded frame → payload | encoder output → coding units |
//!
//! ## Supported codecs
//!
//! | Codec  | Module | Samples/frame | Frame-size table |
//! |--------|--------|---------------|------------------|
//! | AMR-NB | [`amr`] | 160 | 12,13,15,17,19,20,26,31,5 |
//! | G.729  | [`g729`] | 80 | 10,2 |
//! | H.264  | [`h264`] | — | — |
//!
//! ## Hardware boundary
//!
//! The engine itself is injected through [`FrameDecoder`],
//! [`FrameEncoder`], [`PictureDecoder`] and [`PictureEncoder`]. The
//! framing code never sees engine handles or DMA buffers.

pub mod amr;
pub mod g729;
pub mod h264;
pub mod parameter_sets;
pub mod speech;
pub mod toc;
pub mod video;

use std::collections::VecDeque;

use crate::config::SpeechParams;
use crate::error::CodecError;

/// One processing step of a filter graph.
///
/// The scheduler calls [`process`](Self::process) once per tick. An
/// implementation drains `inbound` completely and pushes zero or more
/// items to `outbound`; it never blocks beyond the synchronous engine
/// call.
pub trait Filter {
    type Input;
    type Output;

    /// Filter name as registered with the host graph.
    fn name(&self) -> &'static str;

    fn process(
        &mut self,
        inbound: &mut VecDeque<Self::Input>,
        outbound: &mut VecDeque<Self::Output>,
    );
}

/// Hardware speech decoder.
pub trait FrameDecoder {
    /// Decode one frame laid out as `[TOC byte][body]` into exactly one
    /// frame's worth of samples.
    fn decode(&mut self, frame: &[u8]) -> Result<Vec<i16>, CodecError>;
}

/// Hardware speech encoder.
pub trait FrameEncoder {
    /// Encode one frame's worth of samples. The result uses the same
    /// `[TOC byte][body]` layout [`FrameDecoder::decode`] accepts.
    fn encode(&mut self, samples: &[i16]) -> Result<Vec<u8>, CodecError>;

    /// Apply new VAD/DTX and mode settings.
    fn configure(&mut self, _params: &SpeechParams) -> Result<(), CodecError> {
        Ok(())
    }
}

/// Hardware video encoder.
pub trait PictureEncoder {
    /// Encode one raw picture. The returned buffer is the engine's raw
    /// output: a short junk prefix followed by start-code-delimited units.
    fn encode(&mut self, picture: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Ask for the next picture to be coded as a keyframe.
    fn request_keyframe(&mut self) {}
}

/// Hardware video decoder.
pub trait PictureDecoder {
    /// Decode one escaped Annex B access unit and return any pictures the
    /// engine released for display.
    fn decode(&mut self, bitstream: &[u8]) -> Result<Vec<Vec<u8>>, CodecError>;
}
