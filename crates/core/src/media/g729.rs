//! G.729 Annex A/B framing constants.
//!
//! Mode 0 is a 10 ms speech frame (10 bytes), mode 1 an Annex B SID
//! frame (2 bytes). All other modes are reserved.

use super::speech::SpeechProfile;
use super::toc::FrameSizeTable;

pub static FRAME_SIZES: FrameSizeTable =
    FrameSizeTable::new([10, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);

/// 10 ms at 8 kHz.
pub const SAMPLES_PER_FRAME: usize = 80;

pub static PROFILE: SpeechProfile = SpeechProfile {
    name: "G729",
    frame_sizes: &FRAME_SIZES,
    samples_per_frame: SAMPLES_PER_FRAME,
    clock_rate: 8000,
};
