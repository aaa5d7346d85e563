//! AMR-NB (RFC 4867, octet-aligned) framing constants.
//!
//! | Mode | Rate | Body bytes |
//! |------|------|------------|
//! | 0 | 4.75 kbit/s | 12 |
//! | 1 | 5.15 kbit/s | 13 |
//! | 2 | 5.90 kbit/s | 15 |
//! | 3 | 6.70 kbit/s | 17 |
//! | 4 | 7.40 kbit/s | 19 |
//! | 5 | 7.95 kbit/s | 20 |
//! | 6 | 10.2 kbit/s | 26 |
//! | 7 | 12.2 kbit/s | 31 |
//! | 8 | SID | 5 |

use super::speech::SpeechProfile;
use super::toc::FrameSizeTable;

pub static FRAME_SIZES: FrameSizeTable =
    FrameSizeTable::new([12, 13, 15, 17, 19, 20, 26, 31, 5, 0, 0, 0, 0, 0, 0, 0]);

/// 20 ms at 8 kHz.
pub const SAMPLES_PER_FRAME: usize = 160;

pub static PROFILE: SpeechProfile = SpeechProfile {
    name: "AMR",
    frame_sizes: &FRAME_SIZES,
    samples_per_frame: SAMPLES_PER_FRAME,
    clock_rate: 8000,
};

/// Speech coding modes an encoder can be asked to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmrMode {
    Mr475 = 0,
    Mr515 = 1,
    Mr59 = 2,
    Mr67 = 3,
    Mr74 = 4,
    Mr795 = 5,
    Mr102 = 6,
    #[default]
    Mr122 = 7,
}

impl AmrMode {
    pub fn from_index(index: u8) -> Option<Self> {
        Some(match index {
            0 => Self::Mr475,
            1 => Self::Mr515,
            2 => Self::Mr59,
            3 => Self::Mr67,
            4 => Self::Mr74,
            5 => Self::Mr795,
            6 => Self::Mr102,
            7 => Self::Mr122,
            _ => return None,
        })
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn bitrate(self) -> u32 {
        match self {
            Self::Mr475 => 4750,
            Self::Mr515 => 5150,
            Self::Mr59 => 5900,
            Self::Mr67 => 6700,
            Self::Mr74 => 7400,
            Self::Mr795 => 7950,
            Self::Mr102 => 10200,
            Self::Mr122 => 12200,
        }
    }

}
