pub mod config;
pub mod error;
pub mod media;

pub use config::{SpeechParams, VideoDecoderConfig, VideoEncoderConfig};
pub use error::{CodecError, FramingError, Result};
pub use media::Filter;
