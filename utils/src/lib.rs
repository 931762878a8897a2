pub mod audio;
pub mod device;

pub use audio::{CodecError, DecodedAudio};
