use base64::Engine;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

/// Sample rate of the PCM16 stream sent to the realtime model.
pub const INPUT_PCM16_SAMPLE_RATE: u32 = 16000;
/// Sample rate of the PCM16 audio synthesized by the realtime model.
pub const OUTPUT_PCM16_SAMPLE_RATE: u32 = 24000;
/// MIME type attached to every outbound realtime media packet.
pub const INPUT_PCM16_MIME_TYPE: &str = "audio/pcm;rate=16000";

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("PCM16 payload has an odd number of bytes ({0})")]
    OddLength(usize),
    #[error("audio buffer must have at least one channel and a non-zero sample rate")]
    InvalidFormat,
}

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Splits a slice of audio samples into fixed-size chunks.
/// The last chunk is padded with zeros.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

const RESAMPLE_CHUNK_SIZE: usize = 1024;

/// Resamples a complete mono buffer, trimming the padding of the final chunk.
pub fn resample(samples: &[f32], in_rate: u32, out_rate: u32) -> anyhow::Result<Vec<f32>> {
    if in_rate == out_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let mut resampler = create_resampler(in_rate as f64, out_rate as f64, RESAMPLE_CHUNK_SIZE)?;
    let expected = (samples.len() as u64 * out_rate as u64 / in_rate as u64) as usize;
    let mut resampled = Vec::with_capacity(expected + RESAMPLE_CHUNK_SIZE);
    for chunk in split_for_chunks(samples, RESAMPLE_CHUNK_SIZE) {
        let mut output = resampler.process(&[chunk], None)?;
        resampled.append(&mut output[0]);
    }
    resampled.truncate(expected);
    Ok(resampled)
}

/// Converts float samples to signed 16-bit PCM.
///
/// Samples are scaled by 32768 with no dithering. The float-to-int cast
/// saturates, so `1.0` lands on `i16::MAX`.
pub fn float_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&sample| (sample * 32768.0) as i16).collect()
}

/// Converts signed 16-bit PCM to float samples in `[-1.0, 1.0)`.
pub fn pcm16_to_float(pcm16: &[i16]) -> Vec<f32> {
    pcm16.iter().map(|&sample| sample as f32 / 32768.0).collect()
}

/// Encodes PCM16 samples as little-endian bytes wrapped in base64.
pub fn encode_pcm16(pcm16: &[i16]) -> String {
    let bytes: Vec<u8> = pcm16.to_binary();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decodes a base64 string of little-endian PCM16 bytes.
pub fn decode_pcm16(base64_fragment: &str) -> Result<Vec<i16>, CodecError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(base64_fragment)?;
    if bytes.len() % 2 != 0 {
        return Err(CodecError::OddLength(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect())
}

/// Encodes float samples straight to the outbound wire encoding.
pub fn encode(samples: &[f32]) -> String {
    encode_pcm16(&float_to_pcm16(samples))
}

/// A decoded buffer of interleaved float samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self, CodecError> {
        if sample_rate == 0 || channels == 0 {
            return Err(CodecError::InvalidFormat);
        }
        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Decodes a base64 PCM16 payload into a float buffer of the given format.
    pub fn from_base64(
        base64_fragment: &str,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, CodecError> {
        let pcm16 = decode_pcm16(base64_fragment)?;
        Self::new(pcm16_to_float(&pcm16), sample_rate, channels)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// A trait for converting audio sample types to a binary representation (Vec<u8>).
pub trait ToBinary {
    fn to_binary(&self) -> Vec<u8>;
}

impl ToBinary for [i16] {
    fn to_binary(&self) -> Vec<u8> {
        self.iter()
            .flat_map(|&sample| sample.to_le_bytes())
            .collect()
    }
}
