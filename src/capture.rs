use crate::error::SessionError;
use crate::realtime_api::RealtimeTransport;
use office_voice_types::Blob;
use office_voice_utils::audio::{self, INPUT_PCM16_MIME_TYPE, INPUT_PCM16_SAMPLE_RATE};
use rubato::{FastFixedIn, Resampler};

/// Frames raw microphone audio into fixed-size chunks and streams them as
/// 16 kHz PCM16 realtime input.
pub struct CapturePipeline {
    frame_size: usize,
    pending: Vec<f32>,
    resampler: Option<FastFixedIn<f32>>,
}

impl CapturePipeline {
    /// `input_rate` is the microphone's native rate; frames are counted in
    /// device samples and resampled to 16 kHz before encoding.
    pub fn new(input_rate: u32, frame_size: usize) -> Result<Self, SessionError> {
        let resampler = if input_rate != INPUT_PCM16_SAMPLE_RATE {
            tracing::debug!("capture resampling {} Hz -> {} Hz", input_rate, INPUT_PCM16_SAMPLE_RATE);
            let resampler = audio::create_resampler(
                input_rate as f64,
                INPUT_PCM16_SAMPLE_RATE as f64,
                frame_size,
            )
            .map_err(|e| SessionError::audio(format!("{e:#}")))?;
            Some(resampler)
        } else {
            None
        };
        Ok(Self {
            frame_size,
            pending: Vec::with_capacity(frame_size * 2),
            resampler,
        })
    }

    /// Buffers samples and returns one encoded packet per completed frame.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Blob> {
        self.pending.extend_from_slice(samples);
        let mut packets = Vec::new();
        while self.pending.len() >= self.frame_size {
            let frame: Vec<f32> = self.pending.drain(..self.frame_size).collect();
            match self.encode_frame(frame) {
                Ok(packet) => packets.push(packet),
                Err(e) => tracing::warn!("dropping captured frame: {}", e),
            }
        }
        packets
    }

    /// Sends completed frames over `transport` if it is still live.
    ///
    /// Without a live connection the samples are discarded. Send failures
    /// are logged and the frame is lost.
    pub fn submit(&mut self, samples: &[f32], transport: Option<&dyn RealtimeTransport>) {
        let Some(transport) = transport.filter(|t| t.is_open()) else {
            tracing::trace!("no live connection, dropping {} captured samples", samples.len());
            self.pending.clear();
            return;
        };
        for packet in self.push(samples) {
            if let Err(e) = transport.send_realtime_input(packet) {
                tracing::warn!("Error sending audio data: {}", e);
            }
        }
    }

    fn encode_frame(&mut self, frame: Vec<f32>) -> Result<Blob, SessionError> {
        let frame = match self.resampler.as_mut() {
            Some(resampler) => resampler
                .process(&[frame], None)
                .map_err(SessionError::audio)?
                .swap_remove(0),
            None => frame,
        };
        Ok(Blob::new(audio::encode(&frame), INPUT_PCM16_MIME_TYPE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use office_voice_types::ClientMessage;
    use office_voice_utils::audio::decode_pcm16;

    #[test]
    fn test_frames_are_fixed_size_pcm16() {
        let mut pipeline = CapturePipeline::new(16000, 4096).unwrap();
        assert!(pipeline.push(&vec![0.5; 3000]).is_empty());

        let packets = pipeline.push(&vec![0.5; 2000]);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].mime_type, "audio/pcm;rate=16000");
        let pcm = decode_pcm16(&packets[0].data).unwrap();
        assert_eq!(pcm.len(), 4096);
        assert!(pcm.iter().all(|&s| s == 16384));
        assert_eq!(pipeline.pending.len(), 904);
    }

    #[test]
    fn test_device_rate_is_resampled() {
        let mut pipeline = CapturePipeline::new(48000, 4096).unwrap();
        let packets = pipeline.push(&vec![0.0; 4096]);
        assert_eq!(packets.len(), 1);
        let pcm = decode_pcm16(&packets[0].data).unwrap();
        assert!((1300..=1400).contains(&pcm.len()), "got {}", pcm.len());
    }

    #[test]
    fn test_submit_requires_live_transport() {
        let mut pipeline = CapturePipeline::new(16000, 4).unwrap();
        let (transport, log) = FakeTransport::new();

        pipeline.submit(&[0.1; 6], Some(&transport));
        assert_eq!(log.sent().len(), 1);
        assert!(matches!(log.sent()[0], ClientMessage::RealtimeInput(_)));

        pipeline.submit(&[0.1; 8], None);
        assert_eq!(log.sent().len(), 1);
        assert!(pipeline.pending.is_empty());
    }

    #[test]
    fn test_submit_failures_are_absorbed() {
        let mut pipeline = CapturePipeline::new(16000, 4).unwrap();
        let (transport, log) = FakeTransport::new();
        log.fail_sends();

        pipeline.submit(&[0.1; 8], Some(&transport));
        assert!(log.sent().is_empty());
    }
}
