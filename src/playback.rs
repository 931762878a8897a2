use crate::audio::AudioOutput;
use crate::error::SessionError;
use office_voice_types::Blob;
use office_voice_utils::audio::OUTPUT_PCM16_SAMPLE_RATE;
use office_voice_utils::DecodedAudio;
use std::collections::HashSet;
use tokio::sync::mpsc;

/// Schedules synthesized audio back to back on an output clock.
///
/// Each chunk starts at `max(cursor, now)` and advances the cursor by its
/// duration, so chunks never overlap and keep arrival order. Chunks that
/// arrive late start immediately. One scheduler lives for one session.
pub struct PlaybackScheduler {
    next_start: f64,
    next_id: u64,
    playing: HashSet<u64>,
    ended_tx: mpsc::UnboundedSender<u64>,
}

impl PlaybackScheduler {
    /// Returns the scheduler and the receiver for its end notifications.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<u64>) {
        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            next_start: 0.0,
            next_id: 0,
            playing: HashSet::new(),
            ended_tx,
        };
        (scheduler, ended_rx)
    }

    /// Decodes one inline audio payload (mono, 24 kHz PCM16) and schedules it.
    pub fn enqueue(&mut self, output: &mut dyn AudioOutput, payload: &Blob) -> Result<f64, SessionError> {
        let audio = DecodedAudio::from_base64(&payload.data, OUTPUT_PCM16_SAMPLE_RATE, 1)
            .map_err(SessionError::audio)?;
        self.schedule(output, audio)
    }

    /// Schedules a decoded chunk and returns its start time on the output clock.
    pub fn schedule(&mut self, output: &mut dyn AudioOutput, audio: DecodedAudio) -> Result<f64, SessionError> {
        let start = self.next_start.max(output.current_time());
        let duration = audio.duration();
        let id = self.next_id;
        self.next_id += 1;

        output.start(id, audio, start, self.ended_tx.clone())?;
        self.playing.insert(id);
        self.next_start = start + duration;
        tracing::trace!("scheduled chunk {} at {:.3}s for {:.3}s", id, start, duration);
        Ok(start)
    }

    /// Releases a finished chunk. Returns `true` once nothing is left playing.
    pub fn on_ended(&mut self, id: u64) -> bool {
        self.playing.remove(&id);
        self.playing.is_empty()
    }

    pub fn is_playing(&self) -> bool {
        !self.playing.is_empty()
    }

    /// Stops every tracked chunk, finished or not, and forgets them.
    pub fn halt(&mut self, output: &mut dyn AudioOutput) {
        for id in self.playing.drain() {
            output.stop(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeOutput;

    fn chunk(seconds: f64) -> DecodedAudio {
        let frames = (seconds * OUTPUT_PCM16_SAMPLE_RATE as f64) as usize;
        DecodedAudio::new(vec![0.0; frames], OUTPUT_PCM16_SAMPLE_RATE, 1).unwrap()
    }

    #[test]
    fn test_chunks_play_back_to_back() {
        let (mut output, probe) = FakeOutput::new();
        let (mut scheduler, _ended) = PlaybackScheduler::new();

        probe.set_time(0.125);
        let starts: Vec<f64> = [0.5, 0.25, 1.0]
            .into_iter()
            .map(|s| scheduler.schedule(&mut output, chunk(s)).unwrap())
            .collect();
        assert_eq!(starts, vec![0.125, 0.625, 0.875]);

        let started = probe.started();
        for pair in started.windows(2) {
            assert!(pair[1].at >= pair[0].at + pair[0].duration - 1e-9);
        }
    }

    #[test]
    fn test_late_chunk_starts_now() {
        let (mut output, probe) = FakeOutput::new();
        let (mut scheduler, _ended) = PlaybackScheduler::new();

        scheduler.schedule(&mut output, chunk(0.5)).unwrap();
        probe.set_time(2.0);
        assert_eq!(scheduler.schedule(&mut output, chunk(0.5)).unwrap(), 2.0);
        assert_eq!(scheduler.schedule(&mut output, chunk(0.5)).unwrap(), 2.5);
    }

    #[test]
    fn test_speaking_clears_when_last_chunk_ends() {
        let (mut output, _probe) = FakeOutput::new();
        let (mut scheduler, _ended) = PlaybackScheduler::new();

        scheduler.schedule(&mut output, chunk(0.1)).unwrap();
        scheduler.schedule(&mut output, chunk(0.1)).unwrap();
        assert!(scheduler.is_playing());
        assert!(!scheduler.on_ended(1));
        assert!(scheduler.on_ended(0));
        assert!(!scheduler.is_playing());
    }

    #[test]
    fn test_halt_stops_everything() {
        let (mut output, probe) = FakeOutput::new();
        let (mut scheduler, _ended) = PlaybackScheduler::new();

        for _ in 0..3 {
            scheduler.schedule(&mut output, chunk(0.1)).unwrap();
        }
        scheduler.on_ended(0);
        scheduler.halt(&mut output);

        let mut stopped = probe.stopped();
        stopped.sort();
        assert_eq!(stopped, vec![1, 2]);
        assert!(!scheduler.is_playing());
    }

    #[test]
    fn test_enqueue_rejects_malformed_payload() {
        let (mut output, probe) = FakeOutput::new();
        let (mut scheduler, _ended) = PlaybackScheduler::new();

        let result = scheduler.enqueue(&mut output, &Blob::new("not base64!".to_string(), "audio/pcm"));
        assert!(matches!(result, Err(SessionError::Audio(_))));
        assert!(probe.started().is_empty());

        // 4 bytes = 2 samples at 24 kHz
        let start = scheduler
            .enqueue(&mut output, &Blob::new("AAAAAA==".to_string(), "audio/pcm;rate=24000"))
            .unwrap();
        assert_eq!(start, 0.0);
        assert_eq!(probe.started().len(), 1);
    }
}
