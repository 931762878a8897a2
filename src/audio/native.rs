//! `cpal`-backed microphone and playback context.

use super::{AudioHost, AudioOutput, Microphone};
use crate::error::SessionError;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;
use office_voice_utils::{audio, device, DecodedAudio};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Hosts report refused capture through backend-specific messages.
fn device_error(message: String) -> SessionError {
    let lowered = message.to_lowercase();
    if lowered.contains("permission") || lowered.contains("denied") || lowered.contains("not allowed") {
        SessionError::PermissionDenied(message)
    } else {
        SessionError::Audio(message)
    }
}

fn mixdown(data: &[f32], channels: usize) -> Vec<f32> {
    if channels > 1 {
        data.chunks(channels)
            .map(|c| c.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        data.to_vec()
    }
}

/// Opens devices on the default `cpal` host.
pub struct CpalHost {
    input_device: Option<String>,
    output_device: Option<String>,
}

impl CpalHost {
    pub fn new(input_device: Option<String>, output_device: Option<String>) -> Self {
        Self {
            input_device,
            output_device,
        }
    }
}

#[async_trait(?Send)]
impl AudioHost for CpalHost {
    async fn acquire_microphone(&self) -> Result<Box<dyn Microphone>, SessionError> {
        let input = device::get_or_default_input(self.input_device.as_deref())
            .map_err(|e| SessionError::audio(format!("{e:#}")))?;
        tracing::info!("Using input device: {:?}", input.name().unwrap_or_default());

        let input_config = input
            .default_input_config()
            .map_err(|e| device_error(e.to_string()))?;
        let input_config = StreamConfig {
            channels: input_config.channels(),
            sample_rate: input_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };
        let input_channel_count = input_config.channels as usize;
        tracing::info!("Input stream config: {:?}", &input_config);

        let sink: FrameSink = Arc::new(Mutex::new(None));
        let callback_sink = sink.clone();
        let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let guard = lock(&callback_sink);
            let Some(tx) = guard.as_ref() else {
                return;
            };
            if let Err(TrySendError::Full(_)) = tx.try_send(mixdown(data, input_channel_count)) {
                tracing::warn!("capture queue full, dropping microphone frame");
            }
        };

        let stream = input
            .build_input_stream(
                &input_config,
                input_data_fn,
                move |err| tracing::error!("An error occurred on input stream: {}", err),
                None,
            )
            .map_err(|e| device_error(e.to_string()))?;
        stream.play().map_err(|e| device_error(e.to_string()))?;

        Ok(Box::new(CpalMicrophone {
            stream: Some(stream),
            sink,
            sample_rate: input_config.sample_rate.0,
        }))
    }

    fn open_output(&self, sample_rate: u32) -> Result<Box<dyn AudioOutput>, SessionError> {
        let output = device::get_or_default_output(self.output_device.as_deref())
            .map_err(|e| SessionError::audio(format!("{e:#}")))?;
        tracing::info!("Using output device: {:?}", output.name().unwrap_or_default());

        let output_config = output
            .default_output_config()
            .map_err(SessionError::audio)?;
        let output_config = StreamConfig {
            channels: output_config.channels(),
            sample_rate: output_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };
        let output_channel_count = output_config.channels as usize;
        tracing::info!("Output stream config: {:?}", &output_config);

        let mixer = Arc::new(Mutex::new(Mixer::default()));
        let callback_mixer = mixer.clone();
        let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            render_or_silence(&callback_mixer, data, output_channel_count);
        };

        let stream = output
            .build_output_stream(
                &output_config,
                output_data_fn,
                move |err| tracing::error!("An error occurred on output stream: {}", err),
                None,
            )
            .map_err(SessionError::audio)?;
        stream.play().map_err(SessionError::audio)?;

        Ok(Box::new(CpalOutput {
            stream: Some(stream),
            mixer,
            device_rate: output_config.sample_rate.0,
            sample_rate,
        }))
    }
}

type FrameSink = Arc<Mutex<Option<mpsc::Sender<Vec<f32>>>>>;

pub struct CpalMicrophone {
    stream: Option<cpal::Stream>,
    sink: FrameSink,
    sample_rate: u32,
}

impl Microphone for CpalMicrophone {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn connect(&mut self, sink: mpsc::Sender<Vec<f32>>) {
        *lock(&self.sink) = Some(sink);
    }

    fn disconnect(&mut self) {
        // The callback holds this lock while delivering, so once it is
        // released no further frame can reach the old sink.
        lock(&self.sink).take();
    }

    fn stop(&mut self) {
        self.disconnect();
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!("failed to pause input stream: {}", e);
            }
        }
    }
}

struct Voice {
    id: u64,
    start_frame: u64,
    samples: Vec<f32>,
    position: usize,
    ended: mpsc::UnboundedSender<u64>,
}

/// Sums scheduled voices into the device buffer and keeps the output clock.
#[derive(Default)]
struct Mixer {
    frames_rendered: u64,
    voices: Vec<Voice>,
}

impl Mixer {
    fn render(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let mut frames = 0u64;
        for frame in data.chunks_mut(channels) {
            let clock = self.frames_rendered + frames;
            let mut sample = 0.0f32;
            for voice in self.voices.iter_mut() {
                if voice.start_frame <= clock && voice.position < voice.samples.len() {
                    sample += voice.samples[voice.position];
                    voice.position += 1;
                }
            }
            let sample = sample.clamp(-1.0, 1.0);
            // Left and right carry the mix; any other channel stays silent.
            for (channel, out) in frame.iter_mut().enumerate() {
                *out = if channel < 2 { sample } else { 0.0 };
            }
            frames += 1;
        }
        self.frames_rendered += frames;

        self.voices.retain(|voice| {
            if voice.position < voice.samples.len() {
                return true;
            }
            let _ = voice.ended.send(voice.id);
            false
        });
    }
}

/// Device-thread entry point. Never waits on the session task: a contended
/// buffer is played as silence and does not advance the mixer clock.
fn render_or_silence(mixer: &Mutex<Mixer>, data: &mut [f32], channels: usize) {
    match mixer.try_lock() {
        Ok(mut mixer) => mixer.render(data, channels),
        Err(TryLockError::Poisoned(e)) => e.into_inner().render(data, channels),
        Err(TryLockError::WouldBlock) => data.fill(0.0),
    }
}

pub struct CpalOutput {
    stream: Option<cpal::Stream>,
    mixer: Arc<Mutex<Mixer>>,
    device_rate: u32,
    sample_rate: u32,
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        lock(&self.mixer).frames_rendered as f64 / self.device_rate as f64
    }

    fn start(
        &mut self,
        id: u64,
        audio: DecodedAudio,
        at: f64,
        ended: mpsc::UnboundedSender<u64>,
    ) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::audio("output is closed"));
        }
        let mono = mixdown(audio.samples(), audio.channels() as usize);
        let samples = audio::resample(&mono, audio.sample_rate(), self.device_rate)
            .map_err(|e| SessionError::audio(format!("{e:#}")))?;
        let start_frame = (at.max(0.0) * self.device_rate as f64).round() as u64;
        lock(&self.mixer).voices.push(Voice {
            id,
            start_frame,
            samples,
            position: 0,
            ended,
        });
        Ok(())
    }

    fn stop(&mut self, id: u64) {
        lock(&self.mixer).voices.retain(|voice| voice.id != id);
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!("failed to pause output stream: {}", e);
            }
        }
        lock(&self.mixer).voices.clear();
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(id: u64, start_frame: u64, samples: Vec<f32>, ended: &mpsc::UnboundedSender<u64>) -> Voice {
        Voice {
            id,
            start_frame,
            samples,
            position: 0,
            ended: ended.clone(),
        }
    }

    #[test]
    fn test_voices_start_on_their_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut mixer = Mixer::default();
        mixer.voices.push(voice(1, 0, vec![0.5; 2], &tx));
        mixer.voices.push(voice(2, 2, vec![0.25; 2], &tx));

        let mut data = vec![9.0f32; 10];
        mixer.render(&mut data, 2);
        assert_eq!(data, vec![0.5, 0.5, 0.5, 0.5, 0.25, 0.25, 0.25, 0.25, 0.0, 0.0]);
        assert_eq!(mixer.frames_rendered, 5);
        assert_eq!(rx.try_recv().unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap(), 2);
        assert!(mixer.voices.is_empty());
    }

    #[test]
    fn test_overlapping_voices_are_summed_and_clamped() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut mixer = Mixer::default();
        mixer.voices.push(voice(1, 0, vec![0.75; 4], &tx));
        mixer.voices.push(voice(2, 0, vec![0.75; 4], &tx));

        let mut data = vec![0.0f32; 3];
        mixer.render(&mut data, 3);
        assert_eq!(data, vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unfinished_voice_does_not_notify() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut mixer = Mixer::default();
        mixer.voices.push(voice(7, 100, vec![0.1; 4], &tx));

        let mut data = vec![0.0f32; 64];
        mixer.render(&mut data, 1);
        assert!(rx.try_recv().is_err());
        assert_eq!(mixer.voices.len(), 1);
    }

    #[test]
    fn test_contended_mixer_renders_silence() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mixer = Mutex::new(Mixer::default());
        lock(&mixer).voices.push(voice(1, 0, vec![0.5; 4], &tx));

        let held = lock(&mixer);
        let mut data = vec![9.0f32; 4];
        render_or_silence(&mixer, &mut data, 2);
        assert_eq!(data, vec![0.0; 4]);
        drop(held);

        let mixer = lock(&mixer);
        assert_eq!(mixer.frames_rendered, 0);
        assert_eq!(mixer.voices[0].position, 0);
    }

    #[test]
    fn test_uncontended_mixer_renders_voices() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mixer = Mutex::new(Mixer::default());
        lock(&mixer).voices.push(voice(1, 0, vec![0.5; 4], &tx));

        let mut data = vec![0.0f32; 4];
        render_or_silence(&mixer, &mut data, 2);
        assert_eq!(data, vec![0.5; 4]);
        assert_eq!(lock(&mixer).frames_rendered, 2);
    }

    #[test]
    fn test_mixdown_averages_channels() {
        assert_eq!(mixdown(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(mixdown(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }
}
