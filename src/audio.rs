//! Seams between the session and the platform's audio devices.
//!
//! Device handles are owned by the session task and are not `Send`
//! (`cpal` streams are pinned to the thread that built them).

use crate::error::SessionError;
use async_trait::async_trait;
use office_voice_utils::DecodedAudio;
use tokio::sync::mpsc;

pub mod native;

/// A live microphone.
pub trait Microphone {
    /// Rate of the mono frames delivered to the sink.
    fn sample_rate(&self) -> u32;

    /// Routes captured mono frames into `sink`, replacing any previous sink.
    /// Frames that do not fit are dropped.
    fn connect(&mut self, sink: mpsc::Sender<Vec<f32>>);

    /// Stops routing frames. No frame is delivered after this returns.
    fn disconnect(&mut self);

    /// Releases the device.
    fn stop(&mut self);
}

/// A playback context with its own clock.
pub trait AudioOutput {
    fn sample_rate(&self) -> u32;

    /// Seconds of audio rendered since the context was opened.
    fn current_time(&self) -> f64;

    /// Plays `audio` starting at `at` on the context clock. `ended` receives
    /// `id` once the last sample has been rendered.
    fn start(
        &mut self,
        id: u64,
        audio: DecodedAudio,
        at: f64,
        ended: mpsc::UnboundedSender<u64>,
    ) -> Result<(), SessionError>;

    /// Silences one scheduled source. No end notification follows.
    fn stop(&mut self, id: u64);

    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

#[async_trait(?Send)]
pub trait AudioHost {
    /// Opens the microphone. A refused device is [`SessionError::PermissionDenied`].
    async fn acquire_microphone(&self) -> Result<Box<dyn Microphone>, SessionError>;

    fn open_output(&self, sample_rate: u32) -> Result<Box<dyn AudioOutput>, SessionError>;
}
