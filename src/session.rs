//! The realtime session state machine.
//!
//! `Idle -> Connecting -> AwaitingHandshake -> Active -> Closing -> Idle`
//!
//! One [`SessionController`] owns every session resource: the connection,
//! the microphone, the playback context and the in-flight tool calls. All of
//! them are driven from a single task through [`SessionController::step`];
//! nothing else may close them.

use crate::audio::{AudioHost, AudioOutput, Microphone};
use crate::capture::CapturePipeline;
use crate::config::{CAPTURE_FRAME_SIZE, CHANNEL_CAPACITY};
use crate::error::SessionError;
use crate::inventory::InventoryStore;
use crate::playback::PlaybackScheduler;
use crate::realtime_api::{Connector, RealtimeTransport};
use crate::tools::{schema, ToolDispatcher};
use futures::future::LocalBoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use office_voice_types::{FunctionCall, FunctionResponse, InboundEvent, ServerEvent, Setup, SetupConfigurator};
use office_voice_utils::audio::OUTPUT_PCM16_SAMPLE_RATE;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const STATUS_READY: &str = "Click 'Start Session' to begin";
pub const STATUS_INITIALIZING: &str = "Initializing session...";
pub const STATUS_LISTENING: &str = "Listening... Speak now.";
pub const STATUS_ENDED: &str = "Session ended. Click 'Start Session' to begin again.";

const INVENTORY_NOT_LOADED: &str = "Device data not loaded. Cannot start session.";
const API_KEY_MISSING: &str = "API key is not configured. Check your .env file.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    AwaitingHandshake,
    Active,
    Closing,
}

/// Running transcripts of the current turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcripts {
    pub user: String,
    pub bot: String,
}

impl Transcripts {
    fn clear(&mut self) {
        self.user.clear();
        self.bot.clear();
    }
}

type PendingToolCall = LocalBoxFuture<'static, FunctionResponse>;

enum Wake {
    Server(Option<ServerEvent>),
    Frame(Option<Vec<f32>>),
    PlaybackEnded(Option<u64>),
    ToolResolved(FunctionResponse),
}

async fn recv_opt<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn recv_opt_unbounded<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

pub struct SessionController {
    inventory: Arc<InventoryStore>,
    dispatcher: Arc<ToolDispatcher>,
    connector: Arc<dyn Connector>,
    host: Box<dyn AudioHost>,
    model: String,

    state: SessionState,
    status: String,
    transcripts: Transcripts,
    handshake_complete: bool,
    bot_speaking: bool,
    processing: bool,

    // Held here until the handshake completes, then moved to `connection`.
    handshaking: Option<Box<dyn RealtimeTransport>>,
    connection: Option<Box<dyn RealtimeTransport>>,
    events: Option<mpsc::Receiver<ServerEvent>>,

    microphone: Option<Box<dyn Microphone>>,
    capture: Option<CapturePipeline>,
    frames: Option<mpsc::Receiver<Vec<f32>>>,

    output: Option<Box<dyn AudioOutput>>,
    playback: Option<PlaybackScheduler>,
    ended: Option<mpsc::UnboundedReceiver<u64>>,

    pending_tools: FuturesUnordered<PendingToolCall>,
}

impl SessionController {
    pub fn new(
        inventory: Arc<InventoryStore>,
        connector: Arc<dyn Connector>,
        host: Box<dyn AudioHost>,
        model: &str,
    ) -> Self {
        Self {
            dispatcher: Arc::new(ToolDispatcher::new(inventory.clone())),
            inventory,
            connector,
            host,
            model: model.to_string(),
            state: SessionState::Idle,
            status: STATUS_READY.to_string(),
            transcripts: Transcripts::default(),
            handshake_complete: false,
            bot_speaking: false,
            processing: false,
            handshaking: None,
            connection: None,
            events: None,
            microphone: None,
            capture: None,
            frames: None,
            output: None,
            playback: None,
            ended: None,
            pending_tools: FuturesUnordered::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn transcripts(&self) -> &Transcripts {
        &self.transcripts
    }

    pub fn is_session_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn is_bot_speaking(&self) -> bool {
        self.bot_speaking
    }

    pub fn handshake_complete(&self) -> bool {
        self.handshake_complete
    }

    pub fn has_connection(&self) -> bool {
        self.connection.is_some() || self.handshaking.is_some()
    }

    pub fn has_microphone(&self) -> bool {
        self.microphone.is_some()
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn pending_tool_calls(&self) -> usize {
        self.pending_tools.len()
    }

    /// The configuration payload sent as the first message of a session.
    pub fn session_setup(&self, instruction: &str) -> Setup {
        SetupConfigurator::new(&self.model)
            .with_modalities_enable_audio()
            .with_instructions(instruction)
            .with_function_declarations(schema::function_declarations())
            .with_input_audio_transcription_enable()
            .with_output_audio_transcription_enable()
            .build()
    }

    /// Starts a session and returns once the handshake has completed.
    ///
    /// Missing prerequisites are rejected without touching any device. Any
    /// later failure tears down whatever was opened and leaves the
    /// controller idle with the error as its status.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::AlreadyActive);
        }
        let Some(instruction) = self.inventory.system_instruction() else {
            return Err(self.reject(SessionError::ConfigurationMissing(INVENTORY_NOT_LOADED.to_string())));
        };
        if !self.connector.has_credentials() {
            tracing::error!("[Session] API key is missing or empty.");
            return Err(self.reject(SessionError::ConfigurationMissing(API_KEY_MISSING.to_string())));
        }

        self.state = SessionState::Connecting;
        self.processing = true;
        self.status = STATUS_INITIALIZING.to_string();
        self.transcripts.clear();

        if let Err(e) = self.establish(&instruction).await {
            tracing::error!("[Session] Failed to start session: {}", e);
            self.stop();
            self.status = e.status_text();
            return Err(e);
        }
        Ok(())
    }

    fn reject(&mut self, err: SessionError) -> SessionError {
        self.status = err.status_text();
        err
    }

    async fn establish(&mut self, instruction: &str) -> Result<(), SessionError> {
        tracing::info!("[Session] Requesting microphone access...");
        let microphone = self.host.acquire_microphone().await?;
        let input_rate = microphone.sample_rate();
        self.microphone = Some(microphone);
        tracing::info!("[Session] Microphone access granted.");

        self.output = Some(self.host.open_output(OUTPUT_PCM16_SAMPLE_RATE)?);
        let (playback, ended) = PlaybackScheduler::new();
        self.playback = Some(playback);
        self.ended = Some(ended);
        let capture = CapturePipeline::new(input_rate, CAPTURE_FRAME_SIZE)?;

        tracing::info!("[Session] Connecting to realtime service...");
        let connection = self.connector.open(self.session_setup(instruction)).await?;
        self.handshaking = Some(connection.transport);
        self.events = Some(connection.events);
        self.state = SessionState::AwaitingHandshake;
        tracing::info!("[Session] Connected. Waiting for setup to complete...");

        self.await_handshake().await?;

        self.connection = self.handshaking.take();
        self.handshake_complete = true;
        self.state = SessionState::Active;
        self.processing = false;
        self.status = STATUS_LISTENING.to_string();
        tracing::info!("[Session] Session established, starting audio capture.");

        let (frames_tx, frames_rx) = mpsc::channel(CHANNEL_CAPACITY);
        if let Some(microphone) = self.microphone.as_mut() {
            microphone.connect(frames_tx);
        }
        self.frames = Some(frames_rx);
        self.capture = Some(capture);
        Ok(())
    }

    /// Waits, without a timeout, for the handshake-complete marker.
    async fn await_handshake(&mut self) -> Result<(), SessionError> {
        loop {
            match recv_opt(&mut self.events).await {
                Some(ServerEvent::Message(message)) if message.is_setup_complete() => {
                    tracing::info!("[Session] setupComplete received from server.");
                    return Ok(());
                }
                Some(ServerEvent::Message(message)) => {
                    tracing::debug!("[Session] ignoring message before setup completed: {:?}", message);
                }
                Some(ServerEvent::Error(e)) => return Err(SessionError::Transport(e)),
                Some(ServerEvent::Close { reason }) => {
                    return Err(SessionError::Transport(
                        reason.unwrap_or_else(|| "connection closed before setup completed".to_string()),
                    ));
                }
                None => {
                    return Err(SessionError::transport("connection closed before setup completed"));
                }
            }
        }
    }

    /// Tears the session down. Safe to call in any state, any number of times.
    pub fn stop(&mut self) {
        if self.state != SessionState::Idle {
            tracing::info!("[Session] Stopping session...");
            self.state = SessionState::Closing;
        }

        for mut transport in [self.connection.take(), self.handshaking.take()].into_iter().flatten() {
            if let Err(e) = transport.close() {
                tracing::warn!("[Session] Error closing session: {}", e);
            }
        }
        self.events = None;

        if let Some(mut microphone) = self.microphone.take() {
            microphone.disconnect();
            microphone.stop();
        }
        self.capture = None;
        self.frames = None;

        let playback = self.playback.take();
        if let Some(mut output) = self.output.take() {
            if let Some(mut playback) = playback {
                playback.halt(&mut *output);
            }
            if !output.is_closed() {
                output.close();
            }
        }
        self.ended = None;

        self.handshake_complete = false;
        self.bot_speaking = false;
        self.processing = false;
        self.transcripts.clear();
        self.state = SessionState::Idle;
        self.status = STATUS_ENDED.to_string();
    }

    /// Waits for the next event and handles it.
    ///
    /// Returns `false` once the session is idle and no tool call is left in
    /// flight.
    pub async fn step(&mut self) -> bool {
        if self.state == SessionState::Idle && self.pending_tools.is_empty() {
            return false;
        }
        let wake = tokio::select! {
            event = recv_opt(&mut self.events) => Wake::Server(event),
            frame = recv_opt(&mut self.frames) => Wake::Frame(frame),
            id = recv_opt_unbounded(&mut self.ended) => Wake::PlaybackEnded(id),
            Some(response) = self.pending_tools.next(), if !self.pending_tools.is_empty() => {
                Wake::ToolResolved(response)
            }
        };
        match wake {
            Wake::Server(Some(event)) => self.handle_server_event(event),
            Wake::Server(None) => self.handle_server_event(ServerEvent::Close { reason: None }),
            Wake::Frame(Some(samples)) => self.on_captured(&samples),
            Wake::Frame(None) => self.frames = None,
            Wake::PlaybackEnded(Some(id)) => self.on_playback_ended(id),
            Wake::PlaybackEnded(None) => self.ended = None,
            Wake::ToolResolved(response) => self.send_tool_response(response).await,
        }
        true
    }

    /// Drives the session until it goes idle or `shutdown` resolves.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    self.stop();
                    break;
                }
                alive = self.step() => {
                    if !alive {
                        break;
                    }
                }
            }
        }
    }

    pub fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Message(message) => {
                for inbound in message.events() {
                    self.handle_inbound(inbound);
                }
            }
            ServerEvent::Error(e) => {
                tracing::error!("[Session] WebSocket error: {}", e);
                let err = SessionError::Transport(e);
                self.stop();
                self.status = err.status_text();
            }
            ServerEvent::Close { reason } => {
                tracing::info!("[Session] WebSocket closed. Reason: {:?}", reason);
                self.stop();
            }
        }
    }

    fn handle_inbound(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::SetupComplete => {
                tracing::debug!("[Session] setupComplete received from server.");
            }
            InboundEvent::OutputTranscription(text) => {
                tracing::debug!("[Bot] {}", text);
                self.transcripts.bot.push_str(&text);
            }
            InboundEvent::InputTranscription(text) => {
                tracing::debug!("[User] {}", text);
                self.transcripts.user.push_str(&text);
            }
            InboundEvent::TurnComplete => {
                if !self.transcripts.user.is_empty() || !self.transcripts.bot.is_empty() {
                    tracing::info!(
                        "[Turn] user: {:?} bot: {:?}",
                        self.transcripts.user,
                        self.transcripts.bot
                    );
                }
                self.transcripts.clear();
            }
            InboundEvent::ToolCall(calls) => {
                for call in calls {
                    self.dispatch_tool_call(call);
                }
            }
            InboundEvent::Audio(payload) => {
                let (Some(playback), Some(output)) = (self.playback.as_mut(), self.output.as_mut()) else {
                    tracing::debug!("[Session] dropping audio received without a playback context");
                    return;
                };
                if let Err(e) = playback.enqueue(&mut **output, &payload) {
                    tracing::warn!("[Session] failed to play audio chunk: {}", e);
                }
                self.bot_speaking = playback.is_playing();
            }
        }
    }

    /// Queues one call. Calls resolve independently and in any order; a
    /// panicking handler still produces an error response for its call.
    fn dispatch_tool_call(&mut self, call: FunctionCall) {
        let dispatcher = self.dispatcher.clone();
        let pending = async move {
            match AssertUnwindSafe(dispatcher.dispatch(&call)).catch_unwind().await {
                Ok(response) => response,
                Err(_) => {
                    tracing::error!("[ToolCall] handler for {} panicked", call.name);
                    FunctionResponse::error(&call, "An unexpected error occurred.")
                }
            }
        };
        self.pending_tools.push(pending.boxed_local());
    }

    async fn send_tool_response(&mut self, response: FunctionResponse) {
        let connection = match self.connection.as_ref() {
            Some(connection) if self.state == SessionState::Active => connection,
            _ => {
                tracing::debug!("[ToolCall] session ended, dropping response for {}", response.id);
                return;
            }
        };
        let id = response.id.clone();
        if let Err(e) = connection.send_tool_response(vec![response]).await {
            tracing::warn!("[ToolCall] failed to send response for {}: {}", id, e);
        }
    }

    fn on_captured(&mut self, samples: &[f32]) {
        if let Some(capture) = self.capture.as_mut() {
            capture.submit(samples, self.connection.as_deref());
        }
    }

    fn on_playback_ended(&mut self, id: u64) {
        if let Some(playback) = self.playback.as_mut() {
            if playback.on_ended(id) {
                self.bot_speaking = false;
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
    }
}
