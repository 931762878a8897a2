//! Fixtures and in-memory fakes shared by the unit tests.

use crate::audio::{AudioHost, AudioOutput, Microphone};
use crate::backend::{BackendError, MockBackend};
use crate::error::SessionError;
use crate::inventory::{derive_key, InventoryStore};
use crate::realtime_api::{Connection, Connector, RealtimeTransport};
use async_trait::async_trait;
use office_voice_types::inventory::{Electronics, ElectronicsState, ElectronicsType, OfficeLayout, Room};
use office_voice_types::{Blob, ClientMessage, FunctionResponse, ServerEvent, Setup};
use office_voice_utils::DecodedAudio;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub fn electronic(id: &str, name: &str, electronics_type: ElectronicsType) -> Electronics {
    Electronics {
        object_id: String::new(),
        electronics_id: id.to_string(),
        electronics_name: name.to_string(),
        electronics_key: derive_key(name),
        electronics_type: electronics_type.to_string(),
        state: ElectronicsState::Off.to_string(),
    }
}

pub fn room(id: &str, name: &str, electronics: Vec<Electronics>) -> Room {
    Room {
        object_id: String::new(),
        room_id: id.to_string(),
        room_name: name.to_string(),
        room_key: derive_key(name),
        electronics,
    }
}

/// Conference Room (e1, e2) and Lobby (e3).
pub fn office_layout() -> OfficeLayout {
    vec![
        room(
            "r1",
            "Conference Room",
            vec![
                electronic("e1", "Tube Light 1", ElectronicsType::Light),
                electronic("e2", "Split AC", ElectronicsType::Ac),
            ],
        ),
        room("r2", "Lobby", vec![electronic("e3", "Fan", ElectronicsType::Fan)]),
    ]
}

pub fn backend_error(method: &str, path: &str, status: u16) -> BackendError {
    BackendError::Status {
        method: method.parse().unwrap(),
        path: path.to_string(),
        status,
    }
}

pub fn preloaded_store(backend: MockBackend, layout: OfficeLayout) -> Arc<InventoryStore> {
    Arc::new(InventoryStore::with_layout(Arc::new(backend), layout))
}

#[derive(Default)]
struct TransportState {
    sent: Vec<ClientMessage>,
    closes: usize,
    fail_sends: bool,
}

/// What a [`FakeTransport`] was asked to do.
#[derive(Clone, Default)]
pub struct TransportLog(Arc<Mutex<TransportState>>);

impl TransportLog {
    pub fn sent(&self) -> Vec<ClientMessage> {
        self.0.lock().unwrap().sent.clone()
    }

    pub fn audio_chunks(&self) -> usize {
        self.sent()
            .iter()
            .filter(|m| matches!(m, ClientMessage::RealtimeInput(_)))
            .count()
    }

    pub fn tool_responses(&self) -> Vec<FunctionResponse> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                ClientMessage::ToolResponse(r) => Some(r.function_responses),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.0.lock().unwrap().closes
    }

    pub fn fail_sends(&self) {
        self.0.lock().unwrap().fail_sends = true;
    }

    fn record(&self, message: ClientMessage) -> Result<(), SessionError> {
        let mut state = self.0.lock().unwrap();
        if state.fail_sends {
            return Err(SessionError::transport("send failed"));
        }
        state.sent.push(message);
        Ok(())
    }
}

pub struct FakeTransport {
    log: TransportLog,
    open: bool,
}

impl FakeTransport {
    pub fn new() -> (Self, TransportLog) {
        let log = TransportLog::default();
        (
            Self {
                log: log.clone(),
                open: true,
            },
            log,
        )
    }
}

#[async_trait]
impl RealtimeTransport for FakeTransport {
    fn send_realtime_input(&self, chunk: Blob) -> Result<(), SessionError> {
        if !self.open {
            return Err(SessionError::transport("connection closed"));
        }
        self.log.record(ClientMessage::media(chunk))
    }

    async fn send_tool_response(&self, responses: Vec<FunctionResponse>) -> Result<(), SessionError> {
        if !self.open {
            return Err(SessionError::transport("connection closed"));
        }
        self.log.record(ClientMessage::tool_responses(responses))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> Result<(), SessionError> {
        self.log.0.lock().unwrap().closes += 1;
        if !self.open {
            return Err(SessionError::transport("already closed"));
        }
        self.open = false;
        Ok(())
    }
}

struct ConnectorState {
    events: Option<mpsc::Receiver<ServerEvent>>,
    setups: Vec<Setup>,
    refuse: Option<String>,
}

/// Test-side handle of a [`FakeConnector`].
#[derive(Clone)]
pub struct ConnectorProbe {
    pub events: mpsc::Sender<ServerEvent>,
    pub transport: TransportLog,
    state: Arc<Mutex<ConnectorState>>,
}

impl ConnectorProbe {
    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().setups.len()
    }

    pub fn setups(&self) -> Vec<Setup> {
        self.state.lock().unwrap().setups.clone()
    }

    pub fn refuse(&self, message: &str) {
        self.state.lock().unwrap().refuse = Some(message.to_string());
    }
}

/// Hands out one scripted connection whose inbound events the test feeds.
pub struct FakeConnector {
    credentials: bool,
    transport: TransportLog,
    state: Arc<Mutex<ConnectorState>>,
}

impl FakeConnector {
    pub fn new(credentials: bool) -> (Self, ConnectorProbe) {
        let (events_tx, events_rx) = mpsc::channel(64);
        let transport = TransportLog::default();
        let state = Arc::new(Mutex::new(ConnectorState {
            events: Some(events_rx),
            setups: Vec::new(),
            refuse: None,
        }));
        let probe = ConnectorProbe {
            events: events_tx,
            transport: transport.clone(),
            state: state.clone(),
        };
        (
            Self {
                credentials,
                transport,
                state,
            },
            probe,
        )
    }
}

#[async_trait]
impl Connector for FakeConnector {
    fn has_credentials(&self) -> bool {
        self.credentials
    }

    async fn open(&self, setup: Setup) -> Result<Connection, SessionError> {
        let mut state = self.state.lock().unwrap();
        state.setups.push(setup);
        if let Some(message) = state.refuse.clone() {
            return Err(SessionError::Transport(message));
        }
        let events = state
            .events
            .take()
            .ok_or_else(|| SessionError::transport("fake connection already used"))?;
        Ok(Connection {
            transport: Box::new(FakeTransport {
                log: self.transport.clone(),
                open: true,
            }),
            events,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Started {
    pub id: u64,
    pub at: f64,
    pub duration: f64,
}

#[derive(Default)]
struct OutputState {
    now: f64,
    started: Vec<Started>,
    stopped: Vec<u64>,
    opened: usize,
    closes: usize,
    ended: Option<mpsc::UnboundedSender<u64>>,
}

#[derive(Clone, Default)]
pub struct OutputProbe(Arc<Mutex<OutputState>>);

impl OutputProbe {
    pub fn set_time(&self, now: f64) {
        self.0.lock().unwrap().now = now;
    }

    pub fn started(&self) -> Vec<Started> {
        self.0.lock().unwrap().started.clone()
    }

    pub fn stopped(&self) -> Vec<u64> {
        self.0.lock().unwrap().stopped.clone()
    }

    pub fn opened(&self) -> usize {
        self.0.lock().unwrap().opened
    }

    pub fn close_count(&self) -> usize {
        self.0.lock().unwrap().closes
    }

    /// Reports chunk `id` as finished, the way the device would.
    pub fn finish(&self, id: u64) {
        if let Some(ended) = self.0.lock().unwrap().ended.as_ref() {
            ended.send(id).unwrap();
        }
    }
}

pub struct FakeOutput {
    probe: OutputProbe,
    closed: bool,
}

impl FakeOutput {
    pub fn new() -> (Self, OutputProbe) {
        let probe = OutputProbe::default();
        (
            Self {
                probe: probe.clone(),
                closed: false,
            },
            probe,
        )
    }
}

impl AudioOutput for FakeOutput {
    fn sample_rate(&self) -> u32 {
        24000
    }

    fn current_time(&self) -> f64 {
        self.probe.0.lock().unwrap().now
    }

    fn start(
        &mut self,
        id: u64,
        audio: DecodedAudio,
        at: f64,
        ended: mpsc::UnboundedSender<u64>,
    ) -> Result<(), SessionError> {
        let mut state = self.probe.0.lock().unwrap();
        state.started.push(Started {
            id,
            at,
            duration: audio.duration(),
        });
        state.ended = Some(ended);
        Ok(())
    }

    fn stop(&mut self, id: u64) {
        self.probe.0.lock().unwrap().stopped.push(id);
    }

    fn close(&mut self) {
        self.closed = true;
        self.probe.0.lock().unwrap().closes += 1;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[derive(Default)]
struct MicState {
    acquired: usize,
    stopped: usize,
    sink: Option<mpsc::Sender<Vec<f32>>>,
    deny: bool,
}

/// Test-side handle of a [`FakeHost`].
#[derive(Clone, Default)]
pub struct HostProbe {
    mic: Arc<Mutex<MicState>>,
    pub output: OutputProbe,
}

impl HostProbe {
    pub fn deny_microphone(&self) {
        self.mic.lock().unwrap().deny = true;
    }

    pub fn mic_acquired(&self) -> usize {
        self.mic.lock().unwrap().acquired
    }

    pub fn mic_stopped(&self) -> usize {
        self.mic.lock().unwrap().stopped
    }

    pub fn mic_connected(&self) -> bool {
        self.mic.lock().unwrap().sink.is_some()
    }

    /// Delivers one device frame. Returns `false` if nothing is listening.
    pub fn speak(&self, samples: Vec<f32>) -> bool {
        match self.mic.lock().unwrap().sink.as_ref() {
            Some(sink) => sink.try_send(samples).is_ok(),
            None => false,
        }
    }
}

pub struct FakeHost {
    probe: HostProbe,
}

impl FakeHost {
    pub fn new() -> (Self, HostProbe) {
        let probe = HostProbe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }
}

struct FakeMicrophone {
    state: Arc<Mutex<MicState>>,
}

impl Microphone for FakeMicrophone {
    fn sample_rate(&self) -> u32 {
        16000
    }

    fn connect(&mut self, sink: mpsc::Sender<Vec<f32>>) {
        self.state.lock().unwrap().sink = Some(sink);
    }

    fn disconnect(&mut self) {
        self.state.lock().unwrap().sink = None;
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.sink = None;
        state.stopped += 1;
    }
}

#[async_trait(?Send)]
impl AudioHost for FakeHost {
    async fn acquire_microphone(&self) -> Result<Box<dyn Microphone>, SessionError> {
        let mut state = self.probe.mic.lock().unwrap();
        if state.deny {
            return Err(SessionError::PermissionDenied("NotAllowedError".to_string()));
        }
        state.acquired += 1;
        Ok(Box::new(FakeMicrophone {
            state: self.probe.mic.clone(),
        }))
    }

    fn open_output(&self, _sample_rate: u32) -> Result<Box<dyn AudioOutput>, SessionError> {
        self.probe.output.0.lock().unwrap().opened += 1;
        Ok(Box::new(FakeOutput {
            probe: self.probe.output.clone(),
            closed: false,
        }))
    }
}
