use crate::error::SessionError;
use async_trait::async_trait;
use office_voice_types::{Blob, FunctionResponse, ServerEvent, Setup};
use tokio::sync::mpsc;

/// The outbound half of an open realtime connection.
///
/// Implementations queue messages for a writer task, so none of these calls
/// touch the socket directly.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Queues one chunk of microphone audio. Never waits; a full queue is an error.
    fn send_realtime_input(&self, chunk: Blob) -> Result<(), SessionError>;

    /// Sends the replies for one batch of function calls.
    async fn send_tool_response(&self, responses: Vec<FunctionResponse>) -> Result<(), SessionError>;

    fn is_open(&self) -> bool;

    /// Starts an orderly close. Later sends fail.
    fn close(&mut self) -> Result<(), SessionError>;
}

/// An open connection: the transport plus the stream of inbound events.
///
/// The event stream ends after a [`ServerEvent::Close`] or [`ServerEvent::Error`].
pub struct Connection {
    pub transport: Box<dyn RealtimeTransport>,
    pub events: mpsc::Receiver<ServerEvent>,
}

/// Opens realtime connections for the session controller.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Whether an API credential is available at all.
    fn has_credentials(&self) -> bool;

    /// Connects and sends `setup` as the first message.
    async fn open(&self, setup: Setup) -> Result<Connection, SessionError>;
}
