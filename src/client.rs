use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use office_voice_types::{Blob, ClientMessage, FunctionResponse, ServerEvent, ServerMessage, Setup};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;

use crate::error::SessionError;
use crate::realtime_api::{Connection, Connector, RealtimeTransport};

mod config;
mod consts;
mod utils;

pub use config::{Config, ConfigBuilder};
pub use consts::DEFAULT_MODEL;

enum Outbound {
    Message(ClientMessage),
    Close,
}

type ClientTx = mpsc::Sender<Outbound>;
pub type ServerRx = mpsc::Receiver<ServerEvent>;

/// A live websocket session with the realtime service.
///
/// Outbound messages go through a bounded queue to a writer task; a reader
/// task decodes inbound frames into [`ServerEvent`]s.
pub struct Client {
    c_tx: Option<ClientTx>,
    send_handle: tokio::task::JoinHandle<()>,
    recv_handle: tokio::task::JoinHandle<()>,
}

impl Client {
    async fn connect(config: &Config, setup: Setup) -> Result<(Self, ServerRx), SessionError> {
        let request = utils::build_request(config).map_err(SessionError::transport)?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| {
                tracing::error!("failed to connect to realtime service: {}", e);
                SessionError::transport(e)
            })?;
        tracing::info!("connected to realtime service, model={}", setup.model());

        let (mut write, mut read) = ws_stream.split();

        let (c_tx, mut c_rx) = mpsc::channel::<Outbound>(config.capacity());
        let (s_tx, s_rx) = mpsc::channel::<ServerEvent>(config.capacity());

        let send_handle = tokio::spawn(async move {
            while let Some(outbound) = c_rx.recv().await {
                let message = match outbound {
                    Outbound::Message(message) => message,
                    Outbound::Close => {
                        if let Err(e) = write.send(Message::Close(None)).await {
                            tracing::debug!("failed to send close frame: {}", e);
                        }
                        break;
                    }
                };
                match serde_json::to_string(&message) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send message: {}", e);
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize message: {}", e);
                    }
                }
            }
        });

        let recv_handle = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        let _ = s_tx.send(ServerEvent::Error(e.to_string())).await;
                        return;
                    }
                    Ok(message) => message,
                };
                let text = match message {
                    Message::Text(text) => text,
                    Message::Binary(bin) => match utils::frame_text(bin) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!("dropping non-UTF-8 binary frame: {}", e);
                            continue;
                        }
                    },
                    Message::Close(frame) => {
                        tracing::info!("connection closed: {:?}", frame);
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|reason| !reason.is_empty());
                        let _ = s_tx.send(ServerEvent::Close { reason }).await;
                        return;
                    }
                    _ => continue,
                };
                match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(message) => {
                        if s_tx.send(ServerEvent::Message(message)).await.is_err() {
                            tracing::debug!("event receiver dropped, stopping reader");
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to deserialize message: {}, text=> {:?}", e, text);
                    }
                }
            }
            let _ = s_tx.send(ServerEvent::Close { reason: None }).await;
        });

        let client = Self {
            c_tx: Some(c_tx),
            send_handle,
            recv_handle,
        };
        client.send(ClientMessage::Setup(setup)).await?;
        Ok((client, s_rx))
    }

    async fn send(&self, message: ClientMessage) -> Result<(), SessionError> {
        match self.c_tx {
            Some(ref tx) => tx
                .send(Outbound::Message(message))
                .await
                .map_err(|_| SessionError::transport("connection closed")),
            None => Err(SessionError::transport("not connected")),
        }
    }
}

#[async_trait]
impl RealtimeTransport for Client {
    fn send_realtime_input(&self, chunk: Blob) -> Result<(), SessionError> {
        let Some(ref tx) = self.c_tx else {
            return Err(SessionError::transport("not connected"));
        };
        tx.try_send(Outbound::Message(ClientMessage::media(chunk)))
            .map_err(|e| match e {
                TrySendError::Full(_) => SessionError::transport("outbound queue full, audio chunk dropped"),
                TrySendError::Closed(_) => SessionError::transport("connection closed"),
            })
    }

    async fn send_tool_response(&self, responses: Vec<FunctionResponse>) -> Result<(), SessionError> {
        self.send(ClientMessage::tool_responses(responses)).await
    }

    fn is_open(&self) -> bool {
        self.c_tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn close(&mut self) -> Result<(), SessionError> {
        let Some(tx) = self.c_tx.take() else {
            return Ok(());
        };
        self.recv_handle.abort();
        if tx.try_send(Outbound::Close).is_err() {
            // Queue full or writer gone: drop the socket without a close frame.
            self.send_handle.abort();
        }
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.recv_handle.abort();
        if self.c_tx.is_some() {
            self.send_handle.abort();
        }
    }
}

/// Opens [`Client`] connections to the realtime service.
pub struct GeminiConnector {
    config: Config,
}

impl GeminiConnector {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for GeminiConnector {
    fn has_credentials(&self) -> bool {
        self.config.has_api_key()
    }

    async fn open(&self, setup: Setup) -> Result<Connection, SessionError> {
        let (client, events) = Client::connect(&self.config, setup).await?;
        Ok(Connection {
            transport: Box::new(client),
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use office_voice_types::SetupConfigurator;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    async fn local_service() -> (TcpListener, Config) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        let config = Config::builder()
            .with_base_url(&url)
            .with_api_key("test-key")
            .with_capacity(8)
            .build();
        (listener, config)
    }

    #[tokio::test]
    async fn test_setup_first_then_events() {
        let (listener, config) = local_service().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let first = ws.next().await.unwrap().unwrap();
            let first: serde_json::Value = serde_json::from_str(first.to_text().unwrap()).unwrap();
            assert_eq!(first["setup"]["model"], "models/test-model");

            ws.send(Message::Binary(br#"{"setupComplete":{}}"#.to_vec()))
                .await
                .unwrap();

            let second = ws.next().await.unwrap().unwrap();
            let second: serde_json::Value = serde_json::from_str(second.to_text().unwrap()).unwrap();
            assert_eq!(second["realtimeInput"]["mediaChunks"][0]["data"], "AAAA");

            ws.send(Message::Close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "bye".into(),
            })))
            .await
            .unwrap();
        });

        let connector = GeminiConnector::new(config);
        assert!(connector.has_credentials());
        let mut connection = connector
            .open(SetupConfigurator::new("test-model").build())
            .await
            .unwrap();

        let event = connection.events.recv().await.unwrap();
        assert_eq!(event, ServerEvent::Message(ServerMessage::setup_complete()));

        connection
            .transport
            .send_realtime_input(Blob::new("AAAA".to_string(), "audio/pcm;rate=16000"))
            .unwrap();

        let event = connection.events.recv().await.unwrap();
        assert_eq!(
            event,
            ServerEvent::Close {
                reason: Some("bye".to_string())
            }
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_stops_sends() {
        let (listener, config) = local_service().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(message)) = ws.next().await {
                if message.is_close() {
                    break;
                }
            }
        });

        let connector = GeminiConnector::new(config);
        let mut connection = connector
            .open(SetupConfigurator::new("test-model").build())
            .await
            .unwrap();
        assert!(connection.transport.is_open());

        connection.transport.close().unwrap();
        connection.transport.close().unwrap();
        assert!(!connection.transport.is_open());
        assert!(connection
            .transport
            .send_realtime_input(Blob::new("AAAA".to_string(), "audio/pcm;rate=16000"))
            .is_err());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_connection_is_a_transport_error() {
        let (listener, config) = local_service().await;
        drop(listener);
        let result = GeminiConnector::new(config)
            .open(SetupConfigurator::new("test-model").build())
            .await;
        assert!(matches!(result, Err(SessionError::Transport(_))));
    }
}
