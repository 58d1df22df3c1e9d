//! Live WebSocket session against the generation service
//!
//! Opens the bidirectional endpoint, performs the setup handshake, then
//! splits the connection: control calls serialize JSON onto the write half
//! (behind a mutex, so any task may steer), while a reader task forwards
//! server messages, errors, and the close notification into the
//! controller's event channel in arrival order.

use crate::error::{Error, Result};
use crate::session::protocol::{
    ClientContent, ClientMessage, GenerationConfig, PlaybackControl, ServerMessage, Setup,
    WeightedPrompt,
};
use crate::session::{MusicSession, SessionConnector, SessionEvent};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Bidirectional music-generation endpoint
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateMusic";

/// How long to wait for the service to acknowledge session setup
const SETUP_TIMEOUT: Duration = Duration::from_secs(15);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects live sessions to the remote generation service
#[derive(Debug, Clone)]
pub struct LiveMusicConnector {
    endpoint: String,
}

impl LiveMusicConnector {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Use a non-default endpoint (testing, proxies)
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl Default for LiveMusicConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionConnector for LiveMusicConnector {
    async fn connect(
        &self,
        api_key: &str,
        model: &str,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Arc<dyn MusicSession>> {
        let url = session_url(&self.endpoint, api_key);

        info!("Opening generation session at {}", self.endpoint);
        let (ws, _response) = connect_async(&url)
            .await
            .map_err(|e| Error::Connect(format!("WebSocket connect failed: {}", e)))?;

        let (writer, mut reader) = ws.split();

        let session = LiveMusicSession {
            id: Uuid::new_v4(),
            writer: tokio::sync::Mutex::new(writer),
        };

        session
            .send(&ClientMessage::Setup(Setup {
                model: model.to_string(),
            }))
            .await
            .map_err(|e| Error::Connect(format!("Setup send failed: {}", e)))?;

        wait_for_setup_complete(&mut reader, &events).await?;
        info!("Generation session established: {}", session.id);

        let session = Arc::new(session);
        tokio::spawn(run_reader(reader, events, session.id));

        Ok(session)
    }
}

/// A live session handle; writes serialize through the internal mutex
pub struct LiveMusicSession {
    id: Uuid,
    writer: tokio::sync::Mutex<SplitSink<WsStream, Message>>,
}

impl LiveMusicSession {
    async fn send(&self, msg: &ClientMessage) -> Result<()> {
        let json = serde_json::to_string(msg)
            .map_err(|e| Error::Session(format!("Message encode failed: {}", e)))?;

        self.writer
            .lock()
            .await
            .send(Message::Text(json))
            .await
            .map_err(|e| Error::Session(format!("Send failed: {}", e)))
    }
}

#[async_trait]
impl MusicSession for LiveMusicSession {
    async fn set_weighted_prompts(&self, prompts: Vec<WeightedPrompt>) -> Result<()> {
        self.send(&ClientMessage::ClientContent(ClientContent {
            weighted_prompts: prompts,
        }))
        .await
    }

    async fn set_music_generation_config(&self, config: GenerationConfig) -> Result<()> {
        self.send(&ClientMessage::MusicGenerationConfig(config)).await
    }

    async fn play(&self) -> Result<()> {
        self.send(&ClientMessage::PlaybackControl(PlaybackControl::Play))
            .await
    }

    async fn pause(&self) -> Result<()> {
        self.send(&ClientMessage::PlaybackControl(PlaybackControl::Pause))
            .await
    }

    async fn close(&self) {
        let mut writer = self.writer.lock().await;
        // Best effort: the peer may already be gone
        let _ = writer.send(Message::Close(None)).await;
        let _ = writer.close().await;
        debug!("Generation session closed: {}", self.id);
    }
}

/// Build the connection URL; the credential rides as a query parameter
fn session_url(endpoint: &str, api_key: &str) -> String {
    format!("{}?key={}", endpoint, api_key)
}

/// Drain messages until the service acknowledges setup
///
/// Non-setup messages arriving early are forwarded to the event channel so
/// their order is preserved.
async fn wait_for_setup_complete(
    reader: &mut SplitStream<WsStream>,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> Result<()> {
    loop {
        let item = tokio::time::timeout(SETUP_TIMEOUT, reader.next())
            .await
            .map_err(|_| Error::Connect("Timed out waiting for session setup".to_string()))?;

        match item {
            Some(Ok(msg)) => match parse_server_message(&msg) {
                Some(server_msg) => {
                    if server_msg.setup_complete.is_some() {
                        return Ok(());
                    }
                    let _ = events.send(SessionEvent::Message(server_msg));
                }
                None => {
                    if matches!(msg, Message::Close(_)) {
                        return Err(Error::Connect(
                            "Connection closed during session setup".to_string(),
                        ));
                    }
                }
            },
            Some(Err(e)) => {
                return Err(Error::Connect(format!("Connection failed during setup: {}", e)));
            }
            None => {
                return Err(Error::Connect(
                    "Connection closed during session setup".to_string(),
                ));
            }
        }
    }
}

/// Forward server messages into the controller's event channel
///
/// Runs until the connection ends or the controller drops its receiver.
/// Exactly one terminal event (`Error` or `Closed`) is emitted.
async fn run_reader(
    mut reader: SplitStream<WsStream>,
    events: mpsc::UnboundedSender<SessionEvent>,
    session_id: Uuid,
) {
    while let Some(item) = reader.next().await {
        match item {
            Ok(Message::Close(frame)) => {
                debug!("Session {} closed by remote: {:?}", session_id, frame);
                let _ = events.send(SessionEvent::Closed);
                return;
            }
            Ok(msg) => {
                if let Some(server_msg) = parse_server_message(&msg) {
                    if events.send(SessionEvent::Message(server_msg)).is_err() {
                        // Controller went away; stop pumping
                        return;
                    }
                }
            }
            Err(e) => {
                warn!("Session {} transport error: {}", session_id, e);
                let _ = events.send(SessionEvent::Error(e.to_string()));
                return;
            }
        }
    }

    debug!("Session {} stream ended", session_id);
    let _ = events.send(SessionEvent::Closed);
}

/// Parse a WebSocket message into a server message, if it carries one
///
/// Malformed payloads are skipped (logged, not fatal): a single bad message
/// must not take the session down.
fn parse_server_message(msg: &Message) -> Option<ServerMessage> {
    let parsed = match msg {
        Message::Text(text) => serde_json::from_str::<ServerMessage>(text),
        Message::Binary(bytes) => serde_json::from_slice::<ServerMessage>(bytes),
        _ => return None,
    };

    match parsed {
        Ok(server_msg) => Some(server_msg),
        Err(e) => {
            debug!("Skipping unparseable server message: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_url_appends_credential() {
        let url = session_url("wss://example.test/session", "abc123");
        assert_eq!(url, "wss://example.test/session?key=abc123");
    }

    #[test]
    fn test_parse_text_message() {
        let msg = Message::Text(r#"{"setupComplete": {}}"#.to_string());
        let parsed = parse_server_message(&msg).unwrap();
        assert!(parsed.setup_complete.is_some());
    }

    #[test]
    fn test_parse_binary_message() {
        let msg = Message::Binary(br#"{"serverContent": {"audioChunks": []}}"#.to_vec());
        let parsed = parse_server_message(&msg).unwrap();
        assert!(parsed.server_content.is_some());
    }

    #[test]
    fn test_parse_skips_malformed_payload() {
        let msg = Message::Text("not json".to_string());
        assert!(parse_server_message(&msg).is_none());
    }

    #[test]
    fn test_parse_ignores_ping() {
        let msg = Message::Ping(vec![]);
        assert!(parse_server_message(&msg).is_none());
    }
}
