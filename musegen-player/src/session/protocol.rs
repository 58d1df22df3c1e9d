//! Wire types for the bidirectional music-generation protocol
//!
//! Client messages each carry a single distinguishing top-level key
//! (`setup`, `clientContent`, `musicGenerationConfig`, `playbackControl`);
//! server messages optionally carry `serverContent.audioChunks`. A message
//! without chunks is a control-only message and is skipped, not an error.

use serde::{Deserialize, Serialize};

/// A weighted natural-language prompt steering ongoing generation
///
/// Only a single prompt is active per session at a time; sending a new one
/// replaces the prior one atomically on the service side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedPrompt {
    pub text: String,
    pub weight: f32,
}

impl WeightedPrompt {
    /// Create a prompt with full weight
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            weight: 1.0,
        }
    }
}

/// Generation parameters, fixed for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub bpm: u32,
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            bpm: 90,
            temperature: 1.0,
        }
    }
}

/// Transport control operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackControl {
    Play,
    Pause,
}

/// Session setup payload sent once after the connection opens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    /// Realtime music model identifier, e.g. `models/lyria-realtime-exp`
    pub model: String,
}

/// Steering payload carrying the active weighted prompts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub weighted_prompts: Vec<WeightedPrompt>,
}

/// Messages sent from the client to the generation service
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    ClientContent(ClientContent),
    MusicGenerationConfig(GenerationConfig),
    PlaybackControl(PlaybackControl),
}

/// Acknowledgement that the session setup was accepted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetupComplete {}

/// One unit of encoded audio delivered by the session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioChunk {
    /// Base64-encoded 16-bit PCM payload; may be absent on control records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    /// Payload MIME type, e.g. `audio/l16;rate=48000`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Audio-bearing portion of a server message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_chunks: Option<Vec<AudioChunk>>,
}

/// A message received from the generation service
///
/// Unknown fields are ignored so protocol additions do not break older
/// clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_complete: Option<SetupComplete>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_content: Option<ServerContent>,
}

impl ServerMessage {
    /// Audio chunks carried by this message, empty for control-only messages
    pub fn audio_chunks(&self) -> &[AudioChunk] {
        self.server_content
            .as_ref()
            .and_then(|content| content.audio_chunks.as_deref())
            .unwrap_or(&[])
    }
}
