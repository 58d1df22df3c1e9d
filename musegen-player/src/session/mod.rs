//! Generation session interface
//!
//! The controller consumes the session through the [`MusicSession`] and
//! [`SessionConnector`] traits; the live WebSocket implementation lives in
//! [`live`]. Asynchronous session callbacks are delivered as
//! [`SessionEvent`]s on an mpsc channel owned by the controller, which is
//! the single serialization point; the session makes no mutual-exclusion
//! guarantees of its own.

pub mod live;
pub mod protocol;

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

pub use live::LiveMusicConnector;
pub use protocol::{GenerationConfig, ServerMessage, WeightedPrompt};

/// Asynchronous notifications delivered by a session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A server message, possibly carrying audio chunks
    Message(ServerMessage),

    /// The session failed; terminal for this session
    Error(String),

    /// The remote side closed the session; terminal, not an error
    Closed,
}

/// Control surface of a live generation session
///
/// Handles are cheap to share (`Arc`) and internally serialize their own
/// transport writes; callers may invoke operations from any task.
#[async_trait]
pub trait MusicSession: Send + Sync {
    /// Replace the active weighted prompts (steering)
    async fn set_weighted_prompts(&self, prompts: Vec<WeightedPrompt>) -> Result<()>;

    /// Send the generation configuration
    async fn set_music_generation_config(&self, config: GenerationConfig) -> Result<()>;

    /// Start the transport (begin streaming audio)
    async fn play(&self) -> Result<()>;

    /// Pause the transport
    async fn pause(&self) -> Result<()>;

    /// Tear the session down (best effort, idempotent)
    async fn close(&self);
}

/// Opens generation sessions against the remote service
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Open a session for `model`, delivering async notifications on
    /// `events`
    ///
    /// # Errors
    /// [`crate::Error::Connect`] if the session cannot be established.
    async fn connect(
        &self,
        api_key: &str,
        model: &str,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Arc<dyn MusicSession>>;
}
