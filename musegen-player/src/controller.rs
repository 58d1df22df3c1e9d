//! Session controller - lifecycle and chunk pipeline
//!
//! **Responsibilities:**
//! - Own one generation session and one playback sink (at most one of each;
//!   both released on every exit path)
//! - Drive the connect → play/pause → prompt-update → disconnect lifecycle
//! - Forward decoded audio chunks to the sink in arrival order
//! - Publish the current status to observers
//!
//! **Concurrency model:** three event sources (user commands, session
//! callbacks, sink backpressure) serialize through a single state mutex.
//! The lock is only held for field mutations and chunk writes, never across
//! a network round-trip: control calls clone the session handle out of the
//! lock, await the call, then re-lock and re-check the status before
//! applying any effect, so a late result after a terminal transition is
//! discarded. Session callbacks are drained by one pump task, which keeps
//! chunk writes ordered and ensures the audio path never queues behind an
//! in-flight control call.

use crate::audio::decode::decode_chunk;
use crate::audio::output::{OutputSink, SinkOpener};
use crate::audio::types::OutputFormat;
use crate::session::protocol::ServerMessage;
use crate::session::{
    GenerationConfig, MusicSession, SessionConnector, SessionEvent, WeightedPrompt,
};
use musegen_common::{StatusBus, StreamStatus};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, trace, warn};

/// Controller configuration, fixed for the lifetime of the instance
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// API credential; absence is detected before any allocation
    pub api_key: Option<String>,

    /// Realtime music model identifier
    pub model: String,

    /// Generation parameters sent once per play transition
    pub generation: GenerationConfig,

    /// Playback sink format
    pub format: OutputFormat,
}

/// Mutable controller state guarded by the single mutex
struct ControllerState {
    session: Option<Arc<dyn MusicSession>>,
    sink: Option<Box<dyn OutputSink>>,
}

type Resources = (Option<Box<dyn OutputSink>>, Option<Arc<dyn MusicSession>>);

/// Owns one live generation session and its playback sink
///
/// `Error` and `Disconnected` are terminal: once reached, no further
/// operations are accepted and a fresh controller is required. There is no
/// automatic reconnect.
pub struct SessionController {
    config: ControllerConfig,
    connector: Arc<dyn SessionConnector>,
    opener: Arc<dyn SinkOpener>,
    status: StatusBus,
    state: Arc<Mutex<ControllerState>>,
}

impl SessionController {
    /// Create a controller in `Initializing` status
    pub fn new(
        config: ControllerConfig,
        connector: Arc<dyn SessionConnector>,
        opener: Arc<dyn SinkOpener>,
    ) -> Self {
        Self {
            config,
            connector,
            opener,
            status: StatusBus::new(),
            state: Arc::new(Mutex::new(ControllerState {
                session: None,
                sink: None,
            })),
        }
    }

    /// Current status
    pub fn status(&self) -> StreamStatus {
        self.status.current()
    }

    /// Subscribe to status transitions
    ///
    /// Observers always see the current status; intermediate transitions
    /// may coalesce.
    pub fn subscribe_status(&self) -> watch::Receiver<StreamStatus> {
        self.status.subscribe()
    }

    /// Open the playback sink and the generation session
    ///
    /// Transitions: `Initializing → Connecting → Connected`, or `Error`
    /// when the credential is missing (nothing allocated), the sink cannot
    /// be opened (nothing to release), or the session fails to open (the
    /// sink is released).
    pub async fn connect(&self) {
        // Gate and allocate the sink under the lock
        let api_key = {
            let mut state = self.state.lock().await;
            if self.status.current() != StreamStatus::Initializing {
                debug!("connect() ignored in status {}", self.status.current());
                return;
            }

            let Some(api_key) = self.config.api_key.clone() else {
                warn!("No API credential configured");
                self.status.publish(StreamStatus::Error);
                return;
            };

            self.status.publish(StreamStatus::Connecting);

            match self.opener.open(self.config.format) {
                Ok(sink) => state.sink = Some(sink),
                Err(e) => {
                    warn!("Failed to open playback sink: {}", e);
                    self.status.publish(StreamStatus::Error);
                    return;
                }
            }

            api_key
        };

        // Session open is a network round-trip; the lock is not held
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let result = self
            .connector
            .connect(&api_key, &self.config.model, events_tx)
            .await;

        let leftover: Resources = {
            let mut state = self.state.lock().await;
            if self.status.current() != StreamStatus::Connecting {
                // Superseded (torn down while connecting): discard the
                // result and release whatever the late open produced
                (state.sink.take(), result.ok())
            } else {
                match result {
                    Ok(session) => {
                        state.session = Some(session);
                        self.status.publish(StreamStatus::Connected);

                        tokio::spawn(run_event_pump(
                            self.status.clone(),
                            Arc::clone(&self.state),
                            events_rx,
                        ));
                        (None, None)
                    }
                    Err(e) => {
                        warn!("Failed to open generation session: {}", e);
                        self.status.publish(StreamStatus::Error);
                        (state.sink.take(), None)
                    }
                }
            }
        };

        release(leftover).await;
    }

    /// Steer generation with a new prompt, starting the transport if needed
    ///
    /// While `Playing` this only replaces the active prompt; from
    /// `Connected`/`Paused` it also sends the generation config and issues
    /// the one-time transport play. A no-op when no session exists.
    pub async fn submit_prompt(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let (session, steering_only) = {
            let state = self.state.lock().await;
            let Some(session) = state.session.clone() else {
                debug!("Prompt ignored: no active session");
                return;
            };
            (session, self.status.current() == StreamStatus::Playing)
        };

        let prompts = vec![WeightedPrompt::new(text)];

        if steering_only {
            // Transport play is not reissued while already playing
            if let Err(e) = session.set_weighted_prompts(prompts).await {
                debug!("Prompt update failed: {}", e);
            }
            return;
        }

        let result = async {
            session.set_weighted_prompts(prompts).await?;
            session
                .set_music_generation_config(self.config.generation)
                .await?;
            session.play().await
        }
        .await;

        let leftover: Resources = {
            let mut state = self.state.lock().await;
            if self.status.current().is_terminal() {
                // A terminal transition superseded this call; discard
                return;
            }
            match result {
                Ok(()) => {
                    info!("Playback started");
                    self.status.publish(StreamStatus::Playing);
                    return;
                }
                Err(e) => {
                    warn!("Failed to start playback: {}", e);
                    self.status.publish(StreamStatus::Error);
                    take_resources(&mut state)
                }
            }
        };

        release(leftover).await;
    }

    /// Pause the transport
    ///
    /// A no-op unless currently `Playing` (no transport call is issued when
    /// already paused).
    pub async fn pause(&self) {
        let session = {
            let state = self.state.lock().await;
            if self.status.current() != StreamStatus::Playing {
                return;
            }
            match state.session.clone() {
                Some(session) => session,
                None => return,
            }
        };

        match session.pause().await {
            Ok(()) => {
                let _state = self.state.lock().await;
                if self.status.current() == StreamStatus::Playing {
                    self.status.publish(StreamStatus::Paused);
                    info!("Playback paused");
                }
            }
            Err(e) => {
                warn!("Transport pause failed: {}", e);
            }
        }
    }

    /// Tear the controller down, releasing session and sink
    ///
    /// Transitions to `Disconnected` unless already terminal.
    pub async fn shutdown(&self) {
        let leftover: Resources = {
            let mut state = self.state.lock().await;
            if !self.status.current().is_terminal() {
                self.status.publish(StreamStatus::Disconnected);
            }
            take_resources(&mut state)
        };

        release(leftover).await;
    }
}

/// Drain session events in arrival order until a terminal transition
async fn run_event_pump(
    status: StatusBus,
    state: Arc<Mutex<ControllerState>>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    while let Some(event) = events.recv().await {
        if apply_session_event(&status, &state, event).await {
            break;
        }
    }
    debug!("Session event pump stopped");
}

/// Apply one session event; returns true once the controller is terminal
async fn apply_session_event(
    status: &StatusBus,
    state: &Mutex<ControllerState>,
    event: SessionEvent,
) -> bool {
    let leftover: Option<Resources> = {
        let mut state = state.lock().await;
        if status.current().is_terminal() {
            // Events arriving after a terminal transition are discarded
            return true;
        }

        match event {
            SessionEvent::Message(msg) => {
                write_chunks(&mut state, &msg);
                None
            }
            SessionEvent::Error(cause) => {
                warn!("Session error: {}", cause);
                status.publish(StreamStatus::Error);
                Some(take_resources(&mut state))
            }
            SessionEvent::Closed => {
                info!("Session closed by remote");
                status.publish(StreamStatus::Disconnected);
                Some(take_resources(&mut state))
            }
        }
    };

    match leftover {
        Some(resources) => {
            release(resources).await;
            true
        }
        None => false,
    }
}

/// Decode and write a message's chunks to the sink in arrival order
///
/// A chunk that fails to decode or write is dropped on its own: the
/// neighbors still play and the status is untouched.
fn write_chunks(state: &mut ControllerState, msg: &ServerMessage) {
    for chunk in msg.audio_chunks() {
        // A record without payload is control-only; skip it
        let Some(data) = chunk.data.as_deref() else {
            continue;
        };

        let pcm = match decode_chunk(data) {
            Ok(pcm) => pcm,
            Err(e) => {
                debug!("Dropping undecodable chunk: {}", e);
                continue;
            }
        };

        if let Some(sink) = state.sink.as_mut() {
            if let Err(e) = sink.write(&pcm) {
                trace!("Dropped chunk on sink backpressure: {}", e);
            }
        }
    }
}

fn take_resources(state: &mut ControllerState) -> Resources {
    (state.sink.take(), state.session.take())
}

async fn release((sink, session): Resources) {
    if let Some(mut sink) = sink {
        sink.close();
    }
    if let Some(session) = session {
        session.close().await;
    }
}
