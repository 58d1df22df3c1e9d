//! # Musegen Player Library (musegen-player)
//!
//! Interactive steering client for a realtime generative-music service.
//!
//! **Purpose:** Own one live generation session and one playback sink, drive
//! the connect → play/pause → prompt-update → disconnect lifecycle, and
//! forward decoded audio chunks to the output device in arrival order.
//!
//! **Architecture:** Session controller serializing three event sources
//! (user commands, remote session callbacks, sink backpressure) behind a
//! single state lock, with a WebSocket session client and a cpal + ring
//! buffer output path.

pub mod audio;
pub mod controller;
pub mod error;
pub mod session;

pub use controller::{ControllerConfig, SessionController};
pub use error::{Error, Result};
