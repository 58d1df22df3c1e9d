//! Audio pipeline: chunk decoding, ring buffering, device output
//!
//! Chunks arrive from the generation session as base64-encoded 16-bit PCM.
//! The decoder turns them into raw bytes, the sink converts bytes to frames
//! and enqueues them on a lock-free ring buffer, and the cpal callback
//! drains frames into the device.

pub mod decode;
pub mod output;
pub mod ring_buffer;
pub mod types;

pub use decode::decode_chunk;
pub use output::{AudioOutput, DeviceSinkOpener, OutputSink, SinkOpener};
pub use types::{AudioFrame, OutputFormat};
