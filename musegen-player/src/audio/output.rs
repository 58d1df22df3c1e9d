//! Audio output using cpal
//!
//! Wraps the system output device behind the [`OutputSink`] trait the
//! controller consumes. The cpal stream is not Send, so the stream lives on
//! a dedicated thread that keeps it alive; the controller side holds only
//! the ring buffer producer and a shutdown flag.

use crate::audio::ring_buffer::{FrameConsumer, FrameProducer, FrameRingBuffer};
use crate::audio::types::{AudioFrame, OutputFormat};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Ordered writer onto the playback device
///
/// The controller is the only writer. `write` enqueues PCM data in call
/// order; a full buffer is a recoverable per-chunk failure. `close` releases
/// the device deterministically and is safe to call repeatedly.
pub trait OutputSink: Send {
    /// Enqueue interleaved 16-bit PCM bytes for playback
    fn write(&mut self, pcm: &[u8]) -> Result<()>;

    /// Release the output device (idempotent)
    fn close(&mut self);
}

/// Factory for output sinks, the seam between controller and device
pub trait SinkOpener: Send + Sync {
    /// Open a sink for the given format, or fail with [`Error::Device`]
    fn open(&self, format: OutputFormat) -> Result<Box<dyn OutputSink>>;
}

/// How long `open` waits for the device thread to report readiness
const DEVICE_INIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Audio output manager using cpal
///
/// Created once per session via [`AudioOutput::open`]; the stream thread
/// owns the cpal handles and drains the ring buffer from the device
/// callback.
pub struct AudioOutput {
    producer: FrameProducer,
    shutdown: Arc<AtomicBool>,
    /// Set by the stream error callback; writes keep going (transient
    /// device hiccups recover without controller involvement)
    error_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    format: OutputFormat,
    closed: bool,
}

impl AudioOutput {
    /// Open the output device and start the playback stream
    ///
    /// # Arguments
    /// - `format`: session output format (stereo 16-bit 48kHz)
    /// - `device_name`: optional device name (None = default device)
    /// - `buffer_ms`: ring buffer capacity in milliseconds of audio
    ///
    /// # Errors
    /// [`Error::Device`] if no usable device/configuration exists or the
    /// stream fails to start.
    pub fn open(
        format: OutputFormat,
        device_name: Option<String>,
        buffer_ms: u32,
    ) -> Result<Self> {
        let capacity = (format.sample_rate as usize * buffer_ms as usize / 1000).max(1024);
        let ring = FrameRingBuffer::new(capacity);
        let (producer, consumer) = ring.split();

        let shutdown = Arc::new(AtomicBool::new(false));
        let error_flag = Arc::new(AtomicBool::new(false));
        let (init_tx, init_rx) = mpsc::channel();

        let thread_shutdown = Arc::clone(&shutdown);
        let thread_error_flag = Arc::clone(&error_flag);
        let thread = std::thread::Builder::new()
            .name("musegen-audio-output".to_string())
            .spawn(move || {
                run_output_thread(
                    format,
                    device_name,
                    consumer,
                    thread_shutdown,
                    thread_error_flag,
                    init_tx,
                );
            })
            .map_err(|e| Error::Device(format!("Failed to spawn audio thread: {}", e)))?;

        match init_rx.recv_timeout(DEVICE_INIT_TIMEOUT) {
            Ok(Ok(())) => {
                info!(
                    "Audio output started: {} ch, {} Hz, {} frame buffer",
                    format.channels, format.sample_rate, capacity
                );
                Ok(Self {
                    producer,
                    shutdown,
                    error_flag,
                    thread: Some(thread),
                    format,
                    closed: false,
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                shutdown.store(true, Ordering::Release);
                Err(Error::Device(
                    "Timed out waiting for audio device to start".to_string(),
                ))
            }
        }
    }

    /// Whether the stream reported an error since the last check
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }

    /// Current ring buffer fill level in frames
    pub fn buffered_frames(&self) -> usize {
        self.producer.occupied_len()
    }
}

impl OutputSink for AudioOutput {
    fn write(&mut self, pcm: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::SinkWrite("sink is closed".to_string()));
        }

        let frames = pcm16_to_frames(pcm, self.format.channels);
        if frames.is_empty() {
            return Ok(());
        }

        let written = self.producer.write_frames(&frames);
        if written < frames.len() {
            return Err(Error::SinkWrite(format!(
                "output buffer full, dropped {} of {} frames",
                frames.len() - written,
                frames.len()
            )));
        }

        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }

        info!("Audio output closed");
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        // Ensure the device is released on drop
        self.close();
    }
}

/// Opens [`AudioOutput`] sinks for real playback
#[derive(Debug, Clone)]
pub struct DeviceSinkOpener {
    /// Requested device name (None = default device)
    pub device_name: Option<String>,

    /// Ring buffer capacity in milliseconds of audio
    pub buffer_ms: u32,
}

impl SinkOpener for DeviceSinkOpener {
    fn open(&self, format: OutputFormat) -> Result<Box<dyn OutputSink>> {
        let output = AudioOutput::open(format, self.device_name.clone(), self.buffer_ms)?;
        Ok(Box::new(output))
    }
}

/// Convert interleaved little-endian 16-bit PCM bytes into frames
///
/// Trailing bytes that do not form a whole frame are dropped.
fn pcm16_to_frames(pcm: &[u8], channels: u16) -> Vec<AudioFrame> {
    let bytes_per_frame = channels as usize * 2;
    if bytes_per_frame == 0 {
        return Vec::new();
    }

    let remainder = pcm.len() % bytes_per_frame;
    if remainder != 0 {
        trace!("Dropping {} trailing bytes of partial audio frame", remainder);
    }

    pcm.chunks_exact(bytes_per_frame)
        .map(|chunk| {
            let left = i16::from_le_bytes([chunk[0], chunk[1]]);
            let right = if channels > 1 {
                i16::from_le_bytes([chunk[2], chunk[3]])
            } else {
                left
            };
            AudioFrame::from_i16(left, right)
        })
        .collect()
}

/// Runs on the dedicated audio thread: builds the stream, reports readiness,
/// then keeps the stream alive until shutdown
fn run_output_thread(
    format: OutputFormat,
    device_name: Option<String>,
    consumer: FrameConsumer,
    shutdown: Arc<AtomicBool>,
    error_flag: Arc<AtomicBool>,
    init_tx: mpsc::Sender<Result<()>>,
) {
    let stream = match build_stream(format, device_name, consumer, error_flag) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = init_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = init_tx.send(Err(Error::Device(format!("Failed to start stream: {}", e))));
        return;
    }

    let _ = init_tx.send(Ok(()));

    // The stream runs on its own; this thread only keeps it alive.
    while !shutdown.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(50));
    }

    if let Err(e) = stream.pause() {
        warn!("Failed to pause stream during close: {}", e);
    }
    drop(stream);
    debug!("Audio output thread exiting");
}

/// Open the device and build an output stream for the negotiated format
fn build_stream(
    format: OutputFormat,
    device_name: Option<String>,
    mut consumer: FrameConsumer,
    error_flag: Arc<AtomicBool>,
) -> Result<Stream> {
    let host = cpal::default_host();

    // Try to get requested device, with fallback to default
    let device = if let Some(name) = device_name.as_ref() {
        let mut devices = host
            .output_devices()
            .map_err(|e| Error::Device(format!("Failed to enumerate devices: {}", e)))?;

        match devices.find(|d| d.name().ok().as_ref() == Some(name)) {
            Some(dev) => {
                info!("Found requested audio device: {}", name);
                dev
            }
            None => {
                warn!(
                    "Requested device '{}' not found, falling back to default device",
                    name
                );
                host.default_output_device().ok_or_else(|| {
                    Error::Device(format!(
                        "Device '{}' not found and no default device available",
                        name
                    ))
                })?
            }
        }
    } else {
        let dev = host
            .default_output_device()
            .ok_or_else(|| Error::Device("No default output device found".to_string()))?;
        info!(
            "Using default audio device: {}",
            dev.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        dev
    };

    let (config, sample_format) = best_config(&device, format)?;

    debug!(
        "Audio config: sample_rate={}, channels={}, format={:?}",
        config.sample_rate.0, config.channels, sample_format
    );

    let channels = config.channels as usize;
    let err_cb = {
        let error_flag = Arc::clone(&error_flag);
        move |err: cpal::StreamError| {
            error!("Audio stream error: {}", err);
            error_flag.store(true, Ordering::SeqCst);
        }
    };

    let stream = match sample_format {
        SampleFormat::F32 => device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let sample = consumer.pop().unwrap_or_else(AudioFrame::zero);
                        frame[0] = sample.left.clamp(-1.0, 1.0);
                        if channels > 1 {
                            frame[1] = sample.right.clamp(-1.0, 1.0);
                        }
                    }
                },
                err_cb,
                None,
            )
            .map_err(|e| Error::Device(format!("Failed to build stream: {}", e)))?,
        SampleFormat::I16 => device
            .build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let sample = consumer.pop().unwrap_or_else(AudioFrame::zero);
                        let (left, right) = sample.to_i16();
                        frame[0] = left;
                        if channels > 1 {
                            frame[1] = right;
                        }
                    }
                },
                err_cb,
                None,
            )
            .map_err(|e| Error::Device(format!("Failed to build stream: {}", e)))?,
        other => {
            return Err(Error::Device(format!(
                "Unsupported sample format: {:?}",
                other
            )));
        }
    };

    Ok(stream)
}

/// Get the best supported configuration for the session format
///
/// Prefers an exact channel/rate match with f32 samples, then i16, then
/// falls back to the device default configuration.
fn best_config(device: &Device, format: OutputFormat) -> Result<(StreamConfig, SampleFormat)> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| Error::Device(format!("Failed to get device configs: {}", e)))?
        .collect();

    for wanted in [SampleFormat::F32, SampleFormat::I16] {
        let preferred = supported.iter().find(|config| {
            config.channels() == format.channels
                && config.min_sample_rate().0 <= format.sample_rate
                && config.max_sample_rate().0 >= format.sample_rate
                && config.sample_format() == wanted
        });

        if let Some(supported_config) = preferred {
            let sample_format = supported_config.sample_format();
            let config = supported_config
                .clone()
                .with_sample_rate(cpal::SampleRate(format.sample_rate))
                .config();
            return Ok((config, sample_format));
        }
    }

    // Fallback: use default config
    let supported_config = device
        .default_output_config()
        .map_err(|e| Error::Device(format!("Failed to get default config: {}", e)))?;

    let sample_format = supported_config.sample_format();
    let config = supported_config.config();
    Ok((config, sample_format))
}
