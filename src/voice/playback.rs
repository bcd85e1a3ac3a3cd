//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use crate::adapters::AudioSink;
use crate::{Error, Result};

/// Sample rate assumed when an MP3 stream carries no frames
const FALLBACK_SAMPLE_RATE: u32 = 24000;

/// Plays MP3 audio on the default output device
///
/// Each `play` call opens the device, plays to completion, and releases it.
/// The decode and playback run on the blocking thread pool; cpal streams
/// are built inside the blocking task so nothing non-`Send` escapes it.
pub struct AudioPlayback {
    device_name: String,
}

impl AudioPlayback {
    /// Create a playback instance, verifying an output device exists
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let device_name = device.name().unwrap_or_default();
        tracing::debug!(device = device_name, "audio playback initialized");
        Ok(Self { device_name })
    }

    /// Play raw f32 samples (used by the speaker test)
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    pub async fn play_samples(&mut self, samples: Vec<f32>, sample_rate: u32) -> Result<()> {
        tracing::debug!(device = self.device_name, samples = samples.len(), "playing samples");
        tokio::task::spawn_blocking(move || play_blocking(&samples, sample_rate))
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }
}

#[async_trait]
impl AudioSink for AudioPlayback {
    async fn play(&mut self, audio: &[u8]) -> Result<()> {
        let data = audio.to_vec();
        tokio::task::spawn_blocking(move || {
            let (samples, sample_rate) = decode_mp3(&data)?;
            play_blocking(&samples, sample_rate)
        })
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }
}

/// Play samples to completion on the default output device
fn play_blocking(samples: &[f32], sample_rate: u32) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;

    let supported_config = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() <= 2
                && c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    let config = supported_config
        .with_sample_rate(SampleRate(sample_rate))
        .config();
    let channels = usize::from(config.channels);

    let samples = Arc::new(samples.to_vec());
    let position = Arc::new(AtomicUsize::new(0));

    let samples_cb = Arc::clone(&samples);
    let position_cb = Arc::clone(&position);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut pos = position_cb.load(Ordering::Relaxed);
                for frame in data.chunks_mut(channels) {
                    // Past the end, emit silence until the poller notices
                    let sample = samples_cb.get(pos).copied().unwrap_or(0.0);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                    if pos < samples_cb.len() {
                        pos += 1;
                    }
                }
                position_cb.store(pos, Ordering::Relaxed);
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    #[allow(clippy::cast_precision_loss)]
    let duration = Duration::from_secs_f64(samples.len() as f64 / f64::from(sample_rate));
    let deadline = Instant::now() + duration + Duration::from_millis(500);

    while position.load(Ordering::Relaxed) < samples.len() {
        if Instant::now() > deadline {
            tracing::warn!("playback deadline exceeded, stopping");
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    // Brief drain so the device flushes its last buffer
    std::thread::sleep(Duration::from_millis(100));
    drop(stream);

    tracing::debug!(samples = samples.len(), "playback complete");
    Ok(())
}

/// Decode MP3 bytes to mono f32 samples plus the stream's sample rate
fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = FALLBACK_SAMPLE_RATE;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                #[allow(clippy::cast_sign_loss)]
                {
                    sample_rate = frame.sample_rate.max(1) as u32;
                }

                if frame.channels == 2 {
                    // Stereo: average channels down to mono
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok((samples, sample_rate))
}
