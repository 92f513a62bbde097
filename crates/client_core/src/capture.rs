//! Audio capture devices. Arming a device is the permission prompt; finishing yields WAV bytes.

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tracing::debug;

use crate::error::DeviceError;

pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Resolves once the device is armed and capturing, or with the denial.
    async fn arm(&self) -> Result<Box<dyn ActiveCapture>, DeviceError>;
}

#[async_trait]
pub trait ActiveCapture: Send {
    /// Stops capture and returns the recording encoded as WAV.
    async fn finish(self: Box<Self>) -> Result<Vec<u8>, DeviceError>;
}

/// Used when voice input is disabled or no device exists.
pub struct DeniedDevice {
    reason: String,
}

impl DeniedDevice {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CaptureDevice for DeniedDevice {
    async fn arm(&self) -> Result<Box<dyn ActiveCapture>, DeviceError> {
        Err(DeviceError::Unavailable(self.reason.clone()))
    }
}

/// Serves a prerecorded WAV clip as the "recording". A missing clip is a denial.
pub struct WavFileDevice {
    path: PathBuf,
}

impl WavFileDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

struct WavFileCapture {
    path: PathBuf,
    started_at: Instant,
}

#[async_trait]
impl CaptureDevice for WavFileDevice {
    async fn arm(&self) -> Result<Box<dyn ActiveCapture>, DeviceError> {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|err| {
            DeviceError::PermissionDenied(format!("{}: {err}", self.path.display()))
        })?;
        if !metadata.is_file() {
            return Err(DeviceError::Unavailable(format!(
                "{} is not a file",
                self.path.display()
            )));
        }
        Ok(Box::new(WavFileCapture {
            path: self.path.clone(),
            started_at: Instant::now(),
        }))
    }
}

#[async_trait]
impl ActiveCapture for WavFileCapture {
    async fn finish(self: Box<Self>) -> Result<Vec<u8>, DeviceError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|err| DeviceError::Unavailable(format!("{}: {err}", self.path.display())))?;
        debug!(
            size_bytes = bytes.len(),
            held_ms = self.started_at.elapsed().as_millis() as u64,
            "capture: clip finalized"
        );
        Ok(bytes)
    }
}

/// Replays fixed mono PCM samples, encoded on finish.
pub struct PcmSampleDevice {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl PcmSampleDevice {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// A sine tone, handy for exercising the upload path without a microphone.
    pub fn tone(frequency_hz: f32, duration: Duration) -> Self {
        let sample_rate = DEFAULT_SAMPLE_RATE;
        let count = (duration.as_millis() * sample_rate as u128 / 1000) as usize;
        let samples = (0..count)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                0.25 * (2.0 * std::f32::consts::PI * frequency_hz * t).sin()
            })
            .collect();
        Self::new(samples, sample_rate)
    }
}

struct PcmCapture {
    samples: Vec<f32>,
    sample_rate: u32,
}

#[async_trait]
impl CaptureDevice for PcmSampleDevice {
    async fn arm(&self) -> Result<Box<dyn ActiveCapture>, DeviceError> {
        Ok(Box::new(PcmCapture {
            samples: self.samples.clone(),
            sample_rate: self.sample_rate,
        }))
    }
}

#[async_trait]
impl ActiveCapture for PcmCapture {
    async fn finish(self: Box<Self>) -> Result<Vec<u8>, DeviceError> {
        Ok(encode_wav_pcm16(&self.samples, self.sample_rate))
    }
}

/// 16-bit little-endian mono PCM WAV. Samples are clamped to [-1, 1].
pub fn encode_wav_pcm16(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let num_channels = 1u16;
    let bits_per_sample = 16u16;
    let block_align = num_channels * (bits_per_sample / 8);
    let byte_rate = sample_rate * block_align as u32;
    let data_len = samples.len() as u32 * block_align as u32;
    let riff_len = 4 + (8 + 16) + (8 + data_len);

    let mut out = Vec::with_capacity(8 + riff_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_len.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&num_channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_describes_mono_pcm16() {
        let wav = encode_wav_pcm16(&[0.0, 1.0, -2.0], 16_000);

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes([wav[4], wav[5], wav[6], wav[7]]), 36 + 6);
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 1);
        assert_eq!(
            u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]),
            16_000
        );
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 6);
        assert_eq!(wav.len(), 44 + 6);
        assert_eq!(i16::from_le_bytes([wav[46], wav[47]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([wav[48], wav[49]]), -i16::MAX);
    }

    #[tokio::test]
    async fn missing_clip_is_a_permission_denial() {
        let device = WavFileDevice::new("/definitely/not/here.wav");
        match device.arm().await {
            Err(DeviceError::PermissionDenied(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("arm should fail"),
        }
    }

    #[tokio::test]
    async fn wav_file_device_returns_clip_bytes() {
        let suffix = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("interview_clip_{suffix}.wav"));
        let clip = encode_wav_pcm16(&[0.1, 0.2], DEFAULT_SAMPLE_RATE);
        std::fs::write(&path, &clip).expect("write clip");

        let capture = WavFileDevice::new(&path).arm().await.expect("arm");
        let bytes = capture.finish().await.expect("finish");

        assert_eq!(bytes, clip);
        std::fs::remove_file(path).expect("cleanup");
    }

    #[tokio::test]
    async fn tone_device_encodes_on_finish() {
        let device = PcmSampleDevice::tone(440.0, Duration::from_millis(10));
        let wav = device
            .arm()
            .await
            .expect("arm")
            .finish()
            .await
            .expect("finish");
        assert_eq!(wav.len(), 44 + 160 * 2);
    }

    #[tokio::test]
    async fn denied_device_never_arms() {
        assert!(DeniedDevice::new("voice input disabled")
            .arm()
            .await
            .is_err());
    }
}
