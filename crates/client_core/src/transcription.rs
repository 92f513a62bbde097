//! Recording lifecycle around a capture device and the `/transcribe` upload.
//!
//! `IDLE -> REQUESTING_DEVICE -> RECORDING -> UPLOADING -> IDLE`, with a pass through
//! `FAILED` back to `IDLE` when the device is denied or the upload fails. The adapter
//! never touches a transcript; recognized text is returned to the caller, which feeds it
//! through the controller's submit path.

use std::{fmt, sync::Arc};

use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::{
    backend::InterviewBackend,
    capture::{ActiveCapture, CaptureDevice},
    error::{StateError, TranscriptionError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    RequestingDevice,
    Recording,
    Uploading,
    Failed,
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::RequestingDevice => "requesting device",
            Self::Recording => "recording",
            Self::Uploading => "uploading",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

struct AdapterState {
    state: RecordingState,
    active: Option<Box<dyn ActiveCapture>>,
}

pub struct TranscriptionAdapter {
    device: Arc<dyn CaptureDevice>,
    backend: Arc<dyn InterviewBackend>,
    inner: Mutex<AdapterState>,
    events: broadcast::Sender<RecordingState>,
}

impl TranscriptionAdapter {
    pub fn new(device: Arc<dyn CaptureDevice>, backend: Arc<dyn InterviewBackend>) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            device,
            backend,
            inner: Mutex::new(AdapterState {
                state: RecordingState::Idle,
                active: None,
            }),
            events,
        })
    }

    pub async fn state(&self) -> RecordingState {
        self.inner.lock().await.state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingState> {
        self.events.subscribe()
    }

    fn transition(&self, guard: &mut AdapterState, next: RecordingState) {
        guard.state = next;
        let _ = self.events.send(next);
    }

    /// Arms the device. Suspends for the permission prompt without holding any lock.
    pub async fn request_start(&self) -> Result<(), TranscriptionError> {
        {
            let mut guard = self.inner.lock().await;
            if guard.state != RecordingState::Idle {
                return Err(StateError::new("request_start", guard.state).into());
            }
            self.transition(&mut guard, RecordingState::RequestingDevice);
        }

        let armed = self.device.arm().await;

        let mut guard = self.inner.lock().await;
        match armed {
            Ok(capture) => {
                guard.active = Some(capture);
                self.transition(&mut guard, RecordingState::Recording);
                info!("transcription: recording started");
                Ok(())
            }
            Err(err) => {
                warn!("transcription: device unavailable: {err}");
                self.transition(&mut guard, RecordingState::Failed);
                self.transition(&mut guard, RecordingState::Idle);
                Err(err.into())
            }
        }
    }

    /// Finalizes the recording and uploads it. The recording is consumed either way.
    pub async fn request_stop(&self) -> Result<Option<String>, TranscriptionError> {
        let capture = {
            let mut guard = self.inner.lock().await;
            if guard.state != RecordingState::Recording {
                return Err(StateError::new("request_stop", guard.state).into());
            }
            let Some(capture) = guard.active.take() else {
                self.transition(&mut guard, RecordingState::Idle);
                return Err(StateError::new("request_stop", "recording without capture").into());
            };
            self.transition(&mut guard, RecordingState::Uploading);
            capture
        };

        let result = self.finish_and_upload(capture).await;

        let mut guard = self.inner.lock().await;
        match &result {
            Ok(text) => {
                info!(
                    recognized = text.is_some(),
                    "transcription: upload complete"
                );
            }
            Err(err) => {
                warn!("transcription: recording discarded: {err}");
                self.transition(&mut guard, RecordingState::Failed);
            }
        }
        self.transition(&mut guard, RecordingState::Idle);
        result
    }

    async fn finish_and_upload(
        &self,
        capture: Box<dyn ActiveCapture>,
    ) -> Result<Option<String>, TranscriptionError> {
        let wav = capture.finish().await?;
        Ok(self.backend.transcribe(wav).await?)
    }
}

#[cfg(test)]
#[path = "tests/transcription_tests.rs"]
mod tests;
