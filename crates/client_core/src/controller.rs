//! The session controller: sole owner and writer of the transcript.
//!
//! Every mutation goes through one lock and the READY/SENDING gate. The lock is never held
//! across a network await; a response is applied only if the controller is still mounted.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use shared::{
    domain::{Speaker, Turn, TurnId, TurnStatus},
    error::ErrorKind,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    backend::InterviewBackend,
    error::{DeviceError, StateError, TranscriptionError},
    markers::SessionMarkers,
    projection,
    transcription::{RecordingState, TranscriptionAdapter},
};

pub const CHAT_ERROR_TEXT: &str = "Error: Unable to get response";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    AwaitingSetup,
    Ready,
    Sending,
}

impl std::fmt::Display for ControllerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::AwaitingSetup => "awaiting setup",
            Self::Ready => "ready",
            Self::Sending => "sending",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSnapshot {
    pub phase: ControllerPhase,
    pub transcript: Vec<Turn>,
    pub draft: String,
    pub recording: Option<RecordingState>,
    pub alive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    RedirectToSetup,
    PhaseChanged(ControllerPhase),
    TurnAppended(Turn),
    TurnUpdated(Turn),
    DraftChanged(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    RedirectToSetup,
    Ready { greeting: Option<TurnId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    Empty,
    NotReady(ControllerPhase),
    Unmounted,
    NothingToRetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Rejected(SubmitRejection),
    Delivered { user: TurnId, reply: TurnId },
    Failed { user: TurnId, error_turn: TurnId },
    /// The reply arrived after unmount and was dropped.
    Discarded { user: TurnId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceOutcome {
    Submitted(SubmitOutcome),
    /// Recognized text placed in the draft instead of being sent.
    Drafted(String),
    NothingRecognized,
    /// Device or upload failure. Logged only; the transcript is untouched.
    Discarded(ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
    pub auto_send_transcription: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            auto_send_transcription: true,
        }
    }
}

struct ControllerState {
    phase: ControllerPhase,
    mounted: bool,
    transcript: Vec<Turn>,
    draft: String,
    next_turn_id: u64,
}

impl ControllerState {
    fn append(&mut self, speaker: Speaker, text: &str, status: TurnStatus, is_error: bool) -> Turn {
        let now = Utc::now();
        let sent_at: DateTime<Utc> = match self.transcript.last() {
            Some(last) if last.sent_at > now => last.sent_at,
            _ => now,
        };
        self.next_turn_id += 1;
        let turn = Turn {
            id: TurnId(self.next_turn_id),
            text: text.to_string(),
            speaker,
            sent_at,
            status,
            is_error,
        };
        self.transcript.push(turn.clone());
        turn
    }

    fn settle(&mut self, id: TurnId, status: TurnStatus) -> Option<Turn> {
        let turn = self
            .transcript
            .iter_mut()
            .find(|turn| turn.id == id && !turn.status.is_settled())?;
        turn.status = status;
        Some(turn.clone())
    }
}

pub struct SessionController {
    backend: Arc<dyn InterviewBackend>,
    transcription: Option<Arc<TranscriptionAdapter>>,
    options: ControllerOptions,
    alive: AtomicBool,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
}

impl SessionController {
    pub fn new(
        backend: Arc<dyn InterviewBackend>,
        transcription: Option<Arc<TranscriptionAdapter>>,
        options: ControllerOptions,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            backend,
            transcription,
            options,
            alive: AtomicBool::new(true),
            inner: Mutex::new(ControllerState {
                phase: ControllerPhase::AwaitingSetup,
                mounted: false,
                transcript: Vec::new(),
                draft: String::new(),
                next_turn_id: 0,
            }),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Recording-state changes, when voice input is wired in.
    pub fn subscribe_recording(&self) -> Option<broadcast::Receiver<RecordingState>> {
        self.transcription.as_ref().map(|adapter| adapter.subscribe())
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// First-mount initialization. Once READY, later calls leave state alone and report
    /// the phase; a controller still awaiting setup re-checks the flag on every call.
    pub async fn mount(&self, markers: &SessionMarkers) -> MountOutcome {
        let mut guard = self.inner.lock().await;
        if guard.mounted && guard.phase != ControllerPhase::AwaitingSetup {
            return MountOutcome::Ready { greeting: None };
        }
        guard.mounted = true;

        if !markers.is_active().await {
            guard.phase = ControllerPhase::AwaitingSetup;
            drop(guard);
            info!("controller: no active session, redirecting to setup");
            self.emit(ControllerEvent::RedirectToSetup);
            return MountOutcome::RedirectToSetup;
        }

        let greeting = match markers.take_first_turn().await {
            Some(text) => {
                let turn = guard.append(Speaker::Assistant, &text, TurnStatus::Delivered, false);
                self.emit(ControllerEvent::TurnAppended(turn.clone()));
                Some(turn.id)
            }
            None => None,
        };
        guard.phase = ControllerPhase::Ready;
        drop(guard);

        info!(greeting = greeting.is_some(), "controller: mounted");
        self.emit(ControllerEvent::PhaseChanged(ControllerPhase::Ready));
        MountOutcome::Ready { greeting }
    }

    /// Marks the host view gone. In-flight replies are discarded when they land.
    pub fn unmount(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            info!("controller: unmounted");
        }
    }

    pub async fn phase(&self) -> ControllerPhase {
        self.inner.lock().await.phase
    }

    pub async fn snapshot(&self) -> ControllerSnapshot {
        let recording = match &self.transcription {
            Some(adapter) => Some(adapter.state().await),
            None => None,
        };
        let guard = self.inner.lock().await;
        ControllerSnapshot {
            phase: guard.phase,
            transcript: guard.transcript.clone(),
            draft: guard.draft.clone(),
            recording,
            alive: self.is_alive(),
        }
    }

    pub async fn set_draft(&self, text: impl Into<String>) {
        let text = text.into();
        let mut guard = self.inner.lock().await;
        if guard.draft == text {
            return;
        }
        guard.draft = text.clone();
        drop(guard);
        self.emit(ControllerEvent::DraftChanged(text));
    }

    /// Single entry point for typed and transcribed text.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        let user = {
            let mut guard = self.inner.lock().await;
            match self.begin_send(&mut guard, text) {
                Ok(turn) => turn,
                Err(rejection) => {
                    debug!(?rejection, "controller: submit rejected");
                    return SubmitOutcome::Rejected(rejection);
                }
            }
        };
        self.complete_send(user, text).await
    }

    /// Sends the current draft, clearing it only if the send is accepted.
    pub async fn submit_draft(&self) -> SubmitOutcome {
        let (user, text) = {
            let mut guard = self.inner.lock().await;
            let text = guard.draft.clone();
            let user = match self.begin_send(&mut guard, &text) {
                Ok(turn) => turn,
                Err(rejection) => return SubmitOutcome::Rejected(rejection),
            };
            guard.draft.clear();
            self.emit(ControllerEvent::DraftChanged(String::new()));
            (user, text)
        };
        self.complete_send(user, &text).await
    }

    /// Resubmits the most recent failed user text as a new turn.
    pub async fn retry_last_failed(&self) -> SubmitOutcome {
        let text = {
            let guard = self.inner.lock().await;
            projection::last_failed_user_turn(&guard.transcript).map(|turn| turn.text.clone())
        };
        match text {
            Some(text) => self.submit(&text).await,
            None => SubmitOutcome::Rejected(SubmitRejection::NothingToRetry),
        }
    }

    fn begin_send(&self, guard: &mut ControllerState, text: &str) -> Result<Turn, SubmitRejection> {
        if !self.is_alive() {
            return Err(SubmitRejection::Unmounted);
        }
        if text.trim().is_empty() {
            return Err(SubmitRejection::Empty);
        }
        if guard.phase != ControllerPhase::Ready {
            return Err(SubmitRejection::NotReady(guard.phase));
        }

        let turn = guard.append(Speaker::User, text, TurnStatus::Pending, false);
        guard.phase = ControllerPhase::Sending;
        self.emit(ControllerEvent::TurnAppended(turn.clone()));
        self.emit(ControllerEvent::PhaseChanged(ControllerPhase::Sending));
        Ok(turn)
    }

    async fn complete_send(&self, user: Turn, text: &str) -> SubmitOutcome {
        info!(turn_id = user.id.0, "controller: chat request sent");
        let result = self.backend.chat(text).await;

        let mut guard = self.inner.lock().await;
        if !self.is_alive() {
            info!(
                turn_id = user.id.0,
                "controller: discarding response after unmount"
            );
            return SubmitOutcome::Discarded { user: user.id };
        }

        let outcome = match result {
            Ok(reply) => {
                if let Some(updated) = guard.settle(user.id, TurnStatus::Delivered) {
                    self.emit(ControllerEvent::TurnUpdated(updated));
                }
                let reply = guard.append(Speaker::Assistant, &reply, TurnStatus::Delivered, false);
                info!(turn_id = reply.id.0, "controller: assistant turn appended");
                self.emit(ControllerEvent::TurnAppended(reply.clone()));
                SubmitOutcome::Delivered {
                    user: user.id,
                    reply: reply.id,
                }
            }
            Err(err) => {
                warn!(turn_id = user.id.0, "controller: chat request failed: {err}");
                if let Some(updated) = guard.settle(user.id, TurnStatus::Failed) {
                    self.emit(ControllerEvent::TurnUpdated(updated));
                }
                let error_turn =
                    guard.append(Speaker::Assistant, CHAT_ERROR_TEXT, TurnStatus::Delivered, true);
                self.emit(ControllerEvent::TurnAppended(error_turn.clone()));
                SubmitOutcome::Failed {
                    user: user.id,
                    error_turn: error_turn.id,
                }
            }
        };
        guard.phase = ControllerPhase::Ready;
        drop(guard);
        self.emit(ControllerEvent::PhaseChanged(ControllerPhase::Ready));
        outcome
    }

    /// Voice intent: arm the capture device. Text entry stays usable meanwhile.
    pub async fn start_recording(&self) -> Result<(), TranscriptionError> {
        let adapter = self.transcription.as_ref().ok_or_else(|| {
            DeviceError::Unavailable("voice input is disabled".to_string())
        })?;
        if !self.is_alive() {
            return Err(StateError::new("start_recording", "unmounted").into());
        }
        adapter.request_start().await
    }

    /// Voice intent: stop, transcribe, and route the text through `submit`.
    pub async fn stop_recording(&self) -> Result<VoiceOutcome, StateError> {
        let Some(adapter) = self.transcription.as_ref() else {
            return Err(StateError::new("stop_recording", "voice input disabled"));
        };

        let text = match adapter.request_stop().await {
            Ok(Some(text)) => text,
            Ok(None) => {
                info!("controller: transcription recognized nothing");
                return Ok(VoiceOutcome::NothingRecognized);
            }
            Err(TranscriptionError::State(err)) => return Err(err),
            Err(err) => {
                warn!("controller: transcription discarded: {err}");
                return Ok(VoiceOutcome::Discarded(err.kind()));
            }
        };

        if !self.is_alive() {
            return Ok(VoiceOutcome::Submitted(SubmitOutcome::Rejected(
                SubmitRejection::Unmounted,
            )));
        }

        if !self.options.auto_send_transcription {
            self.set_draft(text.clone()).await;
            return Ok(VoiceOutcome::Drafted(text));
        }

        match self.submit(&text).await {
            SubmitOutcome::Rejected(SubmitRejection::NotReady(phase)) => {
                debug!(%phase, "controller: transcription kept as draft while busy");
                self.set_draft(text.clone()).await;
                Ok(VoiceOutcome::Drafted(text))
            }
            outcome => Ok(VoiceOutcome::Submitted(outcome)),
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
