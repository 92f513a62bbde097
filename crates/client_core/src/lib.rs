pub mod backend;
pub mod bootstrap;
pub mod capture;
pub mod config;
pub mod controller;
pub mod error;
pub mod markers;
pub mod preferences;
pub mod projection;
pub mod transcription;

#[cfg(test)]
mod test_support;

pub use backend::{HttpInterviewBackend, InterviewBackend, MissingInterviewBackend};
pub use bootstrap::{FirstTurn, SessionBootstrap};
pub use capture::{CaptureDevice, DeniedDevice, PcmSampleDevice, WavFileDevice};
pub use config::{load_settings, Settings};
pub use controller::{
    ControllerEvent, ControllerOptions, ControllerPhase, ControllerSnapshot, MountOutcome,
    SessionController, SubmitOutcome, SubmitRejection, VoiceOutcome,
};
pub use error::{BackendError, BootstrapError, BootstrapErrorKind, TranscriptionError};
pub use markers::SessionMarkers;
pub use preferences::{DebouncedPreferenceWriter, PreferenceStore};
pub use projection::SurfaceKind;
pub use transcription::{RecordingState, TranscriptionAdapter};
