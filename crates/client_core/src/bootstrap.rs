use std::sync::Arc;

use shared::{
    domain::{SessionId, SetupInput, SetupPreferences},
    protocol::{InitializeInterviewRequest, InitializePayloadStyle},
};
use tracing::{info, warn};

use crate::{
    backend::InterviewBackend,
    error::{BootstrapError, BootstrapErrorKind},
    markers::SessionMarkers,
    preferences::PreferenceStore,
};

/// Greeting returned by a successful bootstrap. Also stored as the pending first turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstTurn {
    pub session_id: SessionId,
    pub greeting: String,
}

/// Turns setup input into a live backend session.
///
/// Each successful `start` creates a new backend session; suppressing accidental
/// double submits is left to the caller.
pub struct SessionBootstrap {
    backend: Arc<dyn InterviewBackend>,
    markers: SessionMarkers,
    preferences: Option<PreferenceStore>,
    payload_style: InitializePayloadStyle,
}

impl SessionBootstrap {
    pub fn new(backend: Arc<dyn InterviewBackend>, markers: SessionMarkers) -> Self {
        Self {
            backend,
            markers,
            preferences: None,
            payload_style: InitializePayloadStyle::default(),
        }
    }

    /// Remember submitted setup fields so the form is pre-filled next launch.
    pub fn with_preferences(mut self, preferences: PreferenceStore) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn with_payload_style(mut self, payload_style: InitializePayloadStyle) -> Self {
        self.payload_style = payload_style;
        self
    }

    pub async fn start(&self, input: &SetupInput) -> Result<FirstTurn, BootstrapError> {
        validate(input)?;

        if let Some(preferences) = &self.preferences {
            if let Err(err) = preferences.save(&SetupPreferences::from(input)).await {
                warn!("bootstrap: could not remember setup fields: {err:#}");
            }
        }

        let session_id = SessionId::new();
        let request = InitializeInterviewRequest::build(
            self.payload_style,
            input.context.trim(),
            &input.background,
            input.goals.trim(),
        );
        info!(%session_id, "bootstrap: initializing interview");

        let greeting = self
            .backend
            .initialize_interview(&request)
            .await
            .map_err(|err| {
                warn!(%session_id, "bootstrap: initialize failed: {err}");
                BootstrapError::from(err)
            })?;

        self.markers.begin(&greeting).await.map_err(|err| {
            BootstrapError::new(BootstrapErrorKind::Storage, format!("{err:#}"))
        })?;

        info!(%session_id, "bootstrap: session active");
        Ok(FirstTurn {
            session_id,
            greeting,
        })
    }
}

fn validate(input: &SetupInput) -> Result<(), BootstrapError> {
    let mut missing = Vec::new();
    if input.context.trim().is_empty() {
        missing.push("context");
    }
    if input.goals.trim().is_empty() {
        missing.push("goals");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(BootstrapError::validation(format!(
            "required setup fields missing: {}",
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
#[path = "tests/bootstrap_tests.rs"]
mod tests;
