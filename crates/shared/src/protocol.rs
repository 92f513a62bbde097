use serde::{Deserialize, Serialize};

pub const INITIALIZE_PATH: &str = "/initialize_interview";
pub const CHAT_PATH: &str = "/chat";
pub const TRANSCRIBE_PATH: &str = "/transcribe";

pub const TRANSCRIBE_FIELD: &str = "audio";
pub const TRANSCRIBE_FILENAME: &str = "audio.wav";
pub const TRANSCRIBE_MIME: &str = "audio/wav";

/// Which body shape `/initialize_interview` is sent with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitializePayloadStyle {
    #[default]
    Background,
    AdditionalContext,
}

impl std::str::FromStr for InitializePayloadStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "background" => Ok(Self::Background),
            "additional_context" | "additional-context" => Ok(Self::AdditionalContext),
            other => Err(format!("unknown initialize payload style '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitializeInterviewRequest {
    WithBackground {
        context: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        background: Option<String>,
        goals: String,
    },
    WithAdditionalContext {
        context: String,
        goals: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        additional_context: Option<String>,
    },
}

impl InitializeInterviewRequest {
    pub fn build(
        style: InitializePayloadStyle,
        context: &str,
        background: &str,
        goals: &str,
    ) -> Self {
        let extra = Some(background.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        match style {
            InitializePayloadStyle::Background => Self::WithBackground {
                context: context.to_string(),
                background: extra,
                goals: goals.to_string(),
            },
            InitializePayloadStyle::AdditionalContext => Self::WithAdditionalContext {
                context: context.to_string(),
                goals: goals.to_string(),
                additional_context: extra,
            },
        }
    }
}

/// Success body of both `/initialize_interview` and `/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscribeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl TranscribeResponse {
    /// Recognized text, or `None` when the backend heard nothing usable.
    pub fn recognized(self) -> Option<String> {
        self.text.filter(|text| !text.trim().is_empty())
    }
}
