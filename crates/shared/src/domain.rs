use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);
    };
}

id_newtype!(TurnId);

/// Local correlation id for one bootstrapped conversation. Never sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Pending,
    Delivered,
    Failed,
}

impl TurnStatus {
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub text: String,
    pub speaker: Speaker,
    pub sent_at: DateTime<Utc>,
    pub status: TurnStatus,
    /// Set on the synthetic assistant turn appended when a chat request fails.
    #[serde(default)]
    pub is_error: bool,
}

impl Turn {
    pub fn is_user(&self) -> bool {
        self.speaker == Speaker::User
    }

    pub fn is_assistant(&self) -> bool {
        self.speaker == Speaker::Assistant
    }
}

/// Setup-form fields as persisted between launches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupPreferences {
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub goals: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl SetupPreferences {
    /// Field-wise equality, ignoring `last_updated`.
    pub fn same_fields(&self, other: &Self) -> bool {
        self.context == other.context
            && self.background == other.background
            && self.goals == other.goals
    }
}

/// Inputs submitted to session bootstrap. `context` and `goals` are required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupInput {
    pub context: String,
    pub background: String,
    pub goals: String,
}

impl SetupInput {
    pub fn new(
        context: impl Into<String>,
        background: impl Into<String>,
        goals: impl Into<String>,
    ) -> Self {
        Self {
            context: context.into(),
            background: background.into(),
            goals: goals.into(),
        }
    }
}

impl From<&SetupPreferences> for SetupInput {
    fn from(value: &SetupPreferences) -> Self {
        Self {
            context: value.context.clone(),
            background: value.background.clone(),
            goals: value.goals.clone(),
        }
    }
}

impl From<&SetupInput> for SetupPreferences {
    fn from(value: &SetupInput) -> Self {
        Self {
            context: value.context.clone(),
            background: value.background.clone(),
            goals: value.goals.clone(),
            last_updated: None,
        }
    }
}
