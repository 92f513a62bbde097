//! Read-only views over a transcript for the presentation surfaces.

use shared::domain::{Speaker, Turn, TurnStatus};

/// The latest real assistant turn. Synthetic error turns are not questions.
pub fn current_question(transcript: &[Turn]) -> Option<&Turn> {
    transcript
        .iter()
        .rev()
        .find(|turn| turn.speaker == Speaker::Assistant && !turn.is_error)
}

/// The most recent user turn, if it failed and nothing has been sent since.
pub fn last_failed_user_turn(transcript: &[Turn]) -> Option<&Turn> {
    transcript
        .iter()
        .rev()
        .find(|turn| turn.is_user())
        .filter(|turn| turn.status == TurnStatus::Failed)
}

pub fn pending_turn(transcript: &[Turn]) -> Option<&Turn> {
    transcript
        .iter()
        .rev()
        .find(|turn| turn.status == TurnStatus::Pending)
}

/// Which host surface renders the session: the full transcript panel or the single-question view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceKind {
    #[default]
    Panel,
    Focus,
}

/// The turns a surface shows. Focus shows only the current question.
pub fn visible_turns(kind: SurfaceKind, transcript: &[Turn]) -> Vec<&Turn> {
    match kind {
        SurfaceKind::Panel => transcript.iter().collect(),
        SurfaceKind::Focus => current_question(transcript).into_iter().collect(),
    }
}
