use client_core::{
    projection::visible_turns, ControllerEvent, RecordingState, SubmitOutcome, SubmitRejection,
    SurfaceKind, VoiceOutcome,
};
use shared::domain::{Speaker, Turn, TurnStatus};

fn label(turn: &Turn) -> &'static str {
    match turn.speaker {
        Speaker::User => "you",
        Speaker::Assistant => "interviewer",
    }
}

/// Line to print for a controller event, if the surface shows it.
pub fn event_line(kind: SurfaceKind, event: &ControllerEvent) -> Option<String> {
    match (kind, event) {
        (_, ControllerEvent::RedirectToSetup) => {
            Some("no active session; run setup first".to_string())
        }
        (SurfaceKind::Panel, ControllerEvent::TurnAppended(turn)) => {
            let time = turn.sent_at.format("%H:%M:%S");
            Some(format!("[{time}] {}: {}", label(turn), turn.text))
        }
        (SurfaceKind::Focus, ControllerEvent::TurnAppended(turn)) if turn.is_assistant() => {
            if turn.is_error {
                Some(format!("! {}", turn.text))
            } else {
                Some(format!("\n>> {}\n", turn.text))
            }
        }
        (_, ControllerEvent::TurnUpdated(turn)) if turn.status == TurnStatus::Failed => Some(
            format!("(not delivered: \"{}\"; type /retry to resend)", turn.text),
        ),
        (SurfaceKind::Focus, ControllerEvent::DraftChanged(draft)) if !draft.is_empty() => {
            Some(format!("draft: {draft}"))
        }
        _ => None,
    }
}

/// Full redraw of what the surface currently shows.
pub fn screen(kind: SurfaceKind, transcript: &[Turn]) -> Vec<String> {
    visible_turns(kind, transcript)
        .into_iter()
        .map(|turn| match kind {
            SurfaceKind::Panel => format!("{}: {}", label(turn), turn.text),
            SurfaceKind::Focus => format!(">> {}", turn.text),
        })
        .collect()
}

pub fn recording_line(state: RecordingState) -> Option<String> {
    match state {
        RecordingState::Recording => Some("(recording; type /stop to finish)".to_string()),
        RecordingState::Uploading => Some("(transcribing...)".to_string()),
        RecordingState::Failed => Some("(recording failed)".to_string()),
        RecordingState::Idle | RecordingState::RequestingDevice => None,
    }
}

pub fn submit_line(outcome: SubmitOutcome) -> Option<String> {
    match outcome {
        SubmitOutcome::Rejected(SubmitRejection::NotReady(_)) => {
            Some("(still waiting for the last reply)".to_string())
        }
        SubmitOutcome::Rejected(SubmitRejection::NothingToRetry) => {
            Some("(nothing to retry)".to_string())
        }
        _ => None,
    }
}

pub fn voice_line(outcome: &VoiceOutcome) -> Option<String> {
    match outcome {
        VoiceOutcome::Submitted(outcome) => submit_line(*outcome),
        VoiceOutcome::Drafted(text) => Some(format!("draft: {text} (type /send to submit)")),
        VoiceOutcome::NothingRecognized => Some("(no speech recognized)".to_string()),
        VoiceOutcome::Discarded(kind) => Some(format!("(recording discarded: {kind:?})")),
    }
}
