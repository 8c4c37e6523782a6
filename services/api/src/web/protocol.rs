//! services/api/src/web/protocol.rs
//!
//! Defines the message protocol between the browser client and the API server
//! for flashcard study mode.

use serde::{Deserialize, Serialize};
use study_assistant_core::study::{FlashcardStudy, StudyCommand};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// A study-mode action, sent as `{"type": "..."}`.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StudyCommandMessage {
    /// Reveals the answer of the current card.
    ShowAnswer,

    /// Moves to the next card and hides the answer.
    Next,

    /// Moves to the previous card and hides the answer.
    Previous,

    /// Marks the current card as known, then moves on unless it is the last card.
    MarkCompleted,

    /// Starts the deck over with nothing completed.
    Reset,
}

impl From<StudyCommandMessage> for StudyCommand {
    fn from(message: StudyCommandMessage) -> Self {
        match message {
            StudyCommandMessage::ShowAnswer => StudyCommand::ShowAnswer,
            StudyCommandMessage::Next => StudyCommand::Next,
            StudyCommandMessage::Previous => StudyCommand::Previous,
            StudyCommandMessage::MarkCompleted => StudyCommand::MarkCompleted,
            StudyCommandMessage::Reset => StudyCommand::Reset,
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Everything the client needs to render the current card.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct StudySnapshot {
    pub session_id: Uuid,
    pub document_id: Uuid,
    pub document_title: String,
    /// Zero-based position of the current card.
    pub index: usize,
    pub total: usize,
    pub question: String,
    /// Only present once the answer has been revealed.
    pub answer: Option<String>,
    pub answer_shown: bool,
    pub completed: Vec<usize>,
    /// Whether the card on screen has been marked completed.
    pub current_completed: bool,
    pub completed_count: usize,
    pub progress_percent: f64,
    pub finished: bool,
}

impl StudySnapshot {
    pub fn capture(
        session_id: Uuid,
        document_id: Uuid,
        document_title: &str,
        study: &FlashcardStudy,
    ) -> Self {
        let card = study.current();
        Self {
            session_id,
            document_id,
            document_title: document_title.to_string(),
            index: study.index(),
            total: study.len(),
            question: card.question.clone(),
            answer: study.answer_shown().then(|| card.answer.clone()),
            answer_shown: study.answer_shown(),
            completed: study.completed().collect(),
            current_completed: study.is_completed(study.index()),
            completed_count: study.completed_count(),
            progress_percent: study.progress_percent(),
            finished: study.is_finished(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_assistant_core::domain::FlashcardDraft;

    #[test]
    fn commands_are_tagged_by_type() {
        let message: StudyCommandMessage =
            serde_json::from_str(r#"{"type": "mark_completed"}"#).unwrap();
        assert_eq!(StudyCommand::from(message), StudyCommand::MarkCompleted);
        assert!(serde_json::from_str::<StudyCommandMessage>(r#"{"type": "shuffle"}"#).is_err());
    }

    #[test]
    fn answer_is_hidden_until_shown() {
        let mut study = FlashcardStudy::new(vec![FlashcardDraft {
            question: "2 + 2?".to_string(),
            answer: "4".to_string(),
        }])
        .unwrap();
        let hidden = StudySnapshot::capture(Uuid::nil(), Uuid::nil(), "Math", &study);
        assert_eq!(hidden.answer, None);

        study.apply(StudyCommand::ShowAnswer);
        let shown = StudySnapshot::capture(Uuid::nil(), Uuid::nil(), "Math", &study);
        assert_eq!(shown.answer.as_deref(), Some("4"));
        assert_eq!(shown.progress_percent, 100.0);
        assert!(!shown.current_completed);

        study.apply(StudyCommand::MarkCompleted);
        let done = StudySnapshot::capture(Uuid::nil(), Uuid::nil(), "Math", &study);
        assert!(done.current_completed);
    }
}
