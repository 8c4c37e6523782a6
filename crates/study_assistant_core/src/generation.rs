//! crates/study_assistant_core/src/generation.rs
//!
//! The generation gateway: three sequential completion calls (summary,
//! flashcards, practice questions) whose output is parsed into `StudyMaterials`.
//! Nothing is returned unless all three steps produced a result.

use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{ArtifactKind, StudyMaterials};
use crate::ports::{CompletionRequest, CompletionService, PortError, PortResult};
use crate::parsing::{parse_flashcards, parse_practice_questions};

const SUMMARY_SYSTEM_PROMPT: &str = "You are an expert at creating comprehensive, well-structured summaries of study materials. Create a clear, organized summary that captures all key concepts, important details, and main points. Use bullet points and headers where appropriate to make it easy to study from.";

const FLASHCARDS_SYSTEM_PROMPT: &str = "You are an expert at creating effective study flashcards. Create 8-12 flashcards that test the most important concepts from the material. Each flashcard should have a clear, concise question and a detailed answer. Return ONLY a valid JSON array of objects with \"question\" and \"answer\" fields, with no surrounding text.";

const PRACTICE_SYSTEM_PROMPT: &str = "You are an expert at creating multiple choice practice questions. Create 5-8 challenging but fair questions that test understanding of key concepts, with exactly 4 options each. Return ONLY a valid JSON array of objects with \"question\", \"options\" (array of 4 strings), \"correctAnswer\" (the exact text of the correct option), and \"explanation\" fields, with no surrounding text.";

const SUMMARY_MAX_TOKENS: u32 = 2000;
const FLASHCARDS_MAX_TOKENS: u32 = 2000;
const PRACTICE_MAX_TOKENS: u32 = 2000;

pub struct StudyMaterialGenerator {
    completion: Arc<dyn CompletionService>,
}

impl StudyMaterialGenerator {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    /// Generates a summary, flashcards and practice questions for `content`.
    ///
    /// Any completion failure aborts the whole run. Unparseable flashcard or
    /// question output is replaced with placeholder content and reported in
    /// `StudyMaterials::fallbacks`.
    pub async fn generate(&self, title: Option<&str>, content: &str) -> PortResult<StudyMaterials> {
        if content.trim().is_empty() {
            return Err(PortError::InvalidInput("Content is required".to_string()));
        }

        let summary_prompt = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => format!(
                "Please create a comprehensive study summary of the following study material titled \"{}\":\n\n{}",
                title, content
            ),
            None => format!(
                "Please create a comprehensive study summary of the following content:\n\n{}",
                content
            ),
        };

        let summary = self
            .completion
            .complete(&CompletionRequest {
                artifact: ArtifactKind::Summary,
                system: SUMMARY_SYSTEM_PROMPT.to_string(),
                user: summary_prompt,
                max_tokens: SUMMARY_MAX_TOKENS,
            })
            .await?;
        let summary = summary.trim().to_string();
        if summary.is_empty() {
            return Err(PortError::Upstream(
                "Summary generation returned no text.".to_string(),
            ));
        }

        let raw_flashcards = self
            .completion
            .complete(&CompletionRequest {
                artifact: ArtifactKind::Flashcards,
                system: FLASHCARDS_SYSTEM_PROMPT.to_string(),
                user: format!("Create flashcards from this content:\n\n{}", content),
                max_tokens: FLASHCARDS_MAX_TOKENS,
            })
            .await?;

        let raw_questions = self
            .completion
            .complete(&CompletionRequest {
                artifact: ArtifactKind::PracticeQuestions,
                system: PRACTICE_SYSTEM_PROMPT.to_string(),
                user: format!(
                    "Create multiple choice practice questions from this content:\n\n{}",
                    content
                ),
                max_tokens: PRACTICE_MAX_TOKENS,
            })
            .await?;

        let mut fallbacks = Vec::new();

        let flashcards = parse_flashcards(&raw_flashcards);
        if flashcards.fallback {
            warn!("Flashcard output could not be parsed; using placeholder card.");
            fallbacks.push(ArtifactKind::Flashcards);
        }

        let questions = parse_practice_questions(&raw_questions);
        if questions.fallback {
            warn!("Practice question output could not be parsed; using placeholder question.");
            fallbacks.push(ArtifactKind::PracticeQuestions);
        }

        info!(
            flashcards = flashcards.items.len(),
            practice_questions = questions.items.len(),
            "Study materials generated."
        );

        Ok(StudyMaterials {
            summary,
            flashcards: flashcards.items,
            practice_questions: questions.items,
            fallbacks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::fallback_flashcard;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedCompletion {
        summary: PortResult<String>,
        flashcards: String,
        questions: String,
        seen: Mutex<Vec<ArtifactKind>>,
    }

    impl CannedCompletion {
        fn new(summary: PortResult<String>, flashcards: &str, questions: &str) -> Self {
            Self {
                summary,
                flashcards: flashcards.to_string(),
                questions: questions.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionService for CannedCompletion {
        async fn complete(&self, request: &CompletionRequest) -> PortResult<String> {
            self.seen.lock().unwrap().push(request.artifact);
            match request.artifact {
                ArtifactKind::Summary => match &self.summary {
                    Ok(s) => Ok(s.clone()),
                    Err(e) => Err(PortError::Upstream(e.to_string())),
                },
                ArtifactKind::Flashcards => Ok(self.flashcards.clone()),
                ArtifactKind::PracticeQuestions => Ok(self.questions.clone()),
            }
        }
    }

    const CARDS: &str = r#"[{"question": "What does photosynthesis convert?", "answer": "Light energy into chemical energy."}]"#;
    const QUESTIONS: &str = r#"[{"question": "Photosynthesis produces?", "options": ["Glucose", "Iron", "Salt", "Helium"], "correctAnswer": "Glucose", "explanation": "Sugar stores the energy."}]"#;

    #[tokio::test]
    async fn produces_all_three_artifacts() {
        let canned = Arc::new(CannedCompletion::new(
            Ok("Plants turn light into sugar.".to_string()),
            CARDS,
            QUESTIONS,
        ));
        let generator = StudyMaterialGenerator::new(canned.clone());

        let materials = generator
            .generate(Some("Biology"), "Photosynthesis converts light into chemical energy")
            .await
            .unwrap();

        assert_eq!(materials.summary, "Plants turn light into sugar.");
        assert_eq!(materials.flashcards.len(), 1);
        assert_eq!(materials.practice_questions[0].options.len(), 4);
        assert!(materials.fallbacks.is_empty());
        assert_eq!(
            *canned.seen.lock().unwrap(),
            vec![ArtifactKind::Summary, ArtifactKind::Flashcards, ArtifactKind::PracticeQuestions]
        );
    }

    #[tokio::test]
    async fn upstream_failure_aborts_without_further_calls() {
        let canned = Arc::new(CannedCompletion::new(
            Err(PortError::Upstream("503".to_string())),
            CARDS,
            QUESTIONS,
        ));
        let generator = StudyMaterialGenerator::new(canned.clone());

        let err = generator.generate(None, "Some notes").await.unwrap_err();
        assert!(matches!(err, PortError::Upstream(_)));
        assert_eq!(canned.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unparseable_output_is_reported_as_fallback() {
        let canned = Arc::new(CannedCompletion::new(
            Ok("Summary".to_string()),
            "no cards today",
            QUESTIONS,
        ));
        let materials = StudyMaterialGenerator::new(canned)
            .generate(None, "Some notes")
            .await
            .unwrap();
        assert_eq!(materials.fallbacks, vec![ArtifactKind::Flashcards]);
        assert_eq!(materials.flashcards, vec![fallback_flashcard()]);
    }

    #[tokio::test]
    async fn blank_summary_is_an_error() {
        let canned = Arc::new(CannedCompletion::new(Ok("  \n".to_string()), CARDS, QUESTIONS));
        let err = StudyMaterialGenerator::new(canned)
            .generate(None, "Some notes")
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Upstream(_)));
    }

    #[tokio::test]
    async fn blank_content_is_rejected_before_any_call() {
        let canned = Arc::new(CannedCompletion::new(Ok("s".to_string()), CARDS, QUESTIONS));
        let err = StudyMaterialGenerator::new(canned.clone())
            .generate(None, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::InvalidInput(_)));
        assert!(canned.seen.lock().unwrap().is_empty());
    }
}
