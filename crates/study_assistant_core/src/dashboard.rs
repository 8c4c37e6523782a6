//! crates/study_assistant_core/src/dashboard.rs
//!
//! Builds the dashboard view: tab counts, document cards, and short previews
//! of the generated summaries and flashcards.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{Document, Flashcard, PracticeQuestion, Summary};

pub const SUMMARY_PREVIEW_CHARS: usize = 200;
pub const ANSWER_PREVIEW_CHARS: usize = 100;
pub const FLASHCARD_PREVIEW_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardTab {
    #[default]
    Upload,
    Documents,
    Summaries,
    Flashcards,
}

impl FromStr for DashboardTab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(DashboardTab::Upload),
            "documents" => Ok(DashboardTab::Documents),
            "summaries" => Ok(DashboardTab::Summaries),
            "flashcards" => Ok(DashboardTab::Flashcards),
            other => Err(format!("unknown dashboard tab '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TabCounts {
    pub documents: usize,
    pub summaries: usize,
    pub flashcards: usize,
    pub practice_questions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentCard {
    pub id: Uuid,
    pub title: String,
    pub badge: String,
    pub created_at: DateTime<Utc>,
    pub flashcard_count: usize,
    pub practice_question_count: usize,
    pub expanded: bool,
    /// Full text of the newest summary; only filled in for expanded cards.
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryPreview {
    pub id: Uuid,
    pub document_id: Uuid,
    pub document_title: String,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlashcardPreview {
    pub id: Uuid,
    pub document_id: Uuid,
    pub document_title: String,
    pub question: String,
    pub answer_preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub active_tab: DashboardTab,
    pub counts: TabCounts,
    pub documents: Vec<DocumentCard>,
    pub summaries: Vec<SummaryPreview>,
    pub flashcards: Vec<FlashcardPreview>,
    pub has_more_flashcards: bool,
}

impl DashboardView {
    /// Assembles the view. Documents are shown newest first; summaries are
    /// expected newest first so the first one per document is the current one.
    pub fn build(
        active_tab: DashboardTab,
        mut documents: Vec<Document>,
        summaries: &[Summary],
        flashcards: &[Flashcard],
        questions: &[PracticeQuestion],
        expanded: &HashSet<Uuid>,
    ) -> Self {
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let title_of = |id: Uuid| {
            documents
                .iter()
                .find(|d| d.id == id)
                .map(|d| d.title.clone())
                .unwrap_or_default()
        };

        let cards = documents
            .iter()
            .map(|doc| {
                let is_expanded = expanded.contains(&doc.id);
                DocumentCard {
                    id: doc.id,
                    title: doc.title.clone(),
                    badge: file_type_badge(&doc.file_type),
                    created_at: doc.created_at,
                    flashcard_count: flashcards.iter().filter(|c| c.document_id == doc.id).count(),
                    practice_question_count: questions
                        .iter()
                        .filter(|q| q.document_id == doc.id)
                        .count(),
                    expanded: is_expanded,
                    summary: is_expanded
                        .then(|| summaries.iter().find(|s| s.document_id == doc.id))
                        .flatten()
                        .map(|s| s.content.clone()),
                }
            })
            .collect();

        let summary_previews = summaries
            .iter()
            .map(|s| SummaryPreview {
                id: s.id,
                document_id: s.document_id,
                document_title: title_of(s.document_id),
                preview: preview(&s.content, SUMMARY_PREVIEW_CHARS),
            })
            .collect();

        let flashcard_previews = flashcards
            .iter()
            .take(FLASHCARD_PREVIEW_LIMIT)
            .map(|c| FlashcardPreview {
                id: c.id,
                document_id: c.document_id,
                document_title: title_of(c.document_id),
                question: c.question.clone(),
                answer_preview: preview(&c.answer, ANSWER_PREVIEW_CHARS),
            })
            .collect();

        Self {
            active_tab,
            counts: TabCounts {
                documents: documents.len(),
                summaries: summaries.len(),
                flashcards: flashcards.len(),
                practice_questions: questions.len(),
            },
            documents: cards,
            summaries: summary_previews,
            flashcards: flashcard_previews,
            has_more_flashcards: flashcards.len() > FLASHCARD_PREVIEW_LIMIT,
        }
    }
}

/// Short label for a MIME type: `text/plain` becomes `PLAIN`, unknown becomes `TEXT`.
pub fn file_type_badge(file_type: &str) -> String {
    file_type
        .split('/')
        .nth(1)
        .filter(|sub| !sub.is_empty())
        .map(|sub| {
            // vnd.openxmlformats-...wordprocessingml.document
            if sub.contains("wordprocessingml") {
                "DOCX".to_string()
            } else {
                sub.to_uppercase()
            }
        })
        .unwrap_or_else(|| "TEXT".to_string())
}

/// First `limit` characters of `text`, with `...` appended when cut.
pub fn preview(text: &str, limit: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}
