//! crates/study_assistant_core/src/intake.rs
//!
//! Turns pasted text and uploaded files into document records ready to be stored.

use std::path::Path;

use crate::ports::PortError;

/// Title used when a pasted document is submitted without one.
pub const DEFAULT_TITLE: &str = "Text Document";

const PLAIN_TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv", "text"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("Content is required")]
    EmptyContent,
    #[error("Content exceeds the limit of {limit} characters")]
    TooLong { limit: usize },
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("Uploaded file is not valid UTF-8 text: {0}")]
    InvalidEncoding(String),
}

impl From<IntakeError> for PortError {
    fn from(e: IntakeError) -> Self {
        PortError::InvalidInput(e.to_string())
    }
}

/// How the text of an upload is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    PlainText,
    Pdf,
    Docx,
}

impl SourceKind {
    /// Detects the kind from the declared MIME type, falling back to the file extension.
    pub fn detect(file_name: &str, content_type: Option<&str>) -> Option<Self> {
        if let Some(mime) = content_type.map(|m| m.trim().to_ascii_lowercase()) {
            if mime.starts_with("text/") {
                return Some(SourceKind::PlainText);
            }
            match mime.as_str() {
                "application/pdf" => return Some(SourceKind::Pdf),
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                    return Some(SourceKind::Docx)
                }
                _ => {}
            }
        }

        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())?;
        match extension.as_str() {
            "pdf" => Some(SourceKind::Pdf),
            "docx" => Some(SourceKind::Docx),
            ext if PLAIN_TEXT_EXTENSIONS.contains(&ext) => Some(SourceKind::PlainText),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            SourceKind::PlainText => "text/plain",
            SourceKind::Pdf => "application/pdf",
            SourceKind::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }
}

/// Extracts the study text from an uploaded file.
///
/// PDF and DOCX extraction is not implemented; those files produce a placeholder
/// naming the file so the document can still be stored.
pub fn extract_text(kind: SourceKind, file_name: &str, bytes: &[u8]) -> Result<String, IntakeError> {
    match kind {
        SourceKind::PlainText => String::from_utf8(bytes.to_vec())
            .map_err(|e| IntakeError::InvalidEncoding(e.to_string())),
        SourceKind::Pdf => Ok(format!(
            "PDF content from {} - text extraction is not available yet. Paste the text to generate study materials.",
            file_name
        )),
        SourceKind::Docx => Ok(format!(
            "DOCX content from {} - text extraction is not available yet. Paste the text to generate study materials.",
            file_name
        )),
    }
}

/// A document that has passed intake and is ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub title: String,
    pub content: String,
    pub file_name: Option<String>,
    pub file_type: String,
    pub file_size: Option<i64>,
}

impl NewDocument {
    /// Builds a document from pasted text.
    pub fn from_paste(title: Option<&str>, content: &str) -> Result<Self, IntakeError> {
        if content.trim().is_empty() {
            return Err(IntakeError::EmptyContent);
        }
        Ok(Self {
            title: normalize_title(title, DEFAULT_TITLE),
            content: content.to_string(),
            file_name: None,
            file_type: SourceKind::PlainText.mime_type().to_string(),
            file_size: None,
        })
    }

    /// Builds a document from an uploaded file. The title defaults to the file stem.
    pub fn from_upload(
        title: Option<&str>,
        file_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<Self, IntakeError> {
        let kind = SourceKind::detect(file_name, content_type).ok_or_else(|| {
            IntakeError::UnsupportedFileType(
                content_type.map(str::to_string).unwrap_or_else(|| file_name.to_string()),
            )
        })?;
        let content = extract_text(kind, file_name, bytes)?;
        if content.trim().is_empty() {
            return Err(IntakeError::EmptyContent);
        }

        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_TITLE);

        Ok(Self {
            title: normalize_title(title, stem),
            content,
            file_name: Some(file_name.to_string()),
            file_type: kind.mime_type().to_string(),
            file_size: Some(bytes.len() as i64),
        })
    }

    /// Rejects content longer than `max_chars` characters.
    pub fn check_length(&self, max_chars: usize) -> Result<(), IntakeError> {
        check_content_length(&self.content, max_chars)
    }
}

pub fn check_content_length(content: &str, max_chars: usize) -> Result<(), IntakeError> {
    if content.chars().count() > max_chars {
        return Err(IntakeError::TooLong { limit: max_chars });
    }
    Ok(())
}

fn normalize_title(title: Option<&str>, default: &str) -> String {
    match title.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => default.trim().to_string(),
    }
}
