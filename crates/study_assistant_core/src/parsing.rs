//! crates/study_assistant_core/src/parsing.rs
//!
//! Best-effort parsing of language-model output into flashcards and practice
//! questions. Models are asked for a JSON array but often wrap it in Markdown,
//! an envelope object, or prose; everything that can be recovered is recovered,
//! and a single placeholder item is used only when nothing usable remains.

use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::LazyLock;

use crate::domain::{FlashcardDraft, PracticeQuestionDraft};

/// Object keys under which models tend to nest the requested array.
const WRAPPER_KEYS: &[&str] = &[
    "flashcards",
    "questions",
    "practiceQuestions",
    "practice_questions",
    "items",
    "data",
];

/// Number of options every practice question must have.
pub const OPTION_COUNT: usize = 4;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*\n?(.*?)\n?```\s*$").expect("code fence pattern is valid")
});

static QUESTION_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[\s*\-\d.)#]*(?:\*\*)?(?:question|q)\s*\d*\s*(?:\*\*)?\s*:\s*(?:\*\*)?")
        .expect("question label pattern is valid")
});

static ANSWER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[\s*\-]*(?:\*\*)?(?:answer|a)\s*(?:\*\*)?\s*:\s*(?:\*\*)?")
        .expect("answer label pattern is valid")
});

/// The result of parsing one artifact list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed<T> {
    pub items: Vec<T>,
    /// True when the model output was unusable and `items` holds the placeholder.
    pub fallback: bool,
}

impl<T> Parsed<T> {
    fn recovered(items: Vec<T>) -> Self {
        Self { items, fallback: false }
    }

    fn placeholder(item: T) -> Self {
        Self { items: vec![item], fallback: true }
    }
}

/// A JSON scalar read as text. Models answer `4` as often as `"4"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Text(text) => text,
            Scalar::Number(number) => number.to_string(),
            Scalar::Flag(flag) => flag.to_string(),
        }
    }
}

fn scalar_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Scalar::deserialize(deserializer).map(String::from)
}

fn scalar_texts<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Vec::<Scalar>::deserialize(deserializer).map(|items| items.into_iter().map(String::from).collect())
}

#[derive(Deserialize)]
struct RawFlashcard {
    #[serde(alias = "front", alias = "q", deserialize_with = "scalar_text")]
    question: String,
    #[serde(alias = "back", alias = "a", deserialize_with = "scalar_text")]
    answer: String,
}

#[derive(Deserialize)]
struct RawPracticeQuestion {
    #[serde(deserialize_with = "scalar_text")]
    question: String,
    #[serde(deserialize_with = "scalar_texts")]
    options: Vec<String>,
    #[serde(
        rename = "correctAnswer",
        alias = "correct_answer",
        alias = "answer",
        deserialize_with = "scalar_text"
    )]
    correct_answer: String,
    #[serde(default, deserialize_with = "scalar_text")]
    explanation: String,
}

/// The placeholder flashcard returned when the model output could not be parsed.
pub fn fallback_flashcard() -> FlashcardDraft {
    FlashcardDraft {
        question: "What are the main topics covered?".to_string(),
        answer: "Please review the content manually as flashcard generation encountered an error."
            .to_string(),
    }
}

/// The placeholder question returned when the model output could not be parsed.
pub fn fallback_practice_question() -> PracticeQuestionDraft {
    PracticeQuestionDraft {
        question: "Practice questions will be available once content is properly processed"
            .to_string(),
        options: vec![
            "Option A".to_string(),
            "Option B".to_string(),
            "Option C".to_string(),
            "Option D".to_string(),
        ],
        correct_answer: "Option A".to_string(),
        explanation:
            "Please review the content manually as practice question generation encountered an error."
                .to_string(),
    }
}

pub fn parse_flashcards(raw: &str) -> Parsed<FlashcardDraft> {
    let from_json: Vec<FlashcardDraft> = json_items(raw)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawFlashcard>(item).ok())
        .filter_map(|card| validate_flashcard(&card.question, &card.answer))
        .collect();
    if !from_json.is_empty() {
        return Parsed::recovered(from_json);
    }

    let from_lines = parse_labelled_lines(raw);
    if !from_lines.is_empty() {
        return Parsed::recovered(from_lines);
    }

    Parsed::placeholder(fallback_flashcard())
}

pub fn parse_practice_questions(raw: &str) -> Parsed<PracticeQuestionDraft> {
    let items: Vec<PracticeQuestionDraft> = json_items(raw)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawPracticeQuestion>(item).ok())
        .filter_map(|q| {
            validate_practice_question(&q.question, &q.options, &q.correct_answer, &q.explanation)
        })
        .collect();
    if items.is_empty() {
        return Parsed::placeholder(fallback_practice_question());
    }
    Parsed::recovered(items)
}

/// Trims a flashcard and rejects it when either side is blank.
pub fn validate_flashcard(question: &str, answer: &str) -> Option<FlashcardDraft> {
    let question = question.trim();
    let answer = answer.trim();
    if question.is_empty() || answer.is_empty() {
        return None;
    }
    Some(FlashcardDraft {
        question: question.to_string(),
        answer: answer.to_string(),
    })
}

/// Normalizes a practice question, or rejects it when it does not have exactly
/// four non-blank options or its answer cannot be matched to one of them.
///
/// The answer may be the option text (case-insensitive) or an option letter.
pub fn validate_practice_question(
    question: &str,
    options: &[String],
    correct_answer: &str,
    explanation: &str,
) -> Option<PracticeQuestionDraft> {
    let question = question.trim();
    if question.is_empty() || options.len() != OPTION_COUNT {
        return None;
    }
    let options: Vec<String> = options.iter().map(|o| o.trim().to_string()).collect();
    if options.iter().any(String::is_empty) {
        return None;
    }

    let answer = correct_answer.trim();
    let resolved = options
        .iter()
        .find(|o| o.as_str() == answer)
        .or_else(|| options.iter().find(|o| o.eq_ignore_ascii_case(answer)))
        .or_else(|| option_by_letter(&options, answer))?
        .clone();

    Some(PracticeQuestionDraft {
        question: question.to_string(),
        options,
        correct_answer: resolved,
        explanation: explanation.trim().to_string(),
    })
}

fn option_by_letter<'a>(options: &'a [String], answer: &str) -> Option<&'a String> {
    let letter = answer
        .trim_start_matches("Option ")
        .trim_end_matches(['.', ')', ':'])
        .trim();
    let mut chars = letter.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return None;
    };
    let index = match c.to_ascii_uppercase() {
        'A' => 0,
        'B' => 1,
        'C' => 2,
        'D' => 3,
        _ => return None,
    };
    options.get(index)
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    match CODE_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}

/// Finds the JSON array in a model reply, looking through code fences,
/// envelope objects and surrounding prose.
fn json_items(raw: &str) -> Option<Vec<Value>> {
    let body = strip_code_fences(raw);
    if let Some(items) = serde_json::from_str::<Value>(body).ok().and_then(array_of) {
        return Some(items);
    }

    let start = body.find('[')?;
    let end = body.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&body[start..=end])
        .ok()
        .and_then(array_of)
}

fn array_of(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => WRAPPER_KEYS.iter().find_map(|key| match map.remove(*key) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        }),
        _ => None,
    }
}

/// Reads `Q: ...` / `A: ...` line pairs out of a plain-text reply.
fn parse_labelled_lines(raw: &str) -> Vec<FlashcardDraft> {
    let lines: Vec<&str> = raw.lines().collect();
    let mut cards = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(question) = strip_label(&QUESTION_LABEL, line) else {
            continue;
        };
        let answer = lines
            .get(i + 1)
            .filter(|next| strip_label(&QUESTION_LABEL, next).is_none())
            .map(|next| strip_label(&ANSWER_LABEL, next).unwrap_or_else(|| next.trim().to_string()));
        if let Some(card) = answer.and_then(|a| validate_flashcard(&question, &a)) {
            cards.push(card);
        }
    }
    cards
}

fn strip_label(label: &Regex, line: &str) -> Option<String> {
    let found = label.find(line)?;
    Some(line[found.end()..].trim().trim_end_matches("**").trim().to_string())
}
