//! crates/study_assistant_core/src/study.rs
//!
//! The flashcard review state machine: a cursor over a deck, whether the
//! current answer is visible, and which cards the student got right.

use std::collections::BTreeSet;

use crate::domain::FlashcardDraft;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StudyError {
    #[error("There are no flashcards to study")]
    EmptyDeck,
}

/// A user action in study mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyCommand {
    ShowAnswer,
    Next,
    Previous,
    /// Marks the current card as known and moves on unless it is the last one.
    MarkCompleted,
    Reset,
}

#[derive(Debug, Clone)]
pub struct FlashcardStudy {
    cards: Vec<FlashcardDraft>,
    index: usize,
    answer_shown: bool,
    completed: BTreeSet<usize>,
}

impl FlashcardStudy {
    pub fn new(cards: Vec<FlashcardDraft>) -> Result<Self, StudyError> {
        if cards.is_empty() {
            return Err(StudyError::EmptyDeck);
        }
        Ok(Self {
            cards,
            index: 0,
            answer_shown: false,
            completed: BTreeSet::new(),
        })
    }

    pub fn apply(&mut self, command: StudyCommand) {
        match command {
            StudyCommand::ShowAnswer => self.answer_shown = true,
            StudyCommand::Next => self.next(),
            StudyCommand::Previous => {
                if self.index > 0 {
                    self.index -= 1;
                    self.answer_shown = false;
                }
            }
            StudyCommand::MarkCompleted => {
                self.completed.insert(self.index);
                self.next();
            }
            StudyCommand::Reset => {
                self.index = 0;
                self.answer_shown = false;
                self.completed.clear();
            }
        }
    }

    fn next(&mut self) {
        if self.index + 1 < self.cards.len() {
            self.index += 1;
            self.answer_shown = false;
        }
    }

    pub fn current(&self) -> &FlashcardDraft {
        &self.cards[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn answer_shown(&self) -> bool {
        self.answer_shown
    }

    pub fn completed(&self) -> impl Iterator<Item = usize> + '_ {
        self.completed.iter().copied()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn is_completed(&self, index: usize) -> bool {
        self.completed.contains(&index)
    }

    /// Position through the deck, counting the current card.
    pub fn progress_percent(&self) -> f64 {
        (self.index + 1) as f64 / self.cards.len() as f64 * 100.0
    }

    /// On the last card with every card marked completed.
    pub fn is_finished(&self) -> bool {
        self.index + 1 == self.cards.len() && self.completed.len() == self.cards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deck(n: usize) -> FlashcardStudy {
        let cards = (0..n)
            .map(|i| FlashcardDraft {
                question: format!("Q{}", i),
                answer: format!("A{}", i),
            })
            .collect();
        FlashcardStudy::new(cards).unwrap()
    }

    #[test]
    fn empty_deck_is_rejected() {
        assert_eq!(FlashcardStudy::new(Vec::new()).unwrap_err(), StudyError::EmptyDeck);
    }

    #[test]
    fn navigation_stays_in_bounds_and_hides_the_answer() {
        let mut study = deck(3);
        study.apply(StudyCommand::Previous);
        assert_eq!(study.index(), 0);

        study.apply(StudyCommand::ShowAnswer);
        assert!(study.answer_shown());
        study.apply(StudyCommand::Next);
        assert_eq!(study.index(), 1);
        assert!(!study.answer_shown());

        for _ in 0..10 {
            study.apply(StudyCommand::Next);
        }
        assert_eq!(study.index(), 2);
        assert_eq!(study.current().question, "Q2");
    }

    #[test]
    fn marking_completed_advances_except_on_last_card() {
        let mut study = deck(2);
        study.apply(StudyCommand::MarkCompleted);
        assert_eq!(study.index(), 1);
        study.apply(StudyCommand::MarkCompleted);
        assert_eq!(study.index(), 1);
        assert_eq!(study.completed_count(), 2);
        assert!(study.is_finished());
    }

    #[test]
    fn completed_count_never_exceeds_deck_size() {
        let mut study = deck(3);
        for _ in 0..20 {
            study.apply(StudyCommand::MarkCompleted);
            study.apply(StudyCommand::Previous);
            study.apply(StudyCommand::MarkCompleted);
        }
        assert!(study.completed_count() <= study.len());
        assert!(study.index() < study.len());
    }

    #[test]
    fn finished_requires_every_card() {
        let mut study = deck(3);
        study.apply(StudyCommand::Next);
        study.apply(StudyCommand::MarkCompleted);
        study.apply(StudyCommand::MarkCompleted);
        assert_eq!(study.index(), 2);
        assert!(!study.is_finished());
        assert_eq!(study.completed().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn reset_clears_progress() {
        let mut study = deck(4);
        study.apply(StudyCommand::MarkCompleted);
        study.apply(StudyCommand::ShowAnswer);
        study.apply(StudyCommand::Reset);
        assert_eq!(study.index(), 0);
        assert!(!study.answer_shown());
        assert_eq!(study.completed_count(), 0);
        assert!((study.progress_percent() - 25.0).abs() < f64::EPSILON);
    }
}
