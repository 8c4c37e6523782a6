//! services/api/src/adapters/memory.rs
//!
//! A process-local implementation of the `DatabaseService` port. Used when
//! `STORAGE=memory` and by the integration tests. All tables live behind one
//! lock so every operation is atomic with respect to the others.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use study_assistant_core::domain::{
    CodePurpose, Document, Flashcard, PracticeQuestion, StudyMaterials, Summary, User,
    UserCredentials, VerificationCode,
};
use study_assistant_core::intake::NewDocument;
use study_assistant_core::ports::{DatabaseService, PortError, PortResult};
use tokio::sync::Mutex;
use uuid::Uuid;

struct StoredUser {
    user: User,
    hashed_password: Option<String>,
}

struct StoredSession {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: Vec<StoredUser>,
    sessions: HashMap<String, StoredSession>,
    // Insertion order; the newest document is last.
    documents: Vec<Document>,
    summaries: Vec<Summary>,
    flashcards: Vec<Flashcard>,
    practice_questions: Vec<PracticeQuestion>,
    verification_codes: Vec<VerificationCode>,
}

impl Tables {
    fn find_user(&self, email: &str) -> Option<&StoredUser> {
        self.users.iter().find(|u| u.user.email == email)
    }

    fn remove_artifacts(&mut self, document_id: Uuid) {
        self.summaries.retain(|s| s.document_id != document_id);
        self.flashcards.retain(|f| f.document_id != document_id);
        self.practice_questions.retain(|q| q.document_id != document_id);
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Default)]
pub struct InMemoryDb {
    tables: Mutex<Tables>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user(&self, email: &str, hashed_password: Option<&str>) -> PortResult<User> {
        let mut tables = self.tables.lock().await;
        if tables.find_user(email).is_some() {
            return Err(PortError::Conflict(format!(
                "An account for {} already exists",
                email
            )));
        }
        let user = User {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        tables.users.push(StoredUser {
            user: user.clone(),
            hashed_password: hashed_password.map(str::to_string),
        });
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<User> {
        let tables = self.tables.lock().await;
        tables
            .find_user(email)
            .map(|u| u.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let tables = self.tables.lock().await;
        tables
            .find_user(email)
            .map(|u| UserCredentials {
                user_id: u.user.user_id,
                email: u.user.email.clone(),
                hashed_password: u.hashed_password.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        tables.sessions.insert(
            session_id.to_string(),
            StoredSession {
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let tables = self.tables.lock().await;
        match tables.sessions.get(session_id) {
            Some(session) if session.expires_at > Utc::now() => Ok(session.user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables.lock().await.sessions.remove(session_id);
        Ok(())
    }

    async fn create_document(&self, user_id: Uuid, document: &NewDocument) -> PortResult<Document> {
        let mut tables = self.tables.lock().await;
        let stored = Document {
            id: Uuid::new_v4(),
            user_id,
            title: document.title.clone(),
            content: document.content.clone(),
            file_name: document.file_name.clone(),
            file_type: document.file_type.clone(),
            file_size: document.file_size,
            created_at: Utc::now(),
        };
        tables.documents.push(stored.clone());
        Ok(stored)
    }

    async fn get_document_by_id(&self, document_id: Uuid) -> PortResult<Document> {
        let tables = self.tables.lock().await;
        tables
            .documents
            .iter()
            .find(|d| d.id == document_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Document {} not found", document_id)))
    }

    async fn list_documents(&self, user_id: Uuid) -> PortResult<Vec<Document>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .documents
            .iter()
            .rev()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_document(&self, document_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        let before = tables.documents.len();
        tables.documents.retain(|d| d.id != document_id);
        if tables.documents.len() == before {
            return Err(PortError::NotFound(format!("Document {} not found", document_id)));
        }
        tables.remove_artifacts(document_id);
        Ok(())
    }

    async fn replace_study_materials(
        &self,
        document_id: Uuid,
        materials: &StudyMaterials,
    ) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.documents.iter().any(|d| d.id == document_id) {
            return Err(PortError::NotFound(format!("Document {} not found", document_id)));
        }
        tables.remove_artifacts(document_id);

        tables.summaries.push(Summary {
            id: Uuid::new_v4(),
            document_id,
            content: materials.summary.clone(),
            created_at: Utc::now(),
        });
        tables
            .flashcards
            .extend(materials.flashcards.iter().map(|card| Flashcard {
                id: Uuid::new_v4(),
                document_id,
                question: card.question.clone(),
                answer: card.answer.clone(),
            }));
        tables
            .practice_questions
            .extend(materials.practice_questions.iter().map(|q| PracticeQuestion {
                id: Uuid::new_v4(),
                document_id,
                question: q.question.clone(),
                options: q.options.clone(),
                correct_answer: q.correct_answer.clone(),
                explanation: q.explanation.clone(),
            }));
        Ok(())
    }

    async fn list_summaries(&self, document_ids: &[Uuid]) -> PortResult<Vec<Summary>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .summaries
            .iter()
            .rev()
            .filter(|s| document_ids.contains(&s.document_id))
            .cloned()
            .collect())
    }

    async fn list_flashcards(&self, document_ids: &[Uuid]) -> PortResult<Vec<Flashcard>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .flashcards
            .iter()
            .filter(|f| document_ids.contains(&f.document_id))
            .cloned()
            .collect())
    }

    async fn list_practice_questions(
        &self,
        document_ids: &[Uuid],
    ) -> PortResult<Vec<PracticeQuestion>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .practice_questions
            .iter()
            .filter(|q| document_ids.contains(&q.document_id))
            .cloned()
            .collect())
    }

    async fn insert_verification_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
        expires_at: DateTime<Utc>,
    ) -> PortResult<VerificationCode> {
        let record = VerificationCode {
            id: Uuid::new_v4(),
            email: email.to_string(),
            code: code.to_string(),
            purpose,
            expires_at,
            used: false,
            failed_attempts: 0,
        };
        self.tables
            .lock()
            .await
            .verification_codes
            .push(record.clone());
        Ok(record)
    }

    async fn redeem_verification_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
        now: DateTime<Utc>,
    ) -> PortResult<VerificationCode> {
        let mut tables = self.tables.lock().await;
        let outstanding = tables
            .verification_codes
            .iter_mut()
            .rev()
            .filter(|c| c.email == email && c.purpose == purpose && c.is_redeemable(now));

        let mut matched = None;
        let mut others = Vec::new();
        for record in outstanding {
            if matched.is_none() && record.code == code {
                matched = Some(record);
            } else {
                others.push(record);
            }
        }
        match matched {
            Some(record) => {
                record.used = true;
                Ok(record.clone())
            }
            None => {
                for record in others {
                    record.failed_attempts += 1;
                }
                Err(PortError::NotFound(
                    "Invalid or expired verification code".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_assistant_core::domain::{FlashcardDraft, PracticeQuestionDraft};
    use study_assistant_core::verification::MAX_FAILED_ATTEMPTS;

    fn materials(summary: &str, cards: usize) -> StudyMaterials {
        StudyMaterials {
            summary: summary.to_string(),
            flashcards: (0..cards)
                .map(|i| FlashcardDraft {
                    question: format!("Q{}", i),
                    answer: format!("A{}", i),
                })
                .collect(),
            practice_questions: vec![PracticeQuestionDraft {
                question: "Pick one".to_string(),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_answer: "a".to_string(),
                explanation: "Because".to_string(),
            }],
            fallbacks: Vec::new(),
        }
    }

    #[tokio::test]
    async fn replacing_materials_discards_previous_artifacts() {
        let db = InMemoryDb::new();
        let user = db.create_user("a@b.co", None).await.unwrap();
        let doc = db
            .create_document(user.user_id, &NewDocument::from_paste(None, "text").unwrap())
            .await
            .unwrap();

        db.replace_study_materials(doc.id, &materials("first", 3)).await.unwrap();
        db.replace_study_materials(doc.id, &materials("second", 2)).await.unwrap();

        let summaries = db.list_summaries(&[doc.id]).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].content, "second");
        assert_eq!(db.list_flashcards(&[doc.id]).await.unwrap().len(), 2);
        assert_eq!(db.list_practice_questions(&[doc.id]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_a_document_cascades_to_artifacts() {
        let db = InMemoryDb::new();
        let user = db.create_user("a@b.co", None).await.unwrap();
        let doc = db
            .create_document(user.user_id, &NewDocument::from_paste(None, "text").unwrap())
            .await
            .unwrap();
        db.replace_study_materials(doc.id, &materials("s", 4)).await.unwrap();

        db.delete_document(doc.id).await.unwrap();

        assert!(db.list_summaries(&[doc.id]).await.unwrap().is_empty());
        assert!(db.list_flashcards(&[doc.id]).await.unwrap().is_empty());
        assert!(db.list_practice_questions(&[doc.id]).await.unwrap().is_empty());
        assert!(matches!(
            db.delete_document(doc.id).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn a_code_can_only_be_redeemed_once() {
        let db = InMemoryDb::new();
        let now = Utc::now();
        db.insert_verification_code("a@b.co", "123456", CodePurpose::Login, now + chrono::Duration::minutes(10))
            .await
            .unwrap();

        assert!(db
            .redeem_verification_code("a@b.co", "123456", CodePurpose::Signup, now)
            .await
            .is_err());
        assert!(db
            .redeem_verification_code("a@b.co", "123456", CodePurpose::Login, now)
            .await
            .is_ok());
        assert!(db
            .redeem_verification_code("a@b.co", "123456", CodePurpose::Login, now)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn wrong_guesses_burn_the_outstanding_code() {
        let db = InMemoryDb::new();
        let now = Utc::now();
        db.insert_verification_code("a@b.co", "123456", CodePurpose::Login, now + chrono::Duration::minutes(10))
            .await
            .unwrap();

        for _ in 0..MAX_FAILED_ATTEMPTS {
            assert!(db
                .redeem_verification_code("a@b.co", "654321", CodePurpose::Login, now)
                .await
                .is_err());
        }
        assert!(matches!(
            db.redeem_verification_code("a@b.co", "123456", CodePurpose::Login, now)
                .await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_emails_conflict() {
        let db = InMemoryDb::new();
        db.create_user("a@b.co", Some("hash")).await.unwrap();
        assert!(matches!(
            db.create_user("a@b.co", None).await,
            Err(PortError::Conflict(_))
        ));
    }
}
