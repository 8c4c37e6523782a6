//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use study_assistant_core::domain::{
    CodePurpose, Document, Flashcard, PracticeQuestion, StudyMaterials, Summary, User,
    UserCredentials, VerificationCode,
};
use study_assistant_core::intake::NewDocument;
use study_assistant_core::ports::{DatabaseService, PortError, PortResult};
use study_assistant_core::verification::MAX_FAILED_ATTEMPTS;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
    hashed_password: Option<String>,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
            created_at: self.created_at,
        }
    }

    fn to_credentials(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct DocumentRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    content: String,
    file_name: Option<String>,
    file_type: String,
    file_size: Option<i64>,
    created_at: DateTime<Utc>,
}
impl DocumentRecord {
    fn to_domain(self) -> Document {
        Document {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            content: self.content,
            file_name: self.file_name,
            file_type: self.file_type,
            file_size: self.file_size,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct SummaryRecord {
    id: Uuid,
    document_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
}
impl SummaryRecord {
    fn to_domain(self) -> Summary {
        Summary {
            id: self.id,
            document_id: self.document_id,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct FlashcardRecord {
    id: Uuid,
    document_id: Uuid,
    question: String,
    answer: String,
}
impl FlashcardRecord {
    fn to_domain(self) -> Flashcard {
        Flashcard {
            id: self.id,
            document_id: self.document_id,
            question: self.question,
            answer: self.answer,
        }
    }
}

#[derive(FromRow)]
struct PracticeQuestionRecord {
    id: Uuid,
    document_id: Uuid,
    question: String,
    options: Vec<String>,
    correct_answer: String,
    explanation: String,
}
impl PracticeQuestionRecord {
    fn to_domain(self) -> PracticeQuestion {
        PracticeQuestion {
            id: self.id,
            document_id: self.document_id,
            question: self.question,
            options: self.options,
            correct_answer: self.correct_answer,
            explanation: self.explanation,
        }
    }
}

#[derive(FromRow)]
struct VerificationCodeRecord {
    id: Uuid,
    email: String,
    code: String,
    purpose: String,
    expires_at: DateTime<Utc>,
    used: bool,
    failed_attempts: i32,
}
impl VerificationCodeRecord {
    fn to_domain(self) -> PortResult<VerificationCode> {
        let purpose = self
            .purpose
            .parse::<CodePurpose>()
            .map_err(PortError::Unexpected)?;
        Ok(VerificationCode {
            id: self.id,
            email: self.email,
            code: self.code,
            purpose,
            expires_at: self.expires_at,
            used: self.used,
            failed_attempts: self.failed_attempts,
        })
    }
}

const DOCUMENT_COLUMNS: &str =
    "id, user_id, title, content, file_name, file_type, file_size, created_at";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, email: &str, hashed_password: Option<&str>) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3)
             ON CONFLICT (email) DO NOTHING
             RETURNING user_id, email, hashed_password, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::Conflict(format!("An account for {} already exists", email)))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, hashed_password, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("User {} not found", email)))?;
        Ok(record.to_domain())
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, email, hashed_password, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("User {} not found", email)))?;
        Ok(record.to_credentials())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_document(&self, user_id: Uuid, document: &NewDocument) -> PortResult<Document> {
        let sql = format!(
            "INSERT INTO documents (id, user_id, title, content, file_name, file_type, file_size)
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            DOCUMENT_COLUMNS
        );
        let record = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(&document.title)
            .bind(&document.content)
            .bind(&document.file_name)
            .bind(&document.file_type)
            .bind(document.file_size)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_document_by_id(&self, document_id: Uuid) -> PortResult<Document> {
        let sql = format!("SELECT {} FROM documents WHERE id = $1", DOCUMENT_COLUMNS);
        let record = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(document_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected(format!("Document {} not found", document_id)))?;
        Ok(record.to_domain())
    }

    async fn list_documents(&self, user_id: Uuid) -> PortResult<Vec<Document>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE user_id = $1 ORDER BY created_at DESC",
            DOCUMENT_COLUMNS
        );
        let records = sqlx::query_as::<_, DocumentRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn delete_document(&self, document_id: Uuid) -> PortResult<()> {
        // Artifact tables reference documents with ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Document {} not found", document_id)));
        }
        Ok(())
    }

    async fn replace_study_materials(
        &self,
        document_id: Uuid,
        materials: &StudyMaterials,
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Lock the document row so a concurrent delete cannot interleave.
        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM documents WHERE id = $1 FOR UPDATE")
                .bind(document_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(unexpected)?;
        if exists.is_none() {
            return Err(PortError::NotFound(format!("Document {} not found", document_id)));
        }

        for table in ["summaries", "flashcards", "practice_questions"] {
            sqlx::query(&format!("DELETE FROM {} WHERE document_id = $1", table))
                .bind(document_id)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }

        sqlx::query("INSERT INTO summaries (id, document_id, content) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(document_id)
            .bind(&materials.summary)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        for (position, card) in materials.flashcards.iter().enumerate() {
            sqlx::query(
                "INSERT INTO flashcards (id, document_id, position, question, answer) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::new_v4())
            .bind(document_id)
            .bind(position as i32)
            .bind(&card.question)
            .bind(&card.answer)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        for (position, q) in materials.practice_questions.iter().enumerate() {
            sqlx::query(
                "INSERT INTO practice_questions (id, document_id, position, question, options, correct_answer, explanation)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(Uuid::new_v4())
            .bind(document_id)
            .bind(position as i32)
            .bind(&q.question)
            .bind(&q.options)
            .bind(&q.correct_answer)
            .bind(&q.explanation)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn list_summaries(&self, document_ids: &[Uuid]) -> PortResult<Vec<Summary>> {
        let records = sqlx::query_as::<_, SummaryRecord>(
            "SELECT id, document_id, content, created_at FROM summaries
             WHERE document_id = ANY($1) ORDER BY created_at DESC",
        )
        .bind(document_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_flashcards(&self, document_ids: &[Uuid]) -> PortResult<Vec<Flashcard>> {
        let records = sqlx::query_as::<_, FlashcardRecord>(
            "SELECT id, document_id, question, answer FROM flashcards
             WHERE document_id = ANY($1) ORDER BY document_id, position",
        )
        .bind(document_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_practice_questions(
        &self,
        document_ids: &[Uuid],
    ) -> PortResult<Vec<PracticeQuestion>> {
        let records = sqlx::query_as::<_, PracticeQuestionRecord>(
            "SELECT id, document_id, question, options, correct_answer, explanation
             FROM practice_questions WHERE document_id = ANY($1) ORDER BY document_id, position",
        )
        .bind(document_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn insert_verification_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
        expires_at: DateTime<Utc>,
    ) -> PortResult<VerificationCode> {
        let record = sqlx::query_as::<_, VerificationCodeRecord>(
            "INSERT INTO verification_codes (id, email, code, purpose, expires_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, email, code, purpose, expires_at, used, failed_attempts",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(code)
        .bind(purpose.as_str())
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn redeem_verification_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
        now: DateTime<Utc>,
    ) -> PortResult<VerificationCode> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // The row lock plus the `used = FALSE` re-check make redemption single-use
        // even when two requests race with the same code.
        let redeemed = sqlx::query_as::<_, VerificationCodeRecord>(
            "UPDATE verification_codes SET used = TRUE
             WHERE id = (
                 SELECT id FROM verification_codes
                 WHERE email = $1 AND code = $2 AND purpose = $3
                   AND used = FALSE AND expires_at > $4 AND failed_attempts < $5
                 ORDER BY created_at DESC
                 LIMIT 1
                 FOR UPDATE
             ) AND used = FALSE
             RETURNING id, email, code, purpose, expires_at, used, failed_attempts",
        )
        .bind(email)
        .bind(code)
        .bind(purpose.as_str())
        .bind(now)
        .bind(MAX_FAILED_ATTEMPTS)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?;

        let Some(record) = redeemed else {
            // A wrong guess counts against every code still outstanding for this
            // email and purpose.
            sqlx::query(
                "UPDATE verification_codes SET failed_attempts = failed_attempts + 1
                 WHERE email = $1 AND purpose = $2 AND used = FALSE AND expires_at > $3
                   AND failed_attempts < $4",
            )
            .bind(email)
            .bind(purpose.as_str())
            .bind(now)
            .bind(MAX_FAILED_ATTEMPTS)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
            tx.commit().await.map_err(unexpected)?;
            return Err(PortError::NotFound(
                "Invalid or expired verification code".to_string(),
            ));
        };

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }
}
