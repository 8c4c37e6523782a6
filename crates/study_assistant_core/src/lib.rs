pub mod dashboard;
pub mod domain;
pub mod generation;
pub mod intake;
pub mod parsing;
pub mod ports;
pub mod study;
pub mod verification;

pub use domain::{
    ArtifactKind, CodePurpose, Document, Flashcard, FlashcardDraft, PracticeQuestion,
    PracticeQuestionDraft, StudyMaterials, Summary, User, UserCredentials, VerificationCode,
};
pub use generation::StudyMaterialGenerator;
pub use intake::NewDocument;
pub use ports::{
    CompletionRequest, CompletionService, DatabaseService, MailService, PortError, PortResult,
};
