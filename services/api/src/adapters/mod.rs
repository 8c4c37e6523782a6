pub mod db;
pub mod llm;
pub mod mailer;
pub mod memory;

pub use db::DbAdapter;
pub use llm::OpenAiCompletionAdapter;
pub use mailer::{LogMailer, SmtpMailer};
pub use memory::InMemoryDb;
