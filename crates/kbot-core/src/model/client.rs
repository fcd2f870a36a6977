use async_trait::async_trait;

use crate::Result;

/// Turns a question plus a context document into generated text.
///
/// Implementations may fail or hang; the router bounds every call with its own
/// timeout and treats any error as a generator failure.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> Result<String>;
}

/// Generator used when the bot runs without an LLM backend (echo mode).
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledGenerator;

#[async_trait]
impl AnswerGenerator for DisabledGenerator {
    async fn generate(&self, _question: &str, _context: &str) -> Result<String> {
        Err(crate::Error::Generator(
            "answer generation is disabled".to_string(),
        ))
    }
}
