//! AI Teacher Gateway: the external generative-AI service.

pub mod gemini;
pub mod prompts;

use async_trait::async_trait;

use crate::domain::{EncodedImage, ExamDocument};
use crate::error::{ExamGenerationError, GatewayError};

pub use gemini::GeminiGateway;
pub use prompts::PromptChip;

/// Trait abstraction over the AI service, enabling test doubles.
#[async_trait]
pub trait TeacherGateway: Send + Sync {
    /// Ask the teacher a question about the supplied lesson images.
    async fn converse(
        &self,
        prompt: &str,
        images: &[EncodedImage],
        context: &str,
    ) -> Result<String, GatewayError>;

    /// Produce an exam for one chapter from its lesson images.
    async fn generate_exam(
        &self,
        subject_name: &str,
        chapter_title: &str,
        images: &[EncodedImage],
    ) -> Result<ExamDocument, ExamGenerationError>;
}
