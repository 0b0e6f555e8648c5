//! Raw OCR: one page image in, plain text out.
//!
//! The OCR model sees only the image and [`OCR_PROMPT`]. Structure is
//! deliberately not asked for here; a second, text-only call does that, so a
//! weak vision model cannot corrupt the table markup.

use crate::error::{Stage, StageError};
use crate::pipeline::{encode, llm};
use crate::prompts::OCR_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Turns a rendered page into its raw text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn extract_text(&self, page: u32, png: &[u8]) -> Result<String, StageError>;
}

/// [`OcrEngine`] backed by a vision-capable chat model.
pub struct LlmOcrEngine {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl LlmOcrEngine {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }
}

/// The single user turn carrying the instruction and the page image.
fn ocr_messages(png: &[u8]) -> Vec<ChatMessage> {
    vec![ChatMessage::user_with_images(
        OCR_PROMPT,
        vec![encode::to_image_data(png)],
    )]
}

#[async_trait]
impl OcrEngine for LlmOcrEngine {
    async fn extract_text(&self, page: u32, png: &[u8]) -> Result<String, StageError> {
        let start = Instant::now();
        let options = llm::build_options(self.temperature, self.max_tokens);

        let response = self
            .provider
            .chat(&ocr_messages(png), Some(&options))
            .await
            .map_err(|e| StageError::Transport {
                stage: Stage::Ocr,
                detail: e.to_string(),
            })?;

        debug!(
            "Page {}: OCR {} input tokens, {} output tokens, {:?}",
            page,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        if response.content.trim().is_empty() {
            debug!("Page {}: blank transcription", page);
        }
        Ok(response.content)
    }
}
