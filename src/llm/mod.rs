pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum LlmError {
    /// The HTTP call could not complete, or the endpoint returned a
    /// non-success status. Carries the status code and body when available.
    Transport {
        status: Option<u16>,
        message: String,
    },
    /// The response arrived but could not be parsed into the expected
    /// completion envelope.
    Format(String),
    Config(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::Transport {
                status: Some(code),
                message,
            } => write!(f, "AI API call failed: {code} - {message}"),
            LlmError::Transport {
                status: None,
                message,
            } => write!(f, "AI API call failed: {message}"),
            LlmError::Format(msg) => write!(f, "Invalid response format from AI API: {msg}"),
            LlmError::Config(msg) => write!(f, "LLM configuration error: {msg}"),
        }
    }
}

impl Error for LlmError {}

/// One request/response cycle with the external generative model. Returns the
/// first candidate's first text part verbatim; all massaging of the raw text
/// is the extractor's job.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

pub struct LlmManager {
    backend: Box<dyn Completion + Send + Sync>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let backend: Box<dyn Completion + Send + Sync> = match config.backend.as_str() {
            "gemini" => Box::new(providers::gemini::GeminiProvider::new(config)?),
            _ => {
                return Err(LlmError::Config(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self { backend })
    }

    #[cfg(test)]
    pub fn with_backend(backend: Box<dyn Completion + Send + Sync>) -> Self {
        Self { backend }
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.backend.generate(prompt).await
    }
}
