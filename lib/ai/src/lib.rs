//! LLM completion for pmflow.
//!
//! Callers ask for a completion by kind of work (`analysis`,
//! `summarization`, ...). The [`LlmClient`] picks a model profile for that
//! kind and sends the request to the matching provider backend.

pub mod anthropic;
pub mod backend;
pub mod client;
pub mod error;
pub mod openai;
pub mod profile;

pub use anthropic::AnthropicBackend;
pub use backend::{LlmBackend, LlmProvider, LlmRequest, LlmResponse, TokenUsage};
pub use client::{Completion, LlmClient};
pub use error::LlmError;
pub use openai::OpenAiBackend;
pub use profile::{LlmConfig, ModelProfile, ModelProfiles};
