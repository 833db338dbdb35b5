//! Reasoning backend implementations.
//!
//! One backend is shipped: `OpenAiCompatBackend`, which speaks the
//! `/chat/completions` dialect and therefore works with OpenAI, OpenRouter,
//! Ollama, vLLM, and any other compatible endpoint.

pub mod openai;

pub use openai::OpenAiCompatBackend;
