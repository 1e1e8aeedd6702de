pub mod backend;
pub mod cache;
pub mod ollama;
pub mod openai;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod retry;
pub mod types;

pub use backend::{build_backend, TextBackend};
pub use cache::SingleFlightCache;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;
pub use orchestrator::*;
pub use parser::ResponseParser;
pub use prompts::PromptBuilder;
pub use retry::{RetryPolicy, RetryingBackend};
pub use types::*;
