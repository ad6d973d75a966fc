pub mod openai;
pub mod provider;
pub mod types;

pub use openai::OpenAIProvider;
pub use provider::{Completion, CompletionOptions, LLMError, LLMProvider, LLMStream};
pub use types::LLMChunk;
