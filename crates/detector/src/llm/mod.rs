//! Model backend abstraction.
//!
//! The pipeline only needs a string-in/string-out `analyze` capability; the
//! provider trait hides transport, auth and retry details. `OpenAiProvider`
//! is the production backend, `MockProvider` drives tests without network.

pub mod mock_provider;
pub mod prompts;
pub mod provider;

pub use mock_provider::MockProvider;
pub use prompts::build_batch_prompt;
pub use provider::{ModelError, ModelProvider, ModelRequest, ModelResponse, OpenAiProvider};
