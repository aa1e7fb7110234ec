pub(crate) mod gemini;
pub(crate) mod openrouter;

pub use gemini::{GeminiChatModel, GeminiProvider};
pub use openrouter::{OpenRouterChatModel, OpenRouterProvider};
