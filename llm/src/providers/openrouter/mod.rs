mod chat;
mod provider;

pub use chat::model::OpenRouterChatModel;
pub use provider::OpenRouterProvider;
