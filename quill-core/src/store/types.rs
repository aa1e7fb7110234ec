//! Stored entity types.

use super::ids::{FolderId, MessageId, ThreadId, VariantId};
use serde::{Deserialize, Serialize};

/// One alternative AI response to a user query. Variants are append-only:
/// regeneration adds, nothing removes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseVariant {
    pub id: VariantId,
    pub content: String,
    pub model: String,
}

/// One persisted user turn: the query plus at least one response variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub user_query: String,
    pub attachment: Option<String>,
    pub ai_response: Vec<ResponseVariant>,
    pub created_at: i64,
}

/// Groups messages. `parent_message_id` is set when the thread was created
/// by branching and never changes afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub title: String,
    pub is_pinned: bool,
    pub parent_message_id: Option<MessageId>,
    pub parent_folder_id: Option<FolderId>,
    pub created_at: i64,
}

/// Input for creating a message with its initial responses
#[derive(Clone, Debug)]
pub struct NewMessage {
    pub thread_id: ThreadId,
    pub user_query: String,
    pub attachment: Option<String>,
    pub responses: Vec<NewVariant>,
}

/// Input for one response variant
#[derive(Clone, Debug)]
pub struct NewVariant {
    pub content: String,
    pub model: String,
}
