use super::ids::{FolderId, MessageId, ThreadId, VariantId};
use super::types::{NewMessage, NewVariant, StoredMessage, Thread};
use async_trait::async_trait;

/// Failure reported by the persistence collaborator. Always a message
/// string; store operations return these instead of panicking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        StoreError(message.into())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for StoreError {}

impl From<&str> for StoreError {
    fn from(message: &str) -> Self {
        StoreError(message.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Create a message atomically with its initial response variants.
    async fn create_message(&self, message: NewMessage) -> StoreResult<StoredMessage>;

    /// Append one response variant; existing variants are never touched.
    async fn append_response_variant(
        &self,
        message_id: &MessageId,
        variant: NewVariant,
    ) -> StoreResult<StoredMessage>;

    /// Replace the content of one existing variant in place.
    async fn update_response_content(
        &self,
        message_id: &MessageId,
        variant_id: &VariantId,
        content: String,
    ) -> StoreResult<StoredMessage>;

    /// The effective history of a thread in chronological order. For a
    /// branched thread this is the parent thread's messages up to and
    /// including the branch point, then the thread's own messages -
    /// resolved at read time, nothing is copied.
    async fn get_messages(&self, thread_id: &ThreadId) -> StoreResult<Vec<StoredMessage>>;
}

#[async_trait]
pub trait ThreadStore: Send + Sync {
    async fn create_thread(
        &self,
        title: String,
        parent_message_id: Option<MessageId>,
        parent_folder_id: Option<FolderId>,
    ) -> StoreResult<Thread>;

    async fn get_thread(&self, thread_id: &ThreadId) -> StoreResult<Thread>;

    async fn rename_thread(&self, thread_id: &ThreadId, title: String) -> StoreResult<Thread>;

    async fn toggle_pin(&self, thread_id: &ThreadId) -> StoreResult<Thread>;

    async fn move_to_folder(
        &self,
        thread_id: &ThreadId,
        folder_id: Option<FolderId>,
    ) -> StoreResult<Thread>;

    async fn delete_thread(&self, thread_id: &ThreadId) -> StoreResult<Thread>;
}
