//! In-memory store implementation.
//!
//! Backs tests and single-process deployments. A monotonic sequence number
//! orders messages; branch history is resolved at read time by walking the
//! parent-message reference.

use super::ids::{FolderId, MessageId, ThreadId, VariantId};
use super::traits::{MessageStore, StoreError, StoreResult, ThreadStore};
use super::types::{NewMessage, NewVariant, ResponseVariant, StoredMessage, Thread};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Clone)]
struct MessageEntry {
    message: StoredMessage,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    threads: HashMap<ThreadId, Thread>,
    messages: Vec<MessageEntry>,
    next_seq: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn find_message(&self, message_id: &MessageId) -> Option<&MessageEntry> {
        self.messages.iter().find(|e| &e.message.id == message_id)
    }

    fn find_message_mut(&mut self, message_id: &MessageId) -> Option<&mut MessageEntry> {
        self.messages
            .iter_mut()
            .find(|e| &e.message.id == message_id)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create_message(&self, message: NewMessage) -> StoreResult<StoredMessage> {
        let mut inner = self.inner.lock().unwrap();

        if !inner.threads.contains_key(&message.thread_id) {
            return Err(StoreError::from("Thread not found"));
        }

        let stored = StoredMessage {
            id: MessageId::new(),
            thread_id: message.thread_id,
            user_query: message.user_query,
            attachment: message.attachment,
            ai_response: message
                .responses
                .into_iter()
                .map(|v| ResponseVariant {
                    id: VariantId::new(),
                    content: v.content,
                    model: v.model,
                })
                .collect(),
            created_at: now_millis(),
        };

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.messages.push(MessageEntry {
            message: stored.clone(),
            seq,
        });

        Ok(stored)
    }

    async fn append_response_variant(
        &self,
        message_id: &MessageId,
        variant: NewVariant,
    ) -> StoreResult<StoredMessage> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .find_message_mut(message_id)
            .ok_or_else(|| StoreError::from("Message not found"))?;

        entry.message.ai_response.push(ResponseVariant {
            id: VariantId::new(),
            content: variant.content,
            model: variant.model,
        });

        Ok(entry.message.clone())
    }

    async fn update_response_content(
        &self,
        message_id: &MessageId,
        variant_id: &VariantId,
        content: String,
    ) -> StoreResult<StoredMessage> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .find_message_mut(message_id)
            .ok_or_else(|| StoreError::from("Message not found"))?;

        let variant = entry
            .message
            .ai_response
            .iter_mut()
            .find(|v| &v.id == variant_id)
            .ok_or_else(|| StoreError::from("AI response not found"))?;

        variant.content = content;
        Ok(entry.message.clone())
    }

    async fn get_messages(&self, thread_id: &ThreadId) -> StoreResult<Vec<StoredMessage>> {
        let inner = self.inner.lock().unwrap();
        let thread = inner
            .threads
            .get(thread_id)
            .ok_or_else(|| StoreError::from("Thread not found"))?;

        let mut entries: Vec<&MessageEntry> = Vec::new();

        if let Some(parent_message_id) = &thread.parent_message_id {
            if let Some(branch_point) = inner.find_message(parent_message_id) {
                let parent_thread_id = branch_point.message.thread_id.clone();
                entries.extend(inner.messages.iter().filter(|e| {
                    e.message.thread_id == parent_thread_id && e.seq <= branch_point.seq
                }));
            }
        }

        entries.extend(
            inner
                .messages
                .iter()
                .filter(|e| &e.message.thread_id == thread_id),
        );

        entries.sort_by_key(|e| e.seq);
        Ok(entries.into_iter().map(|e| e.message.clone()).collect())
    }
}

#[async_trait]
impl ThreadStore for MemoryStore {
    async fn create_thread(
        &self,
        title: String,
        parent_message_id: Option<MessageId>,
        parent_folder_id: Option<FolderId>,
    ) -> StoreResult<Thread> {
        let mut inner = self.inner.lock().unwrap();

        let thread = Thread {
            id: ThreadId::new(),
            title,
            is_pinned: false,
            parent_message_id,
            parent_folder_id,
            created_at: now_millis(),
        };
        inner.threads.insert(thread.id.clone(), thread.clone());
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &ThreadId) -> StoreResult<Thread> {
        let inner = self.inner.lock().unwrap();
        inner
            .threads
            .get(thread_id)
            .cloned()
            .ok_or_else(|| StoreError::from("Thread not found"))
    }

    async fn rename_thread(&self, thread_id: &ThreadId, title: String) -> StoreResult<Thread> {
        let mut inner = self.inner.lock().unwrap();
        let thread = inner
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| StoreError::from("Thread not found"))?;
        thread.title = title;
        Ok(thread.clone())
    }

    async fn toggle_pin(&self, thread_id: &ThreadId) -> StoreResult<Thread> {
        let mut inner = self.inner.lock().unwrap();
        let thread = inner
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| StoreError::from("Thread not found"))?;
        thread.is_pinned = !thread.is_pinned;
        Ok(thread.clone())
    }

    async fn move_to_folder(
        &self,
        thread_id: &ThreadId,
        folder_id: Option<FolderId>,
    ) -> StoreResult<Thread> {
        let mut inner = self.inner.lock().unwrap();
        let thread = inner
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| StoreError::from("Thread not found"))?;
        thread.parent_folder_id = folder_id;
        Ok(thread.clone())
    }

    async fn delete_thread(&self, thread_id: &ThreadId) -> StoreResult<Thread> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .threads
            .remove(thread_id)
            .ok_or_else(|| StoreError::from("Thread not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(content: &str) -> NewVariant {
        NewVariant {
            content: content.to_string(),
            model: "openai/gpt-4o".to_string(),
        }
    }

    async fn seed_thread(store: &MemoryStore) -> Thread {
        store
            .create_thread("Test thread".to_string(), None, None)
            .await
            .unwrap()
    }

    async fn seed_message(store: &MemoryStore, thread: &ThreadId, query: &str) -> StoredMessage {
        store
            .create_message(NewMessage {
                thread_id: thread.clone(),
                user_query: query.to_string(),
                attachment: None,
                responses: vec![variant(&format!("answer to {}", query))],
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_message_assigns_ids() {
        let store = MemoryStore::new();
        let thread = seed_thread(&store).await;
        let message = seed_message(&store, &thread.id, "q1").await;

        assert_eq!(message.ai_response.len(), 1);
        assert!(!message.id.as_str().is_empty());
        assert!(!message.ai_response[0].id.as_str().is_empty());
    }

    #[tokio::test]
    async fn test_create_message_requires_thread() {
        let store = MemoryStore::new();
        let result = store
            .create_message(NewMessage {
                thread_id: ThreadId::new(),
                user_query: "q".to_string(),
                attachment: None,
                responses: vec![variant("a")],
            })
            .await;
        assert_eq!(result.unwrap_err(), StoreError::from("Thread not found"));
    }

    #[tokio::test]
    async fn test_append_variant_is_append_only() {
        let store = MemoryStore::new();
        let thread = seed_thread(&store).await;
        let message = seed_message(&store, &thread.id, "q1").await;
        let original = message.ai_response[0].clone();

        let updated = store
            .append_response_variant(&message.id, variant("second answer"))
            .await
            .unwrap();

        assert_eq!(updated.ai_response.len(), 2);
        assert_eq!(updated.ai_response[0], original);
        assert_eq!(updated.ai_response[1].content, "second answer");
    }

    #[tokio::test]
    async fn test_update_response_content_in_place() {
        let store = MemoryStore::new();
        let thread = seed_thread(&store).await;
        let message = seed_message(&store, &thread.id, "q1").await;
        let variant_id = message.ai_response[0].id.clone();

        let updated = store
            .update_response_content(&message.id, &variant_id, "rewritten".to_string())
            .await
            .unwrap();

        assert_eq!(updated.ai_response.len(), 1);
        assert_eq!(updated.ai_response[0].content, "rewritten");
        assert_eq!(updated.ai_response[0].id, variant_id);
    }

    #[tokio::test]
    async fn test_update_unknown_variant_fails() {
        let store = MemoryStore::new();
        let thread = seed_thread(&store).await;
        let message = seed_message(&store, &thread.id, "q1").await;

        let result = store
            .update_response_content(&message.id, &VariantId::new(), "x".to_string())
            .await;
        assert_eq!(result.unwrap_err(), StoreError::from("AI response not found"));
    }

    #[tokio::test]
    async fn test_branch_history_containment() {
        let store = MemoryStore::new();
        let source = seed_thread(&store).await;
        let m1 = seed_message(&store, &source.id, "q1").await;
        let m2 = seed_message(&store, &source.id, "q2").await;
        let _m3 = seed_message(&store, &source.id, "q3").await;

        // Branch at m2: history must be q1, q2 - nothing after the branch point
        let branch = store
            .create_thread(
                format!("{} - branch", source.title),
                Some(m2.id.clone()),
                source.parent_folder_id.clone(),
            )
            .await
            .unwrap();

        let history = store.get_messages(&branch.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, m1.id);
        assert_eq!(history[1].id, m2.id);

        // The source thread is untouched
        let source_history = store.get_messages(&source.id).await.unwrap();
        assert_eq!(source_history.len(), 3);

        // New messages in the branch come after the inherited prefix
        let m4 = seed_message(&store, &branch.id, "q4").await;
        let history = store.get_messages(&branch.id).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].id, m4.id);
    }

    #[tokio::test]
    async fn test_thread_rename_pin_move() {
        let store = MemoryStore::new();
        let thread = seed_thread(&store).await;

        let renamed = store
            .rename_thread(&thread.id, "Renamed".to_string())
            .await
            .unwrap();
        assert_eq!(renamed.title, "Renamed");

        let pinned = store.toggle_pin(&thread.id).await.unwrap();
        assert!(pinned.is_pinned);
        let unpinned = store.toggle_pin(&thread.id).await.unwrap();
        assert!(!unpinned.is_pinned);

        let folder = FolderId::new();
        let moved = store
            .move_to_folder(&thread.id, Some(folder.clone()))
            .await
            .unwrap();
        assert_eq!(moved.parent_folder_id, Some(folder));
    }

    #[tokio::test]
    async fn test_delete_thread() {
        let store = MemoryStore::new();
        let thread = seed_thread(&store).await;

        store.delete_thread(&thread.id).await.unwrap();
        let result = store.get_thread(&thread.id).await;
        assert_eq!(result.unwrap_err(), StoreError::from("Thread not found"));
    }
}
