//! Optimistic message lifecycle.
//!
//! One user turn moves through `Idle -> Submitting -> Streaming ->
//! Persisting -> Settled`, with `Failed` reachable from the three middle
//! states. The user's turn is shown before any network activity via a
//! provisional message; a transport failure discards it entirely, a
//! persistence failure leaves it visible but flagged unsynced (there is no
//! automatic persistence retry).
//!
//! The controller is the single owner of chat state for its thread and is
//! injected with its collaborators; at most one send is in flight per
//! controller.

use crate::decoder::{StreamDecoder, TransportError};
use crate::transport::ChatTransport;
use llm::api::Role;
use quill_core::store::{
    MessageId, MessageStore, NewMessage, NewVariant, StoreResult, StoredMessage, Thread, ThreadId,
    ThreadStore, VariantId,
};
use quill_core::{ChatRequestBody, NormalizedMessage, ServiceSelector};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendPhase {
    Idle,
    Submitting,
    Streaming,
    Persisting,
    Settled,
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SendError {
    /// A send is already in flight on this controller
    Busy,
    EmptyQuery,
    MessageNotFound,
    Transport(TransportError),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Busy => f.write_str("a send is already in flight"),
            SendError::EmptyQuery => f.write_str("query is empty"),
            SendError::MessageNotFound => f.write_str("message not found"),
            SendError::Transport(e) => write!(f, "transport failure: {}", e),
        }
    }
}

impl std::error::Error for SendError {}

/// One response alternative as the client sees it. `id` is present once
/// the variant has been persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseView {
    pub id: Option<VariantId>,
    pub content: String,
    pub model: String,
}

/// One turn as the client sees it. Provisional turns carry a temp id and
/// the pending flag; persisted turns carry the server-issued id.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageView {
    pub id: Option<MessageId>,
    pub temp_id: Option<String>,
    pub user_query: String,
    pub attachment: Option<String>,
    pub responses: Vec<ResponseView>,
    /// Client-local selection, always within `[0, responses.len())`
    pub selected: usize,
    pub pending: bool,
    /// Streamed fine but could not be persisted
    pub unsynced: bool,
}

impl MessageView {
    fn from_stored(stored: StoredMessage, selected: usize) -> Self {
        let responses: Vec<ResponseView> = stored
            .ai_response
            .into_iter()
            .map(|v| ResponseView {
                id: Some(v.id),
                content: v.content,
                model: v.model,
            })
            .collect();
        let selected = selected.min(responses.len().saturating_sub(1));
        MessageView {
            id: Some(stored.id),
            temp_id: None,
            user_query: stored.user_query,
            attachment: stored.attachment,
            responses,
            selected,
            pending: false,
            unsynced: false,
        }
    }
}

pub struct ChatController {
    transport: Arc<dyn ChatTransport>,
    messages_store: Arc<dyn MessageStore>,
    threads_store: Arc<dyn ThreadStore>,
    thread_id: ThreadId,
    model: String,
    service: ServiceSelector,
    gemini_api_key: Option<String>,
    is_web_search: bool,
    phase: SendPhase,
    messages: Vec<MessageView>,
    last_error: Option<String>,
}

impl ChatController {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        messages_store: Arc<dyn MessageStore>,
        threads_store: Arc<dyn ThreadStore>,
        thread_id: ThreadId,
        model: impl Into<String>,
        service: ServiceSelector,
    ) -> Self {
        ChatController {
            transport,
            messages_store,
            threads_store,
            thread_id,
            model: model.into(),
            service,
            gemini_api_key: None,
            is_web_search: false,
            phase: SendPhase::Idle,
            messages: Vec::new(),
            last_error: None,
        }
    }

    pub fn set_web_search(&mut self, enabled: bool) {
        self.is_web_search = enabled;
    }

    pub fn set_gemini_api_key(&mut self, key: Option<String>) {
        self.gemini_api_key = key;
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn phase(&self) -> SendPhase {
        self.phase
    }

    pub fn messages(&self) -> &[MessageView] {
        &self.messages
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Select a different response variant for a message.
    pub fn select_variant(&mut self, message_id: &MessageId, index: usize) {
        if let Some(view) = self
            .messages
            .iter_mut()
            .find(|m| m.id.as_ref() == Some(message_id))
        {
            if index < view.responses.len() {
                view.selected = index;
            }
        }
    }

    /// Replace local state with the thread's effective history.
    pub async fn load_history(&mut self) -> StoreResult<()> {
        let stored = self.messages_store.get_messages(&self.thread_id).await?;
        self.messages = stored
            .into_iter()
            .map(|m| MessageView::from_stored(m, 0))
            .collect();
        Ok(())
    }

    fn guard(&self) -> Result<(), SendError> {
        match self.phase {
            SendPhase::Submitting | SendPhase::Streaming | SendPhase::Persisting => {
                Err(SendError::Busy)
            }
            SendPhase::Idle | SendPhase::Settled | SendPhase::Failed => Ok(()),
        }
    }

    fn body(&self, messages: Vec<NormalizedMessage>) -> ChatRequestBody {
        ChatRequestBody {
            messages,
            is_web_search: self.is_web_search,
            gemini_api_key: self.gemini_api_key.clone(),
            model: self.model.clone(),
            service: self.service,
        }
    }

    fn user_turn(query: &str, attachment: Option<&str>) -> NormalizedMessage {
        match attachment {
            Some(url) => NormalizedMessage::with_attachment(Role::User, query, url),
            None => NormalizedMessage::text(Role::User, query),
        }
    }

    /// Conversation history as alternating user/assistant turns, using each
    /// turn's first response.
    fn build_history(&self) -> Vec<NormalizedMessage> {
        let mut out = Vec::new();
        for view in self.messages.iter().filter(|m| !m.pending) {
            out.push(Self::user_turn(&view.user_query, view.attachment.as_deref()));
            let content = view
                .responses
                .first()
                .map(|r| r.content.clone())
                .unwrap_or_default();
            out.push(NormalizedMessage::text(Role::Assistant, content));
        }
        out
    }

    fn position_of_temp(&self, temp_id: &str) -> Option<usize> {
        self.messages
            .iter()
            .position(|m| m.temp_id.as_deref() == Some(temp_id))
    }

    fn fail(&mut self, error: TransportError) -> SendError {
        tracing::error!("Streaming error: {}", error);
        self.phase = SendPhase::Failed;
        self.last_error = Some(error.0.clone());
        SendError::Transport(error)
    }

    /// Submit one user turn: optimistic insert, stream, persist.
    pub async fn send(
        &mut self,
        query: &str,
        attachment: Option<String>,
        mut on_update: impl FnMut(&str),
    ) -> Result<(), SendError> {
        self.guard()?;
        let query = query.trim().to_string();
        if query.is_empty() {
            return Err(SendError::EmptyQuery);
        }

        self.phase = SendPhase::Submitting;
        self.last_error = None;

        let mut api_messages = self.build_history();
        api_messages.push(Self::user_turn(&query, attachment.as_deref()));

        // Optimistic insert before any network activity
        let temp_id = format!("temp_{}", Uuid::new_v4());
        self.messages.push(MessageView {
            id: None,
            temp_id: Some(temp_id.clone()),
            user_query: query.clone(),
            attachment: attachment.clone(),
            responses: vec![ResponseView {
                id: None,
                content: String::new(),
                model: self.model.clone(),
            }],
            selected: 0,
            pending: true,
            unsynced: false,
        });

        self.phase = SendPhase::Streaming;
        let body = self.body(api_messages);
        let stream = match self.transport.stream_chat(&body).await {
            Ok(stream) => stream,
            Err(e) => {
                // Rollback: no partial turn is left behind
                if let Some(pos) = self.position_of_temp(&temp_id) {
                    self.messages.remove(pos);
                }
                return Err(self.fail(e));
            }
        };

        let mut decoder = StreamDecoder::new(stream);
        loop {
            match decoder.next_update().await {
                Some(Ok(snapshot)) => {
                    if let Some(pos) = self.position_of_temp(&temp_id) {
                        self.messages[pos].responses[0].content = snapshot.clone();
                    }
                    on_update(&snapshot);
                }
                Some(Err(e)) => {
                    if let Some(pos) = self.position_of_temp(&temp_id) {
                        self.messages.remove(pos);
                    }
                    return Err(self.fail(e));
                }
                None => break,
            }
        }

        self.phase = SendPhase::Persisting;
        let response_text = decoder.text().to_string();
        let created = self
            .messages_store
            .create_message(NewMessage {
                thread_id: self.thread_id.clone(),
                user_query: query,
                attachment,
                responses: vec![NewVariant {
                    content: response_text,
                    model: self.model.clone(),
                }],
            })
            .await;

        if let Some(pos) = self.position_of_temp(&temp_id) {
            match created {
                Ok(stored) => {
                    // Same visual position, temp id swapped for the real one
                    self.messages[pos] = MessageView::from_stored(stored, 0);
                }
                Err(e) => {
                    self.messages[pos].pending = false;
                    self.messages[pos].unsynced = true;
                    self.last_error = Some(e.to_string());
                }
            }
        }

        self.phase = SendPhase::Settled;
        Ok(())
    }

    /// Stream a fresh response for an already-persisted message and append
    /// it as a new variant. Prior variants are never touched; the selection
    /// advances to the new variant.
    pub async fn regenerate(
        &mut self,
        message_id: &MessageId,
        mut on_update: impl FnMut(&str),
    ) -> Result<(), SendError> {
        self.guard()?;

        let (query, attachment) = match self
            .messages
            .iter()
            .find(|m| m.id.as_ref() == Some(message_id))
        {
            Some(view) => (view.user_query.clone(), view.attachment.clone()),
            None => return Err(SendError::MessageNotFound),
        };
        if query.trim().is_empty() {
            return Err(SendError::EmptyQuery);
        }

        self.phase = SendPhase::Streaming;
        self.last_error = None;

        let body = self.body(vec![Self::user_turn(&query, attachment.as_deref())]);
        let response_text = match self.stream_to_end(&body, &mut on_update).await {
            Ok(text) => text,
            Err(e) => return Err(self.fail(e)),
        };

        self.phase = SendPhase::Persisting;
        let appended = self
            .messages_store
            .append_response_variant(
                message_id,
                NewVariant {
                    content: response_text.clone(),
                    model: self.model.clone(),
                },
            )
            .await;

        if let Some(pos) = self
            .messages
            .iter()
            .position(|m| m.id.as_ref() == Some(message_id))
        {
            match appended {
                Ok(stored) => {
                    let selected = stored.ai_response.len().saturating_sub(1);
                    self.messages[pos] = MessageView::from_stored(stored, selected);
                }
                Err(e) => {
                    // Keep the streamed variant visible even though it did
                    // not persist
                    self.messages[pos].responses.push(ResponseView {
                        id: None,
                        content: response_text,
                        model: self.model.clone(),
                    });
                    self.messages[pos].selected = self.messages[pos].responses.len() - 1;
                    self.messages[pos].unsynced = true;
                    self.last_error = Some(e.to_string());
                }
            }
        }

        self.phase = SendPhase::Settled;
        Ok(())
    }

    /// Rewrite a selected span of one variant. The model returns the entire
    /// modified response, which replaces that variant's content in place -
    /// no new variant is appended.
    pub async fn edit_retry(
        &mut self,
        message_id: &MessageId,
        variant_id: &VariantId,
        selected_text: &str,
        instruction: &str,
        mut on_update: impl FnMut(&str),
    ) -> Result<(), SendError> {
        self.guard()?;

        let (content, attachment) = match self
            .messages
            .iter()
            .find(|m| m.id.as_ref() == Some(message_id))
            .and_then(|m| {
                m.responses
                    .iter()
                    .find(|r| r.id.as_ref() == Some(variant_id))
                    .map(|r| (r.content.clone(), m.attachment.clone()))
            }) {
            Some(found) => found,
            None => return Err(SendError::MessageNotFound),
        };

        let prompt = format!(
            "You are an advanced AI assistant tasked with modifying a specific part of a response while ensuring the entire response remains cohesive, natural, and aligned with its original intent. The original response is: \"{}\". The specific part to modify is: \"{}\". {} Ensure the modified part integrates seamlessly with the rest of the response, preserving the original tone, structure, and essential introductory and concluding phrases. Return only the entire modified response without adding non-contextual information or meta-commentary.",
            content, selected_text, instruction
        );

        self.phase = SendPhase::Streaming;
        self.last_error = None;

        let body = self.body(vec![Self::user_turn(&prompt, attachment.as_deref())]);
        let response_text = match self.stream_to_end(&body, &mut on_update).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => return Err(self.fail(e)),
        };

        self.phase = SendPhase::Persisting;
        let updated = self
            .messages_store
            .update_response_content(message_id, variant_id, response_text.clone())
            .await;

        match updated {
            Ok(_) => {
                if let Some(variant) = self
                    .messages
                    .iter_mut()
                    .find(|m| m.id.as_ref() == Some(message_id))
                    .and_then(|m| {
                        m.responses
                            .iter_mut()
                            .find(|r| r.id.as_ref() == Some(variant_id))
                    })
                {
                    variant.content = response_text;
                }
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
            }
        }

        self.phase = SendPhase::Settled;
        Ok(())
    }

    /// Create a new thread branching off at the given message. Folder
    /// placement mirrors the source thread; the branched history itself is
    /// resolved by the store at read time.
    pub async fn branch(&self, message_id: &MessageId) -> StoreResult<Thread> {
        let source = self.threads_store.get_thread(&self.thread_id).await?;
        self.threads_store
            .create_thread(
                format!("{} - branch", source.title),
                Some(message_id.clone()),
                source.parent_folder_id,
            )
            .await
    }

    async fn stream_to_end(
        &self,
        body: &ChatRequestBody,
        on_update: &mut impl FnMut(&str),
    ) -> Result<String, TransportError> {
        let stream = self.transport.stream_chat(body).await?;
        StreamDecoder::new(stream)
            .read_to_end(|snapshot| on_update(snapshot))
            .await
    }

    #[cfg(test)]
    pub(crate) fn force_phase(&mut self, phase: SendPhase) {
        self.phase = phase;
    }
}
