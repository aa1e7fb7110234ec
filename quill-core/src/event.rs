//! Transient stream events.
//!
//! Produced by the tool orchestrator, consumed exactly once by the stream
//! encoder. Ordering within one request is total: single producer, single
//! consumer, FIFO. Events are never persisted.

use crate::error::ClassifiedError;

#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Plain response text, forwarded verbatim
    TextDelta(String),
    /// A tool invocation has started
    ToolStart { tool: String },
    /// The matching tool invocation finished; payload is the serialized
    /// result fed back to the model
    ToolResult { tool: String, payload: String },
    /// A failure that was classified mid-stream
    Error(ClassifiedError),
}
