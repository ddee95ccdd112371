// Agent runtime seam
//
// The LLM agent framework is external. What the validator needs from it is
// "run with a message, get an event stream": `AgentRunner::run` returns a
// stream of `AgentStreamEvent`s, and the response text is the last non-empty
// text fragment in that stream.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::error::{RangerError, Result};
use crate::tool_types::{ToolCall, ToolContext, ToolResult};

/// Type alias for an agent's response stream
pub type AgentEventStream = Pin<Box<dyn Stream<Item = Result<AgentStreamEvent>> + Send>>;

/// Events emitted while an agent handles one query
#[derive(Debug, Clone, PartialEq)]
pub enum AgentStreamEvent {
    /// Text fragment produced by the agent
    Text(String),
    /// The agent requested a tool call
    ToolCall(ToolCall),
    /// A tool call returned
    ToolResult(ToolResult),
    /// The agent finished
    Done,
    /// The runtime reported an error mid-stream
    Error(String),
}

/// Identifies one agent invocation for audit correlation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    /// Correlation key audit events must be recorded under
    pub invocation_id: String,
    /// Session the invocation runs in
    pub session_id: String,
}

impl InvocationContext {
    /// Context where the session and the correlation key are the same
    pub fn for_session(session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        Self {
            invocation_id: session_id.clone(),
            session_id,
        }
    }

    /// Context handed to tool hooks during this invocation
    pub fn tool_context(&self) -> ToolContext {
        ToolContext::new()
            .with_session_id(self.session_id.clone())
            .with_invocation_id(self.invocation_id.clone())
    }
}

/// An agent that can be invoked with a natural-language query
///
/// Implementations wrap the host agent framework. Tool calls made while
/// handling the query must go through an audited executor using
/// `context.tool_context()`, so the audit trail is keyed by the invocation.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Agent name, used in logs
    fn name(&self) -> &str;

    /// Run the query and return the agent's event stream
    async fn run(&self, query: &str, context: &InvocationContext) -> Result<AgentEventStream>;

    /// Run the query and return the final response text
    async fn run_to_text(&self, query: &str, context: &InvocationContext) -> Result<String> {
        let stream = self.run(query, context).await?;
        collect_response_text(stream).await
    }
}

/// Drain an agent stream, keeping the last non-empty text fragment
pub async fn collect_response_text(mut stream: AgentEventStream) -> Result<String> {
    let mut response = String::new();

    while let Some(event) = stream.next().await {
        match event? {
            AgentStreamEvent::Text(text) if !text.trim().is_empty() => response = text,
            AgentStreamEvent::Error(err) => return Err(RangerError::stream(err)),
            AgentStreamEvent::Done => break,
            _ => {}
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn boxed(events: Vec<Result<AgentStreamEvent>>) -> AgentEventStream {
        Box::pin(stream::iter(events))
    }

    #[tokio::test]
    async fn test_last_non_empty_text_wins() {
        let stream = boxed(vec![
            Ok(AgentStreamEvent::Text("Checking burn severity...".to_string())),
            Ok(AgentStreamEvent::ToolCall(ToolCall::new(
                "call_1",
                "classify_damage",
                serde_json::json!({}),
            ))),
            Ok(AgentStreamEvent::Text("Sector NW-4 is high severity.".to_string())),
            Ok(AgentStreamEvent::Text("   ".to_string())),
            Ok(AgentStreamEvent::Done),
        ]);

        let text = collect_response_text(stream).await.unwrap();
        assert_eq!(text, "Sector NW-4 is high severity.");
    }

    #[tokio::test]
    async fn test_stream_error_fails_collection() {
        let stream = boxed(vec![
            Ok(AgentStreamEvent::Text("partial".to_string())),
            Ok(AgentStreamEvent::Error("model overloaded".to_string())),
        ]);

        let err = collect_response_text(stream).await.unwrap_err();
        assert_eq!(err.kind(), "Stream");
    }

    #[tokio::test]
    async fn test_err_item_fails_collection() {
        let stream = boxed(vec![Err(RangerError::invocation("socket closed"))]);

        let err = collect_response_text(stream).await.unwrap_err();
        assert_eq!(err.kind(), "AgentInvocation");
    }

    #[tokio::test]
    async fn test_empty_stream_yields_empty_text() {
        let text = collect_response_text(boxed(vec![])).await.unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn test_invocation_context_tool_context() {
        let context = InvocationContext::for_session("session-1");
        let tool_context = context.tool_context();
        assert_eq!(tool_context.correlation_key(), "session-1");
        assert_eq!(tool_context.invocation_id.as_deref(), Some("session-1"));
    }
}
