// In-memory implementations for examples and testing
//
// - ScriptedAgent: an AgentRunner that replays a fixed script of turns,
//   executing its tool calls through an AuditedToolExecutor
// - FixtureTool: returns a fixed JSON payload
// - FailingTool: always fails, with either a tool error or an internal error

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::agent::{AgentEventStream, AgentRunner, AgentStreamEvent, InvocationContext};
use crate::error::{RangerError, Result};
use crate::tool_types::ToolCall;
use crate::tools::{AuditedToolExecutor, Tool, ToolExecutionResult};

// ============================================================================
// ScriptedAgent - Replays predefined turns
// ============================================================================

/// One scripted agent turn
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Call the given tools, then answer with `text`
    Respond {
        tool_calls: Vec<ToolCall>,
        text: String,
    },
    /// The invocation itself fails
    Fail(String),
}

impl ScriptedTurn {
    /// Answer without calling any tool
    pub fn text(text: impl Into<String>) -> Self {
        ScriptedTurn::Respond {
            tool_calls: Vec::new(),
            text: text.into(),
        }
    }

    /// Call the given tools, then answer
    pub fn with_tools(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        ScriptedTurn::Respond {
            tool_calls,
            text: text.into(),
        }
    }

    /// Fail the invocation with an agent invocation error
    pub fn fail(message: impl Into<String>) -> Self {
        ScriptedTurn::Fail(message.into())
    }
}

/// Agent that replays scripted turns in order
///
/// Once the script is exhausted every further run answers with a fixed
/// text and calls no tools.
pub struct ScriptedAgent {
    name: String,
    executor: AuditedToolExecutor,
    turns: Arc<RwLock<Vec<ScriptedTurn>>>,
    call_index: Arc<RwLock<usize>>,
    call_log: Arc<RwLock<Vec<String>>>,
}

impl ScriptedAgent {
    /// Create a new scripted agent
    pub fn new(name: impl Into<String>, executor: AuditedToolExecutor) -> Self {
        Self {
            name: name.into(),
            executor,
            turns: Arc::new(RwLock::new(Vec::new())),
            call_index: Arc::new(RwLock::new(0)),
            call_log: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Add a turn to the script
    pub async fn add_turn(&self, turn: ScriptedTurn) {
        self.turns.write().await.push(turn);
    }

    /// Set all turns at once
    pub async fn set_turns(&self, turns: Vec<ScriptedTurn>) {
        *self.turns.write().await = turns;
        *self.call_index.write().await = 0;
    }

    /// Queries received so far, in order
    pub async fn calls(&self) -> Vec<String> {
        self.call_log.read().await.clone()
    }

    async fn next_turn(&self) -> ScriptedTurn {
        let mut index = self.call_index.write().await;
        let turn = self
            .turns
            .read()
            .await
            .get(*index)
            .cloned()
            .unwrap_or_else(|| ScriptedTurn::text("Scripted response (no more turns configured)"));
        *index += 1;
        turn
    }
}

#[async_trait]
impl AgentRunner for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, query: &str, context: &InvocationContext) -> Result<AgentEventStream> {
        self.call_log.write().await.push(query.to_string());

        let (tool_calls, text) = match self.next_turn().await {
            ScriptedTurn::Respond { tool_calls, text } => (tool_calls, text),
            ScriptedTurn::Fail(message) => return Err(RangerError::invocation(message)),
        };

        let tool_context = context.tool_context();
        let mut events = Vec::with_capacity(tool_calls.len() * 2 + 2);
        for call in tool_calls {
            let result = self.executor.execute(&call, &tool_context).await;
            events.push(Ok(AgentStreamEvent::ToolCall(call)));
            events.push(Ok(AgentStreamEvent::ToolResult(result)));
        }
        events.push(Ok(AgentStreamEvent::Text(text)));
        events.push(Ok(AgentStreamEvent::Done));

        Ok(Box::pin(stream::iter(events)))
    }
}

// ============================================================================
// Fixture tools
// ============================================================================

/// Tool that always returns the same payload
pub struct FixtureTool {
    name: String,
    payload: Value,
}

impl FixtureTool {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

#[async_trait]
impl Tool for FixtureTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _arguments: Value) -> ToolExecutionResult {
        ToolExecutionResult::success(self.payload.clone())
    }
}

/// A tool that always fails (useful for testing error handling)
pub struct FailingTool {
    name: String,
    error_message: String,
    use_internal_error: bool,
}

impl FailingTool {
    /// Create a failing tool with a tool-level error
    pub fn with_tool_error(message: impl Into<String>) -> Self {
        Self {
            name: "failing_tool".to_string(),
            error_message: message.into(),
            use_internal_error: false,
        }
    }

    /// Create a failing tool with an internal error
    pub fn with_internal_error(message: impl Into<String>) -> Self {
        Self {
            name: "failing_tool".to_string(),
            error_message: message.into(),
            use_internal_error: true,
        }
    }

    /// Register under a different name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _arguments: Value) -> ToolExecutionResult {
        if self.use_internal_error {
            ToolExecutionResult::internal_error_msg(&self.error_message)
        } else {
            ToolExecutionResult::tool_error(&self.error_message)
        }
    }
}
