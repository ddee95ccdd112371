// Tool call, context and response types
//
// Design Decision: Tool responses come from independently evolving skill
// scripts with no enforced schema. Instead of probing a JSON value field by
// field at every call site, a response is classified once into `ToolResponse`:
// either a structured proof-layer payload or an opaque value. Readers pattern
// match and get defaults for anything the script left out.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Tool call issued by an agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Unique ID for this tool call
    pub id: String,
    /// Tool name to execute
    pub name: String,
    /// Arguments as JSON
    pub arguments: Value,
}

impl ToolCall {
    /// Create a tool call
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Tool execution result handed back to the agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    /// Tool call ID this result corresponds to
    pub tool_call_id: String,
    /// Tool output (a graceful substitute when the tool failed)
    pub result: Value,
}

/// Runtime context passed to tool hooks and tools
///
/// Hooks derive the audit correlation key from this context: the session ID
/// wins, then the invocation ID, then the literal `"unknown"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolContext {
    /// Session the tool call belongs to
    pub session_id: Option<String>,
    /// Framework invocation ID, if the runtime exposes one
    pub invocation_id: Option<String>,
}

impl ToolContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session ID
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the invocation ID
    pub fn with_invocation_id(mut self, invocation_id: impl Into<String>) -> Self {
        self.invocation_id = Some(invocation_id.into());
        self
    }

    /// Correlation key used for audit events
    pub fn correlation_key(&self) -> &str {
        self.session_id
            .as_deref()
            .or(self.invocation_id.as_deref())
            .unwrap_or("unknown")
    }
}

/// A failed tool call as seen by the error hook
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{error_type}: {message}")]
pub struct ToolError {
    /// Kind of failure (e.g. "ToolError", "InternalError", "ToolNotFound")
    pub error_type: String,
    /// Error message
    pub message: String,
}

impl ToolError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }
}

/// Confidence, citation and reasoning metadata attached to a tool response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProofLayer {
    pub status: String,
    pub confidence: f64,
    pub data_sources: Vec<String>,
    pub reasoning_chain: Vec<String>,
}

impl Default for ProofLayer {
    fn default() -> Self {
        Self {
            status: "success".to_string(),
            confidence: 0.0,
            data_sources: Vec::new(),
            reasoning_chain: Vec::new(),
        }
    }
}

/// Classified tool response
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResponse {
    /// A JSON object; proof fields extracted with defaults for missing ones
    Structured(ProofLayer),
    /// Any other shape (string, array, number, null)
    Unstructured(Value),
}

impl ToolResponse {
    /// Classify a raw tool output
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return ToolResponse::Unstructured(value.clone());
        };

        let defaults = ProofLayer::default();
        ToolResponse::Structured(ProofLayer {
            status: object
                .get("status")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(defaults.status),
            confidence: object
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(defaults.confidence),
            data_sources: string_list(object.get("data_sources")),
            reasoning_chain: string_list(object.get("reasoning_chain")),
        })
    }

    /// Proof metadata, with defaults for unstructured responses
    pub fn proof(&self) -> ProofLayer {
        match self {
            ToolResponse::Structured(proof) => proof.clone(),
            ToolResponse::Unstructured(_) => ProofLayer::default(),
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
