// Tool Abstraction and Audited Execution
//
// This module provides the tool side of the agent runtime seam. Skills are
// defined with the `Tool` trait, collected in a `ToolRegistry`, and executed
// through an `AuditedToolExecutor`, which runs every call through the audit
// hooks (before / after / on error).
//
// Design decisions:
// - Tools are defined via a trait for flexibility (function-style tools)
// - Error handling distinguishes between tool-level errors and internal errors
// - Internal error details are recorded in the audit trail but not exposed
//   to the LLM
// - Execution never fails: failures become graceful tool-shaped responses

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use crate::audit::{graceful_error_response, AuditCallbacks};
use crate::tool_types::{ToolCall, ToolContext, ToolError, ToolResponse, ToolResult};

/// Message returned to the LLM in place of internal error details
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred while executing the tool";

/// Error type recorded for internal tool failures
pub const INTERNAL_ERROR_TYPE: &str = "InternalError";

// ============================================================================
// Tool Execution Result - Error Handling Contract
// ============================================================================

/// Result of a tool execution.
///
/// - `Success`: Tool executed successfully, result is returned to the LLM
/// - `ToolError`: Tool-level error that is safe to show to the LLM
///   (e.g., "Fire not found", "Invalid sector")
/// - `InternalError`: System-level error that should NOT be exposed to the LLM
///   (e.g., fixture file unreadable, upstream service down)
#[derive(Debug)]
pub enum ToolExecutionResult {
    /// Successful execution with a JSON result
    Success(Value),

    /// Tool-level error that is safe to show to the LLM
    ToolError(String),

    /// Internal/system error that should NOT be exposed to the LLM
    InternalError(ToolInternalError),
}

impl ToolExecutionResult {
    /// Create a successful result
    pub fn success(value: impl Into<Value>) -> Self {
        ToolExecutionResult::Success(value.into())
    }

    /// Create a tool-level error (safe to show to LLM)
    pub fn tool_error(message: impl Into<String>) -> Self {
        ToolExecutionResult::ToolError(message.into())
    }

    /// Create an internal error from a string message
    pub fn internal_error_msg(message: impl Into<String>) -> Self {
        ToolExecutionResult::InternalError(ToolInternalError::from_message(message))
    }

    /// Split into the output value or the error seen by the error hook
    fn into_outcome(self) -> std::result::Result<Value, ToolError> {
        match self {
            ToolExecutionResult::Success(value) => Ok(value),
            ToolExecutionResult::ToolError(message) => Err(ToolError::new("ToolError", message)),
            ToolExecutionResult::InternalError(err) => {
                Err(ToolError::new(INTERNAL_ERROR_TYPE, err.message))
            }
        }
    }
}

/// Internal error details (recorded but not exposed to LLM)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInternalError {
    /// Error message for the audit trail
    pub message: String,
}

impl ToolInternalError {
    /// Create from a string message
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ToolInternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

// ============================================================================
// Tool Trait - Core Tool Abstraction
// ============================================================================

/// Trait for implementing tools (skills) callable by an agent.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
///
/// struct ClassifyDamage;
///
/// #[async_trait]
/// impl Tool for ClassifyDamage {
///     fn name(&self) -> &str {
///         "classify_damage"
///     }
///
///     async fn execute(&self, arguments: Value) -> ToolExecutionResult {
///         ToolExecutionResult::success(json!({
///             "severity": "high",
///             "confidence": 0.9,
///             "data_sources": ["MTBS"]
///         }))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool's unique name within a registry.
    fn name(&self) -> &str;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: Value) -> ToolExecutionResult;

    /// Execute the tool with context.
    ///
    /// The default implementation simply calls `execute()`, ignoring the context.
    async fn execute_with_context(
        &self,
        arguments: Value,
        _context: &ToolContext,
    ) -> ToolExecutionResult {
        self.execute(arguments).await
    }
}

// ============================================================================
// ToolRegistry - Collection of Tools
// ============================================================================

/// A registry that holds the tools available to one agent.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool with the registry.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Check if a tool is registered
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get all tool names, sorted
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Create a builder for fluent tool registration
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names())
            .finish()
    }
}

/// Builder for creating a ToolRegistry with a fluent API.
pub struct ToolRegistryBuilder {
    registry: ToolRegistry,
}

impl ToolRegistryBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            registry: ToolRegistry::new(),
        }
    }

    /// Add a tool to the registry
    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.registry.register(tool);
        self
    }

    /// Build the registry
    pub fn build(self) -> ToolRegistry {
        self.registry
    }
}

impl Default for ToolRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// AuditedToolExecutor - Runs tool calls through the audit hooks
// ============================================================================

/// Executes tool calls from a registry, wrapping each call in audit hooks.
///
/// Order of operations per call:
/// 1. Unknown tool: error hook only (nothing was invoked)
/// 2. `before_tool`; an override value short-circuits execution
/// 3. Tool runs; success goes through `after_tool`, failure through
///    `on_tool_error`, whose substitute becomes the result
#[derive(Debug, Clone)]
pub struct AuditedToolExecutor {
    registry: ToolRegistry,
    callbacks: AuditCallbacks,
}

impl AuditedToolExecutor {
    pub fn new(registry: ToolRegistry, callbacks: AuditCallbacks) -> Self {
        Self {
            registry,
            callbacks,
        }
    }

    /// Execute a tool call; never fails
    pub async fn execute(&self, call: &ToolCall, context: &ToolContext) -> ToolResult {
        let result = self.execute_value(call, context).await;
        ToolResult {
            tool_call_id: call.id.clone(),
            result,
        }
    }

    async fn execute_value(&self, call: &ToolCall, context: &ToolContext) -> Value {
        let Some(tool) = self.registry.get(&call.name) else {
            let err = ToolError::new("ToolNotFound", format!("Tool not found: {}", call.name));
            return self.callbacks.on_tool_error(call, context, &err);
        };

        if let Some(overridden) = self.callbacks.before_tool(call, context) {
            return overridden;
        }

        let started = Instant::now();
        let outcome = tool
            .execute_with_context(call.arguments.clone(), context)
            .await
            .into_outcome();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(value) => {
                let response = ToolResponse::from_value(&value);
                self.callbacks
                    .after_tool(call, context, &response, Some(elapsed_ms))
                    .unwrap_or(value)
            }
            Err(err) => {
                let substitute = self.callbacks.on_tool_error(call, context, &err);
                // The audit trail keeps the real message; the LLM does not see it
                if err.error_type == INTERNAL_ERROR_TYPE {
                    graceful_error_response(&call.name, INTERNAL_ERROR_MESSAGE)
                } else {
                    substitute
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
