// RANGER Core - Audit capture and tool-invocation enforcement
//
// This crate makes it checkable that an LLM agent actually called the tools
// its answer depends on (post-fire triage skills: burn severity, trail
// closure risk, timber volume, NEPA pathways).
//
// Key design decisions:
// - The agent framework is an external runtime behind the AgentRunner trait
// - Tool calls go through AuditedToolExecutor, which feeds the audit hooks
// - AuditEventBridge buffers events per correlation key with a FIFO cap
// - ToolInvocationValidator retries with an enforcement reminder, then
//   escalates with a user-safe message instead of an unverified answer
// - Tool failures degrade to graceful responses; only invocation-level
//   failures short-circuit the retry loop

pub mod agent;
pub mod audit;
pub mod config;
pub mod error;
pub mod tool_types;
pub mod tools;
pub mod validator;
pub mod wrapper;

// In-memory implementations for examples and testing
pub mod memory;

// Re-exports for convenience
pub use agent::{
    collect_response_text, AgentEventStream, AgentRunner, AgentStreamEvent, InvocationContext,
};
pub use audit::{
    create_audit_callbacks, AuditCallbacks, AuditEvent, AuditEventBridge, AuditEventType,
    ErrorEvent, InvocationEvent, ResponseEvent,
};
pub use config::{AuditConfig, ValidatorConfig};
pub use error::{RangerError, Result};
pub use tool_types::{ProofLayer, ToolCall, ToolContext, ToolError, ToolResponse, ToolResult};
pub use tools::{
    AuditedToolExecutor, Tool, ToolExecutionResult, ToolInternalError, ToolRegistry,
    ToolRegistryBuilder,
};
pub use validator::{
    ToolInvocationValidator, ValidationOutcome, ValidationResult, ESCALATION_MESSAGE,
};
pub use wrapper::{create_validated_agent, ValidatedAgentWrapper};
