// Audit callbacks
//
// Adapts the three tool hooks (before call, after call, on error) into
// bridge writes plus structured log lines, for one named agent.
//
// Contract:
// - before/after never override the call or its response (they return None)
// - the error hook always returns a graceful substitute response, so a failed
//   tool degrades the conversation instead of aborting the agent's turn

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info};

use super::bridge::AuditEventBridge;
use super::events::{ErrorEvent, InvocationEvent, ResponseEvent};
use crate::tool_types::{ToolCall, ToolContext, ToolError, ToolResponse};

/// Recommendation attached to graceful error responses
pub const ERROR_RECOMMENDATION: &str = "Unable to retrieve this data right now. \
Please retry or consult a specialist for manual review.";

/// Audit hooks bound to a single agent
#[derive(Debug, Clone)]
pub struct AuditCallbacks {
    agent_name: String,
    bridge: Arc<AuditEventBridge>,
}

/// Create the audit hooks for `agent_name`
pub fn create_audit_callbacks(
    agent_name: impl Into<String>,
    bridge: Arc<AuditEventBridge>,
) -> AuditCallbacks {
    AuditCallbacks::new(agent_name, bridge)
}

impl AuditCallbacks {
    pub fn new(agent_name: impl Into<String>, bridge: Arc<AuditEventBridge>) -> Self {
        Self {
            agent_name: agent_name.into(),
            bridge,
        }
    }

    pub fn bridge(&self) -> &Arc<AuditEventBridge> {
        &self.bridge
    }

    /// Hook run before a tool executes. Returns `None`: proceed unmodified.
    pub fn before_tool(&self, call: &ToolCall, context: &ToolContext) -> Option<Value> {
        let key = context.correlation_key();

        info!(
            agent = %self.agent_name,
            tool = %call.name,
            invocation_id = %key,
            parameters = %call.arguments,
            "Tool invocation"
        );

        self.bridge.record_invocation(
            InvocationEvent::new(
                &self.agent_name,
                &call.name,
                Some(key.to_string()),
                call.arguments.clone(),
            )
            .with_session_id(context.session_id.clone()),
        );

        None
    }

    /// Hook run after a tool returns. Returns `None`: use the original response.
    pub fn after_tool(
        &self,
        call: &ToolCall,
        context: &ToolContext,
        response: &ToolResponse,
        execution_time_ms: Option<u64>,
    ) -> Option<Value> {
        let key = context.correlation_key();
        let proof = response.proof();

        info!(
            agent = %self.agent_name,
            tool = %call.name,
            invocation_id = %key,
            status = %proof.status,
            confidence = proof.confidence,
            data_sources = ?proof.data_sources,
            execution_time_ms,
            "Tool response"
        );

        self.bridge.record_response(
            ResponseEvent::new(&self.agent_name, &call.name, Some(key.to_string()))
                .with_status(proof.status)
                .with_confidence(proof.confidence)
                .with_data_sources(proof.data_sources)
                .with_reasoning_chain(proof.reasoning_chain)
                .with_execution_time_ms(execution_time_ms),
        );

        None
    }

    /// Hook run when a tool fails. Returns the response the agent sees instead.
    pub fn on_tool_error(&self, call: &ToolCall, context: &ToolContext, err: &ToolError) -> Value {
        let key = context.correlation_key();

        error!(
            agent = %self.agent_name,
            tool = %call.name,
            invocation_id = %key,
            error_type = %err.error_type,
            error = %err.message,
            "Tool error"
        );

        self.bridge.record_error(ErrorEvent::new(
            &self.agent_name,
            &call.name,
            Some(key.to_string()),
            call.arguments.clone(),
            &err.error_type,
            &err.message,
        ));

        graceful_error_response(&call.name, &err.message)
    }
}

/// Tool-shaped response substituted for a failed tool call
pub fn graceful_error_response(tool_name: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "confidence": 0.0,
        "data_sources": [],
        "reasoning_chain": [format!("Tool {tool_name} failed: {message}")],
        "recommendation": ERROR_RECOMMENDATION,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::events::{AuditEvent, TIER3_ENFORCEMENT};

    fn callbacks() -> AuditCallbacks {
        create_audit_callbacks("burn_analyst", Arc::new(AuditEventBridge::with_defaults()))
    }

    fn call() -> ToolCall {
        ToolCall::new(
            "call_1",
            "classify_damage",
            json!({"fire_id": "cedar-creek-2022", "sector": "NW-4"}),
        )
    }

    #[test]
    fn test_before_tool_records_invocation() {
        let hooks = callbacks();
        let context = ToolContext::new().with_session_id("session-1");

        assert!(hooks.before_tool(&call(), &context).is_none());

        let trail = hooks.bridge().get_audit_trail("session-1");
        assert_eq!(trail.len(), 1);
        match &trail[0] {
            AuditEvent::Invocation(event) => {
                assert_eq!(event.envelope.agent, "burn_analyst");
                assert_eq!(event.envelope.tool, "classify_damage");
                assert_eq!(event.parameters["sector"], "NW-4");
                assert_eq!(event.session_id.as_deref(), Some("session-1"));
                assert_eq!(event.enforcement, TIER3_ENFORCEMENT);
            }
            other => panic!("Expected invocation event, got {other:?}"),
        }
    }

    #[test]
    fn test_key_falls_back_to_invocation_id_then_unknown() {
        let hooks = callbacks();

        hooks.before_tool(&call(), &ToolContext::new().with_invocation_id("inv-9"));
        hooks.before_tool(&call(), &ToolContext::new());

        assert_eq!(hooks.bridge().get_audit_trail("inv-9").len(), 1);
        assert_eq!(hooks.bridge().get_audit_trail("unknown").len(), 1);
    }

    #[test]
    fn test_after_tool_extracts_proof_layer() {
        let hooks = callbacks();
        let context = ToolContext::new().with_session_id("s");
        let response = ToolResponse::from_value(&json!({
            "status": "complete",
            "confidence": 0.92,
            "data_sources": ["MTBS"],
            "reasoning_chain": ["dNBR above 0.66"]
        }));

        assert!(hooks
            .after_tool(&call(), &context, &response, Some(42))
            .is_none());

        let latest = hooks.bridge().get_latest_response("s").unwrap();
        assert_eq!(latest.status, "complete");
        assert_eq!(latest.confidence, 0.92);
        assert_eq!(latest.data_sources, vec!["MTBS"]);
        assert_eq!(latest.reasoning_chain, vec!["dNBR above 0.66"]);
        assert_eq!(latest.execution_time_ms, Some(42));
    }

    #[test]
    fn test_after_tool_unstructured_response_uses_defaults() {
        let hooks = callbacks();
        let context = ToolContext::new().with_session_id("s");
        let response = ToolResponse::from_value(&json!("high severity"));

        hooks.after_tool(&call(), &context, &response, None);

        let latest = hooks.bridge().get_latest_response("s").unwrap();
        assert_eq!(latest.status, "success");
        assert_eq!(latest.confidence, 0.0);
        assert!(latest.data_sources.is_empty());
        assert!(latest.reasoning_chain.is_empty());
    }

    #[test]
    fn test_on_tool_error_records_and_substitutes() {
        let hooks = callbacks();
        let context = ToolContext::new().with_session_id("s");
        let err = ToolError::new("ToolError", "sector NW-4 has no imagery");

        let substitute = hooks.on_tool_error(&call(), &context, &err);

        assert_eq!(substitute["status"], "error");
        assert_eq!(substitute["confidence"], 0.0);
        assert_eq!(substitute["data_sources"], json!([]));
        assert_eq!(
            substitute["reasoning_chain"],
            json!(["Tool classify_damage failed: sector NW-4 has no imagery"])
        );
        assert_eq!(substitute["recommendation"], ERROR_RECOMMENDATION);

        let trail = hooks.bridge().get_audit_trail("s");
        assert_eq!(trail.len(), 1);
        match &trail[0] {
            AuditEvent::Error(event) => {
                assert_eq!(event.error_type, "ToolError");
                assert_eq!(event.error_message, "sector NW-4 has no imagery");
                assert_eq!(event.parameters["fire_id"], "cedar-creek-2022");
            }
            other => panic!("Expected error event, got {other:?}"),
        }
    }
}
