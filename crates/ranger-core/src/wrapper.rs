// Validated agent wrapper
//
// Binds a required-tools list to a validator and exposes a single `invoke`.

use std::sync::Arc;

use crate::agent::AgentRunner;
use crate::audit::AuditEventBridge;
use crate::config::ValidatorConfig;
use crate::validator::{ToolInvocationValidator, ValidationResult};

/// An agent whose answers must be backed by the required tool calls
pub struct ValidatedAgentWrapper {
    required_tools: Option<Vec<String>>,
    validator: ToolInvocationValidator,
}

impl ValidatedAgentWrapper {
    pub fn new(required_tools: Option<Vec<String>>, validator: ToolInvocationValidator) -> Self {
        Self {
            required_tools,
            validator,
        }
    }

    pub fn required_tools(&self) -> Option<&[String]> {
        self.required_tools.as_deref()
    }

    pub fn validator(&self) -> &ToolInvocationValidator {
        &self.validator
    }

    /// Run `query` with tool-invocation enforcement
    pub async fn invoke(&self, query: &str, session_id: Option<&str>) -> ValidationResult {
        self.validator
            .invoke_with_enforcement(query, self.required_tools(), session_id)
            .await
    }
}

/// Wrap `agent` so its answers are validated against `required_tools`
pub fn create_validated_agent(
    agent: Arc<dyn AgentRunner>,
    bridge: Arc<AuditEventBridge>,
    required_tools: Option<Vec<String>>,
    config: ValidatorConfig,
) -> ValidatedAgentWrapper {
    ValidatedAgentWrapper::new(
        required_tools,
        ToolInvocationValidator::new(agent, bridge, config),
    )
}
