// Tool Invocation Validator
//
// Drives repeated agent invocations until the agent proves, through the
// audit trail, that it called the required tools, or escalates.
//
// State machine:
//
//   Attempting(n) --valid, n == 1--------> Passed
//   Attempting(n) --valid, n > 1---------> RetrySucceeded
//   Attempting(n) --invalid, n < total---> Attempting(n + 1)
//   Attempting(n) --invalid, n == total--> Escalated (exhausted)
//   Attempting(n) --invocation error-----> Escalated (not retried)
//
// A tool counts as invoked when the trail holds an invocation event for it
// that was not followed by an error event for the same tool.
//
// The working correlation key is cleared before every attempt and on every
// exit, so an attempt only ever sees its own events.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agent::{AgentRunner, InvocationContext};
use crate::audit::{AuditEvent, AuditEventBridge};
use crate::config::ValidatorConfig;
use crate::error::RangerError;

/// User-facing response for escalated queries
pub const ESCALATION_MESSAGE: &str = "I wasn't able to verify this answer against RANGER's \
assessment data, so I can't give you a reliable result. Please have a qualified specialist \
verify this manually before acting on it.";

/// Terminal outcome of a validated invocation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationOutcome {
    /// Required tools were invoked on the first attempt
    Passed,
    /// Required tools were invoked on a later attempt
    RetrySucceeded,
    /// Gave up; the response is the escalation message
    Escalated,
}

impl ValidationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationOutcome::Passed => "PASSED",
            ValidationOutcome::RetrySucceeded => "RETRY_SUCCEEDED",
            ValidationOutcome::Escalated => "ESCALATED",
        }
    }
}

impl std::fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of `invoke_with_enforcement`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationResult {
    pub success: bool,
    pub response: String,
    pub tools_invoked: Vec<String>,
    pub attempts: u32,
    pub validation_outcome: ValidationOutcome,
    pub audit_trail: Vec<AuditEvent>,
    pub escalation_reason: Option<String>,
}

/// What one attempt observed
#[derive(Debug, Clone)]
struct AttemptRecord {
    attempt: u32,
    response: String,
    tools_invoked: Vec<String>,
    audit_trail: Vec<AuditEvent>,
}

#[derive(Debug)]
enum Escalation {
    InvocationFailed { attempt: u32, error: RangerError },
    Exhausted(AttemptRecord),
}

#[derive(Debug)]
enum Terminal {
    Passed(AttemptRecord),
    RetrySucceeded(AttemptRecord),
    Escalated(Escalation),
}

#[derive(Debug)]
enum AttemptState {
    Attempting(u32),
    Finished(Terminal),
}

/// Enforces that an agent invokes required tools, retrying then escalating
///
/// A single call drives one working correlation key. Concurrent calls on
/// the same validator are fine as long as they use distinct keys, which is
/// the case when no session ID is passed (a fresh UUID is generated).
pub struct ToolInvocationValidator {
    agent: Arc<dyn AgentRunner>,
    bridge: Arc<AuditEventBridge>,
    config: ValidatorConfig,
}

impl ToolInvocationValidator {
    pub fn new(
        agent: Arc<dyn AgentRunner>,
        bridge: Arc<AuditEventBridge>,
        config: ValidatorConfig,
    ) -> Self {
        Self {
            agent,
            bridge,
            config,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Invoke the agent until the required tools show up in the audit trail
    ///
    /// Without `required_tools`, or with an empty list, any single tool
    /// invocation passes. The working key is `session_id` when given,
    /// otherwise a fresh UUID.
    pub async fn invoke_with_enforcement(
        &self,
        query: &str,
        required_tools: Option<&[String]>,
        session_id: Option<&str>,
    ) -> ValidationResult {
        let key = session_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        let context = InvocationContext::for_session(&key);
        let total = self.config.total_attempts();

        let mut state = AttemptState::Attempting(1);
        let terminal = loop {
            state = match state {
                AttemptState::Attempting(attempt) => {
                    self.attempt(query, required_tools, &context, attempt, total)
                        .await
                }
                AttemptState::Finished(terminal) => break terminal,
            };
        };

        self.bridge.clear_invocation(&key);
        self.finish(terminal, required_tools, &key)
    }

    async fn attempt(
        &self,
        query: &str,
        required_tools: Option<&[String]>,
        context: &InvocationContext,
        attempt: u32,
        total: u32,
    ) -> AttemptState {
        let key = context.invocation_id.as_str();
        self.bridge.clear_invocation(key);

        let effective_query = if attempt == 1 {
            query.to_string()
        } else {
            with_enforcement_reminder(query, required_tools, attempt, total)
        };

        info!(
            agent = %self.agent.name(),
            invocation_id = %key,
            attempt,
            total,
            "Invoking agent"
        );

        let response = match self.agent.run_to_text(&effective_query, context).await {
            Ok(response) => response,
            Err(error) => {
                return AttemptState::Finished(Terminal::Escalated(Escalation::InvocationFailed {
                    attempt,
                    error,
                }))
            }
        };

        let audit_trail = self.bridge.get_audit_trail(key);
        let tools_invoked = invoked_tools(&audit_trail);
        let valid = requirements_met(&tools_invoked, required_tools);

        let record = AttemptRecord {
            attempt,
            response,
            tools_invoked,
            audit_trail,
        };

        if valid {
            let terminal = if attempt == 1 {
                Terminal::Passed(record)
            } else {
                Terminal::RetrySucceeded(record)
            };
            return AttemptState::Finished(terminal);
        }

        warn!(
            agent = %self.agent.name(),
            invocation_id = %key,
            attempt,
            total,
            required = ?required_tools,
            invoked = ?record.tools_invoked,
            "Required tools not invoked"
        );

        if attempt >= total {
            return AttemptState::Finished(Terminal::Escalated(Escalation::Exhausted(record)));
        }

        if !self.config.retry_delay.is_zero() {
            tokio::time::sleep(self.config.retry_delay).await;
        }
        AttemptState::Attempting(attempt + 1)
    }

    fn finish(
        &self,
        terminal: Terminal,
        required_tools: Option<&[String]>,
        key: &str,
    ) -> ValidationResult {
        let result = match terminal {
            Terminal::Passed(record) => success(record, ValidationOutcome::Passed),
            Terminal::RetrySucceeded(record) => {
                success(record, ValidationOutcome::RetrySucceeded)
            }
            Terminal::Escalated(Escalation::InvocationFailed { attempt, error }) => {
                error!(
                    agent = %self.agent.name(),
                    invocation_id = %key,
                    attempt,
                    error_kind = error.kind(),
                    error = %error,
                    "Agent invocation failed, escalating without retry"
                );
                ValidationResult {
                    success: false,
                    response: ESCALATION_MESSAGE.to_string(),
                    tools_invoked: Vec::new(),
                    attempts: attempt,
                    validation_outcome: ValidationOutcome::Escalated,
                    audit_trail: Vec::new(),
                    escalation_reason: Some(format!(
                        "Agent invocation failed ({}): {}",
                        error.kind(),
                        error
                    )),
                }
            }
            Terminal::Escalated(Escalation::Exhausted(record)) => {
                let reason = format!(
                    "Required tools {} not invoked after {} attempts; tools invoked: {}",
                    describe_tools(required_tools.unwrap_or(&[]), "[any tool]"),
                    record.attempt,
                    describe_tools(&record.tools_invoked, "[none]"),
                );
                error!(
                    agent = %self.agent.name(),
                    invocation_id = %key,
                    attempts = record.attempt,
                    reason = %reason,
                    "Tool invocation enforcement escalated"
                );
                ValidationResult {
                    success: false,
                    response: ESCALATION_MESSAGE.to_string(),
                    tools_invoked: record.tools_invoked,
                    attempts: record.attempt,
                    validation_outcome: ValidationOutcome::Escalated,
                    audit_trail: record.audit_trail,
                    escalation_reason: Some(reason),
                }
            }
        };

        if result.success {
            info!(
                agent = %self.agent.name(),
                invocation_id = %key,
                attempts = result.attempts,
                outcome = %result.validation_outcome,
                tools = ?result.tools_invoked,
                "Tool invocation validated"
            );
        }

        result
    }
}

fn success(record: AttemptRecord, outcome: ValidationOutcome) -> ValidationResult {
    ValidationResult {
        success: true,
        response: record.response,
        tools_invoked: record.tools_invoked,
        attempts: record.attempt,
        validation_outcome: outcome,
        audit_trail: record.audit_trail,
        escalation_reason: None,
    }
}

/// Tools that were invoked and did not fail, in recorded order
///
/// Each error event cancels the most recent unmatched invocation of the same
/// tool: a tool that errored has not proven it retrieved anything.
pub fn invoked_tools(trail: &[AuditEvent]) -> Vec<String> {
    let mut invoked: Vec<String> = Vec::new();
    for event in trail {
        match event {
            AuditEvent::Invocation(e) => invoked.push(e.envelope.tool.clone()),
            AuditEvent::Error(e) => {
                if let Some(pos) = invoked.iter().rposition(|tool| *tool == e.envelope.tool) {
                    invoked.remove(pos);
                }
            }
            AuditEvent::Response(_) => {}
        }
    }
    invoked
}

/// Whether the invoked tools satisfy the requirement
///
/// No requirement (absent or empty): at least one tool. Otherwise every
/// required name must appear; order and duplicates do not matter.
pub fn requirements_met(tools_invoked: &[String], required_tools: Option<&[String]>) -> bool {
    match required_tools {
        Some(required) if !required.is_empty() => {
            let invoked: HashSet<&str> = tools_invoked.iter().map(String::as_str).collect();
            required.iter().all(|tool| invoked.contains(tool.as_str()))
        }
        _ => !tools_invoked.is_empty(),
    }
}

fn with_enforcement_reminder(
    query: &str,
    required_tools: Option<&[String]>,
    attempt: u32,
    total: u32,
) -> String {
    let tools = match required_tools {
        Some(tools) if !tools.is_empty() => format!(" Required tool(s): {}.", tools.join(", ")),
        _ => String::new(),
    };
    format!(
        "{query}\n\n[ENFORCEMENT REMINDER - attempt {attempt} of {total}] You MUST call the \
         appropriate tool before answering.{tools} Answers that are not backed by tool data \
         cannot be verified."
    )
}

fn describe_tools(tools: &[String], empty: &str) -> String {
    if tools.is_empty() {
        empty.to_string()
    } else {
        format!("[{}]", tools.join(", "))
    }
}
