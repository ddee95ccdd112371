// Audit event records
//
// Three immutable event kinds share one envelope. Events are serialized with
// an `event_type` tag so a trail reads as a flat list of mappings:
//
// {"event_type": "invocation", "timestamp": "...", "agent": "...", "tool": "...", ...}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key used when an event carries no invocation ID
pub const DEFAULT_INVOCATION_KEY: &str = "default";

/// Enforcement tag recorded on invocations captured by the audit hooks
pub const TIER3_ENFORCEMENT: &str = "tier3_audit";

/// Discriminant of an audit event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Invocation,
    Response,
    Error,
}

/// Fields common to every audit event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub tool: String,
    pub invocation_id: Option<String>,
}

impl EventEnvelope {
    fn now(
        agent: impl Into<String>,
        tool: impl Into<String>,
        invocation_id: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            agent: agent.into(),
            tool: tool.into(),
            invocation_id,
        }
    }
}

/// A tool was about to be called
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvocationEvent {
    #[serde(flatten)]
    pub envelope: EventEnvelope,
    pub parameters: Map<String, Value>,
    pub session_id: Option<String>,
    pub enforcement: String,
}

impl InvocationEvent {
    /// Create an invocation event timestamped now
    ///
    /// Non-object parameters are kept under a single `"value"` key so the
    /// recorded parameters are always a string-keyed mapping.
    pub fn new(
        agent: impl Into<String>,
        tool: impl Into<String>,
        invocation_id: Option<String>,
        parameters: Value,
    ) -> Self {
        Self {
            envelope: EventEnvelope::now(agent, tool, invocation_id),
            parameters: into_parameter_map(parameters),
            session_id: None,
            enforcement: TIER3_ENFORCEMENT.to_string(),
        }
    }

    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }
}

/// A tool returned a response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseEvent {
    #[serde(flatten)]
    pub envelope: EventEnvelope,
    pub status: String,
    pub confidence: f64,
    pub data_sources: Vec<String>,
    pub reasoning_chain: Vec<String>,
    pub execution_time_ms: Option<u64>,
}

impl ResponseEvent {
    /// Create a successful response event with empty proof metadata
    pub fn new(
        agent: impl Into<String>,
        tool: impl Into<String>,
        invocation_id: Option<String>,
    ) -> Self {
        Self {
            envelope: EventEnvelope::now(agent, tool, invocation_id),
            status: "success".to_string(),
            confidence: 0.0,
            data_sources: Vec::new(),
            reasoning_chain: Vec::new(),
            execution_time_ms: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_data_sources(mut self, data_sources: Vec<String>) -> Self {
        self.data_sources = data_sources;
        self
    }

    pub fn with_reasoning_chain(mut self, reasoning_chain: Vec<String>) -> Self {
        self.reasoning_chain = reasoning_chain;
        self
    }

    pub fn with_execution_time_ms(mut self, execution_time_ms: Option<u64>) -> Self {
        self.execution_time_ms = execution_time_ms;
        self
    }
}

/// A tool call failed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEvent {
    #[serde(flatten)]
    pub envelope: EventEnvelope,
    pub parameters: Map<String, Value>,
    pub error_type: String,
    pub error_message: String,
}

impl ErrorEvent {
    pub fn new(
        agent: impl Into<String>,
        tool: impl Into<String>,
        invocation_id: Option<String>,
        parameters: Value,
        error_type: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            envelope: EventEnvelope::now(agent, tool, invocation_id),
            parameters: into_parameter_map(parameters),
            error_type: error_type.into(),
            error_message: error_message.into(),
        }
    }
}

/// An audit event of any kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    Invocation(InvocationEvent),
    Response(ResponseEvent),
    Error(ErrorEvent),
}

impl AuditEvent {
    pub fn event_type(&self) -> AuditEventType {
        match self {
            AuditEvent::Invocation(_) => AuditEventType::Invocation,
            AuditEvent::Response(_) => AuditEventType::Response,
            AuditEvent::Error(_) => AuditEventType::Error,
        }
    }

    pub fn envelope(&self) -> &EventEnvelope {
        match self {
            AuditEvent::Invocation(e) => &e.envelope,
            AuditEvent::Response(e) => &e.envelope,
            AuditEvent::Error(e) => &e.envelope,
        }
    }

    pub fn tool(&self) -> &str {
        &self.envelope().tool
    }

    /// Key the event is buffered under
    pub fn correlation_key(&self) -> &str {
        self.envelope()
            .invocation_id
            .as_deref()
            .unwrap_or(DEFAULT_INVOCATION_KEY)
    }

    pub fn is_invocation(&self) -> bool {
        matches!(self, AuditEvent::Invocation(_))
    }

    pub fn as_response(&self) -> Option<&ResponseEvent> {
        match self {
            AuditEvent::Response(e) => Some(e),
            _ => None,
        }
    }

    /// Serialized mapping form of the event
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<InvocationEvent> for AuditEvent {
    fn from(event: InvocationEvent) -> Self {
        AuditEvent::Invocation(event)
    }
}

impl From<ResponseEvent> for AuditEvent {
    fn from(event: ResponseEvent) -> Self {
        AuditEvent::Response(event)
    }
}

impl From<ErrorEvent> for AuditEvent {
    fn from(event: ErrorEvent) -> Self {
        AuditEvent::Error(event)
    }
}

fn into_parameter_map(parameters: Value) -> Map<String, Value> {
    match parameters {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}
