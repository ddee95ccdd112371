// Audit capture
//
// Events, the per-invocation event bridge, and the tool hooks that feed it.

pub mod bridge;
pub mod callbacks;
pub mod events;

pub use bridge::AuditEventBridge;
pub use callbacks::{create_audit_callbacks, graceful_error_response, AuditCallbacks};
pub use events::{
    AuditEvent, AuditEventType, ErrorEvent, EventEnvelope, InvocationEvent, ResponseEvent,
    DEFAULT_INVOCATION_KEY, TIER3_ENFORCEMENT,
};
