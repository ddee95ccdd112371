// Audit Event Bridge
//
// Buffers audit events per logical invocation so a later reader (the
// validator, a streaming layer) can answer "which tools fired, and what did
// they return, for invocation X" without re-running anything.
//
// Design decisions:
// - One mutex over the whole map; every operation is a small in-memory
//   map/deque manipulation and the lock is never held across an await
// - Per-key depth is capped with FIFO eviction; the number of keys is not
//   capped, so callers clear keys they own or sweep with `evict_idle`
// - Bridges are passed explicitly as `Arc<AuditEventBridge>`; `global()` is
//   only for composition roots that cannot thread a reference through

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::events::{AuditEvent, ErrorEvent, InvocationEvent, ResponseEvent};
use crate::config::AuditConfig;
use crate::error::Result;

static GLOBAL_BRIDGE: OnceLock<Arc<AuditEventBridge>> = OnceLock::new();

/// Events buffered for one correlation key
#[derive(Debug)]
struct InvocationBuffer {
    events: VecDeque<AuditEvent>,
    last_write: Instant,
}

impl InvocationBuffer {
    fn new() -> Self {
        Self {
            events: VecDeque::new(),
            last_write: Instant::now(),
        }
    }
}

/// Thread-safe, keyed audit event buffer with bounded per-key depth
#[derive(Debug)]
pub struct AuditEventBridge {
    buffers: Mutex<HashMap<String, InvocationBuffer>>,
    max_events_per_invocation: usize,
}

impl AuditEventBridge {
    /// Create a bridge
    ///
    /// A cap of zero is raised to one; use [`AuditEventBridge::try_new`] to
    /// reject it instead.
    pub fn new(config: AuditConfig) -> Self {
        let max_events_per_invocation = if config.max_events_per_invocation == 0 {
            warn!("max_events_per_invocation of 0 raised to 1");
            1
        } else {
            config.max_events_per_invocation
        };

        Self {
            buffers: Mutex::new(HashMap::new()),
            max_events_per_invocation,
        }
    }

    /// Create a bridge, rejecting an invalid configuration
    pub fn try_new(config: AuditConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Create a bridge with the default configuration
    pub fn with_defaults() -> Self {
        Self::new(AuditConfig::default())
    }

    /// Process-wide bridge, created on first use from environment config
    pub fn global() -> &'static Arc<AuditEventBridge> {
        GLOBAL_BRIDGE.get_or_init(|| Arc::new(AuditEventBridge::new(AuditConfig::from_env())))
    }

    /// Per-key event cap
    pub fn max_events_per_invocation(&self) -> usize {
        self.max_events_per_invocation
    }

    /// Record a tool invocation event
    pub fn record_invocation(&self, event: InvocationEvent) {
        self.record(AuditEvent::Invocation(event));
    }

    /// Record a tool response event
    pub fn record_response(&self, event: ResponseEvent) {
        self.record(AuditEvent::Response(event));
    }

    /// Record a tool error event
    pub fn record_error(&self, event: ErrorEvent) {
        self.record(AuditEvent::Error(event));
    }

    /// Append an event under its correlation key, evicting the oldest
    /// entries if the key is over its cap
    pub fn record(&self, event: AuditEvent) {
        let key = event.correlation_key().to_string();
        let event_type = event.event_type();

        let mut buffers = self.buffers.lock();
        let buffer = buffers
            .entry(key.clone())
            .or_insert_with(InvocationBuffer::new);
        buffer.events.push_back(event);
        buffer.last_write = Instant::now();

        let mut evicted = 0usize;
        while buffer.events.len() > self.max_events_per_invocation {
            buffer.events.pop_front();
            evicted += 1;
        }
        let depth = buffer.events.len();
        drop(buffers);

        debug!(
            invocation_id = %key,
            event_type = ?event_type,
            depth,
            evicted,
            "Audit event recorded"
        );
    }

    /// Copy of the events buffered for `key`, oldest first
    pub fn get_audit_trail(&self, key: &str) -> Vec<AuditEvent> {
        self.buffers
            .lock()
            .get(key)
            .map(|buffer| buffer.events.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Most recent response event for `key`
    pub fn get_latest_response(&self, key: &str) -> Option<ResponseEvent> {
        self.get_audit_trail(key)
            .into_iter()
            .rev()
            .find_map(|event| match event {
                AuditEvent::Response(response) => Some(response),
                _ => None,
            })
    }

    /// Drop every event for `key`; unknown keys are ignored
    pub fn clear_invocation(&self, key: &str) {
        if self.buffers.lock().remove(key).is_some() {
            debug!(invocation_id = %key, "Audit trail cleared");
        }
    }

    /// Drop every buffered event for every key
    pub fn clear_all(&self) {
        self.buffers.lock().clear();
    }

    /// Number of live correlation keys
    pub fn invocation_count(&self) -> usize {
        self.buffers.lock().len()
    }

    /// Remove keys that have not been written to for longer than `max_idle`
    ///
    /// Returns the number of keys removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut buffers = self.buffers.lock();
        let before = buffers.len();
        buffers.retain(|_, buffer| now.duration_since(buffer.last_write) <= max_idle);
        let removed = before - buffers.len();
        drop(buffers);

        if removed > 0 {
            debug!(removed, max_idle_ms = max_idle.as_millis() as u64, "Idle audit trails evicted");
        }
        removed
    }
}

impl Default for AuditEventBridge {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::events::DEFAULT_INVOCATION_KEY;
    use serde_json::json;

    fn invocation(key: &str, tool: &str) -> InvocationEvent {
        InvocationEvent::new("burn_analyst", tool, Some(key.to_string()), json!({}))
    }

    fn bridge_with_cap(cap: usize) -> AuditEventBridge {
        AuditEventBridge::new(AuditConfig::default().with_max_events_per_invocation(cap))
    }

    #[test]
    fn test_end_to_end_record_and_clear() {
        let bridge = AuditEventBridge::with_defaults();

        bridge.record_invocation(invocation("X", "classify_damage"));
        bridge.record_response(
            ResponseEvent::new("burn_analyst", "classify_damage", Some("X".to_string()))
                .with_confidence(0.90)
                .with_data_sources(vec!["field assessment".to_string()]),
        );

        let trail = bridge.get_audit_trail("X");
        assert_eq!(trail.len(), 2);
        assert!(trail[0].is_invocation());
        assert_eq!(trail[0].tool(), "classify_damage");
        assert!(trail[1].as_response().is_some());

        let latest = bridge.get_latest_response("X").unwrap();
        assert_eq!(latest.confidence, 0.90);
        assert_eq!(latest.data_sources, vec!["field assessment"]);

        bridge.clear_invocation("X");
        assert!(bridge.get_audit_trail("X").is_empty());
        assert_eq!(bridge.invocation_count(), 0);
    }

    #[test]
    fn test_fifo_cap_keeps_last_events_in_order() {
        let bridge = bridge_with_cap(5);

        for i in 0..12 {
            bridge.record_invocation(invocation("K", &format!("tool_{i}")));
        }

        let trail = bridge.get_audit_trail("K");
        let tools: Vec<&str> = trail.iter().map(|e| e.tool()).collect();
        assert_eq!(
            tools,
            vec!["tool_7", "tool_8", "tool_9", "tool_10", "tool_11"]
        );
    }

    #[test]
    fn test_cap_of_one() {
        let bridge = bridge_with_cap(1);
        bridge.record_invocation(invocation("K", "first"));
        bridge.record_invocation(invocation("K", "second"));

        let trail = bridge.get_audit_trail("K");
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].tool(), "second");
    }

    #[test]
    fn test_zero_cap_is_raised_or_rejected() {
        let config = AuditConfig::default().with_max_events_per_invocation(0);
        assert!(AuditEventBridge::try_new(config.clone()).is_err());
        assert_eq!(AuditEventBridge::new(config).max_events_per_invocation(), 1);
    }

    #[test]
    fn test_trail_is_a_copy() {
        let bridge = AuditEventBridge::with_defaults();
        bridge.record_invocation(invocation("K", "classify_damage"));

        let mut trail = bridge.get_audit_trail("K");
        trail.clear();
        trail.push(invocation("K", "injected").into());

        let fresh = bridge.get_audit_trail("K");
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].tool(), "classify_damage");
    }

    #[test]
    fn test_unknown_key_reads_are_empty() {
        let bridge = AuditEventBridge::with_defaults();
        assert!(bridge.get_audit_trail("missing").is_empty());
        assert!(bridge.get_latest_response("missing").is_none());
    }

    #[test]
    fn test_latest_response_ignores_other_event_types() {
        let bridge = AuditEventBridge::with_defaults();
        bridge.record_response(
            ResponseEvent::new("a", "first", Some("K".to_string())).with_confidence(0.4),
        );
        bridge.record_response(
            ResponseEvent::new("a", "second", Some("K".to_string())).with_confidence(0.8),
        );
        bridge.record_invocation(invocation("K", "third"));
        bridge.record_error(ErrorEvent::new(
            "a",
            "third",
            Some("K".to_string()),
            json!({}),
            "ToolError",
            "boom",
        ));

        let latest = bridge.get_latest_response("K").unwrap();
        assert_eq!(latest.envelope.tool, "second");
        assert_eq!(latest.confidence, 0.8);
    }

    #[test]
    fn test_missing_invocation_id_uses_default_key() {
        let bridge = AuditEventBridge::with_defaults();
        bridge.record_invocation(InvocationEvent::new("a", "t", None, json!({})));

        assert_eq!(bridge.get_audit_trail(DEFAULT_INVOCATION_KEY).len(), 1);
    }

    #[test]
    fn test_clear_unknown_key_is_noop() {
        let bridge = AuditEventBridge::with_defaults();
        bridge.record_invocation(invocation("K", "t"));

        bridge.clear_invocation("never-written");
        bridge.clear_invocation("never-written");
        assert_eq!(bridge.invocation_count(), 1);
    }

    #[test]
    fn test_clear_all() {
        let bridge = AuditEventBridge::with_defaults();
        bridge.record_invocation(invocation("A", "t"));
        bridge.record_invocation(invocation("B", "t"));
        assert_eq!(bridge.invocation_count(), 2);

        bridge.clear_all();
        assert_eq!(bridge.invocation_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_only_removes_stale_keys() {
        let bridge = AuditEventBridge::with_defaults();
        bridge.record_invocation(invocation("stale", "t"));
        tokio::time::advance(Duration::from_secs(120)).await;
        bridge.record_invocation(invocation("fresh", "t"));
        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(bridge.evict_idle(Duration::from_secs(300)), 0);
        assert_eq!(bridge.evict_idle(Duration::from_secs(60)), 1);
        assert!(bridge.get_audit_trail("stale").is_empty());
        assert_eq!(bridge.get_audit_trail("fresh").len(), 1);
    }

    #[test]
    fn test_concurrent_writers_distinct_keys() {
        let bridge = Arc::new(bridge_with_cap(50));
        let threads = 8;
        let events_per_thread = 80;

        std::thread::scope(|scope| {
            for t in 0..threads {
                let bridge = Arc::clone(&bridge);
                scope.spawn(move || {
                    let key = format!("session-{t}");
                    for i in 0..events_per_thread {
                        bridge.record_invocation(invocation(&key, &format!("tool_{i}")));
                    }
                });
            }
        });

        assert_eq!(bridge.invocation_count(), threads);
        for t in 0..threads {
            let key = format!("session-{t}");
            let trail = bridge.get_audit_trail(&key);
            assert_eq!(trail.len(), 50);
            for (offset, event) in trail.iter().enumerate() {
                assert_eq!(event.correlation_key(), key);
                assert_eq!(event.tool(), format!("tool_{}", 30 + offset));
            }
        }
    }

    #[test]
    fn test_global_bridge_is_shared() {
        let first = AuditEventBridge::global();
        let second = AuditEventBridge::global();
        assert!(Arc::ptr_eq(first, second));
    }
}
