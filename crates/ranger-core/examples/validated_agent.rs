//! Validated Agent Example - Tool-invocation enforcement end to end
//!
//! A scripted burn analyst answers three queries:
//! - one where it calls the required tool straight away (PASSED)
//! - one where it only complies after the enforcement reminder (RETRY_SUCCEEDED)
//! - one where it never calls the tool (ESCALATED)
//!
//! Run with: cargo run -p ranger-core --example validated_agent
//! Set RANGER_VALIDATOR_MAX_RETRIES / RANGER_AUDIT_MAX_EVENTS to override defaults.

use std::sync::Arc;

use anyhow::Result;
use ranger_core::{
    create_audit_callbacks, create_validated_agent,
    memory::{FixtureTool, ScriptedAgent, ScriptedTurn},
    AgentRunner, AuditConfig, AuditEventBridge, AuditedToolExecutor, ToolCall, ToolRegistry,
    ValidatorConfig,
};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ranger_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let bridge = Arc::new(AuditEventBridge::try_new(AuditConfig::from_env())?);
    let config = ValidatorConfig::from_env();
    tracing::info!(
        max_retries = config.max_retries,
        max_events = bridge.max_events_per_invocation(),
        "Configuration loaded"
    );

    let registry = ToolRegistry::builder()
        .tool(FixtureTool::new(
            "classify_damage",
            json!({
                "status": "success",
                "confidence": 0.9,
                "data_sources": ["MTBS", "Sentinel-2 dNBR"],
                "reasoning_chain": ["dNBR 0.71 exceeds high-severity threshold 0.66"],
                "severity": "HIGH"
            }),
        ))
        .build();
    let executor = AuditedToolExecutor::new(
        registry,
        create_audit_callbacks("burn_analyst", Arc::clone(&bridge)),
    );

    let agent = Arc::new(ScriptedAgent::new("burn_analyst", executor));
    let classify = || ToolCall::new("call_1", "classify_damage", json!({"sector": "NW-4"}));
    agent
        .set_turns(vec![
            // Query 1: compliant immediately
            ScriptedTurn::with_tools("Sector NW-4 burned at HIGH severity.", vec![classify()]),
            // Query 2: guesses first, complies on retry
            ScriptedTurn::text("It's probably pretty bad."),
            ScriptedTurn::with_tools(
                "Sector NW-4 burned at HIGH severity (dNBR 0.71).",
                vec![classify()],
            ),
            // Query 3: never complies (script runs out, answers without tools)
        ])
        .await;

    let runner: Arc<dyn AgentRunner> = agent.clone();
    let validated = create_validated_agent(
        runner,
        Arc::clone(&bridge),
        Some(vec!["classify_damage".to_string()]),
        config,
    );

    for query in [
        "What is the burn severity in sector NW-4?",
        "How badly did sector NW-4 burn?",
        "Summarize sector NW-4.",
    ] {
        let result = validated.invoke(query, None).await;
        println!("\nQuery:    {query}");
        println!("Outcome:  {} after {} attempt(s)", result.validation_outcome, result.attempts);
        println!("Tools:    {:?}", result.tools_invoked);
        println!("Response: {}", result.response);
        if let Some(reason) = &result.escalation_reason {
            println!("Reason:   {reason}");
        }
        for event in &result.audit_trail {
            println!("  audit: {}", serde_json::to_string(event)?);
        }
    }

    Ok(())
}
