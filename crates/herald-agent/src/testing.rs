// ABOUTME: Test utilities for herald-agent, including a scripted runtime.
// ABOUTME: Used in tests to drive the runner without real API calls.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use herald_core::Agent;

use crate::runtime::{AgentError, AgentRuntime, Content, Delegate, ModelTurn};

/// What the runner asked the runtime for on one generate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub agent: String,
    pub delegates: Vec<String>,
    pub history_len: usize,
}

/// A runtime that replays pre-configured turns in order.
///
/// Once the script is exhausted every call fails with `InvalidResponse`, so a
/// runner that loops longer than expected surfaces as a test failure.
#[derive(Debug, Default)]
pub struct ScriptedRuntime {
    turns: Mutex<VecDeque<ModelTurn>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedRuntime {
    pub fn new(turns: Vec<ModelTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn remaining(&self) -> usize {
        self.turns.lock().map(|t| t.len()).unwrap_or(0)
    }
}

#[async_trait]
impl AgentRuntime for ScriptedRuntime {
    async fn generate(
        &self,
        agent: &Agent,
        delegates: &[Delegate],
        history: &[Content],
    ) -> Result<ModelTurn, AgentError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                agent: agent.name.clone(),
                delegates: delegates.iter().map(|d| d.name.clone()).collect(),
                history_len: history.len(),
            });
        }

        self.turns
            .lock()
            .map_err(|_| AgentError::ProviderError("script lock poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| AgentError::InvalidResponse("script exhausted".to_string()))
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_turns_in_order_then_fails() {
        let runtime = ScriptedRuntime::new(vec![ModelTurn::text("one"), ModelTurn::text("two")]);
        let agent = Agent::new("a", "m");

        let first = runtime.generate(&agent, &[], &[]).await.unwrap();
        let second = runtime.generate(&agent, &[], &[]).await.unwrap();
        assert_eq!(first.joined_text(), "one");
        assert_eq!(second.joined_text(), "two");
        assert_eq!(runtime.remaining(), 0);

        let err = runtime.generate(&agent, &[], &[]).await.unwrap_err();
        assert!(err.to_string().contains("exhausted"));
        assert_eq!(runtime.request_count(), 3);
    }

    #[tokio::test]
    async fn records_request_shape() {
        let runtime = ScriptedRuntime::new(vec![ModelTurn::text("ok")]);
        let agent = Agent::new("manager", "m");
        let targets = vec![Delegate::agent_tool(&Agent::new("news_analyst", "m"))];
        let history = vec![Content::user_text("hi")];

        runtime.generate(&agent, &targets, &history).await.unwrap();

        assert_eq!(
            runtime.requests(),
            vec![RecordedRequest {
                agent: "manager".to_string(),
                delegates: vec!["news_analyst".to_string()],
                history_len: 1,
            }]
        );
    }
}
