// ABOUTME: Session runner that drives an agent tree: model calls, tool dispatch, delegation.
// ABOUTME: Keeps conversation history and an event log per session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use ulid::Ulid;

use herald_core::{Agent, ToolResult};

use crate::config::DEFAULT_MAX_STEPS;
use crate::runtime::{
    AGENT_TOOL_REQUEST_ARG, AgentError, AgentRuntime, Content, Delegate, DelegateMode,
    FunctionCall, Part, Role, TRANSFER_TOOL_NAME,
};

/// Something that happened while running a session, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    UserMessage { text: String },
    ModelText { agent: String, text: String },
    ToolCall { agent: String, tool: String, args: Value },
    ToolResponse {
        agent: String,
        tool: String,
        response: Value,
        is_error: bool,
    },
    Transfer { from: String, to: String },
}

/// Conversation state for one user interacting with an agent tree.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Ulid,
    pub active_agent: String,
    pub history: Vec<Content>,
    pub events: Vec<RunEvent>,
}

impl Session {
    pub fn new(active_agent: impl Into<String>) -> Self {
        Self {
            id: Ulid::new(),
            active_agent: active_agent.into(),
            history: Vec::new(),
            events: Vec::new(),
        }
    }
}

/// Final answer for one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Agent that produced the answer (may differ from the one that received the message).
    pub agent: String,
    pub text: String,
    /// Number of model calls made.
    pub steps: usize,
}

/// Drives an agent tree against a runtime.
pub struct Runner {
    root: Agent,
    runtime: Arc<dyn AgentRuntime>,
    max_steps: usize,
}

impl Runner {
    /// Create a runner after validating the agent tree.
    pub fn new(root: Agent, runtime: Arc<dyn AgentRuntime>) -> Result<Self, AgentError> {
        root.validate()?;
        Ok(Self {
            root,
            runtime,
            max_steps: DEFAULT_MAX_STEPS,
        })
    }

    /// Cap on model calls per user message. Zero is raised to one.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn root(&self) -> &Agent {
        &self.root
    }

    /// Start a session addressed to the root agent.
    pub fn new_session(&self) -> Session {
        Session::new(self.root.name.clone())
    }

    /// Agents the given agent may delegate to, sub-agents first, then its parent.
    ///
    /// Sub-agents with built-in tools are called as agent tools, every other
    /// relative is a transfer target. An agent with built-in tools gets no
    /// delegates: its requests may not carry function declarations.
    pub fn delegates(&self, agent: &Agent) -> Vec<Delegate> {
        if agent.has_builtin_tools() {
            return Vec::new();
        }

        let mut delegates: Vec<Delegate> = agent
            .sub_agents
            .iter()
            .map(|sub| {
                if sub.has_builtin_tools() {
                    Delegate::agent_tool(sub)
                } else {
                    Delegate::transfer(sub)
                }
            })
            .collect();
        if let Some(parent) = self.root.parent_of(&agent.name) {
            delegates.push(Delegate::transfer(parent));
        }
        delegates
    }

    /// Send a user message and run until an agent answers without calling tools.
    pub async fn run(
        &self,
        session: &mut Session,
        message: &str,
    ) -> Result<RunOutcome, AgentError> {
        tracing::info!(
            session = %session.id,
            agent = %session.active_agent,
            "user message received"
        );
        session.history.push(Content::user_text(message));
        session.events.push(RunEvent::UserMessage {
            text: message.to_string(),
        });

        for step in 1..=self.max_steps {
            let agent = self
                .root
                .find(&session.active_agent)
                .ok_or_else(|| AgentError::UnknownAgent(session.active_agent.clone()))?;
            let delegates = self.delegates(agent);

            tracing::debug!(
                session = %session.id,
                agent = %agent.name,
                model = %agent.model,
                provider = self.runtime.provider_name(),
                step,
                "calling model"
            );
            let turn = self
                .runtime
                .generate(agent, &delegates, &session.history)
                .await?;

            if !turn.parts.is_empty() {
                session.history.push(Content::model(turn.parts.clone()));
            }

            let text = turn.joined_text();
            if !text.is_empty() {
                session.events.push(RunEvent::ModelText {
                    agent: agent.name.clone(),
                    text: text.clone(),
                });
            }

            let calls: Vec<FunctionCall> = turn.function_calls().into_iter().cloned().collect();
            if calls.is_empty() {
                tracing::info!(
                    session = %session.id,
                    agent = %agent.name,
                    steps = step,
                    "agent answered"
                );
                return Ok(RunOutcome {
                    agent: agent.name.clone(),
                    text,
                    steps: step,
                });
            }

            let mut responses = Vec::with_capacity(calls.len());
            let mut transfer_to: Option<String> = None;

            for call in calls {
                session.events.push(RunEvent::ToolCall {
                    agent: agent.name.clone(),
                    tool: call.name.clone(),
                    args: call.args.clone(),
                });

                let result = if call.name == TRANSFER_TOOL_NAME {
                    resolve_transfer(&call, &delegates, &mut transfer_to)
                } else if let Some(sub) = agent_tool_target(agent, &delegates, &call.name) {
                    self.call_agent_tool(sub, &call, &mut session.events).await
                } else {
                    self.execute_tool(agent, &call).await
                };

                session.events.push(RunEvent::ToolResponse {
                    agent: agent.name.clone(),
                    tool: call.name.clone(),
                    response: result.content.clone(),
                    is_error: result.is_error,
                });
                responses.push(Part::function_response(call.name, result.content));
            }

            session.history.push(Content {
                role: Role::User,
                parts: responses,
            });

            if let Some(target) = transfer_to {
                tracing::info!(
                    session = %session.id,
                    from = %agent.name,
                    to = %target,
                    "agent transfer"
                );
                session.events.push(RunEvent::Transfer {
                    from: agent.name.clone(),
                    to: target.clone(),
                });
                session.active_agent = target;
            }
        }

        tracing::warn!(session = %session.id, max_steps = self.max_steps, "step limit exceeded");
        Err(AgentError::StepLimitExceeded(self.max_steps))
    }

    async fn execute_tool(&self, agent: &Agent, call: &FunctionCall) -> ToolResult {
        let Some(tool) = agent.function_tool(&call.name) else {
            tracing::warn!(agent = %agent.name, tool = %call.name, "model called unknown tool");
            return ToolResult::error(format!(
                "unknown tool '{}' for agent '{}'",
                call.name, agent.name
            ));
        };

        tracing::debug!(agent = %agent.name, tool = %call.name, "executing tool");
        match tool.execute(call.args.clone()).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(agent = %agent.name, tool = %call.name, error = %e, "tool failed");
                ToolResult::error(e.to_string())
            }
        }
    }

    /// Run a built-in-tool agent on a fresh one-message history and return its
    /// answer as `{"result": text}`. Such agents declare no functions, so a
    /// single model call completes them; it does not count toward `max_steps`.
    async fn call_agent_tool(
        &self,
        sub: &Agent,
        call: &FunctionCall,
        events: &mut Vec<RunEvent>,
    ) -> ToolResult {
        let Some(request) = call.args.get(AGENT_TOOL_REQUEST_ARG).and_then(|v| v.as_str())
        else {
            return ToolResult::error(format!("missing '{}' parameter", AGENT_TOOL_REQUEST_ARG));
        };

        tracing::debug!(agent = %sub.name, "calling agent tool");
        let history = vec![Content::user_text(request)];
        let turn = match self.runtime.generate(sub, &[], &history).await {
            Ok(turn) => turn,
            Err(e) => {
                tracing::warn!(agent = %sub.name, error = %e, "agent tool failed");
                return ToolResult::error(e.to_string());
            }
        };

        if !turn.function_calls().is_empty() {
            return ToolResult::error(format!(
                "agent '{}' requested function calls it cannot make",
                sub.name
            ));
        }

        let text = turn.joined_text();
        if !text.is_empty() {
            events.push(RunEvent::ModelText {
                agent: sub.name.clone(),
                text: text.clone(),
            });
        }
        ToolResult::json(json!({ "result": text }))
    }
}

/// The sub-agent reached through an agent-tool delegate named `name`.
fn agent_tool_target<'a>(
    agent: &'a Agent,
    delegates: &[Delegate],
    name: &str,
) -> Option<&'a Agent> {
    delegates
        .iter()
        .find(|d| d.mode == DelegateMode::AgentTool && d.name == name)
        .and_then(|_| agent.sub_agents.iter().find(|sub| sub.name == name))
}

/// Validate a transfer call. Only the first valid transfer in a turn takes effect.
fn resolve_transfer(
    call: &FunctionCall,
    delegates: &[Delegate],
    transfer_to: &mut Option<String>,
) -> ToolResult {
    let Some(name) = call.args.get("agent_name").and_then(|v| v.as_str()) else {
        return ToolResult::error("missing 'agent_name' parameter");
    };

    if !delegates
        .iter()
        .any(|d| d.mode == DelegateMode::Transfer && d.name == name)
    {
        return ToolResult::error(format!("cannot transfer to unknown agent '{}'", name));
    }

    if let Some(existing) = transfer_to.as_deref() {
        return ToolResult::error(format!("already transferring to '{}'", existing));
    }

    *transfer_to = Some(name.to_string());
    ToolResult::json(json!({ "transferred_to": name }))
}
