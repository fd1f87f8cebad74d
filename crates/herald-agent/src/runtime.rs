// ABOUTME: Defines the AgentRuntime trait that all LLM provider adapters must implement.
// ABOUTME: Also defines the conversation types (Content, Part, ModelTurn) and AgentError.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use herald_core::{Agent, DefinitionError};

/// Name of the synthetic function the model calls to hand the conversation
/// to another agent in the tree.
pub const TRANSFER_TOOL_NAME: &str = "transfer_to_agent";

/// Argument carrying the task text when an agent is called as a tool.
pub const AGENT_TOOL_REQUEST_ARG: &str = "request";

/// Who produced a piece of conversation content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

/// One element of a content block. Serializes to the Gemini part shape,
/// e.g. `{"text": "..."}` or `{"functionCall": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn function_call(name: impl Into<String>, args: Value) -> Self {
        Part::FunctionCall(FunctionCall {
            name: name.into(),
            args,
        })
    }

    pub fn function_response(name: impl Into<String>, response: Value) -> Self {
        Part::FunctionResponse(FunctionResponse {
            name: name.into(),
            response,
        })
    }
}

/// A single conversation turn: one role, one or more parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: Role::Model,
            parts,
        }
    }
}

/// What the model produced for one generate call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelTurn {
    pub parts: Vec<Part>,
    pub finish_reason: Option<String>,
}

impl ModelTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::text(text)],
            finish_reason: Some("STOP".to_string()),
        }
    }

    pub fn calls(calls: Vec<FunctionCall>) -> Self {
        Self {
            parts: calls.into_iter().map(Part::FunctionCall).collect(),
            finish_reason: Some("STOP".to_string()),
        }
    }

    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::FunctionCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    /// All text parts joined in order.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// How the active agent reaches another agent in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegateMode {
    /// Hand the conversation over through `transfer_to_agent`.
    Transfer,
    /// Call the agent like a function; its answer comes back as the function response.
    /// Used for agents with built-in tools, which cannot be combined with function calling.
    AgentTool,
}

/// An agent the active agent may delegate to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegate {
    pub name: String,
    pub description: String,
    pub mode: DelegateMode,
}

impl Delegate {
    pub fn transfer(agent: &Agent) -> Self {
        Self::from_agent(agent, DelegateMode::Transfer)
    }

    pub fn agent_tool(agent: &Agent) -> Self {
        Self::from_agent(agent, DelegateMode::AgentTool)
    }

    fn from_agent(agent: &Agent, mode: DelegateMode) -> Self {
        Self {
            name: agent.name.clone(),
            description: agent.description.clone(),
            mode,
        }
    }
}

/// Errors that can occur during agent execution.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Step limit of {0} model calls exceeded")]
    StepLimitExceeded(usize),

    #[error("Invalid agent definition: {0}")]
    InvalidDefinition(#[from] DefinitionError),
}

/// Trait that all LLM provider adapters must implement. A provider turns an
/// agent definition plus conversation history into one model turn.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn generate(
        &self,
        agent: &Agent,
        delegates: &[Delegate],
        history: &[Content],
    ) -> Result<ModelTurn, AgentError>;

    /// Provider name for logging and display (e.g. "gemini").
    fn provider_name(&self) -> &str;
}
