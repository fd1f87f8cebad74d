// ABOUTME: Tool abstraction shared by agent definitions and the runner.
// ABOUTME: Distinguishes locally executed function tools from provider-side built-in tools.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Output of a local tool call, forwarded to the model as a function response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Value,
    pub is_error: bool,
}

impl ToolResult {
    /// Successful result. Non-object values are wrapped as `{"result": value}`
    /// since function responses must be JSON objects.
    pub fn json(value: Value) -> Self {
        let content = match value {
            Value::Object(_) => value,
            other => json!({ "result": other }),
        };
        Self {
            content,
            is_error: false,
        }
    }

    /// Failed result carrying a message for the model.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: json!({ "error": message.into() }),
            is_error: true,
        }
    }
}

/// A capability an agent can invoke that runs inside this process.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Function name exposed to the model. Must be unique per agent.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the call arguments. Always an object schema.
    fn schema(&self) -> Value;

    async fn execute(&self, params: Value) -> Result<ToolResult, anyhow::Error>;
}

/// Tools executed by the model provider rather than locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinTool {
    GoogleSearch,
}

impl BuiltinTool {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinTool::GoogleSearch => "google_search",
        }
    }
}

impl fmt::Display for BuiltinTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An entry in an agent's tool list.
#[derive(Clone)]
pub enum ToolRef {
    Function(Arc<dyn Tool>),
    Builtin(BuiltinTool),
}

impl ToolRef {
    pub fn name(&self) -> &str {
        match self {
            ToolRef::Function(tool) => tool.name(),
            ToolRef::Builtin(builtin) => builtin.name(),
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, ToolRef::Builtin(_))
    }
}

impl fmt::Debug for ToolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolRef::Function(tool) => f.debug_tuple("Function").field(&tool.name()).finish(),
            ToolRef::Builtin(builtin) => f.debug_tuple("Builtin").field(builtin).finish(),
        }
    }
}

impl From<BuiltinTool> for ToolRef {
    fn from(builtin: BuiltinTool) -> Self {
        ToolRef::Builtin(builtin)
    }
}

impl<T: Tool + 'static> From<Arc<T>> for ToolRef {
    fn from(tool: Arc<T>) -> Self {
        ToolRef::Function(tool)
    }
}
