// ABOUTME: Declarative agent record: name, model, instructions, tools, and sub-agents.
// ABOUTME: Provides tree lookup, validation, and a serializable summary for display.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tool::{BuiltinTool, Tool, ToolRef};

/// Errors found while validating an agent tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("agent name {0:?} is not a valid identifier")]
    InvalidName(String),

    #[error("agent '{0}' has an empty model identifier")]
    EmptyModel(String),

    #[error("agent '{agent}' declares tool '{tool}' more than once")]
    DuplicateTool { agent: String, tool: String },

    #[error("agent name '{0}' appears more than once in the agent tree")]
    DuplicateAgent(String),

    #[error("agent '{0}' mixes built-in tools with function tools or sub-agents")]
    MixedBuiltinTools(String),
}

/// A named configuration record describing a model, instructions, and the
/// tools and sub-agents available to it. Built once and only read afterwards.
#[derive(Debug, Clone)]
pub struct Agent {
    pub name: String,
    pub model: String,
    pub description: String,
    pub instruction: String,
    pub tools: Vec<ToolRef>,
    pub sub_agents: Vec<Agent>,
}

impl Agent {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            description: String::new(),
            instruction: String::new(),
            tools: Vec::new(),
            sub_agents: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_tool(mut self, tool: impl Into<ToolRef>) -> Self {
        self.tools.push(tool.into());
        self
    }

    pub fn with_sub_agent(mut self, agent: Agent) -> Self {
        self.sub_agents.push(agent);
        self
    }

    /// Check field presence and name uniqueness across the whole tree.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let mut seen = HashSet::new();
        self.validate_into(&mut seen)
    }

    fn validate_into<'a>(&'a self, seen: &mut HashSet<&'a str>) -> Result<(), DefinitionError> {
        if !is_identifier(&self.name) {
            return Err(DefinitionError::InvalidName(self.name.clone()));
        }
        if self.model.trim().is_empty() {
            return Err(DefinitionError::EmptyModel(self.name.clone()));
        }
        if !seen.insert(self.name.as_str()) {
            return Err(DefinitionError::DuplicateAgent(self.name.clone()));
        }

        let mut tool_names = HashSet::new();
        for tool in &self.tools {
            if !tool_names.insert(tool.name()) {
                return Err(DefinitionError::DuplicateTool {
                    agent: self.name.clone(),
                    tool: tool.name().to_string(),
                });
            }
        }

        // Gemini rejects requests combining built-in tools with function calling.
        if self.has_builtin_tools()
            && (self.function_tools().next().is_some() || !self.sub_agents.is_empty())
        {
            return Err(DefinitionError::MixedBuiltinTools(self.name.clone()));
        }

        for sub in &self.sub_agents {
            sub.validate_into(seen)?;
        }
        Ok(())
    }

    /// Depth-first lookup of an agent by name in the tree rooted here.
    pub fn find(&self, name: &str) -> Option<&Agent> {
        if self.name == name {
            return Some(self);
        }
        self.sub_agents.iter().find_map(|sub| sub.find(name))
    }

    /// The agent whose `sub_agents` directly contain `name`.
    pub fn parent_of(&self, name: &str) -> Option<&Agent> {
        if self.sub_agents.iter().any(|sub| sub.name == name) {
            return Some(self);
        }
        self.sub_agents.iter().find_map(|sub| sub.parent_of(name))
    }

    /// The locally executable tool with the given name, if declared.
    pub fn function_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find_map(|tool| match tool {
            ToolRef::Function(f) if f.name() == name => Some(Arc::clone(f)),
            _ => None,
        })
    }

    pub fn function_tools(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter().filter_map(|tool| match tool {
            ToolRef::Function(f) => Some(f),
            ToolRef::Builtin(_) => None,
        })
    }

    pub fn builtin_tools(&self) -> impl Iterator<Item = BuiltinTool> + '_ {
        self.tools.iter().filter_map(|tool| match tool {
            ToolRef::Builtin(b) => Some(*b),
            ToolRef::Function(_) => None,
        })
    }

    pub fn has_builtin_tools(&self) -> bool {
        self.tools.iter().any(ToolRef::is_builtin)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn summary(&self) -> AgentSummary {
        AgentSummary {
            name: self.name.clone(),
            model: self.model.clone(),
            description: self.description.clone(),
            instruction: self.instruction.clone(),
            tools: self.tool_names(),
            sub_agents: self.sub_agents.iter().map(Agent::summary).collect(),
        }
    }
}

/// Serializable view of an agent tree, used for `show` and exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub name: String,
    pub model: String,
    pub description: String,
    pub instruction: String,
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_agents: Vec<AgentSummary>,
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
