// ABOUTME: Core types for herald: declarative agent records, tools, and the agent catalog.
// ABOUTME: Contains no I/O beyond the local clock; model access lives in herald-agent.

pub mod agent;
pub mod catalog;
pub mod tool;
pub mod tools;

pub use agent::{Agent, AgentSummary, DefinitionError};
pub use catalog::{DEFAULT_MODEL, agent_names, all_agents, find_agent};
pub use tool::{BuiltinTool, Tool, ToolRef, ToolResult};
