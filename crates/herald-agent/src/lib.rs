// ABOUTME: Agent runtime for herald: provider adapters, configuration, and the session runner.
// ABOUTME: Turns declarative herald-core agents into live model conversations with tool dispatch.

pub mod config;
pub mod providers;
pub mod runner;
pub mod runtime;
pub mod testing;

pub use config::{ConfigError, HeraldConfig};
pub use providers::create_runtime;
pub use runner::{RunEvent, RunOutcome, Runner, Session};
pub use runtime::{
    AgentError, AgentRuntime, Content, Delegate, DelegateMode, ModelTurn, Part,
};
