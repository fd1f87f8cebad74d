// ABOUTME: The built-in agent catalog: news_analyst, tool_agent, and the manager that delegates to them.
// ABOUTME: Each constructor returns a fresh declarative Agent record ready for a runner.

use std::sync::Arc;

use crate::agent::Agent;
use crate::tool::BuiltinTool;
use crate::tools::CurrentTimeTool;

/// Model used by every catalog agent.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const NEWS_ANALYST_INSTRUCTION: &str = "You're a helpful assistant that can analyze news articles \
    and provide a summary of the news.\n\
    When asked about news, you should use the google_search tool to search for the news.\n\n\
    If the request refers to a relative time, use the current date given in the request \
    (resolved by the agent that called you with the current_time tool) in the search query.";

const TOOL_AGENT_INSTRUCTION: &str = "You are a helpful assistant that can use the following tools:\n\
    - current_time";

const MANAGER_INSTRUCTION: &str = "You are a manager agent responsible for overseeing the work \
    of other agents. Delegate each task to the most appropriate agent.\n\n\
    You can call the following agent as a tool, passing the task in its request argument:\n\
    - news_analyst\n\n\
    You also have access to the following tool:\n\
    - current_time\n\n\
    When the user asks about news relative to a date (today, yesterday, last week), call \
    current_time first and include the resolved date in your request to news_analyst. \
    Relay the news_analyst answer to the user.";

/// Agent that answers news questions through the hosted search tool.
pub fn news_analyst() -> Agent {
    Agent::new("news_analyst", DEFAULT_MODEL)
        .with_description("An agent that searches for and summarizes news.")
        .with_instruction(NEWS_ANALYST_INSTRUCTION)
        .with_tool(BuiltinTool::GoogleSearch)
}

/// Agent exposing the local clock.
pub fn tool_agent() -> Agent {
    Agent::new("tool_agent", DEFAULT_MODEL)
        .with_description("Tool agent")
        .with_instruction(TOOL_AGENT_INSTRUCTION)
        .with_tool(Arc::new(CurrentTimeTool))
}

/// Coordinator that owns the clock and calls `news_analyst` as an agent tool.
pub fn manager() -> Agent {
    Agent::new("manager", DEFAULT_MODEL)
        .with_description("Manager agent")
        .with_instruction(MANAGER_INSTRUCTION)
        .with_tool(Arc::new(CurrentTimeTool))
        .with_sub_agent(news_analyst())
}

/// Root agents in catalog order. Sub-agents are reachable through their parents.
pub fn all_agents() -> Vec<Agent> {
    vec![tool_agent(), manager()]
}

/// Every agent name in the catalog, roots and nested, depth first.
pub fn agent_names() -> Vec<String> {
    fn walk(agent: &Agent, out: &mut Vec<String>) {
        out.push(agent.name.clone());
        for sub in &agent.sub_agents {
            walk(sub, out);
        }
    }

    let mut names = Vec::new();
    for agent in all_agents() {
        walk(&agent, &mut names);
    }
    names
}

/// Look up a catalog agent by name. Nested agents are returned as standalone
/// roots with their own sub-tree.
pub fn find_agent(name: &str) -> Option<Agent> {
    all_agents()
        .iter()
        .find_map(|root| root.find(name).cloned())
}
