// ABOUTME: Google Gemini API adapter implementing the AgentRuntime trait.
// ABOUTME: Translates an Agent and its history into generateContent calls with function and built-in tools.

use async_trait::async_trait;
use serde_json::{Value, json};

use herald_core::{Agent, BuiltinTool};

use crate::runtime::{
    AGENT_TOOL_REQUEST_ARG, AgentError, AgentRuntime, Content, Delegate, DelegateMode, ModelTurn,
    Part, TRANSFER_TOOL_NAME,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const MAX_TOKENS: u32 = 4096;

/// Google Gemini runtime adapter. Calls the generateContent API with the
/// agent's tools and maps candidate parts back to a ModelTurn.
pub struct GeminiRuntime {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiRuntime {
    /// Create a new GeminiRuntime reading configuration from environment variables.
    /// Required: `GEMINI_API_KEY`
    /// Optional: `GEMINI_BASE_URL` (defaults to https://generativelanguage.googleapis.com)
    pub fn from_env() -> Result<Self, AgentError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AgentError::ProviderError("GEMINI_API_KEY not set".to_string()))?;

        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self::new(api_key, base_url))
    }

    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// generateContent URL for a model. The API key travels in a header, never the URL.
    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    /// Build the JSON request body for the Gemini generateContent API.
    pub fn build_request_body(
        &self,
        agent: &Agent,
        delegates: &[Delegate],
        history: &[Content],
    ) -> Value {
        let system_prompt = system_prompt(agent, delegates);
        let contents = coalesce_contents(history);

        let mut body = json!({
            "system_instruction": {
                "parts": [{"text": system_prompt}]
            },
            "contents": contents,
            "generation_config": {
                "max_output_tokens": MAX_TOKENS
            }
        });

        let tools = build_gemini_tools(agent, delegates);
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools);
        }

        body
    }

    /// Parse a Gemini generateContent response into a ModelTurn.
    pub fn parse_response(response_body: &Value) -> Result<ModelTurn, AgentError> {
        let candidates = match response_body.get("candidates").and_then(|c| c.as_array()) {
            Some(candidates) => candidates,
            None => {
                if let Some(reason) = response_body
                    .get("promptFeedback")
                    .and_then(|f| f.get("blockReason"))
                    .and_then(|r| r.as_str())
                {
                    return Err(AgentError::ProviderError(format!(
                        "prompt blocked: {}",
                        reason
                    )));
                }
                return Err(AgentError::InvalidResponse(
                    "missing candidates array in response".to_string(),
                ));
            }
        };

        let candidate = candidates
            .first()
            .ok_or_else(|| AgentError::InvalidResponse("empty candidates array".to_string()))?;

        let finish_reason = candidate
            .get("finishReason")
            .and_then(|f| f.as_str())
            .map(String::from);

        if let Some(chunks) = candidate
            .get("groundingMetadata")
            .and_then(|g| g.get("groundingChunks"))
            .and_then(|c| c.as_array())
        {
            tracing::debug!(sources = chunks.len(), "response grounded by search");
        }

        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array());

        let parts = match parts {
            Some(parts) => parts
                .iter()
                .map(parse_gemini_part)
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .flatten()
                .collect::<Vec<_>>(),
            None => Vec::new(),
        };

        if parts.is_empty() && finish_reason.as_deref() != Some("STOP") {
            return Err(AgentError::InvalidResponse(format!(
                "no actionable content in response (finish reason: {})",
                finish_reason.as_deref().unwrap_or("none")
            )));
        }

        Ok(ModelTurn {
            parts,
            finish_reason,
        })
    }
}

/// System instruction for an agent: identity, its own instruction, and the
/// agents it may delegate to.
fn system_prompt(agent: &Agent, delegates: &[Delegate]) -> String {
    let mut prompt = format!("You are the agent named '{}'.", agent.name);
    if !agent.description.is_empty() {
        prompt.push_str(&format!(" Your description: {}", agent.description));
    }
    if !agent.instruction.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(agent.instruction.trim());
    }

    let transfers: Vec<&Delegate> = delegates_with(delegates, DelegateMode::Transfer).collect();
    if !transfers.is_empty() {
        prompt.push_str(&format!(
            "\n\nYou can hand the conversation to another agent by calling {}. Available agents:",
            TRANSFER_TOOL_NAME
        ));
        for target in transfers {
            prompt.push_str(&format!("\n- {}: {}", target.name, target.description));
        }
    }

    let agent_tools: Vec<&Delegate> = delegates_with(delegates, DelegateMode::AgentTool).collect();
    if !agent_tools.is_empty() {
        prompt.push_str(&format!(
            "\n\nYou can ask these agents for help by calling them as functions with a '{}' \
             argument; their answer is returned to you:",
            AGENT_TOOL_REQUEST_ARG
        ));
        for target in agent_tools {
            prompt.push_str(&format!("\n- {}: {}", target.name, target.description));
        }
    }
    prompt
}

fn delegates_with(delegates: &[Delegate], mode: DelegateMode) -> impl Iterator<Item = &Delegate> {
    delegates.iter().filter(move |d| d.mode == mode)
}

/// Convert the agent's tools to Gemini's tools array. Built-in tools cannot
/// be combined with function calling, so an agent with built-ins gets only
/// those; otherwise one entry holds every function declaration.
fn build_gemini_tools(agent: &Agent, delegates: &[Delegate]) -> Vec<Value> {
    if agent.has_builtin_tools() {
        if agent.function_tools().next().is_some() || !delegates.is_empty() {
            tracing::warn!(
                agent = %agent.name,
                "dropping function declarations for agent with built-in tools"
            );
        }
        return agent
            .builtin_tools()
            .map(|builtin| match builtin {
                BuiltinTool::GoogleSearch => json!({ "google_search": {} }),
            })
            .collect();
    }

    let mut declarations: Vec<Value> = agent
        .function_tools()
        .map(|tool| {
            let mut decl = json!({
                "name": tool.name(),
                "description": tool.description(),
            });
            let schema = tool.schema();
            let has_properties = schema
                .get("properties")
                .and_then(|p| p.as_object())
                .is_some_and(|p| !p.is_empty());
            // Gemini rejects object schemas with no properties.
            if has_properties {
                decl["parameters"] = schema;
            }
            decl
        })
        .collect();

    declarations.extend(
        delegates_with(delegates, DelegateMode::AgentTool).map(agent_tool_declaration),
    );

    let transfers: Vec<&Delegate> = delegates_with(delegates, DelegateMode::Transfer).collect();
    if !transfers.is_empty() {
        declarations.push(transfer_declaration(&transfers));
    }

    if declarations.is_empty() {
        return Vec::new();
    }
    vec![json!({ "function_declarations": declarations })]
}

fn agent_tool_declaration(delegate: &Delegate) -> Value {
    json!({
        "name": delegate.name,
        "description": delegate.description,
        "parameters": {
            "type": "object",
            "properties": {
                "request": {
                    "type": "string",
                    "description": "The task for the agent, with any context it needs."
                }
            },
            "required": ["request"]
        }
    })
}

fn transfer_declaration(transfers: &[&Delegate]) -> Value {
    let names: Vec<&str> = transfers.iter().map(|t| t.name.as_str()).collect();
    json!({
        "name": TRANSFER_TOOL_NAME,
        "description": "Transfer the conversation to another agent that is better suited to answer the user.",
        "parameters": {
            "type": "object",
            "properties": {
                "agent_name": {
                    "type": "string",
                    "enum": names,
                    "description": "Name of the agent to transfer to."
                }
            },
            "required": ["agent_name"]
        }
    })
}

/// Parse one Gemini part. Returns None for parts that carry nothing the
/// runner acts on (thoughts, empty text, unrecognized kinds).
fn parse_gemini_part(part: &Value) -> Result<Option<Part>, AgentError> {
    if let Some(function_call) = part.get("functionCall") {
        let name = function_call
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| AgentError::InvalidResponse("functionCall missing name".to_string()))?;
        let args = function_call.get("args").cloned().unwrap_or(json!({}));
        return Ok(Some(Part::function_call(name, args)));
    }

    if part.get("thought").and_then(|t| t.as_bool()) == Some(true) {
        return Ok(None);
    }

    if let Some(text) = part.get("text").and_then(|t| t.as_str())
        && !text.is_empty()
    {
        return Ok(Some(Part::text(text)));
    }

    Ok(None)
}

/// Coalesce consecutive contents with the same role (Gemini requires alternating turns).
fn coalesce_contents(history: &[Content]) -> Vec<Content> {
    let mut result: Vec<Content> = Vec::new();

    for content in history {
        if let Some(last) = result.last_mut()
            && last.role == content.role
        {
            last.parts.extend(content.parts.iter().cloned());
            continue;
        }
        result.push(content.clone());
    }

    result
}

#[async_trait]
impl AgentRuntime for GeminiRuntime {
    async fn generate(
        &self,
        agent: &Agent,
        delegates: &[Delegate],
        history: &[Content],
    ) -> Result<ModelTurn, AgentError> {
        let body = self.build_request_body(agent, delegates, history);
        let url = self.endpoint(&agent.model);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AgentError::ProviderError(format!("HTTP request failed: {}", e.without_url()))
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AgentError::RateLimited);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AgentError::ProviderError(
                "Unauthorized: check GEMINI_API_KEY".to_string(),
            ));
        }

        if status.is_server_error() {
            return Err(AgentError::ProviderError(format!("Server error: {}", status)));
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(AgentError::ProviderError(format!(
                "API error {}: {}",
                status, error_body
            )));
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| {
                AgentError::InvalidResponse(format!("failed to parse JSON: {}", e.without_url()))
            })?;

        Self::parse_response(&response_body)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::catalog::{manager, news_analyst, tool_agent};

    fn runtime() -> GeminiRuntime {
        GeminiRuntime::new(
            "test-key".to_string(),
            "https://generativelanguage.googleapis.com/".to_string(),
        )
    }

    #[test]
    fn gemini_runtime_creation() {
        let runtime = runtime();
        assert_eq!(runtime.provider_name(), "gemini");
        assert_eq!(runtime.api_key, "test-key");
        assert_eq!(runtime.base_url, "https://generativelanguage.googleapis.com");
    }

    #[test]
    fn builds_request_with_function_declarations() {
        let agent = tool_agent();
        let history = vec![Content::user_text("What time is it?")];
        let body = runtime().build_request_body(&agent, &[], &history);

        let sys_text = body["system_instruction"]["parts"][0]["text"]
            .as_str()
            .unwrap();
        assert!(sys_text.contains("tool_agent"));
        assert!(sys_text.contains("current_time"));

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"][0]["text"], "What time is it?");

        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        let declarations = tools[0]["function_declarations"].as_array().unwrap();
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0]["name"], "current_time");
        assert!(
            declarations[0].get("parameters").is_none(),
            "zero-argument tools should omit parameters"
        );

        assert_eq!(
            body["generation_config"]["max_output_tokens"].as_u64(),
            Some(4096)
        );
    }

    #[test]
    fn builds_request_with_builtin_search() {
        let agent = news_analyst();
        let body = runtime().build_request_body(&agent, &[], &[Content::user_text("news?")]);

        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0], json!({"google_search": {}}));
    }

    #[test]
    fn builds_agent_tool_declaration_for_builtin_sub_agent() {
        let agent = manager();
        let delegates = vec![Delegate::agent_tool(&agent.sub_agents[0])];
        let body = runtime().build_request_body(&agent, &delegates, &[Content::user_text("hi")]);

        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1, "search must not ride along with the manager");
        let declarations = tools[0]["function_declarations"].as_array().unwrap();
        let names: Vec<&str> = declarations
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["current_time", "news_analyst"]);
        assert_eq!(
            declarations[1]["parameters"]["required"],
            json!([AGENT_TOOL_REQUEST_ARG])
        );
        assert!(
            declarations[1]["parameters"]["properties"]
                .get(AGENT_TOOL_REQUEST_ARG)
                .is_some()
        );

        let sys_text = body["system_instruction"]["parts"][0]["text"]
            .as_str()
            .unwrap();
        assert!(sys_text.contains("- news_analyst:"));
        assert!(!sys_text.contains(TRANSFER_TOOL_NAME));
    }

    #[test]
    fn builds_transfer_declaration_for_targets() {
        let helper = Agent::new("helper", "gemini-2.0-flash").with_description("Helps out");
        let agent = tool_agent().with_sub_agent(helper.clone());
        let delegates = vec![Delegate::transfer(&helper)];
        let body = runtime().build_request_body(&agent, &delegates, &[Content::user_text("hi")]);

        let declarations = body["tools"][0]["function_declarations"].as_array().unwrap();
        let names: Vec<&str> = declarations
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["current_time", "transfer_to_agent"]);
        assert_eq!(
            declarations[1]["parameters"]["properties"]["agent_name"]["enum"],
            json!(["helper"])
        );

        let sys_text = body["system_instruction"]["parts"][0]["text"]
            .as_str()
            .unwrap();
        assert!(sys_text.contains("- helper: Helps out"));
    }

    #[test]
    fn builtin_agent_never_gets_function_declarations() {
        let parent = manager();
        let agent = news_analyst();
        let delegates = vec![Delegate::transfer(&parent)];
        let body = runtime().build_request_body(&agent, &delegates, &[Content::user_text("news")]);

        assert_eq!(body["tools"], json!([{"google_search": {}}]));
    }

    #[test]
    fn no_catalog_request_mixes_search_and_function_calling() {
        use crate::runner::Runner;
        use crate::testing::ScriptedRuntime;
        use std::sync::Arc;

        fn walk<'a>(agent: &'a Agent, out: &mut Vec<&'a Agent>) {
            out.push(agent);
            for sub in &agent.sub_agents {
                walk(sub, out);
            }
        }

        for root in herald_core::all_agents() {
            let runner = Runner::new(root, Arc::new(ScriptedRuntime::new(vec![]))).unwrap();
            let mut agents = Vec::new();
            walk(runner.root(), &mut agents);

            for agent in agents {
                let delegates = runner.delegates(agent);
                let body =
                    runtime().build_request_body(agent, &delegates, &[Content::user_text("hi")]);
                let tools = body
                    .get("tools")
                    .and_then(|t| t.as_array())
                    .cloned()
                    .unwrap_or_default();
                let has_search = tools.iter().any(|t| t.get("google_search").is_some());
                let has_functions = tools.iter().any(|t| t.get("function_declarations").is_some());
                assert!(
                    !(has_search && has_functions),
                    "request for '{}' mixes google_search with function declarations: {}",
                    agent.name,
                    body["tools"]
                );
            }
        }
    }

    #[test]
    fn endpoint_does_not_carry_api_key() {
        let url = runtime().endpoint("gemini-2.0-flash");
        assert_eq!(
            url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert!(!url.contains("test-key"));
    }

    #[tokio::test]
    async fn connection_error_does_not_leak_api_key() {
        let runtime = GeminiRuntime::new("SECRET123".to_string(), "http://127.0.0.1:1".to_string());
        let agent = tool_agent();

        let err = runtime
            .generate(&agent, &[], &[Content::user_text("hi")])
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("HTTP request failed"), "got: {}", message);
        assert!(!message.contains("SECRET123"), "key leaked: {}", message);
    }

    #[test]
    fn omits_tools_for_toolless_agent() {
        let agent = Agent::new("plain", "gemini-2.0-flash");
        let body = runtime().build_request_body(&agent, &[], &[Content::user_text("hi")]);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn parses_function_call_response() {
        let response = json!({
            "candidates": [{
                "content": {
                    "parts": [{"functionCall": {"name": "current_time", "args": {}}}],
                    "role": "model"
                },
                "finishReason": "STOP"
            }]
        });

        let turn = GeminiRuntime::parse_response(&response).unwrap();
        let calls = turn.function_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "current_time");
        assert_eq!(calls[0].args, json!({}));
        assert_eq!(turn.finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn parses_text_and_skips_thoughts() {
        let response = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "planning...", "thought": true},
                        {"text": "Top story: "},
                        {"text": "markets rally."}
                    ],
                    "role": "model"
                },
                "finishReason": "STOP",
                "groundingMetadata": {"groundingChunks": [{"web": {"uri": "https://example.com"}}]}
            }]
        });

        let turn = GeminiRuntime::parse_response(&response).unwrap();
        assert_eq!(turn.joined_text(), "Top story: markets rally.");
        assert!(turn.function_calls().is_empty());
    }

    #[test]
    fn parses_stop_with_empty_parts_as_empty_turn() {
        let response = json!({
            "candidates": [{
                "content": {"parts": [], "role": "model"},
                "finishReason": "STOP"
            }]
        });

        let turn = GeminiRuntime::parse_response(&response).unwrap();
        assert!(turn.parts.is_empty());
    }

    #[test]
    fn rejects_missing_candidates() {
        let result = GeminiRuntime::parse_response(&json!({}));
        assert!(matches!(result, Err(AgentError::InvalidResponse(_))));
    }

    #[test]
    fn reports_blocked_prompt() {
        let response = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = GeminiRuntime::parse_response(&response).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn rejects_empty_non_stop_candidate() {
        let response = json!({"candidates": [{"finishReason": "SAFETY"}]});
        let err = GeminiRuntime::parse_response(&response).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn rejects_function_call_without_name() {
        let response = json!({
            "candidates": [{
                "content": {"parts": [{"functionCall": {"args": {}}}]},
                "finishReason": "STOP"
            }]
        });
        let err = GeminiRuntime::parse_response(&response).unwrap_err();
        assert!(err.to_string().contains("missing name"));
    }

    #[test]
    fn coalesce_merges_consecutive_same_role() {
        let history = vec![
            Content::user_text("First"),
            Content::user_text("Second"),
            Content::model(vec![Part::text("Reply")]),
            Content::user_text("Third"),
        ];

        let result = coalesce_contents(&history);
        assert_eq!(result.len(), 3);
        assert_eq!(
            result[0].parts,
            vec![Part::text("First"), Part::text("Second")]
        );
    }

    #[tokio::test]
    #[cfg(feature = "live-test")]
    async fn gemini_adapter_basic() {
        let runtime = GeminiRuntime::from_env().expect("GEMINI_API_KEY must be set");
        let agent = tool_agent();
        let history = vec![Content::user_text("What time is it?")];

        let result = runtime.generate(&agent, &[], &history).await;
        assert!(result.is_ok(), "live test failed: {:?}", result.err());
    }
}
