// ABOUTME: Provider module aggregating LLM runtime adapters and the runtime factory.
// ABOUTME: Each sub-module implements AgentRuntime for a specific LLM API.

pub mod gemini;

use std::sync::Arc;

use crate::runtime::{AgentError, AgentRuntime};

pub use gemini::GeminiRuntime;

/// Create a runtime for the named provider, reading credentials from the environment.
pub fn create_runtime(provider: &str) -> Result<Arc<dyn AgentRuntime>, AgentError> {
    match provider {
        "gemini" => Ok(Arc::new(GeminiRuntime::from_env()?)),
        unknown => Err(AgentError::ProviderError(format!(
            "unsupported LLM provider: {}",
            unknown
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    /// Serialize all tests that read/write env vars to prevent race conditions.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Uses match instead of unwrap_err() because Arc<dyn AgentRuntime> doesn't impl Debug.
    fn expect_err(result: Result<Arc<dyn AgentRuntime>, AgentError>) -> String {
        match result {
            Err(e) => e.to_string(),
            Ok(runtime) => panic!("expected error, got runtime: {}", runtime.provider_name()),
        }
    }

    #[test]
    fn unknown_provider_returns_error() {
        let err = expect_err(create_runtime("unknown"));
        assert!(
            err.contains("unsupported LLM provider: unknown"),
            "got: {}",
            err
        );
    }

    #[test]
    fn gemini_missing_api_key_returns_error() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe { env::remove_var("GEMINI_API_KEY") };
        let err = expect_err(create_runtime("gemini"));
        assert!(err.contains("GEMINI_API_KEY"), "got: {}", err);
    }

    #[test]
    fn gemini_with_api_key_succeeds() {
        let _guard = ENV_MUTEX.lock().unwrap();
        unsafe { env::set_var("GEMINI_API_KEY", "test-key-123") };

        let result = create_runtime("gemini");

        unsafe { env::remove_var("GEMINI_API_KEY") };

        match result {
            Ok(runtime) => assert_eq!(runtime.provider_name(), "gemini"),
            Err(e) => panic!("expected Ok, got Err: {}", e),
        }
    }
}
