// ABOUTME: Implements the current_time tool, a zero-argument local clock lookup.
// ABOUTME: Returns {"current_time": "DD-MM-YYYY HH:MM:SS"} in the host's local timezone.

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use serde_json::{Map, Value, json};

use crate::tool::{Tool, ToolResult};

/// strftime pattern for the reported timestamp.
pub const TIME_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// Key of the single entry in the tool's output mapping.
pub const CURRENT_TIME_KEY: &str = "current_time";

/// Build the tool output for a given instant.
pub fn current_time_at<Tz: TimeZone>(now: &DateTime<Tz>) -> Value
where
    Tz::Offset: std::fmt::Display,
{
    let mut output = Map::new();
    output.insert(
        CURRENT_TIME_KEY.to_string(),
        Value::String(now.format(TIME_FORMAT).to_string()),
    );
    Value::Object(output)
}

/// Build the tool output from the system clock.
pub fn current_time() -> Value {
    current_time_at(&Local::now())
}

/// Tool that reports the current local date and time.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current local date and time, formatted as DD-MM-YYYY HH:MM:SS."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _params: Value) -> Result<ToolResult, anyhow::Error> {
        let output = current_time();
        tracing::debug!(current_time = %output[CURRENT_TIME_KEY], "current_time tool called");
        Ok(ToolResult::json(output))
    }
}
