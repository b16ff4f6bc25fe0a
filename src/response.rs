use serde::Deserialize;

use crate::providers::LlmOutput;

/// The JSON object printed by `claude --print --output-format json`.
///
/// Unknown fields (`type`, `subtype`, `permission_denials`, ...) are ignored;
/// the CLI adds fields between releases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliResponse {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub cost_usd: Option<f64>,
    /// Newer CLI releases renamed `cost_usd`.
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub num_turns: Option<u32>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub usage: Option<serde_json::Value>,
}

impl CliResponse {
    pub fn parse(stdout: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(stdout.trim())
    }

    /// Answer text; absent or null `result` reads as empty.
    pub fn content(&self) -> &str {
        self.result.as_deref().unwrap_or_default()
    }

    pub fn llm_output(&self) -> LlmOutput {
        LlmOutput {
            cost_usd: self.cost_usd.or(self.total_cost_usd),
            duration_ms: self.duration_ms,
            num_turns: self.num_turns,
            session_id: self.session_id.clone(),
            usage: self.usage.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_success_payload() {
        let raw = r#"{
            "type": "result",
            "subtype": "success",
            "is_error": false,
            "result": "Paris.",
            "cost_usd": 0.0031,
            "duration_ms": 2411,
            "num_turns": 1,
            "session_id": "5c1e0d52-3b8a-4a55-9a0e-2f1b7f4c8a11",
            "usage": {"input_tokens": 12, "output_tokens": 3}
        }"#;
        let response = CliResponse::parse(raw).expect("payload should parse");
        assert!(!response.is_error);
        assert_eq!(response.content(), "Paris.");

        let output = response.llm_output();
        assert_eq!(output.cost_usd, Some(0.0031));
        assert_eq!(output.duration_ms, Some(2411));
        assert_eq!(output.num_turns, Some(1));
        assert_eq!(output.usage.expect("usage")["output_tokens"], 3);
    }

    #[test]
    fn null_result_is_empty() {
        let response = CliResponse::parse(r#"{"result": null}"#).expect("should parse");
        assert_eq!(response.content(), "");
        assert!(!response.is_error);
    }

    #[test]
    fn total_cost_fallback() {
        let response =
            CliResponse::parse(r#"{"result": "x", "total_cost_usd": 0.5}"#).expect("should parse");
        assert_eq!(response.llm_output().cost_usd, Some(0.5));
    }

    #[test]
    fn trailing_newline_tolerated() {
        assert!(CliResponse::parse("{\"result\": \"ok\"}\n").is_ok());
    }

    #[test]
    fn not_json() {
        assert!(CliResponse::parse("Error: not logged in").is_err());
    }
}
