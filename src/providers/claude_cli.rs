use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::ProviderConfig;
use crate::error::ChatError;
use crate::process::{self, Invocation};
use crate::response::CliResponse;

use super::{ChatGeneration, ChatResult, Message, Provider, TokenHandler};

pub const PROVIDER_NAME: &str = "claude-code-cli";

const UNKNOWN_ERROR: &str = "Unknown error";

/// Provider that runs the `claude` CLI in print mode, once per request.
///
/// The CLI takes a single prompt rather than a conversation, so messages are
/// flattened into a role-prefixed transcript and written to its stdin. There
/// is no incremental output; `stream` yields the complete answer as one chunk.
#[derive(Debug, Clone)]
pub struct ClaudeCliProvider {
    config: ProviderConfig,
}

impl ClaudeCliProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    /// Whether callers should prefer `stream` over `generate`.
    pub fn streaming(&self) -> bool {
        self.config.streaming
    }

    /// Render messages as a `System:`/`Human:`/`Assistant:` transcript.
    pub fn format_prompt(messages: &[Message]) -> String {
        let mut prompt = String::new();
        for message in messages {
            let label = match message {
                Message::System { .. } => "System",
                Message::User { .. } => "Human",
                Message::Assistant { .. } => "Assistant",
            };
            prompt.push_str(label);
            prompt.push_str(": ");
            prompt.push_str(message.content());
            prompt.push_str("\n\n");
        }
        prompt.trim().to_owned()
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "--print".to_owned(),
            "--output-format".to_owned(),
            "json".to_owned(),
        ];
        if !self.config.model.is_empty() {
            args.push("--model".to_owned());
            args.push(self.config.model.clone());
        }
        args
    }

    /// Parameters that identify this provider instance, for tracing and
    /// caller-side caching keys.
    pub fn identifying_params(&self) -> serde_json::Value {
        json!({
            "provider": PROVIDER_NAME,
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "streaming": self.config.streaming,
        })
    }

    fn invocation(&self, prompt: String) -> Invocation {
        let inherited = std::env::var_os("PATH");
        Invocation {
            program: self.config.executable.clone(),
            args: self.build_args(),
            input: prompt,
            search_path: process::augmented_path(&self.config.extra_path, inherited.as_deref()),
            timeout: self.config.timeout,
        }
    }
}

impl Default for ClaudeCliProvider {
    fn default() -> Self {
        Self::new(ProviderConfig::default())
    }
}

#[async_trait]
impl Provider for ClaudeCliProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    #[instrument(
        name = "claude_cli.generate",
        skip_all,
        fields(run_id = %Uuid::now_v7(), model = %self.config.model, messages = messages.len())
    )]
    async fn generate(
        &self,
        messages: &[Message],
        handler: Option<&dyn TokenHandler>,
    ) -> Result<ChatResult, ChatError> {
        let prompt = Self::format_prompt(messages);
        debug!(prompt_bytes = prompt.len(), "prompt formatted");

        let output = process::run_with_input(&self.invocation(prompt)).await?;

        if !output.success() {
            let stderr = output.stderr.trim();
            return Err(ChatError::ExitStatus {
                code: output.code,
                stderr: if stderr.is_empty() {
                    UNKNOWN_ERROR.to_owned()
                } else {
                    stderr.to_owned()
                },
            });
        }

        if !output.stderr.trim().is_empty() {
            warn!(stderr = %output.stderr.trim(), "CLI wrote to stderr");
        }

        let response =
            CliResponse::parse(&output.stdout).map_err(|e| ChatError::Parse(e.to_string()))?;

        if response.is_error {
            let message = response
                .result
                .as_deref()
                .filter(|r| !r.is_empty())
                .unwrap_or(UNKNOWN_ERROR);
            return Err(ChatError::Reported(message.to_owned()));
        }

        let content = response.content();
        if let Some(handler) = handler {
            handler.on_new_token(content);
        }

        let llm_output = response.llm_output();
        info!(
            cost_usd = ?llm_output.cost_usd,
            duration_ms = ?llm_output.duration_ms,
            answer_bytes = content.len(),
            "completion received"
        );

        Ok(ChatResult {
            generations: vec![ChatGeneration::from_text(content)],
            llm_output: Some(llm_output),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn format_prompt_transcript() {
        let messages = [
            Message::system("Be brief."),
            Message::user("Capital of France?"),
            Message::assistant("Paris."),
            Message::user("And Italy?"),
        ];
        assert_eq!(
            ClaudeCliProvider::format_prompt(&messages),
            "System: Be brief.\n\nHuman: Capital of France?\n\nAssistant: Paris.\n\nHuman: And Italy?"
        );
    }

    #[test]
    fn format_prompt_empty() {
        assert_eq!(ClaudeCliProvider::format_prompt(&[]), "");
    }

    #[test]
    fn format_prompt_trims_content_edges() {
        let messages = [Message::user("  padded  ")];
        assert_eq!(ClaudeCliProvider::format_prompt(&messages), "Human:   padded");
    }

    #[test]
    fn default_args_include_model() {
        let provider = ClaudeCliProvider::default();
        assert_eq!(
            provider.build_args(),
            ["--print", "--output-format", "json", "--model", "sonnet"]
        );
    }

    #[test]
    fn empty_model_omits_flag() {
        let provider = ClaudeCliProvider::new(ProviderConfig {
            model: String::new(),
            ..ProviderConfig::default()
        });
        assert_eq!(provider.build_args(), ["--print", "--output-format", "json"]);
    }

    #[test]
    fn sampling_params_not_passed_as_flags() {
        let provider = ClaudeCliProvider::new(ProviderConfig {
            max_tokens: Some(100),
            temperature: Some(0.2),
            ..ProviderConfig::default()
        });
        let args = provider.build_args();
        assert!(!args.iter().any(|a| a.contains("token") || a.contains("temp")));

        let params = provider.identifying_params();
        assert_eq!(params["max_tokens"], 100);
        assert_eq!(params["provider"], "claude-code-cli");
    }

    #[cfg(unix)]
    #[test]
    fn invocation_prepends_extra_path() {
        let provider = ClaudeCliProvider::new(ProviderConfig {
            extra_path: vec![PathBuf::from("/opt/node/bin")],
            ..ProviderConfig::default()
        });
        let invocation = provider.invocation("hello".to_owned());
        assert!(
            invocation
                .search_path
                .to_string_lossy()
                .starts_with("/opt/node/bin")
        );
        assert_eq!(invocation.input, "hello");
        assert_eq!(invocation.program, PathBuf::from("claude"));
    }

    #[test]
    fn provider_name() {
        assert_eq!(ClaudeCliProvider::default().name(), "claude-code-cli");
    }
}
