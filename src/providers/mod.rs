pub mod claude_cli;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use serde::Serialize;

use crate::error::ChatError;

/// A role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant { content: String },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::System { content } | Self::User { content } | Self::Assistant { content } => {
                content
            }
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
        }
    }
}

/// Provider metadata for one call. Every field is optional; the backend
/// reports what it knows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LlmOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_turns: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<serde_json::Value>,
}

/// Later outputs replace earlier ones whole, unset fields included;
/// `None` entries are skipped.
pub fn combine_llm_outputs<'a, I>(outputs: I) -> LlmOutput
where
    I: IntoIterator<Item = Option<&'a LlmOutput>>,
{
    outputs
        .into_iter()
        .flatten()
        .last()
        .cloned()
        .unwrap_or_default()
}

/// One candidate answer. `message` is always `Message::Assistant`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatGeneration {
    pub message: Message,
    pub text: String,
}

impl ChatGeneration {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            message: Message::assistant(text.clone()),
            text,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatResult {
    pub generations: Vec<ChatGeneration>,
    pub llm_output: Option<LlmOutput>,
}

impl ChatResult {
    /// Text of the first generation, or `""` if there is none.
    pub fn text(&self) -> &str {
        self.generations.first().map_or("", |g| g.text.as_str())
    }
}

/// A streamed piece of a response. `text` and `content` carry the same
/// string so consumers reading either field see the answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatChunk {
    pub message: Message,
    pub text: String,
    pub content: String,
}

impl ChatChunk {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            message: Message::assistant(text.clone()),
            content: text.clone(),
            text,
        }
    }
}

pub type ChunkStream = BoxStream<'static, Result<ChatChunk, ChatError>>;

/// Callback notified as response text becomes available.
pub trait TokenHandler: Send + Sync {
    fn on_new_token(&self, token: &str);
}

/// Extension point for LLM inference backends.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        messages: &[Message],
        handler: Option<&dyn TokenHandler>,
    ) -> Result<ChatResult, ChatError>;

    /// Backends without incremental output get a single chunk holding the
    /// whole answer.
    async fn stream(
        &self,
        messages: &[Message],
        handler: Option<&dyn TokenHandler>,
    ) -> Result<ChunkStream, ChatError> {
        let result = self.generate(messages, handler).await?;
        let chunk = ChatChunk::from_text(result.text());
        Ok(Box::pin(stream::iter([Ok(chunk)])))
    }
}
