//! Chat-model provider backed by an external inference CLI.
//!
//! Messages are flattened into a transcript, piped to the CLI's stdin, and the
//! JSON it prints is mapped back into a [`providers::ChatResult`].

pub mod config;
pub mod error;
pub mod process;
pub mod providers;
pub mod response;

pub use config::ProviderConfig;
pub use error::ChatError;
pub use providers::claude_cli::ClaudeCliProvider;
pub use providers::{ChatChunk, ChatResult, Message, Provider, TokenHandler};
