use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use clichat::{ClaudeCliProvider, Message, Provider, ProviderConfig};

/// Chat with a model through the `claude` CLI.
#[derive(Debug, Parser)]
#[command(name = "clichat", version)]
struct Args {
    /// TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model name passed to the CLI.
    #[arg(short, long)]
    model: Option<String>,

    /// Path or name of the CLI executable.
    #[arg(long)]
    executable: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print answers through the chunk stream.
    #[arg(long)]
    stream: bool,

    /// System prompt prepended to the conversation.
    #[arg(short, long)]
    system: Option<String>,

    /// Print provider metadata after each answer (non-streaming only).
    #[arg(long)]
    json: bool,

    /// One-shot prompt. Starts an interactive session when omitted.
    prompt: Option<String>,
}

impl Args {
    fn provider_config(&self) -> Result<ProviderConfig> {
        let config = match &self.config {
            Some(path) => ProviderConfig::load(path)?,
            None => ProviderConfig::default(),
        };
        let mut config = config.with_env_overrides()?;

        if let Some(model) = &self.model {
            config.model.clone_from(model);
        }
        if let Some(executable) = &self.executable {
            config.executable.clone_from(executable);
        }
        if let Some(secs) = self.timeout_secs {
            anyhow::ensure!(secs > 0, "--timeout-secs must be at least 1");
            config.timeout = Duration::from_secs(secs);
        }
        if self.stream {
            config.streaming = true;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("clichat=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let provider = ClaudeCliProvider::new(args.provider_config()?);

    let mut history = Vec::new();
    if let Some(system) = &args.system {
        history.push(Message::system(system.clone()));
    }

    match &args.prompt {
        Some(prompt) => {
            history.push(Message::user(prompt.clone()));
            ask(&provider, &history, args.json).await?;
        }
        None => repl(&provider, history, args.json).await?,
    }

    Ok(())
}

/// Interactive loop. History lives only as long as the process.
async fn repl(provider: &ClaudeCliProvider, mut history: Vec<Message>, json: bool) -> Result<()> {
    let mut editor = DefaultEditor::new().context("failed to initialise line editor")?;

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        editor.add_history_entry(line).ok();

        history.push(Message::user(line));
        match ask(provider, &history, json).await {
            Ok(answer) => history.push(Message::assistant(answer)),
            Err(e) => {
                // Drop the unanswered turn so the next prompt starts clean.
                history.pop();
                eprintln!("error: {e:#}");
            }
        }
    }

    Ok(())
}

async fn ask(provider: &ClaudeCliProvider, history: &[Message], json: bool) -> Result<String> {
    let answer = if provider.streaming() {
        let mut chunks = provider.stream(history, None).await?;
        let mut answer = String::new();
        let mut stdout = std::io::stdout();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            write!(stdout, "{}", chunk.content)?;
            stdout.flush()?;
            answer.push_str(&chunk.content);
        }
        writeln!(stdout)?;
        answer
    } else {
        let result = provider.generate(history, None).await?;
        println!("{}", result.text());
        if json {
            if let Some(output) = &result.llm_output {
                println!("{}", serde_json::to_string_pretty(output)?);
            }
        }
        result.text().to_owned()
    };
    Ok(answer)
}
