use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("executable '{0}' not found on PATH")]
    ExecutableNotFound(String),

    #[error("failed to spawn {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("process i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("process timeout after {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("process {}: {stderr}", describe_exit(.code))]
    ExitStatus { code: Option<i32>, stderr: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("CLI returned an error: {0}")]
    Reported(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {code}"),
        None => "terminated by signal".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_display() {
        let exited = ChatError::ExitStatus {
            code: Some(2),
            stderr: "bad flag".to_owned(),
        };
        assert_eq!(exited.to_string(), "process exited with code 2: bad flag");

        let killed = ChatError::ExitStatus {
            code: None,
            stderr: "Unknown error".to_owned(),
        };
        assert_eq!(killed.to_string(), "process terminated by signal: Unknown error");
    }

    #[test]
    fn sub_second_timeout_display() {
        let err = ChatError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "process timeout after 250 ms");
    }
}
