use std::path::PathBuf;

use regstep_operations::{ConfigError, StepError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error")]
    Config(#[from] ConfigError),

    #[error("step failed")]
    Step(#[from] StepError),

    #[error("failed to read '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in '{path}'")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to render output")]
    Render(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::CliError;

    #[test]
    fn read_error_includes_path_and_source() {
        let err = CliError::Read {
            path: PathBuf::from("/data/input.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };

        assert!(err.to_string().contains("/data/input.json"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn invalid_json_error_includes_path() {
        let source = serde_json::from_str::<serde_json::Value>("{").expect_err("truncated json");
        let err = CliError::InvalidJson {
            path: PathBuf::from("seed.json"),
            source,
        };

        assert!(err.to_string().contains("seed.json"));
    }

    #[test]
    fn step_error_converts_via_from() {
        let step_err = regstep_operations::StepError::Preload {
            reason: "customer 1 not found".to_string(),
        };

        let cli_err: CliError = step_err.into();

        assert!(matches!(cli_err, CliError::Step(_)));
        assert!(std::error::Error::source(&cli_err).is_some());
    }
}
