//! CLI error types and exit code mapping

use opsnorm_core::error::OpsnormError;
use opsnorm_log_pipeline::LogPipelineError;

/// CLI error.
///
/// `exit_code()` maps each variant to a process exit code.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// Rule set loading or compilation failure.
    #[error("rule error: {0}")]
    Rule(String),

    /// The requested receiver type is not registered.
    #[error("unknown receiver type '{kind}' (known: {known})")]
    UnknownType { kind: String, known: String },

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (input read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from opsnorm-core.
    #[error("{0}")]
    Core(#[from] OpsnormError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                      |
    /// |------|------------------------------|
    /// | 0    | Success                      |
    /// | 1    | General / command error      |
    /// | 2    | Configuration error          |
    /// | 3    | Rule set or receiver type    |
    /// | 10   | IO error                     |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Core(OpsnormError::Config(_)) => 2,
            Self::Rule(_) | Self::UnknownType { .. } => 3,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) => 1,
        }
    }
}

impl From<LogPipelineError> for CliError {
    fn from(e: LogPipelineError) -> Self {
        match e {
            LogPipelineError::UnknownReceiverType { kind, .. } => Self::UnknownType {
                kind,
                known: String::new(),
            },
            other => Self::Rule(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsnorm_core::error::ConfigError;

    #[test]
    fn exit_codes() {
        assert_eq!(CliError::Config("x".into()).exit_code(), 2);
        assert_eq!(CliError::Command("x".into()).exit_code(), 1);
        assert_eq!(CliError::Rule("x".into()).exit_code(), 3);
        assert_eq!(
            CliError::UnknownType {
                kind: "x".into(),
                known: "y".into()
            }
            .exit_code(),
            3
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(CliError::Io(io).exit_code(), 10);
    }

    #[test]
    fn core_config_error_is_a_config_exit() {
        let core: OpsnormError = ConfigError::FileNotFound {
            path: "opsnorm.toml".to_owned(),
        }
        .into();
        let err: CliError = core.into();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn pipeline_errors_map_to_rule_variants() {
        let err: CliError = LogPipelineError::UnknownReceiverType {
            receiver: "r".to_owned(),
            kind: "nginx".to_owned(),
        }
        .into();
        assert!(matches!(err, CliError::UnknownType { ref kind, .. } if kind == "nginx"));

        let err: CliError = LogPipelineError::Pattern {
            pattern: "(".to_owned(),
            reason: "unclosed group".to_owned(),
        }
        .into();
        assert!(matches!(err, CliError::Rule(_)));
        assert!(err.to_string().contains("unclosed group"));
    }

    #[test]
    fn unknown_type_lists_known_types() {
        let err = CliError::UnknownType {
            kind: "nginx".into(),
            known: "couchdb, solr_system".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("nginx"));
        assert!(msg.contains("couchdb, solr_system"));
    }
}
