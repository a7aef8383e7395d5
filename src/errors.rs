use serde::Serialize;
use thiserror::Error;

/// Centralized error type for the tailoring pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid request: {message}")]
    InputError { message: String },

    #[error("could not parse résumé: {message}")]
    ParseError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    #[error("external service unavailable: {message}")]
    ExternalUnavailable { message: String },

    #[error("external service timed out: {message}")]
    ExternalTimeout { message: String },

    #[error("persistence operation failed: {message}")]
    PersistenceError {
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    #[error("internal error: {message}")]
    InternalError {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

#[derive(Debug, Clone, Copy, Serialize)]
pub enum ErrorSeverity {
    Critical,
    High,
    Medium,
    Low,
}

impl PipelineError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InputError { .. } => "INPUT_ERROR",
            Self::ParseError { .. } => "PARSE_ERROR",
            Self::ExternalUnavailable { .. } => "EXTERNAL_UNAVAILABLE",
            Self::ExternalTimeout { .. } => "EXTERNAL_TIMEOUT",
            Self::PersistenceError { .. } => "PERSISTENCE_ERROR",
            Self::InternalError { .. } => "INTERNAL_ERROR",
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InternalError { .. } => ErrorSeverity::Critical,
            Self::PersistenceError { .. } => ErrorSeverity::High,
            Self::ParseError { .. } => ErrorSeverity::Medium,
            Self::ExternalUnavailable { .. } | Self::ExternalTimeout { .. } => ErrorSeverity::Medium,
            Self::InputError { .. } => ErrorSeverity::Low,
        }
    }

    /// Whether the pipeline should degrade gracefully instead of failing the task.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ExternalUnavailable { .. } | Self::ExternalTimeout { .. })
    }

    pub fn log(&self, context: &str) {
        match self.severity() {
            ErrorSeverity::Critical => log::error!("[CRITICAL] {}: {}", context, self),
            ErrorSeverity::High => log::error!("[HIGH] {}: {}", context, self),
            ErrorSeverity::Medium => log::warn!("[MEDIUM] {}: {}", context, self),
            ErrorSeverity::Low => log::info!("[LOW] {}: {}", context, self),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::InputError { message: message.into() }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::ParseError { message: message.into(), source: None }
    }

    pub fn parse_with_source(message: impl Into<String>, source: anyhow::Error) -> Self {
        Self::ParseError { message: message.into(), source: Some(source) }
    }

    pub fn external_unavailable(message: impl Into<String>) -> Self {
        Self::ExternalUnavailable { message: message.into() }
    }

    pub fn external_timeout(message: impl Into<String>) -> Self {
        Self::ExternalTimeout { message: message.into() }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::PersistenceError { message: message.into(), source: None }
    }

    pub fn persistence_with_source(message: impl Into<String>, source: sqlx::Error) -> Self {
        Self::PersistenceError { message: message.into(), source: Some(source) }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError { message: message.into(), source: None }
    }

    pub fn internal_with_source(message: impl Into<String>, source: anyhow::Error) -> Self {
        Self::InternalError { message: message.into(), source: Some(source) }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::persistence_with_source("database operation failed", err)
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PipelineError::external_timeout(err.to_string())
        } else {
            PipelineError::external_unavailable(err.to_string())
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::internal(format!("io error: {err}"))
    }
}

/// Helper trait mirroring the pattern used across the pipeline for converting
/// a foreign `Result` into a `PipelineError` with added context.
pub trait IntoPipelineError<T> {
    fn context(self, message: &str) -> PipelineResult<T>;
}

impl<T> IntoPipelineError<T> for std::result::Result<T, anyhow::Error> {
    fn context(self, message: &str) -> PipelineResult<T> {
        self.map_err(|e| PipelineError::internal_with_source(message, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PipelineError::input("test").error_code(), "INPUT_ERROR");
        assert_eq!(PipelineError::parse("test").error_code(), "PARSE_ERROR");
        assert_eq!(
            PipelineError::external_unavailable("test").error_code(),
            "EXTERNAL_UNAVAILABLE"
        );
    }

    #[test]
    fn test_error_severity() {
        assert!(matches!(PipelineError::internal("x").severity(), ErrorSeverity::Critical));
        assert!(matches!(PipelineError::persistence("x").severity(), ErrorSeverity::High));
        assert!(matches!(PipelineError::input("x").severity(), ErrorSeverity::Low));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(PipelineError::external_unavailable("x").is_recoverable());
        assert!(PipelineError::external_timeout("x").is_recoverable());
        assert!(!PipelineError::parse("x").is_recoverable());
    }
}
