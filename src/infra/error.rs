use thiserror::Error;

use crate::config::LoadError;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {0}")]
    Configuration(#[from] LoadError),
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::error::AppError;

    #[test]
    fn configuration_failures_keep_the_offending_key() {
        let err = AppError::from(InfraError::from(LoadError::Invalid {
            key: "render.compile_attempts",
            reason: "must be between 1 and 5".to_string(),
        }));

        assert!(matches!(
            err,
            AppError::Infra(InfraError::Configuration(LoadError::Invalid {
                key: "render.compile_attempts",
                ..
            }))
        ));
        let message = err.to_string();
        assert!(message.starts_with("configuration error:"), "{message}");
        assert!(message.contains("render.compile_attempts"), "{message}");
    }
}
