//! Error type shared by the service layer.

use crate::db::repository::RepositoryError;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failures a service can report to its caller.
///
/// Messages of the first three variants are meant for API clients and are
/// passed through unchanged by the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Input rejected before touching storage (bad range, duplicate account...).
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Missing, invalid or expired credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Storage failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Unexpected failure inside the service itself.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Validate that an optional query value lies in `min..=max`, returning
/// `default` when absent.
pub fn bounded(name: &str, value: Option<i64>, default: i64, min: i64, max: i64) -> ServiceResult<i64> {
    let value = value.unwrap_or(default);
    if value < min || value > max {
        return Err(ServiceError::validation(format!(
            "{} must be between {} and {}",
            name, min, max
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded() {
        assert_eq!(bounded("hours", None, 24, 1, 720).unwrap(), 24);
        assert_eq!(bounded("hours", Some(720), 24, 1, 720).unwrap(), 720);
        let err = bounded("hours", Some(0), 24, 1, 720).unwrap_err();
        assert_eq!(err.to_string(), "hours must be between 1 and 720");
    }

    #[test]
    fn test_repository_errors_convert() {
        let err: ServiceError = RepositoryError::connection("down").into();
        assert!(matches!(err, ServiceError::Repository(_)));
    }
}
