use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("Invalid reading: {0}")]
    InvalidReading(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Notification delivery failed for {0}: {1}")]
    NotificationDeliveryFailed(String, String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl DomainError {
    /// Errors the caller caused and should see as-is (never retried)
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            DomainError::PermissionDenied(_)
                | DomainError::DeviceNotFound(_)
                | DomainError::LocationNotFound(_)
                | DomainError::ValidationError(_)
                | DomainError::InvalidReading(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_is_caller_error() {
        let err = DomainError::PermissionDenied("device-1".to_string());
        assert!(err.is_caller_error());
        assert_eq!(err.to_string(), "Permission denied: device-1");
    }

    #[test]
    fn test_repository_error_is_not_caller_error() {
        let err = DomainError::from(anyhow::anyhow!("connection reset"));
        assert!(!err.is_caller_error());
        assert!(matches!(err, DomainError::RepositoryError(_)));
    }
}
