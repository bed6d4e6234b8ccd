use thiserror::Error;

/// Rejections raised by the pure domain layer before anything is persisted.
#[derive(Debug, Error)]
pub enum DomainError {
    /// User input that fails a field rule; `message` is shown on the form as-is.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    /// The stored tree or ACL data contradicts itself.
    #[error("content tree invariant violated: {message}")]
    Invariant { message: String },
}

impl DomainError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_names_the_field() {
        let err = DomainError::invalid("name", "too short");
        assert_eq!(err.to_string(), "invalid name: too short");
    }
}
