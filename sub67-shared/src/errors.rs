use serde::{Deserialize, Serialize};

/// Application error codes following the pattern E{service}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E5xxx: Dispatcher errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ServiceUnavailable,

    // Dispatcher (E5xxx)
    CandidateQueryFailed,
    DeliveryLookupFailed,
    PushSendFailed,
    PushRejected,
    EmailSendFailed,
    InvalidJobEvent,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ServiceUnavailable => "E0007",

            // Dispatcher
            Self::CandidateQueryFailed => "E5001",
            Self::DeliveryLookupFailed => "E5002",
            Self::PushSendFailed => "E5003",
            Self::PushRejected => "E5004",
            Self::EmailSendFailed => "E5005",
            Self::InvalidJobEvent => "E5006",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The coded form of this error, as written to structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Known { code, .. } => code.code(),
            AppError::Internal(_) => ErrorCode::InternalError.code(),
            AppError::Database(_) => ErrorCode::InternalError.code(),
            AppError::Http(_) => ErrorCode::ServiceUnavailable.code(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_errors_report_their_code() {
        let err = AppError::new(ErrorCode::PushSendFailed, "all tokens rejected");
        assert_eq!(err.code(), "E5003");
        assert_eq!(err.to_string(), "all tokens rejected");
    }

    #[test]
    fn infrastructure_errors_map_to_shared_codes() {
        let err = AppError::from(diesel::result::Error::NotFound);
        assert_eq!(err.code(), "E0001");

        let err = AppError::internal("pool exhausted");
        assert_eq!(err.code(), "E0001");
    }
}
