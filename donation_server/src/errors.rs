use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use donation_engine::{traits::ProcessorError, ChannelError, ConfirmationError, LedgerError, QueryError};
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The payment processor could not complete the request. {0}")]
    ProcessorError(String),
    #[error("The request conflicts with the current state of the record. {0}")]
    Conflict(String),
    #[error("Bad request")]
    InvalidSignature,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
                AuthError::CouldNotIssueToken(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ProcessorError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No bearer token was provided.")]
    MissingToken,
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Access token is invalid. {0}")]
    ValidationError(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
    #[error("Could not issue an access token. {0}")]
    CouldNotIssueToken(String),
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::DonationNotFound(_) | LedgerError::BatchNotFound(_) => Self::NoRecordFound(e.to_string()),
            LedgerError::InvalidReference(_) | LedgerError::ValidationError(_) | LedgerError::ModificationNoOp => {
                Self::ValidationError(e.to_string())
            },
            LedgerError::UniqueViolation(_) | LedgerError::ConcurrentModification(_) => Self::Conflict(e.to_string()),
            LedgerError::DatabaseError(s) => {
                error!("💻️ Ledger storage error. {s}");
                Self::BackendError(format!("Database error: {s}"))
            },
        }
    }
}

impl From<ChannelError> for ServerError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::ValidationError(s) => Self::ValidationError(s),
            ChannelError::ProcessorError(e) => e.into(),
            ChannelError::LedgerError(e) => e.into(),
        }
    }
}

impl From<ProcessorError> for ServerError {
    fn from(e: ProcessorError) -> Self {
        Self::ProcessorError(e.to_string())
    }
}

impl From<ConfirmationError> for ServerError {
    fn from(e: ConfirmationError) -> Self {
        match e {
            ConfirmationError::DonationNotFound(_) => Self::NoRecordFound(e.to_string()),
            ConfirmationError::LedgerError(e) => e.into(),
        }
    }
}

impl From<QueryError> for ServerError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::NotFound(_) => Self::NoRecordFound(e.to_string()),
            QueryError::QueryError(s) => Self::ValidationError(s),
            QueryError::DatabaseError(s) => {
                error!("💻️ Ledger query error. {s}");
                Self::BackendError(format!("Database error: {s}"))
            },
        }
    }
}
