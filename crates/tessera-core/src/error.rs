use thiserror::Error;

/// Stable machine-readable error codes, echoed in the `error.code` field of
/// every non-2xx response. Adding a variant here is additive; never reuse one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingApiKey,
    InvalidAuthHeader,
    InvalidApiKey,
    InsufficientScope,
    UnauthorizedTeam,
    ValidationError,
    BadRequest,
    NotFound,
    TeamNotFound,
    AssetNotFound,
    ContractNotFound,
    RegistrationNotFound,
    ProposalNotFound,
    DuplicateTeam,
    DuplicateAsset,
    DuplicateRegistration,
    DuplicateAcknowledgment,
    PendingProposalConflict,
    SchemaTooLarge,
    InvalidSchema,
    InvalidSemver,
    ProposalNotPending,
    BreakingChangeRequiresForce,
    RateLimitExceeded,
    InternalError,
}

/// One violation surfaced from schema-shape or request-body validation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum TesseraError {
    #[error("{message}")]
    Authentication {
        code: ErrorCode,
        message: String,
    },

    #[error("{message}")]
    Authorization {
        code: ErrorCode,
        message: String,
    },

    #[error("{message}")]
    Validation {
        code: ErrorCode,
        message: String,
        field_errors: Vec<FieldError>,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        code: ErrorCode,
        entity: &'static str,
        id: String,
    },

    #[error("{message}")]
    Conflict {
        code: ErrorCode,
        message: String,
    },

    #[error("{message}")]
    BusinessRule {
        code: ErrorCode,
        message: String,
    },

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TesseraError>;

impl TesseraError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Authentication { .. } => 401,
            Self::Authorization { .. } => 403,
            Self::Validation { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::BusinessRule { .. } => 400,
            Self::RateLimited { .. } => 429,
            Self::Internal(_) => 500,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Authentication { code, .. }
            | Self::Authorization { code, .. }
            | Self::Validation { code, .. }
            | Self::NotFound { code, .. }
            | Self::Conflict { code, .. }
            | Self::BusinessRule { code, .. } => *code,
            Self::RateLimited { .. } => ErrorCode::RateLimitExceeded,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        let code = match entity {
            "team" => ErrorCode::TeamNotFound,
            "asset" => ErrorCode::AssetNotFound,
            "contract" => ErrorCode::ContractNotFound,
            "registration" => ErrorCode::RegistrationNotFound,
            "proposal" => ErrorCode::ProposalNotFound,
            _ => ErrorCode::NotFound,
        };
        Self::NotFound {
            code,
            entity,
            id: id.into(),
        }
    }

    pub fn conflict(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn business_rule(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::BusinessRule {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            code: ErrorCode::ValidationError,
            message: message.into(),
            field_errors: Vec::new(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Authentication {
            code: ErrorCode::InvalidApiKey,
            message: message.into(),
        }
    }

    pub fn forbidden(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Authorization {
            code,
            message: message.into(),
        }
    }
}
