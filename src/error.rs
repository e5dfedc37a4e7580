use std::collections::BTreeMap;
use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// How an error is treated at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ClientInput,
    BusinessRule,
    Unauthorized,
    Internal,
}

/// Closed set of machine-readable error codes exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidCredentials,
    EmailInUse,
    Unauthorized,
    AuthUnknown,
    AlreadyOpen,
    NoOpenEntry,
    ClockUnknown,
    InvalidName,
    InvalidEmail,
    InvalidPassword,
    WeakPassword,
    InvalidDate,
    Validation,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "auth/invalid-credentials",
            Self::EmailInUse => "auth/email-in-use",
            Self::Unauthorized => "auth/unauthorized",
            Self::AuthUnknown => "auth/unknown",
            Self::AlreadyOpen => "clock/already-open",
            Self::NoOpenEntry => "clock/no-open-entry",
            Self::ClockUnknown => "clock/unknown",
            Self::InvalidName => "validation/invalid-name",
            Self::InvalidEmail => "validation/invalid-email",
            Self::InvalidPassword => "validation/invalid-password",
            Self::WeakPassword => "validation/weak-password",
            Self::InvalidDate => "validation/invalid-date",
            Self::Validation => "validation/error",
        }
    }

    /// Every validation code maps to 400, whatever the sub-kind.
    pub const fn status(self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::AuthUnknown | Self::ClockUnknown => StatusCode::INTERNAL_SERVER_ERROR,
            Self::EmailInUse
            | Self::AlreadyOpen
            | Self::NoOpenEntry
            | Self::InvalidName
            | Self::InvalidEmail
            | Self::InvalidPassword
            | Self::WeakPassword
            | Self::InvalidDate
            | Self::Validation => StatusCode::BAD_REQUEST,
        }
    }

    pub const fn default_message(self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Email ou senha inválidos",
            Self::EmailInUse => "Email já está em uso",
            Self::Unauthorized => "Token inválido ou ausente",
            Self::AuthUnknown => "Erro interno de autenticação",
            Self::AlreadyOpen => "Já existe um registro de ponto aberto",
            Self::NoOpenEntry => "Não existe um registro de ponto aberto",
            Self::ClockUnknown => "Erro ao processar registro de ponto",
            Self::InvalidName => "Nome inválido",
            Self::InvalidEmail => "Email inválido",
            Self::InvalidPassword => "Senha inválida",
            Self::WeakPassword => "Senha muito fraca",
            Self::InvalidDate => "Data inválida",
            Self::Validation => "Erro de validação",
        }
    }

    pub const fn kind(self) -> ErrorKind {
        match self {
            Self::InvalidName
            | Self::InvalidEmail
            | Self::InvalidPassword
            | Self::WeakPassword
            | Self::InvalidDate
            | Self::Validation => ErrorKind::ClientInput,
            Self::InvalidCredentials | Self::EmailInUse | Self::AlreadyOpen | Self::NoOpenEntry => {
                ErrorKind::BusinessRule
            }
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::AuthUnknown | Self::ClockUnknown => ErrorKind::Internal,
        }
    }

    /// Part of the code after the namespace separator, e.g. `already-open`.
    pub fn field(self) -> &'static str {
        let code = self.as_str();
        code.split_once('/').map_or(code, |(_, rest)| rest)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A raised taxonomy entry.
///
/// `cause` holds whatever went wrong underneath an internal error. It is
/// logged at the boundary and never sent to the client.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    field: Option<String>,
    cause: Option<anyhow::Error>,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            field: None,
            cause: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Address the error to a request field instead of the code suffix.
    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn internal(code: ErrorCode, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            cause: Some(cause.into()),
            ..Self::new(code)
        }
    }

    pub fn field(&self) -> &str {
        self.field.as_deref().unwrap_or_else(|| self.code.field())
    }

    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_ref()
    }
}

impl From<ErrorCode> for ApiError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub success: bool,
    pub error: ErrorCode,
    pub message: &'a str,
    pub errors: BTreeMap<&'a str, Vec<&'a str>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        match self.code.kind() {
            ErrorKind::Internal => {
                error!(code = %self.code, cause = ?self.cause(), "internal error");
            }
            ErrorKind::Unauthorized => {
                warn!(code = %self.code, message = %self.message, "unauthorized request");
            }
            ErrorKind::ClientInput | ErrorKind::BusinessRule => {}
        }

        let mut errors = BTreeMap::new();
        errors.insert(self.field(), vec![self.message.as_str()]);
        let body = ErrorBody {
            success: false,
            error: self.code,
            message: &self.message,
            errors,
        };
        (status, Json(body)).into_response()
    }
}
