//! Turns raw schema failures into taxonomy errors.
//!
//! Only one failure is reported per request. Selection is by precedence:
//! missing field, then email format, then minimum length, then maximum
//! length on `name`, then anything else. Ties keep schema order.

use crate::error::{ApiError, ErrorCode};

use super::schema::{Format, Keyword, Violation};

fn rank(v: &Violation) -> u8 {
    match v.keyword {
        Keyword::Required => 1,
        Keyword::Format(Format::Email) => 2,
        Keyword::MinLength(_) => 3,
        Keyword::MaxLength(_) if v.field == "name" => 4,
        _ => 5,
    }
}

fn label(field: &str) -> &str {
    match field {
        "name" => "Nome",
        "email" => "Email",
        "password" => "Senha",
        "description" => "Descrição",
        other => other,
    }
}

fn required_message(field: &str) -> String {
    match field {
        "name" => "Nome é obrigatório".into(),
        "email" => "Email é obrigatório".into(),
        "password" => "Senha é obrigatória".into(),
        other => format!("Campo {other} é obrigatório"),
    }
}

/// The failure that gets reported, if any.
pub fn select(violations: &[Violation]) -> Option<&Violation> {
    // min_by_key keeps the first of equal keys
    violations.iter().min_by_key(|v| rank(v))
}

pub fn to_error(v: &Violation) -> ApiError {
    let field = v.field.as_str();
    let (code, message) = match v.keyword {
        Keyword::Required => {
            let code = match field {
                "name" => ErrorCode::InvalidName,
                "email" => ErrorCode::InvalidEmail,
                "password" => ErrorCode::InvalidPassword,
                _ => ErrorCode::Validation,
            };
            (code, required_message(field))
        }
        Keyword::Format(Format::Email) => (ErrorCode::InvalidEmail, "Email inválido".to_string()),
        Keyword::MinLength(n) => {
            let code = match field {
                "password" => ErrorCode::WeakPassword,
                "name" => ErrorCode::InvalidName,
                _ => ErrorCode::Validation,
            };
            (
                code,
                format!("{} deve ter pelo menos {n} caracteres", label(field)),
            )
        }
        Keyword::MaxLength(n) => {
            let code = if field == "name" {
                ErrorCode::InvalidName
            } else {
                ErrorCode::Validation
            };
            (
                code,
                format!("{} deve ter no máximo {n} caracteres", label(field)),
            )
        }
        Keyword::Type => (
            ErrorCode::Validation,
            format!("{} deve ser uma string", label(field)),
        ),
        Keyword::AdditionalProperty => (
            ErrorCode::Validation,
            "Campos adicionais não são permitidos".to_string(),
        ),
        Keyword::NotObject => (
            ErrorCode::Validation,
            "Corpo da requisição deve ser um objeto".to_string(),
        ),
        Keyword::Malformed => (ErrorCode::Validation, "JSON inválido".to_string()),
    };
    ApiError::new(code).with_message(message).on_field(field)
}

/// Maps the representative failure; an empty list yields the generic code.
pub fn map_violations(violations: &[Violation]) -> ApiError {
    match select(violations) {
        Some(v) => to_error(v),
        None => ApiError::new(ErrorCode::Validation),
    }
}
