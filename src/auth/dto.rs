use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::validation::{FieldRule, RequestSchema, Schema};

pub const NAME_MIN: usize = 3;
pub const NAME_MAX: usize = 100;
pub const PASSWORD_MIN: usize = 6;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RequestSchema for RegisterRequest {
    const SCHEMA: Schema = Schema {
        fields: &[
            FieldRule::string("name")
                .required()
                .trimmed()
                .min_len(NAME_MIN)
                .max_len(NAME_MAX),
            FieldRule::string("email").required().email(),
            FieldRule::string("password").required().min_len(PASSWORD_MIN),
        ],
        additional_properties: true,
    };
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl RequestSchema for LoginRequest {
    const SCHEMA: Schema = Schema {
        fields: &[
            FieldRule::string("email").required().email(),
            FieldRule::string("password").required().min_len(PASSWORD_MIN),
        ],
        additional_properties: true,
    };
}

/// Response returned after login or register.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
