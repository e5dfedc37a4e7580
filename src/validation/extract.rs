use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::{
    mapper,
    schema::{Keyword, Schema, Violation, BODY_FIELD},
};
use crate::error::{ApiError, ErrorCode};

/// Request bodies that are checked against a schema before deserializing.
pub trait RequestSchema {
    const SCHEMA: Schema;
}

/// JSON body extractor that runs the schema check and reports failures
/// through the taxonomy. An empty body is read as `{}`.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

pub fn parse_body(bytes: &[u8]) -> Result<Value, Violation> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(bytes).map_err(|_| Violation::new(BODY_FIELD, Keyword::Malformed))
}

/// Schema check followed by deserialization into `T`.
pub fn validate<T>(value: Value) -> Result<T, ApiError>
where
    T: DeserializeOwned + RequestSchema,
{
    let violations = T::SCHEMA.check(&value);
    if !violations.is_empty() {
        debug!(?violations, "request body failed validation");
        return Err(mapper::map_violations(&violations));
    }
    serde_json::from_value(value).map_err(|e| {
        debug!(error = %e, "validated body did not deserialize");
        ApiError::new(ErrorCode::Validation).on_field(BODY_FIELD)
    })
}

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + RequestSchema,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(|e| {
            ApiError::new(ErrorCode::Validation)
                .with_message(e.body_text())
                .on_field(BODY_FIELD)
        })?;
        let value = parse_body(&bytes).map_err(|v| mapper::to_error(&v))?;
        validate(value).map(ValidatedJson)
    }
}
