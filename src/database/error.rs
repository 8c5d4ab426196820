use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use warp::{http::StatusCode, reply::Response, Reply};

/// Field name -> list of messages, rendered as the body of a 400 response.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors {
    inner: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.inner
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.inner.get(field).map(|messages| messages.as_slice())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.inner.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.inner.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Turns collected errors into `Err`, otherwise hands back `value`.
    pub fn into_result<T>(self, value: T) -> Result<T, ApiError> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid input")]
    Validation(FieldErrors),

    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("Not found.")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn field(field: &str, message: &str) -> Self {
        Self::Validation(FieldErrors::single(field, message))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Query(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_response(&self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(errors) => json!(errors),
            ApiError::Query(_) | ApiError::Internal(_) => {
                log::error!("> {self}");
                json!({ "detail": "A server error occurred." })
            }
            _ => json!({ "detail": self.to_string() }),
        };

        warp::reply::with_status(warp::reply::json(&body), status).into_response()
    }

    /// True when the database rejected a write because of a unique constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            ApiError::Query(sqlx::Error::Database(e)) => e.code().as_deref() == Some("23505"),
            _ => false,
        }
    }
}

impl From<FieldErrors> for ApiError {
    fn from(value: FieldErrors) -> Self {
        ApiError::Validation(value)
    }
}

/// `?` on an `ApiError` inside a handler yields a rejection through warp's
/// blanket `From<T: Reject>`.
impl warp::reject::Reject for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_collect_messages_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("title", "This field is required.");
        errors.add("price", "A valid number is required.");
        errors.add("price", "Ensure that there are no more than 2 decimal places.");

        assert_eq!(errors.get("title").map(|m| m.len()), Some(1));
        assert_eq!(errors.get("price").map(|m| m.len()), Some(2));
        assert!(!errors.contains("link"));

        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(value["title"][0], "This field is required.");
    }

    #[test]
    fn into_result_passes_value_through_when_clean() {
        let result = FieldErrors::new().into_result(7);
        assert!(matches!(result, Ok(7)));

        let result = FieldErrors::single("name", "This field may not be blank.").into_result(7);
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(ApiError::field("a", "b").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Unauthenticated("Invalid token.").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Query(sqlx::Error::RowNotFound).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn errors_travel_as_rejections() {
        fn handler() -> Result<(), warp::Rejection> {
            Err(ApiError::NotFound)?;
            Ok(())
        }

        let rejection = handler().unwrap_err();
        assert!(matches!(
            rejection.find::<ApiError>(),
            Some(ApiError::NotFound)
        ));
    }

    #[test]
    fn database_errors_do_not_leak_into_the_response() {
        let response = ApiError::Internal(String::from("disk on fire")).to_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
