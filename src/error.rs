use std::fmt;

use actix_web::{error::BlockingError, http::StatusCode, HttpResponse, ResponseError};
use diesel::r2d2::PoolError;
use serde_json::json;
use thiserror::Error;

/// Which table an outcome refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Dish,
    AllergenLikelihood,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Dish => f.write_str("Dish"),
            Record::AllergenLikelihood => f.write_str("Allergen"),
        }
    }
}

/// Outcome of a data-access call that did not produce a value.
///
/// `NotFound`, `AlreadyExists`, `ReferenceMissing` and `InvalidLikelihood`
/// are expected outcomes. `Database` and `Pool` are faults of the store.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("{0} not found")]
    NotFound(Record),

    #[error("{}", already_exists_message(.0))]
    AlreadyExists(Record),

    #[error("Dish does not exist")]
    ReferenceMissing,

    #[error("Likelihood must be between 0 and 100, got {0}")]
    InvalidLikelihood(i32),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),
}

fn already_exists_message(record: &Record) -> &'static str {
    match record {
        Record::Dish => "Dish already exists",
        Record::AllergenLikelihood => "Allergen likelihood entry already exists for this dish",
    }
}

impl QueryError {
    /// True for store failures, which count against the circuit breaker.
    pub fn is_fault(&self) -> bool {
        matches!(self, QueryError::Database(_) | QueryError::Pool(_))
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("could not connect: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("schema bootstrap failed: {0}")]
    Schema(#[from] diesel::result::Error),
}

/// Error type returned by HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("{0}")]
    Validation(String),

    #[error("Store is not responding")]
    Unavailable,

    #[error("blocking task failed: {0}")]
    Blocking(#[from] BlockingError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Query(QueryError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Query(QueryError::AlreadyExists(_) | QueryError::ReferenceMissing) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Query(QueryError::InvalidLikelihood(_)) | ApiError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Query(QueryError::Database(_) | QueryError::Pool(_))
            | ApiError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let detail = if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("request failed: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status).json(json!({ "detail": detail }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_outcomes_map_to_client_errors() {
        let cases = [
            (QueryError::NotFound(Record::Dish), StatusCode::NOT_FOUND),
            (
                QueryError::AlreadyExists(Record::AllergenLikelihood),
                StatusCode::BAD_REQUEST,
            ),
            (QueryError::ReferenceMissing, StatusCode::BAD_REQUEST),
            (
                QueryError::InvalidLikelihood(101),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (err, status) in cases {
            assert!(!err.is_fault());
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }

    #[test]
    fn store_failures_are_faults_and_hidden() {
        let err = QueryError::Database(diesel::result::Error::NotFound);
        assert!(err.is_fault());
        let api = ApiError::from(err);
        assert_eq!(api.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn messages_match_client_contract() {
        assert_eq!(QueryError::NotFound(Record::Dish).to_string(), "Dish not found");
        assert_eq!(
            QueryError::NotFound(Record::AllergenLikelihood).to_string(),
            "Allergen not found"
        );
        assert_eq!(
            QueryError::AlreadyExists(Record::Dish).to_string(),
            "Dish already exists"
        );
        assert_eq!(
            QueryError::AlreadyExists(Record::AllergenLikelihood).to_string(),
            "Allergen likelihood entry already exists for this dish"
        );
        assert_eq!(ApiError::Unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
