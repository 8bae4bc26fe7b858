use actix_web::web;
use diesel::SqliteConnection;
use failsafe::backoff::EqualJittered;
use failsafe::failure_policy::{ConsecutiveFailures, OrElse, SuccessRateOverTimeWindow};
use failsafe::{CircuitBreaker, Config, StateMachine};

use crate::db::DbPool;
use crate::error::{ApiError, QueryError};

pub type CircuitBreakerType = StateMachine<
    OrElse<SuccessRateOverTimeWindow<EqualJittered>, ConsecutiveFailures<EqualJittered>>,
    (),
>;

pub fn new_circuit_breaker() -> CircuitBreakerType {
    Config::new().build()
}

/// Runs a data-access call on the blocking pool, guarded by the breaker.
///
/// Only store faults are recorded as failures. Not-found and duplicate
/// outcomes pass through without affecting the breaker state.
pub async fn run_query<T, F>(
    pool: web::Data<DbPool>,
    circuit_breaker: web::Data<CircuitBreakerType>,
    f: F,
) -> Result<T, ApiError>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T, QueryError> + Send + 'static,
    T: Send + 'static,
{
    let outcome = web::block(move || {
        circuit_breaker.call_with(
            |err: &QueryError| err.is_fault(),
            || {
                let mut conn = pool.get()?;
                f(&mut *conn)
            },
        )
    })
    .await?;

    match outcome {
        Ok(value) => Ok(value),
        Err(failsafe::Error::Inner(err)) => Err(err.into()),
        Err(failsafe::Error::Rejected) => {
            log::warn!("circuit breaker open, rejecting store call");
            Err(ApiError::Unavailable)
        }
    }
}
