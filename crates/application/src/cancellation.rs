use std::future::Future;
use std::time::Duration;

use sessionlock_core::{AppError, AppResult};
use tokio_util::sync::CancellationToken;

/// Runs one store call, racing it against cancellation and an optional bound.
///
/// Cancellation wins ties so an already-cancelled token never reaches the
/// store.
pub(crate) async fn run_store_call<T, F>(
    cancel: &CancellationToken,
    limit: Option<Duration>,
    describe: impl Fn() -> String,
    call: F,
) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AppError::Cancelled(describe())),
        result = bounded(limit, call) => result.map_err(|error| match error {
            BoundedError::Store(error) => error,
            BoundedError::Elapsed(limit) => AppError::StoreUnavailable(format!(
                "{} timed out after {}ms",
                describe(),
                limit.as_millis()
            )),
        }),
    }
}

enum BoundedError {
    Store(AppError),
    Elapsed(Duration),
}

async fn bounded<T, F>(limit: Option<Duration>, call: F) -> Result<T, BoundedError>
where
    F: Future<Output = AppResult<T>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result.map_err(BoundedError::Store),
            Err(_) => Err(BoundedError::Elapsed(limit)),
        },
        None => call.await.map_err(BoundedError::Store),
    }
}
