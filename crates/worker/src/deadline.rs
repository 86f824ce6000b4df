//! Time limits on store and queue calls made by the polling loops.

use std::future::Future;
use std::time::Duration;

use stax_core::error::CoreError;

/// Default limit on a single store or queue call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Which collaborator a bounded call goes to; picks the error on expiry.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Callee {
    Store,
    Queue,
}

/// Await `call` for at most `limit`. Expiry drops the call and surfaces as
/// a transient store or queue error.
pub(crate) async fn bounded<T, F>(
    callee: Callee,
    operation: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, CoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            let message = format!("{operation} did not answer within {}ms", limit.as_millis());
            Err(match callee {
                Callee::Store => CoreError::Store(message),
                Callee::Queue => CoreError::Queue(message),
            })
        }
    }
}
