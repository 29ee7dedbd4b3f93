use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::DbAccessError;

/// Run `operation` until it finishes or `token` is cancelled.
///
/// A cancelled in-transaction call leaves the session open: nothing is rolled
/// back, and the caller still commits or rolls back explicitly.
///
/// ```rust
/// use db_access::prelude::*;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let token = CancellationToken::new();
/// token.cancel();
/// let result: Result<(), _> = with_cancellation(&token, std::future::pending()).await;
/// assert!(matches!(result, Err(DbAccessError::Cancelled)));
/// # }
/// ```
///
/// # Errors
/// Returns [`DbAccessError::Cancelled`] if the token fires first, otherwise
/// whatever `operation` returns.
pub async fn with_cancellation<T, F>(
    token: &CancellationToken,
    operation: F,
) -> Result<T, DbAccessError>
where
    F: Future<Output = Result<T, DbAccessError>>,
{
    tokio::select! {
        biased;
        () = token.cancelled() => {
            tracing::debug!("database call cancelled");
            Err(DbAccessError::Cancelled)
        }
        result = operation => result,
    }
}
