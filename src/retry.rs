use std::future::Future;

use crate::error::AppError;

/// Run `op`; if it fails with an auth-flavored error, refresh the session
/// once and run it again. No backoff, no further attempts.
pub async fn with_session_retry<T, Op, OpFut, Refresh, RefreshFut>(
    mut op: Op,
    refresh: Refresh,
) -> Result<T, AppError>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Result<T, AppError>>,
    Refresh: FnOnce() -> RefreshFut,
    RefreshFut: Future<Output = Result<(), AppError>>,
{
    match op().await {
        Err(e) if e.is_auth() => {
            tracing::warn!(error = %e, "operation failed on session, retrying after refresh");
            refresh().await?;
            op().await
        }
        other => other,
    }
}
