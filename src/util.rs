use std::{future::Future, time::Duration};

use anyhow::{Context, Result, anyhow};
use tokio::time::timeout;

/// Wraps `tokio::time::timeout`, converting elapsed deadlines and inner errors into contextual
/// `anyhow::Error` values for consistent diagnostics.
pub async fn timeout_with_context<F, T, E>(
    duration: Duration,
    future: F,
    context: impl Into<String>,
) -> Result<T>
where
    F: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let context = context.into();
    timeout(duration, future)
        .await
        .map_err(|_| anyhow!("timed out {context}"))?
        .with_context(|| format!("failed while {context}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[tokio::test]
    async fn reports_elapsed_deadline() {
        let err = timeout_with_context(
            Duration::from_millis(10),
            std::future::pending::<Result<(), io::Error>>(),
            "waiting for mirror response",
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "timed out waiting for mirror response");
    }

    #[tokio::test]
    async fn wraps_inner_error() {
        let err = timeout_with_context(
            Duration::from_secs(1),
            async { Err::<(), _>(io::Error::other("refused")) },
            "connecting",
        )
        .await
        .unwrap_err();
        assert_eq!(format!("{err:#}"), "failed while connecting: refused");
    }
}
