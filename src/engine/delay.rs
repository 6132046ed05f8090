//! Cancellable sleep used for retry backoff and inter-batch pauses.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Sleep for `duration`, or return [`Error::Cancelled`] as soon as `cancel`
/// fires. An already-cancelled token wins over a zero-length sleep.
///
/// The timer is dropped together with the losing `select!` branch, so a
/// cancelled wait leaves nothing scheduled behind.
pub async fn delay(duration: Duration, cancel: Option<&CancellationToken>) -> Result<()> {
    let Some(token) = cancel else {
        tokio::time::sleep(duration).await;
        return Ok(());
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn sleeps_full_duration_without_token() {
        let start = Instant::now();
        delay(Duration::from_millis(250), None).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_ok_when_token_never_fires() {
        let token = CancellationToken::new();
        delay(Duration::from_millis(50), Some(&token)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_cuts_the_wait_short() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = delay(Duration::from_secs(60), Some(&token))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn pre_cancelled_token_fails_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        let err = delay(Duration::ZERO, Some(&token)).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
