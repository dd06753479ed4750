//! Receive helpers for manager subscriptions

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration, Instant};

/// Long enough for any in-process manager round trip
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// For asserting that nothing arrives
pub const SHORT_TEST_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecvTimeoutError {
    #[error("receive operation timed out")]
    Timeout,
    #[error("channel closed")]
    Closed,
}

/// Next message, or an error once `duration` passes or the sender is gone
pub async fn recv_timeout<T>(
    rx: &mut mpsc::Receiver<T>,
    duration: Duration,
) -> Result<T, RecvTimeoutError> {
    timeout(duration, rx.recv())
        .await
        .map_err(|_| RecvTimeoutError::Timeout)?
        .ok_or(RecvTimeoutError::Closed)
}

/// Skip messages until `select` returns `Some`, all within one deadline
pub async fn recv_matching<T, U>(
    rx: &mut mpsc::Receiver<T>,
    duration: Duration,
    mut select: impl FnMut(T) -> Option<U>,
) -> Result<U, RecvTimeoutError> {
    let deadline = Instant::now() + duration;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if let Some(selected) = select(recv_timeout(rx, remaining).await?) {
            return Ok(selected);
        }
    }
}

/// Everything already queued, without waiting
pub fn try_drain<T>(rx: &mut mpsc::Receiver<T>) -> Vec<T> {
    let mut results = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        results.push(msg);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recv_timeout() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.send(42).await.unwrap();
        assert_eq!(recv_timeout(&mut rx, SHORT_TEST_TIMEOUT).await, Ok(42));
        assert_eq!(
            recv_timeout(&mut rx, SHORT_TEST_TIMEOUT).await,
            Err(RecvTimeoutError::Timeout)
        );

        drop(tx);
        assert_eq!(
            recv_timeout(&mut rx, SHORT_TEST_TIMEOUT).await,
            Err(RecvTimeoutError::Closed)
        );
    }

    #[tokio::test]
    async fn test_recv_matching_skips_others() {
        let (tx, mut rx) = mpsc::channel(10);
        for i in 0..5 {
            tx.send(i).await.unwrap();
        }

        let found = recv_matching(&mut rx, SHORT_TEST_TIMEOUT, |i| (i > 2).then_some(i * 10)).await;
        assert_eq!(found, Ok(30));
        assert_eq!(try_drain(&mut rx), vec![4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_matching_times_out() {
        let (_tx, mut rx) = mpsc::channel::<u8>(1);
        let found = recv_matching(&mut rx, DEFAULT_TEST_TIMEOUT, Some).await;
        assert_eq!(found, Err(RecvTimeoutError::Timeout));
    }
}
