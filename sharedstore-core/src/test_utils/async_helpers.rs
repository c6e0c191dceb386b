//! Async test helpers
//!
//! Replication is asynchronous, so most assertions either wait for a
//! listener message or poll a context until it converges.

use std::future::Future;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout, Duration, Instant};

/// Default timeout duration for tests (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Short timeout for tests that expect nothing to arrive (100ms)
pub const SHORT_TEST_TIMEOUT: Duration = Duration::from_millis(100);

/// Interval between polls in [`eventually`]
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Why a listener produced no message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ListenError {
    #[error("no application message within the timeout")]
    Timeout,

    /// Every sender of the channel adapter is gone
    #[error("listener channel closed")]
    Closed,
}

/// Receive from a listener subscription with a timeout
///
/// Lagged subscribers skip ahead to the oldest retained message.
pub async fn recv_broadcast_timeout<T: Clone>(
    rx: &mut broadcast::Receiver<T>,
    duration: Duration,
) -> Result<T, ListenError> {
    let deadline = Instant::now() + duration;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, rx.recv()).await {
            Err(_) => return Err(ListenError::Timeout),
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            Ok(Err(broadcast::error::RecvError::Closed)) => return Err(ListenError::Closed),
        }
    }
}

/// Assert a future completes within duration
pub async fn assert_completes_within<F, T>(duration: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => panic!("Future did not complete within {:?}", duration),
    }
}

/// Poll `check` until it returns true or `duration` elapses
///
/// Returns whether the condition was met.
pub async fn eventually<F, Fut>(duration: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + duration;
    loop {
        if check().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL_INTERVAL).await;
    }
}
