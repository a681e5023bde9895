//! Token-bucket limiter for remote calls
//!
//! Wraps a Governor direct limiter. Every listing and transfer call made by
//! the pipeline goes through one shared [`RpcLimiter`], so the producer and
//! all workers draw from a single budget.

use crate::error::{GifSyncError, Result};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::{InMemoryState, NotKeyed}};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Shared rate budget for remote calls
pub struct RpcLimiter {
    /// None means unlimited
    limiter: Option<Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>>,
    interval: Duration,
    burst: u32,
}

impl RpcLimiter {
    /// Create a limiter admitting `burst` calls at once, then one call per `interval`
    ///
    /// # Example
    /// ```
    /// use gifsync::throttle::RpcLimiter;
    /// use std::time::Duration;
    /// let limiter = RpcLimiter::new(Duration::from_millis(100), 3).unwrap();
    /// assert!(limiter.try_acquire());
    /// ```
    pub fn new(interval: Duration, burst: u32) -> Result<Self> {
        let quota = Quota::with_period(interval)
            .ok_or_else(|| GifSyncError::config("rate interval must be greater than zero"))?;
        let burst_size = NonZeroU32::new(burst)
            .ok_or_else(|| GifSyncError::config("rate burst must be at least 1"))?;

        Ok(Self {
            limiter: Some(Arc::new(RateLimiter::direct(quota.allow_burst(burst_size)))),
            interval,
            burst,
        })
    }

    /// A limiter that never throttles
    pub fn unlimited() -> Self {
        Self {
            limiter: None,
            interval: Duration::ZERO,
            burst: 0,
        }
    }

    /// Wait for a token, or give up when `cancel` fires
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(GifSyncError::Cancelled);
        }

        let Some(limiter) = &self.limiter else {
            return Ok(());
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GifSyncError::Cancelled),
            _ = limiter.until_ready() => Ok(()),
        }
    }

    /// Take a token if one is available right now
    pub fn try_acquire(&self) -> bool {
        match &self.limiter {
            Some(limiter) => limiter.check().is_ok(),
            None => true,
        }
    }

    /// Minimum spacing between tokens (zero when unlimited)
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Burst size (zero when unlimited)
    pub fn burst(&self) -> u32 {
        self.burst
    }

    pub fn is_unlimited(&self) -> bool {
        self.limiter.is_none()
    }
}

impl Clone for RpcLimiter {
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.as_ref().map(Arc::clone),
            interval: self.interval,
            burst: self.burst,
        }
    }
}

impl std::fmt::Debug for RpcLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLimiter")
            .field("interval", &self.interval)
            .field("burst", &self.burst)
            .field("unlimited", &self.is_unlimited())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_invalid_configuration() {
        assert!(RpcLimiter::new(Duration::ZERO, 3).is_err());
        assert!(RpcLimiter::new(Duration::from_millis(100), 0).is_err());
    }

    #[test]
    fn test_burst_then_throttle() {
        let limiter = RpcLimiter::new(Duration::from_secs(3600), 3).unwrap();
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_clones_share_budget() {
        let limiter = RpcLimiter::new(Duration::from_secs(3600), 2).unwrap();
        let other = limiter.clone();
        assert!(limiter.try_acquire());
        assert!(other.try_acquire());
        assert!(!limiter.try_acquire());
        assert!(!other.try_acquire());
    }

    #[tokio::test]
    async fn test_acquire_spaces_calls() {
        let limiter = RpcLimiter::new(Duration::from_millis(50), 1).unwrap();
        let cancel = CancellationToken::new();

        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire(&cancel).await.unwrap();
        }
        // One burst token, then two refills
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_wait() {
        let limiter = RpcLimiter::new(Duration::from_secs(3600), 1).unwrap();
        let cancel = CancellationToken::new();
        limiter.acquire(&cancel).await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { limiter.acquire(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("acquire did not return after cancellation")
            .unwrap();
        assert!(matches!(result, Err(GifSyncError::Cancelled)));
    }

    #[tokio::test]
    async fn test_unlimited_respects_cancellation() {
        let limiter = RpcLimiter::unlimited();
        let cancel = CancellationToken::new();
        assert!(limiter.acquire(&cancel).await.is_ok());
        assert!(limiter.try_acquire());

        cancel.cancel();
        assert!(limiter.acquire(&cancel).await.unwrap_err().is_cancelled());
    }
}
