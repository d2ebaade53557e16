//! Rate-limiting stage

use crate::config::RateLimit;
use crate::request::Request;
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

/// Token-bucket admission control via the governor crate
///
/// Tokens accrue continuously at `rate` per second up to `burst`. Each
/// admission check atomically consumes one token if available, so a single
/// instance can be checked from many tasks at once. Rejected requests are
/// dropped, never queued: the generator and the limiter run decoupled and
/// neither can stall the other.
pub struct RequestRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    limit: RateLimit,
}

/// Admission counts for one run of the stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LimiterStats {
    /// Requests forwarded downstream
    pub admitted: u64,
    /// Requests rejected for lack of tokens
    pub dropped: u64,
}

impl RequestRateLimiter {
    /// Create a new rate limiter
    ///
    /// Returns `None` for a non-positive or non-finite rate, or a zero
    /// burst; callers validate [`RateLimit`] through
    /// [`RunConfig::validate`](crate::config::RunConfig::validate) first.
    ///
    /// # Examples
    /// ```
    /// use stampede_core::{RateLimit, RequestRateLimiter};
    ///
    /// let limiter = RequestRateLimiter::new(RateLimit::per_second(100.0)).unwrap();
    /// assert!(limiter.try_acquire());
    /// ```
    pub fn new(limit: RateLimit) -> Option<Self> {
        if !limit.rate.is_finite() || limit.rate <= 0.0 {
            return None;
        }
        let burst = NonZeroU32::new(limit.burst)?;
        // One token every 1/rate seconds; sub-1 rates are supported exactly.
        let period = Duration::from_secs_f64(1.0 / limit.rate);
        let quota = Quota::with_period(period)?.allow_burst(burst);

        Some(Self {
            limiter: RateLimiter::direct(quota),
            limit,
        })
    }

    /// Try to take one token without waiting
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Configured limit
    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Forward admitted requests from `input` to `output`
    ///
    /// Runs until `input` reaches end-of-stream, then closes `output` by
    /// dropping it. Stops early if every downstream receiver is gone.
    pub async fn apply(
        &self,
        input: async_channel::Receiver<Request>,
        output: async_channel::Sender<Request>,
    ) -> LimiterStats {
        let mut stats = LimiterStats::default();

        while let Ok(request) = input.recv().await {
            if !self.try_acquire() {
                stats.dropped += 1;
                continue;
            }
            if output.send(request).await.is_err() {
                tracing::debug!("Request queue closed downstream, rate limiter stopping");
                break;
            }
            stats.admitted += 1;
        }

        drop(output);

        tracing::debug!(
            admitted = stats.admitted,
            dropped = stats.dropped,
            "Rate limiter finished"
        );

        stats
    }
}

impl std::fmt::Debug for RequestRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRateLimiter")
            .field("rate", &self.limit.rate)
            .field("burst", &self.limit.burst)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_rate_limiter_rejects_invalid() {
        assert!(RequestRateLimiter::new(RateLimit::per_second(0.0)).is_none());
        assert!(RequestRateLimiter::new(RateLimit::per_second(-10.0)).is_none());
        assert!(RequestRateLimiter::new(RateLimit::per_second(f64::INFINITY)).is_none());
        assert!(RequestRateLimiter::new(RateLimit::per_second(10.0).with_burst(0)).is_none());
    }

    #[test]
    fn test_burst_never_exceeded() {
        let limiter = RequestRateLimiter::new(RateLimit::per_second(1.0).with_burst(5)).unwrap();

        let admitted = (0..100).filter(|_| limiter.try_acquire()).count();
        assert_eq!(admitted, 5);
    }

    #[test]
    fn test_admitted_rate_converges() {
        let limiter = RequestRateLimiter::new(RateLimit::per_second(200.0).with_burst(10)).unwrap();

        let start = Instant::now();
        let mut admitted = 0u64;
        while start.elapsed() < Duration::from_millis(500) {
            if limiter.try_acquire() {
                admitted += 1;
            }
            std::thread::sleep(Duration::from_micros(100));
        }

        // burst + rate * window = 10 + 100
        assert!(
            (95..=125).contains(&admitted),
            "admitted {} outside expected window",
            admitted
        );
    }

    #[tokio::test]
    async fn test_apply_drops_and_closes() {
        let limiter = RequestRateLimiter::new(RateLimit::per_second(1.0).with_burst(10)).unwrap();

        let (in_tx, in_rx) = async_channel::bounded(128);
        for _ in 0..100 {
            in_tx.send(Request::get("http://localhost")).await.unwrap();
        }
        drop(in_tx);

        let (out_tx, out_rx) = async_channel::unbounded();
        let stats = limiter.apply(in_rx, out_tx).await;

        assert_eq!(stats.admitted, 10);
        assert_eq!(stats.dropped, 90);

        let mut forwarded = 0;
        while out_rx.recv().await.is_ok() {
            forwarded += 1;
        }
        assert_eq!(forwarded, 10);
    }

    #[tokio::test]
    async fn test_apply_stops_when_downstream_gone() {
        let limiter = RequestRateLimiter::new(RateLimit::per_second(1000.0)).unwrap();
        let (in_tx, in_rx) = async_channel::bounded(4);
        let (out_tx, out_rx) = async_channel::bounded(4);
        drop(out_rx);

        in_tx.send(Request::get("http://localhost")).await.unwrap();
        let stats = limiter.apply(in_rx, out_tx).await;
        assert_eq!(stats.admitted, 0);
        // limiter dropped its receiver, so the generator side sees the closure
        assert!(in_tx.send(Request::get("http://localhost")).await.is_err());
    }

    #[test]
    fn test_rate_limiter_debug() {
        let limiter = RequestRateLimiter::new(RateLimit::per_second(100.0)).unwrap();
        let debug = format!("{:?}", limiter);
        assert!(debug.contains("RequestRateLimiter"));
        assert!(debug.contains("100.0"));
    }
}
