//! Token bucket rate limiting.
//!
//! Buckets refill lazily on each admission check instead of from a background
//! ticker. Refill is computed in whole tokens from the time elapsed since the
//! last refill; `last_refill` only advances when at least one token is added,
//! so fractional progress is never thrown away.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::routing::Route;

const REFILL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct BucketState {
    tokens: u64,
    last_refill: Instant,
}

/// A single token bucket guarded by a mutex.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u64,
    refill_rate: u64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket. `capacity` and `refill_rate` are clamped to at least 1.
    pub fn new(capacity: u64, refill_rate: u64) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            refill_rate: refill_rate.max(1),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token if available. Returns false when the caller should be rejected.
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last_refill);
        let refill = elapsed.as_nanos() * u128::from(self.refill_rate)
            / REFILL_INTERVAL.as_nanos();

        if refill > 0 {
            let refill = u64::try_from(refill).unwrap_or(u64::MAX);
            state.tokens = state.tokens.saturating_add(refill).min(self.capacity);
            state.last_refill = now;
        }

        if state.tokens > 0 {
            state.tokens -= 1;
            true
        } else {
            false
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> u64 {
        self.refill_rate
    }

    /// Tokens currently held, without refilling.
    #[cfg(test)]
    pub fn available(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tokens
    }
}

/// Which bucket admitted or rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterScope {
    Route,
    Global,
}

impl LimiterScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimiterScope::Route => "route",
            LimiterScope::Global => "global",
        }
    }
}

/// Per-route buckets plus one shared fallback bucket.
///
/// Built once at startup; only the buckets' internal state changes afterwards.
#[derive(Debug)]
pub struct LimiterRegistry {
    routes: HashMap<String, Arc<TokenBucket>>,
    global: Arc<TokenBucket>,
}

impl LimiterRegistry {
    /// Give every route with a positive QPS a bucket of capacity `2 * qps`
    /// refilling at `qps` tokens per second.
    pub fn new<'a>(routes: impl IntoIterator<Item = &'a Route>, global: &RateLimitConfig) -> Self {
        let routes = routes
            .into_iter()
            .filter(|route| route.qps > 0)
            .map(|route| {
                tracing::debug!(
                    path = %route.path,
                    qps = route.qps,
                    burst = route.qps.saturating_mul(2),
                    "Dedicated rate limiter created"
                );
                (
                    route.path.clone(),
                    Arc::new(TokenBucket::new(route.qps.saturating_mul(2), route.qps)),
                )
            })
            .collect();

        Self {
            routes,
            global: Arc::new(TokenBucket::new(global.capacity, global.rate)),
        }
    }

    /// The bucket responsible for `path`.
    pub fn bucket_for(&self, path: &str) -> (&TokenBucket, LimiterScope) {
        match self.routes.get(path) {
            Some(bucket) => (bucket.as_ref(), LimiterScope::Route),
            None => (self.global.as_ref(), LimiterScope::Global),
        }
    }

    /// Run an admission check for `path`.
    pub fn check(&self, path: &str) -> Result<LimiterScope, LimiterScope> {
        let (bucket, scope) = self.bucket_for(path);
        if bucket.allow() {
            Ok(scope)
        } else {
            Err(scope)
        }
    }

    pub fn dedicated_count(&self) -> usize {
        self.routes.len()
    }

    #[cfg(test)]
    pub fn global(&self) -> &TokenBucket {
        &self.global
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn drain(bucket: &TokenBucket) -> usize {
        std::iter::from_fn(|| bucket.allow().then_some(())).count()
    }

    fn route(path: &str, qps: u64) -> Route {
        Route {
            path: path.to_string(),
            target: "http://127.0.0.1:9000".to_string(),
            qps,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_exactly_capacity_without_elapsed_time() {
        let bucket = TokenBucket::new(5, 1);
        for _ in 0..5 {
            assert!(bucket.allow());
        }
        assert!(!bucket.allow());
        assert_eq!(bucket.available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_interval_refills_one_token() {
        let bucket = TokenBucket::new(4, 2);
        assert_eq!(drain(&bucket), 4);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(bucket.allow());
        assert!(!bucket.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_k_intervals_refill_k_tokens() {
        let bucket = TokenBucket::new(10, 4);
        assert_eq!(drain(&bucket), 10);

        // 3 intervals of 1/4 s each
        tokio::time::advance(Duration::from_millis(750)).await;
        assert_eq!(drain(&bucket), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_saturates_at_capacity() {
        let bucket = TokenBucket::new(3, 100);
        assert!(bucket.allow());

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(drain(&bucket), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fractional_progress_is_not_lost() {
        let bucket = TokenBucket::new(1, 1);
        assert!(bucket.allow());

        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(!bucket.allow());

        // 600ms + 400ms crosses a full interval since the last refill
        tokio::time::advance(Duration::from_millis(400)).await;
        assert!(bucket.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_never_double_admit() {
        const CALLERS: usize = 64;
        const TOKENS: u64 = 20;

        let bucket = Arc::new(TokenBucket::new(TOKENS, 1));
        let admitted = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(CALLERS));
        let runtime = tokio::runtime::Handle::current();

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let bucket = bucket.clone();
                let admitted = admitted.clone();
                let barrier = barrier.clone();
                let runtime = runtime.clone();
                std::thread::spawn(move || {
                    // share the paused clock so no refill can sneak in
                    let _clock = runtime.enter();
                    barrier.wait();
                    if bucket.allow() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), TOKENS as usize);
    }

    #[test]
    fn test_zero_parameters_are_clamped() {
        let bucket = TokenBucket::new(0, 0);
        assert_eq!(bucket.capacity(), 1);
        assert_eq!(bucket.refill_rate(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_positive_qps_route_gets_a_bucket() {
        let routes = [route("/a", 1), route("/b", 0), route("/c", 3)];
        let registry = LimiterRegistry::new(routes.iter(), &RateLimitConfig::default());

        assert_eq!(registry.dedicated_count(), 2);

        let (a, scope) = registry.bucket_for("/a");
        assert_eq!(scope, LimiterScope::Route);
        assert_eq!(a.capacity(), 2);

        let (c, scope) = registry.bucket_for("/c");
        assert_eq!(scope, LimiterScope::Route);
        assert_eq!((c.capacity(), c.refill_rate()), (6, 3));

        assert_eq!(registry.bucket_for("/b").1, LimiterScope::Global);
        assert_eq!(registry.bucket_for("/unknown").1, LimiterScope::Global);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmatched_paths_share_the_global_bucket() {
        let global = RateLimitConfig {
            capacity: 2,
            rate: 1,
        };
        let registry = LimiterRegistry::new(std::iter::empty(), &global);

        assert_eq!(registry.check("/x"), Ok(LimiterScope::Global));
        assert_eq!(registry.check("/y"), Ok(LimiterScope::Global));
        assert_eq!(registry.check("/z"), Err(LimiterScope::Global));
        assert_eq!(registry.global().available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_buckets_are_independent() {
        let routes = [route("/a", 1), route("/b", 1)];
        let registry = LimiterRegistry::new(routes.iter(), &RateLimitConfig::default());

        assert!(registry.check("/a").is_ok());
        assert!(registry.check("/a").is_ok());
        assert_eq!(registry.check("/a"), Err(LimiterScope::Route));
        assert_eq!(registry.check("/b"), Ok(LimiterScope::Route));
    }
}
