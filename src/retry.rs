use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::ApprovalError;
use crate::metrics::DecisionMetrics;
use crate::models::csr::CertificateSigningRequest;
use crate::store::CsrStore;

// ── Retry Policy ─────────────────────────────────────────────

/// Bounds for the update-with-retry loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Update calls allowed before giving up with `RetryExhausted`.
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 50,
            max_backoff_ms: 2000,
            jitter_ms: 25,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts. Handy for tests and batch runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_backoff_ms: 0,
            max_backoff_ms: 0,
            jitter_ms: 0,
        }
    }
}

// ── Updater ──────────────────────────────────────────────────

/// Everything an approver needs to persist a decision: the store, the retry
/// bounds, a shutdown signal and (optionally) metrics.
pub struct Updater<'a> {
    pub store: &'a dyn CsrStore,
    pub policy: &'a RetryPolicy,
    pub cancel: &'a CancellationToken,
    pub metrics: Option<&'a DecisionMetrics>,
}

impl<'a> Updater<'a> {
    pub fn new(store: &'a dyn CsrStore, policy: &'a RetryPolicy, cancel: &'a CancellationToken) -> Self {
        Self {
            store,
            policy,
            cancel,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: &'a DecisionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Apply `mutate` to `request` and persist it, re-fetching and
    /// re-applying on every optimistic-concurrency conflict.
    ///
    /// `mutate` returns `false` when its preconditions no longer hold (for
    /// example a concurrent actor already decided the request); the loop then
    /// stops with `Ok(None)` and nothing is written. It runs again against
    /// each freshly fetched object.
    ///
    /// Non-conflict store errors are returned unchanged. After
    /// `policy.max_attempts` conflicting updates the call fails with
    /// `RetryExhausted`.
    pub async fn update_with_retry<F>(
        &self,
        mut request: CertificateSigningRequest,
        mut mutate: F,
    ) -> Result<Option<CertificateSigningRequest>, ApprovalError>
    where
        F: FnMut(&mut CertificateSigningRequest) -> bool + Send,
    {
        let name = request.metadata.name.clone();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if !mutate(&mut request) {
                debug!(csr = %name, attempt, "preconditions no longer hold; nothing to write");
                return Ok(None);
            }

            if self.cancel.is_cancelled() {
                return Err(ApprovalError::Cancelled { name });
            }

            attempt += 1;

            match self.store.update_approval(&request).await {
                Ok(updated) => return Ok(Some(updated)),
                Err(e) if e.is_conflict() => {
                    if let Some(metrics) = self.metrics {
                        metrics.record_conflict();
                    }

                    if attempt >= max_attempts {
                        warn!(
                            csr = %name,
                            attempts = attempt,
                            "exhausted retries updating certificate signing request"
                        );
                        return Err(ApprovalError::RetryExhausted {
                            name,
                            attempts: attempt,
                        });
                    }

                    let wait_duration = calculate_backoff(self.policy, attempt);
                    warn!(
                        csr = %name,
                        "Attempt {}/{} conflicted. Re-fetching in {:?}...",
                        attempt,
                        max_attempts,
                        wait_duration
                    );

                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            return Err(ApprovalError::Cancelled { name });
                        }
                        _ = sleep(wait_duration) => {}
                    }

                    // The object changed under us; start over from the
                    // store's copy so the mutation sees its conditions.
                    request = self.store.get(&name).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn calculate_backoff(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base = policy.base_backoff_ms as f64;
    let max = policy.max_backoff_ms as f64;

    // Exponential: base * 2^(attempt - 1)
    let raw_backoff = base * 2_f64.powi((attempt as i32) - 1);
    let capped_backoff = raw_backoff.min(max);

    let jitter = rand::thread_rng().gen_range(0..=policy.jitter_ms);

    // Float-to-int casts saturate; keep the sum from wrapping too.
    Duration::from_millis((capped_backoff as u64).saturating_add(jitter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;
    use crate::models::csr::CsrCondition;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn approve(req: &mut CertificateSigningRequest) -> bool {
        if req.is_decided() {
            return false;
        }
        req.status.conditions.push(CsrCondition::approved("R", "M"));
        true
    }

    /// Conflicts on every update; counts calls.
    struct AlwaysConflicts {
        inner: MemoryStore,
        updates: AtomicU32,
        gets: AtomicU32,
    }

    #[async_trait]
    impl CsrStore for AlwaysConflicts {
        async fn get(&self, name: &str) -> Result<CertificateSigningRequest, StoreError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(name).await
        }
        async fn update_approval(
            &self,
            request: &CertificateSigningRequest,
        ) -> Result<CertificateSigningRequest, StoreError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Conflict {
                name: request.name().to_string(),
            })
        }
        async fn list(&self) -> Result<Vec<CertificateSigningRequest>, StoreError> {
            self.inner.list().await
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_backoff_ms: 100,
            max_backoff_ms: 500,
            jitter_ms: 0,
        };
        assert_eq!(calculate_backoff(&policy, 1), Duration::from_millis(100));
        assert_eq!(calculate_backoff(&policy, 2), Duration::from_millis(200));
        assert_eq!(calculate_backoff(&policy, 3), Duration::from_millis(400));
        assert_eq!(calculate_backoff(&policy, 4), Duration::from_millis(500));
        assert_eq!(calculate_backoff(&policy, 30), Duration::from_millis(500));
    }

    #[test]
    fn test_backoff_jitter_bounded() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_backoff_ms: 10,
            max_backoff_ms: 10,
            jitter_ms: 5,
        };
        for _ in 0..50 {
            let d = calculate_backoff(&policy, 1).as_millis();
            assert!((10..=15).contains(&d), "backoff {} out of range", d);
        }
    }

    #[test]
    fn test_backoff_saturates_at_extreme_bounds() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_backoff_ms: u64::MAX,
            max_backoff_ms: u64::MAX,
            jitter_ms: 25,
        };
        assert_eq!(calculate_backoff(&policy, 1), Duration::from_millis(u64::MAX));
        assert_eq!(calculate_backoff(&policy, 64), Duration::from_millis(u64::MAX));
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let store = MemoryStore::new();
        let req = store.insert(CertificateSigningRequest::new("a", "u", vec![]));
        let policy = RetryPolicy::immediate(3);
        let cancel = CancellationToken::new();

        let updated = Updater::new(&store, &policy, &cancel)
            .update_with_retry(req, approve)
            .await
            .unwrap()
            .expect("should write");
        assert_eq!(updated.status.conditions.len(), 1);
    }

    #[tokio::test]
    async fn test_exhausts_after_max_attempts() {
        let inner = MemoryStore::new();
        let req = inner.insert(CertificateSigningRequest::new("a", "u", vec![]));
        let store = AlwaysConflicts {
            inner,
            updates: AtomicU32::new(0),
            gets: AtomicU32::new(0),
        };
        let policy = RetryPolicy::immediate(3);
        let cancel = CancellationToken::new();

        let err = Updater::new(&store, &policy, &cancel)
            .update_with_retry(req, approve)
            .await
            .unwrap_err();

        assert!(matches!(err, ApprovalError::RetryExhausted { attempts: 3, .. }));
        assert_eq!(store.updates.load(Ordering::SeqCst), 3);
        // No re-fetch after the final conflict.
        assert_eq!(store.gets.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let store = MemoryStore::new();
        let req = store.insert(CertificateSigningRequest::new("a", "u", vec![]));
        let policy = RetryPolicy::immediate(3);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = Updater::new(&store, &policy, &cancel)
            .update_with_retry(req, approve)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::Cancelled { .. }));
        assert!(!store.get("a").await.unwrap().is_decided());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let inner = MemoryStore::new();
        let req = inner.insert(CertificateSigningRequest::new("a", "u", vec![]));
        let store = AlwaysConflicts {
            inner,
            updates: AtomicU32::new(0),
            gets: AtomicU32::new(0),
        };
        let policy = RetryPolicy {
            max_attempts: 10,
            base_backoff_ms: 60_000,
            max_backoff_ms: 60_000,
            jitter_ms: 0,
        };
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = Updater::new(&store, &policy, &cancel)
            .update_with_retry(req, approve)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::Cancelled { .. }));
        assert_eq!(store.updates.load(Ordering::SeqCst), 1);
    }
}
