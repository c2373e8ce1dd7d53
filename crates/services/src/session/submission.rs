use std::sync::Arc;
use std::time::Duration;

use exam_core::model::{ResultRecord, SessionId, SubmissionReceipt};
use storage::repository::ResultRepository;

use crate::error::SubmissionError;

/// Bounded exponential backoff for transient result-store failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt ceiling, first try included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy with no delays, for tests that should not sleep.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

/// Serializes one attempt into its final record and persists it exactly once.
///
/// Every retry reuses the same idempotency key, derived from the session id
/// alone, so the result store can de-duplicate if an earlier attempt actually
/// succeeded but its acknowledgment was lost.
#[derive(Clone)]
pub struct SubmissionPipeline {
    results: Arc<dyn ResultRepository>,
    policy: RetryPolicy,
}

impl SubmissionPipeline {
    #[must_use]
    pub fn new(results: Arc<dyn ResultRepository>, policy: RetryPolicy) -> Self {
        Self { results, policy }
    }

    /// The attempt-independent de-duplication key for a session.
    #[must_use]
    pub fn idempotency_key(session_id: &SessionId) -> String {
        format!("session-{session_id}")
    }

    /// Persist the record, retrying transient failures with exponential
    /// backoff up to the attempt ceiling. `attempts` counts every try made
    /// across the lifetime of the session, including earlier `submit` calls.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::Terminal` on a non-retryable store error and
    /// `SubmissionError::Exhausted` once the ceiling is hit. The caller keeps
    /// the record; nothing is discarded on failure.
    pub async fn submit(
        &self,
        record: &ResultRecord,
        attempts: &mut u32,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let key = Self::idempotency_key(&record.session_id);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut delay = self.policy.base_delay;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(self.policy.max_delay);
            }
            *attempts += 1;

            match self.results.persist(&key, record).await {
                Ok(receipt) => {
                    tracing::info!(
                        session = %record.session_id,
                        attempt,
                        "result persisted"
                    );
                    return Ok(receipt);
                }
                Err(error) if error.is_transient() => {
                    tracing::warn!(
                        session = %record.session_id,
                        attempt,
                        %error,
                        "result store unavailable, will retry"
                    );
                    last_error = Some(error);
                }
                Err(error) => return Err(SubmissionError::Terminal(error)),
            }
        }

        Err(SubmissionError::Exhausted {
            attempts: *attempts,
            source: last_error.unwrap_or_else(|| {
                storage::repository::StorageError::Connection("no attempt made".to_string())
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use exam_core::model::ExamId;
    use exam_core::time::fixed_now;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use storage::repository::StorageError;

    /// Fails with a transient error a fixed number of times, then succeeds.
    struct FlakyResults {
        failures_left: AtomicU32,
        stored: Mutex<Vec<String>>,
    }

    impl FlakyResults {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                stored: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ResultRepository for FlakyResults {
        async fn persist(
            &self,
            idempotency_key: &str,
            _record: &ResultRecord,
        ) -> Result<SubmissionReceipt, StorageError> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StorageError::Connection("network down".to_string()));
            }
            self.stored
                .lock()
                .unwrap()
                .push(idempotency_key.to_string());
            Ok(SubmissionReceipt {
                idempotency_key: idempotency_key.to_string(),
                stored_at: Utc::now(),
            })
        }

        async fn find(
            &self,
            idempotency_key: &str,
        ) -> Result<Option<SubmissionReceipt>, StorageError> {
            let stored = self.stored.lock().unwrap();
            Ok(stored.iter().any(|k| k == idempotency_key).then(|| {
                SubmissionReceipt {
                    idempotency_key: idempotency_key.to_string(),
                    stored_at: Utc::now(),
                }
            }))
        }
    }

    fn record() -> ResultRecord {
        ResultRecord {
            session_id: SessionId::new(),
            exam_id: ExamId::new("listening-1"),
            answers: BTreeMap::new(),
            flags: BTreeSet::new(),
            elapsed_seconds: 10,
            submitted_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let results = Arc::new(FlakyResults::new(2));
        let pipeline = SubmissionPipeline::new(results.clone(), RetryPolicy::immediate(5));
        let record = record();
        let mut attempts = 0;

        let receipt = pipeline.submit(&record, &mut attempts).await.unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(
            receipt.idempotency_key,
            SubmissionPipeline::idempotency_key(&record.session_id)
        );
        // Every retry used the same key.
        let stored = results.stored.lock().unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn exhausts_after_ceiling() {
        let results = Arc::new(FlakyResults::new(10));
        let pipeline = SubmissionPipeline::new(results, RetryPolicy::immediate(3));
        let mut attempts = 0;

        let err = pipeline.submit(&record(), &mut attempts).await.unwrap_err();

        assert_eq!(attempts, 3);
        assert!(matches!(err, SubmissionError::Exhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn terminal_errors_do_not_retry() {
        struct RejectingResults;

        #[async_trait]
        impl ResultRepository for RejectingResults {
            async fn persist(
                &self,
                _idempotency_key: &str,
                _record: &ResultRecord,
            ) -> Result<SubmissionReceipt, StorageError> {
                Err(StorageError::Unauthorized)
            }

            async fn find(
                &self,
                _idempotency_key: &str,
            ) -> Result<Option<SubmissionReceipt>, StorageError> {
                Ok(None)
            }
        }

        let pipeline = SubmissionPipeline::new(Arc::new(RejectingResults), RetryPolicy::immediate(5));
        let mut attempts = 0;

        let err = pipeline.submit(&record(), &mut attempts).await.unwrap_err();

        assert_eq!(attempts, 1);
        assert!(matches!(err, SubmissionError::Terminal(_)));
    }
}
