use std::sync::Arc;

use exam_core::Clock;
use exam_core::model::{ExamId, SessionId};
use storage::repository::{
    ExamRepository, ResultRepository, SnapshotRepository, Storage, StorageError,
};

use super::controller::SessionController;
use super::submission::{RetryPolicy, SubmissionPipeline};
use crate::error::SessionError;

/// Composition root for exam attempts.
///
/// Holds the storage collaborators and hands out fully wired
/// `SessionController`s; UI screens keep one of these and never touch the
/// repositories directly.
#[derive(Clone)]
pub struct SessionWorkflow {
    clock: Clock,
    exams: Arc<dyn ExamRepository>,
    snapshots: Arc<dyn SnapshotRepository>,
    results: Arc<dyn ResultRepository>,
    retry: RetryPolicy,
}

impl SessionWorkflow {
    #[must_use]
    pub fn new(
        clock: Clock,
        exams: Arc<dyn ExamRepository>,
        snapshots: Arc<dyn SnapshotRepository>,
        results: Arc<dyn ResultRepository>,
    ) -> Self {
        Self {
            clock,
            exams,
            snapshots,
            results,
            retry: RetryPolicy::default(),
        }
    }

    /// Convenience constructor over an assembled `Storage`.
    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.exams),
            Arc::clone(&storage.snapshots),
            Arc::clone(&storage.results),
        )
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Load the exam definition and create a fresh attempt (`NotStarted`;
    /// the caller starts it once the student confirms).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` with `NotFound`/`Unauthorized` from
    /// the definition loader.
    pub async fn begin_attempt(&self, exam_id: &ExamId) -> Result<SessionController, SessionError> {
        let definition = self.exams.get_exam(exam_id).await?;
        let pipeline = SubmissionPipeline::new(Arc::clone(&self.results), self.retry.clone());
        Ok(SessionController::begin(
            Arc::new(definition),
            Arc::clone(&self.snapshots),
            pipeline,
            self.clock.clone(),
        ))
    }

    /// Rebuild an interrupted attempt from its durable snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage(StorageError::NotFound)` when no
    /// snapshot exists for the session, plus everything
    /// [`SessionController::resume`] rejects.
    pub async fn resume_attempt(
        &self,
        session_id: &SessionId,
    ) -> Result<SessionController, SessionError> {
        let snapshot = self
            .snapshots
            .load_snapshot(session_id)
            .await?
            .ok_or(SessionError::Storage(StorageError::NotFound))?;
        let definition = self.exams.get_exam(&snapshot.exam_id).await?;
        let pipeline = SubmissionPipeline::new(Arc::clone(&self.results), self.retry.clone());
        SessionController::resume(
            Arc::new(definition),
            snapshot,
            Arc::clone(&self.snapshots),
            pipeline,
            self.clock.clone(),
        )
    }
}
