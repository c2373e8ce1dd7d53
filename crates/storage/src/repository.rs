use async_trait::async_trait;
use chrono::Utc;
use exam_core::model::{
    DefinitionError, ExamDefinition, ExamId, ResultRecord, Section, SessionId, SessionSnapshot,
    SubmissionReceipt,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
///
/// `Connection` is the transient class: the submission pipeline retries it.
/// Every other variant is terminal for the operation that produced it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Whether a retry with the same input could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Connection(_))
    }
}

/// Persisted shape for an exam definition.
///
/// Mirrors the domain `ExamDefinition` so repositories can serialize and
/// deserialize without leaking storage concerns into the domain layer; the
/// domain type is rebuilt through its validating constructor on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamRecord {
    pub id: ExamId,
    pub title: String,
    pub sections: Vec<Section>,
    pub duration_seconds: u32,
    pub contiguous_sections: bool,
}

impl ExamRecord {
    #[must_use]
    pub fn from_definition(definition: &ExamDefinition) -> Self {
        Self {
            id: definition.id().clone(),
            title: definition.title().to_owned(),
            sections: definition.sections().to_vec(),
            duration_seconds: definition.duration_seconds(),
            contiguous_sections: definition.contiguous_sections(),
        }
    }

    /// Convert the record back into a domain `ExamDefinition`.
    ///
    /// # Errors
    ///
    /// Returns `DefinitionError` if the persisted shape no longer passes
    /// definition validation.
    pub fn into_definition(self) -> Result<ExamDefinition, DefinitionError> {
        ExamDefinition::new(
            self.id,
            self.title,
            self.sections,
            self.duration_seconds,
            self.contiguous_sections,
        )
    }
}

/// Loader for immutable exam definitions (authored elsewhere).
#[async_trait]
pub trait ExamRepository: Send + Sync {
    /// Persist or update an exam definition.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the definition cannot be stored.
    async fn put_exam(&self, definition: &ExamDefinition) -> Result<(), StorageError>;

    /// Fetch an exam definition by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, `StorageError::Unauthorized`
    /// if the caller may not read it, or other storage errors.
    async fn get_exam(&self, id: &ExamId) -> Result<ExamDefinition, StorageError>;
}

/// Durable store for in-progress session snapshots.
///
/// Writes are best-effort from the engine's point of view: a failed write is
/// logged, never surfaced as a blocking error, because the in-memory session
/// stays authoritative until submission.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Persist or replace the snapshot for its session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn save_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), StorageError>;

    /// Load the snapshot for a session, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for storage failures; a missing snapshot is
    /// `Ok(None)`, not an error.
    async fn load_snapshot(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SessionSnapshot>, StorageError>;

    /// Remove the snapshot once the attempt has been durably submitted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete cannot be executed.
    async fn delete_snapshot(&self, session_id: &SessionId) -> Result<(), StorageError>;
}

/// Store of final, authoritative exam results.
///
/// `persist` must be idempotent under the key: re-delivery of a record with a
/// key that was already written stores nothing and returns the receipt of
/// the first write, so a lost acknowledgment can never duplicate a result.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// Persist a result record under an idempotency key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn persist(
        &self,
        idempotency_key: &str,
        record: &ResultRecord,
    ) -> Result<SubmissionReceipt, StorageError>;

    /// Look up the receipt for a key, if a record was already persisted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for storage failures.
    async fn find(&self, idempotency_key: &str) -> Result<Option<SubmissionReceipt>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    exams: Arc<Mutex<HashMap<ExamId, ExamDefinition>>>,
    snapshots: Arc<Mutex<HashMap<SessionId, SessionSnapshot>>>,
    results: Arc<Mutex<HashMap<String, (ResultRecord, SubmissionReceipt)>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct persisted results (test helper).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn result_count(&self) -> usize {
        self.results.lock().expect("results lock").len()
    }

    /// The record persisted under a key, if any (test helper).
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn stored_record(&self, idempotency_key: &str) -> Option<ResultRecord> {
        self.results
            .lock()
            .expect("results lock")
            .get(idempotency_key)
            .map(|(record, _)| record.clone())
    }
}

#[async_trait]
impl ExamRepository for InMemoryRepository {
    async fn put_exam(&self, definition: &ExamDefinition) -> Result<(), StorageError> {
        let mut guard = self
            .exams
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(definition.id().clone(), definition.clone());
        Ok(())
    }

    async fn get_exam(&self, id: &ExamId) -> Result<ExamDefinition, StorageError> {
        let guard = self
            .exams
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(id).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl SnapshotRepository for InMemoryRepository {
    async fn save_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), StorageError> {
        let mut guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(snapshot.session_id, snapshot.clone());
        Ok(())
    }

    async fn load_snapshot(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SessionSnapshot>, StorageError> {
        let guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(session_id).cloned())
    }

    async fn delete_snapshot(&self, session_id: &SessionId) -> Result<(), StorageError> {
        let mut guard = self
            .snapshots
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(session_id);
        Ok(())
    }
}

#[async_trait]
impl ResultRepository for InMemoryRepository {
    async fn persist(
        &self,
        idempotency_key: &str,
        record: &ResultRecord,
    ) -> Result<SubmissionReceipt, StorageError> {
        let mut guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        // First writer wins; re-delivery observes the original receipt.
        if let Some((_, receipt)) = guard.get(idempotency_key) {
            return Ok(receipt.clone());
        }
        let receipt = SubmissionReceipt {
            idempotency_key: idempotency_key.to_owned(),
            stored_at: Utc::now(),
        };
        guard.insert(
            idempotency_key.to_owned(),
            (record.clone(), receipt.clone()),
        );
        Ok(receipt)
    }

    async fn find(&self, idempotency_key: &str) -> Result<Option<SubmissionReceipt>, StorageError> {
        let guard = self
            .results
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(idempotency_key).map(|(_, r)| r.clone()))
    }
}

/// Aggregates the boundary repositories behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub exams: Arc<dyn ExamRepository>,
    pub snapshots: Arc<dyn SnapshotRepository>,
    pub results: Arc<dyn ResultRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let exams: Arc<dyn ExamRepository> = Arc::new(repo.clone());
        let snapshots: Arc<dyn SnapshotRepository> = Arc::new(repo.clone());
        let results: Arc<dyn ResultRepository> = Arc::new(repo);
        Self {
            exams,
            snapshots,
            results,
        }
    }
}
