use chrono::Utc;
use exam_core::model::{SessionId, SessionSnapshot};
use sqlx::Row;

use super::{SqliteRepository, mapping::{conn, ser}};
use crate::repository::{SnapshotRepository, StorageError};

#[async_trait::async_trait]
impl SnapshotRepository for SqliteRepository {
    async fn save_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), StorageError> {
        let state_json = serde_json::to_string(snapshot).map_err(ser)?;

        sqlx::query(
            r"
                INSERT INTO session_snapshots (session_id, exam_id, status, state_json, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(session_id) DO UPDATE SET
                    status = excluded.status,
                    state_json = excluded.state_json,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(snapshot.session_id.to_string())
        .bind(snapshot.exam_id.as_str())
        .bind(snapshot.status.to_string())
        .bind(state_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn load_snapshot(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SessionSnapshot>, StorageError> {
        let row = sqlx::query("SELECT state_json FROM session_snapshots WHERE session_id = ?1")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let state_json: String = row.try_get("state_json").map_err(ser)?;
        let snapshot: SessionSnapshot = serde_json::from_str(&state_json).map_err(ser)?;
        Ok(Some(snapshot))
    }

    async fn delete_snapshot(&self, session_id: &SessionId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM session_snapshots WHERE session_id = ?1")
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
