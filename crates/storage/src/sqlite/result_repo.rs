use chrono::{DateTime, Utc};
use exam_core::model::{ResultRecord, SubmissionReceipt};
use sqlx::Row;

use super::{SqliteRepository, mapping::{conn, ser}};
use crate::repository::{ResultRepository, StorageError};

fn map_receipt(row: &sqlx::sqlite::SqliteRow) -> Result<SubmissionReceipt, StorageError> {
    let idempotency_key: String = row.try_get("idempotency_key").map_err(ser)?;
    let stored_at: DateTime<Utc> = row.try_get("stored_at").map_err(ser)?;
    Ok(SubmissionReceipt {
        idempotency_key,
        stored_at,
    })
}

#[async_trait::async_trait]
impl ResultRepository for SqliteRepository {
    async fn persist(
        &self,
        idempotency_key: &str,
        record: &ResultRecord,
    ) -> Result<SubmissionReceipt, StorageError> {
        let record_json = serde_json::to_string(record).map_err(ser)?;

        // First writer wins: a re-delivery under an existing key inserts
        // nothing, and the read below returns the original receipt.
        sqlx::query(
            r"
                INSERT INTO exam_results (idempotency_key, session_id, record_json, stored_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(idempotency_key) DO NOTHING
            ",
        )
        .bind(idempotency_key)
        .bind(record.session_id.to_string())
        .bind(record_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let row = sqlx::query(
            "SELECT idempotency_key, stored_at FROM exam_results WHERE idempotency_key = ?1",
        )
        .bind(idempotency_key)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        map_receipt(&row)
    }

    async fn find(&self, idempotency_key: &str) -> Result<Option<SubmissionReceipt>, StorageError> {
        let row = sqlx::query(
            "SELECT idempotency_key, stored_at FROM exam_results WHERE idempotency_key = ?1",
        )
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_receipt).transpose()
    }
}
