use exam_core::model::{ExamDefinition, ExamId};
use sqlx::Row;

use super::{SqliteRepository, mapping::{conn, ser}};
use crate::repository::{ExamRecord, ExamRepository, StorageError};

#[async_trait::async_trait]
impl ExamRepository for SqliteRepository {
    async fn put_exam(&self, definition: &ExamDefinition) -> Result<(), StorageError> {
        let record = ExamRecord::from_definition(definition);
        let definition_json = serde_json::to_string(&record).map_err(ser)?;

        sqlx::query(
            r"
                INSERT INTO exams (id, title, duration_seconds, contiguous_sections, definition_json)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    duration_seconds = excluded.duration_seconds,
                    contiguous_sections = excluded.contiguous_sections,
                    definition_json = excluded.definition_json
            ",
        )
        .bind(definition.id().as_str())
        .bind(definition.title())
        .bind(i64::from(definition.duration_seconds()))
        .bind(i64::from(definition.contiguous_sections()))
        .bind(definition_json)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_exam(&self, id: &ExamId) -> Result<ExamDefinition, StorageError> {
        let row = sqlx::query("SELECT definition_json FROM exams WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        let definition_json: String = row.try_get("definition_json").map_err(ser)?;
        let record: ExamRecord = serde_json::from_str(&definition_json).map_err(ser)?;
        record.into_definition().map_err(ser)
    }
}
