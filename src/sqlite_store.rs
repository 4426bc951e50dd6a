//! SQLite [`Store`] implementation backed by sqlx.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{
    ChunkRecord, Document, DocumentStats, DocumentStatus, DocumentType, JobStatus, ProcessingJob,
    Tag,
};
use crate::store::Store;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        author: row.get("author"),
        source: row.get("source"),
        language: row.get("language"),
        year: row.get("year"),
        version: row.get("version"),
        document_type: DocumentType::parse(row.get::<String, _>("document_type").as_str()),
        engine: row.get("engine"),
        options_json: row.get("options_json"),
        page_count: row.get("page_count"),
        word_count: row.get("word_count"),
        character_count: row.get("character_count"),
        uploaded_at: row.get("uploaded_at"),
        processed_at: row.get("processed_at"),
        status: DocumentStatus::parse(row.get::<String, _>("status").as_str()),
    }
}

fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> ChunkRecord {
    ChunkRecord {
        id: row.get("id"),
        document_id: row.get("document_id"),
        chunk_index: row.get("chunk_index"),
        text: row.get("text"),
        token_count: row.get("token_count"),
        chunk_type: row.get("chunk_type"),
        page_number: row.get("page_number"),
        section_title: row.get("section_title"),
        table_id: row.get("table_id"),
        figure_id: row.get("figure_id"),
        start_offset: row.get("start_offset"),
        end_offset: row.get("end_offset"),
        hash: row.get("hash"),
    }
}

fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> ProcessingJob {
    ProcessingJob {
        id: row.get("id"),
        document_id: row.get("document_id"),
        user_id: row.get("user_id"),
        job_type: row.get("job_type"),
        status: JobStatus::parse(row.get::<String, _>("status").as_str()),
        priority: row.get("priority"),
        engine: row.get("engine"),
        options_json: row.get("options_json"),
        progress: row.get("progress"),
        current_step: row.get("current_step"),
        total_steps: row.get("total_steps"),
        error_message: row.get("error_message"),
        retry_count: row.get::<i64, _>("retry_count") as u32,
        max_retries: row.get::<i64, _>("max_retries") as u32,
        cancel_requested: row.get::<i64, _>("cancel_requested") != 0,
        created_at: row.get("created_at"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, owner_id, title, author, source, language, year, version,
                document_type, engine, options_json, page_count, word_count, character_count,
                uploaded_at, processed_at, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.owner_id)
        .bind(&doc.title)
        .bind(&doc.author)
        .bind(&doc.source)
        .bind(&doc.language)
        .bind(doc.year)
        .bind(&doc.version)
        .bind(doc.document_type.as_str())
        .bind(&doc.engine)
        .bind(&doc.options_json)
        .bind(doc.page_count)
        .bind(doc.word_count)
        .bind(doc.character_count)
        .bind(doc.uploaded_at)
        .bind(doc.processed_at)
        .bind(doc.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_document))
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT * FROM documents WHERE status != 'deleted' ORDER BY uploaded_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn update_document_status(&self, id: &str, status: DocumentStatus) -> Result<()> {
        sqlx::query("UPDATE documents SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_document_stats(
        &self,
        id: &str,
        stats: &DocumentStats,
        processed_at: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE documents
            SET page_count = ?, word_count = ?, character_count = ?, processed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(stats.page_count)
        .bind(stats.word_count)
        .bind(stats.character_count)
        .bind(processed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_deleted(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE documents SET status = 'deleted' WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_chunks(&self, document_id: &str, chunks: &[ChunkRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, chunk_index, text, token_count, chunk_type,
                    page_number, section_title, table_id, figure_id, start_offset, end_offset, hash)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(chunk.token_count)
            .bind(&chunk.chunk_type)
            .bind(chunk.page_number)
            .bind(&chunk.section_title)
            .bind(&chunk.table_id)
            .bind(&chunk.figure_id)
            .bind(chunk.start_offset)
            .bind(chunk.end_offset)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query("SELECT * FROM chunks WHERE document_id = ? ORDER BY chunk_index")
            .bind(document_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_chunk).collect())
    }

    async fn create_job(&self, job: &ProcessingJob) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM processing_jobs WHERE document_id = ? AND status IN ('pending', 'running')",
        )
        .bind(&job.document_id)
        .fetch_one(&mut *tx)
        .await?;
        if active > 0 {
            bail!(
                "document {} already has an active processing job",
                job.document_id
            );
        }

        sqlx::query(
            r#"
            INSERT INTO processing_jobs (id, document_id, user_id, job_type, status, priority,
                engine, options_json, progress, current_step, total_steps, error_message,
                retry_count, max_retries, cancel_requested, created_at, started_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.document_id)
        .bind(&job.user_id)
        .bind(&job.job_type)
        .bind(job.status.as_str())
        .bind(job.priority)
        .bind(&job.engine)
        .bind(&job.options_json)
        .bind(job.progress)
        .bind(&job.current_step)
        .bind(job.total_steps)
        .bind(&job.error_message)
        .bind(job.retry_count as i64)
        .bind(job.max_retries as i64)
        .bind(job.cancel_requested as i64)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_job(&self, job: &ProcessingJob) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE processing_jobs
            SET status = ?, progress = ?, current_step = ?, error_message = ?,
                retry_count = ?, started_at = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(job.status.as_str())
        .bind(job.progress)
        .bind(&job.current_step)
        .bind(&job.error_message)
        .bind(job.retry_count as i64)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(&job.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Option<ProcessingJob>> {
        let row = sqlx::query("SELECT * FROM processing_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_job))
    }

    async fn request_cancel(&self, job_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE processing_jobs SET cancel_requested = 1 WHERE id = ? AND status IN ('pending', 'running')",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn cancel_requested(&self, job_id: &str) -> Result<bool> {
        let flagged: Option<i64> =
            sqlx::query_scalar("SELECT cancel_requested FROM processing_jobs WHERE id = ?")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(flagged.unwrap_or(0) != 0)
    }

    async fn tag_document(&self, document_id: &str, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR IGNORE INTO tags (id, name, is_system, usage_count) VALUES (?, ?, 0, 0)")
            .bind(Uuid::new_v4().to_string())
            .bind(name)
            .execute(&mut *tx)
            .await?;

        let tag_id: String = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?")
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO document_tags (document_id, tag_id) VALUES (?, ?)",
        )
        .bind(document_id)
        .bind(&tag_id)
        .execute(&mut *tx)
        .await?;

        // Counter moves only when an association was actually added.
        if inserted.rows_affected() > 0 {
            sqlx::query("UPDATE tags SET usage_count = usage_count + 1 WHERE id = ?")
                .bind(&tag_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn untag_document(&self, document_id: &str, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM document_tags WHERE document_id = ? AND tag_id = (SELECT id FROM tags WHERE name = ?)",
        )
        .bind(document_id)
        .bind(name)
        .execute(&mut *tx)
        .await?;

        if removed.rows_affected() > 0 {
            sqlx::query(
                "UPDATE tags SET usage_count = MAX(usage_count - 1, 0) WHERE name = ?",
            )
            .bind(name)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn document_tags(&self, document_id: &str) -> Result<Vec<Tag>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name, t.is_system, t.usage_count
            FROM tags t
            JOIN document_tags dt ON dt.tag_id = t.id
            WHERE dt.document_id = ?
            ORDER BY t.name
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Tag {
                id: row.get("id"),
                name: row.get("name"),
                is_system: row.get::<i64, _>("is_system") != 0,
                usage_count: row.get("usage_count"),
            })
            .collect())
    }

    async fn get_tag(&self, name: &str) -> Result<Option<Tag>> {
        let row = sqlx::query("SELECT * FROM tags WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| Tag {
            id: row.get("id"),
            name: row.get("name"),
            is_system: row.get::<i64, _>("is_system") != 0,
            usage_count: row.get("usage_count"),
        }))
    }
}
