//! Coursebook catalog: upload, list, fetch, delete.
//!
//! Uploading stores the raw PDF bytes in the [`BlobStore`](crate::storage::BlobStore)
//! and records a `pdfs` row with status `uploaded`. Text extraction and
//! embedding happen later in [`crate::ingest::process_pdf`].

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::context::AppContext;
use crate::db::now_ts;
use crate::error::StudyError;
use crate::extract::looks_like_pdf;
use crate::models::{Pdf, PdfStatus};
use crate::storage::sanitize_file_name;

const PDF_COLUMNS: &str = "id, file_name, storage_path, size_bytes, status, error, chunk_count, embedding_model, created_at, updated_at";

/// Store an uploaded coursebook and create its catalog record.
pub async fn upload_pdf(ctx: &AppContext, file_name: &str, bytes: &[u8]) -> Result<Pdf> {
    if bytes.is_empty() {
        return Err(StudyError::invalid("no file provided in the request body").into());
    }
    let limit = ctx.config.storage.max_upload_bytes;
    if bytes.len() > limit {
        return Err(StudyError::TooLarge { limit }.into());
    }
    if !looks_like_pdf(bytes) {
        return Err(StudyError::invalid("uploaded file is not a PDF").into());
    }

    let file_name = sanitize_file_name(file_name);
    let storage_path = ctx.blobs.put(&file_name, bytes).await?;
    let id = Uuid::new_v4().to_string();
    let now = now_ts();

    let inserted = sqlx::query(
        r#"
        INSERT INTO pdfs (id, file_name, storage_path, size_bytes, status, chunk_count, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&file_name)
    .bind(&storage_path)
    .bind(bytes.len() as i64)
    .bind(PdfStatus::Uploaded.as_str())
    .bind(now)
    .bind(now)
    .execute(&ctx.pool)
    .await;

    if let Err(e) = inserted {
        // Don't leave an orphaned file behind.
        ctx.blobs.delete(&storage_path).await.ok();
        return Err(e.into());
    }

    tracing::info!(pdf_id = %id, file_name = %file_name, size = bytes.len(), "coursebook uploaded");
    get_pdf(ctx, &id).await
}

/// All coursebooks, newest first.
pub async fn list_pdfs(ctx: &AppContext) -> Result<Vec<Pdf>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM pdfs ORDER BY created_at DESC, rowid DESC",
        PDF_COLUMNS
    ))
    .fetch_all(&ctx.pool)
    .await?;

    Ok(rows.iter().map(row_to_pdf).collect())
}

pub async fn get_pdf(ctx: &AppContext, id: &str) -> Result<Pdf> {
    let row = sqlx::query(&format!("SELECT {} FROM pdfs WHERE id = ?", PDF_COLUMNS))
        .bind(id)
        .fetch_optional(&ctx.pool)
        .await?;

    match row {
        Some(row) => Ok(row_to_pdf(&row)),
        None => Err(StudyError::not_found("pdf", id).into()),
    }
}

/// A coursebook record together with its stored file.
pub async fn read_pdf_file(ctx: &AppContext, id: &str) -> Result<(Pdf, Vec<u8>)> {
    let pdf = get_pdf(ctx, id).await?;
    let bytes = ctx.blobs.get(&pdf.storage_path).await?;
    Ok((pdf, bytes))
}

/// Fetch a coursebook that has been processed successfully.
pub async fn get_ready_pdf(ctx: &AppContext, id: &str) -> Result<Pdf> {
    let pdf = get_pdf(ctx, id).await?;
    if pdf.status != PdfStatus::Ready {
        return Err(StudyError::invalid(format!(
            "pdf {} is not processed yet (status: {})",
            id,
            pdf.status.as_str()
        ))
        .into());
    }
    Ok(pdf)
}

/// Delete a coursebook, everything derived from it, and its stored file.
pub async fn delete_pdf(ctx: &AppContext, id: &str) -> Result<()> {
    let pdf = get_pdf(ctx, id).await?;

    let mut tx = ctx.pool.begin().await?;
    sqlx::query(
        "DELETE FROM messages WHERE conversation_id IN (SELECT id FROM conversations WHERE pdf_id = ?)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM conversations WHERE pdf_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "DELETE FROM quiz_attempts WHERE quiz_id IN (SELECT id FROM quizzes WHERE pdf_id = ?)",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM quizzes WHERE pdf_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chunk_vectors WHERE pdf_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chunks WHERE pdf_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM pdfs WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    ctx.blobs.delete(&pdf.storage_path).await?;
    tracing::info!(pdf_id = %id, "coursebook deleted");
    Ok(())
}

pub(crate) async fn mark_failed(ctx: &AppContext, id: &str, message: &str) -> Result<()> {
    sqlx::query("UPDATE pdfs SET status = ?, error = ?, updated_at = ? WHERE id = ?")
        .bind(PdfStatus::Failed.as_str())
        .bind(message)
        .bind(now_ts())
        .bind(id)
        .execute(&ctx.pool)
        .await?;
    Ok(())
}

fn row_to_pdf(row: &SqliteRow) -> Pdf {
    let status: String = row.get("status");
    Pdf {
        id: row.get("id"),
        file_name: row.get("file_name"),
        storage_path: row.get("storage_path"),
        size_bytes: row.get("size_bytes"),
        status: PdfStatus::parse(&status),
        error: row.get("error"),
        chunk_count: row.get("chunk_count"),
        embedding_model: row.get("embedding_model"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
