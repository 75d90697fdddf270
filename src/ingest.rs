//! Coursebook processing pipeline.
//!
//! Coordinates the full flow for one coursebook: stored file → text
//! extraction → fixed-window chunking → embedding → storage. Re-processing
//! replaces the previous chunks and vectors in a single transaction, and
//! only after every chunk has been embedded, so a provider failure leaves
//! the old index searchable.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::chunk::chunk_text;
use crate::context::AppContext;
use crate::db::now_ts;
use crate::embedding;
use crate::error::StudyError;
use crate::extract::extract_pdf_text;
use crate::library;
use crate::models::{Chunk, PdfStatus};

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub pdf_id: String,
    pub chunks: usize,
    pub characters: usize,
    pub model: String,
    pub message: String,
}

/// Extract, chunk, embed and store a previously uploaded coursebook.
pub async fn process_pdf(ctx: &AppContext, pdf_id: &str) -> Result<IngestReport> {
    let pdf = library::get_pdf(ctx, pdf_id).await?;
    let bytes = ctx.blobs.get(&pdf.storage_path).await?;

    let text = match extract_pdf_text(&bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(pdf_id, error = %e, "text extraction failed");
            if pdf.status != PdfStatus::Ready {
                library::mark_failed(ctx, pdf_id, &e.to_string()).await?;
            }
            return Err(StudyError::invalid(e.to_string()).into());
        }
    };

    index_text(ctx, pdf_id, &text).await
}

/// Chunk, embed and store already-extracted coursebook text.
pub async fn index_text(ctx: &AppContext, pdf_id: &str, text: &str) -> Result<IngestReport> {
    let pdf = library::get_pdf(ctx, pdf_id).await?;

    // A failed re-process keeps a previously ready index usable.
    if text.trim().is_empty() {
        if pdf.status != PdfStatus::Ready {
            library::mark_failed(ctx, pdf_id, "no extractable text").await?;
        }
        return Err(StudyError::NoText(pdf_id.to_string()).into());
    }

    let chunking = &ctx.config.chunking;
    let chunks = chunk_text(pdf_id, text, chunking.chunk_size, chunking.chunk_overlap);
    tracing::info!(pdf_id, chunks = chunks.len(), "chunked coursebook");

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let vectors = embedding::embed_batched(
        ctx.embedder.as_ref(),
        &texts,
        ctx.config.embedding.batch_size,
    )
    .await?;

    let model = ctx.embedder.model_name().to_string();
    replace_chunks(
        &ctx.pool,
        pdf_id,
        text,
        &chunks,
        &vectors,
        &model,
        ctx.embedder.dims(),
    )
    .await?;

    tracing::info!(pdf_id, chunks = chunks.len(), model = %model, "coursebook indexed");

    Ok(IngestReport {
        pdf_id: pdf_id.to_string(),
        chunks: chunks.len(),
        characters: text.chars().count(),
        model,
        message: format!("Successfully embedded {} chunks.", chunks.len()),
    })
}

async fn replace_chunks(
    pool: &SqlitePool,
    pdf_id: &str,
    text: &str,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
    model: &str,
    dims: usize,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    // Delete old vectors and chunks for this coursebook
    sqlx::query("DELETE FROM chunk_vectors WHERE pdf_id = ?")
        .bind(pdf_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chunks WHERE pdf_id = ?")
        .bind(pdf_id)
        .execute(&mut *tx)
        .await?;

    for (chunk, vector) in chunks.iter().zip(vectors) {
        sqlx::query(
            "INSERT INTO chunks (id, pdf_id, chunk_index, content, hash) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(&chunk.pdf_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.content)
        .bind(&chunk.hash)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO chunk_vectors (chunk_id, pdf_id, model, dims, embedding) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(&chunk.pdf_id)
        .bind(model)
        .bind(dims as i64)
        .bind(embedding::vec_to_blob(vector))
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        r#"
        UPDATE pdfs
        SET status = ?, error = NULL, chunk_count = ?, text_content = ?, embedding_model = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(PdfStatus::Ready.as_str())
    .bind(chunks.len() as i64)
    .bind(text)
    .bind(model)
    .bind(now_ts())
    .bind(pdf_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// The stored extracted text of a processed coursebook.
pub async fn stored_text(ctx: &AppContext, pdf_id: &str) -> Result<String> {
    let text = sqlx::query_scalar::<_, Option<String>>("SELECT text_content FROM pdfs WHERE id = ?")
        .bind(pdf_id)
        .fetch_optional(&ctx.pool)
        .await?
        .flatten();
    text.ok_or_else(|| StudyError::NoText(pdf_id.to_string()).into())
}
