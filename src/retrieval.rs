//! Nearest-neighbour retrieval over stored chunk vectors.
//!
//! Vectors are loaded from SQLite and compared to the query embedding with
//! cosine similarity in Rust. Only chunks scoring strictly above the
//! threshold are kept; results are ordered by similarity (desc), then chunk
//! index (asc), then chunk id, so equal scores always come back in the same order.

use anyhow::Result;
use sqlx::Row;

use crate::context::AppContext;
use crate::embedding::{self, blob_to_vec, cosine_similarity};
use crate::error::StudyError;
use crate::models::MatchedChunk;

/// A stored chunk with its decoded vector.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk_id: String,
    pub pdf_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub vector: Vec<f32>,
}

/// Score, filter and order candidates against a query vector.
///
/// Candidates whose dimensionality differs from the query are skipped.
pub fn rank_matches(
    query: &[f32],
    candidates: Vec<Candidate>,
    threshold: f32,
    count: usize,
) -> Vec<MatchedChunk> {
    let mut matches: Vec<MatchedChunk> = candidates
        .into_iter()
        .filter(|c| c.vector.len() == query.len())
        .filter_map(|c| {
            let similarity = cosine_similarity(query, &c.vector);
            (similarity > threshold).then(|| MatchedChunk {
                chunk_id: c.chunk_id,
                pdf_id: c.pdf_id,
                chunk_index: c.chunk_index,
                similarity,
                content: c.content,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk_index.cmp(&b.chunk_index))
            .then(a.chunk_id.cmp(&b.chunk_id))
    });
    matches.truncate(count);
    matches
}

/// Match stored chunks against a query embedding.
///
/// With `pdf_id` set, only that coursebook's chunks are considered.
pub async fn match_chunks(
    ctx: &AppContext,
    query_embedding: &[f32],
    pdf_id: Option<&str>,
    threshold: f32,
    count: usize,
) -> Result<Vec<MatchedChunk>> {
    let rows = sqlx::query(
        r#"
        SELECT cv.chunk_id, cv.pdf_id, cv.embedding, c.chunk_index, c.content
        FROM chunk_vectors cv
        JOIN chunks c ON c.id = cv.chunk_id
        WHERE ?1 IS NULL OR cv.pdf_id = ?1
        "#,
    )
    .bind(pdf_id)
    .fetch_all(&ctx.pool)
    .await?;

    let candidates: Vec<Candidate> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            Candidate {
                chunk_id: row.get("chunk_id"),
                pdf_id: row.get("pdf_id"),
                chunk_index: row.get("chunk_index"),
                content: row.get("content"),
                vector: blob_to_vec(&blob),
            }
        })
        .collect();

    tracing::debug!(candidates = candidates.len(), ?pdf_id, "scoring chunk vectors");
    Ok(rank_matches(query_embedding, candidates, threshold, count))
}

/// Embed `query` and return the configured number of best matches.
pub async fn retrieve(ctx: &AppContext, query: &str, pdf_id: Option<&str>) -> Result<Vec<MatchedChunk>> {
    if query.trim().is_empty() {
        return Err(StudyError::invalid("query must not be empty").into());
    }
    let query_vec = embedding::embed_query(ctx.embedder.as_ref(), query).await?;
    let retrieval = &ctx.config.retrieval;
    match_chunks(
        ctx,
        &query_vec,
        pdf_id,
        retrieval.match_threshold,
        retrieval.match_count,
    )
    .await
}
