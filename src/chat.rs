//! Grounded question answering with conversation history.
//!
//! A question is embedded, matched against the coursebook's chunks, and the
//! matching text is handed to the chat model through [`CHAT_TEMPLATE`](crate::prompt::CHAT_TEMPLATE).
//! Every exchange is appended to a conversation so it can be listed later.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use crate::context::AppContext;
use crate::db::now_ts;
use crate::error::StudyError;
use crate::library;
use crate::llm::{ChatMessage, ChatRequest};
use crate::models::{Conversation, MatchedChunk, Message, Role};
use crate::prompt;
use crate::retrieval;

/// Reply used when no chunk clears the similarity threshold.
pub const NO_CONTEXT_ANSWER: &str =
    "I couldn't find anything in this coursebook that answers that question. Try rephrasing it or asking about a topic the book covers.";

const TITLE_MAX_CHARS: usize = 60;

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub pdf_id: String,
    pub query: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub conversation_id: String,
    pub sources: Vec<MatchedChunk>,
}

/// Answer a question about one coursebook.
pub async fn ask(ctx: &AppContext, request: &AskRequest) -> Result<ChatAnswer> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(StudyError::invalid("query must not be empty").into());
    }
    library::get_ready_pdf(ctx, &request.pdf_id).await?;

    let existing = match &request.conversation_id {
        Some(id) => {
            let conversation = get_conversation(ctx, id).await?;
            if conversation.pdf_id != request.pdf_id {
                return Err(StudyError::invalid(format!(
                    "conversation {} belongs to a different pdf",
                    id
                ))
                .into());
            }
            Some(conversation)
        }
        None => None,
    };

    let sources = retrieval::retrieve(ctx, query, Some(&request.pdf_id)).await?;
    tracing::info!(
        pdf_id = %request.pdf_id,
        conversation_id = ?request.conversation_id,
        matches = sources.len(),
        "answering question"
    );

    let answer = if sources.is_empty() {
        NO_CONTEXT_ANSWER.to_string()
    } else {
        let context = build_context(&sources);
        let completion = ChatRequest {
            model: ctx.config.llm.model.clone(),
            messages: vec![ChatMessage::user(prompt::chat_prompt(&context, query)?)],
            temperature: ctx.config.llm.temperature,
        };
        ctx.chat.complete(&completion).await?.trim().to_string()
    };

    // Nothing is persisted until the answer exists.
    let conversation_id = record_exchange(ctx, &request.pdf_id, existing, query, &answer).await?;

    Ok(ChatAnswer {
        answer,
        conversation_id,
        sources,
    })
}

/// Join matched chunk contents with blank lines, best match first.
pub fn build_context(sources: &[MatchedChunk]) -> String {
    sources
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// First line of the question, cut to a short title.
pub fn conversation_title(query: &str) -> String {
    let first_line = query.lines().next().unwrap_or_default().trim();
    let mut title: String = first_line.chars().take(TITLE_MAX_CHARS).collect();
    if first_line.chars().count() > TITLE_MAX_CHARS {
        title.push('…');
    }
    title
}

/// Append a question and its answer, creating the conversation first when
/// there is none. Returns the conversation id.
async fn record_exchange(
    ctx: &AppContext,
    pdf_id: &str,
    existing: Option<Conversation>,
    question: &str,
    answer: &str,
) -> Result<String> {
    let now = now_ts();
    let mut tx = ctx.pool.begin().await?;

    let conversation_id = match existing {
        Some(conversation) => conversation.id,
        None => {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO conversations (id, pdf_id, title, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(pdf_id)
            .bind(conversation_title(question))
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            id
        }
    };

    let next_seq: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(seq), -1) + 1 FROM messages WHERE conversation_id = ?")
            .bind(&conversation_id)
            .fetch_one(&mut *tx)
            .await?;

    for (offset, (role, content)) in [(Role::User, question), (Role::Assistant, answer)]
        .into_iter()
        .enumerate()
    {
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, seq, role, content, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&conversation_id)
        .bind(next_seq + offset as i64)
        .bind(role.as_str())
        .bind(content)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(&conversation_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(conversation_id)
}

pub async fn get_conversation(ctx: &AppContext, id: &str) -> Result<Conversation> {
    let row = sqlx::query(
        "SELECT id, pdf_id, title, created_at, updated_at FROM conversations WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&ctx.pool)
    .await?
    .ok_or_else(|| StudyError::not_found("conversation", id))?;

    Ok(Conversation {
        id: row.get("id"),
        pdf_id: row.get("pdf_id"),
        title: row.get("title"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Conversations about one coursebook, most recently active first.
pub async fn list_conversations(ctx: &AppContext, pdf_id: &str) -> Result<Vec<Conversation>> {
    library::get_pdf(ctx, pdf_id).await?;
    let rows = sqlx::query(
        r#"
        SELECT id, pdf_id, title, created_at, updated_at
        FROM conversations
        WHERE pdf_id = ?
        ORDER BY updated_at DESC, rowid DESC
        "#,
    )
    .bind(pdf_id)
    .fetch_all(&ctx.pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Conversation {
            id: row.get("id"),
            pdf_id: row.get("pdf_id"),
            title: row.get("title"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
        .collect())
}

/// Messages of a conversation in the order they were written.
pub async fn conversation_messages(ctx: &AppContext, conversation_id: &str) -> Result<Vec<Message>> {
    get_conversation(ctx, conversation_id).await?;
    let rows = sqlx::query(
        r#"
        SELECT id, conversation_id, role, content, created_at
        FROM messages
        WHERE conversation_id = ?
        ORDER BY seq ASC
        "#,
    )
    .bind(conversation_id)
    .fetch_all(&ctx.pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let role: String = row.get("role");
            Message {
                id: row.get("id"),
                conversation_id: row.get("conversation_id"),
                role: Role::parse(&role),
                content: row.get("content"),
                created_at: row.get("created_at"),
            }
        })
        .collect())
}
