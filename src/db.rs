//! SQLite connection pool and schema.
//!
//! The schema is created with `CREATE ... IF NOT EXISTS` statements, so
//! [`migrate`] is safe to run on every start.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS pdfs (
        id TEXT PRIMARY KEY,
        file_name TEXT NOT NULL,
        storage_path TEXT NOT NULL UNIQUE,
        size_bytes INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'uploaded',
        error TEXT,
        chunk_count INTEGER NOT NULL DEFAULT 0,
        text_content TEXT,
        embedding_model TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        pdf_id TEXT NOT NULL REFERENCES pdfs(id) ON DELETE CASCADE,
        chunk_index INTEGER NOT NULL,
        content TEXT NOT NULL,
        hash TEXT NOT NULL,
        UNIQUE(pdf_id, chunk_index)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chunk_vectors (
        chunk_id TEXT PRIMARY KEY REFERENCES chunks(id) ON DELETE CASCADE,
        pdf_id TEXT NOT NULL REFERENCES pdfs(id) ON DELETE CASCADE,
        model TEXT NOT NULL,
        dims INTEGER NOT NULL,
        embedding BLOB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS quizzes (
        id TEXT PRIMARY KEY,
        pdf_id TEXT NOT NULL REFERENCES pdfs(id) ON DELETE CASCADE,
        model TEXT NOT NULL,
        quiz_json TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS quiz_attempts (
        id TEXT PRIMARY KEY,
        quiz_id TEXT NOT NULL REFERENCES quizzes(id) ON DELETE CASCADE,
        score INTEGER NOT NULL,
        total INTEGER NOT NULL,
        answers_json TEXT NOT NULL DEFAULT '{}',
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        pdf_id TEXT NOT NULL REFERENCES pdfs(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
        seq INTEGER NOT NULL,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        UNIQUE(conversation_id, seq)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_chunks_pdf_id ON chunks(pdf_id)",
    "CREATE INDEX IF NOT EXISTS idx_chunk_vectors_pdf_id ON chunk_vectors(pdf_id)",
    "CREATE INDEX IF NOT EXISTS idx_quizzes_pdf_id ON quizzes(pdf_id)",
    "CREATE INDEX IF NOT EXISTS idx_attempts_quiz_id ON quiz_attempts(quiz_id)",
    "CREATE INDEX IF NOT EXISTS idx_attempts_created_at ON quiz_attempts(created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_conversations_pdf_id ON conversations(pdf_id)",
];

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5))
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create all tables and indexes.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Open the database and create the schema (`study init`).
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = connect(config).await?;
    migrate(&pool).await?;
    tracing::info!(path = %config.db.path.display(), "database schema ready");
    pool.close().await;
    Ok(())
}

/// Current time as Unix seconds.
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}
