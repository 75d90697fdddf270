//! Core data models used throughout the study pipeline.
//!
//! These types represent coursebooks, their chunks, chat history, quizzes,
//! and quiz attempts as they flow between storage, the pipeline and the API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Processing state of an uploaded coursebook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfStatus {
    Uploaded,
    Ready,
    Failed,
}

impl PdfStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfStatus::Uploaded => "uploaded",
            PdfStatus::Ready => "ready",
            PdfStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "ready" => PdfStatus::Ready,
            "failed" => PdfStatus::Failed,
            _ => PdfStatus::Uploaded,
        }
    }
}

/// Catalog record of an uploaded coursebook.
#[derive(Debug, Clone, Serialize)]
pub struct Pdf {
    pub id: String,
    pub file_name: String,
    pub storage_path: String,
    pub size_bytes: i64,
    pub status: PdfStatus,
    pub error: Option<String>,
    pub chunk_count: i64,
    pub embedding_model: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A fixed-size window of a coursebook's text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub pdf_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub hash: String,
}

/// A chunk returned by similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedChunk {
    pub chunk_id: String,
    pub pdf_id: String,
    pub chunk_index: i64,
    pub similarity: f32,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Self {
        if s == "assistant" {
            Role::Assistant
        } else {
            Role::User
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: String,
    pub pdf_id: String,
    pub title: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: i64,
}

/// Multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mcq {
    pub question: String,
    #[serde(default)]
    pub topic: String,
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
}

/// Short- or long-answer question with a suggested answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenQuestion {
    pub question: String,
    #[serde(default)]
    pub topic: String,
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
}

/// The question set produced by the quiz model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizContent {
    #[serde(default)]
    pub mcqs: Vec<Mcq>,
    #[serde(default)]
    pub saqs: Vec<OpenQuestion>,
    #[serde(default)]
    pub laqs: Vec<OpenQuestion>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Quiz {
    pub id: String,
    pub pdf_id: String,
    pub model: String,
    pub quiz_content: QuizContent,
    pub created_at: i64,
}

/// Answers keyed `mcq-<i>`, `saq-<i>`, `laq-<i>`.
pub type Answers = BTreeMap<String, String>;

/// A stored quiz attempt with the coursebook it belongs to.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub id: String,
    pub quiz_id: String,
    pub pdf_id: String,
    pub file_name: String,
    pub score: i64,
    pub total: i64,
    pub created_at: i64,
}
