//! # Study Companion
//!
//! A local-first study assistant for PDF coursebooks.
//!
//! Coursebooks are uploaded, their text is extracted, split into fixed-size
//! chunks and embedded. Questions are answered by a chat model from the
//! best-matching chunks, and quizzes are generated from the book's text and
//! scored so progress can be tracked over time. Everything is reachable
//! from the `study` CLI and an HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │   Upload    │──▶│   Pipeline   │──▶│  SQLite   │
//! │  BlobStore  │   │ Extract+Chunk│   │ chunks+vec│
//! └─────────────┘   │   +Embed     │   └─────┬─────┘
//!                   └──────────────┘         │
//!                    ┌───────────────────────┤
//!                    ▼                       ▼
//!              ┌───────────┐           ┌───────────┐
//!              │ Chat (RAG)│           │  Quizzes  │
//!              └─────┬─────┘           └─────┬─────┘
//!                    └─────────┬─────────────┘
//!                      ┌───────┴──────┐
//!                      ▼              ▼
//!                 ┌────────┐     ┌────────┐
//!                 │  CLI   │     │  HTTP  │
//!                 │(study) │     │ (axum) │
//!                 └────────┘     └────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! study init
//! study upload physics.pdf
//! study process <pdf_id>
//! study ask <pdf_id> "What is Newton's second law?"
//! study quiz <pdf_id>
//! study serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`error`] | Domain error type |
//! | [`db`] | Database connection and schema |
//! | [`models`] | Core data types |
//! | [`storage`] | Blob store for uploaded files |
//! | [`extract`] | PDF text extraction |
//! | [`chunk`] | Fixed-window text chunking |
//! | [`http`] | Shared HTTP client with retries |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Chat-completion provider abstraction |
//! | [`prompt`] | Prompt templates |
//! | [`context`] | Shared handles for all operations |
//! | [`library`] | Coursebook upload and catalog |
//! | [`ingest`] | Extract → chunk → embed → store |
//! | [`retrieval`] | Similarity search over chunk vectors |
//! | [`chat`] | Grounded Q&A with conversation history |
//! | [`quiz`] | Quiz generation and scoring |
//! | [`progress`] | Attempt history and progress summaries |
//! | [`server`] | HTTP API |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod http;
pub mod ingest;
pub mod library;
pub mod llm;
pub mod logging;
pub mod models;
pub mod progress;
pub mod prompt;
pub mod quiz;
pub mod retrieval;
pub mod server;
pub mod storage;
