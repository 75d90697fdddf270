//! # Study Companion CLI (`study`)
//!
//! The `study` binary drives the whole pipeline from a terminal: upload a
//! coursebook, process it into searchable chunks, ask questions, generate
//! quizzes, and review progress. `study serve` exposes the same operations
//! over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! study --config ./config/study.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `study init` | Create the SQLite database and run schema migrations |
//! | `study upload <file>` | Store a PDF coursebook |
//! | `study list` | List coursebooks |
//! | `study process <pdf_id>` | Extract, chunk and embed a coursebook |
//! | `study ask <pdf_id> "<question>"` | Ask a grounded question |
//! | `study quiz <pdf_id>` | Generate a quiz |
//! | `study submit <quiz_id> mcq-0=...` | Score answers to a quiz |
//! | `study attempts` | Quiz attempt history |
//! | `study progress` | Per-coursebook progress |
//! | `study serve` | Start the HTTP server |
//!
//! Results go to stdout; logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use study_companion::chat::{self, AskRequest};
use study_companion::config;
use study_companion::context::AppContext;
use study_companion::db;
use study_companion::ingest;
use study_companion::library;
use study_companion::logging;
use study_companion::models::Answers;
use study_companion::progress;
use study_companion::quiz;
use study_companion::server;

/// Study Companion CLI: turn PDF coursebooks into a searchable tutor and
/// quiz generator.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/study.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "study",
    about = "Study Companion: grounded Q&A and quizzes over your PDF coursebooks",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/study.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Upload a PDF coursebook.
    Upload {
        /// Path to the PDF file.
        file: PathBuf,
    },

    /// List uploaded coursebooks, newest first.
    List,

    /// Extract text from a coursebook, chunk it and embed the chunks.
    ///
    /// Re-running replaces the previous chunks.
    Process { pdf_id: String },

    /// Ask a question answered from a processed coursebook.
    Ask {
        pdf_id: String,
        query: String,
        /// Continue an existing conversation.
        #[arg(long)]
        conversation: Option<String>,
    },

    /// Generate a quiz from a processed coursebook.
    Quiz { pdf_id: String },

    /// Submit answers to a quiz.
    Submit {
        quiz_id: String,
        /// Answers as `key=value`, e.g. `mcq-0=Newton`.
        answers: Vec<String>,
    },

    /// Show quiz attempt history.
    Attempts {
        /// Only attempts for this coursebook.
        #[arg(long)]
        pdf: Option<String>,
    },

    /// Show per-coursebook progress.
    Progress,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging)?;

    match cli.command {
        Commands::Init => {
            db::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        command => {
            let ctx = AppContext::from_config(&cfg).await?;
            let result = run_command(&ctx, command).await;
            ctx.close().await;
            result?;
        }
    }

    Ok(())
}

async fn run_command(ctx: &AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Upload { file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let pdf = library::upload_pdf(ctx, &file_name, &bytes).await?;
            println!("Uploaded {} ({} bytes)", pdf.file_name, pdf.size_bytes);
            println!("id: {}", pdf.id);
        }
        Commands::List => {
            let pdfs = library::list_pdfs(ctx).await?;
            if pdfs.is_empty() {
                println!("No coursebooks uploaded.");
            }
            for pdf in pdfs {
                println!(
                    "{}  {:<8}  {:>4} chunks  {}",
                    pdf.id,
                    pdf.status.as_str(),
                    pdf.chunk_count,
                    pdf.file_name
                );
            }
        }
        Commands::Process { pdf_id } => {
            let report = ingest::process_pdf(ctx, &pdf_id).await?;
            println!("{}", report.message);
            println!("characters: {}  model: {}", report.characters, report.model);
        }
        Commands::Ask {
            pdf_id,
            query,
            conversation,
        } => {
            let request = AskRequest {
                pdf_id,
                query,
                conversation_id: conversation,
            };
            let answer = chat::ask(ctx, &request).await?;
            println!("{}", answer.answer);
            if !answer.sources.is_empty() {
                println!();
                println!("Sources:");
                for source in &answer.sources {
                    println!(
                        "  [chunk {}] similarity {:.3}",
                        source.chunk_index, source.similarity
                    );
                }
            }
            println!();
            println!("conversation: {}", answer.conversation_id);
        }
        Commands::Quiz { pdf_id } => {
            let quiz = quiz::generate_quiz(ctx, &pdf_id).await?;
            println!("quiz: {}", quiz.id);
            let content = &quiz.quiz_content;
            for (i, mcq) in content.mcqs.iter().enumerate() {
                println!();
                println!("mcq-{}. {}", i, mcq.question);
                for option in &mcq.options {
                    println!("    - {}", option);
                }
            }
            for (i, q) in content.saqs.iter().enumerate() {
                println!();
                println!("saq-{}. {}", i, q.question);
            }
            for (i, q) in content.laqs.iter().enumerate() {
                println!();
                println!("laq-{}. {}", i, q.question);
            }
        }
        Commands::Submit { quiz_id, answers } => {
            let answers = parse_answers(&answers)?;
            let result = quiz::submit_attempt(ctx, &quiz_id, &answers).await?;
            println!("Score: {}/{}", result.score, result.total);
            for item in &result.feedback {
                let mark = match item.correct {
                    Some(true) => "correct",
                    Some(false) => "wrong",
                    None => "review",
                };
                println!("{}  {:<7}  answer: {}", item.key, mark, item.answer);
            }
        }
        Commands::Attempts { pdf } => {
            let attempts = progress::attempt_history(ctx, pdf.as_deref()).await?;
            if attempts.is_empty() {
                println!("No quiz attempts yet.");
            }
            for a in attempts {
                println!(
                    "{}  {}/{}  {}  quiz {}",
                    a.created_at, a.score, a.total, a.file_name, a.quiz_id
                );
            }
        }
        Commands::Progress => {
            let summary = progress::progress_summary(ctx).await?;
            if summary.is_empty() {
                println!("No quiz attempts yet.");
            }
            for p in summary {
                println!(
                    "{}  attempts: {}  best: {:.1}%  latest: {:.1}%  average: {:.1}%",
                    p.file_name, p.attempts, p.best_percent, p.latest_percent, p.average_percent
                );
                if !p.missed_topics.is_empty() {
                    let topics: Vec<String> = p
                        .missed_topics
                        .iter()
                        .map(|t| format!("{} ({})", t.topic, t.missed))
                        .collect();
                    println!("    review: {}", topics.join(", "));
                }
            }
        }
        Commands::Init | Commands::Serve => unreachable!("handled in main"),
    }
    Ok(())
}

fn parse_answers(raw: &[String]) -> Result<Answers> {
    let mut answers = Answers::new();
    for item in raw {
        match item.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                answers.insert(key.trim().to_string(), value.to_string());
            }
            _ => bail!("Answer must look like key=value, got: {}", item),
        }
    }
    Ok(answers)
}
