//! Quiz generation and scoring.
//!
//! A quiz is generated from a processed coursebook's stored text, validated,
//! and saved as JSON. Attempts are scored on the multiple-choice questions;
//! short and long answers get the suggested answer back as feedback.

use anyhow::Result;
use serde::Serialize;
use sqlx::Row;
use uuid::Uuid;

use crate::context::AppContext;
use crate::db::now_ts;
use crate::error::StudyError;
use crate::ingest;
use crate::library;
use crate::llm::{ChatMessage, ChatRequest};
use crate::models::{Answers, QuizContent, Quiz};
use crate::prompt;

/// Feedback for a single question of an attempt.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionFeedback {
    pub key: String,
    pub question: String,
    pub topic: String,
    pub your_answer: Option<String>,
    /// `None` for open questions, which are not scored.
    pub correct: Option<bool>,
    pub answer: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptResult {
    pub attempt_id: String,
    pub quiz_id: String,
    pub score: i64,
    pub total: i64,
    pub feedback: Vec<QuestionFeedback>,
}

/// Generate and store a quiz for a processed coursebook.
pub async fn generate_quiz(ctx: &AppContext, pdf_id: &str) -> Result<Quiz> {
    library::get_ready_pdf(ctx, pdf_id).await?;
    let text = ingest::stored_text(ctx, pdf_id).await?;
    let content: String = text.chars().take(ctx.config.llm.quiz_max_chars).collect();

    let llm = &ctx.config.llm;
    let request = ChatRequest {
        model: llm.quiz_model().map(str::to_string),
        messages: vec![ChatMessage::user(prompt::quiz_prompt(&content)?)],
        temperature: llm.quiz_temperature,
    };
    tracing::info!(pdf_id, characters = content.chars().count(), "generating quiz");
    let raw = ctx.chat.complete(&request).await?;

    let quiz_content = parse_quiz_content(&raw)?;
    validate(&quiz_content)?;

    let quiz = Quiz {
        id: Uuid::new_v4().to_string(),
        pdf_id: pdf_id.to_string(),
        model: llm
            .quiz_model()
            .unwrap_or_else(|| ctx.chat.model_name())
            .to_string(),
        quiz_content,
        created_at: now_ts(),
    };

    sqlx::query(
        "INSERT INTO quizzes (id, pdf_id, model, quiz_json, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&quiz.id)
    .bind(&quiz.pdf_id)
    .bind(&quiz.model)
    .bind(serde_json::to_string(&quiz.quiz_content)?)
    .bind(quiz.created_at)
    .execute(&ctx.pool)
    .await?;

    tracing::info!(
        quiz_id = %quiz.id,
        mcqs = quiz.quiz_content.mcqs.len(),
        saqs = quiz.quiz_content.saqs.len(),
        laqs = quiz.quiz_content.laqs.len(),
        "quiz stored"
    );
    Ok(quiz)
}

/// Parse the model's reply into a [`QuizContent`].
///
/// Models often wrap the JSON in a Markdown fence or add prose around it,
/// and the prose may itself contain braces. Each `{` is tried in turn and the
/// first object holding questions wins.
pub fn parse_quiz_content(raw: &str) -> Result<QuizContent> {
    let mut fallback = None;
    let mut first_error = None;

    for (start, _) in raw.match_indices('{') {
        let mut stream =
            serde_json::Deserializer::from_str(&raw[start..]).into_iter::<QuizContent>();
        match stream.next() {
            Some(Ok(content)) if has_questions(&content) => return Ok(content),
            Some(Ok(content)) => {
                fallback.get_or_insert(content);
            }
            Some(Err(e)) => {
                first_error.get_or_insert(e);
            }
            None => {}
        }
    }

    if let Some(content) = fallback {
        return Ok(content);
    }
    Err(match first_error {
        Some(e) => StudyError::Upstream(format!("quiz model returned malformed JSON: {}", e)),
        None => StudyError::Upstream("quiz model returned no JSON object".into()),
    }
    .into())
}

fn has_questions(content: &QuizContent) -> bool {
    !(content.mcqs.is_empty() && content.saqs.is_empty() && content.laqs.is_empty())
}

/// Reject quizzes a student could not take.
pub fn validate(content: &QuizContent) -> Result<()> {
    if !has_questions(content) {
        return Err(StudyError::Upstream("quiz model returned no questions".into()).into());
    }
    for (i, mcq) in content.mcqs.iter().enumerate() {
        if mcq.options.len() < 2 {
            return Err(StudyError::Upstream(format!("mcq-{} has fewer than two options", i)).into());
        }
        if !mcq.options.contains(&mcq.answer) {
            return Err(
                StudyError::Upstream(format!("mcq-{} answer is not one of its options", i)).into(),
            );
        }
    }
    Ok(())
}

pub async fn get_quiz(ctx: &AppContext, id: &str) -> Result<Quiz> {
    let row = sqlx::query("SELECT id, pdf_id, model, quiz_json, created_at FROM quizzes WHERE id = ?")
        .bind(id)
        .fetch_optional(&ctx.pool)
        .await?
        .ok_or_else(|| StudyError::not_found("quiz", id))?;

    let quiz_json: String = row.get("quiz_json");
    Ok(Quiz {
        id: row.get("id"),
        pdf_id: row.get("pdf_id"),
        model: row.get("model"),
        quiz_content: serde_json::from_str(&quiz_json)?,
        created_at: row.get("created_at"),
    })
}

/// Score answers against a quiz without storing anything.
///
/// Returns `(score, total, feedback)`; only multiple-choice questions count
/// towards the score.
pub fn score(content: &QuizContent, answers: &Answers) -> (i64, i64, Vec<QuestionFeedback>) {
    let mut feedback = Vec::new();
    let mut score = 0;

    for (i, mcq) in content.mcqs.iter().enumerate() {
        let key = format!("mcq-{}", i);
        let given = answers.get(&key).cloned();
        let correct = given.as_deref() == Some(mcq.answer.as_str());
        if correct {
            score += 1;
        }
        feedback.push(QuestionFeedback {
            key,
            question: mcq.question.clone(),
            topic: mcq.topic.clone(),
            your_answer: given,
            correct: Some(correct),
            answer: mcq.answer.clone(),
            explanation: mcq.explanation.clone(),
        });
    }

    let open = content
        .saqs
        .iter()
        .enumerate()
        .map(|(i, q)| (format!("saq-{}", i), q))
        .chain(
            content
                .laqs
                .iter()
                .enumerate()
                .map(|(i, q)| (format!("laq-{}", i), q)),
        );
    for (key, q) in open {
        feedback.push(QuestionFeedback {
            your_answer: answers.get(&key).cloned(),
            key,
            question: q.question.clone(),
            topic: q.topic.clone(),
            correct: None,
            answer: q.answer.clone(),
            explanation: q.explanation.clone(),
        });
    }

    (score, content.mcqs.len() as i64, feedback)
}

/// Score and store an attempt.
pub async fn submit_attempt(ctx: &AppContext, quiz_id: &str, answers: &Answers) -> Result<AttemptResult> {
    let quiz = get_quiz(ctx, quiz_id).await?;
    let (score, total, feedback) = score(&quiz.quiz_content, answers);

    let attempt_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO quiz_attempts (id, quiz_id, score, total, answers_json, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&attempt_id)
    .bind(quiz_id)
    .bind(score)
    .bind(total)
    .bind(serde_json::to_string(answers)?)
    .bind(now_ts())
    .execute(&ctx.pool)
    .await?;

    tracing::info!(quiz_id, attempt_id = %attempt_id, score, total, "quiz attempt recorded");
    Ok(AttemptResult {
        attempt_id,
        quiz_id: quiz_id.to_string(),
        score,
        total,
        feedback,
    })
}
