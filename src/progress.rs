//! Quiz attempt history and per-coursebook progress.

use anyhow::Result;
use serde::Serialize;
use sqlx::Row;
use std::collections::{BTreeMap, HashMap};

use crate::context::AppContext;
use crate::models::{Answers, AttemptRecord, QuizContent};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TopicCount {
    pub topic: String,
    pub missed: usize,
}

/// Aggregated attempt statistics for one coursebook.
#[derive(Debug, Clone, Serialize)]
pub struct CoursebookProgress {
    pub pdf_id: String,
    pub file_name: String,
    pub attempts: usize,
    /// Best percentage over all attempts.
    pub best_percent: f64,
    pub latest_percent: f64,
    pub average_percent: f64,
    pub missed_topics: Vec<TopicCount>,
}

/// Stored attempts, newest first, optionally for a single coursebook.
pub async fn attempt_history(ctx: &AppContext, pdf_id: Option<&str>) -> Result<Vec<AttemptRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT a.id, a.quiz_id, q.pdf_id, p.file_name, a.score, a.total, a.created_at
        FROM quiz_attempts a
        JOIN quizzes q ON q.id = a.quiz_id
        JOIN pdfs p ON p.id = q.pdf_id
        WHERE ?1 IS NULL OR q.pdf_id = ?1
        ORDER BY a.created_at DESC, a.rowid DESC
        "#,
    )
    .bind(pdf_id)
    .fetch_all(&ctx.pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| AttemptRecord {
            id: row.get("id"),
            quiz_id: row.get("quiz_id"),
            pdf_id: row.get("pdf_id"),
            file_name: row.get("file_name"),
            score: row.get("score"),
            total: row.get("total"),
            created_at: row.get("created_at"),
        })
        .collect())
}

/// One row per coursebook with at least one attempt, sorted by file name.
pub async fn progress_summary(ctx: &AppContext) -> Result<Vec<CoursebookProgress>> {
    let rows = sqlx::query(
        r#"
        SELECT q.pdf_id, p.file_name, a.score, a.total, a.answers_json, q.quiz_json
        FROM quiz_attempts a
        JOIN quizzes q ON q.id = a.quiz_id
        JOIN pdfs p ON p.id = q.pdf_id
        ORDER BY a.created_at ASC, a.rowid ASC
        "#,
    )
    .fetch_all(&ctx.pool)
    .await?;

    // Attempts arrive oldest first so the last one seen is the latest.
    let mut by_pdf: BTreeMap<String, Accumulator> = BTreeMap::new();
    for row in &rows {
        let pdf_id: String = row.get("pdf_id");
        let answers_json: String = row.get("answers_json");
        let quiz_json: String = row.get("quiz_json");
        let answers: Answers = serde_json::from_str(&answers_json)?;
        let quiz: QuizContent = serde_json::from_str(&quiz_json)?;

        let acc = by_pdf.entry(pdf_id).or_insert_with(|| Accumulator {
            file_name: row.get("file_name"),
            ..Default::default()
        });
        acc.add(percent(row.get("score"), row.get("total")));
        for topic in missed_topics(&quiz, &answers) {
            *acc.missed.entry(topic).or_default() += 1;
        }
    }

    let mut summary: Vec<CoursebookProgress> = by_pdf
        .into_iter()
        .map(|(pdf_id, acc)| acc.finish(pdf_id))
        .collect();
    summary.sort_by(|a, b| a.file_name.cmp(&b.file_name).then(a.pdf_id.cmp(&b.pdf_id)));
    Ok(summary)
}

/// Topics of the multiple-choice questions answered wrong or left blank.
///
/// Questions without a topic are grouped as "General".
pub fn missed_topics(quiz: &QuizContent, answers: &Answers) -> Vec<String> {
    quiz.mcqs
        .iter()
        .enumerate()
        .filter(|(i, mcq)| answers.get(&format!("mcq-{}", i)) != Some(&mcq.answer))
        .map(|(_, mcq)| {
            let topic = mcq.topic.trim();
            if topic.is_empty() {
                "General".to_string()
            } else {
                topic.to_string()
            }
        })
        .collect()
}

fn percent(score: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (score as f64 / total as f64 * 1000.0).round() / 10.0
}

#[derive(Default)]
struct Accumulator {
    file_name: String,
    percents: Vec<f64>,
    missed: HashMap<String, usize>,
}

impl Accumulator {
    fn add(&mut self, percent: f64) {
        self.percents.push(percent);
    }

    fn finish(self, pdf_id: String) -> CoursebookProgress {
        let attempts = self.percents.len();
        let best_percent = self.percents.iter().cloned().fold(0.0, f64::max);
        let latest_percent = self.percents.last().copied().unwrap_or(0.0);
        let average_percent = if attempts == 0 {
            0.0
        } else {
            let avg = self.percents.iter().sum::<f64>() / attempts as f64;
            (avg * 10.0).round() / 10.0
        };

        let mut missed_topics: Vec<TopicCount> = self
            .missed
            .into_iter()
            .map(|(topic, missed)| TopicCount { topic, missed })
            .collect();
        missed_topics.sort_by(|a, b| b.missed.cmp(&a.missed).then(a.topic.cmp(&b.topic)));

        CoursebookProgress {
            pdf_id,
            file_name: self.file_name,
            attempts,
            best_percent,
            latest_percent,
            average_percent,
            missed_topics,
        }
    }
}
