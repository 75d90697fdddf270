//! End-to-end tests of the study pipeline with in-memory providers.
//!
//! The embedder counts keyword occurrences, so similarity is predictable,
//! and the chat model returns canned replies while recording every request.
//! Together they drive upload → index → ask → quiz → attempt → progress
//! through both the library API and the HTTP server.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use study_companion::chat::{self, AskRequest, NO_CONTEXT_ANSWER};
use study_companion::config::Config;
use study_companion::context::AppContext;
use study_companion::embedding::EmbeddingProvider;
use study_companion::error::StudyError;
use study_companion::ingest;
use study_companion::library;
use study_companion::llm::{ChatModel, ChatRequest, DisabledChat};
use study_companion::models::{Answers, PdfStatus, Role};
use study_companion::progress;
use study_companion::quiz;
use study_companion::server::run_server_with_context;
use tempfile::TempDir;

const FAKE_PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n";

const PHYSICS_TEXT: &str = "Force is a push or pull acting on an object. \
Newton's second law states that force equals mass times acceleration, so a larger force produces a larger acceleration. \
Friction is a force that opposes motion between surfaces in contact.\n\n\
Photosynthesis is the process by which plants make sugar from sunlight. \
Chlorophyll in the leaf absorbs light, and photosynthesis releases oxygen into the air.";

const QUIZ_REPLY: &str = r#"Sure! Here is the quiz.
```json
{
  "mcqs": [
    {
      "question": "What does Newton's second law relate?",
      "topic": "Newton's Laws",
      "options": ["Force and acceleration", "Light and sugar"],
      "answer": "Force and acceleration",
      "explanation": "F = ma."
    },
    {
      "question": "Which pigment absorbs light?",
      "topic": "Photosynthesis",
      "options": ["Chlorophyll", "Hemoglobin"],
      "answer": "Chlorophyll",
      "explanation": "Chlorophyll is found in leaves."
    }
  ],
  "saqs": [
    { "question": "Define friction.", "topic": "Forces", "answer": "A force opposing motion.", "explanation": "" }
  ],
  "laqs": []
}
```"#;

// ─── Test Providers ─────────────────────────────────────────────────

const VOCABULARY: [&str; 6] = ["force", "acceleration", "friction", "photosynthesis", "chlorophyll", "atom"];

/// Embeds text as keyword counts over a fixed vocabulary.
struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn dims(&self) -> usize {
        VOCABULARY.len()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                VOCABULARY
                    .iter()
                    .map(|word| lower.matches(word).count() as f32)
                    .collect()
            })
            .collect())
    }
}

/// Always fails, to simulate an unreachable provider.
struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn dims(&self) -> usize {
        VOCABULARY.len()
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(StudyError::Upstream("embedding service unavailable".into()).into())
    }
}

/// Returns a quiz for quiz prompts and a fixed answer otherwise.
#[derive(Default)]
struct ScriptedChat {
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last(&self) -> ChatRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    fn model_name(&self) -> &str {
        "scripted-chat"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        let prompt = &request.messages[0].content;
        if prompt.contains("educational quizzes") {
            Ok(QUIZ_REPLY.to_string())
        } else {
            Ok("  According to the text: 'force equals mass times acceleration'.  ".to_string())
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn test_config(tmp: &TempDir, port: u16) -> Config {
    let root = tmp.path();
    let config_content = format!(
        r#"
[db]
path = "{root}/study.sqlite"

[storage]
root = "{root}/blobs"
max_upload_bytes = 4096

[chunking]
chunk_size = 120
chunk_overlap = 20

[retrieval]
match_threshold = 0.5
match_count = 3

[llm]
model = "chat-model"
quiz_model = "quiz-model"

[server]
bind = "127.0.0.1:{port}"
"#,
        root = root.display(),
        port = port
    );
    toml::from_str(&config_content).unwrap()
}

async fn test_context(tmp: &TempDir, port: u16) -> (AppContext, Arc<ScriptedChat>) {
    let cfg = test_config(tmp, port);
    let chat = Arc::new(ScriptedChat::default());
    let ctx = AppContext::with_providers(&cfg, Arc::new(KeywordEmbedder), chat.clone())
        .await
        .unwrap();
    (ctx, chat)
}

async fn ready_pdf(ctx: &AppContext, name: &str) -> String {
    let pdf = library::upload_pdf(ctx, name, FAKE_PDF).await.unwrap();
    ingest::index_text(ctx, &pdf.id, PHYSICS_TEXT).await.unwrap();
    pdf.id
}

fn study_error(err: &anyhow::Error) -> &StudyError {
    err.downcast_ref::<StudyError>()
        .unwrap_or_else(|| panic!("expected a StudyError, got: {:#}", err))
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

// ─── Library Tests ──────────────────────────────────────────────────

#[tokio::test]
async fn test_index_then_ask_with_history() {
    let tmp = TempDir::new().unwrap();
    let (ctx, chat) = test_context(&tmp, 0).await;

    let pdf = library::upload_pdf(&ctx, "physics.pdf", FAKE_PDF).await.unwrap();
    assert_eq!(pdf.status, PdfStatus::Uploaded);

    let report = ingest::index_text(&ctx, &pdf.id, PHYSICS_TEXT).await.unwrap();
    assert!(report.chunks > 1);
    assert_eq!(report.message, format!("Successfully embedded {} chunks.", report.chunks));
    assert_eq!(report.model, "keyword-test");

    let pdf = library::get_pdf(&ctx, &pdf.id).await.unwrap();
    assert_eq!(pdf.status, PdfStatus::Ready);
    assert_eq!(pdf.chunk_count, report.chunks as i64);

    let first = chat::ask(
        &ctx,
        &AskRequest {
            pdf_id: pdf.id.clone(),
            query: "What is force?".into(),
            conversation_id: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(first.answer, "According to the text: 'force equals mass times acceleration'.");
    assert!(!first.sources.is_empty());
    assert!(first.sources.len() <= 3);
    assert!(first.sources[0].content.to_lowercase().contains("force"));
    assert!(first.sources.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    assert!(first.sources.iter().all(|s| s.similarity > 0.5));

    let request = chat.last();
    assert_eq!(request.model.as_deref(), Some("chat-model"));
    assert_eq!(request.messages.len(), 1);
    assert!(request.messages[0].content.contains(&first.sources[0].content));
    assert!(request.messages[0].content.contains("What is force?"));

    let second = chat::ask(
        &ctx,
        &AskRequest {
            pdf_id: pdf.id.clone(),
            query: "And friction?".into(),
            conversation_id: Some(first.conversation_id.clone()),
        },
    )
    .await
    .unwrap();
    assert_eq!(second.conversation_id, first.conversation_id);

    let conversations = chat::list_conversations(&ctx, &pdf.id).await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].title, "What is force?");

    let messages = chat::conversation_messages(&ctx, &first.conversation_id)
        .await
        .unwrap();
    let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    assert_eq!(messages[0].content, "What is force?");
    assert_eq!(messages[2].content, "And friction?");
}

#[tokio::test]
async fn test_ask_without_matches_skips_model() {
    let tmp = TempDir::new().unwrap();
    let (ctx, chat) = test_context(&tmp, 0).await;
    let pdf_id = ready_pdf(&ctx, "physics.pdf").await;

    let answer = chat::ask(
        &ctx,
        &AskRequest {
            pdf_id,
            query: "Tell me about the atom".into(),
            conversation_id: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(answer.answer, NO_CONTEXT_ANSWER);
    assert!(answer.sources.is_empty());
    assert_eq!(chat.calls(), 0);

    let messages = chat::conversation_messages(&ctx, &answer.conversation_id)
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
}

#[tokio::test]
async fn test_ask_rejects_foreign_conversation_and_unready_pdf() {
    let tmp = TempDir::new().unwrap();
    let (ctx, _chat) = test_context(&tmp, 0).await;
    let physics = ready_pdf(&ctx, "physics.pdf").await;
    let biology = ready_pdf(&ctx, "biology.pdf").await;

    let answer = chat::ask(
        &ctx,
        &AskRequest {
            pdf_id: physics.clone(),
            query: "What is force?".into(),
            conversation_id: None,
        },
    )
    .await
    .unwrap();

    let err = chat::ask(
        &ctx,
        &AskRequest {
            pdf_id: biology,
            query: "What is photosynthesis?".into(),
            conversation_id: Some(answer.conversation_id),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(study_error(&err), StudyError::InvalidInput(_)));

    let unready = library::upload_pdf(&ctx, "draft.pdf", FAKE_PDF).await.unwrap();
    let err = chat::ask(
        &ctx,
        &AskRequest {
            pdf_id: unready.id,
            query: "What is force?".into(),
            conversation_id: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(study_error(&err), StudyError::InvalidInput(_)));

    let err = chat::ask(
        &ctx,
        &AskRequest {
            pdf_id: physics,
            query: "   ".into(),
            conversation_id: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(study_error(&err), StudyError::InvalidInput(_)));
}

#[tokio::test]
async fn test_failed_reindex_keeps_previous_chunks() {
    let tmp = TempDir::new().unwrap();
    let (ctx, chat) = test_context(&tmp, 0).await;
    let pdf_id = ready_pdf(&ctx, "physics.pdf").await;
    let before = library::get_pdf(&ctx, &pdf_id).await.unwrap();

    let failing = AppContext::with_providers(&ctx.config, Arc::new(FailingEmbedder), chat)
        .await
        .unwrap();
    let err = ingest::index_text(&failing, &pdf_id, "Force and more force.")
        .await
        .unwrap_err();
    assert!(matches!(study_error(&err), StudyError::Upstream(_)));

    let after = library::get_pdf(&ctx, &pdf_id).await.unwrap();
    assert_eq!(after.status, PdfStatus::Ready);
    assert_eq!(after.chunk_count, before.chunk_count);
    assert_eq!(
        ingest::stored_text(&ctx, &pdf_id).await.unwrap(),
        PHYSICS_TEXT
    );
}

async fn chunk_ids(ctx: &AppContext, pdf_id: &str) -> Vec<String> {
    sqlx::query_scalar("SELECT id FROM chunks WHERE pdf_id = ? ORDER BY chunk_index")
        .bind(pdf_id)
        .fetch_all(&ctx.pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_reindex_replaces_chunks() {
    let tmp = TempDir::new().unwrap();
    let (ctx, _chat) = test_context(&tmp, 0).await;
    let pdf_id = ready_pdf(&ctx, "physics.pdf").await;
    let old_ids = chunk_ids(&ctx, &pdf_id).await;
    assert!(old_ids.len() > 1);

    let report = ingest::index_text(&ctx, &pdf_id, "Friction only.").await.unwrap();
    assert_eq!(report.chunks, 1);

    let new_ids = chunk_ids(&ctx, &pdf_id).await;
    assert_eq!(new_ids.len(), report.chunks);
    assert!(new_ids.iter().all(|id| !old_ids.contains(id)));

    let vectors: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors WHERE pdf_id = ?")
        .bind(&pdf_id)
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(vectors, 1);

    let pdf = library::get_pdf(&ctx, &pdf_id).await.unwrap();
    assert_eq!(pdf.chunk_count, 1);
    assert_eq!(ingest::stored_text(&ctx, &pdf_id).await.unwrap(), "Friction only.");
}

#[tokio::test]
async fn test_retrieval_stays_within_selected_pdf() {
    let tmp = TempDir::new().unwrap();
    let (ctx, _chat) = test_context(&tmp, 0).await;
    let physics = ready_pdf(&ctx, "physics.pdf").await;

    let mechanics = library::upload_pdf(&ctx, "mechanics.pdf", FAKE_PDF).await.unwrap();
    ingest::index_text(
        &ctx,
        &mechanics.id,
        "Force. Force and force again. Every force here is a force.",
    )
    .await
    .unwrap();

    let answer = chat::ask(
        &ctx,
        &AskRequest {
            pdf_id: physics.clone(),
            query: "What is force?".into(),
            conversation_id: None,
        },
    )
    .await
    .unwrap();
    assert!(!answer.sources.is_empty());
    assert!(answer.sources.iter().all(|s| s.pdf_id == physics));

    let answer = chat::ask(
        &ctx,
        &AskRequest {
            pdf_id: mechanics.id.clone(),
            query: "What is force?".into(),
            conversation_id: None,
        },
    )
    .await
    .unwrap();
    assert!(!answer.sources.is_empty());
    assert!(answer.sources.iter().all(|s| s.pdf_id == mechanics.id));
}

#[tokio::test]
async fn test_failed_exchange_leaves_no_conversation() {
    let tmp = TempDir::new().unwrap();
    let (ctx, _chat) = test_context(&tmp, 0).await;
    let pdf_id = ready_pdf(&ctx, "physics.pdf").await;

    sqlx::query("DROP TABLE messages")
        .execute(&ctx.pool)
        .await
        .unwrap();

    let result = chat::ask(
        &ctx,
        &AskRequest {
            pdf_id: pdf_id.clone(),
            query: "What is force?".into(),
            conversation_id: None,
        },
    )
    .await;
    assert!(result.is_err());
    assert!(chat::list_conversations(&ctx, &pdf_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_text_marks_pdf_failed() {
    let tmp = TempDir::new().unwrap();
    let (ctx, _chat) = test_context(&tmp, 0).await;
    let pdf = library::upload_pdf(&ctx, "blank.pdf", FAKE_PDF).await.unwrap();

    let err = ingest::index_text(&ctx, &pdf.id, " \n\n ").await.unwrap_err();
    assert!(matches!(study_error(&err), StudyError::NoText(_)));

    let pdf = library::get_pdf(&ctx, &pdf.id).await.unwrap();
    assert_eq!(pdf.status, PdfStatus::Failed);
    assert!(pdf.error.is_some());
}

#[tokio::test]
async fn test_upload_limits() {
    let tmp = TempDir::new().unwrap();
    let (ctx, _chat) = test_context(&tmp, 0).await;

    let err = library::upload_pdf(&ctx, "empty.pdf", b"").await.unwrap_err();
    assert!(matches!(study_error(&err), StudyError::InvalidInput(_)));

    let mut big = FAKE_PDF.to_vec();
    big.resize(5000, b' ');
    let err = library::upload_pdf(&ctx, "big.pdf", &big).await.unwrap_err();
    assert!(matches!(study_error(&err), StudyError::TooLarge { limit: 4096 }));

    let pdf = library::upload_pdf(&ctx, "..%2F..%2Fetc%2Fpasswd.pdf", FAKE_PDF)
        .await
        .unwrap();
    assert_eq!(pdf.file_name, "passwd.pdf");
    assert!(pdf.storage_path.starts_with("public/"));
}

#[tokio::test]
async fn test_quiz_attempt_and_progress() {
    let tmp = TempDir::new().unwrap();
    let (ctx, chat) = test_context(&tmp, 0).await;
    let pdf_id = ready_pdf(&ctx, "physics.pdf").await;

    let generated = quiz::generate_quiz(&ctx, &pdf_id).await.unwrap();
    assert_eq!(generated.model, "quiz-model");
    assert_eq!(generated.quiz_content.mcqs.len(), 2);
    assert_eq!(generated.quiz_content.saqs.len(), 1);

    let request = chat.last();
    assert_eq!(request.model.as_deref(), Some("quiz-model"));
    assert!((request.temperature - 0.1).abs() < f32::EPSILON);
    assert!(request.messages[0].content.contains("Chlorophyll in the leaf"));

    let stored = quiz::get_quiz(&ctx, &generated.id).await.unwrap();
    assert_eq!(stored.quiz_content, generated.quiz_content);

    let mut answers = Answers::new();
    answers.insert("mcq-0".into(), "Force and acceleration".into());
    answers.insert("mcq-1".into(), "Hemoglobin".into());
    answers.insert("saq-0".into(), "It slows things down".into());
    let result = quiz::submit_attempt(&ctx, &generated.id, &answers)
        .await
        .unwrap();
    assert_eq!((result.score, result.total), (1, 2));
    assert_eq!(result.feedback.len(), 3);
    assert_eq!(result.feedback[2].answer, "A force opposing motion.");

    let perfect: Answers = [
        ("mcq-0".to_string(), "Force and acceleration".to_string()),
        ("mcq-1".to_string(), "Chlorophyll".to_string()),
    ]
    .into_iter()
    .collect();
    quiz::submit_attempt(&ctx, &generated.id, &perfect).await.unwrap();

    let history = progress::attempt_history(&ctx, Some(&pdf_id)).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|a| a.file_name == "physics.pdf"));
    assert!(progress::attempt_history(&ctx, Some("other")).await.unwrap().is_empty());

    let summary = progress::progress_summary(&ctx).await.unwrap();
    assert_eq!(summary.len(), 1);
    let physics = &summary[0];
    assert_eq!(physics.attempts, 2);
    assert_eq!(physics.best_percent, 100.0);
    assert_eq!(physics.average_percent, 75.0);
    assert_eq!(physics.missed_topics.len(), 1);
    assert_eq!(physics.missed_topics[0].topic, "Photosynthesis");

    let err = quiz::get_quiz(&ctx, "missing").await.unwrap_err();
    assert!(matches!(study_error(&err), StudyError::NotFound { kind: "quiz", .. }));
}

#[tokio::test]
async fn test_delete_removes_everything() {
    let tmp = TempDir::new().unwrap();
    let (ctx, _chat) = test_context(&tmp, 0).await;
    let pdf_id = ready_pdf(&ctx, "physics.pdf").await;
    let storage_path = library::get_pdf(&ctx, &pdf_id).await.unwrap().storage_path;

    let generated = quiz::generate_quiz(&ctx, &pdf_id).await.unwrap();
    quiz::submit_attempt(&ctx, &generated.id, &Answers::new())
        .await
        .unwrap();
    chat::ask(
        &ctx,
        &AskRequest {
            pdf_id: pdf_id.clone(),
            query: "What is force?".into(),
            conversation_id: None,
        },
    )
    .await
    .unwrap();

    library::delete_pdf(&ctx, &pdf_id).await.unwrap();

    let err = library::get_pdf(&ctx, &pdf_id).await.unwrap_err();
    assert!(matches!(study_error(&err), StudyError::NotFound { kind: "pdf", .. }));
    assert!(progress::attempt_history(&ctx, None).await.unwrap().is_empty());
    assert!(quiz::get_quiz(&ctx, &generated.id).await.is_err());
    assert!(ctx.blobs.get(&storage_path).await.is_err());
}

// ─── HTTP Tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_http_api_end_to_end() {
    let port = find_free_port();
    let tmp = TempDir::new().unwrap();
    let (ctx, _chat) = test_context(&tmp, port).await;

    tokio::spawn(run_server_with_context(ctx.clone()));
    wait_for_server(port).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{}", port);

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    // Upload
    let resp = client
        .post(format!("{}/pdfs", base))
        .header("X-File-Name", "physics.pdf")
        .body(FAKE_PDF.to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let pdf: Value = resp.json().await.unwrap();
    let pdf_id = pdf["id"].as_str().unwrap().to_string();
    assert_eq!(pdf["status"], "uploaded");
    assert_eq!(pdf["file_name"], "physics.pdf");

    let resp = client
        .get(format!("{}/pdfs/{}/file", base, pdf_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/pdf");
    let disposition = resp.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.contains("physics.pdf"), "{}", disposition);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), FAKE_PDF);

    let resp = client
        .get(format!("{}/pdfs/does-not-exist/file", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .post(format!("{}/pdfs", base))
        .body("just some text")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = client
        .post(format!("{}/pdfs", base))
        .body(vec![b'%'; 5000])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "payload_too_large");

    let resp = client
        .get(format!("{}/pdfs/does-not-exist", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");

    // Index through the library; the fake PDF has no extractable text.
    ingest::index_text(&ctx, &pdf_id, PHYSICS_TEXT).await.unwrap();

    let list: Value = client
        .get(format!("{}/pdfs", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["status"], "ready");

    // Re-processing the unreadable file fails but keeps the index.
    let resp = client
        .post(format!("{}/pdfs/{}/embeddings", base, pdf_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let pdf: Value = client
        .get(format!("{}/pdfs/{}", base, pdf_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pdf["status"], "ready");

    // Chat
    let resp = client
        .post(format!("{}/chat", base))
        .json(&json!({ "pdf_id": pdf_id, "query": "What is force?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let answer: Value = resp.json().await.unwrap();
    assert!(answer["answer"].as_str().unwrap().starts_with("According to the text"));
    let conversation_id = answer["conversation_id"].as_str().unwrap().to_string();
    assert!(!answer["sources"].as_array().unwrap().is_empty());

    let conversations: Value = client
        .get(format!("{}/pdfs/{}/conversations", base, pdf_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(conversations[0]["id"], conversation_id.as_str());

    let messages: Value = client
        .get(format!("{}/conversations/{}/messages", base, conversation_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(messages.as_array().unwrap().len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");

    // Quiz
    let resp = client
        .post(format!("{}/quizzes", base))
        .json(&json!({ "pdf_id": pdf_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let generated: Value = resp.json().await.unwrap();
    let quiz_id = generated["id"].as_str().unwrap().to_string();
    assert_eq!(generated["quiz_content"]["mcqs"].as_array().unwrap().len(), 2);

    let resp = client
        .post(format!("{}/quizzes/{}/attempts", base, quiz_id))
        .json(&json!({ "answers": { "mcq-0": "Force and acceleration", "mcq-1": "Chlorophyll" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let result: Value = resp.json().await.unwrap();
    assert_eq!(result["score"], 2);
    assert_eq!(result["total"], 2);

    let attempts: Value = client
        .get(format!("{}/attempts?pdf_id={}", base, pdf_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(attempts.as_array().unwrap().len(), 1);
    assert_eq!(attempts[0]["file_name"], "physics.pdf");

    let summary: Value = client
        .get(format!("{}/progress", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary[0]["best_percent"], 100.0);

    // Delete
    let resp = client
        .delete(format!("{}/pdfs/{}", base, pdf_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    let resp = client
        .get(format!("{}/quizzes/{}", base, quiz_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_http_disabled_chat_provider() {
    let port = find_free_port();
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp, port);
    let ctx = AppContext::with_providers(&cfg, Arc::new(KeywordEmbedder), Arc::new(DisabledChat))
        .await
        .unwrap();
    let pdf_id = ready_pdf(&ctx, "physics.pdf").await;

    tokio::spawn(run_server_with_context(ctx));
    wait_for_server(port).await;

    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/quizzes", port))
        .json(&json!({ "pdf_id": pdf_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "provider_disabled");
}

#[tokio::test]
async fn test_http_malformed_json_bodies() {
    let port = find_free_port();
    let tmp = TempDir::new().unwrap();
    let (ctx, chat) = test_context(&tmp, port).await;

    tokio::spawn(run_server_with_context(ctx));
    wait_for_server(port).await;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{}", port);

    let cases = [
        (format!("{}/chat", base), json!({ "pdf_id": "x" }).to_string()),
        (format!("{}/quizzes", base), "not json".to_string()),
        (
            format!("{}/quizzes/q1/attempts", base),
            json!({ "answers": 5 }).to_string(),
        ),
    ];
    for (url, body) in cases {
        let resp = client
            .post(&url)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "{}", url);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request", "{}", url);
        assert!(body["error"]["message"].is_string());
    }

    let resp = client
        .post(format!("{}/chat", base))
        .body(json!({ "pdf_id": "x", "query": "q" }).to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(chat.calls(), 0);
}
