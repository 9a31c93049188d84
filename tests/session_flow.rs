//! Session handler flows with in-process collaborators.
//!
//! The catalog, model provider and (optionally failing) vector index are
//! fakes, so these tests cover state transitions and notices without any
//! network access. Uploads use a hand-assembled PDF.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rulebook_qa::catalog::Catalog;
use rulebook_qa::config::parse_config;
use rulebook_qa::embedding::Embedder;
use rulebook_qa::error::{QaError, Result};
use rulebook_qa::index::{MemoryIndex, NamespaceStats, VectorIndex};
use rulebook_qa::llm::{ChatMessage, ChatModel, ModelProvider};
use rulebook_qa::models::{NoticeLevel, ScoredChunk, VectorRecord};
use rulebook_qa::session::{Services, SessionContext, SessionState, SessionStore};

const GOOD_KEY: &str = "sk-good";

// ============ Fixtures ============

/// Minimal one-page PDF showing `phrase` in Helvetica, with exact xref offsets.
fn pdf_with_text(phrase: &str) -> Vec<u8> {
    pdf_with_content(&format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", phrase))
}

/// One-page PDF around a raw content stream.
fn pdf_with_content(content: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

struct StubCatalog {
    titles: HashMap<String, String>,
}

impl StubCatalog {
    fn new() -> Self {
        let titles = [("13", "Catan"), ("237182", "Root"), ("230802", "Azul")]
            .into_iter()
            .map(|(id, title)| (id.to_string(), title.to_string()))
            .collect();
        Self { titles }
    }
}

#[async_trait]
impl Catalog for StubCatalog {
    async fn lookup_title(&self, catalog_id: &str) -> Result<String> {
        self.titles
            .get(catalog_id)
            .cloned()
            .ok_or_else(|| QaError::GameNotFound(catalog_id.to_string()))
    }
}

/// Letter-frequency vectors: deterministic and good enough to rank chunks.
struct LetterEmbedder;

fn letter_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 26];
    for b in text.bytes().filter(u8::is_ascii_alphabetic) {
        v[(b.to_ascii_lowercase() - b'a') as usize] += 1.0;
    }
    v
}

#[async_trait]
impl Embedder for LetterEmbedder {
    fn model_name(&self) -> &str {
        "letters"
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| letter_vector(t)).collect())
    }
}

/// Replies with a numbered answer and records every prompt it saw.
struct RecordingChat {
    accepts: bool,
    prompts: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

#[async_trait]
impl ChatModel for RecordingChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        if !self.accepts {
            return Err(QaError::LanguageModel("401 Unauthorized".into()));
        }
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(messages.to_vec());
        Ok(format!("answer {}", prompts.len()))
    }
}

#[derive(Default)]
struct FakeModels {
    prompts: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ModelProvider for FakeModels {
    fn embedder(&self, _api_key: &str) -> Result<Arc<dyn Embedder>> {
        Ok(Arc::new(LetterEmbedder))
    }

    fn chat(&self, api_key: &str) -> Result<Arc<dyn ChatModel>> {
        Ok(Arc::new(RecordingChat {
            accepts: api_key == GOOD_KEY,
            prompts: self.prompts.clone(),
        }))
    }
}

/// Memory index whose writes can be switched to fail.
#[derive(Default)]
struct FlakyIndex {
    inner: MemoryIndex,
    fail_upserts: AtomicBool,
    fail_listing: AtomicBool,
}

#[async_trait]
impl VectorIndex for FlakyIndex {
    async fn ensure_index(&self) -> Result<()> {
        self.inner.ensure_index().await
    }

    async fn list_namespaces(&self) -> Result<Vec<NamespaceStats>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(QaError::VectorStore("connection refused".into()));
        }
        self.inner.list_namespaces().await
    }

    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(QaError::VectorStore("quota exceeded".into()));
        }
        self.inner.upsert(namespace, records).await
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        self.inner.query(namespace, vector, top_k).await
    }

    async fn delete_all(&self, namespace: &str) -> Result<()> {
        self.inner.delete_all(namespace).await
    }
}

const CONFIG: &str = r#"
[server]
bind = "127.0.0.1:0"

[vector_store]
provider = "memory"
index_name = "rulebooks"
namespace_prefix = "gptda2-"
"#;

struct Harness {
    services: Services,
    index: Arc<FlakyIndex>,
    prompts: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

fn harness_with(config_text: &str) -> Harness {
    let config = parse_config(config_text).unwrap();
    let index = Arc::new(FlakyIndex::default());
    let models = FakeModels::default();
    let prompts = models.prompts.clone();
    let services = Services::new(
        &config,
        Arc::new(StubCatalog::new()),
        index.clone(),
        Arc::new(models),
    );
    Harness {
        services,
        index,
        prompts,
    }
}

fn harness() -> Harness {
    harness_with(CONFIG)
}

async fn seed_game(index: &FlakyIndex, game: &str, text: &str) {
    index
        .upsert(
            &format!("gptda2-{}", game),
            &[VectorRecord {
                id: format!("{}-0", game),
                values: letter_vector(text),
                text: text.to_string(),
            }],
        )
        .await
        .unwrap();
}

fn levels(ctx: &SessionContext) -> Vec<NoticeLevel> {
    ctx.notices().iter().map(|n| n.level).collect()
}

// ============ Key entry ============

#[tokio::test]
async fn test_new_session_has_no_key() {
    let mut ctx = SessionContext::new();
    assert_eq!(ctx.state(), SessionState::NoKey);

    let view = ctx.take_view();
    assert_eq!(view.state, SessionState::NoKey);
    assert!(view.games.is_empty());
    assert!(view.exchanges.is_empty());
}

#[tokio::test]
async fn test_blank_key_is_a_warning() {
    let h = harness();
    let mut ctx = SessionContext::new();

    ctx.enter_key(&h.services, "   ").await;

    assert_eq!(ctx.state(), SessionState::NoKey);
    assert_eq!(levels(&ctx), [NoticeLevel::Warning]);
}

#[tokio::test]
async fn test_key_loads_sorted_game_list() {
    let h = harness();
    seed_game(&h.index, "Root", "woodland alliance").await;
    seed_game(&h.index, "Azul", "pattern lines").await;

    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;

    assert_eq!(ctx.state(), SessionState::GameListLoaded);
    let view = ctx.take_view();
    assert_eq!(view.games, ["Azul", "Root"]);
    assert_eq!(view.selected_index, 0);
    assert!(view.notices.is_empty());
}

#[tokio::test]
async fn test_empty_database_warns() {
    let h = harness();
    let mut ctx = SessionContext::new();

    ctx.enter_key(&h.services, GOOD_KEY).await;

    let view = ctx.take_view();
    assert!(view.games.is_empty());
    assert_eq!(view.notices.len(), 1);
    assert_eq!(view.notices[0].level, NoticeLevel::Warning);
    assert!(view.notices[0].message.contains("empty"));
}

#[tokio::test]
async fn test_unreachable_index_is_an_error_notice() {
    let h = harness();
    h.index.fail_listing.store(true, Ordering::SeqCst);
    let mut ctx = SessionContext::new();

    ctx.enter_key(&h.services, GOOD_KEY).await;

    assert_eq!(ctx.state(), SessionState::KeyEntered);
    assert_eq!(levels(&ctx), [NoticeLevel::Error]);

    // The list is retried on the next action once the index is back.
    h.index.fail_listing.store(false, Ordering::SeqCst);
    seed_game(&h.index, "Root", "woodland alliance").await;
    ctx.ensure_games(&h.services).await;
    assert_eq!(ctx.games().unwrap().names(), ["Root"]);
}

#[tokio::test]
async fn test_key_check_rejects_bad_key_when_enabled() {
    let h = harness_with(&format!("{}\n[credentials]\nvalidate_key = true\n", CONFIG));
    let mut ctx = SessionContext::new();

    ctx.enter_key(&h.services, "sk-bad").await;
    assert_eq!(ctx.state(), SessionState::NoKey);
    assert_eq!(levels(&ctx), [NoticeLevel::Warning]);
    assert!(ctx.notices()[0].message.contains("rejected"));

    ctx.enter_key(&h.services, GOOD_KEY).await;
    assert_ne!(ctx.state(), SessionState::NoKey);
    // The key check went through the chat model.
    let prompts = h.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0][0].content, "say hi!");
}

#[tokio::test]
async fn test_key_not_checked_by_default() {
    let h = harness();
    let mut ctx = SessionContext::new();

    ctx.enter_key(&h.services, "sk-anything").await;

    assert_ne!(ctx.state(), SessionState::NoKey);
    assert!(h.prompts.lock().unwrap().is_empty());
}

// ============ Upload ============

#[tokio::test]
async fn test_upload_indexes_and_selects_game() {
    let h = harness();
    seed_game(&h.index, "Root", "woodland alliance").await;
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;

    let pdf = pdf_with_text("Robber moves when a seven is rolled");
    ctx.upload(&h.services, Some("13_rules.pdf"), &pdf).await;

    assert_eq!(ctx.state(), SessionState::GameSelected);
    assert_eq!(ctx.active_game(), Some("Catan"));
    assert_eq!(levels(&ctx), [NoticeLevel::Info, NoticeLevel::Success]);
    assert!(ctx.notices()[0].message.contains("Catan"));

    let view = ctx.take_view();
    assert_eq!(view.games, ["Catan", "Root"]);
    assert_eq!(view.selected_index, 0);

    let namespaces = h.index.list_namespaces().await.unwrap();
    assert!(namespaces.iter().any(|ns| ns.name == "gptda2-Catan"));
}

#[tokio::test]
async fn test_reupload_does_not_duplicate() {
    let h = harness();
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;

    let pdf = pdf_with_text("Robber moves when a seven is rolled");
    ctx.upload(&h.services, Some("13_rules.pdf"), &pdf).await;
    let first = h.index.list_namespaces().await.unwrap();
    ctx.upload(&h.services, Some("13_faq.pdf"), &pdf).await;
    let second = h.index.list_namespaces().await.unwrap();

    assert_eq!(ctx.games().unwrap().names(), ["Catan"]);
    // Same chunk hashes overwrite the same vector IDs.
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_upload_without_file_warns() {
    let h = harness();
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;
    ctx.take_view();

    ctx.upload(&h.services, None, &[]).await;

    assert_eq!(levels(&ctx), [NoticeLevel::Warning]);
    assert!(!ctx.has_conversation());
}

#[tokio::test]
async fn test_upload_needs_key() {
    let h = harness();
    let mut ctx = SessionContext::new();

    let pdf = pdf_with_text("Robber moves when a seven is rolled");
    ctx.upload(&h.services, Some("13_rules.pdf"), &pdf).await;

    assert_eq!(ctx.state(), SessionState::NoKey);
    assert_eq!(levels(&ctx), [NoticeLevel::Warning]);
    assert!(h.index.list_namespaces().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_bad_filename_warns() {
    let h = harness();
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;
    ctx.take_view();

    let pdf = pdf_with_text("Robber moves when a seven is rolled");
    ctx.upload(&h.services, Some("catan-rules.pdf"), &pdf).await;

    assert_eq!(levels(&ctx), [NoticeLevel::Warning]);
    assert!(ctx.notices()[0].message.contains("catan-rules.pdf"));
    assert!(!ctx.has_conversation());
}

#[tokio::test]
async fn test_upload_unknown_game_changes_nothing() {
    let h = harness();
    seed_game(&h.index, "Root", "woodland alliance").await;
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;
    ctx.take_view();

    let pdf = pdf_with_text("Robber moves when a seven is rolled");
    ctx.upload(&h.services, Some("999999_rules.pdf"), &pdf).await;

    assert_eq!(ctx.state(), SessionState::GameListLoaded);
    assert_eq!(levels(&ctx), [NoticeLevel::Warning]);
    assert!(ctx.notices()[0].message.contains("999999"));
    assert_eq!(ctx.games().unwrap().names(), ["Root"]);
}

#[tokio::test]
async fn test_upload_unreadable_pdf_warns() {
    let h = harness();
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;
    ctx.take_view();

    ctx.upload(&h.services, Some("13_rules.pdf"), b"definitely not a pdf")
        .await;

    assert_eq!(levels(&ctx), [NoticeLevel::Warning]);
    assert!(h.index.list_namespaces().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_write_keeps_previous_conversation() {
    let h = harness();
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;

    let pdf = pdf_with_text("Robber moves when a seven is rolled");
    ctx.upload(&h.services, Some("13_rules.pdf"), &pdf).await;
    assert_eq!(ctx.active_game(), Some("Catan"));
    ctx.take_view();

    h.index.fail_upserts.store(true, Ordering::SeqCst);
    let pdf = pdf_with_text("Players clear the forest of marquise warriors");
    ctx.upload(&h.services, Some("237182_rules.pdf"), &pdf).await;

    // Info for the identified game, then the failure.
    assert_eq!(levels(&ctx), [NoticeLevel::Info, NoticeLevel::Error]);
    assert_eq!(ctx.active_game(), Some("Catan"));
    assert!(ctx.has_conversation());
    assert_eq!(ctx.games().unwrap().names(), ["Catan"]);
}

#[tokio::test]
async fn test_upload_malformed_pdf_warns() {
    let h = harness();
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;
    ctx.take_view();

    // Parses as a PDF, but shows text before any font is selected.
    let pdf = pdf_with_content("BT 72 700 Td (Robber moves) Tj ET");
    ctx.upload(&h.services, Some("13_rules.pdf"), &pdf).await;

    assert_eq!(levels(&ctx), [NoticeLevel::Warning]);
    assert!(ctx.notices()[0].message.contains("13_rules.pdf"));
    assert!(!ctx.has_conversation());
    assert!(h.index.list_namespaces().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_first_write_leaves_no_conversation() {
    let h = harness();
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;
    ctx.take_view();

    h.index.fail_upserts.store(true, Ordering::SeqCst);
    let pdf = pdf_with_text("Robber moves when a seven is rolled");
    ctx.upload(&h.services, Some("13_rules.pdf"), &pdf).await;

    assert_eq!(levels(&ctx), [NoticeLevel::Info, NoticeLevel::Error]);
    assert!(!ctx.has_conversation());
    assert_eq!(ctx.active_game(), None);
    assert_eq!(ctx.state(), SessionState::GameListLoaded);
    assert!(ctx.games().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_during_listing_outage_merges_on_recovery() {
    let h = harness();
    seed_game(&h.index, "Root", "woodland alliance").await;
    h.index.fail_listing.store(true, Ordering::SeqCst);
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;
    ctx.take_view();

    let pdf = pdf_with_text("Robber moves when a seven is rolled");
    ctx.upload(&h.services, Some("13_rules.pdf"), &pdf).await;
    assert_eq!(ctx.games().unwrap().names(), ["Catan"]);
    ctx.take_view();

    h.index.fail_listing.store(false, Ordering::SeqCst);
    ctx.ensure_games(&h.services).await;

    assert!(ctx.notices().is_empty());
    assert_eq!(ctx.games().unwrap().names(), ["Catan", "Root"]);
    assert_eq!(ctx.selected_index(), 0);
    assert_eq!(ctx.active_game(), Some("Catan"));

    // The merged list is kept; later actions do not reload it.
    ctx.select_game(&h.services, "Root").await;
    assert_eq!(ctx.selected_index(), 1);
}

// ============ Selection & questions ============

#[tokio::test]
async fn test_select_unknown_game_warns() {
    let h = harness();
    seed_game(&h.index, "Root", "woodland alliance").await;
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;

    ctx.select_game(&h.services, "Twilight Imperium").await;

    assert_eq!(levels(&ctx), [NoticeLevel::Warning]);
    assert!(!ctx.has_conversation());
}

#[tokio::test]
async fn test_select_attaches_conversation() {
    let h = harness();
    seed_game(&h.index, "Azul", "pattern lines").await;
    seed_game(&h.index, "Root", "woodland alliance").await;
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;

    ctx.select_game(&h.services, "Root").await;

    assert_eq!(ctx.state(), SessionState::GameSelected);
    assert_eq!(ctx.selected_index(), 1);
    assert_eq!(ctx.active_game(), Some("Root"));
}

#[tokio::test]
async fn test_ask_uses_selected_game_context() {
    let h = harness();
    seed_game(&h.index, "Root", "The woodland alliance spreads sympathy").await;
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;

    // No explicit selection: the first game in the list is used.
    ctx.ask(&h.services, "How does sympathy spread?").await;

    assert_eq!(ctx.state(), SessionState::Conversing);
    assert_eq!(ctx.active_game(), Some("Root"));
    let view = ctx.take_view();
    assert_eq!(view.exchanges.len(), 1);
    assert_eq!(view.exchanges[0].question, "How does sympathy spread?");
    assert_eq!(view.exchanges[0].answer, "answer 1");

    let prompts = h.prompts.lock().unwrap();
    assert!(prompts[0][0].content.contains("woodland alliance"));
}

#[tokio::test]
async fn test_exchanges_newest_first() {
    let h = harness();
    seed_game(&h.index, "Root", "The woodland alliance spreads sympathy").await;
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;

    ctx.ask(&h.services, "first question").await;
    ctx.ask(&h.services, "second question").await;

    let view = ctx.take_view();
    assert_eq!(view.exchanges.len(), 2);
    assert_eq!(view.exchanges[0].question, "second question");
    assert_eq!(view.exchanges[1].question, "first question");
    // Second turn: one condense call plus one answer call.
    assert_eq!(view.exchanges[0].answer, "answer 3");
}

#[tokio::test]
async fn test_switching_game_starts_fresh_history() {
    let h = harness();
    seed_game(&h.index, "Azul", "pattern lines and floor line").await;
    seed_game(&h.index, "Root", "The woodland alliance spreads sympathy").await;
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;

    ctx.ask(&h.services, "What is the floor line?").await;
    assert_eq!(ctx.active_game(), Some("Azul"));

    ctx.select_game(&h.services, "Root").await;
    assert_eq!(ctx.state(), SessionState::GameSelected);
    assert!(ctx.take_view().exchanges.is_empty());
}

#[tokio::test]
async fn test_bad_key_fails_question_with_error() {
    let h = harness();
    seed_game(&h.index, "Root", "The woodland alliance spreads sympathy").await;
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, "sk-expired").await;
    ctx.take_view();

    ctx.ask(&h.services, "How does sympathy spread?").await;

    assert_eq!(levels(&ctx), [NoticeLevel::Error]);
    assert!(ctx.notices()[0].message.contains("OpenAI key"));
    assert!(ctx.take_view().exchanges.is_empty());
}

#[tokio::test]
async fn test_new_key_resets_conversation() {
    let h = harness();
    seed_game(&h.index, "Root", "The woodland alliance spreads sympathy").await;
    let mut ctx = SessionContext::new();
    ctx.enter_key(&h.services, GOOD_KEY).await;
    ctx.ask(&h.services, "How does sympathy spread?").await;
    assert!(ctx.has_conversation());

    ctx.enter_key(&h.services, "sk-other").await;

    assert!(!ctx.has_conversation());
    assert_eq!(ctx.state(), SessionState::GameListLoaded);
}

// ============ Store ============

#[tokio::test]
async fn test_session_store_lifecycle() {
    let store = SessionStore::new(Duration::from_secs(3600));
    assert_eq!(store.len().await, 0);

    let handle = store.create().await;
    let id = handle.lock().await.id();
    assert_eq!(store.len().await, 1);
    assert!(store.get(&id).await.is_some());

    assert!(store.remove(&id).await);
    assert!(!store.remove(&id).await);
    assert!(store.get(&id).await.is_none());
}

#[tokio::test]
async fn test_idle_sessions_are_evicted() {
    let store = SessionStore::new(Duration::from_millis(50));
    let stale = store.create().await.lock().await.id();

    tokio::time::sleep(Duration::from_millis(150)).await;

    // Creating another session sweeps the idle one.
    let fresh = store.create().await.lock().await.id();
    assert_eq!(store.len().await, 1);
    assert!(store.get(&stale).await.is_none());
    assert!(store.get(&fresh).await.is_some());
}

#[tokio::test]
async fn test_lookup_keeps_session_alive() {
    let store = SessionStore::new(Duration::from_millis(300));
    let id = store.create().await.lock().await.id();

    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.get(&id).await.is_some());
    }
    assert_eq!(store.len().await, 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(store.get(&id).await.is_none());
    assert_eq!(store.len().await, 0);
}
