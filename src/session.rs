//! Per-browser-session state and the handlers for each user action.
//!
//! A [`SessionContext`] is created when a visitor opens the page and
//! discarded when they leave. Each user action maps to one handler method;
//! handlers never fail outward. Every error is turned into a sidebar
//! [`Notice`] and the context is left in a consistent state.
//!
//! # State machine
//!
//! ```text
//! NoKey ──key──▶ KeyEntered ──games loaded──▶ GameListLoaded ◀──▶ GameSelected ──ask──▶ Conversing
//!   ▲                                                                  │
//!   └────────────────────── key rejected ──────────────────────────────┘
//! ```
//!
//! The state is derived from the context's fields (see
//! [`SessionContext::state`]) so it cannot drift from them.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::catalog::{identify_rulebook, Catalog};
use crate::chunk::chunk_text;
use crate::config::{ChunkingConfig, Config};
use crate::conversation::{reverse_pairs, Conversation};
use crate::error::{QaError, Result};
use crate::games::{namespace_for, GameList};
use crate::index::VectorIndex;
use crate::llm::{check_key, ModelProvider};
use crate::models::{Exchange, Notice, NoticeLevel};
use crate::vectorstore::{create_vectorstore, fetch_vectorstore};

/// Shared collaborators and settings every session uses.
pub struct Services {
    pub catalog: Arc<dyn Catalog>,
    pub index: Arc<dyn VectorIndex>,
    pub models: Arc<dyn ModelProvider>,
    pub chunking: ChunkingConfig,
    pub namespace_prefix: String,
    pub retrieval_k: usize,
    /// Check user keys before accepting them.
    pub validate_key: bool,
}

impl Services {
    pub fn new(
        config: &Config,
        catalog: Arc<dyn Catalog>,
        index: Arc<dyn VectorIndex>,
        models: Arc<dyn ModelProvider>,
    ) -> Self {
        Self {
            catalog,
            index,
            models,
            chunking: config.chunking.clone(),
            namespace_prefix: config.vector_store.namespace_prefix.clone(),
            retrieval_k: config.llm.retrieval_k,
            validate_key: config.credentials.validate_key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NoKey,
    KeyEntered,
    GameListLoaded,
    GameSelected,
    Conversing,
}

/// Snapshot returned to the page after every action.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub state: SessionState,
    pub games: Vec<String>,
    pub selected_index: usize,
    pub active_game: Option<String>,
    pub notices: Vec<Notice>,
    /// Newest exchange first.
    pub exchanges: Vec<Exchange>,
}

pub struct SessionContext {
    id: Uuid,
    api_key: Option<String>,
    games: Option<GameList>,
    /// Set once `games` came from the index rather than from uploads alone.
    games_loaded: bool,
    selected_index: usize,
    /// Game the conversation is bound to.
    active_game: Option<String>,
    conversation: Option<Conversation>,
    notices: Vec<Notice>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            api_key: None,
            games: None,
            games_loaded: false,
            selected_index: 0,
            active_game: None,
            conversation: None,
            notices: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        match (&self.api_key, &self.games, &self.conversation) {
            (None, _, _) => SessionState::NoKey,
            (Some(_), None, _) => SessionState::KeyEntered,
            (Some(_), Some(_), None) => SessionState::GameListLoaded,
            (Some(_), Some(_), Some(c)) if c.history().is_empty() => SessionState::GameSelected,
            (Some(_), Some(_), Some(_)) => SessionState::Conversing,
        }
    }

    pub fn games(&self) -> Option<&GameList> {
        self.games.as_ref()
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn active_game(&self) -> Option<&str> {
        self.active_game.as_deref()
    }

    pub fn has_conversation(&self) -> bool {
        self.conversation.is_some()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Builds the page snapshot and drains pending notices.
    pub fn take_view(&mut self) -> SessionView {
        SessionView {
            id: self.id,
            state: self.state(),
            games: self
                .games
                .as_ref()
                .map(|g| g.names().to_vec())
                .unwrap_or_default(),
            selected_index: self.selected_index,
            active_game: self.active_game.clone(),
            notices: std::mem::take(&mut self.notices),
            exchanges: self
                .conversation
                .as_ref()
                .map(|c| reverse_pairs(c.history()))
                .unwrap_or_default(),
        }
    }

    // ============ Handlers ============

    /// The user typed a model key.
    pub async fn enter_key(&mut self, svc: &Services, key: &str) {
        let key = key.trim();
        if key.is_empty() {
            self.notify(NoticeLevel::Warning, "Enter your OpenAI API key to start.");
            return;
        }

        if self.api_key.as_deref() != Some(key) {
            // Clients are bound to the old key.
            self.conversation = None;
            self.active_game = None;
        }

        if svc.validate_key {
            let verdict = match svc.models.chat(key) {
                Ok(chat) => check_key(chat.as_ref()).await,
                Err(e) => Err(QaError::InvalidKey(e.to_string())),
            };
            if let Err(e) = verdict {
                self.api_key = None;
                self.report(e);
                return;
            }
        }

        self.api_key = Some(key.to_string());
        tracing::info!(session = %self.id, "model key accepted");
        self.ensure_games(svc).await;
    }

    /// Loads the game list unless this session already has a non-empty one.
    pub async fn ensure_games(&mut self, svc: &Services) {
        self.refresh_games(svc, true).await;
    }

    /// Like [`ensure_games`](Self::ensure_games); only key entry announces
    /// an empty database, other actions report their own outcome.
    async fn refresh_games(&mut self, svc: &Services, announce_empty: bool) {
        if self.api_key.is_none() {
            return;
        }
        if self.games_loaded && self.games.as_ref().is_some_and(|g| !g.is_empty()) {
            return;
        }

        match GameList::load(svc.index.as_ref(), &svc.namespace_prefix).await {
            Ok(mut list) => {
                if list.is_empty() && announce_empty {
                    self.notify(NoticeLevel::Warning, "The game database is empty.");
                }
                // Keep games uploaded while the index listing was failing.
                if let Some(uploaded) = self.games.take() {
                    for name in uploaded.names() {
                        list.insert(name);
                    }
                }
                self.selected_index = self
                    .active_game
                    .as_deref()
                    .and_then(|game| list.position(game))
                    .unwrap_or(0);
                self.games = Some(list);
                self.games_loaded = true;
            }
            Err(e) => {
                tracing::error!(session = %self.id, error = %e, "failed to load game list");
                self.notify(
                    NoticeLevel::Error,
                    format!("Error loading the game database, reload the page: {}", e),
                );
            }
        }
    }

    /// The user picked a game in the selector.
    pub async fn select_game(&mut self, svc: &Services, name: &str) {
        if let Err(e) = self.require_key() {
            self.report(e);
            return;
        }
        self.refresh_games(svc, false).await;

        let Some(position) = self.games.as_ref().and_then(|g| g.position(name)) else {
            self.report(QaError::Precondition(format!("Unknown game '{}'.", name)));
            return;
        };
        self.selected_index = position;

        if self.active_game.as_deref() != Some(name) {
            if let Err(e) = self.attach(svc, name).await {
                self.report(e);
            }
        }
    }

    /// The user submitted a rulebook with the Process button.
    pub async fn upload(&mut self, svc: &Services, file_name: Option<&str>, bytes: &[u8]) {
        let file_name = match file_name {
            Some(name) if !bytes.is_empty() => name,
            _ => {
                self.notify(
                    NoticeLevel::Warning,
                    "Upload the game's rules/FAQ PDF first, named <ID>_<type>.pdf",
                );
                return;
            }
        };

        if let Err(e) = self.try_upload(svc, file_name, bytes).await {
            self.report(e);
        }
    }

    async fn try_upload(&mut self, svc: &Services, file_name: &str, bytes: &[u8]) -> Result<()> {
        let key = self.require_key()?.to_string();
        self.refresh_games(svc, false).await;

        let rulebook = identify_rulebook(svc.catalog.as_ref(), file_name, bytes).await?;
        self.notify(
            NoticeLevel::Info,
            format!("Processing the game: '{}'", rulebook.title),
        );

        let chunks = chunk_text(&rulebook.text, &svc.chunking);
        let namespace = namespace_for(&svc.namespace_prefix, &rulebook.title);
        let embedder = svc.models.embedder(&key)?;
        let store = create_vectorstore(svc.index.clone(), embedder, &chunks, &namespace).await?;
        let chat = svc.models.chat(&key)?;

        self.conversation = Some(Conversation::new(store, chat, svc.retrieval_k));
        self.active_game = Some(rulebook.title.clone());
        let games = self.games.get_or_insert_with(GameList::default);
        self.selected_index = games.insert(&rulebook.title);

        tracing::info!(
            session = %self.id,
            game = %rulebook.title,
            chunks = chunks.len(),
            "rulebook uploaded"
        );
        self.notify(NoticeLevel::Success, "File uploaded successfully!");
        Ok(())
    }

    /// The user asked a question about the selected game.
    pub async fn ask(&mut self, svc: &Services, question: &str) {
        if let Err(e) = self.try_ask(svc, question).await {
            self.report(e);
        }
    }

    async fn try_ask(&mut self, svc: &Services, question: &str) -> Result<()> {
        self.require_key()?;
        self.refresh_games(svc, false).await;

        let selected = self
            .games
            .as_ref()
            .and_then(|g| g.get(self.selected_index))
            .map(str::to_string)
            .ok_or_else(|| QaError::Precondition("The game database is empty.".into()))?;

        if self.active_game.as_deref() != Some(selected.as_str()) || self.conversation.is_none()
        {
            self.attach(svc, &selected).await?;
        }

        let conversation = self
            .conversation
            .as_mut()
            .ok_or_else(|| QaError::Precondition("No game is selected.".into()))?;
        conversation.ask(question).await.map_err(|e| match e {
            QaError::LanguageModel(msg) => QaError::LanguageModel(format!(
                "{} (check the value of your OpenAI key)",
                msg
            )),
            other => other,
        })?;
        Ok(())
    }

    // ============ Internals ============

    /// Binds a fresh conversation to `game`'s namespace. On failure the
    /// session is left with no active game.
    async fn attach(&mut self, svc: &Services, game: &str) -> Result<()> {
        self.conversation = None;
        self.active_game = None;

        let key = self.require_key()?.to_string();
        let namespace = namespace_for(&svc.namespace_prefix, game);
        let embedder = svc.models.embedder(&key)?;
        let store = fetch_vectorstore(svc.index.clone(), embedder, &namespace).await?;
        let chat = svc.models.chat(&key)?;

        self.conversation = Some(Conversation::new(store, chat, svc.retrieval_k));
        self.active_game = Some(game.to_string());
        tracing::debug!(session = %self.id, %namespace, "conversation attached");
        Ok(())
    }

    fn require_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| QaError::Precondition("Enter your OpenAI API key first.".into()))
    }

    fn report(&mut self, err: QaError) {
        tracing::warn!(session = %self.id, error = %err, "action failed");
        let level = err.level();
        self.notify(level, err.to_string());
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice::new(level, message));
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// All live sessions, each behind its own lock so one visitor's actions
/// run one at a time.
///
/// A session that sees no request for `idle_timeout` is dropped the next
/// time any session is created or looked up.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, StoredSession>>,
    idle_timeout: Duration,
}

struct StoredSession {
    context: Arc<Mutex<SessionContext>>,
    last_seen: Instant,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub async fn create(&self) -> Arc<Mutex<SessionContext>> {
        let ctx = SessionContext::new();
        let id = ctx.id();
        let handle = Arc::new(Mutex::new(ctx));

        let mut sessions = self.sessions.write().await;
        self.evict_idle(&mut sessions);
        sessions.insert(
            id,
            StoredSession {
                context: handle.clone(),
                last_seen: Instant::now(),
            },
        );
        tracing::debug!(session = %id, live = sessions.len(), "session started");
        handle
    }

    /// Returns the session and marks it as active.
    pub async fn get(&self, id: &Uuid) -> Option<Arc<Mutex<SessionContext>>> {
        let mut sessions = self.sessions.write().await;
        self.evict_idle(&mut sessions);
        let stored = sessions.get_mut(id)?;
        stored.last_seen = Instant::now();
        Some(stored.context.clone())
    }

    /// Ends a session. Returns `false` if it did not exist.
    pub async fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::debug!(session = %id, "session ended");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn evict_idle(&self, sessions: &mut HashMap<Uuid, StoredSession>) {
        let before = sessions.len();
        sessions.retain(|_, stored| stored.last_seen.elapsed() < self.idle_timeout);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, live = sessions.len(), "discarded idle sessions");
        }
    }
}
