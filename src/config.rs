use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
    /// Sessions with no request for this long are discarded.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

fn default_max_upload_mb() -> usize {
    50
}
fn default_session_idle_secs() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separator: default_separator(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_separator() -> String {
    "\n".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_base_url")]
    pub base_url: String,
    /// Page title the catalog serves for unknown IDs.
    #[serde(default = "default_not_found_title")]
    pub not_found_title: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_base_url(),
            not_found_title: default_not_found_title(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_catalog_base_url() -> String {
    "https://boardgamegeek.com/boardgame/".to_string()
}
fn default_not_found_title() -> String {
    "BoardGameGeek".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    /// `pinecone` or `memory`.
    #[serde(default = "default_vector_provider")]
    pub provider: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub environment: String,
    pub index_name: String,
    pub namespace_prefix: String,
    /// Skips host discovery through the controller when set.
    #[serde(default)]
    pub index_host: Option<String>,
    #[serde(default)]
    pub controller_url: Option<String>,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default = "default_one")]
    pub pods: u32,
    #[serde(default = "default_one")]
    pub replicas: u32,
    #[serde(default = "default_pod_type")]
    pub pod_type: String,
    #[serde(default = "default_upsert_batch")]
    pub upsert_batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_vector_provider() -> String {
    "pinecone".to_string()
}
fn default_api_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}
fn default_dimension() -> usize {
    1536
}
fn default_metric() -> String {
    "cosine".to_string()
}
fn default_one() -> u32 {
    1
}
fn default_pod_type() -> String {
    "p1.x1".to_string()
}
fn default_upsert_batch() -> usize {
    100
}

impl VectorStoreConfig {
    /// Reads the API key from the environment variable named in config.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .with_context(|| format!("{} environment variable not set", self.api_key_env))
    }

    pub fn controller_url(&self) -> String {
        self.controller_url
            .clone()
            .unwrap_or_else(|| format!("https://controller.{}.pinecone.io", self.environment))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Chunks retrieved per question.
    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,
    #[serde(default = "default_embedding_batch")]
    pub embedding_batch_size: usize,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            embedding_model: default_embedding_model(),
            chat_model: default_chat_model(),
            temperature: default_temperature(),
            retrieval_k: default_retrieval_k(),
            embedding_batch_size: default_embedding_batch(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_retrieval_k() -> usize {
    4
}
fn default_embedding_batch() -> usize {
    64
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CredentialsConfig {
    /// Send a test request before accepting a user's model key.
    #[serde(default)]
    pub validate_key: bool,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.server.max_upload_mb == 0 {
        anyhow::bail!("server.max_upload_mb must be > 0");
    }
    if config.server.session_idle_secs == 0 {
        anyhow::bail!("server.session_idle_secs must be > 0");
    }

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }
    if config.chunking.separator.is_empty() {
        anyhow::bail!("chunking.separator must not be empty");
    }

    // Validate vector store
    if config.vector_store.index_name.trim().is_empty() {
        anyhow::bail!("vector_store.index_name must not be empty");
    }
    if config.vector_store.namespace_prefix.is_empty() {
        anyhow::bail!("vector_store.namespace_prefix must not be empty");
    }
    match config.vector_store.provider.as_str() {
        "pinecone" => {
            if config.vector_store.environment.is_empty() && config.vector_store.index_host.is_none()
            {
                anyhow::bail!(
                    "vector_store.environment or vector_store.index_host is required for pinecone"
                );
            }
        }
        "memory" => {}
        other => anyhow::bail!(
            "Unknown vector store provider: '{}'. Must be pinecone or memory.",
            other
        ),
    }

    // Validate llm
    if config.llm.retrieval_k == 0 {
        anyhow::bail!("llm.retrieval_k must be >= 1");
    }
    if config.llm.embedding_batch_size == 0 {
        anyhow::bail!("llm.embedding_batch_size must be >= 1");
    }

    Ok(config)
}
