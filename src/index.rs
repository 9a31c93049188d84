//! Vector index abstraction and backends.
//!
//! The [`VectorIndex`] trait is the seam to the vector database. Records are
//! partitioned by namespace, one namespace per game.
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`PineconeIndex`] | Pinecone pod-based REST API |
//! | [`MemoryIndex`] | In-process brute-force cosine search, for tests and local runs |

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{OnceCell, RwLock};

use crate::config::VectorStoreConfig;
use crate::embedding::cosine_similarity;
use crate::error::{QaError, Result};
use crate::models::{ScoredChunk, VectorRecord};

/// A namespace and the number of vectors it holds.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceStats {
    pub name: String,
    pub vector_count: u64,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Creates the index if it does not exist yet.
    async fn ensure_index(&self) -> Result<()>;

    /// Lists every namespace in the index.
    async fn list_namespaces(&self) -> Result<Vec<NamespaceStats>>;

    /// Inserts or overwrites records (matched by ID) in a namespace.
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()>;

    /// Returns the `top_k` records most similar to `vector`, best first.
    async fn query(&self, namespace: &str, vector: &[f32], top_k: usize)
        -> Result<Vec<ScoredChunk>>;

    /// Deletes every record in a namespace.
    async fn delete_all(&self, namespace: &str) -> Result<()>;
}

/// Builds the backend named by `vector_store.provider`.
pub fn create_index(config: &VectorStoreConfig) -> Result<Box<dyn VectorIndex>> {
    match config.provider.as_str() {
        "pinecone" => Ok(Box::new(PineconeIndex::new(config)?)),
        "memory" => Ok(Box::new(MemoryIndex::new())),
        other => Err(QaError::VectorStore(format!(
            "Unknown vector store provider: {}",
            other
        ))),
    }
}

// ============ Pinecone ============

/// Pinecone index reached over its REST API.
///
/// The data-plane host is `https://<index>-<project>.svc.<environment>.pinecone.io`;
/// the project name comes from the controller's `whoami` endpoint unless
/// `vector_store.index_host` is configured.
pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: String,
    controller_url: String,
    environment: String,
    index_name: String,
    dimension: usize,
    metric: String,
    pods: u32,
    replicas: u32,
    pod_type: String,
    upsert_batch_size: usize,
    host: OnceCell<String>,
}

#[derive(Deserialize)]
struct WhoAmI {
    project_name: String,
}

#[derive(Deserialize)]
struct IndexStats {
    #[serde(default)]
    namespaces: HashMap<String, NamespaceSummary>,
}

#[derive(Deserialize)]
struct NamespaceSummary {
    #[serde(default, rename = "vectorCount")]
    vector_count: u64,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

impl PineconeIndex {
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let api_key = config
            .api_key()
            .map_err(|e| QaError::VectorStore(e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QaError::VectorStore(e.to_string()))?;

        let host = OnceCell::new();
        if let Some(h) = &config.index_host {
            let _ = host.set(h.trim_end_matches('/').to_string());
        }

        Ok(Self {
            client,
            api_key,
            controller_url: config.controller_url().trim_end_matches('/').to_string(),
            environment: config.environment.clone(),
            index_name: config.index_name.clone(),
            dimension: config.dimension,
            metric: config.metric.clone(),
            pods: config.pods,
            replicas: config.replicas,
            pod_type: config.pod_type.clone(),
            upsert_batch_size: config.upsert_batch_size.max(1),
            host,
        })
    }

    async fn host(&self) -> Result<&str> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let whoami: WhoAmI = self
                    .send(
                        self.client
                            .get(format!("{}/actions/whoami", self.controller_url)),
                    )
                    .await?
                    .json()
                    .await
                    .map_err(|e| QaError::VectorStore(e.to_string()))?;
                Ok::<_, QaError>(format!(
                    "https://{}-{}.svc.{}.pinecone.io",
                    self.index_name, whoami.project_name, self.environment
                ))
            })
            .await?;
        Ok(host.as_str())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .header("Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| QaError::VectorStore(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(QaError::VectorStore(format!(
                "Pinecone API error {}: {}",
                status, body_text
            )));
        }
        Ok(response)
    }

    async fn post_data(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.host().await?, path);
        self.send(self.client.post(url).json(&body)).await
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn ensure_index(&self) -> Result<()> {
        let indexes: Vec<String> = self
            .send(self.client.get(format!("{}/databases", self.controller_url)))
            .await?
            .json()
            .await
            .map_err(|e| QaError::VectorStore(e.to_string()))?;

        if indexes.iter().any(|name| name == &self.index_name) {
            return Ok(());
        }

        tracing::info!(index = %self.index_name, dimension = self.dimension, "creating index");
        let body = serde_json::json!({
            "name": self.index_name,
            "dimension": self.dimension,
            "metric": self.metric,
            "pods": self.pods,
            "replicas": self.replicas,
            "pod_type": self.pod_type,
        });
        self.send(
            self.client
                .post(format!("{}/databases", self.controller_url))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn list_namespaces(&self) -> Result<Vec<NamespaceStats>> {
        let stats: IndexStats = self
            .post_data("/describe_index_stats", serde_json::json!({}))
            .await?
            .json()
            .await
            .map_err(|e| QaError::VectorStore(e.to_string()))?;

        Ok(stats
            .namespaces
            .into_iter()
            .map(|(name, summary)| NamespaceStats {
                name,
                vector_count: summary.vector_count,
            })
            .collect())
    }

    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()> {
        for batch in records.chunks(self.upsert_batch_size) {
            let vectors: Vec<serde_json::Value> = batch
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "id": r.id,
                        "values": r.values,
                        "metadata": { "text": r.text },
                    })
                })
                .collect();
            self.post_data(
                "/vectors/upsert",
                serde_json::json!({ "vectors": vectors, "namespace": namespace }),
            )
            .await?;
        }
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let body = serde_json::json!({
            "namespace": namespace,
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
        });
        let response: QueryResponse = self
            .post_data("/query", body)
            .await?
            .json()
            .await
            .map_err(|e| QaError::VectorStore(e.to_string()))?;

        Ok(response
            .matches
            .into_iter()
            .map(|m| ScoredChunk {
                id: m.id,
                score: m.score,
                text: m
                    .metadata
                    .as_ref()
                    .and_then(|md| md.get("text"))
                    .and_then(|t| t.as_str())
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect())
    }

    async fn delete_all(&self, namespace: &str) -> Result<()> {
        self.post_data(
            "/vectors/delete",
            serde_json::json!({ "deleteAll": true, "namespace": namespace }),
        )
        .await?;
        Ok(())
    }
}

// ============ In-memory ============

/// In-memory index keyed by namespace.
#[derive(Default)]
pub struct MemoryIndex {
    namespaces: RwLock<HashMap<String, Vec<VectorRecord>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn ensure_index(&self) -> Result<()> {
        Ok(())
    }

    async fn list_namespaces(&self) -> Result<Vec<NamespaceStats>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(name, records)| NamespaceStats {
                name: name.clone(),
                vector_count: records.len() as u64,
            })
            .collect())
    }

    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        let stored = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let namespaces = self.namespaces.read().await;
        let Some(records) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredChunk> = records
            .iter()
            .map(|r| ScoredChunk {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.values),
                text: r.text.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete_all(&self, namespace: &str) -> Result<()> {
        self.namespaces.write().await.remove(namespace);
        Ok(())
    }
}
