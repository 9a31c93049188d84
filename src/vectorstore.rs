//! Per-game vector stores.
//!
//! A [`GameStore`] is a handle on one game's namespace together with the
//! embedder used to query it. [`create_vectorstore`] embeds and writes an
//! upload's chunks; [`fetch_vectorstore`] attaches to a namespace that
//! already holds vectors.

use std::sync::Arc;

use crate::embedding::Embedder;
use crate::error::{QaError, Result};
use crate::index::VectorIndex;
use crate::models::{Chunk, ScoredChunk, VectorRecord};

/// One game's namespace, ready for retrieval.
#[derive(Clone)]
pub struct GameStore {
    namespace: String,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
}

impl GameStore {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the `k` chunks closest to `query`.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let vector = self.embedder.embed_query(query).await?;
        self.index.query(&self.namespace, &vector, k).await
    }
}

/// Embeds `chunks` and writes them into `namespace`.
///
/// Nothing is written unless every chunk was embedded. A failed write is
/// reported as a failure of the whole operation.
pub async fn create_vectorstore(
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    chunks: &[Chunk],
    namespace: &str,
) -> Result<GameStore> {
    if chunks.is_empty() {
        return Err(QaError::VectorStore(format!(
            "no text chunks to index for {}",
            namespace
        )));
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_texts(&texts).await?;

    let records: Vec<VectorRecord> = chunks
        .iter()
        .zip(vectors)
        .map(|(chunk, values)| VectorRecord {
            id: chunk.hash.clone(),
            values,
            text: chunk.text.clone(),
        })
        .collect();

    index.upsert(namespace, &records).await?;
    tracing::info!(
        %namespace,
        records = records.len(),
        model = embedder.model_name(),
        "indexed rulebook chunks"
    );

    Ok(GameStore {
        namespace: namespace.to_string(),
        index,
        embedder,
    })
}

/// Attaches to an existing namespace.
pub async fn fetch_vectorstore(
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    namespace: &str,
) -> Result<GameStore> {
    let namespaces = index.list_namespaces().await?;
    if !namespaces.iter().any(|ns| ns.name == namespace) {
        return Err(QaError::VectorStore(format!(
            "namespace '{}' does not exist",
            namespace
        )));
    }

    Ok(GameStore {
        namespace: namespace.to_string(),
        index,
        embedder,
    })
}
