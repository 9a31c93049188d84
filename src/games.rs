//! The per-session list of games that have indexed rulebooks.
//!
//! Games are the namespaces of the index that start with the configured
//! prefix, with the prefix stripped. The list is kept sorted and free of
//! duplicates.

use crate::catalog::Catalog;
use crate::error::Result;
use crate::index::{NamespaceStats, VectorIndex};

/// Builds the namespace that holds a game's vectors.
pub fn namespace_for(prefix: &str, game: &str) -> String {
    format!("{}{}", prefix, game)
}

/// Recovers the game name from a namespace, if it carries `prefix`.
pub fn game_from_namespace<'a>(prefix: &str, namespace: &'a str) -> Option<&'a str> {
    namespace.strip_prefix(prefix).filter(|name| !name.is_empty())
}

/// Sorted, duplicate-free game names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameList {
    names: Vec<String>,
}

impl GameList {
    pub fn from_names(names: impl IntoIterator<Item = String>) -> Self {
        let mut names: Vec<String> = names.into_iter().collect();
        names.sort();
        names.dedup();
        Self { names }
    }

    /// Lists the games indexed under `prefix`.
    pub async fn load(index: &dyn VectorIndex, prefix: &str) -> Result<Self> {
        index.ensure_index().await?;
        let namespaces = index.list_namespaces().await?;
        let list = Self::from_names(
            namespaces
                .iter()
                .filter_map(|ns| game_from_namespace(prefix, &ns.name))
                .map(str::to_string),
        );
        tracing::info!(games = list.len(), %prefix, "loaded game list");
        Ok(list)
    }

    /// Adds `name` if absent and returns its position.
    pub fn insert(&mut self, name: &str) -> usize {
        match self.names.binary_search_by(|n| n.as_str().cmp(name)) {
            Ok(pos) => pos,
            Err(pos) => {
                self.names.insert(pos, name.to_string());
                pos
            }
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).ok()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Namespaces under `prefix` with their vector counts, sorted by game.
pub async fn game_stats(index: &dyn VectorIndex, prefix: &str) -> Result<Vec<NamespaceStats>> {
    let mut stats: Vec<NamespaceStats> = index
        .list_namespaces()
        .await?
        .into_iter()
        .filter(|ns| game_from_namespace(prefix, &ns.name).is_some())
        .collect();
    stats.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(stats)
}

/// Removes every vector of the game with `catalog_id`. Returns the title.
pub async fn delete_game(
    catalog: &dyn Catalog,
    index: &dyn VectorIndex,
    prefix: &str,
    catalog_id: &str,
) -> Result<String> {
    let title = catalog.lookup_title(catalog_id).await?;
    let namespace = namespace_for(prefix, &title);
    index.delete_all(&namespace).await?;
    tracing::info!(%catalog_id, %namespace, "deleted game vectors");
    Ok(title)
}
