//! Semantic tool discovery.
//!
//! [`SearchService`] is built once at startup from the registry's catalog. When
//! an embedder is available it builds (or loads) an exact L2 vector index whose
//! row `i` is catalog entry `i`, and answers queries by similarity. Otherwise it
//! degrades to case-insensitive substring matching for the rest of the process.
//!
//! The two modes order results differently: ranked mode by descending
//! similarity, keyword mode by catalog order. The keyword fallback is a cheap
//! safety net and deliberately does no ranking.

pub mod store;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{GatewayError, Result};
use crate::inference::Embedder;
use crate::persistence::{catalog_fingerprint, load_snapshot, save_snapshot, SnapshotLoad};
use crate::registry::{ToolInfo, ToolRegistry};

pub use store::{FlatL2Index, Neighbor};

/// Default number of nearest-neighbour candidates per query.
pub const DEFAULT_LIMIT: usize = 10;

/// Default minimum similarity for ranked results.
pub const DEFAULT_THRESHOLD: f32 = 0.55;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub threshold: f32,
    /// Append schema keywords to each entry's embedding text.
    pub keyword_enrichment: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            threshold: DEFAULT_THRESHOLD,
            keyword_enrichment: true,
        }
    }
}

/// A discovered tool. `score` is the similarity in ranked mode and absent in
/// keyword mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolMatch {
    #[serde(flatten)]
    pub tool: ToolInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// How a query was actually answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Semantic,
    Keyword,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Semantic => "semantic",
            SearchMode::Keyword => "keyword",
        }
    }
}

struct SemanticIndex {
    embedder: Arc<dyn Embedder>,
    store: FlatL2Index,
}

pub struct SearchService {
    registry: Arc<ToolRegistry>,
    semantic: Option<SemanticIndex>,
    options: SearchOptions,
}

/// Convert a squared L2 distance into a similarity in (0, 1].
#[inline]
pub fn similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

impl SearchService {
    /// A service that only ever does keyword matching.
    pub fn keyword_only(registry: Arc<ToolRegistry>, options: SearchOptions) -> Self {
        Self {
            registry,
            semantic: None,
            options,
        }
    }

    /// Build or load the semantic index. Never fails: every problem is logged
    /// and leaves the service in keyword-only mode.
    ///
    /// 1. No embedder → keyword only.
    /// 2. Empty catalog → keyword only, nothing written.
    /// 3. A snapshot at `index_path` matching the current catalog is reused;
    ///    a corrupt one is deleted.
    /// 4. Otherwise the whole catalog is embedded in one batch and the new
    ///    snapshot is persisted (best effort).
    pub fn build_or_load(
        registry: Arc<ToolRegistry>,
        embedder: Option<Arc<dyn Embedder>>,
        index_path: &Path,
        options: SearchOptions,
    ) -> Self {
        tracing::info!("Initializing semantic search index...");

        let Some(embedder) = embedder else {
            tracing::error!("Embedding model unavailable. Semantic search will be disabled");
            return Self::keyword_only(registry, options);
        };

        let catalog = registry.catalog();
        if catalog.is_empty() {
            tracing::error!("Tool discovery catalog is empty. Cannot build search index");
            return Self::keyword_only(registry, options);
        }

        let texts: Vec<String> = catalog
            .iter()
            .map(|entry| entry.embedding_text(options.keyword_enrichment))
            .collect();
        let fingerprint = catalog_fingerprint(
            embedder.model_id(),
            catalog
                .iter()
                .zip(&texts)
                .map(|(entry, text)| (entry.name.as_str(), text.as_str())),
        );

        match load_snapshot(index_path, &fingerprint) {
            Ok(SnapshotLoad::Loaded(store)) if store.len() == catalog.len() => {
                tracing::info!(tools = store.len(), "Semantic search index loaded successfully");
                return Self::ready(registry, embedder, store, options);
            }
            Ok(SnapshotLoad::Loaded(store)) => {
                tracing::warn!(
                    rows = store.len(),
                    tools = catalog.len(),
                    "Index does not align with catalog, rebuilding"
                );
            }
            Ok(SnapshotLoad::Stale) => {
                tracing::info!("Persisted index is stale, rebuilding");
            }
            Ok(SnapshotLoad::Missing) => {
                tracing::warn!(
                    path = %index_path.display(),
                    "Search index not found. Building a new one. This may take a moment on first run..."
                );
            }
            Err(e) => {
                tracing::error!(path = %index_path.display(), error = %e, "Failed to load search index, discarding it");
                if let Err(e) = std::fs::remove_file(index_path) {
                    tracing::warn!(error = %e, "Failed to remove corrupt index file");
                }
            }
        }

        let start = std::time::Instant::now();
        tracing::info!(tools = texts.len(), "Generating embeddings for tool catalog");

        let store = match build_store(embedder.as_ref(), &texts) {
            Ok(store) => store,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Failed to build the search index. Semantic search will be unavailable"
                );
                return Self::keyword_only(registry, options);
            }
        };

        if let Err(e) = save_snapshot(index_path, &store, &fingerprint) {
            tracing::warn!(error = %e, "Failed to persist search index, continuing in memory");
        }

        tracing::info!(
            tools = store.len(),
            dim = store.dim(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Semantic search index built"
        );

        Self::ready(registry, embedder, store, options)
    }

    fn ready(
        registry: Arc<ToolRegistry>,
        embedder: Arc<dyn Embedder>,
        store: FlatL2Index,
        options: SearchOptions,
    ) -> Self {
        Self {
            registry,
            semantic: Some(SemanticIndex { embedder, store }),
            options,
        }
    }

    /// True when ranked semantic search is available.
    pub fn is_ready(&self) -> bool {
        self.semantic.is_some()
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Search with the configured limit and threshold.
    pub fn search(&self, query: &str) -> Vec<ToolMatch> {
        self.search_with(query, self.options.limit, self.options.threshold)
    }

    pub fn search_with(&self, query: &str, limit: usize, threshold: f32) -> Vec<ToolMatch> {
        self.search_with_mode(query, limit, threshold).1
    }

    /// Like [`search_with`](Self::search_with), also reporting which mode
    /// answered. A ready service still answers in keyword mode when the
    /// query embedding fails.
    pub fn search_with_mode(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> (SearchMode, Vec<ToolMatch>) {
        // No query can match more tools than the catalog holds
        let limit = limit.min(self.registry.catalog().len());

        let Some(index) = &self.semantic else {
            tracing::debug!(query, "Semantic search unavailable, using keyword search");
            return (SearchMode::Keyword, self.keyword_search(query, limit));
        };

        match self.ranked_search(index, query, limit, threshold) {
            Ok(results) => (SearchMode::Semantic, results),
            Err(e) => {
                tracing::warn!(query, error = %e, "Semantic search failed, using keyword search");
                (SearchMode::Keyword, self.keyword_search(query, limit))
            }
        }
    }

    /// Case-insensitive substring match on name and description, catalog order.
    fn keyword_search(&self, query: &str, limit: usize) -> Vec<ToolMatch> {
        let query = query.to_lowercase();

        self.registry
            .catalog()
            .iter()
            .filter(|entry| {
                entry.name.to_lowercase().contains(&query)
                    || entry.description.to_lowercase().contains(&query)
            })
            .take(limit)
            .map(|entry| ToolMatch {
                tool: entry.info(),
                score: None,
            })
            .collect()
    }

    fn ranked_search(
        &self,
        index: &SemanticIndex,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<ToolMatch>> {
        let catalog = self.registry.catalog();
        let query_embedding = index.embedder.embed(query)?;
        let neighbors = index.store.search(query_embedding.view(), limit)?;

        let mut results: Vec<ToolMatch> = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            // Sentinel: fewer stored vectors than requested
            let Some(position) = neighbor.index else {
                continue;
            };
            let entry = catalog.get(position).ok_or_else(|| {
                GatewayError::Index(format!("Index position {position} outside catalog"))
            })?;

            let score = similarity(neighbor.distance);
            if score >= threshold {
                tracing::debug!(tool = %entry.name, score, "Found tool");
                results.push(ToolMatch {
                    tool: entry.info(),
                    score: Some(score),
                });
            }
        }

        // Stable: equal scores keep nearest-neighbour order
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if results.is_empty() {
            tracing::warn!(
                query,
                threshold,
                "No tools found for query above similarity threshold"
            );
        }

        Ok(results)
    }
}

fn build_store(embedder: &dyn Embedder, texts: &[String]) -> Result<FlatL2Index> {
    let embeddings = embedder.embed_batch(texts)?;

    if embeddings.nrows() != texts.len() || embeddings.ncols() == 0 {
        return Err(GatewayError::Index(format!(
            "Embedder returned a {}x{} matrix for {} texts",
            embeddings.nrows(),
            embeddings.ncols(),
            texts.len()
        )));
    }

    Ok(FlatL2Index::new(embeddings))
}
