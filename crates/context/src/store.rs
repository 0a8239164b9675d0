//! The context store: a bounded relevance cache over named resources.
//!
//! All state lives behind one `tokio::sync::RwLock`: searches and size checks
//! share the read side, while inserts, reads (which bump access statistics),
//! and compaction take the write side. The invariant `current_size <=
//! capacity` holds after every mutating call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use taskloop_config::ContextConfig;
use taskloop_core::error::ContextError;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::index::SearchIndex;
use crate::scoring;
use crate::tokenize;

/// One cached resource plus its access statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResource {
    /// Resource identifier (workspace-relative path)
    pub id: String,
    pub content: String,
    /// Content length in bytes
    pub size: usize,
    pub access_count: u64,
    pub last_accessed: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Accumulated relevance, added to every search score
    pub relevance: f64,
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
}

/// What a compaction pass did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompactionReport {
    pub evicted: Vec<String>,
    pub bytes_before: usize,
    pub bytes_after: usize,
    pub target_bytes: usize,
    /// False only when evicting every entry still could not reach the target
    pub reached_target: bool,
}

/// Point-in-time store statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub entries: usize,
    pub current_size: usize,
    pub capacity: usize,
    pub utilization: f64,
    pub indexed_tokens: usize,
}

#[derive(Default)]
struct Inner {
    resources: HashMap<String, CachedResource>,
    index: SearchIndex,
    current_size: usize,
}

pub struct ContextStore {
    config: ContextConfig,
    compact_on_insert: bool,
    inner: RwLock<Inner>,
}

impl ContextStore {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            compact_on_insert: true,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// A store with default tuning and the given capacity.
    pub fn with_capacity(capacity_bytes: usize) -> Self {
        Self::new(ContextConfig::with_capacity(capacity_bytes))
    }

    /// Whether an over-capacity insert compacts before giving up.
    pub fn with_compaction(mut self, enabled: bool) -> Self {
        self.compact_on_insert = enabled;
        self
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity_bytes
    }

    /// Insert (or replace) a resource with zero relevance.
    pub async fn insert(
        &self,
        id: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<(), ContextError> {
        self.insert_with_relevance(id, content, 0.0).await
    }

    /// Insert (or replace) a resource.
    ///
    /// When the new content would push the store past capacity, compaction
    /// runs first (if enabled); if the store is still too full the insert is
    /// rejected with [`ContextError::OverCapacity`]. The rejected content is
    /// not stored, but entries evicted by that compaction stay evicted.
    /// Replacing an existing id drops its old index postings.
    pub async fn insert_with_relevance(
        &self,
        id: impl Into<String>,
        content: impl Into<String>,
        relevance: f64,
    ) -> Result<(), ContextError> {
        let id = id.into();
        let content = content.into();
        if id.is_empty() {
            return Err(ContextError::EmptyIdentifier);
        }

        let size = content.len();
        let capacity = self.config.capacity_bytes;
        if size > capacity {
            return Err(ContextError::OverCapacity {
                id,
                requested: size,
                available: capacity,
                capacity,
            });
        }

        let mut inner = self.inner.write().await;

        if projected_size(&inner, &id, size) > capacity && self.compact_on_insert {
            let report = self.compact_locked(&mut inner);
            info!(
                id = %id,
                evicted = report.evicted.len(),
                bytes_after = report.bytes_after,
                "Compacted context store to make room"
            );
        }

        if projected_size(&inner, &id, size) > capacity {
            let existing = inner.resources.get(&id).map_or(0, |r| r.size);
            return Err(ContextError::OverCapacity {
                id,
                requested: size,
                available: capacity - (inner.current_size - existing),
                capacity,
            });
        }

        if let Some(old) = inner.resources.remove(&id) {
            inner.current_size -= old.size;
            inner.index.remove(&id);
        }

        let mut tokens = tokenize::index_tokens(&content, self.config.min_index_token_len);
        tokens.extend(tokenize::index_tokens(&id, self.config.min_index_token_len));
        inner.index.insert(&id, tokens);

        let now = Utc::now();
        inner.resources.insert(
            id.clone(),
            CachedResource {
                id: id.clone(),
                content,
                size,
                access_count: 0,
                last_accessed: now,
                created_at: now,
                relevance,
            },
        );
        inner.current_size += size;

        debug!(id = %id, size, current_size = inner.current_size, "Cached resource");
        Ok(())
    }

    /// Read a resource, bumping its access count and last-access time.
    pub async fn get(&self, id: &str) -> Option<CachedResource> {
        let mut inner = self.inner.write().await;
        let resource = inner.resources.get_mut(id)?;
        resource.access_count += 1;
        resource.last_accessed = Utc::now();
        Some(resource.clone())
    }

    /// Read a resource without touching its statistics.
    pub async fn peek(&self, id: &str) -> Option<CachedResource> {
        self.inner.read().await.resources.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.resources.contains_key(id)
    }

    /// Remove a resource and its index postings.
    pub async fn remove(&self, id: &str) -> bool {
        let mut inner = self.inner.write().await;
        match inner.resources.remove(id) {
            Some(old) => {
                inner.current_size -= old.size;
                inner.index.remove(id);
                true
            }
            None => false,
        }
    }

    /// Raise a resource's cached relevance. Returns false for unknown ids.
    pub async fn boost(&self, id: &str, delta: f64) -> bool {
        let mut inner = self.inner.write().await;
        match inner.resources.get_mut(id) {
            Some(resource) => {
                resource.relevance += delta;
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.resources.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.resources.is_empty()
    }

    pub async fn current_size(&self) -> usize {
        self.inner.read().await.current_size
    }

    pub async fn stats(&self) -> StoreStats {
        let inner = self.inner.read().await;
        StoreStats {
            entries: inner.resources.len(),
            current_size: inner.current_size,
            capacity: self.config.capacity_bytes,
            utilization: inner.current_size as f64 / self.config.capacity_bytes as f64,
            indexed_tokens: inner.index.token_count(),
        }
    }

    /// True once utilisation reaches the compaction trigger ratio.
    pub async fn should_compact(&self) -> bool {
        let current = self.inner.read().await.current_size;
        current as f64 / self.config.capacity_bytes as f64 >= self.config.compaction_trigger_ratio
    }

    /// Evict the lowest-retention resources until the store is at or below
    /// the target ratio, or empty.
    pub async fn compact(&self) -> CompactionReport {
        let mut inner = self.inner.write().await;
        self.compact_locked(&mut inner)
    }

    fn compact_locked(&self, inner: &mut Inner) -> CompactionReport {
        let target = (self.config.capacity_bytes as f64 * self.config.compaction_target_ratio)
            .floor() as usize;
        let bytes_before = inner.current_size;
        let mut report = CompactionReport {
            bytes_before,
            bytes_after: bytes_before,
            target_bytes: target,
            reached_target: bytes_before <= target,
            evicted: Vec::new(),
        };
        if report.reached_target {
            return report;
        }

        let mut ranked: Vec<(f64, DateTime<Utc>, String)> = inner
            .resources
            .values()
            .map(|r| {
                (
                    scoring::retention(r, &self.config.retention),
                    r.last_accessed,
                    r.id.clone(),
                )
            })
            .collect();
        ranked.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(&b.2))
        });

        for (_, _, id) in ranked {
            if inner.current_size <= target {
                break;
            }
            if let Some(old) = inner.resources.remove(&id) {
                inner.current_size -= old.size;
                inner.index.remove(&id);
                report.evicted.push(id);
            }
        }

        report.bytes_after = inner.current_size;
        report.reached_target = inner.current_size <= target;
        debug!(
            evicted = report.evicted.len(),
            bytes_before,
            bytes_after = report.bytes_after,
            target,
            "Compaction pass finished"
        );
        report
    }

    /// Relevance-ranked search over cached resources.
    ///
    /// A structural pass first matches query keywords against the configured
    /// path-prefix classes; when it yields fewer than `structural_match_floor`
    /// hits, the inverted index supplements it. Candidates are deduplicated,
    /// scored, sorted descending, and capped at `max_results`.
    pub async fn search(&self, query: &str) -> Vec<SearchHit> {
        let tokens = tokenize::query_tokens(query, self.config.min_query_token_len);
        if tokens.is_empty() {
            return Vec::new();
        }

        let inner = self.inner.read().await;
        let mut seen: HashSet<&str> = HashSet::new();
        let mut candidates: Vec<&CachedResource> = Vec::new();

        for resource in self.structural_matches(&inner, &tokens) {
            if seen.insert(resource.id.as_str()) {
                candidates.push(resource);
            }
        }

        if candidates.len() < self.config.structural_match_floor {
            for token in &tokens {
                for id in inner.index.lookup(token) {
                    if seen.insert(id)
                        && let Some(resource) = inner.resources.get(id)
                    {
                        candidates.push(resource);
                    }
                }
            }
        }

        let mut hits: Vec<SearchHit> = candidates
            .into_iter()
            .map(|r| SearchHit {
                id: r.id.clone(),
                score: scoring::relevance(r, &tokens, &self.config.scoring),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(self.config.max_results);
        hits
    }

    /// Convenience wrapper returning only ids.
    pub async fn search_ids(&self, query: &str) -> Vec<String> {
        self.search(query).await.into_iter().map(|h| h.id).collect()
    }

    fn structural_matches<'a>(&self, inner: &'a Inner, tokens: &[String]) -> Vec<&'a CachedResource> {
        let prefixes: Vec<String> = tokens
            .iter()
            .flat_map(|token| {
                self.config
                    .structural_classes
                    .iter()
                    .filter(move |(keyword, _)| token.starts_with(keyword.as_str()))
                    .flat_map(|(_, prefixes)| prefixes.iter())
            })
            .map(|p| p.to_lowercase())
            .collect();
        if prefixes.is_empty() {
            return Vec::new();
        }

        inner
            .resources
            .values()
            .filter(|r| {
                let path = r.id.to_lowercase();
                prefixes.iter().any(|p| under_prefix(&path, p))
                    && tokens.iter().any(|t| path.contains(t.as_str()))
            })
            .collect()
    }
}

fn projected_size(inner: &Inner, id: &str, size: usize) -> usize {
    let existing = inner.resources.get(id).map_or(0, |r| r.size);
    inner.current_size - existing + size
}

/// `path` sits under `prefix` either at the root or at any directory boundary.
fn under_prefix(path: &str, prefix: &str) -> bool {
    path.starts_with(prefix) || path.contains(&format!("/{prefix}"))
}
