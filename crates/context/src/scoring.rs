//! Relevance and retention heuristics.

use taskloop_config::{RetentionConfig, ScoringConfig};

use crate::store::CachedResource;

/// Directory nesting of a `/`-separated identifier (`a/b/c.rs` → 2).
pub fn path_depth(id: &str) -> usize {
    id.trim_matches('/').matches('/').count()
}

/// The final path component.
pub fn file_name(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

/// Search relevance of one cached resource against parsed query tokens.
pub fn relevance(resource: &CachedResource, tokens: &[String], weights: &ScoringConfig) -> f64 {
    let path = resource.id.to_lowercase();
    let name = file_name(&path);

    let mut score = 0.0;
    for token in tokens {
        if path.contains(token.as_str()) {
            score += weights.path_match;
            if name.contains(token.as_str()) {
                score += weights.filename_match;
            }
        }
    }

    score += weights.access_weight * resource.access_count as f64;
    score -= weights.depth_penalty * path_depth(&resource.id) as f64;
    score + resource.relevance
}

/// How much a resource deserves to survive compaction. Lower is evicted first.
pub fn retention(resource: &CachedResource, weights: &RetentionConfig) -> f64 {
    weights.access_weight * resource.access_count as f64 + resource.relevance
        - resource.size as f64 / weights.size_divisor
}
