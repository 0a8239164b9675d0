//! Inverted token → resource index, kept in sync with the cache.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct SearchIndex {
    postings: HashMap<String, HashSet<String>>,
    /// Reverse map so a resource's postings can be dropped without a full scan
    by_resource: HashMap<String, HashSet<String>>,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `id` under every token, replacing any postings it had before.
    pub fn insert(&mut self, id: &str, tokens: HashSet<String>) {
        self.remove(id);
        for token in &tokens {
            self.postings
                .entry(token.clone())
                .or_default()
                .insert(id.to_string());
        }
        self.by_resource.insert(id.to_string(), tokens);
    }

    /// Remove `id` from every bucket; empty buckets are dropped.
    pub fn remove(&mut self, id: &str) {
        let Some(tokens) = self.by_resource.remove(id) else {
            return;
        };
        for token in tokens {
            if let Some(bucket) = self.postings.get_mut(&token) {
                bucket.remove(id);
                if bucket.is_empty() {
                    self.postings.remove(&token);
                }
            }
        }
    }

    pub fn lookup(&self, token: &str) -> impl Iterator<Item = &str> {
        self.postings
            .get(token)
            .into_iter()
            .flat_map(|ids| ids.iter().map(String::as_str))
    }

    pub fn token_count(&self) -> usize {
        self.postings.len()
    }

    pub fn contains_resource(&self, id: &str) -> bool {
        self.by_resource.contains_key(id)
    }
}
