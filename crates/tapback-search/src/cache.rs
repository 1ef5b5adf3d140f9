// SPDX-FileCopyrightText: 2026 Tapback Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-to-live cache in front of a [`WebSearch`] backend.
//!
//! Entries expire lazily: a stale entry is only replaced when it is read.
//! Stale entries are swept on insert so the map stays bounded by the number
//! of distinct queries seen within one TTL window.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tapback_core::{SearchResponse, TapbackError, WebSearch};
use tokio::time::Instant;
use tracing::debug;

type CacheKey = (String, usize);

/// Collapse whitespace runs and lowercase, so equivalent queries share a key.
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// A [`WebSearch`] wrapper with a lazily expiring result cache.
pub struct CachedSearch {
    inner: Arc<dyn WebSearch>,
    entries: Mutex<HashMap<CacheKey, (Instant, SearchResponse)>>,
}

impl CachedSearch {
    pub fn new(inner: Arc<dyn WebSearch>) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the wrapped backend has a credential.
    pub fn is_configured(&self) -> bool {
        self.inner.is_configured()
    }

    /// Search through the cache. A hit is valid while its age is at most
    /// `ttl_secs` (floored at one second). Failed searches are not cached.
    pub async fn cached_search(
        &self,
        query: &str,
        k: usize,
        ttl_secs: u64,
    ) -> Result<SearchResponse, TapbackError> {
        let key = (normalize_query(query), k);
        let ttl = Duration::from_secs(ttl_secs.max(1));

        if let Some(hit) = self.lookup(&key, ttl) {
            debug!(query = %key.0, k, "search cache hit");
            return Ok(hit);
        }

        let data = self.inner.search(query, k).await?;
        let now = Instant::now();
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|_, (ts, _)| now.duration_since(*ts) <= ttl);
            entries.insert(key, (now, data.clone()));
        }
        Ok(data)
    }

    fn lookup(&self, key: &CacheKey, ttl: Duration) -> Option<SearchResponse> {
        let entries = self.entries.lock().ok()?;
        let (ts, data) = entries.get(key)?;
        (Instant::now().duration_since(*ts) <= ttl).then(|| data.clone())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}
