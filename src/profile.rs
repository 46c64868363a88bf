//! User display metadata and its session-lifetime cache.

use std::collections::{HashMap, HashSet};

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::backend::MarketBackend;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Profile {
    pub id: String,
    pub name: String,
    /// Shown when no display name is set.
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Profile {
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else {
            &self.email
        }
    }
}

/// Memoized profile lookups, one in-flight fetch per identifier.
///
/// Entries live for the lifetime of the owning session — the working set is
/// the handful of counterparties visible in open conversations, so nothing
/// is evicted. A failed or empty lookup caches a negative entry so render
/// passes don't re-fetch; [`ProfileCache::clear`] drops an entry when the
/// caller wants a retry.
pub struct ProfileCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    /// `None` records a negative result.
    entries: HashMap<String, Option<Profile>>,
    in_flight: HashSet<String>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                in_flight: HashSet::new(),
            }),
        }
    }

    /// Cached profile for an identifier, if a positive entry exists.
    pub async fn get(&self, id: &str) -> Option<Profile> {
        self.inner.lock().await.entries.get(id).cloned().flatten()
    }

    /// All positive entries, for the pure conversation-list projection.
    pub async fn snapshot(&self) -> HashMap<String, Profile> {
        self.inner
            .lock()
            .await
            .entries
            .iter()
            .filter_map(|(id, entry)| entry.clone().map(|p| (id.clone(), p)))
            .collect()
    }

    /// Fetch every identifier that is neither cached nor already being
    /// fetched. Missing identifiers are fetched concurrently, with exactly
    /// one fetch per identifier: a concurrent `ensure` for the same
    /// identifier finds it in-flight and skips it.
    pub async fn ensure<B: MarketBackend + ?Sized>(&self, backend: &B, ids: &[String]) {
        let missing: Vec<String> = {
            let mut inner = self.inner.lock().await;
            let mut missing = Vec::new();
            for id in ids {
                if inner.entries.contains_key(id) || inner.in_flight.contains(id) {
                    continue;
                }
                inner.in_flight.insert(id.clone());
                missing.push(id.clone());
            }
            missing
        };
        if missing.is_empty() {
            return;
        }

        let results = join_all(missing.iter().map(|id| backend.resolve_profile(id))).await;

        let mut inner = self.inner.lock().await;
        for (id, result) in missing.iter().zip(results) {
            let entry = match result {
                Ok(profile) => profile,
                Err(e) => {
                    // Best-effort: cache the miss rather than surfacing it.
                    log::warn!("profile fetch for {} failed: {}", id, e);
                    None
                }
            };
            inner.entries.insert(id.clone(), entry);
            inner.in_flight.remove(id);
        }
    }

    /// Drop an entry so the next `ensure` fetches it again.
    pub async fn clear(&self, id: &str) {
        self.inner.lock().await.entries.remove(id);
    }
}

impl Default for ProfileCache {
    fn default() -> Self {
        Self::new()
    }
}
