//! Execution Cache
//!
//! Memoizes answers keyed by SHA256(question + context fingerprint).
//! Entries carry their own TTL and are evicted on read once expired.

use crate::context::ChatContext;
use crate::response::ChatResponse;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use moka::Expiry;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: u64,
    pub keys: Vec<String>,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
}

/// Memoized answer
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub response: ChatResponse,
    /// Skill that produced the answer
    pub skill_id: String,
    /// Score the answer was admitted with
    pub usefulness: f32,
    pub timestamp: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn is_expired(&self) -> bool {
        self.timestamp.elapsed() >= self.ttl
    }
}

/// Per-entry expiry so each `set` can carry its own TTL
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Capacity-bounded answer cache
#[derive(Clone)]
pub struct ExecutionCache {
    cache: Cache<String, CacheEntry>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl ExecutionCache {
    /// Create a cache holding at most `max_entries` answers (LRU eviction)
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(EntryExpiry)
            .build();

        Self {
            cache,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Compute cache key from question and context
    ///
    /// Key = SHA256(normalized_question + fingerprint(context))
    pub fn compute_key(question: &str, ctx: &ChatContext) -> String {
        let mut hasher = Sha256::new();

        let normalized = question.trim().to_lowercase();
        hasher.update(normalized.as_bytes());
        hasher.update(b"\x00");
        hasher.update(Self::fingerprint(ctx).as_bytes());

        hex::encode(hasher.finalize())
    }

    /// Small, stable summary of a context snapshot.
    ///
    /// Counts alone collide for different snapshots of the same shape, so
    /// a few rounded totals are folded in as well.
    pub fn fingerprint(ctx: &ChatContext) -> String {
        let budget_spent: f64 = ctx.budgets.iter().map(|b| b.spent).sum();
        let goal_saved: f64 = ctx.goals.iter().map(|g| g.current_amount).sum();

        format!(
            "u={}|l={}|c={}|a={}|b={}|g={}|t={}|r={}|bal={:.2}|spent={:.2}|saved={:.2}|last={}",
            ctx.user_id().unwrap_or("anon"),
            ctx.locale.as_deref().unwrap_or(""),
            ctx.currency_code(),
            ctx.accounts.len(),
            ctx.budgets.len(),
            ctx.goals.len(),
            ctx.transactions.len(),
            ctx.recurring_expenses.len(),
            ctx.total_balance(),
            budget_spent,
            goal_saved,
            ctx.latest_transaction_date()
                .map(|d| d.to_string())
                .unwrap_or_default(),
        )
    }

    /// Get a live entry; expired entries are evicted and count as a miss
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        match self.cache.get(key).await {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache HIT: {}", short(key));
                Some(entry)
            }
            Some(_) => {
                self.cache.invalidate(key).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache EXPIRED: {}", short(key));
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache MISS: {}", short(key));
                None
            }
        }
    }

    /// Store an answer
    pub async fn set(
        &self,
        key: &str,
        response: ChatResponse,
        skill_id: &str,
        usefulness: f32,
        ttl: Duration,
    ) {
        let entry = CacheEntry {
            response,
            skill_id: skill_id.to_string(),
            usefulness,
            timestamp: Instant::now(),
            ttl,
        };
        self.cache.insert(key.to_string(), entry).await;
        debug!("Cache SET: {} ({}ms)", short(key), ttl.as_millis());
    }

    /// Invalidate entry
    pub async fn invalidate(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    /// Clear all entries
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks().await;

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        let mut keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(k, _)| (*k).clone())
            .collect();
        keys.sort();

        CacheStats {
            size: keys.len() as u64,
            keys,
            hits,
            misses,
            hit_rate_percent: if total > 0 {
                (hits as f64 / total as f64) * 100.0
            } else {
                0.0
            },
        }
    }
}

fn short(key: &str) -> &str {
    key.get(..16).unwrap_or(key)
}
