//! Artifact engine
//!
//! Cache lookup, single-flight generation and fallback synthesis for lesson
//! illustrations. Generation runs on its own task: callers that stop
//! waiting do not cancel it, and its result still lands in the cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::cache::CacheEntry;
use super::fallback::fallback_artifact;
use super::key::CacheKey;
use super::prompt::build_prompt;
use super::provider::{ImageProvider, ImageRequest, SharedProvider};
use super::store::SharedStore;
use super::types::ArtifactResult;
use crate::config::ArtifactSettings;
use crate::lesson::LessonMeta;
use crate::persona::Persona;

type Pending = watch::Receiver<Option<ArtifactResult>>;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArtifactStats {
    pub generated: u64,
    pub cache_hits: u64,
    pub fallbacks: u64,
    pub errors: u64,
    pub dedup_joins: u64,
    pub in_flight: usize,
    pub average_generation_ms: f64,
}

#[derive(Debug, Default)]
struct Counters {
    generated: u64,
    cache_hits: u64,
    fallbacks: u64,
    errors: u64,
    dedup_joins: u64,
    generation_ms_total: u128,
}

struct Inner {
    provider: Option<SharedProvider>,
    store: SharedStore,
    ttl: Duration,
    provider_timeout: Duration,
    inflight: Mutex<HashMap<CacheKey, Pending>>,
    counters: Mutex<Counters>,
}

/// Cheap to clone; clones share cache, in-flight registry and counters
#[derive(Clone)]
pub struct ArtifactEngine {
    inner: Arc<Inner>,
}

impl ArtifactEngine {
    pub fn new(provider: Option<SharedProvider>, store: SharedStore, settings: &ArtifactSettings) -> Self {
        Self::with_timings(provider, store, settings.ttl(), settings.provider_timeout())
    }

    /// Engine with explicit cache lifetime and provider budget
    pub fn with_timings(
        provider: Option<SharedProvider>,
        store: SharedStore,
        ttl: Duration,
        provider_timeout: Duration,
    ) -> Self {
        info!(
            store = store.name(),
            provider = provider.as_ref().map(|p| p.name()).unwrap_or("none"),
            ttl_secs = ttl.as_secs(),
            "Artifact engine initialized"
        );
        Self {
            inner: Arc::new(Inner {
                provider,
                store,
                ttl,
                provider_timeout,
                inflight: Mutex::new(HashMap::new()),
                counters: Mutex::new(Counters::default()),
            }),
        }
    }

    /// Illustration for a lesson. Never fails: every failure path ends in
    /// the deterministic panel artifact.
    pub async fn get_or_generate(&self, meta: &LessonMeta, cast: &[Persona]) -> ArtifactResult {
        let key = CacheKey::for_lesson(meta);

        if let Some(hit) = self.inner.lookup(&key).await {
            return hit;
        }

        let Some(provider) = self.inner.provider.clone() else {
            debug!(key = %key, "No provider, synthesising panels");
            self.inner.counters.lock().fallbacks += 1;
            return fallback_artifact(meta, cast);
        };

        let mut pending = {
            let mut inflight = self.inner.inflight.lock();
            match inflight.get(&key) {
                Some(existing) => {
                    self.inner.counters.lock().dedup_joins += 1;
                    debug!(key = %key, "Joining in-flight generation");
                    existing.clone()
                }
                None => {
                    let (tx, rx) = watch::channel(None);
                    inflight.insert(key.clone(), rx.clone());
                    self.spawn_generation(key.clone(), provider, meta.clone(), cast.to_vec(), tx);
                    rx
                }
            }
        };

        match pending.wait_for(Option::is_some).await.map(|value| (*value).clone()) {
            Ok(Some(result)) => result,
            _ => {
                warn!(key = %key, "Generation task ended without a result");
                self.inner.counters.lock().fallbacks += 1;
                fallback_artifact(meta, cast)
            }
        }
    }

    fn spawn_generation(
        &self,
        key: CacheKey,
        provider: SharedProvider,
        meta: LessonMeta,
        cast: Vec<Persona>,
        tx: watch::Sender<Option<ArtifactResult>>,
    ) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            // Released on every exit path, panics included
            let registration = Registration {
                inner: Arc::clone(&inner),
                key: key.clone(),
            };
            // A generation that finished between the caller's miss and this
            // registration has already filled the cache
            let result = match inner.lookup(&key).await {
                Some(hit) => hit,
                None => inner.generate(&key, provider.as_ref(), &meta, &cast).await,
            };
            // Deregister before waking waiters
            drop(registration);
            tx.send_replace(Some(result));
        });
    }

    /// Remove expired entries from the store
    pub async fn clean_expired(&self) -> usize {
        match self.inner.store.purge_expired(Utc::now()).await {
            Ok(removed) => {
                if removed > 0 {
                    info!(removed, "Expired artifacts removed");
                }
                removed
            }
            Err(e) => {
                warn!(error = %e.format_for_log(), "Failed to purge expired artifacts");
                0
            }
        }
    }

    /// Whether real illustrations can be produced
    pub fn is_operational(&self) -> bool {
        self.inner.provider.is_some()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.inflight.lock().len()
    }

    pub fn stats(&self) -> ArtifactStats {
        let in_flight = self.in_flight();
        let counters = self.inner.counters.lock();
        let average_generation_ms = if counters.generated > 0 {
            counters.generation_ms_total as f64 / counters.generated as f64
        } else {
            0.0
        };
        ArtifactStats {
            generated: counters.generated,
            cache_hits: counters.cache_hits,
            fallbacks: counters.fallbacks,
            errors: counters.errors,
            dedup_joins: counters.dedup_joins,
            in_flight,
            average_generation_ms,
        }
    }
}

impl Inner {
    async fn lookup(&self, key: &CacheKey) -> Option<ArtifactResult> {
        match self.store.get(key).await {
            Ok(Some(entry)) if entry.is_expired(Utc::now()) => {
                debug!(key = %key, "Cached artifact expired");
                if let Err(e) = self.store.remove(key).await {
                    warn!(key = %key, error = %e.format_for_log(), "Failed to remove expired artifact");
                }
                None
            }
            Ok(Some(entry)) => {
                self.counters.lock().cache_hits += 1;
                debug!(key = %key, "Artifact cache hit");
                Some(ArtifactResult {
                    cached: true,
                    ..entry.artifact
                })
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e.format_for_log(), "Artifact store read failed, bypassing cache");
                None
            }
        }
    }

    /// One provider call under the provider timeout
    async fn generate(
        &self,
        key: &CacheKey,
        provider: &dyn ImageProvider,
        meta: &LessonMeta,
        cast: &[Persona],
    ) -> ArtifactResult {
        let prompt = build_prompt(meta, cast);
        let request = ImageRequest {
            prompt: prompt.clone(),
            lesson_number: meta.number,
        };
        let started = Instant::now();

        let failure = match tokio::time::timeout(self.provider_timeout, provider.generate(&request)).await {
            Ok(Ok(image)) => {
                let elapsed = started.elapsed();
                {
                    let mut counters = self.counters.lock();
                    counters.generated += 1;
                    counters.generation_ms_total += elapsed.as_millis();
                }
                info!(
                    key = %key,
                    provider = provider.name(),
                    model = %image.model,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Illustration generated"
                );

                let result = ArtifactResult::image(meta, cast, provider.name(), image.url, prompt);
                self.remember(key, &result).await;
                return result;
            }
            Ok(Err(e)) => e.format_for_log(),
            Err(_) => format!("timed out after {}ms", self.provider_timeout.as_millis()),
        };

        warn!(key = %key, provider = provider.name(), error = %failure, "Illustration failed, using panels");
        {
            let mut counters = self.counters.lock();
            counters.errors += 1;
            counters.fallbacks += 1;
        }
        fallback_artifact(meta, cast)
    }

    async fn remember(&self, key: &CacheKey, result: &ArtifactResult) {
        let entry = CacheEntry::new(key.clone(), result.clone(), self.ttl);
        if let Err(e) = self.store.put(entry).await {
            warn!(key = %key, error = %e.format_for_log(), "Artifact store write failed, result not cached");
        }
    }
}

/// In-flight registration, removed when dropped
struct Registration {
    inner: Arc<Inner>,
    key: CacheKey,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.inner.inflight.lock().remove(&self.key);
    }
}
