//! Cache entries with time-to-live.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::CacheKey;
use super::types::ArtifactResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub artifact: ArtifactResult,
    pub created_at: DateTime<Utc>,
    pub ttl_ms: u64,
}

impl CacheEntry {
    pub fn new(key: CacheKey, artifact: ArtifactResult, ttl: Duration) -> Self {
        Self {
            key,
            artifact,
            created_at: Utc::now(),
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.created_at)
    }

    /// Expired once strictly older than its ttl
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age_ms = self.age(now).num_milliseconds();
        age_ms > 0 && age_ms as u64 > self.ttl_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::types::ArtifactResult;
    use crate::lesson::LessonMeta;

    fn entry(ttl: Duration) -> CacheEntry {
        let meta = LessonMeta::new(1, "Intro");
        CacheEntry::new(
            CacheKey::for_lesson(&meta),
            ArtifactResult::image(&meta, &[], "mock", "u", "p"),
            ttl,
        )
    }

    #[test]
    fn test_fresh_entry_not_expired() {
        let entry = entry(Duration::from_secs(60));
        assert!(!entry.is_expired(Utc::now()));
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let entry = entry(Duration::from_secs(60));
        let later = entry.created_at + chrono::Duration::seconds(61);
        assert!(entry.is_expired(later));
        let edge = entry.created_at + chrono::Duration::seconds(60);
        assert!(!entry.is_expired(edge));
    }
}
