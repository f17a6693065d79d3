//! Learner progress lookup.
//!
//! The pipeline only reads recent scores to shape the summary. Recording is
//! the caller's business; `MemoryProgress` offers it for the CLI and tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Up to `limit` most recent scores, oldest first
    async fn recent_scores(&self, limit: usize) -> Result<Vec<f32>>;
}

/// Store for callers that track no progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

#[async_trait]
impl ProgressStore for NoProgress {
    async fn recent_scores(&self, _limit: usize) -> Result<Vec<f32>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScoreRecord {
    lesson_number: u32,
    score: f32,
}

/// Bounded in-memory score log
pub struct MemoryProgress {
    records: RwLock<VecDeque<ScoreRecord>>,
    capacity: usize,
}

impl MemoryProgress {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity.min(256))),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, lesson_number: u32, score: f32) {
        let mut records = self.records.write();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(ScoreRecord { lesson_number, score });
    }

    /// Lessons with at least one recorded score, in recording order
    pub fn lessons_seen(&self) -> Vec<u32> {
        let mut seen = Vec::new();
        for record in self.records.read().iter() {
            if !seen.contains(&record.lesson_number) {
                seen.push(record.lesson_number);
            }
        }
        seen
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for MemoryProgress {
    fn default() -> Self {
        Self::new(100)
    }
}

#[async_trait]
impl ProgressStore for MemoryProgress {
    async fn recent_scores(&self, limit: usize) -> Result<Vec<f32>> {
        let records = self.records.read();
        let skip = records.len().saturating_sub(limit);
        Ok(records.iter().skip(skip).map(|r| r.score).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_progress_is_empty() {
        assert!(NoProgress.recent_scores(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_scores_oldest_first() {
        let progress = MemoryProgress::new(10);
        for (lesson, score) in [(1, 5.0), (2, 6.5), (3, 8.0)] {
            progress.record(lesson, score);
        }
        assert_eq!(progress.recent_scores(2).await.unwrap(), vec![6.5, 8.0]);
        assert_eq!(progress.recent_scores(10).await.unwrap(), vec![5.0, 6.5, 8.0]);
    }

    #[tokio::test]
    async fn test_capacity_drops_oldest() {
        let progress = MemoryProgress::new(2);
        progress.record(1, 1.0);
        progress.record(2, 2.0);
        progress.record(2, 3.0);
        assert_eq!(progress.len(), 2);
        assert_eq!(progress.recent_scores(5).await.unwrap(), vec![2.0, 3.0]);
        assert_eq!(progress.lessons_seen(), vec![2]);
    }
}
