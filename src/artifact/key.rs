//! Cache keys for lesson illustrations.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::lesson::LessonMeta;

/// `lesson-<n>-<topic>-<difficulty>`, lowercased, with every
/// non-alphanumeric topic character replaced by `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_lesson(meta: &LessonMeta) -> Self {
        let topic: String = meta
            .topic
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        Self(format!("lesson-{}-{}-{}", meta.number, topic, meta.difficulty.as_str()).to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SHA-256 hex digest, used as a file name by the file store
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let meta = LessonMeta::new(3, "CFG Scale & Guidance");
        assert_eq!(CacheKey::for_lesson(&meta).as_str(), "lesson-3-cfg_scale___guidance-beginner");
    }

    #[test]
    fn test_key_is_deterministic() {
        let a = CacheKey::for_lesson(&LessonMeta::new(40, "ControlNet Basics"));
        let b = CacheKey::for_lesson(&LessonMeta::new(40, "ControlNet Basics"));
        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn test_key_distinguishes_lessons() {
        let a = CacheKey::for_lesson(&LessonMeta::new(1, "Intro"));
        let b = CacheKey::for_lesson(&LessonMeta::new(2, "Intro"));
        assert_ne!(a, b);
        assert_ne!(a.digest(), b.digest());
    }
}
