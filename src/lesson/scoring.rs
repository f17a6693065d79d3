//! Heuristic answer analysis.
//!
//! Four categories are scored from surface features of the answer and
//! averaged into a 1-10 score with one decimal.

use serde::Serialize;

use super::content::topic_keywords;
use super::curriculum::LessonMeta;

const CONNECTIVES: &[&str] = &["because", "therefore", "however"];
const QUESTION_MARKERS: &[&str] = &["?", "what", "how", "why"];
const REFLECTION_MARKERS: &[&str] = &["think", "believe", "consider"];

const ACCURACY_BASELINE: f32 = 6.0;
const WEAK_CATEGORY: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryScores {
    pub depth: f32,
    pub accuracy: f32,
    pub engagement: f32,
    pub understanding: f32,
}

impl CategoryScores {
    fn mean(&self) -> f32 {
        (self.depth + self.accuracy + self.engagement + self.understanding) / 4.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerAnalysis {
    /// Overall score in [1, 10], one decimal
    pub score: f32,
    pub categories: CategoryScores,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub matched_keywords: Vec<String>,
}

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

pub fn analyze_answer(answer: &str, meta: &LessonMeta) -> AnswerAnalysis {
    let text = answer.to_lowercase();
    let word_count = text.split_whitespace().count();
    let mut strengths = Vec::new();

    let mut depth: f32 = match word_count {
        n if n > 50 => 3.0,
        n if n > 20 => 2.0,
        n if n > 5 => 1.0,
        _ => 0.0,
    };
    if contains_any(&text, CONNECTIVES) {
        depth += 2.0;
        strengths.push("Explains reasoning".to_string());
    }

    let mut engagement: f32 = 0.0;
    if contains_any(&text, QUESTION_MARKERS) {
        engagement += 2.0;
        strengths.push("Shows curiosity and asks questions".to_string());
    }
    if contains_any(&text, REFLECTION_MARKERS) {
        engagement += 1.0;
        strengths.push("Demonstrates thoughtful consideration".to_string());
    }

    let matched_keywords: Vec<String> = topic_keywords(meta)
        .into_iter()
        .filter(|k| text.contains(k.as_str()))
        .collect();
    let understanding = (matched_keywords.len() as f32 * 2.0).min(10.0);
    if !matched_keywords.is_empty() {
        strengths.push("Uses topic vocabulary".to_string());
    }

    let categories = CategoryScores {
        depth,
        accuracy: ACCURACY_BASELINE,
        engagement,
        understanding,
    };

    let mut improvements = Vec::new();
    if categories.depth < WEAK_CATEGORY {
        improvements.push("Provide more detailed explanations".to_string());
    }
    if categories.engagement < WEAK_CATEGORY {
        improvements.push("Ask more questions and show curiosity".to_string());
    }
    if categories.understanding < WEAK_CATEGORY {
        improvements.push("Reference more topic-specific concepts".to_string());
    }

    let score = (categories.mean().clamp(1.0, 10.0) * 10.0).round() / 10.0;

    AnswerAnalysis {
        score,
        categories,
        strengths,
        improvements,
        matched_keywords,
    }
}
