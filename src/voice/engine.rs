//! Instructor response engine.
//!
//! Renders a line for an intent, appends the tone line for the current
//! intensity and memoises cacheable intents in a bounded, insertion-ordered
//! cache.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{trace, warn};

use super::template::{Intent, PoolId, RenderContext, TemplateBook};
use crate::config::VoiceSettings;
use crate::random::SharedRandom;

/// Rendered when the pool for an intent has no templates
pub const DIAGNOSTIC_LINE: &str =
    "My response matrix for this situation appears to be empty. Please report this to the curriculum team.";

const MIN_INTENSITY: u8 = 1;
const MAX_INTENSITY: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResponseKey {
    intent: Intent,
    /// Score in tenths, so a cached line never shows a stale score
    score_bucket: Option<i32>,
    lesson_number: u32,
    intensity: u8,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VoiceStats {
    pub rendered: u64,
    pub cache_hits: u64,
    pub diagnostics: u64,
    pub cached_entries: usize,
    pub intensity: u8,
}

pub struct ResponseEngine {
    book: Arc<TemplateBook>,
    random: SharedRandom,
    default_intensity: u8,
    intensity: RwLock<u8>,
    capacity: usize,
    cache: Mutex<IndexMap<ResponseKey, String>>,
    stats: Mutex<VoiceStats>,
}

impl ResponseEngine {
    pub fn new(book: Arc<TemplateBook>, settings: &VoiceSettings, random: SharedRandom) -> Self {
        let intensity = settings.intensity.clamp(MIN_INTENSITY, MAX_INTENSITY);
        Self {
            book,
            random,
            default_intensity: intensity,
            intensity: RwLock::new(intensity),
            capacity: settings.cache_size,
            cache: Mutex::new(IndexMap::new()),
            stats: Mutex::new(VoiceStats::default()),
        }
    }

    /// Render a line for `intent`. Never fails.
    pub fn render(&self, intent: Intent, ctx: &RenderContext) -> String {
        let intensity = self.intensity();
        let key = intent.is_cacheable().then(|| ResponseKey {
            intent,
            score_bucket: ctx.score.map(|s| (s * 10.0).round() as i32),
            lesson_number: ctx.lesson_number,
            intensity,
        });

        if let Some(key) = &key {
            if let Some(hit) = self.cache.lock().get(key).cloned() {
                let mut stats = self.stats.lock();
                stats.rendered += 1;
                stats.cache_hits += 1;
                trace!(%intent, lesson = ctx.lesson_number, "Response cache hit");
                return hit;
            }
        }

        let templates = self.book.pool(PoolId::for_intent(intent, ctx.score));
        if templates.is_empty() {
            warn!(%intent, "No templates for intent, using diagnostic line");
            let mut stats = self.stats.lock();
            stats.rendered += 1;
            stats.diagnostics += 1;
            return DIAGNOSTIC_LINE.to_string();
        }

        let template = &templates[self.random.pick_index(templates.len())];
        let mut text = template.render(ctx);
        append_sentence(&mut text, self.book.tone.for_intensity(intensity));

        if intent == Intent::Summary {
            append_sentence(&mut text, self.book.progress.assess(&ctx.recent_scores));
            if let Some(score) = ctx.score {
                append_sentence(&mut text, self.book.next_step.for_score(score));
            }
        }

        if let Some(key) = key {
            self.remember(key, text.clone());
        }
        self.stats.lock().rendered += 1;
        text
    }

    fn remember(&self, key: ResponseKey, text: String) {
        if self.capacity == 0 {
            return;
        }
        let mut cache = self.cache.lock();
        while cache.len() >= self.capacity {
            cache.shift_remove_index(0);
        }
        cache.insert(key, text);
    }

    pub fn intensity(&self) -> u8 {
        *self.intensity.read()
    }

    /// Shift intensity by `delta`, clamped to 1-10; returns the new value
    pub fn adjust_intensity(&self, delta: i8) -> u8 {
        let mut intensity = self.intensity.write();
        let next = (i16::from(*intensity) + i16::from(delta))
            .clamp(i16::from(MIN_INTENSITY), i16::from(MAX_INTENSITY));
        *intensity = next as u8;
        *intensity
    }

    pub fn reset_intensity(&self) {
        *self.intensity.write() = self.default_intensity;
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn stats(&self) -> VoiceStats {
        VoiceStats {
            cached_entries: self.cache.lock().len(),
            intensity: self.intensity(),
            ..self.stats.lock().clone()
        }
    }
}

fn append_sentence(text: &mut String, sentence: &str) {
    if sentence.is_empty() {
        return;
    }
    if !text.is_empty() {
        text.push(' ');
    }
    text.push_str(sentence);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ScriptedRandom;
    use crate::voice::template::{ScoreBand, Template};

    fn engine_with(book: TemplateBook, cache_size: usize) -> ResponseEngine {
        let settings = VoiceSettings {
            intensity: 5,
            cache_size,
        };
        ResponseEngine::new(Arc::new(book), &settings, Arc::new(ScriptedRandom::new(vec![0.0, 0.5, 0.9])))
    }

    fn tiny_book() -> TemplateBook {
        TemplateBook::from_toml_str(
            r#"
[tone]
restrained = "R."
measured = "M."
spirited = "S."
theatrical = "T."

[templates]
lesson_intro = ["Intro {topic} A.", "Intro {topic} B.", "Intro {topic} C."]
feedback_excellent = ["Great {score}."]
feedback_good = ["Fine {score}."]
feedback_needs_work = ["Again {score}."]
summary = ["Done {lesson}."]

[summary.progress]
strong = "Strong."
steady = "Steady."
developing = "Developing."
no_history = "Monitor."

[summary.next_step]
advance = "Advance."
consolidate = "Practice."
review = "Review."
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_tone_line_follows_intensity() {
        let engine = engine_with(tiny_book(), 10);
        let ctx = RenderContext::new(1, "Seeds");
        assert!(engine.render(Intent::LessonIntro, &ctx).ends_with("M."));

        engine.adjust_intensity(5);
        assert_eq!(engine.intensity(), 10);
        assert!(engine.render(Intent::LessonIntro, &ctx).ends_with("T."));

        engine.adjust_intensity(-100);
        assert_eq!(engine.intensity(), 1);
        assert!(engine.render(Intent::LessonIntro, &ctx).ends_with("R."));

        engine.reset_intensity();
        assert_eq!(engine.intensity(), 5);
    }

    #[test]
    fn test_feedback_band_selection() {
        let engine = engine_with(tiny_book(), 10);
        let base = RenderContext::new(2, "CFG Scale");
        assert!(engine
            .render(Intent::ScoreFeedback, &base.clone().with_score(9.0))
            .starts_with("Great 9.0."));
        assert!(engine
            .render(Intent::ScoreFeedback, &base.clone().with_score(6.0))
            .starts_with("Fine 6.0."));
        assert!(engine
            .render(Intent::ScoreFeedback, &base.with_score(2.5))
            .starts_with("Again 2.5."));
    }

    #[test]
    fn test_cacheable_intent_is_memoised() {
        let engine = engine_with(tiny_book(), 10);
        let ctx = RenderContext::new(3, "Sampling");
        let first = engine.render(Intent::LessonIntro, &ctx);
        let second = engine.render(Intent::LessonIntro, &ctx);
        assert_eq!(first, second);
        assert_eq!(engine.stats().cache_hits, 1);

        engine.clear_cache();
        assert_eq!(engine.stats().cached_entries, 0);
    }

    #[test]
    fn test_summary_is_never_cached() {
        let engine = engine_with(tiny_book(), 10);
        let ctx = RenderContext::new(4, "Sampling").with_score(8.5);
        engine.render(Intent::Summary, &ctx);
        engine.render(Intent::Summary, &ctx);
        let stats = engine.stats();
        assert_eq!(stats.cache_hits, 0);
        assert_eq!(stats.cached_entries, 0);
        assert_eq!(stats.rendered, 2);
    }

    #[test]
    fn test_summary_appends_progress_and_next_step() {
        let engine = engine_with(tiny_book(), 10);
        let ctx = RenderContext::new(4, "Sampling")
            .with_score(8.5)
            .with_recent_scores(vec![6.0, 7.0]);
        assert_eq!(engine.render(Intent::Summary, &ctx), "Done 4. M. Steady. Advance.");

        let ctx = RenderContext::new(4, "Sampling").with_score(3.0);
        assert_eq!(engine.render(Intent::Summary, &ctx), "Done 4. M. Monitor. Review.");
    }

    #[test]
    fn test_empty_pool_renders_diagnostic() {
        let engine = engine_with(tiny_book(), 10);
        let text = engine.render(Intent::Explanation, &RenderContext::new(1, "x"));
        assert_eq!(text, DIAGNOSTIC_LINE);
        assert_eq!(engine.stats().diagnostics, 1);
        assert_eq!(engine.stats().cached_entries, 0);
    }

    #[test]
    fn test_cache_evicts_oldest_first() {
        let engine = engine_with(tiny_book(), 2);
        for lesson in 1..=3 {
            engine.render(Intent::LessonIntro, &RenderContext::new(lesson, "Topic"));
        }
        assert_eq!(engine.stats().cached_entries, 2);

        // Lesson 1 was evicted, lesson 3 is still cached
        engine.render(Intent::LessonIntro, &RenderContext::new(3, "Topic"));
        assert_eq!(engine.stats().cache_hits, 1);
        engine.render(Intent::LessonIntro, &RenderContext::new(1, "Topic"));
        assert_eq!(engine.stats().cache_hits, 1);
    }

    #[test]
    fn test_replaced_pool_is_used() {
        let mut book = tiny_book();
        book.set_pool(
            PoolId::Feedback(ScoreBand::Good),
            vec![Template::parse("Only option.").unwrap()],
        );
        let engine = engine_with(book, 0);
        let text = engine.render(Intent::ScoreFeedback, &RenderContext::new(1, "x").with_score(5.5));
        assert_eq!(text, "Only option. M.");
    }
}
