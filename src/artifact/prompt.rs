//! Illustration prompt construction.

use crate::lesson::{LessonMeta, Phase};
use crate::persona::Persona;

/// Lessons past this number always get an advanced prompt
const ADVANCED_FROM_LESSON: u32 = 45;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    Classic,
    Educational,
    Technical,
    Practical,
}

impl PromptStyle {
    /// Style for a lesson, chosen by difficulty, phase and position
    pub fn for_lesson(meta: &LessonMeta) -> Self {
        if meta.difficulty.is_advanced() || meta.number > ADVANCED_FROM_LESSON {
            if meta.phase == Phase::CuttingEdge {
                PromptStyle::Technical
            } else {
                PromptStyle::Practical
            }
        } else if matches!(meta.phase, Phase::IntermediateTools | Phase::AdvancedControl) {
            PromptStyle::Educational
        } else {
            PromptStyle::Classic
        }
    }

    fn template(&self) -> &'static str {
        match self {
            PromptStyle::Classic => {
                "Create a four-panel educational comic strip about {topic}. {instructor} teaches \
                 {student} about {topic} with dry wit and a clinician's precision. Panels: 1) the \
                 topic is introduced, 2) it is explained, 3) the student asks questions, 4) the \
                 instructor concludes. Colourful, cartoon-like art."
            }
            PromptStyle::Educational => {
                "Design an educational comic strip about {topic}. {instructor} presents {topic} to \
                 {student} on a large wall display. Vibrant colours, simplified character designs \
                 and expressive faces. Four panels: 1) presenting the topic, 2) demonstrating key \
                 concepts, 3) the student's questions, 4) understanding achieved. Speech bubbles \
                 carry medical metaphors and mild condescension."
            }
            PromptStyle::Technical => {
                "Generate a technical education comic strip about advanced {topic} concepts. \
                 {instructor} teaches {student} using floating diagrams and annotated interfaces. \
                 Four panels of progressive learning: a demanding introduction, a detailed visual \
                 explanation, practical application, and a demonstration of mastery."
            }
            PromptStyle::Practical => {
                "Create a hands-on demonstration comic about {topic}. {instructor} guides {student} \
                 through realistic problem-solving with {topic}. Four panels: the problem, the \
                 solution taking shape, the implementation, and a successful outcome."
            }
        }
    }
}

/// Full prompt for a lesson and its cast (instructor first)
pub fn build_prompt(meta: &LessonMeta, cast: &[Persona]) -> String {
    let instructor = cast.first().map(|p| p.name.as_str()).unwrap_or("the instructor");
    let student = cast.get(1).map(|p| p.name.as_str()).unwrap_or("a curious student");

    let mut prompt = PromptStyle::for_lesson(meta)
        .template()
        .replace("{topic}", &meta.topic)
        .replace("{instructor}", instructor)
        .replace("{student}", student);

    for detail in contextual_details(meta) {
        prompt.push(' ');
        prompt.push_str(detail);
    }
    prompt
}

fn contextual_details(meta: &LessonMeta) -> Vec<&'static str> {
    let mut details = Vec::new();

    if meta.topic_contains("controlnet") {
        details.push("Include visual examples of image control and guidance systems.");
    } else if meta.topic_contains("prompt") {
        details.push("Show text prompts next to the images they produce.");
    } else if meta.topic_contains("model") {
        details.push("Include AI model interfaces and neural network visualisations.");
    }

    match meta.phase {
        Phase::Foundations => details.push("Keep the visuals simple and suitable for beginners."),
        Phase::CuttingEdge => details.push("Include advanced interfaces and complex technology."),
        _ => {}
    }

    details
}
