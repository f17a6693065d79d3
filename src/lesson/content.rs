//! Static lesson content: explanations, tips, examples and challenge questions.
//!
//! Tables are matched against the lesson topic, first match wins; every
//! lookup has a generic default so no topic is ever left without content.

use serde::Serialize;

use super::curriculum::{Difficulty, LessonMeta};
use crate::persona::Persona;

const DEFAULT_KEY_POINTS: &[&str] = &[
    "Understanding core concepts",
    "Practical application",
    "Common best practices",
    "Troubleshooting approaches",
];

const EXPLANATIONS: &[(&str, &str)] = &[
    (
        "text-to-image",
        "Text-to-image generation turns a written description into a picture. The prompt is \
         encoded into a representation the model understands, then decoded step by step into pixels.",
    ),
    (
        "cfg scale",
        "CFG (classifier-free guidance) scale controls how strictly the model follows your prompt. \
         Higher values stick closer to the description; lower values leave room for interpretation.",
    ),
    (
        "sampling",
        "Sampling methods decide how an image is refined from noise, one step at a time. Different \
         samplers trade speed, quality and artistic character against each other.",
    ),
    (
        "prompt",
        "Effective prompting means describing the image you want clearly and specifically. Good \
         prompts name the subject, the style, the composition and the quality you expect.",
    ),
    (
        "controlnet",
        "ControlNet adds an extra input, such as a pose, a depth map or detected edges, that guides \
         generation so the result follows a structure you choose.",
    ),
];

const PRO_TIPS: &[(&str, &str)] = &[
    (
        "text-to-image",
        "Start with a short, clear description and add detail gradually. Precision beats length.",
    ),
    (
        "cfg scale",
        "Most images work best between CFG 5 and 15. Start at 7 and adjust from the results.",
    ),
    (
        "sampling",
        "Euler and DPM++ are dependable starting samplers. Try step counts between 20 and 50.",
    ),
    (
        "prompt",
        "Use (parentheses) to emphasise important elements and a negative prompt to exclude what you do not want.",
    ),
    (
        "controlnet",
        "Pair ControlNet with a strong prompt. The control input shapes the image but does not replace the description.",
    ),
];

const DEFAULT_PRO_TIP: &str =
    "Practice and experimentation are the way to master this. Start simple and build complexity gradually.";

const ANALOGIES: &[&str] = &[
    "Like a medical diagnosis: systematic analysis leads to accurate results.",
    "Like tuning an instrument: every setting has a range where it sounds right.",
];

/// Keywords used to judge answers, by topic fragment
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("text-to-image", &["prompt", "image", "generation", "ai", "model"]),
    ("cfg", &["cfg", "scale", "guidance", "creativity", "adherence"]),
    ("sampling", &["sampling", "euler", "dpm", "steps", "quality"]),
    ("prompt", &["prompt", "description", "keywords", "style", "detail"]),
    ("resolution", &["resolution", "pixels", "size", "aspect", "ratio"]),
    ("controlnet", &["controlnet", "control", "pose", "depth", "edge"]),
    ("lora", &["lora", "adaptation", "training", "style", "character"]),
];

const DEFAULT_KEYWORDS: &[&str] = &["stable", "diffusion", "image", "ai", "generation"];

fn lookup<'a>(table: &[(&str, &'a str)], meta: &LessonMeta) -> Option<&'a str> {
    table
        .iter()
        .find(|(fragment, _)| meta.topic_contains(fragment))
        .map(|(_, text)| *text)
}

// ─────────────────────────────────────────────────────────────────
// Announcement and explanation
// ─────────────────────────────────────────────────────────────────

pub fn default_announcement(meta: &LessonMeta) -> String {
    format!(
        "Today we are examining {}. Consider lesson {} a treatment plan for {}-level understanding.",
        meta.topic,
        meta.number,
        meta.phase.name().to_lowercase()
    )
}

pub fn topic_context(meta: &LessonMeta) -> String {
    format!(
        "This {} lesson covers essential concepts in {}. Understanding them is crucial for your progress through the {} phase.",
        meta.difficulty, meta.topic, meta.phase
    )
}

pub fn explanation(meta: &LessonMeta) -> String {
    lookup(EXPLANATIONS, meta).map(str::to_string).unwrap_or_else(|| {
        format!(
            "{} is a core concept in AI image generation that calls for both technical understanding and practical application.",
            meta.topic
        )
    })
}

pub fn pro_tip(meta: &LessonMeta) -> String {
    lookup(PRO_TIPS, meta).unwrap_or(DEFAULT_PRO_TIP).to_string()
}

/// Lesson keywords, or a generic list for lessons without any
pub fn key_points(meta: &LessonMeta) -> Vec<String> {
    if meta.keywords.is_empty() {
        DEFAULT_KEY_POINTS.iter().map(|s| s.to_string()).collect()
    } else {
        meta.keywords.clone()
    }
}

// ─────────────────────────────────────────────────────────────────
// Personalized example
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scenario {
    pub setting: String,
    pub instructor: String,
    pub student: String,
    pub challenge: String,
    pub approach: String,
}

/// Example featuring the supporting persona
pub fn example(meta: &LessonMeta, student: &Persona) -> String {
    let name = &student.name;
    if meta.topic_contains("text-to-image") || meta.topic_contains("introduction to ai") {
        format!(
            "Imagine {} wants a picture of a lighthouse. Instead of writing \"lighthouse\", they write \
             \"weathered stone lighthouse on a cliff at dusk, crashing waves, warm lamp light, highly detailed\". \
             The extra detail tells the model exactly what is needed.",
            name
        )
    } else if meta.topic_contains("cfg") {
        format!(
            "{} renders the same lighthouse prompt at different CFG values. At 3 the result is loose and \
             inventive, at 7 it is balanced, and at 15 every word is obeyed but the image starts to look overcooked.",
            name
        )
    } else if meta.topic_contains("sampling") {
        format!(
            "{} runs one prompt through several samplers. Euler gives clean results quickly, while DPM++ \
             takes longer and rewards the wait with finer detail.",
            name
        )
    } else if meta.topic_contains("controlnet") {
        format!(
            "{} has a rough sketch of a workshop floor plan. With edge-detection ControlNet the generated \
             room keeps that exact layout while the model fills in realistic detail.",
            name
        )
    } else {
        format!(
            "{} approaches {} systematically, starting from the basic principles and building towards \
             advanced applications through practice and experimentation.",
            name, meta.topic
        )
    }
}

pub fn scenario(meta: &LessonMeta, instructor: &Persona, student: &Persona) -> Scenario {
    Scenario {
        setting: "The training lab".to_string(),
        instructor: instructor.name.clone(),
        student: student.name.clone(),
        challenge: format!("Understanding {} concepts", meta.topic),
        approach: format!("{} guides {} through practical applications", instructor.name, student.name),
    }
}

pub fn analogies() -> Vec<String> {
    ANALOGIES.iter().map(|s| s.to_string()).collect()
}

// ─────────────────────────────────────────────────────────────────
// Challenge question
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    PracticalApplication,
    ProblemSolving,
    Application,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengeQuestion {
    pub question: String,
    pub kind: QuestionKind,
    pub hints: Vec<String>,
    pub expected_points: Vec<String>,
    pub difficulty: Difficulty,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn challenge_question(meta: &LessonMeta) -> ChallengeQuestion {
    if meta.topic_contains("introduction to ai") || meta.topic_contains("text-to-image") {
        ChallengeQuestion {
            question: "You want an image of a futuristic laboratory. Write a detailed prompt that conveys \
                       your vision, including style, lighting and the specific elements you want to see."
                .to_string(),
            kind: QuestionKind::PracticalApplication,
            hints: strings(&[
                "Include the main subject",
                "Describe the style or mood",
                "Mention lighting conditions",
                "Add quality indicators",
            ]),
            expected_points: strings(&[
                "Subject description",
                "Style specification",
                "Environmental details",
                "Quality terms",
            ]),
            difficulty: Difficulty::Beginner,
        }
    } else if meta.topic_contains("cfg") {
        ChallengeQuestion {
            question: "Your generations either ignore parts of the prompt or look over-processed. Explain \
                       how you would adjust the CFG scale to fix each problem, and why."
                .to_string(),
            kind: QuestionKind::ProblemSolving,
            hints: strings(&[
                "Consider what CFG scale controls",
                "Think about prompt adherence versus image quality",
                "Remember the typical range of useful values",
            ]),
            expected_points: strings(&[
                "Understanding of CFG function",
                "Problem identification",
                "Solution strategy",
                "Reasoning",
            ]),
            difficulty: Difficulty::Intermediate,
        }
    } else {
        ChallengeQuestion {
            question: format!(
                "Based on what you have learned about {}, describe a practical scenario where you would \
                 apply these concepts and explain your approach.",
                meta.topic
            ),
            kind: QuestionKind::Application,
            hints: strings(&[
                "Think of a real-world use case",
                "Consider the key principles",
                "Explain your reasoning",
            ]),
            expected_points: strings(&["Practical scenario", "Concept application", "Clear reasoning"]),
            difficulty: meta.difficulty,
        }
    }
}

/// Short question used when the full one cannot be produced
pub fn fallback_question(meta: &LessonMeta) -> ChallengeQuestion {
    ChallengeQuestion {
        question: format!("How would you apply {} concepts in a practical situation?", meta.topic),
        kind: QuestionKind::Application,
        hints: strings(&["Consider real-world applications", "Think about the core principles"]),
        expected_points: strings(&["Practical understanding", "Clear explanation"]),
        difficulty: meta.difficulty,
    }
}

// ─────────────────────────────────────────────────────────────────
// Scoring keywords
// ─────────────────────────────────────────────────────────────────

/// Words an answer is checked against for topic understanding
pub fn topic_keywords(meta: &LessonMeta) -> Vec<String> {
    if let Some((_, words)) = TOPIC_KEYWORDS.iter().find(|(fragment, _)| meta.topic_contains(fragment)) {
        return strings(words);
    }

    let mut words: Vec<String> = meta
        .keywords
        .iter()
        .flat_map(|k| k.split_whitespace())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() >= 4)
        .collect();
    words.sort();
    words.dedup();

    if words.is_empty() {
        strings(DEFAULT_KEYWORDS)
    } else {
        words
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaRole;

    #[test]
    fn test_topic_tables_match_case_insensitively() {
        let meta = LessonMeta::new(3, "CFG Scale and Its Impact on Generation");
        assert!(explanation(&meta).contains("classifier-free guidance"));
        assert!(pro_tip(&meta).contains("CFG 5 and 15"));
        assert_eq!(challenge_question(&meta).kind, QuestionKind::ProblemSolving);
    }

    #[test]
    fn test_defaults_for_unknown_topic() {
        let meta = LessonMeta::new(58, "Community Building and Knowledge Sharing");
        assert!(explanation(&meta).starts_with("Community Building"));
        assert_eq!(pro_tip(&meta), DEFAULT_PRO_TIP);
        assert_eq!(key_points(&meta).len(), 4);
        let question = challenge_question(&meta);
        assert_eq!(question.kind, QuestionKind::Application);
        assert_eq!(question.difficulty, Difficulty::Expert);
    }

    #[test]
    fn test_key_points_prefer_lesson_keywords() {
        let meta = LessonMeta::new(7, "Seeds").with_keywords(["Seed values", "Variation"]);
        assert_eq!(key_points(&meta), vec!["Seed values", "Variation"]);
    }

    #[test]
    fn test_topic_keywords_sources() {
        let table = topic_keywords(&LessonMeta::new(40, "Multi-ControlNet Workflows"));
        assert!(table.contains(&"pose".to_string()));

        let from_lesson =
            topic_keywords(&LessonMeta::new(7, "Seeds and Reproducibility").with_keywords(["Seed values", "Determinism"]));
        assert_eq!(from_lesson, vec!["determinism", "seed", "values"]);

        let defaults = topic_keywords(&LessonMeta::new(7, "Seeds and Reproducibility"));
        assert_eq!(defaults, strings(DEFAULT_KEYWORDS));
    }

    #[test]
    fn test_example_and_scenario_name_cast() {
        let meta = LessonMeta::new(4, "Sampling Methods and Step Counts");
        let instructor = Persona::new("Hale", PersonaRole::Instructor, 100);
        let student = Persona::new("Pip", PersonaRole::RotatingSupport, 12);
        assert!(example(&meta, &student).starts_with("Pip runs"));

        let scenario = scenario(&meta, &instructor, &student);
        assert_eq!(scenario.instructor, "Hale");
        assert_eq!(scenario.approach, "Hale guides Pip through practical applications");
    }
}
