//! Deterministic text-panel artifacts used whenever no image is available.

use super::types::{ArtifactResult, Panel};
use crate::lesson::LessonMeta;
use crate::persona::Persona;

/// Four panels: introduction, explanation, question, resolution
pub fn fallback_panels(topic: &str, instructor: &str, student: &str) -> Vec<Panel> {
    vec![
        Panel {
            panel: 1,
            scene: format!("{} standing beside a large display reading \"{}\"", instructor, topic),
            dialogue: vec![format!(
                "\"Today we shall examine {}, a subject requiring my particular expertise.\"",
                topic
            )],
            focus: "Topic introduction".to_string(),
        },
        Panel {
            panel: 2,
            scene: format!(
                "{} gesturing at worked examples while {} watches closely",
                instructor, student
            ),
            dialogue: vec![
                format!("\"Observe these key principles of {}.\"", topic),
                "\"The method is quite straightforward, for the attentive.\"".to_string(),
            ],
            focus: "Concept explanation".to_string(),
        },
        Panel {
            panel: 3,
            scene: format!("{} raising a hand with a questioning look", student),
            dialogue: vec![
                "\"How does this apply in practice?\"".to_string(),
                "\"An astute question. Allow me to elaborate.\"".to_string(),
            ],
            focus: "Student engagement".to_string(),
        },
        Panel {
            panel: 4,
            scene: format!("{} nodding with understanding as {} looks satisfied", student, instructor),
            dialogue: vec![
                format!("\"Now I understand how {} works!\"", topic),
                "\"Naturally. My teaching methods are quite effective.\"".to_string(),
            ],
            focus: "Learning achievement".to_string(),
        },
    ]
}

/// Panel artifact for a lesson. Never cached.
pub fn fallback_artifact(meta: &LessonMeta, cast: &[Persona]) -> ArtifactResult {
    let instructor = cast.first().map(|p| p.name.as_str()).unwrap_or("The instructor");
    let student = cast.get(1).map(|p| p.name.as_str()).unwrap_or("The student");
    ArtifactResult::panels(meta, cast, fallback_panels(&meta.topic, instructor, student))
}

/// Panel artifact substituted when the caller stops waiting for generation
pub fn timed_out_artifact(meta: &LessonMeta, cast: &[Persona]) -> ArtifactResult {
    ArtifactResult {
        timed_out: true,
        ..fallback_artifact(meta, cast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::PersonaRole;

    #[test]
    fn test_four_panels_in_order() {
        let panels = fallback_panels("Seeds", "Hale", "Pip");
        assert_eq!(panels.len(), 4);
        assert_eq!(panels.iter().map(|p| p.panel).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(panels[0].scene.contains("Seeds"));
        assert!(panels[2].scene.starts_with("Pip"));
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let meta = LessonMeta::new(7, "Negative Prompts");
        let cast = vec![
            Persona::new("Hale", PersonaRole::Instructor, 100),
            Persona::new("Pip", PersonaRole::RotatingSupport, 12),
        ];
        let a = fallback_artifact(&meta, &cast);
        let b = fallback_artifact(&meta, &cast);
        assert_eq!(a.payload, b.payload);
        assert_eq!(a.characters_featured, vec!["Hale", "Pip"]);
        assert!(a.fallback_used && !a.success);
        assert!(!a.timed_out);
        assert!(timed_out_artifact(&meta, &cast).timed_out);
    }
}
