//! Tutor Engine - lesson content-generation pipeline
//!
//! This is the main entry point for the `tutor-engine` binary.
//! It runs single lessons, walks the persona rotation over a lesson range,
//! and manages configuration files.

mod cli;

use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};

use tutor_engine::artifact::ArtifactPayload;
use tutor_engine::config::{self, TutorConfig};
use tutor_engine::error::{Error, Result};
use tutor_engine::lesson::{LessonMeta, LessonOrchestrator, LessonResponse, StagePayload, StaticCurriculum};
use tutor_engine::logging;
use tutor_engine::persona::{PersonaPool, RotationSelector};
use tutor_engine::random::SeededRandom;
use tutor_engine::version;

use crate::cli::{Cli, Commands, ConfigSubcommand};

fn main() {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Version => {
            version::print_version();
            Ok(())
        }
        Commands::Config { subcommand } => {
            // Config commands use minimal logging
            logging::init_simple(Level::WARN)?;
            handle_config_command(subcommand)
        }
        Commands::Personas => {
            logging::init_simple(simple_level(cli.verbose))?;
            list_personas()
        }
        Commands::Simulate { from, to, seed, config } => {
            let config = TutorConfig::load(config.as_deref())?;
            logging::init_simple(simple_level(cli.verbose))?;
            run_simulation(&config, from, to, seed)
        }
        Commands::Lesson {
            lesson,
            answer,
            config,
            json,
            no_artifacts,
        } => {
            let mut config = TutorConfig::load(config.as_deref())?;
            if no_artifacts {
                config.artifact.enabled = false;
            }

            // The guards must be kept alive until the lesson is printed
            let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

            let build = version::build_info();
            info!(
                version = %build.full_version(),
                target = %build.target,
                profile = %build.profile,
                "Starting tutor engine"
            );

            run_lesson(&config, lesson, &answer, json)
        }
    }
}

fn simple_level(verbose: u8) -> Level {
    if verbose > 0 {
        Level::DEBUG
    } else {
        Level::WARN
    }
}

// ─────────────────────────────────────────────────────────────────
// Lesson
// ─────────────────────────────────────────────────────────────────

fn run_lesson(config: &TutorConfig, lesson: u32, answer: &str, json: bool) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tutor-engine")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    runtime.block_on(async {
        let orchestrator = LessonOrchestrator::from_config(config)?;
        let response = orchestrator.execute_lesson(answer, lesson).await;

        if json {
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else {
            print_lesson(&response);
        }
        Ok(())
    })
}

fn print_lesson(response: &LessonResponse) {
    println!();
    println!("Lesson {}: {} ({})", response.lesson_number, response.topic, response.phase);
    println!("Score: {:.1}/10", response.score);

    for (name, outcome) in &response.stages {
        println!();
        if outcome.fallback {
            println!("[{}] (fallback)", name);
        } else {
            println!("[{}]", name);
        }
        for line in stage_lines(&outcome.payload) {
            println!("  {}", line);
        }
    }

    println!();
    println!("{}", response.summary);
}

fn stage_lines(payload: &StagePayload) -> Vec<String> {
    let lines = match payload {
        StagePayload::ScoreReview(review) => {
            let mut lines = vec![review.feedback.clone(), review.encouragement.clone()];
            lines.extend(review.strengths.iter().map(|s| format!("+ {}", s)));
            lines.extend(review.improvements.iter().map(|s| format!("- {}", s)));
            lines
        }
        StagePayload::TopicAnnouncement(announcement) => vec![
            announcement.greeting.clone(),
            announcement.announcement.clone(),
            announcement.context.clone(),
        ],
        StagePayload::Explanation(explanation) => vec![
            explanation.introduction.clone(),
            explanation.explanation.clone(),
            format!("Tip: {}", explanation.pro_tip),
        ],
        StagePayload::PersonalizedExample(example) => vec![example.example.clone()],
        StagePayload::ChallengeQuestion(question) => {
            let mut lines = vec![question.question.clone()];
            lines.extend(question.hints.iter().map(|h| format!("hint: {}", h)));
            lines
        }
        StagePayload::Artifact(stage) => {
            let mut lines = vec![stage.intro.clone()];
            match &stage.artifact.payload {
                ArtifactPayload::Image { url, .. } => lines.push(format!("Image: {}", url)),
                ArtifactPayload::Panels { panels } => {
                    lines.extend(panels.iter().map(|p| format!("Panel {}: {}", p.panel, p.scene)))
                }
            }
            lines
        }
    };

    lines.into_iter().filter(|line| !line.is_empty()).collect()
}

// ─────────────────────────────────────────────────────────────────
// Rotation walk and persona listing
// ─────────────────────────────────────────────────────────────────

fn run_simulation(config: &TutorConfig, from: u32, to: u32, seed: Option<u64>) -> Result<()> {
    if from == 0 || from > to {
        return Err(Error::config_field_invalid(
            "simulate",
            format!("invalid lesson range {}..={}", from, to),
        ));
    }

    let curriculum = StaticCurriculum::bundled()?;
    let pool = Arc::new(PersonaPool::bundled()?);
    let selector = RotationSelector::new(
        pool,
        config.rotation.clone(),
        SeededRandom::shared(seed.or(config.rotation.seed)),
    );

    println!("{:>6}  {:<24} {:<24} Reason", "Lesson", "Instructor", "Support");
    for lesson in from..=to {
        let meta = curriculum
            .get(lesson)
            .cloned()
            .unwrap_or_else(|| LessonMeta::new(lesson, format!("Lesson {}", lesson)));
        let cast = selector.select_cast(lesson, &meta);
        let reason = selector
            .history(1)
            .last()
            .map(|record| format!("{:?}", record.reason))
            .unwrap_or_default();

        let name = |i: usize| cast.get(i).map(|p| p.name.as_str()).unwrap_or("-");
        println!("{:>6}  {:<24} {:<24} {}", lesson, name(0), name(1), reason);
    }

    println!();
    println!("Appearances:");
    for usage in selector.usage_stats() {
        if usage.total_appearances > 0 {
            println!(
                "  {:<24} {:>3}  (frequency {})",
                usage.name, usage.total_appearances, usage.appearance_frequency
            );
        }
    }

    Ok(())
}

fn list_personas() -> Result<()> {
    let pool = PersonaPool::bundled()?;

    println!("{:<24} {:<17} {:>9}  Traits", "Name", "Role", "Frequency");
    for persona in pool.all() {
        let traits: Vec<&str> = persona.traits.iter().map(String::as_str).collect();
        println!(
            "{:<24} {:<17} {:>9}  {}",
            persona.name,
            persona.role.slug(),
            persona.appearance_frequency,
            traits.join(", ")
        );
    }
    println!();
    println!("Fallback persona: {}", pool.fallback().name);

    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = TutorConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration written to {}", written.display());
        }
        ConfigSubcommand::Validate { config } => {
            TutorConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
