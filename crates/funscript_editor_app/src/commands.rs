// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subcommand implementations.

use anyhow::{bail, Context, Result};
use funscript_editor_project::{
    FixedMediaResolver, FunscriptDocument, MediaResolver, Project, SiblingMediaResolver,
    PROJECT_EXTENSION,
};
use funscript_editor_timeline::{InterpolationMode, Script, TimelineConfig};
use std::path::{Path, PathBuf};

/// Smallest accepted `--step-ms`
const MIN_STEP_MS: f64 = 1.0;
/// Upper bound on the rows a single `sample` run prints
const MAX_SAMPLES: usize = 1_000_000;

fn is_project(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(PROJECT_EXTENSION))
}

fn format_ms(ms: f64) -> String {
    let total = (ms.max(0.0) / 1000.0).round() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

fn print_script(script: &Script) {
    let actions = script.actions();
    let span = match (actions.first(), actions.last()) {
        (Some(first), Some(last)) => format!("{} - {}", format_ms(first.at()), format_ms(last.at())),
        _ => "empty".to_string(),
    };
    println!(
        "  {} [{}] {} actions, {}{}",
        script.title(),
        script.relative_path(),
        actions.len(),
        span,
        if script.is_enabled() { "" } else { " (disabled)" }
    );
}

/// Write a default config to `path`
pub fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }
    TimelineConfig::default()
        .save(path)
        .with_context(|| format!("Failed to write config {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote default config");
    Ok(())
}

/// Print a summary of a script or project
pub fn info(config: &TimelineConfig, file: &Path) -> Result<()> {
    if is_project(file) {
        let mut project = Project::with_config(config.clone());
        project
            .load(file)
            .with_context(|| format!("Failed to open project {}", file.display()))?;

        println!("Project: {}", file.display());
        println!("Title:   {}", project.metadata().title);
        match project.media_path() {
            Some(media) => println!("Media:   {}", media.display()),
            None => println!("Media:   none"),
        }
        println!("Resume:  {}", format_ms(project.player().last_position_ms));
        println!("Scripts: {}", project.script_count());
        for script in project.scripts() {
            print_script(script);
        }
        return Ok(());
    }

    let parsed = FunscriptDocument::read(file)
        .with_context(|| format!("Failed to read script {}", file.display()))?;
    let doc = &parsed.document;
    println!("Script:   {}", file.display());
    println!("Version:  {}", doc.version);
    println!("Title:    {}", doc.metadata.title);
    println!("Creator:  {}", doc.metadata.creator);
    println!("Inverted: {}", doc.inverted);
    println!("Actions:  {}", doc.actions.len());
    if let Some(last) = doc.actions.last() {
        println!("Length:   {}", format_ms(last.at()));
    }
    if !parsed.is_complete() {
        println!("Rejected: {} invalid action records", parsed.rejected);
    }
    Ok(())
}

/// Build a project from a script or media file and save it
pub fn import(
    config: TimelineConfig,
    script: &Path,
    media: Option<PathBuf>,
    output: Option<&Path>,
) -> Result<()> {
    let resolver: Box<dyn MediaResolver> = match media {
        Some(media) => Box::new(FixedMediaResolver(media)),
        None => Box::new(SiblingMediaResolver),
    };

    let target = match output {
        Some(path) => path.to_path_buf(),
        None => script.with_extension(PROJECT_EXTENSION),
    };
    if target.exists() {
        bail!("{} already exists", target.display());
    }

    let mut project = Project::with_config(config);
    project
        .import_script(script, resolver.as_ref())
        .with_context(|| format!("Failed to import {}", script.display()))?;
    project.save(&target)?;

    for outcome in project.flush_saves() {
        if let Some(err) = outcome.error {
            bail!("Failed to write {}: {err}", outcome.path.display());
        }
        println!("{}", outcome.path.display());
    }
    Ok(())
}

/// Write every script of a project into `dir`
pub fn export(config: TimelineConfig, project_path: &Path, dir: &Path, csv: bool) -> Result<()> {
    let mut project = Project::with_config(config);
    project
        .load(project_path)
        .with_context(|| format!("Failed to open project {}", project_path.display()))?;

    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let written = project.export_scripts(dir)?;
    for path in &written {
        println!("{}", path.display());
    }

    if csv {
        for script in project.scripts() {
            let doc = FunscriptDocument::from_snapshot(&script.snapshot());
            let path = dir.join(format!("{}.csv", script.title()));
            std::fs::write(&path, doc.to_csv())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

/// Positions every `step_ms` from the first to the last action, at most
/// [`MAX_SAMPLES`] of them
pub fn sample_points(script: &mut Script, step_ms: f64, mode: InterpolationMode) -> Vec<(f64, f32)> {
    let (Some(first), Some(last)) = (script.actions().first(), script.actions().last()) else {
        return Vec::new();
    };
    let (start, end) = (first.at(), last.at());

    let mut points = Vec::new();
    for index in 0..MAX_SAMPLES {
        let time = start + step_ms * index as f64;
        if time > end {
            break;
        }
        if let Some(pos) = script.position_at(time, mode) {
            points.push((time, pos));
        }
    }
    points
}

fn validate_step(step_ms: f64) -> Result<()> {
    if !(step_ms.is_finite() && step_ms >= MIN_STEP_MS) {
        bail!("--step-ms must be a number of at least {MIN_STEP_MS}");
    }
    Ok(())
}

/// Print `time,position` samples of a script
pub fn sample(config: &TimelineConfig, file: &Path, step_ms: f64, mode: InterpolationMode) -> Result<()> {
    validate_step(step_ms)?;

    let parsed = FunscriptDocument::read(file)
        .with_context(|| format!("Failed to read script {}", file.display()))?;
    let (mut script, _) = parsed.document.into_script(config, file);

    tracing::debug!(mode = mode.name(), step_ms, "sampling");
    for (time, pos) in sample_points(&mut script, step_ms, mode) {
        println!("{},{:.2}", time.round() as i64, pos);
    }
    Ok(())
}
