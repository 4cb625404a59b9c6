//! CLI Command Implementations
//!
//! Every command opens the project, runs one controller operation and saves.
//! Undo history lives only as long as the process, so there is no undo here.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use log::{info, warn};

use super::console::{ConsoleLog, ConsolePrompt, LoggingView};
use super::{Cli, Commands};
use crate::actions::{DuplicatePolicy, ItemChange, ProjectProperty};
use crate::build::BuildState;
use crate::config::{load_config, PipeworksConfig};
use crate::controller::Controller;
use crate::error::PipelineError;
use crate::history::History;
use crate::project::model::{Binding, BuildAction};

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: PipeworksConfig,
    pub project: PathBuf,
    pub assume_yes: bool,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
        // One command per process: nothing would ever drain watcher events.
        config.watcher.enabled = false;
        Ok(Self {
            config,
            project: absolute(&cli.project),
            assume_yes: cli.yes,
        })
    }
}

/// Dispatch a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let ctx = Context::from_cli(&cli)?;

    match cli.command {
        Some(Commands::New { path }) => new_project(&ctx, &path),
        Some(Commands::Info) | None => show_info(&ctx),
        Some(Commands::Include { paths, replace }) => include(&ctx, &paths, replace),
        Some(Commands::Exclude { paths, delete }) => exclude(&ctx, paths, delete),
        Some(Commands::Move { from, to }) => move_entry(&ctx, &from, &to),
        Some(Commands::NewItem {
            template,
            name,
            location,
        }) => new_item(&ctx, &template, &location, &name),
        Some(Commands::Set { property, value }) => set_property(&ctx, &property, &value),
        Some(Commands::SetParam { name, value, items }) => set_param(&ctx, items, &name, &value),
        Some(Commands::SetItem {
            property,
            value,
            items,
        }) => set_item(&ctx, items, &property, &value),
        Some(Commands::Build { rebuild, debugger }) => build(&ctx, rebuild, debugger),
        Some(Commands::Clean) => clean(&ctx),
        Some(Commands::Rebuild { items }) => rebuild(&ctx, &items),
        Some(Commands::Import { legacy, output }) => import(&ctx, &legacy, output.as_deref()),
        Some(Commands::Templates) => list_templates(&ctx),
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn controller_with(ctx: &Context, config: PipeworksConfig) -> Controller {
    let controller = Controller::new(
        config,
        Box::new(LoggingView),
        Arc::new(ConsoleLog),
        Box::new(ConsolePrompt::new(ctx.assume_yes)),
    );
    match History::load_default() {
        Ok(history) => controller.with_history(history),
        Err(e) => {
            warn!("Ignoring unreadable history: {}", e);
            controller
        }
    }
}

fn open_with(ctx: &Context, config: PipeworksConfig) -> Result<Controller> {
    let mut controller = controller_with(ctx, config);
    controller
        .open_project(&ctx.project)
        .with_context(|| format!("Failed to open {}", ctx.project.display()))?;
    Ok(controller)
}

fn open(ctx: &Context) -> Result<Controller> {
    open_with(ctx, ctx.config.clone())
}

fn save(controller: &mut Controller) -> Result<()> {
    if !controller.save_project().context("Failed to save project")? {
        bail!("Project was not saved");
    }
    Ok(())
}

/// Create a new, empty project.
pub fn new_project(ctx: &Context, path: &Path) -> Result<()> {
    let path = absolute(path);
    let mut controller = controller_with(ctx, ctx.config.clone());
    controller
        .new_project_at(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    println!("Project created: {}", path.display());
    Ok(())
}

/// Print project properties, references and items.
pub fn show_info(ctx: &Context) -> Result<()> {
    let controller = open(ctx)?;
    let Some(project) = controller.project() else {
        bail!(PipelineError::NoProjectOpen);
    };

    println!("Project: {}", project.name());
    println!("{:-<60}", "");
    println!("Output directory:       {}", project.output_dir);
    println!("Intermediate directory: {}", project.intermediate_dir);
    println!("Platform:               {}", project.platform);
    println!("Profile:                {}", project.profile);
    println!("Config:                 {}", project.config);
    println!("Compress:               {}", project.compress);

    if !project.references.is_empty() {
        println!("\nReferences:");
        for reference in &project.references {
            println!("  {}", reference);
        }
    }

    println!("\nContent ({} items):", project.items.len());
    for item in &project.items {
        let missing = if item.exists { "" } else { " (missing)" };
        match item.build_action {
            BuildAction::Copy => println!("  [copy]  {}{}", item.source_file, missing),
            BuildAction::Build => {
                println!("  [build] {}{}", item.source_file, missing);
                println!(
                    "          {} -> {}",
                    describe_binding(&item.importer, &item.importer_name),
                    describe_binding(&item.processor, &item.processor_name)
                );
                for (name, value) in &item.processor_params {
                    println!("          {} = {}", name, value);
                }
            }
        }
    }
    Ok(())
}

fn describe_binding<T>(binding: &Binding<T>, name: &str) -> String {
    match binding {
        Binding::Resolved(_) => name.to_string(),
        Binding::Missing(original) => format!("{} (not found)", original),
        Binding::Null => "-".to_string(),
    }
}

/// Include files and directories.
pub fn include(ctx: &Context, paths: &[PathBuf], replace: bool) -> Result<()> {
    let mut config = ctx.config.clone();
    if replace {
        config.include.duplicates = DuplicatePolicy::Replace;
    }
    let mut controller = open_with(ctx, config)?;

    let (dirs, files): (Vec<PathBuf>, Vec<PathBuf>) =
        paths.iter().map(|p| absolute(p)).partition(|p| p.is_dir());

    let mut changed = false;
    for dir in &dirs {
        changed |= ignore_nothing_to_include(controller.include_folder(dir))?;
    }
    if !files.is_empty() {
        changed |= ignore_nothing_to_include(controller.include(&files))?;
    }

    if !changed {
        println!("Nothing new to include.");
        return Ok(());
    }
    save(&mut controller)?;
    let count = controller.project().map(|p| p.items.len()).unwrap_or(0);
    println!("Project now has {} items.", count);
    Ok(())
}

fn ignore_nothing_to_include(result: crate::error::Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(PipelineError::NothingToInclude | PipelineError::DuplicateItem { .. }) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Exclude items and folders, optionally deleting them.
pub fn exclude(ctx: &Context, paths: Vec<String>, delete: bool) -> Result<()> {
    let mut controller = open(ctx)?;
    let Some(project) = controller.project() else {
        bail!(PipelineError::NoProjectOpen);
    };

    let (items, folders): (Vec<String>, Vec<String>) =
        paths.into_iter().partition(|p| project.contains_item(p));

    if !controller.exclude(items, folders, delete)? {
        println!("Cancelled.");
        return Ok(());
    }
    save(&mut controller)?;
    println!("{}", if delete { "Deleted." } else { "Excluded." });
    Ok(())
}

/// Move an item or a folder.
pub fn move_entry(ctx: &Context, from: &str, to: &str) -> Result<()> {
    let mut controller = open(ctx)?;
    let is_item = controller
        .project()
        .map(|p| p.contains_item(from))
        .unwrap_or(false);

    let moved = if is_item {
        controller.move_item(from, to)?
    } else {
        controller.move_folder(from, to)?
    };
    if !moved {
        println!("Cancelled.");
        return Ok(());
    }
    save(&mut controller)?;
    println!("Moved {} to {}", from, to);
    Ok(())
}

/// Create a new item from a template.
pub fn new_item(ctx: &Context, template: &str, location: &str, name: &str) -> Result<()> {
    let mut controller = open(ctx)?;
    let path = controller.new_item(template, location, name)?;
    save(&mut controller)?;
    println!("Created {}", path);
    Ok(())
}

pub fn set_property(ctx: &Context, property: &str, value: &str) -> Result<()> {
    let property = ProjectProperty::parse(property, value)?;
    let mut controller = open(ctx)?;
    controller.set_property(property)?;
    save(&mut controller)
}

pub fn set_param(ctx: &Context, items: Vec<String>, name: &str, value: &str) -> Result<()> {
    let mut controller = open(ctx)?;
    controller.set_param(items, name, value)?;
    save(&mut controller)
}

pub fn set_item(ctx: &Context, items: Vec<String>, property: &str, value: &str) -> Result<()> {
    let change = ItemChange::parse(property, value)?;
    let mut controller = open(ctx)?;
    controller.set_item(items, change)?;
    save(&mut controller)
}

/// Build and wait for the result.
pub fn build(ctx: &Context, rebuild: bool, debugger: bool) -> Result<()> {
    let mut config = ctx.config.clone();
    config.builder.launch_debugger |= debugger;
    let mut controller = open_with(ctx, config)?;
    if !controller.build(rebuild)? {
        println!("Build cancelled.");
        return Ok(());
    }
    finish_build(&mut controller)
}

pub fn clean(ctx: &Context) -> Result<()> {
    let mut controller = open(ctx)?;
    if !controller.clean()? {
        println!("Clean cancelled.");
        return Ok(());
    }
    finish_build(&mut controller)
}

pub fn rebuild(ctx: &Context, items: &[String]) -> Result<()> {
    let mut controller = open(ctx)?;
    if !controller.rebuild_items(items)? {
        println!("Rebuild cancelled.");
        return Ok(());
    }
    finish_build(&mut controller)
}

fn finish_build(controller: &mut Controller) -> Result<()> {
    let state = controller.wait_build();
    let summary = controller.build_summary();
    info!(
        "Build finished: {:?} ({} succeeded, {} failed, {} skipped)",
        state, summary.succeeded, summary.failed, summary.skipped
    );

    match state {
        BuildState::Completed if summary.is_success() => Ok(()),
        BuildState::Completed => {
            let failed = summary.error_files.len().max(summary.failed as usize);
            bail!("{} asset(s) failed to build", failed)
        }
        BuildState::Cancelled => bail!(PipelineError::Cancelled),
        _ => bail!("Build failed"),
    }
}

/// Import a legacy project and save it as a project script.
pub fn import(ctx: &Context, legacy: &Path, output: Option<&Path>) -> Result<()> {
    let legacy = absolute(legacy);
    let mut controller = controller_with(ctx, ctx.config.clone());
    match output {
        Some(path) => {
            controller
                .import_legacy_to(&legacy, &absolute(path))
                .with_context(|| format!("Failed to import {}", legacy.display()))?;
        }
        None => {
            controller
                .import_legacy(&legacy)
                .with_context(|| format!("Failed to import {}", legacy.display()))?;
            save(&mut controller)?;
        }
    }

    if let Some(project) = controller.project() {
        let origin = project.origin.as_deref().unwrap_or(Path::new(""));
        println!(
            "Imported {} items into {}",
            project.items.len(),
            origin.display()
        );
    }
    Ok(())
}

pub fn list_templates(ctx: &Context) -> Result<()> {
    let mut controller = controller_with(ctx, ctx.config.clone());
    if ctx.project.exists() {
        controller.open_project(&ctx.project)?;
    } else {
        controller.reload_templates();
    }

    let templates = controller.templates();
    if templates.is_empty() {
        println!("No templates found.");
        return Ok(());
    }
    for template in templates {
        println!(
            "{:<28} .{:<12} {} / {}",
            template.label,
            template.extension(),
            template.importer_name,
            template.processor_name
        );
    }
    Ok(())
}
