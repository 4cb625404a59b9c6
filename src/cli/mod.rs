//! CLI Module
//!
//! Headless front end driving the controller, one command per invocation.

pub mod commands;
pub mod console;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Project file used when `--project` is not given.
pub const DEFAULT_PROJECT: &str = "Content.mgcb";

/// Pipeworks - content pipeline project and build controller
#[derive(Parser, Debug)]
#[command(name = "pipeworks")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: discovered pipeworks.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Answer yes to every confirmation and save prompt
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Project file to operate on
    #[arg(short, long, global = true, default_value = DEFAULT_PROJECT)]
    pub project: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new, empty project
    New {
        /// Path of the project file to create
        path: PathBuf,
    },

    /// Print project properties and content
    Info,

    /// Add files or directories to the project
    Include {
        /// Files or directories to include
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Replace items that are already in the project
        #[arg(long)]
        replace: bool,
    },

    /// Remove items or folders from the project
    Exclude {
        /// Project-relative item or folder paths
        #[arg(required = true)]
        paths: Vec<String>,

        /// Also delete the files from disk
        #[arg(long)]
        delete: bool,
    },

    /// Move or rename an item or folder
    #[command(name = "move")]
    Move {
        /// Current project-relative path
        from: String,

        /// New project-relative path
        to: String,
    },

    /// Create a new item from a template
    #[command(name = "new-item")]
    NewItem {
        /// Template label
        template: String,

        /// Name of the new item (the template extension is added)
        name: String,

        /// Project-relative folder to create the item in
        #[arg(short, long, default_value = "")]
        location: String,
    },

    /// Set a project property (outputDir, intermediateDir, platform, profile, config, compress, references)
    Set {
        property: String,
        value: String,
    },

    /// Set a processor parameter on items
    #[command(name = "set-param")]
    SetParam {
        name: String,
        value: String,

        /// Project-relative item paths
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Set buildAction, importer or processor on items
    #[command(name = "set-item")]
    SetItem {
        property: String,
        value: String,

        /// Project-relative item paths
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Build the project
    Build {
        /// Rebuild everything, ignoring up-to-date checks
        #[arg(long)]
        rebuild: bool,

        /// Ask the build tool to launch a debugger
        #[arg(long)]
        debugger: bool,
    },

    /// Delete built and intermediate content
    Clean,

    /// Rebuild only the given items
    Rebuild {
        #[arg(required = true)]
        items: Vec<String>,
    },

    /// Import a legacy .contentproj file
    Import {
        /// Legacy project file
        legacy: PathBuf,

        /// Where to save the imported project (default: next to the legacy file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List available item templates
    Templates,
}
