//! Pipeworks - content pipeline project and build controller
//!
//! Pipeworks edits content build projects and drives the external build tool:
//! - Every project mutation is a reversible action on an undo stack
//! - Importers and processors are resolved by name against a capability registry
//! - Builds run as a supervised subprocess whose output is parsed into events
//! - A background watcher keeps each item's on-disk existence up to date
//!
//! # Layout
//!
//! - `project`: the data model (items, folders, templates, selection)
//! - `pipeline`: importer/processor registry and type resolution
//! - `actions`: reversible mutations and the undo stack
//! - `persist`: the project script format and legacy import
//! - `build`: tool discovery, the build runner and output parsing
//! - `controller`: the facade a front end talks to

pub mod actions;
pub mod build;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod history;
pub mod persist;
pub mod pipeline;
pub mod project;
pub mod view;
pub mod watcher;

pub use config::{load_config, PipeworksConfig};
pub use controller::Controller;
pub use error::{PipelineError, Result};
pub use project::{ContentItem, Project};
