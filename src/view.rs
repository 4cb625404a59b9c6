//! Collaborator interfaces for whatever front end drives the controller
//!
//! The controller never renders anything itself. It reports tree changes to a
//! `ProjectView`, build output to a `LogSink`, and asks questions through a
//! `Prompt`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::build::output::BuildEvent;
use crate::project::model::ProjectNode;

/// Receives project tree changes.
pub trait ProjectView {
    /// A batch of changes is about to be reported.
    fn begin_update(&mut self) {}

    fn add_item(&mut self, node: &ProjectNode);

    fn remove_item(&mut self, node: &ProjectNode);

    /// Properties of an existing node changed.
    fn update_item(&mut self, node: &ProjectNode);

    /// The current batch of changes is complete.
    fn end_update(&mut self) {}
}

/// View that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullView;

impl ProjectView for NullView {
    fn add_item(&mut self, _node: &ProjectNode) {}
    fn remove_item(&mut self, _node: &ProjectNode) {}
    fn update_item(&mut self, _node: &ProjectNode) {}
}

/// Destination of build output. Called from the build worker thread.
pub trait LogSink: Send + Sync {
    fn append(&self, text: &str);

    /// A classified output line. Defaults to appending the raw line.
    fn event(&self, _event: &BuildEvent, line: &str) {
        self.append(line);
    }

    /// Output of a previous build is no longer relevant.
    fn clear(&self) {}
}

/// Log sink that keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the collected lines.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.lines().iter().any(|l| l.contains(text))
    }
}

impl LogSink for MemoryLog {
    fn append(&self, text: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(text.to_string());
        }
    }

    fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}

/// Answer to "save changes?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveChoice {
    Save,
    Discard,
    Cancel,
}

/// Questions the controller needs a human to answer.
pub trait Prompt {
    /// The project has unsaved changes.
    fn ask_save_or_cancel(&mut self) -> SaveChoice;

    /// Ask for a file location; `None` when the user backs out.
    fn ask_path(&mut self, title: &str, suggested: Option<&Path>) -> Option<PathBuf>;

    /// Yes/no confirmation for destructive operations.
    fn confirm(&mut self, message: &str) -> bool;

    fn show_error(&mut self, title: &str, message: &str);
}

/// Prompt with canned answers. Errors shown are collected.
#[derive(Debug, Clone)]
pub struct FixedPrompt {
    pub save: SaveChoice,
    pub confirm: bool,
    pub path: Option<PathBuf>,
    pub errors: Vec<String>,
}

impl FixedPrompt {
    /// Answers yes to everything and saves when asked.
    pub fn accepting() -> Self {
        Self {
            save: SaveChoice::Save,
            confirm: true,
            path: None,
            errors: Vec::new(),
        }
    }

    /// Answers no to everything and cancels when asked.
    pub fn refusing() -> Self {
        Self {
            save: SaveChoice::Cancel,
            confirm: false,
            path: None,
            errors: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl Prompt for FixedPrompt {
    fn ask_save_or_cancel(&mut self) -> SaveChoice {
        self.save
    }

    fn ask_path(&mut self, _title: &str, suggested: Option<&Path>) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| suggested.map(Path::to_path_buf))
    }

    fn confirm(&mut self, _message: &str) -> bool {
        self.confirm
    }

    fn show_error(&mut self, title: &str, message: &str) {
        self.errors.push(format!("{}: {}", title, message));
    }
}
