//! Undo/Redo System
//!
//! Command-pattern undo/redo. Each entry owns a reversible action that knows
//! how to apply itself to, and revert itself from, a context `Cx`.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use uuid::Uuid;

use crate::error::Result;

/// Default maximum number of undo levels to keep.
pub const DEFAULT_MAX_UNDO_LEVELS: usize = 100;

/// A reversible mutation of some context.
pub trait Action<Cx: ?Sized> {
    /// Human-readable description for history display.
    fn describe(&self) -> String;

    /// Forward effect. On error the context must be left as it was.
    fn apply(&mut self, cx: &mut Cx) -> Result<()>;

    /// Reverse effect of the last successful `apply`.
    fn revert(&mut self, cx: &mut Cx) -> Result<()>;
}

/// A single undoable action with its history metadata.
pub struct ActionEntry<Cx: ?Sized> {
    /// Unique identifier for this action.
    pub id: String,

    /// Human-readable description, captured when the action was executed.
    pub description: String,

    /// When the action was performed.
    pub timestamp: DateTime<Utc>,

    action: Box<dyn Action<Cx>>,
}

impl<Cx: ?Sized> ActionEntry<Cx> {
    fn new(action: Box<dyn Action<Cx>>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description: action.describe(),
            timestamp: Utc::now(),
            action,
        }
    }
}

impl<Cx: ?Sized> std::fmt::Debug for ActionEntry<Cx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionEntry")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Manages undo/redo operations.
///
/// The stack maintains:
/// - An undo list of recent actions (limited by max_undo_levels)
/// - A redo list of undone actions
/// - A count of entries discarded by trimming or failed reverts
pub struct ActionStack<Cx: ?Sized> {
    undo_stack: Vec<ActionEntry<Cx>>,
    redo_stack: Vec<ActionEntry<Cx>>,
    max_undo_levels: usize,
    discarded: usize,
}

impl<Cx: ?Sized> Default for ActionStack<Cx> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO_LEVELS)
    }
}

impl<Cx: ?Sized> std::fmt::Debug for ActionStack<Cx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionStack")
            .field("undo", &self.undo_stack)
            .field("redo", &self.redo_stack)
            .field("max_undo_levels", &self.max_undo_levels)
            .finish()
    }
}

impl<Cx: ?Sized> ActionStack<Cx> {
    /// Create a new stack with the specified maximum undo levels.
    pub fn new(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_undo_levels: max_levels,
            discarded: 0,
        }
    }

    /// Apply an action and push it onto the undo stack.
    ///
    /// A failed action is not recorded. Success clears the redo stack
    /// (since the history has diverged) and trims to max_undo_levels.
    pub fn execute(&mut self, mut action: Box<dyn Action<Cx>>, cx: &mut Cx) -> Result<()> {
        action.apply(cx)?;

        let entry = ActionEntry::new(action);
        debug!("Executed '{}' ({})", entry.description, entry.id);

        self.discarded += self.redo_stack.len();
        self.redo_stack.clear();
        self.undo_stack.push(entry);
        self.trim_history();
        Ok(())
    }

    /// Revert the most recent action and move it to the redo stack.
    ///
    /// Returns the description of the undone action, or `None` when there is
    /// nothing to undo. If the revert fails the entry is dropped from history.
    pub fn undo(&mut self, cx: &mut Cx) -> Result<Option<String>> {
        let Some(mut entry) = self.undo_stack.pop() else {
            return Ok(None);
        };

        if let Err(e) = entry.action.revert(cx) {
            warn!("Undo of '{}' failed, dropping it: {}", entry.description, e);
            self.discarded += 1;
            return Err(e);
        }

        let description = entry.description.clone();
        self.redo_stack.push(entry);
        Ok(Some(description))
    }

    /// Re-apply the most recently undone action.
    pub fn redo(&mut self, cx: &mut Cx) -> Result<Option<String>> {
        let Some(mut entry) = self.redo_stack.pop() else {
            return Ok(None);
        };

        if let Err(e) = entry.action.apply(cx) {
            warn!("Redo of '{}' failed, dropping it: {}", entry.description, e);
            self.discarded += 1;
            return Err(e);
        }

        let description = entry.description.clone();
        self.undo_stack.push(entry);
        Ok(Some(description))
    }

    /// Get the number of actions that can be undone.
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get the number of actions that can be redone.
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Trim the undo stack to the maximum allowed levels, oldest first.
    pub fn trim_history(&mut self) {
        if self.undo_stack.len() > self.max_undo_levels {
            let excess = self.undo_stack.len() - self.max_undo_levels;
            self.undo_stack.drain(..excess);
            self.discarded += excess;
        }
    }

    pub fn max_undo_levels(&self) -> usize {
        self.max_undo_levels
    }

    /// Set the maximum number of undo levels, trimming if needed.
    pub fn set_max_undo_levels(&mut self, max_levels: usize) {
        self.max_undo_levels = max_levels;
        self.trim_history();
    }

    /// Number of entries dropped from history so far.
    pub fn discarded_count(&self) -> usize {
        self.discarded
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get the most recent action that can be undone (if any).
    pub fn peek_undo(&self) -> Option<&ActionEntry<Cx>> {
        self.undo_stack.last()
    }

    /// Get the most recent action that can be redone (if any).
    pub fn peek_redo(&self) -> Option<&ActionEntry<Cx>> {
        self.redo_stack.last()
    }

    /// Clear all undo/redo history.
    pub fn clear(&mut self) {
        self.discarded += self.undo_stack.len() + self.redo_stack.len();
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// `(id, description)` of undoable actions, most recent first.
    pub fn undo_summary(&self) -> Vec<(String, String)> {
        self.undo_stack
            .iter()
            .rev()
            .map(|e| (e.id.clone(), e.description.clone()))
            .collect()
    }

    /// `(id, description)` of redoable actions, most recently undone first.
    pub fn redo_summary(&self) -> Vec<(String, String)> {
        self.redo_stack
            .iter()
            .rev()
            .map(|e| (e.id.clone(), e.description.clone()))
            .collect()
    }
}
