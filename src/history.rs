//! Per-user history: recently opened projects and window layout
//!
//! Stored as JSON under the user config directory. Nothing here is global;
//! callers load a `History`, change it and save it back.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::APP_DIR;
use crate::error::{PipelineError, Result};

/// History file name inside the application config directory.
pub const HISTORY_FILE: &str = "history.json";

/// Default number of recent projects kept.
pub const DEFAULT_MAX_RECENT: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub maximized: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct History {
    /// Most recent first.
    pub recent_projects: Vec<PathBuf>,
    pub max_recent: usize,
    pub window: Option<WindowGeometry>,
    /// Free-form settings owned by the front end.
    pub extra: BTreeMap<String, String>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Default for History {
    fn default() -> Self {
        Self {
            recent_projects: Vec::new(),
            max_recent: DEFAULT_MAX_RECENT,
            window: None,
            extra: BTreeMap::new(),
            path: None,
        }
    }
}

impl History {
    /// `<config dir>/pipeworks/history.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(HISTORY_FILE))
    }

    /// Load from the default location. A missing file yields an empty history.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`. A missing file yields an empty history bound to `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let mut history = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| PipelineError::FileReadError {
                path: path.to_path_buf(),
                source: e,
            })?;
            serde_json::from_str::<History>(&content)?
        } else {
            Self::default()
        };
        history.path = Some(path.to_path_buf());
        Ok(history)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write back to the file it was loaded from, or to the default location.
    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .clone()
            .or_else(Self::default_path)
            .ok_or_else(|| {
                PipelineError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    "no user config directory",
                ))
            })?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::FileWriteError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| PipelineError::FileWriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Move `project` to the front of the recent list.
    pub fn add_recent(&mut self, project: impl Into<PathBuf>) {
        let project = project.into();
        self.recent_projects.retain(|p| p != &project);
        self.recent_projects.insert(0, project);
        self.recent_projects.truncate(self.max_recent.max(1));
    }

    pub fn remove_recent(&mut self, project: &Path) {
        self.recent_projects.retain(|p| p != project);
    }

    pub fn clear_recent(&mut self) {
        self.recent_projects.clear();
    }

    pub fn last_project(&self) -> Option<&Path> {
        self.recent_projects.first().map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_recent_projects_most_recent_first_and_capped() {
        let mut history = History {
            max_recent: 3,
            ..History::default()
        };
        for name in ["a", "b", "c", "d"] {
            history.add_recent(format!("/games/{}.mgcb", name));
        }
        history.add_recent("/games/c.mgcb");

        assert_eq!(
            history.recent_projects,
            vec![
                PathBuf::from("/games/c.mgcb"),
                PathBuf::from("/games/d.mgcb"),
                PathBuf::from("/games/b.mgcb"),
            ]
        );
        assert_eq!(history.last_project(), Some(Path::new("/games/c.mgcb")));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(HISTORY_FILE);

        let mut history = History::load(&path).unwrap();
        assert!(history.recent_projects.is_empty());

        history.add_recent("/games/Content.mgcb");
        history.window = Some(WindowGeometry {
            x: 10,
            y: 20,
            width: 1280,
            height: 720,
            maximized: false,
        });
        history.extra.insert("theme".to_string(), "dark".to_string());
        history.save().unwrap();

        let loaded = History::load(&path).unwrap();
        assert_eq!(loaded, history);
    }
}
