//! Content item templates
//!
//! A `.template` definition is five non-comment lines:
//!
//! ```text
//! # Sprite font template
//! SpriteFont Description
//! Font.png
//! FontDescriptionImporter
//! FontDescriptionProcessor
//! SpriteFont.spritefont
//! ```
//!
//! label, icon, importer, processor, and the stub file copied for new items.
//! Icon and stub paths are relative to the definition file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

use crate::error::{PipelineError, Result};

/// Extension of template definition files.
pub const TEMPLATE_EXTENSION: &str = "template";

/// Immutable descriptor used to stamp out new content items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItemTemplate {
    pub label: String,
    pub icon: PathBuf,
    pub importer_name: String,
    pub processor_name: String,
    /// Stub file copied for each new item.
    pub template_file: PathBuf,
}

impl ContentItemTemplate {
    /// Parse a definition file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| PipelineError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&content, dir).map_err(|reason| PipelineError::InvalidTemplate {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn parse(content: &str, dir: &Path) -> std::result::Result<Self, String> {
        let lines: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect();

        let [label, icon, importer, processor, file] = lines.as_slice() else {
            return Err(format!("expected 5 definition lines, found {}", lines.len()));
        };

        Ok(Self {
            label: label.to_string(),
            icon: dir.join(icon),
            importer_name: importer.to_string(),
            processor_name: processor.to_string(),
            template_file: dir.join(file),
        })
    }

    /// Extension given to items created from this template (without the dot).
    pub fn extension(&self) -> String {
        self.template_file
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Load every template found under `dirs`, in order.
///
/// Labels are unique: the first definition seen wins. Unreadable definitions
/// are logged and skipped. The result is sorted by label.
pub fn load_templates(dirs: &[PathBuf]) -> Vec<ContentItemTemplate> {
    let mut seen = HashSet::new();
    let mut templates = Vec::new();

    for dir in dirs {
        if !dir.is_dir() {
            continue;
        }

        let mut definitions: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .map(|e| e == TEMPLATE_EXTENSION)
                    .unwrap_or(false)
            })
            .map(|entry| entry.path().to_path_buf())
            .collect();
        definitions.sort();

        for path in definitions {
            match ContentItemTemplate::load(&path) {
                Ok(template) => {
                    if seen.insert(template.label.clone()) {
                        debug!("Loaded template '{}' from {}", template.label, path.display());
                        templates.push(template);
                    }
                }
                Err(e) => warn!("Skipping template: {}", e),
            }
        }
    }

    templates.sort_by(|a, b| a.label.cmp(&b.label));
    templates
}
