//! Adding files and folders to a project

use std::path::{Path, PathBuf};

use log::{info, warn};
use walkdir::WalkDir;

use super::stack::Action;
use super::{DuplicatePolicy, Workspace};
use crate::error::{PipelineError, Result};
use crate::project::model::{ContentItem, ContentItemState, Project, ProjectNode, PROJECT_EXTENSION};

/// Adds content items (and optionally virtual folders) to the project.
#[derive(Debug)]
pub struct IncludeAction {
    files: Vec<String>,
    folders: Vec<String>,
    importer: String,
    processor: String,
    policy: DuplicatePolicy,

    // Recorded by the last apply.
    added: Vec<String>,
    replaced: Vec<(usize, ContentItemState)>,
    added_folders: Vec<String>,
}

impl IncludeAction {
    /// Include `files` and `folders`, given as absolute or project-relative paths.
    pub fn new(project: &Project, files: &[PathBuf], folders: &[PathBuf], policy: DuplicatePolicy) -> Self {
        let mut relative_files: Vec<String> = Vec::new();
        for file in files {
            let rel = project.relative_path(file);
            if !rel.is_empty() && !relative_files.contains(&rel) {
                relative_files.push(rel);
            }
        }

        let mut relative_folders: Vec<String> = Vec::new();
        for folder in folders {
            let rel = project.relative_path(folder);
            if !rel.is_empty() && !relative_folders.contains(&rel) {
                relative_folders.push(rel);
            }
        }

        Self {
            files: relative_files,
            folders: relative_folders,
            importer: String::new(),
            processor: String::new(),
            policy,
            added: Vec::new(),
            replaced: Vec::new(),
            added_folders: Vec::new(),
        }
    }

    /// Include every file below `dir`; empty directories become virtual folders.
    ///
    /// Project scripts are never included.
    pub fn from_directory(project: &Project, dir: &Path, policy: DuplicatePolicy) -> Self {
        let (files, folders) = scan_directory(dir);
        Self::new(project, &files, &folders, policy)
    }

    /// Importer and processor names given to new items instead of inferring them.
    pub fn with_types(mut self, importer: impl Into<String>, processor: impl Into<String>) -> Self {
        self.importer = importer.into();
        self.processor = processor.into();
        self
    }

    /// Paths added by the last apply.
    pub fn added(&self) -> &[String] {
        &self.added
    }

    fn new_item(&self, path: &str) -> ContentItem {
        ContentItem::new(path)
            .with_importer(self.importer.clone())
            .with_processor(self.processor.clone())
    }
}

impl Action<Workspace> for IncludeAction {
    fn describe(&self) -> String {
        match (self.files.len(), self.folders.len()) {
            (1, 0) => format!("Include {}", self.files[0]),
            (0, 1) => format!("Include folder {}", self.folders[0]),
            (files, 0) => format!("Include {} items", files),
            (files, folders) => format!("Include {} items, {} folders", files, folders),
        }
    }

    fn apply(&mut self, ws: &mut Workspace) -> Result<()> {
        self.added.clear();
        self.replaced.clear();
        self.added_folders.clear();

        ws.view.begin_update();

        let mut skipped: Option<&String> = None;
        for path in &self.files {
            match ws.project.index_of(path) {
                Some(idx) => match self.policy {
                    DuplicatePolicy::Skip => {
                        info!("'{}' is already in the project, skipping", path);
                        skipped.get_or_insert(path);
                    }
                    DuplicatePolicy::Replace => {
                        warn!("'{}' is already in the project, replacing it", path);
                        let previous = ws.project.items[idx].state();
                        ws.project.items[idx] = self.new_item(path);
                        ws.resolve_item(path);
                        self.replaced.push((idx, previous));
                        ws.view.update_item(&ProjectNode::Content(path.clone()));
                    }
                },
                None => {
                    ws.project.items.push(self.new_item(path));
                    ws.resolve_item(path);
                    self.added.push(path.clone());
                    ws.view.add_item(&ProjectNode::Content(path.clone()));
                }
            }
        }

        for folder in &self.folders {
            if ws.project.add_folder(folder) {
                self.added_folders.push(folder.clone());
                ws.view.add_item(&ProjectNode::Folder(folder.clone()));
            }
        }

        ws.view.end_update();

        if self.added.is_empty() && self.replaced.is_empty() && self.added_folders.is_empty() {
            return Err(match skipped {
                Some(path) => PipelineError::DuplicateItem { path: path.clone() },
                None => PipelineError::NothingToInclude,
            });
        }
        Ok(())
    }

    fn revert(&mut self, ws: &mut Workspace) -> Result<()> {
        ws.view.begin_update();

        for path in self.added.iter().rev() {
            ws.project.remove_item(path);
            ws.view.remove_item(&ProjectNode::Content(path.clone()));
        }

        for (idx, previous) in &self.replaced {
            if let Some(item) = ws.project.items.get_mut(*idx) {
                item.apply_state(previous);
            }
            ws.resolve_item(&previous.source_file);
            ws.view
                .update_item(&ProjectNode::Content(previous.source_file.clone()));
        }

        for folder in self.added_folders.iter().rev() {
            ws.project.remove_folder(folder);
            ws.view.remove_item(&ProjectNode::Folder(folder.clone()));
        }

        ws.view.end_update();
        Ok(())
    }
}

/// Files below `dir` plus directories that contain no entries at all.
fn scan_directory(dir: &Path) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut files = Vec::new();
    let mut empty_dirs = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if entry.file_type().is_dir() {
            let is_empty = path
                .read_dir()
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if is_empty {
                empty_dirs.push(path.to_path_buf());
            }
        } else if entry.file_type().is_file() && !is_project_script(path) {
            files.push(path.to_path_buf());
        }
    }

    (files, empty_dirs)
}

fn is_project_script(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case(PROJECT_EXTENSION))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::workspace_in;
    use crate::pipeline::params::ParamValue;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_include_resolves_and_notifies() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("hero.png"), b"png").unwrap();
        let (mut ws, events) = workspace_in(dir.path());

        let mut action = IncludeAction::new(
            &ws.project,
            &[dir.path().join("hero.png"), PathBuf::from("Sounds/jump.wav")],
            &[PathBuf::from("Empty")],
            DuplicatePolicy::Skip,
        );
        action.apply(&mut ws).unwrap();

        let hero = ws.project.find_item("hero.png").unwrap();
        assert_eq!(hero.importer_name, "TextureImporter");
        assert!(hero.exists);
        assert!(!ws.project.find_item("Sounds/jump.wav").unwrap().exists);
        assert!(ws.project.has_folder("Empty"));
        assert_eq!(
            *events.borrow(),
            vec!["add hero.png", "add Sounds/jump.wav", "add Empty/"]
        );

        action.revert(&mut ws).unwrap();
        assert!(ws.project.items.is_empty());
        assert!(ws.project.folders.is_empty());
    }

    #[test]
    fn test_duplicate_skip_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (mut ws, _) = workspace_in(dir.path());
        IncludeAction::new(&ws.project, &[PathBuf::from("a.png")], &[], DuplicatePolicy::Skip)
            .apply(&mut ws)
            .unwrap();
        let before = ws.project.snapshot();

        let err = IncludeAction::new(&ws.project, &[PathBuf::from("a.png")], &[], DuplicatePolicy::Skip)
            .apply(&mut ws)
            .unwrap_err();

        assert!(matches!(err, PipelineError::DuplicateItem { ref path } if path == "a.png"));
        assert_eq!(ws.project.snapshot(), before);
    }

    #[test]
    fn test_empty_include_is_nothing_to_include() {
        let dir = TempDir::new().unwrap();
        let (mut ws, _) = workspace_in(dir.path());
        let err = IncludeAction::new(&ws.project, &[], &[], DuplicatePolicy::Skip)
            .apply(&mut ws)
            .unwrap_err();
        assert_eq!(err.error_code(), "NOTHING_TO_INCLUDE");
    }

    #[test]
    fn test_duplicate_replace_keeps_position() {
        let dir = TempDir::new().unwrap();
        let (mut ws, _) = workspace_in(dir.path());
        IncludeAction::new(
            &ws.project,
            &[PathBuf::from("a.png"), PathBuf::from("b.png")],
            &[],
            DuplicatePolicy::Skip,
        )
        .apply(&mut ws)
        .unwrap();
        ws.project.items[0]
            .processor_params
            .insert("GenerateMipmaps".to_string(), ParamValue::Bool(true));
        let before = ws.project.snapshot();

        let mut replace = IncludeAction::new(&ws.project, &[PathBuf::from("a.png")], &[], DuplicatePolicy::Replace)
            .with_types("TextureImporter", "TextureProcessor");
        replace.apply(&mut ws).unwrap();

        assert_eq!(ws.project.items.len(), 2);
        assert_eq!(ws.project.items[0].source_file, "a.png");
        assert_eq!(
            ws.project.items[0].processor_params.get("GenerateMipmaps"),
            Some(&ParamValue::Bool(false))
        );

        replace.revert(&mut ws).unwrap();
        assert_eq!(ws.project.snapshot(), before);
    }

    #[test]
    fn test_from_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("Textures/ui")).unwrap();
        fs::create_dir_all(dir.path().join("Unused")).unwrap();
        fs::write(dir.path().join("Textures/ui/button.png"), b"").unwrap();
        fs::write(dir.path().join("Textures/hero.png"), b"").unwrap();
        fs::write(dir.path().join("Content.mgcb"), b"").unwrap();
        let (mut ws, _) = workspace_in(dir.path());

        let mut action = IncludeAction::from_directory(&ws.project, dir.path(), DuplicatePolicy::Skip);
        action.apply(&mut ws).unwrap();

        let mut paths: Vec<&str> = ws.project.items.iter().map(|i| i.source_file.as_str()).collect();
        paths.sort();
        assert_eq!(paths, vec!["Textures/hero.png", "Textures/ui/button.png"]);
        assert!(ws.project.has_folder("Unused"));
    }
}
