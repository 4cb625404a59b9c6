//! Removing items and folders from a project

use std::fs;
use std::io;

use log::{info, warn};

use super::stack::Action;
use super::Workspace;
use crate::error::{PipelineError, Result};
use crate::project::model::{is_under, ContentItemState, DirectoryItem, ProjectNode};

/// Removes content items and folders, optionally deleting them from disk.
#[derive(Debug)]
pub struct ExcludeAction {
    items: Vec<String>,
    folders: Vec<String>,
    delete: bool,

    // Recorded by the last apply, in ascending index order.
    removed: Vec<(usize, ContentItemState)>,
    removed_folders: Vec<(usize, String)>,
}

impl ExcludeAction {
    pub fn new(items: Vec<String>, folders: Vec<String>, delete: bool) -> Self {
        Self {
            items,
            folders,
            delete,
            removed: Vec::new(),
            removed_folders: Vec::new(),
        }
    }

    /// Whether this exclusion removes files from disk.
    pub fn deletes_files(&self) -> bool {
        self.delete
    }

    fn validate(&self, ws: &Workspace) -> Result<()> {
        for path in &self.items {
            if !ws.project.contains_item(path) {
                return Err(PipelineError::ItemNotFound { path: path.clone() });
            }
        }
        for folder in &self.folders {
            if !ws.project.is_folder(folder) {
                return Err(PipelineError::ItemNotFound {
                    path: folder.clone(),
                });
            }
        }
        Ok(())
    }

    fn targets(&self, path: &str) -> bool {
        self.items.iter().any(|p| p == path) || self.folders.iter().any(|f| is_under(path, f))
    }

    fn targets_folder(&self, path: &str) -> bool {
        self.folders.iter().any(|f| f == path || is_under(path, f))
    }

    fn delete_from_disk(&self, ws: &Workspace) {
        for (_, state) in &self.removed {
            let abs = ws.project.absolute_path(&state.source_file);
            match fs::remove_file(&abs) {
                Ok(()) => info!("Deleted {}", abs.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not delete {}: {}", abs.display(), e),
            }
        }
        for folder in &self.folders {
            let abs = ws.project.absolute_path(folder);
            if abs.is_dir() {
                match fs::remove_dir_all(&abs) {
                    Ok(()) => info!("Deleted {}", abs.display()),
                    Err(e) => warn!("Could not delete {}: {}", abs.display(), e),
                }
            }
        }
    }
}

impl Action<Workspace> for ExcludeAction {
    fn describe(&self) -> String {
        let verb = if self.delete { "Delete" } else { "Exclude" };
        match (self.items.as_slice(), self.folders.as_slice()) {
            ([item], []) => format!("{} {}", verb, item),
            ([], [folder]) => format!("{} folder {}", verb, folder),
            (items, folders) => format!("{} {} items", verb, items.len() + folders.len()),
        }
    }

    fn apply(&mut self, ws: &mut Workspace) -> Result<()> {
        self.validate(ws)?;

        self.removed.clear();
        self.removed_folders.clear();

        ws.view.begin_update();

        // Highest index first so recorded indices stay valid.
        for idx in (0..ws.project.items.len()).rev() {
            if self.targets(&ws.project.items[idx].source_file) {
                let item = ws.project.items.remove(idx);
                ws.view
                    .remove_item(&ProjectNode::Content(item.source_file.clone()));
                self.removed.push((idx, item.state()));
            }
        }
        self.removed.reverse();

        for idx in (0..ws.project.folders.len()).rev() {
            if self.targets_folder(&ws.project.folders[idx].path) {
                let folder = ws.project.folders.remove(idx);
                ws.view.remove_item(&ProjectNode::Folder(folder.path.clone()));
                self.removed_folders.push((idx, folder.path));
            }
        }
        self.removed_folders.reverse();

        ws.view.end_update();

        if self.delete {
            self.delete_from_disk(ws);
        }
        Ok(())
    }

    fn revert(&mut self, ws: &mut Workspace) -> Result<()> {
        if self.delete {
            return Err(PipelineError::Irreversible {
                reason: format!("{} deleted files from disk", self.describe()),
            });
        }

        ws.view.begin_update();

        for (idx, path) in &self.removed_folders {
            let idx = (*idx).min(ws.project.folders.len());
            ws.project.folders.insert(idx, DirectoryItem::new(path.clone()));
            ws.view.add_item(&ProjectNode::Folder(path.clone()));
        }

        for (idx, state) in &self.removed {
            ws.project.insert_item(*idx, state.to_item());
            ws.resolve_item(&state.source_file);
            ws.view
                .add_item(&ProjectNode::Content(state.source_file.clone()));
        }

        ws.view.end_update();
        Ok(())
    }
}
