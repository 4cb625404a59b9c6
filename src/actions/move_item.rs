//! Renaming and relocating items, folders and the project file

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use super::stack::Action;
use super::Workspace;
use crate::error::{PipelineError, Result};
use crate::project::model::{is_under, normalize_path, rebase_path, ProjectNode};

#[derive(Debug, Clone)]
enum MoveKind {
    Item { from: String, to: String },
    Folder { from: String, to: String },
    Project { from: PathBuf, to: PathBuf },
}

/// Moves a file, a folder or the project script, on disk and in the model.
#[derive(Debug)]
pub struct MoveAction {
    kind: MoveKind,
}

impl MoveAction {
    /// Move a content item to a new project-relative path.
    pub fn item(from: &str, to: &str) -> Self {
        Self {
            kind: MoveKind::Item {
                from: normalize_path(from),
                to: normalize_path(to),
            },
        }
    }

    /// Move a folder and everything below it.
    pub fn folder(from: &str, to: &str) -> Self {
        Self {
            kind: MoveKind::Folder {
                from: normalize_path(from),
                to: normalize_path(to),
            },
        }
    }

    /// Rename the project script in place.
    pub fn project(from: impl Into<PathBuf>, new_name: &str) -> Self {
        let from = from.into();
        let to = from.with_file_name(new_name);
        Self {
            kind: MoveKind::Project { from, to },
        }
    }

    fn inverse(&self) -> MoveKind {
        match &self.kind {
            MoveKind::Item { from, to } => MoveKind::Item {
                from: to.clone(),
                to: from.clone(),
            },
            MoveKind::Folder { from, to } => MoveKind::Folder {
                from: to.clone(),
                to: from.clone(),
            },
            MoveKind::Project { from, to } => MoveKind::Project {
                from: to.clone(),
                to: from.clone(),
            },
        }
    }
}

impl Action<Workspace> for MoveAction {
    fn describe(&self) -> String {
        match &self.kind {
            MoveKind::Item { from, to } | MoveKind::Folder { from, to } => {
                format!("Move {} to {}", from, to)
            }
            MoveKind::Project { to, .. } => format!(
                "Rename project to {}",
                to.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
            ),
        }
    }

    fn apply(&mut self, ws: &mut Workspace) -> Result<()> {
        perform(ws, &self.kind.clone())
    }

    fn revert(&mut self, ws: &mut Workspace) -> Result<()> {
        perform(ws, &self.inverse())
    }
}

fn perform(ws: &mut Workspace, kind: &MoveKind) -> Result<()> {
    match kind {
        MoveKind::Item { from, to } => move_item(ws, from, to),
        MoveKind::Folder { from, to } => move_folder(ws, from, to),
        MoveKind::Project { from, to } => move_project(ws, from, to),
    }
}

fn move_item(ws: &mut Workspace, from: &str, to: &str) -> Result<()> {
    if !ws.project.contains_item(from) {
        return Err(PipelineError::ItemNotFound {
            path: from.to_string(),
        });
    }

    let src = ws.project.absolute_path(from);
    let dst = ws.project.absolute_path(to);
    if ws.project.contains_item(to) || dst.exists() {
        return Err(PipelineError::DestinationExists { path: dst });
    }

    if src.exists() {
        rename_on_disk(&src, &dst)?;
    }

    if let Some(item) = ws.project.find_item_mut(from) {
        item.source_file = to.to_string();
    }
    ws.resolve_item(to);

    ws.view.begin_update();
    ws.view.remove_item(&ProjectNode::Content(from.to_string()));
    ws.view.add_item(&ProjectNode::Content(to.to_string()));
    ws.view.end_update();

    info!("Moved {} to {}", from, to);
    Ok(())
}

fn move_folder(ws: &mut Workspace, from: &str, to: &str) -> Result<()> {
    if !ws.project.is_folder(from) {
        return Err(PipelineError::ItemNotFound {
            path: from.to_string(),
        });
    }
    if to.is_empty() || is_under(to, from) {
        return Err(PipelineError::InvalidValue {
            property: "destination".to_string(),
            value: to.to_string(),
        });
    }

    let src = ws.project.absolute_path(from);
    let dst = ws.project.absolute_path(to);
    if ws.project.is_folder(to) || ws.project.contains_item(to) || dst.exists() {
        return Err(PipelineError::DestinationExists { path: dst });
    }

    if src.is_dir() {
        rename_on_disk(&src, &dst)?;
    }

    ws.view.begin_update();

    let mut moved = Vec::new();
    for item in &mut ws.project.items {
        if let Some(rebased) = rebase_path(&item.source_file, from, to) {
            ws.view
                .remove_item(&ProjectNode::Content(item.source_file.clone()));
            item.source_file = rebased.clone();
            moved.push(rebased);
        }
    }
    for folder in &mut ws.project.folders {
        if let Some(rebased) = rebase_path(&folder.path, from, to) {
            ws.view.remove_item(&ProjectNode::Folder(folder.path.clone()));
            folder.path = rebased;
            ws.view.add_item(&ProjectNode::Folder(folder.path.clone()));
        }
    }
    for path in &moved {
        ws.resolve_item(path);
        ws.view.add_item(&ProjectNode::Content(path.clone()));
    }

    ws.view.end_update();

    info!("Moved folder {} to {} ({} items)", from, to, moved.len());
    Ok(())
}

fn move_project(ws: &mut Workspace, from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        return Err(PipelineError::DestinationExists {
            path: to.to_path_buf(),
        });
    }

    if from.exists() {
        rename_on_disk(from, to)?;
    }
    ws.project.origin = Some(to.to_path_buf());
    ws.view.update_item(&ProjectNode::Project);

    info!("Renamed project to {}", to.display());
    Ok(())
}

fn rename_on_disk(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::FileWriteError {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    fs::rename(src, dst).map_err(|e| PipelineError::FileWriteError {
        path: dst.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::workspace_in;
    use crate::project::model::ContentItem;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_move_item_on_disk_and_back() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("hero.png"), b"png").unwrap();
        let (mut ws, _) = workspace_in(dir.path());
        ws.project.items.push(ContentItem::new("hero.png"));

        let mut action = MoveAction::item("hero.png", "Sprites/hero.png");
        action.apply(&mut ws).unwrap();
        assert!(dir.path().join("Sprites/hero.png").exists());
        assert!(ws.project.contains_item("Sprites/hero.png"));

        action.revert(&mut ws).unwrap();
        assert!(dir.path().join("hero.png").exists());
        assert!(ws.project.contains_item("hero.png"));
    }

    #[test]
    fn test_move_refuses_existing_destination() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.png"), b"a").unwrap();
        fs::write(dir.path().join("b.png"), b"b").unwrap();
        let (mut ws, _) = workspace_in(dir.path());
        ws.project.items.push(ContentItem::new("a.png"));
        let before = ws.project.snapshot();

        let err = MoveAction::item("a.png", "b.png").apply(&mut ws).unwrap_err();
        assert_eq!(err.error_code(), "DESTINATION_EXISTS");
        assert_eq!(ws.project.snapshot(), before);
        assert_eq!(fs::read(dir.path().join("a.png")).unwrap(), b"a");
    }

    #[test]
    fn test_folder_move_cascades() {
        let dir = TempDir::new().unwrap();
        let (mut ws, _) = workspace_in(dir.path());
        for path in ["Textures/a.png", "Textures/ui/b.png", "TexturesOld/c.png"] {
            ws.project.items.push(ContentItem::new(path));
        }
        ws.project.add_folder("Textures/empty");
        let before = ws.project.snapshot();

        let mut action = MoveAction::folder("Textures", "Art/Textures");
        action.apply(&mut ws).unwrap();

        let paths: Vec<&str> = ws.project.items.iter().map(|i| i.source_file.as_str()).collect();
        assert_eq!(
            paths,
            vec!["Art/Textures/a.png", "Art/Textures/ui/b.png", "TexturesOld/c.png"]
        );
        assert!(ws.project.has_folder("Art/Textures/empty"));

        action.revert(&mut ws).unwrap();
        assert_eq!(ws.project.snapshot(), before);
    }

    #[test]
    fn test_folder_cannot_move_into_itself() {
        let dir = TempDir::new().unwrap();
        let (mut ws, _) = workspace_in(dir.path());
        ws.project.items.push(ContentItem::new("Textures/a.png"));

        let err = MoveAction::folder("Textures", "Textures/inner").apply(&mut ws).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_VALUE");
    }

    #[test]
    fn test_rename_project() {
        let dir = TempDir::new().unwrap();
        let origin = dir.path().join("Content.mgcb");
        fs::write(&origin, b"").unwrap();
        let (mut ws, _) = workspace_in(dir.path());

        let mut action = MoveAction::project(&origin, "Game.mgcb");
        action.apply(&mut ws).unwrap();
        assert_eq!(ws.project.name(), "Game");
        assert!(dir.path().join("Game.mgcb").exists());

        action.revert(&mut ws).unwrap();
        assert_eq!(ws.project.origin.as_deref(), Some(origin.as_path()));
    }
}
