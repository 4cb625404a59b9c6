//! Reversible project mutations
//!
//! Every user-visible change to a project goes through one of these actions
//! so it can be undone. Actions operate on a `Workspace`: the project, the
//! registry its items resolve against, and the view that mirrors the tree.

pub mod exclude;
pub mod include;
pub mod move_item;
pub mod new_item;
pub mod stack;
pub mod update;

use serde::{Deserialize, Serialize};

use crate::pipeline::registry::PipelineRegistry;
use crate::pipeline::resolve::{resolve_all, resolve_types};
use crate::project::model::{Project, ProjectNode};
use crate::view::ProjectView;

pub use exclude::ExcludeAction;
pub use include::IncludeAction;
pub use move_item::MoveAction;
pub use new_item::NewAction;
pub use stack::{Action, ActionEntry, ActionStack};
pub use update::{
    ItemChange, ProjectProperty, UpdateContentItemAction, UpdateProcessorParamAction,
    UpdateProjectPropertyAction,
};

/// Boxed action over a workspace.
pub type ProjectAction = Box<dyn Action<Workspace>>;

/// What an include does with a path that is already in the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Leave the existing item alone.
    #[default]
    Skip,
    /// Replace the existing item, keeping its position.
    Replace,
}

/// Everything a project action reads or changes.
pub struct Workspace {
    pub project: Project,
    pub registry: PipelineRegistry,
    pub view: Box<dyn ProjectView>,
}

impl Workspace {
    pub fn new(project: Project, registry: PipelineRegistry, view: Box<dyn ProjectView>) -> Self {
        Self {
            project,
            registry,
            view,
        }
    }

    /// Re-resolve one item and refresh its on-disk existence flag.
    pub fn resolve_item(&mut self, path: &str) {
        let exists = self.project.absolute_path(path).exists();
        if let Some(item) = self.project.find_item_mut(path) {
            resolve_types(item, &self.registry);
            item.exists = exists;
        }
    }

    /// Reload capabilities from the project references and re-resolve everything.
    pub fn reload_registry(&mut self) {
        let base_dir = self.project.base_dir();
        self.registry.load(&self.project.references, &base_dir);
        resolve_all(&mut self.project, &self.registry);
    }

    /// Report every node of the project as new.
    pub fn announce_all(&mut self) {
        self.view.begin_update();
        self.view.add_item(&ProjectNode::Project);
        for folder in &self.project.folders {
            self.view.add_item(&ProjectNode::Folder(folder.path.clone()));
        }
        for item in &self.project.items {
            self.view.add_item(&ProjectNode::Content(item.source_file.clone()));
        }
        self.view.end_update();
    }

    /// Report an update for the project node and every item.
    pub fn announce_refresh(&mut self) {
        self.view.begin_update();
        self.view.update_item(&ProjectNode::Project);
        for item in &self.project.items {
            self.view.update_item(&ProjectNode::Content(item.source_file.clone()));
        }
        self.view.end_update();
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("project", &self.project.name())
            .field("items", &self.project.items.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;

    use super::*;

    /// View recording every notification as text.
    #[derive(Clone, Default)]
    pub struct RecordingView(pub Rc<RefCell<Vec<String>>>);

    impl ProjectView for RecordingView {
        fn add_item(&mut self, node: &ProjectNode) {
            self.0.borrow_mut().push(format!("add {}", node));
        }

        fn remove_item(&mut self, node: &ProjectNode) {
            self.0.borrow_mut().push(format!("remove {}", node));
        }

        fn update_item(&mut self, node: &ProjectNode) {
            self.0.borrow_mut().push(format!("update {}", node));
        }
    }

    /// Workspace for a project saved as `Content.mgcb` in `dir`.
    pub fn workspace_in(dir: &Path) -> (Workspace, Rc<RefCell<Vec<String>>>) {
        let view = RecordingView::default();
        let events = Rc::clone(&view.0);
        let project = Project::with_origin(dir.join("Content.mgcb"));
        (
            Workspace::new(project, PipelineRegistry::with_defaults(), Box::new(view)),
            events,
        )
    }
}
