//! Observed multi-selection of project nodes

use std::collections::HashSet;
use std::fmt;

use super::model::ProjectNode;

type Listener = Box<dyn FnMut(&[ProjectNode], &[ProjectNode])>;

/// Order-preserving set of selected nodes.
///
/// Every mutation notifies subscribers with the selection before and after
/// the change. Two selections are equal when they hold the same node paths,
/// regardless of order.
#[derive(Default)]
pub struct Selection {
    nodes: Vec<ProjectNode>,
    listeners: Vec<Listener>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback receiving `(before, after)` on every mutation.
    pub fn subscribe(&mut self, listener: impl FnMut(&[ProjectNode], &[ProjectNode]) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn nodes(&self) -> &[ProjectNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: &ProjectNode) -> bool {
        self.nodes.contains(node)
    }

    /// Selected content item paths, in selection order.
    pub fn content_paths(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                ProjectNode::Content(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    /// Replace the whole selection.
    pub fn set(&mut self, nodes: impl IntoIterator<Item = ProjectNode>) {
        self.mutate(|current| {
            current.clear();
            for node in nodes {
                if !current.contains(&node) {
                    current.push(node);
                }
            }
        });
    }

    /// Add a node at the end if not already selected.
    pub fn add(&mut self, node: ProjectNode) {
        self.mutate(|current| {
            if !current.contains(&node) {
                current.push(node);
            }
        });
    }

    pub fn remove(&mut self, node: &ProjectNode) {
        self.mutate(|current| current.retain(|n| n != node));
    }

    /// Add the node if absent, remove it if present.
    pub fn toggle(&mut self, node: ProjectNode) {
        self.mutate(|current| match current.iter().position(|n| *n == node) {
            Some(idx) => {
                current.remove(idx);
            }
            None => current.push(node),
        });
    }

    pub fn clear(&mut self) {
        self.mutate(Vec::clear);
    }

    /// Rewrite selected paths after a rename, keeping order.
    pub fn rename(&mut self, rename: impl Fn(&ProjectNode) -> Option<ProjectNode>) {
        self.mutate(|current| {
            for node in current.iter_mut() {
                if let Some(renamed) = rename(node) {
                    *node = renamed;
                }
            }
        });
    }

    /// Drop selected nodes that no longer exist.
    pub fn retain(&mut self, keep: impl Fn(&ProjectNode) -> bool) {
        self.mutate(|current| current.retain(|n| keep(n)));
    }

    fn mutate(&mut self, change: impl FnOnce(&mut Vec<ProjectNode>)) {
        let before = self.nodes.clone();
        change(&mut self.nodes);
        for listener in &mut self.listeners {
            listener(&before, &self.nodes);
        }
    }

    fn path_set(&self) -> HashSet<(&'static str, &str)> {
        self.nodes
            .iter()
            .map(|n| match n {
                ProjectNode::Project => ("project", ""),
                ProjectNode::Content(p) => ("content", p.as_str()),
                ProjectNode::Folder(p) => ("folder", p.as_str()),
            })
            .collect()
    }
}

impl PartialEq for Selection {
    fn eq(&self, other: &Self) -> bool {
        self.path_set() == other.path_set()
    }
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("nodes", &self.nodes)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
