//! Project data model: content items, folders, selection and templates

pub mod model;
pub mod selection;
pub mod template;

pub use model::{
    BuildAction, Binding, ContentItem, ContentItemState, DirectoryItem, GraphicsProfile, Project,
    ProjectNode, ProjectSnapshot, ProjectState, TargetPlatform,
};
pub use selection::Selection;
pub use template::{load_templates, ContentItemTemplate};
