//! Creating new content from a template

use std::fs;
use std::io;

use log::{info, warn};

use super::stack::Action;
use super::Workspace;
use crate::error::{PipelineError, Result};
use crate::project::model::{normalize_path, ContentItem, ProjectNode};
use crate::project::template::ContentItemTemplate;

/// Copies a template stub into the project and includes it.
#[derive(Debug)]
pub struct NewAction {
    template: ContentItemTemplate,
    path: String,
}

impl NewAction {
    /// New item `<location>/<name>.<template extension>`.
    pub fn new(template: ContentItemTemplate, location: &str, name: &str) -> Self {
        let ext = template.extension();
        let file_name = if ext.is_empty() || name.to_ascii_lowercase().ends_with(&format!(".{}", ext.to_ascii_lowercase())) {
            name.to_string()
        } else {
            format!("{}.{}", name, ext)
        };
        let path = normalize_path(&format!("{}/{}", location, file_name));
        Self { template, path }
    }

    /// Project-relative path of the item this action creates.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Action<Workspace> for NewAction {
    fn describe(&self) -> String {
        format!("New {} {}", self.template.label, self.path)
    }

    fn apply(&mut self, ws: &mut Workspace) -> Result<()> {
        if !self.template.template_file.is_file() {
            return Err(PipelineError::FileNotFound {
                path: self.template.template_file.clone(),
            });
        }

        let dst = ws.project.absolute_path(&self.path);
        if dst.exists() || ws.project.contains_item(&self.path) {
            return Err(PipelineError::DestinationExists { path: dst });
        }

        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::FileWriteError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::copy(&self.template.template_file, &dst).map_err(|e| PipelineError::FileWriteError {
            path: dst.clone(),
            source: e,
        })?;

        let item = ContentItem::new(self.path.clone())
            .with_importer(self.template.importer_name.clone())
            .with_processor(self.template.processor_name.clone());
        ws.project.items.push(item);
        ws.resolve_item(&self.path);
        ws.view.add_item(&ProjectNode::Content(self.path.clone()));

        info!("Created {} from template '{}'", dst.display(), self.template.label);
        Ok(())
    }

    fn revert(&mut self, ws: &mut Workspace) -> Result<()> {
        ws.project.remove_item(&self.path);
        ws.view.remove_item(&ProjectNode::Content(self.path.clone()));

        let dst = ws.project.absolute_path(&self.path);
        match fs::remove_file(&dst) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not delete {}: {}", dst.display(), e),
        }
        Ok(())
    }
}
