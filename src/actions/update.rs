//! Property edits on content items and on the project itself
//!
//! Each action records the values it overwrote so revert can swap them back.

use std::str::FromStr;

use log::debug;

use super::stack::Action;
use super::Workspace;
use crate::error::{PipelineError, Result};
use crate::pipeline::params::ParamValue;
use crate::project::model::{
    BuildAction, ContentItemState, GraphicsProfile, ProjectNode, ProjectState, TargetPlatform,
};

/// A change to one persisted field of a content item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemChange {
    BuildAction(BuildAction),
    Importer(String),
    Processor(String),
}

impl ItemChange {
    /// Parse `name=value` style input (`buildAction`, `importer`, `processor`).
    pub fn parse(name: &str, value: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "buildaction" | "action" => Ok(ItemChange::BuildAction(value.parse()?)),
            "importer" => Ok(ItemChange::Importer(value.trim().to_string())),
            "processor" => Ok(ItemChange::Processor(value.trim().to_string())),
            _ => Err(PipelineError::InvalidValue {
                property: name.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

/// Sets build action, importer or processor on one or more items.
#[derive(Debug)]
pub struct UpdateContentItemAction {
    paths: Vec<String>,
    change: ItemChange,
    before: Vec<ContentItemState>,
}

impl UpdateContentItemAction {
    pub fn new(paths: Vec<String>, change: ItemChange) -> Self {
        Self {
            paths,
            change,
            before: Vec::new(),
        }
    }
}

impl Action<Workspace> for UpdateContentItemAction {
    fn describe(&self) -> String {
        let what = match &self.change {
            ItemChange::BuildAction(action) => format!("build action to {}", action),
            ItemChange::Importer(name) => format!("importer to {}", name),
            ItemChange::Processor(name) => format!("processor to {}", name),
        };
        match self.paths.as_slice() {
            [path] => format!("Set {} on {}", what, path),
            paths => format!("Set {} on {} items", what, paths.len()),
        }
    }

    fn apply(&mut self, ws: &mut Workspace) -> Result<()> {
        let before = self
            .paths
            .iter()
            .map(|p| ws.project.item(p).map(|i| i.state()))
            .collect::<Result<Vec<_>>>()?;

        ws.view.begin_update();
        for path in &self.paths {
            if let Some(item) = ws.project.find_item_mut(path) {
                match &self.change {
                    ItemChange::BuildAction(action) => item.build_action = *action,
                    ItemChange::Importer(name) => item.importer_name = name.clone(),
                    ItemChange::Processor(name) => {
                        item.processor_name = name.clone();
                        item.processor_params.clear();
                    }
                }
            }
            ws.resolve_item(path);
            ws.view.update_item(&ProjectNode::Content(path.clone()));
        }
        ws.view.end_update();

        self.before = before;
        Ok(())
    }

    fn revert(&mut self, ws: &mut Workspace) -> Result<()> {
        ws.view.begin_update();
        for state in &self.before {
            if let Some(item) = ws.project.find_item_mut(&state.source_file) {
                item.apply_state(state);
            }
            ws.resolve_item(&state.source_file);
            ws.view
                .update_item(&ProjectNode::Content(state.source_file.clone()));
        }
        ws.view.end_update();
        Ok(())
    }
}

/// Sets one processor parameter on one or more items.
///
/// Items whose processor is resolved only accept parameters from its schema,
/// converted to the declared type. Unresolved processors store the text as is.
#[derive(Debug)]
pub struct UpdateProcessorParamAction {
    paths: Vec<String>,
    name: String,
    value: String,
    before: Vec<(String, Option<ParamValue>)>,
}

impl UpdateProcessorParamAction {
    pub fn new(paths: Vec<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            paths,
            name: name.into(),
            value: value.into(),
            before: Vec::new(),
        }
    }

    fn converted(&self, ws: &Workspace, path: &str) -> Result<ParamValue> {
        let item = ws.project.item(path)?;
        if item.build_action == BuildAction::Copy {
            return Err(PipelineError::InvalidValue {
                property: self.name.clone(),
                value: format!("{} is copied, not processed", path),
            });
        }

        let Some(processor) = item.processor.descriptor() else {
            return Ok(ParamValue::Raw(self.value.clone()));
        };

        processor
            .param(&self.name)
            .and_then(|spec| spec.param_type.parse(&self.value))
            .ok_or_else(|| PipelineError::InvalidValue {
                property: format!("{}.{}", processor.type_name, self.name),
                value: self.value.clone(),
            })
    }
}

impl Action<Workspace> for UpdateProcessorParamAction {
    fn describe(&self) -> String {
        format!("Set {} to {}", self.name, self.value)
    }

    fn apply(&mut self, ws: &mut Workspace) -> Result<()> {
        let mut values = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            values.push(self.converted(ws, path)?);
        }

        let mut before = Vec::with_capacity(self.paths.len());
        ws.view.begin_update();
        for (path, value) in self.paths.iter().zip(values) {
            if let Some(item) = ws.project.find_item_mut(path) {
                let previous = item.processor_params.insert(self.name.clone(), value);
                before.push((path.clone(), previous));
            }
            ws.view.update_item(&ProjectNode::Content(path.clone()));
        }
        ws.view.end_update();

        self.before = before;
        Ok(())
    }

    fn revert(&mut self, ws: &mut Workspace) -> Result<()> {
        ws.view.begin_update();
        for (path, previous) in &self.before {
            if let Some(item) = ws.project.find_item_mut(path) {
                match previous {
                    Some(value) => {
                        item.processor_params.insert(self.name.clone(), value.clone());
                    }
                    None => {
                        item.processor_params.remove(&self.name);
                    }
                }
            }
            ws.view.update_item(&ProjectNode::Content(path.clone()));
        }
        ws.view.end_update();
        Ok(())
    }
}

/// A new value for one project-wide property.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectProperty {
    OutputDir(String),
    IntermediateDir(String),
    Platform(TargetPlatform),
    Profile(GraphicsProfile),
    Config(String),
    Compress(bool),
    References(Vec<String>),
}

impl ProjectProperty {
    /// Parse a property by its script directive name. References are `;` separated.
    pub fn parse(name: &str, value: &str) -> Result<Self> {
        let invalid = || PipelineError::InvalidValue {
            property: name.to_string(),
            value: value.to_string(),
        };

        match name.to_ascii_lowercase().as_str() {
            "outputdir" => Ok(ProjectProperty::OutputDir(value.to_string())),
            "intermediatedir" => Ok(ProjectProperty::IntermediateDir(value.to_string())),
            "platform" => Ok(ProjectProperty::Platform(TargetPlatform::from_str(value)?)),
            "profile" => Ok(ProjectProperty::Profile(GraphicsProfile::from_str(value)?)),
            "config" => Ok(ProjectProperty::Config(value.to_string())),
            "compress" => match value.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(ProjectProperty::Compress(true)),
                "false" => Ok(ProjectProperty::Compress(false)),
                _ => Err(invalid()),
            },
            "references" | "reference" => Ok(ProjectProperty::References(
                value
                    .split(';')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            _ => Err(invalid()),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ProjectProperty::OutputDir(_) => "OutputDir",
            ProjectProperty::IntermediateDir(_) => "IntermediateDir",
            ProjectProperty::Platform(_) => "Platform",
            ProjectProperty::Profile(_) => "Profile",
            ProjectProperty::Config(_) => "Config",
            ProjectProperty::Compress(_) => "Compress",
            ProjectProperty::References(_) => "References",
        }
    }

    fn apply_to(&self, state: &mut ProjectState) {
        match self {
            ProjectProperty::OutputDir(v) => state.output_dir = v.clone(),
            ProjectProperty::IntermediateDir(v) => state.intermediate_dir = v.clone(),
            ProjectProperty::Platform(v) => state.platform = *v,
            ProjectProperty::Profile(v) => state.profile = *v,
            ProjectProperty::Config(v) => state.config = v.clone(),
            ProjectProperty::Compress(v) => state.compress = *v,
            ProjectProperty::References(v) => state.references = v.clone(),
        }
    }
}

/// Sets one project-wide property.
#[derive(Debug)]
pub struct UpdateProjectPropertyAction {
    property: ProjectProperty,
    before: Option<ProjectState>,
}

impl UpdateProjectPropertyAction {
    pub fn new(property: ProjectProperty) -> Self {
        Self {
            property,
            before: None,
        }
    }

    fn restore(ws: &mut Workspace, state: &ProjectState) {
        let references_changed = ws.project.references != state.references;
        ws.project.apply_state(state);

        if references_changed {
            debug!("References changed, reloading pipeline capabilities");
            ws.reload_registry();
            ws.announce_refresh();
        } else {
            ws.view.update_item(&ProjectNode::Project);
        }
    }
}

impl Action<Workspace> for UpdateProjectPropertyAction {
    fn describe(&self) -> String {
        format!("Set project {}", self.property.name())
    }

    fn apply(&mut self, ws: &mut Workspace) -> Result<()> {
        let before = ws.project.state();
        let mut after = before.clone();
        self.property.apply_to(&mut after);

        Self::restore(ws, &after);
        self.before = Some(before);
        Ok(())
    }

    fn revert(&mut self, ws: &mut Workspace) -> Result<()> {
        if let Some(before) = self.before.clone() {
            Self::restore(ws, &before);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing::workspace_in;
    use crate::pipeline::params::Color;
    use crate::project::model::ContentItem;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;
    use test_case::test_case;

    fn with_texture(dir: &std::path::Path) -> Workspace {
        let (mut ws, _) = workspace_in(dir);
        ws.project.items.push(ContentItem::new("hero.png"));
        ws.resolve_item("hero.png");
        ws
    }

    #[test]
    fn test_set_param_converts_and_reverts() {
        let dir = TempDir::new().unwrap();
        let mut ws = with_texture(dir.path());
        let before = ws.project.snapshot();

        let mut action = UpdateProcessorParamAction::new(vec!["hero.png".to_string()], "ColorKeyColor", "0,0,0");
        action.apply(&mut ws).unwrap();
        assert_eq!(
            ws.project.find_item("hero.png").unwrap().processor_params.get("ColorKeyColor"),
            Some(&ParamValue::Color(Color::new(0, 0, 0, 255)))
        );

        action.revert(&mut ws).unwrap();
        assert_eq!(ws.project.snapshot(), before);
    }

    #[test_case("ColorKeyEnabled", "maybe"; "bad bool")]
    #[test_case("NoSuchParam", "1"; "unknown parameter")]
    fn test_set_param_rejects(name: &str, value: &str) {
        let dir = TempDir::new().unwrap();
        let mut ws = with_texture(dir.path());

        let err = UpdateProcessorParamAction::new(vec!["hero.png".to_string()], name, value)
            .apply(&mut ws)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_VALUE");
    }

    #[test]
    fn test_unresolved_processor_stores_raw() {
        let dir = TempDir::new().unwrap();
        let (mut ws, _) = workspace_in(dir.path());
        ws.project
            .items
            .push(ContentItem::new("level.tmx").with_importer("TmxImporter").with_processor("TmxProcessor"));
        ws.resolve_item("level.tmx");

        UpdateProcessorParamAction::new(vec!["level.tmx".to_string()], "Layers", "All")
            .apply(&mut ws)
            .unwrap();
        assert_eq!(
            ws.project.find_item("level.tmx").unwrap().processor_params.get("Layers"),
            Some(&ParamValue::Raw("All".to_string()))
        );
    }

    #[test]
    fn test_copy_clears_processor() {
        let dir = TempDir::new().unwrap();
        let mut ws = with_texture(dir.path());
        let before = ws.project.snapshot();

        let mut action = UpdateContentItemAction::new(
            vec!["hero.png".to_string()],
            ItemChange::BuildAction(BuildAction::Copy),
        );
        action.apply(&mut ws).unwrap();
        let item = ws.project.find_item("hero.png").unwrap();
        assert!(item.processor.is_null());
        assert!(item.processor_params.is_empty());

        action.revert(&mut ws).unwrap();
        assert_eq!(ws.project.snapshot(), before);
        assert!(ws.project.find_item("hero.png").unwrap().processor.is_resolved());
    }

    #[test]
    fn test_project_property_round_trip() {
        let dir = TempDir::new().unwrap();
        let (mut ws, events) = workspace_in(dir.path());
        let before = ws.project.snapshot();

        let mut action = UpdateProjectPropertyAction::new(ProjectProperty::parse("platform", "Android").unwrap());
        action.apply(&mut ws).unwrap();
        assert_eq!(ws.project.platform, TargetPlatform::Android);
        assert_eq!(*events.borrow(), vec!["update <project>"]);

        action.revert(&mut ws).unwrap();
        assert_eq!(ws.project.snapshot(), before);
    }

    #[test]
    fn test_references_reload_registry() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Tiled.json"),
            r#"{
                "importers": [{"type_name": "TmxImporter", "display_name": "Tiled", "file_extensions": [".tmx"], "default_processor": "TmxProcessor", "output_type": "TmxMap"}],
                "processors": [{"type_name": "TmxProcessor", "display_name": "Tiled", "input_type": "TmxMap", "params": []}]
            }"#,
        )
        .unwrap();
        let (mut ws, _) = workspace_in(dir.path());
        ws.project.items.push(ContentItem::new("level.tmx"));
        ws.resolve_item("level.tmx");
        assert!(ws.project.items[0].importer.is_missing());

        let mut action = UpdateProjectPropertyAction::new(ProjectProperty::References(vec!["Tiled.dll".to_string()]));
        action.apply(&mut ws).unwrap();
        assert!(ws.project.items[0].processor.is_resolved());

        action.revert(&mut ws).unwrap();
        assert!(ws.registry.find_importer("TmxImporter").is_none());
    }

    #[test]
    fn test_parse_property() {
        assert_eq!(
            ProjectProperty::parse("references", "a.dll; b.dll;").unwrap(),
            ProjectProperty::References(vec!["a.dll".to_string(), "b.dll".to_string()])
        );
        assert!(ProjectProperty::parse("compress", "yes").is_err());
        assert!(ProjectProperty::parse("colour", "red").is_err());
    }
}
