//! Foreground facade tying the project, its history, builds and the watcher together
//!
//! A front end talks only to [`Controller`]. Every mutation becomes an action
//! on the undo stack; builds and file watching run on their own threads and
//! report back through the log sink and the existence channel.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::actions::{
    ActionStack, ExcludeAction, IncludeAction, ItemChange, MoveAction, NewAction, ProjectAction,
    ProjectProperty, UpdateContentItemAction, UpdateProcessorParamAction,
    UpdateProjectPropertyAction, Workspace,
};
use crate::build::{locate_build_tool, BuildRequest, BuildRunner, BuildState, BuildSummary};
use crate::config::PipeworksConfig;
use crate::error::{PipelineError, Result};
use crate::history::History;
use crate::persist::{self, write_filtered};
use crate::pipeline::registry::PipelineRegistry;
use crate::project::model::{rebase_path, Project, ProjectNode, PROJECT_EXTENSION};
use crate::project::{load_templates, ContentItemTemplate, Selection};
use crate::view::{LogSink, Prompt, ProjectView, SaveChoice};
use crate::watcher::{ExistenceWatcher, WatchEntry};

pub struct Controller {
    config: PipeworksConfig,
    workspace: Workspace,
    open: bool,
    dirty: bool,
    actions: ActionStack<Workspace>,
    selection: Selection,
    runner: BuildRunner,
    watcher: ExistenceWatcher,
    templates: Vec<ContentItemTemplate>,
    log: Arc<dyn LogSink>,
    prompt: Box<dyn Prompt>,
    history: Option<History>,
}

impl Controller {
    pub fn new(
        config: PipeworksConfig,
        view: Box<dyn ProjectView>,
        log: Arc<dyn LogSink>,
        prompt: Box<dyn Prompt>,
    ) -> Self {
        let watcher = ExistenceWatcher::new(config.watcher.interval());
        Self {
            config,
            workspace: Workspace::new(Project::new(), PipelineRegistry::with_defaults(), view),
            open: false,
            dirty: false,
            actions: ActionStack::default(),
            selection: Selection::new(),
            runner: BuildRunner::new(),
            watcher,
            templates: Vec::new(),
            log,
            prompt,
            history: None,
        }
    }

    /// Record opened and saved projects in `history`.
    pub fn with_history(mut self, mut history: History) -> Self {
        history.max_recent = self.config.history.max_recent;
        self.history = Some(history);
        self
    }

    // --- Accessors ---

    pub fn config(&self) -> &PipeworksConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The open project, if any.
    pub fn project(&self) -> Option<&Project> {
        self.open.then_some(&self.workspace.project)
    }

    /// Unsaved changes exist.
    pub fn is_dirty(&self) -> bool {
        self.open && self.dirty
    }

    pub fn registry(&self) -> &PipelineRegistry {
        &self.workspace.registry
    }

    pub fn actions(&self) -> &ActionStack<Workspace> {
        &self.actions
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn templates(&self) -> &[ContentItemTemplate] {
        &self.templates
    }

    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    pub fn watcher(&self) -> &ExistenceWatcher {
        &self.watcher
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(PipelineError::NoProjectOpen)
        }
    }

    // --- Project lifecycle ---

    /// Ask where to create a new project, then create it.
    pub fn new_project(&mut self) -> Result<bool> {
        if !self.ask_save_if_dirty()? {
            return Ok(false);
        }
        let suggested = self.workspace.project.base_dir().join(format!("Content.{}", PROJECT_EXTENSION));
        match self.prompt.ask_path("New Project", Some(&suggested)) {
            Some(path) => self.new_project_at(&path),
            None => Ok(false),
        }
    }

    /// Create and save an empty project at `path`.
    pub fn new_project_at(&mut self, path: &Path) -> Result<bool> {
        if !self.ask_save_if_dirty()? {
            return Ok(false);
        }
        let path = with_project_extension(path);
        let project = Project::with_origin(&path);
        project.save()?;
        info!("Created project {}", path.display());
        self.install(project, false);
        Ok(true)
    }

    pub fn open_project(&mut self, path: &Path) -> Result<bool> {
        if !self.ask_save_if_dirty()? {
            return Ok(false);
        }
        let project = Project::load(path)?;
        info!("Opened project {}", path.display());
        self.install(project, false);
        Ok(true)
    }

    /// Import a legacy project as a new, unsaved project next to it.
    ///
    /// Refuses when a project file already sits at that location.
    pub fn import_legacy(&mut self, path: &Path) -> Result<bool> {
        let origin = path.with_extension(PROJECT_EXTENSION);
        if origin.exists() {
            return Err(PipelineError::DestinationExists { path: origin });
        }
        self.install_legacy(path, origin)
    }

    /// Import a legacy project and save it straight to `dest`.
    pub fn import_legacy_to(&mut self, path: &Path, dest: &Path) -> Result<bool> {
        if !self.install_legacy(path, path.with_extension(PROJECT_EXTENSION))? {
            return Ok(false);
        }
        self.save_project_to(dest)
    }

    fn install_legacy(&mut self, path: &Path, origin: PathBuf) -> Result<bool> {
        if !self.ask_save_if_dirty()? {
            return Ok(false);
        }
        let mut project = persist::import_legacy(path)?;
        project.origin = Some(origin);
        self.install(project, true);
        Ok(true)
    }

    /// Close the open project. Returns false if the user cancelled.
    pub fn close_project(&mut self) -> Result<bool> {
        if !self.open {
            return Ok(true);
        }
        if !self.ask_save_if_dirty()? {
            return Ok(false);
        }

        self.runner.cancel();
        self.runner.wait();
        self.watcher.stop();
        self.watcher.set_items(Vec::new());
        let _ = self.watcher.drain();

        self.workspace.view.begin_update();
        self.workspace.view.remove_item(&ProjectNode::Project);
        self.workspace.view.end_update();

        info!("Closed project {}", self.workspace.project.name());
        self.workspace.project = Project::new();
        self.workspace.registry = PipelineRegistry::with_defaults();
        self.actions.clear();
        self.selection.clear();
        self.templates.clear();
        self.open = false;
        self.dirty = false;
        Ok(true)
    }

    /// Save to the current location, asking for one if the project never had one.
    pub fn save_project(&mut self) -> Result<bool> {
        self.ensure_open()?;
        if self.workspace.project.origin.is_none() {
            return self.save_project_as();
        }
        self.workspace.project.save()?;
        self.dirty = false;
        debug!("Saved {}", self.workspace.project.name());
        self.remember_recent();
        Ok(true)
    }

    /// Ask for a location and save there.
    pub fn save_project_as(&mut self) -> Result<bool> {
        self.ensure_open()?;
        let suggested = self.workspace.project.origin.clone();
        match self.prompt.ask_path("Save Project As", suggested.as_deref()) {
            Some(path) => self.save_project_to(&path),
            None => Ok(false),
        }
    }

    pub fn save_project_to(&mut self, path: &Path) -> Result<bool> {
        self.ensure_open()?;
        let path = with_project_extension(path);
        let moved = self.workspace.project.origin.as_deref() != Some(path.as_path());
        self.workspace.project.save_as(&path)?;
        self.dirty = false;
        info!("Saved project as {}", path.display());

        if moved {
            self.workspace.reload_registry();
            self.refresh_existence();
            self.workspace.announce_refresh();
            self.reload_templates();
            self.sync_watcher();
        }
        self.remember_recent();
        Ok(true)
    }

    fn ask_save_if_dirty(&mut self) -> Result<bool> {
        if !self.is_dirty() {
            return Ok(true);
        }
        match self.prompt.ask_save_or_cancel() {
            SaveChoice::Save => self.save_project(),
            SaveChoice::Discard => Ok(true),
            SaveChoice::Cancel => Ok(false),
        }
    }

    fn install(&mut self, project: Project, dirty: bool) {
        if self.open {
            self.watcher.stop();
            self.workspace.view.begin_update();
            self.workspace.view.remove_item(&ProjectNode::Project);
            self.workspace.view.end_update();
        }

        self.workspace.project = project;
        self.workspace.reload_registry();
        self.refresh_existence();
        self.actions.clear();
        self.selection.clear();
        self.open = true;
        self.dirty = dirty;

        self.reload_templates();
        self.workspace.announce_all();
        let _ = self.watcher.drain();
        self.sync_watcher();
        if self.config.watcher.enabled {
            self.watcher.start();
        }
        if !dirty {
            self.remember_recent();
        }
    }

    fn refresh_existence(&mut self) {
        let base = self.workspace.project.base_dir();
        for item in &mut self.workspace.project.items {
            item.exists = base.join(&item.source_file).exists();
        }
    }

    fn remember_recent(&mut self) {
        let (Some(history), Some(origin)) = (self.history.as_mut(), self.workspace.project.origin.as_ref()) else {
            return;
        };
        history.add_recent(origin.clone());
        if let Err(e) = history.save() {
            warn!("Failed to save history: {}", e);
        }
    }

    // --- Templates ---

    /// Reload templates from the project directory and the global directory.
    pub fn reload_templates(&mut self) {
        let mut dirs = Vec::new();
        if self.workspace.project.origin.is_some() {
            dirs.push(self.workspace.project.base_dir());
        }
        if let Some(global) = self.config.templates.global_dir() {
            dirs.push(global);
        }
        self.templates = load_templates(&dirs);
        debug!("{} templates available", self.templates.len());
    }

    pub fn find_template(&self, label: &str) -> Option<&ContentItemTemplate> {
        self.templates
            .iter()
            .find(|t| t.label.eq_ignore_ascii_case(label))
    }

    // --- Actions ---

    fn execute(&mut self, action: ProjectAction) -> Result<()> {
        self.ensure_open()?;
        self.actions.execute(action, &mut self.workspace)?;
        self.after_change();
        Ok(())
    }

    fn after_change(&mut self) {
        self.dirty = true;
        let project = &self.workspace.project;
        self.selection.retain(|node| match node {
            ProjectNode::Project => true,
            ProjectNode::Content(path) => project.contains_item(path),
            ProjectNode::Folder(path) => project.is_folder(path),
        });
        self.sync_watcher();
    }

    /// Add files to the project.
    pub fn include(&mut self, files: &[PathBuf]) -> Result<()> {
        self.ensure_open()?;
        let action = IncludeAction::new(
            &self.workspace.project,
            files,
            &[],
            self.config.include.duplicates,
        );
        self.execute(Box::new(action))
    }

    /// Add every file below `dir`, keeping empty subfolders as folders.
    pub fn include_folder(&mut self, dir: &Path) -> Result<()> {
        self.ensure_open()?;
        let action = IncludeAction::from_directory(
            &self.workspace.project,
            dir,
            self.config.include.duplicates,
        );
        self.execute(Box::new(action))
    }

    /// Remove items and folders. Deleting from disk needs confirmation.
    pub fn exclude(&mut self, items: Vec<String>, folders: Vec<String>, delete: bool) -> Result<bool> {
        self.ensure_open()?;
        if delete {
            let count = items.len() + folders.len();
            let message = format!(
                "Delete {} selected entr{} from disk? This cannot be undone.",
                count,
                if count == 1 { "y" } else { "ies" }
            );
            if !self.prompt.confirm(&message) {
                return Ok(false);
            }
        }
        self.execute(Box::new(ExcludeAction::new(items, folders, delete)))?;
        Ok(true)
    }

    /// Exclude whatever is selected.
    pub fn exclude_selected(&mut self, delete: bool) -> Result<bool> {
        let mut items = Vec::new();
        let mut folders = Vec::new();
        for node in self.selection.nodes() {
            match node {
                ProjectNode::Content(path) => items.push(path.clone()),
                ProjectNode::Folder(path) => folders.push(path.clone()),
                ProjectNode::Project => {}
            }
        }
        if items.is_empty() && folders.is_empty() {
            return Ok(false);
        }
        self.exclude(items, folders, delete)
    }

    pub fn move_item(&mut self, from: &str, to: &str) -> Result<bool> {
        self.ensure_open()?;
        if !self.prompt.confirm(&format!("Move {} to {}?", from, to)) {
            return Ok(false);
        }
        let action = MoveAction::item(from, to);
        self.execute(Box::new(action))?;

        let (from, to) = (from.to_string(), to.to_string());
        self.selection.rename(|node| match node {
            ProjectNode::Content(p) if *p == from => Some(ProjectNode::Content(to.clone())),
            _ => None,
        });
        Ok(true)
    }

    pub fn move_folder(&mut self, from: &str, to: &str) -> Result<bool> {
        self.ensure_open()?;
        if !self.prompt.confirm(&format!("Move folder {} to {}?", from, to)) {
            return Ok(false);
        }
        self.execute(Box::new(MoveAction::folder(from, to)))?;

        let (from, to) = (from.to_string(), to.to_string());
        self.selection.rename(|node| match node {
            ProjectNode::Content(p) => rebase_path(p, &from, &to).map(ProjectNode::Content),
            ProjectNode::Folder(p) => rebase_path(p, &from, &to).map(ProjectNode::Folder),
            ProjectNode::Project => None,
        });
        Ok(true)
    }

    /// Rename the project script in its directory.
    pub fn rename_project(&mut self, new_name: &str) -> Result<bool> {
        self.ensure_open()?;
        let origin = self
            .workspace
            .project
            .origin
            .clone()
            .ok_or(PipelineError::ProjectNotSaved)?;
        if !self.prompt.confirm(&format!("Rename project to {}?", new_name)) {
            return Ok(false);
        }
        self.execute(Box::new(MoveAction::project(origin, new_name)))?;
        self.remember_recent();
        Ok(true)
    }

    /// Create `<location>/<name>` from the template labelled `label`.
    pub fn new_item(&mut self, label: &str, location: &str, name: &str) -> Result<String> {
        self.ensure_open()?;
        let template = self
            .find_template(label)
            .cloned()
            .ok_or_else(|| PipelineError::TemplateNotFound {
                name: label.to_string(),
            })?;
        let action = NewAction::new(template, location, name);
        let path = action.path().to_string();
        self.execute(Box::new(action))?;
        Ok(path)
    }

    pub fn set_property(&mut self, property: ProjectProperty) -> Result<()> {
        self.execute(Box::new(UpdateProjectPropertyAction::new(property)))
    }

    pub fn set_param(&mut self, paths: Vec<String>, name: &str, value: &str) -> Result<()> {
        self.execute(Box::new(UpdateProcessorParamAction::new(paths, name, value)))
    }

    pub fn set_item(&mut self, paths: Vec<String>, change: ItemChange) -> Result<()> {
        self.execute(Box::new(UpdateContentItemAction::new(paths, change)))
    }

    /// Undo the most recent action. Failures are reported through the prompt.
    pub fn undo(&mut self) -> Option<String> {
        match self.actions.undo(&mut self.workspace) {
            Ok(Some(description)) => {
                self.after_change();
                Some(description)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Undo failed: {}", e);
                self.prompt.show_error("Undo", &e.to_string());
                self.sync_watcher();
                None
            }
        }
    }

    pub fn redo(&mut self) -> Option<String> {
        match self.actions.redo(&mut self.workspace) {
            Ok(Some(description)) => {
                self.after_change();
                Some(description)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Redo failed: {}", e);
                self.prompt.show_error("Redo", &e.to_string());
                self.sync_watcher();
                None
            }
        }
    }

    // --- Builds ---

    pub fn build_state(&self) -> BuildState {
        self.runner.state()
    }

    pub fn build_summary(&self) -> BuildSummary {
        self.runner.summary()
    }

    /// Build the whole project. Returns false if the user backed out.
    pub fn build(&mut self, rebuild: bool) -> Result<bool> {
        if !self.prepare_build()? {
            return Ok(false);
        }
        let tool = locate_build_tool(&self.config.builder)?;
        let project = &self.workspace.project;
        let script = project
            .origin
            .as_deref()
            .and_then(Path::file_name)
            .map(PathBuf::from)
            .ok_or(PipelineError::ProjectNotSaved)?;
        let request = BuildRequest::build(
            tool,
            &script,
            project.base_dir(),
            rebuild,
            self.config.builder.launch_debugger,
        );
        self.start_build(request)
    }

    /// Delete built and intermediate output.
    pub fn clean(&mut self) -> Result<bool> {
        self.ensure_open()?;
        let project = &self.workspace.project;
        let message = format!(
            "Delete built content in {} and {}?",
            project.output_dir, project.intermediate_dir
        );
        if !self.prompt.confirm(&message) {
            return Ok(false);
        }
        if !self.prepare_build()? {
            return Ok(false);
        }
        let tool = locate_build_tool(&self.config.builder)?;
        let project = &self.workspace.project;
        let request = BuildRequest::clean(
            tool,
            project.base_dir(),
            &project.intermediate_dir,
            &project.output_dir,
        );
        self.start_build(request)
    }

    /// Rebuild only `paths`, through a temporary partial script.
    pub fn rebuild_items(&mut self, paths: &[String]) -> Result<bool> {
        self.ensure_open()?;
        for path in paths {
            self.workspace.project.item(path)?;
        }
        if paths.is_empty() {
            return Ok(false);
        }
        if !self.prepare_build()? {
            return Ok(false);
        }
        let tool = locate_build_tool(&self.config.builder)?;

        let project = &self.workspace.project;
        let base_dir = project.base_dir();
        let mut script = tempfile::Builder::new()
            .prefix("pipeworks-")
            .suffix(&format!(".{}", PROJECT_EXTENSION))
            .tempfile_in(&base_dir)?;
        script
            .write_all(write_filtered(project, paths).as_bytes())
            .map_err(|e| PipelineError::FileWriteError {
                path: script.path().to_path_buf(),
                source: e,
            })?;

        let request = BuildRequest::items(tool, script, base_dir, self.config.builder.launch_debugger);
        self.start_build(request)
    }

    /// Rebuild the selected content items.
    pub fn rebuild_selected(&mut self) -> Result<bool> {
        let paths = self.selection.content_paths();
        self.rebuild_items(&paths)
    }

    /// Kill the running build, if any.
    pub fn cancel_build(&self) {
        self.runner.cancel();
    }

    /// Wait for the running build and return how it ended.
    pub fn wait_build(&mut self) -> BuildState {
        self.runner.wait()
    }

    fn prepare_build(&mut self) -> Result<bool> {
        self.ensure_open()?;
        if self.runner.is_running() {
            return Err(PipelineError::BuildInProgress);
        }
        let saved = self
            .workspace
            .project
            .origin
            .as_deref()
            .map(Path::exists)
            .unwrap_or(false);
        if self.dirty || !saved {
            match self.prompt.ask_save_or_cancel() {
                SaveChoice::Save => {
                    if !self.save_project()? {
                        return Ok(false);
                    }
                }
                SaveChoice::Discard | SaveChoice::Cancel => return Ok(false),
            }
        }
        Ok(true)
    }

    fn start_build(&mut self, request: BuildRequest) -> Result<bool> {
        self.runner.start(request, Arc::clone(&self.log))?;
        Ok(true)
    }

    // --- Existence ---

    fn sync_watcher(&self) {
        let project = &self.workspace.project;
        let entries = project
            .items
            .iter()
            .map(|item| {
                WatchEntry::new(
                    item.source_file.clone(),
                    project.absolute_path(&item.source_file),
                    item.exists,
                )
            })
            .collect();
        self.watcher.set_items(entries);
    }

    /// Apply file appearance/disappearance reported by the watcher.
    pub fn apply_existence_changes(&mut self) -> usize {
        let changes = self.watcher.drain();
        let mut applied = 0;

        for change in changes {
            let Some(item) = self.workspace.project.find_item_mut(&change.path) else {
                continue;
            };
            if item.exists == change.exists {
                continue;
            }
            item.exists = change.exists;
            self.workspace
                .view
                .update_item(&ProjectNode::Content(change.path.clone()));
            applied += 1;
        }
        applied
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("open", &self.open)
            .field("dirty", &self.dirty)
            .field("workspace", &self.workspace)
            .field("build", &self.runner.state())
            .finish()
    }
}

fn with_project_extension(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(PROJECT_EXTENSION)
    }
}
