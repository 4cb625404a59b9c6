//! Project data model
//!
//! A project is a flat, ordered list of content items plus the global build
//! properties written at the top of the project script. Folders exist only
//! as virtual nodes so empty directories still show up in the tree.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::pipeline::params::ParamMap;
use crate::pipeline::registry::{ImporterDescriptor, ProcessorDescriptor};

/// Default output directory for new projects.
pub const DEFAULT_OUTPUT_DIR: &str = "bin/$(Platform)";
/// Default intermediate directory for new projects.
pub const DEFAULT_INTERMEDIATE_DIR: &str = "obj/$(Platform)";
/// Project script extension.
pub const PROJECT_EXTENSION: &str = "mgcb";

/// Whether an item is transformed by the pipeline or copied verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildAction {
    #[default]
    Build,
    Copy,
}

impl fmt::Display for BuildAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildAction::Build => write!(f, "Build"),
            BuildAction::Copy => write!(f, "Copy"),
        }
    }
}

impl FromStr for BuildAction {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "build" => Ok(BuildAction::Build),
            "copy" => Ok(BuildAction::Copy),
            _ => Err(PipelineError::InvalidValue {
                property: "BuildAction".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

macro_rules! named_enum {
    ($(#[$meta:meta])* $name:ident, $property:literal, default = $default:ident, [$($variant:ident),+ $(,)?]) => {
        $(#[$meta])*
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $($name::$variant => f.write_str(stringify!($variant))),+
                }
            }
        }

        impl FromStr for $name {
            type Err = PipelineError;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.to_string().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| PipelineError::InvalidValue {
                        property: $property.to_string(),
                        value: s.to_string(),
                    })
            }
        }
    };
}

named_enum!(
    /// Platform the content is built for.
    TargetPlatform,
    "Platform",
    default = DesktopGL,
    [
        Windows,
        DesktopGL,
        MacOSX,
        iOS,
        Android,
        WindowsStoreApp,
        RaspberryPi,
        PlayStation4,
        PSVita,
        XboxOne,
        Switch,
        Web,
    ]
);

named_enum!(
    /// Graphics feature level the content targets.
    GraphicsProfile,
    "Profile",
    default = Reach,
    [Reach, HiDef]
);

/// Outcome of binding a persisted importer/processor name to a descriptor.
#[derive(Debug, Clone)]
pub enum Binding<T> {
    /// Not applicable (copy items) or not resolved yet.
    Null,
    Resolved(Arc<T>),
    /// The name is not known to the registry; the original name is kept.
    Missing(String),
}

impl<T> Binding<T> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Binding::Resolved(_))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Binding::Missing(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Binding::Null)
    }

    pub fn descriptor(&self) -> Option<&Arc<T>> {
        match self {
            Binding::Resolved(d) => Some(d),
            _ => None,
        }
    }
}

impl<T> Default for Binding<T> {
    fn default() -> Self {
        Binding::Null
    }
}

/// One source file tracked by the project.
#[derive(Debug, Clone)]
pub struct ContentItem {
    /// Path relative to the project directory, `/` separated.
    pub source_file: String,

    pub build_action: BuildAction,

    /// Importer type name as persisted (may be empty until resolved).
    pub importer_name: String,

    /// Processor type name as persisted (may be empty until resolved).
    pub processor_name: String,

    pub processor_params: ParamMap,

    /// Derived by type resolution, never persisted.
    pub importer: Binding<ImporterDescriptor>,

    /// Derived by type resolution, never persisted.
    pub processor: Binding<ProcessorDescriptor>,

    /// Whether the source file was present on disk at the last check.
    pub exists: bool,
}

impl ContentItem {
    /// New item to be built, with importer and processor left for resolution.
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            source_file: normalize_path(&source_file.into()),
            build_action: BuildAction::Build,
            importer_name: String::new(),
            processor_name: String::new(),
            processor_params: ParamMap::new(),
            importer: Binding::Null,
            processor: Binding::Null,
            exists: true,
        }
    }

    /// New item copied verbatim to the output.
    pub fn new_copy(source_file: impl Into<String>) -> Self {
        let mut item = Self::new(source_file);
        item.build_action = BuildAction::Copy;
        item
    }

    pub fn with_importer(mut self, name: impl Into<String>) -> Self {
        self.importer_name = name.into();
        self
    }

    pub fn with_processor(mut self, name: impl Into<String>) -> Self {
        self.processor_name = name.into();
        self
    }

    /// File name component of the source path.
    pub fn name(&self) -> &str {
        self.source_file
            .rsplit('/')
            .next()
            .unwrap_or(&self.source_file)
    }

    /// Folder part of the source path, empty for items at the project root.
    pub fn location(&self) -> &str {
        match self.source_file.rfind('/') {
            Some(idx) => &self.source_file[..idx],
            None => "",
        }
    }

    /// Lower-case extension including the dot, empty if none.
    pub fn extension(&self) -> String {
        Path::new(&self.source_file)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
            .unwrap_or_default()
    }

    /// Whether the item lives below `folder` (at any depth).
    pub fn is_under(&self, folder: &str) -> bool {
        is_under(&self.source_file, folder)
    }

    /// Capture the persisted fields.
    pub fn state(&self) -> ContentItemState {
        ContentItemState {
            source_file: self.source_file.clone(),
            build_action: self.build_action,
            importer_name: self.importer_name.clone(),
            processor_name: self.processor_name.clone(),
            processor_params: self.processor_params.clone(),
        }
    }

    /// Restore persisted fields. Bindings are left for the caller to re-resolve.
    pub fn apply_state(&mut self, state: &ContentItemState) {
        self.source_file = state.source_file.clone();
        self.build_action = state.build_action;
        self.importer_name = state.importer_name.clone();
        self.processor_name = state.processor_name.clone();
        self.processor_params = state.processor_params.clone();
    }
}

/// Value snapshot of a content item's persisted fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentItemState {
    pub source_file: String,
    pub build_action: BuildAction,
    pub importer_name: String,
    pub processor_name: String,
    pub processor_params: ParamMap,
}

impl ContentItemState {
    /// Rebuild an item from a snapshot (bindings unresolved).
    pub fn to_item(&self) -> ContentItem {
        let mut item = ContentItem::new(self.source_file.clone());
        item.apply_state(self);
        item
    }
}

/// Virtual folder node, kept so empty directories stay visible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirectoryItem {
    pub path: String,
}

impl DirectoryItem {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: normalize_path(&path.into()),
        }
    }

    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// A node of the project tree, identified by path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProjectNode {
    /// The project root.
    Project,
    Content(String),
    Folder(String),
}

impl ProjectNode {
    /// Path identifying the node; empty for the project root.
    pub fn path(&self) -> &str {
        match self {
            ProjectNode::Project => "",
            ProjectNode::Content(p) | ProjectNode::Folder(p) => p,
        }
    }
}

impl fmt::Display for ProjectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectNode::Project => write!(f, "<project>"),
            ProjectNode::Content(p) => write!(f, "{}", p),
            ProjectNode::Folder(p) => write!(f, "{}/", p),
        }
    }
}

/// Value snapshot of the project-wide properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectState {
    pub output_dir: String,
    pub intermediate_dir: String,
    pub platform: TargetPlatform,
    pub profile: GraphicsProfile,
    pub config: String,
    pub compress: bool,
    pub references: Vec<String>,
}

/// Complete value snapshot of a project, for comparisons in tests and undo checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSnapshot {
    pub properties: ProjectState,
    pub items: Vec<ContentItemState>,
    pub folders: Vec<String>,
}

/// Main project state.
#[derive(Debug, Clone)]
pub struct Project {
    /// Path to the project script; `None` until first saved.
    pub origin: Option<PathBuf>,

    pub output_dir: String,
    pub intermediate_dir: String,
    pub platform: TargetPlatform,
    pub profile: GraphicsProfile,
    pub config: String,
    pub compress: bool,

    /// Assembly references, in script order.
    pub references: Vec<String>,

    /// Content items, in script order.
    pub items: Vec<ContentItem>,

    /// Virtual folders (not persisted).
    pub folders: Vec<DirectoryItem>,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    /// Create an empty, unsaved project.
    pub fn new() -> Self {
        Self {
            origin: None,
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            intermediate_dir: DEFAULT_INTERMEDIATE_DIR.to_string(),
            platform: TargetPlatform::default(),
            profile: GraphicsProfile::default(),
            config: String::new(),
            compress: false,
            references: Vec::new(),
            items: Vec::new(),
            folders: Vec::new(),
        }
    }

    /// Create an empty project bound to a script path.
    pub fn with_origin(path: impl Into<PathBuf>) -> Self {
        let mut project = Self::new();
        project.origin = Some(path.into());
        project
    }

    /// Directory every relative path resolves against.
    ///
    /// Falls back to the current directory for a project that was never saved.
    pub fn base_dir(&self) -> PathBuf {
        self.origin
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Display name (script file stem).
    pub fn name(&self) -> String {
        self.origin
            .as_deref()
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Untitled".to_string())
    }

    /// Absolute location of a project-relative path.
    pub fn absolute_path(&self, relative: &str) -> PathBuf {
        self.base_dir().join(relative)
    }

    /// Project-relative, `/` separated form of any path.
    ///
    /// Absolute paths outside the project directory come back with `..` segments.
    pub fn relative_path(&self, path: &Path) -> String {
        if path.is_relative() {
            return normalize_path(&path.to_string_lossy());
        }
        let base = self.base_dir();
        let base = if base.is_absolute() {
            base
        } else {
            std::env::current_dir().map(|cwd| cwd.join(&base)).unwrap_or(base)
        };
        normalize_path(&relative_to(&base, path).to_string_lossy())
    }

    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.items.iter().position(|i| i.source_file == path)
    }

    pub fn contains_item(&self, path: &str) -> bool {
        self.index_of(path).is_some()
    }

    pub fn find_item(&self, path: &str) -> Option<&ContentItem> {
        self.items.iter().find(|i| i.source_file == path)
    }

    pub fn find_item_mut(&mut self, path: &str) -> Option<&mut ContentItem> {
        self.items.iter_mut().find(|i| i.source_file == path)
    }

    /// Item lookup that fails with `ItemNotFound`.
    pub fn item(&self, path: &str) -> Result<&ContentItem> {
        self.find_item(path).ok_or_else(|| PipelineError::ItemNotFound {
            path: path.to_string(),
        })
    }

    /// Insert at `index`, clamped to the end of the list.
    pub fn insert_item(&mut self, index: usize, item: ContentItem) {
        let index = index.min(self.items.len());
        self.items.insert(index, item);
    }

    /// Remove an item by path, returning its former index.
    pub fn remove_item(&mut self, path: &str) -> Option<(usize, ContentItem)> {
        let idx = self.index_of(path)?;
        Some((idx, self.items.remove(idx)))
    }

    /// Paths of every item below a folder.
    pub fn items_under(&self, folder: &str) -> Vec<String> {
        self.items
            .iter()
            .filter(|i| i.is_under(folder))
            .map(|i| i.source_file.clone())
            .collect()
    }

    pub fn has_folder(&self, path: &str) -> bool {
        self.folders.iter().any(|f| f.path == path)
    }

    /// Whether `path` names a folder, either virtual or implied by item paths.
    pub fn is_folder(&self, path: &str) -> bool {
        self.has_folder(path) || self.items.iter().any(|i| i.is_under(path))
    }

    /// Add a virtual folder; returns false if it was already present.
    pub fn add_folder(&mut self, path: &str) -> bool {
        let path = normalize_path(path);
        if path.is_empty() || self.has_folder(&path) {
            return false;
        }
        self.folders.push(DirectoryItem::new(path));
        true
    }

    /// Remove a virtual folder, returning its former index.
    pub fn remove_folder(&mut self, path: &str) -> Option<(usize, DirectoryItem)> {
        let idx = self.folders.iter().position(|f| f.path == path)?;
        Some((idx, self.folders.remove(idx)))
    }

    /// Capture the project-wide properties.
    pub fn state(&self) -> ProjectState {
        ProjectState {
            output_dir: self.output_dir.clone(),
            intermediate_dir: self.intermediate_dir.clone(),
            platform: self.platform,
            profile: self.profile,
            config: self.config.clone(),
            compress: self.compress,
            references: self.references.clone(),
        }
    }

    /// Restore the project-wide properties.
    pub fn apply_state(&mut self, state: &ProjectState) {
        self.output_dir = state.output_dir.clone();
        self.intermediate_dir = state.intermediate_dir.clone();
        self.platform = state.platform;
        self.profile = state.profile;
        self.config = state.config.clone();
        self.compress = state.compress;
        self.references = state.references.clone();
    }

    /// Full value snapshot of everything a save would write, plus folders.
    pub fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot {
            properties: self.state(),
            items: self.items.iter().map(ContentItem::state).collect(),
            folders: self.folders.iter().map(|f| f.path.clone()).collect(),
        }
    }
}

/// Normalize a project-relative path: `/` separators, no `.` segments, no
/// leading `./` or trailing `/`.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether `path` lies below `folder` (string prefix on whole segments).
pub fn is_under(path: &str, folder: &str) -> bool {
    if folder.is_empty() {
        return true;
    }
    path.len() > folder.len() && path.starts_with(folder) && path.as_bytes()[folder.len()] == b'/'
}

/// Replace the `from` folder prefix of `path` with `to`.
pub fn rebase_path(path: &str, from: &str, to: &str) -> Option<String> {
    if path == from {
        return Some(to.to_string());
    }
    if !is_under(path, from) {
        return None;
    }
    let rest = &path[from.len() + 1..];
    if to.is_empty() {
        Some(rest.to_string())
    } else {
        Some(format!("{}/{}", to, rest))
    }
}

/// Relative path from `base` to `target`, both absolute.
pub fn relative_to(base: &Path, target: &Path) -> PathBuf {
    let base: Vec<Component> = base.components().collect();
    let target: Vec<Component> = target.components().collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..base.len() {
        result.push("..");
    }
    for component in &target[common..] {
        result.push(component.as_os_str());
    }
    result
}
