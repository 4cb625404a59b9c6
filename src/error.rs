//! Error handling for Pipeworks
//!
//! Validation failures surface here. Missing importers and processors are
//! not errors; they are carried as sentinel descriptors on the content item.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Pipeworks operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for Pipeworks operations
#[derive(Error, Debug)]
pub enum PipelineError {
    // File Errors
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to read file: {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}: {source}")]
    FileWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    // Project Errors
    #[error("No project is open")]
    NoProjectOpen,

    #[error("Project has never been saved")]
    ProjectNotSaved,

    #[error("Malformed project line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    #[error("Invalid legacy project: {reason}")]
    InvalidLegacyProject { reason: String },

    #[error("Content item not found: {path}")]
    ItemNotFound { path: String },

    #[error("Content item already in project: {path}")]
    DuplicateItem { path: String },

    #[error("Nothing to include")]
    NothingToInclude,

    #[error("Template not found: {name}")]
    TemplateNotFound { name: String },

    #[error("Invalid template {path}: {reason}")]
    InvalidTemplate { path: PathBuf, reason: String },

    #[error("Invalid value for {property}: {value}")]
    InvalidValue { property: String, value: String },

    // Undo/Redo Errors
    #[error("Action cannot be undone: {reason}")]
    Irreversible { reason: String },

    // Capability Errors
    #[error("Invalid capability manifest {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    // Build Errors
    #[error("A build is already running")]
    BuildInProgress,

    #[error("Build tool not found: {name}")]
    BuildToolNotFound { name: String },

    #[error("Operation cancelled")]
    Cancelled,

    // Serialization Errors
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            PipelineError::FileNotFound { .. } => "FILE_NOT_FOUND",
            PipelineError::FileReadError { .. } => "FILE_READ_ERROR",
            PipelineError::FileWriteError { .. } => "FILE_WRITE_ERROR",
            PipelineError::DestinationExists { .. } => "DESTINATION_EXISTS",
            PipelineError::NoProjectOpen => "NO_PROJECT_OPEN",
            PipelineError::ProjectNotSaved => "PROJECT_NOT_SAVED",
            PipelineError::MalformedLine { .. } => "MALFORMED_LINE",
            PipelineError::InvalidLegacyProject { .. } => "INVALID_LEGACY_PROJECT",
            PipelineError::ItemNotFound { .. } => "ITEM_NOT_FOUND",
            PipelineError::DuplicateItem { .. } => "DUPLICATE_ITEM",
            PipelineError::NothingToInclude => "NOTHING_TO_INCLUDE",
            PipelineError::TemplateNotFound { .. } => "TEMPLATE_NOT_FOUND",
            PipelineError::InvalidTemplate { .. } => "INVALID_TEMPLATE",
            PipelineError::InvalidValue { .. } => "INVALID_VALUE",
            PipelineError::Irreversible { .. } => "IRREVERSIBLE",
            PipelineError::InvalidManifest { .. } => "INVALID_MANIFEST",
            PipelineError::BuildInProgress => "BUILD_IN_PROGRESS",
            PipelineError::BuildToolNotFound { .. } => "BUILD_TOOL_NOT_FOUND",
            PipelineError::Cancelled => "CANCELLED",
            PipelineError::Serialization(_) => "SERIALIZATION_ERROR",
            PipelineError::Io(_) => "IO_ERROR",
        }
    }

    /// Whether the user can fix the cause and simply retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::DestinationExists { .. }
                | PipelineError::DuplicateItem { .. }
                | PipelineError::BuildInProgress
                | PipelineError::FileWriteError { .. }
                | PipelineError::ProjectNotSaved
                | PipelineError::Cancelled
        )
    }

    /// Returns a user-friendly recovery suggestion.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            PipelineError::FileNotFound { .. } => Some("Check the file path and try again."),
            PipelineError::DestinationExists { .. } => {
                Some("Choose a different name or remove the existing file first.")
            }
            PipelineError::MalformedLine { .. } => {
                Some("Fix the reported line in the project file and reload.")
            }
            PipelineError::BuildInProgress => {
                Some("Wait for the current build to finish or cancel it.")
            }
            PipelineError::BuildToolNotFound { .. } => {
                Some("Set [builder] executable in pipeworks.toml or add the tool to PATH.")
            }
            PipelineError::ProjectNotSaved => Some("Save the project before building."),
            PipelineError::Irreversible { .. } => {
                Some("Deleted files cannot be restored by undo.")
            }
            _ => None,
        }
    }
}
