//! Finding the build tool executable

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::debug;

use crate::config::BuilderConfig;
use crate::error::{PipelineError, Result};

/// Base name of the build tool.
pub const BUILD_TOOL_NAME: &str = "mgcb";

/// Program plus the arguments that always precede the generated ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTool {
    pub program: PathBuf,
    pub leading_args: Vec<String>,
}

impl BuildTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Locate the build tool.
///
/// Search order:
/// 1. `builder.executable` from configuration
/// 2. `builder.search_paths`, relative to the running executable's directory
/// 3. The bare tool name on `PATH`
pub fn locate_build_tool(config: &BuilderConfig) -> Result<BuildTool> {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    locate_from(config, &exe_dir, env::var_os("PATH"))
}

fn locate_from(config: &BuilderConfig, exe_dir: &Path, path_var: Option<OsString>) -> Result<BuildTool> {
    if let Some(exe) = &config.executable {
        debug!("Using configured build tool {}", exe.display());
        return Ok(BuildTool::new(exe).with_args(config.args.iter().cloned()));
    }

    let file_name = format!("{}{}", BUILD_TOOL_NAME, env::consts::EXE_SUFFIX);

    let candidates = config
        .search_paths
        .iter()
        .map(|dir| exe_dir.join(dir).join(&file_name));
    let on_path = path_var
        .iter()
        .flat_map(env::split_paths)
        .map(|dir| dir.join(&file_name));

    candidates
        .chain(on_path)
        .find(|candidate| candidate.is_file())
        .map(|program| {
            debug!("Found build tool at {}", program.display());
            BuildTool::new(program).with_args(config.args.iter().cloned())
        })
        .ok_or_else(|| PipelineError::BuildToolNotFound {
            name: BUILD_TOOL_NAME.to_string(),
        })
}
