//! Driving the external build tool
//!
//! - `locate`: finds the tool executable
//! - `runner`: supervised subprocess and its state machine
//! - `output`: classification of the tool's output lines

pub mod locate;
pub mod output;
pub mod runner;

pub use locate::{locate_build_tool, BuildTool, BUILD_TOOL_NAME};
pub use output::{BuildEvent, BuildSummary, OutputParser};
pub use runner::{BuildRequest, BuildRunner, BuildState, TERMINATED_MESSAGE};
