//! Build tool output classification
//!
//! The build tool reports progress as plain text, one line at a time.
//! `OutputParser` turns each line into a `BuildEvent`; the only state it keeps
//! is whether the previous classified line was an error, so indented detail
//! lines that follow an error can be attached to it.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// One classified line of build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildEvent {
    /// `Build started <info>`
    BuildBegin { info: String },

    /// `Build N succeeded, N failed[, N skipped].`
    BuildEnd {
        succeeded: u32,
        failed: u32,
        skipped: u32,
    },

    /// `Time elapsed <t>.`
    BuildTime { elapsed: String },

    Cleaning { file: String },

    Skipping { file: String },

    /// Source asset the tool is currently processing.
    BuildAsset { file: String },

    BuildError {
        file: String,
        line: Option<u32>,
        column: Option<u32>,
        code: Option<String>,
        message: String,
    },

    /// Compiler warning reported against a file. Does not fail the asset.
    BuildWarning {
        file: String,
        line: Option<u32>,
        column: Option<u32>,
        code: Option<String>,
        message: String,
    },

    /// Detail line belonging to the preceding error.
    BuildErrorContinue { message: String },

    Unknown { line: String },
}

impl fmt::Display for BuildEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildEvent::BuildBegin { info } => write!(f, "Build started {}", info),
            BuildEvent::BuildEnd {
                succeeded,
                failed,
                skipped,
            } => write!(
                f,
                "Build {} succeeded, {} failed, {} skipped.",
                succeeded, failed, skipped
            ),
            BuildEvent::BuildTime { elapsed } => write!(f, "Time elapsed {}.", elapsed),
            BuildEvent::Cleaning { file } => write!(f, "Cleaning {}", file),
            BuildEvent::Skipping { file } => write!(f, "Skipping {}", file),
            BuildEvent::BuildAsset { file } => write!(f, "{}", file),
            BuildEvent::BuildError {
                file,
                line,
                column,
                message,
                ..
            } => match (line, column) {
                (Some(l), Some(c)) => write!(f, "{}({},{}): error: {}", file, l, c, message),
                (Some(l), None) => write!(f, "{}({}): error: {}", file, l, message),
                _ => write!(f, "{} : error : {}", file, message),
            },
            BuildEvent::BuildWarning {
                file,
                line,
                column,
                message,
                ..
            } => match (line, column) {
                (Some(l), Some(c)) => write!(f, "{}({},{}): warning: {}", file, l, c, message),
                (Some(l), None) => write!(f, "{}({}): warning: {}", file, l, message),
                _ => write!(f, "{} : warning : {}", file, message),
            },
            BuildEvent::BuildErrorContinue { message } => write!(f, "  {}", message),
            BuildEvent::Unknown { line } => write!(f, "{}", line),
        }
    }
}

impl BuildEvent {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            BuildEvent::BuildError { .. } | BuildEvent::BuildErrorContinue { .. }
        )
    }
}

struct Patterns {
    begin: Regex,
    end: Regex,
    time: Regex,
    cleaning: Regex,
    skipping: Regex,
    file_error: Regex,
    file_warning: Regex,
    generic_error: Regex,
    asset: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        begin: Regex::new(r"^Build started\s+(.*?)\s*$").unwrap(),
        end: Regex::new(
            r"^Build (\d+) succeeded, (\d+) failed(?:, (\d+) (?:skipped|up-to-date))?\.?\s*$",
        )
        .unwrap(),
        time: Regex::new(r"^Time elapsed (.+?)\.?\s*$").unwrap(),
        cleaning: Regex::new(r"^Cleaning (.+?)\s*$").unwrap(),
        skipping: Regex::new(r"^Skipping (.+?)\s*$").unwrap(),
        file_error: Regex::new(
            r"^(\S.*?)\((\d+)(?:,(\d+))?[^)]*\)\s*:\s*error(?:\s+([A-Za-z0-9]+))?\s*:\s*(.*?)\s*$",
        )
        .unwrap(),
        file_warning: Regex::new(
            r"^(\S.*?)(?:\((\d+)(?:,(\d+))?[^)]*\))?\s*:\s*warning(?:\s+([A-Za-z0-9]+))?\s*:\s*(.*?)\s*$",
        )
        .unwrap(),
        generic_error: Regex::new(r"^(\S.*?)\s*:\s*error\s*:\s*(.*?)\s*$").unwrap(),
        asset: Regex::new(r"^(?:[A-Za-z]:)?[/\\].*?\S\s*$").unwrap(),
    })
}

/// Stateful line classifier.
#[derive(Debug, Default)]
pub struct OutputParser {
    inside_error: bool,
}

impl OutputParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the last classified line was part of an error.
    pub fn inside_error(&self) -> bool {
        self.inside_error
    }

    /// Forget error state between builds.
    pub fn reset(&mut self) {
        self.inside_error = false;
    }

    /// Classify one line (without its line terminator).
    pub fn parse(&mut self, line: &str) -> BuildEvent {
        let line = line.trim_end_matches(['\r', '\n']);

        match classify(line) {
            Some(event) => {
                self.inside_error = matches!(event, BuildEvent::BuildError { .. });
                event
            }
            None if self.inside_error && !line.trim().is_empty() => BuildEvent::BuildErrorContinue {
                message: line.trim().to_string(),
            },
            None => BuildEvent::Unknown {
                line: line.to_string(),
            },
        }
    }
}

fn classify(line: &str) -> Option<BuildEvent> {
    let p = patterns();

    if let Some(c) = p.begin.captures(line) {
        return Some(BuildEvent::BuildBegin {
            info: c[1].to_string(),
        });
    }

    if let Some(c) = p.end.captures(line) {
        return Some(BuildEvent::BuildEnd {
            succeeded: c[1].parse().unwrap_or(0),
            failed: c[2].parse().unwrap_or(0),
            skipped: c.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0),
        });
    }

    if let Some(c) = p.time.captures(line) {
        return Some(BuildEvent::BuildTime {
            elapsed: c[1].to_string(),
        });
    }

    if let Some(c) = p.cleaning.captures(line) {
        return Some(BuildEvent::Cleaning {
            file: c[1].to_string(),
        });
    }

    if let Some(c) = p.skipping.captures(line) {
        return Some(BuildEvent::Skipping {
            file: c[1].to_string(),
        });
    }

    if let Some(c) = p.file_error.captures(line) {
        return Some(BuildEvent::BuildError {
            file: c[1].trim().to_string(),
            line: c[2].parse().ok(),
            column: c.get(3).and_then(|m| m.as_str().parse().ok()),
            code: c.get(4).map(|m| m.as_str().to_string()),
            message: c[5].to_string(),
        });
    }

    if let Some(c) = p.file_warning.captures(line) {
        return Some(BuildEvent::BuildWarning {
            file: c[1].trim().to_string(),
            line: c.get(2).and_then(|m| m.as_str().parse().ok()),
            column: c.get(3).and_then(|m| m.as_str().parse().ok()),
            code: c.get(4).map(|m| m.as_str().to_string()),
            message: c[5].to_string(),
        });
    }

    if let Some(c) = p.generic_error.captures(line) {
        return Some(BuildEvent::BuildError {
            file: c[1].to_string(),
            line: None,
            column: None,
            code: None,
            message: c[2].to_string(),
        });
    }

    if p.asset.is_match(line) {
        return Some(BuildEvent::BuildAsset {
            file: line.trim_end().to_string(),
        });
    }

    None
}

/// Running totals over the events of one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub started: Option<String>,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
    pub elapsed: Option<String>,
    /// Assets reported as processed (including ones that failed).
    pub assets: Vec<String>,
    /// Files that reported an error, in order of first report.
    pub error_files: Vec<String>,
    pub warnings: usize,
    pub cleaned: usize,
}

impl BuildSummary {
    pub fn record(&mut self, event: &BuildEvent) {
        match event {
            BuildEvent::BuildBegin { info } => self.started = Some(info.clone()),
            BuildEvent::BuildEnd {
                succeeded,
                failed,
                skipped,
            } => {
                self.succeeded = *succeeded;
                self.failed = *failed;
                self.skipped = *skipped;
            }
            BuildEvent::BuildTime { elapsed } => self.elapsed = Some(elapsed.clone()),
            BuildEvent::Cleaning { .. } => self.cleaned += 1,
            BuildEvent::BuildWarning { .. } => self.warnings += 1,
            BuildEvent::BuildAsset { file } => self.assets.push(file.clone()),
            BuildEvent::BuildError { file, .. } => {
                if !self.error_files.contains(file) {
                    self.error_files.push(file.clone());
                }
            }
            _ => {}
        }
    }

    /// No failures were reported, either by the totals line or by error lines.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.error_files.is_empty()
    }
}
