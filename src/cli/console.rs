//! Terminal implementations of the collaborator traits

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::build::output::BuildEvent;
use crate::project::model::ProjectNode;
use crate::view::{LogSink, ProjectView, Prompt, SaveChoice};

/// Build output to stdout, errors to stderr.
#[derive(Debug, Default)]
pub struct ConsoleLog;

impl LogSink for ConsoleLog {
    fn append(&self, text: &str) {
        println!("{}", text);
    }

    fn event(&self, event: &BuildEvent, line: &str) {
        if event.is_error() {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

/// Tree changes are only interesting when debugging.
#[derive(Debug, Default)]
pub struct LoggingView;

impl ProjectView for LoggingView {
    fn add_item(&mut self, node: &ProjectNode) {
        debug!("+ {}", node);
    }

    fn remove_item(&mut self, node: &ProjectNode) {
        debug!("- {}", node);
    }

    fn update_item(&mut self, node: &ProjectNode) {
        debug!("~ {}", node);
    }
}

/// Asks on stdin, or answers yes to everything with `assume_yes`.
#[derive(Debug, Default)]
pub struct ConsolePrompt {
    pub assume_yes: bool,
}

impl ConsolePrompt {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    fn read_answer(question: &str) -> String {
        print!("{} ", question);
        let _ = io::stdout().flush();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => line.trim().to_string(),
            Err(_) => String::new(),
        }
    }
}

impl Prompt for ConsolePrompt {
    fn ask_save_or_cancel(&mut self) -> SaveChoice {
        if self.assume_yes {
            return SaveChoice::Save;
        }
        match Self::read_answer("Save changes first? [y]es/[n]o/[C]ancel:")
            .to_ascii_lowercase()
            .as_str()
        {
            "y" | "yes" => SaveChoice::Save,
            "n" | "no" => SaveChoice::Discard,
            _ => SaveChoice::Cancel,
        }
    }

    fn ask_path(&mut self, title: &str, suggested: Option<&Path>) -> Option<PathBuf> {
        if self.assume_yes {
            return suggested.map(Path::to_path_buf);
        }
        let hint = suggested
            .map(|p| format!(" [{}]", p.display()))
            .unwrap_or_default();
        let answer = Self::read_answer(&format!("{}{}:", title, hint));
        if answer.is_empty() {
            suggested.map(Path::to_path_buf)
        } else {
            Some(PathBuf::from(answer))
        }
    }

    fn confirm(&mut self, message: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        matches!(
            Self::read_answer(&format!("{} [y/N]", message))
                .to_ascii_lowercase()
                .as_str(),
            "y" | "yes"
        )
    }

    fn show_error(&mut self, title: &str, message: &str) {
        eprintln!("{}: {}", title, message);
    }
}
