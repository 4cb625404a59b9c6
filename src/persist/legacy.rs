//! Import of XNA-style `.contentproj` files
//!
//! Only the handful of elements that describe content are read, with one
//! regular expression per element. Anything else in the file is ignored.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use log::{debug, info};
use regex::Regex;

use crate::error::{PipelineError, Result};
use crate::pipeline::params::ParamValue;
use crate::project::model::{normalize_path, ContentItem, Project};

/// Assemblies that belong to the framework itself and are never referenced explicitly.
const FRAMEWORK_ASSEMBLIES: &[&str] = &["Microsoft.Xna.Framework", "MonoGame.Framework"];

struct Patterns {
    project: Regex,
    reference: Regex,
    compile: Regex,
    content: Regex,
    hint_path: Regex,
    importer: Regex,
    processor: Regex,
    parameter: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        project: Regex::new(r"<Project[\s>]").unwrap(),
        reference: Regex::new(r#"(?s)<Reference\s+Include="([^"]*)"\s*(?:/>|>(.*?)</Reference>)"#).unwrap(),
        compile: Regex::new(r#"(?s)<Compile\s+Include="([^"]*)"\s*(?:/>|>(.*?)</Compile>)"#).unwrap(),
        content: Regex::new(r#"(?s)<Content\s+Include="([^"]*)"\s*(?:/>|>(.*?)</Content>)"#).unwrap(),
        hint_path: Regex::new(r"(?s)<HintPath>\s*(.*?)\s*</HintPath>").unwrap(),
        importer: Regex::new(r"(?s)<Importer>\s*(.*?)\s*</Importer>").unwrap(),
        processor: Regex::new(r"(?s)<Processor>\s*(.*?)\s*</Processor>").unwrap(),
        parameter: Regex::new(r"(?s)<ProcessorParameters_(\w+)>(.*?)</ProcessorParameters_\w+>").unwrap(),
    })
}

/// Read a legacy project file into a new project without an origin.
pub fn import_legacy(path: &Path) -> Result<Project> {
    if !path.exists() {
        return Err(PipelineError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let content = fs::read_to_string(path).map_err(|e| PipelineError::FileReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let project = parse_legacy(&content)?;
    info!(
        "Imported {} ({} items, {} references)",
        path.display(),
        project.items.len(),
        project.references.len()
    );
    Ok(project)
}

/// Parse legacy project XML.
pub fn parse_legacy(xml: &str) -> Result<Project> {
    let p = patterns();
    if !p.project.is_match(xml) {
        return Err(PipelineError::InvalidLegacyProject {
            reason: "no <Project> element".to_string(),
        });
    }

    let mut project = Project::new();

    for caps in p.reference.captures_iter(xml) {
        let include = decode_entities(&caps[1]);
        if FRAMEWORK_ASSEMBLIES.iter().any(|f| include.contains(f)) {
            debug!("Dropping framework reference {}", include);
            continue;
        }

        let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let reference = match p.hint_path.captures(body) {
            Some(hint) => normalize_separators(&decode_entities(&hint[1])),
            None => include.split(',').next().unwrap_or("").trim().to_string(),
        };
        if !reference.is_empty() && !project.references.contains(&reference) {
            project.references.push(reference);
        }
    }

    for caps in p.compile.captures_iter(xml) {
        let source = normalize_path(&decode_entities(&caps[1]));
        let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        let mut item = ContentItem::new(source);
        if let Some(c) = p.importer.captures(body) {
            item.importer_name = decode_entities(&c[1]);
        }
        if let Some(c) = p.processor.captures(body) {
            item.processor_name = decode_entities(&c[1]);
        }
        for c in p.parameter.captures_iter(body) {
            item.processor_params
                .insert(c[1].to_string(), ParamValue::Raw(decode_entities(c[2].trim())));
        }
        push_unique(&mut project, item);
    }

    for caps in p.content.captures_iter(xml) {
        let source = normalize_path(&decode_entities(&caps[1]));
        push_unique(&mut project, ContentItem::new_copy(source));
    }

    Ok(project)
}

fn push_unique(project: &mut Project, item: ContentItem) {
    if !project.contains_item(&item.source_file) {
        project.items.push(item);
    }
}

fn normalize_separators(path: &str) -> String {
    path.trim().replace('\\', "/")
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
