//! Project script reader and writer
//!
//! The script is line oriented. Global properties come first, then
//! references, then one block per content item:
//!
//! ```text
//! #begin Textures/hero.png
//! /importer:TextureImporter
//! /processor:TextureProcessor
//! /processorParam:ColorKeyEnabled=True
//! /build:Textures/hero.png
//! ```
//!
//! `/importer`, `/processor` and `/processorParam` carry forward to every
//! following `/build` until changed; `/processor` clears the parameters.

use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::pipeline::params::{ParamMap, ParamValue};
use crate::project::model::{BuildAction, ContentItem, Project};

const GLOBAL_HEADER: &str =
    "#----------------------------- Global Properties ----------------------------#";
const REFERENCES_HEADER: &str =
    "#-------------------------------- References --------------------------------#";
const CONTENT_HEADER: &str =
    "#---------------------------------- Content ---------------------------------#";

impl Project {
    /// Load a project script. Items are left unresolved.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| PipelineError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut project = parse_script(&content)?;
        project.origin = Some(path.to_path_buf());
        debug!(
            "Loaded {} ({} items, {} references)",
            path.display(),
            project.items.len(),
            project.references.len()
        );
        Ok(project)
    }

    /// Save the project to its origin.
    pub fn save(&self) -> Result<()> {
        let path = self.origin.as_deref().ok_or(PipelineError::ProjectNotSaved)?;
        save_script(&write_script(self), path)
    }

    /// Save the project to a new location and adopt it as origin.
    pub fn save_as(&mut self, path: &Path) -> Result<()> {
        save_script(&write_script(self), path)?;
        self.origin = Some(path.to_path_buf());
        Ok(())
    }
}

fn save_script(content: &str, path: &Path) -> Result<()> {
    fs::write(path, content).map_err(|e| PipelineError::FileWriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Values carried forward from one `/build` to the next.
#[derive(Default)]
struct Carried {
    importer: String,
    processor: String,
    params: ParamMap,
}

/// Parse script text into a project without an origin.
pub fn parse_script(content: &str) -> Result<Project> {
    let mut project = Project::new();
    let mut carried = Carried::default();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let malformed = |reason: String| PipelineError::MalformedLine {
            line: line_no,
            reason,
        };

        let Some(directive) = line.strip_prefix('/') else {
            return Err(malformed(format!("expected a directive, found '{}'", line)));
        };
        let Some((key, value)) = directive.split_once(':') else {
            return Err(malformed(format!("directive '/{}' has no value", directive)));
        };
        let value = unquote(value.trim());

        match key.trim().to_ascii_lowercase().as_str() {
            "outputdir" => project.output_dir = value.to_string(),
            "intermediatedir" => project.intermediate_dir = value.to_string(),
            "platform" => {
                project.platform = value.parse().map_err(|e: PipelineError| malformed(e.to_string()))?
            }
            "profile" => {
                project.profile = value.parse().map_err(|e: PipelineError| malformed(e.to_string()))?
            }
            "config" => project.config = value.to_string(),
            "compress" => {
                project.compress = parse_bool(value)
                    .ok_or_else(|| malformed(format!("'{}' is not True or False", value)))?
            }
            "reference" => project.references.push(value.to_string()),
            "importer" => carried.importer = value.to_string(),
            "processor" => {
                carried.processor = value.to_string();
                carried.params.clear();
            }
            "processorparam" => {
                let Some((name, param)) = value.split_once('=') else {
                    return Err(malformed(format!("parameter '{}' has no '='", value)));
                };
                carried
                    .params
                    .insert(name.trim().to_string(), ParamValue::Raw(unquote(param.trim()).to_string()));
            }
            "build" => {
                let mut item = ContentItem::new(value)
                    .with_importer(carried.importer.clone())
                    .with_processor(carried.processor.clone());
                item.processor_params = carried.params.clone();
                add_item(&mut project, item);
            }
            "copy" => add_item(&mut project, ContentItem::new_copy(value)),
            other => return Err(malformed(format!("unknown directive '/{}'", other))),
        }
    }

    Ok(project)
}

fn add_item(project: &mut Project, item: ContentItem) {
    match project.index_of(&item.source_file) {
        Some(idx) => {
            warn!("'{}' is listed twice, keeping the last entry", item.source_file);
            project.items[idx] = item;
        }
        None => project.items.push(item),
    }
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Serialize the whole project.
pub fn write_script(project: &Project) -> String {
    write_items(project, project.items.iter())
}

/// Serialize the project with only the listed items, for partial rebuilds.
pub fn write_filtered(project: &Project, paths: &[String]) -> String {
    write_items(
        project,
        project.items.iter().filter(|i| paths.contains(&i.source_file)),
    )
}

fn write_items<'a>(project: &Project, items: impl Iterator<Item = &'a ContentItem>) -> String {
    let mut out = String::new();
    // fmt::Write on a String never fails.
    let _ = render(&mut out, project, items);
    out
}

fn render<'a>(
    out: &mut String,
    project: &Project,
    items: impl Iterator<Item = &'a ContentItem>,
) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "{}", GLOBAL_HEADER)?;
    writeln!(out)?;
    writeln!(out, "/outputDir:{}", project.output_dir)?;
    writeln!(out, "/intermediateDir:{}", project.intermediate_dir)?;
    writeln!(out, "/platform:{}", project.platform)?;
    writeln!(out, "/config:{}", project.config)?;
    writeln!(out, "/profile:{}", project.profile)?;
    writeln!(out, "/compress:{}", bool_text(project.compress))?;
    writeln!(out)?;
    writeln!(out, "{}", REFERENCES_HEADER)?;
    writeln!(out)?;
    for reference in &project.references {
        writeln!(out, "/reference:{}", reference)?;
    }
    if !project.references.is_empty() {
        writeln!(out)?;
    }
    writeln!(out, "{}", CONTENT_HEADER)?;
    writeln!(out)?;

    for item in items {
        writeln!(out, "#begin {}", item.source_file)?;
        match item.build_action {
            BuildAction::Copy => writeln!(out, "/copy:{}", item.source_file)?,
            BuildAction::Build => {
                writeln!(out, "/importer:{}", item.importer_name)?;
                writeln!(out, "/processor:{}", item.processor_name)?;
                for (name, value) in persisted_params(item) {
                    writeln!(out, "/processorParam:{}={}", name, value)?;
                }
                writeln!(out, "/build:{}", item.source_file)?;
            }
        }
        writeln!(out)?;
    }

    Ok(())
}

/// Parameters written for an item: schema order for a resolved processor,
/// every stored parameter otherwise.
fn persisted_params(item: &ContentItem) -> Vec<(&str, &ParamValue)> {
    match item.processor.descriptor() {
        Some(processor) => processor
            .params
            .iter()
            .filter_map(|spec| {
                item.processor_params
                    .get_key_value(&spec.name)
                    .map(|(k, v)| (k.as_str(), v))
            })
            .collect(),
        None => item
            .processor_params
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::registry::PipelineRegistry;
    use crate::pipeline::resolve::resolve_all;
    use crate::project::model::{GraphicsProfile, TargetPlatform};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use test_case::test_case;

    const SCRIPT: &str = r#"
#----------------------------- Global Properties ----------------------------#

/outputDir:bin/$(Platform)
/intermediateDir:obj/$(Platform)
/platform:Windows
/config:
/profile:HiDef
/compress:True

#-------------------------------- References --------------------------------#

/reference:..\Tiled\Tiled.dll

#---------------------------------- Content ---------------------------------#

#begin hero.png
/importer:TextureImporter
/processor:TextureProcessor
/processorParam:ColorKeyEnabled=False
/processorParam:TextureFormat="Compressed"
/build:hero.png

#begin villain.png
/build:villain.png

#begin level.tmx
/importer:TmxImporter
/processor:TmxProcessor
/processorParam:Layers=All
/build:level.tmx

#begin readme.txt
/copy:readme.txt
"#;

    #[test]
    fn test_parse_script() {
        let project = parse_script(SCRIPT).unwrap();

        assert_eq!(project.platform, TargetPlatform::Windows);
        assert_eq!(project.profile, GraphicsProfile::HiDef);
        assert!(project.compress);
        assert_eq!(project.references, vec!["..\\Tiled\\Tiled.dll".to_string()]);

        let names: Vec<&str> = project.items.iter().map(|i| i.source_file.as_str()).collect();
        assert_eq!(names, vec!["hero.png", "villain.png", "level.tmx", "readme.txt"]);

        // Carried forward from the previous block.
        let villain = &project.items[1];
        assert_eq!(villain.importer_name, "TextureImporter");
        assert_eq!(
            villain.processor_params.get("TextureFormat"),
            Some(&ParamValue::Raw("Compressed".to_string()))
        );

        // `/processor` resets the carried parameters.
        let level = &project.items[2];
        assert_eq!(level.processor_params.len(), 1);
        assert_eq!(project.items[3].build_action, BuildAction::Copy);
    }

    #[test]
    fn test_round_trip_keeps_unresolved_params() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Content.mgcb");
        fs::write(&path, SCRIPT).unwrap();

        let mut project = Project::load(&path).unwrap();
        resolve_all(&mut project, &PipelineRegistry::with_defaults());
        project.save().unwrap();

        let mut reloaded = Project::load(&path).unwrap();
        resolve_all(&mut reloaded, &PipelineRegistry::with_defaults());
        assert_eq!(reloaded.snapshot(), project.snapshot());

        let level = reloaded.find_item("level.tmx").unwrap();
        assert_eq!(
            level.processor_params.get("Layers"),
            Some(&ParamValue::Raw("All".to_string()))
        );
    }

    #[test]
    fn test_save_writes_schema_order() {
        let mut project = parse_script(SCRIPT).unwrap();
        resolve_all(&mut project, &PipelineRegistry::with_defaults());
        project.items[0]
            .processor_params
            .insert("Stale".to_string(), ParamValue::Raw("1".to_string()));

        let text = write_script(&project);
        let hero_block: Vec<&str> = text
            .lines()
            .skip_while(|l| *l != "#begin hero.png")
            .take_while(|l| !l.is_empty())
            .collect();

        assert_eq!(
            hero_block,
            vec![
                "#begin hero.png",
                "/importer:TextureImporter",
                "/processor:TextureProcessor",
                "/processorParam:ColorKeyColor=255,0,255,255",
                "/processorParam:ColorKeyEnabled=False",
                "/processorParam:GenerateMipmaps=False",
                "/processorParam:PremultiplyAlpha=True",
                "/processorParam:ResizeToPowerOfTwo=False",
                "/processorParam:MakeSquare=False",
                "/processorParam:TextureFormat=Compressed",
                "/build:hero.png",
            ]
        );
    }

    #[test]
    fn test_write_filtered() {
        let project = parse_script(SCRIPT).unwrap();
        let text = write_filtered(&project, &["villain.png".to_string()]);

        let filtered = parse_script(&text).unwrap();
        assert_eq!(filtered.items.len(), 1);
        assert_eq!(filtered.items[0].source_file, "villain.png");
        assert_eq!(filtered.platform, TargetPlatform::Windows);
    }

    #[test_case("outputDir:bin", 2; "missing slash")]
    #[test_case("/outputDir", 2; "missing colon")]
    #[test_case("/launch:now", 2; "unknown directive")]
    #[test_case("/platform:Dreamcast", 2; "bad platform")]
    #[test_case("/compress:maybe", 2; "bad bool")]
    #[test_case("/processorParam:NoEquals", 2; "param without value")]
    fn test_malformed_lines(line: &str, expected_line: usize) {
        let script = format!("# header\n{}\n", line);
        match parse_script(&script) {
            Err(PipelineError::MalformedLine { line, .. }) => assert_eq!(line, expected_line),
            other => panic!("expected malformed line, got {:?}", other.map(|p| p.items.len())),
        }
    }

    #[test]
    fn test_save_requires_origin() {
        let err = Project::new().save().unwrap_err();
        assert_eq!(err.error_code(), "PROJECT_NOT_SAVED");
    }
}
