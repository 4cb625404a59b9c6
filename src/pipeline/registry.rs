//! Importer/processor registry
//!
//! Holds the capability descriptors available to the open project: the
//! built-in standard pipeline plus whatever the project's references declare
//! through capability manifests. The registry is an ordinary value owned by
//! the controller and reloaded explicitly when references change.

use super::params::{Color, ParamSpec, ParamType};
use crate::error::{PipelineError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Processor input type that accepts any importer output.
pub const ANY_CONTENT_TYPE: &str = "object";

/// Describes an importer: which files it reads and what it produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImporterDescriptor {
    /// Type name persisted in the project script (e.g. "TextureImporter")
    pub type_name: String,

    /// Human-readable name
    #[serde(default)]
    pub display_name: String,

    /// Lower-case extensions including the dot (".png")
    #[serde(default)]
    pub file_extensions: Vec<String>,

    /// Processor used when an item names none or an incompatible one
    pub default_processor: String,

    /// Content type produced by the importer
    pub output_type: String,
}

impl ImporterDescriptor {
    /// Whether the importer claims the given extension (with or without dot).
    pub fn handles_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.file_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Describes a processor and its parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorDescriptor {
    /// Type name persisted in the project script (e.g. "TextureProcessor")
    pub type_name: String,

    /// Human-readable name
    #[serde(default)]
    pub display_name: String,

    /// Content type accepted as input
    pub input_type: String,

    /// Declared parameters, in display order
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

impl ProcessorDescriptor {
    /// Whether this processor can consume the output of `importer`.
    pub fn accepts(&self, importer: &ImporterDescriptor) -> bool {
        self.input_type == ANY_CONTENT_TYPE || self.input_type == importer.output_type
    }

    /// Look up a declared parameter.
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// JSON document shipped next to a referenced assembly, declaring what it adds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityManifest {
    #[serde(default)]
    pub importers: Vec<ImporterDescriptor>,

    #[serde(default)]
    pub processors: Vec<ProcessorDescriptor>,
}

impl CapabilityManifest {
    /// Read a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| PipelineError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| PipelineError::InvalidManifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Manifest location for a reference: the reference itself when it is a
    /// `.json` file, otherwise the same path with a `.json` extension.
    pub fn path_for_reference(reference: &str, base_dir: &Path) -> PathBuf {
        let normalized = reference.replace('\\', "/");
        let path = base_dir.join(normalized);
        let is_json = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            path
        } else {
            path.with_extension("json")
        }
    }
}

/// Registry of available importers and processors
#[derive(Debug, Clone)]
pub struct PipelineRegistry {
    importers: Vec<Arc<ImporterDescriptor>>,
    processors: Vec<Arc<ProcessorDescriptor>>,
    importer_index: HashMap<String, usize>,
    processor_index: HashMap<String, usize>,
}

impl PipelineRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            importers: Vec::new(),
            processors: Vec::new(),
            importer_index: HashMap::new(),
            processor_index: HashMap::new(),
        }
    }

    /// Create registry with the standard pipeline descriptors
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_builtin();
        registry
    }

    /// Rebuild the registry for a project's reference list.
    ///
    /// Built-ins are always present. References without a readable manifest
    /// are logged and skipped so the project stays loadable.
    pub fn load(&mut self, references: &[String], base_dir: &Path) {
        *self = Self::with_defaults();

        for reference in references {
            let manifest_path = CapabilityManifest::path_for_reference(reference, base_dir);
            if !manifest_path.exists() {
                warn!(
                    "No capability manifest for reference '{}' (looked for {})",
                    reference,
                    manifest_path.display()
                );
                continue;
            }

            match CapabilityManifest::load(&manifest_path) {
                Ok(manifest) => {
                    debug!(
                        "Reference '{}' adds {} importers, {} processors",
                        reference,
                        manifest.importers.len(),
                        manifest.processors.len()
                    );
                    self.register_manifest(manifest);
                }
                Err(e) => warn!("Skipping reference '{}': {}", reference, e),
            }
        }
    }

    /// Register everything a manifest declares.
    pub fn register_manifest(&mut self, manifest: CapabilityManifest) {
        for importer in manifest.importers {
            self.register_importer(importer);
        }
        for processor in manifest.processors {
            self.register_processor(processor);
        }
    }

    /// Register an importer, replacing any with the same type name
    pub fn register_importer(&mut self, importer: ImporterDescriptor) {
        let name = importer.type_name.clone();
        match self.importer_index.get(&name) {
            Some(&idx) => self.importers[idx] = Arc::new(importer),
            None => {
                self.importer_index.insert(name, self.importers.len());
                self.importers.push(Arc::new(importer));
            }
        }
    }

    /// Register a processor, replacing any with the same type name
    pub fn register_processor(&mut self, processor: ProcessorDescriptor) {
        let name = processor.type_name.clone();
        match self.processor_index.get(&name) {
            Some(&idx) => self.processors[idx] = Arc::new(processor),
            None => {
                self.processor_index.insert(name, self.processors.len());
                self.processors.push(Arc::new(processor));
            }
        }
    }

    /// All importers, in registration order
    pub fn importers(&self) -> &[Arc<ImporterDescriptor>] {
        &self.importers
    }

    /// All processors, in registration order
    pub fn processors(&self) -> &[Arc<ProcessorDescriptor>] {
        &self.processors
    }

    /// Find an importer by exact type name
    pub fn find_importer(&self, name: &str) -> Option<Arc<ImporterDescriptor>> {
        self.importer_index
            .get(name)
            .map(|&idx| Arc::clone(&self.importers[idx]))
    }

    /// Find a processor by exact type name
    pub fn find_processor(&self, name: &str) -> Option<Arc<ProcessorDescriptor>> {
        self.processor_index
            .get(name)
            .map(|&idx| Arc::clone(&self.processors[idx]))
    }

    /// First importer claiming the extension (with or without the dot)
    pub fn importer_for_extension(&self, ext: &str) -> Option<Arc<ImporterDescriptor>> {
        if ext.is_empty() {
            return None;
        }
        self.importers
            .iter()
            .find(|i| i.handles_extension(ext))
            .cloned()
    }

    /// Processors able to consume an importer's output
    pub fn processors_for(&self, importer: &ImporterDescriptor) -> Vec<Arc<ProcessorDescriptor>> {
        self.processors
            .iter()
            .filter(|p| p.accepts(importer))
            .cloned()
            .collect()
    }

    fn register_builtin(&mut self) {
        for importer in builtin_importers() {
            self.register_importer(importer);
        }
        for processor in builtin_processors() {
            self.register_processor(processor);
        }
    }
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn importer(
    type_name: &str,
    display_name: &str,
    extensions: &[&str],
    default_processor: &str,
    output_type: &str,
) -> ImporterDescriptor {
    ImporterDescriptor {
        type_name: type_name.to_string(),
        display_name: display_name.to_string(),
        file_extensions: extensions.iter().map(|e| e.to_string()).collect(),
        default_processor: default_processor.to_string(),
        output_type: output_type.to_string(),
    }
}

fn processor(
    type_name: &str,
    display_name: &str,
    input_type: &str,
    params: Vec<ParamSpec>,
) -> ProcessorDescriptor {
    ProcessorDescriptor {
        type_name: type_name.to_string(),
        display_name: display_name.to_string(),
        input_type: input_type.to_string(),
        params,
    }
}

fn options(values: &[&str]) -> ParamType {
    ParamType::Enum {
        options: values.iter().map(|v| v.to_string()).collect(),
    }
}

/// Importers of the standard content pipeline
pub fn builtin_importers() -> Vec<ImporterDescriptor> {
    vec![
        importer(
            "TextureImporter",
            "Texture Importer",
            &[".bmp", ".dds", ".dib", ".hdr", ".jpg", ".jpeg", ".pfm", ".png", ".ppm", ".tga"],
            "TextureProcessor",
            "TextureContent",
        ),
        importer(
            "FontDescriptionImporter",
            "Sprite Font Importer",
            &[".spritefont"],
            "FontDescriptionProcessor",
            "FontDescription",
        ),
        importer(
            "EffectImporter",
            "Effect Importer",
            &[".fx"],
            "EffectProcessor",
            "EffectContent",
        ),
        importer("FbxImporter", "FBX Importer", &[".fbx"], "ModelProcessor", "NodeContent"),
        importer("XImporter", "X Importer", &[".x"], "ModelProcessor", "NodeContent"),
        importer(
            "OpenAssetImporter",
            "Open Asset Import Library",
            &[".dae", ".obj", ".3ds", ".blend"],
            "ModelProcessor",
            "NodeContent",
        ),
        importer("WavImporter", "Wav Importer", &[".wav"], "SoundEffectProcessor", "AudioContent"),
        importer("OggImporter", "Ogg Importer", &[".ogg"], "SongProcessor", "AudioContent"),
        importer("Mp3Importer", "Mp3 Importer", &[".mp3"], "SongProcessor", "AudioContent"),
        importer("WmaImporter", "Wma Importer", &[".wma"], "SongProcessor", "AudioContent"),
        importer(
            "XmlImporter",
            "Xml Importer",
            &[".xml"],
            "PassThroughProcessor",
            ANY_CONTENT_TYPE,
        ),
    ]
}

/// Processors of the standard content pipeline
pub fn builtin_processors() -> Vec<ProcessorDescriptor> {
    let texture_format = || options(&["Color", "Compressed", "NoChange"]);
    let color_key = || {
        ParamSpec::new(
            "ColorKeyColor",
            ParamType::Color,
            serde_json::json!(Color::MAGENTA.to_string()),
        )
    };

    vec![
        processor(
            "TextureProcessor",
            "Texture",
            "TextureContent",
            vec![
                color_key(),
                ParamSpec::new("ColorKeyEnabled", ParamType::Bool, serde_json::json!(true)),
                ParamSpec::new("GenerateMipmaps", ParamType::Bool, serde_json::json!(false)),
                ParamSpec::new("PremultiplyAlpha", ParamType::Bool, serde_json::json!(true)),
                ParamSpec::new("ResizeToPowerOfTwo", ParamType::Bool, serde_json::json!(false)),
                ParamSpec::new("MakeSquare", ParamType::Bool, serde_json::json!(false)),
                ParamSpec::new("TextureFormat", texture_format(), serde_json::json!("Color")),
            ],
        ),
        processor(
            "FontDescriptionProcessor",
            "Sprite Font Description",
            "FontDescription",
            vec![
                ParamSpec::new("PremultiplyAlpha", ParamType::Bool, serde_json::json!(true)),
                ParamSpec::new("TextureFormat", texture_format(), serde_json::json!("Compressed")),
            ],
        ),
        processor(
            "EffectProcessor",
            "Effect",
            "EffectContent",
            vec![
                ParamSpec::new("DebugMode", options(&["Auto", "Debug", "Optimize"]), serde_json::json!("Auto")),
                ParamSpec::new("Defines", ParamType::Text, serde_json::json!(""))
                    .with_description("Semicolon separated preprocessor defines"),
            ],
        ),
        processor(
            "ModelProcessor",
            "Model",
            "NodeContent",
            vec![
                color_key(),
                ParamSpec::new("ColorKeyEnabled", ParamType::Bool, serde_json::json!(true)),
                ParamSpec::new(
                    "DefaultEffect",
                    options(&["BasicEffect", "SkinnedEffect", "EnvironmentMapEffect", "DualTextureEffect", "AlphaTestEffect"]),
                    serde_json::json!("BasicEffect"),
                ),
                ParamSpec::new("GenerateMipmaps", ParamType::Bool, serde_json::json!(true)),
                ParamSpec::new("GenerateTangentFrames", ParamType::Bool, serde_json::json!(false)),
                ParamSpec::new("PremultiplyTextureAlpha", ParamType::Bool, serde_json::json!(true)),
                ParamSpec::new("PremultiplyVertexColors", ParamType::Bool, serde_json::json!(true)),
                ParamSpec::new("ResizeTexturesToPowerOfTwo", ParamType::Bool, serde_json::json!(false)),
                ParamSpec::new("RotationX", ParamType::Float, serde_json::json!(0)),
                ParamSpec::new("RotationY", ParamType::Float, serde_json::json!(0)),
                ParamSpec::new("RotationZ", ParamType::Float, serde_json::json!(0)),
                ParamSpec::new("Scale", ParamType::Float, serde_json::json!(1)),
                ParamSpec::new("SwapWindingOrder", ParamType::Bool, serde_json::json!(false)),
                ParamSpec::new("TextureFormat", texture_format(), serde_json::json!("Compressed")),
            ],
        ),
        processor(
            "SoundEffectProcessor",
            "Sound Effect",
            "AudioContent",
            vec![ParamSpec::new("Quality", options(&["Low", "Medium", "Best"]), serde_json::json!("Best"))],
        ),
        processor(
            "SongProcessor",
            "Song",
            "AudioContent",
            vec![ParamSpec::new("Quality", options(&["Low", "Medium", "Best"]), serde_json::json!("Best"))],
        ),
        processor("PassThroughProcessor", "No Processing Required", ANY_CONTENT_TYPE, Vec::new()),
    ]
}
