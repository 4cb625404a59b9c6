//! Importer/processor capabilities and type resolution

pub mod params;
pub mod registry;
pub mod resolve;

pub use params::{Color, ParamMap, ParamSpec, ParamType, ParamValue};
pub use registry::{
    CapabilityManifest, ImporterDescriptor, PipelineRegistry, ProcessorDescriptor,
};
pub use resolve::{resolve_all, resolve_types};
