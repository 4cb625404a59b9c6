//! Binding persisted importer/processor names to live descriptors
//!
//! Resolution never fails. Names the registry does not know become
//! `Binding::Missing` so the item can still be displayed and saved.

use log::debug;

use super::params::ParamValue;
use super::registry::{PipelineRegistry, ProcessorDescriptor};
use crate::project::model::{Binding, BuildAction, ContentItem, Project};

/// Resolve one item against the registry. Idempotent.
pub fn resolve_types(item: &mut ContentItem, registry: &PipelineRegistry) {
    if item.build_action == BuildAction::Copy {
        item.importer = Binding::Null;
        item.processor = Binding::Null;
        item.processor_params.clear();
        return;
    }

    // Importer: exact name, or inferred from the extension when unnamed.
    let importer = if item.importer_name.is_empty() {
        registry.importer_for_extension(&item.extension())
    } else {
        registry.find_importer(&item.importer_name)
    };

    item.importer = match importer {
        Some(found) => {
            item.importer_name = found.type_name.clone();
            Binding::Resolved(found)
        }
        None => Binding::Missing(item.importer_name.clone()),
    };

    // Processor: by name, checked against the importer output type.
    let mut processor = if item.processor_name.is_empty() {
        None
    } else {
        registry.find_processor(&item.processor_name)
    };

    if let Some(importer) = item.importer.descriptor() {
        let compatible = processor
            .as_ref()
            .map(|p| p.accepts(importer))
            .unwrap_or(false);
        let unnamed = item.processor_name.is_empty();

        if !compatible && (processor.is_some() || unnamed) {
            if let Some(p) = processor.as_ref() {
                debug!(
                    "{}: processor {} cannot consume {}, using {}",
                    item.source_file, p.type_name, importer.output_type, importer.default_processor
                );
            }
            processor = registry.find_processor(&importer.default_processor);
        }
    }

    item.processor = match processor {
        Some(found) => {
            item.processor_name = found.type_name.clone();
            reconcile_params(item, &found);
            Binding::Resolved(found)
        }
        None => Binding::Missing(item.processor_name.clone()),
    };
}

/// Resolve every item of a project.
pub fn resolve_all(project: &mut Project, registry: &PipelineRegistry) {
    for item in &mut project.items {
        resolve_types(item, registry);
    }
}

/// Align the stored dictionary with a processor schema: add missing keys with
/// their defaults and convert text to the declared type where possible.
fn reconcile_params(item: &mut ContentItem, processor: &ProcessorDescriptor) {
    for spec in &processor.params {
        match item.processor_params.get_mut(&spec.name) {
            None => {
                item.processor_params
                    .insert(spec.name.clone(), spec.default_value());
            }
            Some(value) => {
                if let Some(converted) = spec.param_type.convert(value) {
                    *value = converted;
                } else if !value.is_raw() {
                    // Typed for another schema and not convertible: keep its text
                    *value = ParamValue::Raw(value.to_string());
                }
            }
        }
    }
}
