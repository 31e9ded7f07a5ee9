//! Complex type builder

use tracing::debug;

use super::{BuildContext, build_property, check_names, check_unique};
use crate::error::BuildError;
use crate::models::ComplexType;
use crate::registry::ElementKind;
use crate::source::TypeDescriptor;

pub(super) fn build_complex_type(
    ctx: &mut BuildContext<'_>,
    descriptor: &TypeDescriptor,
) -> Result<ComplexType, BuildError> {
    let name = &descriptor.name;
    check_names(ctx.config(), name)?;

    let mut inherited = Vec::new();
    if let Some(base) = &descriptor.base_type {
        ctx.check_type_chain(ElementKind::ComplexType, name)?;
        let mut next = Some(ctx.build_complex_type(base)?);
        while let Some(base_type) = next {
            inherited.extend(base_type.properties.iter().map(|p| p.name.clone()));
            next = base_type
                .base_type
                .as_ref()
                .and_then(|b| ctx.registry().resolve(ElementKind::ComplexType, b))
                .and_then(|e| e.as_complex_type().cloned());
        }
    }

    let mut properties = Vec::new();
    for member in ctx.source().describe_properties(descriptor)? {
        properties.push(build_property(ctx, name, &member)?);
    }
    check_unique(
        name,
        properties
            .iter()
            .map(|p| p.name.as_str())
            .chain(inherited.iter().map(String::as_str)),
    )?;

    debug!("Built complex type '{}' ({} properties)", name, properties.len());
    Ok(ComplexType {
        name: name.clone(),
        base_type: descriptor.base_type.clone(),
        properties,
    })
}
