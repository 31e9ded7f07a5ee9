//! Entity type builder

use tracing::debug;

use super::{BuildContext, build_property, check_member_name, check_names, check_unique};
use crate::association::AssociationFragment;
use crate::error::BuildError;
use crate::expand::Expander;
use crate::models::{EntityType, Key, NavigationProperty, Property, PropertyType};
use crate::registry::ElementKind;
use crate::source::{KeyDescriptor, NavigationDescriptor, TypeDescriptor};

pub(super) fn build_entity_type(
    ctx: &mut BuildContext<'_>,
    descriptor: &TypeDescriptor,
) -> Result<(EntityType, Vec<AssociationFragment>), BuildError> {
    let name = &descriptor.name;
    let config = ctx.config();
    let source = ctx.source();
    check_names(config, name)?;

    let base = match &descriptor.base_type {
        Some(base) => {
            ctx.check_type_chain(ElementKind::EntityType, name)?;
            Some(ctx.build_entity_type(base)?)
        }
        None => None,
    };

    let mut properties = Vec::new();
    let mut embedded = Vec::new();
    for member in source.describe_properties(descriptor)? {
        let property = build_property(ctx, name, &member)?;
        if let PropertyType::Complex(complex_type) = &property.property_type {
            embedded.push((property.name.clone(), complex_type.clone()));
        }
        properties.push(property);
    }

    let key = match source.describe_key(descriptor)? {
        KeyDescriptor::None => {
            if base.is_none() && !descriptor.is_abstract {
                return Err(BuildError::model(name, "entity type declares no key"));
            }
            Key::default()
        }
        _ if base.is_some() => {
            return Err(BuildError::model(
                name,
                "a derived entity type cannot redeclare the key",
            ));
        }
        KeyDescriptor::Properties(refs) => {
            if refs.is_empty() {
                return Err(BuildError::model(name, "key has no properties"));
            }
            for key_ref in &refs {
                let property = properties
                    .iter_mut()
                    .find(|p| p.name == *key_ref)
                    .ok_or_else(|| {
                        BuildError::model(name, format!("key property '{}' is not declared", key_ref))
                    })?;
                if !property.property_type.is_simple() {
                    return Err(BuildError::model(
                        name,
                        format!("key property '{}' must have a simple type", key_ref),
                    ));
                }
                property.facets.nullable = Some(false);
            }
            Key::new(refs)
        }
        KeyDescriptor::Embedded(member) => {
            let position = properties
                .iter()
                .position(|p| p.name == member)
                .ok_or_else(|| {
                    BuildError::model(name, format!("embedded key '{}' is not declared", member))
                })?;
            let Some(complex_name) = properties[position].property_type.as_complex().cloned() else {
                return Err(BuildError::model(
                    name,
                    format!("embedded key '{}' must have a complex type", member),
                ));
            };
            let complex_type = ctx.build_complex_type(&complex_name)?;

            let mut leaves: Vec<Property> = Vec::new();
            Expander::new(ctx.registry())
                .with_max_nesting(config.max_complex_nesting)
                .expand(&complex_type, &mut leaves, &member)?;
            for leaf in &mut leaves {
                leaf.facets.nullable = Some(false);
            }
            let refs = leaves.iter().map(|p| p.name.clone()).collect();
            properties.splice(position..=position, leaves);
            Key::new(refs)
        }
    };

    let mut navigations: Vec<(String, NavigationDescriptor)> = source
        .describe_navigations(descriptor)?
        .into_iter()
        .map(|n| (n.name.clone(), n))
        .collect();
    for (member, complex_name) in &embedded {
        if let Some(complex_descriptor) = ctx.candidate(ElementKind::ComplexType, complex_name) {
            for navigation in source.describe_navigations(&complex_descriptor)? {
                navigations.push((format!("{}_{}", member, navigation.name), navigation));
            }
        }
    }

    let mut navigation_properties: Vec<NavigationProperty> = Vec::new();
    let mut fragments = Vec::new();
    for (member, navigation) in navigations {
        check_member_name(config, name, &member)?;
        if !ctx.is_known(ElementKind::EntityType, &navigation.target) {
            return Err(BuildError::model(
                format!("{}.{}", name, member),
                format!("navigation target {} is not an entity type", navigation.target),
            ));
        }
        let mut fragment = AssociationFragment::from_navigation(name, &navigation, config)?;
        fragment.navigation = member.clone();
        navigation_properties.push(fragment.navigation_property(member));
        fragments.push(fragment);
    }

    let entity_type = EntityType {
        name: name.clone(),
        base_type: descriptor.base_type.clone(),
        is_abstract: descriptor.is_abstract,
        has_stream: descriptor.has_stream,
        properties,
        navigation_properties,
        key,
    };

    let inherited = match &base {
        Some(base) => ctx
            .registry()
            .entity_type_chain(&base.name, config.max_inheritance_depth)?,
        None => Vec::new(),
    };
    check_unique(
        name,
        entity_type
            .member_names()
            .chain(inherited.iter().flat_map(|t| t.member_names())),
    )?;

    debug!(
        "Built entity type '{}' ({} properties, {} navigations)",
        name,
        entity_type.properties.len(),
        entity_type.navigation_properties.len()
    );
    Ok((entity_type, fragments))
}
