//! Type-level checks
//!
//! - A qualified name is either a complex type or an entity type, never both
//! - Navigation properties name a registered association and one of its roles
//!   bound to the declaring type (or a base type)
//! - Association ends name registered entity types
//! - Non-abstract entity types have an effective key

use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::models::{EntityType, NavigationProperty};
use crate::registry::{ElementKind, Registry};

pub fn check_types(registry: &Registry, config: &BuildConfig) -> Vec<BuildError> {
    let mut issues = Vec::new();

    for complex_type in registry.complex_types() {
        if registry.contains(ElementKind::EntityType, &complex_type.name) {
            issues.push(BuildError::TypeNameCollision(complex_type.name.clone()));
        }
    }

    for association in registry.associations() {
        for end in &association.ends {
            if !registry.contains(ElementKind::EntityType, &end.entity_type) {
                issues.push(BuildError::model(
                    &association.name,
                    format!(
                        "end '{}' names unregistered entity type {}",
                        end.role, end.entity_type
                    ),
                ));
            }
        }
    }

    for entity_type in registry.entity_types() {
        for navigation in &entity_type.navigation_properties {
            if let Err(issue) = check_navigation(registry, config, &entity_type, navigation) {
                issues.push(issue);
            }
        }
        if !entity_type.is_abstract {
            match registry.effective_key(&entity_type, config.max_inheritance_depth) {
                Ok(Some(_)) => {}
                Ok(None) => issues.push(BuildError::model(
                    &entity_type.name,
                    "entity type has no key, declared or inherited",
                )),
                Err(err) => issues.push(err),
            }
        }
    }
    issues
}

fn check_navigation(
    registry: &Registry,
    config: &BuildConfig,
    entity_type: &EntityType,
    navigation: &NavigationProperty,
) -> Result<(), BuildError> {
    let element = format!("{}.{}", entity_type.name, navigation.name);
    let association = registry.association(&navigation.relationship).ok_or_else(|| {
        BuildError::model(
            &element,
            format!("association '{}' is not registered", navigation.relationship),
        )
    })?;
    let Some(from) = association.end(&navigation.from_role) else {
        return Err(BuildError::model(
            &element,
            format!(
                "role '{}' is not an end of '{}'",
                navigation.from_role, association.name
            ),
        ));
    };
    if association.end(&navigation.to_role).is_none() || navigation.to_role == navigation.from_role {
        return Err(BuildError::model(
            &element,
            format!(
                "role '{}' is not the far end of '{}'",
                navigation.to_role, association.name
            ),
        ));
    }

    let chain = registry.entity_type_chain(&entity_type.name, config.max_inheritance_depth)?;
    if !chain.iter().any(|t| t.name == from.entity_type) {
        return Err(BuildError::model(
            &element,
            format!(
                "role '{}' is bound to {}, not to {}",
                navigation.from_role, from.entity_type, entity_type.name
            ),
        ));
    }
    Ok(())
}
