//! Entity container builder
//!
//! Entity sets come from the descriptor (plus every root entity type when
//! the container exposes all of them). Association sets are derived for each
//! registered association with at least one end exposed by this container's
//! own sets; the other end may resolve through the `extends` chain.

use std::sync::Arc;
use tracing::{debug, info};

use super::context::container_key;
use super::{BuildContext, check_member_name};
use crate::error::BuildError;
use crate::models::{
    AssociationSet, AssociationSetEnd, EntityContainer, EntitySet, FullQualifiedName, FunctionImport,
    FunctionImportParameter, ReturnType,
};
use crate::naming;
use crate::registry::{ElementKind, Registry};
use crate::resolver::{self, ResolvedType};
use crate::source::{ContainerDescriptor, FunctionImportDescriptor};

pub(super) fn build_container(
    ctx: &mut BuildContext<'_>,
    descriptor: &ContainerDescriptor,
) -> Result<EntityContainer, BuildError> {
    let key = FullQualifiedName::new(descriptor.namespace.clone(), descriptor.name.clone());
    super::check_names(ctx.config(), &key)?;

    let parent = match &descriptor.extends {
        Some(extends) => {
            let parent_key = container_key(extends, &descriptor.namespace);
            if !ctx.is_known(ElementKind::EntityContainer, &parent_key) {
                return Err(BuildError::UnresolvableContainer {
                    container: descriptor.name.clone(),
                    extends: extends.clone(),
                });
            }
            ctx.check_container_chain(&key)?;
            Some(ctx.build_container(&parent_key)?)
        }
        None => None,
    };

    let entity_sets = entity_sets(ctx, descriptor, parent.as_ref())?;
    let ends = EndResolver {
        registry: ctx.registry(),
        own: &entity_sets,
        parent: parent.as_ref(),
        max_depth: ctx.config().max_inheritance_depth,
    };
    let association_sets = association_sets(ctx, descriptor, &ends)?;

    let mut function_imports: Vec<FunctionImport> = Vec::new();
    for function_import in &descriptor.function_imports {
        let built = build_function_import(ctx, descriptor, function_import, &ends)?;
        if function_imports.iter().any(|f| f.name == built.name) {
            return Err(BuildError::model(
                &key,
                format!("function import '{}' is declared more than once", built.name),
            ));
        }
        function_imports.push(built);
    }

    info!(
        "Assembled container '{}' ({} entity sets, {} association sets, {} function imports)",
        descriptor.name,
        entity_sets.len(),
        association_sets.len(),
        function_imports.len()
    );

    let mut container = EntityContainer::new(descriptor.name.clone(), descriptor.namespace.clone())
        .with_default(descriptor.is_default)
        .with_entity_sets(entity_sets)
        .with_association_sets(association_sets)
        .with_function_imports(function_imports);
    if let Some(parent) = parent {
        container = container.with_parent(parent);
    }
    Ok(container)
}

fn entity_sets(
    ctx: &mut BuildContext<'_>,
    descriptor: &ContainerDescriptor,
    parent: Option<&Arc<EntityContainer>>,
) -> Result<Vec<EntitySet>, BuildError> {
    let key = FullQualifiedName::new(descriptor.namespace.clone(), descriptor.name.clone());
    let mut sets: Vec<EntitySet> = Vec::new();
    let push = |sets: &mut Vec<EntitySet>, set: EntitySet| {
        if sets.iter().any(|s| s.name == set.name) {
            return Err(BuildError::model(
                &key,
                format!("entity set '{}' is declared more than once", set.name),
            ));
        }
        sets.push(set);
        Ok(())
    };

    for declared in &descriptor.entity_sets {
        check_member_name(ctx.config(), &key, &declared.name)?;
        match resolver::resolve_type(ctx, &declared.entity_type)? {
            ResolvedType::Entity(_) => {}
            _ => {
                return Err(BuildError::model(
                    &key,
                    format!(
                        "entity set '{}' must reference an entity type, not {}",
                        declared.name, declared.entity_type
                    ),
                ));
            }
        }
        push(
            &mut sets,
            EntitySet {
                name: declared.name.clone(),
                entity_type: declared.entity_type.clone(),
                container: descriptor.name.clone(),
            },
        )?;
    }

    if descriptor.expose_all_entity_types {
        for entity_type in ctx.registry().entity_types() {
            if entity_type.base_type.is_some()
                || sets.iter().any(|s| s.entity_type == entity_type.name)
                || parent.is_some_and(|p| p.entity_set_for_type(&entity_type.name).is_some())
            {
                continue;
            }
            let hint = ctx.entity_set_hint(&entity_type.name);
            let name = naming::entity_set_name(&entity_type.name, hint.as_deref(), ctx.config());
            push(
                &mut sets,
                EntitySet {
                    name,
                    entity_type: entity_type.name.clone(),
                    container: descriptor.name.clone(),
                },
            )?;
        }
    }
    Ok(sets)
}

/// Finds the entity set exposing an entity type, walking its base-type chain
struct EndResolver<'r> {
    registry: &'r Registry,
    own: &'r [EntitySet],
    parent: Option<&'r Arc<EntityContainer>>,
    max_depth: usize,
}

impl EndResolver<'_> {
    /// Set name and whether it is declared by this container itself
    fn resolve(&self, entity_type: &FullQualifiedName) -> Result<Option<(String, bool)>, BuildError> {
        let chain = self.registry.entity_type_chain(entity_type, self.max_depth)?;
        let names = std::iter::once(entity_type.clone())
            .chain(chain.iter().skip(1).map(|t| t.name.clone()));
        for name in names {
            if let Some(set) = self.own.iter().find(|s| s.entity_type == name) {
                return Ok(Some((set.name.clone(), true)));
            }
            if let Some(set) = self.parent.and_then(|p| p.entity_set_for_type(&name)) {
                return Ok(Some((set.name.clone(), false)));
            }
        }
        Ok(None)
    }
}

fn association_sets(
    ctx: &BuildContext<'_>,
    descriptor: &ContainerDescriptor,
    ends: &EndResolver<'_>,
) -> Result<Vec<AssociationSet>, BuildError> {
    let mut sets = Vec::new();
    for association in ctx.registry().associations() {
        let [first, second] = &association.ends;
        let resolved = (
            ends.resolve(&first.entity_type)?,
            ends.resolve(&second.entity_type)?,
        );
        let (first_set, second_set) = match resolved {
            (Some((a, own_a)), Some((b, own_b))) if own_a || own_b => (a, b),
            (Some((_, true)), None) => {
                return Err(BuildError::NoEntitySetForType {
                    container: descriptor.name.clone(),
                    entity_type: second.entity_type.clone(),
                });
            }
            (None, Some((_, true))) => {
                return Err(BuildError::NoEntitySetForType {
                    container: descriptor.name.clone(),
                    entity_type: first.entity_type.clone(),
                });
            }
            _ => continue,
        };
        debug!(
            "Association set for '{}' pairs {} <-> {}",
            association.name, first_set, second_set
        );
        sets.push(AssociationSet {
            name: naming::association_set_name(&association.name, ctx.config()),
            association: association.name.clone(),
            ends: [
                AssociationSetEnd {
                    role: first.role.clone(),
                    entity_set: first_set,
                },
                AssociationSetEnd {
                    role: second.role.clone(),
                    entity_set: second_set,
                },
            ],
        });
    }
    Ok(sets)
}

fn build_function_import(
    ctx: &mut BuildContext<'_>,
    container: &ContainerDescriptor,
    descriptor: &FunctionImportDescriptor,
    ends: &EndResolver<'_>,
) -> Result<FunctionImport, BuildError> {
    let element = format!("{}.{}", container.name, descriptor.name);
    let key = FullQualifiedName::new(container.namespace.clone(), container.name.clone());
    check_member_name(ctx.config(), &key, &descriptor.name)?;

    let return_type = match &descriptor.return_type {
        Some(raw) => Some(resolver::resolve_raw(ctx, raw, &element)?),
        None => None,
    };

    let entity_set = match (&return_type, &descriptor.entity_set) {
        (Some(ResolvedType::Entity(_)), Some(explicit)) => {
            let known = ends.own.iter().any(|s| s.name == *explicit)
                || ends.parent.is_some_and(|p| p.get_entity_set(explicit).is_some());
            if !known {
                return Err(BuildError::model(
                    &element,
                    format!("entity set '{}' is not exposed by the container", explicit),
                ));
            }
            Some(explicit.clone())
        }
        (Some(ResolvedType::Entity(entity_type)), None) => {
            let (name, _) = ends.resolve(&entity_type.name)?.ok_or_else(|| {
                BuildError::NoEntitySetForType {
                    container: container.name.clone(),
                    entity_type: entity_type.name.clone(),
                }
            })?;
            Some(name)
        }
        (_, Some(explicit)) => {
            return Err(BuildError::model(
                &element,
                format!("entity set '{}' given for a non-entity return type", explicit),
            ));
        }
        (_, None) => None,
    };

    let mut parameters: Vec<FunctionImportParameter> = Vec::new();
    for parameter in &descriptor.parameters {
        let parameter_element = format!("{}.{}", element, parameter.name);
        check_member_name(ctx.config(), &key, &parameter.name)?;
        let ResolvedType::Simple(simple_type) =
            resolver::resolve_raw(ctx, &parameter.raw_type, &parameter_element)?
        else {
            return Err(BuildError::model(
                &parameter_element,
                "function import parameters must have a simple type",
            ));
        };
        parameter
            .facets
            .validate_for(simple_type)
            .map_err(|reason| BuildError::model(&parameter_element, reason))?;
        if parameters.iter().any(|p| p.name == parameter.name) {
            return Err(BuildError::model(&element, format!("parameter '{}' is declared more than once", parameter.name)));
        }
        parameters.push(FunctionImportParameter {
            name: parameter.name.clone(),
            parameter_type: simple_type,
            facets: parameter.facets.clone(),
        });
    }

    Ok(FunctionImport {
        name: descriptor.name.clone(),
        return_type: return_type.map(|resolved| ReturnType {
            type_ref: resolved.type_reference(),
            multiplicity: descriptor.return_multiplicity,
        }),
        entity_set,
        http_method: descriptor.http_method,
        parameters,
    })
}
