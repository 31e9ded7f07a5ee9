//! Deterministic names for derived schema elements
//!
//! Both sides of a relationship must derive the same association name and
//! role names without seeing each other, so every rule here depends only on
//! the two type names involved.

use crate::config::BuildConfig;
use crate::models::FullQualifiedName;

/// Entity set name for `entity_type`, honouring an explicit hint
pub fn entity_set_name(
    entity_type: &FullQualifiedName,
    hint: Option<&str>,
    config: &BuildConfig,
) -> String {
    match hint {
        Some(name) => name.to_string(),
        None => format!("{}{}", entity_type.name(), config.entity_set_suffix),
    }
}

/// Association name shared by both sides of a relationship
///
/// The two type names are ordered so `Room -> Building` and
/// `Building -> Room` both yield `BuildingRooms`.
pub fn association_name(
    declaring: &FullQualifiedName,
    target: &FullQualifiedName,
    explicit: Option<&str>,
    config: &BuildConfig,
) -> FullQualifiedName {
    let (first, second) = ordered(declaring, target);
    match explicit {
        Some(name) => FullQualifiedName::parse_in(name, declaring.namespace()),
        None => FullQualifiedName::new(
            first.namespace(),
            format!("{}{}{}", first.name(), second.name(), config.entity_set_suffix),
        ),
    }
}

/// Role names `(declaring, target)` for a navigation
///
/// Roles default to the type names; a self-association suffixes the
/// target role with `2` to keep roles distinct.
pub fn role_names(
    declaring: &FullQualifiedName,
    target: &FullQualifiedName,
    from_role: Option<&str>,
    to_role: Option<&str>,
) -> (String, String) {
    let from = from_role
        .map(str::to_string)
        .unwrap_or_else(|| declaring.name().to_string());
    let to = to_role.map(str::to_string).unwrap_or_else(|| {
        if declaring == target {
            format!("{}2", target.name())
        } else {
            target.name().to_string()
        }
    });
    (from, to)
}

pub fn association_set_name(association: &FullQualifiedName, config: &BuildConfig) -> String {
    format!("{}{}", association.name(), config.association_set_suffix)
}

pub fn default_container_name(namespace: &str, config: &BuildConfig) -> String {
    match &config.default_container_name {
        Some(name) => name.clone(),
        None => format!("{}Container", namespace.replace('.', "_")),
    }
}

/// Simple name of a (possibly package-qualified) class name
///
/// `com.acme.Room` and `crate::model::Room` both reduce to `Room`.
pub fn simple_class_name(class_name: &str) -> &str {
    let after_path = class_name.rsplit("::").next().unwrap_or(class_name);
    let after_package = after_path.rsplit('.').next().unwrap_or(after_path);
    after_package.rsplit('$').next().unwrap_or(after_package)
}

fn ordered<'a>(
    a: &'a FullQualifiedName,
    b: &'a FullQualifiedName,
) -> (&'a FullQualifiedName, &'a FullQualifiedName) {
    if (a.name(), a.namespace()) <= (b.name(), b.namespace()) {
        (a, b)
    } else {
        (b, a)
    }
}
