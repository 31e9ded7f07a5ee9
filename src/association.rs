//! Association discovery and merge
//!
//! Every navigation member yields an `AssociationFragment` seen from its
//! declaring side. Fragments sharing an association name are merged into one
//! canonical `Association` once all types are built.
//!
//! Each fragment end carries a `declared` flag: the end a navigation points
//! at is stated by the source, while the declaring end is a guess unless the
//! member kind implies it (`ManyToOne`, `ManyToMany`) or the source states it
//! explicitly. Per end, the merge takes `Many` if any fragment says so,
//! otherwise the earliest declared multiplicity, otherwise the earliest guess.

use std::collections::HashMap;

use tracing::warn;

use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::models::{
    Association, AssociationEnd, EntityType, FullQualifiedName, Multiplicity, NavigationProperty,
    ReferentialConstraint, ReferentialConstraintRole,
};
use crate::naming;
use crate::source::{AttributeKind, JoinColumn, NavigationDescriptor};

/// One end of an association fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentEnd {
    pub role: String,
    pub entity_type: FullQualifiedName,
    pub multiplicity: Multiplicity,
    /// Stated by the source rather than guessed
    pub declared: bool,
}

impl FragmentEnd {
    pub fn declared(role: impl Into<String>, entity_type: FullQualifiedName, multiplicity: Multiplicity) -> Self {
        Self {
            role: role.into(),
            entity_type,
            multiplicity,
            declared: true,
        }
    }

    pub fn inferred(role: impl Into<String>, entity_type: FullQualifiedName, multiplicity: Multiplicity) -> Self {
        Self {
            declared: false,
            ..Self::declared(role, entity_type, multiplicity)
        }
    }
}

/// Join columns waiting to be resolved into a referential constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConstraint {
    pub dependent_role: String,
    pub principal_role: String,
    pub columns: Vec<JoinColumn>,
}

/// Partial association emitted by one navigation member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationFragment {
    pub name: FullQualifiedName,
    /// Navigation member that produced the fragment
    pub navigation: String,
    /// Declaring end
    pub source: FragmentEnd,
    /// Navigated-to end
    pub target: FragmentEnd,
    pub constraint: Option<PendingConstraint>,
}

impl AssociationFragment {
    pub fn new(name: FullQualifiedName, source: FragmentEnd, target: FragmentEnd) -> Self {
        Self {
            name,
            navigation: String::new(),
            source,
            target,
            constraint: None,
        }
    }

    /// Fragment for `navigation` declared on `declaring`
    pub fn from_navigation(
        declaring: &FullQualifiedName,
        navigation: &NavigationDescriptor,
        config: &BuildConfig,
    ) -> Result<Self, BuildError> {
        let name = naming::association_name(
            declaring,
            &navigation.target,
            navigation.association.as_deref(),
            config,
        );
        let (from_role, to_role) = naming::role_names(
            declaring,
            &navigation.target,
            navigation.from_role.as_deref(),
            navigation.to_role.as_deref(),
        );
        if from_role == to_role {
            return Err(BuildError::model(
                format!("{}.{}", declaring, navigation.name),
                format!("both association ends use role '{}'", from_role),
            ));
        }

        let (source_multiplicity, target_multiplicity) = end_multiplicities(navigation)
            .ok_or_else(|| {
                BuildError::model(
                    format!("{}.{}", declaring, navigation.name),
                    format!("{:?} is not a navigation kind", navigation.kind),
                )
            })?;

        let constraint = if navigation.join_columns.is_empty() {
            None
        } else if navigation.kind == AttributeKind::OneToMany {
            Some(PendingConstraint {
                dependent_role: to_role.clone(),
                principal_role: from_role.clone(),
                columns: navigation.join_columns.clone(),
            })
        } else {
            Some(PendingConstraint {
                dependent_role: from_role.clone(),
                principal_role: to_role.clone(),
                columns: navigation.join_columns.clone(),
            })
        };

        Ok(Self {
            name,
            navigation: navigation.name.clone(),
            source: FragmentEnd {
                role: from_role,
                entity_type: declaring.clone(),
                multiplicity: source_multiplicity.0,
                declared: source_multiplicity.1,
            },
            target: FragmentEnd {
                role: to_role,
                entity_type: navigation.target.clone(),
                multiplicity: target_multiplicity.0,
                declared: target_multiplicity.1,
            },
            constraint,
        })
    }

    /// Navigation property backed by this fragment
    pub fn navigation_property(&self, name: impl Into<String>) -> NavigationProperty {
        NavigationProperty {
            name: name.into(),
            relationship: self.name.clone(),
            from_role: self.source.role.clone(),
            to_role: self.target.role.clone(),
        }
    }

    fn ends(&self) -> [&FragmentEnd; 2] {
        [&self.source, &self.target]
    }

    fn end(&self, role: &str) -> Option<&FragmentEnd> {
        self.ends().into_iter().find(|e| e.role == role)
    }
}

/// `(declaring, target)` multiplicities with their declared flags
fn end_multiplicities(
    navigation: &NavigationDescriptor,
) -> Option<((Multiplicity, bool), (Multiplicity, bool))> {
    let single = if navigation.optional {
        Multiplicity::ZeroOrOne
    } else {
        Multiplicity::One
    };
    let (source, target) = match navigation.kind {
        AttributeKind::ManyToOne => ((Multiplicity::Many, true), (single, true)),
        AttributeKind::OneToOne => ((Multiplicity::ZeroOrOne, false), (single, true)),
        AttributeKind::OneToMany => ((Multiplicity::ZeroOrOne, false), (Multiplicity::Many, true)),
        AttributeKind::ManyToMany => ((Multiplicity::Many, true), (Multiplicity::Many, true)),
        AttributeKind::Navigation(multiplicity) => {
            ((Multiplicity::ZeroOrOne, false), (multiplicity, true))
        }
        AttributeKind::Basic | AttributeKind::Embedded | AttributeKind::EmbeddedId => return None,
    };
    let source = match navigation.from_multiplicity {
        Some(multiplicity) => (multiplicity, true),
        None => source,
    };
    Some((source, target))
}

fn reconcile(current: &mut FragmentEnd, incoming: &FragmentEnd) {
    current.multiplicity = match (current.declared, incoming.declared) {
        _ if current.multiplicity.is_many() || incoming.multiplicity.is_many() => Multiplicity::Many,
        (false, true) => incoming.multiplicity,
        _ => current.multiplicity,
    };
    current.declared |= incoming.declared;
}

/// Merge fragments of one association into its canonical form
///
/// The first fragment fixes the end order. Fragments must agree on the role
/// set and on each role's entity type.
pub fn merge_fragments(fragments: &[AssociationFragment]) -> Result<Association, BuildError> {
    let Some(first) = fragments.first() else {
        return Err(BuildError::model("<association>", "no fragments to merge"));
    };
    let mut ends = [first.source.clone(), first.target.clone()];

    for fragment in &fragments[1..] {
        check_fragment(&first.name, &ends[0].role, &ends[1].role, |role| {
            ends.iter()
                .find(|e| e.role == role)
                .map(|e| e.entity_type.clone())
        }, fragment)?;
        for end in ends.iter_mut() {
            if let Some(incoming) = fragment.end(&end.role) {
                reconcile(end, incoming);
            }
        }
    }

    let [a, b] = ends;
    Ok(Association {
        name: first.name.clone(),
        ends: [
            AssociationEnd {
                role: a.role,
                entity_type: a.entity_type,
                multiplicity: a.multiplicity,
            },
            AssociationEnd {
                role: b.role,
                entity_type: b.entity_type,
                multiplicity: b.multiplicity,
            },
        ],
        referential_constraint: None,
    })
}

/// Check a fragment against an already registered association
///
/// Registered multiplicities are final, so only roles and end types are compared.
pub fn check_compatible(existing: &Association, fragment: &AssociationFragment) -> Result<(), BuildError> {
    let [a, b] = existing.roles();
    check_fragment(&existing.name, a, b, |role| {
        existing.end(role).map(|e| e.entity_type.clone())
    }, fragment)
}

fn check_fragment(
    name: &FullQualifiedName,
    role_a: &str,
    role_b: &str,
    entity_type_of: impl Fn(&str) -> Option<FullQualifiedName>,
    fragment: &AssociationFragment,
) -> Result<(), BuildError> {
    let conflict = |reason: String| BuildError::ConflictingAssociationDefinition {
        association: name.clone(),
        reason,
    };
    if fragment.name != *name {
        return Err(conflict(format!("fragment belongs to '{}'", fragment.name)));
    }
    for end in fragment.ends() {
        if end.role != role_a && end.role != role_b {
            return Err(conflict(format!(
                "role '{}' from {} does not match roles '{}' and '{}'",
                end.role, fragment.source.entity_type, role_a, role_b
            )));
        }
        if entity_type_of(&end.role).as_ref() != Some(&end.entity_type) {
            return Err(conflict(format!(
                "role '{}' is bound to {} by {}",
                end.role, end.entity_type, fragment.source.entity_type
            )));
        }
    }
    Ok(())
}

/// Group fragments by association name, keeping first-seen order
pub fn group_fragments(
    fragments: Vec<AssociationFragment>,
) -> Vec<(FullQualifiedName, Vec<AssociationFragment>)> {
    let mut index: HashMap<FullQualifiedName, usize> = HashMap::new();
    let mut groups: Vec<(FullQualifiedName, Vec<AssociationFragment>)> = Vec::new();
    for fragment in fragments {
        match index.get(&fragment.name) {
            Some(&i) => groups[i].1.push(fragment),
            None => {
                index.insert(fragment.name.clone(), groups.len());
                groups.push((fragment.name.clone(), vec![fragment]));
            }
        }
    }
    groups
}

/// Referential constraint from the first fragment carrying join columns
///
/// `lookup` returns the base-type chain of an entity type. Columns are
/// matched against property mappings, then property names; a constraint
/// with any unmatched column is dropped.
pub fn referential_constraint(
    association: &Association,
    fragments: &[AssociationFragment],
    lookup: impl Fn(&FullQualifiedName) -> Vec<std::sync::Arc<EntityType>>,
) -> Option<ReferentialConstraint> {
    let pending = fragments.iter().find_map(|f| f.constraint.as_ref())?;
    let dependent = association.end(&pending.dependent_role)?;
    let principal = association.end(&pending.principal_role)?;
    let dependent_chain = lookup(&dependent.entity_type);
    let principal_chain = lookup(&principal.entity_type);

    let mut dependent_refs = Vec::new();
    let mut principal_refs = Vec::new();
    for column in &pending.columns {
        let from = property_for_column(&dependent_chain, &column.name);
        let to = property_for_column(&principal_chain, &column.referenced_column_name);
        match (from, to) {
            (Some(from), Some(to)) => {
                dependent_refs.push(from);
                principal_refs.push(to);
            }
            _ => {
                warn!(
                    "Dropping referential constraint of '{}': column '{}' -> '{}' does not resolve to properties",
                    association.name, column.name, column.referenced_column_name
                );
                return None;
            }
        }
    }

    Some(ReferentialConstraint {
        principal: ReferentialConstraintRole {
            role: principal.role.clone(),
            property_refs: principal_refs,
        },
        dependent: ReferentialConstraintRole {
            role: dependent.role.clone(),
            property_refs: dependent_refs,
        },
    })
}

fn property_for_column(chain: &[std::sync::Arc<EntityType>], column: &str) -> Option<String> {
    let properties = || chain.iter().flat_map(|t| t.properties.iter());
    properties()
        .find(|p| {
            p.mapping
                .as_ref()
                .is_some_and(|m| m.column_name.eq_ignore_ascii_case(column))
        })
        .or_else(|| properties().find(|p| p.name == column))
        .map(|p| p.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fqn(name: &str) -> FullQualifiedName {
        FullQualifiedName::new("Acme", name)
    }

    fn fragment(x: Multiplicity, y: Multiplicity) -> AssociationFragment {
        AssociationFragment::new(
            fqn("XY"),
            FragmentEnd::declared("X", fqn("X"), x),
            FragmentEnd::declared("Y", fqn("Y"), y),
        )
    }

    fn navigation(name: &str, target: &str, kind: AttributeKind) -> NavigationDescriptor {
        NavigationDescriptor::new(name, fqn(target), kind)
    }

    #[test]
    fn test_merge_is_commutative() {
        let a = fragment(Multiplicity::One, Multiplicity::Many);
        let b = fragment(Multiplicity::Many, Multiplicity::One);

        let ab = merge_fragments(&[a.clone(), b.clone()]).unwrap();
        let ba = merge_fragments(&[b, a]).unwrap();

        assert_eq!(ab, ba);
        assert_eq!(ab.end("X").unwrap().multiplicity, Multiplicity::Many);
        assert_eq!(ab.end("Y").unwrap().multiplicity, Multiplicity::Many);
    }

    #[test]
    fn test_two_sides_of_one_to_many() {
        let config = BuildConfig::default();
        let room_side = AssociationFragment::from_navigation(
            &fqn("Room"),
            &navigation("building", "Building", AttributeKind::Navigation(Multiplicity::One)),
            &config,
        )
        .unwrap();
        let building_side = AssociationFragment::from_navigation(
            &fqn("Building"),
            &navigation("rooms", "Room", AttributeKind::Navigation(Multiplicity::Many)),
            &config,
        )
        .unwrap();
        assert_eq!(room_side.name, building_side.name);

        for fragments in [
            vec![room_side.clone(), building_side.clone()],
            vec![building_side, room_side],
        ] {
            let merged = merge_fragments(&fragments).unwrap();
            assert_eq!(merged.name.name(), "BuildingRooms");
            assert_eq!(merged.end("Building").unwrap().multiplicity, Multiplicity::One);
            assert_eq!(merged.end("Room").unwrap().multiplicity, Multiplicity::Many);
        }
    }

    #[test]
    fn test_persistence_kinds() {
        let config = BuildConfig::default();
        let mut many_to_one = navigation("building", "Building", AttributeKind::ManyToOne);
        many_to_one.optional = true;
        let fragment = AssociationFragment::from_navigation(&fqn("Room"), &many_to_one, &config).unwrap();
        assert_eq!(fragment.source.multiplicity, Multiplicity::Many);
        assert_eq!(fragment.target.multiplicity, Multiplicity::ZeroOrOne);

        let basic = navigation("name", "Building", AttributeKind::Basic);
        assert!(AssociationFragment::from_navigation(&fqn("Room"), &basic, &config).is_err());
    }

    #[test]
    fn test_arrival_order_across_three_fragments() {
        let first = AssociationFragment::new(
            fqn("XY"),
            FragmentEnd::inferred("X", fqn("X"), Multiplicity::ZeroOrOne),
            FragmentEnd::declared("Y", fqn("Y"), Multiplicity::One),
        );
        let second = AssociationFragment::new(
            fqn("XY"),
            FragmentEnd::declared("Y", fqn("Y"), Multiplicity::ZeroOrOne),
            FragmentEnd::declared("X", fqn("X"), Multiplicity::One),
        );
        let third = fragment(Multiplicity::Many, Multiplicity::ZeroOrOne);

        let merged = merge_fragments(&[first, second, third]).unwrap();
        assert_eq!(merged.ends[0].role, "X");
        assert_eq!(merged.end("X").unwrap().multiplicity, Multiplicity::Many);
        assert_eq!(merged.end("Y").unwrap().multiplicity, Multiplicity::One);
    }

    #[test]
    fn test_earlier_declared_multiplicity_is_kept() {
        let a = fragment(Multiplicity::One, Multiplicity::One);
        let b = fragment(Multiplicity::ZeroOrOne, Multiplicity::One);

        let merged = merge_fragments(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(merged.end("X").unwrap().multiplicity, Multiplicity::One);
        assert_eq!(merged.end("Y").unwrap().multiplicity, Multiplicity::One);

        let merged = merge_fragments(&[b, a]).unwrap();
        assert_eq!(merged.end("X").unwrap().multiplicity, Multiplicity::ZeroOrOne);
    }

    #[test]
    fn test_role_mismatch_is_conflict() {
        let a = fragment(Multiplicity::One, Multiplicity::Many);
        let b = AssociationFragment::new(
            fqn("XY"),
            FragmentEnd::declared("X", fqn("X"), Multiplicity::One),
            FragmentEnd::declared("Z", fqn("Y"), Multiplicity::One),
        );
        let err = merge_fragments(&[a, b]).unwrap_err();
        assert!(matches!(err, BuildError::ConflictingAssociationDefinition { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_entity_type_mismatch_is_conflict() {
        let a = fragment(Multiplicity::One, Multiplicity::Many);
        let b = AssociationFragment::new(
            fqn("XY"),
            FragmentEnd::declared("X", fqn("X"), Multiplicity::One),
            FragmentEnd::declared("Y", fqn("Other"), Multiplicity::One),
        );
        assert!(merge_fragments(&[a, b]).is_err());
    }

    #[test]
    fn test_group_keeps_first_seen_order() {
        let mut other = fragment(Multiplicity::One, Multiplicity::One);
        other.name = fqn("Other");
        let groups = group_fragments(vec![
            fragment(Multiplicity::One, Multiplicity::Many),
            other,
            fragment(Multiplicity::Many, Multiplicity::One),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, fqn("XY"));
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, fqn("Other"));
    }

    #[test]
    fn test_check_compatible() {
        let merged = merge_fragments(&[fragment(Multiplicity::One, Multiplicity::Many)]).unwrap();
        assert!(check_compatible(&merged, &fragment(Multiplicity::Many, Multiplicity::Many)).is_ok());
        let mut renamed = fragment(Multiplicity::One, Multiplicity::Many);
        renamed.target.role = "W".to_string();
        assert!(check_compatible(&merged, &renamed).is_err());
    }
}
