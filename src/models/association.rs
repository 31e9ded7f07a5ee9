//! Association and association set models

use serde::{Deserialize, Serialize};
use std::fmt;

use super::name::FullQualifiedName;

/// Cardinality of one end of an association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Multiplicity {
    #[serde(alias = "0..1")]
    ZeroOrOne,
    #[serde(alias = "1")]
    One,
    #[serde(alias = "*")]
    Many,
}

impl Multiplicity {
    pub fn is_many(&self) -> bool {
        matches!(self, Multiplicity::Many)
    }

    /// Protocol notation (`0..1`, `1`, `*`)
    pub fn symbol(&self) -> &'static str {
        match self {
            Multiplicity::ZeroOrOne => "0..1",
            Multiplicity::One => "1",
            Multiplicity::Many => "*",
        }
    }
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One end of an association
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationEnd {
    pub role: String,
    pub entity_type: FullQualifiedName,
    pub multiplicity: Multiplicity,
}

/// Property references for one side of a referential constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferentialConstraintRole {
    pub role: String,
    pub property_refs: Vec<String>,
}

/// Dependent-to-principal property mapping derived from join columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferentialConstraint {
    pub principal: ReferentialConstraintRole,
    pub dependent: ReferentialConstraintRole,
}

/// A relationship between two entity types
///
/// Role names within one association are distinct. Multiplicities are final
/// once the association is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
    pub name: FullQualifiedName,
    pub ends: [AssociationEnd; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referential_constraint: Option<ReferentialConstraint>,
}

impl Association {
    /// End with the given role name
    pub fn end(&self, role: &str) -> Option<&AssociationEnd> {
        self.ends.iter().find(|e| e.role == role)
    }

    /// The end that is not `role`
    pub fn other_end(&self, role: &str) -> Option<&AssociationEnd> {
        if self.ends[0].role == role {
            Some(&self.ends[1])
        } else if self.ends[1].role == role {
            Some(&self.ends[0])
        } else {
            None
        }
    }

    pub fn roles(&self) -> [&str; 2] {
        [self.ends[0].role.as_str(), self.ends[1].role.as_str()]
    }
}

/// Pairs an association role with an entity set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationSetEnd {
    pub role: String,
    pub entity_set: String,
}

/// Association instantiated between two entity sets of one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationSet {
    pub name: String,
    pub association: FullQualifiedName,
    pub ends: [AssociationSetEnd; 2],
}

impl AssociationSet {
    pub fn end(&self, role: &str) -> Option<&AssociationSetEnd> {
        self.ends.iter().find(|e| e.role == role)
    }

    /// Whether this set connects `entity_set` through `role` of `association`
    pub fn connects(&self, association: &FullQualifiedName, role: &str, entity_set: &str) -> bool {
        self.association == *association
            && self
                .end(role)
                .is_some_and(|end| end.entity_set == entity_set)
    }
}
