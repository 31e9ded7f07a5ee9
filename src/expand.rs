//! Complex-property expansion
//!
//! `expand` appends the leaf simple properties of a (possibly nested) complex
//! type as `<prefix>_<leaf>`, which is how embedded keys are flattened onto
//! their entity. `flatten` keeps every intermediate property name in the
//! result (`A_B_C`) for consumers that need a path-qualified view.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::BuildError;
use crate::models::{ComplexType, FullQualifiedName, Property, PropertyMapping, PropertyType};

/// Default nesting guard when no `BuildConfig` is at hand
pub const DEFAULT_MAX_NESTING: usize = 32;

/// Lookup of built complex types by qualified name
pub trait ComplexTypeProvider {
    fn complex_type(&self, name: &FullQualifiedName) -> Option<Arc<ComplexType>>;
}

impl ComplexTypeProvider for HashMap<FullQualifiedName, Arc<ComplexType>> {
    fn complex_type(&self, name: &FullQualifiedName) -> Option<Arc<ComplexType>> {
        self.get(name).cloned()
    }
}

impl ComplexTypeProvider for [Arc<ComplexType>] {
    fn complex_type(&self, name: &FullQualifiedName) -> Option<Arc<ComplexType>> {
        self.iter().find(|c| c.name == *name).cloned()
    }
}

impl ComplexTypeProvider for Vec<Arc<ComplexType>> {
    fn complex_type(&self, name: &FullQualifiedName) -> Option<Arc<ComplexType>> {
        self.as_slice().complex_type(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Naming {
    /// `<prefix>_<leaf>`
    Qualifier,
    /// `<prefix>_<nested>..._<leaf>`
    Path,
}

/// Expands complex types into leaf simple properties
pub struct Expander<'a> {
    provider: &'a dyn ComplexTypeProvider,
    max_nesting: usize,
}

impl<'a> Expander<'a> {
    pub fn new(provider: &'a dyn ComplexTypeProvider) -> Self {
        Self {
            provider,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }

    pub fn with_max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting.max(1);
        self
    }

    /// Append the leaves of `complex` to `into`, each named `<prefix>_<leaf>`
    ///
    /// Leaves come in declaration order, depth-first, with base-type members
    /// ahead of the type's own.
    pub fn expand(
        &self,
        complex: &ComplexType,
        into: &mut Vec<Property>,
        prefix: &str,
    ) -> Result<(), BuildError> {
        let mut stack = Vec::new();
        self.walk(complex, into, prefix, &mut Vec::new(), &mut stack, Naming::Qualifier)
    }

    /// Append the leaves of `complex` to `into`, named by their full path under `prefix`
    pub fn flatten(
        &self,
        complex: &ComplexType,
        into: &mut Vec<Property>,
        prefix: &str,
    ) -> Result<(), BuildError> {
        let mut stack = Vec::new();
        self.walk(complex, into, prefix, &mut Vec::new(), &mut stack, Naming::Path)
    }

    fn walk(
        &self,
        complex: &ComplexType,
        into: &mut Vec<Property>,
        prefix: &str,
        path: &mut Vec<String>,
        stack: &mut Vec<FullQualifiedName>,
        naming: Naming,
    ) -> Result<(), BuildError> {
        if let Some(position) = stack.iter().position(|name| *name == complex.name) {
            let mut cycle = stack[position..].to_vec();
            cycle.push(complex.name.clone());
            return Err(BuildError::CyclicComplexType {
                complex_type: complex.name.clone(),
                path: cycle,
            });
        }
        if stack.len() >= self.max_nesting {
            return Err(BuildError::model(
                &complex.name,
                format!("complex nesting exceeds {} levels", self.max_nesting),
            ));
        }
        stack.push(complex.name.clone());

        if let Some(base) = &complex.base_type {
            let base_type = self.lookup(base)?;
            self.walk(&base_type, into, prefix, path, stack, naming)?;
        }

        for property in &complex.properties {
            path.push(property.name.clone());
            match &property.property_type {
                PropertyType::Simple(_) => {
                    let name = match naming {
                        Naming::Qualifier => format!("{}_{}", prefix, property.name),
                        Naming::Path => format!("{}_{}", prefix, path.join("_")),
                    };
                    if into.iter().any(|p| p.name == name) {
                        return Err(BuildError::model(
                            &complex.name,
                            format!("expanded property name '{}' is not unique", name),
                        ));
                    }
                    let column_name = property
                        .mapping
                        .as_ref()
                        .map(|m| m.column_name.clone())
                        .unwrap_or_else(|| name.clone());
                    let mut leaf = property.clone();
                    leaf.name = name;
                    leaf.mapping = Some(PropertyMapping {
                        column_name,
                        source_path: format!("{}.{}", prefix, path.join(".")),
                    });
                    into.push(leaf);
                }
                PropertyType::Complex(nested) => {
                    let nested_type = self.lookup(nested)?;
                    self.walk(&nested_type, into, prefix, path, stack, naming)?;
                }
            }
            path.pop();
        }

        stack.pop();
        Ok(())
    }

    fn lookup(&self, name: &FullQualifiedName) -> Result<Arc<ComplexType>, BuildError> {
        self.provider
            .complex_type(name)
            .ok_or_else(|| BuildError::UnresolvableType(name.clone()))
    }
}

/// Expand `complex` into `into` with the default nesting guard
pub fn expand(
    complex: &ComplexType,
    provider: &dyn ComplexTypeProvider,
    into: &mut Vec<Property>,
    prefix: &str,
) -> Result<(), BuildError> {
    Expander::new(provider).expand(complex, into, prefix)
}

/// Path-qualified flattening of `complex` with the default nesting guard
pub fn flatten(
    complex: &ComplexType,
    provider: &dyn ComplexTypeProvider,
    into: &mut Vec<Property>,
    prefix: &str,
) -> Result<(), BuildError> {
    Expander::new(provider).flatten(complex, into, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EdmSimpleType;

    fn fqn(name: &str) -> FullQualifiedName {
        FullQualifiedName::new("Acme", name)
    }

    fn int(name: &str) -> Property {
        Property::simple(name, EdmSimpleType::Int32)
    }

    fn nested_key_types() -> (Arc<ComplexType>, Vec<Arc<ComplexType>>) {
        let inner = Arc::new(ComplexType::new(fqn("Inner"), vec![int("D"), int("E")]));
        let outer = Arc::new(ComplexType::new(
            fqn("Outer"),
            vec![int("A"), int("B"), Property::complex("C", fqn("Inner"))],
        ));
        (outer.clone(), vec![outer, inner])
    }

    #[test]
    fn test_expand_is_depth_first_in_declaration_order() {
        let (outer, provider) = nested_key_types();
        let mut into = Vec::new();
        expand(&outer, &provider, &mut into, "key").unwrap();

        let names: Vec<&str> = into.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["key_A", "key_B", "key_D", "key_E"]);
        assert_eq!(into[2].mapping.as_ref().unwrap().source_path, "key.C.D");
    }

    #[test]
    fn test_flatten_keeps_intermediate_names() {
        let (outer, provider) = nested_key_types();
        let mut into = Vec::new();
        flatten(&outer, &provider, &mut into, "id").unwrap();

        let names: Vec<&str> = into.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id_A", "id_B", "id_C_D", "id_C_E"]);
    }

    #[test]
    fn test_self_containing_type_is_rejected() {
        let x = Arc::new(ComplexType::new(fqn("X"), vec![Property::complex("x", fqn("X"))]));
        let provider = vec![x.clone()];
        let mut into = Vec::new();

        let err = expand(&x, &provider, &mut into, "key").unwrap_err();
        assert_eq!(
            err,
            BuildError::CyclicComplexType {
                complex_type: fqn("X"),
                path: vec![fqn("X"), fqn("X")],
            }
        );
    }

    #[test]
    fn test_repeated_type_is_not_a_cycle() {
        let address = Arc::new(ComplexType::new(fqn("Address"), vec![int("Zip")]));
        let site = Arc::new(ComplexType::new(
            fqn("Site"),
            vec![
                Property::complex("billing", fqn("Address")),
                Property::complex("shipping", fqn("Address")),
            ],
        ));
        let provider = vec![site.clone(), address];
        let mut into = Vec::new();
        flatten(&site, &provider, &mut into, "site").unwrap();
        assert_eq!(into.len(), 2);
        assert_eq!(into[1].name, "site_shipping_Zip");
    }

    #[test]
    fn test_qualifier_naming_rejects_colliding_leaves() {
        let address = Arc::new(ComplexType::new(fqn("Address"), vec![int("Zip")]));
        let site = Arc::new(ComplexType::new(
            fqn("Site"),
            vec![
                Property::complex("billing", fqn("Address")),
                Property::complex("shipping", fqn("Address")),
            ],
        ));
        let provider = vec![site.clone(), address];
        let mut into = Vec::new();
        let err = expand(&site, &provider, &mut into, "site").unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_base_type_members_come_first() {
        let base = Arc::new(ComplexType::new(fqn("Base"), vec![int("Id")]));
        let derived = Arc::new(
            ComplexType::new(fqn("Derived"), vec![int("Extra")]).with_base_type(fqn("Base")),
        );
        let provider = vec![base, derived.clone()];
        let mut into = Vec::new();
        expand(&derived, &provider, &mut into, "k").unwrap();
        assert_eq!(into[0].name, "k_Id");
        assert_eq!(into[1].name, "k_Extra");
    }

    #[test]
    fn test_nesting_guard() {
        let (outer, provider) = nested_key_types();
        let mut into = Vec::new();
        let err = Expander::new(&provider)
            .with_max_nesting(1)
            .expand(&outer, &mut into, "key")
            .unwrap_err();
        assert!(matches!(err, BuildError::Model { .. }));
    }

    #[test]
    fn test_missing_nested_type_is_unresolvable() {
        let (outer, _) = nested_key_types();
        let provider: Vec<Arc<ComplexType>> = vec![outer.clone()];
        let mut into = Vec::new();
        let err = expand(&outer, &provider, &mut into, "key").unwrap_err();
        assert_eq!(err, BuildError::UnresolvableType(fqn("Inner")));
    }
}
