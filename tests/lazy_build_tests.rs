//! On-demand build tests

use std::sync::Arc;

use edm_metadata::{
    AnnotatedClass, AnnotatedClassSource, BuildError, EdmBuilder, EdmSimpleType, ElementKind,
    FullQualifiedName, Multiplicity,
};

fn fqn(name: &str) -> FullQualifiedName {
    FullQualifiedName::new("Acme", name)
}

fn source() -> AnnotatedClassSource {
    AnnotatedClassSource::new("Acme")
        .with_class(AnnotatedClass::entity("Building").key("id", EdmSimpleType::Int32))
        .with_class(
            AnnotatedClass::entity("Room")
                .key("id", EdmSimpleType::Int32)
                .navigation("building", "Building", Multiplicity::One),
        )
        .with_on_demand_class(
            AnnotatedClass::entity("Archive")
                .key("id", EdmSimpleType::Guid)
                .navigation("building", "Building", Multiplicity::One),
        )
        .with_on_demand_class(
            AnnotatedClass::entity("Annex")
                .key("id", EdmSimpleType::Int32)
                .navigation("room", "Room", Multiplicity::One)
                .navigation_in(
                    "building",
                    "Building",
                    Multiplicity::One,
                    "BuildingRooms",
                    Some(("Annex", "Building")),
                ),
        )
}

mod lazy_build_tests {
    use super::*;

    #[test]
    fn test_on_demand_type_is_built_once_across_threads() {
        let graph = EdmBuilder::new(source()).build().unwrap();
        assert!(graph.registry().resolve(ElementKind::EntityType, &fqn("Archive")).is_none());

        let built: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| graph.entity_type("Archive").unwrap().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(built.iter().all(|archive| Arc::ptr_eq(archive, &built[0])));
        assert_eq!(built[0].key.property_refs, vec!["id"]);

        let association = graph.association("ArchiveBuildings").unwrap();
        assert_eq!(association.end("Building").unwrap().multiplicity, Multiplicity::One);

        // published containers are fixed at build time
        let container = graph.default_entity_container();
        assert!(container.get_entity_set("Archives").is_none());
        assert!(graph.schema("Acme").unwrap().entity_types.iter().all(|t| t.name != fqn("Archive")));
    }

    #[test]
    fn test_unknown_names_resolve_to_none() {
        let graph = EdmBuilder::new(source()).build().unwrap();
        assert!(graph.entity_type("Ghost").unwrap().is_none());
        assert!(graph.complex_type("Archive").unwrap().is_none());
        assert!(graph.entity_container("Ghost").is_none());
    }

    #[test]
    fn test_conflicting_on_demand_type_is_rolled_back() {
        let graph = EdmBuilder::new(source()).build().unwrap();

        let err = graph.entity_type("Annex").unwrap_err();
        assert!(
            matches!(err, BuildError::ConflictingAssociationDefinition { ref association, .. } if *association == fqn("BuildingRooms")),
            "unexpected error: {err:?}"
        );
        assert!(!graph.registry().contains(ElementKind::EntityType, &fqn("Annex")));
        assert!(graph.entity_type("Annex").is_err());

        let existing = graph.association("BuildingRooms").unwrap();
        assert!(existing.end("Annex").is_none());

        // the compatible association from the same build is not left behind
        assert!(graph.association("AnnexRooms").is_none());
        assert!(graph.validate().is_valid());

        // a later successful on-demand build is unaffected
        assert!(graph.entity_type("Archive").unwrap().is_some());
        assert!(graph.validate().is_valid());
    }
}
