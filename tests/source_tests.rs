//! Metadata source tests

use std::sync::Arc;

use edm_metadata::models::{EdmSimpleType, Multiplicity, TypeReference};
use edm_metadata::source::metamodel::{Attribute, ManagedType};
use edm_metadata::source::AttributeKind;
use edm_metadata::{
    BuildError, EdmBuilder, ElementKind, EntityType, ExternalSchemaSource, FullQualifiedName,
    MappingModel, PersistenceMetamodelSource, PersistenceUnit, Registry, SchemaElement,
};

fn facilities_unit() -> PersistenceUnit {
    PersistenceUnit::new("Facilities")
        .with_type(
            ManagedType::mapped_superclass("com.acme.Audited")
                .attribute(Attribute::version("revision", "long"))
                .attribute(Attribute::basic("createdBy", "java.lang.String").length(64)),
        )
        .with_type(
            ManagedType::entity("com.acme.Building")
                .extends("com.acme.Audited")
                .attribute(Attribute::id("id", "int"))
                .attribute(Attribute::relationship("rooms", AttributeKind::OneToMany, "com.acme.Room")),
        )
        .with_type(
            ManagedType::entity("com.acme.Room")
                .attribute(Attribute::id("id", "java.lang.Integer").column("ROOM_ID"))
                .attribute(Attribute::basic("buildingId", "int").column("BUILDING_ID"))
                .attribute(Attribute::embedded("address", "com.acme.Address"))
                .attribute(
                    Attribute::relationship("building", AttributeKind::ManyToOne, "com.acme.Building")
                        .required()
                        .join_column("BUILDING_ID", "id"),
                ),
        )
        .with_type(
            ManagedType::embeddable("com.acme.Address")
                .attribute(Attribute::basic("city", "java.lang.String").length(80))
                .attribute(Attribute::basic("postcode", "java.lang.String")),
        )
}

mod metamodel_tests {
    use super::*;

    fn fqn(name: &str) -> FullQualifiedName {
        FullQualifiedName::new("Facilities", name)
    }

    #[test]
    fn test_persistence_unit_graph() {
        let graph = EdmBuilder::new(PersistenceMetamodelSource::new(facilities_unit()))
            .build()
            .unwrap();
        assert_eq!(graph.report().source, "metamodel:Facilities");

        let building = graph.entity_type("Building").unwrap().unwrap();
        let revision = building.property("revision").unwrap();
        assert!(revision.concurrency_token);
        assert_eq!(revision.simple_type(), Some(EdmSimpleType::Int64));
        assert_eq!(building.property("createdBy").unwrap().facets.max_length, Some(64));

        let room = graph.entity_type("Room").unwrap().unwrap();
        assert_eq!(room.key.property_refs, vec!["id"]);
        assert!(!room.property("id").unwrap().facets.is_nullable());
        assert_eq!(
            room.property("id").unwrap().mapping.as_ref().unwrap().column_name,
            "ROOM_ID"
        );
        assert_eq!(
            room.property("address").unwrap().property_type.as_complex(),
            Some(&fqn("Address"))
        );

        let association = graph.association("BuildingRooms").unwrap();
        assert_eq!(association.end("Building").unwrap().multiplicity, Multiplicity::One);
        assert_eq!(association.end("Room").unwrap().multiplicity, Multiplicity::Many);
        let constraint = association.referential_constraint.as_ref().unwrap();
        assert_eq!(constraint.principal.role, "Building");
        assert_eq!(constraint.principal.property_refs, vec!["id"]);
        assert_eq!(constraint.dependent.role, "Room");
        assert_eq!(constraint.dependent.property_refs, vec!["buildingId"]);

        let container = graph.default_entity_container();
        assert_eq!(container.name, "FacilitiesContainer");
        assert!(container.get_entity_set("Rooms").is_some());
        assert!(container.get_entity_set("Audited").is_none());
    }

    #[test]
    fn test_mapping_shapes_the_graph() {
        let mapping = MappingModel::from_yaml(
            r#"
namespace: Campus
entityTypes:
  - className: com.acme.Room
    edmName: Space
    entitySet: Spaces
    properties:
      - attribute: buildingId
        edmName: siteId
  - className: com.acme.Building
    navigationProperties:
      - attribute: rooms
        edmName: spaces
complexTypes:
  - className: com.acme.Address
    properties:
      - attribute: postcode
        exclude: true
"#,
        )
        .unwrap();
        let source = PersistenceMetamodelSource::new(facilities_unit()).with_mapping(mapping);
        let graph = EdmBuilder::new(source).build().unwrap();

        let space = graph.entity_type("Campus.Space").unwrap().unwrap();
        assert!(space.property("siteId").is_some());
        assert!(graph.entity_type("Room").unwrap().is_none());

        let address = graph.complex_type("Address").unwrap().unwrap();
        assert!(address.property("city").is_some());
        assert!(address.property("postcode").is_none());

        let building = graph.entity_type("Building").unwrap().unwrap();
        let spaces = building.navigation_property("spaces").unwrap();
        assert_eq!(spaces.relationship, FullQualifiedName::new("Campus", "BuildingSpaces"));

        let container = graph.default_entity_container();
        assert_eq!(container.name, "CampusContainer");
        assert!(container.get_entity_set("Spaces").is_some());

        let association = graph.association("BuildingSpaces").unwrap();
        let constraint = association.referential_constraint.as_ref().unwrap();
        assert_eq!(constraint.dependent.property_refs, vec!["siteId"]);
    }
}

mod document_tests {
    use super::*;

    const DOCUMENT: &str = r#"
schemas:
  - namespace: Acme
    entityTypes:
      - name: Room
        key: [id]
        entitySet: AllRooms
        properties:
          - { name: id, type: Edm.Int32, nullable: false }
          - { name: address, type: Address }
        navigationProperties:
          - { name: building, target: Acme.Sites.Building, multiplicity: "1" }
    complexTypes:
      - name: Address
        properties:
          - { name: city, type: Edm.String, maxLength: 80 }
    entityContainers:
      - name: Facilities
        isDefault: true
        exposeAllEntityTypes: true
        functionImports:
          - name: RoomsByCity
            returnType: Room
            returnMultiplicity: "*"
            parameters:
              - { name: city, type: Edm.String }
  - namespace: Acme.Sites
    entityTypes:
      - name: Building
        embeddedKey: id
        properties:
          - { name: id, type: SiteId }
    complexTypes:
      - name: SiteId
        properties:
          - { name: region, type: Edm.String }
          - { name: number, type: Edm.Int32 }
"#;

    #[test]
    fn test_document_graph_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facilities.yaml");
        std::fs::write(&path, DOCUMENT).unwrap();

        let source = ExternalSchemaSource::from_path(&path).unwrap();
        let graph = EdmBuilder::new(source).build().unwrap();
        assert_eq!(graph.schemas().count(), 2);

        let building = graph.entity_type("Acme.Sites.Building").unwrap().unwrap();
        assert_eq!(building.key.property_refs, vec!["id_region", "id_number"]);

        let room = graph.entity_type("Room").unwrap().unwrap();
        let navigation = room.navigation_property("building").unwrap();
        let association = graph.association(&navigation.relationship.to_string()).unwrap();
        assert_eq!(
            association.end(&navigation.to_role).unwrap().multiplicity,
            Multiplicity::One
        );

        let container = graph.default_entity_container();
        assert_eq!(container.name, "Facilities");
        let rooms = container.get_entity_set("AllRooms").unwrap();
        assert!(container.get_entity_set("Buildings").is_some());
        assert!(container.get_association_set(&rooms, navigation).is_some());

        let rooms_by_city = container.get_function_import("RoomsByCity").unwrap();
        let return_type = rooms_by_city.return_type.as_ref().unwrap();
        assert_eq!(
            return_type.type_ref,
            TypeReference::Entity(FullQualifiedName::new("Acme", "Room"))
        );
        assert_eq!(return_type.multiplicity, Multiplicity::Many);
        assert_eq!(rooms_by_city.entity_set.as_deref(), Some("AllRooms"));

        let flattened = graph.flatten_complex_property("Room", "address").unwrap();
        assert_eq!(flattened.len(), 1);
        assert_eq!(flattened[0].name, "address_city");
        assert_eq!(flattened[0].facets.max_length, Some(80));
    }

    #[test]
    fn test_document_type_errors() {
        let json = r#"{"schemas": [{"namespace": "Shop", "entityTypes": [
            {"name": "Order", "key": ["id"], "properties": [{"name": "id", "type": "Edm.Quaternion"}]}
        ]}]}"#;
        let source = ExternalSchemaSource::from_json_str(json).unwrap();
        let err = EdmBuilder::new(source).build().unwrap_err();
        assert_eq!(
            err,
            BuildError::Aggregate(vec![BuildError::UnknownSimpleType("Edm.Quaternion".to_string())])
        );
    }
}

mod registry_tests {
    use super::*;

    #[test]
    fn test_duplicate_registration() {
        let registry = Registry::new();
        let name = FullQualifiedName::new("Acme", "Room");
        let room = Arc::new(EntityType::new(name.clone()));

        registry
            .register(name.clone(), SchemaElement::EntityType(room.clone()))
            .unwrap();
        // same instance again is a no-op
        registry
            .register(name.clone(), SchemaElement::EntityType(room.clone()))
            .unwrap();

        let err = registry
            .register(name.clone(), SchemaElement::EntityType(Arc::new(EntityType::new(name.clone()))))
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::DuplicateRegistration {
                kind: ElementKind::EntityType,
                name: name.clone(),
            }
        );
        let resolved = registry.entity_type(&name).unwrap();
        assert!(Arc::ptr_eq(&resolved, &room));
    }
}
