#[cfg(test)]
mod tests {
    use strata::migrate::SchemaEvolver;
    use strata::store::{
        Database, EntityPatch, FieldPatch, FieldType, NewEntity, NewField, NewProject,
        NewRelationship, RelationshipPatch, RelationshipType,
    };
    use strata::validation::{
        validate_entity_patch, validate_field_patch, validate_new_entity, validate_new_field,
        validate_new_project, validate_new_relationship, validate_relationship_patch, CheckError,
        ValidationError,
    };

    fn shop() -> Database {
        let db = Database::open_in_memory().unwrap();
        SchemaEvolver::new(&db).run();
        let store = db.store();
        store.create_project("p1", &NewProject::new("Shop")).unwrap();
        store.create_project("p2", &NewProject::new("Blog")).unwrap();
        store.create_entity("customer", &NewEntity::new("p1", "Customer")).unwrap();
        store.create_entity("order", &NewEntity::new("p1", "Order")).unwrap();
        store.create_entity("post", &NewEntity::new("p2", "Post")).unwrap();
        store
            .create_field(
                "customer.id",
                &NewField::new("customer", "id", FieldType::Integer).primary_key(),
            )
            .unwrap();
        store
            .create_field(
                "order.id",
                &NewField::new("order", "id", FieldType::Integer).primary_key(),
            )
            .unwrap();
        store
            .create_field(
                "order.customer_id",
                &NewField::new("order", "customer_id", FieldType::Integer)
                    .foreign_key("customer", Some("customer.id")),
            )
            .unwrap();
        db
    }

    fn rejection(result: Result<(), CheckError>) -> ValidationError {
        match result {
            Err(CheckError::Invalid(e)) => e,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    // ------------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------------

    #[test]
    fn test_primary_and_foreign_key_rejected() {
        let db = shop();
        let store = db.store();
        let data = NewField::new("order", "ref", FieldType::Integer)
            .primary_key()
            .foreign_key("customer", None);

        let err = rejection(validate_new_field(&store, &data));
        assert_eq!(
            err,
            ValidationError::PrimaryAndForeignKey {
                field: "ref".to_string()
            }
        );
        assert!(store.get_field("order.ref").unwrap().is_none());
    }

    #[test]
    fn test_foreign_key_needs_entity() {
        let db = shop();
        let store = db.store();
        let mut data = NewField::new("order", "parent_id", FieldType::Integer);
        data.is_foreign_key = true;

        let err = rejection(validate_new_field(&store, &data));
        assert!(matches!(err, ValidationError::MissingForeignEntity { .. }));
    }

    #[test]
    fn test_unknown_foreign_entity() {
        let db = shop();
        let store = db.store();
        let data =
            NewField::new("order", "coupon_id", FieldType::Integer).foreign_key("coupon", None);

        let err = rejection(validate_new_field(&store, &data));
        assert_eq!(
            err,
            ValidationError::UnknownForeignEntity {
                field: "coupon_id".to_string(),
                entity_id: "coupon".to_string(),
            }
        );
    }

    #[test]
    fn test_foreign_field_must_belong_to_foreign_entity() {
        let db = shop();
        let store = db.store();
        let data = NewField::new("order", "buyer_id", FieldType::Integer)
            .foreign_key("customer", Some("order.id"));

        let err = rejection(validate_new_field(&store, &data));
        assert_eq!(
            err,
            ValidationError::ForeignFieldMismatch {
                field: "buyer_id".to_string(),
                field_id: "order.id".to_string(),
                entity_id: "customer".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicate_field_name() {
        let db = shop();
        let store = db.store();
        let data = NewField::new("order", "customer_id", FieldType::Integer);

        let err = rejection(validate_new_field(&store, &data));
        assert!(matches!(err, ValidationError::DuplicateFieldName { .. }));
    }

    #[test]
    fn test_field_on_unknown_entity() {
        let db = shop();
        let store = db.store();
        let data = NewField::new("ghost", "name", FieldType::String);

        let err = rejection(validate_new_field(&store, &data));
        assert_eq!(
            err,
            ValidationError::UnknownOwner {
                kind: "entity",
                id: "ghost".to_string()
            }
        );
    }

    #[test]
    fn test_valid_field_passes() {
        let db = shop();
        let store = db.store();
        let data = NewField::new("order", "total", FieldType::Decimal).required();
        assert!(validate_new_field(&store, &data).is_ok());
    }

    #[test]
    fn test_field_patch_checked_against_resulting_field() {
        let db = shop();
        let store = db.store();

        // customer_id is a foreign key; making it a primary key too is rejected.
        let patch = FieldPatch {
            is_primary_key: Some(true),
            ..Default::default()
        };
        let err = rejection(validate_field_patch(&store, "order.customer_id", &patch));
        assert!(matches!(err, ValidationError::PrimaryAndForeignKey { .. }));

        // Dropping the foreign key at the same time makes it valid.
        let patch = FieldPatch {
            is_primary_key: Some(true),
            is_foreign_key: Some(false),
            foreign_entity_id: Some(None),
            foreign_field_id: Some(None),
            ..Default::default()
        };
        assert!(validate_field_patch(&store, "order.customer_id", &patch).is_ok());

        // Renaming onto a sibling's name is rejected, onto its own name is fine.
        let rename = |name: &str| FieldPatch {
            name: Some(name.to_string()),
            ..Default::default()
        };
        let err = rejection(validate_field_patch(&store, "order.customer_id", &rename("id")));
        assert!(matches!(err, ValidationError::DuplicateFieldName { .. }));
        assert!(validate_field_patch(&store, "order.customer_id", &rename("customer_id")).is_ok());

        // Unknown fields are left for the update to report as absent.
        assert!(validate_field_patch(&store, "missing", &rename("x")).is_ok());
    }

    // ------------------------------------------------------------------------
    // Entities and projects
    // ------------------------------------------------------------------------

    #[test]
    fn test_entity_rules() {
        let db = shop();
        let store = db.store();

        let err = rejection(validate_new_entity(&store, &NewEntity::new("p1", "Order")));
        assert!(matches!(err, ValidationError::DuplicateEntityName { .. }));

        // Same name in another project is fine.
        assert!(validate_new_entity(&store, &NewEntity::new("p2", "Order")).is_ok());

        let err = rejection(validate_new_entity(&store, &NewEntity::new("p9", "Order")));
        assert!(matches!(err, ValidationError::UnknownOwner { kind: "project", .. }));

        let err = rejection(validate_new_entity(&store, &NewEntity::new("p1", "  ")));
        assert_eq!(err, ValidationError::EmptyName { kind: "Entity" });

        let patch = EntityPatch {
            name: Some("Customer".to_string()),
            ..Default::default()
        };
        let err = rejection(validate_entity_patch(&store, "order", &patch));
        assert!(matches!(err, ValidationError::DuplicateEntityName { .. }));
        assert!(validate_entity_patch(&store, "customer", &patch).is_ok());
    }

    #[test]
    fn test_project_name_required() {
        assert_eq!(
            validate_new_project(&NewProject::new("")),
            Err(ValidationError::EmptyName { kind: "Project" })
        );
        assert!(validate_new_project(&NewProject::new("Shop")).is_ok());
    }

    // ------------------------------------------------------------------------
    // Relationships
    // ------------------------------------------------------------------------

    #[test]
    fn test_duplicate_relationship_tuple_rejected() {
        let db = shop();
        let store = db.store();
        let data = NewRelationship::new("order", "customer", RelationshipType::ManyToOne);
        store.create_relationship("r1", &data).unwrap();

        // Storage alone would accept this second row: NULL field ids never
        // collide in a UNIQUE index.
        let err = rejection(validate_new_relationship(&store, &data));
        assert_eq!(
            err,
            ValidationError::DuplicateRelationship {
                source_entity_id: "order".to_string(),
                target_entity_id: "customer".to_string(),
            }
        );

        let different = data.clone().fields(Some("order.customer_id"), None);
        assert!(validate_new_relationship(&store, &different).is_ok());
    }

    #[test]
    fn test_relationship_entities_and_fields() {
        let db = shop();
        let store = db.store();

        let err = rejection(validate_new_relationship(
            &store,
            &NewRelationship::new("order", "ghost", RelationshipType::ManyToOne),
        ));
        assert!(matches!(err, ValidationError::UnknownOwner { kind: "target entity", .. }));

        let err = rejection(validate_new_relationship(
            &store,
            &NewRelationship::new("order", "post", RelationshipType::ManyToOne),
        ));
        assert!(matches!(err, ValidationError::CrossProjectRelationship { .. }));

        let err = rejection(validate_new_relationship(
            &store,
            &NewRelationship::new("order", "customer", RelationshipType::ManyToOne)
                .fields(Some("customer.id"), None),
        ));
        assert_eq!(
            err,
            ValidationError::RelationshipFieldMismatch {
                side: "source",
                field_id: "customer.id".to_string(),
                entity_id: "order".to_string(),
            }
        );
    }

    #[test]
    fn test_relationship_patch_excludes_itself() {
        let db = shop();
        let store = db.store();
        store
            .create_relationship(
                "r1",
                &NewRelationship::new("order", "customer", RelationshipType::ManyToOne),
            )
            .unwrap();
        store
            .create_relationship(
                "r2",
                &NewRelationship::new("customer", "order", RelationshipType::OneToMany),
            )
            .unwrap();

        let retype = RelationshipPatch {
            relationship_type: Some(RelationshipType::OneToOne),
            ..Default::default()
        };
        assert!(validate_relationship_patch(&store, "r1", &retype).is_ok());

        let reverse = RelationshipPatch {
            source_entity_id: Some("customer".to_string()),
            target_entity_id: Some("order".to_string()),
            ..Default::default()
        };
        let err = rejection(validate_relationship_patch(&store, "r1", &reverse));
        assert!(matches!(err, ValidationError::DuplicateRelationship { .. }));
    }
}
