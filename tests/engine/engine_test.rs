#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use strata::config::{ResolverKind, Settings};
    use strata::engine::{EngineError, ErrorKind, MetadataEngine, RelationshipView};
    use strata::migrate::MigrationError;
    use strata::store::{
        new_id, Database, FieldPatch, FieldType, NewEntity, NewField, NewProject,
        NewRelationship, RelationshipType,
    };
    use strata::validation::ValidationError;

    fn engine() -> MetadataEngine {
        MetadataEngine::start(Database::open_in_memory().unwrap(), Settings::default()).unwrap()
    }

    /// Returns (engine, project id, user id, post id).
    fn blog() -> (MetadataEngine, String, String, String) {
        let engine = engine();
        let project = engine
            .create_project(&new_id(), &NewProject::new("Blog"))
            .unwrap();
        let user = engine
            .create_entity(&new_id(), &NewEntity::new(&project.id, "User"))
            .unwrap();
        let post = engine
            .create_entity(&new_id(), &NewEntity::new(&project.id, "Post"))
            .unwrap();

        let user_pk = engine
            .create_field(
                &new_id(),
                &NewField::new(&user.id, "id", FieldType::Integer).primary_key(),
            )
            .unwrap();
        engine
            .create_field(&new_id(), &NewField::new(&user.id, "email", FieldType::String))
            .unwrap();
        engine
            .create_field(
                &new_id(),
                &NewField::new(&post.id, "id", FieldType::Integer).primary_key(),
            )
            .unwrap();
        engine
            .create_field(
                &new_id(),
                &NewField::new(&post.id, "user_id", FieldType::Integer)
                    .foreign_key(&user.id, Some(user_pk.id.as_str())),
            )
            .unwrap();
        engine
            .create_field(&new_id(), &NewField::new(&post.id, "title", FieldType::String))
            .unwrap();

        (engine, project.id, user.id, post.id)
    }

    #[test]
    fn test_start_migrates_before_serving() {
        let engine = engine();
        assert!(engine.startup_report().is_success());
        assert!(!engine.startup_report().applied.is_empty());
        assert!(!engine.needs_migration().unwrap());
        assert!(engine.get_migration_status().unwrap().is_current());

        let again = engine.run_migrations();
        assert!(again.applied.is_empty());
        assert!(again.failed.is_empty());
        engine.shutdown().unwrap();
    }

    #[test]
    fn test_end_to_end_blog() {
        let (engine, project, user, post) = blog();

        let diagram = engine.generate_diagram(&project).unwrap().unwrap();
        assert_eq!(diagram.nodes.len(), 2);
        assert_eq!(diagram.edges.len(), 1);
        assert_eq!(diagram.edges[0].source, post);
        assert_eq!(diagram.edges[0].target, user);
        assert_eq!(diagram.edges[0].label, "user_id");

        let stats = engine.get_project_stats(&project).unwrap().unwrap();
        assert_eq!(
            (stats.total_entities, stats.total_fields, stats.total_relationships),
            (2, 5, 1)
        );
    }

    #[test]
    fn test_list_relationships_merges_explicit_and_inferred() {
        let (engine, project, user, post) = blog();

        let inferred_only = engine.list_relationships(&project).unwrap().unwrap();
        assert_eq!(inferred_only.len(), 1);
        assert!(inferred_only[0].is_inferred());

        let user_id_field = engine
            .store()
            .list_fields(&post)
            .unwrap()
            .into_iter()
            .find(|f| f.name == "user_id")
            .unwrap();
        engine
            .create_relationship(
                &new_id(),
                &NewRelationship::new(&post, &user, RelationshipType::ManyToOne)
                    .fields(Some(user_id_field.id.as_str()), None)
                    .name("author"),
            )
            .unwrap();

        let merged = engine.list_relationships(&project).unwrap().unwrap();
        assert_eq!(merged.len(), 1);
        assert!(matches!(
            &merged[0],
            RelationshipView::Explicit(rel) if rel.name.as_deref() == Some("author")
        ));

        assert!(engine.list_relationships("nope").unwrap().is_none());
    }

    #[test]
    fn test_validated_mutations_reject_before_storage() {
        let (engine, _project, user, post) = blog();

        let err = engine
            .create_field(
                &new_id(),
                &NewField::new(&post, "owner", FieldType::Integer)
                    .primary_key()
                    .foreign_key(&user, None),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationConflict);
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::PrimaryAndForeignKey { .. })
        ));

        let data = NewRelationship::new(&post, &user, RelationshipType::ManyToOne);
        engine.create_relationship(&new_id(), &data).unwrap();
        let err = engine.create_relationship(&new_id(), &data).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::DuplicateRelationship { .. })
        ));
        assert_eq!(engine.store().list_entity_relationships(&post).unwrap().len(), 1);

        let title = engine
            .store()
            .list_fields(&post)
            .unwrap()
            .into_iter()
            .find(|f| f.name == "title")
            .unwrap();
        let err = engine
            .update_field(
                &title.id,
                &FieldPatch {
                    name: Some("user_id".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::DuplicateFieldName { .. })
        ));
    }

    #[test]
    fn test_storage_constraint_surfaces_unchanged() {
        let (engine, project, _user, _post) = blog();

        let err = engine
            .create_project(&project, &NewProject::new("Again"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageConstraintViolation);
        match err {
            EngineError::Store(store_err) => {
                let source = std::error::Error::source(&store_err).unwrap();
                let sqlite = source.downcast_ref::<rusqlite::Error>().unwrap();
                assert_eq!(
                    sqlite.sqlite_error_code(),
                    Some(rusqlite::ErrorCode::ConstraintViolation)
                );
            }
            other => panic!("expected a store error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_ids_are_not_errors() {
        let engine = engine();
        assert!(engine
            .update_field(
                "missing",
                &FieldPatch {
                    is_unique: Some(true),
                    ..Default::default()
                }
            )
            .unwrap()
            .is_none());
        assert!(engine.generate_diagram("missing").unwrap().is_none());
        assert!(engine.get_project_stats("missing").unwrap().is_none());
        assert!(!engine.store().delete_entity("missing").unwrap());
    }

    #[test]
    fn test_inflection_resolver_from_settings() {
        let mut settings = Settings::default();
        settings.inference.resolver = ResolverKind::Inflection;
        let engine = MetadataEngine::start(Database::open_in_memory().unwrap(), settings).unwrap();

        let project = engine
            .create_project("p1", &NewProject::new("Tasks"))
            .unwrap();
        let task = engine
            .create_entity("task", &NewEntity::new(&project.id, "Task"))
            .unwrap();
        engine
            .create_entity("category", &NewEntity::new(&project.id, "Categories"))
            .unwrap();
        engine
            .create_field("f1", &NewField::new(&task.id, "category_id", FieldType::Integer))
            .unwrap();

        let diagram = engine.generate_diagram("p1").unwrap().unwrap();
        assert_eq!(diagram.edges.len(), 1);
        assert_eq!(diagram.edges[0].target, "category");
    }

    #[test]
    fn test_diagram_settings_drive_layout() {
        let mut settings = Settings::default();
        settings.diagram.node_width = 120;
        settings.diagram.spacing = 30;
        let engine = MetadataEngine::start(Database::open_in_memory().unwrap(), settings).unwrap();
        engine.create_project("p1", &NewProject::new("P")).unwrap();
        engine.create_entity("a", &NewEntity::new("p1", "A")).unwrap();
        engine.create_entity("b", &NewEntity::new("p1", "B")).unwrap();

        let diagram = engine.generate_diagram("p1").unwrap().unwrap();
        assert_eq!(diagram.nodes[1].position.x, 150.0);
        assert_eq!(diagram.nodes[1].width, 120);
    }

    #[test]
    fn test_oversized_node_settings_still_lay_out() {
        let settings =
            Settings::from_toml("[diagram]\nnode_width = 4294967295\nspacing = 50\n").unwrap();
        let engine = MetadataEngine::start(Database::open_in_memory().unwrap(), settings).unwrap();
        engine.create_project("p1", &NewProject::new("P")).unwrap();
        engine.create_entity("a", &NewEntity::new("p1", "A")).unwrap();
        engine.create_entity("b", &NewEntity::new("p1", "B")).unwrap();

        let diagram = engine.generate_diagram("p1").unwrap().unwrap();
        assert_eq!(diagram.nodes[0].position.x, 0.0);
        assert_eq!(diagram.nodes[1].position.x, 4_294_967_345.0);
        assert_eq!(diagram.nodes[1].width, u32::MAX);
    }

    #[test]
    fn test_strict_start_fails_on_broken_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.db");
        {
            // A view squatting on a table name makes the create-table step fail.
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE VIEW entities AS SELECT 1 AS id;").unwrap();
        }

        let mut settings = Settings::default();
        settings.migrations.fail_on_error = true;
        let err = MetadataEngine::start(Database::open(&path).unwrap(), settings).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MigrationStepFailure);
        assert!(matches!(err, EngineError::Migration(MigrationError::Incomplete { .. })));

        // Lenient start logs the failures and serves anyway.
        let engine =
            MetadataEngine::start(Database::open(&path).unwrap(), Settings::default()).unwrap();
        assert!(!engine.startup_report().is_success());
        assert!(engine.needs_migration().unwrap());
    }

    #[test]
    fn test_open_with_settings_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.database.path = Some(dir.path().join("meta.db").display().to_string());

        let engine = MetadataEngine::open(settings.clone()).unwrap();
        engine.create_project("p1", &NewProject::new("Kept")).unwrap();
        engine.shutdown().unwrap();

        let reopened = MetadataEngine::open(settings).unwrap();
        assert!(reopened.startup_report().applied.is_empty());
        assert_eq!(
            reopened.store().get_project("p1").unwrap().unwrap().name,
            "Kept"
        );
    }
}
