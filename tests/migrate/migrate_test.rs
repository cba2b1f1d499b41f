#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use strata::migrate::{MigrationStep, SchemaEvolver, STEPS};
    use strata::store::{Database, FieldType, NewField, NewRelationship, RelationshipType};

    /// Tables as the first release created them: no key columns on `fields`,
    /// no relationship table, no migration log.
    const LEGACY_SCHEMA: &str = "
        CREATE TABLE projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE TABLE entities (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE TABLE fields (
            id TEXT PRIMARY KEY,
            entity_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            type TEXT NOT NULL DEFAULT 'string',
            is_required INTEGER NOT NULL DEFAULT 0,
            is_unique INTEGER NOT NULL DEFAULT 0,
            default_value TEXT,
            max_length INTEGER,
            description TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        INSERT INTO projects (id, name, created_at, updated_at)
            VALUES ('p1', 'Legacy', '2024-01-01 10:00:00', '2024-01-01 10:00:00');
        INSERT INTO entities (id, project_id, name, created_at, updated_at)
            VALUES ('e1', 'p1', 'Customer', '2024-01-01 10:00:00', '2024-01-01 10:00:00');
        INSERT INTO fields (id, entity_id, name, type, is_required, max_length, created_at, updated_at)
            VALUES ('f1', 'e1', 'email', 'string', 1, 120, '2024-01-01 10:00:01', '2024-01-01 10:00:01');
        INSERT INTO fields (id, entity_id, name, type, created_at, updated_at)
            VALUES ('f2', 'e1', 'avatar', 'image', '2024-01-01 10:00:02', '2024-01-01 10:00:02');
    ";

    fn legacy_database(dir: &tempfile::TempDir) -> Database {
        let path = dir.path().join("legacy.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(LEGACY_SCHEMA).unwrap();
        conn.close().unwrap();
        Database::open(&path).unwrap()
    }

    #[test]
    fn test_second_run_performs_no_writes() {
        let db = Database::open_in_memory().unwrap();
        let evolver = SchemaEvolver::new(&db);
        assert!(evolver.run().is_success());

        let status_before = evolver.status().unwrap();
        let schema_version = db.schema_version().unwrap();
        let changes = db.total_changes().unwrap();

        let report = evolver.run();
        assert!(report.applied.is_empty());
        assert!(report.failed.is_empty());
        assert_eq!(report.skipped.len(), STEPS.len());

        assert_eq!(db.schema_version().unwrap(), schema_version);
        assert_eq!(db.total_changes().unwrap(), changes);
        assert_eq!(evolver.status().unwrap(), status_before);
    }

    #[test]
    fn test_status_is_read_only() {
        let db = Database::open_in_memory().unwrap();
        let evolver = SchemaEvolver::new(&db);

        let schema_version = db.schema_version().unwrap();
        evolver.status().unwrap();
        evolver.needs_migration().unwrap();
        assert_eq!(db.schema_version().unwrap(), schema_version);
        assert_eq!(db.total_changes().unwrap(), 0);
    }

    #[test]
    fn test_current_database_status() {
        let db = Database::open_in_memory().unwrap();
        let evolver = SchemaEvolver::new(&db);
        evolver.run();

        let status = evolver.status().unwrap();
        assert!(status.is_current());
        assert!(status.missing_columns.is_empty());
        assert!(status.present_columns.contains(&"allowed_extensions".to_string()));
        assert!(status.relationship_table_present);
        assert!(status.relationship_trigger_present);
        assert_eq!(status.relationship_row_count, 0);
    }

    #[test]
    fn test_legacy_upgrade_adds_columns_and_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let db = legacy_database(&dir);
        let evolver = SchemaEvolver::new(&db);

        let status = evolver.status().unwrap();
        assert_eq!(
            status.missing_columns,
            [
                "is_primary_key",
                "is_foreign_key",
                "foreign_entity_id",
                "foreign_field_id",
                "accepts_multiple",
                "max_file_size",
                "allowed_extensions",
            ]
        );
        assert_eq!(status.present_columns.len(), 11);
        assert!(!status.relationship_table_present);

        let report = evolver.run();
        assert!(report.is_success(), "{:?}", report.failed);
        assert!(report.skipped.contains(&"004_create_fields"));
        assert!(report.applied.contains(&"005_fields_is_primary_key"));
        assert!(report.applied.contains(&"012_create_entity_relationships"));
        assert!(!evolver.needs_migration().unwrap());

        let store = db.store();
        let email = store.get_field("f1").unwrap().unwrap();
        assert_eq!(email.name, "email");
        assert!(email.is_required);
        assert_eq!(email.max_length, Some(120));
        assert!(!email.is_primary_key);
        assert!(!email.is_foreign_key);
        assert_eq!(email.foreign_entity_id, None);
        assert_eq!(email.allowed_extensions, None);

        let avatar = store.get_field("f2").unwrap().unwrap();
        assert_eq!(avatar.field_type, FieldType::Image);
        assert!(!avatar.accepts_multiple);
        assert_eq!(store.list_fields("e1").unwrap().len(), 2);
    }

    #[test]
    fn test_upgraded_legacy_database_is_fully_usable() {
        let dir = tempfile::tempdir().unwrap();
        let db = legacy_database(&dir);
        SchemaEvolver::new(&db).run();
        let store = db.store();

        store
            .create_field(
                "f3",
                &NewField::new("e1", "referrer_id", FieldType::Integer).foreign_key("e1", None),
            )
            .unwrap();
        store
            .create_relationship(
                "r1",
                &NewRelationship::new("e1", "e1", RelationshipType::ManyToOne)
                    .fields(Some("f3"), None),
            )
            .unwrap();

        let status = SchemaEvolver::new(&db).status().unwrap();
        assert_eq!(status.relationship_row_count, 1);
    }

    #[test]
    fn test_applied_steps_are_logged_with_checksums() {
        let dir = tempfile::tempdir().unwrap();
        let db = legacy_database(&dir);
        let evolver = SchemaEvolver::new(&db);
        assert!(evolver.applied_steps().unwrap().is_empty());

        let report = evolver.run();
        let logged = evolver.applied_steps().unwrap();

        // The log table is created by the first step, so every applied step
        // after it is recorded, including the log itself.
        assert_eq!(logged.len(), report.applied.len());
        for entry in &logged {
            let step = STEPS.iter().find(|s| s.id == entry.step).unwrap();
            assert_eq!(entry.checksum, step.checksum());
        }
        assert!(logged.iter().all(|e| e.step != "004_create_fields"));
    }

    #[test]
    fn test_failing_step_does_not_stop_later_steps() {
        let db = Database::open_in_memory().unwrap();
        let steps = vec![
            STEPS[0],
            STEPS[1],
            MigrationStep::create_table(
                "002a_broken",
                "broken",
                "CREATE TABLE broken (id TEXT PRIMARY KEY,",
            ),
            STEPS[2],
            MigrationStep::add_column("002b_missing_table", "nowhere", "flag", "INTEGER"),
            MigrationStep::create_index(
                "002c_idx_entities_project",
                "idx_entities_project",
                "CREATE INDEX IF NOT EXISTS idx_entities_project ON entities(project_id)",
            ),
        ];
        let evolver = SchemaEvolver::with_steps(&db, &steps);

        let report = evolver.run();
        let failed: Vec<&str> = report.failed.iter().map(|f| f.step).collect();
        assert_eq!(failed, ["002a_broken", "002b_missing_table"]);
        assert_eq!(
            report.applied,
            [
                "001_create_schema_migrations",
                "002_create_projects",
                "003_create_entities",
                "002c_idx_entities_project",
            ]
        );

        // Failed steps stay pending and are retried on the next run.
        assert!(evolver.needs_migration().unwrap());
        let retry = evolver.run();
        assert_eq!(retry.failed.len(), 2);
        assert!(retry.applied.is_empty());
        assert!(retry.into_result().is_err());
    }
}
