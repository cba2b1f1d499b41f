//! The catalogue of additive migration steps.
//!
//! Steps are applied in order. Each one creates a table, adds a column,
//! creates an index or creates a trigger, and is satisfied as soon as the
//! object it creates exists. Nothing here drops, renames or retypes.

use serde::Serialize;

use super::checksum::compute_checksum;
use super::introspect::SchemaSnapshot;

pub const MIGRATION_LOG_TABLE: &str = "schema_migrations";
pub const RELATIONSHIP_TABLE: &str = "entity_relationships";
pub const RELATIONSHIP_TRIGGER: &str = "trg_entity_relationships_updated_at";
pub const FIELDS_TABLE: &str = "fields";

/// Columns every `fields` table has had since the first release.
pub const FIELDS_BASE_COLUMNS: &[&str] = &[
    "id",
    "entity_id",
    "name",
    "type",
    "is_required",
    "is_unique",
    "default_value",
    "max_length",
    "description",
    "created_at",
    "updated_at",
];

/// One structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepAction {
    CreateTable {
        table: &'static str,
        ddl: &'static str,
    },
    AddColumn {
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    },
    CreateIndex {
        name: &'static str,
        ddl: &'static str,
    },
    CreateTrigger {
        name: &'static str,
        ddl: &'static str,
    },
}

/// A named, idempotent migration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationStep {
    pub id: &'static str,
    pub action: StepAction,
}

impl MigrationStep {
    pub const fn create_table(id: &'static str, table: &'static str, ddl: &'static str) -> Self {
        Self {
            id,
            action: StepAction::CreateTable { table, ddl },
        }
    }

    pub const fn add_column(
        id: &'static str,
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    ) -> Self {
        Self {
            id,
            action: StepAction::AddColumn {
                table,
                column,
                definition,
            },
        }
    }

    pub const fn create_index(id: &'static str, name: &'static str, ddl: &'static str) -> Self {
        Self {
            id,
            action: StepAction::CreateIndex { name, ddl },
        }
    }

    pub const fn create_trigger(id: &'static str, name: &'static str, ddl: &'static str) -> Self {
        Self {
            id,
            action: StepAction::CreateTrigger { name, ddl },
        }
    }

    /// The SQL this step executes.
    pub fn sql(&self) -> String {
        match self.action {
            StepAction::CreateTable { ddl, .. }
            | StepAction::CreateIndex { ddl, .. }
            | StepAction::CreateTrigger { ddl, .. } => ddl.to_string(),
            StepAction::AddColumn {
                table,
                column,
                definition,
            } => format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"),
        }
    }

    /// SHA-256 of the step's SQL, recorded in the migration log.
    pub fn checksum(&self) -> String {
        compute_checksum(&self.sql())
    }

    /// Whether the object this step creates already exists.
    pub fn is_satisfied(&self, schema: &SchemaSnapshot) -> bool {
        match self.action {
            StepAction::CreateTable { table, .. } => schema.has_table(table),
            StepAction::AddColumn { table, column, .. } => schema.has_column(table, column),
            StepAction::CreateIndex { name, .. } => schema.has_index(name),
            StepAction::CreateTrigger { name, .. } => schema.has_trigger(name),
        }
    }

    /// Human-readable name of the object this step creates.
    pub fn target(&self) -> String {
        match self.action {
            StepAction::CreateTable { table, .. } => table.to_string(),
            StepAction::AddColumn { table, column, .. } => format!("{table}.{column}"),
            StepAction::CreateIndex { name, .. } | StepAction::CreateTrigger { name, .. } => {
                name.to_string()
            }
        }
    }
}

/// The steps that bring any database up to the current shape.
pub const STEPS: &[MigrationStep] = &[
    MigrationStep::create_table(
        "001_create_schema_migrations",
        MIGRATION_LOG_TABLE,
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            step TEXT PRIMARY KEY,
            checksum TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    ),
    MigrationStep::create_table(
        "002_create_projects",
        "projects",
        "CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    MigrationStep::create_table(
        "003_create_entities",
        "entities",
        "CREATE TABLE IF NOT EXISTS entities (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    MigrationStep::create_table(
        "004_create_fields",
        FIELDS_TABLE,
        "CREATE TABLE IF NOT EXISTS fields (
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
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (entity_id, name)
        )",
    ),
    MigrationStep::add_column(
        "005_fields_is_primary_key",
        FIELDS_TABLE,
        "is_primary_key",
        "INTEGER NOT NULL DEFAULT 0",
    ),
    MigrationStep::add_column(
        "006_fields_is_foreign_key",
        FIELDS_TABLE,
        "is_foreign_key",
        "INTEGER NOT NULL DEFAULT 0",
    ),
    MigrationStep::add_column(
        "007_fields_foreign_entity_id",
        FIELDS_TABLE,
        "foreign_entity_id",
        "TEXT REFERENCES entities(id) ON DELETE SET NULL",
    ),
    MigrationStep::add_column(
        "008_fields_foreign_field_id",
        FIELDS_TABLE,
        "foreign_field_id",
        "TEXT REFERENCES fields(id) ON DELETE SET NULL",
    ),
    MigrationStep::add_column(
        "009_fields_accepts_multiple",
        FIELDS_TABLE,
        "accepts_multiple",
        "INTEGER NOT NULL DEFAULT 0",
    ),
    MigrationStep::add_column(
        "010_fields_max_file_size",
        FIELDS_TABLE,
        "max_file_size",
        "INTEGER",
    ),
    MigrationStep::add_column(
        "011_fields_allowed_extensions",
        FIELDS_TABLE,
        "allowed_extensions",
        "TEXT",
    ),
    MigrationStep::create_table(
        "012_create_entity_relationships",
        RELATIONSHIP_TABLE,
        "CREATE TABLE IF NOT EXISTS entity_relationships (
            id TEXT PRIMARY KEY,
            source_entity_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
            target_entity_id TEXT NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
            relationship_type TEXT NOT NULL CHECK (relationship_type IN
                ('one_to_one', 'one_to_many', 'many_to_one', 'many_to_many')),
            source_field_id TEXT REFERENCES fields(id) ON DELETE SET NULL,
            target_field_id TEXT REFERENCES fields(id) ON DELETE SET NULL,
            name TEXT,
            description TEXT,
            is_required INTEGER NOT NULL DEFAULT 0,
            cascade_delete INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (source_entity_id, target_entity_id, source_field_id, target_field_id)
        )",
    ),
    MigrationStep::create_index(
        "013_idx_entities_project",
        "idx_entities_project",
        "CREATE INDEX IF NOT EXISTS idx_entities_project ON entities(project_id)",
    ),
    MigrationStep::create_index(
        "014_idx_fields_entity",
        "idx_fields_entity",
        "CREATE INDEX IF NOT EXISTS idx_fields_entity ON fields(entity_id)",
    ),
    MigrationStep::create_index(
        "015_idx_fields_foreign_entity",
        "idx_fields_foreign_entity",
        "CREATE INDEX IF NOT EXISTS idx_fields_foreign_entity ON fields(foreign_entity_id)",
    ),
    MigrationStep::create_index(
        "016_idx_relationships_source",
        "idx_relationships_source",
        "CREATE INDEX IF NOT EXISTS idx_relationships_source ON entity_relationships(source_entity_id)",
    ),
    MigrationStep::create_index(
        "017_idx_relationships_target",
        "idx_relationships_target",
        "CREATE INDEX IF NOT EXISTS idx_relationships_target ON entity_relationships(target_entity_id)",
    ),
    MigrationStep::create_trigger(
        "018_trg_relationships_updated_at",
        RELATIONSHIP_TRIGGER,
        "CREATE TRIGGER IF NOT EXISTS trg_entity_relationships_updated_at
         AFTER UPDATE ON entity_relationships
         FOR EACH ROW WHEN NEW.updated_at IS OLD.updated_at
         BEGIN
             UPDATE entity_relationships
             SET updated_at = strftime('%Y-%m-%d %H:%M:%f+00:00', 'now')
             WHERE id = NEW.id;
         END",
    ),
];
