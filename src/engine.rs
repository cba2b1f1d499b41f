//! The metadata engine facade.
//!
//! Owns the [`Database`], brings its schema up to date on start, and then
//! serves validated mutations and the read projections (diagram,
//! relationship listing, statistics).
//!
//! # Example
//!
//! ```ignore
//! use strata::config::Settings;
//! use strata::engine::MetadataEngine;
//! use strata::store::{new_id, Database, NewProject};
//!
//! let engine = MetadataEngine::start(Database::open_in_memory()?, Settings::default())?;
//! let project = engine.create_project(&new_id(), &NewProject::new("Blog"))?;
//! let diagram = engine.generate_diagram(&project.id)?;
//! engine.shutdown()?;
//! ```

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{Settings, SettingsError};
use crate::diagram::{Diagram, DiagramComposer, GridLayout, ProjectStats};
use crate::inference::{resolver_for, EntityResolver, InferredRelationship, RelationshipInferencer};
use crate::migrate::{MigrationError, MigrationReport, MigrationStatus, SchemaEvolver};
use crate::store::{
    Database, Entity, EntityPatch, EntityRelationship, Field, FieldPatch, MetadataStore,
    NewEntity, NewField, NewProject, NewRelationship, Project, ProjectPatch, RelationshipPatch,
    StoreError,
};
use crate::validation::{self, CheckError, ValidationError};

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by the engine.
///
/// Absent records are not errors: lookups and updates return `None`,
/// deletes return `false`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl From<CheckError> for EngineError {
    fn from(err: CheckError) -> Self {
        match err {
            CheckError::Invalid(e) => Self::Validation(e),
            CheckError::Store(e) => Self::Store(e),
        }
    }
}

/// Coarse classification for callers that map failures to responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A mutation broke a metadata invariant and was not attempted.
    ValidationConflict,
    /// SQLite rejected a write.
    StorageConstraintViolation,
    /// One or more migration steps failed.
    MigrationStepFailure,
    /// Any other storage failure.
    Storage,
    /// Bad or unreadable configuration.
    Configuration,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationConflict,
            Self::Store(e) if e.is_constraint_violation() => ErrorKind::StorageConstraintViolation,
            Self::Store(_) => ErrorKind::Storage,
            Self::Migration(MigrationError::Incomplete { .. }) => ErrorKind::MigrationStepFailure,
            Self::Migration(MigrationError::Introspection(_)) => ErrorKind::Storage,
            Self::Settings(_) => ErrorKind::Configuration,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

// ============================================================================
// Relationship listing
// ============================================================================

/// One entry of [`MetadataEngine::list_relationships`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "origin", rename_all = "snake_case")]
pub enum RelationshipView {
    Explicit(EntityRelationship),
    Inferred(InferredRelationship),
}

impl RelationshipView {
    pub fn source_entity_id(&self) -> &str {
        match self {
            Self::Explicit(rel) => &rel.source_entity_id,
            Self::Inferred(rel) => &rel.source_entity_id,
        }
    }

    pub fn target_entity_id(&self) -> &str {
        match self {
            Self::Explicit(rel) => &rel.target_entity_id,
            Self::Inferred(rel) => &rel.target_entity_id,
        }
    }

    pub fn is_inferred(&self) -> bool {
        matches!(self, Self::Inferred(_))
    }
}

/// Explicit rows first, then inferred relationships that no explicit row
/// already states (same source entity, target entity and source field).
fn merge_relationships(
    explicit: Vec<EntityRelationship>,
    inferred: Vec<InferredRelationship>,
) -> Vec<RelationshipView> {
    let covered = |rel: &InferredRelationship| {
        explicit.iter().any(|e| {
            e.source_entity_id == rel.source_entity_id
                && e.target_entity_id == rel.target_entity_id
                && e.source_field_id.as_deref() == Some(rel.field_id.as_str())
        })
    };
    let inferred: Vec<RelationshipView> = inferred
        .into_iter()
        .filter(|rel| !covered(rel))
        .map(RelationshipView::Inferred)
        .collect();

    explicit
        .into_iter()
        .map(RelationshipView::Explicit)
        .chain(inferred)
        .collect()
}

// ============================================================================
// Engine
// ============================================================================

/// The metadata engine.
pub struct MetadataEngine {
    db: Database,
    settings: Settings,
    resolver: Box<dyn EntityResolver>,
    startup: MigrationReport,
}

impl MetadataEngine {
    /// Open the configured database and start the engine.
    pub fn open(settings: Settings) -> EngineResult<Self> {
        let db = Database::open_with(&settings.database)?;
        Self::start(db, settings)
    }

    /// Run schema evolution to completion, then return a serving engine.
    ///
    /// Failed steps are logged. With `migrations.fail_on_error` set they are
    /// returned as [`MigrationError::Incomplete`] instead.
    pub fn start(db: Database, settings: Settings) -> EngineResult<Self> {
        let startup = SchemaEvolver::new(&db).run();
        if !startup.is_success() {
            warn!(
                failed = startup.failed.len(),
                strict = settings.migrations.fail_on_error,
                "schema evolution incomplete"
            );
            if settings.migrations.fail_on_error {
                return Err(MigrationError::Incomplete {
                    failed: startup.failed,
                }
                .into());
            }
        }

        let resolver = resolver_for(settings.inference.resolver);
        info!(
            path = ?db.path(),
            applied = startup.applied.len(),
            resolver = resolver.name(),
            "metadata engine started"
        );

        Ok(Self {
            db,
            settings,
            resolver,
            startup,
        })
    }

    /// Close the database.
    pub fn shutdown(self) -> EngineResult<()> {
        self.db.close()?;
        info!("metadata engine stopped");
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// What schema evolution did during [`MetadataEngine::start`].
    pub fn startup_report(&self) -> &MigrationReport {
        &self.startup
    }

    /// Unvalidated CRUD access, for reads and deletes.
    pub fn store(&self) -> MetadataStore<'_> {
        self.db.store()
    }

    pub fn evolver(&self) -> SchemaEvolver<'_> {
        SchemaEvolver::new(&self.db)
    }

    pub fn inferencer(&self) -> RelationshipInferencer<'_> {
        RelationshipInferencer::new(self.store(), self.resolver.as_ref())
    }

    pub fn composer(&self) -> DiagramComposer<'_> {
        DiagramComposer::new(self.store(), self.resolver.as_ref())
            .with_layout(GridLayout::from(&self.settings.diagram))
    }

    // ------------------------------------------------------------------------
    // Validated mutations
    // ------------------------------------------------------------------------

    pub fn create_project(&self, id: &str, data: &NewProject) -> EngineResult<Project> {
        validation::validate_new_project(data)?;
        Ok(self.store().create_project(id, data)?)
    }

    pub fn update_project(&self, id: &str, patch: &ProjectPatch) -> EngineResult<Option<Project>> {
        validation::validate_project_patch(patch)?;
        Ok(self.store().update_project(id, patch)?)
    }

    pub fn create_entity(&self, id: &str, data: &NewEntity) -> EngineResult<Entity> {
        let store = self.store();
        validation::validate_new_entity(&store, data)?;
        Ok(store.create_entity(id, data)?)
    }

    pub fn update_entity(&self, id: &str, patch: &EntityPatch) -> EngineResult<Option<Entity>> {
        let store = self.store();
        validation::validate_entity_patch(&store, id, patch)?;
        Ok(store.update_entity(id, patch)?)
    }

    pub fn create_field(&self, id: &str, data: &NewField) -> EngineResult<Field> {
        let store = self.store();
        validation::validate_new_field(&store, data)?;
        Ok(store.create_field(id, data)?)
    }

    pub fn update_field(&self, id: &str, patch: &FieldPatch) -> EngineResult<Option<Field>> {
        let store = self.store();
        validation::validate_field_patch(&store, id, patch)?;
        Ok(store.update_field(id, patch)?)
    }

    pub fn create_relationship(
        &self,
        id: &str,
        data: &NewRelationship,
    ) -> EngineResult<EntityRelationship> {
        let store = self.store();
        validation::validate_new_relationship(&store, data)?;
        Ok(store.create_relationship(id, data)?)
    }

    pub fn update_relationship(
        &self,
        id: &str,
        patch: &RelationshipPatch,
    ) -> EngineResult<Option<EntityRelationship>> {
        let store = self.store();
        validation::validate_relationship_patch(&store, id, patch)?;
        Ok(store.update_relationship(id, patch)?)
    }

    // ------------------------------------------------------------------------
    // Projections
    // ------------------------------------------------------------------------

    /// `None` if the project does not exist.
    pub fn generate_diagram(&self, project_id: &str) -> EngineResult<Option<Diagram>> {
        Ok(self.composer().generate_diagram(project_id)?)
    }

    /// Explicit and inferred relationships of a project. `None` if the
    /// project does not exist.
    pub fn list_relationships(
        &self,
        project_id: &str,
    ) -> EngineResult<Option<Vec<RelationshipView>>> {
        let store = self.store();
        if !store.project_exists(project_id)? {
            return Ok(None);
        }
        let explicit = store.list_relationships(project_id)?;
        let inferred = self.inferencer().infer(project_id)?;
        Ok(Some(merge_relationships(explicit, inferred)))
    }

    /// `None` if the project does not exist.
    pub fn get_project_stats(&self, project_id: &str) -> EngineResult<Option<ProjectStats>> {
        Ok(self.composer().project_stats(project_id)?)
    }

    // ------------------------------------------------------------------------
    // Migrations
    // ------------------------------------------------------------------------

    pub fn needs_migration(&self) -> EngineResult<bool> {
        Ok(self.evolver().needs_migration()?)
    }

    pub fn get_migration_status(&self) -> EngineResult<MigrationStatus> {
        Ok(self.evolver().status()?)
    }

    /// Apply any missing steps. Safe to call repeatedly.
    pub fn run_migrations(&self) -> MigrationReport {
        self.evolver().run()
    }
}
