//! # Strata
//!
//! A dynamic schema metadata engine: projects hold user-described entities,
//! entities hold typed fields, and entities are linked by explicit or
//! inferred relationships. Everything is persisted in SQLite.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    MetadataEngine                        │
//! │   (start: migrate first, then serve; validated writes)   │
//! └─────────────────────────────────────────────────────────┘
//!          │                  │                    │
//!          ▼ [validation]     ▼ [inference]        ▼ [diagram]
//! ┌────────────────┐ ┌──────────────────┐ ┌──────────────────┐
//! │ ValidationError│ │ <token>_id ──►   │ │ nodes, edges,    │
//! │ taxonomy       │ │ EntityResolver   │ │ grid, stats      │
//! └────────────────┘ └──────────────────┘ └──────────────────┘
//!          │                  │                    │
//!          └──────────────────┼────────────────────┘
//!                             ▼ [store]
//! ┌─────────────────────────────────────────────────────────┐
//! │   MetadataStore: projects, entities, fields, relations   │
//! └─────────────────────────────────────────────────────────┘
//!                             ▲
//!                             │ [migrate] additive, idempotent
//! ┌─────────────────────────────────────────────────────────┐
//! │        Database (one SQLite connection, owned)           │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod diagram;
pub mod engine;
pub mod inference;
pub mod migrate;
pub mod store;
pub mod validation;

pub use config::Settings;
pub use engine::{EngineError, EngineResult, ErrorKind, MetadataEngine, RelationshipView};
pub use store::{Database, MetadataStore, StoreError};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::{ResolverKind, Settings};
    pub use crate::diagram::{Diagram, DiagramEdge, DiagramNode, ProjectStats};
    pub use crate::engine::{EngineError, ErrorKind, MetadataEngine, RelationshipView};
    pub use crate::inference::{
        EntityResolver, InferredRelationship, InflectionResolver, NamingConventionResolver,
    };
    pub use crate::migrate::{MigrationReport, MigrationStatus, SchemaEvolver};
    pub use crate::store::{
        new_id, Database, Entity, EntityPatch, EntityRelationship, Field, FieldPatch, FieldType,
        MetadataStore, NewEntity, NewField, NewProject, NewRelationship, Project, ProjectPatch,
        RelationshipPatch, RelationshipType,
    };
    pub use crate::validation::ValidationError;
}
