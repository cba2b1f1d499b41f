//! Relationship inference from field naming conventions.
//!
//! A field named `<token>_id` (any case, but not `id` itself) is read as a
//! reference to the entity whose name the resolver matches to `<token>`.
//! Every hit becomes a many-to-one relationship from the owning entity to
//! the resolved one. Fields whose token resolves to nothing are skipped.
//!
//! Inference is a read projection: it never reads or writes the explicit
//! relationship table, and it recomputes from current metadata on every call.

mod inflection;
mod resolver;

pub use inflection::{pluralize, singularize, InflectionResolver};
pub use resolver::{EntityResolver, MatchRule, NamingConventionResolver, Resolution};

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::ResolverKind;
use crate::store::{Entity, Field, MetadataStore, RelationshipType, StoreResult};

static REFERENCE_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.+)_id$").unwrap());

/// The `<token>` of a `<token>_id` field name.
///
/// The suffix matches in any case, so `POST_ID` yields `POST`. A field
/// named `id` (in any case) is never a reference.
pub fn reference_token(field_name: &str) -> Option<&str> {
    if field_name.eq_ignore_ascii_case("id") {
        return None;
    }
    REFERENCE_FIELD
        .captures(field_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// The resolver selected by configuration.
pub fn resolver_for(kind: ResolverKind) -> Box<dyn EntityResolver> {
    match kind {
        ResolverKind::Naming => Box::new(NamingConventionResolver),
        ResolverKind::Inflection => Box::new(InflectionResolver),
    }
}

/// A relationship derived from a field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InferredRelationship {
    pub source_entity_id: String,
    pub source_entity_name: String,
    pub target_entity_id: String,
    pub target_entity_name: String,
    pub field_id: String,
    pub field_name: String,
    pub relationship_type: RelationshipType,
    /// The field name, shown on the diagram edge.
    pub label: String,
    pub rule: MatchRule,
}

/// Infer relationships from already-loaded metadata.
///
/// `entities` must be in the store's alphabetical order; `fields` may be
/// any fields of those entities (others are ignored). Output follows the
/// order of `fields`.
pub fn infer_relationships(
    entities: &[Entity],
    fields: &[Field],
    resolver: &dyn EntityResolver,
) -> Vec<InferredRelationship> {
    let owners: HashMap<&str, &Entity> = entities.iter().map(|e| (e.id.as_str(), e)).collect();

    fields
        .iter()
        .filter_map(|field| {
            let owner = owners.get(field.entity_id.as_str())?;
            let token = reference_token(&field.name)?;
            let Some(hit) = resolver.resolve(token, entities) else {
                debug!(field = %field.name, entity = %owner.name, "unresolved reference field");
                return None;
            };

            Some(InferredRelationship {
                source_entity_id: owner.id.clone(),
                source_entity_name: owner.name.clone(),
                target_entity_id: hit.entity.id.clone(),
                target_entity_name: hit.entity.name.clone(),
                field_id: field.id.clone(),
                field_name: field.name.clone(),
                relationship_type: RelationshipType::ManyToOne,
                label: field.name.clone(),
                rule: hit.rule,
            })
        })
        .collect()
}

/// Infers the relationships of a project from the store.
pub struct RelationshipInferencer<'a> {
    store: MetadataStore<'a>,
    resolver: &'a dyn EntityResolver,
}

impl<'a> RelationshipInferencer<'a> {
    pub fn new(store: MetadataStore<'a>, resolver: &'a dyn EntityResolver) -> Self {
        Self { store, resolver }
    }

    /// An inferencer using [`NamingConventionResolver`].
    pub fn with_naming_conventions(store: MetadataStore<'a>) -> Self {
        Self::new(store, &NamingConventionResolver)
    }

    /// Inferred relationships of a project, ordered by source entity
    /// (alphabetical) and then by field creation order. An unknown project
    /// has no entities and yields an empty list.
    pub fn infer(&self, project_id: &str) -> StoreResult<Vec<InferredRelationship>> {
        let entities = self.store.list_entities(project_id)?;
        let fields = self.store.list_project_fields(project_id)?;
        let inferred = infer_relationships(&entities, &fields, self.resolver);
        debug!(
            project_id,
            resolver = self.resolver.name(),
            inferred = inferred.len(),
            "inferred relationships"
        );
        Ok(inferred)
    }
}
