//! Validation of metadata mutations.
//!
//! These checks run before the store is called and cover the invariants
//! that span several records: PK/FK exclusivity, foreign references that
//! must exist and line up, unique names and unique relationship tuples.
//! SQLite's own constraints remain as the last line of defense, but every
//! rule here fails with a typed [`ValidationError`] instead of storage
//! error text.

use crate::store::{
    EntityPatch, EntityRelationship, Field, FieldPatch, MetadataStore, NewEntity, NewField,
    NewProject, NewRelationship, ProjectPatch, RelationshipPatch, RelationshipTuple, StoreError,
};

/// Validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{kind} name must not be empty")]
    EmptyName { kind: &'static str },

    #[error("Unknown {kind} '{id}'")]
    UnknownOwner { kind: &'static str, id: String },

    #[error("Field '{field}' cannot be both a primary key and a foreign key")]
    PrimaryAndForeignKey { field: String },

    #[error("Foreign key field '{field}' must reference an entity")]
    MissingForeignEntity { field: String },

    #[error("Field '{field}' references unknown entity '{entity_id}'")]
    UnknownForeignEntity { field: String, entity_id: String },

    #[error("Field '{field}' references field '{field_id}', which does not belong to entity '{entity_id}'")]
    ForeignFieldMismatch {
        field: String,
        field_id: String,
        entity_id: String,
    },

    #[error("A field named '{name}' already exists on entity '{entity_id}'")]
    DuplicateFieldName { name: String, entity_id: String },

    #[error("An entity named '{name}' already exists in project '{project_id}'")]
    DuplicateEntityName { name: String, project_id: String },

    #[error("Field '{field_id}' does not belong to {side} entity '{entity_id}'")]
    RelationshipFieldMismatch {
        side: &'static str,
        field_id: String,
        entity_id: String,
    },

    #[error("Entities '{source_entity_id}' and '{target_entity_id}' belong to different projects")]
    CrossProjectRelationship {
        source_entity_id: String,
        target_entity_id: String,
    },

    #[error("A relationship from '{source_entity_id}' to '{target_entity_id}' over the same fields already exists")]
    DuplicateRelationship {
        source_entity_id: String,
        target_entity_id: String,
    },
}

/// Failure of a validation pass: either a rule was broken or the lookups
/// needed to check it failed.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type CheckResult = Result<(), CheckError>;

fn require_name(kind: &'static str, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName { kind });
    }
    Ok(())
}

// ============================================================================
// Projects
// ============================================================================

pub fn validate_new_project(data: &NewProject) -> Result<(), ValidationError> {
    require_name("Project", &data.name)
}

pub fn validate_project_patch(patch: &ProjectPatch) -> Result<(), ValidationError> {
    match &patch.name {
        Some(name) => require_name("Project", name),
        None => Ok(()),
    }
}

// ============================================================================
// Entities
// ============================================================================

pub fn validate_new_entity(store: &MetadataStore<'_>, data: &NewEntity) -> CheckResult {
    require_name("Entity", &data.name)?;

    if !store.project_exists(&data.project_id)? {
        return Err(ValidationError::UnknownOwner {
            kind: "project",
            id: data.project_id.clone(),
        }
        .into());
    }

    if store.entity_exists_by_name_in_project(&data.name, &data.project_id, None)? {
        return Err(ValidationError::DuplicateEntityName {
            name: data.name.clone(),
            project_id: data.project_id.clone(),
        }
        .into());
    }

    Ok(())
}

/// Validate a rename. Unknown entities pass; the update reports them as absent.
pub fn validate_entity_patch(
    store: &MetadataStore<'_>,
    id: &str,
    patch: &EntityPatch,
) -> CheckResult {
    let Some(name) = &patch.name else {
        return Ok(());
    };
    require_name("Entity", name)?;

    let Some(entity) = store.get_entity(id)? else {
        return Ok(());
    };
    if store.entity_exists_by_name_in_project(name, &entity.project_id, Some(id))? {
        return Err(ValidationError::DuplicateEntityName {
            name: name.clone(),
            project_id: entity.project_id,
        }
        .into());
    }

    Ok(())
}

// ============================================================================
// Fields
// ============================================================================

/// The attributes of a field that the key rules look at.
struct KeyShape<'f> {
    name: &'f str,
    is_primary_key: bool,
    is_foreign_key: bool,
    foreign_entity_id: Option<&'f str>,
    foreign_field_id: Option<&'f str>,
}

impl<'f> From<&'f NewField> for KeyShape<'f> {
    fn from(f: &'f NewField) -> Self {
        Self {
            name: &f.name,
            is_primary_key: f.is_primary_key,
            is_foreign_key: f.is_foreign_key,
            foreign_entity_id: f.foreign_entity_id.as_deref(),
            foreign_field_id: f.foreign_field_id.as_deref(),
        }
    }
}

impl<'f> From<&'f Field> for KeyShape<'f> {
    fn from(f: &'f Field) -> Self {
        Self {
            name: &f.name,
            is_primary_key: f.is_primary_key,
            is_foreign_key: f.is_foreign_key,
            foreign_entity_id: f.foreign_entity_id.as_deref(),
            foreign_field_id: f.foreign_field_id.as_deref(),
        }
    }
}

fn check_keys(store: &MetadataStore<'_>, shape: KeyShape<'_>) -> CheckResult {
    if shape.is_primary_key && shape.is_foreign_key {
        return Err(ValidationError::PrimaryAndForeignKey {
            field: shape.name.to_string(),
        }
        .into());
    }

    if shape.is_foreign_key && shape.foreign_entity_id.is_none() {
        return Err(ValidationError::MissingForeignEntity {
            field: shape.name.to_string(),
        }
        .into());
    }

    if let Some(entity_id) = shape.foreign_entity_id {
        if !store.entity_exists(entity_id)? {
            return Err(ValidationError::UnknownForeignEntity {
                field: shape.name.to_string(),
                entity_id: entity_id.to_string(),
            }
            .into());
        }

        if let Some(field_id) = shape.foreign_field_id {
            if !store.field_belongs_to_entity(field_id, entity_id)? {
                return Err(ValidationError::ForeignFieldMismatch {
                    field: shape.name.to_string(),
                    field_id: field_id.to_string(),
                    entity_id: entity_id.to_string(),
                }
                .into());
            }
        }
    } else if let Some(field_id) = shape.foreign_field_id {
        // A field pointer without an entity pointer can never line up.
        return Err(ValidationError::ForeignFieldMismatch {
            field: shape.name.to_string(),
            field_id: field_id.to_string(),
            entity_id: String::new(),
        }
        .into());
    }

    Ok(())
}

pub fn validate_new_field(store: &MetadataStore<'_>, data: &NewField) -> CheckResult {
    require_name("Field", &data.name)?;

    if !store.entity_exists(&data.entity_id)? {
        return Err(ValidationError::UnknownOwner {
            kind: "entity",
            id: data.entity_id.clone(),
        }
        .into());
    }

    if store.field_exists_by_name_in_entity(&data.name, &data.entity_id, None)? {
        return Err(ValidationError::DuplicateFieldName {
            name: data.name.clone(),
            entity_id: data.entity_id.clone(),
        }
        .into());
    }

    check_keys(store, KeyShape::from(data))
}

/// Validate a field patch against the field as it would look afterwards.
///
/// Unknown field ids pass; the update reports them as absent.
pub fn validate_field_patch(
    store: &MetadataStore<'_>,
    id: &str,
    patch: &FieldPatch,
) -> CheckResult {
    if patch.is_empty() {
        return Ok(());
    }
    let Some(current) = store.get_field(id)? else {
        return Ok(());
    };
    let next = patch.apply_to(&current);

    if let Some(name) = &patch.name {
        require_name("Field", name)?;
        if store.field_exists_by_name_in_entity(name, &current.entity_id, Some(id))? {
            return Err(ValidationError::DuplicateFieldName {
                name: name.clone(),
                entity_id: current.entity_id.clone(),
            }
            .into());
        }
    }

    check_keys(store, KeyShape::from(&next))
}

// ============================================================================
// Relationships
// ============================================================================

fn check_relationship(
    store: &MetadataStore<'_>,
    tuple: RelationshipTuple<'_>,
    exclude_id: Option<&str>,
) -> CheckResult {
    let Some(source) = store.get_entity(tuple.source_entity_id)? else {
        return Err(ValidationError::UnknownOwner {
            kind: "source entity",
            id: tuple.source_entity_id.to_string(),
        }
        .into());
    };
    let Some(target) = store.get_entity(tuple.target_entity_id)? else {
        return Err(ValidationError::UnknownOwner {
            kind: "target entity",
            id: tuple.target_entity_id.to_string(),
        }
        .into());
    };

    if source.project_id != target.project_id {
        return Err(ValidationError::CrossProjectRelationship {
            source_entity_id: source.id,
            target_entity_id: target.id,
        }
        .into());
    }

    let sides = [
        ("source", tuple.source_field_id, tuple.source_entity_id),
        ("target", tuple.target_field_id, tuple.target_entity_id),
    ];
    for (side, field_id, entity_id) in sides {
        if let Some(field_id) = field_id {
            if !store.field_belongs_to_entity(field_id, entity_id)? {
                return Err(ValidationError::RelationshipFieldMismatch {
                    side,
                    field_id: field_id.to_string(),
                    entity_id: entity_id.to_string(),
                }
                .into());
            }
        }
    }

    if store.relationship_tuple_exists(tuple, exclude_id)? {
        return Err(ValidationError::DuplicateRelationship {
            source_entity_id: tuple.source_entity_id.to_string(),
            target_entity_id: tuple.target_entity_id.to_string(),
        }
        .into());
    }

    Ok(())
}

pub fn validate_new_relationship(store: &MetadataStore<'_>, data: &NewRelationship) -> CheckResult {
    check_relationship(store, data.tuple(), None)
}

/// Validate a relationship patch against the relationship as it would look
/// afterwards. Unknown ids pass; the update reports them as absent.
pub fn validate_relationship_patch(
    store: &MetadataStore<'_>,
    id: &str,
    patch: &RelationshipPatch,
) -> CheckResult {
    if patch.is_empty() {
        return Ok(());
    }
    let Some(current) = store.get_relationship(id)? else {
        return Ok(());
    };
    let next: EntityRelationship = patch.apply_to(&current);
    check_relationship(store, next.tuple(), Some(id))
}
