//! Metadata record types.
//!
//! Four record kinds live in the store: [`Project`], [`Entity`], [`Field`] and
//! [`EntityRelationship`]. Each has a `New*` payload used on create and a
//! `*Patch` payload used for partial updates. Patch attributes left as `None`
//! are untouched; nullable attributes use `Option<Option<T>>` so that
//! "clear this value" (`Some(None)`) is distinct from "leave it alone".

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// Enumerations
// ============================================================================

/// Declared type of a field.
///
/// The set is open: strings that are not one of the known types are kept
/// verbatim in [`FieldType::Other`] so that newer clients never lose data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Text,
    Integer,
    Decimal,
    File,
    Image,
    Document,
    Other(String),
}

impl FieldType {
    /// The storage/wire name of this type.
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::File => "file",
            Self::Image => "image",
            Self::Document => "document",
            Self::Other(name) => name,
        }
    }

    /// Whether this type carries file attributes
    /// (`accepts_multiple`, `max_file_size`, `allowed_extensions`).
    pub fn is_file_like(&self) -> bool {
        matches!(self, Self::File | Self::Image | Self::Document)
    }
}

impl From<&str> for FieldType {
    fn from(s: &str) -> Self {
        match s {
            "string" => Self::String,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "date" => Self::Date,
            "text" => Self::Text,
            "integer" => Self::Integer,
            "decimal" => Self::Decimal,
            "file" => Self::File,
            "image" => Self::Image,
            "document" => Self::Document,
            other => Self::Other(other.to_string()),
        }
    }
}

impl FromStr for FieldType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

impl ToSql for FieldType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for FieldType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Ok(Self::from(value.as_str()?))
    }
}

/// Cardinality of a relationship between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 4] = [
        Self::OneToOne,
        Self::OneToMany,
        Self::ManyToOne,
        Self::ManyToMany,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneToOne => "one_to_one",
            Self::OneToMany => "one_to_many",
            Self::ManyToOne => "many_to_one",
            Self::ManyToMany => "many_to_many",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown relationship type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown relationship type: {0}")]
pub struct UnknownRelationshipType(pub String);

impl FromStr for RelationshipType {
    type Err = UnknownRelationshipType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownRelationshipType(s.to_string()))
    }
}

impl ToSql for RelationshipType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RelationshipType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

// ============================================================================
// Records
// ============================================================================

/// A project: the top-level container of entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user-defined record type scoped to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A typed attribute of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    pub entity_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub is_required: bool,
    pub is_unique: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub foreign_entity_id: Option<String>,
    pub foreign_field_id: Option<String>,
    pub default_value: Option<String>,
    pub max_length: Option<i64>,
    pub description: Option<String>,
    pub accepts_multiple: bool,
    pub max_file_size: Option<i64>,
    pub allowed_extensions: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An explicit, cardinality-typed association between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRelationship {
    pub id: String,
    pub source_entity_id: String,
    pub target_entity_id: String,
    pub relationship_type: RelationshipType,
    pub source_field_id: Option<String>,
    pub target_field_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_required: bool,
    pub cascade_delete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityRelationship {
    /// The uniqueness tuple of this relationship.
    pub fn tuple(&self) -> RelationshipTuple<'_> {
        RelationshipTuple {
            source_entity_id: &self.source_entity_id,
            target_entity_id: &self.target_entity_id,
            source_field_id: self.source_field_id.as_deref(),
            target_field_id: self.target_field_id.as_deref(),
        }
    }
}

/// The (source entity, target entity, source field, target field) tuple that
/// must be unique across relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelationshipTuple<'a> {
    pub source_entity_id: &'a str,
    pub target_entity_id: &'a str,
    pub source_field_id: Option<&'a str>,
    pub target_field_id: Option<&'a str>,
}

// ============================================================================
// Create payloads
// ============================================================================

/// Payload for creating a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Payload for creating an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewEntity {
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewEntity {
    pub fn new(project_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            name: name.into(),
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Payload for creating a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewField {
    pub entity_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub is_required: bool,
    pub is_unique: bool,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub foreign_entity_id: Option<String>,
    pub foreign_field_id: Option<String>,
    pub default_value: Option<String>,
    pub max_length: Option<i64>,
    pub description: Option<String>,
    pub accepts_multiple: bool,
    pub max_file_size: Option<i64>,
    pub allowed_extensions: Option<Vec<String>>,
}

impl Default for NewField {
    fn default() -> Self {
        Self {
            entity_id: String::new(),
            name: String::new(),
            field_type: FieldType::String,
            is_required: false,
            is_unique: false,
            is_primary_key: false,
            is_foreign_key: false,
            foreign_entity_id: None,
            foreign_field_id: None,
            default_value: None,
            max_length: None,
            description: None,
            accepts_multiple: false,
            max_file_size: None,
            allowed_extensions: None,
        }
    }
}

impl NewField {
    pub fn new(
        entity_id: impl Into<String>,
        name: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            name: name.into(),
            field_type,
            ..Self::default()
        }
    }

    /// Mark as primary key (implies required and unique).
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_required = true;
        self.is_unique = true;
        self
    }

    /// Mark as a foreign key pointing at `entity_id` and optionally a field of it.
    pub fn foreign_key(mut self, entity_id: impl Into<String>, field_id: Option<&str>) -> Self {
        self.is_foreign_key = true;
        self.foreign_entity_id = Some(entity_id.into());
        self.foreign_field_id = field_id.map(str::to_string);
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }
}

/// Payload for creating a relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRelationship {
    pub source_entity_id: String,
    pub target_entity_id: String,
    pub relationship_type: RelationshipType,
    #[serde(default)]
    pub source_field_id: Option<String>,
    #[serde(default)]
    pub target_field_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub cascade_delete: bool,
}

impl NewRelationship {
    pub fn new(
        source_entity_id: impl Into<String>,
        target_entity_id: impl Into<String>,
        relationship_type: RelationshipType,
    ) -> Self {
        Self {
            source_entity_id: source_entity_id.into(),
            target_entity_id: target_entity_id.into(),
            relationship_type,
            source_field_id: None,
            target_field_id: None,
            name: None,
            description: None,
            is_required: false,
            cascade_delete: false,
        }
    }

    pub fn fields(mut self, source_field_id: Option<&str>, target_field_id: Option<&str>) -> Self {
        self.source_field_id = source_field_id.map(str::to_string);
        self.target_field_id = target_field_id.map(str::to_string);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn tuple(&self) -> RelationshipTuple<'_> {
        RelationshipTuple {
            source_entity_id: &self.source_entity_id,
            target_entity_id: &self.target_entity_id,
            source_field_id: self.source_field_id.as_deref(),
            target_field_id: self.target_field_id.as_deref(),
        }
    }
}

// ============================================================================
// Patches
// ============================================================================

/// Deserialize a present JSON value (including `null`) as `Some(..)`.
///
/// Combined with `#[serde(default)]` this gives the three states of a
/// nullable patch attribute: missing, `null`, or a value.
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial update for a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// Partial update for an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}

impl EntityPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// Partial update for a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_unique: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_primary_key: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_foreign_key: Option<bool>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub foreign_entity_id: Option<Option<String>>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub foreign_field_id: Option<Option<String>>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Option<String>>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<Option<i64>>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepts_multiple: Option<bool>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<Option<i64>>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub allowed_extensions: Option<Option<Vec<String>>>,
}

impl FieldPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The field as it would look after this patch is applied.
    ///
    /// Timestamps are left as they are; the store sets `updated_at`.
    pub fn apply_to(&self, field: &Field) -> Field {
        let mut next = field.clone();
        if let Some(name) = &self.name {
            next.name = name.clone();
        }
        if let Some(field_type) = &self.field_type {
            next.field_type = field_type.clone();
        }
        if let Some(v) = self.is_required {
            next.is_required = v;
        }
        if let Some(v) = self.is_unique {
            next.is_unique = v;
        }
        if let Some(v) = self.is_primary_key {
            next.is_primary_key = v;
        }
        if let Some(v) = self.is_foreign_key {
            next.is_foreign_key = v;
        }
        if let Some(v) = &self.foreign_entity_id {
            next.foreign_entity_id = v.clone();
        }
        if let Some(v) = &self.foreign_field_id {
            next.foreign_field_id = v.clone();
        }
        if let Some(v) = &self.default_value {
            next.default_value = v.clone();
        }
        if let Some(v) = self.max_length {
            next.max_length = v;
        }
        if let Some(v) = &self.description {
            next.description = v.clone();
        }
        if let Some(v) = self.accepts_multiple {
            next.accepts_multiple = v;
        }
        if let Some(v) = self.max_file_size {
            next.max_file_size = v;
        }
        if let Some(v) = &self.allowed_extensions {
            next.allowed_extensions = v.clone();
        }
        next
    }
}

/// Partial update for a relationship.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<RelationshipType>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub source_field_id: Option<Option<String>>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub target_field_id: Option<Option<String>>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub name: Option<Option<String>>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cascade_delete: Option<bool>,
}

impl RelationshipPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The relationship as it would look after this patch is applied.
    pub fn apply_to(&self, rel: &EntityRelationship) -> EntityRelationship {
        let mut next = rel.clone();
        if let Some(v) = &self.source_entity_id {
            next.source_entity_id = v.clone();
        }
        if let Some(v) = &self.target_entity_id {
            next.target_entity_id = v.clone();
        }
        if let Some(v) = self.relationship_type {
            next.relationship_type = v;
        }
        if let Some(v) = &self.source_field_id {
            next.source_field_id = v.clone();
        }
        if let Some(v) = &self.target_field_id {
            next.target_field_id = v.clone();
        }
        if let Some(v) = &self.name {
            next.name = v.clone();
        }
        if let Some(v) = &self.description {
            next.description = v.clone();
        }
        if let Some(v) = self.is_required {
            next.is_required = v;
        }
        if let Some(v) = self.cascade_delete {
            next.cascade_delete = v;
        }
        next
    }
}
