//! Field records.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::patch::UpdateBuilder;
use super::{now, Field, FieldPatch, MetadataStore, NewField, StoreResult};

const FIELD_COLUMNS: &str = "id, entity_id, name, type, is_required, is_unique, \
    is_primary_key, is_foreign_key, foreign_entity_id, foreign_field_id, \
    default_value, max_length, description, accepts_multiple, max_file_size, \
    allowed_extensions, created_at, updated_at";

/// Creation order within an entity.
const FIELD_ORDER: &str = "created_at, rowid";

fn field_from_row(row: &Row<'_>) -> rusqlite::Result<Field> {
    let allowed_extensions: Option<String> = row.get("allowed_extensions")?;
    let allowed_extensions = allowed_extensions
        .map(|json| serde_json::from_str::<Vec<String>>(&json))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(15, Type::Text, Box::new(e)))?;

    Ok(Field {
        id: row.get("id")?,
        entity_id: row.get("entity_id")?,
        name: row.get("name")?,
        field_type: row.get("type")?,
        is_required: row.get("is_required")?,
        is_unique: row.get("is_unique")?,
        is_primary_key: row.get("is_primary_key")?,
        is_foreign_key: row.get("is_foreign_key")?,
        foreign_entity_id: row.get("foreign_entity_id")?,
        foreign_field_id: row.get("foreign_field_id")?,
        default_value: row.get("default_value")?,
        max_length: row.get("max_length")?,
        description: row.get("description")?,
        accepts_multiple: row.get("accepts_multiple")?,
        max_file_size: row.get("max_file_size")?,
        allowed_extensions,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn extensions_json(extensions: &Option<Vec<String>>) -> StoreResult<Option<String>> {
    Ok(extensions
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?)
}

impl<'a> MetadataStore<'a> {
    /// Create a field on `data.entity_id`.
    pub fn create_field(&self, id: &str, data: &NewField) -> StoreResult<Field> {
        let ts = now();
        let field = self.conn.query_row(
            &format!(
                "INSERT INTO fields (
                    id, entity_id, name, type, is_required, is_unique,
                    is_primary_key, is_foreign_key, foreign_entity_id, foreign_field_id,
                    default_value, max_length, description, accepts_multiple,
                    max_file_size, allowed_extensions, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)
                 RETURNING {FIELD_COLUMNS}"
            ),
            params![
                id,
                data.entity_id,
                data.name,
                data.field_type,
                data.is_required,
                data.is_unique,
                data.is_primary_key,
                data.is_foreign_key,
                data.foreign_entity_id,
                data.foreign_field_id,
                data.default_value,
                data.max_length,
                data.description,
                data.accepts_multiple,
                data.max_file_size,
                extensions_json(&data.allowed_extensions)?,
                ts,
            ],
            field_from_row,
        )?;
        debug!(field_id = id, entity_id = %data.entity_id, name = %data.name, "created field");
        Ok(field)
    }

    pub fn get_field(&self, id: &str) -> StoreResult<Option<Field>> {
        let field = self
            .conn
            .query_row(
                &format!("SELECT {FIELD_COLUMNS} FROM fields WHERE id = ?1"),
                params![id],
                field_from_row,
            )
            .optional()?;
        Ok(field)
    }

    /// Fields of an entity in creation order.
    pub fn list_fields(&self, entity_id: &str) -> StoreResult<Vec<Field>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FIELD_COLUMNS} FROM fields WHERE entity_id = ?1 ORDER BY {FIELD_ORDER}"
        ))?;
        let fields = stmt
            .query_map(params![entity_id], field_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fields)
    }

    /// Fields of every entity in a project, grouped by entity in alphabetical
    /// entity order, then in creation order.
    pub fn list_project_fields(&self, project_id: &str) -> StoreResult<Vec<Field>> {
        let mut stmt = self.conn.prepare(
            "SELECT f.id, f.entity_id, f.name, f.type, f.is_required, f.is_unique,
                    f.is_primary_key, f.is_foreign_key, f.foreign_entity_id, f.foreign_field_id,
                    f.default_value, f.max_length, f.description, f.accepts_multiple,
                    f.max_file_size, f.allowed_extensions, f.created_at, f.updated_at
             FROM fields f
             JOIN entities e ON e.id = f.entity_id
             WHERE e.project_id = ?1
             ORDER BY e.name COLLATE NOCASE, e.name, e.id, f.created_at, f.rowid",
        )?;
        let fields = stmt
            .query_map(params![project_id], field_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fields)
    }

    /// Fields whose `foreign_entity_id` points at `entity_id`.
    pub fn list_fields_referencing_entity(&self, entity_id: &str) -> StoreResult<Vec<Field>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FIELD_COLUMNS} FROM fields WHERE foreign_entity_id = ?1 ORDER BY {FIELD_ORDER}"
        ))?;
        let fields = stmt
            .query_map(params![entity_id], field_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fields)
    }

    /// Apply a partial update. Returns `None` if the field does not exist.
    pub fn update_field(&self, id: &str, patch: &FieldPatch) -> StoreResult<Option<Field>> {
        let mut update = UpdateBuilder::new("fields");
        update.set("name", patch.name.clone());
        update.set("type", patch.field_type.clone());
        update.set("is_required", patch.is_required);
        update.set("is_unique", patch.is_unique);
        update.set("is_primary_key", patch.is_primary_key);
        update.set("is_foreign_key", patch.is_foreign_key);
        update.set("foreign_entity_id", patch.foreign_entity_id.clone());
        update.set("foreign_field_id", patch.foreign_field_id.clone());
        update.set("default_value", patch.default_value.clone());
        update.set("max_length", patch.max_length);
        update.set("description", patch.description.clone());
        update.set("accepts_multiple", patch.accepts_multiple);
        update.set("max_file_size", patch.max_file_size);
        if let Some(extensions) = &patch.allowed_extensions {
            update.set("allowed_extensions", Some(extensions_json(extensions)?));
        }

        if update.is_empty() {
            return self.get_field(id);
        }

        let columns = update.columns();
        if update.execute(self.conn, id, now())? == 0 {
            return Ok(None);
        }
        debug!(field_id = id, ?columns, "updated field");
        self.get_field(id)
    }

    /// Delete a field.
    ///
    /// Fields that referenced it through `foreign_field_id`, and relationships
    /// that named it as source or target field, keep their rows with the
    /// pointer cleared.
    pub fn delete_field(&self, id: &str) -> StoreResult<bool> {
        let ts = now();
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE fields SET foreign_field_id = NULL, updated_at = ?2
             WHERE foreign_field_id = ?1 AND id <> ?1",
            params![id, ts],
        )?;
        detach_relationships_from_field(&tx, id, ts)?;
        let rows = tx.execute("DELETE FROM fields WHERE id = ?1", params![id])?;
        tx.commit()?;

        if rows > 0 {
            debug!(field_id = id, "deleted field");
        }
        Ok(rows > 0)
    }

    pub fn field_exists(&self, id: &str) -> StoreResult<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM fields WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn field_belongs_to_entity(&self, field_id: &str, entity_id: &str) -> StoreResult<bool> {
        let belongs = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM fields WHERE id = ?1 AND entity_id = ?2)",
            params![field_id, entity_id],
            |row| row.get(0),
        )?;
        Ok(belongs)
    }

    /// Whether another field of the entity already uses `name`.
    ///
    /// `exclude_id` skips the field being renamed.
    pub fn field_exists_by_name_in_entity(
        &self,
        name: &str,
        entity_id: &str,
        exclude_id: Option<&str>,
    ) -> StoreResult<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM fields
                WHERE name = ?1 AND entity_id = ?2 AND (?3 IS NULL OR id <> ?3)
             )",
            params![name, entity_id, exclude_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

/// Clear foreign-key pointers of fields in other entities that point at
/// `entity_id` or at one of its fields.
pub(super) fn detach_fields_pointing_at_entity(
    conn: &Connection,
    entity_id: &str,
    ts: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    let detached = conn.execute(
        "UPDATE fields
         SET is_foreign_key = 0, foreign_entity_id = NULL, foreign_field_id = NULL, updated_at = ?2
         WHERE foreign_entity_id = ?1 AND entity_id <> ?1",
        params![entity_id, ts],
    )?;
    conn.execute(
        "UPDATE fields SET foreign_field_id = NULL, updated_at = ?2
         WHERE entity_id <> ?1
           AND foreign_field_id IN (SELECT id FROM fields WHERE entity_id = ?1)",
        params![entity_id, ts],
    )?;
    if detached > 0 {
        debug!(entity_id, detached, "cleared foreign-key pointers");
    }
    Ok(detached)
}

/// Same as [`detach_fields_pointing_at_entity`] for every entity of a project.
pub(super) fn detach_fields_pointing_into_project(
    conn: &Connection,
    project_id: &str,
    ts: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare("SELECT id FROM entities WHERE project_id = ?1")?;
    let entity_ids = stmt
        .query_map(params![project_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut detached = 0;
    for entity_id in &entity_ids {
        detached += detach_fields_pointing_at_entity(conn, entity_id, ts)?;
    }
    Ok(detached)
}

/// Clear `source_field_id`/`target_field_id` of relationships naming a field.
fn detach_relationships_from_field(
    conn: &Connection,
    field_id: &str,
    ts: DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE entity_relationships SET source_field_id = NULL, updated_at = ?2
         WHERE source_field_id = ?1",
        params![field_id, ts],
    )?;
    conn.execute(
        "UPDATE entity_relationships SET target_field_id = NULL, updated_at = ?2
         WHERE target_field_id = ?1",
        params![field_id, ts],
    )?;
    Ok(())
}
