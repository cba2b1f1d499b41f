//! Explicit entity relationship records.

use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::patch::UpdateBuilder;
use super::{
    now, EntityRelationship, MetadataStore, NewRelationship, RelationshipPatch, RelationshipTuple,
    StoreResult,
};

const RELATIONSHIP_COLUMNS: &str = "id, source_entity_id, target_entity_id, relationship_type, \
    source_field_id, target_field_id, name, description, is_required, cascade_delete, \
    created_at, updated_at";

fn relationship_from_row(row: &Row<'_>) -> rusqlite::Result<EntityRelationship> {
    Ok(EntityRelationship {
        id: row.get("id")?,
        source_entity_id: row.get("source_entity_id")?,
        target_entity_id: row.get("target_entity_id")?,
        relationship_type: row.get("relationship_type")?,
        source_field_id: row.get("source_field_id")?,
        target_field_id: row.get("target_field_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        is_required: row.get("is_required")?,
        cascade_delete: row.get("cascade_delete")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl<'a> MetadataStore<'a> {
    pub fn create_relationship(
        &self,
        id: &str,
        data: &NewRelationship,
    ) -> StoreResult<EntityRelationship> {
        let ts = now();
        let rel = self.conn.query_row(
            &format!(
                "INSERT INTO entity_relationships (
                    id, source_entity_id, target_entity_id, relationship_type,
                    source_field_id, target_field_id, name, description,
                    is_required, cascade_delete, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
                 RETURNING {RELATIONSHIP_COLUMNS}"
            ),
            params![
                id,
                data.source_entity_id,
                data.target_entity_id,
                data.relationship_type,
                data.source_field_id,
                data.target_field_id,
                data.name,
                data.description,
                data.is_required,
                data.cascade_delete,
                ts,
            ],
            relationship_from_row,
        )?;
        debug!(
            relationship_id = id,
            source = %data.source_entity_id,
            target = %data.target_entity_id,
            kind = %data.relationship_type,
            "created relationship"
        );
        Ok(rel)
    }

    pub fn get_relationship(&self, id: &str) -> StoreResult<Option<EntityRelationship>> {
        let rel = self
            .conn
            .query_row(
                &format!("SELECT {RELATIONSHIP_COLUMNS} FROM entity_relationships WHERE id = ?1"),
                params![id],
                relationship_from_row,
            )
            .optional()?;
        Ok(rel)
    }

    /// Relationships whose source or target entity belongs to the project,
    /// in creation order.
    pub fn list_relationships(&self, project_id: &str) -> StoreResult<Vec<EntityRelationship>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM entity_relationships
             WHERE source_entity_id IN (SELECT id FROM entities WHERE project_id = ?1)
                OR target_entity_id IN (SELECT id FROM entities WHERE project_id = ?1)
             ORDER BY created_at, rowid"
        ))?;
        let rels = stmt
            .query_map(params![project_id], relationship_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rels)
    }

    /// Relationships naming the entity as source or target.
    pub fn list_entity_relationships(
        &self,
        entity_id: &str,
    ) -> StoreResult<Vec<EntityRelationship>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM entity_relationships
             WHERE source_entity_id = ?1 OR target_entity_id = ?1
             ORDER BY created_at, rowid"
        ))?;
        let rels = stmt
            .query_map(params![entity_id], relationship_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rels)
    }

    /// Apply a partial update. Returns `None` if the relationship does not exist.
    pub fn update_relationship(
        &self,
        id: &str,
        patch: &RelationshipPatch,
    ) -> StoreResult<Option<EntityRelationship>> {
        let mut update = UpdateBuilder::new("entity_relationships");
        update.set("source_entity_id", patch.source_entity_id.clone());
        update.set("target_entity_id", patch.target_entity_id.clone());
        update.set("relationship_type", patch.relationship_type);
        update.set("source_field_id", patch.source_field_id.clone());
        update.set("target_field_id", patch.target_field_id.clone());
        update.set("name", patch.name.clone());
        update.set("description", patch.description.clone());
        update.set("is_required", patch.is_required);
        update.set("cascade_delete", patch.cascade_delete);

        if update.is_empty() {
            return self.get_relationship(id);
        }

        let columns = update.columns();
        if update.execute(self.conn, id, now())? == 0 {
            return Ok(None);
        }
        debug!(relationship_id = id, ?columns, "updated relationship");
        self.get_relationship(id)
    }

    pub fn delete_relationship(&self, id: &str) -> StoreResult<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM entity_relationships WHERE id = ?1", params![id])?;
        if rows > 0 {
            debug!(relationship_id = id, "deleted relationship");
        }
        Ok(rows > 0)
    }

    pub fn relationship_exists(&self, id: &str) -> StoreResult<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM entity_relationships WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Whether a relationship with the same tuple exists.
    ///
    /// Null field ids compare equal to each other, unlike SQLite's own
    /// `UNIQUE` handling of NULLs.
    pub fn relationship_tuple_exists(
        &self,
        tuple: RelationshipTuple<'_>,
        exclude_id: Option<&str>,
    ) -> StoreResult<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM entity_relationships
                WHERE source_entity_id = ?1
                  AND target_entity_id = ?2
                  AND source_field_id IS ?3
                  AND target_field_id IS ?4
                  AND (?5 IS NULL OR id <> ?5)
             )",
            params![
                tuple.source_entity_id,
                tuple.target_entity_id,
                tuple.source_field_id,
                tuple.target_field_id,
                exclude_id,
            ],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Total number of relationship rows.
    pub fn count_relationships(&self) -> StoreResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM entity_relationships", [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }
}
