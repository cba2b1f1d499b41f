//! Entity records.

use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::fields::detach_fields_pointing_at_entity;
use super::patch::UpdateBuilder;
use super::{now, Entity, EntityPatch, MetadataStore, NewEntity, StoreResult};

const ENTITY_COLUMNS: &str = "id, project_id, name, description, created_at, updated_at";

/// Stable enumeration order for entities: alphabetical, case-insensitive,
/// with exact name and id as tie-breaks.
pub(crate) const ENTITY_ORDER: &str = "name COLLATE NOCASE, name, id";

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
    Ok(Entity {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl<'a> MetadataStore<'a> {
    /// Create an entity inside `data.project_id`.
    pub fn create_entity(&self, id: &str, data: &NewEntity) -> StoreResult<Entity> {
        let ts = now();
        let entity = self.conn.query_row(
            &format!(
                "INSERT INTO entities (id, project_id, name, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 RETURNING {ENTITY_COLUMNS}"
            ),
            params![id, data.project_id, data.name, data.description, ts],
            entity_from_row,
        )?;
        debug!(entity_id = id, project_id = %data.project_id, name = %data.name, "created entity");
        Ok(entity)
    }

    pub fn get_entity(&self, id: &str) -> StoreResult<Option<Entity>> {
        let entity = self
            .conn
            .query_row(
                &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?1"),
                params![id],
                entity_from_row,
            )
            .optional()?;
        Ok(entity)
    }

    /// Entities of a project in their stable alphabetical order.
    pub fn list_entities(&self, project_id: &str) -> StoreResult<Vec<Entity>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE project_id = ?1 ORDER BY {ENTITY_ORDER}"
        ))?;
        let entities = stmt
            .query_map(params![project_id], entity_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entities)
    }

    /// Apply a partial update. Returns `None` if the entity does not exist.
    pub fn update_entity(&self, id: &str, patch: &EntityPatch) -> StoreResult<Option<Entity>> {
        let mut update = UpdateBuilder::new("entities");
        update.set("name", patch.name.clone());
        update.set("description", patch.description.clone());

        if update.is_empty() {
            return self.get_entity(id);
        }

        let columns = update.columns();
        if update.execute(self.conn, id, now())? == 0 {
            return Ok(None);
        }
        debug!(entity_id = id, ?columns, "updated entity");
        self.get_entity(id)
    }

    /// Delete an entity.
    ///
    /// Its own fields and every relationship naming it as source or target go
    /// with it. Fields of other entities that pointed at it keep their rows but
    /// lose the foreign-key pointer.
    pub fn delete_entity(&self, id: &str) -> StoreResult<bool> {
        let tx = self.conn.unchecked_transaction()?;
        detach_fields_pointing_at_entity(&tx, id, now())?;
        let rows = tx.execute("DELETE FROM entities WHERE id = ?1", params![id])?;
        tx.commit()?;

        if rows > 0 {
            debug!(entity_id = id, "deleted entity");
        }
        Ok(rows > 0)
    }

    pub fn entity_exists(&self, id: &str) -> StoreResult<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM entities WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn entity_belongs_to_project(
        &self,
        entity_id: &str,
        project_id: &str,
    ) -> StoreResult<bool> {
        let belongs = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM entities WHERE id = ?1 AND project_id = ?2)",
            params![entity_id, project_id],
            |row| row.get(0),
        )?;
        Ok(belongs)
    }

    /// Whether another entity of the project already uses `name`.
    pub fn entity_exists_by_name_in_project(
        &self,
        name: &str,
        project_id: &str,
        exclude_id: Option<&str>,
    ) -> StoreResult<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM entities
                WHERE name = ?1 AND project_id = ?2 AND (?3 IS NULL OR id <> ?3)
             )",
            params![name, project_id, exclude_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}
