//! Project records.

use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::fields::detach_fields_pointing_into_project;
use super::patch::UpdateBuilder;
use super::{now, MetadataStore, NewProject, Project, ProjectPatch, StoreResult};

const PROJECT_COLUMNS: &str = "id, name, description, created_at, updated_at";

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl<'a> MetadataStore<'a> {
    /// Create a project with a caller-supplied id.
    pub fn create_project(&self, id: &str, data: &NewProject) -> StoreResult<Project> {
        let ts = now();
        let project = self.conn.query_row(
            &format!(
                "INSERT INTO projects (id, name, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 RETURNING {PROJECT_COLUMNS}"
            ),
            params![id, data.name, data.description, ts],
            project_from_row,
        )?;
        debug!(project_id = id, name = %data.name, "created project");
        Ok(project)
    }

    pub fn get_project(&self, id: &str) -> StoreResult<Option<Project>> {
        let project = self
            .conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
                params![id],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    /// All projects, ordered by name.
    pub fn list_projects(&self) -> StoreResult<Vec<Project>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY name COLLATE NOCASE, name, id"
        ))?;
        let projects = stmt
            .query_map([], project_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    /// Apply a partial update.
    ///
    /// Returns `None` if the project does not exist. An empty patch returns the
    /// current record without writing.
    pub fn update_project(&self, id: &str, patch: &ProjectPatch) -> StoreResult<Option<Project>> {
        let mut update = UpdateBuilder::new("projects");
        update.set("name", patch.name.clone());
        update.set("description", patch.description.clone());

        if update.is_empty() {
            return self.get_project(id);
        }

        let columns = update.columns();
        if update.execute(self.conn, id, now())? == 0 {
            return Ok(None);
        }
        debug!(project_id = id, ?columns, "updated project");
        self.get_project(id)
    }

    /// Delete a project and, by cascade, its entities, fields and
    /// relationships.
    ///
    /// Fields in other projects that point at one of the deleted entities lose
    /// their foreign-key pointers.
    pub fn delete_project(&self, id: &str) -> StoreResult<bool> {
        let tx = self.conn.unchecked_transaction()?;
        detach_fields_pointing_into_project(&tx, id, now())?;
        let rows = tx.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        tx.commit()?;

        if rows > 0 {
            debug!(project_id = id, "deleted project");
        }
        Ok(rows > 0)
    }

    pub fn project_exists(&self, id: &str) -> StoreResult<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}
