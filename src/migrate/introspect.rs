//! Read-only schema introspection.

use std::collections::{HashMap, HashSet};

use rusqlite::{params, Connection};

/// Names of all user tables.
pub fn table_names(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

/// Current columns of a table, in declaration order. Empty if the table
/// does not exist.
pub fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let columns = stmt
        .query_map(params![table], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(columns)
}

/// A point-in-time view of the tables, columns, indexes and triggers.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    columns: HashMap<String, Vec<String>>,
    indexes: HashSet<String>,
    triggers: HashSet<String>,
}

impl SchemaSnapshot {
    pub fn capture(conn: &Connection) -> rusqlite::Result<Self> {
        let mut snapshot = Self::default();

        for table in table_names(conn)? {
            let columns = table_columns(conn, &table)?;
            snapshot.columns.insert(table, columns);
        }

        let mut stmt = conn.prepare(
            "SELECT type, name FROM sqlite_master WHERE type IN ('index', 'trigger')",
        )?;
        let objects = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        for (kind, name) in objects {
            if kind == "index" {
                snapshot.indexes.insert(name);
            } else {
                snapshot.triggers.insert(name);
            }
        }

        Ok(snapshot)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.columns.contains_key(table)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns
            .get(table)
            .is_some_and(|columns| columns.iter().any(|c| c == column))
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.contains(name)
    }

    pub fn has_trigger(&self, name: &str) -> bool {
        self.triggers.contains(name)
    }

    /// Columns of a table, empty if absent.
    pub fn columns(&self, table: &str) -> &[String] {
        self.columns.get(table).map(Vec::as_slice).unwrap_or(&[])
    }
}
