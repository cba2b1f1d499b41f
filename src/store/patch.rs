//! Dynamic `UPDATE` statement builder for partial updates.

use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::Connection;

/// Collects `column = ?` assignments for a single-row update by id.
pub(super) struct UpdateBuilder {
    table: &'static str,
    assignments: Vec<(&'static str, Box<dyn ToSql>)>,
}

impl UpdateBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            assignments: Vec::new(),
        }
    }

    /// Assign `value` to `column` if the patch carries it.
    pub fn set<T: ToSql + 'static>(&mut self, column: &'static str, value: Option<T>) {
        if let Some(value) = value {
            self.assignments.push((column, Box::new(value)));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Columns that will be written, in order.
    pub fn columns(&self) -> Vec<&'static str> {
        self.assignments.iter().map(|(column, _)| *column).collect()
    }

    fn sql(&self) -> String {
        let sets = self
            .assignments
            .iter()
            .map(|(column, _)| format!("{} = ?", column))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE {} SET {}, updated_at = ? WHERE id = ?",
            self.table, sets
        )
    }

    /// Run the update, stamping `updated_at`. Returns the affected row count.
    pub fn execute(
        self,
        conn: &Connection,
        id: &str,
        now: DateTime<Utc>,
    ) -> rusqlite::Result<usize> {
        let sql = self.sql();
        let mut params: Vec<&dyn ToSql> = self
            .assignments
            .iter()
            .map(|(_, value)| value.as_ref())
            .collect();
        params.push(&now);
        params.push(&id);
        conn.execute(&sql, params.as_slice())
    }
}
