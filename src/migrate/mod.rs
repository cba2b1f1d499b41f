//! Startup schema evolution.
//!
//! The [`SchemaEvolver`] compares the physical SQLite layout against the
//! shape the metadata engine needs and applies only the missing pieces:
//!
//! ```text
//!   introspect ──► missing set ──► one additive step per item ──► current
//!        ▲                                                          │
//!        └────────────── re-run: missing set is empty ◄─────────────┘
//! ```
//!
//! # Design
//!
//! - Additive only: create table, add column, create index, create trigger
//! - Every step is idempotent and runs in its own transaction
//! - A failing step is logged and skipped; later steps still run
//! - Applied steps are recorded in `schema_migrations` with a checksum, but
//!   the gap is always re-derived from introspection so that databases
//!   created before the log existed evolve the same way

mod checksum;
pub mod introspect;
mod steps;

pub use checksum::compute_checksum;
pub use introspect::SchemaSnapshot;
pub use steps::{
    MigrationStep, StepAction, FIELDS_BASE_COLUMNS, FIELDS_TABLE, MIGRATION_LOG_TABLE,
    RELATIONSHIP_TABLE, RELATIONSHIP_TRIGGER, STEPS,
};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::store::Database;

/// Errors raised by the evolver.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("{} migration step(s) failed: {}", .failed.len(), StepFailure::summarize(.failed))]
    Incomplete { failed: Vec<StepFailure> },

    #[error("Schema introspection failed: {0}")]
    Introspection(#[from] rusqlite::Error),
}

pub type MigrationResult<T> = Result<T, MigrationError>;

/// A step that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    pub step: &'static str,
    pub error: String,
}

impl StepFailure {
    fn summarize(failed: &[StepFailure]) -> String {
        failed
            .iter()
            .map(|f| format!("{} ({})", f.step, f.error))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Outcome of one evolver run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Steps executed in this run.
    pub applied: Vec<&'static str>,
    /// Steps whose object already existed.
    pub skipped: Vec<&'static str>,
    /// Steps that failed.
    pub failed: Vec<StepFailure>,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turn failed steps into an error.
    pub fn into_result(self) -> MigrationResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(MigrationError::Incomplete {
                failed: self.failed,
            })
        }
    }
}

/// Which required pieces are present and which are missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// Required `fields` columns that do not exist yet.
    pub missing_columns: Vec<String>,
    /// Required `fields` columns that exist.
    pub present_columns: Vec<String>,
    /// Tables, indexes, triggers (and columns of other tables) still missing.
    pub missing_objects: Vec<String>,
    pub relationship_table_present: bool,
    pub relationship_trigger_present: bool,
    /// Rows in the relationship table, 0 when it is absent.
    pub relationship_row_count: i64,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.missing_columns.is_empty() && self.missing_objects.is_empty()
    }
}

/// One row of the migration log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedStep {
    pub step: String,
    pub checksum: String,
    pub applied_at: DateTime<Utc>,
}

/// Reconciles the physical layout with the required one.
pub struct SchemaEvolver<'a> {
    conn: &'a Connection,
    steps: &'a [MigrationStep],
}

impl<'a> SchemaEvolver<'a> {
    /// An evolver with the built-in step catalogue.
    pub fn new(db: &'a Database) -> Self {
        Self::with_steps(db, STEPS)
    }

    /// An evolver with a custom step list.
    pub fn with_steps(db: &'a Database, steps: &'a [MigrationStep]) -> Self {
        Self {
            conn: db.conn(),
            steps,
        }
    }

    /// Whether any step still has to run. Never writes.
    pub fn needs_migration(&self) -> MigrationResult<bool> {
        let snapshot = SchemaSnapshot::capture(self.conn)?;
        Ok(self.steps.iter().any(|step| !step.is_satisfied(&snapshot)))
    }

    /// Enumerate present and missing pieces. Never writes.
    pub fn status(&self) -> MigrationResult<MigrationStatus> {
        let snapshot = SchemaSnapshot::capture(self.conn)?;

        let required_columns = FIELDS_BASE_COLUMNS.iter().copied().chain(
            self.steps.iter().filter_map(|step| match step.action {
                StepAction::AddColumn { table, column, .. } if table == FIELDS_TABLE => {
                    Some(column)
                }
                _ => None,
            }),
        );

        let mut missing_columns = Vec::new();
        let mut present_columns = Vec::new();
        for column in required_columns {
            if snapshot.has_column(FIELDS_TABLE, column) {
                present_columns.push(column.to_string());
            } else {
                missing_columns.push(column.to_string());
            }
        }

        let missing_objects = self
            .steps
            .iter()
            .filter(|step| {
                !matches!(step.action, StepAction::AddColumn { table, .. } if table == FIELDS_TABLE)
            })
            .filter(|step| !step.is_satisfied(&snapshot))
            .map(MigrationStep::target)
            .collect();

        let relationship_table_present = snapshot.has_table(RELATIONSHIP_TABLE);
        let relationship_row_count = if relationship_table_present {
            self.conn
                .query_row("SELECT COUNT(*) FROM entity_relationships", [], |row| {
                    row.get(0)
                })?
        } else {
            0
        };

        Ok(MigrationStatus {
            missing_columns,
            present_columns,
            missing_objects,
            relationship_table_present,
            relationship_trigger_present: snapshot.has_trigger(RELATIONSHIP_TRIGGER),
            relationship_row_count,
        })
    }

    /// Apply every missing step.
    ///
    /// Never fails as a whole: per-step failures are logged and collected in
    /// the report. Safe to call repeatedly; a run on a current database
    /// executes no statements that write.
    pub fn run(&self) -> MigrationReport {
        let mut report = MigrationReport::default();

        for step in self.steps {
            let snapshot = match SchemaSnapshot::capture(self.conn) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(step = step.id, error = %err, "schema introspection failed");
                    report.failed.push(StepFailure {
                        step: step.id,
                        error: err.to_string(),
                    });
                    continue;
                }
            };

            if step.is_satisfied(&snapshot) {
                report.skipped.push(step.id);
                continue;
            }

            match self.apply(step) {
                Ok(()) => {
                    info!(step = step.id, target = %step.target(), "applied migration step");
                    report.applied.push(step.id);
                }
                Err(err) => {
                    warn!(
                        step = step.id,
                        target = %step.target(),
                        error = %err,
                        "migration step failed"
                    );
                    report.failed.push(StepFailure {
                        step: step.id,
                        error: err.to_string(),
                    });
                }
            }
        }

        if report.applied.is_empty() && report.failed.is_empty() {
            debug!("schema is current");
        } else {
            info!(
                applied = report.applied.len(),
                failed = report.failed.len(),
                "schema evolution finished"
            );
        }

        report
    }

    /// Run one step and record it in the log, atomically.
    fn apply(&self, step: &MigrationStep) -> rusqlite::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(&step.sql())?;

        let log_present: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![MIGRATION_LOG_TABLE],
            |row| row.get(0),
        )?;
        if log_present {
            tx.execute(
                "INSERT OR REPLACE INTO schema_migrations (step, checksum, applied_at)
                 VALUES (?1, ?2, ?3)",
                params![step.id, step.checksum(), Utc::now()],
            )?;
        }

        tx.commit()
    }

    /// Steps recorded in the migration log, oldest first.
    pub fn applied_steps(&self) -> MigrationResult<Vec<AppliedStep>> {
        let log_present = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![MIGRATION_LOG_TABLE],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .is_some();
        if !log_present {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            "SELECT step, checksum, applied_at FROM schema_migrations ORDER BY applied_at, step",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(AppliedStep {
                    step: row.get(0)?,
                    checksum: row.get(1)?,
                    applied_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
