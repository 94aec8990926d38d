//! Versioned schema migrations, recorded in `_migrations`.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// Applied in order, each at most once.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "create_worksheet_jobs_table",
    sql: include_str!("sql/001_create_worksheet_jobs.sql"),
}];

/// Applies every migration newer than the highest recorded version.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        conn.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied(conn: &Connection) -> u32 {
        conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap()
    }

    fn job_columns(conn: &Connection) -> Vec<String> {
        let mut stmt = conn.prepare("PRAGMA table_info(worksheet_jobs)").unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        assert_eq!(applied(&conn), MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        assert_eq!(applied(&conn), MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_jobs_table_has_every_record_field() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        let columns = job_columns(&conn);
        for expected in [
            "id",
            "owner",
            "request_json",
            "status",
            "progress_step",
            "progress_percent",
            "document_locator",
            "interactive_locator",
            "error_message",
            "created_at",
            "updated_at",
            "completed_at",
        ] {
            assert!(columns.iter().any(|c| c == expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_failed_migration_reports_version() {
        let conn = Connection::open_in_memory().unwrap();
        // A view with the table's name cannot be indexed.
        conn.execute_batch("CREATE VIEW worksheet_jobs AS SELECT 1 AS id;")
            .unwrap();

        let err = run_all(&conn).unwrap_err();
        assert!(matches!(err, DatabaseError::Migration { version: 1, .. }));
    }
}
