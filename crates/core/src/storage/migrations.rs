//! Table schema migrations for the SQLite backend.
//!
//! These cover the `kv_store` table only. The layout of the values stored in
//! it is versioned separately by the store's data migrations.

use tokio_rusqlite::{Connection, params};

use super::Error;

/// Ordered `(version, SQL)` pairs. Each one is applied at most once.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_kv_store.sql"))];

/// Apply every table migration newer than the recorded version, each in its
/// own transaction.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )?;

        let applied: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for (version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > applied) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("table migration {version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::info!(version, "Applied table migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
