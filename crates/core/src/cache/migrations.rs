//! Schema migrations for the tier store.
//!
//! Applied versions are recorded in `schema_migrations`; each pending
//! migration runs in its own transaction together with its version row.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Ordered `(version, sql)` pairs. Versions strictly increase.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_tiers.sql"))];

/// Apply every migration newer than the recorded version.
///
/// Returns how many were applied.
pub async fn run(conn: &Connection) -> Result<usize, Error> {
    conn.call(|conn| -> Result<usize, Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )?;

        let current: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| row.get(0))?;

        let mut applied = 0;
        for (version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version, "applied cache migration");
            applied += 1;
        }

        Ok(applied)
    })
    .await
    .map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_exists(conn: &Connection, name: &'static str) -> bool {
        conn.call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
                [name],
                |row| row.get(0),
            )
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_second_run_applies_nothing() {
        let conn = Connection::open_in_memory().await.unwrap();
        assert_eq!(run(&conn).await.unwrap(), MIGRATIONS.len());
        assert_eq!(run(&conn).await.unwrap(), 0);

        assert!(table_exists(&conn, "tiers").await);
        assert!(table_exists(&conn, "entries").await);
    }

    #[tokio::test]
    async fn test_versions_recorded() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let versions: Vec<i64> = conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<Result<Vec<i64>, _>>()
            })
            .await
            .unwrap();

        let expected: Vec<i64> = MIGRATIONS.iter().map(|(version, _)| *version).collect();
        assert_eq!(versions, expected);
    }
}
