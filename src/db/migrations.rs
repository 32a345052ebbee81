//! Database initialization and schema migrations.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Open (creating if needed) the ledger database and apply the schema.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!(path = %db_path, "ledger database ready");
    Ok(pool)
}

/// Split a schema script into statements. `--` comment lines are dropped
/// first so a `;` inside a comment cannot cut a statement in two.
fn schema_statements(sql: &str) -> Vec<String> {
    let without_comments: String = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    without_comments
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Apply every schema statement in one transaction. Statements are idempotent.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut applied = 0usize;

    for statement in schema_statements(SCHEMA_SQL) {
        sqlx::query(&statement).execute(&mut *tx).await?;
        applied += 1;
    }

    tx.commit().await?;
    info!(statements = applied, "schema migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn fresh_pool() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("ledger.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (pool, temp_dir)
    }

    #[tokio::test]
    async fn test_init_db_creates_nested_path() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("data/shop/ledger.db");
        let db_path = db_path.to_string_lossy().to_string();

        init_db(&db_path).await.expect("init_db failed");
        assert!(Path::new(&db_path).exists());
    }

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let (pool, _temp) = fresh_pool().await;

        for table in [
            "collaterals",
            "loans",
            "payments",
            "tills",
            "till_movements",
            "reconciliations",
        ] {
            let result: (String,) =
                sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
                    .bind(table)
                    .fetch_one(&pool)
                    .await
                    .expect("query failed");
            assert_eq!(result.0, table);
        }
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let (pool, _temp) = fresh_pool().await;
        run_migrations(&pool)
            .await
            .expect("second migration run failed");
        run_migrations(&pool)
            .await
            .expect("third migration run failed");
    }

    #[test]
    fn test_comment_semicolons_do_not_split_statements() {
        let sql = "-- header; with a semicolon\nCREATE TABLE a (id TEXT);\n  -- trailing; note\nCREATE INDEX i ON a (id);\n";
        assert_eq!(
            schema_statements(sql),
            vec!["CREATE TABLE a (id TEXT)", "CREATE INDEX i ON a (id)"]
        );
    }

    #[test]
    fn test_schema_statements_all_start_with_sql() {
        let statements = schema_statements(SCHEMA_SQL);
        assert!(!statements.is_empty());
        for statement in statements {
            assert!(
                statement.starts_with("CREATE") || statement.starts_with("PRAGMA"),
                "unexpected statement start: {}",
                statement
            );
        }
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let (pool, _temp) = fresh_pool().await;

        let result: (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert_eq!(result.0, 1);

        let orphan = sqlx::query(
            "INSERT INTO payments (id, loan_id, amount, kind, registered_at) VALUES ('p', 'missing', '1.00', 'interest_only', 'x')",
        )
        .execute(&pool)
        .await;
        assert!(orphan.is_err());
    }
}
