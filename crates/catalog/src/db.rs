//! Connection pool and schema migrations.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Embedded migrations, applied on every connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
// The scanner and request handlers share the pool; writes still serialize
// on SQLite's single writer lock.
const MAX_CONNECTIONS: u32 = 4;

/// Pooled connection to the catalog database.
///
/// Hand it to [`Repository::from`](crate::Repository) to run queries.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn new(options: SqliteConnectOptions, max: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Query-based PRAGMAs must run on EVERY pooled connection, not
            // only the first one handed out.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open (creating if missing) the catalog at `path` and run migrations.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = Self::base_options().filename(path.as_ref()).create_if_missing(true);
        Self::new(options, MAX_CONNECTIONS).await
    }

    /// Open a throwaway in-memory catalog.
    ///
    /// Limited to a single connection: separate in-memory connections would
    /// each see their own empty database. Not `#[cfg(test)]` so that other
    /// crates can use it in their tests.
    ///
    /// Holding a [`Transaction`](crate::Transaction) occupies that one
    /// connection; don't query through the [`Repository`](crate::Repository)
    /// until it is committed or dropped.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        Self::new(options, 1).await
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            // Link tables rely on cascading deletes and composite keys.
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            // A scan pass and an association can contend for the writer lock.
            .busy_timeout(Duration::from_millis(1500))
    }

    /// PRAGMAs that aren't exposed via `SqliteConnectOptions`.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA wal_autocheckpoint = 800;
                PRAGMA cache_size = -4096;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    #[instrument("performing database migrations", skip_all)]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// The underlying pool, for queries the repository doesn't cover.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Let SQLite refresh planner statistics, then close every connection.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
