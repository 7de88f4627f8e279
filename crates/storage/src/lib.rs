use std::{str::FromStr, time::Duration};

use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use thiserror::Error;

use cupcakes_core::types::{Cupcake, CupcakeChanges, NewCupcake};

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    ///
    /// Pragmas are part of the connect options so every pooled connection
    /// carries them, not only the first one.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::Connect)?
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(5000));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(StorageError::Connect)?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle to operate on cupcakes.
    pub fn cupcakes(&self) -> CupcakeRepository {
        CupcakeRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Waits for checked-out connections and closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
}

/// Repository responsible for the `cupcakes` table.
#[derive(Clone)]
pub struct CupcakeRepository {
    pool: SqlitePool,
}

impl CupcakeRepository {
    /// Lists every cupcake in insertion order.
    pub async fn list_all(&self) -> Result<Vec<Cupcake>, CupcakeError> {
        let rows = sqlx::query_as::<_, CupcakeRow>(
            "SELECT id, flavor, size, rating, image FROM cupcakes ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CupcakeRow::into_domain).collect())
    }

    /// Loads a single cupcake by id.
    pub async fn fetch(&self, id: i64) -> Result<Cupcake, CupcakeError> {
        let row = sqlx::query_as::<_, CupcakeRow>(
            "SELECT id, flavor, size, rating, image FROM cupcakes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CupcakeError::NotFound(id))?;

        Ok(row.into_domain())
    }

    /// Inserts a new cupcake and returns it with its assigned id.
    pub async fn create(&self, cupcake: &NewCupcake) -> Result<Cupcake, CupcakeError> {
        let row = sqlx::query_as::<_, CupcakeRow>(
            "INSERT INTO cupcakes (flavor, size, rating, image) \
             VALUES (?, ?, ?, ?) \
             RETURNING id, flavor, size, rating, image",
        )
        .bind(&cupcake.flavor)
        .bind(&cupcake.size)
        .bind(cupcake.rating)
        .bind(cupcake.resolved_image())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_domain())
    }

    /// Overwrites all mutable fields of an existing cupcake.
    pub async fn update(&self, id: i64, changes: &CupcakeChanges) -> Result<Cupcake, CupcakeError> {
        let row = sqlx::query_as::<_, CupcakeRow>(
            "UPDATE cupcakes \
             SET flavor = ?, size = ?, rating = ?, image = ? \
             WHERE id = ? \
             RETURNING id, flavor, size, rating, image",
        )
        .bind(&changes.flavor)
        .bind(&changes.size)
        .bind(changes.rating)
        .bind(&changes.image)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(CupcakeError::NotFound(id))?;

        Ok(row.into_domain())
    }

    /// Permanently removes a cupcake.
    pub async fn delete(&self, id: i64) -> Result<(), CupcakeError> {
        let result = sqlx::query("DELETE FROM cupcakes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CupcakeError::NotFound(id));
        }
        Ok(())
    }

    /// Returns the number of stored cupcakes.
    pub async fn count(&self) -> Result<u64, CupcakeError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cupcakes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

/// Row shape of the `cupcakes` table.
#[derive(Debug, sqlx::FromRow)]
struct CupcakeRow {
    id: i64,
    flavor: String,
    size: String,
    rating: f64,
    image: String,
}

impl CupcakeRow {
    fn into_domain(self) -> Cupcake {
        Cupcake {
            id: self.id,
            flavor: self.flavor,
            size: self.size,
            rating: self.rating,
            image: self.image,
        }
    }
}

/// Errors that can occur while operating on cupcakes.
#[derive(Debug, Error)]
pub enum CupcakeError {
    #[error("cupcake {0} not found")]
    NotFound(i64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl CupcakeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
