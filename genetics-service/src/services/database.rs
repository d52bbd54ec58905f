//! Read-only query layer over the genetics SQLite database.

use crate::models::{GeneSummary, InheritancePatternCount, StudiedGene, TraitSummary};
use crate::services::metrics;
use service_core::error::AppError;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");
const SEED_SQL: &str = include_str!("../../sql/seed.sql");

const GENES_QUERY: &str = r#"
    SELECT g.gene_id, g.gene_symbol, g.gene_name, g.description,
           COUNT(gta.association_id) AS association_count
    FROM Genes g
    LEFT JOIN Gene_Trait_Associations gta ON g.gene_id = gta.gene_id
    GROUP BY g.gene_id, g.gene_symbol, g.gene_name, g.description
    ORDER BY g.gene_symbol
"#;

const TRAITS_QUERY: &str = r#"
    SELECT t.trait_id, t.trait_name, t.category, t.inheritance_pattern,
           COUNT(gta.association_id) AS gene_count
    FROM Traits t
    LEFT JOIN Gene_Trait_Associations gta ON t.trait_id = gta.trait_id
    GROUP BY t.trait_id, t.trait_name, t.category, t.inheritance_pattern
    ORDER BY t.trait_name
"#;

const INHERITANCE_PATTERNS_QUERY: &str = r#"
    SELECT inheritance_pattern AS pattern, COUNT(*) AS count
    FROM Traits
    GROUP BY inheritance_pattern
"#;

const MOST_STUDIED_QUERY: &str = r#"
    SELECT g.gene_symbol AS gene, COUNT(DISTINCT gta.study_id) AS studies
    FROM Gene_Trait_Associations gta
    JOIN Genes g ON g.gene_id = gta.gene_id
    GROUP BY g.gene_symbol
    ORDER BY studies DESC, g.gene_symbol
    LIMIT 10
"#;

/// Connection pool wrapper for the genetics database.
#[derive(Clone)]
pub struct GeneticsDb {
    pool: SqlitePool,
}

impl GeneticsDb {
    /// Open the database at `path`, creating and seeding it if the file is absent.
    ///
    /// An existing file is never re-initialized.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn bootstrap(path: &Path, max_connections: u32) -> Result<Self, AppError> {
        Self::bootstrap_with(path, max_connections, SEED_SQL).await
    }

    async fn bootstrap_with(
        path: &Path,
        max_connections: u32,
        seed: &str,
    ) -> Result<Self, AppError> {
        let existed = tokio::fs::try_exists(path).await?;
        let db = Self::connect(path, max_connections).await?;

        if existed {
            info!("Database already exists, skipping initialization");
            return Ok(db);
        }

        let initialized = match db.apply_schema().await {
            Ok(()) => db.execute_script("seed", seed).await,
            Err(e) => Err(e),
        };

        if let Err(e) = initialized {
            // Remove the half-built file so the next start retries initialization.
            db.close().await;
            if let Err(remove_err) = tokio::fs::remove_file(path).await {
                tracing::warn!(error = %remove_err, "Failed to remove partially initialized database");
            }
            return Err(e);
        }

        info!("Database initialized from bundled schema and seed data");
        Ok(db)
    }

    /// Open a connection pool without touching the schema.
    pub async fn connect(path: &Path, max_connections: u32) -> Result<Self, AppError> {
        info!(max_connections = max_connections, "Connecting to SQLite");

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the tables and indexes.
    pub async fn apply_schema(&self) -> Result<(), AppError> {
        self.execute_script("apply_schema", SCHEMA_SQL).await
    }

    /// Run a multi-statement script on one connection.
    pub async fn execute_script(&self, operation: &str, script: &str) -> Result<(), AppError> {
        let mut conn = self.acquire(operation).await?;
        sqlx::raw_sql(script)
            .execute(&mut *conn)
            .await
            .map_err(|e| query_error(operation, e))?;
        Ok(())
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let mut conn = self.acquire("health_check").await?;
        sqlx::query("SELECT 1")
            .execute(&mut *conn)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// All genes with their association count, ordered by symbol.
    #[instrument(skip(self))]
    pub async fn list_genes(&self) -> Result<Vec<GeneSummary>, AppError> {
        let started = Instant::now();
        let mut conn = self.acquire("list_genes").await?;

        let genes = sqlx::query_as::<_, GeneSummary>(GENES_QUERY)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| query_error("list_genes", e))?;

        metrics::record_db_query("list_genes", started.elapsed().as_secs_f64());
        Ok(genes)
    }

    /// All traits with their association count, ordered by name.
    #[instrument(skip(self))]
    pub async fn list_traits(&self) -> Result<Vec<TraitSummary>, AppError> {
        let started = Instant::now();
        let mut conn = self.acquire("list_traits").await?;

        let traits = sqlx::query_as::<_, TraitSummary>(TRAITS_QUERY)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| query_error("list_traits", e))?;

        metrics::record_db_query("list_traits", started.elapsed().as_secs_f64());
        Ok(traits)
    }

    /// Trait counts grouped by inheritance pattern. Row order is unspecified.
    #[instrument(skip(self))]
    pub async fn inheritance_pattern_counts(
        &self,
    ) -> Result<Vec<InheritancePatternCount>, AppError> {
        let started = Instant::now();
        let mut conn = self.acquire("inheritance_pattern_counts").await?;

        let counts = sqlx::query_as::<_, InheritancePatternCount>(INHERITANCE_PATTERNS_QUERY)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| query_error("inheritance_pattern_counts", e))?;

        metrics::record_db_query("inheritance_pattern_counts", started.elapsed().as_secs_f64());
        Ok(counts)
    }

    /// Top ten genes by number of distinct studies, most studied first.
    #[instrument(skip(self))]
    pub async fn most_studied_genes(&self) -> Result<Vec<StudiedGene>, AppError> {
        let started = Instant::now();
        let mut conn = self.acquire("most_studied_genes").await?;

        let genes = sqlx::query_as::<_, StudiedGene>(MOST_STUDIED_QUERY)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| query_error("most_studied_genes", e))?;

        metrics::record_db_query("most_studied_genes", started.elapsed().as_secs_f64());
        Ok(genes)
    }

    /// Check out one pooled connection; it returns to the pool when dropped.
    async fn acquire(&self, operation: &str) -> Result<PoolConnection<Sqlite>, AppError> {
        self.pool.acquire().await.map_err(|e| {
            metrics::record_db_error(operation);
            AppError::DatabaseError(anyhow::anyhow!("Failed to acquire connection: {}", e))
        })
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn query_error(operation: &str, e: sqlx::Error) -> AppError {
    metrics::record_db_error(operation);
    AppError::DatabaseError(anyhow::anyhow!("{} failed: {}", operation, e))
}
