use async_trait::async_trait;
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Duration;

use super::{ScoredRecord, StagedRecord, VectorBackend};
use crate::error::BackendError;
use crate::models::{DatabaseConfig, StoreConfig};

/// SQLSTATE for `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

pub struct PgVectorBackend {
    pool: PgPool,
}

impl PgVectorBackend {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, BackendError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.pool_acquire_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_extension(&self) -> Result<(), BackendError> {
        let mut conn = self.pool.acquire().await?;

        let installed: Option<(String,)> =
            sqlx::query_as("SELECT extname::text FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&mut *conn)
                .await?;

        if installed.is_none() {
            sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    BackendError::Query(format!(
                        "pgvector extension is not installed and could not be created ({e}). Run: CREATE EXTENSION vector;"
                    ))
                })?;
        }

        Ok(())
    }

    async fn column_dimension(&self, table: &str) -> Result<Option<i32>, BackendError> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            SELECT atttypmod FROM pg_attribute
            WHERE attrelid = to_regclass($1) AND attname = 'embedding' AND NOT attisdropped
            "#,
        )
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.0))
    }
}

fn map_table_err(table: &StoreConfig, err: sqlx::Error) -> BackendError {
    if let sqlx::Error::Database(ref db) = err
        && db.code().as_deref() == Some(UNDEFINED_TABLE)
    {
        return BackendError::MissingTable(table.table_name.clone());
    }
    BackendError::from(err)
}

fn scored_record(row: PgRow) -> Result<ScoredRecord, BackendError> {
    let decode = |e: sqlx::Error| BackendError::Codec(e.to_string());
    Ok(ScoredRecord {
        id: row.try_get("id").map_err(decode)?,
        content: row.try_get("content").map_err(decode)?,
        embedding: row.try_get("embedding").map_err(decode)?,
        score: row.try_get("score").map_err(decode)?,
    })
}

#[async_trait]
impl VectorBackend for PgVectorBackend {
    async fn health_check(&self) -> Result<bool, BackendError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| BackendError::Connection(e.to_string()))
    }

    async fn count(&self, table: &StoreConfig) -> Result<Option<u64>, BackendError> {
        let exists: (Option<String>,) = sqlx::query_as("SELECT to_regclass($1)::text")
            .bind(&table.table_name)
            .fetch_one(&self.pool)
            .await?;

        if exists.0.is_none() {
            return Ok(None);
        }

        let query = format!("SELECT COUNT(*) FROM {}", table.table_name);
        let row: (i64,) = sqlx::query_as(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_table_err(table, e))?;

        Ok(Some(u64::try_from(row.0).unwrap_or_default()))
    }

    async fn ensure_schema(&self, table: &StoreConfig) -> Result<(), BackendError> {
        self.ensure_extension().await?;

        let mut statements = Vec::with_capacity(3);
        if let Some((schema, _)) = table.table_name.split_once('.') {
            statements.push(format!("CREATE SCHEMA IF NOT EXISTS {schema}"));
        }
        statements.push(format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL DEFAULT '',
                embedding vector({}) NOT NULL
            )
            "#,
            table.table_name, table.dimensions
        ));
        // IVF index: `lists` partitions, cosine distance.
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING ivfflat (embedding vector_cosine_ops) WITH (lists = {})",
            table.index_name(),
            table.table_name,
            table.index.partitions
        ));

        let mut conn = self.pool.acquire().await?;
        for statement in &statements {
            sqlx::query(statement).execute(&mut *conn).await?;
        }
        drop(conn);

        // CREATE TABLE IF NOT EXISTS keeps an older table as is.
        match self.column_dimension(&table.table_name).await? {
            Some(existing) if usize::try_from(existing).ok() == Some(table.dimensions) => Ok(()),
            Some(existing) => Err(BackendError::Query(format!(
                "table {} stores vectors of dimension {}, expected {}",
                table.table_name, existing, table.dimensions
            ))),
            None => Err(BackendError::MissingTable(table.table_name.clone())),
        }
    }

    async fn upsert_batch(
        &self,
        table: &StoreConfig,
        records: &[StagedRecord],
    ) -> Result<(), BackendError> {
        if records.is_empty() {
            return Ok(());
        }

        let query = format!(
            r#"
            INSERT INTO {} (id, content, embedding)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                content = EXCLUDED.content,
                embedding = EXCLUDED.embedding
            "#,
            table.table_name
        );

        // Dropping the transaction without commit rolls the batch back.
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(&query)
                .bind(&record.id)
                .bind(&record.content)
                .bind(&record.embedding)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_table_err(table, e))?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn nearest(
        &self,
        table: &StoreConfig,
        query: &Vector,
        max_results: usize,
        min_score: f64,
    ) -> Result<Vec<ScoredRecord>, BackendError> {
        let limit = i64::try_from(max_results).unwrap_or(i64::MAX);
        let sql = format!(
            r#"
            SELECT
                id,
                content,
                embedding,
                1 - (embedding <=> $1) AS score
            FROM {}
            WHERE 1 - (embedding <=> $1) >= $2
            ORDER BY embedding <=> $1, id
            LIMIT $3
            "#,
            table.table_name
        );

        let mut tx = self.pool.begin().await?;

        // SET LOCAL does not take bind parameters; probes is an integer.
        sqlx::query(&format!(
            "SET LOCAL ivfflat.probes = {}",
            table.index.probes()
        ))
        .execute(&mut *tx)
        .await?;

        let rows = sqlx::query(&sql)
            .bind(query)
            .bind(min_score)
            .bind(limit)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_table_err(table, e))?;

        tx.commit().await?;

        rows.into_iter().map(scored_record).collect()
    }

    fn name(&self) -> &str {
        "pgvector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Embedding;
    use crate::models::SearchQuery;
    use crate::services::VectorStore;
    use std::sync::Arc;

    async fn connect() -> PgVectorBackend {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let config = DatabaseConfig {
            url,
            ..Default::default()
        };
        PgVectorBackend::connect(&config).await.unwrap()
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL with pgvector (DATABASE_URL)"]
    async fn test_schema_write_and_search() {
        let backend = Arc::new(connect().await);
        let table = format!("vecstore_test_{}", uuid::Uuid::new_v4().simple());
        let store = VectorStore::new(backend.clone(), StoreConfig::new(&table, 3)).unwrap();

        store.create_schema_if_not_exists().await.unwrap();
        store.create_schema_if_not_exists().await.unwrap();

        store
            .add_all(&[
                Embedding::new(vec![1.0, 0.0, 0.0], "a"),
                Embedding::new(vec![0.0, 1.0, 0.0], "b"),
                Embedding::new(vec![0.9, 0.1, 0.0], "c"),
            ])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), Some(3));

        let results = store
            .search(
                &SearchQuery::new(vec![1.0, 0.0, 0.0])
                    .with_max_results(2)
                    .with_min_score(0.5),
            )
            .await
            .unwrap();
        let contents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "c"]);

        sqlx::query(&format!("DROP TABLE {table}"))
            .execute(backend.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL with pgvector (DATABASE_URL)"]
    async fn test_missing_table_count_is_none() {
        let backend = connect().await;
        let table = StoreConfig::new("vecstore_definitely_missing", 3);
        assert_eq!(backend.count(&table).await.unwrap(), None);
    }
}
