use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::store::{document_id, unique_value, Collection, Document, DocumentStore, StoreError};
use crate::config::DatabaseConfig;
use crate::filter::{Filter, FilterData};

const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL backend: every collection shares one `documents` table with the
/// record kept as JSONB. Unique fields get partial expression indexes.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let url = config
            .connection_string()
            .ok_or_else(|| StoreError::Unavailable("DATABASE_URL is not set".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&url)
            .await?;

        info!("Connected to PostgreSQL (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    /// Create the documents table and one unique index per unique field
    pub async fn migrate(&self, collections: &[Collection]) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS "documents" (
                "collection" TEXT NOT NULL,
                "id" UUID NOT NULL,
                "body" JSONB NOT NULL,
                "seq" BIGSERIAL,
                "created_at" TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY ("collection", "id")
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for collection in collections {
            for field in collection.unique {
                let sql = format!(
                    r#"CREATE UNIQUE INDEX IF NOT EXISTS "{}" ON "documents" (("body"->>'{}')) WHERE "collection" = '{}'"#,
                    index_name(collection, field),
                    field,
                    collection.name
                );
                sqlx::query(&sql).execute(&self.pool).await?;
            }
        }

        info!("Document schema ready for {} collections", collections.len());
        Ok(())
    }

    fn map_error(collection: &Collection, doc: &Document, err: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let field = db_err.constraint().and_then(|constraint| {
                    collection
                        .unique
                        .iter()
                        .find(|field| index_name(collection, field) == constraint)
                });
                if let Some(field) = field {
                    return StoreError::DuplicateKey {
                        field: field.to_string(),
                        value: doc.get(*field).and_then(unique_value).unwrap_or_default(),
                    };
                }
            }
        }
        StoreError::Sqlx(err)
    }
}

fn index_name(collection: &Collection, field: &str) -> String {
    format!("documents_{}_{}_key", collection.name, field)
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn insert(&self, collection: &Collection, doc: Document) -> Result<Document, StoreError> {
        let id = document_id(&doc)?;
        sqlx::query(r#"INSERT INTO "documents" ("collection", "id", "body") VALUES ($1, $2, $3)"#)
            .bind(collection.name)
            .bind(id)
            .bind(Json(&doc))
            .execute(&self.pool)
            .await
            .map_err(|err| Self::map_error(collection, &doc, err))?;
        Ok(doc)
    }

    async fn find(&self, collection: &Collection, filter: &FilterData) -> Result<Vec<Document>, StoreError> {
        let sql = Filter::new().assign(filter)?.to_sql()?;

        let mut query = sqlx::query_scalar::<_, Json<Document>>(&sql.query).bind(collection.name);
        for param in sql.params {
            query = query.bind(Json(param));
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|Json(doc)| doc).collect())
    }

    async fn replace(&self, collection: &Collection, id: Uuid, doc: Document) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query_scalar::<_, Json<Document>>(
            r#"UPDATE "documents" SET "body" = $3 WHERE "collection" = $1 AND "id" = $2 RETURNING "body""#,
        )
        .bind(collection.name)
        .bind(id)
        .bind(Json(&doc))
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| Self::map_error(collection, &doc, err))?;

        Ok(row.map(|Json(doc)| doc))
    }

    async fn delete(&self, collection: &Collection, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(r#"DELETE FROM "documents" WHERE "collection" = $1 AND "id" = $2"#)
            .bind(collection.name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self, collection: &Collection) -> Result<u64, StoreError> {
        let sql = Filter::new().to_delete_sql()?;
        let result = sqlx::query(&sql.query).bind(collection.name).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
