use super::{
    DocumentStore, DocumentWriter, EqualityFilter, EqualityQuery, IndexedField, MembershipQuery,
    SortOrder, StoreError,
};
use crate::metrics::query::REDUCER_DROPPED_TOTAL;
use crate::models::RawDocument;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};

/// Token ceiling advertised for a single `= ANY($n)` membership filter.
pub const PG_MAX_MEMBERSHIP_TOKENS: usize = 100;

/// Postgres-backed document store over the `post_documents` JSONB table.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    max_membership_tokens: usize,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            max_membership_tokens: PG_MAX_MEMBERSHIP_TOKENS,
        }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        info!(max_connections, "Connected to document store");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {}", e)))
    }

    async fn fetch(
        &self,
        sql: &str,
        collection: &str,
        tokens: Option<&[String]>,
        equality: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RawDocument>, StoreError> {
        let mut query = sqlx::query_scalar::<_, serde_json::Value>(sql)
            .bind(collection)
            .bind(limit as i64);
        if let Some(tokens) = tokens {
            query = query.bind(tokens);
        }
        if let Some(value) = equality {
            query = query.bind(value);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(decode_rows(rows))
    }
}

/// Decode stored payloads, skipping rows that no longer match the document
/// shape instead of failing the whole chunk.
fn decode_rows(rows: Vec<serde_json::Value>) -> Vec<RawDocument> {
    rows.into_iter()
        .filter_map(|value| match RawDocument::from_value(value) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(error = %e, "Skipping undecodable document");
                REDUCER_DROPPED_TOTAL
                    .with_label_values(&["undecodable"])
                    .inc();
                None
            }
        })
        .collect()
}

/// SQL expression testing membership of `field` in the text array `$param`.
fn membership_expr(field: IndexedField, param: usize) -> String {
    match field {
        IndexedField::GeoCell(tier) => {
            format!("doc->'geo'->>'{}' = ANY(${})", tier.field(), param)
        }
        IndexedField::Hashtags => format!("doc->'entities'->'hashtags' ?| ${}", param),
        IndexedField::Username => format!("doc->>'username' = ANY(${})", param),
    }
}

/// SQL expression testing `field` against the scalar `$param`.
fn equality_expr(field: IndexedField, param: usize) -> String {
    match field {
        IndexedField::GeoCell(tier) => format!("doc->'geo'->>'{}' = ${}", tier.field(), param),
        IndexedField::Hashtags => format!("doc->'entities'->'hashtags' ? ${}", param),
        IndexedField::Username => format!("doc->>'username' = ${}", param),
    }
}

fn order_by(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::TimeDesc => r#"ORDER BY doc->>'time' COLLATE "C" DESC NULLS LAST"#,
    }
}

/// `$1` collection, `$2` limit, `$3` tokens, `$4` optional equality value.
fn membership_sql(
    field: IndexedField,
    equality: Option<&EqualityFilter>,
    sort: SortOrder,
) -> String {
    let mut sql = format!(
        "SELECT doc FROM post_documents WHERE collection = $1 AND {}",
        membership_expr(field, 3)
    );
    if let Some(filter) = equality {
        sql.push_str(" AND ");
        sql.push_str(&equality_expr(filter.field, 4));
    }
    sql.push(' ');
    sql.push_str(order_by(sort));
    sql.push_str(" LIMIT $2");
    sql
}

/// `$1` collection, `$2` limit, `$3` equality value.
fn equality_sql(filter: &EqualityFilter, sort: SortOrder) -> String {
    format!(
        "SELECT doc FROM post_documents WHERE collection = $1 AND {} {} LIMIT $2",
        equality_expr(filter.field, 3),
        order_by(sort)
    )
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn max_membership_tokens(&self) -> usize {
        self.max_membership_tokens
    }

    async fn query_membership(
        &self,
        query: &MembershipQuery,
    ) -> Result<Vec<RawDocument>, StoreError> {
        if query.tokens.len() > self.max_membership_tokens {
            return Err(StoreError::TooManyTokens {
                count: query.tokens.len(),
                max: self.max_membership_tokens,
            });
        }
        let sql = membership_sql(query.field, query.equality.as_ref(), query.sort);
        self.fetch(
            &sql,
            &query.collection,
            Some(&query.tokens),
            query.equality.as_ref().map(|eq| eq.value.as_str()),
            query.limit,
        )
        .await
    }

    async fn query_equality(&self, query: &EqualityQuery) -> Result<Vec<RawDocument>, StoreError> {
        let sql = equality_sql(&query.filter, query.sort);
        self.fetch(
            &sql,
            &query.collection,
            None,
            Some(query.filter.value.as_str()),
            query.limit,
        )
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentWriter for PgDocumentStore {
    async fn upsert(&self, collection: &str, doc: RawDocument) -> Result<(), StoreError> {
        let (owner_key, message_id) = doc.composite_key().ok_or(StoreError::MissingKey)?;
        let payload = serde_json::to_value(&doc)?;

        sqlx::query(
            r#"
            INSERT INTO post_documents (collection, owner_key, message_id, doc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (collection, owner_key, message_id)
            DO UPDATE SET doc = EXCLUDED.doc, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(owner_key)
        .bind(message_id)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(
        &self,
        collection: &str,
        owner_key: &str,
        message_id: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM post_documents \
             WHERE collection = $1 AND owner_key = $2 AND message_id = $3",
        )
        .bind(collection)
        .bind(owner_key)
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
