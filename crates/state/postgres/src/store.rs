use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use draftsync_core::{DraftKind, DraftRecord, FormType, ItemKind, SubjectId};
use draftsync_state::{DraftStore, DraftTransaction, InsertOutcome, StateError};

use crate::config::PostgresConfig;
use crate::migrations;

type DraftRow = (
    Uuid,
    String,
    String,
    String,
    String,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
);

const COLUMNS: &str = "draft_id, subject_id, form_type, kind, item, done, created_at, updated_at";

/// Build `PgConnectOptions` from a [`PostgresConfig`], applying SSL settings
/// when configured.
pub(crate) fn build_connect_options(
    config: &PostgresConfig,
) -> Result<sqlx::postgres::PgConnectOptions, StateError> {
    let mut options: sqlx::postgres::PgConnectOptions = config
        .url
        .parse()
        .map_err(|e: sqlx::Error| StateError::Connection(e.to_string()))?;

    if let Some(ref mode) = config.ssl_mode {
        let ssl_mode = match mode.as_str() {
            "disable" => sqlx::postgres::PgSslMode::Disable,
            "prefer" => sqlx::postgres::PgSslMode::Prefer,
            "require" => sqlx::postgres::PgSslMode::Require,
            "verify-ca" => sqlx::postgres::PgSslMode::VerifyCa,
            "verify-full" => sqlx::postgres::PgSslMode::VerifyFull,
            other => {
                return Err(StateError::Connection(format!("unknown ssl_mode: {other}")));
            }
        };
        options = options.ssl_mode(ssl_mode);
    }

    if let Some(ref path) = config.ssl_root_cert {
        options = options.ssl_root_cert(path);
    }

    Ok(options)
}

fn backend_error(err: sqlx::Error) -> StateError {
    match err {
        sqlx::Error::PoolTimedOut => StateError::Timeout,
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed => {
            StateError::Connection(err.to_string())
        }
        other => StateError::Backend(other.to_string()),
    }
}

fn record_from_row(row: DraftRow) -> Result<DraftRecord, StateError> {
    let (draft_id, subject_id, form_type, kind, item, done, created_at, updated_at) = row;
    Ok(DraftRecord {
        subject_id: SubjectId::parse(subject_id)
            .map_err(|e| StateError::Corrupt(format!("{draft_id}: {e}")))?,
        form_type: form_type
            .parse::<FormType>()
            .map_err(|e| StateError::Corrupt(format!("{draft_id}: {e}")))?,
        draft_id,
        kind: DraftKind::from_db(&kind)
            .ok_or_else(|| StateError::Corrupt(format!("{draft_id}: unknown kind {kind}")))?,
        item: ItemKind::from_db(&item)
            .ok_or_else(|| StateError::Corrupt(format!("{draft_id}: unknown item {item}")))?,
        done,
        created_at,
        updated_at,
    })
}

/// PostgreSQL-backed implementation of [`DraftStore`].
///
/// Uniqueness of open records is enforced by a partial unique index; inserts
/// use `ON CONFLICT DO NOTHING` so a lost race reads as
/// [`InsertOutcome::Conflict`].
pub struct PostgresDraftStore {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresDraftStore {
    /// Connect, create the pool and run migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Connection`] if pool creation fails, or
    /// [`StateError::Backend`] if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StateError> {
        let connect_options = build_connect_options(&config)?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .connect_with(connect_options)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;
        Self::from_pool(pool, config).await
    }

    /// Create a store from an existing pool. Runs migrations on creation.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Backend`] if migrations fail.
    pub async fn from_pool(pool: PgPool, config: PostgresConfig) -> Result<Self, StateError> {
        migrations::run_migrations(&pool, &config)
            .await
            .map_err(|e| StateError::Backend(e.to_string()))?;

        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }
}

#[async_trait]
impl DraftStore for PostgresDraftStore {
    async fn begin(&self) -> Result<Box<dyn DraftTransaction>, StateError> {
        let tx = self.pool.begin().await.map_err(backend_error)?;
        Ok(Box::new(PostgresDraftTransaction {
            tx,
            table: self.config.drafts_table(),
        }))
    }

    async fn count_open(&self) -> Result<u64, StateError> {
        let table = self.config.drafts_table();
        let query = format!("SELECT COUNT(*) FROM {table} WHERE NOT done");
        let (count,): (i64,) = sqlx::query_as(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

struct PostgresDraftTransaction {
    tx: Transaction<'static, Postgres>,
    table: String,
}

impl PostgresDraftTransaction {
    async fn flag(&mut self, draft_id: Uuid, assignment: &str) -> Result<bool, StateError> {
        let table = &self.table;
        let query = format!(
            "UPDATE {table} SET {assignment}, updated_at = NOW() WHERE draft_id = $1 AND NOT done"
        );
        let result = sqlx::query(&query)
            .bind(draft_id)
            .execute(&mut *self.tx)
            .await
            .map_err(backend_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DraftTransaction for PostgresDraftTransaction {
    async fn find_by_draft_id(&mut self, draft_id: Uuid) -> Result<Option<DraftRecord>, StateError> {
        let table = &self.table;
        let query = format!("SELECT {COLUMNS} FROM {table} WHERE draft_id = $1");
        let row: Option<DraftRow> = sqlx::query_as(&query)
            .bind(draft_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(backend_error)?;
        row.map(record_from_row).transpose()
    }

    async fn find_open(
        &mut self,
        subject: &SubjectId,
        form_type: FormType,
    ) -> Result<Vec<DraftRecord>, StateError> {
        let table = &self.table;
        let query = format!(
            "SELECT {COLUMNS} FROM {table} \
             WHERE subject_id = $1 AND form_type = $2 AND NOT done \
             ORDER BY created_at"
        );
        let rows: Vec<DraftRow> = sqlx::query_as(&query)
            .bind(subject.expose())
            .bind(form_type.as_str())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(backend_error)?;
        rows.into_iter().map(record_from_row).collect()
    }

    async fn insert(&mut self, record: &DraftRecord) -> Result<InsertOutcome, StateError> {
        let table = &self.table;
        let query = format!(
            "INSERT INTO {table} ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT DO NOTHING"
        );
        let result = sqlx::query(&query)
            .bind(record.draft_id)
            .bind(record.subject_id.expose())
            .bind(record.form_type.as_str())
            .bind(record.kind.as_str())
            .bind(record.item.as_str())
            .bind(record.done)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(backend_error)?;
        if result.rows_affected() == 0 {
            debug!(draft_id = %record.draft_id, "insert hit uniqueness constraint");
            return Ok(InsertOutcome::Conflict);
        }
        Ok(InsertOutcome::Inserted)
    }

    async fn mark_updated(&mut self, draft_id: Uuid) -> Result<bool, StateError> {
        self.flag(draft_id, "kind = 'UPDATED'").await
    }

    async fn mark_done(&mut self, draft_id: Uuid) -> Result<bool, StateError> {
        self.flag(draft_id, "done = TRUE").await
    }

    async fn commit(self: Box<Self>) -> Result<(), StateError> {
        self.tx.commit().await.map_err(backend_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StateError> {
        self.tx.rollback().await.map_err(backend_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_options_reject_unknown_ssl_mode() {
        let config = PostgresConfig {
            ssl_mode: Some("sometimes".into()),
            ..PostgresConfig::default()
        };
        assert!(matches!(
            build_connect_options(&config),
            Err(StateError::Connection(_))
        ));
    }

    #[test]
    fn row_mapping() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let record = record_from_row((
            id,
            "01017012345".into(),
            "ABROAD".into(),
            "UPDATED".into(),
            "TASK".into(),
            false,
            now,
            now,
        ))
        .unwrap();
        assert_eq!(record.draft_id, id);
        assert_eq!(record.form_type, FormType::Abroad);
        assert_eq!(record.kind, DraftKind::Updated);
        assert_eq!(record.item, ItemKind::Task);
    }

    #[test]
    fn corrupt_rows_are_reported() {
        let now = Utc::now();
        let err = record_from_row((
            Uuid::new_v4(),
            "01017012345".into(),
            "PENSION".into(),
            "CREATED".into(),
            "MESSAGE".into(),
            false,
            now,
            now,
        ))
        .unwrap_err();
        assert!(matches!(err, StateError::Corrupt(_)));
    }

    #[test]
    fn pool_timeout_maps_to_timeout() {
        assert!(matches!(
            backend_error(sqlx::Error::PoolTimedOut),
            StateError::Timeout
        ));
        assert!(backend_error(sqlx::Error::PoolClosed).is_retryable());
    }
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    fn test_config() -> PostgresConfig {
        PostgresConfig {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/draftsync_test".to_string()),
            table_prefix: format!("test_{}_", Uuid::new_v4().simple()),
            ..PostgresConfig::default()
        }
    }

    #[tokio::test]
    async fn store_conformance() {
        let store = PostgresDraftStore::new(test_config())
            .await
            .expect("pool creation should succeed");
        draftsync_state::testing::run_store_conformance_tests(&store)
            .await
            .expect("conformance tests should pass");
    }
}
