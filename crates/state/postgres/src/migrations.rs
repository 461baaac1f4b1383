use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Create the drafts table and its indexes if they do not exist.
///
/// The partial unique index on `(subject_id, form_type) WHERE NOT done`
/// allows any number of closed records but only one open record per pair.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let drafts_table = config.drafts_table();
    let prefix = &config.table_prefix;

    let create_drafts = format!(
        "CREATE TABLE IF NOT EXISTS {drafts_table} (
            draft_id UUID PRIMARY KEY,
            subject_id TEXT NOT NULL,
            form_type TEXT NOT NULL,
            kind TEXT NOT NULL,
            item TEXT NOT NULL DEFAULT 'MESSAGE',
            done BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )"
    );

    let add_item = format!(
        "ALTER TABLE {drafts_table} ADD COLUMN IF NOT EXISTS item TEXT NOT NULL DEFAULT 'MESSAGE'"
    );

    let create_open_idx = format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {prefix}drafts_open_idx \
         ON {drafts_table} (subject_id, form_type) WHERE NOT done"
    );

    let create_subject_idx = format!(
        "CREATE INDEX IF NOT EXISTS {prefix}drafts_subject_idx \
         ON {drafts_table} (subject_id, form_type)"
    );

    sqlx::query(&create_drafts).execute(pool).await?;
    sqlx::query(&add_item).execute(pool).await?;
    sqlx::query(&create_open_idx).execute(pool).await?;
    sqlx::query(&create_subject_idx).execute(pool).await?;

    Ok(())
}
