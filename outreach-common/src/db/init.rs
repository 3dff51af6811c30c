//! Database initialization
//!
//! Creates the database file on first run and applies the schema
//! idempotently on every start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// How long a connection waits on a locked database before failing
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the database at `db_path` and ensure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Per-connection settings, applied to every pooled connection.
    // WAL lets the send loop append log rows while readers list campaigns.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes if they don't exist
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_campaigns_table(pool).await?;
    create_campaign_contacts_table(pool).await?;
    create_email_sends_table(pool).await?;

    info!("Database schema initialized (campaigns, campaign_contacts, email_sends)");
    Ok(())
}

async fn create_campaigns_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS campaigns (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'draft',
            sequence TEXT NOT NULL DEFAULT '[]',
            emails_sent INTEGER NOT NULL DEFAULT 0 CHECK (emails_sent >= 0),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_campaigns_status ON campaigns(status)")
        .execute(pool)
        .await?;

    Ok(())
}

/// One row per contact, keyed by (campaign_id, email)
///
/// `position` keeps insertion order; `version` backs conditional updates.
async fn create_campaign_contacts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS campaign_contacts (
            campaign_id TEXT NOT NULL REFERENCES campaigns(id),
            email TEXT NOT NULL,
            business_name TEXT,
            listing_id TEXT,
            phone TEXT,
            city TEXT,
            industry TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            pipeline_stage TEXT NOT NULL DEFAULT 'new',
            current_step INTEGER NOT NULL DEFAULT 0,
            last_sent_at TEXT,
            added_at TEXT NOT NULL,
            updated_at TEXT,
            position INTEGER NOT NULL,
            version INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (campaign_id, email)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_campaign_contacts_stage ON campaign_contacts(campaign_id, pipeline_stage, position)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Append-only delivery log
async fn create_email_sends_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS email_sends (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id TEXT NOT NULL,
            recipient_email TEXT NOT NULL,
            recipient_name TEXT,
            status TEXT NOT NULL CHECK (status IN ('sent', 'failed')),
            error_message TEXT,
            sent_at TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_email_sends_campaign ON email_sends(campaign_id, id)")
        .execute(pool)
        .await?;

    Ok(())
}
