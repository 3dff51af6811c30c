//! Campaign database operations

use chrono::{DateTime, Utc};
use outreach_common::models::{Campaign, CampaignStatus, SequenceStep};
use outreach_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{contacts, parse_timestamp};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

const CAMPAIGN_COLUMNS: &str =
    "id, name, description, status, sequence, emails_sent, created_at, updated_at";

/// Insert a new campaign row
pub async fn insert_campaign(pool: &SqlitePool, campaign: &Campaign) -> Result<()> {
    let sequence = serialize_sequence(&campaign.sequence)?;

    sqlx::query(
        r#"
        INSERT INTO campaigns (id, name, description, status, sequence, emails_sent, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(campaign.id.to_string())
    .bind(&campaign.name)
    .bind(&campaign.description)
    .bind(campaign.status.as_str())
    .bind(sequence)
    .bind(campaign.emails_sent)
    .bind(campaign.created_at.to_rfc3339())
    .bind(campaign.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a campaign by id
pub async fn load_campaign(pool: &SqlitePool, id: Uuid) -> Result<Option<Campaign>> {
    let row = sqlx::query(&format!("SELECT {} FROM campaigns WHERE id = ?", CAMPAIGN_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(campaign_from_row).transpose()
}

/// List campaigns, newest first
pub async fn list_campaigns(
    pool: &SqlitePool,
    status: Option<CampaignStatus>,
    limit: i64,
) -> Result<Vec<Campaign>> {
    let rows = match status {
        Some(status) => {
            sqlx::query(&format!(
                "SELECT {} FROM campaigns WHERE status = ? ORDER BY created_at DESC LIMIT ?",
                CAMPAIGN_COLUMNS
            ))
            .bind(status.as_str())
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT {} FROM campaigns ORDER BY created_at DESC LIMIT ?",
                CAMPAIGN_COLUMNS
            ))
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter().map(campaign_from_row).collect()
}

/// Operator edits; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct CampaignUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<CampaignStatus>,
    pub sequence: Option<Vec<SequenceStep>>,
}

/// Apply operator edits
///
/// Only the supplied columns are written, so a concurrent draft→active
/// promotion is never reverted. `emails_sent` is not touched; only
/// [`record_successful_send`] moves the counter. A sequence replacement only
/// applies while the stored status is still `draft`. Returns false when no
/// row matched.
pub async fn update_campaign(pool: &SqlitePool, id: Uuid, update: &CampaignUpdate) -> Result<bool> {
    let sequence = update
        .sequence
        .as_deref()
        .map(serialize_sequence)
        .transpose()?;

    let result = sqlx::query(
        r#"
        UPDATE campaigns
        SET name = COALESCE(?, name),
            description = COALESCE(?, description),
            status = COALESCE(?, status),
            sequence = COALESCE(?, sequence),
            updated_at = ?
        WHERE id = ? AND (? IS NULL OR status = 'draft')
        "#,
    )
    .bind(&update.name)
    .bind(&update.description)
    .bind(update.status.map(|s| s.as_str()))
    .bind(&sequence)
    .bind(Utc::now().to_rfc3339())
    .bind(id.to_string())
    .bind(&sequence)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Change only the status column (used for soft delete)
pub async fn set_status(pool: &SqlitePool, id: Uuid, status: CampaignStatus) -> Result<bool> {
    let result = sqlx::query("UPDATE campaigns SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Outcome of committing one confirmed send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendCommit {
    /// False when the contact row changed since it was read
    pub contact_advanced: bool,
}

/// Commit one confirmed-successful send atomically
///
/// In a single transaction:
/// - advance the contact to `contacted` at `step`, only if its version still
///   equals `expected_version`
/// - increment `emails_sent` and promote a `draft` campaign to `active`
///
/// The counter moves even when the contact update loses a version race:
/// the email was delivered either way.
pub async fn record_successful_send(
    pool: &SqlitePool,
    campaign_id: Uuid,
    email: &str,
    expected_version: i64,
    step: u32,
    sent_at: DateTime<Utc>,
) -> Result<SendCommit> {
    retry_on_lock("record_successful_send", DEFAULT_MAX_LOCK_WAIT_MS, move || async move {
        let mut tx = pool.begin().await?;

        let contact_advanced = contacts::advance_after_send(
            &mut tx,
            campaign_id,
            email,
            expected_version,
            step,
            sent_at,
        )
        .await?;

        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET emails_sent = emails_sent + 1,
                status = CASE WHEN status = 'draft' THEN 'active' ELSE status END,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(sent_at.to_rfc3339())
        .bind(campaign_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(Error::NotFound(format!("Campaign {} vanished during send", campaign_id)));
        }

        tx.commit().await?;

        Ok(SendCommit { contact_advanced })
    })
    .await
}

fn serialize_sequence(sequence: &[SequenceStep]) -> Result<String> {
    serde_json::to_string(sequence)
        .map_err(|e| Error::Internal(format!("Failed to serialize sequence: {}", e)))
}

fn campaign_from_row(row: &SqliteRow) -> Result<Campaign> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id)
        .map_err(|e| Error::Internal(format!("Invalid campaign id {}: {}", id, e)))?;

    let status: String = row.get("status");
    let sequence: String = row.get("sequence");
    let sequence: Vec<SequenceStep> = serde_json::from_str(&sequence)
        .map_err(|e| Error::Internal(format!("Failed to deserialize sequence: {}", e)))?;

    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Campaign {
        id,
        name: row.get("name"),
        description: row.get("description"),
        status: status.parse()?,
        sequence,
        emails_sent: row.get("emails_sent"),
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}
