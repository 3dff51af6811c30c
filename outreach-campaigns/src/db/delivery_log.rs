//! Delivery log database operations
//!
//! Append-only: rows are inserted once per send attempt and never updated.

use chrono::Utc;
use outreach_common::models::{DeliveryLogEntry, NewDeliveryLogEntry};
use outreach_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_optional_timestamp, parse_timestamp};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Append one entry, returning its row id
pub async fn append_entry(pool: &SqlitePool, entry: &NewDeliveryLogEntry) -> Result<i64> {
    let now = Utc::now();
    let campaign_id = entry.campaign_id.to_string();
    let sent_at = entry.sent_at(now).map(|dt| dt.to_rfc3339());
    let created_at = now.to_rfc3339();
    let (campaign_id, sent_at, created_at) = (&campaign_id, &sent_at, &created_at);

    retry_on_lock("append_delivery_log", DEFAULT_MAX_LOCK_WAIT_MS, move || async move {
        let result = sqlx::query(
            r#"
            INSERT INTO email_sends (
                campaign_id, recipient_email, recipient_name, status,
                error_message, sent_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(campaign_id)
        .bind(&entry.recipient_email)
        .bind(&entry.recipient_name)
        .bind(entry.status.as_str())
        .bind(&entry.error_message)
        .bind(sent_at)
        .bind(created_at)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    })
    .await
}

/// All entries for a campaign, newest first
pub async fn list_entries(pool: &SqlitePool, campaign_id: Uuid) -> Result<Vec<DeliveryLogEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, campaign_id, recipient_email, recipient_name, status,
               error_message, sent_at, created_at
        FROM email_sends
        WHERE campaign_id = ?
        ORDER BY id DESC
        "#,
    )
    .bind(campaign_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<DeliveryLogEntry> {
            let status: String = row.get("status");
            let created_at: String = row.get("created_at");
            let stored_campaign: String = row.get("campaign_id");

            Ok(DeliveryLogEntry {
                id: row.get("id"),
                campaign_id: Uuid::parse_str(&stored_campaign).map_err(|e| {
                    Error::Internal(format!("Invalid campaign id {}: {}", stored_campaign, e))
                })?,
                recipient_email: row.get("recipient_email"),
                recipient_name: row.get("recipient_name"),
                status: status.parse()?,
                error_message: row.get("error_message"),
                sent_at: parse_optional_timestamp("sent_at", row.get("sent_at"))?,
                created_at: parse_timestamp("created_at", &created_at)?,
            })
        })
        .collect()
}
