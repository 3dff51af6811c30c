//! Campaign contact database operations
//!
//! Each contact is its own row keyed by `(campaign_id, email)`. Every
//! mutation bumps `version`, so writers holding a stale read can detect it
//! instead of silently overwriting a concurrent change.

use chrono::{DateTime, Utc};
use outreach_common::models::{Contact, NewContact, PipelineStage, PipelineSummary};
use outreach_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashSet;
use uuid::Uuid;

use super::{parse_optional_timestamp, parse_timestamp};

const CONTACT_COLUMNS: &str = "email, business_name, listing_id, phone, city, industry, metadata, \
     pipeline_stage, current_step, last_sent_at, added_at, updated_at, version";

/// Result of appending contacts to a campaign
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddContactsOutcome {
    pub added: usize,
    /// Already in the campaign, repeated within the batch, or blank
    pub skipped_duplicates: usize,
}

/// Append contacts in the given order, skipping emails the campaign already has
pub async fn insert_contacts(
    pool: &SqlitePool,
    campaign_id: Uuid,
    contacts: Vec<NewContact>,
) -> Result<AddContactsOutcome> {
    let mut tx = pool.begin().await?;
    let campaign_id_str = campaign_id.to_string();

    let max_position: Option<i64> =
        sqlx::query_scalar("SELECT MAX(position) FROM campaign_contacts WHERE campaign_id = ?")
            .bind(&campaign_id_str)
            .fetch_one(&mut *tx)
            .await?;
    let mut next_position = max_position.map(|p| p + 1).unwrap_or(0);

    let now = Utc::now();
    let mut seen = HashSet::new();
    let mut outcome = AddContactsOutcome::default();

    for new_contact in contacts {
        let contact = new_contact.into_contact(now);
        if contact.email.is_empty() || !seen.insert(contact.email.clone()) {
            outcome.skipped_duplicates += 1;
            continue;
        }

        let metadata = serde_json::to_string(&contact.metadata)
            .map_err(|e| Error::Internal(format!("Failed to serialize metadata: {}", e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO campaign_contacts (
                campaign_id, email, business_name, listing_id, phone, city, industry,
                metadata, pipeline_stage, current_step, added_at, position, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            ON CONFLICT(campaign_id, email) DO NOTHING
            "#,
        )
        .bind(&campaign_id_str)
        .bind(&contact.email)
        .bind(&contact.business_name)
        .bind(&contact.listing_id)
        .bind(&contact.phone)
        .bind(&contact.city)
        .bind(&contact.industry)
        .bind(metadata)
        .bind(contact.pipeline_stage.as_str())
        .bind(contact.current_step as i64)
        .bind(contact.added_at.to_rfc3339())
        .bind(next_position)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 1 {
            outcome.added += 1;
            next_position += 1;
        } else {
            outcome.skipped_duplicates += 1;
        }
    }

    tx.commit().await?;

    tracing::debug!(
        campaign_id = %campaign_id,
        added = outcome.added,
        skipped = outcome.skipped_duplicates,
        "Contacts appended"
    );

    Ok(outcome)
}

/// Contacts in insertion order, optionally restricted to one stage
pub async fn list_contacts(
    pool: &SqlitePool,
    campaign_id: Uuid,
    stage: Option<PipelineStage>,
) -> Result<Vec<Contact>> {
    let rows = match stage {
        Some(stage) => {
            sqlx::query(&format!(
                "SELECT {} FROM campaign_contacts WHERE campaign_id = ? AND pipeline_stage = ? ORDER BY position",
                CONTACT_COLUMNS
            ))
            .bind(campaign_id.to_string())
            .bind(stage.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT {} FROM campaign_contacts WHERE campaign_id = ? ORDER BY position",
                CONTACT_COLUMNS
            ))
            .bind(campaign_id.to_string())
            .fetch_all(pool)
            .await?
        }
    };

    rows.iter().map(contact_from_row).collect()
}

/// Number of contacts owned by a campaign
pub async fn count_contacts(pool: &SqlitePool, campaign_id: Uuid) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM campaign_contacts WHERE campaign_id = ?")
            .bind(campaign_id.to_string())
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Per-stage contact counts for a campaign
pub async fn stage_counts(pool: &SqlitePool, campaign_id: Uuid) -> Result<PipelineSummary> {
    let rows = sqlx::query(
        r#"
        SELECT pipeline_stage, COUNT(*) AS count
        FROM campaign_contacts
        WHERE campaign_id = ?
        GROUP BY pipeline_stage
        "#,
    )
    .bind(campaign_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut summary = PipelineSummary::default();
    for row in rows {
        let stage: String = row.get("pipeline_stage");
        let count: i64 = row.get("count");
        summary.add(stage.parse()?, count.max(0) as usize);
    }
    Ok(summary)
}

/// Operator edit of one contact's stage and/or step
///
/// Returns false when the campaign has no contact with that email.
pub async fn update_contact(
    pool: &SqlitePool,
    campaign_id: Uuid,
    email: &str,
    stage: Option<PipelineStage>,
    current_step: Option<u32>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE campaign_contacts
        SET pipeline_stage = COALESCE(?, pipeline_stage),
            current_step = COALESCE(?, current_step),
            updated_at = ?,
            version = version + 1
        WHERE campaign_id = ? AND email = ?
        "#,
    )
    .bind(stage.map(|s| s.as_str()))
    .bind(current_step.map(|s| s as i64))
    .bind(Utc::now().to_rfc3339())
    .bind(campaign_id.to_string())
    .bind(email)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Mark a contact as having received `step`, conditioned on its version
///
/// Runs on the caller's connection so it can share a transaction with the
/// campaign counter update. Returns false when the row was changed since
/// `expected_version` was read.
pub async fn advance_after_send(
    conn: &mut SqliteConnection,
    campaign_id: Uuid,
    email: &str,
    expected_version: i64,
    step: u32,
    sent_at: DateTime<Utc>,
) -> Result<bool> {
    let sent_at = sent_at.to_rfc3339();
    let result = sqlx::query(
        r#"
        UPDATE campaign_contacts
        SET pipeline_stage = 'contacted',
            current_step = ?,
            last_sent_at = ?,
            updated_at = ?,
            version = version + 1
        WHERE campaign_id = ? AND email = ? AND version = ?
        "#,
    )
    .bind(step as i64)
    .bind(&sent_at)
    .bind(&sent_at)
    .bind(campaign_id.to_string())
    .bind(email)
    .bind(expected_version)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

fn contact_from_row(row: &SqliteRow) -> Result<Contact> {
    let metadata: String = row.get("metadata");
    let metadata = serde_json::from_str(&metadata)
        .map_err(|e| Error::Internal(format!("Failed to deserialize metadata: {}", e)))?;

    let stage: String = row.get("pipeline_stage");
    let added_at: String = row.get("added_at");
    let current_step: i64 = row.get("current_step");

    Ok(Contact {
        email: row.get("email"),
        business_name: row.get("business_name"),
        listing_id: row.get("listing_id"),
        phone: row.get("phone"),
        city: row.get("city"),
        industry: row.get("industry"),
        metadata,
        pipeline_stage: stage.parse()?,
        current_step: current_step.max(0) as u32,
        last_sent_at: parse_optional_timestamp("last_sent_at", row.get("last_sent_at"))?,
        added_at: parse_timestamp("added_at", &added_at)?,
        updated_at: parse_optional_timestamp("updated_at", row.get("updated_at"))?,
        version: row.get("version"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::campaigns::insert_campaign;
    use outreach_common::models::Campaign;

    async fn setup() -> (SqlitePool, Uuid) {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        outreach_common::db::init_schema(&pool).await.unwrap();

        let campaign = Campaign::new("Test", "", Vec::new());
        insert_campaign(&pool, &campaign).await.unwrap();
        (pool, campaign.id)
    }

    #[tokio::test]
    async fn test_insert_skips_duplicates_and_keeps_order() {
        let (pool, campaign_id) = setup().await;

        let outcome = insert_contacts(
            &pool,
            campaign_id,
            vec![
                NewContact::new("b@x.test", Some("Bravo")),
                NewContact::new("a@x.test", Some("Alpha")),
                NewContact::new("b@x.test", Some("Bravo again")),
                NewContact::new("  ", None),
            ],
        )
        .await
        .unwrap();
        assert_eq!(outcome, AddContactsOutcome { added: 2, skipped_duplicates: 2 });

        let outcome = insert_contacts(
            &pool,
            campaign_id,
            vec![NewContact::new("a@x.test", None), NewContact::new("c@x.test", None)],
        )
        .await
        .unwrap();
        assert_eq!(outcome, AddContactsOutcome { added: 1, skipped_duplicates: 1 });

        let emails: Vec<String> = list_contacts(&pool, campaign_id, None)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.email)
            .collect();
        assert_eq!(emails, vec!["b@x.test", "a@x.test", "c@x.test"]);
        assert_eq!(count_contacts(&pool, campaign_id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_contact_bumps_version() {
        let (pool, campaign_id) = setup().await;
        insert_contacts(&pool, campaign_id, vec![NewContact::new("a@x.test", None)])
            .await
            .unwrap();

        assert!(update_contact(&pool, campaign_id, "a@x.test", Some(PipelineStage::Replied), None)
            .await
            .unwrap());
        assert!(!update_contact(&pool, campaign_id, "nobody@x.test", Some(PipelineStage::Gold), None)
            .await
            .unwrap());

        let summary = stage_counts(&pool, campaign_id).await.unwrap();
        assert_eq!(summary.replied, 1);
        assert_eq!(summary.new, 0);
        assert_eq!(summary.total(), 1);

        let replied = list_contacts(&pool, campaign_id, Some(PipelineStage::Replied))
            .await
            .unwrap();
        assert_eq!(replied.len(), 1);
        assert_eq!(replied[0].version, 1);
        assert_eq!(replied[0].current_step, 0);
        assert!(replied[0].updated_at.is_some());
    }
}
