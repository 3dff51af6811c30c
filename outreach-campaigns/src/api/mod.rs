//! HTTP API handlers for outreach-campaigns

pub mod campaigns;
pub mod contacts;
pub mod health;
pub mod send;

pub use campaigns::campaign_routes;
pub use contacts::contact_routes;
pub use health::health_routes;
pub use send::send_routes;

use crate::{ApiError, ApiResult};
use outreach_common::models::Campaign;
use sqlx::SqlitePool;
use uuid::Uuid;

pub(crate) const CAMPAIGN_NOT_FOUND: &str = "Campaign not found";

/// Malformed ids are reported the same way as unknown ones
pub(crate) fn parse_campaign_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(CAMPAIGN_NOT_FOUND.to_string()))
}

pub(crate) async fn require_campaign(db: &SqlitePool, id: Uuid) -> ApiResult<Campaign> {
    crate::db::campaigns::load_campaign(db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(CAMPAIGN_NOT_FOUND.to_string()))
}
