//! Campaign management endpoints
//!
//! - `GET    /api/campaigns`             list with pipeline summaries
//! - `POST   /api/campaigns`             create (optionally with contacts)
//! - `GET    /api/campaigns/:id`         detail with contacts and delivery log
//! - `PATCH  /api/campaigns/:id`         operator edits
//! - `DELETE /api/campaigns/:id`         soft delete (status `cancelled`)
//! - `GET    /api/campaigns/:id/sends`   delivery log

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use outreach_common::models::{
    Campaign, CampaignStatus, Contact, DeliveryLogEntry, NewContact, PipelineSummary, SequenceStep,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{parse_campaign_id, require_campaign, CAMPAIGN_NOT_FOUND};
use crate::db::campaigns::{self as campaign_db, CampaignUpdate};
use crate::db::{contacts as contact_db, delivery_log};
use crate::{ApiError, ApiResult, AppState};

const DEFAULT_LIST_LIMIT: i64 = 50;

/// Campaign as returned by the API
#[derive(Debug, Serialize)]
pub struct CampaignView {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub pipeline_summary: PipelineSummary,
    pub total_contacts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<Contact>>,
}

#[derive(Debug, Deserialize)]
pub struct ListCampaignsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListCampaignsResponse {
    pub campaigns: Vec<CampaignView>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<CampaignStatus>,
    #[serde(default)]
    pub sequence: Vec<SequenceStep>,
    #[serde(default)]
    pub contacts: Vec<NewContact>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<CampaignStatus>,
    pub sequence: Option<Vec<SequenceStep>>,
}

#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub campaign: CampaignView,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct CampaignDetailResponse {
    pub campaign: CampaignView,
    pub sends: Vec<DeliveryLogEntry>,
}

#[derive(Debug, Serialize)]
pub struct SendsResponse {
    pub sends: Vec<DeliveryLogEntry>,
    pub total: usize,
}

async fn summary_view(state: &AppState, campaign: Campaign) -> ApiResult<CampaignView> {
    let pipeline_summary = contact_db::stage_counts(&state.db, campaign.id).await?;
    Ok(CampaignView {
        total_contacts: pipeline_summary.total(),
        pipeline_summary,
        campaign,
        contacts: None,
    })
}

async fn full_view(state: &AppState, campaign: Campaign) -> ApiResult<CampaignView> {
    let contacts = contact_db::list_contacts(&state.db, campaign.id, None).await?;
    Ok(CampaignView {
        pipeline_summary: PipelineSummary::from_contacts(&contacts),
        total_contacts: contacts.len(),
        campaign,
        contacts: Some(contacts),
    })
}

/// GET /api/campaigns?status=&limit=
pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(query): Query<ListCampaignsQuery>,
) -> ApiResult<Json<ListCampaignsResponse>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<CampaignStatus>)
        .transpose()?;
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_LIST_LIMIT);

    let mut campaigns = Vec::new();
    for campaign in campaign_db::list_campaigns(&state.db, status, limit).await? {
        campaigns.push(summary_view(&state, campaign).await?);
    }

    Ok(Json(ListCampaignsResponse { campaigns }))
}

/// POST /api/campaigns
pub async fn create_campaign(
    State(state): State<AppState>,
    Json(payload): Json<CreateCampaignRequest>,
) -> ApiResult<Json<CampaignResponse>> {
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Campaign name is required".to_string()))?;

    let mut campaign = Campaign::new(
        name,
        payload.description.unwrap_or_default(),
        payload.sequence,
    );
    if let Some(status) = payload.status {
        campaign.status = status;
    }

    campaign_db::insert_campaign(&state.db, &campaign).await?;
    let outcome = contact_db::insert_contacts(&state.db, campaign.id, payload.contacts).await?;

    info!(
        campaign_id = %campaign.id,
        name = %campaign.name,
        steps = campaign.sequence.len(),
        contacts = outcome.added,
        "Campaign created"
    );

    Ok(Json(CampaignResponse {
        campaign: full_view(&state, campaign).await?,
        success: true,
    }))
}

/// GET /api/campaigns/:id
pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CampaignDetailResponse>> {
    let id = parse_campaign_id(&id)?;
    let campaign = require_campaign(&state.db, id).await?;
    let sends = delivery_log::list_entries(&state.db, id).await?;

    Ok(Json(CampaignDetailResponse {
        campaign: full_view(&state, campaign).await?,
        sends,
    }))
}

/// PATCH /api/campaigns/:id
///
/// The sequence can only be replaced while the campaign is a draft (409).
pub async fn update_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCampaignRequest>,
) -> ApiResult<Json<CampaignResponse>> {
    let id = parse_campaign_id(&id)?;
    let current = require_campaign(&state.db, id).await?;

    if let Some(name) = &payload.name {
        if name.trim().is_empty() {
            return Err(ApiError::BadRequest("Campaign name cannot be empty".to_string()));
        }
    }

    let sequence_conflict = || {
        ApiError::Conflict(format!(
            "Sequence cannot be changed once a campaign is {}",
            current.status
        ))
    };
    if payload.sequence.is_some() && !current.sequence_is_mutable() {
        return Err(sequence_conflict());
    }

    let replaces_sequence = payload.sequence.is_some();
    let update = CampaignUpdate {
        name: payload.name.map(|n| n.trim().to_string()),
        description: payload.description,
        status: payload.status,
        sequence: payload.sequence,
    };

    if !campaign_db::update_campaign(&state.db, id, &update).await? {
        // Lost a race with the first send of the campaign
        return Err(if replaces_sequence {
            sequence_conflict()
        } else {
            ApiError::NotFound(CAMPAIGN_NOT_FOUND.to_string())
        });
    }

    info!(campaign_id = %id, "Campaign updated");

    let campaign = require_campaign(&state.db, id).await?;
    Ok(Json(CampaignResponse {
        campaign: full_view(&state, campaign).await?,
        success: true,
    }))
}

/// DELETE /api/campaigns/:id
///
/// Campaigns are never removed; they move to `cancelled`.
pub async fn delete_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_campaign_id(&id)?;

    if !campaign_db::set_status(&state.db, id, CampaignStatus::Cancelled).await? {
        return Err(ApiError::NotFound(CAMPAIGN_NOT_FOUND.to_string()));
    }

    info!(campaign_id = %id, "Campaign cancelled");
    Ok(Json(json!({ "success": true })))
}

/// GET /api/campaigns/:id/sends
pub async fn list_sends(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SendsResponse>> {
    let id = parse_campaign_id(&id)?;
    require_campaign(&state.db, id).await?;

    let sends = delivery_log::list_entries(&state.db, id).await?;
    Ok(Json(SendsResponse {
        total: sends.len(),
        sends,
    }))
}

/// Build campaign routes
pub fn campaign_routes() -> Router<AppState> {
    Router::new()
        .route("/api/campaigns", get(list_campaigns).post(create_campaign))
        .route(
            "/api/campaigns/:id",
            get(get_campaign)
                .patch(update_campaign)
                .delete(delete_campaign),
        )
        .route("/api/campaigns/:id/sends", get(list_sends))
}
