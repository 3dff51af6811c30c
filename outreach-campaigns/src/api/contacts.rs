//! Campaign contact endpoints

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use outreach_common::models::{Contact, NewContact, PipelineStage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{parse_campaign_id, require_campaign};
use crate::db::contacts as contact_db;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ListContactsQuery {
    pub stage: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListContactsResponse {
    pub contacts: Vec<Contact>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct AddContactsRequest {
    #[serde(default)]
    pub contacts: Vec<NewContact>,
}

#[derive(Debug, Serialize)]
pub struct AddContactsResponse {
    pub success: bool,
    pub added: usize,
    pub skipped_duplicates: usize,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateContactRequest {
    pub email: Option<String>,
    pub pipeline_stage: Option<PipelineStage>,
    pub current_step: Option<u32>,
}

/// GET /api/campaigns/:id/contacts?stage=
pub async fn list_contacts(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ListContactsQuery>,
) -> ApiResult<Json<ListContactsResponse>> {
    let id = parse_campaign_id(&id)?;
    require_campaign(&state.db, id).await?;

    let stage = query
        .stage
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<PipelineStage>)
        .transpose()?;

    let contacts = contact_db::list_contacts(&state.db, id, stage).await?;
    Ok(Json(ListContactsResponse {
        total: contacts.len(),
        contacts,
    }))
}

/// POST /api/campaigns/:id/contacts
///
/// Appends contacts; emails already in the campaign are skipped.
pub async fn add_contacts(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<AddContactsRequest>,
) -> ApiResult<Json<AddContactsResponse>> {
    let id = parse_campaign_id(&id)?;
    require_campaign(&state.db, id).await?;

    if payload.contacts.is_empty() {
        return Err(ApiError::BadRequest(
            "contacts must be a non-empty array".to_string(),
        ));
    }

    let outcome = contact_db::insert_contacts(&state.db, id, payload.contacts).await?;
    let total = contact_db::count_contacts(&state.db, id).await?;

    info!(
        campaign_id = %id,
        added = outcome.added,
        skipped = outcome.skipped_duplicates,
        total,
        "Contacts added"
    );

    Ok(Json(AddContactsResponse {
        success: true,
        added: outcome.added,
        skipped_duplicates: outcome.skipped_duplicates,
        total,
    }))
}

/// PATCH /api/campaigns/:id/contacts
///
/// Operator override of one contact's stage and/or step.
pub async fn update_contact(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateContactRequest>,
) -> ApiResult<Json<Value>> {
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Email is required".to_string()))?;

    let id = parse_campaign_id(&id)?;
    require_campaign(&state.db, id).await?;

    let updated = contact_db::update_contact(
        &state.db,
        id,
        email,
        payload.pipeline_stage,
        payload.current_step,
    )
    .await?;

    if !updated {
        return Err(ApiError::NotFound(format!("Contact {} not found in campaign", email)));
    }

    info!(
        campaign_id = %id,
        recipient = %email,
        stage = ?payload.pipeline_stage,
        step = ?payload.current_step,
        "Contact updated"
    );

    Ok(Json(json!({ "success": true })))
}

/// Build contact routes
pub fn contact_routes() -> Router<AppState> {
    Router::new().route(
        "/api/campaigns/:id/contacts",
        get(list_contacts).post(add_contacts).patch(update_contact),
    )
}
