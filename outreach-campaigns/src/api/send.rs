//! Campaign send endpoint
//!
//! `POST /api/campaigns/:id/send` with an optional body
//! `{ "step_number": 1, "test_email": "...", "limit": 10 }`.
//!
//! Only an absent (empty) body falls back to the defaults. Anything else
//! must be well-formed JSON sent as `application/json`, otherwise the
//! request is rejected before any email goes out.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use super::parse_campaign_id;
use crate::services::{SendOutcome, SendRequest};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendCampaignRequest {
    #[serde(default)]
    pub step_number: Option<usize>,
    #[serde(default)]
    pub test_email: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl From<SendCampaignRequest> for SendRequest {
    fn from(body: SendCampaignRequest) -> Self {
        Self {
            step_number: body.step_number,
            test_email: body.test_email,
            limit: body.limit,
        }
    }
}

impl SendCampaignRequest {
    /// Parse an optional JSON body; only an empty body yields the defaults
    pub fn from_body(headers: &HeaderMap, body: &[u8]) -> ApiResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let is_json = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
            .unwrap_or(false);
        if !is_json {
            return Err(ApiError::BadRequest(
                "Request body must be sent as application/json".to_string(),
            ));
        }

        serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))
    }
}

/// POST /api/campaigns/:id/send
///
/// **Responses:**
/// - 200 batch result `{ success, sent, failed, total, step, step_type, results, warnings? }`
/// - 200 test result `{ success, test: true, error?, step, recipient }`
/// - 400 malformed body, blank `test_email`, unknown step, bad subject
///   template, or nothing eligible (`sent: 0`)
/// - 404 unknown campaign
pub async fn send_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<SendOutcome>> {
    let id = parse_campaign_id(&id)?;
    let request = SendCampaignRequest::from_body(&headers, &body)?;

    let outcome = state.executor.execute(id, request.into()).await?;
    Ok(Json(outcome))
}

/// Build send routes
pub fn send_routes() -> Router<AppState> {
    Router::new().route("/api/campaigns/:id/send", post(send_campaign))
}
