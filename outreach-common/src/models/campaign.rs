//! Campaign and sequence step types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Campaign lifecycle status
///
/// Campaigns are never hard-deleted; `Cancelled` is the soft-delete state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "active" => Ok(CampaignStatus::Active),
            "paused" => Ok(CampaignStatus::Paused),
            "completed" => Ok(CampaignStatus::Completed),
            "cancelled" => Ok(CampaignStatus::Cancelled),
            other => Err(Error::InvalidInput(format!(
                "Unknown campaign status: {}",
                other
            ))),
        }
    }
}

/// Body variant selector for a sequence step
///
/// Unknown type names are kept verbatim and render with the generic
/// follow-up skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepType {
    InitialOutreach,
    ValueBomb,
    DemoInvite,
    FollowUp(String),
}

impl StepType {
    pub fn as_str(&self) -> &str {
        match self {
            StepType::InitialOutreach => "initial_outreach",
            StepType::ValueBomb => "value_bomb",
            StepType::DemoInvite => "demo_invite",
            StepType::FollowUp(name) => name,
        }
    }
}

impl From<String> for StepType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "initial_outreach" => StepType::InitialOutreach,
            "value_bomb" => StepType::ValueBomb,
            "demo_invite" => StepType::DemoInvite,
            _ => StepType::FollowUp(s),
        }
    }
}

impl From<StepType> for String {
    fn from(t: StepType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One templated email at a fixed position in a campaign's sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceStep {
    /// Step identifier reported back to operators (usually 1-based)
    pub step: u32,
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Subject template; `{{business_name}}` is substituted per contact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// Campaign record
///
/// Contacts live in their own table and are loaded separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub status: CampaignStatus,
    pub sequence: Vec<SequenceStep>,
    /// Incremented only after a confirmed-successful send
    pub emails_sent: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new(name: impl Into<String>, description: impl Into<String>, sequence: Vec<SequenceStep>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            status: CampaignStatus::Draft,
            sequence,
            emails_sent: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Look up a step by its 1-based position in the sequence
    pub fn step_at(&self, step_number: usize) -> Option<&SequenceStep> {
        step_number
            .checked_sub(1)
            .and_then(|idx| self.sequence.get(idx))
    }

    /// The sequence may only be replaced while the campaign is a draft
    pub fn sequence_is_mutable(&self) -> bool {
        self.status == CampaignStatus::Draft
    }
}
