//! Campaign contacts and the pipeline stage tracker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Position of a contact in the outreach funnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    New,
    Contacted,
    Replied,
    Claimed,
    Upgraded,
    Gold,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 6] = [
        PipelineStage::New,
        PipelineStage::Contacted,
        PipelineStage::Replied,
        PipelineStage::Claimed,
        PipelineStage::Upgraded,
        PipelineStage::Gold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::New => "new",
            PipelineStage::Contacted => "contacted",
            PipelineStage::Replied => "replied",
            PipelineStage::Claimed => "claimed",
            PipelineStage::Upgraded => "upgraded",
            PipelineStage::Gold => "gold",
        }
    }

    /// Stage a contact must be in to receive the given 1-based step
    ///
    /// Sequences are two-stage: step 1 goes to `new` contacts, every later
    /// step goes to `contacted` contacts. A contact that received step 1 is
    /// therefore eligible for step 3 as well as step 2.
    pub fn required_for_step(step_number: usize) -> PipelineStage {
        if step_number <= 1 {
            PipelineStage::New
        } else {
            PipelineStage::Contacted
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PipelineStage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown pipeline stage: {}", s)))
    }
}

/// A contact row owned by exactly one campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Unique within the campaign, not globally
    pub email: String,
    pub business_name: Option<String>,
    /// Directory listing reference used to build the public listing URL
    pub listing_id: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub industry: Option<String>,
    /// Free-form enrichment (google_rating, after_hours_screenshot_url, ...)
    pub metadata: serde_json::Value,
    pub pipeline_stage: PipelineStage,
    /// Last step number sent (0 = none)
    pub current_step: u32,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub added_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency counter, bumped on every mutation
    pub version: i64,
}

impl Contact {
    /// Business name as shown to recipients
    pub fn display_name(&self) -> &str {
        self.business_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("your business")
    }

    /// String value from the metadata blob, if present and non-empty
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Contact payload accepted when creating a campaign or adding contacts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewContact {
    pub email: String,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub listing_id: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub pipeline_stage: Option<PipelineStage>,
    #[serde(default)]
    pub current_step: Option<u32>,
}

impl NewContact {
    pub fn new(email: impl Into<String>, business_name: Option<&str>) -> Self {
        Self {
            email: email.into(),
            business_name: business_name.map(str::to_string),
            ..Default::default()
        }
    }

    /// Materialize into a stored contact (defaults to stage `new`, step 0)
    pub fn into_contact(self, added_at: DateTime<Utc>) -> Contact {
        Contact {
            email: self.email.trim().to_string(),
            business_name: self.business_name,
            listing_id: self.listing_id,
            phone: self.phone,
            city: self.city,
            industry: self.industry,
            metadata: self
                .metadata
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            pipeline_stage: self.pipeline_stage.unwrap_or(PipelineStage::New),
            current_step: self.current_step.unwrap_or(0),
            last_sent_at: None,
            added_at,
            updated_at: None,
            version: 0,
        }
    }
}

/// Count of contacts per pipeline stage (all six stages always present)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub new: usize,
    pub contacted: usize,
    pub replied: usize,
    pub claimed: usize,
    pub upgraded: usize,
    pub gold: usize,
}

impl PipelineSummary {
    pub fn from_contacts<'a>(contacts: impl IntoIterator<Item = &'a Contact>) -> Self {
        let mut summary = Self::default();
        for contact in contacts {
            summary.add(contact.pipeline_stage, 1);
        }
        summary
    }

    /// Add `count` contacts to the given stage's tally
    pub fn add(&mut self, stage: PipelineStage, count: usize) {
        let slot = match stage {
            PipelineStage::New => &mut self.new,
            PipelineStage::Contacted => &mut self.contacted,
            PipelineStage::Replied => &mut self.replied,
            PipelineStage::Claimed => &mut self.claimed,
            PipelineStage::Upgraded => &mut self.upgraded,
            PipelineStage::Gold => &mut self.gold,
        };
        *slot += count;
    }

    pub fn total(&self) -> usize {
        self.new + self.contacted + self.replied + self.claimed + self.upgraded + self.gold
    }
}
