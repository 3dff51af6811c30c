//! Delivery log entries (append-only audit of send attempts)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Outcome of one send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(Error::InvalidInput(format!("Unknown delivery status: {}", other))),
        }
    }
}

/// Entry to append to the delivery log
#[derive(Debug, Clone)]
pub struct NewDeliveryLogEntry {
    pub campaign_id: Uuid,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
}

impl NewDeliveryLogEntry {
    /// `sent_at` is only meaningful for successful attempts
    pub fn sent_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.status {
            DeliveryStatus::Sent => Some(now),
            DeliveryStatus::Failed => None,
        }
    }
}

/// Stored delivery log entry; never mutated after creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
    pub id: i64,
    pub campaign_id: Uuid,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
