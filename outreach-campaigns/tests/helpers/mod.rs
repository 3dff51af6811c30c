//! Test helper utilities shared by the outreach-campaigns integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use outreach_campaigns::db::{campaigns, contacts};
use outreach_campaigns::services::{DeliveryReceipt, EmailTransport, OutboundEmail};
use outreach_campaigns::AppState;
use outreach_common::config::TomlConfig;
use outreach_common::models::{Campaign, NewContact, SequenceStep, StepType};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Transport that records every message and fails for scripted recipients
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutboundEmail>>,
    failing: HashSet<String>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_for(recipients: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            failing: recipients.iter().map(|r| r.to_string()).collect(),
        })
    }

    /// Every message handed to the transport, including failed ones
    pub fn attempts(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.attempts().into_iter().map(|e| e.to).collect()
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, email: &OutboundEmail) -> DeliveryReceipt {
        self.sent.lock().unwrap().push(email.clone());
        if self.failing.contains(&email.to) {
            DeliveryReceipt::failed("550 mailbox unavailable")
        } else {
            DeliveryReceipt::delivered()
        }
    }
}

/// Single-connection in-memory database with the schema applied
pub async fn test_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    outreach_common::db::init_schema(&pool)
        .await
        .expect("Failed to initialize schema");
    pool
}

/// Defaults with pacing disabled so tests run fast
pub fn test_config() -> TomlConfig {
    TomlConfig {
        send_delay_ms: 0,
        site_url: "https://greenline365.com".to_string(),
        reply_to: "hello@greenline365.test".to_string(),
        demo_phone_number: Some("(813) 555-0100".to_string()),
        ..TomlConfig::default()
    }
}

pub fn test_state(pool: SqlitePool, transport: Arc<dyn EmailTransport>) -> AppState {
    AppState::from_config(pool, &test_config(), transport).expect("Failed to build app state")
}

pub fn three_step_sequence() -> Vec<SequenceStep> {
    vec![
        SequenceStep {
            step: 1,
            step_type: StepType::InitialOutreach,
            subject: Some("{{business_name}} is live on GreenLine365".to_string()),
        },
        SequenceStep {
            step: 2,
            step_type: StepType::ValueBomb,
            subject: Some("We audited {{business_name}}".to_string()),
        },
        SequenceStep {
            step: 3,
            step_type: StepType::DemoInvite,
            subject: None,
        },
    ]
}

/// Insert a draft campaign with the given contacts (all at stage `new`)
pub async fn seed_campaign(pool: &SqlitePool, emails: &[&str]) -> Uuid {
    let campaign = Campaign::new("Tampa plumbers", "Spring push", three_step_sequence());
    campaigns::insert_campaign(pool, &campaign)
        .await
        .expect("Failed to insert campaign");

    let new_contacts = emails
        .iter()
        .enumerate()
        .map(|(i, email)| NewContact::new(*email, Some(format!("Business {}", i + 1).as_str())))
        .collect();
    contacts::insert_contacts(pool, campaign.id, new_contacts)
        .await
        .expect("Failed to insert contacts");

    campaign.id
}
