//! Send executor behavior against an in-memory database and a recording transport

mod helpers;

use async_trait::async_trait;
use helpers::{seed_campaign, test_pool, test_state, RecordingTransport};
use outreach_campaigns::db::{campaigns, contacts, delivery_log};
use outreach_campaigns::services::{
    BatchOutcome, DeliveryReceipt, EmailTransport, OutboundEmail, SendOutcome, SendRequest,
    TestSendOutcome, WarningKind,
};
use outreach_campaigns::SendError;
use outreach_common::models::{CampaignStatus, DeliveryStatus, PipelineStage};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

const A: &str = "a@acme.test";
const B: &str = "b@bravo.test";
const C: &str = "c@charlie.test";

fn step(n: usize) -> SendRequest {
    SendRequest {
        step_number: Some(n),
        ..SendRequest::default()
    }
}

fn expect_batch(outcome: SendOutcome) -> BatchOutcome {
    match outcome {
        SendOutcome::Batch(batch) => batch,
        SendOutcome::Test(test) => panic!("expected batch outcome, got test outcome {:?}", test),
    }
}

fn expect_test(outcome: SendOutcome) -> TestSendOutcome {
    match outcome {
        SendOutcome::Test(test) => test,
        SendOutcome::Batch(batch) => panic!("expected test outcome, got batch {:?}", batch),
    }
}

async fn stage_of(pool: &SqlitePool, campaign_id: Uuid, email: &str) -> (PipelineStage, u32) {
    let contact = contacts::list_contacts(pool, campaign_id, None)
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.email == email)
        .unwrap();
    (contact.pipeline_stage, contact.current_step)
}

async fn emails_sent(pool: &SqlitePool, campaign_id: Uuid) -> i64 {
    campaigns::load_campaign(pool, campaign_id)
        .await
        .unwrap()
        .unwrap()
        .emails_sent
}

#[tokio::test]
async fn test_all_contacts_succeed() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A, B, C]).await;
    let transport = RecordingTransport::new();
    let state = test_state(pool.clone(), transport.clone());

    let batch = expect_batch(state.executor.execute(campaign_id, step(1)).await.unwrap());

    assert!(batch.success);
    assert_eq!((batch.sent, batch.failed, batch.total), (3, 0, 3));
    assert_eq!(batch.step, 1);
    assert_eq!(batch.step_type, "initial_outreach");
    assert!(batch.warnings.is_empty());
    assert_eq!(transport.recipients(), vec![A, B, C]);
    assert_eq!(transport.attempts()[0].subject, "Business 1 is live on GreenLine365");

    for email in [A, B, C] {
        assert_eq!(stage_of(&pool, campaign_id, email).await, (PipelineStage::Contacted, 1));
    }

    let log = delivery_log::list_entries(&pool, campaign_id).await.unwrap();
    assert_eq!(log.len(), 3);
    assert!(log.iter().all(|e| e.status == DeliveryStatus::Sent && e.sent_at.is_some()));

    let campaign = campaigns::load_campaign(&pool, campaign_id).await.unwrap().unwrap();
    assert_eq!(campaign.emails_sent, 3);
    assert_eq!(campaign.status, CampaignStatus::Active);
}

#[tokio::test]
async fn test_one_failure_is_isolated() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A, B, C]).await;
    let state = test_state(pool.clone(), RecordingTransport::failing_for(&[B]));

    let batch = expect_batch(state.executor.execute(campaign_id, step(1)).await.unwrap());

    assert!(batch.success);
    assert_eq!((batch.sent, batch.failed, batch.total), (2, 1, 3));
    let failed = &batch.results[1];
    assert_eq!(failed.email, B);
    assert!(!failed.success);
    assert_eq!(failed.error.as_deref(), Some("550 mailbox unavailable"));

    assert_eq!(stage_of(&pool, campaign_id, A).await, (PipelineStage::Contacted, 1));
    assert_eq!(stage_of(&pool, campaign_id, B).await, (PipelineStage::New, 0));
    assert_eq!(stage_of(&pool, campaign_id, C).await, (PipelineStage::Contacted, 1));

    let log = delivery_log::list_entries(&pool, campaign_id).await.unwrap();
    assert_eq!(log.len(), 3);
    let failed_entries: Vec<_> = log
        .iter()
        .filter(|e| e.status == DeliveryStatus::Failed)
        .collect();
    assert_eq!(failed_entries.len(), 1);
    assert_eq!(failed_entries[0].recipient_email, B);
    assert!(failed_entries[0].sent_at.is_none());
    assert_eq!(
        failed_entries[0].error_message.as_deref(),
        Some("550 mailbox unavailable")
    );

    assert_eq!(emails_sent(&pool, campaign_id).await, 2);
}

#[tokio::test]
async fn test_all_failures_report_unsuccessful_and_keep_draft() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A, B]).await;
    let state = test_state(pool.clone(), RecordingTransport::failing_for(&[A, B]));

    let batch = expect_batch(state.executor.execute(campaign_id, step(1)).await.unwrap());

    assert!(!batch.success);
    assert_eq!((batch.sent, batch.failed), (0, 2));

    let campaign = campaigns::load_campaign(&pool, campaign_id).await.unwrap().unwrap();
    assert_eq!(campaign.emails_sent, 0);
    assert_eq!(campaign.status, CampaignStatus::Draft);
    assert_eq!(delivery_log::list_entries(&pool, campaign_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_limit_processes_only_first_contacts() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A, B, C]).await;
    let transport = RecordingTransport::new();
    let state = test_state(pool.clone(), transport.clone());

    let request = SendRequest {
        limit: Some(1),
        ..step(1)
    };
    let batch = expect_batch(state.executor.execute(campaign_id, request).await.unwrap());

    assert_eq!((batch.sent, batch.total), (1, 1));
    assert_eq!(transport.recipients(), vec![A]);
    assert_eq!(stage_of(&pool, campaign_id, B).await, (PipelineStage::New, 0));
    assert_eq!(stage_of(&pool, campaign_id, C).await, (PipelineStage::New, 0));

    let log = delivery_log::list_entries(&pool, campaign_id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].recipient_email, A);
}

#[tokio::test]
async fn test_zero_limit_means_no_limit() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A, B, C]).await;
    let state = test_state(pool.clone(), RecordingTransport::new());

    let request = SendRequest {
        limit: Some(0),
        ..step(1)
    };
    let batch = expect_batch(state.executor.execute(campaign_id, request).await.unwrap());
    assert_eq!(batch.total, 3);
}

#[tokio::test]
async fn test_step_number_defaults_to_one() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A]).await;
    let state = test_state(pool.clone(), RecordingTransport::new());

    let batch = expect_batch(
        state
            .executor
            .execute(campaign_id, SendRequest::default())
            .await
            .unwrap(),
    );
    assert_eq!(batch.step, 1);
}

#[tokio::test]
async fn test_test_email_never_mutates_campaign() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A, B]).await;
    let transport = RecordingTransport::new();
    let state = test_state(pool.clone(), transport.clone());

    let request = SendRequest {
        test_email: Some("qa@greenline365.test".to_string()),
        ..step(2)
    };
    let test = expect_test(state.executor.execute(campaign_id, request).await.unwrap());

    assert!(test.success);
    assert!(test.test);
    assert_eq!(test.step, 2);
    assert_eq!(test.recipient, "qa@greenline365.test");

    let attempts = transport.attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].to, "qa@greenline365.test");
    assert_eq!(attempts[0].subject, "We audited Test Business");
    assert!(attempts[0].html.contains("Test Business"));

    assert_eq!(stage_of(&pool, campaign_id, A).await, (PipelineStage::New, 0));
    assert_eq!(stage_of(&pool, campaign_id, B).await, (PipelineStage::New, 0));
    let campaign = campaigns::load_campaign(&pool, campaign_id).await.unwrap().unwrap();
    assert_eq!(campaign.emails_sent, 0);
    assert_eq!(campaign.status, CampaignStatus::Draft);
    assert!(delivery_log::list_entries(&pool, campaign_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_test_email_reports_error_without_mutation() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A]).await;
    let state = test_state(pool.clone(), RecordingTransport::failing_for(&["qa@greenline365.test"]));

    let request = SendRequest {
        test_email: Some("qa@greenline365.test".to_string()),
        ..step(1)
    };
    let test = expect_test(state.executor.execute(campaign_id, request).await.unwrap());

    assert!(!test.success);
    assert_eq!(test.error.as_deref(), Some("550 mailbox unavailable"));
    assert_eq!(emails_sent(&pool, campaign_id).await, 0);
    assert!(delivery_log::list_entries(&pool, campaign_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_step_one_targets_only_new_contacts() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A, B, C]).await;
    contacts::update_contact(&pool, campaign_id, B, Some(PipelineStage::Replied), None)
        .await
        .unwrap();
    let transport = RecordingTransport::new();
    let state = test_state(pool.clone(), transport.clone());

    let batch = expect_batch(state.executor.execute(campaign_id, step(1)).await.unwrap());

    assert_eq!(batch.total, 2);
    assert_eq!(transport.recipients(), vec![A, C]);

    let replied = contacts::list_contacts(&pool, campaign_id, Some(PipelineStage::Replied))
        .await
        .unwrap();
    assert_eq!(replied.len(), 1);
    assert_eq!(replied[0].email, B);
    assert_eq!(replied[0].version, 1);
    assert!(replied[0].last_sent_at.is_none());
}

#[tokio::test]
async fn test_later_steps_target_contacted_regardless_of_progress() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A, B]).await;
    let transport = RecordingTransport::new();
    let state = test_state(pool.clone(), transport.clone());

    // Nobody has been contacted yet
    let err = state.executor.execute(campaign_id, step(2)).await.unwrap_err();
    assert!(matches!(
        err,
        SendError::NoEligibleContacts {
            stage: PipelineStage::Contacted
        }
    ));

    state.executor.execute(campaign_id, step(1)).await.unwrap();

    // Step 3 reaches contacts that only ever received step 1
    let batch = expect_batch(state.executor.execute(campaign_id, step(3)).await.unwrap());
    assert_eq!(batch.sent, 2);
    assert_eq!(batch.step_type, "demo_invite");
    assert_eq!(stage_of(&pool, campaign_id, A).await, (PipelineStage::Contacted, 3));

    // And they stay eligible for every later step
    let batch = expect_batch(state.executor.execute(campaign_id, step(2)).await.unwrap());
    assert_eq!(batch.sent, 2);
    assert_eq!(emails_sent(&pool, campaign_id).await, 6);
}

#[tokio::test]
async fn test_repeating_step_one_finds_no_one() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A, B, C]).await;
    let transport = RecordingTransport::new();
    let state = test_state(pool.clone(), transport.clone());

    state.executor.execute(campaign_id, step(1)).await.unwrap();
    let err = state.executor.execute(campaign_id, step(1)).await.unwrap_err();

    assert!(matches!(
        err,
        SendError::NoEligibleContacts {
            stage: PipelineStage::New
        }
    ));
    assert_eq!(err.to_string(), "No contacts at stage \"new\" to send to");
    assert_eq!(transport.attempts().len(), 3);
    assert_eq!(delivery_log::list_entries(&pool, campaign_id).await.unwrap().len(), 3);
    assert_eq!(emails_sent(&pool, campaign_id).await, 3);
}

#[tokio::test]
async fn test_structural_errors_send_nothing() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A]).await;
    let transport = RecordingTransport::new();
    let state = test_state(pool.clone(), transport.clone());

    let err = state.executor.execute(Uuid::new_v4(), step(1)).await.unwrap_err();
    assert!(matches!(err, SendError::NotFound(_)));
    assert_eq!(err.to_string(), "Campaign not found");

    let err = state.executor.execute(campaign_id, step(4)).await.unwrap_err();
    assert!(matches!(err, SendError::InvalidStep(4)));
    assert_eq!(err.to_string(), "Step 4 not found in sequence");

    let err = state.executor.execute(campaign_id, step(0)).await.unwrap_err();
    assert!(matches!(err, SendError::InvalidStep(0)));

    assert!(transport.attempts().is_empty());
    assert!(delivery_log::list_entries(&pool, campaign_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_subject_template_aborts_before_sending() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A]).await;
    sqlx::query("UPDATE campaigns SET sequence = ? WHERE id = ?")
        .bind(r#"[{"step":1,"type":"initial_outreach","subject":"{{#if business_name}}Hi"}]"#)
        .bind(campaign_id.to_string())
        .execute(&pool)
        .await
        .unwrap();
    let transport = RecordingTransport::new();
    let state = test_state(pool.clone(), transport.clone());

    let err = state.executor.execute(campaign_id, step(1)).await.unwrap_err();

    assert!(matches!(err, SendError::Template { step: 1, .. }));
    assert!(transport.attempts().is_empty());
    assert_eq!(stage_of(&pool, campaign_id, A).await, (PipelineStage::New, 0));
}

#[tokio::test]
async fn test_blank_test_email_is_rejected() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A, B]).await;
    let transport = RecordingTransport::new();
    let state = test_state(pool.clone(), transport.clone());

    let request = SendRequest {
        test_email: Some("  ".to_string()),
        ..SendRequest::default()
    };
    let err = state.executor.execute(campaign_id, request).await.unwrap_err();

    assert!(matches!(err, SendError::BlankTestEmail));
    assert!(transport.attempts().is_empty());
    assert_eq!(stage_of(&pool, campaign_id, A).await, (PipelineStage::New, 0));
}

#[tokio::test]
async fn test_unknown_subject_placeholder_aborts_before_sending() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A, B]).await;
    sqlx::query("UPDATE campaigns SET sequence = ? WHERE id = ?")
        .bind(r#"[{"step":1,"type":"initial_outreach","subject":"Hi {{name}}"}]"#)
        .bind(campaign_id.to_string())
        .execute(&pool)
        .await
        .unwrap();
    let transport = RecordingTransport::new();
    let state = test_state(pool.clone(), transport.clone());

    let err = state.executor.execute(campaign_id, step(1)).await.unwrap_err();

    assert!(matches!(err, SendError::Template { step: 1, .. }));
    assert!(transport.attempts().is_empty());
    assert_eq!(stage_of(&pool, campaign_id, A).await, (PipelineStage::New, 0));
}

/// Transport that edits the contact while its email is in flight
struct MeddlingTransport {
    pool: SqlitePool,
    campaign_id: Uuid,
}

#[async_trait]
impl EmailTransport for MeddlingTransport {
    fn name(&self) -> &'static str {
        "meddling"
    }

    async fn send(&self, email: &OutboundEmail) -> DeliveryReceipt {
        contacts::update_contact(
            &self.pool,
            self.campaign_id,
            &email.to,
            Some(PipelineStage::Replied),
            None,
        )
        .await
        .unwrap();
        DeliveryReceipt::delivered()
    }
}

#[tokio::test]
async fn test_concurrent_contact_edit_is_not_overwritten() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A]).await;
    let transport = Arc::new(MeddlingTransport {
        pool: pool.clone(),
        campaign_id,
    });
    let state = test_state(pool.clone(), transport);

    let batch = expect_batch(state.executor.execute(campaign_id, step(1)).await.unwrap());

    assert_eq!(batch.sent, 1);
    assert_eq!(batch.warnings.len(), 1);
    assert_eq!(batch.warnings[0].kind, WarningKind::ConcurrentUpdate);
    assert_eq!(batch.warnings[0].recipient, A);

    // The operator's edit wins, the delivered email still counts
    assert_eq!(stage_of(&pool, campaign_id, A).await, (PipelineStage::Replied, 0));
    assert_eq!(emails_sent(&pool, campaign_id).await, 1);
}

#[tokio::test]
async fn test_delivery_log_failure_becomes_warning() {
    let pool = test_pool().await;
    let campaign_id = seed_campaign(&pool, &[A, B]).await;
    sqlx::query("DROP TABLE email_sends").execute(&pool).await.unwrap();
    let state = test_state(pool.clone(), RecordingTransport::new());

    let batch = expect_batch(state.executor.execute(campaign_id, step(1)).await.unwrap());

    assert_eq!(batch.sent, 2);
    assert_eq!(batch.warnings.len(), 2);
    assert!(batch
        .warnings
        .iter()
        .all(|w| w.kind == WarningKind::DeliveryLogWrite));
    assert_eq!(stage_of(&pool, campaign_id, A).await, (PipelineStage::Contacted, 1));
    assert_eq!(emails_sent(&pool, campaign_id).await, 2);
}
