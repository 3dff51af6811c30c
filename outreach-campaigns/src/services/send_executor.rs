//! Campaign send executor
//!
//! Sends one sequence step to every eligible contact of a campaign,
//! sequentially and paced by the shared [`SendThrottle`].
//!
//! Eligibility is two-stage: step 1 targets `new` contacts, every later step
//! targets `contacted` contacts. After each confirmed send the contact, the
//! campaign counter and the draft→active promotion are committed together in
//! one transaction; the delivery log entry follows. Persistence problems past
//! the point of delivery never fail the batch: they are reported as
//! [`SendWarning`]s next to the per-recipient results.

use chrono::Utc;
use outreach_common::models::{
    Contact, DeliveryStatus, NewContact, NewDeliveryLogEntry, PipelineStage, SequenceStep,
};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use super::email_transport::{DeliveryReceipt, EmailTransport, OutboundEmail};
use super::template_renderer::TemplateRenderer;
use super::throttle::SendThrottle;
use crate::db::{campaigns, contacts, delivery_log};
use crate::error::SendError;

/// Business name used for test sends
pub const TEST_BUSINESS_NAME: &str = "Test Business";

/// Parameters of one send invocation
#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    /// 1-based sequence position; defaults to 1
    pub step_number: Option<usize>,
    /// Send only to this address, without touching campaign state
    pub test_email: Option<String>,
    /// Maximum contacts this invocation; 0 or absent means all
    pub limit: Option<usize>,
}

/// Per-recipient outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientResult {
    pub email: String,
    pub business: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What went wrong after an email was dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Delivery log row could not be written
    DeliveryLogWrite,
    /// Contact advance / campaign counter commit failed
    FinalizeWrite,
    /// Contact was modified concurrently; its stage was left as-is
    ConcurrentUpdate,
}

/// Non-fatal persistence problem observed during a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendWarning {
    pub kind: WarningKind,
    pub recipient: String,
    pub message: String,
}

/// Aggregate result of a batch send
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// True iff at least one email was delivered
    pub success: bool,
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
    pub step: u32,
    pub step_type: String,
    pub results: Vec<RecipientResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<SendWarning>,
}

/// Result of a test send
#[derive(Debug, Clone, Serialize)]
pub struct TestSendOutcome {
    pub success: bool,
    pub test: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub step: u32,
    pub recipient: String,
}

/// Either shape a send invocation can produce
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SendOutcome {
    Batch(BatchOutcome),
    Test(TestSendOutcome),
}

/// Executes campaign sends against a transport
pub struct SendExecutor {
    db: SqlitePool,
    transport: Arc<dyn EmailTransport>,
    renderer: Arc<TemplateRenderer>,
    throttle: SendThrottle,
}

impl SendExecutor {
    pub fn new(
        db: SqlitePool,
        transport: Arc<dyn EmailTransport>,
        renderer: Arc<TemplateRenderer>,
        throttle: SendThrottle,
    ) -> Self {
        Self {
            db,
            transport,
            renderer,
            throttle,
        }
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Send one step of a campaign
    pub async fn execute(&self, campaign_id: Uuid, request: SendRequest) -> Result<SendOutcome, SendError> {
        let campaign = campaigns::load_campaign(&self.db, campaign_id)
            .await?
            .ok_or(SendError::NotFound(campaign_id))?;

        let step_number = request.step_number.unwrap_or(1);
        let step = campaign
            .step_at(step_number)
            .cloned()
            .ok_or(SendError::InvalidStep(step_number))?;

        self.renderer
            .validate_step(&step)
            .map_err(|e| SendError::Template {
                step: step.step,
                message: e.to_string(),
            })?;

        if let Some(test_email) = request.test_email.as_deref().map(str::trim) {
            if test_email.is_empty() {
                return Err(SendError::BlankTestEmail);
            }
            return Ok(SendOutcome::Test(self.send_test(&step, test_email).await));
        }

        let stage = PipelineStage::required_for_step(step_number);
        let mut batch = contacts::list_contacts(&self.db, campaign_id, Some(stage)).await?;
        if let Some(limit) = request.limit.filter(|l| *l > 0) {
            batch.truncate(limit);
        }

        if batch.is_empty() {
            return Err(SendError::NoEligibleContacts { stage });
        }

        tracing::info!(
            campaign_id = %campaign_id,
            step = step.step,
            step_type = %step.step_type,
            stage = %stage,
            recipients = batch.len(),
            transport = self.transport.name(),
            "Starting campaign send"
        );

        let outcome = self.send_batch(campaign_id, &step, &batch).await;

        tracing::info!(
            campaign_id = %campaign_id,
            step = step.step,
            sent = outcome.sent,
            failed = outcome.failed,
            warnings = outcome.warnings.len(),
            "Campaign send finished"
        );

        Ok(SendOutcome::Batch(outcome))
    }

    async fn send_batch(&self, campaign_id: Uuid, step: &SequenceStep, batch: &[Contact]) -> BatchOutcome {
        let mut results = Vec::with_capacity(batch.len());
        let mut warnings = Vec::new();

        for contact in batch {
            self.throttle.wait().await;

            let receipt = self.dispatch(step, contact).await;

            if receipt.success {
                match campaigns::record_successful_send(
                    &self.db,
                    campaign_id,
                    &contact.email,
                    contact.version,
                    step.step,
                    Utc::now(),
                )
                .await
                {
                    Ok(commit) if !commit.contact_advanced => {
                        tracing::warn!(
                            campaign_id = %campaign_id,
                            recipient = %contact.email,
                            "Contact changed during send; stage left untouched"
                        );
                        warnings.push(SendWarning {
                            kind: WarningKind::ConcurrentUpdate,
                            recipient: contact.email.clone(),
                            message: "Contact was modified during the send; pipeline stage not advanced"
                                .to_string(),
                        });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(
                            campaign_id = %campaign_id,
                            recipient = %contact.email,
                            error = %e,
                            "Failed to record successful send"
                        );
                        warnings.push(SendWarning {
                            kind: WarningKind::FinalizeWrite,
                            recipient: contact.email.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }

            let entry = NewDeliveryLogEntry {
                campaign_id,
                recipient_email: contact.email.clone(),
                recipient_name: contact.business_name.clone(),
                status: if receipt.success {
                    DeliveryStatus::Sent
                } else {
                    DeliveryStatus::Failed
                },
                error_message: receipt.error.clone(),
            };
            if let Err(e) = delivery_log::append_entry(&self.db, &entry).await {
                tracing::error!(
                    campaign_id = %campaign_id,
                    recipient = %contact.email,
                    error = %e,
                    "Failed to write delivery log"
                );
                warnings.push(SendWarning {
                    kind: WarningKind::DeliveryLogWrite,
                    recipient: contact.email.clone(),
                    message: e.to_string(),
                });
            }

            results.push(RecipientResult {
                email: contact.email.clone(),
                business: contact.business_name.clone(),
                success: receipt.success,
                error: receipt.error,
            });
        }

        let sent = results.iter().filter(|r| r.success).count();
        BatchOutcome {
            success: sent > 0,
            sent,
            failed: results.len() - sent,
            total: batch.len(),
            step: step.step,
            step_type: step.step_type.to_string(),
            results,
            warnings,
        }
    }

    /// Test sends render against a synthetic contact and leave no trace
    async fn send_test(&self, step: &SequenceStep, test_email: &str) -> TestSendOutcome {
        self.throttle.wait().await;

        let contact = NewContact::new(test_email, Some(TEST_BUSINESS_NAME)).into_contact(Utc::now());
        let receipt = self.dispatch(step, &contact).await;

        tracing::info!(
            recipient = %test_email,
            step = step.step,
            success = receipt.success,
            "Test send"
        );

        TestSendOutcome {
            success: receipt.success,
            test: true,
            error: receipt.error,
            step: step.step,
            recipient: test_email.to_string(),
        }
    }

    async fn dispatch(&self, step: &SequenceStep, contact: &Contact) -> DeliveryReceipt {
        match self.renderer.render(step, contact) {
            Ok(rendered) => {
                let email = OutboundEmail {
                    to: contact.email.clone(),
                    subject: rendered.subject,
                    html: rendered.html,
                };
                self.transport.send(&email).await
            }
            Err(e) => {
                tracing::warn!(recipient = %contact.email, error = %e, "Failed to render email");
                DeliveryReceipt::failed(e.to_string())
            }
        }
    }
}
