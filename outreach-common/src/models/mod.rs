//! Outreach domain models
//!
//! Campaigns own an ordered sequence of email steps and a list of contacts.
//! Each contact carries its own pipeline stage; every send attempt leaves one
//! delivery-log entry behind.

pub mod campaign;
pub mod contact;
pub mod delivery;

pub use campaign::{Campaign, CampaignStatus, SequenceStep, StepType};
pub use contact::{Contact, NewContact, PipelineStage, PipelineSummary};
pub use delivery::{DeliveryLogEntry, DeliveryStatus, NewDeliveryLogEntry};
