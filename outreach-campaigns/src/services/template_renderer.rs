//! Outreach email rendering
//!
//! Bodies are Handlebars templates rendered with HTML escaping on, so
//! contact-supplied values (business names, metadata URLs) cannot inject
//! markup. Subjects are plain text and rendered through a second, strict
//! registry with escaping off: `{{business_name}}` is the only variable a
//! subject may reference.

use handlebars::Handlebars;
use outreach_common::models::{Contact, SequenceStep, StepType};
use serde_json::json;
use thiserror::Error;
use url::form_urlencoded::byte_serialize;

use super::listing_directory::ListingDirectory;
use super::send_executor::TEST_BUSINESS_NAME;

/// Subject used when a step defines none
pub const DEFAULT_SUBJECT: &str = "GreenLine365";

/// Headline of the generic follow-up when the step has no subject
const DEFAULT_FOLLOW_UP_HEADLINE: &str = "Following up";

const TEMPLATE_INITIAL_OUTREACH: &str = "initial_outreach";
const TEMPLATE_VALUE_BOMB: &str = "value_bomb";
const TEMPLATE_DEMO_INVITE: &str = "demo_invite";
const TEMPLATE_FOLLOW_UP: &str = "follow_up";

const PARTIAL_HEADER: &str = r#"<!DOCTYPE html><html><head><meta charset="utf-8"><meta name="viewport" content="width=device-width, initial-scale=1.0"></head>
<body style="margin:0;padding:0;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;background:#0a0a0a;">
<div style="max-width:600px;margin:0 auto;padding:40px 20px;">
  <div style="text-align:center;margin-bottom:24px;">
    <h1 style="color:#C9A96E;font-size:24px;margin:0;">GreenLine<span style="color:#fff;">365</span></h1>
    {{#if tagline}}<p style="color:#666;font-size:12px;margin:4px 0 0;">Florida's Gold Standard Business Directory</p>{{/if}}
  </div>
  <div style="background:#1a1a1a;border:1px solid #C9A96E30;border-radius:16px;padding:32px;">"#;

const PARTIAL_FOOTER: &str = r#"  </div>
  <div style="text-align:center;margin-top:24px;">
    <p style="color:#444;font-size:11px;">GreenLine365 &middot; Florida Business Directory</p>
    <p style="color:#333;font-size:10px;margin:4px 0 0;">
      <a href="{{{unsubscribe_url}}}" style="color:#555;text-decoration:underline;">Unsubscribe</a>
    </p>
  </div>
</div>
</body></html>"#;

// Link targets are built here and already percent-encoded, so they render raw
const PARTIAL_BUTTON: &str = r#"<div style="text-align:center;margin:24px 0;">
      <a href="{{{href}}}" style="display:inline-block;background:linear-gradient(135deg,#C9A96E,#E6D8B5);color:#000;font-weight:700;font-size:15px;padding:14px 36px;border-radius:10px;text-decoration:none;">
        {{label}}
      </a>
    </div>"#;

const BODY_INITIAL_OUTREACH: &str = r#"{{> header tagline=true}}
    <h2 style="color:#fff;font-size:20px;margin:0 0 16px;">Your business is live on GreenLine365</h2>
    <p style="color:#a0a0a0;font-size:15px;line-height:1.7;margin:0 0 16px;">Hi there,</p>
    <p style="color:#a0a0a0;font-size:15px;line-height:1.7;margin:0 0 16px;">
      <strong style="color:#C9A96E;">{{business_name}}</strong> has been added to GreenLine365, Florida's premium verified business directory.
    </p>
    <p style="color:#a0a0a0;font-size:15px;line-height:1.7;margin:0 0 24px;">
      Your listing is live and visible to consumers searching for services in your area. Claim it to update your information, add photos and unlock premium features.
    </p>
    {{> button href=listing_url label="View Your Listing"}}
    <p style="color:#666;font-size:13px;margin:24px 0 0;text-align:center;">
      Questions? Reply to this email. We read every message.
    </p>
{{> footer}}"#;

const BODY_VALUE_BOMB: &str = r#"{{> header}}
    <h2 style="color:#fff;font-size:20px;margin:0 0 16px;">We ran a free audit for {{business_name}}</h2>
    <p style="color:#a0a0a0;font-size:15px;line-height:1.7;margin:0 0 16px;">
      Our team analyzed <strong style="color:#C9A96E;">{{business_name}}</strong>'s online presence and found some opportunities you might want to know about.
    </p>
    {{#if screenshot_url}}
    <div style="margin:20px 0;border:1px solid #333;border-radius:8px;overflow:hidden;">
      <img src="{{screenshot_url}}" alt="Google Maps showing your business" style="width:100%;display:block;" />
      <p style="color:#FF6B6B;font-size:13px;padding:12px;margin:0;background:#1a0a0a;text-align:center;">
        Your Google listing shows "Closed" during after-hours. You're missing calls.
      </p>
    </div>
    {{/if}}
    <p style="color:#a0a0a0;font-size:15px;line-height:1.7;margin:16px 0 24px;">
      We'd love to share the full report. Just reply to this email and we'll send it over, completely free.
    </p>
    {{> button href=audit_mailto label="Get My Free Audit"}}
{{> footer}}"#;

const BODY_DEMO_INVITE: &str = r#"{{> header}}
    <h2 style="color:#fff;font-size:20px;margin:0 0 16px;">Try our AI receptionist, live right now</h2>
    <p style="color:#a0a0a0;font-size:15px;line-height:1.7;margin:0 0 16px;">
      What if {{business_name}} never missed another call, even at 2 AM?
    </p>
    <p style="color:#a0a0a0;font-size:15px;line-height:1.7;margin:0 0 16px;">
      Our AI receptionist answers calls, books appointments and handles inquiries around the clock.
    </p>
    {{#if demo_phone_number}}
    <div style="background:#0a0a0a;border:1px solid #C9A96E50;border-radius:12px;padding:20px;text-align:center;margin:20px 0;">
      <p style="color:#C9A96E;font-size:13px;margin:0 0 8px;text-transform:uppercase;letter-spacing:1px;">Call for a live demo</p>
      <p style="color:#fff;font-size:28px;font-weight:700;margin:0;">{{demo_phone_number}}</p>
    </div>
    {{/if}}
    <p style="color:#a0a0a0;font-size:15px;line-height:1.7;margin:16px 0 0;">
      Or reply to this email. Happy to walk you through what it can do for {{business_name}}.
    </p>
{{> footer}}"#;

const BODY_FOLLOW_UP: &str = r#"{{> header}}
    <h2 style="color:#fff;font-size:20px;margin:0 0 16px;">{{headline}}</h2>
    <p style="color:#a0a0a0;font-size:15px;line-height:1.7;margin:0 0 16px;">
      Just checking in about <strong style="color:#C9A96E;">{{business_name}}</strong>'s listing on GreenLine365.
    </p>
    <p style="color:#a0a0a0;font-size:15px;line-height:1.7;margin:0 0 24px;">
      Reply to this email if you'd like to claim your listing or learn more about our verified business features.
    </p>
    {{> button href=listing_url label="View Your Listing"}}
{{> footer}}"#;

/// Rendering errors
#[derive(Debug, Error)]
pub enum RenderError {
    /// A template failed to compile
    #[error("Template error: {0}")]
    Compile(#[from] handlebars::TemplateError),

    /// A compiled template failed to render
    #[error("Render error: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Subject and HTML body ready for a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Renders sequence steps for individual contacts
pub struct TemplateRenderer {
    bodies: Handlebars<'static>,
    subjects: Handlebars<'static>,
    directory: ListingDirectory,
    reply_to: String,
    demo_phone_number: Option<String>,
}

impl TemplateRenderer {
    pub fn new(
        directory: ListingDirectory,
        reply_to: impl Into<String>,
        demo_phone_number: Option<String>,
    ) -> Result<Self, RenderError> {
        let mut bodies = Handlebars::new();
        bodies.register_partial("header", PARTIAL_HEADER)?;
        bodies.register_partial("footer", PARTIAL_FOOTER)?;
        bodies.register_partial("button", PARTIAL_BUTTON)?;
        bodies.register_template_string(TEMPLATE_INITIAL_OUTREACH, BODY_INITIAL_OUTREACH)?;
        bodies.register_template_string(TEMPLATE_VALUE_BOMB, BODY_VALUE_BOMB)?;
        bodies.register_template_string(TEMPLATE_DEMO_INVITE, BODY_DEMO_INVITE)?;
        bodies.register_template_string(TEMPLATE_FOLLOW_UP, BODY_FOLLOW_UP)?;

        let mut subjects = Handlebars::new();
        subjects.register_escape_fn(handlebars::no_escape);
        subjects.set_strict_mode(true);

        Ok(Self {
            bodies,
            subjects,
            directory,
            reply_to: reply_to.into(),
            demo_phone_number: demo_phone_number.filter(|n| !n.trim().is_empty()),
        })
    }

    /// Check that a step's subject compiles and references only known variables
    pub fn validate_step(&self, step: &SequenceStep) -> Result<(), RenderError> {
        if let Some(subject) = &step.subject {
            handlebars::Template::compile(subject)?;
            self.render_subject(step, TEST_BUSINESS_NAME)?;
        }
        Ok(())
    }

    /// Subject line with `{{business_name}}` substituted
    pub fn render_subject(&self, step: &SequenceStep, business_name: &str) -> Result<String, RenderError> {
        let template = step.subject.as_deref().unwrap_or(DEFAULT_SUBJECT);
        let subject = self
            .subjects
            .render_template(template, &json!({ "business_name": business_name }))?;
        Ok(subject)
    }

    /// Render one step for one contact
    pub fn render(&self, step: &SequenceStep, contact: &Contact) -> Result<RenderedEmail, RenderError> {
        let business_name = contact.display_name();
        let subject = self.render_subject(step, business_name)?;

        let headline = if step.subject.is_some() {
            subject.clone()
        } else {
            DEFAULT_FOLLOW_UP_HEADLINE.to_string()
        };

        let audit_subject: String =
            byte_serialize(format!("Send me the audit for {}", business_name).as_bytes()).collect();

        let data = json!({
            "business_name": business_name,
            "listing_url": self.directory.listing_url(contact.listing_id.as_deref()),
            "unsubscribe_url": self.directory.unsubscribe_url(&contact.email),
            "screenshot_url": contact.metadata_str("after_hours_screenshot_url"),
            "audit_mailto": format!("mailto:{}?subject={}", self.reply_to, audit_subject),
            "demo_phone_number": self.demo_phone_number,
            "headline": headline,
        });

        let template = match step.step_type {
            StepType::InitialOutreach => TEMPLATE_INITIAL_OUTREACH,
            StepType::ValueBomb => TEMPLATE_VALUE_BOMB,
            StepType::DemoInvite => TEMPLATE_DEMO_INVITE,
            StepType::FollowUp(_) => TEMPLATE_FOLLOW_UP,
        };

        let html = self.bodies.render(template, &data)?;

        Ok(RenderedEmail { subject, html })
    }
}
