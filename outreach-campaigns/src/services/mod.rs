//! Services for outreach-campaigns

pub mod email_transport;
pub mod listing_directory;
pub mod send_executor;
pub mod template_renderer;
pub mod throttle;

pub use email_transport::{
    build_transport, DeliveryReceipt, EmailTransport, HttpEmailTransport, OutboundEmail,
    UnconfiguredTransport,
};
pub use listing_directory::ListingDirectory;
pub use send_executor::{
    BatchOutcome, RecipientResult, SendExecutor, SendOutcome, SendRequest, SendWarning,
    TestSendOutcome, WarningKind,
};
pub use template_renderer::{RenderError, RenderedEmail, TemplateRenderer};
pub use throttle::SendThrottle;
