//! Public directory links embedded in outreach emails

use url::form_urlencoded::byte_serialize;

/// Builds recipient-facing URLs on the public site
#[derive(Debug, Clone)]
pub struct ListingDirectory {
    site_url: String,
}

impl ListingDirectory {
    pub fn new(site_url: impl Into<String>) -> Self {
        let site_url = site_url.into();
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    /// Listing page, or the directory index when the contact has no listing
    pub fn listing_url(&self, listing_id: Option<&str>) -> String {
        match listing_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => format!("{}/listing/{}", self.site_url, encode(id)),
            None => format!("{}/directory", self.site_url),
        }
    }

    pub fn unsubscribe_url(&self, email: &str) -> String {
        format!("{}/unsubscribe?email={}", self.site_url, encode(email))
    }
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}
