use chrono::{DateTime, Utc};

/// Store key holding the referral code.
pub const REFERRAL_CODE_KEY: &str = "referral_code";
/// Store key holding the RFC 3339 expiry instant.
pub const REFERRAL_EXPIRES_KEY: &str = "referral_expires_at";

/// Attribution entry as read back from the visitor store.
///
/// `expires_at: None` marks a legacy entry written before expiry
/// tracking existed (or one whose timestamp no longer parses); those are
/// treated as valid and backfilled with a fresh window on the next page
/// load rather than discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAttribution {
    pub code: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredAttribution {
    /// Active iff `now < expires_at`. Entries without an expiry are
    /// always active; they get an expiry assigned, never purged.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }

    pub fn needs_backfill(&self) -> bool {
        self.expires_at.is_none()
    }
}

pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

pub fn format_expiry(expires_at: DateTime<Utc>) -> String {
    expires_at.to_rfc3339()
}
