//! Per-dataset lock entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What was last accepted for one dataset.
///
/// Every field is optional: an entry created by a run in which no source was
/// reachable only carries the inaccessible fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_content_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_fingerprint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inaccessible_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inaccessible_error: Option<String>,
}

impl LockEntry {
    /// An entry for freshly accepted content.
    pub fn accepted(
        fingerprint: impl Into<String>,
        content_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            local_content_hash: Some(content_hash.into()),
            remote_fingerprint: Some(fingerprint.into()),
            checked_at: Some(now),
            inaccessible_at: None,
            inaccessible_error: None,
        }
    }

    /// Copy of this entry confirmed as fresh at `now`.
    pub fn touched(&self, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.touch(now);
        next
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.checked_at = Some(now);
        self.clear_inaccessible();
    }

    /// Record that no source could be reached. Fingerprint and hash are kept.
    pub fn mark_inaccessible(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.inaccessible_at = Some(now);
        self.inaccessible_error = Some(error.into());
    }

    pub fn clear_inaccessible(&mut self) {
        self.inaccessible_at = None;
        self.inaccessible_error = None;
    }

    pub fn is_inaccessible(&self) -> bool {
        self.inaccessible_at.is_some()
    }
}
