//! Change events fanned out to subscribers.

use serde::{Deserialize, Serialize};

use super::affiliate::AffiliateExport;

/// One affiliate's new state, or its removal.
///
/// Shared behind an `Arc` across every delivery of the same event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Which affiliate changed.
    pub affiliate_id: String,
    /// New state; `None` means the affiliate was deleted or expired.
    pub affiliate: Option<AffiliateExport>,
}

impl Notification {
    pub(crate) fn update(affiliate: AffiliateExport) -> Self {
        Self {
            affiliate_id: affiliate.id.clone(),
            affiliate: Some(affiliate),
        }
    }

    pub(crate) fn deletion(affiliate_id: impl Into<String>) -> Self {
        Self {
            affiliate_id: affiliate_id.into(),
            affiliate: None,
        }
    }

    /// Whether this event removes the affiliate.
    pub fn is_deletion(&self) -> bool {
        self.affiliate.is_none()
    }
}
