//! Database rows and request payloads.

pub mod activity;
pub mod ai;
pub mod commission;
pub mod contact;
pub mod goal;
pub mod lead_analysis;
pub mod notification;
pub mod opportunity;
pub mod project;
pub mod quote_request;
pub mod user;

pub use activity::{Activity, ActivityStatus, ActivityType};
pub use ai::{AiConfig, AiConfigStatus, ChatMessage, ChatRole};
pub use commission::{Commission, CommissionStatus, CommissionStructure};
pub use contact::{Contact, ContactStatus};
pub use goal::{Goal, GoalCategory, GoalPeriod, GoalStatus, GoalType};
pub use lead_analysis::{AnalysisStatus, LeadAnalysis};
pub use notification::{Notification, NotificationType};
pub use opportunity::{Opportunity, OpportunityStage};
pub use project::{Project, ProjectStatus, ProjectType};
pub use quote_request::{QuoteRequest, QuoteStatus};
pub use user::{User, UserRole};

use serde::Deserialize;

/// `skip`/`limit` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    /// Offset, never negative.
    #[must_use]
    pub fn offset(&self) -> i64 {
        self.skip.unwrap_or(0).max(0)
    }

    /// Page size, falling back to `default` and capped at 1000.
    #[must_use]
    pub fn limit_or(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(0, 1000)
    }
}

/// Overwrite `target` when the patch carries a value.
pub(crate) fn patch<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

/// Overwrite a nullable column when the patch carries a value.
pub(crate) fn patch_opt<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_bounds() {
        let page = Pagination {
            skip: Some(-5),
            limit: None,
        };
        assert_eq!(page.offset(), 0);
        assert_eq!(page.limit_or(100), 100);

        let page = Pagination {
            skip: Some(20),
            limit: Some(50_000),
        };
        assert_eq!(page.offset(), 20);
        assert_eq!(page.limit_or(100), 1000);
    }

    #[test]
    fn test_patch_helpers() {
        let mut name = "old".to_string();
        patch(&mut name, None);
        assert_eq!(name, "old");
        patch(&mut name, Some("new".to_string()));
        assert_eq!(name, "new");

        let mut phone = Some("1".to_string());
        patch_opt(&mut phone, None);
        assert_eq!(phone.as_deref(), Some("1"));
    }
}
