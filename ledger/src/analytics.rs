//! # Analytics Event Log
//!
//! Product events (page views, searches, unlock attempts) appended to the
//! `analytics` tree. Recording is fire-and-forget: a failed write is
//! logged and swallowed, never surfaced to the request that caused it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::db::{decode, encode};
use crate::storage::{DbResult, GranteesDb};

/// The closed set of tracked events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsEvent {
    PageView,
    SignupSuccess,
    SignupWallet,
    LoginSuccess,
    GrantSearch,
    GrantFilterUsed,
    GrantApplyClick,
    OpportunityView,
    PremiumUnlockAttempt,
    PremiumUnlockSuccess,
    NicheFinderStart,
    OnboardingComplete,
}

impl AnalyticsEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsEvent::PageView => "page_view",
            AnalyticsEvent::SignupSuccess => "signup_success",
            AnalyticsEvent::SignupWallet => "signup_wallet",
            AnalyticsEvent::LoginSuccess => "login_success",
            AnalyticsEvent::GrantSearch => "grant_search",
            AnalyticsEvent::GrantFilterUsed => "grant_filter_used",
            AnalyticsEvent::GrantApplyClick => "grant_apply_click",
            AnalyticsEvent::OpportunityView => "opportunity_view",
            AnalyticsEvent::PremiumUnlockAttempt => "premium_unlock_attempt",
            AnalyticsEvent::PremiumUnlockSuccess => "premium_unlock_success",
            AnalyticsEvent::NicheFinderStart => "niche_finder_start",
            AnalyticsEvent::OnboardingComplete => "onboarding_complete",
        }
    }
}

impl std::fmt::Display for AnalyticsEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored event.
///
/// `event_data` is kept as a JSON string because bincode cannot round-trip
/// a free-form `serde_json::Value`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub user_id: Option<String>,
    pub event: AnalyticsEvent,
    pub page_name: Option<String>,
    pub event_data: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredEvent {
    /// `event_data` parsed back into JSON.
    pub fn data(&self) -> Option<serde_json::Value> {
        self.event_data
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

/// Appends events to the `analytics` tree.
#[derive(Debug, Clone)]
pub struct Analytics {
    db: GranteesDb,
}

impl Analytics {
    pub fn new(db: GranteesDb) -> Self {
        Self { db }
    }

    /// Records an event. Never fails; storage errors are logged.
    pub fn record(
        &self,
        user_id: Option<&str>,
        event: AnalyticsEvent,
        page_name: Option<&str>,
        data: Option<&serde_json::Value>,
    ) {
        let stored = StoredEvent {
            user_id: user_id.map(str::to_string),
            event,
            page_name: page_name.map(str::to_string),
            event_data: data.map(|d| d.to_string()),
            created_at: Utc::now(),
        };
        match self.append(&stored) {
            Ok(()) => debug!(event = %event, "analytics event recorded"),
            Err(e) => warn!(event = %event, error = %e, "failed to record analytics event"),
        }
    }

    fn append(&self, stored: &StoredEvent) -> DbResult<()> {
        let seq = self.db.generate_id()?;
        self.db
            .analytics()
            .insert(seq.to_be_bytes(), encode(stored)?)?;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.db.event_count()
    }

    /// The last `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> DbResult<Vec<StoredEvent>> {
        let mut events = Vec::with_capacity(limit);
        for item in self.db.analytics().iter().rev().take(limit) {
            let (_key, value) = item?;
            events.push(decode(&value)?);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_display() {
        for (event, name) in [
            (AnalyticsEvent::PageView, "page_view"),
            (AnalyticsEvent::PremiumUnlockSuccess, "premium_unlock_success"),
            (AnalyticsEvent::OnboardingComplete, "onboarding_complete"),
        ] {
            assert_eq!(event.to_string(), name);
            assert_eq!(serde_json::to_value(event).unwrap(), name);
        }
    }

    #[test]
    fn record_and_read_back() {
        let analytics = Analytics::new(GranteesDb::open_temporary().unwrap());
        analytics.record(None, AnalyticsEvent::PageView, Some("grants"), None);
        analytics.record(
            Some("u1"),
            AnalyticsEvent::GrantSearch,
            None,
            Some(&serde_json::json!({"query": "defi"})),
        );

        assert_eq!(analytics.count(), 2);
        let recent = analytics.recent(10).unwrap();
        assert_eq!(recent[0].event, AnalyticsEvent::GrantSearch);
        assert_eq!(recent[0].data().unwrap()["query"], "defi");
        assert_eq!(recent[1].page_name.as_deref(), Some("grants"));
    }
}
