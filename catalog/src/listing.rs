//! # Catalog Listings
//!
//! The two kinds of entries a builder can browse: funding [`Grant`]s and
//! broader [`Opportunity`] listings (hackathons, fellowships, travel
//! grants, accelerators). Both are static, read-only records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::taxonomy::{BuilderNiche, Ecosystem, GrantStatus, GrantType, OpportunityType, ProjectMaturity};

// ---------------------------------------------------------------------------
// Grant
// ---------------------------------------------------------------------------

/// A funding program with eligibility rules, a funding range, and a deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Stable slug, unique within the catalog.
    pub id: String,
    pub name: String,
    pub organization: String,
    pub description: String,
    pub ecosystem: Ecosystem,
    #[serde(rename = "type")]
    pub grant_type: GrantType,
    pub focus_areas: Vec<BuilderNiche>,
    pub eligibility_rules: Vec<String>,
    /// Lower bound of the award in whole USD.
    pub funding_min: u64,
    /// Upper bound of the award in whole USD.
    pub funding_max: u64,
    /// Application deadline. `None` means rolling applications.
    pub deadline: Option<NaiveDate>,
    pub application_url: String,
    pub status: GrantStatus,
    /// Regions the program is restricted to. Empty means global.
    #[serde(default)]
    pub region: Vec<String>,
    /// Project stages the program funds. Empty means any stage.
    #[serde(default)]
    pub project_maturity_required: Vec<ProjectMaturity>,
}

impl Grant {
    /// Returns `true` if applications are accepted on a rolling basis.
    pub fn is_rolling(&self) -> bool {
        self.deadline.is_none()
    }

    /// Days remaining until the deadline, negative once it has passed.
    /// `None` for rolling programs.
    pub fn days_until_deadline(&self, today: NaiveDate) -> Option<i64> {
        self.deadline.map(|d| (d - today).num_days())
    }

    /// Returns `true` if a project at `maturity` may apply.
    pub fn accepts_maturity(&self, maturity: ProjectMaturity) -> bool {
        self.project_maturity_required.is_empty()
            || self.project_maturity_required.contains(&maturity)
    }

    /// Human-readable funding range, e.g. `"$5K - $50K"` or `"Up to $10K"`.
    pub fn funding_range_label(&self) -> String {
        if self.funding_min == self.funding_max {
            format_usd(self.funding_max)
        } else if self.funding_min == 0 {
            format!("Up to {}", format_usd(self.funding_max))
        } else {
            format!(
                "{} - {}",
                format_usd(self.funding_min),
                format_usd(self.funding_max)
            )
        }
    }
}

/// Formats whole dollars compactly: `500` → `$500`, `50000` → `$50K`,
/// `1500000` → `$1.5M`.
pub fn format_usd(amount: u64) -> String {
    fn scaled(amount: u64, unit: u64, suffix: &str) -> String {
        let whole = amount / unit;
        let tenth = (amount % unit) * 10 / unit;
        if tenth == 0 {
            format!("${whole}{suffix}")
        } else {
            format!("${whole}.{tenth}{suffix}")
        }
    }

    if amount >= 1_000_000 {
        scaled(amount, 1_000_000, "M")
    } else if amount >= 1_000 {
        scaled(amount, 1_000, "K")
    } else {
        format!("${amount}")
    }
}

// ---------------------------------------------------------------------------
// Opportunity
// ---------------------------------------------------------------------------

/// A non-grant builder opportunity: hackathon, fellowship, conference, etc.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    pub name: String,
    pub organization: String,
    pub description: String,
    pub opportunity_type: OpportunityType,
    pub ecosystem: Ecosystem,
    /// City / country, or `"Online"`.
    pub location: String,
    pub is_remote: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub deadline: Option<NaiveDate>,
    /// What participants get: prize pool, stipend, travel coverage.
    pub benefits: String,
    pub url: String,
}
