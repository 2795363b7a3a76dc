//! # Catalog Filters
//!
//! Linear, in-memory filters over the static catalog. Each filter
//! dimension is a set; an empty set means "don't filter on this". All
//! dimensions are ANDed together, values within one dimension are ORed.

use serde::{Deserialize, Serialize};

use crate::listing::{Grant, Opportunity};
use crate::taxonomy::{BuilderNiche, Ecosystem, GrantStatus, OpportunityType};

/// Adds `value` if absent, removes it if present.
pub fn toggle<T: PartialEq>(set: &mut Vec<T>, value: T) {
    if let Some(pos) = set.iter().position(|v| *v == value) {
        set.remove(pos);
    } else {
        set.push(value);
    }
}

/// Case-insensitive substring match of `needle` against any of `fields`.
fn text_matches(needle: &str, fields: &[&str]) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    fields.iter().any(|f| f.to_lowercase().contains(&needle))
}

// ---------------------------------------------------------------------------
// GrantFilter
// ---------------------------------------------------------------------------

/// Filter over [`Grant`]s.
///
/// The default filter shows open grants only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantFilter {
    pub search: String,
    pub ecosystems: Vec<Ecosystem>,
    pub niches: Vec<BuilderNiche>,
    pub statuses: Vec<GrantStatus>,
}

impl Default for GrantFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            ecosystems: Vec::new(),
            niches: Vec::new(),
            statuses: vec![GrantStatus::Open],
        }
    }
}

impl GrantFilter {
    /// Returns `true` if `grant` passes every active dimension.
    pub fn matches(&self, grant: &Grant) -> bool {
        if !text_matches(
            &self.search,
            &[&grant.name, &grant.organization, &grant.description],
        ) {
            return false;
        }
        if !self.ecosystems.is_empty() && !self.ecosystems.contains(&grant.ecosystem) {
            return false;
        }
        if !self.niches.is_empty() && !grant.focus_areas.iter().any(|f| self.niches.contains(f)) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&grant.status) {
            return false;
        }
        true
    }

    /// Matching grants, in catalog order.
    pub fn apply<'a>(&self, grants: &'a [Grant]) -> Vec<&'a Grant> {
        grants.iter().filter(|g| self.matches(g)).collect()
    }

    /// Number of user-chosen filter values. The default `[open]` status
    /// selection does not count.
    pub fn active_filter_count(&self) -> usize {
        let status_count = if self.statuses == [GrantStatus::Open] {
            0
        } else {
            self.statuses.len()
        };
        self.ecosystems.len() + self.niches.len() + status_count
    }

    pub fn toggle_ecosystem(&mut self, ecosystem: Ecosystem) {
        toggle(&mut self.ecosystems, ecosystem);
    }

    pub fn toggle_niche(&mut self, niche: BuilderNiche) {
        toggle(&mut self.niches, niche);
    }

    pub fn toggle_status(&mut self, status: GrantStatus) {
        toggle(&mut self.statuses, status);
    }

    /// Narrows to a single category, replacing any niche selection.
    pub fn select_category(&mut self, niche: BuilderNiche) {
        self.niches = vec![niche];
    }

    /// Resets to the default filter.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Number of open grants tagged with `niche`.
pub fn category_count(grants: &[Grant], niche: BuilderNiche) -> usize {
    grants
        .iter()
        .filter(|g| g.status == GrantStatus::Open && g.focus_areas.contains(&niche))
        .count()
}

// ---------------------------------------------------------------------------
// OpportunityFilter
// ---------------------------------------------------------------------------

/// Filter over [`Opportunity`] listings. The default filter matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityFilter {
    pub search: String,
    pub types: Vec<OpportunityType>,
    pub ecosystems: Vec<Ecosystem>,
    pub remote_only: bool,
}

impl OpportunityFilter {
    pub fn matches(&self, opp: &Opportunity) -> bool {
        if !text_matches(&self.search, &[&opp.name, &opp.description, &opp.organization]) {
            return false;
        }
        if !self.types.is_empty() && !self.types.contains(&opp.opportunity_type) {
            return false;
        }
        if !self.ecosystems.is_empty() && !self.ecosystems.contains(&opp.ecosystem) {
            return false;
        }
        if self.remote_only && !opp.is_remote {
            return false;
        }
        true
    }

    pub fn apply<'a>(&self, opportunities: &'a [Opportunity]) -> Vec<&'a Opportunity> {
        opportunities.iter().filter(|o| self.matches(o)).collect()
    }

    pub fn has_active_filters(&self) -> bool {
        !self.types.is_empty()
            || !self.ecosystems.is_empty()
            || self.remote_only
            || !self.search.trim().is_empty()
    }

    pub fn toggle_type(&mut self, kind: OpportunityType) {
        toggle(&mut self.types, kind);
    }

    pub fn toggle_ecosystem(&mut self, ecosystem: Ecosystem) {
        toggle(&mut self.ecosystems, ecosystem);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
