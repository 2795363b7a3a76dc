//! # Grantees Catalog
//!
//! The read-only half of Grantees: the directory of funding programs and
//! builder opportunities, the filters used to browse them, and the
//! onboarding wizard that captures a builder's profile.
//!
//! - **Taxonomy**: closed vocabularies (ecosystems, niches, statuses) with
//!   stable kebab-case wire names.
//! - **Listings**: [`Grant`] and [`Opportunity`] records.
//! - **Data**: the bundled catalog, parsed once on first access.
//! - **Filters**: set-based search over grants and opportunities.
//! - **Onboarding**: the five-step builder profile wizard.
//!
//! Nothing in this crate touches storage or the network.

use thiserror::Error;

pub mod data;
pub mod filter;
pub mod listing;
pub mod onboarding;
pub mod taxonomy;

pub use filter::{category_count, GrantFilter, OpportunityFilter};
pub use listing::{format_usd, Grant, Opportunity};
pub use onboarding::{Advance, BuilderProfile, OnboardingError, OnboardingWizard, WizardStep};
pub use taxonomy::{
    parse_list, BuilderNiche, BuilderRole, Ecosystem, GrantStatus, GrantType, OpportunityType,
    ProjectMaturity,
};

/// Errors produced while interpreting catalog vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// A string did not name any variant of the given vocabulary.
    #[error("unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },
}
