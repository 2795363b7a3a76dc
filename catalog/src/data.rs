//! Bundled catalog data.
//!
//! Grants and opportunities ship as JSON inside the binary and are parsed
//! once, on first access. The catalog is read-only for the lifetime of the
//! process.

use std::sync::OnceLock;

use crate::listing::{Grant, Opportunity};

const GRANTS_JSON: &str = include_str!("../data/grants.json");
const OPPORTUNITIES_JSON: &str = include_str!("../data/opportunities.json");

static GRANTS: OnceLock<Vec<Grant>> = OnceLock::new();
static OPPORTUNITIES: OnceLock<Vec<Opportunity>> = OnceLock::new();

/// All grants, in catalog order.
pub fn grants() -> &'static [Grant] {
    GRANTS.get_or_init(|| {
        serde_json::from_str(GRANTS_JSON).expect("bundled grants.json must be valid")
    })
}

/// All opportunities, in catalog order.
pub fn opportunities() -> &'static [Opportunity] {
    OPPORTUNITIES.get_or_init(|| {
        serde_json::from_str(OPPORTUNITIES_JSON).expect("bundled opportunities.json must be valid")
    })
}

/// Looks up a grant by id.
pub fn find_grant(id: &str) -> Option<&'static Grant> {
    grants().iter().find(|g| g.id == id)
}

/// Looks up an opportunity by id.
pub fn find_opportunity(id: &str) -> Option<&'static Opportunity> {
    opportunities().iter().find(|o| o.id == id)
}
