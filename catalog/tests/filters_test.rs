//! Integration tests for catalog filtering against the bundled data.
//!
//! These run the same queries the directory screens issue: default view,
//! ecosystem and niche narrowing, free-text search, and category counts.

use grantees_catalog::data::{grants, opportunities};
use grantees_catalog::{
    category_count, parse_list, BuilderNiche, Ecosystem, GrantFilter, GrantStatus,
    OpportunityFilter, OpportunityType,
};

fn ids<T, F: Fn(&T) -> &str>(items: &[&T], id: F) -> Vec<String> {
    items.iter().map(|i| id(*i).to_string()).collect()
}

// ---------------------------------------------------------------------------
// Grants
// ---------------------------------------------------------------------------

#[test]
fn default_view_shows_only_open_grants() {
    let all = grants();
    let shown = GrantFilter::default().apply(all);

    assert!(!shown.is_empty());
    assert!(shown.iter().all(|g| g.status == GrantStatus::Open));
    let open = all.iter().filter(|g| g.status == GrantStatus::Open).count();
    assert_eq!(shown.len(), open);
}

#[test]
fn clearing_statuses_shows_everything() {
    let mut f = GrantFilter::default();
    f.toggle_status(GrantStatus::Open);
    assert!(f.statuses.is_empty());
    assert_eq!(f.apply(grants()).len(), grants().len());
}

#[test]
fn ecosystem_filter_respects_status() {
    let mut f = GrantFilter::default();
    f.toggle_ecosystem(Ecosystem::Avalanche);
    assert_eq!(
        ids(&f.apply(grants()), |g| &g.id),
        vec!["avalanche-retro9000"]
    );

    f.toggle_status(GrantStatus::Upcoming);
    assert_eq!(
        ids(&f.apply(grants()), |g| &g.id),
        vec!["avalanche-retro9000", "avalanche-codebase"]
    );
}

#[test]
fn search_covers_name_and_description() {
    let mut f = GrantFilter::default();
    f.search = "RETRO".into();
    let found = ids(&f.apply(grants()), |g| &g.id);
    assert_eq!(found, vec!["avalanche-retro9000", "base-builder-grants"]);
}

#[test]
fn niche_and_ecosystem_are_anded() {
    let mut f = GrantFilter::default();
    f.toggle_niche(BuilderNiche::Infra);
    f.toggle_ecosystem(Ecosystem::Solana);
    let found = f.apply(grants());
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "solana-foundation-grants");
}

#[test]
fn category_counts_only_open_grants() {
    assert_eq!(category_count(grants(), BuilderNiche::Infra), 5);
    // near-ai-grants is upcoming, so it does not count here.
    let open_ai = grants()
        .iter()
        .filter(|g| g.status == GrantStatus::Open && g.focus_areas.contains(&BuilderNiche::AiCrypto))
        .count();
    assert_eq!(category_count(grants(), BuilderNiche::AiCrypto), open_ai);
}

#[test]
fn query_string_lists_feed_filters() {
    let f = GrantFilter {
        search: String::new(),
        ecosystems: parse_list("ethereum,arbitrum").unwrap(),
        niches: parse_list("dao_tooling").unwrap(),
        statuses: parse_list("open").unwrap(),
    };
    let found = ids(&f.apply(grants()), |g| &g.id);
    assert_eq!(found, vec!["ef-esp-small-grants", "arbitrum-questbook"]);
}

// ---------------------------------------------------------------------------
// Opportunities
// ---------------------------------------------------------------------------

#[test]
fn default_opportunity_filter_matches_all() {
    let f = OpportunityFilter::default();
    assert_eq!(f.apply(opportunities()).len(), opportunities().len());
}

#[test]
fn remote_hackathons() {
    let mut f = OpportunityFilter::default();
    f.toggle_type(OpportunityType::Hackathon);
    assert_eq!(f.apply(opportunities()).len(), 2);

    f.remote_only = true;
    assert_eq!(
        ids(&f.apply(opportunities()), |o| &o.id),
        vec!["ethglobal-online"]
    );
}

#[test]
fn opportunity_search_includes_descriptions() {
    let mut f = OpportunityFilter::default();
    f.search = "hackathon".into();
    assert_eq!(
        ids(&f.apply(opportunities()), |o| &o.id),
        vec!["ethglobal-online", "avalanche-summit-hack", "solana-colosseum"]
    );
}
