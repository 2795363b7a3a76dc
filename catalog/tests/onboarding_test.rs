//! Walks the onboarding wizard end to end, the way a new builder would.

use grantees_catalog::{
    Advance, BuilderNiche, BuilderRole, Ecosystem, OnboardingError, OnboardingWizard,
    ProjectMaturity, WizardStep,
};

#[test]
fn full_walkthrough_produces_profile() {
    let mut w = OnboardingWizard::new();

    // Role
    w.form.display_name = "  Ada Builder ".into();
    w.form.role = Some(BuilderRole::SoloDev);
    assert_eq!(w.next().unwrap(), Advance::Step(WizardStep::Niche));
    assert_eq!(w.progress_pct(), 40);

    // Niche
    assert!(!w.can_proceed());
    w.toggle_niche(BuilderNiche::Defi);
    w.toggle_niche(BuilderNiche::Infra);
    assert_eq!(w.next().unwrap(), Advance::Step(WizardStep::Ecosystem));

    // Ecosystem
    w.toggle_ecosystem(Ecosystem::Avalanche).unwrap();
    assert_eq!(w.next().unwrap(), Advance::Step(WizardStep::Project));

    // Project
    assert_eq!(
        w.next(),
        Err(OnboardingError::StepIncomplete(WizardStep::Project))
    );
    w.form.project_maturity = Some(ProjectMaturity::Mvp);
    w.form.project_description = "Subnet explorer".into();
    assert_eq!(w.next().unwrap(), Advance::Step(WizardStep::Review));
    assert_eq!(w.progress_pct(), 100);

    // Review
    let profile = match w.next().unwrap() {
        Advance::Completed(p) => p,
        other => panic!("expected completion, got {other:?}"),
    };
    assert!(w.is_completed());
    assert_eq!(profile.display_name, "Ada Builder");
    assert_eq!(profile.niches, vec![BuilderNiche::Defi, BuilderNiche::Infra]);
    assert_eq!(profile.target_ecosystems, vec![Ecosystem::Avalanche]);
    assert_eq!(profile.project_maturity, ProjectMaturity::Mvp);
    assert!(profile.validate().is_ok());

    assert_eq!(w.next(), Err(OnboardingError::AlreadyComplete));
}

#[test]
fn back_keeps_answers() {
    let mut w = OnboardingWizard::new();
    w.form.display_name = "Ada".into();
    w.form.role = Some(BuilderRole::Founder);
    w.next().unwrap();
    w.toggle_niche(BuilderNiche::Gaming);

    assert_eq!(w.back(), WizardStep::Role);
    assert_eq!(w.form.niches, vec![BuilderNiche::Gaming]);
    assert_eq!(w.form.role, Some(BuilderRole::Founder));
}

#[test]
fn deselecting_last_niche_blocks_progress() {
    let mut w = OnboardingWizard::new();
    w.form.display_name = "Ada".into();
    w.form.role = Some(BuilderRole::Team);
    w.next().unwrap();

    w.toggle_niche(BuilderNiche::Nft);
    assert!(w.can_proceed());
    w.toggle_niche(BuilderNiche::Nft);
    assert!(!w.can_proceed());
}
