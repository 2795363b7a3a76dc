//! # Builder Onboarding Wizard
//!
//! A linear five-step form that collects a builder's role, focus niches,
//! target ecosystems, and project stage:
//!
//! ```text
//! Role ──▶ Niche ──▶ Ecosystem ──▶ Project ──▶ Review ──▶ (completed)
//! ```
//!
//! Each step is gated by [`OnboardingWizard::can_proceed`]. The wizard is
//! purely local state. Completing it yields a [`BuilderProfile`], which
//! the caller may persist through a profile edit.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::toggle;
use crate::taxonomy::{BuilderNiche, BuilderRole, Ecosystem, ProjectMaturity};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OnboardingError {
    /// The current step's required fields are not filled in.
    #[error("step '{0}' is incomplete")]
    StepIncomplete(WizardStep),

    /// `Other` is a catalog bucket, not something a builder targets.
    #[error("ecosystem '{0}' cannot be selected during onboarding")]
    EcosystemNotOffered(Ecosystem),

    /// The wizard already produced its profile.
    #[error("onboarding is already complete")]
    AlreadyComplete,
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// One page of the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WizardStep {
    Role,
    Niche,
    Ecosystem,
    Project,
    Review,
}

impl WizardStep {
    pub const ALL: [WizardStep; 5] = [
        WizardStep::Role,
        WizardStep::Niche,
        WizardStep::Ecosystem,
        WizardStep::Project,
        WizardStep::Review,
    ];

    /// Zero-based position in the wizard.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn title(self) -> &'static str {
        match self {
            WizardStep::Role => "Your Role",
            WizardStep::Niche => "Your Niche",
            WizardStep::Ecosystem => "Ecosystems",
            WizardStep::Project => "Project Stage",
            WizardStep::Review => "All Set!",
        }
    }

    fn next(self) -> Option<WizardStep> {
        Self::ALL.get(self.index() + 1).copied()
    }

    fn prev(self) -> Option<WizardStep> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

// ---------------------------------------------------------------------------
// Builder profile
// ---------------------------------------------------------------------------

/// A builder's self-description, used for grant matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderProfile {
    pub display_name: String,
    pub role: BuilderRole,
    pub niches: Vec<BuilderNiche>,
    pub target_ecosystems: Vec<Ecosystem>,
    pub project_maturity: ProjectMaturity,
    pub project_description: String,
    pub region: String,
}

impl BuilderProfile {
    /// Checks the same constraints the wizard enforces step by step.
    /// Used when a completed profile arrives from outside the wizard.
    pub fn validate(&self) -> Result<(), OnboardingError> {
        if self.display_name.trim().is_empty() {
            return Err(OnboardingError::StepIncomplete(WizardStep::Role));
        }
        if self.niches.is_empty() {
            return Err(OnboardingError::StepIncomplete(WizardStep::Niche));
        }
        if self.target_ecosystems.is_empty() {
            return Err(OnboardingError::StepIncomplete(WizardStep::Ecosystem));
        }
        if let Some(eco) = self
            .target_ecosystems
            .iter()
            .find(|e| **e == Ecosystem::Other)
        {
            return Err(OnboardingError::EcosystemNotOffered(*eco));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wizard
// ---------------------------------------------------------------------------

/// Form fields collected across the steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingForm {
    pub display_name: String,
    pub role: Option<BuilderRole>,
    pub niches: Vec<BuilderNiche>,
    pub ecosystems: Vec<Ecosystem>,
    pub project_maturity: Option<ProjectMaturity>,
    pub project_description: String,
    pub region: String,
}

/// Outcome of [`OnboardingWizard::next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the given step.
    Step(WizardStep),
    /// The review step was confirmed.
    Completed(BuilderProfile),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingWizard {
    step: WizardStep,
    completed: bool,
    pub form: OnboardingForm,
}

impl Default for OnboardingWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl OnboardingWizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::Role,
            completed: false,
            form: OnboardingForm::default(),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Progress through the wizard as a percentage: step 1 of 5 is 20%.
    pub fn progress_pct(&self) -> u8 {
        ((self.step.index() + 1) * 100 / WizardStep::ALL.len()) as u8
    }

    /// Whether the current step's required fields are filled in.
    pub fn can_proceed(&self) -> bool {
        let f = &self.form;
        match self.step {
            WizardStep::Role => !f.display_name.trim().is_empty() && f.role.is_some(),
            WizardStep::Niche => !f.niches.is_empty(),
            WizardStep::Ecosystem => !f.ecosystems.is_empty(),
            WizardStep::Project => f.project_maturity.is_some(),
            WizardStep::Review => true,
        }
    }

    /// Advances one step, or completes the wizard from the review step.
    pub fn next(&mut self) -> Result<Advance, OnboardingError> {
        if self.completed {
            return Err(OnboardingError::AlreadyComplete);
        }
        if !self.can_proceed() {
            return Err(OnboardingError::StepIncomplete(self.step));
        }

        match self.step.next() {
            Some(step) => {
                self.step = step;
                Ok(Advance::Step(step))
            }
            None => {
                let profile = self.build_profile()?;
                self.completed = true;
                Ok(Advance::Completed(profile))
            }
        }
    }

    /// Steps back. A no-op on the first step.
    pub fn back(&mut self) -> WizardStep {
        if let Some(prev) = self.step.prev() {
            self.step = prev;
        }
        self.step
    }

    pub fn toggle_niche(&mut self, niche: BuilderNiche) {
        toggle(&mut self.form.niches, niche);
    }

    pub fn toggle_ecosystem(&mut self, ecosystem: Ecosystem) -> Result<(), OnboardingError> {
        if ecosystem == Ecosystem::Other {
            return Err(OnboardingError::EcosystemNotOffered(ecosystem));
        }
        toggle(&mut self.form.ecosystems, ecosystem);
        Ok(())
    }

    fn build_profile(&self) -> Result<BuilderProfile, OnboardingError> {
        let f = &self.form;
        let role = f
            .role
            .ok_or(OnboardingError::StepIncomplete(WizardStep::Role))?;
        let project_maturity = f
            .project_maturity
            .ok_or(OnboardingError::StepIncomplete(WizardStep::Project))?;

        Ok(BuilderProfile {
            display_name: f.display_name.trim().to_string(),
            role,
            niches: f.niches.clone(),
            target_ecosystems: f.ecosystems.clone(),
            project_maturity,
            project_description: f.project_description.trim().to_string(),
            region: f.region.trim().to_string(),
        })
    }
}
