//! Onboarding — a fixed sequence of introductory stages.

pub mod machine;
pub mod state;

pub use machine::{StepOutcome, extract_name, parse_consent, step};
pub use state::OnboardingStage;
