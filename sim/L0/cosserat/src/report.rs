//! Per-step report produced by the navigation controller.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::CosseratError;
use crate::types::InstrumentId;

/// Motion of one instrument during one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MotionState {
    /// No command applied.
    #[default]
    Idle,
    /// Deployed length increased.
    Deploying,
    /// Deployed length decreased.
    Retracting,
    /// Only the base orientation changed.
    Rotating,
}

impl MotionState {
    /// Check if the instrument moved this step.
    #[must_use]
    pub const fn is_moving(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

bitflags::bitflags! {
    /// What changed on an instrument during a step.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct StepChanges: u32 {
        /// Deployed length increased.
        const DEPLOYED = 0b0000_0001;
        /// Deployed length decreased.
        const RETRACTED = 0b0000_0010;
        /// Base rotated about its axis.
        const ROTATED = 0b0000_0100;
        /// Active segment count changed.
        const RESEGMENTED = 0b0000_1000;
        /// Target was moved onto a segment boundary or the tolerance grid.
        const SNAPPED = 0b0001_0000;
        /// Target was clamped to the travel range.
        const CLAMPED = 0b0010_0000;
    }
}

/// Outcome for one instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InstrumentStep {
    /// The instrument.
    pub instrument: InstrumentId,
    /// Motion this step.
    pub state: MotionState,
    /// What changed.
    pub changes: StepChanges,
    /// Deployed length after the step.
    pub deployed: f64,
    /// Active segment count after the step.
    pub active: usize,
}

/// Outcome for one coaxial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkStep {
    /// Index of the link in the coupling manager.
    pub link: usize,
    /// Whether the sample set was rebuilt (otherwise only poses were updated).
    pub resampled: bool,
    /// Number of coupling constraints after the step.
    pub constraints: usize,
}

/// Everything that happened during one controller step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StepReport {
    /// Step index.
    pub step: u64,
    /// Per-instrument outcomes, in id order.
    pub instruments: Vec<InstrumentStep>,
    /// Per-link outcomes, in link order.
    pub links: Vec<LinkStep>,
    /// Non-fatal conditions (limits reached, invalid references).
    pub conditions: Vec<CosseratError>,
    /// Fatal errors isolated to one instrument or link.
    pub failures: Vec<CosseratError>,
}

impl StepReport {
    /// Create an empty report for `step`.
    #[must_use]
    pub fn new(step: u64) -> Self {
        Self {
            step,
            ..Default::default()
        }
    }

    /// Record a condition or failure in the right list.
    pub fn push_error(&mut self, error: CosseratError) {
        if error.is_fatal() {
            self.failures.push(error);
        } else {
            self.conditions.push(error);
        }
    }

    /// Outcome for `instrument`, if it was stepped.
    #[must_use]
    pub fn instrument(&self, instrument: InstrumentId) -> Option<&InstrumentStep> {
        self.instruments.iter().find(|s| s.instrument == instrument)
    }

    /// Check if any fatal error was isolated this step.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Check if any deployment limit was reached.
    #[must_use]
    pub fn limit_reached(&self) -> bool {
        self.conditions.iter().any(CosseratError::is_limit_reached)
    }

    /// Total coupling constraints over every link.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.links.iter().map(|l| l.constraints).sum()
    }
}

impl std::fmt::Display for StepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let moving = self.instruments.iter().filter(|s| s.state.is_moving()).count();
        write!(
            f,
            "Step {}: {}/{} instruments moved, {} constraints, {} conditions, {} failures",
            self.step,
            moving,
            self.instruments.len(),
            self.constraint_count(),
            self.conditions.len(),
            self.failures.len()
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::error::TravelLimit;

    #[test]
    fn test_push_error_sorts_by_fatality() {
        let mut report = StepReport::new(3);
        report.push_error(CosseratError::DeploymentLimitReached {
            instrument: InstrumentId::new(0),
            limit: TravelLimit::Deployed,
            requested: 12.0,
            clamped: 10.0,
        });
        report.push_error(CosseratError::dimension_mismatch("strain", 2, 1));
        assert_eq!(report.conditions.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.limit_reached());
        assert!(report.has_failures());
    }

    #[test]
    fn test_display() {
        let mut report = StepReport::new(7);
        report.instruments.push(InstrumentStep {
            instrument: InstrumentId::new(0),
            state: MotionState::Deploying,
            changes: StepChanges::DEPLOYED | StepChanges::RESEGMENTED,
            deployed: 3.0,
            active: 1,
        });
        report.links.push(LinkStep {
            link: 0,
            resampled: true,
            constraints: 4,
        });
        let text = report.to_string();
        assert!(text.contains("Step 7"));
        assert!(text.contains("1/1 instruments"));
        assert!(text.contains("4 constraints"));
    }
}
