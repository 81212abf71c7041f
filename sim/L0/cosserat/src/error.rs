//! Error types for Cosserat kinematics and instrument navigation.
//!
//! Two families share one enum:
//!
//! - **Fatal to the call**: [`CosseratError::DimensionMismatch`],
//!   [`CosseratError::InvalidSchedule`], [`CosseratError::SegmentCapacityExceeded`],
//!   [`CosseratError::InvalidConfig`] and [`CosseratError::InvalidCommand`]. The
//!   call or command that produced them wrote nothing.
//! - **Reported conditions**: [`CosseratError::DeploymentLimitReached`] and
//!   [`CosseratError::InvalidInstrumentReference`]. The navigation controller
//!   collects them in its step report and keeps going.

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::InstrumentId;

/// Which end of the travel range a deployment was clamped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TravelLimit {
    /// Fully retracted (deployed length 0).
    Retracted,
    /// Fully deployed (deployed length == total length).
    Deployed,
}

impl std::fmt::Display for TravelLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retracted => write!(f, "retracted"),
            Self::Deployed => write!(f, "deployed"),
        }
    }
}

/// Errors and reportable conditions raised by the Cosserat core.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CosseratError {
    /// A strain array does not match the number of segments it should drive.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// What was being checked.
        context: &'static str,
        /// Expected element count.
        expected: usize,
        /// Provided element count.
        actual: usize,
    },

    /// Abscissae are not monotonically non-decreasing, or fall outside the rod.
    #[error("invalid schedule: {reason}")]
    InvalidSchedule {
        /// Description of the violation.
        reason: String,
    },

    /// More active segments were requested than the instrument owns.
    #[error("segment capacity exceeded: requested {requested}, capacity {capacity}")]
    SegmentCapacityExceeded {
        /// Requested active count.
        requested: usize,
        /// Fixed segment budget.
        capacity: usize,
    },

    /// A deployment or retraction was clamped to the travel range.
    #[error("{instrument} {limit} limit reached: requested {requested}, clamped to {clamped}")]
    DeploymentLimitReached {
        /// The clamped instrument.
        instrument: InstrumentId,
        /// Which bound was hit.
        limit: TravelLimit,
        /// Deployed length that was asked for.
        requested: f64,
        /// Deployed length actually applied.
        clamped: f64,
    },

    /// A command referenced an instrument that does not exist or is not initialized.
    #[error("invalid instrument reference {instrument}: {reason}")]
    InvalidInstrumentReference {
        /// The offending id.
        instrument: InstrumentId,
        /// Why the reference was rejected.
        reason: &'static str,
    },

    /// A motion command carried a non-finite delta and was rejected.
    #[error("invalid command for {instrument}: {reason}")]
    InvalidCommand {
        /// The addressed instrument.
        instrument: InstrumentId,
        /// Why the command was rejected.
        reason: &'static str,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

impl CosseratError {
    /// Create a dimension mismatch error.
    #[must_use]
    pub fn dimension_mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            actual,
        }
    }

    /// Create an invalid schedule error.
    #[must_use]
    pub fn invalid_schedule(reason: impl Into<String>) -> Self {
        Self::InvalidSchedule {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid instrument reference.
    #[must_use]
    pub const fn invalid_reference(instrument: InstrumentId, reason: &'static str) -> Self {
        Self::InvalidInstrumentReference { instrument, reason }
    }

    /// Whether this error aborted the call that produced it.
    ///
    /// Non-fatal conditions are reported and the operation went ahead
    /// (clamped) or was skipped without touching any state.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::DeploymentLimitReached { .. } | Self::InvalidInstrumentReference { .. }
        )
    }

    /// Check if this is a deployment limit condition.
    #[must_use]
    pub const fn is_limit_reached(&self) -> bool {
        matches!(self, Self::DeploymentLimitReached { .. })
    }

    /// Check if this is an invalid instrument reference.
    #[must_use]
    pub const fn is_invalid_reference(&self) -> bool {
        matches!(self, Self::InvalidInstrumentReference { .. })
    }

    /// Check if this is a rejected motion command.
    #[must_use]
    pub const fn is_invalid_command(&self) -> bool {
        matches!(self, Self::InvalidCommand { .. })
    }

    /// The instrument this condition concerns, if any.
    #[must_use]
    pub const fn instrument(&self) -> Option<InstrumentId> {
        match self {
            Self::DeploymentLimitReached { instrument, .. }
            | Self::InvalidInstrumentReference { instrument, .. }
            | Self::InvalidCommand { instrument, .. } => Some(*instrument),
            _ => None,
        }
    }
}

/// Result type for Cosserat operations.
pub type Result<T> = std::result::Result<T, CosseratError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CosseratError::dimension_mismatch("strain", 4, 3);
        let text = err.to_string();
        assert!(text.contains("strain"));
        assert!(text.contains('4'));
        assert!(text.contains('3'));

        let err = CosseratError::DeploymentLimitReached {
            instrument: InstrumentId::new(1),
            limit: TravelLimit::Deployed,
            requested: 16.0,
            clamped: 15.0,
        };
        assert!(err.to_string().contains("deployed limit"));
        assert!(err.to_string().contains("16"));
    }

    #[test]
    fn test_fatality() {
        assert!(CosseratError::invalid_schedule("not sorted").is_fatal());
        assert!(CosseratError::dimension_mismatch("strain", 1, 2).is_fatal());
        assert!(!CosseratError::invalid_reference(InstrumentId::new(7), "out of range").is_fatal());

        let limit = CosseratError::DeploymentLimitReached {
            instrument: InstrumentId::new(0),
            limit: TravelLimit::Retracted,
            requested: -1.0,
            clamped: 0.0,
        };
        assert!(!limit.is_fatal());
        assert!(limit.is_limit_reached());
        assert_eq!(limit.instrument(), Some(InstrumentId::new(0)));

        let command = CosseratError::InvalidCommand {
            instrument: InstrumentId::new(2),
            reason: "rotation delta is not finite",
        };
        assert!(command.is_fatal());
        assert!(command.is_invalid_command());
        assert_eq!(command.instrument(), Some(InstrumentId::new(2)));
    }
}
