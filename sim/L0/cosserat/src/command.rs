//! Motion commands, key-driven navigation input and the command log.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::NavigationConfig;
use crate::types::InstrumentId;

/// Motion requested for one instrument during one step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotionCommand {
    /// Target instrument.
    pub instrument: InstrumentId,
    /// Change in deployed length (positive inserts, negative retracts).
    pub insertion_delta: f64,
    /// Rotation about the base axis in radians.
    pub rotation_delta: f64,
}

impl MotionCommand {
    /// Create a command.
    #[must_use]
    pub const fn new(instrument: InstrumentId, insertion_delta: f64, rotation_delta: f64) -> Self {
        Self {
            instrument,
            insertion_delta,
            rotation_delta,
        }
    }

    /// Insert by `distance`.
    #[must_use]
    pub const fn insert(instrument: InstrumentId, distance: f64) -> Self {
        Self::new(instrument, distance, 0.0)
    }

    /// Retract by `distance`.
    #[must_use]
    pub const fn retract(instrument: InstrumentId, distance: f64) -> Self {
        Self::new(instrument, -distance, 0.0)
    }

    /// Rotate by `angle` radians.
    #[must_use]
    pub const fn rotate(instrument: InstrumentId, angle: f64) -> Self {
        Self::new(instrument, 0.0, angle)
    }
}

/// Discrete operator input, one key press each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NavigationInput {
    /// Insert one instrument by the distance increment.
    Insert(InstrumentId),
    /// Retract one instrument by the distance increment.
    Retract(InstrumentId),
    /// Rotate one instrument by `+increment_angle`.
    RotatePositive(InstrumentId),
    /// Rotate one instrument by `-increment_angle`.
    RotateNegative(InstrumentId),
    /// Insert every instrument together.
    InsertAll,
    /// Retract every instrument together.
    RetractAll,
    /// Rotate every instrument by `+increment_angle`.
    RotateAllPositive,
    /// Rotate every instrument by `-increment_angle`.
    RotateAllNegative,
}

impl NavigationInput {
    /// Expand into motion commands for `instrument_count` instruments.
    #[must_use]
    pub fn to_commands(
        self,
        config: &NavigationConfig,
        instrument_count: usize,
    ) -> Vec<MotionCommand> {
        let distance = config.increment_distance;
        let angle = config.increment_angle;
        let all = |make: fn(InstrumentId, f64) -> MotionCommand, amount: f64| {
            (0..instrument_count)
                .map(|i| make(InstrumentId::new(i), amount))
                .collect::<Vec<_>>()
        };
        match self {
            Self::Insert(id) => vec![MotionCommand::insert(id, distance)],
            Self::Retract(id) => vec![MotionCommand::retract(id, distance)],
            Self::RotatePositive(id) => vec![MotionCommand::rotate(id, angle)],
            Self::RotateNegative(id) => vec![MotionCommand::rotate(id, -angle)],
            Self::InsertAll => all(MotionCommand::insert, distance),
            Self::RetractAll => all(MotionCommand::retract, distance),
            Self::RotateAllPositive => all(MotionCommand::rotate, angle),
            Self::RotateAllNegative => all(MotionCommand::rotate, -angle),
        }
    }
}

/// Commands applied at one step.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoggedStep {
    /// Step index.
    pub step: u64,
    /// Commands fed to the controller, in order.
    pub commands: Vec<MotionCommand>,
}

/// In-memory record of every step's commands.
///
/// Replaying a log through a controller built from the same configuration
/// reproduces the same instrument states.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CommandLog {
    steps: Vec<LoggedStep>,
}

impl CommandLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the commands of `step`. Steps without commands are not stored.
    ///
    /// Steps must be recorded in increasing order.
    pub fn record(&mut self, step: u64, commands: &[MotionCommand]) {
        if commands.is_empty() {
            return;
        }
        self.steps.push(LoggedStep {
            step,
            commands: commands.to_vec(),
        });
    }

    /// Commands recorded at `step` (empty if none).
    #[must_use]
    pub fn commands_at(&self, step: u64) -> &[MotionCommand] {
        match self.steps.binary_search_by_key(&step, |s| s.step) {
            Ok(i) => &self.steps[i].commands,
            Err(_) => &[],
        }
    }

    /// Recorded steps in order.
    #[must_use]
    pub fn steps(&self) -> &[LoggedStep] {
        &self.steps
    }

    /// Index of the last recorded step.
    #[must_use]
    pub fn last_step(&self) -> Option<u64> {
        self.steps.last().map(|s| s.step)
    }

    /// Number of recorded steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.steps.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_key_expansion() {
        let config = NavigationConfig::default().increments(2.0, 0.1);
        let id = InstrumentId::new(1);
        assert_eq!(
            NavigationInput::Retract(id).to_commands(&config, 3),
            vec![MotionCommand::new(id, -2.0, 0.0)]
        );
        let all = NavigationInput::RotateAllNegative.to_commands(&config, 3);
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|c| c.rotation_delta == -0.1 && c.insertion_delta == 0.0));
        assert_eq!(all[2].instrument, InstrumentId::new(2));
        assert!(NavigationInput::InsertAll.to_commands(&config, 0).is_empty());
    }

    #[test]
    fn test_log_lookup() {
        let id = InstrumentId::new(0);
        let mut log = CommandLog::new();
        log.record(0, &[MotionCommand::insert(id, 1.0)]);
        log.record(1, &[]);
        log.record(4, &[MotionCommand::rotate(id, 0.2), MotionCommand::insert(id, 0.5)]);
        assert_eq!(log.len(), 2);
        assert_eq!(log.commands_at(4).len(), 2);
        assert!(log.commands_at(1).is_empty());
        assert_eq!(log.last_step(), Some(4));
    }
}
