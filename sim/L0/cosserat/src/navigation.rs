//! Per-step navigation of every instrument.
//!
//! # Step phases
//!
//! 1. Validate and aggregate the step's [`MotionCommand`]s per instrument.
//!    Unknown instruments and non-finite deltas are reported and skipped.
//! 2. Apply rotation and insertion to each instrument independently. Targets
//!    are adjusted per [`SnapPolicy`]; targets past either end of travel are
//!    clamped and reported.
//! 3. Recompute the output frames of every initialized instrument.
//! 4. Refresh the coaxial links.
//!
//! Phases 3 and 4 only start once every instrument has been updated, so no
//! mapping ever reads a half-updated arena. A failure on one instrument is
//! recorded in the [`StepReport`] and never stops the others.

use tracing::{debug, warn};

use crate::coaxial::CoaxialCouplingManager;
use crate::command::{CommandLog, MotionCommand, NavigationInput};
use crate::config::{CouplingConfig, NavigationConfig, SnapPolicy};
use crate::error::{CosseratError, Result};
use crate::instrument::{Instrument, InstrumentArena};
use crate::report::{InstrumentStep, MotionState, StepChanges, StepReport};
use crate::types::InstrumentId;

/// Summed motion for one instrument.
#[derive(Debug, Clone, Copy, Default)]
struct PendingMotion {
    insertion: f64,
    rotation: f64,
    commanded: bool,
}

/// Moves the instruments of an arena from step to step.
#[derive(Debug, Clone, Default)]
pub struct NavigationController {
    config: NavigationConfig,
    couplings: CoaxialCouplingManager,
    log: CommandLog,
    step_index: u64,
    pending: Vec<PendingMotion>,
}

impl NavigationController {
    /// Create a controller.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`](crate::CosseratError::InvalidConfig) if
    /// `config` does not validate.
    pub fn new(config: NavigationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Default::default()
        })
    }

    /// Controller configuration.
    #[must_use]
    pub const fn config(&self) -> &NavigationConfig {
        &self.config
    }

    /// Index of the next step.
    #[must_use]
    pub const fn current_step(&self) -> u64 {
        self.step_index
    }

    /// Coaxial links driven by this controller.
    #[must_use]
    pub const fn couplings(&self) -> &CoaxialCouplingManager {
        &self.couplings
    }

    /// Commands recorded so far (empty unless recording is enabled).
    #[must_use]
    pub const fn command_log(&self) -> &CommandLog {
        &self.log
    }

    /// Couple `a` and `b` coaxially. Returns the link index.
    ///
    /// # Errors
    ///
    /// Same as [`CoaxialLink::build`](crate::CoaxialLink::build).
    pub fn couple(
        &mut self,
        arena: &InstrumentArena,
        a: InstrumentId,
        b: InstrumentId,
        config: CouplingConfig,
    ) -> Result<usize> {
        self.couplings.add_link(arena, a, b, config)
    }

    /// Run one step with key-driven input.
    pub fn step_input(
        &mut self,
        arena: &mut InstrumentArena,
        inputs: &[NavigationInput],
    ) -> StepReport {
        let commands: Vec<MotionCommand> = inputs
            .iter()
            .flat_map(|input| input.to_commands(&self.config, arena.len()))
            .collect();
        self.step(arena, &commands)
    }

    /// Run one step.
    ///
    /// The resulting state is a pure function of the arena before the step
    /// and `commands`.
    pub fn step(&mut self, arena: &mut InstrumentArena, commands: &[MotionCommand]) -> StepReport {
        let mut report = StepReport::new(self.step_index);
        if self.config.record_commands {
            self.log.record(self.step_index, commands);
        }

        self.aggregate(arena, commands, &mut report);

        for (index, instrument) in arena.iter_mut().enumerate() {
            if !instrument.is_initialized() {
                continue;
            }
            let pending = self.pending.get(index).copied().unwrap_or_default();
            let outcome = apply_motion(&self.config, instrument, pending, &mut report);
            report.instruments.push(outcome);
        }

        for instrument in arena.iter_mut().filter(|i| i.is_initialized()) {
            if let Err(err) = instrument.refresh_frames() {
                warn!(instrument = %instrument.id(), error = %err, "frame refresh failed");
                report.push_error(err);
            }
        }

        self.couplings.refresh(arena, &mut report);

        debug!(
            step = self.step_index,
            instruments = report.instruments.len(),
            constraints = report.constraint_count(),
            "navigation step done"
        );
        self.step_index += 1;
        report
    }

    /// Re-run every step of `log` on `arena`, starting at this controller's
    /// current step. Steps absent from the log run with no commands.
    pub fn replay(&mut self, arena: &mut InstrumentArena, log: &CommandLog) -> Vec<StepReport> {
        let Some(last) = log.last_step() else {
            return Vec::new();
        };
        let mut reports = Vec::new();
        while self.step_index <= last {
            let commands = log.commands_at(self.step_index);
            reports.push(self.step(arena, commands));
        }
        reports
    }

    fn aggregate(
        &mut self,
        arena: &InstrumentArena,
        commands: &[MotionCommand],
        report: &mut StepReport,
    ) {
        self.pending.clear();
        self.pending.resize(arena.len(), PendingMotion::default());

        for command in commands {
            if let Err(err) = arena.resolve(command.instrument) {
                warn!(error = %err, "command skipped");
                report.push_error(err);
                continue;
            }
            if !command.insertion_delta.is_finite() || !command.rotation_delta.is_finite() {
                let err = CosseratError::InvalidCommand {
                    instrument: command.instrument,
                    reason: "motion delta is not finite",
                };
                warn!(error = %err, "command rejected");
                report.push_error(err);
                continue;
            }
            let pending = &mut self.pending[command.instrument.index()];
            pending.insertion += command.insertion_delta;
            pending.rotation += command.rotation_delta;
            pending.commanded = true;
        }
    }
}

/// Apply one instrument's summed motion.
fn apply_motion(
    config: &NavigationConfig,
    instrument: &mut Instrument,
    pending: PendingMotion,
    report: &mut StepReport,
) -> InstrumentStep {
    let mut changes = StepChanges::empty();
    let mut state = MotionState::Idle;

    if pending.commanded && pending.rotation.abs() >= config.angle_tolerance {
        instrument.rotate(pending.rotation);
        changes |= StepChanges::ROTATED;
        state = MotionState::Rotating;
    }

    let target = if pending.commanded && pending.insertion != 0.0 {
        insertion_target(
            config,
            instrument.deployed_length(),
            pending.insertion,
            instrument.nominal_boundaries(),
            instrument.total_length(),
        )
    } else {
        None
    };

    if let Some(target) = target {
        if target != instrument.deployed_length() + pending.insertion {
            changes |= StepChanges::SNAPPED;
        }

        match instrument.set_deployed_length(target) {
            Ok(travel) => {
                if let Some(condition) = travel.limit_condition(instrument.id()) {
                    warn!(error = %condition, "deployment clamped");
                    report.push_error(condition);
                    changes |= StepChanges::CLAMPED;
                }
                if travel.resegmented {
                    changes |= StepChanges::RESEGMENTED;
                }
                if travel.delta() > 0.0 {
                    changes |= StepChanges::DEPLOYED;
                    state = MotionState::Deploying;
                } else if travel.delta() < 0.0 {
                    changes |= StepChanges::RETRACTED;
                    state = MotionState::Retracting;
                }
            }
            Err(err) => {
                warn!(instrument = %instrument.id(), error = %err, "insertion failed");
                report.push_error(err);
            }
        }
    }

    InstrumentStep {
        instrument: instrument.id(),
        state,
        changes,
        deployed: instrument.deployed_length(),
        active: instrument.active_count(),
    }
}

/// Deployed length to move to for an insertion of `delta`, or `None` when
/// the policy drops the command.
///
/// Targets outside `[0, total]` are returned unchanged so the instrument
/// clamps them and reports the limit.
fn insertion_target(
    config: &NavigationConfig,
    current: f64,
    delta: f64,
    boundaries: &[f64],
    total: f64,
) -> Option<f64> {
    let raw = current + delta;
    if !(0.0..=total).contains(&raw) {
        return Some(raw);
    }

    let tol = config.curv_abs_tolerance;
    let target = if delta.abs() < tol {
        match config.snap_policy {
            SnapPolicy::Deadband => return None,
            SnapPolicy::Disabled => raw,
            SnapPolicy::TowardExistingBoundary | SnapPolicy::Grid => {
                round_to_grid(raw, tol, current, boundaries)
            }
        }
    } else {
        snap_target(config.snap_policy, current, raw, boundaries, tol)
    };
    Some(target.clamp(0.0, total))
}

/// Adjust an insertion target according to `policy`.
///
/// `boundaries` must be sorted. A target within `tolerance` of a boundary
/// moves onto it; with [`SnapPolicy::Grid`] any other target is rounded to the
/// tolerance grid by [`round_to_grid`].
#[must_use]
pub fn snap_target(
    policy: SnapPolicy,
    current: f64,
    target: f64,
    boundaries: &[f64],
    tolerance: f64,
) -> f64 {
    if policy == SnapPolicy::Disabled {
        return target;
    }

    let upper = boundaries.partition_point(|&b| b < target);
    let nearest = [upper.checked_sub(1), Some(upper)]
        .into_iter()
        .flatten()
        .filter_map(|i| boundaries.get(i).copied())
        .min_by(|x, y| (x - target).abs().total_cmp(&(y - target).abs()));
    if let Some(boundary) = nearest {
        if (boundary - target).abs() <= tolerance {
            return boundary;
        }
    }

    match policy {
        SnapPolicy::Grid => round_to_grid(target, tolerance, current, boundaries),
        _ => target,
    }
}

/// Round `value` to the nearest multiple of `tolerance`.
///
/// An exact tie goes to the candidate closer to an existing boundary: the
/// current tip `current` or one of `boundaries`. Remaining ties go down.
#[must_use]
pub fn round_to_grid(value: f64, tolerance: f64, current: f64, boundaries: &[f64]) -> f64 {
    let lower = (value / tolerance).floor() * tolerance;
    let upper = lower + tolerance;
    let below = value - lower;
    let above = upper - value;
    if below < above {
        return lower;
    }
    if above < below {
        return upper;
    }

    let distance = |candidate: f64| {
        boundaries
            .iter()
            .fold((candidate - current).abs(), |d, &b| d.min((candidate - b).abs()))
    };
    if distance(upper) < distance(lower) {
        upper
    } else {
        lower
    }
}

/// Convenience check used by hosts before stepping.
///
/// # Errors
///
/// Returns the first
/// [`InvalidInstrumentReference`](crate::CosseratError::InvalidInstrumentReference)
/// among `commands`.
pub fn validate_commands(arena: &InstrumentArena, commands: &[MotionCommand]) -> Result<()> {
    for command in commands {
        arena.resolve(command.instrument)?;
    }
    Ok(())
}
