//! Instrument state and the arena that owns every instrument.
//!
//! An [`Instrument`] is a rod of fixed `total_length` split into
//! `max_beam_segments` nominal segments. Deploying it activates the segments
//! covering `[0, deployed]`:
//!
//! ```text
//! nominal:  0      3.75     7.5     11.25     15
//!           |-------|-------|--------|--------|
//! deployed = 9.0:
//!           |=======|=======|==|                 active 3, tip length 1.5
//! ```
//!
//! Interior active segments keep their nominal length and the tip segment
//! carries the remainder. A remainder within `curv_abs_tolerance` of a nominal
//! boundary is folded into the previous segment, so no segment is ever
//! shorter than the tolerance unless the whole deployment is.

use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{InstrumentConfig, RestStrain};
use crate::error::{CosseratError, Result, TravelLimit};
use crate::mapping::{compute_frames_into, uniform_abscissae_into};
use crate::segments::BeamSegmentStore;
use crate::types::{FrameSample, InstrumentId, Pose, Strain};

/// Result of changing an instrument's deployed length.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Travel {
    /// Deployed length before the change.
    pub previous: f64,
    /// Deployed length that was asked for.
    pub requested: f64,
    /// Deployed length actually applied.
    pub deployed: f64,
    /// Bound the request was clamped to, if any.
    pub limit: Option<TravelLimit>,
    /// Whether the active segment count changed.
    pub resegmented: bool,
}

impl Travel {
    /// The limit condition to report for `instrument`, if the request was clamped.
    #[must_use]
    pub fn limit_condition(&self, instrument: InstrumentId) -> Option<CosseratError> {
        self.limit.map(|limit| CosseratError::DeploymentLimitReached {
            instrument,
            limit,
            requested: self.requested,
            clamped: self.deployed,
        })
    }

    /// Signed change in deployed length.
    #[must_use]
    pub fn delta(&self) -> f64 {
        self.deployed - self.previous
    }
}

/// One insertable rod.
#[derive(Debug, Clone)]
pub struct Instrument {
    id: InstrumentId,
    config: InstrumentConfig,
    nominal: Vec<f64>,
    store: BeamSegmentStore,
    base: Pose,
    deployed: f64,
    initialized: bool,
    revision: u64,
    layout: Vec<f64>,
    frame_abscissae: Vec<f64>,
    frames: Vec<FrameSample>,
}

impl Instrument {
    /// Create an uninitialized instrument with every segment in stock.
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::InvalidConfig`] if `config` does not validate.
    pub fn new(id: InstrumentId, config: InstrumentConfig) -> Result<Self> {
        config.validate()?;
        let nominal = config.nominal_boundaries()?;
        let max = config.max_beam_segments;

        let mut store = BeamSegmentStore::new(max, config.section, config.material);
        if let Some(materials) = &config.segment_materials {
            store.set_materials(materials)?;
        }
        match &config.rest_strain {
            RestStrain::Constant(rest) => store.set_uniform_rest_strain(*rest),
            RestStrain::PerSegment(rest) => store.set_rest_strains(rest)?,
        }

        let nb_frames = config.nb_frames;
        Ok(Self {
            id,
            config,
            nominal,
            store,
            base: Pose::identity(),
            deployed: 0.0,
            initialized: false,
            revision: 0,
            layout: Vec::with_capacity(max + 1),
            frame_abscissae: Vec::with_capacity(nb_frames + 1),
            frames: Vec::with_capacity(nb_frames + 1),
        })
    }

    /// Place the base and mark the instrument ready for commands.
    ///
    /// # Errors
    ///
    /// Propagates mapping errors from the initial frame computation.
    pub fn initialize(&mut self, base: Pose) -> Result<()> {
        self.base = base;
        self.initialized = true;
        self.refresh_frames()?;
        info!(
            instrument = %self.id,
            name = %self.config.name,
            total_length = self.config.total_length,
            segments = self.config.max_beam_segments,
            "instrument initialized"
        );
        Ok(())
    }

    /// Identifier inside the arena.
    #[must_use]
    pub const fn id(&self) -> InstrumentId {
        self.id
    }

    /// Name from the configuration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configuration the instrument was built from.
    #[must_use]
    pub const fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    /// Whether [`initialize`](Self::initialize) has been called.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Full length of the instrument.
    #[must_use]
    pub fn total_length(&self) -> f64 {
        self.config.total_length
    }

    /// Currently deployed length.
    #[must_use]
    pub const fn deployed_length(&self) -> f64 {
        self.deployed
    }

    /// Abscissa of the tip (last active boundary).
    #[must_use]
    pub fn current_tip_abscissa(&self) -> f64 {
        self.store.abscissae().total()
    }

    /// Nominal segment boundaries (`max + 1` values).
    #[must_use]
    pub fn nominal_boundaries(&self) -> &[f64] {
        &self.nominal
    }

    /// Boundaries of the active segments (`active + 1` values).
    #[must_use]
    pub fn active_boundaries(&self) -> &[f64] {
        self.store.abscissae().abscissae()
    }

    /// Segment store.
    #[must_use]
    pub const fn segments(&self) -> &BeamSegmentStore {
        &self.store
    }

    /// Number of deployed segments.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.store.active_count()
    }

    /// Number of segments in stock.
    #[must_use]
    pub fn stock_count(&self) -> usize {
        self.store.stock_count()
    }

    /// Segment indices currently in stock, to be held fixed by the host.
    #[must_use]
    pub fn stock_range(&self) -> std::ops::Range<usize> {
        self.store.stock_range()
    }

    /// Segment budget (active + stock).
    #[must_use]
    pub fn max_beam_segments(&self) -> usize {
        self.store.capacity()
    }

    /// Counter bumped every time the segmentation changes.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Base pose (pose at abscissa 0).
    #[must_use]
    pub const fn base_pose(&self) -> &Pose {
        &self.base
    }

    /// Replace the base pose with a host-integrated value.
    pub fn set_base_pose(&mut self, base: Pose) {
        self.base = base;
    }

    /// Replace the active strains with host-integrated values.
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::DimensionMismatch`] if `strains.len()` differs
    /// from the active count.
    pub fn sync_strain(&mut self, strains: &[Strain]) -> Result<()> {
        self.store.set_strains(strains)
    }

    /// Deploy by `delta` (negative values retract).
    ///
    /// # Errors
    ///
    /// Only fails if the segment layout cannot be applied, which leaves the
    /// instrument unchanged.
    pub fn deploy(&mut self, delta: f64) -> Result<Travel> {
        self.set_deployed_length(self.deployed + delta)
    }

    /// Retract by `delta`.
    ///
    /// # Errors
    ///
    /// Same as [`deploy`](Self::deploy).
    pub fn retract(&mut self, delta: f64) -> Result<Travel> {
        self.set_deployed_length(self.deployed - delta)
    }

    /// Move the tip to `target`, clamped to `[0, total_length]`.
    ///
    /// # Errors
    ///
    /// Same as [`deploy`](Self::deploy).
    pub fn set_deployed_length(&mut self, target: f64) -> Result<Travel> {
        let total = self.config.total_length;
        let (deployed, limit) = if target > total {
            (total, Some(TravelLimit::Deployed))
        } else if target < 0.0 {
            (0.0, Some(TravelLimit::Retracted))
        } else {
            (target, None)
        };

        let previous = self.deployed;
        let previous_active = self.store.active_count();
        self.fill_layout(deployed);
        self.store.apply_boundaries(&self.layout)?;
        self.deployed = deployed;

        let resegmented = self.store.active_count() != previous_active;
        if deployed != previous {
            self.revision += 1;
            debug!(
                instrument = %self.id,
                deployed,
                active = self.store.active_count(),
                "segment layout updated"
            );
        }

        Ok(Travel {
            previous,
            requested: target,
            deployed,
            limit,
            resegmented,
        })
    }

    /// Rotate the base about its local axial (x) axis.
    pub fn rotate(&mut self, angle: f64) {
        self.base = self.base.rotated_about_tangent(angle);
    }

    /// Recompute the `nb_frames + 1` output frames over `[0, deployed]`.
    ///
    /// # Errors
    ///
    /// Propagates mapping errors; the previous frames are kept on error.
    pub fn refresh_frames(&mut self) -> Result<()> {
        uniform_abscissae_into(
            self.current_tip_abscissa(),
            self.config.nb_frames,
            &mut self.frame_abscissae,
        );
        compute_frames_into(
            self.store.active_strains(),
            self.store.abscissae(),
            &self.base,
            &self.frame_abscissae,
            &mut self.frames,
        )
    }

    /// Map arbitrary abscissae on this instrument into `out`.
    ///
    /// # Errors
    ///
    /// Same as [`compute_frames_into`].
    pub fn map_into(&self, abscissae: &[f64], out: &mut Vec<FrameSample>) -> Result<()> {
        compute_frames_into(
            self.store.active_strains(),
            self.store.abscissae(),
            &self.base,
            abscissae,
            out,
        )
    }

    /// Output frames from the last refresh.
    #[must_use]
    pub fn frames(&self) -> &[FrameSample] {
        &self.frames
    }

    /// Output frames as `[x, y, z, qx, qy, qz, qw]` arrays.
    #[must_use]
    pub fn frame_arrays(&self) -> Vec<[f64; 7]> {
        self.frames.iter().map(|f| f.pose.to_array()).collect()
    }

    /// Pose of the tip frame from the last refresh.
    #[must_use]
    pub fn tip_pose(&self) -> Option<&Pose> {
        self.frames.last().map(|f| &f.pose)
    }

    /// Active boundaries for a deployed length of `deployed`: the nominal
    /// boundaries below the tip, then the tip itself.
    fn fill_layout(&mut self, deployed: f64) {
        self.layout.clear();
        self.layout.push(0.0);
        if deployed <= 0.0 {
            return;
        }
        let max = self.store.capacity();
        let tol = self.config.curv_abs_tolerance;
        let active = self.nominal[..max]
            .partition_point(|&b| b < deployed - tol)
            .max(1);
        self.layout.extend_from_slice(&self.nominal[1..active]);
        self.layout.push(deployed);
    }
}

/// Owner of every instrument, addressed by [`InstrumentId`].
#[derive(Debug, Clone, Default)]
pub struct InstrumentArena {
    instruments: Vec<Instrument>,
}

impl InstrumentArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instrument and initialize it at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::InvalidConfig`] if `config` does not validate.
    pub fn add(&mut self, config: InstrumentConfig, base: Pose) -> Result<InstrumentId> {
        let id = self.reserve(config)?;
        self.instruments[id.index()].initialize(base)?;
        Ok(id)
    }

    /// Add an instrument without initializing it.
    ///
    /// Commands addressed to it are rejected until
    /// [`Instrument::initialize`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::InvalidConfig`] if `config` does not validate.
    pub fn reserve(&mut self, config: InstrumentConfig) -> Result<InstrumentId> {
        let id = InstrumentId::new(self.instruments.len());
        self.instruments.push(Instrument::new(id, config)?);
        Ok(id)
    }

    /// Number of instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Check if the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Instrument by id, initialized or not.
    #[must_use]
    pub fn get(&self, id: InstrumentId) -> Option<&Instrument> {
        self.instruments.get(id.index())
    }

    /// Mutable instrument by id, initialized or not.
    #[must_use]
    pub fn get_mut(&mut self, id: InstrumentId) -> Option<&mut Instrument> {
        self.instruments.get_mut(id.index())
    }

    /// Initialized instrument by id.
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::InvalidInstrumentReference`] for an unknown or
    /// uninitialized id.
    pub fn resolve(&self, id: InstrumentId) -> Result<&Instrument> {
        match self.instruments.get(id.index()) {
            None => Err(CosseratError::invalid_reference(id, "no such instrument")),
            Some(instrument) if !instrument.is_initialized() => {
                Err(CosseratError::invalid_reference(id, "instrument not initialized"))
            }
            Some(instrument) => Ok(instrument),
        }
    }

    /// Mutable initialized instrument by id.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn resolve_mut(&mut self, id: InstrumentId) -> Result<&mut Instrument> {
        self.resolve(id)?;
        self.instruments
            .get_mut(id.index())
            .ok_or_else(|| CosseratError::invalid_reference(id, "no such instrument"))
    }

    /// Iterate over all instruments in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments.iter()
    }

    /// Iterate mutably over all instruments in id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Instrument> {
        self.instruments.iter_mut()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    fn instrument(total: f64, max: usize) -> Instrument {
        let config = InstrumentConfig::new(total, max);
        let mut instrument = Instrument::new(InstrumentId::new(0), config).unwrap();
        instrument.initialize(Pose::identity()).unwrap();
        instrument
    }

    #[test]
    fn test_new_instrument_is_retracted() {
        let inst = instrument(15.0, 4);
        assert_eq!(inst.deployed_length(), 0.0);
        assert_eq!(inst.active_count(), 0);
        assert_eq!(inst.stock_count(), 4);
        assert_eq!(inst.frames().len(), 11);
        assert!(inst.frames().iter().all(|f| f.pose == Pose::identity()));
    }

    #[test]
    fn test_deploy_splits_on_nominal_boundaries() {
        let mut inst = instrument(15.0, 4);
        let travel = inst.deploy(9.0).unwrap();
        assert!(travel.resegmented);
        assert_eq!(travel.limit, None);
        assert_eq!(inst.active_count(), 3);
        assert_eq!(inst.active_boundaries(), &[0.0, 3.75, 7.5, 9.0]);
        assert_eq!(inst.current_tip_abscissa(), 9.0);
        assert_eq!(inst.stock_range(), 3..4);
    }

    #[test]
    fn test_tip_within_tolerance_is_folded() {
        let mut inst = instrument(15.0, 4);
        inst.deploy(3.75 + 5.0e-5).unwrap();
        assert_eq!(inst.active_count(), 1);
        assert_relative_eq!(inst.current_tip_abscissa(), 3.75 + 5.0e-5);
    }

    #[test]
    fn test_over_deploy_clamps() {
        let mut inst = instrument(15.0, 4);
        let travel = inst.deploy(20.0).unwrap();
        assert_eq!(travel.limit, Some(TravelLimit::Deployed));
        assert_eq!(inst.deployed_length(), 15.0);
        assert_eq!(inst.active_count(), 4);
        let condition = travel.limit_condition(inst.id()).unwrap();
        assert!(condition.is_limit_reached());
    }

    #[test]
    fn test_over_retract_clamps() {
        let mut inst = instrument(15.0, 4);
        inst.deploy(5.0).unwrap();
        let travel = inst.retract(8.0).unwrap();
        assert_eq!(travel.limit, Some(TravelLimit::Retracted));
        assert_eq!(inst.deployed_length(), 0.0);
        assert_eq!(inst.active_count(), 0);
        assert_eq!(inst.stock_count(), 4);
        assert!(inst.segments().lengths().iter().all(|&l| l == 0.0));
    }

    #[test]
    fn test_deploy_then_retract_restores() {
        let mut inst = instrument(15.0, 4);
        inst.deploy(4.0).unwrap();
        let active = inst.active_count();
        inst.deploy(6.5).unwrap();
        inst.retract(6.5).unwrap();
        assert_relative_eq!(inst.deployed_length(), 4.0, epsilon = 1e-12);
        assert_eq!(inst.active_count(), active);
    }

    #[test]
    fn test_rotate_only_changes_base() {
        let mut inst = instrument(15.0, 4);
        inst.deploy(6.0).unwrap();
        let revision = inst.revision();
        inst.rotate(0.5);
        assert_eq!(inst.revision(), revision);
        assert_eq!(inst.deployed_length(), 6.0);
        assert_relative_eq!(inst.base_pose().rotation.angle(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_frames_follow_base_axis() {
        let mut inst = instrument(10.0, 2);
        inst.set_base_pose(Pose::from_position(Point3::new(1.0, 2.0, 3.0)));
        inst.deploy(10.0).unwrap();
        inst.refresh_frames().unwrap();
        let tip = inst.tip_pose().unwrap();
        assert_relative_eq!(tip.position, Point3::new(11.0, 2.0, 3.0), epsilon = 1e-12);
        assert_eq!(inst.frame_arrays()[0], [1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_rest_strain_on_deployed_segments() {
        let rest = Vector3::new(0.0, 0.0, 0.1);
        let config = InstrumentConfig::new(10.0, 2).with_rest_strain(rest);
        let mut inst = Instrument::new(InstrumentId::new(0), config).unwrap();
        inst.initialize(Pose::identity()).unwrap();
        inst.deploy(7.0).unwrap();
        assert_eq!(inst.segments().active_strains(), &[rest, rest]);
        assert!(inst.sync_strain(&[rest]).is_err());
    }

    #[test]
    fn test_arena_resolution() {
        let mut arena = InstrumentArena::new();
        let a = arena.add(InstrumentConfig::default(), Pose::identity()).unwrap();
        let b = arena.reserve(InstrumentConfig::default()).unwrap();
        assert!(arena.resolve(a).is_ok());
        assert!(arena.resolve(b).unwrap_err().is_invalid_reference());
        assert!(arena.resolve(InstrumentId::new(9)).is_err());
        arena.get_mut(b).unwrap().initialize(Pose::identity()).unwrap();
        assert!(arena.resolve_mut(b).is_ok());
        assert_eq!(arena.len(), 2);
    }
}
