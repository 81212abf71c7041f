//! Coaxial coupling between instruments that share a centerline.
//!
//! A [`CoaxialLink`] samples both instruments at the same abscissae inside
//! their deployed overlap `[0, min(deployed_a, deployed_b)]` and emits one
//! spring-like [`CouplingConstraint`] per sample. The sample set is the union
//! of both instruments' active segment boundaries, merged within the
//! curvilinear tolerance, with `k` evenly spaced points added per interval:
//!
//! ```text
//! instrument a:  0-----3.75-----7.5-----9.0
//! instrument b:  0---------5.0---------7.0            overlap = 7.0
//! nodes:         0-----3.75--5.0-------7.0
//! k = 1:         0--x--3.75x-5.0---x---7.0            7 samples
//! ```
//!
//! The link also declares which generalized-coordinate blocks the host must
//! couple in its system matrix: every pair among
//! `{strain_a, base_a, strain_b, base_b}`.

use nalgebra::Vector3;
use smallvec::SmallVec;
use tracing::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::CouplingConfig;
use crate::error::{CosseratError, Result};
use crate::instrument::{Instrument, InstrumentArena};
use crate::report::{LinkStep, StepReport};
use crate::types::{FrameSample, InstrumentId};

/// Coordinates per rigid base (three translations, three rotations).
pub const BASE_DOFS: usize = 6;

/// Kind of generalized-coordinate block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DofKind {
    /// The `3 · max_beam_segments` strain coordinates.
    Strain,
    /// The rigid base pose.
    Base,
}

/// One block of generalized coordinates owned by an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DofBlock {
    /// Owning instrument.
    pub instrument: InstrumentId,
    /// Strain or base.
    pub kind: DofKind,
    /// Number of scalar coordinates in the block.
    pub size: usize,
}

impl DofBlock {
    /// Strain block of `instrument`.
    #[must_use]
    pub fn strain(instrument: &Instrument) -> Self {
        Self {
            instrument: instrument.id(),
            kind: DofKind::Strain,
            size: 3 * instrument.max_beam_segments(),
        }
    }

    /// Base block of `instrument`.
    #[must_use]
    pub fn base(instrument: &Instrument) -> Self {
        Self {
            instrument: instrument.id(),
            kind: DofKind::Base,
            size: BASE_DOFS,
        }
    }
}

/// A pair of coordinate blocks the host must couple in its system matrix.
///
/// A `skip_*_diagonal` flag is set when that block's diagonal term is already
/// assembled by an earlier entry of the same link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CouplingEntry {
    /// First block.
    pub first: DofBlock,
    /// Second block.
    pub second: DofBlock,
    /// The first block's diagonal is already assembled.
    pub skip_first_diagonal: bool,
    /// The second block's diagonal is already assembled.
    pub skip_second_diagonal: bool,
}

/// Spring-like constraint tying two coaxial frames together.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CouplingConstraint {
    /// Index into the first instrument's coaxial frames.
    pub frame_a: usize,
    /// Index into the second instrument's coaxial frames.
    pub frame_b: usize,
    /// Shared abscissa.
    pub abscissa: f64,
    /// Linear stiffness.
    pub stiffness: f64,
    /// Angular stiffness.
    pub angular_stiffness: f64,
    /// Constrained directions `[tx, ty, tz, rx, ry, rz]` in frame `a`.
    pub active_directions: [bool; 6],
    /// Position of frame `b` expressed in frame `a`.
    pub offset: Vector3<f64>,
    /// Rotation angle between the two frames.
    pub angle: f64,
}

/// Coupling between two instruments.
#[derive(Debug, Clone)]
pub struct CoaxialLink {
    a: InstrumentId,
    b: InstrumentId,
    config: CouplingConfig,
    entries: SmallVec<[CouplingEntry; 6]>,
    nodes: Vec<f64>,
    abscissae: Vec<f64>,
    frames_a: Vec<FrameSample>,
    frames_b: Vec<FrameSample>,
    constraints: Vec<CouplingConstraint>,
    revisions: Option<(u64, u64)>,
}

impl CoaxialLink {
    /// Create a link between `a` and `b` and sample it once.
    ///
    /// # Errors
    ///
    /// - [`CosseratError::InvalidConfig`] if `config` does not validate.
    /// - [`CosseratError::InvalidInstrumentReference`] if either id is unknown
    ///   or uninitialized, or if `a == b`.
    pub fn build(
        arena: &InstrumentArena,
        a: InstrumentId,
        b: InstrumentId,
        config: CouplingConfig,
    ) -> Result<Self> {
        config.validate()?;
        if a == b {
            return Err(CosseratError::invalid_reference(
                b,
                "instrument cannot be coupled to itself",
            ));
        }
        let inst_a = arena.resolve(a)?;
        let inst_b = arena.resolve(b)?;

        let max_nodes = inst_a.max_beam_segments() + inst_b.max_beam_segments() + 1;
        let max_samples = (config.intermediate_frames + 1) * max_nodes + 1;

        let mut link = Self {
            a,
            b,
            entries: coupling_entries(inst_a, inst_b),
            config,
            nodes: Vec::with_capacity(max_nodes),
            abscissae: Vec::with_capacity(max_samples),
            frames_a: Vec::with_capacity(max_samples),
            frames_b: Vec::with_capacity(max_samples),
            constraints: Vec::with_capacity(max_samples),
            revisions: None,
        };
        link.refresh(arena)?;
        info!(
            a = %a,
            b = %b,
            constraints = link.constraints.len(),
            "coaxial link created"
        );
        Ok(link)
    }

    /// Bring the link up to date with the instruments.
    ///
    /// The sample set is rebuilt when either instrument's segmentation changed
    /// since the last refresh; otherwise only the frame poses are recomputed.
    /// Returns whether the sample set was rebuilt.
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::InvalidInstrumentReference`] if an instrument
    /// is gone, or a mapping error. The link is emptied on error and fully
    /// resampled on the next successful refresh.
    pub fn refresh(&mut self, arena: &InstrumentArena) -> Result<bool> {
        let result = self.try_refresh(arena);
        if result.is_err() {
            self.clear();
        }
        result
    }

    fn try_refresh(&mut self, arena: &InstrumentArena) -> Result<bool> {
        let inst_a = arena.resolve(self.a)?;
        let inst_b = arena.resolve(self.b)?;
        let revisions = (inst_a.revision(), inst_b.revision());
        let resample = self.revisions != Some(revisions);

        if resample {
            self.resample(inst_a, inst_b);
            debug!(
                a = %self.a,
                b = %self.b,
                samples = self.abscissae.len(),
                "coaxial samples rebuilt"
            );
        }

        inst_a.map_into(&self.abscissae, &mut self.frames_a)?;
        inst_b.map_into(&self.abscissae, &mut self.frames_b)?;
        self.update_constraints();
        self.revisions = Some(revisions);
        Ok(resample)
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.abscissae.clear();
        self.frames_a.clear();
        self.frames_b.clear();
        self.constraints.clear();
        self.revisions = None;
    }

    fn resample(&mut self, inst_a: &Instrument, inst_b: &Instrument) {
        let tol = self.config.curv_abs_tolerance;
        let overlap = inst_a.deployed_length().min(inst_b.deployed_length());

        self.nodes.clear();
        self.abscissae.clear();
        if overlap <= 0.0 {
            return;
        }

        // Interior boundaries of both instruments, merged within tolerance.
        self.nodes.push(0.0);
        self.nodes.extend(
            inst_a
                .active_boundaries()
                .iter()
                .chain(inst_b.active_boundaries())
                .copied()
                .filter(|&s| s > tol && s < overlap - tol),
        );
        self.nodes.sort_by(f64::total_cmp);
        let mut last = f64::NEG_INFINITY;
        self.nodes.retain(|&s| {
            let keep = s - last > tol;
            if keep {
                last = s;
            }
            keep
        });
        if overlap > tol {
            self.nodes.push(overlap);
        }

        let k = self.config.intermediate_frames;
        for w in self.nodes.windows(2) {
            let (start, end) = (w[0], w[1]);
            self.abscissae.push(start);
            let step = (end - start) / (k + 1) as f64;
            for j in 1..=k {
                self.abscissae.push(start + step * j as f64);
            }
        }
        if let Some(&end) = self.nodes.last() {
            self.abscissae.push(end);
        }
    }

    fn update_constraints(&mut self) {
        self.constraints.clear();
        for (i, (fa, fb)) in self.frames_a.iter().zip(&self.frames_b).enumerate() {
            self.constraints.push(CouplingConstraint {
                frame_a: i,
                frame_b: i,
                abscissa: fa.abscissa,
                stiffness: self.config.stiffness,
                angular_stiffness: self.config.angular_stiffness,
                active_directions: self.config.active_directions,
                offset: fa.pose.inverse_transform_point(&fb.position()).coords,
                angle: fa.pose.rotation.angle_to(&fb.pose.rotation),
            });
        }
    }

    /// The two coupled instruments.
    #[must_use]
    pub const fn instruments(&self) -> (InstrumentId, InstrumentId) {
        (self.a, self.b)
    }

    /// Check if the link references `instrument`.
    #[must_use]
    pub fn involves(&self, instrument: InstrumentId) -> bool {
        self.a == instrument || self.b == instrument
    }

    /// Link configuration.
    #[must_use]
    pub const fn config(&self) -> &CouplingConfig {
        &self.config
    }

    /// Shared sample abscissae.
    #[must_use]
    pub fn abscissae(&self) -> &[f64] {
        &self.abscissae
    }

    /// Coaxial frames on the first instrument.
    #[must_use]
    pub fn frames_a(&self) -> &[FrameSample] {
        &self.frames_a
    }

    /// Coaxial frames on the second instrument.
    #[must_use]
    pub fn frames_b(&self) -> &[FrameSample] {
        &self.frames_b
    }

    /// Coupling constraints, one per sample.
    #[must_use]
    pub fn constraints(&self) -> &[CouplingConstraint] {
        &self.constraints
    }

    /// Coordinate-block pairs to couple in the host matrix.
    #[must_use]
    pub fn entries(&self) -> &[CouplingEntry] {
        &self.entries
    }

    /// Check if the instruments do not overlap.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// All six block pairs over `[strain_a, base_a, strain_b, base_b]`.
fn coupling_entries(a: &Instrument, b: &Instrument) -> SmallVec<[CouplingEntry; 6]> {
    let blocks = [
        DofBlock::strain(a),
        DofBlock::base(a),
        DofBlock::strain(b),
        DofBlock::base(b),
    ];
    let mut assembled = [false; 4];
    let mut entries = SmallVec::new();
    for i in 0..blocks.len() {
        for j in (i + 1)..blocks.len() {
            entries.push(CouplingEntry {
                first: blocks[i],
                second: blocks[j],
                skip_first_diagonal: assembled[i],
                skip_second_diagonal: assembled[j],
            });
            assembled[i] = true;
            assembled[j] = true;
        }
    }
    entries
}

/// Owner of every coaxial link.
#[derive(Debug, Clone, Default)]
pub struct CoaxialCouplingManager {
    links: Vec<CoaxialLink>,
}

impl CoaxialCouplingManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and register a link. Returns its index.
    ///
    /// # Errors
    ///
    /// Same as [`CoaxialLink::build`].
    pub fn add_link(
        &mut self,
        arena: &InstrumentArena,
        a: InstrumentId,
        b: InstrumentId,
        config: CouplingConfig,
    ) -> Result<usize> {
        let link = CoaxialLink::build(arena, a, b, config)?;
        self.links.push(link);
        Ok(self.links.len() - 1)
    }

    /// Refresh every link, recording outcomes and isolated failures in `report`.
    pub fn refresh(&mut self, arena: &InstrumentArena, report: &mut StepReport) {
        for (index, link) in self.links.iter_mut().enumerate() {
            match link.refresh(arena) {
                Ok(resampled) => report.links.push(LinkStep {
                    link: index,
                    resampled,
                    constraints: link.constraints.len(),
                }),
                Err(err) => {
                    warn!(link = index, error = %err, "coaxial link refresh failed");
                    report.links.push(LinkStep {
                        link: index,
                        resampled: false,
                        constraints: 0,
                    });
                    report.push_error(err);
                }
            }
        }
    }

    /// Link by index.
    #[must_use]
    pub fn link(&self, index: usize) -> Option<&CoaxialLink> {
        self.links.get(index)
    }

    /// All links.
    #[must_use]
    pub fn links(&self) -> &[CoaxialLink] {
        &self.links
    }

    /// Number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Check if there are no links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Total coupling constraints over every link.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.links.iter().map(|l| l.constraints.len()).sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::config::InstrumentConfig;
    use crate::types::Pose;
    use approx::assert_relative_eq;

    fn arena() -> (InstrumentArena, InstrumentId, InstrumentId) {
        let mut arena = InstrumentArena::new();
        let a = arena
            .add(InstrumentConfig::new(15.0, 4), Pose::identity())
            .unwrap();
        let b = arena
            .add(InstrumentConfig::new(10.0, 2), Pose::identity())
            .unwrap();
        (arena, a, b)
    }

    #[test]
    fn test_empty_overlap_has_no_constraints() {
        let (mut arena, a, b) = arena();
        arena.get_mut(a).unwrap().deploy(9.0).unwrap();
        let link = CoaxialLink::build(&arena, a, b, CouplingConfig::default()).unwrap();
        assert!(link.is_empty());
        assert!(link.frames_a().is_empty());
        assert!(link.frames_b().is_empty());
        assert_eq!(link.entries().len(), 6);
    }

    #[test]
    fn test_union_of_boundaries() {
        let (mut arena, a, b) = arena();
        arena.get_mut(a).unwrap().deploy(9.0).unwrap();
        arena.get_mut(b).unwrap().deploy(7.0).unwrap();
        let config = CouplingConfig::default().intermediate_frames(0);
        let link = CoaxialLink::build(&arena, a, b, config).unwrap();
        assert_eq!(link.abscissae(), &[0.0, 3.75, 5.0, 7.0]);
        assert_eq!(link.constraints().len(), 4);
    }

    #[test]
    fn test_intermediate_frames() {
        let (mut arena, a, b) = arena();
        arena.get_mut(a).unwrap().deploy(9.0).unwrap();
        arena.get_mut(b).unwrap().deploy(7.0).unwrap();
        let link = CoaxialLink::build(&arena, a, b, CouplingConfig::default()).unwrap();
        let abscissae = link.abscissae();
        assert_eq!(abscissae.len(), 7);
        assert_relative_eq!(abscissae[1], 1.875);
        assert_relative_eq!(abscissae[3], 4.375);
        assert_eq!(*abscissae.last().unwrap(), 7.0);
        assert_eq!(link.frames_a().len(), link.constraints().len());
    }

    #[test]
    fn test_coincident_boundaries_merge() {
        let mut arena = InstrumentArena::new();
        let a = arena.add(InstrumentConfig::new(10.0, 2), Pose::identity()).unwrap();
        let b = arena.add(InstrumentConfig::new(20.0, 4), Pose::identity()).unwrap();
        arena.get_mut(a).unwrap().deploy(10.0).unwrap();
        arena.get_mut(b).unwrap().deploy(10.0).unwrap();
        let config = CouplingConfig::default().intermediate_frames(0);
        let link = CoaxialLink::build(&arena, a, b, config).unwrap();
        assert_eq!(link.abscissae(), &[0.0, 5.0, 10.0]);
    }

    #[test]
    fn test_straight_coaxial_frames_coincide() {
        let (mut arena, a, b) = arena();
        arena.get_mut(a).unwrap().deploy(9.0).unwrap();
        arena.get_mut(b).unwrap().deploy(7.0).unwrap();
        let link = CoaxialLink::build(&arena, a, b, CouplingConfig::default()).unwrap();
        for c in link.constraints() {
            assert_relative_eq!(c.offset.norm(), 0.0, epsilon = 1e-12);
            assert_eq!(c.frame_a, c.frame_b);
            assert!(!c.active_directions[0]);
        }
    }

    #[test]
    fn test_refresh_resamples_only_on_change() {
        let (mut arena, a, b) = arena();
        arena.get_mut(a).unwrap().deploy(9.0).unwrap();
        arena.get_mut(b).unwrap().deploy(7.0).unwrap();
        let mut link = CoaxialLink::build(&arena, a, b, CouplingConfig::default()).unwrap();
        assert!(!link.refresh(&arena).unwrap());
        arena.get_mut(a).unwrap().rotate(0.3);
        assert!(!link.refresh(&arena).unwrap());
        arena.get_mut(b).unwrap().retract(7.0).unwrap();
        assert!(link.refresh(&arena).unwrap());
        assert!(link.is_empty());
    }

    #[test]
    fn test_entries_assemble_each_diagonal_once() {
        let (arena, a, b) = arena();
        let link = CoaxialLink::build(&arena, a, b, CouplingConfig::default()).unwrap();
        let entries = link.entries();
        assert!(!entries[0].skip_first_diagonal && !entries[0].skip_second_diagonal);
        assert_eq!(entries[0].first.size, 12);
        assert_eq!(entries[0].second.size, BASE_DOFS);
        assert_eq!(entries[2].second.size, 6);
        let assembled: usize = entries
            .iter()
            .map(|e| usize::from(!e.skip_first_diagonal) + usize::from(!e.skip_second_diagonal))
            .sum();
        assert_eq!(assembled, 4);
    }

    #[test]
    fn test_self_link_rejected() {
        let (arena, a, _) = arena();
        let err = CoaxialLink::build(&arena, a, a, CouplingConfig::default()).unwrap_err();
        assert!(err.is_invalid_reference());
    }
}
