//! Configuration types for instruments, navigation and coaxial coupling.
//!
//! All three are set once at scene build. [`InstrumentConfig::validate`],
//! [`NavigationConfig::validate`] and [`CouplingConfig::validate`] are called by
//! the constructors that consume them, so an invalid value never reaches the
//! per-step code.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CosseratError, Result};
use crate::material::{BeamMaterial, CrossSection};
use crate::types::Strain;

/// Default curvilinear tolerance for insertion commands and snapping.
pub const DEFAULT_CURV_ABS_TOLERANCE: f64 = 1.0e-4;

/// Rest (stress-free) strain of an instrument.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RestStrain {
    /// Same rest strain on every segment.
    Constant(Strain),
    /// One rest strain per segment (`max_beam_segments` values).
    PerSegment(Vec<Strain>),
}

impl Default for RestStrain {
    fn default() -> Self {
        Self::Constant(Strain::zeros())
    }
}

/// How the nominal segment boundaries are laid out along the instrument.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BeamDistribution {
    /// `max_beam_segments` segments of equal length.
    #[default]
    Uniform,
    /// The instrument is split at `key_points` into regions, each with its own
    /// uniform beam count.
    Regions {
        /// Interior split abscissae, strictly increasing inside `(0, total_length)`.
        key_points: Vec<f64>,
        /// Beam count per region (`key_points.len() + 1` values summing to
        /// `max_beam_segments`).
        beams: Vec<usize>,
    },
}

/// Configuration of one instrument.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InstrumentConfig {
    /// Human-readable name used in logs.
    pub name: String,
    /// Full length of the instrument.
    pub total_length: f64,
    /// Number of beam segments (active + stock).
    pub max_beam_segments: usize,
    /// Cross section shared by every segment.
    pub section: CrossSection,
    /// Material of every segment unless `segment_materials` is set.
    pub material: BeamMaterial,
    /// Optional per-segment materials (`max_beam_segments` values).
    pub segment_materials: Option<Vec<BeamMaterial>>,
    /// Rest strain.
    pub rest_strain: RestStrain,
    /// Nominal segment layout.
    pub distribution: BeamDistribution,
    /// Number of output frame intervals; `nb_frames + 1` frames are exposed.
    pub nb_frames: usize,
    /// Curvilinear tolerance below which the tip segment is merged.
    pub curv_abs_tolerance: f64,
    /// Linear stiffness of the spring holding the base pose.
    pub base_stiffness: f64,
    /// Angular stiffness of the spring holding the base pose.
    pub base_angular_stiffness: f64,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            name: String::from("instrument"),
            total_length: 15.0,
            max_beam_segments: 4,
            section: CrossSection::default(),
            material: BeamMaterial::default(),
            segment_materials: None,
            rest_strain: RestStrain::default(),
            distribution: BeamDistribution::Uniform,
            nb_frames: 10,
            curv_abs_tolerance: DEFAULT_CURV_ABS_TOLERANCE,
            base_stiffness: 5.0e8,
            base_angular_stiffness: 1.0e5,
        }
    }
}

impl InstrumentConfig {
    /// Create a configuration with the given length and segment budget.
    #[must_use]
    pub fn new(total_length: f64, max_beam_segments: usize) -> Self {
        Self {
            total_length,
            max_beam_segments,
            ..Default::default()
        }
    }

    /// Hollow polymer catheter (30 long, 5 segments, tube 0.5/0.4).
    #[must_use]
    pub fn catheter() -> Self {
        Self {
            name: String::from("catheter"),
            total_length: 30.0,
            max_beam_segments: 5,
            section: CrossSection::tube(0.5, 0.4),
            material: BeamMaterial::new(5.0e6, 0.42),
            nb_frames: 35,
            ..Default::default()
        }
    }

    /// Solid guidewire (25 long, 5 segments, radius 0.35).
    #[must_use]
    pub fn guidewire() -> Self {
        Self {
            name: String::from("guidewire"),
            total_length: 25.0,
            max_beam_segments: 5,
            section: CrossSection::circular(0.35),
            material: BeamMaterial::new(5.0e6, 0.42),
            nb_frames: 30,
            ..Default::default()
        }
    }

    /// Set the name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the cross section.
    #[must_use]
    pub fn section(mut self, section: CrossSection) -> Self {
        self.section = section;
        self
    }

    /// Set the material of every segment.
    #[must_use]
    pub fn material(mut self, material: BeamMaterial) -> Self {
        self.material = material;
        self
    }

    /// Use one material per segment.
    #[must_use]
    pub fn with_segment_materials(mut self, materials: Vec<BeamMaterial>) -> Self {
        self.segment_materials = Some(materials);
        self
    }

    /// Set a constant rest strain.
    #[must_use]
    pub fn with_rest_strain(mut self, rest: Strain) -> Self {
        self.rest_strain = RestStrain::Constant(rest);
        self
    }

    /// Set one rest strain per segment.
    #[must_use]
    pub fn with_segment_rest_strains(mut self, rest: Vec<Strain>) -> Self {
        self.rest_strain = RestStrain::PerSegment(rest);
        self
    }

    /// Split the instrument into regions with their own beam counts.
    #[must_use]
    pub fn with_regions(mut self, key_points: Vec<f64>, beams: Vec<usize>) -> Self {
        self.distribution = BeamDistribution::Regions { key_points, beams };
        self
    }

    /// Set the number of output frame intervals.
    #[must_use]
    pub fn nb_frames(mut self, nb_frames: usize) -> Self {
        self.nb_frames = nb_frames;
        self
    }

    /// Set the curvilinear tolerance.
    #[must_use]
    pub fn curv_abs_tolerance(mut self, tolerance: f64) -> Self {
        self.curv_abs_tolerance = tolerance;
        self
    }

    /// Set the base holding spring.
    #[must_use]
    pub fn base_spring(mut self, stiffness: f64, angular_stiffness: f64) -> Self {
        self.base_stiffness = stiffness;
        self.base_angular_stiffness = angular_stiffness;
        self
    }

    /// Nominal segment boundaries (`max_beam_segments + 1` values from 0 to
    /// `total_length`).
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::InvalidConfig`] if the beam distribution is
    /// inconsistent with the length or segment budget.
    pub fn nominal_boundaries(&self) -> Result<Vec<f64>> {
        let max = self.max_beam_segments;
        let mut boundaries = Vec::with_capacity(max + 1);
        boundaries.push(0.0);
        match &self.distribution {
            BeamDistribution::Uniform => {
                for i in 1..max {
                    boundaries.push(self.total_length * i as f64 / max as f64);
                }
            }
            BeamDistribution::Regions { key_points, beams } => {
                if beams.len() != key_points.len() + 1 {
                    return Err(CosseratError::invalid_config(format!(
                        "{} key points need {} region beam counts, got {}",
                        key_points.len(),
                        key_points.len() + 1,
                        beams.len()
                    )));
                }
                if beams.iter().sum::<usize>() != max || beams.contains(&0) {
                    return Err(CosseratError::invalid_config(format!(
                        "region beam counts {beams:?} must be positive and sum to {max}"
                    )));
                }
                let mut region_start = 0.0;
                let ends = key_points.iter().copied().chain([self.total_length]);
                for (&count, region_end) in beams.iter().zip(ends) {
                    if !(region_end > region_start && region_end <= self.total_length) {
                        return Err(CosseratError::invalid_config(format!(
                            "key point {region_end} must lie in ({region_start}, {}]",
                            self.total_length
                        )));
                    }
                    let step = (region_end - region_start) / count as f64;
                    for j in 1..count {
                        boundaries.push(region_start + step * j as f64);
                    }
                    boundaries.push(region_end);
                    region_start = region_end;
                }
                // The last region pushed total_length; it is re-added below.
                boundaries.pop();
            }
        }
        boundaries.push(self.total_length);
        Ok(boundaries)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if !self.total_length.is_finite() || self.total_length <= 0.0 {
            return Err(CosseratError::invalid_config(format!(
                "total_length must be positive, got {}",
                self.total_length
            )));
        }
        if self.max_beam_segments == 0 {
            return Err(CosseratError::invalid_config(
                "max_beam_segments must be at least 1",
            ));
        }
        if !self.curv_abs_tolerance.is_finite() || self.curv_abs_tolerance <= 0.0 {
            return Err(CosseratError::invalid_config(
                "curv_abs_tolerance must be positive",
            ));
        }
        if self.nb_frames == 0 {
            return Err(CosseratError::invalid_config("nb_frames must be at least 1"));
        }
        if self.base_stiffness < 0.0 || self.base_angular_stiffness < 0.0 {
            return Err(CosseratError::invalid_config(
                "base spring stiffness cannot be negative",
            ));
        }

        self.section.validate()?;
        self.material.validate()?;

        if let Some(materials) = &self.segment_materials {
            if materials.len() != self.max_beam_segments {
                return Err(CosseratError::invalid_config(format!(
                    "expected {} segment materials, got {}",
                    self.max_beam_segments,
                    materials.len()
                )));
            }
            for material in materials {
                material.validate()?;
            }
        }

        if let RestStrain::PerSegment(rest) = &self.rest_strain {
            if rest.len() != self.max_beam_segments {
                return Err(CosseratError::invalid_config(format!(
                    "expected {} rest strains, got {}",
                    self.max_beam_segments,
                    rest.len()
                )));
            }
        }

        let boundaries = self.nominal_boundaries()?;
        let min_segment = boundaries
            .windows(2)
            .map(|w| w[1] - w[0])
            .fold(f64::INFINITY, f64::min);
        if min_segment <= self.curv_abs_tolerance {
            return Err(CosseratError::invalid_config(format!(
                "nominal segment length {min_segment} is not above curv_abs_tolerance {}",
                self.curv_abs_tolerance
            )));
        }

        Ok(())
    }
}

/// How insertion targets are adjusted near segment boundaries.
///
/// Commands smaller than the curvilinear tolerance round the target to the
/// tolerance grid under every policy except [`Deadband`](Self::Deadband) and
/// [`Disabled`](Self::Disabled). Grid ties go toward the current tip or the
/// nearest nominal boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SnapPolicy {
    /// Snap to a nominal boundary within tolerance, leave other targets alone.
    #[default]
    TowardExistingBoundary,
    /// Snap to a nominal boundary within tolerance, otherwise round to the
    /// tolerance grid.
    Grid,
    /// Like [`TowardExistingBoundary`](Self::TowardExistingBoundary), but
    /// commands smaller than the tolerance are dropped.
    Deadband,
    /// Never adjust the target.
    Disabled,
}

/// Configuration of the navigation controller.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NavigationConfig {
    /// Insertion distance of one key-driven command.
    pub increment_distance: f64,
    /// Rotation angle (radians) of one key-driven command.
    pub increment_angle: f64,
    /// Grid step for small insertion deltas; also the snapping radius.
    pub curv_abs_tolerance: f64,
    /// Rotation deltas below this (radians) are ignored.
    pub angle_tolerance: f64,
    /// Boundary snapping tie-break.
    pub snap_policy: SnapPolicy,
    /// Record every step's commands in a command log.
    pub record_commands: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            increment_distance: 1.0,
            increment_angle: 5.0_f64.to_radians(),
            curv_abs_tolerance: DEFAULT_CURV_ABS_TOLERANCE,
            angle_tolerance: 1.0e-9,
            snap_policy: SnapPolicy::TowardExistingBoundary,
            record_commands: false,
        }
    }
}

impl NavigationConfig {
    /// Set the key-driven increments.
    #[must_use]
    pub const fn increments(mut self, distance: f64, angle: f64) -> Self {
        self.increment_distance = distance;
        self.increment_angle = angle;
        self
    }

    /// Set the curvilinear tolerance.
    #[must_use]
    pub const fn curv_abs_tolerance(mut self, tolerance: f64) -> Self {
        self.curv_abs_tolerance = tolerance;
        self
    }

    /// Set the snapping policy.
    #[must_use]
    pub const fn snap_policy(mut self, policy: SnapPolicy) -> Self {
        self.snap_policy = policy;
        self
    }

    /// Record commands in a log for replay.
    #[must_use]
    pub const fn with_recording(mut self) -> Self {
        self.record_commands = true;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::InvalidConfig`] for non-positive tolerances or
    /// non-finite increments.
    pub fn validate(&self) -> Result<()> {
        if !self.curv_abs_tolerance.is_finite() || self.curv_abs_tolerance <= 0.0 {
            return Err(CosseratError::invalid_config(
                "curv_abs_tolerance must be positive",
            ));
        }
        if !self.angle_tolerance.is_finite() || self.angle_tolerance < 0.0 {
            return Err(CosseratError::invalid_config(
                "angle_tolerance cannot be negative",
            ));
        }
        if !self.increment_distance.is_finite() || !self.increment_angle.is_finite() {
            return Err(CosseratError::invalid_config("increments must be finite"));
        }
        Ok(())
    }
}

/// Configuration of a coaxial link between two instruments.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CouplingConfig {
    /// Evenly spaced extra coupling points inserted in every interval.
    pub intermediate_frames: usize,
    /// Linear coupling stiffness.
    pub stiffness: f64,
    /// Angular coupling stiffness.
    pub angular_stiffness: f64,
    /// Constrained directions `[tx, ty, tz, rx, ry, rz]` in the frame of the
    /// first instrument.
    pub active_directions: [bool; 6],
    /// Tolerance used to merge coincident boundaries.
    pub curv_abs_tolerance: f64,
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            intermediate_frames: 1,
            stiffness: 1.0e10,
            angular_stiffness: 1.0e8,
            // Axial sliding stays free.
            active_directions: [false, true, true, false, false, false],
            curv_abs_tolerance: DEFAULT_CURV_ABS_TOLERANCE,
        }
    }
}

impl CouplingConfig {
    /// Set the number of intermediate frames per interval.
    #[must_use]
    pub const fn intermediate_frames(mut self, k: usize) -> Self {
        self.intermediate_frames = k;
        self
    }

    /// Set the linear and angular stiffness.
    #[must_use]
    pub const fn stiffness(mut self, stiffness: f64, angular_stiffness: f64) -> Self {
        self.stiffness = stiffness;
        self.angular_stiffness = angular_stiffness;
        self
    }

    /// Set the constrained directions.
    #[must_use]
    pub const fn active_directions(mut self, directions: [bool; 6]) -> Self {
        self.active_directions = directions;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::InvalidConfig`] for negative stiffness or a
    /// non-positive tolerance.
    pub fn validate(&self) -> Result<()> {
        if !(self.stiffness.is_finite() && self.stiffness >= 0.0)
            || !(self.angular_stiffness.is_finite() && self.angular_stiffness >= 0.0)
        {
            return Err(CosseratError::invalid_config(
                "coupling stiffness must be finite and non-negative",
            ));
        }
        if !self.curv_abs_tolerance.is_finite() || self.curv_abs_tolerance <= 0.0 {
            return Err(CosseratError::invalid_config(
                "curv_abs_tolerance must be positive",
            ));
        }
        Ok(())
    }
}
