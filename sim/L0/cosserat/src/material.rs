//! Beam material and cross-section properties.
//!
//! A Cosserat segment resists torsion and bending with the diagonal stiffness
//!
//! ```text
//! K = diag(G·J, E·I_y, E·I_z),   G = E / (2(1 + ν))
//! ```
//!
//! where `I_y`, `I_z` are the second moments of area of the cross section and
//! `J = I_y + I_z` its polar moment.
//!
//! A material may also carry a [`PlasticLaw`] (yield stress, plastic modulus
//! and mixed hardening coefficient) for hosts running an elastoplastic beam
//! force field. The kinematics in this crate never read it.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CosseratError, Result};

/// Cross-section shape of a beam segment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CrossSection {
    /// Circular section; `inner_radius > 0` makes it a tube.
    Circular {
        /// Outer radius.
        radius: f64,
        /// Inner radius (0 for a solid rod).
        inner_radius: f64,
    },
    /// Rectangular section.
    Rectangular {
        /// Extent along local Y.
        width: f64,
        /// Extent along local Z.
        height: f64,
    },
}

impl Default for CrossSection {
    fn default() -> Self {
        Self::circular(0.5)
    }
}

impl CrossSection {
    /// Solid circular section.
    #[must_use]
    pub const fn circular(radius: f64) -> Self {
        Self::Circular {
            radius,
            inner_radius: 0.0,
        }
    }

    /// Hollow circular section (tube).
    #[must_use]
    pub const fn tube(radius: f64, inner_radius: f64) -> Self {
        Self::Circular {
            radius,
            inner_radius,
        }
    }

    /// Rectangular section.
    #[must_use]
    pub const fn rectangular(width: f64, height: f64) -> Self {
        Self::Rectangular { width, height }
    }

    /// Outer radius used for collision and visualization.
    #[must_use]
    pub fn outer_radius(&self) -> f64 {
        match *self {
            Self::Circular { radius, .. } => radius,
            Self::Rectangular { width, height } => 0.5 * width.hypot(height),
        }
    }

    /// Cross-section area.
    #[must_use]
    pub fn area(&self) -> f64 {
        match *self {
            Self::Circular {
                radius,
                inner_radius,
            } => std::f64::consts::PI * (radius.powi(2) - inner_radius.powi(2)),
            Self::Rectangular { width, height } => width * height,
        }
    }

    /// Second moments of area about local Y and Z.
    #[must_use]
    pub fn second_moments(&self) -> (f64, f64) {
        match *self {
            Self::Circular {
                radius,
                inner_radius,
            } => {
                let i = std::f64::consts::FRAC_PI_4 * (radius.powi(4) - inner_radius.powi(4));
                (i, i)
            }
            Self::Rectangular { width, height } => (
                width * height.powi(3) / 12.0,
                height * width.powi(3) / 12.0,
            ),
        }
    }

    /// Polar moment `J = I_y + I_z`.
    #[must_use]
    pub fn polar_moment(&self) -> f64 {
        let (iy, iz) = self.second_moments();
        iy + iz
    }

    /// Validate the dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::InvalidConfig`] for non-positive sizes or an
    /// inner radius that is not smaller than the outer one.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Circular {
                radius,
                inner_radius,
            } => {
                if !(radius.is_finite() && radius > 0.0) {
                    return Err(CosseratError::invalid_config(format!(
                        "section radius must be positive, got {radius}"
                    )));
                }
                if !(0.0..radius).contains(&inner_radius) {
                    return Err(CosseratError::invalid_config(format!(
                        "inner radius {inner_radius} must be in [0, {radius})"
                    )));
                }
            }
            Self::Rectangular { width, height } => {
                if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
                    return Err(CosseratError::invalid_config(format!(
                        "section {width}x{height} must have positive extents"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Elastoplastic law of a beam segment.
///
/// `hardening_coefficient` mixes the two hardening models: 0 is purely
/// kinematic, 1 purely isotropic.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlasticLaw {
    /// Stress at which plastic flow starts.
    pub initial_yield_stress: f64,
    /// Slope of the stress/plastic-strain curve (H).
    pub plastic_modulus: f64,
    /// Mixed hardening coefficient, in `[0, 1]`.
    pub hardening_coefficient: f64,
}

impl Default for PlasticLaw {
    fn default() -> Self {
        Self::new(5.0e4, 2.0e5, 0.5)
    }
}

impl PlasticLaw {
    /// Create a plastic law.
    #[must_use]
    pub const fn new(
        initial_yield_stress: f64,
        plastic_modulus: f64,
        hardening_coefficient: f64,
    ) -> Self {
        Self {
            initial_yield_stress,
            plastic_modulus,
            hardening_coefficient,
        }
    }

    /// Elastoplastic tangent modulus `E·H / (E + H)` past the yield point.
    #[must_use]
    pub fn tangent_modulus(&self, youngs_modulus: f64) -> f64 {
        youngs_modulus * self.plastic_modulus / (youngs_modulus + self.plastic_modulus)
    }

    /// Check if `stress` (von Mises) lies past the initial yield surface.
    #[must_use]
    pub fn yields(&self, stress: f64) -> bool {
        stress.abs() > self.initial_yield_stress
    }

    /// Validate the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::InvalidConfig`] for a non-positive yield
    /// stress, a negative plastic modulus or a hardening coefficient outside
    /// `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_yield_stress.is_finite() && self.initial_yield_stress > 0.0) {
            return Err(CosseratError::invalid_config(format!(
                "yield stress must be positive, got {}",
                self.initial_yield_stress
            )));
        }
        if !(self.plastic_modulus.is_finite() && self.plastic_modulus >= 0.0) {
            return Err(CosseratError::invalid_config(format!(
                "plastic modulus must be non-negative, got {}",
                self.plastic_modulus
            )));
        }
        if !(0.0..=1.0).contains(&self.hardening_coefficient) {
            return Err(CosseratError::invalid_config(format!(
                "hardening coefficient must be in [0, 1], got {}",
                self.hardening_coefficient
            )));
        }
        Ok(())
    }
}

/// Material of a beam segment, elastic unless a plastic law is attached.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BeamMaterial {
    /// Young's modulus (E).
    pub youngs_modulus: f64,
    /// Poisson's ratio (ν), in `[0, 0.5)`.
    pub poissons_ratio: f64,
    /// Plastic behavior past the yield point.
    pub plastic: Option<PlasticLaw>,
}

impl Default for BeamMaterial {
    fn default() -> Self {
        Self::polymer()
    }
}

impl BeamMaterial {
    /// Create a material.
    #[must_use]
    pub const fn new(youngs_modulus: f64, poissons_ratio: f64) -> Self {
        Self {
            youngs_modulus,
            poissons_ratio,
            plastic: None,
        }
    }

    /// Attach a plastic law.
    #[must_use]
    pub const fn with_plastic(mut self, law: PlasticLaw) -> Self {
        self.plastic = Some(law);
        self
    }

    /// Check if the material has a plastic law.
    #[must_use]
    pub const fn is_plastic(&self) -> bool {
        self.plastic.is_some()
    }

    /// Soft polymer sheath (E = 5 MPa, ν = 0.45).
    #[must_use]
    pub const fn polymer() -> Self {
        Self::new(5.0e6, 0.45)
    }

    /// Stiff metallic wire (E = 50 GPa, ν = 0.45).
    #[must_use]
    pub const fn metallic_wire() -> Self {
        Self::new(5.0e10, 0.45)
    }

    /// Shear modulus `G = E / (2(1 + ν))`.
    #[must_use]
    pub fn shear_modulus(&self) -> f64 {
        self.youngs_modulus / (2.0 * (1.0 + self.poissons_ratio))
    }

    /// Torsion/bending stiffness diagonal `(G·J, E·I_y, E·I_z)` for `section`.
    #[must_use]
    pub fn stiffness(&self, section: &CrossSection) -> Vector3<f64> {
        let (iy, iz) = section.second_moments();
        Vector3::new(
            self.shear_modulus() * section.polar_moment(),
            self.youngs_modulus * iy,
            self.youngs_modulus * iz,
        )
    }

    /// Validate the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::InvalidConfig`] for a non-positive modulus, a
    /// Poisson ratio outside `[0, 0.5)` or an invalid plastic law.
    pub fn validate(&self) -> Result<()> {
        if !(self.youngs_modulus.is_finite() && self.youngs_modulus > 0.0) {
            return Err(CosseratError::invalid_config(format!(
                "Young's modulus must be positive, got {}",
                self.youngs_modulus
            )));
        }
        if !(0.0..0.5).contains(&self.poissons_ratio) {
            return Err(CosseratError::invalid_config(format!(
                "Poisson ratio must be in [0, 0.5), got {}",
                self.poissons_ratio
            )));
        }
        if let Some(law) = &self.plastic {
            law.validate()?;
        }
        Ok(())
    }
}
