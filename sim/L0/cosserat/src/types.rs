//! Core types for Cosserat rod kinematics.
//!
//! - [`InstrumentId`] - Index of an instrument in the arena
//! - [`Strain`] - Torsion and bending rates of one beam segment
//! - [`Pose`] - Rigid frame (position + unit quaternion) with the SE(3)
//!   exponential used to integrate strain along arclength
//! - [`FrameSample`] - A pose tagged with its curvilinear abscissa
//!
//! # Conventions
//!
//! The rod's centerline runs along the local +X axis of every frame. A strain
//! `(κx, κy, κz)` is the angular rate of the material frame per unit
//! arclength: `κx` is torsion, `κy` and `κz` are bending about the local Y and
//! Z axes. The twist driving a segment is `ξ = (κ, e_x)` in
//! `[angular, linear]` order.

use nalgebra::{Isometry3, Matrix3, Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Strain of one beam segment: `(torsion, bending-y, bending-z)`.
pub type Strain = Vector3<f64>;

/// Below this rotation angle the exponential falls back to its Taylor series.
const SMALL_ANGLE: f64 = 1e-2;

/// Identifier of an instrument inside an [`InstrumentArena`](crate::InstrumentArena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InstrumentId(pub usize);

impl InstrumentId {
    /// Create a new instrument ID.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for InstrumentId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Instrument({})", self.0)
    }
}

/// Position and orientation of a rod frame.
///
/// # Example
///
/// ```
/// use sim_cosserat::Pose;
/// use nalgebra::{Point3, Vector3};
///
/// // A straight (zero strain) piece of rod only advances along local X.
/// let base = Pose::from_position(Point3::new(1.0, 0.0, 0.0));
/// let tip = base.compose(&Pose::exp_strain(&Vector3::zeros(), 2.0));
/// assert_eq!(tip.position, Point3::new(3.0, 0.0, 0.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Position in world coordinates.
    pub position: Point3<f64>,
    /// Orientation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Identity pose (origin, no rotation).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Pose from position only.
    #[must_use]
    pub fn from_position(position: Point3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Pose from position and rotation.
    #[must_use]
    pub const fn from_parts(position: Point3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self { position, rotation }
    }

    /// Pose from an isometry.
    #[must_use]
    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        Self {
            position: Point3::from(iso.translation.vector),
            rotation: iso.rotation,
        }
    }

    /// Convert to an isometry.
    #[must_use]
    pub fn to_isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(self.position.coords.into(), self.rotation)
    }

    /// Rigid-frame array `[x, y, z, qx, qy, qz, qw]`.
    #[must_use]
    pub fn to_array(&self) -> [f64; 7] {
        let q = self.rotation.quaternion();
        [
            self.position.x,
            self.position.y,
            self.position.z,
            q.i,
            q.j,
            q.k,
            q.w,
        ]
    }

    /// Rotation as a 3×3 matrix.
    #[must_use]
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    /// Tangent of the centerline (local +X in world coordinates).
    #[must_use]
    pub fn tangent(&self) -> Vector3<f64> {
        self.rotation * Vector3::x()
    }

    /// Transform a point from local to world coordinates.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.rotation * local.coords
    }

    /// Transform a point from world to local coordinates.
    #[must_use]
    pub fn inverse_transform_point(&self, world: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation.inverse() * (world - self.position))
    }

    /// Inverse pose.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let inv_rotation = self.rotation.inverse();
        Self {
            position: Point3::from(-(inv_rotation * self.position.coords)),
            rotation: inv_rotation,
        }
    }

    /// Compose two poses: `self * other`.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            position: self.transform_point(&other.position),
            rotation: self.rotation * other.rotation,
        }
    }

    /// Relative pose taking `self` to `other`: `self⁻¹ * other`.
    #[must_use]
    pub fn between(&self, other: &Self) -> Self {
        self.inverse().compose(other)
    }

    /// Rotate about the local centerline axis by `angle` radians.
    #[must_use]
    pub fn rotated_about_tangent(&self, angle: f64) -> Self {
        Self {
            position: self.position,
            rotation: self.rotation * UnitQuaternion::from_axis_angle(&Vector3::x_axis(), angle),
        }
    }

    /// Exponential of the Cosserat twist `(strain, e_x)` over `length`.
    ///
    /// This is the closed-form pose reached after travelling `length` along a
    /// rod of constant `strain`, expressed in the frame at the start of the
    /// travel:
    ///
    /// ```text
    /// ω = κ·s,  θ = |ω|
    /// R = exp([ω]×)
    /// t = (I + (1 − cos θ)/θ² [ω]× + (θ − sin θ)/θ³ [ω]×²) · s·e_x
    /// ```
    #[must_use]
    pub fn exp_strain(strain: &Strain, length: f64) -> Self {
        let omega = strain * length;
        let theta_sq = omega.norm_squared();
        let theta = theta_sq.sqrt();
        let v = Vector3::new(length, 0.0, 0.0);

        let (a, b) = if theta < SMALL_ANGLE {
            let theta_4 = theta_sq * theta_sq;
            (
                0.5 - theta_sq / 24.0 + theta_4 / 720.0,
                1.0 / 6.0 - theta_sq / 120.0 + theta_4 / 5040.0,
            )
        } else {
            (
                (1.0 - theta.cos()) / theta_sq,
                (theta - theta.sin()) / (theta_sq * theta),
            )
        };

        let w_v = omega.cross(&v);
        let w_w_v = omega.cross(&w_v);
        let translation = v + w_v * a + w_w_v * b;

        Self {
            position: Point3::from(translation),
            rotation: UnitQuaternion::from_scaled_axis(omega),
        }
    }

    /// Check if the pose contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|x| x.is_finite())
            && self.rotation.coords.iter().all(|x| x.is_finite())
    }
}

/// A rod frame tagged with its curvilinear abscissa.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameSample {
    /// Arclength from the instrument base.
    pub abscissa: f64,
    /// Frame pose in world coordinates.
    pub pose: Pose,
}

impl FrameSample {
    /// Create a frame sample.
    #[must_use]
    pub const fn new(abscissa: f64, pose: Pose) -> Self {
        Self { abscissa, pose }
    }

    /// Position of the frame origin.
    #[must_use]
    pub const fn position(&self) -> Point3<f64> {
        self.pose.position
    }
}
