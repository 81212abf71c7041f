//! Fixed-capacity beam segment store.
//!
//! An instrument owns `capacity` beam segments for its whole lifetime. The
//! first `active` of them are deployed; the rest are in stock with zero length
//! and zero strain, so the generalized-coordinate count (`3 · capacity`) never
//! changes while the instrument is inserted or retracted.
//!
//! ```text
//! index:    0     1     2   | 3     4      5
//!          [====|=====|==]  | .     .      .
//!           active (3)      |  stock (3), length 0, strain 0
//! ```
//!
//! Segment indices never shift: growing or shrinking only moves the tip.

use std::ops::Range;

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CosseratError, Result};
use crate::material::{BeamMaterial, CrossSection, PlasticLaw};
use crate::schedule::{SegmentSchedule, check_abscissae};
use crate::types::Strain;

/// Per-segment geometry, material and strain of one instrument.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BeamSegmentStore {
    active: usize,
    section: CrossSection,
    lengths: Vec<f64>,
    strains: Vec<Strain>,
    rest_strains: Vec<Strain>,
    materials: Vec<BeamMaterial>,
    stiffness: Vec<Vector3<f64>>,
    schedule: SegmentSchedule,
}

impl BeamSegmentStore {
    /// Create a store of `capacity` stock segments sharing one material.
    #[must_use]
    pub fn new(capacity: usize, section: CrossSection, material: BeamMaterial) -> Self {
        let stiffness = material.stiffness(&section);
        Self {
            active: 0,
            section,
            lengths: vec![0.0; capacity],
            strains: vec![Strain::zeros(); capacity],
            rest_strains: vec![Strain::zeros(); capacity],
            materials: vec![material; capacity],
            stiffness: vec![stiffness; capacity],
            schedule: SegmentSchedule::with_capacity(capacity),
        }
    }

    /// Total number of segments (active + stock).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lengths.len()
    }

    /// Number of deployed segments.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active
    }

    /// Number of segments in stock.
    #[must_use]
    pub fn stock_count(&self) -> usize {
        self.capacity() - self.active
    }

    /// Indices of the stock segments (`active..capacity`).
    ///
    /// These are the segments a host pins in place while they are not
    /// deployed.
    #[must_use]
    pub fn stock_range(&self) -> Range<usize> {
        self.active..self.capacity()
    }

    /// Scalar strain coordinates of the stock segments, three per segment.
    #[must_use]
    pub fn stock_strain_indices(&self) -> Range<usize> {
        3 * self.active..3 * self.capacity()
    }

    /// Cross section shared by every segment.
    #[must_use]
    pub fn section(&self) -> &CrossSection {
        &self.section
    }

    /// Assign one rest strain to every segment.
    ///
    /// Active segments are reset to it; stock segments pick it up when they
    /// are deployed.
    pub fn set_uniform_rest_strain(&mut self, rest: Strain) {
        self.rest_strains.fill(rest);
        self.strains[..self.active].fill(rest);
    }

    /// Assign a rest strain per segment (`capacity` values).
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::DimensionMismatch`] if the count differs from
    /// the capacity.
    pub fn set_rest_strains(&mut self, rest: &[Strain]) -> Result<()> {
        if rest.len() != self.capacity() {
            return Err(CosseratError::dimension_mismatch(
                "rest strain per segment",
                self.capacity(),
                rest.len(),
            ));
        }
        self.rest_strains.copy_from_slice(rest);
        self.strains[..self.active].copy_from_slice(&rest[..self.active]);
        Ok(())
    }

    /// Assign a material per segment (`capacity` values).
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::DimensionMismatch`] if the count differs from
    /// the capacity, or [`CosseratError::InvalidConfig`] if a material is invalid.
    pub fn set_materials(&mut self, materials: &[BeamMaterial]) -> Result<()> {
        if materials.len() != self.capacity() {
            return Err(CosseratError::dimension_mismatch(
                "material per segment",
                self.capacity(),
                materials.len(),
            ));
        }
        for material in materials {
            material.validate()?;
        }
        self.materials.copy_from_slice(materials);
        for (k, material) in self.stiffness.iter_mut().zip(materials) {
            *k = material.stiffness(&self.section);
        }
        Ok(())
    }

    /// Change the number of active segments.
    ///
    /// Shrinking returns the freed tip segments to stock (zero length, zero
    /// strain). Growing pulls stock segments at the tip with zero length and
    /// their rest strain. Calling it again with the same `n` changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::SegmentCapacityExceeded`] if `n > capacity`.
    pub fn resize_active(&mut self, n: usize) -> Result<()> {
        let capacity = self.capacity();
        if n > capacity {
            return Err(CosseratError::SegmentCapacityExceeded {
                requested: n,
                capacity,
            });
        }
        if n < self.active {
            self.lengths[n..self.active].fill(0.0);
            self.strains[n..self.active].fill(Strain::zeros());
        } else if n > self.active {
            self.lengths[self.active..n].fill(0.0);
            self.strains[self.active..n].copy_from_slice(&self.rest_strains[self.active..n]);
        } else {
            return Ok(());
        }
        self.active = n;
        self.rebuild_schedule()
    }

    /// Set the lengths of the active segments.
    ///
    /// # Errors
    ///
    /// - [`CosseratError::DimensionMismatch`] if `lengths.len() != active_count()`.
    /// - [`CosseratError::InvalidSchedule`] if a length is negative or not finite.
    ///
    /// Nothing is written on error.
    pub fn set_segment_lengths(&mut self, lengths: &[f64]) -> Result<()> {
        if lengths.len() != self.active {
            return Err(CosseratError::dimension_mismatch(
                "active segment lengths",
                self.active,
                lengths.len(),
            ));
        }
        self.schedule.rebuild(lengths)?;
        self.lengths[..self.active].copy_from_slice(lengths);
        Ok(())
    }

    /// Resize and lay out the active segments from their boundary abscissae
    /// (`active + 1` values starting at 0) in one call.
    ///
    /// The schedule keeps the boundaries exactly as given.
    ///
    /// # Errors
    ///
    /// - [`CosseratError::SegmentCapacityExceeded`] if the boundaries describe
    ///   more segments than the store owns.
    /// - [`CosseratError::InvalidSchedule`] if they do not start at 0 or decrease.
    ///
    /// Nothing is written on error.
    pub fn apply_boundaries(&mut self, abscissae: &[f64]) -> Result<()> {
        let n = abscissae.len().saturating_sub(1);
        if n > self.capacity() {
            return Err(CosseratError::SegmentCapacityExceeded {
                requested: n,
                capacity: self.capacity(),
            });
        }
        check_abscissae(abscissae)?;
        self.resize_active(n)?;
        self.schedule.rebuild_from_abscissae(abscissae)?;
        self.lengths[..n].copy_from_slice(self.schedule.lengths());
        Ok(())
    }

    /// Partition of the deployed length over the active segments.
    #[must_use]
    pub fn abscissae(&self) -> &SegmentSchedule {
        &self.schedule
    }

    /// Lengths of every segment, stock included.
    #[must_use]
    pub fn lengths(&self) -> &[f64] {
        &self.lengths
    }

    /// Strain of every segment, stock included (`capacity` values).
    #[must_use]
    pub fn strains(&self) -> &[Strain] {
        &self.strains
    }

    /// Strain of the active segments.
    #[must_use]
    pub fn active_strains(&self) -> &[Strain] {
        &self.strains[..self.active]
    }

    /// Rest strain of every segment.
    #[must_use]
    pub fn rest_strains(&self) -> &[Strain] {
        &self.rest_strains
    }

    /// Overwrite the active strains.
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::DimensionMismatch`] if `strains.len()` differs
    /// from the active count. Nothing is written on error.
    pub fn set_strains(&mut self, strains: &[Strain]) -> Result<()> {
        if strains.len() != self.active {
            return Err(CosseratError::dimension_mismatch(
                "active strain",
                self.active,
                strains.len(),
            ));
        }
        self.strains[..self.active].copy_from_slice(strains);
        Ok(())
    }

    /// Material of segment `index`.
    #[must_use]
    pub fn material(&self, index: usize) -> Option<&BeamMaterial> {
        self.materials.get(index)
    }

    /// Plastic law of segment `index`, if its material has one.
    #[must_use]
    pub fn plastic_law(&self, index: usize) -> Option<&PlasticLaw> {
        self.materials.get(index)?.plastic.as_ref()
    }

    /// Torsion/bending stiffness diagonal of segment `index`.
    #[must_use]
    pub fn stiffness(&self, index: usize) -> Option<Vector3<f64>> {
        self.stiffness.get(index).copied()
    }

    /// Stiffness diagonals of every segment.
    #[must_use]
    pub fn stiffnesses(&self) -> &[Vector3<f64>] {
        &self.stiffness
    }

    /// Elastic moment `K · (strain − rest) · length` of each active segment.
    #[must_use]
    pub fn internal_moments(&self) -> Vec<Vector3<f64>> {
        (0..self.active)
            .map(|i| {
                let delta = self.strains[i] - self.rest_strains[i];
                self.stiffness[i].component_mul(&delta) * self.lengths[i]
            })
            .collect()
    }

    fn rebuild_schedule(&mut self) -> Result<()> {
        self.schedule.rebuild(&self.lengths[..self.active])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn store(capacity: usize) -> BeamSegmentStore {
        BeamSegmentStore::new(capacity, CrossSection::circular(0.5), BeamMaterial::polymer())
    }

    #[test]
    fn test_new_store_is_all_stock() {
        let s = store(6);
        assert_eq!(s.active_count(), 0);
        assert_eq!(s.stock_count(), 6);
        assert_eq!(s.strains().len(), 6);
        assert_eq!(s.abscissae().abscissae(), &[0.0]);
    }

    #[test]
    fn test_resize_capacity_exceeded() {
        let mut s = store(4);
        let err = s.resize_active(5).unwrap_err();
        assert_eq!(
            err,
            CosseratError::SegmentCapacityExceeded {
                requested: 5,
                capacity: 4
            }
        );
        assert_eq!(s.active_count(), 0);
    }

    #[test]
    fn test_grow_assigns_rest_strain() {
        let mut s = store(4);
        let rest = Strain::new(0.0, 0.1, 0.0);
        s.set_uniform_rest_strain(rest);
        s.resize_active(2).unwrap();
        assert_eq!(s.active_strains(), &[rest, rest]);
        assert_eq!(s.strains()[2], Strain::zeros());
        assert_eq!(s.lengths(), &[0.0; 4]);
    }

    #[test]
    fn test_shrink_zeroes_stock() {
        let mut s = store(4);
        s.apply_boundaries(&[0.0, 1.0, 2.0, 2.5]).unwrap();
        s.set_strains(&[Strain::new(0.1, 0.2, 0.3); 3]).unwrap();
        s.resize_active(1).unwrap();
        assert_eq!(s.lengths(), &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(s.strains()[1], Strain::zeros());
        assert_eq!(s.strains()[2], Strain::zeros());
        assert_eq!(s.abscissae().abscissae(), &[0.0, 1.0]);
    }

    #[test]
    fn test_resize_idempotent() {
        let mut s = store(5);
        s.apply_boundaries(&[0.0, 2.0, 4.0, 5.0]).unwrap();
        s.resize_active(3).unwrap();
        let before = s.clone();
        s.resize_active(3).unwrap();
        assert_eq!(s, before);
    }

    #[test]
    fn test_set_lengths_count_checked() {
        let mut s = store(4);
        s.resize_active(2).unwrap();
        let err = s.set_segment_lengths(&[1.0]).unwrap_err();
        assert!(matches!(err, CosseratError::DimensionMismatch { .. }));
        let err = s.set_segment_lengths(&[1.0, f64::NAN]).unwrap_err();
        assert!(matches!(err, CosseratError::InvalidSchedule { .. }));
        assert_eq!(s.lengths(), &[0.0; 4]);
    }

    #[test]
    fn test_apply_boundaries_rejects_without_write() {
        let mut s = store(2);
        s.apply_boundaries(&[0.0, 1.0, 3.0]).unwrap();
        assert_eq!(s.lengths(), &[1.0, 2.0]);
        assert!(s.apply_boundaries(&[0.0, 1.0, 2.0, 3.0]).is_err());
        assert!(s.apply_boundaries(&[0.0, 1.0, 0.5]).is_err());
        assert!(s.apply_boundaries(&[0.5, 1.0]).is_err());
        assert_eq!(s.abscissae().total(), 3.0);
        assert_eq!(s.active_count(), 2);
    }

    #[test]
    fn test_internal_moments() {
        let mut s = store(2);
        s.apply_boundaries(&[0.0, 2.0]).unwrap();
        s.set_strains(&[Strain::new(0.0, 0.5, 0.0)]).unwrap();
        let k = s.stiffness(0).unwrap();
        let moments = s.internal_moments();
        assert_eq!(moments.len(), 1);
        assert_relative_eq!(moments[0].y, k.y * 0.5 * 2.0);
        assert_relative_eq!(moments[0].x, 0.0);
    }

    #[test]
    fn test_per_segment_materials() {
        let mut s = store(2);
        s.set_materials(&[BeamMaterial::polymer(), BeamMaterial::metallic_wire()])
            .unwrap();
        assert!(s.stiffness(1).unwrap().y > s.stiffness(0).unwrap().y);
        assert!(s.set_materials(&[BeamMaterial::polymer()]).is_err());
        assert_eq!(s.stiffness(2), None);
    }

    #[test]
    fn test_per_segment_plastic_laws() {
        let mut s = store(3);
        let soft = PlasticLaw::new(5.0e4, 2.0e5, 0.5);
        let hard = PlasticLaw::new(2.0e5, 1.0e6, 0.0);
        s.set_materials(&[
            BeamMaterial::polymer().with_plastic(soft),
            BeamMaterial::polymer(),
            BeamMaterial::metallic_wire().with_plastic(hard),
        ])
        .unwrap();
        assert_eq!(s.plastic_law(0), Some(&soft));
        assert_eq!(s.plastic_law(1), None);
        assert_eq!(s.plastic_law(2), Some(&hard));
        assert_eq!(s.plastic_law(3), None);

        let invalid = BeamMaterial::polymer().with_plastic(PlasticLaw::new(5.0e4, 2.0e5, 2.0));
        assert!(s.set_materials(&[invalid; 3]).is_err());
        assert_eq!(s.plastic_law(0), Some(&soft));
    }

    #[test]
    fn test_stock_range_follows_tip() {
        let mut s = store(5);
        assert_eq!(s.stock_range(), 0..5);
        assert_eq!(s.stock_strain_indices(), 0..15);
        s.apply_boundaries(&[0.0, 1.0, 2.0]).unwrap();
        assert_eq!(s.stock_range(), 2..5);
        assert_eq!(s.stock_strain_indices(), 6..15);
        assert!(s.stock_range().all(|i| s.strains()[i] == Strain::zeros()));
        s.resize_active(5).unwrap();
        assert!(s.stock_range().is_empty());
    }
}
