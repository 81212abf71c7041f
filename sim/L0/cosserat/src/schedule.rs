//! Segment lengths and their curvilinear-abscissa partition.
//!
//! ```text
//! lengths:     [  l0  |  l1  |  l2  ]
//! abscissae:  0      l0   l0+l1   l0+l1+l2 = deployed length
//! ```
//!
//! A schedule with `n` segments always carries `n + 1` abscissae, starting at 0.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{CosseratError, Result};

/// Ordered segment lengths with their partial-sum abscissae.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentSchedule {
    lengths: Vec<f64>,
    abscissae: Vec<f64>,
}

impl Default for SegmentSchedule {
    fn default() -> Self {
        Self::empty()
    }
}

impl SegmentSchedule {
    /// A schedule with no segments (single abscissa at 0).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            lengths: Vec::new(),
            abscissae: vec![0.0],
        }
    }

    /// An empty schedule with room for `capacity` segments.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut abscissae = Vec::with_capacity(capacity + 1);
        abscissae.push(0.0);
        Self {
            lengths: Vec::with_capacity(capacity),
            abscissae,
        }
    }

    /// Build a schedule from segment lengths.
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::InvalidSchedule`] if a length is negative or not finite.
    pub fn from_lengths(lengths: &[f64]) -> Result<Self> {
        let mut schedule = Self::with_capacity(lengths.len());
        schedule.rebuild(lengths)?;
        Ok(schedule)
    }

    /// Build a schedule from boundary abscissae (`n + 1` values starting at 0).
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::InvalidSchedule`] if the first value is not 0
    /// or the values decrease.
    pub fn from_abscissae(abscissae: &[f64]) -> Result<Self> {
        let mut schedule = Self::with_capacity(abscissae.len().saturating_sub(1));
        schedule.rebuild_from_abscissae(abscissae)?;
        Ok(schedule)
    }

    /// Recompute in place from new lengths, reusing the buffers.
    ///
    /// Validation happens before anything is written.
    ///
    /// # Errors
    ///
    /// Returns [`CosseratError::InvalidSchedule`] if a length is negative or not finite.
    pub fn rebuild(&mut self, lengths: &[f64]) -> Result<()> {
        check_lengths(lengths)?;

        self.lengths.clear();
        self.lengths.extend_from_slice(lengths);
        self.abscissae.clear();
        self.abscissae.push(0.0);
        let mut sum = 0.0;
        for &length in lengths {
            sum += length;
            self.abscissae.push(sum);
        }
        Ok(())
    }

    /// Recompute in place from boundary abscissae, reusing the buffers.
    ///
    /// The boundaries are stored as given, so the last abscissa is exactly
    /// the last input value. An empty slice yields the empty schedule.
    ///
    /// # Errors
    ///
    /// Same as [`from_abscissae`](Self::from_abscissae). Nothing is written on error.
    pub fn rebuild_from_abscissae(&mut self, abscissae: &[f64]) -> Result<()> {
        check_abscissae(abscissae)?;

        self.abscissae.clear();
        if abscissae.is_empty() {
            self.abscissae.push(0.0);
        } else {
            self.abscissae.extend_from_slice(abscissae);
        }
        self.lengths.clear();
        self.lengths
            .extend(self.abscissae.windows(2).map(|w| w[1] - w[0]));
        Ok(())
    }

    /// Number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.lengths.len()
    }

    /// Segment lengths.
    #[must_use]
    pub fn lengths(&self) -> &[f64] {
        &self.lengths
    }

    /// Boundary abscissae (`segment_count() + 1` values).
    #[must_use]
    pub fn abscissae(&self) -> &[f64] {
        &self.abscissae
    }

    /// Total length covered by the schedule.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.abscissae.last().copied().unwrap_or(0.0)
    }

    /// Index of the segment that owns abscissa `s`.
    ///
    /// Boundaries belong to the segment that ends there, so the tip maps to
    /// the last segment. Returns `None` when there are no segments.
    #[must_use]
    pub fn segment_at(&self, s: f64) -> Option<usize> {
        let n = self.lengths.len();
        if n == 0 {
            return None;
        }
        // First boundary (after 0) that is >= s.
        let upper = self.abscissae[1..].partition_point(|&b| b < s);
        Some(upper.min(n - 1))
    }
}

/// Check that every segment length is finite and non-negative.
fn check_lengths(lengths: &[f64]) -> Result<()> {
    if let Some((index, &bad)) = lengths
        .iter()
        .enumerate()
        .find(|(_, l)| !l.is_finite() || **l < 0.0)
    {
        return Err(CosseratError::invalid_schedule(format!(
            "segment {index} has invalid length {bad}"
        )));
    }
    Ok(())
}

/// Check that boundary abscissae start at 0 and never decrease.
///
/// # Errors
///
/// Returns [`CosseratError::InvalidSchedule`] describing the violation.
pub fn check_abscissae(abscissae: &[f64]) -> Result<()> {
    if let Some(&first) = abscissae.first() {
        if first != 0.0 {
            return Err(CosseratError::invalid_schedule(format!(
                "first abscissa must be 0, got {first}"
            )));
        }
    }
    check_non_decreasing(abscissae)
}

/// Check that a sequence of abscissae never decreases.
///
/// # Errors
///
/// Returns [`CosseratError::InvalidSchedule`] naming the first offending pair.
pub fn check_non_decreasing(values: &[f64]) -> Result<()> {
    if let Some(bad) = values.iter().position(|v| !v.is_finite()) {
        return Err(CosseratError::invalid_schedule(format!(
            "abscissa {bad} is not finite"
        )));
    }
    if let Some(i) = values.windows(2).position(|w| w[1] < w[0]) {
        return Err(CosseratError::invalid_schedule(format!(
            "abscissae decrease at index {}: {} > {}",
            i + 1,
            values[i],
            values[i + 1]
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_from_lengths() {
        let schedule = SegmentSchedule::from_lengths(&[15.0, 15.0, 15.0, 15.0, 6.0, 15.0]).unwrap();
        assert_eq!(schedule.segment_count(), 6);
        assert_eq!(
            schedule.abscissae(),
            &[0.0, 15.0, 30.0, 45.0, 60.0, 66.0, 81.0]
        );
        assert_eq!(schedule.total(), 81.0);
    }

    #[test]
    fn test_empty_schedule() {
        let schedule = SegmentSchedule::empty();
        assert_eq!(schedule.segment_count(), 0);
        assert_eq!(schedule.abscissae(), &[0.0]);
        assert_eq!(schedule.total(), 0.0);
        assert_eq!(schedule.segment_at(0.0), None);
    }

    #[test]
    fn test_negative_length_rejected_without_write() {
        let mut schedule = SegmentSchedule::from_lengths(&[1.0, 2.0]).unwrap();
        let err = schedule.rebuild(&[1.0, -0.5]).unwrap_err();
        assert!(matches!(err, CosseratError::InvalidSchedule { .. }));
        assert_eq!(schedule.lengths(), &[1.0, 2.0]);
    }

    #[test]
    fn test_from_abscissae_rejects_decreasing() {
        assert!(SegmentSchedule::from_abscissae(&[0.0, 2.0, 1.0]).is_err());
        assert!(SegmentSchedule::from_abscissae(&[1.0, 2.0]).is_err());
        let schedule = SegmentSchedule::from_abscissae(&[0.0, 2.0, 2.0, 5.0]).unwrap();
        assert_eq!(schedule.lengths(), &[2.0, 0.0, 3.0]);
    }

    #[test]
    fn test_rebuild_from_abscissae_keeps_exact_tip() {
        let mut schedule = SegmentSchedule::empty();
        schedule.rebuild_from_abscissae(&[0.0, 0.1, 0.2, 0.3]).unwrap();
        assert_eq!(schedule.total(), 0.3);
        assert_eq!(schedule.segment_count(), 3);
        assert!(schedule.rebuild_from_abscissae(&[0.0, 0.2, 0.1]).is_err());
        assert_eq!(schedule.total(), 0.3);
        schedule.rebuild_from_abscissae(&[]).unwrap();
        assert_eq!(schedule, SegmentSchedule::empty());
    }

    #[test]
    fn test_segment_at() {
        let schedule = SegmentSchedule::from_lengths(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(schedule.segment_at(0.0), Some(0));
        assert_eq!(schedule.segment_at(0.5), Some(0));
        assert_eq!(schedule.segment_at(1.0), Some(0));
        assert_eq!(schedule.segment_at(1.5), Some(1));
        assert_eq!(schedule.segment_at(6.0), Some(2));
        assert_eq!(schedule.segment_at(7.0), Some(2));
    }

    #[test]
    fn test_rebuild_reuses_capacity() {
        let mut schedule = SegmentSchedule::with_capacity(8);
        let cap = schedule.lengths.capacity();
        schedule.rebuild(&[1.0; 8]).unwrap();
        schedule.rebuild(&[0.5; 3]).unwrap();
        assert_eq!(schedule.lengths.capacity(), cap);
        assert_eq!(schedule.total(), 1.5);
    }
}
