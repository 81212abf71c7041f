//! Curvilinear frame mapping: strain + base pose → frames along the rod.
//!
//! # Algorithm
//!
//! Strain is piecewise constant, one value per segment. Walking the requested
//! abscissae in order:
//!
//! ```text
//! g(0)          = base
//! g(a_{i+1})    = g(a_i) · exp(ξ_i · l_i)          segment boundary
//! g(s)          = g(a_i) · exp(ξ_i · (s − a_i))    s inside segment i
//! ```
//!
//! Every frame is a closed-form exponential from the start of its segment, so
//! interior frames are exact (no pose interpolation) and the frame at a
//! boundary is identical whether it is reached from the segment that ends
//! there or used as the start of the next one.

use crate::error::{CosseratError, Result};
use crate::schedule::{SegmentSchedule, check_non_decreasing};
use crate::types::{FrameSample, Pose, Strain};

/// Relative slack allowed on output abscissae past the end of the schedule.
const RANGE_TOLERANCE: f64 = 1e-9;

/// Compute frame samples at `output_abscissae`.
///
/// # Errors
///
/// - [`CosseratError::DimensionMismatch`] if `strain.len()` differs from the
///   schedule's segment count.
/// - [`CosseratError::InvalidSchedule`] if the output abscissae decrease or
///   fall outside `[0, schedule.total()]`.
pub fn compute_frames(
    strain: &[Strain],
    schedule: &SegmentSchedule,
    base: &Pose,
    output_abscissae: &[f64],
) -> Result<Vec<FrameSample>> {
    let mut frames = Vec::with_capacity(output_abscissae.len());
    compute_frames_into(strain, schedule, base, output_abscissae, &mut frames)?;
    Ok(frames)
}

/// Compute frame samples into `out`, reusing its allocation.
///
/// On error `out` is left untouched.
///
/// # Errors
///
/// Same as [`compute_frames`].
pub fn compute_frames_into(
    strain: &[Strain],
    schedule: &SegmentSchedule,
    base: &Pose,
    output_abscissae: &[f64],
    out: &mut Vec<FrameSample>,
) -> Result<()> {
    let n = schedule.segment_count();
    if strain.len() != n {
        return Err(CosseratError::dimension_mismatch(
            "strain per segment",
            n,
            strain.len(),
        ));
    }
    check_non_decreasing(output_abscissae)?;

    let total = schedule.total();
    let slack = RANGE_TOLERANCE * total.max(1.0);
    if let (Some(&first), Some(&last)) = (output_abscissae.first(), output_abscissae.last()) {
        if first < -slack || last > total + slack {
            return Err(CosseratError::invalid_schedule(format!(
                "output abscissae [{first}, {last}] outside rod [0, {total}]"
            )));
        }
    }

    let boundaries = schedule.abscissae();
    let lengths = schedule.lengths();

    out.clear();
    let mut segment = 0;
    let mut segment_start = *base;
    for &requested in output_abscissae {
        let s = requested.clamp(0.0, total);

        while segment + 1 < n && s > boundaries[segment + 1] {
            segment_start =
                segment_start.compose(&Pose::exp_strain(&strain[segment], lengths[segment]));
            segment += 1;
        }

        let local = if n == 0 { 0.0 } else { s - boundaries[segment] };
        let pose = if local <= 0.0 {
            segment_start
        } else {
            segment_start.compose(&Pose::exp_strain(&strain[segment], local))
        };
        out.push(FrameSample::new(s, pose));
    }
    Ok(())
}

/// Poses at every segment boundary (`segment_count() + 1` frames).
///
/// # Errors
///
/// Same as [`compute_frames`].
pub fn boundary_frames(
    strain: &[Strain],
    schedule: &SegmentSchedule,
    base: &Pose,
) -> Result<Vec<FrameSample>> {
    compute_frames(strain, schedule, base, schedule.abscissae())
}

/// `count + 1` abscissae evenly spaced over `[0, length]`, written into `out`.
///
/// The last value is exactly `length`.
pub fn uniform_abscissae_into(length: f64, count: usize, out: &mut Vec<f64>) {
    out.clear();
    let count = count.max(1);
    for i in 0..count {
        out.push(length * i as f64 / count as f64);
    }
    out.push(length);
}
