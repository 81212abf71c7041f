//! Property-based tests for frame mapping and segment bookkeeping.
//!
//! Run with: cargo test -p sim-cosserat -- proptest

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use nalgebra::{Point3, UnitQuaternion, Vector3};
use proptest::prelude::*;
use sim_cosserat::{
    BeamMaterial, BeamSegmentStore, CoaxialLink, CouplingConfig, CrossSection, Instrument,
    InstrumentArena, InstrumentConfig, InstrumentId, Pose, SegmentSchedule, Strain,
    compute_frames,
};

// =============================================================================
// Strategies
// =============================================================================

fn arb_strain() -> impl Strategy<Value = Strain> {
    prop::array::uniform3(-2.0..2.0f64).prop_map(|[x, y, z]| Vector3::new(x, y, z))
}

fn arb_pose() -> impl Strategy<Value = Pose> {
    (
        prop::array::uniform3(-10.0..10.0f64),
        prop::array::uniform3(-3.0..3.0f64),
    )
        .prop_map(|([x, y, z], [r, p, w])| {
            Pose::from_parts(
                Point3::new(x, y, z),
                UnitQuaternion::from_euler_angles(r, p, w),
            )
        })
}

/// Segment lengths with matching strains.
fn arb_rod() -> impl Strategy<Value = (Vec<f64>, Vec<Strain>)> {
    (1usize..8).prop_flat_map(|n| {
        (
            prop::collection::vec(0.0..5.0f64, n),
            prop::collection::vec(arb_strain(), n),
        )
    })
}

/// An initialized instrument with a random length and segment budget.
fn arb_instrument() -> impl Strategy<Value = Instrument> {
    (1.0..50.0f64, 1usize..12).prop_map(|(total, max)| {
        let mut instrument =
            Instrument::new(InstrumentId::new(0), InstrumentConfig::new(total, max)).unwrap();
        instrument.initialize(Pose::identity()).unwrap();
        instrument
    })
}

// =============================================================================
// Frame mapping
// =============================================================================

proptest! {
    #[test]
    fn proptest_abscissa_zero_is_base((lengths, strains) in arb_rod(), base in arb_pose()) {
        let schedule = SegmentSchedule::from_lengths(&lengths).unwrap();
        let frames = compute_frames(&strains, &schedule, &base, &[0.0, schedule.total()]).unwrap();
        prop_assert_eq!(frames[0].pose, base);
    }

    #[test]
    fn proptest_zero_strain_is_straight(
        lengths in prop::collection::vec(0.1..5.0f64, 1..8),
        base in arb_pose(),
        fractions in prop::collection::vec(0.0..1.0f64, 1..20),
    ) {
        let schedule = SegmentSchedule::from_lengths(&lengths).unwrap();
        let strains = vec![Strain::zeros(); lengths.len()];
        let mut output: Vec<f64> = fractions.iter().map(|f| f * schedule.total()).collect();
        output.sort_by(f64::total_cmp);

        let frames = compute_frames(&strains, &schedule, &base, &output).unwrap();
        for frame in &frames {
            let expected = base.transform_point(&Point3::new(frame.abscissa, 0.0, 0.0));
            prop_assert!((frame.pose.position - expected).norm() < 1e-9);
            prop_assert!(frame.pose.rotation.angle_to(&base.rotation) < 1e-9);
        }
    }

    #[test]
    fn proptest_frames_are_continuous((lengths, strains) in arb_rod()) {
        let schedule = SegmentSchedule::from_lengths(&lengths).unwrap();
        let eps = 1e-7;
        for &boundary in &schedule.abscissae()[1..schedule.segment_count()] {
            let after = (boundary + eps).min(schedule.total());
            let around = [(boundary - eps).max(0.0), boundary, after];
            let frames = compute_frames(&strains, &schedule, &Pose::identity(), &around).unwrap();
            prop_assert!((frames[0].position() - frames[1].position()).norm() < 1e-6);
            prop_assert!((frames[1].position() - frames[2].position()).norm() < 1e-6);
        }
    }

    #[test]
    fn proptest_unit_speed((lengths, strains) in arb_rod()) {
        // Every frame stays within arclength distance of the base.
        let schedule = SegmentSchedule::from_lengths(&lengths).unwrap();
        let frames = compute_frames(&strains, &schedule, &Pose::identity(), schedule.abscissae())
            .unwrap();
        for frame in &frames {
            prop_assert!(frame.position().coords.norm() <= frame.abscissa + 1e-9);
        }
    }
}

// =============================================================================
// Segment bookkeeping
// =============================================================================

proptest! {
    #[test]
    fn proptest_resize_is_idempotent(capacity in 1usize..16, n in 0usize..16) {
        let mut store =
            BeamSegmentStore::new(capacity, CrossSection::circular(0.5), BeamMaterial::polymer());
        let first = store.resize_active(n);
        let snapshot = store.clone();
        let second = store.resize_active(n);
        prop_assert_eq!(first.is_ok(), n <= capacity);
        prop_assert_eq!(second.is_ok(), n <= capacity);
        prop_assert_eq!(store, snapshot);
    }

    #[test]
    fn proptest_active_plus_stock_is_max(
        mut instrument in arb_instrument(),
        moves in prop::collection::vec(-30.0..30.0f64, 1..20),
    ) {
        let max = instrument.max_beam_segments();
        for delta in moves {
            instrument.deploy(delta).unwrap();
            prop_assert_eq!(instrument.active_count() + instrument.stock_count(), max);
            prop_assert!(instrument.deployed_length() >= 0.0);
            prop_assert!(instrument.deployed_length() <= instrument.total_length());
            prop_assert_eq!(instrument.current_tip_abscissa(), instrument.deployed_length());
            let strains = instrument.segments().strains();
            let stock = &strains[instrument.active_count()..];
            prop_assert!(stock.iter().all(|s| *s == Strain::zeros()));
        }
    }

    #[test]
    fn proptest_deploy_then_retract_restores(
        mut instrument in arb_instrument(),
        start in 0.0..1.0f64,
        step in 0.0..1.0f64,
    ) {
        let total = instrument.total_length();
        let start = start * total;
        let step = step * (total - start);
        instrument.deploy(start).unwrap();
        let active = instrument.active_count();

        instrument.deploy(step).unwrap();
        instrument.retract(step).unwrap();

        prop_assert!((instrument.deployed_length() - start).abs() < 1e-9);
        prop_assert_eq!(instrument.active_count(), active);
    }

    #[test]
    fn proptest_output_frames_span_deployment(
        mut instrument in arb_instrument(),
        fraction in 0.0..1.0f64,
    ) {
        let target = fraction * instrument.total_length();
        instrument.set_deployed_length(target).unwrap();
        instrument.refresh_frames().unwrap();
        let frames = instrument.frames();
        prop_assert_eq!(frames.len(), instrument.config().nb_frames + 1);
        prop_assert!(frames.windows(2).all(|w| w[0].abscissa <= w[1].abscissa));
        prop_assert_eq!(frames.last().unwrap().abscissa, instrument.deployed_length());
    }
}

// =============================================================================
// Coaxial coupling
// =============================================================================

proptest! {
    #[test]
    fn proptest_constraints_match_samples(
        deployed_a in 0.0..15.0f64,
        deployed_b in 0.0..20.0f64,
        k in 0usize..4,
    ) {
        let mut arena = InstrumentArena::new();
        let a = arena.add(InstrumentConfig::new(15.0, 6), Pose::identity()).unwrap();
        let b = arena.add(InstrumentConfig::new(20.0, 5), Pose::identity()).unwrap();
        arena.get_mut(a).unwrap().set_deployed_length(deployed_a).unwrap();
        arena.get_mut(b).unwrap().set_deployed_length(deployed_b).unwrap();

        let config = CouplingConfig::default().intermediate_frames(k);
        let link = CoaxialLink::build(&arena, a, b, config).unwrap();
        let overlap = deployed_a.min(deployed_b);

        prop_assert_eq!(link.constraints().len(), link.abscissae().len());
        prop_assert_eq!(link.frames_a().len(), link.abscissae().len());
        prop_assert!(link.abscissae().windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(link.abscissae().iter().all(|&s| (0.0..=overlap).contains(&s)));
        if overlap > 0.0 {
            prop_assert_eq!(link.abscissae()[0], 0.0);
        } else {
            prop_assert!(link.is_empty());
        }
    }
}
