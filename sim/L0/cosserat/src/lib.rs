//! Cosserat rod kinematics and coaxial instrument navigation.
//!
//! This crate models thin insertable instruments (catheters, guidewires,
//! needles, actuated cables) as Cosserat rods described in strain space, and
//! drives several of them through a shared insertion workflow:
//!
//! - **Frame mapping**: strain per segment + base pose → dense frame poses
//!   along the arclength, by closed-form SE(3) exponentials
//! - **Segment store**: a fixed budget of beam segments per instrument, the
//!   deployed ones active and the rest in stock
//! - **Navigation**: per-step insertion, retraction and rotation with boundary
//!   snapping, limit reporting and per-instrument error isolation
//! - **Coaxial coupling**: coupling frames and constraint descriptors between
//!   instruments that share a centerline
//!
//! # Strain Model
//!
//! Each segment carries a constant strain `κ = (torsion, bending-y,
//! bending-z)`. The pose at arclength `s` inside segment `i` is
//!
//! ```text
//! g(s) = g(aᵢ) · exp(ξᵢ · (s − aᵢ)),     ξᵢ = (κᵢ, e_x)
//! ```
//!
//! where `aᵢ` is the segment's start abscissa and `g(0)` is the base pose.
//!
//! # Segment Budget
//!
//! ```text
//!   total_length = 15, max_beam_segments = 4, deployed = 9
//!
//!   0      3.75     7.5  9       11.25     15
//!   |=======|=======|====|.........|.........|
//!       active (3)          stock (1)
//! ```
//!
//! The strain vector always has `3 · max_beam_segments` entries; stock
//! segments have zero length and zero strain.
//!
//! # Quick Start
//!
//! ```
//! use sim_cosserat::{
//!     InstrumentArena, InstrumentConfig, MotionCommand, NavigationConfig,
//!     NavigationController, Pose,
//! };
//!
//! let mut arena = InstrumentArena::new();
//! let catheter = arena.add(InstrumentConfig::new(15.0, 4), Pose::identity())?;
//! let mut controller = NavigationController::new(NavigationConfig::default())?;
//!
//! for _ in 0..4 {
//!     controller.step(&mut arena, &[MotionCommand::insert(catheter, 3.75)]);
//! }
//!
//! let instrument = arena.resolve(catheter)?;
//! assert_eq!(instrument.deployed_length(), 15.0);
//! assert_eq!(instrument.active_count(), 4);
//! # Ok::<(), sim_cosserat::CosseratError>(())
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. The host owns the
//! scene, integrator and solver; this crate only produces schedules, strains,
//! frames and coupling descriptors.

#![doc(html_root_url = "https://docs.rs/sim-cosserat/0.7.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::doc_markdown,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::similar_names,
    clippy::suboptimal_flops,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::imprecise_flops
)]
#![cfg_attr(test, allow(clippy::float_cmp))]

pub mod coaxial;
pub mod command;
pub mod config;
pub mod error;
pub mod instrument;
pub mod mapping;
pub mod material;
pub mod navigation;
pub mod report;
pub mod schedule;
pub mod segments;
pub mod types;

// Re-export main types at crate root
pub use coaxial::{
    CoaxialCouplingManager, CoaxialLink, CouplingConstraint, CouplingEntry, DofBlock, DofKind,
};
pub use command::{CommandLog, LoggedStep, MotionCommand, NavigationInput};
pub use config::{
    BeamDistribution, CouplingConfig, InstrumentConfig, NavigationConfig, RestStrain, SnapPolicy,
};
pub use error::{CosseratError, Result, TravelLimit};
pub use instrument::{Instrument, InstrumentArena, Travel};
pub use mapping::{boundary_frames, compute_frames, compute_frames_into};
pub use material::{BeamMaterial, CrossSection, PlasticLaw};
pub use navigation::{NavigationController, round_to_grid, snap_target, validate_commands};
pub use report::{InstrumentStep, LinkStep, MotionState, StepChanges, StepReport};
pub use schedule::SegmentSchedule;
pub use segments::BeamSegmentStore;
pub use types::{FrameSample, InstrumentId, Pose, Strain};
