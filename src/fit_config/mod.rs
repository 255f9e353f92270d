//! # Fit configuration
//!
//! This module defines the [`FitParams`] configuration struct and its builder, which
//! together fix everything a track fit is allowed to decide ahead of time: the
//! external magnetic field model, the global algebraic-iteration controls, and the
//! ordered **annealing schedule** the fit works through.
//!
//! ## Purpose
//!
//! A [`FitParams`] object centralizes all tunable parameters consumed by a fit
//! driver. It lets you:
//!
//! - Bound the algebraic (Kalman) iteration per stage (`max_algebraic_iter`),
//! - De-weight the seed covariance so the first passes are driven by the
//!   measurements rather than the seed (`seed_deweight`),
//! - Reserve extra time around the measurements for the final fit extent
//!   (`time_buffer`) and bound the field line-integration error (`position_tol`),
//! - Abort statistically meaningless fits early (`min_ndof`),
//! - Gate material effects and magnetic-field inhomogeneity corrections
//!   (`add_material`, [`BFieldCorrection`]),
//! - Drive a multi-stage simulated-annealing schedule of
//!   [`AnnealingStage`](annealing::AnnealingStage) entries, executed strictly in
//!   order.
//!
//! ## Fit outline
//!
//! 1. **Seed** – the driver inflates the seed covariance by `seed_deweight` and
//!    enters the first stage of the schedule (an empty schedule is legal: the
//!    driver then runs whatever single-phase behavior it defines).
//!
//! 2. **Stage execution** – within a stage, every algebraic pass inflates the
//!    measurement variances by the stage's
//!    [`variance_scale`](annealing::AnnealingStage::variance_scale) and produces a
//!    χ²/dof value; the stage's thresholds turn the running history into a
//!    [`Convergence`](convergence::Convergence) verdict. Stages are never skipped,
//!    reordered, or re-entered.
//!
//! 3. **Gates** – `add_material` is a master switch over the per-stage
//!    `update_material` flags, and [`BFieldCorrection`] decides whether per-stage
//!    field-correction updates apply at all; the corresponding
//!    [`material_update_active`](FitParams::material_update_active) and
//!    [`bfield_update_active`](FitParams::bfield_update_active) helpers encode
//!    those rules. If the usable measurement count ever drops below `min_ndof`
//!    ([`sufficient_dof`](FitParams::sufficient_dof)), the fit aborts regardless
//!    of stage.
//!
//! ## Example
//!
//! ```rust
//! use kinfit::bfield::UniformField;
//! use kinfit::fit_config::FitParams;
//! use kinfit::fit_config::annealing::AnnealingStage;
//!
//! let field = UniformField::along_z(1.0);
//!
//! let params = FitParams::builder(&field)
//!     .max_algebraic_iter(20)
//!     .min_ndof(10)
//!     .stage(AnnealingStage::default().with_temperature(5.0).with_updates(false, false, true))
//!     .stage(AnnealingStage::default().with_temperature(2.0))
//!     .stage(AnnealingStage::default())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(params.schedule().len(), 3);
//! assert_eq!(params.schedule()[2].index, Some(2));
//! ```
//!
//! ## See also
//!
//! * [`annealing`] – the per-stage flags, temperature, and thresholds.
//! * [`convergence`] – the χ²-change precedence rule a driver must apply.
//! * [`schedule`] – textual schedule files.

use std::cmp::Ordering::{Equal, Greater};
use std::fmt;

use crate::algebra::Vec3;
use crate::bfield::MagneticField;
use crate::constants::{AnnealingSchedule, Millimeter, Nanosecond};
use crate::fit_config::annealing::AnnealingStage;
use crate::kinfit_errors::KinFitError;

pub mod annealing;
pub mod convergence;
pub mod schedule;

/// How magnetic-field inhomogeneity corrections are applied over the fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BFieldCorrection {
    /// No corrections: the field is treated as perfectly homogeneous
    None,
    /// Corrections computed once from the seed trajectory and held fixed
    #[default]
    Fixed,
    /// Corrections recomputed in every stage that requests it
    Variable,
    /// Fixed baseline plus per-stage variable refinement
    Both,
}

impl fmt::Display for BFieldCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BFieldCorrection::None => "none",
            BFieldCorrection::Fixed => "fixed",
            BFieldCorrection::Variable => "variable",
            BFieldCorrection::Both => "both",
        };
        write!(f, "{label}")
    }
}

/// Diagnostic verbosity contract, monotonically increasing in detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum PrintLevel {
    /// No diagnostic output
    #[default]
    None,
    Minimal,
    Basic,
    Complete,
    Detailed,
    Extreme,
}

impl PrintLevel {
    /// Whether this configured level enables output demanding `level`.
    pub fn enables(self, level: PrintLevel) -> bool {
        self >= level
    }
}

impl fmt::Display for PrintLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PrintLevel::None => "none",
            PrintLevel::Minimal => "minimal",
            PrintLevel::Basic => "basic",
            PrintLevel::Complete => "complete",
            PrintLevel::Detailed => "detailed",
            PrintLevel::Extreme => "extreme",
        };
        write!(f, "{label}")
    }
}

/// Configuration of a whole track fit.
///
/// Borrows the magnetic field model for its entire lifetime and is read-only once
/// constructed: a driver that needs a different schedule builds a new configuration.
/// One configuration can drive many fits against the same field map, including
/// concurrently.
///
/// Construct through [`FitParams::new`] (defaults, empty schedule),
/// [`FitParams::with_schedule`], or [`FitParams::builder`].
///
/// Defaults
/// -----------------
/// * `max_algebraic_iter`: 10
/// * `seed_deweight`: 1.0e6
/// * `time_buffer`: 1.0 ns
/// * `position_tol`: 0.1 mm
/// * `min_ndof`: 5
/// * `add_material`: true
/// * `bfield_correction`: [`BFieldCorrection::Fixed`]
/// * `origin`: (0, 0, 0)
/// * `print_level`: [`PrintLevel::None`]
/// * `schedule`: empty
#[derive(Debug, Clone)]
pub struct FitParams<'f> {
    /// External magnetic field model; borrowed, never copied
    bfield: &'f dyn MagneticField,
    /// Maximum number of algebraic iterations per stage
    max_algebraic_iter: usize,
    /// De-weighting of the initial seed covariance
    seed_deweight: f64,
    /// Time buffer for the final fit extent (ns)
    time_buffer: Nanosecond,
    /// Tolerance on position change in field line integration (mm)
    position_tol: Millimeter,
    /// Minimum number of degrees of freedom to continue the fit
    min_ndof: u32,
    /// Add material effects in the fit
    add_material: bool,
    /// How to apply magnetic field corrections in the fit
    bfield_correction: BFieldCorrection,
    /// Nominal origin for defining the field's local frame
    origin: Vec3,
    /// Diagnostic print level
    print_level: PrintLevel,
    /// Schedule of annealing stages, executed sequentially until completion or failure
    schedule: AnnealingSchedule,
}

impl<'f> FitParams<'f> {
    /// Construct a configuration with the documented defaults and an empty schedule.
    pub fn new(bfield: &'f dyn MagneticField) -> Self {
        FitParams {
            bfield,
            max_algebraic_iter: 10,
            seed_deweight: 1.0e6,
            time_buffer: 1.0,
            position_tol: 0.1,
            min_ndof: 5,
            add_material: true,
            bfield_correction: BFieldCorrection::Fixed,
            origin: Vec3::zeros(),
            print_level: PrintLevel::None,
            schedule: AnnealingSchedule::new(),
        }
    }

    /// Construct a configuration with the documented defaults and the given schedule.
    ///
    /// Validates every stage and assigns the schedule positions in order.
    pub fn with_schedule(
        bfield: &'f dyn MagneticField,
        schedule: AnnealingSchedule,
    ) -> Result<Self, KinFitError> {
        FitParamsBuilder::new(bfield).schedule(schedule).build()
    }

    /// Create a new [`FitParamsBuilder`] to configure custom parameters.
    pub fn builder(bfield: &'f dyn MagneticField) -> FitParamsBuilder<'f> {
        FitParamsBuilder::new(bfield)
    }

    /// The borrowed magnetic field model.
    pub fn bfield(&self) -> &'f dyn MagneticField {
        self.bfield
    }

    /// The annealing schedule, in execution order.
    pub fn schedule(&self) -> &AnnealingSchedule {
        &self.schedule
    }

    /// Maximum number of algebraic iterations per stage.
    pub fn max_algebraic_iter(&self) -> usize {
        self.max_algebraic_iter
    }

    /// De-weighting applied to the initial seed covariance.
    pub fn seed_deweight(&self) -> f64 {
        self.seed_deweight
    }

    /// Time buffer for the final fit extent (ns).
    pub fn time_buffer(&self) -> Nanosecond {
        self.time_buffer
    }

    /// Tolerance on position change in field line integration (mm).
    pub fn position_tol(&self) -> Millimeter {
        self.position_tol
    }

    /// Minimum number of degrees of freedom to continue the fit.
    pub fn min_ndof(&self) -> u32 {
        self.min_ndof
    }

    /// Whether material effects are modeled at all.
    pub fn add_material(&self) -> bool {
        self.add_material
    }

    /// How magnetic field corrections are applied.
    pub fn bfield_correction(&self) -> BFieldCorrection {
        self.bfield_correction
    }

    /// Nominal origin of the field's local frame.
    pub fn origin(&self) -> &Vec3 {
        &self.origin
    }

    /// Diagnostic print level.
    pub fn print_level(&self) -> PrintLevel {
        self.print_level
    }

    /// Whether a fit with `ndof` usable degrees of freedom may continue.
    pub fn sufficient_dof(&self, ndof: u32) -> bool {
        ndof >= self.min_ndof
    }

    /// Whether material effects are recomputed when entering `stage`.
    ///
    /// `add_material` is a master switch: a stage's `update_material` flag only
    /// matters while material effects are modeled at all.
    pub fn material_update_active(&self, stage: &AnnealingStage) -> bool {
        self.add_material && stage.update_material
    }

    /// Whether field inhomogeneity corrections are recomputed when entering `stage`.
    ///
    /// Under [`BFieldCorrection::None`] there are no corrections to update, and
    /// under [`BFieldCorrection::Fixed`] they are computed once and held, so the
    /// per-stage `update_bfield` flag only takes effect in the `Variable` and
    /// `Both` modes.
    pub fn bfield_update_active(&self, stage: &AnnealingStage) -> bool {
        match self.bfield_correction {
            BFieldCorrection::None | BFieldCorrection::Fixed => false,
            BFieldCorrection::Variable | BFieldCorrection::Both => stage.update_bfield,
        }
    }
}

/// Builder for [`FitParams`], with validation.
#[derive(Debug, Clone)]
pub struct FitParamsBuilder<'f> {
    params: FitParams<'f>,
}

impl<'f> FitParamsBuilder<'f> {
    /// Create a new builder initialized with the default values.
    pub fn new(bfield: &'f dyn MagneticField) -> Self {
        Self {
            params: FitParams::new(bfield),
        }
    }

    pub fn max_algebraic_iter(mut self, v: usize) -> Self {
        self.params.max_algebraic_iter = v;
        self
    }
    pub fn seed_deweight(mut self, v: f64) -> Self {
        self.params.seed_deweight = v;
        self
    }
    pub fn time_buffer(mut self, v: Nanosecond) -> Self {
        self.params.time_buffer = v;
        self
    }
    pub fn position_tol(mut self, v: Millimeter) -> Self {
        self.params.position_tol = v;
        self
    }
    pub fn min_ndof(mut self, v: u32) -> Self {
        self.params.min_ndof = v;
        self
    }
    pub fn add_material(mut self, v: bool) -> Self {
        self.params.add_material = v;
        self
    }
    pub fn bfield_correction(mut self, v: BFieldCorrection) -> Self {
        self.params.bfield_correction = v;
        self
    }
    pub fn origin(mut self, v: Vec3) -> Self {
        self.params.origin = v;
        self
    }
    pub fn print_level(mut self, v: PrintLevel) -> Self {
        self.params.print_level = v;
        self
    }

    /// Replace the whole schedule.
    pub fn schedule(mut self, schedule: AnnealingSchedule) -> Self {
        self.params.schedule = schedule;
        self
    }

    /// Append one stage to the schedule.
    pub fn stage(mut self, stage: AnnealingStage) -> Self {
        self.params.schedule.push(stage);
        self
    }

    // ---- Numeric helpers for PartialOrd (handle NaN as invalid) ----

    /// Return true iff x > 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    /// Return true iff x >= 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn ge0(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
    }

    /// Finalize the builder and produce a [`FitParams`] instance.
    ///
    /// Validation rules
    /// -----------------
    /// * `max_algebraic_iter ≥ 1` – at least one Kalman pass per stage.
    /// * `seed_deweight > 0.0` – the seed covariance is inflated, never zeroed.
    /// * `time_buffer ≥ 0.0`.
    /// * `position_tol > 0.0`.
    /// * Every stage must pass
    ///   [`AnnealingStage::validate`](annealing::AnnealingStage::validate)
    ///   (non-negative temperature, positive time precision, finite thresholds).
    ///
    /// The three per-stage χ² thresholds are independent knobs and may overlap;
    /// a stage whose divergence threshold does not exceed its convergence
    /// threshold is accepted but logged as a warning, since its divergence branch
    /// is unreachable.
    ///
    /// On success the schedule positions are assigned in order, so
    /// `params.schedule()[i].index == Some(i)`.
    ///
    /// Returns
    /// -----------------
    /// * `Ok(FitParams)` if all values are valid.
    /// * `Err(KinFitError::InvalidFitParameter)` if any validation rule fails.
    pub fn build(mut self) -> Result<FitParams<'f>, KinFitError> {
        let p = &self.params;

        if p.max_algebraic_iter == 0 {
            return Err(KinFitError::InvalidFitParameter(
                "max_algebraic_iter must be >= 1".into(),
            ));
        }
        if !Self::gt0(p.seed_deweight) {
            return Err(KinFitError::InvalidFitParameter(
                "seed_deweight must be > 0".into(),
            ));
        }
        if !Self::ge0(p.time_buffer) {
            return Err(KinFitError::InvalidFitParameter(
                "time_buffer must be non-negative".into(),
            ));
        }
        if !Self::gt0(p.position_tol) {
            return Err(KinFitError::InvalidFitParameter(
                "position_tol must be > 0".into(),
            ));
        }

        for stage in &p.schedule {
            stage.validate()?;
            if stage.div_dchi2 <= stage.conv_dchi2 {
                log::warn!(
                    "degenerate stage thresholds: div_dchi2 ({}) <= conv_dchi2 ({})",
                    stage.div_dchi2,
                    stage.conv_dchi2
                );
            }
        }

        for (position, stage) in self.params.schedule.iter_mut().enumerate() {
            stage.index = Some(position);
        }

        Ok(self.params)
    }
}

impl fmt::Display for FitParams<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 40; // width reserved for "name = value"

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "Kinematic fit parameters")?;
            writeln!(f, "------------------------")?;

            writeln!(f, "[Algebraic iteration]")?;
            line!(
                "max_algebraic_iter = {}",
                self.max_algebraic_iter,
                "Max Kalman passes per stage"
            )?;
            line!(
                "seed_deweight      = {:.1e}",
                self.seed_deweight,
                "Seed covariance inflation"
            )?;
            line!(
                "time_buffer        = {:.3} ns",
                self.time_buffer,
                "Extra margin on the fit extent"
            )?;
            line!(
                "position_tol       = {:.3} mm",
                self.position_tol,
                "Field integration tolerance"
            )?;
            line!(
                "min_ndof           = {}",
                self.min_ndof,
                "Minimum degrees of freedom"
            )?;

            writeln!(f, "\n[Field & material]")?;
            line!(
                "add_material       = {}",
                self.add_material,
                "Model material effects"
            )?;
            line!(
                "bfield_correction  = {}",
                self.bfield_correction,
                "Field inhomogeneity handling"
            )?;
            let origin = format!(
                "({:.1}, {:.1}, {:.1})",
                self.origin.x, self.origin.y, self.origin.z
            );
            line!(
                "origin             = {} mm",
                origin,
                "Field local frame origin"
            )?;
            line!(
                "print_level        = {}",
                self.print_level,
                "Diagnostic verbosity"
            )?;

            writeln!(f, "\n[Annealing schedule]")?;
            if self.schedule.is_empty() {
                writeln!(f, "  (empty: single-phase fit)")?;
            }
            for (position, stage) in self.schedule.iter().enumerate() {
                writeln!(f, "  stage {position}: {stage}")?;
            }

            Ok(())
        } else {
            write!(
                f,
                "FitParams(max_algebraic_iter={}, seed_deweight={:.1e}, time_buffer={:.1}ns, position_tol={:.2}mm, min_ndof={}, add_material={}, bfield_correction={}, print_level={}, stages={})",
                self.max_algebraic_iter,
                self.seed_deweight,
                self.time_buffer,
                self.position_tol,
                self.min_ndof,
                self.add_material,
                self.bfield_correction,
                self.print_level,
                self.schedule.len(),
            )
        }
    }
}

#[cfg(test)]
mod fit_config_test {
    use super::*;
    use crate::bfield::UniformField;

    fn field() -> UniformField {
        UniformField::along_z(1.0)
    }

    #[test]
    fn test_defaults() {
        let field = field();
        let params = FitParams::new(&field);

        assert_eq!(params.max_algebraic_iter(), 10);
        assert_eq!(params.seed_deweight(), 1.0e6);
        assert_eq!(params.time_buffer(), 1.0);
        assert_eq!(params.position_tol(), 0.1);
        assert_eq!(params.min_ndof(), 5);
        assert!(params.add_material());
        assert_eq!(params.bfield_correction(), BFieldCorrection::Fixed);
        assert_eq!(params.origin(), &Vec3::zeros());
        assert_eq!(params.print_level(), PrintLevel::None);
        assert!(params.schedule().is_empty());
    }

    #[test]
    fn test_schedule_placement() {
        let field = field();
        let mut schedule = AnnealingSchedule::new();
        schedule.push(AnnealingStage::default().with_temperature(5.0));
        schedule.push(AnnealingStage::default().with_temperature(2.0));
        schedule.push(AnnealingStage::default());

        let params = FitParams::with_schedule(&field, schedule).unwrap();

        assert_eq!(params.schedule().len(), 3);
        assert_eq!(params.schedule()[0].temperature, 5.0);
        assert_eq!(params.schedule()[1].temperature, 2.0);
        assert_eq!(params.schedule()[2].temperature, 0.0);
        for (position, stage) in params.schedule().iter().enumerate() {
            assert_eq!(stage.index, Some(position));
        }
    }

    #[test]
    fn test_builder_validation() {
        let field = field();

        let err = FitParams::builder(&field)
            .max_algebraic_iter(0)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            KinFitError::InvalidFitParameter("max_algebraic_iter must be >= 1".into())
        );
        assert!(FitParams::builder(&field).seed_deweight(0.0).build().is_err());
        assert!(FitParams::builder(&field).seed_deweight(f64::NAN).build().is_err());
        assert!(FitParams::builder(&field).time_buffer(-1.0).build().is_err());
        assert!(FitParams::builder(&field).position_tol(0.0).build().is_err());
    }

    #[test]
    fn test_builder_rejects_invalid_stage() {
        let field = field();
        let result = FitParams::builder(&field)
            .stage(AnnealingStage::default().with_temperature(-2.0))
            .build();

        assert!(matches!(
            result,
            Err(KinFitError::InvalidFitParameter(_))
        ));
    }

    #[test]
    fn test_material_master_gate() {
        let field = field();
        let stage = AnnealingStage::default().with_updates(true, true, false);

        let with_material = FitParams::builder(&field).build().unwrap();
        assert!(with_material.material_update_active(&stage));

        let without_material = FitParams::builder(&field).add_material(false).build().unwrap();
        assert!(!without_material.material_update_active(&stage));
    }

    #[test]
    fn test_bfield_correction_gate() {
        let field = field();
        let stage = AnnealingStage::default().with_updates(false, true, false);
        let inert = AnnealingStage::default();

        for mode in [BFieldCorrection::None, BFieldCorrection::Fixed] {
            let params = FitParams::builder(&field).bfield_correction(mode).build().unwrap();
            assert!(!params.bfield_update_active(&stage));
        }
        for mode in [BFieldCorrection::Variable, BFieldCorrection::Both] {
            let params = FitParams::builder(&field).bfield_correction(mode).build().unwrap();
            assert!(params.bfield_update_active(&stage));
            assert!(!params.bfield_update_active(&inert));
        }
    }

    #[test]
    fn test_dof_gate() {
        let field = field();
        let params = FitParams::builder(&field).min_ndof(5).build().unwrap();

        assert!(params.sufficient_dof(5));
        assert!(params.sufficient_dof(12));
        assert!(!params.sufficient_dof(4));
    }

    #[test]
    fn test_print_level_ordering() {
        assert!(PrintLevel::None < PrintLevel::Minimal);
        assert!(PrintLevel::Detailed < PrintLevel::Extreme);
        assert!(PrintLevel::Complete.enables(PrintLevel::Basic));
        assert!(!PrintLevel::Minimal.enables(PrintLevel::Detailed));
    }

    #[test]
    fn test_display() {
        let field = field();
        let params = FitParams::builder(&field)
            .stage(AnnealingStage::default())
            .build()
            .unwrap();

        let short = format!("{params}");
        assert!(short.contains("stages=1"));

        let long = format!("{params:#}");
        assert!(long.contains("[Annealing schedule]"));
        assert!(long.contains("stage 0"));
    }

    #[test]
    fn test_shared_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FitParams<'static>>();
    }
}
