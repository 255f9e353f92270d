//! # Annealing stages
//!
//! This module defines [`AnnealingStage`], one **meta-iteration** of the annealed
//! Kalman fit: a block of algebraic iterations run with a fixed set of feature flags,
//! a fixed simulated-annealing temperature, and fixed convergence thresholds. A fit
//! executes an ordered schedule of such stages, typically starting hot (large
//! measurement-variance inflation, aggressive hit re-evaluation) and cooling down to
//! a final stage at temperature zero.
//!
//! ## Construction
//!
//! Three paths produce a stage:
//!
//! 1. [`AnnealingStage::default`] – the documented defaults, then adjusted through
//!    the fluent `with_*` combinators,
//! 2. [`str::parse`] – the eight-field whitespace-separated text record
//!    (see [`crate::fit_config::schedule`] for whole-schedule files),
//! 3. field-by-field literal construction; all fields are public.
//!
//! The text path never populates the hit updaters (they are code, not data) and
//! never assigns the schedule position: both are attached when the stage is placed
//! into a [`FitParams`](crate::fit_config::FitParams) schedule.
//!
//! ## Record format
//!
//! ```text
//! <update_material:0|1> <update_bfield:0|1> <update_hits:0|1> <temperature> <conv_dchi2> <div_dchi2> <osc_dchi2> <time_precision>
//! ```
//!
//! Exactly eight tokens; no quoting or escaping. A short record, a trailing token,
//! or an unparsable field fails with [`ParseStageError`] and no partial stage is
//! ever observable.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::constants::{Chi2, Nanosecond};
use crate::hit_update::HitUpdater;
use crate::kinfit_errors::KinFitError;

/// Number of fields in the textual stage record.
const STAGE_RECORD_FIELDS: usize = 8;

/// One meta-iteration of the fit. Held constant while the algebraic iteration
/// implicit in the extended Kalman methodology converges.
#[derive(Debug, Clone)]
pub struct AnnealingStage {
    /// Update material effects along the trajectory during this stage
    pub update_material: bool,
    /// Update magnetic field inhomogeneity corrections during this stage
    pub update_bfield: bool,
    /// Re-evaluate the internal state of the hits (activity, L/R ambiguity)
    pub update_hits: bool,
    /// Simulated annealing temperature (dimensionless, roughly equivalent to 'sigma')
    pub temperature: f64,
    /// Maximum change in χ²/dof for convergence
    pub conv_dchi2: Chi2,
    /// Minimum change in χ²/dof for divergence
    pub div_dchi2: Chi2,
    /// Maximum change in χ²/dof for oscillation
    pub osc_dchi2: Chi2,
    /// Time precision demanded of time-of-closest-approach calculations (ns)
    pub time_precision: Nanosecond,
    /// Position in the schedule; `None` until the stage is placed into one
    pub index: Option<usize>,
    /// Hit update policies; specific hit classes find their particular updater
    /// inside the sequence and skip the rest
    pub hit_updaters: Vec<Arc<dyn HitUpdater>>,
}

impl Default for AnnealingStage {
    fn default() -> Self {
        AnnealingStage {
            update_material: false,
            update_bfield: false,
            update_hits: false,
            temperature: 0.0,
            conv_dchi2: 0.01,
            div_dchi2: 10.0,
            osc_dchi2: 1.0,
            time_precision: 1e-6,
            index: None,
            hit_updaters: Vec::new(),
        }
    }
}

impl AnnealingStage {
    /// Construct a new [`AnnealingStage`] with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Measurement variance inflation applied during this stage.
    ///
    /// Pure function of the temperature: `(1 + T)²`, so temperature 0 means no
    /// additional variance and the scale grows monotonically with T.
    pub fn variance_scale(&self) -> f64 {
        (1.0 + self.temperature) * (1.0 + self.temperature)
    }

    /// Set the simulated annealing temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the three χ²/dof-change thresholds (convergence, divergence, oscillation).
    pub fn with_thresholds(mut self, conv_dchi2: Chi2, div_dchi2: Chi2, osc_dchi2: Chi2) -> Self {
        self.conv_dchi2 = conv_dchi2;
        self.div_dchi2 = div_dchi2;
        self.osc_dchi2 = osc_dchi2;
        self
    }

    /// Set the three per-stage effect flags.
    pub fn with_updates(mut self, material: bool, bfield: bool, hits: bool) -> Self {
        self.update_material = material;
        self.update_bfield = bfield;
        self.update_hits = hits;
        self
    }

    /// Append a hit update policy to this stage.
    pub fn with_updater(mut self, updater: Arc<dyn HitUpdater>) -> Self {
        self.hit_updaters.push(updater);
        self
    }

    /// Find the first hit updater of concrete type `T` attached to this stage.
    ///
    /// Hit classes use this to recognize the update policy addressed to them;
    /// entries of any other type are silently skipped.
    pub fn updater<T: HitUpdater + 'static>(&self) -> Option<&T> {
        self.hit_updaters
            .iter()
            .find_map(|updater| updater.as_any().downcast_ref::<T>())
    }

    /// Check that the stage's numeric values are usable by a fit.
    ///
    /// The record grammar and the literal construction path accept any `f64`;
    /// this rejects the nonsensical ones before a fit can consume them:
    /// a negative temperature would deflate measurement variances, and a
    /// non-positive time precision makes every TOCA iteration fail.
    ///
    /// Return
    /// ----------
    /// * `Ok(())` if the stage can safely drive a fit.
    /// * `Err(KinFitError::InvalidFitParameter)` naming the offending field.
    pub fn validate(&self) -> Result<(), KinFitError> {
        if !(self.temperature >= 0.0 && self.temperature.is_finite()) {
            return Err(KinFitError::InvalidFitParameter(
                "temperature must be non-negative and finite".into(),
            ));
        }
        if !(self.time_precision > 0.0 && self.time_precision.is_finite()) {
            return Err(KinFitError::InvalidFitParameter(
                "time_precision must be > 0 and finite".into(),
            ));
        }
        for (name, value) in [
            ("conv_dchi2", self.conv_dchi2),
            ("div_dchi2", self.div_dchi2),
            ("osc_dchi2", self.osc_dchi2),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(KinFitError::InvalidFitParameter(format!(
                    "{name} must be non-negative and finite"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseStageError {
    #[error("found {0} fields where 8 were expected")]
    FieldCount(usize),
    #[error("flag field `{name}` must be 0 or 1, got `{value}`")]
    InvalidFlag { name: &'static str, value: String },
    #[error("numeric field `{name}` is unparsable: `{value}`")]
    InvalidNumber { name: &'static str, value: String },
}

/// Parse a `0|1` flag token.
fn parse_flag(name: &'static str, token: &str) -> Result<bool, ParseStageError> {
    match token {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(ParseStageError::InvalidFlag {
            name,
            value: token.to_string(),
        }),
    }
}

/// Parse a floating-point token.
fn parse_number(name: &'static str, token: &str) -> Result<f64, ParseStageError> {
    token
        .parse()
        .map_err(|_| ParseStageError::InvalidNumber {
            name,
            value: token.to_string(),
        })
}

impl FromStr for AnnealingStage {
    type Err = ParseStageError;

    /// Parse one stage record: eight whitespace-separated fields in the fixed order
    /// `update_material update_bfield update_hits temperature conv_dchi2 div_dchi2
    /// osc_dchi2 time_precision`.
    ///
    /// The schedule position and the hit updaters are not part of the record;
    /// they are attached when the stage is placed into a schedule.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        if tokens.len() != STAGE_RECORD_FIELDS {
            return Err(ParseStageError::FieldCount(tokens.len()));
        }

        Ok(AnnealingStage {
            update_material: parse_flag("update_material", tokens[0])?,
            update_bfield: parse_flag("update_bfield", tokens[1])?,
            update_hits: parse_flag("update_hits", tokens[2])?,
            temperature: parse_number("temperature", tokens[3])?,
            conv_dchi2: parse_number("conv_dchi2", tokens[4])?,
            div_dchi2: parse_number("div_dchi2", tokens[5])?,
            osc_dchi2: parse_number("osc_dchi2", tokens[6])?,
            time_precision: parse_number("time_precision", tokens[7])?,
            index: None,
            hit_updaters: Vec::new(),
        })
    }
}

impl fmt::Display for AnnealingStage {
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

            writeln!(f, "Annealing stage")?;
            line!(
                "temperature      = {:.3}",
                self.temperature,
                "Simulated annealing temperature"
            )?;
            line!(
                "variance_scale   = {:.3}",
                self.variance_scale(),
                "Measurement variance inflation"
            )?;
            line!(
                "conv_dchi2       = {:.4}",
                self.conv_dchi2,
                "Max |Δχ²/dof| for convergence"
            )?;
            line!(
                "div_dchi2        = {:.4}",
                self.div_dchi2,
                "Min Δχ²/dof for divergence"
            )?;
            line!(
                "osc_dchi2        = {:.4}",
                self.osc_dchi2,
                "Max |Δχ²/dof| for oscillation"
            )?;
            line!(
                "time_precision   = {:.1e} ns",
                self.time_precision,
                "TOCA calculation precision"
            )?;
            line!(
                "update_material  = {}",
                self.update_material,
                "Recompute material effects"
            )?;
            line!(
                "update_bfield    = {}",
                self.update_bfield,
                "Recompute field corrections"
            )?;
            line!(
                "update_hits      = {}",
                self.update_hits,
                "Re-evaluate hit internal state"
            )?;
            Ok(())
        } else {
            write!(
                f,
                "AnnealingStage(T={:.2}, conv_dchi2={:.3}, div_dchi2={:.2}, osc_dchi2={:.2}, tprec={:.1e}ns, material={}, bfield={}, hits={})",
                self.temperature,
                self.conv_dchi2,
                self.div_dchi2,
                self.osc_dchi2,
                self.time_precision,
                self.update_material,
                self.update_bfield,
                self.update_hits,
            )
        }
    }
}
