//! # Convergence assessment
//!
//! Inside one annealing stage, the fit driver runs algebraic (Kalman) passes and
//! records the χ²/dof after each. The change between successive passes decides the
//! stage's fate, with a fixed precedence that is the backbone of the whole annealed
//! fit: **convergence is checked before divergence, divergence before oscillation**.
//! Re-ordering these checks changes which fits survive, so the rule lives here, next
//! to the thresholds, rather than in every driver.
//!
//! The driver loop this serves looks like:
//!
//! ```rust
//! use kinfit::fit_config::convergence::Convergence;
//! use kinfit::fit_config::annealing::AnnealingStage;
//!
//! let stage = AnnealingStage::default();
//! let mut chi2_history: Vec<f64> = Vec::new();
//! # let run_pass = || 1.0_f64;
//! loop {
//!     chi2_history.push(run_pass());
//!     match stage.assess(&chi2_history) {
//!         Convergence::Proceed => continue, // bounded by max_algebraic_iter
//!         _verdict => break,                // converged, or the fit failed
//!     }
//! }
//! ```
//!
//! An [`Oscillating`](Convergence::Oscillating) verdict is a fit failure: the driver
//! must abort rather than force-advance to the next stage, so that a later, colder
//! stage never inherits an expansion point the current stage could not settle.

use itertools::Itertools;
use smallvec::SmallVec;

use crate::constants::Chi2;
use crate::fit_config::annealing::AnnealingStage;

/// Verdict on one annealing stage after an algebraic pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// No verdict yet: run another algebraic pass
    Proceed,
    /// χ²/dof change within the convergence threshold; advance to the next stage
    Converged,
    /// χ²/dof grew past the divergence threshold; the fit has failed
    Diverged,
    /// χ²/dof alternates without settling; the fit has failed
    Oscillating,
}

impl Convergence {
    /// Whether this verdict ends the whole fit unsuccessfully.
    pub fn is_failure(self) -> bool {
        matches!(self, Convergence::Diverged | Convergence::Oscillating)
    }

    /// Whether this verdict ends the current stage (successfully or not).
    pub fn is_terminal(self) -> bool {
        !matches!(self, Convergence::Proceed)
    }
}

impl std::fmt::Display for Convergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Convergence::Proceed => "proceed",
            Convergence::Converged => "converged",
            Convergence::Diverged => "diverged",
            Convergence::Oscillating => "oscillating",
        };
        write!(f, "{label}")
    }
}

impl AnnealingStage {
    /// Assess this stage against the χ²/dof history of its algebraic passes.
    ///
    /// `chi2_history` holds one χ²/dof value per completed pass, oldest first.
    /// Only the last three entries matter; earlier passes cannot influence the
    /// verdict. With fewer than two entries there is no change to judge yet and
    /// the verdict is [`Convergence::Proceed`].
    ///
    /// With `Δ` the change between the last two passes, in order of precedence:
    ///
    /// 1. `|Δ| ≤ conv_dchi2` → [`Convergence::Converged`] (equality converges),
    /// 2. `Δ ≥ div_dchi2` → [`Convergence::Diverged`] (signed: a large *improvement*
    ///    is never divergence),
    /// 3. sign of `Δ` flipped across the last three passes and `|Δ| ≤ osc_dchi2`
    ///    → [`Convergence::Oscillating`],
    /// 4. otherwise [`Convergence::Proceed`]; the driver bounds the pass count with
    ///    its `max_algebraic_iter`.
    pub fn assess(&self, chi2_history: &[Chi2]) -> Convergence {
        let tail = &chi2_history[chi2_history.len().saturating_sub(3)..];
        let deltas: SmallVec<[f64; 2]> = tail.iter().tuple_windows().map(|(a, b)| b - a).collect();

        let Some(&dchi2) = deltas.last() else {
            return Convergence::Proceed;
        };

        let flipped = deltas.len() == 2 && deltas[0] * dchi2 < 0.0;

        let verdict = if dchi2.abs() <= self.conv_dchi2 {
            Convergence::Converged
        } else if dchi2 >= self.div_dchi2 {
            Convergence::Diverged
        } else if flipped && dchi2.abs() <= self.osc_dchi2 {
            Convergence::Oscillating
        } else {
            Convergence::Proceed
        };

        log::trace!(
            "pass {}: dchi2 = {dchi2:.4} -> {verdict}",
            chi2_history.len(),
        );
        if verdict.is_failure() {
            log::debug!(
                "stage {:?} failed after {} passes: {verdict} (dchi2 = {dchi2:.4})",
                self.index,
                chi2_history.len(),
            );
        }

        verdict
    }
}
