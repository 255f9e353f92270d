//! # Hit state update policies
//!
//! During an annealed fit, each stage may re-evaluate the internal state of the
//! measurement hits: whether a hit participates in the fit at all, and which side of
//! the sense wire the particle passed on. The policies that drive those updates are
//! open-ended – every hit class brings its own – so the schedule carries them as
//! polymorphic [`HitUpdater`] handles.
//!
//! ## Capability negotiation
//!
//! A stage holds an ordered sequence of updaters. A hit class walks that sequence
//! looking for the concrete updater type it understands (via
//! [`AnnealingStage::updater`](crate::fit_config::annealing::AnnealingStage::updater))
//! and silently skips every entry it does not recognize. This is a negotiation
//! mechanism, not a registry: attaching an updater no hit class recognizes is legal
//! and has no effect.

use std::any::Any;
use std::fmt;

/// Left/right passage ambiguity of a wire measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ambiguity {
    /// Particle passed on the left side of the wire
    Left,
    /// Ambiguity unresolved; the measurement is used without a side
    #[default]
    Null,
    /// Particle passed on the right side of the wire
    Right,
}

/// Mutable per-hit state an updater acts on.
#[derive(Debug, Clone, PartialEq)]
pub struct HitState {
    /// Whether the hit contributes to the fit
    pub active: bool,
    /// Current left/right assignment
    pub ambiguity: Ambiguity,
}

impl Default for HitState {
    fn default() -> Self {
        HitState {
            active: true,
            ambiguity: Ambiguity::Null,
        }
    }
}

/// Result of applying one updater to one hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The hit state changed
    Updated,
    /// The hit state was already compliant
    Unchanged,
}

/// One hit-class-specific update policy, applied to every relevant hit when a stage
/// with `update_hits` set is entered.
pub trait HitUpdater: fmt::Debug + Send + Sync {
    /// Apply this policy to one hit's internal state.
    fn apply_to(&self, hit: &mut HitState) -> UpdateOutcome;

    /// Concrete-type access used by hit classes to recognize their own updater.
    fn as_any(&self) -> &dyn Any;
}

/// Releases the left/right assignment of every hit, letting the next algebraic pass
/// re-resolve it under the stage's inflated variance. The classic opening move of a
/// high-temperature stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AmbigFreeUpdater;

impl HitUpdater for AmbigFreeUpdater {
    fn apply_to(&self, hit: &mut HitState) -> UpdateOutcome {
        if hit.ambiguity == Ambiguity::Null {
            UpdateOutcome::Unchanged
        } else {
            hit.ambiguity = Ambiguity::Null;
            UpdateOutcome::Updated
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Forces the activity flag of every hit, typically to give hits deactivated by an
/// earlier, hotter stage another chance once the variance inflation has come down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitActivityUpdater {
    /// Activity state to impose
    pub activate: bool,
}

impl HitUpdater for HitActivityUpdater {
    fn apply_to(&self, hit: &mut HitState) -> UpdateOutcome {
        if hit.active == self.activate {
            UpdateOutcome::Unchanged
        } else {
            hit.active = self.activate;
            UpdateOutcome::Updated
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
