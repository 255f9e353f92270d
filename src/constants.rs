//! # Constants and type definitions for kinfit
//!
//! This module centralizes the **physical constants**, **unit aliases**, and **common type
//! definitions** used throughout the `kinfit` library.
//!
//! ## Overview
//!
//! - Physical constants in the tracking unit system (millimeters, nanoseconds, Tesla)
//! - Semantic aliases for scalar quantities carried by the fit
//! - Container type for the annealing schedule
//!
//! These definitions are used by all main modules, including the fit configuration,
//! the convergence assessment, and the collaborator seams.

use crate::fit_config::annealing::AnnealingStage;
use smallvec::SmallVec;

// -------------------------------------------------------------------------------------------------
// Physical constants
// -------------------------------------------------------------------------------------------------

/// Speed of light in mm/ns
pub const CLIGHT: f64 = 299.792458;

/// Numerical epsilon used for floating-point comparisons
pub const EPS: f64 = 1e-9;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Time or time interval in nanoseconds
pub type Nanosecond = f64;
/// Distance in millimeters
pub type Millimeter = f64;
/// Magnetic field strength in Tesla
pub type Tesla = f64;
/// Chi-squared per degree of freedom
pub type Chi2 = f64;

// -------------------------------------------------------------------------------------------------
// Data containers
// -------------------------------------------------------------------------------------------------

/// A small, inline-optimized container for the annealing stages of a single fit.
pub type AnnealingSchedule = SmallVec<[AnnealingStage; 8]>;
