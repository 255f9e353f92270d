//! # Algebraic type aliases for the kinematic fit
//!
//! Semantic aliases over [`nalgebra`] fixed-size vectors and matrices, sized to the
//! 6-parameter kinematic state space and to 3-dimensional space. All fit algebra is
//! written against these aliases rather than against raw `nalgebra` types, so the
//! dimension and the physical meaning of every quantity stay visible at the call site.
//!
//! Two families coexist and are **not miscible**:
//!
//! - *Physical* vectors ([`Vec3`], [`Vec4`], [`Mom4`]) – positions, directions,
//!   spacetime points, and momenta, carried as value types.
//! - *Algebraic* vectors and matrices ([`SVec3`], [`SVec6`], [`DVec`], [`DMat`], …) –
//!   parameter payloads, covariances, weights, and Jacobians of the Kalman algebra.
//!
//! `nalgebra` stores every matrix dense; the covariance aliases ([`DMat`], [`VMat`])
//! are symmetric by construction and must be kept symmetric by the code that fills them.

use nalgebra::{SMatrix, SVector, Vector3, Vector4};

/// Kinematic fit parameter space and phase space dimension
pub const NPARAMS: usize = 6;
/// Number of spatial dimensions
pub const NDIM: usize = 3;

// Physical vectors (space + spacetime)

/// Spatial-only vector (mm)
pub type Vec3 = Vector3<f64>;
/// Spacetime vector, 4th component = time (ns) or energy
pub type Vec4 = Vector4<f64>;
/// 4-momentum, 4th component = mass
pub type Mom4 = Vector4<f64>;

// Algebraic representations of spatial vectors

/// Algebraic spatial vector
pub type SVec3 = SVector<f64, NDIM>;
/// Particle state vector payload
pub type SVec6 = SVector<f64, NPARAMS>;
/// Spatial vector covariance, symmetric by construction
pub type VMat = SMatrix<f64, NDIM, NDIM>;
/// Parameter derivatives WRT space dimensions
pub type DPdV = SMatrix<f64, NPARAMS, NDIM>;
/// Space dimension derivatives WRT parameters
pub type DVdP = SMatrix<f64, NDIM, NPARAMS>;
/// Algebraic rotation matrix
pub type RMat = SMatrix<f64, NDIM, NDIM>;

// Purely algebraic vectors and matrices

/// Data vector for parameters and weights
pub type DVec = SVector<f64, NPARAMS>;
/// Parameter covariance / weight matrix, symmetric by construction
pub type DMat = SMatrix<f64, NPARAMS, NPARAMS>;
/// Parameter ↔ state translation matrix; this is not symmetric
pub type PSMat = SMatrix<f64, NPARAMS, NPARAMS>;
