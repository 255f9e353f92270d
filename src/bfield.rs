//! # Magnetic field model seam
//!
//! The fit never owns a field map: it borrows one for its whole lifetime and queries
//! it for the field value and derivatives at spatial points. [`MagneticField`] is the
//! contract of that collaborator; any map implementation (uniform, gridded, fitted
//! multipole expansion) can back a fit configuration.
//!
//! Implementations must be safe for concurrent reads: many tracks are fitted in
//! parallel against one shared map, so the trait requires [`Sync`].

use crate::algebra::{VMat, Vec3};
use crate::constants::Tesla;
use std::fmt;

/// Read-only magnetic field model queried by the fit.
///
/// Positions are in mm, field values in Tesla. The gradient is the 3×3 matrix of
/// spatial derivatives ∂Bᵢ/∂xⱼ in Tesla/mm.
pub trait MagneticField: fmt::Debug + Sync {
    /// Field vector at the given position.
    fn field_vect(&self, position: &Vec3) -> Vec3;

    /// Spatial gradient of the field at the given position.
    fn field_grad(&self, position: &Vec3) -> VMat;

    /// Whether the given position lies inside the map's domain of validity.
    fn in_range(&self, _position: &Vec3) -> bool {
        true
    }
}

/// Spatially constant field. The simplest production model, and the reference
/// implementation used by the test suite.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformField {
    bfield: Vec3,
}

impl UniformField {
    /// Uniform field with the given vector value (Tesla).
    pub fn new(bfield: Vec3) -> Self {
        UniformField { bfield }
    }

    /// Uniform solenoidal field of strength `bz` along the z axis.
    pub fn along_z(bz: Tesla) -> Self {
        UniformField {
            bfield: Vec3::new(0.0, 0.0, bz),
        }
    }
}

impl MagneticField for UniformField {
    fn field_vect(&self, _position: &Vec3) -> Vec3 {
        self.bfield
    }

    fn field_grad(&self, _position: &Vec3) -> VMat {
        VMat::zeros()
    }
}

#[cfg(test)]
mod bfield_test {
    use super::*;

    #[test]
    fn test_uniform_field() {
        let field = UniformField::along_z(1.0);
        let anywhere = Vec3::new(-55.0, 12.0, 1800.0);

        assert_eq!(field.field_vect(&anywhere), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(field.field_grad(&anywhere), VMat::zeros());
        assert!(field.in_range(&anywhere));
    }
}
