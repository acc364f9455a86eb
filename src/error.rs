//! Error types shared by every stage of the simulation.
//!
//! Invalid inputs are rejected where they enter the library (configuration,
//! context construction, the public kernels) so that nothing deep inside a
//! grid evaluation has to deal with a zero radius or a zero-length vector.

use thiserror::Error;

/// Errors raised while validating simulation inputs.
#[derive(Debug, Error)]
pub enum MieError {
    /// A length, radius or distance that must be strictly positive was not.
    #[error("invalid geometry: {what} must be positive and finite, got {value}")]
    InvalidGeometry {
        /// Which quantity was rejected
        what: &'static str,
        /// The rejected value (a norm for vectors)
        value: f64,
    },

    /// Numerical apertures outside `[0, 1]` or an inverted annulus.
    #[error("invalid aperture: NA_in ({na_in}) and NA_out ({na_out}) must satisfy 0 <= NA_in <= NA_out <= 1")]
    InvalidAperture {
        /// Inner numerical aperture
        na_in: f64,
        /// Outer numerical aperture
        na_out: f64,
    },

    /// Any other unusable scalar configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two grids that must line up do not.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        /// Shape required by the operation
        expected: Vec<usize>,
        /// Shape that was supplied
        found: Vec<usize>,
    },
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, MieError>;

impl MieError {
    /// Returns `true` for geometry violations, including the `x > 0`
    /// precondition of the special-function kernels.
    pub fn is_geometry_error(&self) -> bool {
        matches!(self, MieError::InvalidGeometry { .. })
    }

    /// Returns `true` if the error stems from scalar configuration values.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            MieError::InvalidConfig(_) | MieError::InvalidAperture { .. }
        )
    }

    pub(crate) fn geometry(what: &'static str, value: f64) -> Self {
        MieError::InvalidGeometry { what, value }
    }
}

/// Fails with `InvalidGeometry` unless `value` is finite and strictly positive.
pub(crate) fn require_positive(what: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(MieError::geometry(what, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MieError::InvalidGeometry {
            what: "sphere radius",
            value: 0.0,
        };
        assert_eq!(
            err.to_string(),
            "invalid geometry: sphere radius must be positive and finite, got 0"
        );
    }

    #[test]
    fn test_error_categories() {
        let geometry = MieError::geometry("distance", -1.0);
        let aperture = MieError::InvalidAperture {
            na_in: 0.6,
            na_out: 0.5,
        };
        assert!(geometry.is_geometry_error());
        assert!(!geometry.is_config_error());
        assert!(aperture.is_config_error());
        assert!(!aperture.is_geometry_error());
    }

    #[test]
    fn test_require_positive() {
        assert_eq!(require_positive("radius", 2.5).unwrap(), 2.5);
        assert!(require_positive("radius", 0.0).is_err());
        assert!(require_positive("radius", f64::NAN).is_err());
        assert!(require_positive("radius", f64::INFINITY).is_err());
    }
}
