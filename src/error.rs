//! Error type for the fallible constructors and parsers of this crate.
//!
//! Track ingestion and matching never fail: unusable points, empty or duplicate
//! segments and missing matches are normal outcomes, not errors.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TrackError>;

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    #[error("unknown provenance '{0}'")]
    UnknownProvenance(String),

    #[error(
        "invalid bounds: lat {min_lat}..{max_lat}, lon {min_lon}..{max_lon} \
         (values must be finite and min <= max)"
    )]
    InvalidBounds {
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
    },

    #[error("invalid viewport: {width}x{height} px over a {lat_span}x{lon_span} degree area")]
    InvalidViewport {
        width: u32,
        height: u32,
        lat_span: f64,
        lon_span: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackError::UnknownProvenance("gps-magic".to_string());
        assert!(err.to_string().contains("gps-magic"));

        let err = TrackError::InvalidViewport {
            width: 0,
            height: 600,
            lat_span: 0.1,
            lon_span: 0.1,
        };
        assert!(err.to_string().contains("0x600 px"));
    }
}
