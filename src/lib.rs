//! # Track Geotag
//!
//! Geotag photos by matching their capture time against recorded GPS track logs.
//!
//! This library provides:
//! - A time-sorted, deduplicated store of track segments with bounding-box queries
//! - A bracket matcher with a resume cursor for monotonic query streams
//! - Gap filling between separate recording sessions
//! - Linear interpolation of position and elevation
//! - A write-suppression rule that leaves EXIF coordinates alone when a track agrees
//!
//! ## Features
//!
//! - **`parallel`** - Convert raw segments in parallel with rayon during ingest
//! - **`serde`** - Serialize/Deserialize for the public value types
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::DateTime;
//! use track_geotag::{
//!     PhotoLocation, PhotoRecord, Provenance, RawSegment, RawTrackPoint, TrackMatcher,
//!     TrackStore,
//! };
//!
//! let t = |secs| DateTime::from_timestamp(secs, 0).unwrap();
//!
//! let mut store = TrackStore::new();
//! store.ingest(vec![RawSegment::new(vec![
//!     RawTrackPoint::new(Some(t(1000)), 51.0, 0.0, Some(10.0)),
//!     RawTrackPoint::new(Some(t(1600)), 51.1, 0.1, Some(20.0)),
//! ])]);
//!
//! let matcher = TrackMatcher::new(&store);
//! let mut photo = PhotoLocation::new(t(1300));
//!
//! if let Some(found) = matcher.find_match(t(1300)) {
//!     let changes = matcher.apply(&found, &mut photo);
//!     assert_eq!(changes.len(), 3);
//! }
//! assert_eq!(photo.provenance(), Provenance::Track);
//! assert!((photo.latitude().unwrap() - 51.05).abs() < 1e-9);
//! ```

use chrono::{DateTime, Utc};

// Unified error handling
pub mod error;
pub use error::{Result, TrackError};

// Geographic utilities (distance, bounds, interpolation)
pub mod geo_utils;

// Photo records and coordinate provenance
pub mod photo;
pub use photo::{CoordinateChange, CoordinateField, PhotoLocation, PhotoRecord, Provenance};

// Track segment storage
pub mod store;
pub use store::{global_store, SharedTrackStore, TrackSegment, TrackStore};

// Time-based matching and interpolation
pub mod matcher;
pub use matcher::{InterpolatedPosition, Match, MatchConfig, TrackMatcher};

// Batch workflows over many photos
pub mod geotag;
pub use geotag::{fill_gaps, match_photos, GeotagReport, PhotoUpdate};

// Map display support (segment selection, viewport thinning)
pub mod display;
pub use display::{
    segments_for_display, thin_for_viewport, tracks_in_viewport, DisplayChoice, DisplayConfig,
    DisplayPoint, DisplayTrack, Viewport,
};

// ============================================================================
// Core Types
// ============================================================================

/// A recorded GPS fix with a timestamp.
///
/// Points are stored inside a [`TrackSegment`] behind a shared slice and are
/// never mutated once ingested.
///
/// # Example
/// ```
/// use chrono::DateTime;
/// use track_geotag::TrackPoint;
///
/// let time = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
/// let point = TrackPoint::new(time, 51.5074, -0.1278, None);
/// assert_eq!(point.elevation_or_zero(), 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackPoint {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters; `None` when the receiver did not report one
    pub elevation: Option<f64>,
}

impl TrackPoint {
    /// Create a new track point.
    pub fn new(time: DateTime<Utc>, latitude: f64, longitude: f64, elevation: Option<f64>) -> Self {
        Self {
            time,
            latitude,
            longitude,
            elevation,
        }
    }

    /// Elevation used for interpolation. The stored value stays `None`.
    pub fn elevation_or_zero(&self) -> f64 {
        self.elevation.unwrap_or(0.0)
    }
}

/// A point as delivered by a track-log reader, possibly without a timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawTrackPoint {
    pub time: Option<DateTime<Utc>>,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
}

impl RawTrackPoint {
    pub fn new(
        time: Option<DateTime<Utc>>,
        latitude: f64,
        longitude: f64,
        elevation: Option<f64>,
    ) -> Self {
        Self {
            time,
            latitude,
            longitude,
            elevation,
        }
    }

    /// The usable point, or `None` if the reader supplied no time.
    pub fn to_track_point(&self) -> Option<TrackPoint> {
        self.time
            .map(|time| TrackPoint::new(time, self.latitude, self.longitude, self.elevation))
    }
}

/// One logging session as read from a track file.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawSegment {
    pub points: Vec<RawTrackPoint>,
}

impl RawSegment {
    pub fn new(points: Vec<RawTrackPoint>) -> Self {
        Self { points }
    }
}

/// Latitude/longitude rectangle in signed degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    /// Create validated bounds.
    ///
    /// Fails with [`TrackError::InvalidBounds`] if any value is not finite or a
    /// minimum exceeds its maximum.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self> {
        let all_finite = [min_lat, max_lat, min_lon, max_lon]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite || min_lat > max_lat || min_lon > max_lon {
            return Err(TrackError::InvalidBounds {
                min_lat,
                max_lat,
                min_lon,
                max_lon,
            });
        }
        Ok(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    /// Create bounds enclosing the given points.
    pub fn from_points(points: &[TrackPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        Some(geo_utils::compute_bounds(points))
    }

    /// Check if two rectangles overlap. Touching edges count as overlap.
    pub fn intersects(&self, other: &Bounds) -> bool {
        geo_utils::bounds_intersect(self, other)
    }

    /// Check if a coordinate lies inside (or on the edge of) the rectangle.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.min_lat
            && latitude <= self.max_lat
            && longitude >= self.min_lon
            && longitude <= self.max_lon
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }
}

// ============================================================================
// Tests
// ============================================================================
