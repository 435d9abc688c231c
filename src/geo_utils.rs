//! # Geographic Utilities
//!
//! Small geographic and numeric helpers shared by the store, the matcher and
//! the display code.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`great_circle_distance`] | Great-circle distance between two coordinates in meters |
//! | [`compute_bounds`] | Bounding box of a run of track points |
//! | [`bounds_intersect`] | Check if two bounding boxes overlap |
//! | [`time_ratio`] | Position of an instant inside a time interval |
//! | [`apply_ratio`] | Linear blend between two values |
//!
//! ## Example
//!
//! ```rust
//! use track_geotag::geo_utils;
//!
//! // London to Paris
//! let dist = geo_utils::great_circle_distance(51.5074, -0.1278, 48.8566, 2.3522);
//! assert!((dist - 343_560.0).abs() < 5000.0);
//!
//! assert_eq!(geo_utils::apply_ratio(10.0, 20.0, 0.5), 15.0);
//! ```
//!
//! All coordinates are WGS84 latitude/longitude in degrees.

use chrono::{DateTime, TimeDelta, Utc};
use geo::{Distance, Haversine, Point};

use crate::{Bounds, TrackPoint};

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance in meters between two coordinates.
///
/// Uses the haversine formula on a spherical Earth (radius 6,371 km). Altitude is
/// ignored.
#[inline]
pub fn great_circle_distance(latitude1: f64, longitude1: f64, latitude2: f64, longitude2: f64) -> f64 {
    let point1 = Point::new(longitude1, latitude1);
    let point2 = Point::new(longitude2, latitude2);
    Haversine::distance(point1, point2)
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box of a run of track points.
///
/// For empty input the result has MIN/MAX values that fail any overlap check;
/// use [`Bounds::from_points`] when the input may be empty.
pub fn compute_bounds(points: &[TrackPoint]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lon = f64::MAX;
    let mut max_lon = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude);
        max_lat = max_lat.max(p.latitude);
        min_lon = min_lon.min(p.longitude);
        max_lon = max_lon.max(p.longitude);
    }

    Bounds {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    }
}

/// Check if two bounding boxes overlap.
///
/// There are four ways two rectangles can be disjoint; they intersect if none
/// applies. Shared edges count as an intersection.
pub fn bounds_intersect(a: &Bounds, b: &Bounds) -> bool {
    !(a.min_lat > b.max_lat
        || b.min_lat > a.max_lat
        || a.min_lon > b.max_lon
        || b.min_lon > a.max_lon)
}

// =============================================================================
// Interpolation Functions
// =============================================================================

/// Where `target` lies between `start` and `end`, as a fraction.
///
/// 0.0 at `start`, 1.0 at `end`. Uses the full nanosecond precision of the
/// timestamps. Returns `None` only when `start == end`.
pub fn time_ratio(start: DateTime<Utc>, target: DateTime<Utc>, end: DateTime<Utc>) -> Option<f64> {
    if end == start {
        return None;
    }
    Some(delta_seconds(target - start) / delta_seconds(end - start))
}

/// Exact length of a time delta in seconds.
fn delta_seconds(delta: TimeDelta) -> f64 {
    match delta.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 1e9,
        // Beyond roughly 292 years of nanoseconds
        None => delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1e9,
    }
}

/// The value `ratio` of the way from `start` to `end`.
#[inline]
pub fn apply_ratio(start: f64, end: f64, ratio: f64) -> f64 {
    start + ratio * (end - start)
}

// =============================================================================
// Unit Tests
// =============================================================================
