//! Map display support.
//!
//! Picks which segments to draw for a photo and thins their points so a map
//! client does not receive thousands of points that land on the same pixel.

use crate::error::{Result, TrackError};
use crate::matcher::Match;
use crate::store::{TrackSegment, TrackStore};
use crate::{Bounds, TrackPoint};

/// Configuration for preparing tracks for display.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DisplayConfig {
    /// Points closer than this to the previously kept point are dropped.
    /// Default: 2.0 pixels
    pub min_pixel_distance: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            min_pixel_distance: 2.0,
        }
    }
}

/// Which segments to show alongside a photo on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DisplayChoice {
    None,
    /// Only the segment the photo was matched in
    #[default]
    MatchingSegment,
    /// The matching segment and the segments before and after it
    MatchingSegmentAndNeighbours,
}

/// A map area and its size on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    bounds: Bounds,
    width: u32,
    height: u32,
}

impl Viewport {
    /// Fails with [`TrackError::InvalidViewport`] for an empty pixel area or
    /// bounds without extent.
    pub fn new(bounds: Bounds, width: u32, height: u32) -> Result<Self> {
        let lat_span = bounds.lat_span();
        let lon_span = bounds.lon_span();
        // Written so that NaN spans are rejected too
        if width == 0 || height == 0 || !(lat_span > 0.0) || !(lon_span > 0.0) {
            return Err(TrackError::InvalidViewport {
                width,
                height,
                lat_span,
                lon_span,
            });
        }
        Ok(Self {
            bounds,
            width,
            height,
        })
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn contains(&self, point: &TrackPoint) -> bool {
        self.bounds.contains(point.latitude, point.longitude)
    }

    fn pixels_per_degree(&self) -> (f64, f64) {
        (
            self.height as f64 / self.bounds.lat_span(),
            self.width as f64 / self.bounds.lon_span(),
        )
    }
}

/// Distance in pixels two points would have on (or off) the viewport.
pub fn pixel_distance(a: &TrackPoint, b: &TrackPoint, viewport: &Viewport) -> f64 {
    let (lat_scale, lon_scale) = viewport.pixels_per_degree();
    let dy = (a.latitude - b.latitude).abs() * lat_scale;
    let dx = (a.longitude - b.longitude).abs() * lon_scale;
    dx.hypot(dy)
}

/// Drop points that would be drawn on top of the previous kept point.
///
/// The first and last points are always kept, as is the first visible point
/// after a run of points outside the viewport, so lines re-entering the map
/// stay connected.
pub fn thin_for_viewport(
    points: &[TrackPoint],
    viewport: &Viewport,
    config: &DisplayConfig,
) -> Vec<TrackPoint> {
    let Some((first, rest)) = points.split_first() else {
        return Vec::new();
    };

    let mut kept = vec![*first];
    let mut offscreen_run = !viewport.contains(first);

    for (i, point) in rest.iter().enumerate() {
        let is_last = i + 1 == rest.len();
        let visible = viewport.contains(point);
        let reentry = visible && offscreen_run;
        offscreen_run = !visible;

        let far_enough = kept
            .last()
            .map_or(true, |last| pixel_distance(last, point, viewport) >= config.min_pixel_distance);

        if reentry || far_enough || is_last {
            kept.push(*point);
        }
    }

    kept
}

/// Segments to draw for a photo's match.
///
/// For a gap fill there is no matching segment, but its neighbours are the two
/// sessions on either side of the gap.
pub fn segments_for_display<'a>(found: Option<&Match<'a>>, choice: DisplayChoice) -> Vec<&'a TrackSegment> {
    let Some(found) = found else {
        return Vec::new();
    };

    match choice {
        DisplayChoice::None => Vec::new(),
        DisplayChoice::MatchingSegment => found.segment().into_iter().collect(),
        DisplayChoice::MatchingSegmentAndNeighbours => [
            found.segment(),
            found.previous_segment(),
            found.next_segment(),
        ]
        .into_iter()
        .flatten()
        .collect(),
    }
}

/// A coordinate sent to a map client.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DisplayPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A thinned segment ready for drawing.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DisplayTrack {
    pub points: Vec<DisplayPoint>,
}

impl DisplayTrack {
    /// Thin a segment for the given viewport.
    pub fn from_segment(segment: &TrackSegment, viewport: &Viewport, config: &DisplayConfig) -> Self {
        let points = thin_for_viewport(segment.points(), viewport, config)
            .into_iter()
            .map(|p| DisplayPoint {
                latitude: p.latitude,
                longitude: p.longitude,
            })
            .collect();
        Self { points }
    }
}

/// Every stored segment touching the viewport, thinned for display.
pub fn tracks_in_viewport(
    store: &TrackStore,
    viewport: &Viewport,
    config: &DisplayConfig,
) -> Vec<DisplayTrack> {
    store
        .intersecting_segments(viewport.bounds())
        .into_iter()
        .map(|segment| DisplayTrack::from_segment(segment, viewport, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RawSegment, RawTrackPoint, TrackMatcher};
    use chrono::{DateTime, Utc};

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn point(secs: i64, lat: f64, lon: f64) -> TrackPoint {
        TrackPoint::new(t(secs), lat, lon, None)
    }

    /// 1 degree square mapped onto 100x100 pixels: 0.01 degrees per pixel.
    fn viewport() -> Viewport {
        Viewport::new(Bounds::new(51.0, 52.0, 0.0, 1.0).unwrap(), 100, 100).unwrap()
    }

    #[test]
    fn test_viewport_validation() {
        let bounds = Bounds::new(51.0, 52.0, 0.0, 1.0).unwrap();
        assert!(Viewport::new(bounds, 0, 100).is_err());
        let flat = Bounds::new(51.0, 51.0, 0.0, 1.0).unwrap();
        assert!(matches!(
            Viewport::new(flat, 100, 100),
            Err(TrackError::InvalidViewport { .. })
        ));
    }

    #[test]
    fn test_pixel_distance() {
        let vp = viewport();
        let d = pixel_distance(&point(0, 51.0, 0.0), &point(1, 51.03, 0.04), &vp);
        assert!((d - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_thin_drops_close_points() {
        let vp = viewport();
        let points = vec![
            point(0, 51.10, 0.10),
            point(1, 51.101, 0.10), // 0.1 px
            point(2, 51.105, 0.10), // 0.5 px
            point(3, 51.15, 0.10),  // 5 px
            point(4, 51.151, 0.10), // last, always kept
        ];

        let thinned = thin_for_viewport(&points, &vp, &DisplayConfig::default());
        let times: Vec<_> = thinned.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![t(0), t(3), t(4)]);
    }

    #[test]
    fn test_thin_keeps_reentry_point() {
        let vp = viewport();
        let points = vec![
            point(0, 51.999, 0.5),
            point(1, 52.0001, 0.5), // just off the top edge, too close to keep
            point(2, 51.9995, 0.5), // back on screen, too close but re-entering
            point(3, 51.5, 0.5),
        ];

        let thinned = thin_for_viewport(&points, &vp, &DisplayConfig::default());
        let times: Vec<_> = thinned.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![t(0), t(2), t(3)]);
    }

    #[test]
    fn test_thin_empty_and_single() {
        let vp = viewport();
        assert!(thin_for_viewport(&[], &vp, &DisplayConfig::default()).is_empty());
        let single = [point(0, 51.5, 0.5)];
        assert_eq!(thin_for_viewport(&single, &vp, &DisplayConfig::default()).len(), 1);
    }

    fn three_sessions() -> TrackStore {
        let raw = |start: i64, lat: f64| {
            RawSegment::new(vec![
                RawTrackPoint::new(Some(t(start)), lat, 0.5, None),
                RawTrackPoint::new(Some(t(start + 100)), lat + 0.1, 0.6, None),
            ])
        };
        let mut store = TrackStore::new();
        store.ingest(vec![raw(100, 51.1), raw(300, 51.4), raw(500, 51.7)]);
        store
    }

    #[test]
    fn test_segments_for_display() {
        let store = three_sessions();
        let matcher = TrackMatcher::new(&store);
        let found = matcher.find_match(t(350));

        assert!(segments_for_display(found.as_ref(), DisplayChoice::None).is_empty());
        assert!(segments_for_display(None, DisplayChoice::MatchingSegment).is_empty());

        let only = segments_for_display(found.as_ref(), DisplayChoice::MatchingSegment);
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].start_time(), t(300));

        let with_neighbours =
            segments_for_display(found.as_ref(), DisplayChoice::MatchingSegmentAndNeighbours);
        let starts: Vec<_> = with_neighbours.iter().map(|s| s.start_time()).collect();
        assert_eq!(starts, vec![t(300), t(100), t(500)]);
    }

    #[test]
    fn test_segments_for_display_gap_fill() {
        let store = three_sessions();
        let matcher = TrackMatcher::new(&store);
        let found = matcher.find_match(t(250));
        assert!(found.unwrap().is_gap_fill());

        assert!(segments_for_display(found.as_ref(), DisplayChoice::MatchingSegment).is_empty());
        let around = segments_for_display(found.as_ref(), DisplayChoice::MatchingSegmentAndNeighbours);
        let starts: Vec<_> = around.iter().map(|s| s.start_time()).collect();
        assert_eq!(starts, vec![t(100), t(300)]);
    }

    #[test]
    fn test_tracks_in_viewport() {
        let store = three_sessions();
        let vp = Viewport::new(Bounds::new(51.0, 51.5, 0.0, 1.0).unwrap(), 200, 100).unwrap();

        let tracks = tracks_in_viewport(&store, &vp, &DisplayConfig::default());
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].points.len(), 2);
        assert_eq!(tracks[0].points[0].latitude, 51.1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_display_track_serializes() {
        let track = DisplayTrack {
            points: vec![DisplayPoint { latitude: 51.5, longitude: -0.1 }],
        };
        let json = serde_json::to_string(&track).unwrap();
        assert_eq!(json, r#"{"points":[{"latitude":51.5,"longitude":-0.1}]}"#);
    }
}
