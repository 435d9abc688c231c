//! # Track Matching
//!
//! Finds the pair of track points that bracket a photo's capture time and
//! interpolates a position between them.
//!
//! ## Search
//! Segments are scanned in start-time order from the matcher's resume cursor:
//! 1. A segment with two or more points whose time span contains the query is
//!    binary searched; the bracket is the pair around the insertion point
//!    (an exact hit on the first point brackets points 0 and 1)
//! 2. Otherwise the latest segment ending at or before the query supplies the
//!    "last point before", and the first segment starting at or after it
//!    supplies the "first point after" and ends the scan
//! 3. If no segment contains the query but both sides exist, the bracket spans
//!    the gap between the two sessions
//!
//! ## Resume cursor
//! Segments that end before a query can never contain a later query, so the
//! cursor moves past them permanently. This is only valid when queries arrive in
//! non-decreasing time order; use [`TrackMatcher::find_match_full_scan`] or
//! [`TrackMatcher::reset`] for anything else.

use std::cell::Cell;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;

use crate::geo_utils::{apply_ratio, great_circle_distance, time_ratio};
use crate::photo::{CoordinateChange, CoordinateField, PhotoRecord, Provenance};
use crate::store::{TrackSegment, TrackStore};
use crate::TrackPoint;

/// Configuration for applying matches to photo records.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchConfig {
    /// Coordinates read from EXIF are only replaced if the track position is
    /// farther away than this.
    /// Default: 1.0 meters
    pub update_threshold_meters: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            update_threshold_meters: 1.0,
        }
    }
}

/// A pair of track points bracketing a query time.
#[derive(Debug, Clone, Copy)]
pub struct Match<'a> {
    time: DateTime<Utc>,
    previous: &'a TrackPoint,
    next: &'a TrackPoint,
    segment: Option<&'a TrackSegment>,
    previous_segment: Option<&'a TrackSegment>,
    next_segment: Option<&'a TrackSegment>,
}

impl<'a> Match<'a> {
    /// The query time this bracket was found for.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn previous(&self) -> &'a TrackPoint {
        self.previous
    }

    pub fn next(&self) -> &'a TrackPoint {
        self.next
    }

    /// The segment containing both points, `None` for a gap fill.
    pub fn segment(&self) -> Option<&'a TrackSegment> {
        self.segment
    }

    /// For a segment match, the segment before it in time order. For a gap
    /// fill, the segment that supplied [`Match::previous`].
    pub fn previous_segment(&self) -> Option<&'a TrackSegment> {
        self.previous_segment
    }

    /// For a segment match, the segment after it in time order. For a gap
    /// fill, the segment that supplied [`Match::next`].
    pub fn next_segment(&self) -> Option<&'a TrackSegment> {
        self.next_segment
    }

    /// True if the bracket spans two different recording sessions.
    pub fn is_gap_fill(&self) -> bool {
        self.segment.is_none()
    }

    /// Linearly interpolate the position at the query time.
    ///
    /// Missing elevations count as 0 here only.
    ///
    /// # Panics
    ///
    /// If both bracket points carry the same time. Ingestion never produces
    /// such a bracket, so this means a segment invariant was broken.
    pub fn interpolate(&self) -> InterpolatedPosition {
        let ratio = match time_ratio(self.previous.time, self.time, self.next.time) {
            Some(ratio) => ratio,
            None => panic!(
                "[TrackMatcher] zero-duration bracket at {}: track points must have strictly ascending times",
                self.previous.time
            ),
        };

        InterpolatedPosition {
            latitude: apply_ratio(self.previous.latitude, self.next.latitude, ratio),
            longitude: apply_ratio(self.previous.longitude, self.next.longitude, ratio),
            elevation: apply_ratio(
                self.previous.elevation_or_zero(),
                self.next.elevation_or_zero(),
                ratio,
            ),
            ratio,
        }
    }
}

/// Position interpolated between two track points.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterpolatedPosition {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters
    pub elevation: f64,
    /// 0.0 at the previous point, 1.0 at the next
    pub ratio: f64,
}

/// Result of one scan over the segment list.
struct Search<'a> {
    found: Option<Match<'a>>,
    resume_index: usize,
}

/// Stateful matcher over a snapshot of a [`TrackStore`].
///
/// Queries must arrive in non-decreasing time order: the matcher remembers how
/// far into the segment list earlier queries got and does not look back. The
/// cursor is instance state, so give every caller sequence its own matcher. The
/// type is `Send` but not `Sync`.
#[derive(Debug)]
pub struct TrackMatcher {
    segments: Arc<Vec<TrackSegment>>,
    resume_index: Cell<usize>,
    config: MatchConfig,
}

impl TrackMatcher {
    /// Create a matcher over the store's current segments.
    pub fn new(store: &TrackStore) -> Self {
        Self::with_config(store, MatchConfig::default())
    }

    pub fn with_config(store: &TrackStore, config: MatchConfig) -> Self {
        Self::from_snapshot(store.snapshot(), config)
    }

    pub fn from_snapshot(segments: Arc<Vec<TrackSegment>>, config: MatchConfig) -> Self {
        Self {
            segments,
            resume_index: Cell::new(0),
            config,
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn has_tracks(&self) -> bool {
        self.segments.iter().any(|s| !s.is_empty())
    }

    /// Current position of the resume cursor.
    pub fn resume_index(&self) -> usize {
        self.resume_index.get()
    }

    /// Forget how far earlier queries got.
    pub fn reset(&self) {
        self.resume_index.set(0);
    }

    /// Switch to the store's current segments and reset the cursor.
    pub fn rebind(&mut self, store: &TrackStore) {
        self.segments = store.snapshot();
        self.reset();
    }

    /// True if the store has been ingested into since this matcher was bound.
    pub fn is_stale(&self, store: &TrackStore) -> bool {
        !Arc::ptr_eq(&self.segments, &store.snapshot())
    }

    /// Find the bracket for `time`, resuming from where earlier queries stopped.
    ///
    /// Successive calls on one matcher must use non-decreasing times. An
    /// out-of-order call does not fail but may miss a bracket that a full scan
    /// would find.
    pub fn find_match(&self, time: DateTime<Utc>) -> Option<Match<'_>> {
        let search = self.search(time, self.resume_index.get());
        self.resume_index.set(search.resume_index);
        search.found
    }

    /// Find the bracket for `time` scanning every segment. The cursor is
    /// neither used nor moved.
    pub fn find_match_full_scan(&self, time: DateTime<Utc>) -> Option<Match<'_>> {
        self.search(time, 0).found
    }

    fn search(&self, time: DateTime<Utc>, start: usize) -> Search<'_> {
        let segments = self.segments.as_slice();
        let mut resume_index = start;
        let mut last_before: Option<(usize, &TrackPoint)> = None;
        let mut first_after: Option<(usize, &TrackPoint)> = None;

        for (i, segment) in segments.iter().enumerate().skip(start) {
            let points = segment.points();
            if points.is_empty() {
                continue;
            }

            if points.len() >= 2 {
                if let Some(k) = bracket_index(points, time) {
                    debug!(
                        "[TrackMatcher] {} inside segment {} between points {} and {}",
                        time,
                        i,
                        k - 1,
                        k
                    );
                    return Search {
                        found: Some(Match {
                            time,
                            previous: &points[k - 1],
                            next: &points[k],
                            segment: Some(segment),
                            previous_segment: i.checked_sub(1).and_then(|j| segments.get(j)),
                            next_segment: segments.get(i + 1),
                        }),
                        resume_index: i,
                    };
                }
            }

            if segment.start_time() >= time {
                // Later segments start later still
                first_after = Some((i, segment.first_point()));
                break;
            } else if segment.end_time() <= time {
                let is_latest = last_before.map_or(true, |(_, p)| p.time < segment.end_time());
                if is_latest {
                    last_before = Some((i, segment.last_point()));
                    resume_index = i;
                }
            }
        }

        let found = match (last_before, first_after) {
            (Some((before_index, previous)), Some((after_index, next))) => {
                debug!(
                    "[TrackMatcher] {} in gap between segments {} and {}",
                    time, before_index, after_index
                );
                Some(Match {
                    time,
                    previous,
                    next,
                    segment: None,
                    previous_segment: segments.get(before_index),
                    next_segment: segments.get(after_index),
                })
            }
            _ => {
                debug!("[TrackMatcher] No track covers {}", time);
                None
            }
        };

        Search {
            found,
            resume_index,
        }
    }

    /// Interpolate the match and write it to `photo` unless the write is
    /// pointless.
    ///
    /// Coordinates that came from the image's EXIF data are kept if the track
    /// position is within [`MatchConfig::update_threshold_meters`] of them;
    /// every other provenance is always overwritten. Returns the writes
    /// performed, empty if the update was suppressed.
    pub fn apply<P: PhotoRecord + ?Sized>(&self, found: &Match<'_>, photo: &mut P) -> Vec<CoordinateChange> {
        let position = found.interpolate();

        if !self.should_update(&position, photo) {
            debug!(
                "[TrackMatcher] Keeping EXIF location, track position at {} is within {}m",
                found.time, self.config.update_threshold_meters
            );
            return Vec::new();
        }

        let old_provenance = photo.provenance();
        let new_provenance = Provenance::Track;
        let change = |field, old_value, new_value| CoordinateChange {
            field,
            old_value,
            new_value,
            old_provenance,
            new_provenance,
        };

        let mut changes = Vec::with_capacity(3);

        let old = photo.latitude();
        photo.set_latitude(position.latitude, new_provenance);
        changes.push(change(CoordinateField::Latitude, old, position.latitude));

        let old = photo.longitude();
        photo.set_longitude(position.longitude, new_provenance);
        changes.push(change(CoordinateField::Longitude, old, position.longitude));

        let old = photo.altitude();
        photo.set_altitude(position.elevation, new_provenance);
        changes.push(change(CoordinateField::Altitude, old, position.elevation));

        changes
    }

    fn should_update<P: PhotoRecord + ?Sized>(&self, position: &InterpolatedPosition, photo: &P) -> bool {
        if photo.provenance() != Provenance::Image {
            return true;
        }
        match (photo.latitude(), photo.longitude()) {
            (Some(latitude), Some(longitude)) => {
                let distance =
                    great_circle_distance(position.latitude, position.longitude, latitude, longitude);
                distance > self.config.update_threshold_meters
            }
            // EXIF provenance without usable coordinates: the track is better
            _ => true,
        }
    }
}

/// Index `k` such that `points[k - 1]` and `points[k]` bracket `time`, or
/// `None` if `time` lies outside the segment. Needs at least two points.
fn bracket_index(points: &[TrackPoint], time: DateTime<Utc>) -> Option<usize> {
    match points.binary_search_by(|p| p.time.cmp(&time)) {
        Ok(exact) => Some(exact.max(1)),
        Err(k) if k > 0 && k < points.len() => Some(k),
        Err(_) => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
