//! Batch geotagging workflows.
//!
//! - [`match_photos`] tags photos whose capture time falls inside a recorded
//!   segment, leaving photos taken between sessions alone.
//! - [`fill_gaps`] only looks at photos without any location and also accepts
//!   brackets that span the gap between two sessions.
//!
//! Both reset the matcher's resume cursor and then visit photos in capture-time
//! order, so the result does not depend on the slice order or on queries the
//! matcher served before.

use chrono::{DateTime, Utc};
use log::info;

use crate::matcher::TrackMatcher;
use crate::photo::{CoordinateChange, PhotoRecord};

/// The writes made to one photo.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoUpdate {
    /// Position of the photo in the slice passed in
    pub index: usize,
    pub changes: Vec<CoordinateChange>,
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeotagReport {
    /// Photos that were eligible and had a capture time
    pub examined: usize,
    /// Photos a bracket was found and applied for, including ones whose
    /// existing EXIF location was kept
    pub matched: usize,
    /// Photos that actually changed
    pub updates: Vec<PhotoUpdate>,
}

impl GeotagReport {
    pub fn updated(&self) -> usize {
        self.updates.len()
    }
}

/// Tag every photo whose capture time lies inside a recorded segment.
pub fn match_photos<P: PhotoRecord>(matcher: &TrackMatcher, photos: &mut [P]) -> GeotagReport {
    let report = run(matcher, photos, |_| true, false);
    info!(
        "[Geotag] Matched {} of {} photos against tracks, {} updated",
        report.matched,
        report.examined,
        report.updated()
    );
    report
}

/// Give a location to every photo that has none, bridging gaps between sessions.
pub fn fill_gaps<P: PhotoRecord>(matcher: &TrackMatcher, photos: &mut [P]) -> GeotagReport {
    let report = run(matcher, photos, |photo| !photo.has_location(), true);
    info!(
        "[Geotag] Filled {} of {} gaps",
        report.matched, report.examined
    );
    report
}

fn run<P: PhotoRecord>(
    matcher: &TrackMatcher,
    photos: &mut [P],
    eligible: impl Fn(&P) -> bool,
    allow_gap_fill: bool,
) -> GeotagReport {
    let mut report = GeotagReport::default();
    if !matcher.has_tracks() {
        return report;
    }
    matcher.reset();

    let mut order: Vec<(usize, DateTime<Utc>)> = photos
        .iter()
        .enumerate()
        .filter(|(_, photo)| eligible(*photo))
        .filter_map(|(index, photo)| photo.capture_time().map(|time| (index, time)))
        .collect();
    order.sort_by_key(|&(index, time)| (time, index));

    for (index, time) in order {
        report.examined += 1;
        let Some(found) = matcher.find_match(time) else {
            continue;
        };
        if found.is_gap_fill() && !allow_gap_fill {
            continue;
        }

        report.matched += 1;
        let changes = matcher.apply(&found, &mut photos[index]);
        if !changes.is_empty() {
            report.updates.push(PhotoUpdate { index, changes });
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PhotoLocation, Provenance, RawSegment, RawTrackPoint, TrackStore};

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn two_sessions() -> TrackStore {
        let mut store = TrackStore::new();
        store.ingest(vec![
            RawSegment::new(vec![
                RawTrackPoint::new(Some(t(1000)), 51.0, 0.0, Some(10.0)),
                RawTrackPoint::new(Some(t(1600)), 51.1, 0.1, Some(20.0)),
            ]),
            RawSegment::new(vec![
                RawTrackPoint::new(Some(t(3000)), 52.0, 1.0, None),
                RawTrackPoint::new(Some(t(3600)), 52.1, 1.1, None),
            ]),
        ]);
        store
    }

    #[test]
    fn test_match_photos_skips_gaps() {
        let store = two_sessions();
        let matcher = TrackMatcher::new(&store);
        // Deliberately out of time order
        let mut photos = vec![
            PhotoLocation::new(t(3300)),
            PhotoLocation::new(t(2000)),
            PhotoLocation::new(t(1300)),
            PhotoLocation::new(t(9000)),
        ];

        let report = match_photos(&matcher, &mut photos);

        assert_eq!(report.examined, 4);
        assert_eq!(report.matched, 2);
        let indices: Vec<usize> = report.updates.iter().map(|u| u.index).collect();
        assert_eq!(indices, vec![2, 0]);
        assert_eq!(photos[0].provenance, Provenance::Track);
        assert_eq!(photos[1].provenance, Provenance::None);
        assert_eq!(photos[2].provenance, Provenance::Track);
        assert_eq!(photos[3].provenance, Provenance::None);
    }

    #[test]
    fn test_match_photos_counts_suppressed_exif_update() {
        let store = two_sessions();
        let matcher = TrackMatcher::new(&store);
        let mut photos = vec![PhotoLocation::with_exif_location(t(1300), 51.05, 0.05, None)];

        let report = match_photos(&matcher, &mut photos);

        assert_eq!(report.matched, 1);
        assert_eq!(report.updated(), 0);
        assert_eq!(photos[0].provenance, Provenance::Image);
    }

    #[test]
    fn test_fill_gaps_only_touches_photos_without_location() {
        let store = two_sessions();
        let matcher = TrackMatcher::new(&store);
        let mut manual = PhotoLocation::new(t(2100));
        manual.set_latitude(10.0, Provenance::Manual);
        manual.set_longitude(10.0, Provenance::Manual);

        let mut photos = vec![PhotoLocation::new(t(2300)), manual, PhotoLocation::new(t(1300))];

        let report = fill_gaps(&matcher, &mut photos);

        assert_eq!(report.examined, 2);
        assert_eq!(report.matched, 2);
        assert_eq!(photos[0].provenance, Provenance::Track);
        assert_eq!(photos[1].provenance, Provenance::Manual);
        assert_eq!(photos[1].latitude, Some(10.0));
        assert_eq!(photos[2].provenance, Provenance::Track);
        // 2300 is halfway between the end of the first session and the start of the second
        assert!((photos[0].latitude.unwrap() - 51.55).abs() < 1e-9);
    }

    #[test]
    fn test_photos_without_capture_time_are_skipped() {
        let store = two_sessions();
        let matcher = TrackMatcher::new(&store);
        let mut photos = vec![PhotoLocation {
            capture_time: None,
            latitude: None,
            longitude: None,
            altitude: None,
            provenance: Provenance::None,
        }];

        let report = fill_gaps(&matcher, &mut photos);
        assert_eq!(report, GeotagReport::default());
    }

    #[test]
    fn test_batches_share_one_matcher() {
        let store = two_sessions();
        let matcher = TrackMatcher::new(&store);

        let mut later = vec![PhotoLocation::new(t(3300))];
        assert_eq!(match_photos(&matcher, &mut later).matched, 1);
        assert_eq!(matcher.resume_index(), 1);

        let mut earlier = vec![PhotoLocation::new(t(1300))];
        let report = match_photos(&matcher, &mut earlier);
        assert_eq!(report.matched, 1);
        assert_eq!(earlier[0].provenance, Provenance::Track);

        let mut gap = vec![PhotoLocation::new(t(2000))];
        assert_eq!(fill_gaps(&matcher, &mut gap).matched, 1);
    }

    #[test]
    fn test_no_tracks() {
        let store = TrackStore::new();
        let matcher = TrackMatcher::new(&store);
        let mut photos = vec![PhotoLocation::new(t(1300))];

        let report = match_photos(&matcher, &mut photos);
        assert_eq!(report.examined, 0);
        assert_eq!(photos[0].provenance, Provenance::None);
    }
}
