//! Geotag a handful of photos against two recorded sessions.
//!
//! Run with: RUST_LOG=debug cargo run --example geotag_photos

use chrono::{DateTime, Utc};
use track_geotag::{
    fill_gaps, match_photos, segments_for_display, tracks_in_viewport, Bounds, DisplayChoice,
    DisplayConfig, PhotoLocation, RawSegment, RawTrackPoint, TrackMatcher, TrackStore, Viewport,
};

fn t(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

fn main() {
    env_logger::init();

    // Morning walk and afternoon ride (London area), an hour apart
    let morning = RawSegment::new(vec![
        RawTrackPoint::new(Some(t(0)), 51.5074, -0.1278, Some(11.0)),
        RawTrackPoint::new(Some(t(300)), 51.5090, -0.1300, Some(14.0)),
        RawTrackPoint::new(Some(t(600)), 51.5110, -0.1320, Some(18.0)),
    ]);
    let afternoon = RawSegment::new(vec![
        RawTrackPoint::new(Some(t(4200)), 51.5200, -0.1000, None),
        RawTrackPoint::new(Some(t(4800)), 51.5300, -0.0900, None),
    ]);

    let mut store = TrackStore::new();
    store.ingest(vec![afternoon, morning]);

    println!("Track Geotag Example\n");
    println!("Stored {} segments:", store.len());
    for segment in store.segments() {
        println!(
            "  {} -> {} ({} points)",
            segment.start_time(),
            segment.end_time(),
            segment.len()
        );
    }

    let mut photos = vec![
        PhotoLocation::new(t(150)),
        PhotoLocation::with_exif_location(t(450), 51.509995, -0.130995, None),
        PhotoLocation::new(t(2400)),
        PhotoLocation::new(t(4500)),
        PhotoLocation::new(t(9000)),
    ];

    let matcher = TrackMatcher::new(&store);

    println!("\n1. Match photos inside recorded segments:");
    let report = match_photos(&matcher, &mut photos);
    println!(
        "   examined={} matched={} updated={}",
        report.examined,
        report.matched,
        report.updated()
    );

    println!("\n2. Fill the gap between sessions:");
    let report = fill_gaps(&matcher, &mut photos);
    println!("   filled {} of {}", report.matched, report.examined);

    println!("\nPhotos:");
    for (i, photo) in photos.iter().enumerate() {
        match (photo.latitude, photo.longitude) {
            (Some(lat), Some(lon)) => println!(
                "  #{i}: {:.5}, {:.5} alt={:?} [{}]",
                lat, lon, photo.altitude, photo.provenance
            ),
            _ => println!("  #{i}: no location"),
        }
    }

    println!("\n3. Segments to show for the gap photo:");
    let found = matcher.find_match_full_scan(t(2400));
    for segment in segments_for_display(found.as_ref(), DisplayChoice::MatchingSegmentAndNeighbours) {
        println!("   segment starting {}", segment.start_time());
    }

    println!("\n4. Tracks thinned for a 400x300 map:");
    let Ok(bounds) = Bounds::new(51.50, 51.54, -0.14, -0.08) else {
        return;
    };
    match Viewport::new(bounds, 400, 300) {
        Ok(viewport) => {
            for track in tracks_in_viewport(&store, &viewport, &DisplayConfig::default()) {
                println!("   {} points", track.points.len());
            }
        }
        Err(e) => println!("   {e}"),
    }
}
