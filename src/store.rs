//! # Track Store
//!
//! Holds every track segment known to the process, sorted by start time.
//!
//! ## Ingestion
//! 1. Drop points without a timestamp, with non-finite coordinates, or whose time
//!    does not advance past the previously kept point
//! 2. Drop segments left without points
//! 3. Merge with the segments already stored and sort by first-point time
//! 4. Drop a segment whose first-point time equals that of the segment before it
//! 5. Publish the result as a new snapshot and rebuild the R-tree of bounds
//!
//! Step 4 compares only the first timestamp, so two different sessions that
//! start at the same instant collide and the later one is discarded.
//!
//! Snapshots are replaced whole, never edited in place. A [`crate::TrackMatcher`]
//! keeps the snapshot it was created from until it is rebound.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use log::{debug, info};
use once_cell::sync::Lazy;
use rstar::{RTree, RTreeObject, AABB};

use crate::matcher::{MatchConfig, TrackMatcher};
use crate::{geo_utils, Bounds, RawSegment, TrackPoint};

// ============================================================================
// Track Segment
// ============================================================================

/// A contiguous, strictly time-ascending run of GPS fixes from one session.
///
/// Never empty. Only created through ingestion, which enforces the ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSegment {
    pub(crate) points: Arc<[TrackPoint]>,
    pub(crate) bounds: Bounds,
}

/// Outcome of converting one raw segment.
struct Conversion {
    segment: Option<TrackSegment>,
    dropped_points: usize,
}

impl TrackSegment {
    /// Build a segment from reader output.
    ///
    /// Returns `None` if no usable point remains.
    pub fn from_raw(raw: &RawSegment) -> Option<Self> {
        Self::convert(raw).segment
    }

    fn convert(raw: &RawSegment) -> Conversion {
        let mut points: Vec<TrackPoint> = Vec::with_capacity(raw.points.len());

        for point in raw.points.iter().filter_map(|p| p.to_track_point()) {
            if !point.latitude.is_finite() || !point.longitude.is_finite() {
                continue;
            }
            if let Some(last) = points.last() {
                if point.time <= last.time {
                    continue;
                }
            }
            points.push(point);
        }

        let dropped_points = raw.points.len() - points.len();
        let segment = if points.is_empty() {
            None
        } else {
            let bounds = geo_utils::compute_bounds(&points);
            Some(Self {
                points: points.into(),
                bounds,
            })
        };

        Conversion {
            segment,
            dropped_points,
        }
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn first_point(&self) -> &TrackPoint {
        &self.points[0]
    }

    pub fn last_point(&self) -> &TrackPoint {
        &self.points[self.points.len() - 1]
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.first_point().time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.last_point().time
    }
}

// ============================================================================
// Spatial Index
// ============================================================================

/// Segment bounds wrapper for R-tree indexing.
#[derive(Debug, Clone)]
struct SegmentEnvelope {
    index: usize,
    bounds: Bounds,
}

impl RTreeObject for SegmentEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        to_envelope(&self.bounds)
    }
}

fn to_envelope(bounds: &Bounds) -> AABB<[f64; 2]> {
    AABB::from_corners(
        [bounds.min_lon, bounds.min_lat],
        [bounds.max_lon, bounds.max_lat],
    )
}

fn build_index(segments: &[TrackSegment]) -> RTree<SegmentEnvelope> {
    let envelopes = segments
        .iter()
        .enumerate()
        .map(|(index, segment)| SegmentEnvelope {
            index,
            bounds: segment.bounds,
        })
        .collect();
    RTree::bulk_load(envelopes)
}

// ============================================================================
// Track Store
// ============================================================================

/// Time-sorted, deduplicated collection of track segments.
#[derive(Debug, Clone, Default)]
pub struct TrackStore {
    segments: Arc<Vec<TrackSegment>>,
    index: RTree<SegmentEnvelope>,
    generation: u64,
}

impl TrackStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add raw segments from a track-log reader.
    ///
    /// Unusable points, empty segments and segments whose start time is
    /// already known are dropped silently. Matchers created before this call
    /// keep seeing the old snapshot until rebound.
    pub fn ingest(&mut self, raw_segments: Vec<RawSegment>) {
        let conversions: Vec<Conversion> = raw_segments.iter().map(TrackSegment::convert).collect();
        self.merge(conversions);
    }

    /// Same as [`TrackStore::ingest`], converting raw segments in parallel.
    #[cfg(feature = "parallel")]
    pub fn ingest_parallel(&mut self, raw_segments: Vec<RawSegment>) {
        use rayon::prelude::*;

        let conversions: Vec<Conversion> = raw_segments
            .par_iter()
            .map(TrackSegment::convert)
            .collect();
        self.merge(conversions);
    }

    fn merge(&mut self, conversions: Vec<Conversion>) {
        let offered = conversions.len();
        let mut dropped_points = 0;
        let mut empty_segments = 0;

        let mut combined: Vec<TrackSegment> =
            Vec::with_capacity(self.segments.len() + conversions.len());
        combined.extend(self.segments.iter().cloned());

        for conversion in conversions {
            dropped_points += conversion.dropped_points;
            match conversion.segment {
                Some(segment) => combined.push(segment),
                None => empty_segments += 1,
            }
        }

        // Stable sort: among equal start times the earlier-seen segment stays first
        combined.sort_by_key(|s| s.start_time());
        let before_dedup = combined.len();
        combined.dedup_by_key(|s| s.start_time());
        let duplicates = before_dedup - combined.len();

        self.index = build_index(&combined);
        self.segments = Arc::new(combined);
        self.generation += 1;

        if dropped_points > 0 || empty_segments > 0 {
            debug!(
                "[TrackStore] Dropped {} unusable points and {} empty segments",
                dropped_points, empty_segments
            );
        }
        info!(
            "[TrackStore] Ingested {} raw segments ({} duplicates dropped), store now holds {} segments",
            offered,
            duplicates,
            self.segments.len()
        );
    }

    /// True if at least one segment with a point is stored.
    pub fn has_tracks(&self) -> bool {
        self.segments.iter().any(|s| !s.is_empty())
    }

    /// The sorted, deduplicated segments.
    pub fn segments(&self) -> &[TrackSegment] {
        &self.segments
    }

    /// Shared handle to the current segment list.
    pub fn snapshot(&self) -> Arc<Vec<TrackSegment>> {
        Arc::clone(&self.segments)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of completed ingests. Changes whenever the segment list is replaced.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// All segments whose bounding box overlaps `bounds`, in store order.
    ///
    /// Touching edges count as overlap.
    pub fn intersecting_segments(&self, bounds: &Bounds) -> Vec<&TrackSegment> {
        let mut indices: Vec<usize> = self
            .index
            .locate_in_envelope_intersecting(&to_envelope(bounds))
            .map(|e| e.index)
            .collect();
        indices.sort_unstable();
        indices
            .into_iter()
            .filter_map(|i| self.segments.get(i))
            .collect()
    }
}

// ============================================================================
// Shared Store
// ============================================================================

/// A [`TrackStore`] that can be ingested into and read from several threads.
///
/// Ingest is the single writer. Each ingest swaps in a complete new segment
/// list, so readers never see a partially sorted one.
#[derive(Debug, Clone, Default)]
pub struct SharedTrackStore {
    inner: Arc<RwLock<TrackStore>>,
}

impl SharedTrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    // The list is only ever replaced whole, so a poisoned lock still guards a
    // consistent store.
    fn read(&self) -> RwLockReadGuard<'_, TrackStore> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrackStore> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ingest(&self, raw_segments: Vec<RawSegment>) {
        self.write().ingest(raw_segments);
    }

    #[cfg(feature = "parallel")]
    pub fn ingest_parallel(&self, raw_segments: Vec<RawSegment>) {
        self.write().ingest_parallel(raw_segments);
    }

    pub fn has_tracks(&self) -> bool {
        self.read().has_tracks()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.read().generation()
    }

    pub fn snapshot(&self) -> Arc<Vec<TrackSegment>> {
        self.read().snapshot()
    }

    /// A matcher over the current snapshot.
    pub fn matcher(&self) -> TrackMatcher {
        self.matcher_with_config(MatchConfig::default())
    }

    pub fn matcher_with_config(&self, config: MatchConfig) -> TrackMatcher {
        TrackMatcher::from_snapshot(self.snapshot(), config)
    }

    /// Segments overlapping `bounds`. Clones are cheap; points are shared.
    pub fn intersecting_segments(&self, bounds: &Bounds) -> Vec<TrackSegment> {
        self.read()
            .intersecting_segments(bounds)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Run `f` with read access to the underlying store.
    pub fn with_store<R>(&self, f: impl FnOnce(&TrackStore) -> R) -> R {
        f(&self.read())
    }
}

static GLOBAL_STORE: Lazy<SharedTrackStore> = Lazy::new(SharedTrackStore::new);

/// The process-wide track store.
pub fn global_store() -> &'static SharedTrackStore {
    &GLOBAL_STORE
}

// ============================================================================
// Tests
// ============================================================================
