//! Photo records as seen by the matcher.
//!
//! The matcher only reads a record's current coordinates and provenance, and
//! writes new values through three independent setters. Anything else about a
//! photo (file path, EXIF encoding, undo history) belongs to the caller.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::{Result, TrackError};

/// How a photo's current coordinates were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Provenance {
    /// No location known
    #[default]
    None,
    /// Read from the image's EXIF data
    #[cfg_attr(feature = "serde", serde(rename = "from-image-exif"))]
    Image,
    /// Entered by hand
    Manual,
    /// Picked on a map
    Map,
    /// Interpolated from neighbouring photos
    Interpolated,
    /// Computed from a track log
    #[cfg_attr(feature = "serde", serde(rename = "from-track-log"))]
    Track,
    /// Copied from another photo
    Copied,
    /// Looked up from an external service
    ExternalService,
    /// Pasted from the clipboard
    Clipboard,
}

impl Provenance {
    pub const ALL: [Provenance; 9] = [
        Provenance::None,
        Provenance::Image,
        Provenance::Manual,
        Provenance::Map,
        Provenance::Interpolated,
        Provenance::Track,
        Provenance::Copied,
        Provenance::ExternalService,
        Provenance::Clipboard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::None => "none",
            Provenance::Image => "from-image-exif",
            Provenance::Manual => "manual",
            Provenance::Map => "map",
            Provenance::Interpolated => "interpolated",
            Provenance::Track => "from-track-log",
            Provenance::Copied => "copied",
            Provenance::ExternalService => "external-service",
            Provenance::Clipboard => "clipboard",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provenance {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self> {
        Provenance::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| TrackError::UnknownProvenance(s.to_string()))
    }
}

/// Which coordinate a [`CoordinateChange`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CoordinateField {
    Latitude,
    Longitude,
    Altitude,
}

/// A single write performed on a photo record.
///
/// Returned to the caller so it can decide whether to record undo history.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoordinateChange {
    pub field: CoordinateField,
    pub old_value: Option<f64>,
    pub new_value: f64,
    pub old_provenance: Provenance,
    pub new_provenance: Provenance,
}

/// The narrow view of a photo that geotagging needs.
pub trait PhotoRecord {
    /// Capture time in UTC, if the photo has one.
    fn capture_time(&self) -> Option<DateTime<Utc>>;

    /// Provenance of the current coordinates.
    fn provenance(&self) -> Provenance;

    fn latitude(&self) -> Option<f64>;
    fn longitude(&self) -> Option<f64>;
    /// Meters
    fn altitude(&self) -> Option<f64>;

    fn set_latitude(&mut self, value: f64, provenance: Provenance);
    fn set_longitude(&mut self, value: f64, provenance: Provenance);
    fn set_altitude(&mut self, value: f64, provenance: Provenance);

    fn has_location(&self) -> bool {
        self.provenance() != Provenance::None
    }
}

/// A plain in-memory photo record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhotoLocation {
    pub capture_time: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub provenance: Provenance,
}

impl PhotoLocation {
    /// A photo taken at `capture_time` with no known location.
    pub fn new(capture_time: DateTime<Utc>) -> Self {
        Self {
            capture_time: Some(capture_time),
            latitude: None,
            longitude: None,
            altitude: None,
            provenance: Provenance::None,
        }
    }

    /// A photo whose EXIF data already carried coordinates.
    pub fn with_exif_location(
        capture_time: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        altitude: Option<f64>,
    ) -> Self {
        Self {
            capture_time: Some(capture_time),
            latitude: Some(latitude),
            longitude: Some(longitude),
            altitude,
            provenance: Provenance::Image,
        }
    }
}

impl PhotoRecord for PhotoLocation {
    fn capture_time(&self) -> Option<DateTime<Utc>> {
        self.capture_time
    }

    fn provenance(&self) -> Provenance {
        self.provenance
    }

    fn latitude(&self) -> Option<f64> {
        self.latitude
    }

    fn longitude(&self) -> Option<f64> {
        self.longitude
    }

    fn altitude(&self) -> Option<f64> {
        self.altitude
    }

    fn set_latitude(&mut self, value: f64, provenance: Provenance) {
        self.latitude = Some(value);
        self.provenance = provenance;
    }

    fn set_longitude(&mut self, value: f64, provenance: Provenance) {
        self.longitude = Some(value);
        self.provenance = provenance;
    }

    fn set_altitude(&mut self, value: f64, provenance: Provenance) {
        self.altitude = Some(value);
        self.provenance = provenance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provenance_round_trip() {
        for p in Provenance::ALL {
            assert_eq!(p.to_string().parse::<Provenance>(), Ok(p));
        }
        assert_eq!("from-image-exif".parse::<Provenance>(), Ok(Provenance::Image));
        assert_eq!("from-track-log".parse::<Provenance>(), Ok(Provenance::Track));
    }

    #[test]
    fn test_unknown_provenance() {
        assert!(matches!(
            "satellite".parse::<Provenance>(),
            Err(TrackError::UnknownProvenance(name)) if name == "satellite"
        ));
    }

    #[test]
    fn test_photo_location_setters() {
        let time = DateTime::from_timestamp(1_000, 0).unwrap();
        let mut photo = PhotoLocation::new(time);
        assert!(!photo.has_location());

        photo.set_latitude(51.0, Provenance::Manual);
        assert!(photo.has_location());
        assert_eq!(photo.latitude(), Some(51.0));
        assert_eq!(photo.longitude(), None);
        assert_eq!(photo.provenance(), Provenance::Manual);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_provenance_serde_names() {
        let json = serde_json::to_string(&Provenance::Image).unwrap();
        assert_eq!(json, "\"from-image-exif\"");
        let back: Provenance = serde_json::from_str("\"external-service\"").unwrap();
        assert_eq!(back, Provenance::ExternalService);
    }
}
