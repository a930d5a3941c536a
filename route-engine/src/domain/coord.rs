//! Geographic coordinates and bounding boxes.

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

use super::DomainError;

/// A validated WGS84 coordinate in degrees.
///
/// Latitude is in `[-90, 90]`, longitude in `[-180, 180]`, and neither is NaN.
///
/// # Examples
///
/// ```
/// use route_engine::domain::Coordinate;
///
/// let bangalore = Coordinate::new(12.97, 77.59).unwrap();
/// assert_eq!(bangalore.lat(), 12.97);
///
/// assert!(Coordinate::new(f64::NAN, 77.59).is_err());
/// assert!(Coordinate::new(91.0, 0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(f64, f64)", into = "(f64, f64)")]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, DomainError> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        if !valid {
            return Err(DomainError::InvalidCoordinate { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Great-circle distance in meters.
    pub fn distance_m(&self, other: &Coordinate) -> f64 {
        self.to_point().haversine_distance(&other.to_point())
    }

    /// `[lon, lat]`, the planar key used by the spatial index.
    pub(crate) fn xy(&self) -> [f64; 2] {
        [self.lon, self.lat]
    }

    fn to_point(self) -> Point {
        Point::new(self.lon, self.lat)
    }
}

impl TryFrom<(f64, f64)> for Coordinate {
    type Error = DomainError;

    fn try_from((lat, lon): (f64, f64)) -> Result<Self, Self::Error> {
        Coordinate::new(lat, lon)
    }
}

impl From<Coordinate> for (f64, f64) {
    fn from(c: Coordinate) -> Self {
        (c.lat, c.lon)
    }
}

/// An axis-aligned latitude/longitude box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    pub fn contains(&self, c: &Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&c.lat())
            && (self.min_lon..=self.max_lon).contains(&c.lon())
    }

    /// True if `other` lies entirely inside this box.
    pub fn covers(&self, other: &BoundingBox) -> bool {
        self.min_lat <= other.min_lat
            && self.min_lon <= other.min_lon
            && self.max_lat >= other.max_lat
            && self.max_lon >= other.max_lon
    }

    /// Area in square degrees, used only to prefer tighter regions.
    pub fn area(&self) -> f64 {
        (self.max_lat - self.min_lat).max(0.0) * (self.max_lon - self.min_lon).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range() {
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.1, 0.0).is_err());
        assert!(Coordinate::new(0.0, 180.5).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn haversine_distance_is_plausible() {
        let a = Coordinate::new(12.97, 77.59).unwrap();
        let b = Coordinate::new(12.93, 77.62).unwrap();
        let d = a.distance_m(&b);
        // Roughly 5.5 km apart
        assert!(d > 5_000.0 && d < 6_000.0, "got {d}");
        assert_eq!(a.distance_m(&a), 0.0);
    }

    #[test]
    fn serde_as_pair() {
        let c = Coordinate::new(12.97, 77.59).unwrap();
        assert_eq!(serde_json::to_string(&c).unwrap(), "[12.97,77.59]");
        assert!(serde_json::from_str::<Coordinate>("[120.0,0.0]").is_err());
    }

    #[test]
    fn bounding_box_contains_and_covers() {
        let bbox = BoundingBox::new(12.0, 77.0, 13.5, 78.0);
        assert!(bbox.contains(&Coordinate::new(12.97, 77.59).unwrap()));
        assert!(!bbox.contains(&Coordinate::new(14.0, 77.59).unwrap()));

        assert!(bbox.covers(&BoundingBox::new(12.5, 77.2, 13.0, 77.8)));
        assert!(!bbox.covers(&BoundingBox::new(11.5, 77.2, 13.0, 77.8)));
    }
}
