//! Region-of-interest bounding boxes.

use serde::{Deserialize, Serialize};

use crate::error::{WaveError, WaveResult};

/// A rectangular geographic region in WGS84 degrees.
///
/// Regions are bounded: they may not cross the antimeridian, so
/// `min_lon < max_lon` always holds for a validated box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Create a new bounding box without validation.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// Create a bounding box and validate it.
    pub fn try_new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> WaveResult<Self> {
        let bbox = Self::new(min_lat, max_lat, min_lon, max_lon);
        bbox.validate()?;
        Ok(bbox)
    }

    /// Parse a "min_lon,min_lat,max_lon,max_lat" string (WMS BBOX order).
    pub fn from_bbox_string(s: &str) -> WaveResult<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(WaveError::InvalidRegion(format!(
                "{}. Expected 'min_lon,min_lat,max_lon,max_lat'",
                s
            )));
        }

        let mut nums = [0.0f64; 4];
        for (slot, part) in nums.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| WaveError::InvalidRegion(format!("invalid number '{}'", part)))?;
        }

        Self::try_new(nums[1], nums[3], nums[0], nums[2])
    }

    /// Check that the box is finite, ordered and inside geographic limits.
    pub fn validate(&self) -> WaveResult<()> {
        let values = [self.min_lat, self.max_lat, self.min_lon, self.max_lon];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(WaveError::InvalidRegion(format!(
                "non-finite bound in {:?}",
                self
            )));
        }
        if self.min_lat < -90.0 || self.max_lat > 90.0 {
            return Err(WaveError::InvalidRegion(format!(
                "latitude must lie in [-90, 90], got [{}, {}]",
                self.min_lat, self.max_lat
            )));
        }
        if self.min_lon < -180.0 || self.max_lon > 180.0 {
            return Err(WaveError::InvalidRegion(format!(
                "longitude must lie in [-180, 180], got [{}, {}]",
                self.min_lon, self.max_lon
            )));
        }
        if self.min_lat >= self.max_lat {
            return Err(WaveError::InvalidRegion(
                "min_lat must be less than max_lat".to_string(),
            ));
        }
        if self.min_lon >= self.max_lon {
            return Err(WaveError::InvalidRegion(
                "min_lon must be less than max_lon".to_string(),
            ));
        }
        Ok(())
    }

    /// Height of the box in degrees of latitude.
    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Width of the box in degrees of longitude.
    pub fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Inclusive containment test.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    /// Check if this bbox intersects another.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
            && self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
    }

    /// Center point as (lat, lon).
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox_string() {
        let bbox = BoundingBox::from_bbox_string("-130.0,46.0,-124.0,50.5").unwrap();
        assert_eq!(bbox.min_lon, -130.0);
        assert_eq!(bbox.min_lat, 46.0);
        assert_eq!(bbox.max_lon, -124.0);
        assert_eq!(bbox.max_lat, 50.5);
    }

    #[test]
    fn test_contains_is_inclusive() {
        let bbox = BoundingBox::new(46.0, 50.5, -130.0, -124.0);
        assert!(bbox.contains(46.0, -130.0));
        assert!(bbox.contains(50.5, -124.0));
        assert!(!bbox.contains(45.999, -127.0));
        assert!(!bbox.contains(47.0, -123.9));
    }

    #[test]
    fn test_crossing_antimeridian_is_rejected() {
        let result = BoundingBox::try_new(-50.0, 50.0, 160.0, -140.0);
        assert!(matches!(result, Err(WaveError::InvalidRegion(_))));
    }
}
