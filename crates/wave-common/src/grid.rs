//! Regular lat/lon grid over a region of interest.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::{WaveError, WaveResult};

/// Tolerance, in cell widths, under which two candidate nodes are equidistant.
pub const TIE_TOLERANCE: f64 = 1e-9;

/// One node of the region grid.
///
/// Identity is the (row, col) index pair; the center coordinates are
/// derived from the owning [`GridSpec`] and carried along for output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridCell {
    /// Latitude index, 0 at the southern edge.
    pub row: u32,
    /// Longitude index, 0 at the western edge.
    pub col: u32,
    /// Cell center latitude in degrees.
    pub latitude: f64,
    /// Cell center longitude in degrees.
    pub longitude: f64,
}

impl PartialEq for GridCell {
    fn eq(&self, other: &Self) -> bool {
        self.row == other.row && self.col == other.col
    }
}

impl Eq for GridCell {}

impl Hash for GridCell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.row.hash(state);
        self.col.hash(state);
    }
}

impl PartialOrd for GridCell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GridCell {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.row, self.col).cmp(&(other.row, other.col))
    }
}

/// Specification of the common analysis grid.
///
/// Nodes sit at `min + k * resolution` along each axis, starting at the
/// south-west corner of the bounds. The last node on an axis is the
/// largest one not beyond the upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub bounds: BoundingBox,
    /// Node spacing in degrees (same on both axes).
    pub resolution: f64,
    /// Number of latitude nodes.
    pub rows: u32,
    /// Number of longitude nodes.
    pub cols: u32,
}

impl GridSpec {
    /// Create a grid over validated bounds.
    pub fn new(bounds: BoundingBox, resolution: f64) -> WaveResult<Self> {
        bounds.validate()?;
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(WaveError::InvalidResolution(format!(
                "resolution must be a positive number of degrees, got {}",
                resolution
            )));
        }

        Ok(Self {
            bounds,
            resolution,
            rows: axis_len(bounds.lat_span(), resolution),
            cols: axis_len(bounds.lon_span(), resolution),
        })
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Check if the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Build the cell at a given index pair.
    pub fn cell_at(&self, row: u32, col: u32) -> Option<GridCell> {
        if row >= self.rows || col >= self.cols {
            return None;
        }

        Some(GridCell {
            row,
            col,
            latitude: self.bounds.min_lat + row as f64 * self.resolution,
            longitude: self.bounds.min_lon + col as f64 * self.resolution,
        })
    }

    /// Snap a coordinate to its nearest grid node.
    ///
    /// Returns `None` when the coordinate lies outside the bounds.
    /// Equidistant candidates resolve to the lower index on each axis, so
    /// ties prefer the lower latitude, then the lower longitude.
    pub fn snap(&self, lat: f64, lon: f64) -> Option<GridCell> {
        if !self.bounds.contains(lat, lon) {
            return None;
        }

        let row = nearest_node(lat, self.bounds.min_lat, self.resolution, self.rows);
        let col = nearest_node(lon, self.bounds.min_lon, self.resolution, self.cols);
        self.cell_at(row, col)
    }

    /// Iterate every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        (0..self.rows).flat_map(move |row| {
            (0..self.cols).filter_map(move |col| self.cell_at(row, col))
        })
    }
}

fn axis_len(span: f64, resolution: f64) -> u32 {
    (span / resolution + TIE_TOLERANCE).floor() as u32 + 1
}

fn nearest_node(value: f64, origin: f64, resolution: f64, len: u32) -> u32 {
    let position = (value - origin) / resolution;
    let lower = position.floor();
    let frac = position - lower;

    let index = if frac > 0.5 + TIE_TOLERANCE {
        lower + 1.0
    } else {
        lower
    };

    (index.max(0.0) as u32).min(len.saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pnw_grid() -> GridSpec {
        GridSpec::new(BoundingBox::new(46.0, 50.5, -130.0, -124.0), 0.2).unwrap()
    }

    #[test]
    fn test_grid_dimensions() {
        let grid = pnw_grid();
        assert_eq!(grid.rows, 23);
        assert_eq!(grid.cols, 31);
        assert_eq!(grid.len(), 23 * 31);
    }

    #[test]
    fn test_tie_prefers_lower_latitude() {
        let cell = pnw_grid().snap(47.5, -127.0).unwrap();
        assert_eq!(cell.row, 7);
        assert_eq!(cell.col, 15);
        assert!((cell.latitude - 47.4).abs() < 1e-9);
        assert!((cell.longitude - -127.0).abs() < 1e-9);
    }

    #[test]
    fn test_tie_prefers_lower_longitude() {
        let cell = pnw_grid().snap(47.4, -127.1).unwrap();
        assert!((cell.longitude - -127.2).abs() < 1e-9);
    }

    #[test]
    fn test_outside_bounds_is_none() {
        assert!(pnw_grid().snap(45.0, -127.0).is_none());
        assert!(pnw_grid().snap(47.0, -120.0).is_none());
    }

    #[test]
    fn test_upper_edge_is_clamped() {
        let grid = GridSpec::new(BoundingBox::new(0.0, 1.05, 0.0, 1.0), 0.5).unwrap();
        assert_eq!(grid.rows, 3);
        let cell = grid.snap(1.05, 1.0).unwrap();
        assert_eq!(cell.row, 2);
        assert_eq!(cell.col, 2);
    }

    #[test]
    fn test_rejects_zero_resolution() {
        let result = GridSpec::new(BoundingBox::new(0.0, 1.0, 0.0, 1.0), 0.0);
        assert!(matches!(result, Err(WaveError::InvalidResolution(_))));
    }

    #[test]
    fn test_cell_identity_ignores_center() {
        let a = GridCell { row: 1, col: 2, latitude: 0.0, longitude: 0.0 };
        let b = GridCell { row: 1, col: 2, latitude: 9.0, longitude: 9.0 };
        assert_eq!(a, b);
    }
}
