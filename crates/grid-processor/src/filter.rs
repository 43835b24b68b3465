//! Region restriction and nearest-node snapping.

use serde::Serialize;
use tracing::debug;
use wave_common::{BoundingBox, CanonicalObservation, GridCell, GridSpec};

use crate::error::{GridProcessorError, Result};

/// Upper bound on grid size; guards against a tiny resolution over a
/// large region exhausting memory when gap rows are materialized.
pub const MAX_GRID_CELLS: usize = 4_000_000;

/// Snaps observations inside one region onto its grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialFilter {
    grid: GridSpec,
}

impl SpatialFilter {
    /// Validate the region and resolution and build the grid.
    pub fn new(bounds: BoundingBox, resolution: f64) -> Result<Self> {
        bounds
            .validate()
            .map_err(|e| GridProcessorError::invalid_region(e.to_string()))?;
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(GridProcessorError::invalid_resolution(format!(
                "resolution must be a positive number of degrees, got {}",
                resolution
            )));
        }
        if resolution > bounds.lat_span().max(bounds.lon_span()) {
            return Err(GridProcessorError::invalid_resolution(format!(
                "resolution {} is coarser than the region itself",
                resolution
            )));
        }

        let grid = GridSpec::new(bounds, resolution)?;
        if grid.len() > MAX_GRID_CELLS {
            return Err(GridProcessorError::TooManyCells {
                rows: grid.rows,
                cols: grid.cols,
                limit: MAX_GRID_CELLS,
            });
        }

        debug!(rows = grid.rows, cols = grid.cols, resolution, "Built analysis grid");
        Ok(Self { grid })
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.grid.bounds
    }

    /// Nearest grid node for a coordinate, or `None` outside the region.
    pub fn snap(&self, lat: f64, lon: f64) -> Option<GridCell> {
        self.grid.snap(lat, lon)
    }

    /// Drop observations outside the region and assign the rest a cell.
    ///
    /// The returned iterator is lazy; counts are available from it once it
    /// has been driven.
    pub fn filter_and_grid<I>(&self, observations: I) -> Gridded<'_, I::IntoIter>
    where
        I: IntoIterator<Item = CanonicalObservation>,
    {
        Gridded {
            filter: self,
            inner: observations.into_iter(),
            stats: FilterStats::default(),
        }
    }
}

/// Counts kept by a [`Gridded`] iterator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
    pub retained: u64,
    pub out_of_region: u64,
}

impl FilterStats {
    pub fn merge(&mut self, other: &FilterStats) {
        self.retained += other.retained;
        self.out_of_region += other.out_of_region;
    }
}

/// Iterator returned by [`SpatialFilter::filter_and_grid`].
pub struct Gridded<'a, I> {
    filter: &'a SpatialFilter,
    inner: I,
    stats: FilterStats,
}

impl<I> Gridded<'_, I> {
    pub fn stats(&self) -> FilterStats {
        self.stats
    }
}

impl<I> Iterator for Gridded<'_, I>
where
    I: Iterator<Item = CanonicalObservation>,
{
    type Item = CanonicalObservation;

    fn next(&mut self) -> Option<Self::Item> {
        for mut obs in self.inner.by_ref() {
            match self.filter.snap(obs.latitude, obs.longitude) {
                Some(cell) => {
                    obs.cell = Some(cell);
                    self.stats.retained += 1;
                    return Some(obs);
                }
                None => self.stats.out_of_region += 1,
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}
