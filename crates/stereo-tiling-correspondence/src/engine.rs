//! Terrain grid to epipolar tiles.
//!
//! For one stereo pair the epipolar regions grid is projected on the terrain
//! twice, at the minimum and at the maximum disparity. Each projection is
//! triangulated; a terrain point is then located in both triangulations and
//! the epipolar positions of the enclosing triangles (or of the nearest
//! sample when the point falls outside, or in a rejected boundary triangle)
//! bound the epipolar area that can see it.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use stereo_tiling_core::{list_tiles, BBox, DatasetAttributes, Grid, TileAddress, TilingError};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::edges::SamplingBoundary;
use crate::index::SpatialIndex;
use crate::{CrsKind, DisparityBoundSample, GeometryError};

/// One triangulation side (min or max disparity) of a pair.
struct BoundIndex {
    index: SpatialIndex,
}

impl BoundIndex {
    /// Epipolar bounds of a scaled terrain point: enclosing triangle if it is
    /// valid, nearest sample otherwise.
    fn epipolar_bounds(
        &self,
        q: Point2<f64>,
        epipolar: &[[f64; 2]],
        boundary: &SamplingBoundary,
    ) -> BBox {
        let simplex = self
            .index
            .locate(q)
            .map(|t| self.index.triangle(t))
            .filter(|s| !boundary.is_edge_simplex(*s));

        match simplex {
            Some(vertices) => {
                let [a, b, c] = vertices.map(|v| epipolar[v]);
                BBox::new(
                    a[0].min(b[0]).min(c[0]),
                    a[1].min(b[1]).min(c[1]),
                    a[0].max(b[0]).max(c[0]),
                    a[1].max(b[1]).max(c[1]),
                )
            }
            None => {
                let p = epipolar[self.index.nearest(q)];
                BBox::point(p[0], p[1])
            }
        }
    }
}

/// A contributing epipolar tile.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PairTile {
    /// Identifier of the stereo pair.
    pub pair: usize,
    /// Tile address in the pair's epipolar tiling.
    pub tile: TileAddress,
    /// Tile window in epipolar pixels.
    pub window: BBox,
}

/// Epipolar tiles that may project into one terrain tile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateTileSet {
    /// Terrain tile address.
    pub terrain_tile: TileAddress,
    pub terrain_region: BBox,
    /// Contributing tiles over all pairs; empty when nothing covers the tile.
    pub tiles: Vec<PairTile>,
    /// `col² + row²`, only used to order task submission.
    pub rank: usize,
}

impl CandidateTileSet {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Tiles of one pair.
    pub fn tiles_of(&self, pair: usize) -> impl Iterator<Item = &PairTile> + '_ {
        self.tiles.iter().filter(move |t| t.pair == pair)
    }
}

/// Epipolar bounds of every corner of a terrain grid, for one pair.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainGridBounds {
    corner_cols: usize,
    bounds: Vec<BBox>,
}

impl TerrainGridBounds {
    /// Corner grid shape `(rows + 1, cols + 1)`.
    pub fn shape(&self) -> (usize, usize) {
        match self.corner_cols {
            0 => (0, 0),
            c => (self.bounds.len() / c, c),
        }
    }

    /// Bounds of corner `[j, i]`, `None` outside the grid.
    #[inline]
    pub fn corner(&self, j: usize, i: usize) -> Option<BBox> {
        if i >= self.corner_cols {
            return None;
        }
        self.bounds.get(j * self.corner_cols + i).copied()
    }

    /// Union of the bounds of the four corners of terrain cell `(row, col)`,
    /// `None` outside the grid.
    pub fn cell(&self, row: usize, col: usize) -> Option<BBox> {
        Some(
            self.corner(row, col)?
                .merge(&self.corner(row + 1, col)?)
                .merge(&self.corner(row + 1, col + 1)?)
                .merge(&self.corner(row, col + 1)?),
        )
    }
}

/// Precomputed correspondence of one stereo pair.
pub struct PairCorrespondence {
    pair: usize,
    epipolar_regions_grid: Grid,
    largest_epipolar_region: BBox,
    opt_epipolar_tile_size: usize,
    tile_margin: i64,
    precision_factor: f64,
    boundary: SamplingBoundary,
    min: BoundIndex,
    max: BoundIndex,
}

impl PairCorrespondence {
    /// Build both triangulations of a pair.
    ///
    /// `sample_min`/`sample_max` are the terrain projections of
    /// `epipolar_regions_grid` corners at the disparity bounds.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(pair = pair))
    )]
    pub fn new(
        pair: usize,
        epipolar_regions_grid: Grid,
        largest_epipolar_region: BBox,
        opt_epipolar_tile_size: usize,
        sample_min: &DisparityBoundSample,
        sample_max: &DisparityBoundSample,
        crs: CrsKind,
    ) -> Result<Self, GeometryError> {
        let corners = epipolar_regions_grid.flatten().len();
        for sample in [sample_min, sample_max] {
            if sample.len() != corners {
                return Err(GeometryError::SampleSize {
                    sample: sample.len(),
                    grid: corners,
                });
            }
        }

        let precision_factor = crs.precision_factor();
        let min = BoundIndex {
            index: SpatialIndex::build(&sample_min.points, precision_factor)?,
        };
        let max = BoundIndex {
            index: SpatialIndex::build(&sample_max.points, precision_factor)?,
        };
        let (rows, cols) = epipolar_regions_grid.shape();

        log::info!(
            "pair {pair}: {}x{} epipolar tiles of {opt_epipolar_tile_size} px indexed",
            rows.saturating_sub(1),
            cols.saturating_sub(1)
        );

        Ok(Self {
            pair,
            epipolar_regions_grid,
            largest_epipolar_region,
            opt_epipolar_tile_size,
            tile_margin: 0,
            precision_factor,
            boundary: SamplingBoundary::new(rows, cols),
            min,
            max,
        })
    }

    /// Build from the attributes of the pair's epipolar dataset.
    pub fn from_attributes(
        pair: usize,
        attributes: &DatasetAttributes,
        sample_min: &DisparityBoundSample,
        sample_max: &DisparityBoundSample,
        crs: CrsKind,
    ) -> Result<Self, GeometryError> {
        let grid = attributes
            .epipolar_regions_grid
            .clone()
            .ok_or(GeometryError::MissingAttribute("epipolar_regions_grid"))?;
        let largest = attributes
            .largest_epipolar_region
            .ok_or(GeometryError::MissingAttribute("largest_epipolar_region"))?;
        let tile_size = attributes
            .opt_epipolar_tile_size
            .ok_or(GeometryError::MissingAttribute("opt_epipolar_tile_size"))?;
        Self::new(pair, grid, largest, tile_size, sample_min, sample_max, crs)
    }

    /// Extra epipolar tiles to take around each region (0 by default).
    pub fn with_tile_margin(mut self, margin: i64) -> Self {
        self.tile_margin = margin;
        self
    }

    #[inline]
    pub fn pair(&self) -> usize {
        self.pair
    }

    #[inline]
    pub fn largest_epipolar_region(&self) -> BBox {
        self.largest_epipolar_region
    }

    #[inline]
    pub fn opt_epipolar_tile_size(&self) -> usize {
        self.opt_epipolar_tile_size
    }

    #[inline]
    pub fn precision_factor(&self) -> f64 {
        self.precision_factor
    }

    /// Epipolar bounds for each terrain point.
    ///
    /// A degenerate (point) box means both disparity bounds fell back to the
    /// same nearest sample.
    pub fn lookup(&self, terrain_points: &[[f64; 2]]) -> Vec<BBox> {
        let epipolar = self.epipolar_regions_grid.flatten();
        terrain_points
            .iter()
            .map(|p| {
                let q = Point2::new(p[0] * self.precision_factor, p[1] * self.precision_factor);
                self.min
                    .epipolar_bounds(q, epipolar, &self.boundary)
                    .merge(&self.max.epipolar_bounds(q, epipolar, &self.boundary))
            })
            .collect()
    }

    /// Epipolar bounds for every corner of `terrain_grid`.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(pair = self.pair))
    )]
    pub fn terrain_grid_to_epipolar(&self, terrain_grid: &Grid) -> TerrainGridBounds {
        TerrainGridBounds {
            corner_cols: terrain_grid.shape().1,
            bounds: self.lookup(terrain_grid.flatten()),
        }
    }

    /// Epipolar region of terrain cell `(row, col)`, cropped to the pair's
    /// extent. `None` when the pair does not see the cell.
    pub fn epipolar_region(&self, bounds: &TerrainGridBounds, row: usize, col: usize) -> Option<BBox> {
        let region = bounds.cell(row, col)?.crop(&self.largest_epipolar_region);
        if region.is_empty() {
            log::debug!(
                "pair {}: terrain tile ({row}, {col}) has an empty epipolar region, skipped",
                self.pair
            );
            return None;
        }
        log::debug!(
            "pair {}: terrain tile ({row}, {col}) -> epipolar region {region:?}",
            self.pair
        );
        Some(region)
    }

    /// Epipolar tiles of this pair overlapping `region`.
    pub fn tiles_for_region(&self, region: &BBox) -> Vec<PairTile> {
        let (rows, cols) = self.epipolar_regions_grid.cell_shape();
        list_tiles(
            region,
            &self.largest_epipolar_region,
            self.opt_epipolar_tile_size as f64,
            self.tile_margin,
        )
        .into_iter()
        .filter(|t| t.idx >= 0 && t.idy >= 0 && (t.idx as usize) < cols && (t.idy as usize) < rows)
        .map(|t| PairTile {
            pair: self.pair,
            tile: TileAddress::new(t.idy as usize, t.idx as usize),
            window: t.tile,
        })
        .collect()
    }
}

/// Correspondence over all pairs of a run.
#[derive(Default)]
pub struct CorrespondenceEngine {
    pairs: Vec<PairCorrespondence>,
}

impl CorrespondenceEngine {
    pub fn new(pairs: Vec<PairCorrespondence>) -> Self {
        Self { pairs }
    }

    pub fn push(&mut self, pair: PairCorrespondence) {
        self.pairs.push(pair);
    }

    #[inline]
    pub fn pairs(&self) -> &[PairCorrespondence] {
        &self.pairs
    }

    /// One candidate set per terrain tile, row-major.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(pairs = self.pairs.len()))
    )]
    pub fn candidate_tiles(&self, terrain_grid: &Grid) -> Vec<CandidateTileSet> {
        let bounds: Vec<TerrainGridBounds> = self
            .pairs
            .iter()
            .map(|p| p.terrain_grid_to_epipolar(terrain_grid))
            .collect();

        let (rows, cols) = terrain_grid.cell_shape();
        let mut out = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                if let Some(region) = terrain_grid.cell(row, col) {
                    out.push(candidate_set(region, row, col, &self.pairs, &bounds));
                }
            }
        }
        let covered = out.iter().filter(|c| !c.is_empty()).count();
        log::info!(
            "{covered}/{} terrain tiles covered by {} pair(s)",
            out.len(),
            self.pairs.len()
        );
        out
    }
}

/// Candidate epipolar tiles of terrain tile `(row, col)`.
///
/// `bounds[k]` must come from `pairs[k].terrain_grid_to_epipolar(terrain_grid)`.
/// Fails when `(row, col)` is not a cell of `terrain_grid` or when the bounds
/// do not match the grid.
pub fn corresponding_tiles(
    terrain_grid: &Grid,
    row: usize,
    col: usize,
    pairs: &[PairCorrespondence],
    bounds: &[TerrainGridBounds],
) -> Result<CandidateTileSet, GeometryError> {
    let (rows, cols) = terrain_grid.cell_shape();
    if row >= rows || col >= cols {
        return Err(TilingError::OutOfGrid { row, col, rows, cols }.into());
    }
    let corners = terrain_grid.shape();
    if let Some(b) = bounds.iter().find(|b| b.shape() != corners) {
        let (rows, cols) = b.shape();
        return Err(TilingError::GridShape {
            rows,
            cols,
            len: corners.0 * corners.1,
        }
        .into());
    }
    if bounds.len() != pairs.len() {
        return Err(GeometryError::BoundsCount {
            bounds: bounds.len(),
            pairs: pairs.len(),
        });
    }
    let terrain_region = terrain_grid
        .cell(row, col)
        .ok_or(TilingError::OutOfGrid { row, col, rows, cols })?;
    Ok(candidate_set(terrain_region, row, col, pairs, bounds))
}

fn candidate_set(
    terrain_region: BBox,
    row: usize,
    col: usize,
    pairs: &[PairCorrespondence],
    bounds: &[TerrainGridBounds],
) -> CandidateTileSet {
    log::debug!("processing terrain tile ({row}, {col})");
    let tiles = pairs
        .iter()
        .zip(bounds)
        .filter_map(|(pair, b)| pair.epipolar_region(b, row, col).map(|r| pair.tiles_for_region(&r)))
        .flatten()
        .collect();

    CandidateTileSet {
        terrain_tile: TileAddress::new(row, col),
        terrain_region,
        tiles,
        rank: col * col + row * row,
    }
}
