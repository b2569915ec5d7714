//! Terrain to epipolar tile correspondence.
//!
//! For every stereo pair, the corners of the epipolar regions grid are
//! projected on the terrain at the two ends of the disparity range. Each
//! projection is indexed with a Delaunay triangulation and a k-d tree. A
//! terrain tile is then mapped back to the epipolar tiles whose footprint may
//! cover it:
//!
//! ```
//! use stereo_tiling_core::{make_grid, BBox};
//! use stereo_tiling_correspondence::{
//!     compute_epipolar_grid_min_max, CorrespondenceEngine, CrsKind, GeometryError,
//!     PairCorrespondence,
//! };
//!
//! // Flat scene: terrain x = epipolar x - disparity.
//! let provider = |pts: &[[f64; 2]], d: f64| -> Result<Vec<[f64; 2]>, GeometryError> {
//!     Ok(pts.iter().map(|p| [p[0] - d, p[1]]).collect())
//! };
//! let epi_grid = make_grid(0.0, 0.0, 400.0, 300.0, 100.0, 100.0).unwrap();
//! let (lo, hi) = compute_epipolar_grid_min_max(&provider, &epi_grid, -2.0, 2.0).unwrap();
//! let pair = PairCorrespondence::new(
//!     0,
//!     epi_grid,
//!     BBox::new(0.0, 0.0, 400.0, 300.0),
//!     100,
//!     &lo,
//!     &hi,
//!     CrsKind::Projected,
//! )
//! .unwrap();
//!
//! let terrain = make_grid(150.0, 120.0, 250.0, 180.0, 100.0, 100.0).unwrap();
//! let sets = CorrespondenceEngine::new(vec![pair]).candidate_tiles(&terrain);
//! assert_eq!(1, sets.len());
//! assert!(!sets[0].is_empty());
//! ```

mod crs;
mod edges;
mod engine;
mod error;
mod geojson;
mod index;
mod sample;

pub use crs::{CrsKind, GEOGRAPHIC_PRECISION_FACTOR};
pub use edges::{GridSide, SamplingBoundary};
pub use engine::{
    corresponding_tiles, CandidateTileSet, CorrespondenceEngine, PairCorrespondence, PairTile,
    TerrainGridBounds,
};
pub use error::GeometryError;
pub use geojson::paired_regions_geojson;
pub use index::SpatialIndex;
pub use sample::{compute_epipolar_grid_min_max, DisparityBoundSample, GeometryProvider};
