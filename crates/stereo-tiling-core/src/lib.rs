//! Region and tiling algebra for tiled stereo processing.
//!
//! Everything here is pure geometry over axis-aligned boxes: corner grids,
//! splitting a region into tiles, cropping, padding, and listing the tiles of
//! a regular tiling that touch a region. The same functions serve the
//! terrain grid (projected CRS units) and the epipolar grid (pixels).
//!
//! ```
//! use stereo_tiling_core::{list_tiles, make_grid, BBox};
//!
//! let grid = make_grid(0.0, 0.0, 1000.0, 600.0, 256.0, 256.0).unwrap();
//! assert_eq!((3, 4), grid.cell_shape());
//!
//! let bounds = BBox::new(0.0, 0.0, 1000.0, 600.0);
//! let tiles = list_tiles(&BBox::new(300.0, 10.0, 400.0, 20.0), &bounds, 256.0, 0);
//! assert_eq!(1, tiles.len());
//! ```

mod bbox;
mod dataset;
mod error;
mod grid;
mod logger;
mod tiles;

pub use bbox::{union, BBox};
pub use dataset::{DatasetAttributes, DatasetError, EpipolarTiling, TileAddress, TiledDataset};
pub use error::TilingError;
pub use grid::{make_grid, split, Grid};
pub use tiles::{list_tiles, roi_to_start_and_size, snap_to_grid, TileRef};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_directives, init_with_level, LOG_ENV};
