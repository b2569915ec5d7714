//! High-level facade crate for the `stereo-tiling-*` workspace.
//!
//! This crate provides:
//! - re-exports of the tiling, correspondence and orchestration crates
//! - a JSON [`PipelineConfig`]
//! - the terrain-side driver: tile the output footprint, plan which epipolar
//!   tiles feed each terrain tile, and submit one task per terrain tile.
//!
//! ## Quickstart
//!
//! ```
//! use stereo_tiling::core::{BBox, EpipolarTiling, TiledDataset};
//! use stereo_tiling::correspondence::GeometryError;
//! use stereo_tiling::orchestrator::{task_fn, Cluster, Deferred, TaskValue};
//! use stereo_tiling::{
//!     build_correspondence, plan_terrain_tiles, run_terrain_tasks, PairInput, PipelineConfig,
//!     TerrainTiling,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! stereo_tiling::core::init_from_env()?;
//! let config = PipelineConfig::default();
//! let cluster = config.cluster.build_cluster(&config.out_dir)?;
//!
//! // One 1000x1000 px epipolar pair looking straight down at 1 m/px.
//! let epipolar = EpipolarTiling::new(1000, 1000, config.epipolar_tile_size)?;
//! let mut tiles: TiledDataset<Deferred> = epipolar.dataset();
//! for (k, region) in epipolar.epipolar_regions.iter().enumerate() {
//!     let addr = stereo_tiling::core::TileAddress::new(k % 2, k / 2);
//!     tiles.set(addr, Deferred::ready(TaskValue::Meta(region.to_array().to_vec().into())))?;
//! }
//! let nadir = |pts: &[[f64; 2]], d: f64| -> Result<Vec<[f64; 2]>, GeometryError> {
//!     Ok(pts.iter().map(|p| [p[0] - 0.5 * d, p[1]]).collect())
//! };
//!
//! let engine = build_correspondence(
//!     &[PairInput { attributes: &tiles.attributes, geometry: &nadir }],
//!     config.disparity,
//!     config.terrain.crs_kind(),
//! )?;
//! let terrain = TerrainTiling::new(BBox::new(100.0, 100.0, 900.0, 900.0), 1.0, 400.0)?;
//! let plan = plan_terrain_tiles(&terrain.grid, &engine);
//! let outputs = run_terrain_tasks(
//!     cluster.as_ref(),
//!     &terrain,
//!     &plan,
//!     &[tiles],
//!     task_fn(|args| Ok(vec![args.get(0)?.clone()])),
//! )?;
//! assert_eq!(4, outputs.iter().count());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `stereo_tiling::core`: boxes, grids, tile listing, tiled datasets, logger.
//! - `stereo_tiling::correspondence`: terrain to epipolar tile correspondence.
//! - `stereo_tiling::orchestrator`: cluster backends and task wrappers.

pub use stereo_tiling_core as core;
pub use stereo_tiling_correspondence as correspondence;
pub use stereo_tiling_orchestrator as orchestrator;

pub use stereo_tiling_core::{BBox, Grid, TileAddress, TiledDataset};
pub use stereo_tiling_correspondence::{CandidateTileSet, CorrespondenceEngine, GeometryProvider};
pub use stereo_tiling_orchestrator::{Cluster, ClusterConfig, Deferred, TaskArgs, TaskValue};

mod config;
mod pipeline;

pub use config::{ConfigError, DisparityRange, PipelineConfig, TerrainConfig};
pub use pipeline::{
    build_correspondence, plan_terrain_tiles, run_terrain_tasks, write_plan_geojson, PairInput,
    PipelineError, TerrainTiling,
};

/// Route `log` records to a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Errors from an already installed logger or subscriber are ignored.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let _ = tracing_log::LogTracer::init();
    stereo_tiling_core::init_tracing(json);
}
