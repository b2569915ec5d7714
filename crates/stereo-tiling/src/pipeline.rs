//! Terrain tiling, planning and task submission.

use std::fs;
use std::path::Path;

use serde_json::json;
use stereo_tiling_core::{
    make_grid, roi_to_start_and_size, snap_to_grid, BBox, DatasetAttributes, DatasetError, Grid,
    TiledDataset, TilingError,
};
use stereo_tiling_correspondence::{
    compute_epipolar_grid_min_max, paired_regions_geojson, CandidateTileSet, CorrespondenceEngine,
    CrsKind, GeometryError, GeometryProvider, PairCorrespondence,
};
use stereo_tiling_orchestrator::{Cluster, Deferred, OrchestratorError, TaskArgs, TaskFn, TaskValue};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{ConfigError, DisparityRange};

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tiling(#[from] TilingError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error("no usable stereo pair ({failed} failed)")]
    NoPair { failed: usize },
    #[error("candidate tile refers to pair {pair}, only {pairs} dataset(s) given")]
    UnknownPair { pair: usize, pairs: usize },
}

/// Regular tiling of the output raster footprint.
#[derive(Clone, Debug)]
pub struct TerrainTiling {
    /// Footprint snapped outward to the resolution.
    pub bounds: BBox,
    pub resolution: f64,
    /// Tile side, in CRS units.
    pub tile_size: f64,
    pub grid: Grid,
}

impl TerrainTiling {
    pub fn new(bounds: BBox, resolution: f64, tile_size: f64) -> Result<Self, PipelineError> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(TilingError::InvalidStep(resolution).into());
        }
        let bounds = snap_to_grid(bounds.xmin, bounds.ymin, bounds.xmax, bounds.ymax, resolution);
        if bounds.is_empty() {
            return Err(TilingError::EmptyInput.into());
        }
        let grid = make_grid(
            bounds.xmin,
            bounds.ymin,
            bounds.xmax,
            bounds.ymax,
            tile_size,
            tile_size,
        )?;
        let (rows, cols) = grid.cell_shape();
        log::info!("terrain footprint {bounds:?} split into {rows}x{cols} tiles of {tile_size}");
        Ok(Self {
            bounds,
            resolution,
            tile_size,
            grid,
        })
    }

    /// `(xstart, ystart, xsize, ysize)` of the output raster.
    pub fn raster_window(&self) -> (f64, f64, usize, usize) {
        roi_to_start_and_size(&self.bounds, self.resolution)
    }

    /// Empty dataset over the terrain tiles.
    pub fn dataset<T>(&self) -> TiledDataset<T> {
        TiledDataset::new(self.grid.clone())
    }
}

/// One stereo pair: its epipolar dataset attributes and camera geometry.
pub struct PairInput<'a> {
    pub attributes: &'a DatasetAttributes,
    pub geometry: &'a dyn GeometryProvider,
}

fn build_pair(
    id: usize,
    input: &PairInput<'_>,
    disparity: DisparityRange,
    crs: CrsKind,
) -> Result<PairCorrespondence, GeometryError> {
    let grid = input
        .attributes
        .epipolar_regions_grid
        .as_ref()
        .ok_or(GeometryError::MissingAttribute("epipolar_regions_grid"))?;
    let (min, max) = compute_epipolar_grid_min_max(input.geometry, grid, disparity.min, disparity.max)?;
    PairCorrespondence::from_attributes(id, input.attributes, &min, &max, crs)
}

/// Index every pair; pair ids are positions in `pairs`.
///
/// A pair whose geometry fails is skipped with a warning; the run fails only
/// if every pair does.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(pairs = pairs.len()))
)]
pub fn build_correspondence(
    pairs: &[PairInput<'_>],
    disparity: DisparityRange,
    crs: CrsKind,
) -> Result<CorrespondenceEngine, PipelineError> {
    let mut engine = CorrespondenceEngine::default();
    let mut failed = 0;
    for (id, input) in pairs.iter().enumerate() {
        match build_pair(id, input, disparity, crs) {
            Ok(pair) => engine.push(pair),
            Err(err) => {
                log::warn!("pair {id} skipped: {err}");
                failed += 1;
            }
        }
    }
    if engine.pairs().is_empty() {
        return Err(PipelineError::NoPair { failed });
    }
    Ok(engine)
}

/// Candidate epipolar tiles of every terrain tile, in submission order.
///
/// Empty sets are kept so the plan covers the whole grid.
pub fn plan_terrain_tiles(terrain_grid: &Grid, engine: &CorrespondenceEngine) -> Vec<CandidateTileSet> {
    let mut plan = engine.candidate_tiles(terrain_grid);
    plan.sort_by_key(|set| set.rank);
    plan
}

/// Submit one task per non-empty candidate set.
///
/// The task receives the contributing epipolar tiles as a list in positional
/// argument 0, and named arguments `terrain_region` (`[xmin, ymin, xmax,
/// ymax]`), `terrain_tile` (`{"row", "col"}`) and `epipolar_tiles` (one
/// `{"pair", "row", "col"}` per list entry). `datasets[k]` holds the
/// epipolar tiles of pair `k`; candidates without a tile there are left out.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(tiles = plan.len()))
)]
pub fn run_terrain_tasks(
    cluster: &dyn Cluster,
    terrain: &TerrainTiling,
    plan: &[CandidateTileSet],
    datasets: &[TiledDataset<Deferred>],
    task: TaskFn,
) -> Result<TiledDataset<Deferred>, PipelineError> {
    let task = cluster.create_task(task, 1);
    let mut out = terrain.dataset::<Deferred>();
    let mut submitted = 0;

    for set in plan {
        let mut inputs = Vec::with_capacity(set.tiles.len());
        let mut ids = Vec::with_capacity(set.tiles.len());
        for t in &set.tiles {
            let dataset = datasets.get(t.pair).ok_or(PipelineError::UnknownPair {
                pair: t.pair,
                pairs: datasets.len(),
            })?;
            match dataset.get(t.tile)? {
                Some(value) => {
                    inputs.push(TaskValue::Deferred(value.clone()));
                    ids.push(json!({ "pair": t.pair, "row": t.tile.row, "col": t.tile.col }));
                }
                None => log::debug!("pair {} has no tile at {:?}", t.pair, t.tile),
            }
        }
        if inputs.is_empty() {
            log::debug!("terrain tile {:?} has no input, skipped", set.terrain_tile);
            continue;
        }

        let args = TaskArgs::new()
            .arg(TaskValue::List(inputs))
            .named("terrain_region", json!(set.terrain_region.to_array()))
            .named(
                "terrain_tile",
                json!({ "row": set.terrain_tile.row, "col": set.terrain_tile.col }),
            )
            .named("epipolar_tiles", json!(ids));
        out.set(set.terrain_tile, task.call1(args)?)?;
        submitted += 1;
    }

    log::info!("submitted {submitted} terrain task(s) for {} tile(s)", plan.len());
    Ok(out)
}

/// Write the plan as `terrain_tiles.geojson` and `epipolar_tiles.geojson`
/// under `out_dir`.
pub fn write_plan_geojson(plan: &[CandidateTileSet], out_dir: impl AsRef<Path>) -> Result<(), ConfigError> {
    let terrain: Vec<BBox> = plan.iter().map(|s| s.terrain_region).collect();
    let epipolar: Vec<Vec<BBox>> = plan
        .iter()
        .map(|s| s.tiles.iter().map(|t| t.window).collect())
        .collect();
    let (ter, epi) = paired_regions_geojson(&terrain, &epipolar);

    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)?;
    fs::write(out_dir.join("terrain_tiles.geojson"), serde_json::to_string_pretty(&ter)?)?;
    fs::write(out_dir.join("epipolar_tiles.geojson"), serde_json::to_string_pretty(&epi)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn terrain_tiling_snaps_and_splits() {
        let t = TerrainTiling::new(BBox::new(0.3, 0.2, 99.7, 49.9), 0.5, 20.0).unwrap();
        assert_eq!(BBox::new(0.0, 0.0, 100.0, 50.0), t.bounds);
        assert_eq!((3, 5), t.grid.cell_shape());
        let (x0, y0, w, h) = t.raster_window();
        assert_relative_eq!(0.0, x0);
        assert_relative_eq!(50.0, y0);
        assert_eq!((200, 100), (w, h));
    }

    #[test]
    fn terrain_tiling_rejects_bad_input() {
        assert!(TerrainTiling::new(BBox::new(0.0, 0.0, 10.0, 10.0), 0.0, 5.0).is_err());
        assert!(TerrainTiling::new(BBox::new(0.0, 0.0, 10.0, 10.0), 1.0, -5.0).is_err());
    }
}
