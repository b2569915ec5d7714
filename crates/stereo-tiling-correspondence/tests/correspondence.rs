use stereo_tiling_core::{make_grid, BBox, EpipolarTiling, Grid, TileAddress, TilingError};
use stereo_tiling_correspondence::{
    compute_epipolar_grid_min_max, corresponding_tiles, CorrespondenceEngine, CrsKind,
    DisparityBoundSample, GeometryError, PairCorrespondence,
};

const TILE: usize = 100;
const DISP: (f64, f64) = (-10.0, 10.0);

/// Flat scene seen at half resolution: terrain = 0.5 * epipolar + offset,
/// with a disparity-dependent x shift.
fn flat_to_terrain(p: [f64; 2], d: f64) -> [f64; 2] {
    [0.5 * p[0] + 0.25 * d + 5000.0, 0.5 * p[1] + 7000.0]
}

fn flat_to_epipolar(t: [f64; 2], d: f64) -> [f64; 2] {
    [(t[0] - 5000.0 - 0.25 * d) / 0.5, (t[1] - 7000.0) / 0.5]
}

fn flat_provider(pts: &[[f64; 2]], d: f64) -> Result<Vec<[f64; 2]>, GeometryError> {
    Ok(pts.iter().map(|&p| flat_to_terrain(p, d)).collect())
}

fn flat_pair(pair: usize) -> PairCorrespondence {
    let tiling = EpipolarTiling::new(1000, 800, TILE).unwrap();
    let dataset = tiling.dataset::<()>();
    let grid = dataset.attributes.epipolar_regions_grid.clone().unwrap();
    let (lo, hi) = compute_epipolar_grid_min_max(&flat_provider, &grid, DISP.0, DISP.1).unwrap();
    PairCorrespondence::from_attributes(pair, &dataset.attributes, &lo, &hi, CrsKind::Projected)
        .unwrap()
}

fn terrain_grid() -> Grid {
    make_grid(5100.0, 7100.0, 5400.0, 7300.0, 50.0, 50.0).unwrap()
}

#[test]
fn epipolar_region_contains_true_footprint_at_both_extremes() {
    let pair = flat_pair(0);
    let terrain = terrain_grid();
    let bounds = pair.terrain_grid_to_epipolar(&terrain);
    let (rows, cols) = terrain.cell_shape();

    for row in 0..rows {
        for col in 0..cols {
            let region = pair
                .epipolar_region(&bounds, row, col)
                .expect("interior terrain tile is seen by the pair");
            let tiles = pair.tiles_for_region(&region);
            let cell = terrain.cell(row, col).unwrap();

            for t in [
                [cell.xmin, cell.ymin],
                [cell.xmax, cell.ymin],
                [cell.xmin, cell.ymax],
                [cell.xmax, cell.ymax],
            ] {
                for d in [DISP.0, DISP.1] {
                    let e = flat_to_epipolar(t, d);
                    assert!(
                        region.contains(e[0], e[1]),
                        "tile ({row}, {col}): {e:?} at d={d} not in {region:?}"
                    );
                    let expected = TileAddress::new(
                        (e[1] / TILE as f64).floor() as usize,
                        (e[0] / TILE as f64).floor() as usize,
                    );
                    let covering = tiles.iter().any(|pt| {
                        pt.tile == expected || pt.window.contains(e[0], e[1])
                    });
                    assert!(covering, "no tile covers {e:?} for terrain tile ({row}, {col})");
                }
            }
        }
    }
}

#[test]
fn terrain_tile_outside_every_pair_is_empty() {
    let engine = CorrespondenceEngine::new(vec![flat_pair(0), flat_pair(1)]);
    let far = make_grid(90_000.0, 90_000.0, 90_100.0, 90_100.0, 100.0, 100.0).unwrap();
    let sets = engine.candidate_tiles(&far);
    assert_eq!(1, sets.len());
    assert!(sets[0].is_empty());
    assert_eq!(BBox::new(90_000.0, 90_000.0, 90_100.0, 90_100.0), sets[0].terrain_region);
}

#[test]
fn candidate_sets_span_all_pairs() {
    let engine = CorrespondenceEngine::new(vec![flat_pair(0), flat_pair(3)]);
    let sets = engine.candidate_tiles(&terrain_grid());
    for set in &sets {
        let a = set.tiles_of(0).count();
        let b = set.tiles_of(3).count();
        assert!(a > 0);
        assert_eq!(a, b);
        assert_eq!(a + b, set.tiles.len());
    }
}

#[test]
fn candidate_tiles_are_reproducible() {
    let engine = CorrespondenceEngine::new(vec![flat_pair(0)]);
    let first = engine.candidate_tiles(&terrain_grid());
    for _ in 0..3 {
        assert_eq!(first, engine.candidate_tiles(&terrain_grid()));
    }
}

#[test]
fn geographic_coordinates_are_rescaled() {
    // Same flat scene expressed in degrees: 1e-5 degree per epipolar pixel.
    let to_deg = |p: [f64; 2], d: f64| [2.0 + 1e-5 * (p[0] + 0.5 * d), 45.0 + 1e-5 * p[1]];
    let provider = |pts: &[[f64; 2]], d: f64| -> Result<Vec<[f64; 2]>, GeometryError> {
        Ok(pts.iter().map(|&p| to_deg(p, d)).collect())
    };
    let grid = make_grid(0.0, 0.0, 400.0, 400.0, 100.0, 100.0).unwrap();
    let (lo, hi) = compute_epipolar_grid_min_max(&provider, &grid, -4.0, 4.0).unwrap();
    let pair = PairCorrespondence::new(
        0,
        grid,
        BBox::new(0.0, 0.0, 400.0, 400.0),
        100,
        &lo,
        &hi,
        CrsKind::from_epsg(4326),
    )
    .unwrap();
    assert_eq!(1000.0, pair.precision_factor());

    let q = to_deg([250.0, 150.0], 0.0);
    let b = pair.lookup(&[q])[0];
    assert!(b.contains(250.0 - 2.0, 150.0));
    assert!(b.contains(250.0 + 2.0, 150.0));
    assert!(b.width() <= 200.0 && b.height() <= 200.0, "{b:?}");
}

#[test]
fn insufficient_samples_fail_the_pair() {
    let grid = make_grid(0.0, 0.0, 100.0, 100.0, 100.0, 100.0).unwrap();
    let collapsed = DisparityBoundSample::from_arrays(0.0, &[[1.0, 1.0]; 4]);
    let res = PairCorrespondence::new(
        0,
        grid,
        BBox::new(0.0, 0.0, 100.0, 100.0),
        100,
        &collapsed,
        &collapsed,
        CrsKind::Projected,
    );
    assert!(matches!(res, Err(GeometryError::DegenerateTriangulation { .. })));
}

/// Known precision limitation: a notch in the terrain footprint is bridged
/// by a triangle with one interior vertex, which the boundary filter keeps.
/// A terrain point inside the notch gets a full triangle worth of epipolar
/// bounds instead of a nearest-sample fallback.
#[test]
fn notch_triangle_with_interior_vertex_is_not_filtered() {
    // The middle corner of row 0 is pushed past row 1, opening a notch
    // below it.
    let pair = bent_pair([200.0, 150.0]);

    let b = pair.lookup(&[[200.0, 30.0]])[0];
    assert!(b.width() >= 200.0, "{b:?}");
    assert!(b.contains(100.0, 0.0) && b.contains(300.0, 100.0));
}

/// 3 x 5 corners, 100 px apart, used as the terrain sample at both
/// disparity bounds, with corner 2 (middle of row 0) moved to `moved`.
fn bent_pair(moved: [f64; 2]) -> PairCorrespondence {
    let grid = make_grid(0.0, 0.0, 400.0, 200.0, 100.0, 100.0).unwrap();
    let mut terrain: Vec<[f64; 2]> = grid.flatten().to_vec();
    terrain[2] = moved;
    let sample = DisparityBoundSample::from_arrays(0.0, &terrain);
    PairCorrespondence::new(
        0,
        grid,
        BBox::new(0.0, 0.0, 400.0, 200.0),
        100,
        &sample,
        &sample,
        CrsKind::Projected,
    )
    .unwrap()
}

#[test]
fn boundary_triangle_falls_back_to_nearest_sample() {
    // Corner 2 lifted to y=80 stays below row 1: the point at (200, 30) sits
    // in the triangle spanned by corners 1, 2 and 3, all on the bottom edge.
    let pair = bent_pair([200.0, 80.0]);
    assert_eq!(BBox::point(200.0, 0.0), pair.lookup(&[[200.0, 30.0]])[0]);
}

#[test]
fn corresponding_tiles_rejects_cells_outside_the_grid() {
    let pair = flat_pair(0);
    let terrain = make_grid(5100.0, 7100.0, 5200.0, 7200.0, 50.0, 50.0).unwrap();
    let bounds = vec![pair.terrain_grid_to_epipolar(&terrain)];
    let pairs = [pair];

    let set = corresponding_tiles(&terrain, 1, 1, &pairs, &bounds).unwrap();
    assert_eq!(BBox::new(5150.0, 7150.0, 5200.0, 7200.0), set.terrain_region);
    assert!(!set.is_empty());

    for (row, col) in [(0, 2), (2, 0), (5, 5)] {
        let err = corresponding_tiles(&terrain, row, col, &pairs, &bounds).unwrap_err();
        assert!(
            matches!(
                err,
                GeometryError::Tiling(TilingError::OutOfGrid { rows: 2, cols: 2, .. })
            ),
            "{err}"
        );
    }
    assert!(bounds[0].corner(0, 3).is_none());
    assert!(bounds[0].cell(0, 2).is_none());
    assert!(bounds[0].cell(1, 1).is_some());
}

#[test]
fn corresponding_tiles_rejects_bounds_of_another_grid() {
    let pair = flat_pair(0);
    let terrain = make_grid(5100.0, 7100.0, 5200.0, 7200.0, 50.0, 50.0).unwrap();
    let other = make_grid(5100.0, 7100.0, 5300.0, 7200.0, 50.0, 50.0).unwrap();
    let bounds = vec![pair.terrain_grid_to_epipolar(&other)];
    let err = corresponding_tiles(&terrain, 0, 0, &[pair], &bounds).unwrap_err();
    assert!(matches!(err, GeometryError::Tiling(TilingError::GridShape { .. })), "{err}");
}
