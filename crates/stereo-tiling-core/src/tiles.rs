use serde::{Deserialize, Serialize};

use crate::BBox;

/// One tile of a regular square tiling, as returned by [`list_tiles`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileRef {
    /// Tile index along x (column).
    pub idx: i64,
    /// Tile index along y (row).
    pub idy: i64,
    /// Tile box, cropped to the bounding region.
    pub tile: BBox,
}

/// Tiles of size `tile_size` (cut from the origin and cropped to `bounding`)
/// that intersect `region`, plus `margin` extra tiles on every side.
///
/// Index ranges come from flooring the region's minimum edges and ceiling its
/// maximum edges, so an edge lying exactly on a tile boundary belongs to the
/// tile that starts there. A region degenerated to a segment or a point still
/// resolves to the tile selected by that floor.
///
/// Tiles are enumerated column-major (x outer, y inner); empty tiles after
/// cropping are dropped.
pub fn list_tiles(region: &BBox, bounding: &BBox, tile_size: f64, margin: i64) -> Vec<TileRef> {
    if !tile_size.is_finite() || tile_size <= 0.0 {
        return Vec::new();
    }

    let range = |lo: f64, hi: f64| -> (i64, i64) {
        let first = (lo / tile_size).floor() as i64;
        let last = ((hi / tile_size).ceil() as i64).max(first + 1);
        (first - margin, last + margin)
    };
    let (x_first, x_last) = range(region.xmin, region.xmax);
    let (y_first, y_last) = range(region.ymin, region.ymax);

    let mut out = Vec::new();
    for idx in x_first..x_last {
        for idy in y_first..y_last {
            let tile = BBox::new(
                idx as f64 * tile_size,
                idy as f64 * tile_size,
                (idx + 1) as f64 * tile_size,
                (idy + 1) as f64 * tile_size,
            )
            .crop(bounding);
            if !tile.is_empty() {
                out.push(TileRef { idx, idy, tile });
            }
        }
    }
    out
}

/// Convert a region to `(xstart, ystart, xsize, ysize)` at `resolution`.
///
/// The y axis is assumed to run downward with a negative spacing, so `ystart`
/// is the region's `ymax`. Sizes are rounded half-to-even.
pub fn roi_to_start_and_size(region: &BBox, resolution: f64) -> (f64, f64, usize, usize) {
    let size = |extent: f64| {
        let n = (extent / resolution).round_ties_even();
        if n.is_finite() && n > 0.0 {
            n as usize
        } else {
            0
        }
    };
    (
        region.xmin,
        region.ymax,
        size(region.width()),
        size(region.height()),
    )
}

/// Snap a region outward onto multiples of `resolution`.
pub fn snap_to_grid(xmin: f64, ymin: f64, xmax: f64, ymax: f64, resolution: f64) -> BBox {
    BBox::new(
        (xmin / resolution).floor() * resolution,
        (ymin / resolution).floor() * resolution,
        (xmax / resolution).ceil() * resolution,
        (ymax / resolution).ceil() * resolution,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(tiles: &[TileRef]) -> Vec<(i64, i64)> {
        tiles.iter().map(|t| (t.idx, t.idy)).collect()
    }

    #[test]
    fn lists_tiles_column_major_with_margin() {
        let bounds = BBox::new(0.0, 0.0, 100.0, 100.0);
        let region = BBox::new(25.0, 25.0, 35.0, 45.0);
        let tiles = list_tiles(&region, &bounds, 20.0, 0);
        assert_eq!(vec![(1, 1), (1, 2)], indices(&tiles));

        let tiles = list_tiles(&region, &bounds, 20.0, 1);
        assert_eq!(
            vec![
                (0, 0),
                (0, 1),
                (0, 2),
                (0, 3),
                (1, 0),
                (1, 1),
                (1, 2),
                (1, 3),
                (2, 0),
                (2, 1),
                (2, 2),
                (2, 3)
            ],
            indices(&tiles)
        );
    }

    #[test]
    fn tiles_are_cropped_and_empty_ones_dropped() {
        let bounds = BBox::new(0.0, 0.0, 50.0, 30.0);
        let region = BBox::new(0.0, 0.0, 50.0, 30.0);
        let tiles = list_tiles(&region, &bounds, 20.0, 1);
        assert_eq!(6, tiles.len());
        let last = tiles.last().unwrap();
        assert_eq!((2, 1), (last.idx, last.idy));
        assert_eq!(BBox::new(40.0, 20.0, 50.0, 30.0), last.tile);
    }

    #[test]
    fn edge_on_boundary_uses_floor() {
        let bounds = BBox::new(0.0, 0.0, 4.0, 4.0);
        let region = BBox::new(2.0, 2.0, 4.0, 4.0);
        assert_eq!(vec![(1, 1)], indices(&list_tiles(&region, &bounds, 2.0, 0)));
    }

    #[test]
    fn point_on_shared_corner_resolves_to_single_tile() {
        let bounds = BBox::new(0.0, 0.0, 4.0, 4.0);
        let corner = BBox::point(2.0, 2.0);
        for _ in 0..3 {
            assert_eq!(vec![(1, 1)], indices(&list_tiles(&corner, &bounds, 2.0, 0)));
        }
    }

    #[test]
    fn invalid_tile_size_lists_nothing() {
        let b = BBox::new(0.0, 0.0, 4.0, 4.0);
        assert!(list_tiles(&b, &b, 0.0, 1).is_empty());
    }

    #[test]
    fn roi_start_and_size() {
        let region = BBox::new(10.0, 20.0, 30.5, 41.0);
        assert_eq!((10.0, 41.0, 41, 42), roi_to_start_and_size(&region, 0.5));
        // 2.5 and 3.5 pixels: half-to-even
        let region = BBox::new(0.0, 0.0, 2.5, 3.5);
        assert_eq!((0.0, 3.5, 2, 4), roi_to_start_and_size(&region, 1.0));
    }

    #[test]
    fn snap_outward() {
        assert_eq!(
            BBox::new(10.0, -20.0, 30.0, 10.0),
            snap_to_grid(12.0, -15.0, 21.0, 0.5, 10.0)
        );
        assert_eq!(
            BBox::new(10.0, 0.0, 20.0, 10.0),
            snap_to_grid(10.0, 0.0, 20.0, 10.0, 10.0)
        );
    }
}
