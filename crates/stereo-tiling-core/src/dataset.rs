//! Tiled datasets: a tiling grid plus one optional value per tile.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::{make_grid, split, BBox, Grid, TilingError};

/// `(row, col)` index of a tile in a tiling grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileAddress {
    pub row: usize,
    pub col: usize,
}

impl TileAddress {
    #[inline]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    #[error("tile ({row}, {col}) outside dataset of shape {rows}x{cols}")]
    OutOfRange {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("{0} per-tile entries expected, got {1}")]
    OverlapCount(usize, usize),
}

/// Domain metadata attached to a dataset.
///
/// The epipolar keys are consumed by the terrain/epipolar correspondence;
/// anything else travels in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub largest_epipolar_region: Option<BBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_epipolar_tile_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epipolar_regions_grid: Option<Grid>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A grid of tiles, each holding an optional value of type `T`.
#[derive(Clone, Debug)]
pub struct TiledDataset<T> {
    /// Corner grid of the tiling; tile `(row, col)` is cell `(row, col)`.
    pub tiling_grid: Grid,
    /// Per-tile margins `[left, bottom, right, top]`, row-major.
    pub overlaps: Vec<[f64; 4]>,
    pub attributes: DatasetAttributes,
    tiles: Vec<Option<T>>,
}

impl<T> TiledDataset<T> {
    /// Empty dataset over `tiling_grid`, with zero overlaps.
    pub fn new(tiling_grid: Grid) -> Self {
        let n = tiling_grid.num_cells();
        Self {
            tiling_grid,
            overlaps: vec![[0.0; 4]; n],
            attributes: DatasetAttributes::default(),
            tiles: std::iter::repeat_with(|| None).take(n).collect(),
        }
    }

    /// Tile counts `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.tiling_grid.cell_shape()
    }

    pub fn set_overlaps(&mut self, overlaps: Vec<[f64; 4]>) -> Result<(), DatasetError> {
        if overlaps.len() != self.tiles.len() {
            return Err(DatasetError::OverlapCount(self.tiles.len(), overlaps.len()));
        }
        self.overlaps = overlaps;
        Ok(())
    }

    fn offset(&self, addr: TileAddress) -> Result<usize, DatasetError> {
        let (rows, cols) = self.shape();
        if addr.row >= rows || addr.col >= cols {
            return Err(DatasetError::OutOfRange {
                row: addr.row,
                col: addr.col,
                rows,
                cols,
            });
        }
        Ok(addr.row * cols + addr.col)
    }

    #[inline]
    pub fn contains(&self, addr: TileAddress) -> bool {
        self.offset(addr).is_ok()
    }

    /// Tile window without overlaps.
    pub fn window(&self, addr: TileAddress) -> Result<BBox, DatasetError> {
        self.offset(addr)?;
        self.tiling_grid
            .cell(addr.row, addr.col)
            .ok_or(DatasetError::OutOfRange {
                row: addr.row,
                col: addr.col,
                rows: self.shape().0,
                cols: self.shape().1,
            })
    }

    /// Tile window grown by the tile's overlaps.
    pub fn window_with_overlaps(&self, addr: TileAddress) -> Result<BBox, DatasetError> {
        let off = self.offset(addr)?;
        Ok(self.window(addr)?.pad(self.overlaps[off]))
    }

    pub fn get(&self, addr: TileAddress) -> Result<Option<&T>, DatasetError> {
        let off = self.offset(addr)?;
        Ok(self.tiles[off].as_ref())
    }

    pub fn set(&mut self, addr: TileAddress, value: T) -> Result<Option<T>, DatasetError> {
        let off = self.offset(addr)?;
        Ok(self.tiles[off].replace(value))
    }

    pub fn take(&mut self, addr: TileAddress) -> Result<Option<T>, DatasetError> {
        let off = self.offset(addr)?;
        Ok(self.tiles[off].take())
    }

    /// Row-major iteration over filled tiles.
    pub fn iter(&self) -> impl Iterator<Item = (TileAddress, &T)> + '_ {
        let cols = self.shape().1.max(1);
        self.tiles.iter().enumerate().filter_map(move |(k, t)| {
            t.as_ref()
                .map(|v| (TileAddress::new(k / cols, k % cols), v))
        })
    }

    /// Same tiling and attributes, values mapped through `f`.
    pub fn map<U>(self, mut f: impl FnMut(TileAddress, T) -> U) -> TiledDataset<U> {
        let cols = self.shape().1.max(1);
        let tiles = self
            .tiles
            .into_iter()
            .enumerate()
            .map(|(k, t)| t.map(|v| f(TileAddress::new(k / cols, k % cols), v)))
            .collect();
        TiledDataset {
            tiling_grid: self.tiling_grid,
            overlaps: self.overlaps,
            attributes: self.attributes,
            tiles,
        }
    }
}

impl<T> Index<TileAddress> for TiledDataset<T> {
    type Output = Option<T>;

    fn index(&self, addr: TileAddress) -> &Self::Output {
        match self.offset(addr) {
            Ok(off) => &self.tiles[off],
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T> IndexMut<TileAddress> for TiledDataset<T> {
    fn index_mut(&mut self, addr: TileAddress) -> &mut Self::Output {
        match self.offset(addr) {
            Ok(off) => &mut self.tiles[off],
            Err(err) => panic!("{err}"),
        }
    }
}

/// Tiling of an epipolar image of `size_x × size_y` pixels into square tiles.
#[derive(Clone, Debug)]
pub struct EpipolarTiling {
    pub largest_epipolar_region: BBox,
    pub opt_epipolar_tile_size: usize,
    pub epipolar_regions_grid: Grid,
    /// Tiles as boxes, column-major (see [`split`]).
    pub epipolar_regions: Vec<BBox>,
}

impl EpipolarTiling {
    pub fn new(size_x: usize, size_y: usize, tile_size: usize) -> Result<Self, TilingError> {
        if tile_size == 0 {
            return Err(TilingError::InvalidTileSize(tile_size));
        }
        let (sx, sy, ts) = (size_x as f64, size_y as f64, tile_size as f64);
        let epipolar_regions_grid = make_grid(0.0, 0.0, sx, sy, ts, ts)?;
        let epipolar_regions = split(0.0, 0.0, sx, sy, ts, ts)?;

        log::info!("epipolar image {size_x}x{size_y} px");
        log::info!(
            "epipolar image will be processed in {} tiles of {tile_size}x{tile_size} px",
            epipolar_regions.len()
        );

        Ok(Self {
            largest_epipolar_region: BBox::new(0.0, 0.0, sx, sy),
            opt_epipolar_tile_size: tile_size,
            epipolar_regions_grid,
            epipolar_regions,
        })
    }

    /// Empty dataset over this tiling, with the epipolar attributes filled.
    ///
    /// Rows of the dataset follow the image y axis, columns the x axis.
    pub fn dataset<T>(&self) -> TiledDataset<T> {
        let mut ds = TiledDataset::new(self.epipolar_regions_grid.clone());
        ds.attributes = DatasetAttributes {
            largest_epipolar_region: Some(self.largest_epipolar_region),
            opt_epipolar_tile_size: Some(self.opt_epipolar_tile_size),
            epipolar_regions_grid: Some(self.epipolar_regions_grid.clone()),
            extra: serde_json::Map::new(),
        };
        ds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epipolar_tiling_dataset() {
        let tiling = EpipolarTiling::new(1000, 600, 256).unwrap();
        assert_eq!(4 * 3, tiling.epipolar_regions.len());
        let ds: TiledDataset<u32> = tiling.dataset();
        assert_eq!((3, 4), ds.shape());
        assert_eq!(Some(256), ds.attributes.opt_epipolar_tile_size);
        assert_eq!(
            Some(BBox::new(0.0, 0.0, 1000.0, 600.0)),
            ds.attributes.largest_epipolar_region
        );
        assert_eq!(
            BBox::new(768.0, 512.0, 1000.0, 600.0),
            ds.window(TileAddress::new(2, 3)).unwrap()
        );
    }

    #[test]
    fn get_set_and_index() {
        let grid = make_grid(0.0, 0.0, 4.0, 4.0, 2.0, 2.0).unwrap();
        let mut ds: TiledDataset<&str> = TiledDataset::new(grid);
        let a = TileAddress::new(1, 0);
        assert_eq!(None, ds.set(a, "tile").unwrap());
        assert_eq!(Some(&"tile"), ds.get(a).unwrap());
        assert_eq!(Some("tile"), ds[a]);
        ds[TileAddress::new(0, 1)] = Some("other");

        let filled: Vec<_> = ds.iter().map(|(addr, v)| (addr, *v)).collect();
        assert_eq!(
            vec![(TileAddress::new(0, 1), "other"), (a, "tile")],
            filled
        );
        assert!(matches!(
            ds.get(TileAddress::new(2, 0)),
            Err(DatasetError::OutOfRange { .. })
        ));
    }

    #[test]
    fn overlaps_pad_windows() {
        let grid = make_grid(0.0, 0.0, 4.0, 4.0, 2.0, 2.0).unwrap();
        let mut ds: TiledDataset<()> = TiledDataset::new(grid);
        assert!(ds.set_overlaps(vec![[1.0; 4]; 3]).is_err());
        ds.set_overlaps(vec![[1.0, 0.0, 0.0, 2.0]; 4]).unwrap();
        assert_eq!(
            BBox::new(1.0, 2.0, 4.0, 6.0),
            ds.window_with_overlaps(TileAddress::new(1, 1)).unwrap()
        );
    }

    #[test]
    fn attributes_keep_extra_keys() {
        let json = r#"{"opt_epipolar_tile_size": 500, "disp_to_alt_ratio": 1.5}"#;
        let attrs: DatasetAttributes = serde_json::from_str(json).unwrap();
        assert_eq!(Some(500), attrs.opt_epipolar_tile_size);
        assert_eq!(Some(&serde_json::json!(1.5)), attrs.extra.get("disp_to_alt_ratio"));
    }

    #[test]
    #[should_panic]
    fn index_out_of_range_panics() {
        let grid = make_grid(0.0, 0.0, 2.0, 2.0, 2.0, 2.0).unwrap();
        let ds: TiledDataset<u8> = TiledDataset::new(grid);
        let _ = &ds[TileAddress::new(0, 1)];
    }
}
