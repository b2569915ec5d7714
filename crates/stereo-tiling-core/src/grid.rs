use serde::{Deserialize, Serialize};

use crate::{BBox, TilingError};

/// Corner grid of a tiling.
///
/// A grid of `rows × cols` cells stores `(rows + 1) × (cols + 1)` corners,
/// row-major: corner `(j, i)` is the lower-left corner of cell `(row = j,
/// col = i)` and the upper-right corner of cell `(j - 1, i - 1)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    corner_rows: usize,
    corner_cols: usize,
    points: Vec<[f64; 2]>,
}

impl Grid {
    /// Wrap an existing row-major corner array.
    pub fn from_points(
        corner_rows: usize,
        corner_cols: usize,
        points: Vec<[f64; 2]>,
    ) -> Result<Self, TilingError> {
        if corner_rows * corner_cols != points.len() {
            return Err(TilingError::GridShape {
                rows: corner_rows,
                cols: corner_cols,
                len: points.len(),
            });
        }
        Ok(Self {
            corner_rows,
            corner_cols,
            points,
        })
    }

    /// Corner array shape `(rows + 1, cols + 1)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.corner_rows, self.corner_cols)
    }

    /// Cell shape `(rows, cols)`.
    #[inline]
    pub fn cell_shape(&self) -> (usize, usize) {
        (
            self.corner_rows.saturating_sub(1),
            self.corner_cols.saturating_sub(1),
        )
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        let (r, c) = self.cell_shape();
        r * c
    }

    #[inline]
    pub fn flat_index(&self, j: usize, i: usize) -> usize {
        j * self.corner_cols + i
    }

    /// Corner at row `j`, column `i`. Panics when out of range.
    #[inline]
    pub fn corner(&self, j: usize, i: usize) -> [f64; 2] {
        assert!(j < self.corner_rows && i < self.corner_cols);
        self.points[self.flat_index(j, i)]
    }

    /// Box of cell `(row, col)`.
    pub fn cell(&self, row: usize, col: usize) -> Option<BBox> {
        let (rows, cols) = self.cell_shape();
        if row >= rows || col >= cols {
            return None;
        }
        let lo = self.corner(row, col);
        let hi = self.corner(row + 1, col + 1);
        Some(BBox::new(lo[0], lo[1], hi[0], hi[1]))
    }

    /// Corners flattened row-major.
    #[inline]
    pub fn flatten(&self) -> &[[f64; 2]] {
        &self.points
    }

    /// Bounding box of all corners.
    pub fn extent(&self) -> Option<BBox> {
        let (first, rest) = self.points.split_first()?;
        let init = BBox::point(first[0], first[1]);
        Some(
            rest.iter()
                .fold(init, |acc, p| acc.merge(&BBox::point(p[0], p[1]))),
        )
    }
}

fn split_count(min: f64, max: f64, step: f64) -> usize {
    let n = ((max - min) / step).ceil();
    if n.is_finite() && n > 0.0 {
        n as usize
    } else {
        0
    }
}

fn check_steps(xstep: f64, ystep: f64) -> Result<(), TilingError> {
    for step in [xstep, ystep] {
        if !step.is_finite() || step <= 0.0 {
            return Err(TilingError::InvalidStep(step));
        }
    }
    Ok(())
}

/// Corner grid splitting `[xmin, xmax] × [ymin, ymax]` into `xstep × ystep`
/// cells. Border cells are shrunk to stay inside the box.
pub fn make_grid(
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
    xstep: f64,
    ystep: f64,
) -> Result<Grid, TilingError> {
    check_steps(xstep, ystep)?;
    let nx = split_count(xmin, xmax, xstep);
    let ny = split_count(ymin, ymax, ystep);

    let mut points = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        let y = ymax.min(ymin + j as f64 * ystep);
        for i in 0..=nx {
            points.push([xmax.min(xmin + i as f64 * xstep), y]);
        }
    }

    Ok(Grid {
        corner_rows: ny + 1,
        corner_cols: nx + 1,
        points,
    })
}

/// The cells of [`make_grid`] as explicit boxes, cropped to the bounding box.
///
/// Enumeration is column-major: the outer loop walks x, the inner loop y.
pub fn split(
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
    xstep: f64,
    ystep: f64,
) -> Result<Vec<BBox>, TilingError> {
    check_steps(xstep, ystep)?;
    let nx = split_count(xmin, xmax, xstep);
    let ny = split_count(ymin, ymax, ystep);
    let bounds = BBox::new(xmin, ymin, xmax, ymax);

    let mut regions = Vec::with_capacity(nx * ny);
    for i in 0..nx {
        for j in 0..ny {
            let cell = BBox::new(
                xmin + i as f64 * xstep,
                ymin + j as f64 * ystep,
                xmin + (i + 1) as f64 * xstep,
                ymin + (j + 1) as f64 * ystep,
            );
            regions.push(cell.crop(&bounds));
        }
    }
    Ok(regions)
}
