//! Rejection of boundary slivers.
//!
//! The sample points come from a regular epipolar grid, but their terrain
//! footprint is generally concave. Delaunay fills the concavities with long
//! triangles whose vertices all sit on one side of the sampling grid; using
//! them would inflate the epipolar bounds, so lookups landing in them fall
//! back to the nearest sample instead.
//!
//! Only triangles with all three vertices on the *same* side are rejected. A
//! thin triangle with one interior vertex near a notch is kept.

/// Sides of the sampling grid, in corner-row/column terms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridSide {
    Left,
    Bottom,
    Right,
    Top,
}

impl GridSide {
    pub const ALL: [GridSide; 4] = [
        GridSide::Left,
        GridSide::Bottom,
        GridSide::Right,
        GridSide::Top,
    ];
}

/// Boundary membership for the corners of a `rows × cols` sampling grid,
/// corners indexed row-major.
#[derive(Clone, Copy, Debug)]
pub struct SamplingBoundary {
    rows: usize,
    cols: usize,
}

impl SamplingBoundary {
    /// `rows`/`cols` are corner counts, as in `Grid::shape`.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// True if corner `v` lies on `side`.
    ///
    /// Row 0 is `Top` and the last row `Bottom`, matching array layout rather
    /// than the direction of the y coordinate.
    pub fn on_side(&self, v: usize, side: GridSide) -> bool {
        let (r, c) = (v / self.cols, v % self.cols);
        match side {
            GridSide::Left => c == 0,
            GridSide::Bottom => r + 1 == self.rows,
            GridSide::Right => c + 1 == self.cols,
            GridSide::Top => r == 0,
        }
    }

    /// True if all three vertices lie on one common side.
    pub fn is_edge_simplex(&self, simplex: [usize; 3]) -> bool {
        GridSide::ALL
            .iter()
            .any(|&side| simplex.iter().all(|&v| self.on_side(v, side)))
    }
}
