/// Errors produced by the tiling algebra.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TilingError {
    #[error("union of an empty list of regions")]
    EmptyInput,
    #[error("grid step must be finite and > 0 (got {0})")]
    InvalidStep(f64),
    #[error("tile size must be > 0 (got {0})")]
    InvalidTileSize(usize),
    #[error("cell ({row}, {col}) is outside a {rows}x{cols} grid")]
    OutOfGrid {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("{rows}x{cols} grid cannot hold {len} corners")]
    GridShape { rows: usize, cols: usize, len: usize },
}
