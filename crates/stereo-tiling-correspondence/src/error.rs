use stereo_tiling_core::TilingError;

/// Errors raised while building the correspondence of one stereo pair.
///
/// They are fatal for that pair only; callers holding several pairs may skip
/// the failing one.
#[derive(thiserror::Error, Debug)]
pub enum GeometryError {
    #[error("triangulation needs at least 3 non-collinear points (got {points})")]
    DegenerateTriangulation { points: usize },
    #[error("non-finite sample point at index {index}")]
    NonFinite { index: usize },
    #[error("sample has {sample} points but the epipolar grid has {grid} corners")]
    SampleSize { sample: usize, grid: usize },
    #[error("missing dataset attribute `{0}`")]
    MissingAttribute(&'static str),
    #[error("disparity range is inverted (min={min}, max={max})")]
    DisparityRange { min: f64, max: f64 },
    #[error("{bounds} terrain grid bound set(s) given for {pairs} pair(s)")]
    BoundsCount { bounds: usize, pairs: usize },
    #[error("geometry provider failed: {0}")]
    Provider(String),
    #[error(transparent)]
    Tiling(#[from] TilingError),
}
