use nalgebra::Point2;
use stereo_tiling_core::Grid;

use crate::GeometryError;

/// Projection of epipolar pixels onto the terrain.
///
/// Implemented by the camera-geometry layer: given left-image epipolar
/// positions and one disparity value, triangulate each pixel with its match
/// and return the terrain `(x, y)` in the output CRS. Output must be parallel
/// to `points`.
pub trait GeometryProvider {
    fn epipolar_to_terrain(
        &self,
        points: &[[f64; 2]],
        disparity: f64,
    ) -> Result<Vec<[f64; 2]>, GeometryError>;
}

impl<F> GeometryProvider for F
where
    F: Fn(&[[f64; 2]], f64) -> Result<Vec<[f64; 2]>, GeometryError>,
{
    fn epipolar_to_terrain(
        &self,
        points: &[[f64; 2]],
        disparity: f64,
    ) -> Result<Vec<[f64; 2]>, GeometryError> {
        self(points, disparity)
    }
}

/// Terrain footprint of the flattened epipolar grid at one disparity.
///
/// `points[k]` is the terrain position of `grid.flatten()[k]`.
#[derive(Clone, Debug, PartialEq)]
pub struct DisparityBoundSample {
    pub disparity: f64,
    pub points: Vec<Point2<f64>>,
}

impl DisparityBoundSample {
    pub fn new(disparity: f64, points: Vec<Point2<f64>>) -> Self {
        Self { disparity, points }
    }

    pub fn from_arrays(disparity: f64, points: &[[f64; 2]]) -> Self {
        Self::new(
            disparity,
            points.iter().map(|p| Point2::new(p[0], p[1])).collect(),
        )
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Project the corners of `grid` at both ends of the disparity range.
///
/// The range is widened to integers: `disp_min` is floored, `disp_max`
/// ceiled.
pub fn compute_epipolar_grid_min_max<G: GeometryProvider + ?Sized>(
    provider: &G,
    grid: &Grid,
    disp_min: f64,
    disp_max: f64,
) -> Result<(DisparityBoundSample, DisparityBoundSample), GeometryError> {
    if disp_min > disp_max {
        return Err(GeometryError::DisparityRange {
            min: disp_min,
            max: disp_max,
        });
    }
    let disp_min = disp_min.floor();
    let disp_max = disp_max.ceil();

    let corners = grid.flatten();
    let project = |disp: f64| -> Result<DisparityBoundSample, GeometryError> {
        let terrain = provider.epipolar_to_terrain(corners, disp)?;
        if terrain.len() != corners.len() {
            return Err(GeometryError::SampleSize {
                sample: terrain.len(),
                grid: corners.len(),
            });
        }
        Ok(DisparityBoundSample::from_arrays(disp, &terrain))
    };

    let min = project(disp_min)?;
    let max = project(disp_max)?;
    log::debug!(
        "projected {} epipolar grid corners at disparities [{disp_min}, {disp_max}]",
        corners.len()
    );
    Ok((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stereo_tiling_core::make_grid;

    #[test]
    fn projects_at_widened_integer_disparities() {
        let grid = make_grid(0.0, 0.0, 20.0, 10.0, 10.0, 10.0).unwrap();
        let shift = |pts: &[[f64; 2]], d: f64| -> Result<Vec<[f64; 2]>, GeometryError> {
            Ok(pts.iter().map(|p| [p[0] + d, p[1]]).collect())
        };
        let (lo, hi) = compute_epipolar_grid_min_max(&shift, &grid, -3.5, 4.2).unwrap();
        assert_eq!(-4.0, lo.disparity);
        assert_eq!(5.0, hi.disparity);
        assert_eq!(grid.flatten().len(), lo.len());
        assert_eq!(Point2::new(16.0, 0.0), lo.points[2]);
        assert_eq!(Point2::new(25.0, 10.0), hi.points[5]);
    }

    #[test]
    fn rejects_inverted_range_and_short_output() {
        let grid = make_grid(0.0, 0.0, 10.0, 10.0, 10.0, 10.0).unwrap();
        let ident = |pts: &[[f64; 2]], _d: f64| -> Result<Vec<[f64; 2]>, GeometryError> {
            Ok(pts.to_vec())
        };
        assert!(matches!(
            compute_epipolar_grid_min_max(&ident, &grid, 3.0, 1.0),
            Err(GeometryError::DisparityRange { .. })
        ));
        let short = |pts: &[[f64; 2]], _d: f64| -> Result<Vec<[f64; 2]>, GeometryError> {
            Ok(pts[1..].to_vec())
        };
        assert!(matches!(
            compute_epipolar_grid_min_max(&short, &grid, 0.0, 1.0),
            Err(GeometryError::SampleSize { .. })
        ));
    }
}
