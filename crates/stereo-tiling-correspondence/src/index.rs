//! Delaunay triangulation plus k-d tree over one disparity-bound sample.

use delaunator::{next_halfedge, prev_halfedge, triangulate, Point, EMPTY};
use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::GeometryError;

/// Float k-d tree with large buckets: regular sampling grids put many points
/// on the same axis value, and a bucket must hold all of them.
type SampleTree = KdTree<f64, u64, 2, 256, u32>;

/// Relative tolerance for point-on-edge decisions.
const EDGE_EPS: f64 = 1e-10;

/// Point-location and nearest-neighbor index over a fixed point set.
///
/// Built once, never mutated. Triangle `t` is `triangles[3t..3t + 3]`, the
/// indices referring to the input point order.
pub struct SpatialIndex {
    points: Vec<Point2<f64>>,
    triangles: Vec<usize>,
    halfedges: Vec<usize>,
    vertex_triangle: Vec<usize>,
    tree: SampleTree,
}

enum Walk {
    Inside,
    Cross(usize),
}

#[inline]
fn orient(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

impl SpatialIndex {
    /// Build the index over `points`, each multiplied by `scale`.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(points), fields(n = points.len()))
    )]
    pub fn build(points: &[Point2<f64>], scale: f64) -> Result<Self, GeometryError> {
        let mut scaled = Vec::with_capacity(points.len());
        for (index, p) in points.iter().enumerate() {
            if !p.x.is_finite() || !p.y.is_finite() {
                return Err(GeometryError::NonFinite { index });
            }
            scaled.push(Point2::new(p.x * scale, p.y * scale));
        }

        let input: Vec<Point> = scaled.iter().map(|p| Point { x: p.x, y: p.y }).collect();
        let tri = triangulate(&input);
        if tri.triangles.is_empty() {
            return Err(GeometryError::DegenerateTriangulation {
                points: points.len(),
            });
        }

        let mut vertex_triangle = vec![EMPTY; scaled.len()];
        for (e, &v) in tri.triangles.iter().enumerate() {
            if vertex_triangle[v] == EMPTY {
                vertex_triangle[v] = e / 3;
            }
        }

        let mut tree = SampleTree::with_capacity(scaled.len());
        for (k, p) in scaled.iter().enumerate() {
            tree.add(&[p.x, p.y], k as u64);
        }

        log::debug!(
            "spatial index: {} points, {} triangles",
            scaled.len(),
            tri.triangles.len() / 3
        );

        Ok(Self {
            points: scaled,
            triangles: tri.triangles,
            halfedges: tri.halfedges,
            vertex_triangle,
            tree,
        })
    }

    #[inline]
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len() / 3
    }

    /// Vertex indices of triangle `t`.
    #[inline]
    pub fn triangle(&self, t: usize) -> [usize; 3] {
        [
            self.triangles[3 * t],
            self.triangles[3 * t + 1],
            self.triangles[3 * t + 2],
        ]
    }

    /// Index of the sample point closest to `q` (already scaled).
    pub fn nearest(&self, q: Point2<f64>) -> usize {
        self.tree.nearest_one::<SquaredEuclidean>(&[q.x, q.y]).item as usize
    }

    fn is_outside(&self, e: usize, q: Point2<f64>) -> bool {
        let a = self.points[self.triangles[e]];
        let b = self.points[self.triangles[next_halfedge(e)]];
        let c = self.points[self.triangles[prev_halfedge(e)]];
        let side_q = orient(a, b, q);
        let side_c = orient(a, b, c);
        let tol = EDGE_EPS * (b - a).norm() * (q - a).norm();
        side_q.abs() > tol && side_q.signum() != side_c.signum()
    }

    fn walk_step(&self, t: usize, q: Point2<f64>) -> Walk {
        (3 * t..3 * t + 3)
            .find(|&e| self.is_outside(e, q))
            .map_or(Walk::Inside, Walk::Cross)
    }

    /// Triangle containing `q` (already scaled), `None` outside the convex
    /// hull. Points on a shared edge resolve to whichever triangle the walk
    /// reaches first.
    pub fn locate(&self, q: Point2<f64>) -> Option<usize> {
        let mut t = match self.vertex_triangle[self.nearest(q)] {
            EMPTY => 0,
            t => t,
        };
        for _ in 0..=self.num_triangles() {
            match self.walk_step(t, q) {
                Walk::Inside => return Some(t),
                Walk::Cross(e) => match self.halfedges[e] {
                    EMPTY => return None,
                    opposite => t = opposite / 3,
                },
            }
        }
        log::warn!("triangulation walk did not converge, scanning all triangles");
        (0..self.num_triangles()).find(|&t| matches!(self.walk_step(t, q), Walk::Inside))
    }
}
