use serde::{Deserialize, Serialize};

use crate::TilingError;

/// Axis-aligned box `(xmin, ymin, xmax, ymax)`.
///
/// The same type is used for terrain regions (CRS units) and epipolar regions
/// (pixel units). A box is *empty* as soon as one of its extents is not
/// strictly positive; such boxes are legal values and show up naturally when
/// cropping a region against a disjoint one.
///
/// Serialized as a flat `[xmin, ymin, xmax, ymax]` array.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BBox {
    #[inline]
    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Degenerate box reduced to a single point.
    #[inline]
    pub const fn point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    #[inline]
    pub const fn from_array(a: [f64; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }

    #[inline]
    pub const fn to_array(&self) -> [f64; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// True when the box holds no area (or is inconsistent).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xmin >= self.xmax || self.ymin >= self.ymax
    }

    /// Clamp every edge of `self` into `bounds`.
    ///
    /// If `self` lies fully outside `bounds` the result is empty (possibly
    /// collapsed onto one of the bounds' edges); check [`BBox::is_empty`].
    pub fn crop(&self, bounds: &BBox) -> BBox {
        let clamp_x = |v: f64| bounds.xmax.min(bounds.xmin.max(v));
        let clamp_y = |v: f64| bounds.ymax.min(bounds.ymin.max(v));
        BBox {
            xmin: clamp_x(self.xmin),
            ymin: clamp_y(self.ymin),
            xmax: clamp_x(self.xmax),
            ymax: clamp_y(self.ymax),
        }
    }

    /// Grow the box by `margins` given as `[left, bottom, right, top]`.
    ///
    /// Negative margins shrink it.
    pub fn pad(&self, margins: [f64; 4]) -> BBox {
        BBox {
            xmin: self.xmin - margins[0],
            ymin: self.ymin - margins[1],
            xmax: self.xmax + margins[2],
            ymax: self.ymax + margins[3],
        }
    }

    /// Positive-area overlap test.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.xmin < other.xmax
            && other.xmin < self.xmax
            && self.ymin < other.ymax
            && other.ymin < self.ymax
    }

    /// Closed containment test for a point.
    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    /// Smallest box containing both `self` and `other`.
    pub fn merge(&self, other: &BBox) -> BBox {
        BBox {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
        }
    }

    /// Stable textual key, usable to index regions in maps.
    pub fn hash_key(&self) -> String {
        format!("{}_{}_{}_{}", self.xmin, self.ymin, self.xmax, self.ymax)
    }
}

impl From<[f64; 4]> for BBox {
    fn from(a: [f64; 4]) -> Self {
        BBox::from_array(a)
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        b.to_array()
    }
}

/// Component-wise union of all boxes.
pub fn union(boxes: &[BBox]) -> Result<BBox, TilingError> {
    let (first, rest) = boxes.split_first().ok_or(TilingError::EmptyInput)?;
    Ok(rest.iter().fold(*first, |acc, b| acc.merge(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_inside_is_identity() {
        let bounds = BBox::new(0.0, 0.0, 100.0, 50.0);
        let region = BBox::new(10.0, 5.0, 20.0, 15.0);
        assert_eq!(region, region.crop(&bounds));
    }

    #[test]
    fn crop_clamps_each_edge() {
        let bounds = BBox::new(0.0, 0.0, 100.0, 50.0);
        let region = BBox::new(-10.0, 40.0, 20.0, 80.0);
        assert_eq!(BBox::new(0.0, 40.0, 20.0, 50.0), region.crop(&bounds));
    }

    #[test]
    fn crop_outside_is_empty() {
        let bounds = BBox::new(0.0, 0.0, 10.0, 10.0);
        let outside = [
            BBox::new(20.0, 0.0, 30.0, 10.0),
            BBox::new(-30.0, -30.0, -20.0, -20.0),
            BBox::new(0.0, 11.0, 10.0, 12.0),
            BBox::new(-5.0, -5.0, 0.0, 0.0),
        ];
        for region in outside {
            assert!(region.crop(&bounds).is_empty(), "{region:?}");
        }
    }

    #[test]
    fn zero_pad_is_identity() {
        let b = BBox::new(-1.5, 2.0, 3.25, 7.0);
        assert_eq!(b, b.pad([0.0; 4]));
    }

    #[test]
    fn pad_order_is_left_bottom_right_top() {
        let b = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(BBox::new(-1.0, -2.0, 13.0, 14.0), b.pad([1.0, 2.0, 3.0, 4.0]));
    }

    #[test]
    fn emptiness() {
        assert!(BBox::new(0.0, 0.0, 0.0, 1.0).is_empty());
        assert!(BBox::new(0.0, 2.0, 1.0, 1.0).is_empty());
        assert!(!BBox::new(0.0, 0.0, 1.0, 1.0).is_empty());
    }

    #[test]
    fn union_of_boxes() {
        let boxes = [
            BBox::new(0.0, 0.0, 1.0, 1.0),
            BBox::new(-2.0, 0.5, 0.5, 3.0),
            BBox::new(0.0, -1.0, 4.0, 0.0),
        ];
        assert_eq!(BBox::new(-2.0, -1.0, 4.0, 3.0), union(&boxes).unwrap());
    }

    #[test]
    fn union_of_nothing_fails() {
        assert!(matches!(union(&[]), Err(TilingError::EmptyInput)));
    }

    #[test]
    fn serializes_as_flat_array() {
        let b = BBox::new(1.0, 2.0, 3.0, 4.5);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!("[1.0,2.0,3.0,4.5]", json);
        let back: BBox = serde_json::from_str(&json).unwrap();
        assert_eq!(b, back);
    }

    #[test]
    fn hash_key_is_stable() {
        assert_eq!("0_1.5_2_3", BBox::new(0.0, 1.5, 2.0, 3.0).hash_key());
    }
}
