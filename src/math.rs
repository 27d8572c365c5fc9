// Copyright 2026 the Veduta Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Math primitives shared across the pipeline.

use std::ops::Mul;

use bytemuck::{Pod, Zeroable};
use peniko::kurbo;

/// Affine transformation matrix.
///
/// Coefficients follow the page-description convention `(a, b, c, d, e, f)`:
/// a point `(x, y)` maps to `(a*x + c*y + e, b*x + d*y + f)`.
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Transform {
    /// Coefficients `[a, b, c, d, e, f]`.
    pub coeffs: [f32; 6],
}

impl Transform {
    /// Identity transform.
    pub const IDENTITY: Self = Self {
        coeffs: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
    };

    /// Creates a transform from the 6-element affine form `(a, b, c, d, e, f)`.
    pub fn from_coeffs(coeffs: [f32; 6]) -> Self {
        Self { coeffs }
    }

    /// Returns the 6-element affine form.
    pub fn to_coeffs(self) -> [f32; 6] {
        self.coeffs
    }

    /// Creates a transform from a kurbo affine matrix.
    pub fn from_kurbo(transform: &kurbo::Affine) -> Self {
        Self {
            coeffs: transform.as_coeffs().map(|x| x as f32),
        }
    }

    /// Converts the transform to a kurbo affine matrix.
    pub fn to_kurbo(self) -> kurbo::Affine {
        kurbo::Affine::new(self.coeffs.map(|x| x as f64))
    }

    /// Creates a pure translation.
    pub fn translation(x: f32, y: f32) -> Self {
        Self {
            coeffs: [1.0, 0.0, 0.0, 1.0, x, y],
        }
    }

    /// Applies the transform to a point.
    #[inline]
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.coeffs;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Maps a direction, ignoring the translation.
    #[inline]
    fn linear(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, ..] = self.coeffs;
        (a * x + c * y, b * x + d * y)
    }

    /// Average column magnitude, used to carry line widths into page space.
    pub fn scale(&self) -> f32 {
        let (x_col_x, x_col_y) = self.linear(1.0, 0.0);
        let (y_col_x, y_col_y) = self.linear(0.0, 1.0);
        (x_col_x.hypot(x_col_y) + y_col_x.hypot(y_col_y)) * 0.5
    }

    /// Whether every coefficient is finite.
    pub fn is_finite(&self) -> bool {
        self.coeffs.iter().all(|c| c.is_finite())
    }
}

impl Mul for Transform {
    type Output = Self;

    /// Composes transforms so that `(self * other).apply(p)` equals
    /// `self.apply(other.apply(p))`: the columns of `other` pass through
    /// `self`'s linear part, its origin through the full map.
    #[inline]
    fn mul(self, other: Self) -> Self {
        let [a, b, c, d, e, f] = other.coeffs;
        let (ca, cb) = self.linear(a, b);
        let (cc, cd) = self.linear(c, d);
        let (ce, cf) = self.apply(e, f);
        Self {
            coeffs: [ca, cb, cc, cd, ce, cf],
        }
    }
}

/// Axis-aligned bounding rectangle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    /// The empty bounds: union identity, intersects nothing.
    pub const EMPTY: Self = Self {
        min_x: f32::INFINITY,
        min_y: f32::INFINITY,
        max_x: f32::NEG_INFINITY,
        max_y: f32::NEG_INFINITY,
    };

    /// Creates bounds from min/max corners.
    pub const fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Bounds of two points, in any order.
    pub fn from_points(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }

    /// Whether no point has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// Width, zero when empty.
    pub fn width(&self) -> f32 {
        (self.max_x - self.min_x).max(0.0)
    }

    /// Height, zero when empty.
    pub fn height(&self) -> f32 {
        (self.max_y - self.min_y).max(0.0)
    }

    /// Grows the bounds to contain a point.
    pub fn add_point(&mut self, x: f32, y: f32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Union with another bounds.
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Uniformly expanded copy.
    pub fn expand(&self, margin: f32) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    /// Translated copy.
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self {
            min_x: self.min_x + dx,
            min_y: self.min_y + dy,
            max_x: self.max_x + dx,
            max_y: self.max_y + dy,
        }
    }

    /// Whether two bounds overlap (closed intervals).
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Creates bounds from a kurbo rectangle.
    pub fn from_kurbo(rect: &kurbo::Rect) -> Self {
        Self {
            min_x: rect.x0 as f32,
            min_y: rect.y0 as f32,
            max_x: rect.x1 as f32,
            max_y: rect.y1 as f32,
        }
    }

    /// Converts the bounds to a kurbo rectangle.
    pub fn to_kurbo(self) -> kurbo::Rect {
        kurbo::Rect::new(
            self.min_x as f64,
            self.min_y as f64,
            self.max_x as f64,
            self.max_y as f64,
        )
    }
}

/// Quantizes a value to `1 / inv_step` units, mapping `-0.0` onto `0`.
#[inline]
pub(crate) fn quantize(value: f32, inv_step: f32) -> i64 {
    let q = (value * inv_step).round();
    if q == 0.0 {
        0
    } else {
        q as i64
    }
}

#[cfg(test)]
mod tests {
    use super::{quantize, Bounds, Transform};

    #[test]
    fn transform_composes_like_kurbo() {
        let a = Transform::from_coeffs([1.0, 0.5, -0.25, 2.0, 3.0, -7.0]);
        let b = Transform::from_coeffs([0.5, 0.0, 0.0, 0.5, 10.0, 20.0]);
        let ours = a * b;
        let theirs = Transform::from_kurbo(&(a.to_kurbo() * b.to_kurbo()));
        for (x, y) in ours.to_coeffs().iter().zip(theirs.to_coeffs()) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn transform_applies_page_convention() {
        let t = Transform::from_coeffs([2.0, 0.0, 0.0, 3.0, 10.0, 20.0]);
        assert_eq!(t.apply(1.0, 1.0), (12.0, 23.0));
    }

    #[test]
    fn composition_matches_sequential_application() {
        let outer = Transform::from_coeffs([0.0, 1.0, -1.0, 0.0, 4.0, -3.0]);
        let inner = Transform::from_coeffs([2.0, 0.0, 0.0, 0.5, 1.0, 1.0]);
        let (ix, iy) = inner.apply(3.0, -2.0);
        assert_eq!((outer * inner).apply(3.0, -2.0), outer.apply(ix, iy));
    }

    #[test]
    fn scale_averages_columns() {
        let t = Transform::from_coeffs([3.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_eq!(t.scale(), 2.0);
    }

    #[test]
    fn bounds_union_and_empty() {
        let a = Bounds::from_points(0.0, 0.0, 1.0, 1.0);
        assert_eq!(Bounds::EMPTY.union(&a), a);
        assert_eq!(a.union(&Bounds::EMPTY), a);
        let b = Bounds::from_points(2.0, -1.0, 3.0, 0.5);
        let u = a.union(&b);
        assert_eq!(u, Bounds::new(0.0, -1.0, 3.0, 1.0));
    }

    #[test]
    fn bounds_intersects_touching_edge() {
        let a = Bounds::new(0.0, 0.0, 1.0, 1.0);
        let b = Bounds::new(1.0, 0.0, 2.0, 1.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&Bounds::new(1.1, 0.0, 2.0, 1.0)));
    }

    #[test]
    fn quantize_folds_negative_zero() {
        assert_eq!(quantize(-0.0001, 1000.0), 0);
        assert_eq!(quantize(0.0004, 1000.0), 0);
        assert_eq!(quantize(0.0006, 1000.0), 1);
        assert_eq!(quantize(-1.25, 200.0), -250);
    }
}
