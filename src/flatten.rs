// Copyright 2026 the Veduta Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flattening curves into polylines with bounded perpendicular error.

use smallvec::SmallVec;

/// A point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub(crate) const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }

    #[inline]
    fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl core::ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl core::ops::Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl core::ops::Mul<f32> for Point {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// A cubic Bezier segment.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Cubic {
    pub p0: Point,
    pub p1: Point,
    pub p2: Point,
    pub p3: Point,
}

impl Cubic {
    pub(crate) fn new(p0: Point, p1: Point, p2: Point, p3: Point) -> Self {
        Self { p0, p1, p2, p3 }
    }

    /// Elevates a quadratic to the equivalent cubic.
    pub(crate) fn from_quad(p0: Point, p1: Point, p2: Point) -> Self {
        let c = 2.0 / 3.0;
        Self {
            p0,
            p1: p0 + (p1 - p0) * c,
            p2: p2 + (p1 - p2) * c,
            p3: p2,
        }
    }

    fn is_finite(&self) -> bool {
        self.p0.is_finite() && self.p1.is_finite() && self.p2.is_finite() && self.p3.is_finite()
    }

    /// Splits at t = 0.5 by midpoint subdivision.
    fn subdivide(&self) -> (Self, Self) {
        let m01 = self.p0.midpoint(self.p1);
        let m12 = self.p1.midpoint(self.p2);
        let m23 = self.p2.midpoint(self.p3);
        let m012 = m01.midpoint(m12);
        let m123 = m12.midpoint(m23);
        let mid = m012.midpoint(m123);
        (
            Self::new(self.p0, m01, m012, mid),
            Self::new(mid, m123, m23, self.p3),
        )
    }

    /// Largest squared perpendicular deviation of the control points from the
    /// chord `p0..p3`.
    ///
    /// When the chord is degenerate the raw control point offsets are used
    /// instead, so loops and cusps still subdivide.
    fn flatness_sq(&self) -> f32 {
        let chord = self.p3 - self.p0;
        let len_sq = chord.x * chord.x + chord.y * chord.y;
        let d1 = self.p1 - self.p0;
        let d2 = self.p2 - self.p0;
        if len_sq < 1e-12 {
            let a = d1.x * d1.x + d1.y * d1.y;
            let b = d2.x * d2.x + d2.y * d2.y;
            return a.max(b);
        }
        let cross1 = d1.x * chord.y - d1.y * chord.x;
        let cross2 = d2.x * chord.y - d2.y * chord.x;
        (cross1 * cross1).max(cross2 * cross2) / len_sq
    }
}

/// Flattens a cubic into chords with perpendicular deviation at most
/// `flatness`, splitting at most `max_depth` times.
///
/// Chords are emitted in curve order through `emit(start, end)`. A cubic with
/// a non-finite control point is dropped entirely; the caller tallies it.
/// The subdivision stack is explicit and stays inline for the default depth.
pub(crate) fn flatten_cubic(
    cubic: Cubic,
    flatness: f32,
    max_depth: u32,
    emit: &mut impl FnMut(Point, Point),
) -> bool {
    if !cubic.is_finite() {
        return false;
    }
    let flatness_sq = flatness * flatness;
    let mut stack: SmallVec<[(Cubic, u32); 10]> = SmallVec::new();
    stack.push((cubic, 0));
    while let Some((c, depth)) = stack.pop() {
        if depth >= max_depth || c.flatness_sq() <= flatness_sq {
            emit(c.p0, c.p3);
        } else {
            let (left, right) = c.subdivide();
            // Left half on top so chords come out in curve order.
            stack.push((right, depth + 1));
            stack.push((left, depth + 1));
        }
    }
    true
}
