// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Geometry kernel used by the lightmap baker: bounding boxes, rays, a triangle octree, a growing
//! rectangle packer and a handful of triangle helpers (barycentric coordinates, flattening of a 3D
//! triangle onto a plane, light falloff).

#![allow(clippy::many_single_char_names)]

pub mod aabb;
pub mod octree;
pub mod ray;
pub mod rectpack;

pub use nalgebra;

use nalgebra::{Scalar, UnitQuaternion, Vector2, Vector3};
use num_traits::NumAssign;

/// Axis-aligned rectangle defined by its top-left corner and size.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rect<T>
where
    T: NumAssign + Scalar + PartialOrd + Copy,
{
    pub position: Vector2<T>,
    pub size: Vector2<T>,
}

impl<T> Rect<T>
where
    T: NumAssign + Scalar + PartialOrd + Copy,
{
    #[inline]
    pub fn new(x: T, y: T, w: T, h: T) -> Self {
        Self {
            position: Vector2::new(x, y),
            size: Vector2::new(w, h),
        }
    }

    #[inline]
    pub fn x(&self) -> T {
        self.position.x
    }

    #[inline]
    pub fn y(&self) -> T {
        self.position.y
    }

    #[inline]
    pub fn w(&self) -> T {
        self.size.x
    }

    #[inline]
    pub fn h(&self) -> T {
        self.size.y
    }

    #[inline]
    pub fn right(&self) -> T {
        self.position.x + self.size.x
    }

    #[inline]
    pub fn bottom(&self) -> T {
        self.position.y + self.size.y
    }

    /// Returns overlapping part of two rectangles, if any. Rectangles that only touch each other
    /// by an edge do not overlap.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let left = if self.x() > other.x() { self.x() } else { other.x() };
        let top = if self.y() > other.y() { self.y() } else { other.y() };
        let right = if self.right() < other.right() {
            self.right()
        } else {
            other.right()
        };
        let bottom = if self.bottom() < other.bottom() {
            self.bottom()
        } else {
            other.bottom()
        };
        if right > left && bottom > top {
            Some(Self::new(left, top, right - left, bottom - top))
        } else {
            None
        }
    }
}

/// Calculates barycentric coordinates of point `p` in 2D triangle `abc`. Returns `None` if the
/// triangle is degenerate.
#[inline]
pub fn get_barycentric_coords_2d(
    p: Vector2<f32>,
    a: Vector2<f32>,
    b: Vector2<f32>,
    c: Vector2<f32>,
) -> Option<(f32, f32, f32)> {
    let den = (b.y - c.y) * (a.x - c.x) + (c.x - b.x) * (a.y - c.y);
    if den.abs() <= f32::EPSILON {
        return None;
    }
    let l1 = ((b.y - c.y) * (p.x - c.x) + (c.x - b.x) * (p.y - c.y)) / den;
    let l2 = ((c.y - a.y) * (p.x - c.x) + (a.x - c.x) * (p.y - c.y)) / den;
    Some((l1, l2, 1.0 - l1 - l2))
}

/// Checks whether every barycentric coordinate lies in `[-offset, 1 + offset]`. Zero offset gives
/// classic point-in-triangle test, positive offset accepts points slightly outside of edges.
#[inline]
pub fn barycentric_is_inside_with_offset(bary: (f32, f32, f32), offset: f32) -> bool {
    let (l1, l2, l3) = bary;
    let lo = -offset;
    let hi = 1.0 + offset;
    (lo..=hi).contains(&l1) && (lo..=hi).contains(&l2) && (lo..=hi).contains(&l3)
}

/// Interpolates triangle attribute using barycentric coordinates.
#[inline]
pub fn barycentric_to_world(
    bary: (f32, f32, f32),
    a: &Vector3<f32>,
    b: &Vector3<f32>,
    c: &Vector3<f32>,
) -> Vector3<f32> {
    a.scale(bary.0) + b.scale(bary.1) + c.scale(bary.2)
}

/// Interpolates 2D triangle attribute (texture coordinates) using barycentric coordinates.
#[inline]
pub fn barycentric_to_2d(
    bary: (f32, f32, f32),
    a: &Vector2<f32>,
    b: &Vector2<f32>,
    c: &Vector2<f32>,
) -> Vector2<f32> {
    a.scale(bary.0) + b.scale(bary.1) + c.scale(bary.2)
}

/// Moves the first vertex of a triangle into the origin and rotates the triangle so its normal
/// points along +Z. The result lies in XY plane, edge lengths are kept.
pub fn flatten_triangle(triangle: &[Vector3<f32>; 3], normal: &Vector3<f32>) -> [Vector2<f32>; 3] {
    let origin = triangle[0];
    let rotation = UnitQuaternion::rotation_between(normal, &Vector3::z())
        .unwrap_or_else(UnitQuaternion::identity);
    let project = |v: &Vector3<f32>| {
        let p = rotation.transform_vector(&(v - origin));
        Vector2::new(p.x, p.y)
    };
    [
        project(&triangle[0]),
        project(&triangle[1]),
        project(&triangle[2]),
    ]
}

/// Per-axis minimum and maximum of a set of 2D points.
#[inline]
pub fn min_max_2d(points: &[Vector2<f32>]) -> (Vector2<f32>, Vector2<f32>) {
    let mut min = Vector2::repeat(f32::MAX);
    let mut max = Vector2::repeat(-f32::MAX);
    for p in points {
        min = min.inf(p);
        max = max.sup(p);
    }
    (min, max)
}

/// Cosine of the angle between two vectors clamped to `[-1, 1]`. Zero if any vector is degenerate.
#[inline]
pub fn cos_between(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    let den = a.norm() * b.norm();
    if den <= f32::EPSILON {
        0.0
    } else {
        (a.dot(b) / den).clamp(-1.0, 1.0)
    }
}

/// Lambert factor of a surface with `normal` located at `from` receiving light that arrives from
/// point `to`.
#[inline]
pub fn lambert_towards(normal: &Vector3<f32>, from: &Vector3<f32>, to: &Vector3<f32>) -> f32 {
    cos_between(normal, &(to - from))
}

/// Cutoff light falloff: `(1 - d / cutoff)^decay` clamped to `[0, 1]` before exponentiation.
/// Lights without decay or without cutoff distance do not attenuate.
#[inline]
pub fn distance_attenuation(distance: f32, cutoff: f32, decay: f32) -> f32 {
    if decay > 0.0 && cutoff != 0.0 {
        (1.0 - distance / cutoff).clamp(0.0, 1.0).powf(decay)
    } else {
        1.0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle() -> (Vector2<f32>, Vector2<f32>, Vector2<f32>) {
        (
            Vector2::new(0.0, 0.0),
            Vector2::new(4.0, 0.0),
            Vector2::new(0.0, 3.0),
        )
    }

    #[test]
    fn barycentric_at_vertices() {
        let (a, b, c) = triangle();
        for (i, p) in [a, b, c].into_iter().enumerate() {
            let (l1, l2, l3) = get_barycentric_coords_2d(p, a, b, c).unwrap();
            let mut expected = [0.0; 3];
            expected[i] = 1.0;
            assert_relative_eq!(l1, expected[0], epsilon = 1.0e-6);
            assert_relative_eq!(l2, expected[1], epsilon = 1.0e-6);
            assert_relative_eq!(l3, expected[2], epsilon = 1.0e-6);
        }
    }

    #[test]
    fn barycentric_at_centroid() {
        let (a, b, c) = triangle();
        let centroid = (a + b + c) / 3.0;
        let (l1, l2, l3) = get_barycentric_coords_2d(centroid, a, b, c).unwrap();
        assert_relative_eq!(l1, 1.0 / 3.0, epsilon = 1.0e-6);
        assert_relative_eq!(l2, 1.0 / 3.0, epsilon = 1.0e-6);
        assert_relative_eq!(l3, 1.0 / 3.0, epsilon = 1.0e-6);
    }

    #[test]
    fn barycentric_degenerate_triangle() {
        let a = Vector2::new(0.0, 0.0);
        let b = Vector2::new(1.0, 1.0);
        let c = Vector2::new(2.0, 2.0);
        assert_eq!(get_barycentric_coords_2d(Vector2::new(0.5, 0.2), a, b, c), None);
    }

    #[test]
    fn inside_with_offset() {
        let (a, b, c) = triangle();
        let outside = Vector2::new(-0.2, 1.0);
        let bary = get_barycentric_coords_2d(outside, a, b, c).unwrap();
        assert!(!barycentric_is_inside_with_offset(bary, 0.0));
        assert!(barycentric_is_inside_with_offset(bary, 0.2));
    }

    #[test]
    fn flatten_keeps_edge_lengths() {
        let tri = [
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(2.0, 2.0, 5.0),
            Vector3::new(1.0, 4.0, 4.0),
        ];
        let normal = (tri[1] - tri[0]).cross(&(tri[2] - tri[0])).normalize();
        let flat = flatten_triangle(&tri, &normal);

        assert_relative_eq!(flat[0], Vector2::zeros(), epsilon = 1.0e-6);
        for (i, j) in [(0, 1), (1, 2), (2, 0)] {
            assert_relative_eq!(
                (flat[i] - flat[j]).norm(),
                (tri[i] - tri[j]).norm(),
                epsilon = 1.0e-5
            );
        }
    }

    #[test]
    fn flatten_facing_down() {
        let tri = [
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 1.0, 1.0),
            Vector3::new(1.0, 0.0, 1.0),
        ];
        let flat = flatten_triangle(&tri, &Vector3::new(0.0, 0.0, -1.0));
        assert_relative_eq!((flat[1] - flat[0]).norm(), 1.0, epsilon = 1.0e-6);
        assert_relative_eq!((flat[2] - flat[0]).norm(), 1.0, epsilon = 1.0e-6);
    }

    #[test]
    fn attenuation() {
        assert_eq!(distance_attenuation(5.0, 0.0, 2.0), 1.0);
        assert_eq!(distance_attenuation(5.0, 10.0, 0.0), 1.0);
        assert_relative_eq!(distance_attenuation(5.0, 10.0, 2.0), 0.25);
        assert_eq!(distance_attenuation(20.0, 10.0, 1.0), 0.0);
    }

    #[test]
    fn rect_intersection() {
        let a = Rect::new(0.0, 0.0, 2.0, 2.0);
        let b = Rect::new(1.0, 1.0, 2.0, 2.0);
        let c = Rect::new(2.0, 0.0, 1.0, 1.0);
        assert_eq!(a.intersection(&b), Some(Rect::new(1.0, 1.0, 1.0, 1.0)));
        assert_eq!(a.intersection(&c), None);
    }

    #[test]
    fn lambert() {
        let n = Vector3::new(0.0, 1.0, 0.0);
        let from = Vector3::zeros();
        assert_relative_eq!(lambert_towards(&n, &from, &Vector3::new(0.0, 5.0, 0.0)), 1.0);
        assert_relative_eq!(lambert_towards(&n, &from, &Vector3::new(0.0, -5.0, 0.0)), -1.0);
        assert_eq!(lambert_towards(&n, &from, &from), 0.0);
    }
}
