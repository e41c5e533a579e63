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

use crate::aabb::AxisAlignedBoundingBox;
use nalgebra::Vector3;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vector3<f32>,
    pub dir: Vector3<f32>,
}

impl Default for Ray {
    #[inline]
    fn default() -> Self {
        Ray {
            origin: Vector3::new(0.0, 0.0, 0.0),
            dir: Vector3::new(0.0, 0.0, 1.0),
        }
    }
}

/// Result of a ray-triangle test. `t` is the ray parameter (`origin + dir * t`), `bary` holds
/// barycentric weights of the triangle vertices at the hit point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TriangleHit {
    pub t: f32,
    pub bary: (f32, f32, f32),
}

impl Ray {
    #[inline]
    pub fn new(origin: Vector3<f32>, dir: Vector3<f32>) -> Self {
        Self { origin, dir }
    }

    /// Returns point on ray which defined by pt=o+d*t equation.
    #[inline]
    pub fn get_point(&self, t: f32) -> Vector3<f32> {
        self.origin + self.dir.scale(t)
    }

    /// Slab test. Returns entry and exit parameters of the ray, only the part of the ray in front
    /// of its origin is considered.
    pub fn box_intersection(&self, aabb: &AxisAlignedBoundingBox) -> Option<(f32, f32)> {
        let mut tmin = f32::NEG_INFINITY;
        let mut tmax = f32::INFINITY;
        for axis in 0..3 {
            let inv = 1.0 / self.dir[axis];
            let mut t0 = (aabb.min[axis] - self.origin[axis]) * inv;
            let mut t1 = (aabb.max[axis] - self.origin[axis]) * inv;
            if inv < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            // f32::max/min skip NaN produced by 0 * inf on a slab boundary.
            tmin = tmin.max(t0);
            tmax = tmax.min(t1);
            if tmax < tmin {
                return None;
            }
        }
        if tmax < 0.0 {
            None
        } else {
            Some((tmin.max(0.0), tmax))
        }
    }

    /// Two-sided Möller-Trumbore test. Hits behind the origin are rejected.
    pub fn triangle_intersection(&self, vertices: &[Vector3<f32>; 3]) -> Option<TriangleHit> {
        let edge1 = vertices[1] - vertices[0];
        let edge2 = vertices[2] - vertices[0];
        let p = self.dir.cross(&edge2);
        let det = edge1.dot(&p);
        if det.abs() <= f32::EPSILON * edge1.norm() * edge2.norm() {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - vertices[0];
        let u = s.dot(&p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(&edge1);
        let v = self.dir.dot(&q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = edge2.dot(&q) * inv_det;
        if t < 0.0 {
            return None;
        }
        Some(TriangleHit {
            t,
            bary: (1.0 - u - v, u, v),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle() -> [Vector3<f32>; 3] {
        [
            Vector3::new(-1.0, 0.0, -1.0),
            Vector3::new(1.0, 0.0, -1.0),
            Vector3::new(0.0, 0.0, 1.0),
        ]
    }

    #[test]
    fn ray_hits_triangle_from_both_sides() {
        let down = Ray::new(Vector3::new(0.0, 2.0, 0.0), Vector3::new(0.0, -1.0, 0.0));
        let hit = down.triangle_intersection(&triangle()).unwrap();
        assert_relative_eq!(hit.t, 2.0);
        assert_relative_eq!(down.get_point(hit.t), Vector3::zeros());
        let (a, b, c) = hit.bary;
        assert_relative_eq!(a + b + c, 1.0);

        let up = Ray::new(Vector3::new(0.0, -3.0, 0.0), Vector3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(up.triangle_intersection(&triangle()).unwrap().t, 3.0);
    }

    #[test]
    fn ray_misses_triangle() {
        let away = Ray::new(Vector3::new(0.0, 2.0, 0.0), Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(away.triangle_intersection(&triangle()), None);

        let aside = Ray::new(Vector3::new(5.0, 2.0, 0.0), Vector3::new(0.0, -1.0, 0.0));
        assert_eq!(aside.triangle_intersection(&triangle()), None);

        let parallel = Ray::new(Vector3::new(-5.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(parallel.triangle_intersection(&triangle()), None);
    }

    #[test]
    fn ray_box_intersection() {
        let aabb = AxisAlignedBoundingBox::from_min_max(Vector3::repeat(-1.0), Vector3::repeat(1.0));

        let ray = Ray::new(Vector3::new(-3.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        let (t0, t1) = ray.box_intersection(&aabb).unwrap();
        assert_relative_eq!(t0, 2.0);
        assert_relative_eq!(t1, 4.0);

        let inside = Ray::new(Vector3::zeros(), Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(inside.box_intersection(&aabb), Some((0.0, 1.0)));

        let behind = Ray::new(Vector3::new(3.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(behind.box_intersection(&aabb), None);

        let miss = Ray::new(Vector3::new(-3.0, 2.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(miss.box_intersection(&aabb), None);
    }
}
