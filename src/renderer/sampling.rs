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

use nalgebra::Vector3;
use rand::{Rng, RngCore};

/// Random direction in the hemisphere around `normal`.
///
/// Two uniform variates pick a point on the unit disk spanned by the tangent frame (the second
/// one is limited by the circle at the first one), both are scaled by `importance`, and the
/// point is lifted onto the hemisphere. Importance below 1.0 concentrates directions around the
/// normal, above 1.0 pushes them towards the horizon.
pub fn hemisphere_direction(
    normal: &Vector3<f32>,
    tangent_hint: &Vector3<f32>,
    importance: f32,
    rng: &mut dyn RngCore,
) -> Vector3<f32> {
    let (tangent, bitangent) = tangent_frame(normal, tangent_hint);

    let xr: f32 = rng.gen_range(-1.0..=1.0);
    let z_limit = (1.0 - xr * xr).max(0.0).sqrt();
    let zr: f32 = if z_limit > 0.0 {
        rng.gen_range(-z_limit..=z_limit)
    } else {
        0.0
    };

    let xr = xr * importance;
    let zr = zr * importance;
    let yr = (1.0 - xr * xr - zr * zr).max(0.0).sqrt();

    (tangent.scale(xr) + normal.scale(yr) + bitangent.scale(zr))
        .try_normalize(f32::EPSILON)
        .unwrap_or(*normal)
}

/// Orthonormal tangent and bitangent for the normal. The tangent follows the hint when the hint
/// is not parallel to the normal.
pub fn tangent_frame(
    normal: &Vector3<f32>,
    tangent_hint: &Vector3<f32>,
) -> (Vector3<f32>, Vector3<f32>) {
    let project = |v: &Vector3<f32>| (v - normal.scale(normal.dot(v))).try_normalize(1.0e-6);
    let tangent = project(tangent_hint)
        .or_else(|| project(&Vector3::x()))
        .or_else(|| project(&Vector3::y()))
        .unwrap_or_else(Vector3::z);
    let bitangent = tangent.cross(normal);
    (tangent, bitangent)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn directions_stay_in_hemisphere() {
        let mut rng = StdRng::seed_from_u64(11);
        let normal = Vector3::new(0.3, 0.8, -0.2).normalize();
        let hint = Vector3::new(1.0, 0.0, 0.0);
        for _ in 0..1000 {
            let dir = hemisphere_direction(&normal, &hint, 1.0, &mut rng);
            assert_relative_eq!(dir.norm(), 1.0, epsilon = 1.0e-5);
            assert!(dir.dot(&normal) >= -1.0e-5);
        }
    }

    #[test]
    fn low_importance_focuses_around_normal() {
        let mut rng = StdRng::seed_from_u64(5);
        let normal = Vector3::y();
        for _ in 0..1000 {
            let dir = hemisphere_direction(&normal, &Vector3::x(), 0.1, &mut rng);
            assert!(dir.dot(&normal) > 0.99);
        }
    }

    #[test]
    fn frame_is_orthonormal_even_for_parallel_hint() {
        let normal = Vector3::x();
        let (t, b) = tangent_frame(&normal, &Vector3::x());
        assert_relative_eq!(t.norm(), 1.0, epsilon = 1.0e-6);
        assert_relative_eq!(b.norm(), 1.0, epsilon = 1.0e-6);
        assert_relative_eq!(t.dot(&normal), 0.0, epsilon = 1.0e-6);
        assert_relative_eq!(b.dot(&normal), 0.0, epsilon = 1.0e-6);
        assert_relative_eq!(t.dot(&b), 0.0, epsilon = 1.0e-6);
    }
}
