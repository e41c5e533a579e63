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

//! Visibility oracle: ray casting against world-space triangles of every mesh that takes part in
//! occlusion.

use crate::{config::RaycasterBackend, error::BakeError};
use lightbake_math::ray::Ray;
use nalgebra::Vector3;

pub mod linear;
#[cfg(feature = "octree")]
pub mod octree;

/// Single ray hit.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Intersection {
    /// Distance from the ray origin, in world units (ray directions are normalized).
    pub distance: f32,
    pub point: Vector3<f32>,
    /// Index of the mesh in the scene snapshot.
    pub mesh: usize,
    pub face_index: usize,
    /// Barycentric weights of the face vertices at the hit point.
    pub bary: (f32, f32, f32),
}

/// World-space triangle tagged with its origin.
#[derive(Copy, Clone, Debug)]
pub struct OracleTriangle {
    pub vertices: [Vector3<f32>; 3],
    pub mesh: usize,
    pub face_index: usize,
}

impl OracleTriangle {
    /// Exact test, hits closer than `precision` are ignored.
    #[inline]
    pub fn intersect(&self, ray: &Ray, precision: f32) -> Option<Intersection> {
        let hit = ray.triangle_intersection(&self.vertices)?;
        if hit.t <= precision {
            return None;
        }
        Some(Intersection {
            distance: hit.t,
            point: ray.get_point(hit.t),
            mesh: self.mesh,
            face_index: self.face_index,
            bary: hit.bary,
        })
    }
}

pub trait VisibilityOracle: Send + Sync {
    /// Adds triangles of a mesh, `triangles[i]` is face `i` in world space.
    fn add_mesh(&mut self, mesh: usize, triangles: &[[Vector3<f32>; 3]]);

    /// Must be called once after the last [`Self::add_mesh`] and before the first query.
    fn finalize(&mut self);

    /// Collects all hits of the ray sorted by ascending distance. `ray.dir` must be normalized.
    fn intersect(&self, ray: &Ray, hits: &mut Vec<Intersection>);

    /// Whether anything blocks the ray before `max_distance`.
    fn is_occluded(&self, ray: &Ray, max_distance: f32) -> bool {
        let mut hits = Vec::new();
        self.intersect(ray, &mut hits);
        hits.first().is_some_and(|hit| hit.distance < max_distance)
    }
}

/// Hit with the smallest distance.
pub fn closest_intersection(hits: &[Intersection]) -> Option<&Intersection> {
    hits.iter().min_by(|a, b| a.distance.total_cmp(&b.distance))
}

pub(crate) fn sort_hits(hits: &mut [Intersection]) {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
}

pub fn make_oracle(
    backend: RaycasterBackend,
    precision: f32,
) -> Result<Box<dyn VisibilityOracle>, BakeError> {
    match backend {
        RaycasterBackend::Linear => Ok(Box::new(linear::LinearOracle::new(precision))),
        #[cfg(feature = "octree")]
        RaycasterBackend::Octree => Ok(Box::new(octree::OctreeOracle::new(precision))),
        #[cfg(not(feature = "octree"))]
        RaycasterBackend::Octree => Err(BakeError::BackendUnavailable("octree")),
    }
}
