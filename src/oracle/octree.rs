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

use super::{sort_hits, Intersection, OracleTriangle, VisibilityOracle};
use lightbake_math::{octree::Octree, ray::Ray};
use nalgebra::Vector3;

/// Spatial index backend. Triangles of all meshes go into a single octree that is rebuilt by
/// [`VisibilityOracle::finalize`].
pub struct OctreeOracle {
    triangles: Vec<OracleTriangle>,
    octree: Option<Octree>,
    precision: f32,
}

impl OctreeOracle {
    /// Leaves hold at most one triangle, unless triangles cannot be separated.
    pub const SPLIT_THRESHOLD: usize = 1;

    pub fn new(precision: f32) -> Self {
        Self {
            triangles: Default::default(),
            octree: None,
            precision,
        }
    }
}

impl VisibilityOracle for OctreeOracle {
    fn add_mesh(&mut self, mesh: usize, triangles: &[[Vector3<f32>; 3]]) {
        self.triangles
            .extend(triangles.iter().enumerate().map(|(face_index, vertices)| {
                OracleTriangle {
                    vertices: *vertices,
                    mesh,
                    face_index,
                }
            }));
        self.octree = None;
    }

    fn finalize(&mut self) {
        let vertices = self
            .triangles
            .iter()
            .map(|t| t.vertices)
            .collect::<Vec<_>>();
        self.octree = Some(Octree::new(&vertices, Self::SPLIT_THRESHOLD));
    }

    fn intersect(&self, ray: &Ray, hits: &mut Vec<Intersection>) {
        hits.clear();
        match self.octree.as_ref() {
            Some(octree) => {
                let mut candidates = Vec::new();
                octree.ray_query(ray, &mut candidates);
                candidates.sort_unstable();
                candidates.dedup();
                hits.extend(
                    candidates
                        .iter()
                        .filter_map(|i| self.triangles[*i as usize].intersect(ray, self.precision)),
                );
            }
            // Not finalized yet, answer correctly anyway.
            None => hits.extend(
                self.triangles
                    .iter()
                    .filter_map(|t| t.intersect(ray, self.precision)),
            ),
        }
        sort_hits(hits);
    }
}
