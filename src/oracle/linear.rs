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
use lightbake_math::{aabb::AxisAlignedBoundingBox, ray::Ray};
use nalgebra::Vector3;

struct MeshEntry {
    bounds: AxisAlignedBoundingBox,
    triangles: Vec<OracleTriangle>,
}

/// Brute-force backend: every triangle of every mesh whose bounds are crossed by the ray is
/// tested.
pub struct LinearOracle {
    meshes: Vec<MeshEntry>,
    precision: f32,
}

impl LinearOracle {
    pub fn new(precision: f32) -> Self {
        Self {
            meshes: Default::default(),
            precision,
        }
    }
}

impl VisibilityOracle for LinearOracle {
    fn add_mesh(&mut self, mesh: usize, triangles: &[[Vector3<f32>; 3]]) {
        let mut bounds = AxisAlignedBoundingBox::default();
        for triangle in triangles {
            for v in triangle {
                bounds.add_point(*v);
            }
        }
        self.meshes.push(MeshEntry {
            bounds,
            triangles: triangles
                .iter()
                .enumerate()
                .map(|(face_index, vertices)| OracleTriangle {
                    vertices: *vertices,
                    mesh,
                    face_index,
                })
                .collect(),
        });
    }

    fn finalize(&mut self) {}

    fn intersect(&self, ray: &Ray, hits: &mut Vec<Intersection>) {
        hits.clear();
        for entry in self.meshes.iter() {
            if !entry.bounds.is_valid() || ray.box_intersection(&entry.bounds).is_none() {
                continue;
            }
            hits.extend(
                entry
                    .triangles
                    .iter()
                    .filter_map(|t| t.intersect(ray, self.precision)),
            );
        }
        sort_hits(hits);
    }
}
