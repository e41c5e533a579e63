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

//! Grid layout. Every face is flattened and scaled by the same factor, which is chosen so the
//! biggest face (plus smoothing margin) fills exactly one cell of a `ceil(sqrt(n))` square grid.

use super::{clamp_uv, flatten_faces, TexelRect, UvLayout, UvLayoutStrategy};
use crate::{error::BakeError, scene::Mesh};
use lightbake_math::min_max_2d;
use nalgebra::Vector2;

pub struct UniformLayout {
    /// Center faces inside of their cells.
    pub centered: bool,
    /// Extra space around every face relative to the biggest face.
    pub smoothing: f32,
}

fn grid_size(face_count: usize) -> usize {
    ((face_count as f64).sqrt().ceil() as usize).max(1)
}

impl UvLayoutStrategy for UniformLayout {
    fn layout(&self, mesh: &Mesh, _width: u32, _height: u32) -> Result<UvLayout, BakeError> {
        let faces = flatten_faces(mesh);
        let grid = grid_size(faces.len());
        let cell = 1.0 / grid as f32;

        let largest = faces
            .iter()
            .map(|f| f.size.x.max(f.size.y))
            .fold(0.0f32, f32::max);
        let bounding = largest * (1.0 + self.smoothing);
        let scale = if bounding > f32::EPSILON {
            cell / bounding
        } else {
            0.0
        };

        let uvs = faces
            .iter()
            .enumerate()
            .map(|(i, face)| {
                let cell_origin = Vector2::new((i % grid) as f32, (i / grid) as f32).scale(cell);
                let margin = if self.centered {
                    (Vector2::repeat(cell) - face.size.scale(scale)).scale(0.5)
                } else {
                    Vector2::zeros()
                };
                face.points.map(|p| clamp_uv(cell_origin + margin + p.scale(scale)))
            })
            .collect();

        Ok(UvLayout { uvs, atlas: None })
    }

    fn footprint(&self, layout: &UvLayout, face: usize, width: u32, height: u32) -> TexelRect {
        if self.centered {
            let grid = grid_size(layout.uvs.len());
            let cell = Vector2::new(width as f32, height as f32).scale(1.0 / grid as f32);
            let origin =
                Vector2::new((face % grid) as f32, (face / grid) as f32).component_mul(&cell);
            TexelRect::covering(origin, origin + cell, width, height)
        } else {
            let points = layout.face_texel_coords(face, width, height);
            let (min, max) = min_max_2d(&points);
            // Smoothing tolerance lets texels slightly outside of the face be accepted.
            let margin = Vector2::repeat(self.smoothing * (max - min).max() + 1.0);
            TexelRect::covering(min - margin, max + margin, width, height)
        }
    }
}
