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

//! Packed layout. Every flattened face becomes a rectangle, rectangles are packed into a growing
//! bin, then the bin is scaled down to the unit square. Inside of its rectangle a face is shrunk
//! by a fixed amount of texels, which leaves a gutter between neighbouring faces at any
//! lightmap resolution.

use super::{clamp_uv, flatten_faces, AtlasRect, TexelRect, UvLayout, UvLayoutStrategy};
use crate::{error::BakeError, scene::Mesh};
use lightbake_math::{
    min_max_2d,
    rectpack::{growth_budget, GrowingPacker},
    Rect,
};
use nalgebra::Vector2;

pub struct PackedLayout {
    /// Gutter size in texels.
    pub seam_offset: f32,
}

/// Fraction of a patch that is left for the face after cutting `seam` texels off.
#[inline]
fn shrink_factor(patch_texels: f32, seam: f32) -> f32 {
    if patch_texels > seam {
        (patch_texels - seam) / patch_texels
    } else {
        0.0
    }
}

impl UvLayoutStrategy for PackedLayout {
    fn layout(&self, mesh: &Mesh, width: u32, height: u32) -> Result<UvLayout, BakeError> {
        let faces = flatten_faces(mesh);

        // Stable sort: faces of equal height keep their original order.
        let mut order = (0..faces.len()).collect::<Vec<_>>();
        order.sort_by(|a, b| faces[*b].size.y.total_cmp(&faces[*a].size.y));

        let total_area = faces.iter().map(|f| f.size.x * f.size.y).sum::<f32>();
        let max_side = faces.iter().map(|f| f.size.max()).fold(0.0f32, f32::max);
        let mut packer = GrowingPacker::new(growth_budget(total_area, max_side));

        let mut placed = vec![Rect::new(0.0, 0.0, 0.0, 0.0); faces.len()];
        for i in order {
            placed[i] = packer
                .pack(faces[i].size.x, faces[i].size.y)
                .map_err(|reason| BakeError::PackingFailed {
                    mesh: mesh.id,
                    reason,
                })?;
        }

        let occupied = placed.iter().fold(Vector2::<f32>::zeros(), |acc, r| {
            Vector2::new(acc.x.max(r.right()), acc.y.max(r.bottom()))
        });
        let longest = occupied.max();
        let scale = if longest > f32::EPSILON {
            1.0 / longest
        } else {
            0.0
        };

        let texels = Vector2::new(width as f32, height as f32);
        let mut uvs = Vec::with_capacity(faces.len());
        let mut atlas = Vec::with_capacity(faces.len());
        for (face, rect) in faces.iter().zip(placed.iter()) {
            let origin = rect.position.scale(scale);
            let size = rect.size.scale(scale);
            let shrink = Vector2::new(
                shrink_factor(size.x * texels.x, self.seam_offset),
                shrink_factor(size.y * texels.y, self.seam_offset),
            );
            // Shrinking around the patch center keeps half of the gutter on each side.
            let translate = size.component_mul(&(Vector2::repeat(1.0) - shrink)).scale(0.5);
            uvs.push(
                face.points
                    .map(|p| clamp_uv(origin + translate + p.scale(scale).component_mul(&shrink))),
            );
            atlas.push(AtlasRect {
                origin,
                w: size.x,
                h: size.y,
            });
        }

        Ok(UvLayout {
            uvs,
            atlas: Some(atlas),
        })
    }

    fn footprint(&self, layout: &UvLayout, face: usize, width: u32, height: u32) -> TexelRect {
        let texels = Vector2::new(width as f32, height as f32);
        match layout.atlas.as_ref().and_then(|atlas| atlas.get(face)) {
            Some(rect) => {
                let min = rect.origin.component_mul(&texels);
                let max = (rect.origin + Vector2::new(rect.w, rect.h)).component_mul(&texels);
                TexelRect::covering(min, max, width, height)
            }
            None => {
                let (min, max) = min_max_2d(&layout.face_texel_coords(face, width, height));
                TexelRect::covering(min, max, width, height)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::uvgen::test::{cube, irregular};
    use nalgebra::Vector3;

    fn rect_in_texels(rect: &AtlasRect, size: f32) -> Rect<f32> {
        Rect::new(
            rect.origin.x * size,
            rect.origin.y * size,
            rect.w * size,
            rect.h * size,
        )
    }

    #[test]
    fn atlas_rects_do_not_overlap() {
        let strategy = PackedLayout { seam_offset: 2.0 };
        let layout = strategy.layout(&irregular(), 256, 256).unwrap();
        let atlas = layout.atlas.unwrap();
        let mut total_area = 0.0;
        for (i, a) in atlas.iter().enumerate() {
            assert!(a.origin.x + a.w <= 1.0 + 1.0e-5);
            assert!(a.origin.y + a.h <= 1.0 + 1.0e-5);
            total_area += a.w * a.h;
            for b in atlas.iter().skip(i + 1) {
                let overlap = rect_in_texels(a, 256.0).intersection(&rect_in_texels(b, 256.0));
                if let Some(overlap) = overlap {
                    assert!(overlap.w().min(overlap.h()) <= 2.0);
                }
            }
        }
        assert!(total_area <= 1.0 + 1.0e-5);
    }

    #[test]
    fn faces_are_separated_by_gutter() {
        let seam = 2.0;
        let size = 256.0;
        let strategy = PackedLayout { seam_offset: seam };
        let layout = strategy.layout(&cube(), 256, 256).unwrap();
        let bounds = layout
            .uvs
            .iter()
            .map(|uvs| {
                let (min, max) = min_max_2d(&uvs.map(|uv| uv * size));
                // Inflate by a bit less than half of the gutter.
                let h = seam * 0.5 - 0.01;
                Rect::new(min.x - h, min.y - h, max.x - min.x + 2.0 * h, max.y - min.y + 2.0 * h)
            })
            .collect::<Vec<_>>();
        for (i, a) in bounds.iter().enumerate() {
            for b in bounds.iter().skip(i + 1) {
                assert_eq!(a.intersection(b), None);
            }
        }
    }

    #[test]
    fn longer_side_fills_atlas() {
        let layout = PackedLayout { seam_offset: 2.0 }
            .layout(&irregular(), 64, 64)
            .unwrap();
        let atlas = layout.atlas.unwrap();
        let right = atlas.iter().map(|r| r.origin.x + r.w).fold(0.0f32, f32::max);
        let bottom = atlas.iter().map(|r| r.origin.y + r.h).fold(0.0f32, f32::max);
        assert!((right.max(bottom) - 1.0).abs() < 1.0e-5);
    }

    #[test]
    fn equal_heights_pack_deterministically() {
        let mut vertices = Vec::new();
        let mut triangles = Vec::new();
        for i in 0..50u32 {
            let o = Vector3::new(i as f32 * 3.0, 0.0, 0.0);
            vertices.extend([o, o + Vector3::x(), o + Vector3::y()]);
            triangles.push([3 * i, 3 * i + 1, 3 * i + 2]);
        }
        let mesh = Mesh::from_triangles("strip", vertices, &triangles);
        let strategy = PackedLayout { seam_offset: 1.0 };
        let first = strategy.layout(&mesh, 128, 128).unwrap();
        let second = strategy.layout(&mesh, 128, 128).unwrap();
        assert_eq!(first, second);
        // The first face of the tie goes first.
        assert_eq!(first.atlas.unwrap()[0].origin, Vector2::zeros());
    }

    #[test]
    fn footprint_covers_atlas_rect() {
        let strategy = PackedLayout { seam_offset: 2.0 };
        let layout = strategy.layout(&cube(), 64, 64).unwrap();
        for face in 0..layout.uvs.len() {
            let rect = strategy.footprint(&layout, face, 64, 64);
            for uv in layout.face_texel_coords(face, 64, 64) {
                assert!(uv.x >= rect.min.x as f32 && uv.x <= rect.max.x as f32);
                assert!(uv.y >= rect.min.y as f32 && uv.y <= rect.max.y as f32);
            }
        }
    }
}
