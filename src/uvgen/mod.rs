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

//! Lightmap UV generation.
//!
//! Every face gets its own patch in the `[0; 1]` atlas, patches are never shared between faces.
//! Three strategies are available: faces placed on a uniform grid (with or without centering
//! inside of grid cells) and faces packed tightly by a growing bin packer.

use crate::{
    config::{BakeConfig, UvMethod},
    error::BakeError,
    scene::Mesh,
};
use lightbake_math::{flatten_triangle, min_max_2d};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "packing")]
pub mod packed;
pub mod uniform;

/// Patch of a single face in normalized atlas space. Produced only by the packed strategy.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AtlasRect {
    pub origin: Vector2<f32>,
    pub w: f32,
    pub h: f32,
}

/// Lightmap UVs of a mesh.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UvLayout {
    /// One UV triple per face, in face order.
    pub uvs: Vec<[Vector2<f32>; 3]>,
    pub atlas: Option<Vec<AtlasRect>>,
}

impl UvLayout {
    /// UVs of a face converted into texel space of a `width` x `height` map.
    pub fn face_texel_coords(&self, face: usize, width: u32, height: u32) -> [Vector2<f32>; 3] {
        self.uvs[face].map(|uv| Vector2::new(uv.x * width as f32, uv.y * height as f32))
    }
}

/// Rectangle of texels, `max` is exclusive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TexelRect {
    pub min: Vector2<i64>,
    pub max: Vector2<i64>,
}

impl TexelRect {
    /// Smallest rectangle covering given texel-space area, clipped by the map bounds.
    pub fn covering(min: Vector2<f32>, max: Vector2<f32>, width: u32, height: u32) -> Self {
        Self {
            min: Vector2::new(
                (min.x.floor() as i64).clamp(0, width as i64),
                (min.y.floor() as i64).clamp(0, height as i64),
            ),
            max: Vector2::new(
                (max.x.ceil() as i64).clamp(0, width as i64),
                (max.y.ceil() as i64).clamp(0, height as i64),
            ),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.max.x <= self.min.x || self.max.y <= self.min.y
    }
}

pub trait UvLayoutStrategy: Send + Sync {
    /// Builds UVs for every face of the mesh for a lightmap of the given size.
    fn layout(&self, mesh: &Mesh, width: u32, height: u32) -> Result<UvLayout, BakeError>;

    /// Texels that the renderer has to visit to fill the face.
    fn footprint(&self, layout: &UvLayout, face: usize, width: u32, height: u32) -> TexelRect;
}

/// Creates the strategy selected by the configuration.
pub fn make_strategy(config: &BakeConfig) -> Result<Box<dyn UvLayoutStrategy>, BakeError> {
    match config.uv_method {
        UvMethod::UniformUncentered => Ok(Box::new(uniform::UniformLayout {
            centered: false,
            smoothing: config.uv_smoothing,
        })),
        UvMethod::UniformCentered => Ok(Box::new(uniform::UniformLayout {
            centered: true,
            smoothing: config.uv_smoothing,
        })),
        #[cfg(feature = "packing")]
        UvMethod::Packed => Ok(Box::new(packed::PackedLayout {
            seam_offset: config.packing_offset,
        })),
        #[cfg(not(feature = "packing"))]
        UvMethod::Packed => Err(BakeError::BackendUnavailable("packing")),
    }
}

/// Plane normal of a face. Falls back to the winding normal when the stored one is unusable.
pub(crate) fn face_plane_normal(mesh: &Mesh, face: usize) -> Vector3<f32> {
    let face = &mesh.faces[face];
    face.normal.try_normalize(f32::EPSILON).unwrap_or_else(|| {
        let [a, b, c] = mesh.face_vertices(face);
        (b - a)
            .cross(&(c - a))
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::z)
    })
}

/// Face flattened into 2D and moved so its bounding box starts at the origin.
pub(crate) struct FlatFace {
    pub points: [Vector2<f32>; 3],
    pub size: Vector2<f32>,
}

pub(crate) fn flatten_faces(mesh: &Mesh) -> Vec<FlatFace> {
    (0..mesh.faces.len())
        .map(|i| {
            let triangle = mesh.face_vertices(&mesh.faces[i]);
            let points = flatten_triangle(&triangle, &face_plane_normal(mesh, i));
            let (min, max) = min_max_2d(&points);
            FlatFace {
                points: points.map(|p| p - min),
                size: max - min,
            }
        })
        .collect()
}

#[inline]
pub(crate) fn clamp_uv(uv: Vector2<f32>) -> Vector2<f32> {
    Vector2::new(uv.x.clamp(0.0, 1.0), uv.y.clamp(0.0, 1.0))
}
