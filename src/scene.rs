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

//! Read-only scene snapshot consumed by the baker.

use crate::{error::BakeError, light::Light};
use nalgebra::{Matrix4, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::{fs::File, path::Path};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub indices: [u32; 3],
    /// Normal in mesh space.
    pub normal: Vector3<f32>,
    /// Per-vertex normals in mesh space, required for smooth shading.
    #[serde(default)]
    pub vertex_normals: Option<[Vector3<f32>; 3]>,
    /// Texture coordinates of the albedo texture.
    #[serde(default)]
    pub tex_coords: Option<[Vector2<f32>; 3]>,
}

/// Decoded RGBA8 image.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Texture {
    /// A texture whose pixel data does not match its size was not decoded.
    pub fn is_decoded(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() == self.width as usize * self.height as usize * 4
    }

    /// Nearest-neighbour fetch with repeat wrapping. Returns linear color in `[0; 1]`.
    pub fn sample(&self, uv: Vector2<f32>) -> Vector3<f32> {
        let x = ((uv.x.rem_euclid(1.0) * self.width as f32) as u32).min(self.width - 1);
        let y = ((uv.y.rem_euclid(1.0) * self.height as f32) as u32).min(self.height - 1);
        let i = ((y * self.width + x) * 4) as usize;
        Vector3::new(
            self.pixels[i] as f32 / 255.0,
            self.pixels[i + 1] as f32 / 255.0,
            self.pixels[i + 2] as f32 / 255.0,
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub color: Vector3<f32>,
    pub texture: Option<Texture>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Vector3::repeat(1.0),
            texture: None,
        }
    }
}

impl Material {
    /// Surface color at the given texture coordinates. Textured materials that failed to decode
    /// are white.
    pub fn albedo(&self, tex_coord: Option<Vector2<f32>>) -> Vector3<f32> {
        match &self.texture {
            None => self.color,
            Some(texture) => match tex_coord {
                Some(uv) if texture.is_decoded() => texture.sample(uv),
                _ => Vector3::repeat(1.0),
            },
        }
    }
}

/// Per-mesh bake settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshBakingInfo {
    pub bake_me: Option<bool>,
    pub intersect_me: Option<bool>,
    /// Lightmap size override.
    pub texture_width: Option<u32>,
    pub texture_height: Option<u32>,
    /// Range of faces to fill. Whole mesh when not set.
    pub face_begin: Option<usize>,
    pub face_end: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    pub vertices: Vec<Vector3<f32>>,
    pub faces: Vec<Face>,
    pub transform: Matrix4<f32>,
    #[serde(default)]
    pub material: Material,
    #[serde(default)]
    pub baking: MeshBakingInfo,
}

impl Mesh {
    /// Creates a mesh with identity transform and face normals computed from the winding order.
    pub fn from_triangles<S: Into<String>>(
        name: S,
        vertices: Vec<Vector3<f32>>,
        triangles: &[[u32; 3]],
    ) -> Self {
        let faces = triangles
            .iter()
            .map(|indices| {
                let [a, b, c] = indices.map(|i| {
                    vertices
                        .get(i as usize)
                        .copied()
                        .unwrap_or_else(Vector3::zeros)
                });
                Face {
                    indices: *indices,
                    normal: (b - a)
                        .cross(&(c - a))
                        .try_normalize(f32::EPSILON)
                        .unwrap_or_else(Vector3::zeros),
                    vertex_normals: None,
                    tex_coords: None,
                }
            })
            .collect();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            vertices,
            faces,
            transform: Matrix4::identity(),
            material: Default::default(),
            baking: Default::default(),
        }
    }

    pub fn with_transform(mut self, transform: Matrix4<f32>) -> Self {
        self.transform = transform;
        self
    }

    /// Vertices of a face in mesh space. Caller must make sure indices are valid, see
    /// [`Self::validate_geometry`].
    pub fn face_vertices(&self, face: &Face) -> [Vector3<f32>; 3] {
        face.indices.map(|i| self.vertices[i as usize])
    }

    /// Checks that every index points to a vertex and every value is finite.
    pub fn validate_geometry(&self) -> Result<(), String> {
        if let Some(v) = self.vertices.iter().position(|v| !v.iter().all(|c| c.is_finite())) {
            return Err(format!("vertex {v} is not finite"));
        }
        for (n, face) in self.faces.iter().enumerate() {
            if let Some(i) = face
                .indices
                .iter()
                .find(|i| **i as usize >= self.vertices.len())
            {
                return Err(format!("face {n} references missing vertex {i}"));
            }
        }
        if !self.transform.iter().all(|c| c.is_finite()) {
            return Err("transform is not finite".to_string());
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSnapshot {
    pub meshes: Vec<Mesh>,
    pub lights: Vec<Light>,
}

impl SceneSnapshot {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BakeError> {
        let file = File::open(path)?;
        Ok(ron::de::from_reader(file)?)
    }

    pub fn mesh_index(&self, id: Uuid) -> Option<usize> {
        self.meshes.iter().position(|m| m.id == id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn face_normals_follow_winding() {
        let mesh = Mesh::from_triangles(
            "quad",
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
            ],
            &[[0, 1, 2], [0, 2, 1]],
        );
        assert_eq!(mesh.faces[0].normal, Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(mesh.faces[1].normal, Vector3::new(0.0, 0.0, -1.0));
        assert!(mesh.validate_geometry().is_ok());
    }

    #[test]
    fn broken_geometry_is_detected() {
        let mesh = Mesh::from_triangles("broken", vec![Vector3::zeros()], &[[0, 1, 2]]);
        assert!(mesh.validate_geometry().is_err());

        let mut mesh = Mesh::from_triangles(
            "nan",
            vec![Vector3::zeros(), Vector3::x(), Vector3::y()],
            &[[0, 1, 2]],
        );
        mesh.vertices[1].x = f32::NAN;
        assert!(mesh.validate_geometry().is_err());
    }

    #[test]
    fn albedo_falls_back_to_white() {
        let plain = Material {
            color: Vector3::new(0.5, 0.25, 1.0),
            texture: None,
        };
        assert_eq!(plain.albedo(None), Vector3::new(0.5, 0.25, 1.0));

        let undecoded = Material {
            color: Vector3::new(0.5, 0.25, 1.0),
            texture: Some(Texture {
                width: 4,
                height: 4,
                pixels: Vec::new(),
            }),
        };
        assert_eq!(undecoded.albedo(Some(Vector2::new(0.5, 0.5))), Vector3::repeat(1.0));

        let red = Material {
            color: Vector3::repeat(1.0),
            texture: Some(Texture {
                width: 1,
                height: 1,
                pixels: vec![255, 0, 0, 255],
            }),
        };
        assert_eq!(red.albedo(Some(Vector2::new(3.7, -0.2))), Vector3::new(1.0, 0.0, 0.0));
    }
}
