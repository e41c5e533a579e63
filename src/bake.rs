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

//! Setup phase of a bake: mesh filtering, world-space geometry, visibility oracle and UV atlases.

use crate::{
    config::BakeConfig,
    error::BakeError,
    info,
    oracle::{make_oracle, Intersection, VisibilityOracle},
    scene::{Mesh, SceneSnapshot},
    uvgen::{make_strategy, UvLayout, UvLayoutStrategy},
    warn_once,
};
use lightbake_math::barycentric_to_2d;
use nalgebra::{Matrix3, Point3, Vector3};
use rayon::prelude::*;
use std::{ops::Range, sync::Arc};
use uuid::Uuid;

/// One-shot log slot of a mesh. The whole id takes part in the key.
fn warning_source(id: &Uuid) -> usize {
    fxhash::hash(id)
}

/// Mesh data in the form the renderer needs it.
#[derive(Clone, Debug)]
pub struct PreparedMesh {
    pub id: Uuid,
    /// Part of the bake job set.
    pub bake: bool,
    /// Takes part in occlusion.
    pub intersect: bool,
    pub width: u32,
    pub height: u32,
    pub face_range: Range<usize>,
    pub world_triangles: Vec<[Vector3<f32>; 3]>,
    pub world_normals: Vec<Vector3<f32>>,
    pub world_vertex_normals: Vec<Option<[Vector3<f32>; 3]>>,
}

impl PreparedMesh {
    fn new(mesh: &Mesh, config: &BakeConfig) -> Self {
        let mut bake = config.mesh_filter.includes(mesh.baking.bake_me);
        let mut intersect = config.raycast_filter.includes(mesh.baking.intersect_me);

        // Executors prepare the same scene again, one warning per mesh is enough.
        let source = warning_source(&mesh.id);
        let geometry = mesh.validate_geometry();
        if let Err(reason) = geometry.as_ref() {
            warn_once!(
                source,
                "Mesh {} ({}) has unreadable geometry and is excluded from the bake: {reason}",
                mesh.name,
                mesh.id
            );
            bake = false;
            intersect = false;
        } else if mesh.faces.is_empty() {
            if bake {
                warn_once!(
                    source,
                    "Mesh {} ({}) has no faces and won't be baked.",
                    mesh.name,
                    mesh.id
                );
            }
            bake = false;
        } else if mesh.material.texture.as_ref().is_some_and(|t| !t.is_decoded()) {
            warn_once!(
                source,
                "Texture of mesh {} ({}) is not decoded, white albedo is used.",
                mesh.name,
                mesh.id
            );
        }

        let face_count = mesh.faces.len();
        let begin = mesh.baking.face_begin.unwrap_or(0).min(face_count);
        let end = mesh
            .baking
            .face_end
            .unwrap_or(face_count)
            .clamp(begin, face_count);

        let pick = |value: Option<u32>, default: u32| value.filter(|v| *v > 0).unwrap_or(default);

        let normal_matrix = mesh
            .transform
            .fixed_view::<3, 3>(0, 0)
            .into_owned()
            .try_inverse()
            .map(|m| m.transpose())
            .unwrap_or_else(Matrix3::identity);

        let (world_triangles, world_normals, world_vertex_normals) = if geometry.is_ok() {
            let to_world =
                |v: &Vector3<f32>| mesh.transform.transform_point(&Point3::from(*v)).coords;
            let to_world_normal = |n: &Vector3<f32>| {
                (normal_matrix * n)
                    .try_normalize(f32::EPSILON)
                    .unwrap_or_else(Vector3::zeros)
            };
            let triangles = mesh
                .faces
                .iter()
                .map(|f| mesh.face_vertices(f).map(|v| to_world(&v)))
                .collect::<Vec<_>>();
            let normals = mesh
                .faces
                .iter()
                .zip(triangles.iter())
                .map(|(f, [a, b, c])| {
                    let n = to_world_normal(&f.normal);
                    if n == Vector3::zeros() {
                        (b - a)
                            .cross(&(c - a))
                            .try_normalize(f32::EPSILON)
                            .unwrap_or_else(Vector3::zeros)
                    } else {
                        n
                    }
                })
                .collect();
            let vertex_normals = mesh
                .faces
                .iter()
                .map(|f| f.vertex_normals.map(|normals| normals.map(|n| to_world_normal(&n))))
                .collect();
            (triangles, normals, vertex_normals)
        } else {
            Default::default()
        };

        Self {
            id: mesh.id,
            bake,
            intersect,
            width: pick(mesh.baking.texture_width, config.texture_width),
            height: pick(mesh.baking.texture_height, config.texture_height),
            face_range: begin..end,
            world_triangles,
            world_normals,
            world_vertex_normals,
        }
    }
}

/// Everything a renderer needs, built once per bake (and once per parallel executor).
pub struct BakeContext {
    pub scene: Arc<SceneSnapshot>,
    pub config: Arc<BakeConfig>,
    /// Same order as `scene.meshes`.
    pub meshes: Vec<PreparedMesh>,
    pub oracle: Box<dyn VisibilityOracle>,
    pub strategy: Box<dyn UvLayoutStrategy>,
    /// Lightmap UVs, present for meshes of the bake set.
    pub layouts: Vec<Option<UvLayout>>,
}

impl BakeContext {
    pub fn new(scene: Arc<SceneSnapshot>, config: Arc<BakeConfig>) -> Result<Self, BakeError> {
        config.validate()?;

        let meshes = scene
            .meshes
            .iter()
            .map(|m| PreparedMesh::new(m, &config))
            .collect::<Vec<_>>();

        let mut oracle = make_oracle(config.raycaster, config.raycaster_precision)?;
        for (i, mesh) in meshes.iter().enumerate().filter(|(_, m)| m.intersect) {
            oracle.add_mesh(i, &mesh.world_triangles);
        }
        oracle.finalize();

        let strategy = make_strategy(&config)?;
        let layouts = meshes
            .par_iter()
            .zip(scene.meshes.par_iter())
            .map(|(prepared, mesh)| {
                if prepared.bake {
                    strategy
                        .layout(mesh, prepared.width, prepared.height)
                        .map(Some)
                } else {
                    Ok(None)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            "Bake setup done: {} meshes to bake, {} occluders, uv method {}, raycaster {}.",
            meshes.iter().filter(|m| m.bake).count(),
            meshes.iter().filter(|m| m.intersect).count(),
            config.uv_method.as_ref(),
            config.raycaster.as_ref(),
        );

        Ok(Self {
            scene,
            config,
            meshes,
            oracle,
            strategy,
            layouts,
        })
    }

    /// Indices of meshes that are going to be baked, in scene order.
    pub fn bake_set(&self) -> Vec<usize> {
        self.meshes
            .iter()
            .enumerate()
            .filter(|(_, m)| m.bake)
            .map(|(i, _)| i)
            .collect()
    }

    /// Surface color at a ray hit.
    pub fn albedo_at(&self, hit: &Intersection) -> Vector3<f32> {
        let mesh = &self.scene.meshes[hit.mesh];
        let tex_coord = mesh.faces[hit.face_index]
            .tex_coords
            .map(|[a, b, c]| barycentric_to_2d(hit.bary, &a, &b, &c));
        mesh.material.albedo(tex_coord)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::{config::InclusionFilter, light::Light, scene::MeshBakingInfo};
    use nalgebra::Matrix4;

    /// Unit quad in XZ plane facing +Y, centered at the origin.
    pub fn quad(name: &str, y: f32) -> Mesh {
        Mesh::from_triangles(
            name,
            vec![
                Vector3::new(-0.5, y, -0.5),
                Vector3::new(0.5, y, -0.5),
                Vector3::new(0.5, y, 0.5),
                Vector3::new(-0.5, y, 0.5),
            ],
            &[[0, 2, 1], [0, 3, 2]],
        )
    }

    /// Same quad as [`quad`], but facing -Y.
    pub fn ceiling(name: &str, y: f32) -> Mesh {
        let mut mesh = quad(name, y);
        mesh.faces.iter_mut().for_each(|f| {
            f.indices.swap(1, 2);
            f.normal = -f.normal;
        });
        mesh
    }

    pub fn lit_quad_scene() -> SceneSnapshot {
        SceneSnapshot {
            meshes: vec![quad("floor", 0.0)],
            lights: vec![Light::point(Vector3::new(0.0, 5.0, 0.0), Vector3::repeat(1.0))],
        }
    }

    #[test]
    fn quad_faces_up() {
        let mesh = quad("q", 0.0);
        for face in mesh.faces.iter() {
            assert_eq!(face.normal, Vector3::new(0.0, 1.0, 0.0));
        }
    }

    #[test]
    fn excluded_meshes_are_not_in_bake_set() {
        let mut scene = lit_quad_scene();
        let mut hidden = quad("hidden", 1.0);
        hidden.baking = MeshBakingInfo {
            bake_me: Some(false),
            intersect_me: Some(true),
            ..Default::default()
        };
        scene.meshes.push(hidden);
        scene.meshes[0].baking.bake_me = Some(true);
        scene
            .meshes
            .push(Mesh::from_triangles("empty", Vec::new(), &[]));

        let config = BakeConfig {
            mesh_filter: InclusionFilter::OnlyFlagged,
            ..Default::default()
        };
        let ctx = BakeContext::new(Arc::new(scene), Arc::new(config)).unwrap();
        assert_eq!(ctx.bake_set(), vec![0]);
        assert!(ctx.meshes[1].intersect);
        assert!(ctx.layouts[1].is_none());
        assert!(ctx.layouts[2].is_none());
    }

    #[test]
    fn world_space_geometry() {
        let mesh = quad("moved", 0.0).with_transform(Matrix4::new_translation(&Vector3::new(
            0.0, 2.0, 0.0,
        )));
        let prepared = PreparedMesh::new(&mesh, &BakeConfig::default());
        assert!(prepared.world_triangles.iter().flatten().all(|v| v.y == 2.0));
        assert_eq!(prepared.world_normals[0], Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(prepared.face_range, 0..2);
        assert_eq!((prepared.width, prepared.height), (512, 512));
    }

    #[test]
    fn warning_sources_use_whole_mesh_id() {
        let low = 0x0123_4567_89ab_cdefu128;
        let a = Uuid::from_u128((1u128 << 64) | low);
        let b = Uuid::from_u128((2u128 << 64) | low);
        assert_ne!(warning_source(&a), warning_source(&b));
        assert_eq!(warning_source(&a), warning_source(&Uuid::from_u128((1u128 << 64) | low)));
    }

    #[test]
    fn face_range_is_clamped() {
        let mut mesh = quad("ranged", 0.0);
        mesh.baking.face_begin = Some(1);
        mesh.baking.face_end = Some(10);
        mesh.baking.texture_width = Some(32);
        let prepared = PreparedMesh::new(&mesh, &BakeConfig::default());
        assert_eq!(prepared.face_range, 1..2);
        assert_eq!(prepared.width, 32);
    }
}
