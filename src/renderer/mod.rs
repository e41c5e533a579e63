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

//! Per-texel renderer. Rasterizes faces of a mesh into its lightmap and computes a color for every
//! covered texel: direct light, two-pass gather or path tracing depending on configuration.

use crate::{
    bake::BakeContext,
    config::{BakingMethod, ShadingModel},
    lightmap::Lightmap,
    oracle::{Intersection, VisibilityOracle},
    uvgen::TexelRect,
};
use fxhash::FxHashMap;
use lightbake_math::{
    barycentric_is_inside_with_offset, barycentric_to_world, get_barycentric_coords_2d, ray::Ray,
};
use nalgebra::{Vector2, Vector3};
use rand::{rngs::StdRng, RngCore, SeedableRng};

pub mod direct;
pub mod gather;
pub mod pathtrace;
pub mod sampling;

/// Color of texels that are accepted only thanks to the smoothing tolerance, when UV debugging
/// is enabled.
pub const UV_DEBUG_COLOR: Vector3<f32> = Vector3::new(0.0, 1.0, 0.0);

/// Counters collected while rendering a mesh.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub texels: usize,
    pub rays: usize,
    /// Deepest recursion level reached by the path tracer.
    pub max_depth: u32,
}

pub struct RenderedMesh {
    pub lightmap: Lightmap,
    pub stats: RenderStats,
}

/// Point on a mesh surface with its shading frame, in world space.
#[derive(Copy, Clone, Debug)]
pub struct Surface {
    pub point: Vector3<f32>,
    /// Shading normal: flat or interpolated depending on the shading model.
    pub normal: Vector3<f32>,
    pub face_normal: Vector3<f32>,
    /// Direction in the face plane, used to orient hemisphere samples.
    pub tangent: Vector3<f32>,
    pub mesh: usize,
    pub face: usize,
}

impl Surface {
    pub fn on_face(ctx: &BakeContext, mesh: usize, face: usize, bary: (f32, f32, f32)) -> Self {
        let prepared = &ctx.meshes[mesh];
        let [a, b, c] = &prepared.world_triangles[face];
        let face_normal = prepared.world_normals[face];
        let normal = match (ctx.config.shading, prepared.world_vertex_normals[face]) {
            (ShadingModel::Phong, Some([na, nb, nc])) => barycentric_to_world(bary, &na, &nb, &nc)
                .try_normalize(f32::EPSILON)
                .unwrap_or(face_normal),
            _ => face_normal,
        };
        Self {
            point: barycentric_to_world(bary, a, b, c),
            normal,
            face_normal,
            tangent: b - a,
            mesh,
            face,
        }
    }

    /// Surface at a ray hit. Normals are flipped when the back side was hit, so they always face
    /// the ray origin.
    pub fn at_hit(ctx: &BakeContext, hit: &Intersection, ray_dir: &Vector3<f32>) -> Self {
        let mut surface = Self::on_face(ctx, hit.mesh, hit.face_index, hit.bary);
        surface.point = hit.point;
        if surface.face_normal.dot(ray_dir) > 0.0 {
            surface.face_normal = -surface.face_normal;
            surface.normal = -surface.normal;
        }
        surface
    }
}

/// Casts a ray and collects sorted hits, counting it in the stats.
pub(crate) fn cast(
    oracle: &dyn VisibilityOracle,
    ray: &Ray,
    hits: &mut Vec<Intersection>,
    stats: &mut RenderStats,
) {
    stats.rays += 1;
    oracle.intersect(ray, hits);
}

/// Visits texels of a face. `uvs` are face corners in texel space, a texel is accepted when
/// barycentric coordinates of its center are within `[-smoothing, 1 + smoothing]`. Every row is
/// expected to contain a single run of accepted texels, the scan of a row stops at the end of the
/// run.
pub fn rasterize_face<F>(uvs: &[Vector2<f32>; 3], rect: TexelRect, smoothing: f32, mut visit: F)
where
    F: FnMut(i64, i64, (f32, f32, f32)),
{
    for y in rect.min.y..rect.max.y {
        let mut in_run = false;
        for x in rect.min.x..rect.max.x {
            let center = Vector2::new(x as f32 + 0.5, y as f32 + 0.5);
            match get_barycentric_coords_2d(center, uvs[0], uvs[1], uvs[2]) {
                Some(bary) if barycentric_is_inside_with_offset(bary, smoothing) => {
                    in_run = true;
                    visit(x, y, bary);
                }
                _ if in_run => break,
                _ => (),
            }
        }
    }
}

/// Random generator of a single mesh pass. Seeded bakes are reproducible.
pub fn pass_rng(seed: Option<u64>, mesh: usize, pass: u32) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(
            seed ^ (mesh as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ ((pass as u64) << 48),
        ),
        None => StdRng::from_entropy(),
    }
}

pub struct Renderer<'a> {
    ctx: &'a BakeContext,
    /// Lightmaps of the previous pass, required by the second pass of the two-pass method.
    previous: Option<&'a FxHashMap<usize, Lightmap>>,
}

impl<'a> Renderer<'a> {
    pub fn new(ctx: &'a BakeContext, previous: Option<&'a FxHashMap<usize, Lightmap>>) -> Self {
        Self { ctx, previous }
    }

    /// Renders faces `face_range` of a mesh for the given pass (starting from 1) into a new
    /// lightmap. Meshes without UV layout produce an empty map.
    pub fn render_mesh(&self, mesh: usize, pass: u32) -> RenderedMesh {
        let ctx = self.ctx;
        let config = &ctx.config;
        let prepared = &ctx.meshes[mesh];
        let mut lightmap = Lightmap::new(prepared.width, prepared.height);
        let mut stats = RenderStats::default();

        let Some(layout) = ctx.layouts[mesh].as_ref() else {
            return RenderedMesh { lightmap, stats };
        };

        let mut rng = pass_rng(config.seed, mesh, pass);
        let (width, height) = (prepared.width, prepared.height);

        for face in prepared.face_range.clone() {
            let uvs = layout.face_texel_coords(face, width, height);
            let rect = ctx.strategy.footprint(layout, face, width, height);

            if config.shading == ShadingModel::FlatFast {
                let color = self.flat_face_color(mesh, face, &uvs, pass, &mut rng, &mut stats);
                rasterize_face(&uvs, rect, config.uv_smoothing, |x, y, _| {
                    stats.texels += 1;
                    lightmap.write(x, y, color);
                });
                continue;
            }

            rasterize_face(&uvs, rect, config.uv_smoothing, |x, y, bary| {
                stats.texels += 1;
                let color = if config.debug_uv_tint && !barycentric_is_inside_with_offset(bary, 0.0)
                {
                    UV_DEBUG_COLOR
                } else {
                    let surface = Surface::on_face(ctx, mesh, face, bary);
                    self.shade(&surface, (x, y), pass, &mut rng, &mut stats)
                };
                lightmap.write(x, y, color);
            });
        }

        RenderedMesh { lightmap, stats }
    }

    /// Color of a single texel for the current pass.
    fn shade(
        &self,
        surface: &Surface,
        texel: (i64, i64),
        pass: u32,
        rng: &mut dyn RngCore,
        stats: &mut RenderStats,
    ) -> Vector3<f32> {
        match self.ctx.config.baking_method {
            BakingMethod::TwoPass if pass <= 1 => direct::direct_light(self.ctx, surface, rng, stats),
            BakingMethod::TwoPass => {
                let own = self
                    .previous
                    .and_then(|maps| maps.get(&surface.mesh))
                    .and_then(|lightmap| lightmap.read(texel.0, texel.1))
                    .unwrap_or_else(Vector3::zeros);
                gather::gather_indirect(self.ctx, self.previous, surface, own, rng, stats)
            }
            BakingMethod::PathTracing => pathtrace::trace_texel(self.ctx, surface, rng, stats),
        }
    }

    /// Single color for a whole face: the first face corner that is not black wins.
    fn flat_face_color(
        &self,
        mesh: usize,
        face: usize,
        uvs: &[Vector2<f32>; 3],
        pass: u32,
        rng: &mut dyn RngCore,
        stats: &mut RenderStats,
    ) -> Vector3<f32> {
        let corners = [(1.0, 0.0, 0.0), (0.0, 1.0, 0.0), (0.0, 0.0, 1.0)];
        for (bary, uv) in corners.into_iter().zip(uvs.iter()) {
            let surface = Surface::on_face(self.ctx, mesh, face, bary);
            let texel = (uv.x.floor() as i64, uv.y.floor() as i64);
            let color = self.shade(&surface, texel, pass, rng, stats);
            if color != Vector3::zeros() {
                return color;
            }
        }
        Vector3::zeros()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::{
        bake::test::{lit_quad_scene, quad},
        config::{BakeConfig, UvMethod},
        scene::SceneSnapshot,
    };
    use std::sync::Arc;

    pub fn context(scene: SceneSnapshot, config: BakeConfig) -> BakeContext {
        BakeContext::new(Arc::new(scene), Arc::new(config)).unwrap()
    }

    pub fn test_config() -> BakeConfig {
        BakeConfig {
            texture_width: 16,
            texture_height: 16,
            soft_shadows: false,
            seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn rasterized_triangle_is_a_single_run_per_row() {
        let uvs = [
            Vector2::new(0.0, 0.0),
            Vector2::new(8.2, 0.0),
            Vector2::new(0.0, 8.2),
        ];
        let rect = TexelRect {
            min: Vector2::new(0, 0),
            max: Vector2::new(8, 8),
        };
        let mut rows = vec![Vec::new(); 8];
        rasterize_face(&uvs, rect, 0.0, |x, y, bary| {
            assert!(barycentric_is_inside_with_offset(bary, 0.0));
            rows[y as usize].push(x);
        });
        for (y, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), 8 - y);
            assert!(row.windows(2).all(|w| w[1] == w[0] + 1));
        }
    }

    #[test]
    fn smoothing_grows_coverage() {
        let uvs = [
            Vector2::new(2.0, 2.0),
            Vector2::new(10.0, 2.0),
            Vector2::new(2.0, 10.0),
        ];
        let rect = TexelRect {
            min: Vector2::new(0, 0),
            max: Vector2::new(12, 12),
        };
        let count = |smoothing| {
            let mut n = 0;
            rasterize_face(&uvs, rect, smoothing, |_, _, _| n += 1);
            n
        };
        assert!(count(0.3) > count(0.0));
    }

    #[test]
    fn quad_under_point_light_is_fully_lit() {
        for uv_method in [UvMethod::Packed, UvMethod::UniformCentered, UvMethod::UniformUncentered] {
            let config = BakeConfig {
                uv_method,
                ..test_config()
            };
            let ctx = context(lit_quad_scene(), config);
            let rendered = Renderer::new(&ctx, None).render_mesh(0, 1);
            assert!(rendered.stats.texels > 0);
            let mut lit = 0;
            for texel in rendered.lightmap.pixels().chunks(4) {
                if texel[3] == 255 {
                    lit += 1;
                    assert!(texel[0] >= 245, "{uv_method:?}: {texel:?}");
                    assert_eq!(texel[0], texel[1]);
                    assert_eq!(texel[1], texel[2]);
                }
            }
            assert!(lit > 0);
        }
    }

    #[test]
    fn occluded_quad_is_dark() {
        let mut scene = lit_quad_scene();
        // Roof is wider than the floor, so texels on the smoothing margin are covered too.
        let mut roof = quad("roof", 1.0);
        roof.vertices.iter_mut().for_each(|v| {
            v.x *= 3.0;
            v.z *= 3.0;
        });
        scene.meshes.push(roof);
        let ctx = context(scene, test_config());
        let rendered = Renderer::new(&ctx, None).render_mesh(0, 1);
        for texel in rendered.lightmap.pixels().chunks(4) {
            assert_eq!(&texel[..3], &[0, 0, 0]);
        }
    }

    #[test]
    fn flat_fast_paints_whole_face_with_one_color() {
        let config = BakeConfig {
            shading: ShadingModel::FlatFast,
            ..test_config()
        };
        let ctx = context(lit_quad_scene(), config);
        let rendered = Renderer::new(&ctx, None).render_mesh(0, 1);
        let lit = rendered
            .lightmap
            .pixels()
            .chunks(4)
            .filter(|t| t[3] == 255)
            .map(|t| t[0])
            .collect::<Vec<_>>();
        assert!(!lit.is_empty());
        assert!(lit.iter().all(|v| *v >= 245));
    }

    #[test]
    fn debug_tint_marks_smoothing_margin() {
        let config = BakeConfig {
            debug_uv_tint: true,
            uv_smoothing: 0.5,
            ..test_config()
        };
        let ctx = context(lit_quad_scene(), config);
        let rendered = Renderer::new(&ctx, None).render_mesh(0, 1);
        let green = rendered
            .lightmap
            .pixels()
            .chunks(4)
            .filter(|t| t == &[0, 255, 0, 255])
            .count();
        assert!(green > 0);
    }

    #[test]
    fn seeded_render_is_reproducible() {
        let config = BakeConfig {
            soft_shadows: true,
            samples: 4,
            path_tracing_depth: 1,
            ..test_config()
        };
        let mut scene = lit_quad_scene();
        scene.meshes.push(quad("wall", 0.5));
        let ctx = context(scene, config);
        let a = Renderer::new(&ctx, None).render_mesh(0, 1);
        let b = Renderer::new(&ctx, None).render_mesh(0, 1);
        assert_eq!(a.lightmap, b.lightmap);
    }
}
