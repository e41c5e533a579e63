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

//! One bounce of indirect light for the second pass of the two-pass method.

use crate::{
    bake::BakeContext,
    lightmap::Lightmap,
    oracle::{closest_intersection, Intersection},
    renderer::{cast, sampling::hemisphere_direction, RenderStats, Surface},
};
use fxhash::FxHashMap;
use lightbake_math::{barycentric_to_2d, ray::Ray};
use nalgebra::Vector3;
use rand::RngCore;

/// Lightmap color at a ray hit, taken from the map of the previous pass. Surfaces without a map
/// (not baked or not baked yet) are black.
pub fn remote_lightmap_color(
    ctx: &BakeContext,
    previous: Option<&FxHashMap<usize, Lightmap>>,
    hit: &Intersection,
) -> Vector3<f32> {
    let Some(lightmap) = previous.and_then(|maps| maps.get(&hit.mesh)) else {
        return Vector3::zeros();
    };
    let Some(layout) = ctx.layouts[hit.mesh].as_ref() else {
        return Vector3::zeros();
    };
    let [a, b, c] = &layout.uvs[hit.face_index];
    lightmap.sample(barycentric_to_2d(hit.bary, a, b, c))
}

/// Adds light reflected by surfaces visible from `surface` to `pass_color`, the color of the texel
/// after the previous pass.
pub fn gather_indirect(
    ctx: &BakeContext,
    previous: Option<&FxHashMap<usize, Lightmap>>,
    surface: &Surface,
    pass_color: Vector3<f32>,
    rng: &mut dyn RngCore,
    stats: &mut RenderStats,
) -> Vector3<f32> {
    let config = &ctx.config;
    let samples = config.samples.max(1);
    let mut color = pass_color;
    let mut hits = Vec::new();

    for _ in 0..samples {
        let dir = hemisphere_direction(&surface.normal, &surface.tangent, config.importance, rng);
        hits.clear();
        cast(&*ctx.oracle, &Ray::new(surface.point, dir), &mut hits, stats);
        let Some(hit) = closest_intersection(&hits) else {
            continue;
        };

        let remote = remote_lightmap_color(ctx, previous, hit).component_mul(&ctx.albedo_at(hit));
        if remote.sum() <= 0.0 {
            continue;
        }

        let remote_normal = ctx.meshes[hit.mesh].world_normals[hit.face_index];
        let factor = surface.normal.dot(&dir).max(0.0)
            * (-remote_normal.dot(&dir)).max(0.0)
            * config.gi_intensity
            / samples as f32;
        color += remote.scale(factor).map(|c| c.clamp(0.0, 1.0));
    }

    color.map(|c| c.clamp(0.0, 1.0))
}
