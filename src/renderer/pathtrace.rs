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

//! Recursive path tracer.

use crate::{
    bake::BakeContext,
    oracle::closest_intersection,
    renderer::{cast, direct::direct_light, sampling::hemisphere_direction, RenderStats, Surface},
};
use lightbake_math::{lambert_towards, ray::Ray};
use nalgebra::Vector3;
use rand::RngCore;

/// Radiance leaving `surface`: direct light plus, while `depth` is below the configured limit,
/// light arriving along one random hemisphere direction.
pub fn radiance(
    ctx: &BakeContext,
    surface: &Surface,
    depth: u32,
    rng: &mut dyn RngCore,
    stats: &mut RenderStats,
) -> Vector3<f32> {
    stats.max_depth = stats.max_depth.max(depth);

    let config = &ctx.config;
    let mut color = direct_light(ctx, surface, rng, stats);
    if depth >= config.path_tracing_depth {
        return color;
    }

    let dir = hemisphere_direction(&surface.normal, &surface.tangent, config.importance, rng);
    let mut hits = Vec::new();
    cast(&*ctx.oracle, &Ray::new(surface.point, dir), &mut hits, stats);
    if let Some(hit) = closest_intersection(&hits) {
        let remote = Surface::at_hit(ctx, hit, &dir);
        let incoming = radiance(ctx, &remote, depth + 1, rng, stats);
        let intensity = lambert_towards(&surface.normal, &surface.point, &remote.point).max(0.0)
            * lambert_towards(&remote.normal, &remote.point, &surface.point).max(0.0)
            * config.gi_intensity;
        color += incoming
            .component_mul(&ctx.albedo_at(hit))
            .scale(intensity)
            .map(|c| c.clamp(0.0, 1.0));
    }

    color.map(|c| c.clamp(0.0, 1.0))
}

/// Average of `samples` independent paths starting at the texel surface point.
pub fn trace_texel(
    ctx: &BakeContext,
    surface: &Surface,
    rng: &mut dyn RngCore,
    stats: &mut RenderStats,
) -> Vector3<f32> {
    let samples = ctx.config.samples.max(1);
    let mut sum = Vector3::zeros();
    for _ in 0..samples {
        sum += radiance(ctx, surface, 0, rng, stats);
    }
    sum.scale(1.0 / samples as f32).map(|c| c.clamp(0.0, 1.0))
}
