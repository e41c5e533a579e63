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

//! Direct lighting with hard or soft shadows.

use crate::{
    bake::BakeContext,
    light::Light,
    renderer::{RenderStats, Surface},
};
use lightbake_math::{lambert_towards, ray::Ray};
use nalgebra::Vector3;
use rand::RngCore;

/// Sum of contributions of every scene light at the surface point, each channel in `[0; 1]`.
pub fn direct_light(
    ctx: &BakeContext,
    surface: &Surface,
    rng: &mut dyn RngCore,
    stats: &mut RenderStats,
) -> Vector3<f32> {
    let mut color = Vector3::zeros();
    for light in ctx.scene.lights.iter() {
        color += light_contribution(ctx, light, surface, rng, stats);
    }
    color.map(|c| c.clamp(0.0, 1.0))
}

fn light_contribution(
    ctx: &BakeContext,
    light: &Light,
    surface: &Surface,
    rng: &mut dyn RngCore,
    stats: &mut RenderStats,
) -> Vector3<f32> {
    let config = &ctx.config;
    let sampler = light.sampler();

    if config.soft_shadows && sampler.has_extent() {
        // Every sample is a small light of its own, with its own angle and distance.
        let samples = config.soft_shadow_samples.max(1);
        let weight = config.soft_shadow_intensity / samples as f32;
        let mut color = Vector3::zeros();
        for _ in 0..samples {
            let target = sampler.sample_point(&surface.point, rng);
            color += lambert_term(ctx, light, surface, &target, stats).scale(weight);
        }
        color
    } else {
        lambert_term(ctx, light, surface, &sampler.position(), stats)
    }
}

/// Light arriving at the surface from a single point of the light.
fn lambert_term(
    ctx: &BakeContext,
    light: &Light,
    surface: &Surface,
    target: &Vector3<f32>,
    stats: &mut RenderStats,
) -> Vector3<f32> {
    let config = &ctx.config;

    let cos = lambert_towards(&surface.normal, &surface.point, target);
    if cos <= 0.0 || !is_visible(ctx, &surface.point, target, stats) {
        return Vector3::zeros();
    }

    let attenuation = if config.light_attenuation {
        light.attenuation((target - surface.point).norm())
    } else {
        1.0
    };

    (light.radiance().scale(cos) + Vector3::repeat(config.global_ambient))
        .map(|c| c.clamp(0.0, 1.0))
        .scale(attenuation)
}

fn is_visible(
    ctx: &BakeContext,
    from: &Vector3<f32>,
    to: &Vector3<f32>,
    stats: &mut RenderStats,
) -> bool {
    let delta = to - from;
    let distance = delta.norm();
    if distance <= f32::EPSILON {
        return true;
    }
    stats.rays += 1;
    let ray = Ray::new(*from, delta.scale(1.0 / distance));
    !ctx.oracle.is_occluded(&ray, distance)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        bake::test::{lit_quad_scene, quad},
        config::BakeConfig,
        light::{AreaLightDefinition, LightKind, PointLightDefinition},
        renderer::test::{context, test_config},
    };
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use rand::{rngs::StdRng, SeedableRng};

    fn center_of_floor(ctx: &BakeContext) -> Surface {
        Surface::on_face(ctx, 0, 0, (0.5, 0.5, 0.0))
    }

    #[test]
    fn light_straight_above_gives_full_intensity() {
        let ctx = context(lit_quad_scene(), test_config());
        let mut rng = StdRng::seed_from_u64(1);
        let mut stats = RenderStats::default();
        let color = direct_light(&ctx, &center_of_floor(&ctx), &mut rng, &mut stats);
        assert_relative_eq!(color, Vector3::repeat(1.0), epsilon = 1.0e-4);
        assert_eq!(stats.rays, 1);
    }

    #[test]
    fn light_below_surface_contributes_nothing() {
        let mut scene = lit_quad_scene();
        scene.lights = vec![Light::point(Vector3::new(0.0, -3.0, 0.0), Vector3::repeat(1.0))];
        let ctx = context(scene, test_config());
        let mut rng = StdRng::seed_from_u64(1);
        let mut stats = RenderStats::default();
        let color = direct_light(&ctx, &center_of_floor(&ctx), &mut rng, &mut stats);
        assert_eq!(color, Vector3::zeros());
        assert_eq!(stats.rays, 0);
    }

    fn small_bulb(position: Vector3<f32>) -> Light {
        Light {
            color: Vector3::repeat(1.0),
            intensity: 1.0,
            kind: LightKind::Point(PointLightDefinition {
                position,
                radius: 1.0e-3,
                ..Default::default()
            }),
        }
    }

    #[test]
    fn single_soft_sample_of_point_light_matches_hard_shadow() {
        let mut scene = lit_quad_scene();
        scene.lights = vec![small_bulb(Vector3::new(0.0, 5.0, 0.0))];
        scene.meshes.push(quad("blocker", 1.0));
        for with_blocker in [false, true] {
            let mut scene = scene.clone();
            if !with_blocker {
                scene.meshes.pop();
            }
            let hard = context(scene.clone(), test_config());
            let soft = context(
                scene.clone(),
                BakeConfig {
                    soft_shadows: true,
                    soft_shadow_samples: 1,
                    ..test_config()
                },
            );
            let mut rng = StdRng::seed_from_u64(3);
            let mut hard_stats = RenderStats::default();
            let mut soft_stats = RenderStats::default();
            let a = direct_light(&hard, &center_of_floor(&hard), &mut rng, &mut hard_stats);
            let b = direct_light(&soft, &center_of_floor(&soft), &mut rng, &mut soft_stats);
            assert_relative_eq!(a, b, epsilon = 1.0e-3);
            assert_eq!(hard_stats.rays, 1);
            assert_eq!(soft_stats.rays, 1);

            // Only the sampled path is scaled by the soft shadow intensity.
            let dimmed = context(
                scene,
                BakeConfig {
                    soft_shadows: true,
                    soft_shadow_samples: 1,
                    soft_shadow_intensity: 0.5,
                    ..test_config()
                },
            );
            let mut stats = RenderStats::default();
            let c = direct_light(&dimmed, &center_of_floor(&dimmed), &mut rng, &mut stats);
            assert_relative_eq!(c, a.scale(0.5), epsilon = 1.0e-3);
        }
    }

    #[test]
    fn area_light_crossing_horizon_still_lights() {
        let mut scene = lit_quad_scene();
        // Vertical panel, its center is slightly below the floor.
        scene.lights = vec![Light {
            color: Vector3::repeat(1.0),
            intensity: 1.0,
            kind: LightKind::Area(AreaLightDefinition {
                position: Vector3::new(0.0, -0.1, 2.0),
                rotation: UnitQuaternion::identity(),
                width: 4.0,
                height: 4.0,
            }),
        }];
        let ctx = context(
            scene,
            BakeConfig {
                soft_shadows: true,
                soft_shadow_samples: 64,
                ..test_config()
            },
        );
        let mut rng = StdRng::seed_from_u64(7);
        let mut stats = RenderStats::default();
        let color = direct_light(&ctx, &center_of_floor(&ctx), &mut rng, &mut stats);
        assert!(color.x > 0.0, "{color:?}");
        // Samples below the horizon are skipped without a shadow ray.
        assert!(stats.rays > 0 && stats.rays < 64, "{}", stats.rays);
    }

    #[test]
    fn area_light_gives_penumbra() {
        let mut scene = lit_quad_scene();
        scene.lights = vec![Light {
            color: Vector3::repeat(1.0),
            intensity: 1.0,
            kind: LightKind::Area(AreaLightDefinition {
                position: Vector3::new(0.0, 2.0, 0.0),
                rotation: UnitQuaternion::identity(),
                width: 4.0,
                height: 4.0,
            }),
        }];
        // Small blocker hides a part of the light from the center of the floor.
        let mut blocker = quad("blocker", 1.0);
        blocker.vertices.iter_mut().for_each(|v| v.x = v.x * 0.5 + 0.25);
        scene.meshes.push(blocker);

        let ctx = context(
            scene,
            BakeConfig {
                soft_shadows: true,
                soft_shadow_samples: 64,
                ..test_config()
            },
        );
        let mut rng = StdRng::seed_from_u64(5);
        let mut stats = RenderStats::default();
        let color = direct_light(&ctx, &center_of_floor(&ctx), &mut rng, &mut stats);
        assert_eq!(stats.rays, 64);
        assert!(color.x > 0.0 && color.x < 1.0, "{color:?}");
    }

    #[test]
    fn attenuation_dims_distant_light() {
        let mut scene = lit_quad_scene();
        scene.lights = vec![Light {
            color: Vector3::repeat(1.0),
            intensity: 1.0,
            kind: LightKind::Point(PointLightDefinition {
                position: Vector3::new(0.0, 5.0, 0.0),
                cutoff: 10.0,
                decay: 1.0,
                ..Default::default()
            }),
        }];
        let ctx = context(
            scene,
            BakeConfig {
                light_attenuation: true,
                ..test_config()
            },
        );
        let mut rng = StdRng::seed_from_u64(1);
        let mut stats = RenderStats::default();
        let color = direct_light(&ctx, &center_of_floor(&ctx), &mut rng, &mut stats);
        assert_relative_eq!(color.x, 0.5, epsilon = 1.0e-3);
    }
}
