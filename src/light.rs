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

//! Lights and the sampling of their surfaces for soft shadows.

use lightbake_math::distance_attenuation;
use nalgebra::{UnitQuaternion, Vector3};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Anything that can produce points on the emitting surface of a light.
pub trait LightSampler {
    /// Center of the light.
    fn position(&self) -> Vector3<f32>;

    /// Whether the light has a surface worth sampling. Point-like lights always cast hard shadows.
    fn has_extent(&self) -> bool;

    /// Random point on the part of the light visible from `receiver`.
    fn sample_point(&self, receiver: &Vector3<f32>, rng: &mut dyn RngCore) -> Vector3<f32>;
}

/// Omnidirectional light, optionally with a spherical body of `radius`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointLightDefinition {
    pub position: Vector3<f32>,
    pub radius: f32,
    /// Distance at which the light fades out completely. Zero disables the cutoff.
    pub cutoff: f32,
    /// Exponent of the falloff curve. Zero disables attenuation.
    pub decay: f32,
}

impl Default for PointLightDefinition {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            radius: 0.0,
            cutoff: 0.0,
            decay: 1.0,
        }
    }
}

impl LightSampler for PointLightDefinition {
    fn position(&self) -> Vector3<f32> {
        self.position
    }

    fn has_extent(&self) -> bool {
        self.radius > 0.0
    }

    fn sample_point(&self, receiver: &Vector3<f32>, rng: &mut dyn RngCore) -> Vector3<f32> {
        let z: f32 = rng.gen_range(-1.0..=1.0);
        let phi: f32 = rng.gen_range(0.0..TAU);
        let r = (1.0 - z * z).max(0.0).sqrt();
        let mut dir = Vector3::new(r * phi.cos(), r * phi.sin(), z);
        // Keep the sample on the hemisphere facing the receiver.
        if dir.dot(&(receiver - self.position)) < 0.0 {
            dir = -dir;
        }
        self.position + dir.scale(self.radius)
    }
}

/// Rectangular emitter. The rectangle lies in local XY plane of the light.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaLightDefinition {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub width: f32,
    pub height: f32,
}

impl Default for AreaLightDefinition {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            width: 1.0,
            height: 1.0,
        }
    }
}

impl LightSampler for AreaLightDefinition {
    fn position(&self) -> Vector3<f32> {
        self.position
    }

    fn has_extent(&self) -> bool {
        self.width > 0.0 || self.height > 0.0
    }

    fn sample_point(&self, _receiver: &Vector3<f32>, rng: &mut dyn RngCore) -> Vector3<f32> {
        let hw = self.width * 0.5;
        let hh = self.height * 0.5;
        let local = Vector3::new(
            if hw > 0.0 { rng.gen_range(-hw..=hw) } else { 0.0 },
            if hh > 0.0 { rng.gen_range(-hh..=hh) } else { 0.0 },
            0.0,
        );
        self.position + self.rotation.transform_vector(&local)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    Point(PointLightDefinition),
    Area(AreaLightDefinition),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Light {
    /// Linear color, each channel in `[0; 1]`.
    pub color: Vector3<f32>,
    pub intensity: f32,
    pub kind: LightKind,
}

impl Light {
    pub fn point(position: Vector3<f32>, color: Vector3<f32>) -> Self {
        Self {
            color,
            intensity: 1.0,
            kind: LightKind::Point(PointLightDefinition {
                position,
                ..Default::default()
            }),
        }
    }

    pub fn sampler(&self) -> &dyn LightSampler {
        match &self.kind {
            LightKind::Point(point) => point,
            LightKind::Area(area) => area,
        }
    }

    pub fn radiance(&self) -> Vector3<f32> {
        self.color.scale(self.intensity)
    }

    /// Distance falloff. Only point lights attenuate.
    pub fn attenuation(&self, distance: f32) -> f32 {
        match &self.kind {
            LightKind::Point(point) => distance_attenuation(distance, point.cutoff, point.decay),
            LightKind::Area(_) => 1.0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn point_light_samples_facing_hemisphere() {
        let light = PointLightDefinition {
            position: Vector3::new(0.0, 5.0, 0.0),
            radius: 0.5,
            ..Default::default()
        };
        let receiver = Vector3::zeros();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let p = light.sample_point(&receiver, &mut rng);
            assert_relative_eq!((p - light.position).norm(), 0.5, epsilon = 1.0e-4);
            assert!(p.y <= 5.0 + 1.0e-6);
        }
    }

    #[test]
    fn area_light_samples_inside_rectangle() {
        let light = AreaLightDefinition {
            position: Vector3::new(0.0, 3.0, 0.0),
            rotation: UnitQuaternion::from_axis_angle(
                &Vector3::x_axis(),
                std::f32::consts::FRAC_PI_2,
            ),
            width: 2.0,
            height: 1.0,
        };
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..100 {
            let p = light.sample_point(&Vector3::zeros(), &mut rng);
            assert_relative_eq!(p.y, 3.0, epsilon = 1.0e-5);
            assert!(p.x.abs() <= 1.0 + 1.0e-5);
            assert!(p.z.abs() <= 0.5 + 1.0e-5);
        }
    }

    #[test]
    fn only_point_lights_attenuate() {
        let mut light = Light::point(Vector3::zeros(), Vector3::repeat(1.0));
        if let LightKind::Point(point) = &mut light.kind {
            point.cutoff = 10.0;
            point.decay = 1.0;
        }
        assert_relative_eq!(light.attenuation(5.0), 0.5);

        let area = Light {
            color: Vector3::repeat(1.0),
            intensity: 1.0,
            kind: LightKind::Area(Default::default()),
        };
        assert_eq!(area.attenuation(100.0), 1.0);
        assert!(area.sampler().has_extent());
        assert!(!light.sampler().has_extent());
    }
}
