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

//! Bake configuration. An immutable value that is validated once and then shared read-only by
//! every stage of the bake (and copied into every parallel executor).

use crate::error::BakeError;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use std::{fs::File, path::Path, time::Duration};
use strum_macros::{AsRefStr, EnumIter, EnumString};

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum ShadingModel {
    /// Face normal for every texel of a face.
    Flat,
    /// Vertex normals interpolated over the face.
    #[default]
    Phong,
    /// Whole face gets a single color. Fast preview quality.
    FlatFast,
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum IlluminationModel {
    #[default]
    Lambert,
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum UvMethod {
    UniformUncentered,
    UniformCentered,
    #[default]
    Packed,
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum BakingMethod {
    /// Direct light in the first pass, one gathered bounce in the second pass.
    TwoPass,
    #[default]
    PathTracing,
}

/// How per-mesh `bake_me` / `intersect_me` flags select meshes.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum InclusionFilter {
    /// Every mesh is included, flags are ignored.
    #[default]
    Disabled,
    /// Only meshes with the flag set are included. Missing flag means "excluded".
    OnlyFlagged,
    /// Meshes with the flag set are excluded. Missing flag means "included".
    Inverted,
}

impl InclusionFilter {
    pub fn includes(self, flag: Option<bool>) -> bool {
        match self {
            InclusionFilter::Disabled => true,
            InclusionFilter::OnlyFlagged => flag.unwrap_or(false),
            InclusionFilter::Inverted => !flag.unwrap_or(false),
        }
    }
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum RaycasterBackend {
    /// Brute-force scan of every triangle of every mesh.
    #[default]
    Linear,
    /// Triangle octree.
    Octree,
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum PostFilter {
    #[default]
    None,
    Box,
    Gauss,
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum ExecutionMode {
    #[default]
    Synchronous,
    /// Sequential, with a pause between meshes so the host can do its own work.
    Cooperative,
    /// Pool of isolated executor threads.
    Parallel,
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString, EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
pub enum TaskGranularity {
    #[default]
    Mesh,
    Face,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeConfig {
    /// Default lightmap size, meshes may override it.
    pub texture_width: u32,
    pub texture_height: u32,
    pub shading: ShadingModel,
    pub illumination: IlluminationModel,
    pub uv_method: UvMethod,
    /// Gutter between packed atlas patches, in texels.
    pub packing_offset: f32,
    /// Barycentric tolerance used when rasterizing faces into the lightmap.
    pub uv_smoothing: f32,
    pub baking_method: BakingMethod,
    /// Number of passes of the two-pass method, `0..=2`. Zero only builds UV atlases.
    pub two_pass_count: u32,
    /// Rays per texel for indirect light.
    pub samples: u32,
    /// Maximum bounce depth of the path tracer.
    pub path_tracing_depth: u32,
    /// Spread of hemisphere samples, 1.0 is uniform over the disk.
    pub importance: f32,
    pub global_ambient: f32,
    pub gi_intensity: f32,
    pub mesh_filter: InclusionFilter,
    pub raycast_filter: InclusionFilter,
    pub raycaster: RaycasterBackend,
    /// Intersections closer than this are ignored to avoid self-shadowing.
    pub raycaster_precision: f32,
    pub soft_shadows: bool,
    pub soft_shadow_samples: u32,
    pub soft_shadow_intensity: f32,
    pub light_attenuation: bool,
    pub post_filter: PostFilter,
    pub execution_mode: ExecutionMode,
    pub worker_limit: usize,
    pub task_granularity: TaskGranularity,
    /// Pause between meshes in cooperative mode, in milliseconds.
    pub cooperative_delay: u64,
    /// Paints texels covered only thanks to the smoothing tolerance green.
    pub debug_uv_tint: bool,
    /// Seed for random sampling. Random seed is used when not set.
    pub seed: Option<u64>,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            texture_width: 512,
            texture_height: 512,
            shading: Default::default(),
            illumination: Default::default(),
            uv_method: Default::default(),
            packing_offset: 2.0,
            uv_smoothing: 0.2,
            baking_method: Default::default(),
            two_pass_count: 2,
            samples: 1,
            path_tracing_depth: 0,
            importance: 1.0,
            global_ambient: 0.0,
            gi_intensity: 2.0,
            mesh_filter: Default::default(),
            raycast_filter: Default::default(),
            raycaster: Default::default(),
            raycaster_precision: 0.0001,
            soft_shadows: true,
            soft_shadow_samples: 1,
            soft_shadow_intensity: 1.0,
            light_attenuation: false,
            post_filter: Default::default(),
            execution_mode: Default::default(),
            worker_limit: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            task_granularity: Default::default(),
            cooperative_delay: 0,
            debug_uv_tint: false,
            seed: None,
        }
    }
}

impl BakeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BakeError> {
        let file = File::open(path)?;
        Ok(ron::de::from_reader(file)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), BakeError> {
        let file = File::create(path)?;
        ron::ser::to_writer_pretty(file, self, PrettyConfig::default())?;
        Ok(())
    }

    /// Number of render passes a bake runs. Path tracing always runs exactly one.
    pub fn pass_count(&self) -> u32 {
        match self.baking_method {
            BakingMethod::TwoPass => self.two_pass_count,
            BakingMethod::PathTracing => 1,
        }
    }

    pub fn cooperative_delay(&self) -> Duration {
        Duration::from_millis(self.cooperative_delay)
    }

    /// Checks every rule that must hold before a bake starts.
    pub fn validate(&self) -> Result<(), BakeError> {
        if self.baking_method == BakingMethod::TwoPass && self.two_pass_count > 2 {
            return Err(BakeError::InvalidPassCount(self.two_pass_count));
        }

        if self.execution_mode == ExecutionMode::Parallel {
            if self.baking_method == BakingMethod::PathTracing {
                return Err(BakeError::PathTracingInParallelMode);
            }
            if !parallel_execution_available() {
                return Err(BakeError::ParallelUnavailable);
            }
            if self.worker_limit == 0 {
                return Err(BakeError::InvalidConfig(
                    "worker limit must be at least 1".to_string(),
                ));
            }
        }

        if self.raycaster == RaycasterBackend::Octree && !cfg!(feature = "octree") {
            return Err(BakeError::BackendUnavailable("octree"));
        }
        if self.uv_method == UvMethod::Packed && !cfg!(feature = "packing") {
            return Err(BakeError::BackendUnavailable("packing"));
        }

        if self.task_granularity == TaskGranularity::Face {
            return Err(BakeError::UnsupportedTaskGranularity);
        }

        let invalid = |reason: &str| Err(BakeError::InvalidConfig(reason.to_string()));

        if self.texture_width == 0 || self.texture_height == 0 {
            return invalid("texture size must be non-zero");
        }
        if self.samples == 0 {
            return invalid("sample count must be at least 1");
        }
        if self.soft_shadows && self.soft_shadow_samples == 0 {
            return invalid("soft shadow sample count must be at least 1");
        }
        if self.uv_method == UvMethod::Packed && !(self.packing_offset >= 1.0) {
            return invalid("packing offset must be at least one texel");
        }
        if !(self.uv_smoothing >= 0.0) {
            return invalid("uv smoothing must be non-negative");
        }
        if !(self.importance > 0.0) {
            return invalid("importance must be positive");
        }
        if !(self.raycaster_precision >= 0.0) {
            return invalid("raycaster precision must be non-negative");
        }

        Ok(())
    }
}

/// Executors are plain OS threads, which are missing on wasm.
pub fn parallel_execution_available() -> bool {
    cfg!(not(target_arch = "wasm32"))
}
