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

//! Bake driver. Runs setup, all lighting passes and post-processing either on the calling thread
//! (synchronous and cooperative modes) or on a pool of isolated executor threads.
//!
//! Progress is reported as a stream of [`BakeEvent`] sent to every registered listener. A bake
//! always goes through the phases in the following order:
//!
//! ```text
//! Idle -> Setup -> Pass(1) -> .. -> Pass(N) -> [PostProcess] -> Done
//! ```

use crate::{
    bake::BakeContext,
    config::{BakeConfig, ExecutionMode},
    error::BakeError,
    export::{BakeOutput, BakedMesh, BakingMetadata},
    info,
    lightmap::Lightmap,
    scene::SceneSnapshot,
    uvgen::UvLayout,
};
use fxhash::FxHashMap;
use std::{
    fmt::{Display, Formatter},
    sync::{mpsc::Sender, Arc},
    time::Instant,
};
use uuid::Uuid;

pub mod executor;
pub mod pool;
pub mod sequential;

pub use executor::ExecutorContext;
pub use pool::{ExecutorPool, PoolStats};
pub use sequential::SequentialScheduler;

/// Bake stage.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    /// Filtering meshes, building the visibility oracle and UV atlases.
    Setup,
    /// Lighting pass, starting from 1.
    Pass(u32),
    PostProcess,
    Done,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::Setup => write!(f, "Setup"),
            Phase::Pass(pass) => write!(f, "Pass {pass}"),
            Phase::PostProcess => write!(f, "Post-processing"),
            Phase::Done => write!(f, "Done"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BakeEvent {
    PhaseChanged(Phase),
    PassStarted(u32),
    /// Lightmap of the mesh is ready for the pass. Sent for every pass, the one with the last
    /// pass number carries the final lightmap.
    MeshBaked { mesh: Uuid, pass: u32 },
    PassCompleted(u32),
    MeshFiltered(Uuid),
    /// Sent once, after the last pass completed for every mesh (right after setup when there are
    /// no passes).
    AllPassesCompleted,
    Finished,
}

/// Fan-out of bake events. Disconnected listeners are dropped silently.
#[derive(Default)]
pub struct EventSink {
    listeners: Vec<Sender<BakeEvent>>,
}

impl EventSink {
    pub fn add_listener(&mut self, listener: Sender<BakeEvent>) {
        self.listeners.push(listener);
    }

    pub fn emit(&mut self, event: BakeEvent) {
        self.listeners
            .retain(|listener| listener.send(event.clone()).is_ok());
    }

    pub(crate) fn phase(&mut self, phase: Phase) {
        self.emit(BakeEvent::PhaseChanged(phase));
    }
}

/// Lightmaps and UV layouts produced by lighting passes, keyed by mesh index.
#[derive(Default)]
pub(crate) struct PassResults {
    pub lightmaps: FxHashMap<usize, Lightmap>,
    pub layouts: FxHashMap<usize, UvLayout>,
}

/// Entry point of a bake.
pub struct Baker {
    scene: Arc<SceneSnapshot>,
    config: Arc<BakeConfig>,
    events: EventSink,
}

impl Baker {
    /// Validates the configuration, nothing is computed yet.
    pub fn new(scene: SceneSnapshot, config: BakeConfig) -> Result<Self, BakeError> {
        config.validate()?;
        Ok(Self {
            scene: Arc::new(scene),
            config: Arc::new(config),
            events: Default::default(),
        })
    }

    pub fn add_listener(&mut self, listener: Sender<BakeEvent>) {
        self.events.add_listener(listener);
    }

    pub fn config(&self) -> &BakeConfig {
        &self.config
    }

    /// Runs the bake to completion. There is no cancellation, the first error aborts the bake.
    pub fn run(mut self) -> Result<BakeOutput, BakeError> {
        let started = Instant::now();
        self.events.phase(Phase::Idle);
        self.events.phase(Phase::Setup);

        let ctx = BakeContext::new(self.scene.clone(), self.config.clone())?;

        let results = match self.config.execution_mode {
            ExecutionMode::Synchronous | ExecutionMode::Cooperative => {
                SequentialScheduler::new(&ctx, &mut self.events).run()
            }
            ExecutionMode::Parallel => pool::run_parallel(&ctx, &mut self.events)?,
        };

        let output = assemble_output(&ctx, results);

        self.events.phase(Phase::Done);
        self.events.emit(BakeEvent::Finished);

        info!(
            "Bake finished in {:.2} s, {} lightmaps.",
            started.elapsed().as_secs_f32(),
            output.meshes.len()
        );

        Ok(output)
    }
}

/// Builds the output for every mesh of the bake set. Meshes missing from pass results (no passes
/// were run) get an empty lightmap.
fn assemble_output(ctx: &BakeContext, mut results: PassResults) -> BakeOutput {
    let meshes = ctx
        .bake_set()
        .into_iter()
        .filter_map(|index| {
            let mesh = &ctx.scene.meshes[index];
            let prepared = &ctx.meshes[index];
            let layout = results
                .layouts
                .remove(&index)
                .or_else(|| ctx.layouts[index].clone())?;
            let lightmap = results
                .lightmaps
                .remove(&index)
                .unwrap_or_else(|| Lightmap::new(prepared.width, prepared.height));
            Some(BakedMesh {
                id: mesh.id,
                name: mesh.name.clone(),
                metadata: BakingMetadata {
                    bake_me: prepared.bake,
                    intersect_me: prepared.intersect,
                    face_begin: prepared.face_range.start,
                    face_end: prepared.face_range.end,
                    texture_width: prepared.width,
                    texture_height: prepared.height,
                    atlas: layout.atlas.clone(),
                },
                layout,
                lightmap,
            })
        })
        .collect();

    BakeOutput {
        config: (*ctx.config).clone(),
        meshes,
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::{
        bake::test::{lit_quad_scene, quad},
        config::{BakingMethod, PostFilter},
        scene::Mesh,
    };
    use std::sync::mpsc::{channel, Receiver};

    /// Three separated quads under a single light.
    pub fn three_quads() -> SceneSnapshot {
        let mut scene = lit_quad_scene();
        for (i, x) in [2.0f32, -2.0].into_iter().enumerate() {
            let mut mesh = quad(&format!("quad{i}"), 0.0);
            mesh.vertices.iter_mut().for_each(|v| v.x += x);
            scene.meshes.push(mesh);
        }
        scene
    }

    pub fn two_pass_config(mode: ExecutionMode) -> BakeConfig {
        BakeConfig {
            texture_width: 16,
            texture_height: 16,
            baking_method: BakingMethod::TwoPass,
            two_pass_count: 2,
            samples: 4,
            soft_shadows: false,
            execution_mode: mode,
            worker_limit: 2,
            seed: Some(1),
            ..Default::default()
        }
    }

    pub fn bake(scene: SceneSnapshot, config: BakeConfig) -> (BakeOutput, Vec<BakeEvent>) {
        let (sender, receiver): (_, Receiver<BakeEvent>) = channel();
        let mut baker = Baker::new(scene, config).unwrap();
        baker.add_listener(sender);
        let output = baker.run().unwrap();
        (output, receiver.try_iter().collect())
    }

    fn assert_barrier(events: &[BakeEvent], meshes: usize, passes: u32) {
        let mut pass = 0;
        let mut baked_in_pass = 0;
        for event in events {
            match event {
                BakeEvent::PassStarted(k) => {
                    assert_eq!(*k, pass + 1);
                    pass = *k;
                    baked_in_pass = 0;
                }
                BakeEvent::MeshBaked { pass: k, .. } => {
                    assert_eq!(*k, pass);
                    baked_in_pass += 1;
                }
                BakeEvent::PassCompleted(k) => {
                    assert_eq!(*k, pass);
                    assert_eq!(baked_in_pass, meshes);
                }
                _ => (),
            }
        }
        assert_eq!(pass, passes);
    }

    #[test]
    fn two_pass_barrier_holds_in_every_mode() {
        for mode in [
            ExecutionMode::Synchronous,
            ExecutionMode::Cooperative,
            ExecutionMode::Parallel,
        ] {
            let (output, events) = bake(three_quads(), two_pass_config(mode));
            assert_eq!(output.meshes.len(), 3);
            assert_barrier(&events, 3, 2);
            assert_eq!(
                events
                    .iter()
                    .filter(|e| **e == BakeEvent::AllPassesCompleted)
                    .count(),
                1
            );
            assert_eq!(events.last(), Some(&BakeEvent::Finished));
        }
    }

    #[test]
    fn phases_come_in_order() {
        let config = BakeConfig {
            post_filter: PostFilter::Box,
            ..two_pass_config(ExecutionMode::Synchronous)
        };
        let (_, events) = bake(three_quads(), config);
        let phases = events
            .iter()
            .filter_map(|e| match e {
                BakeEvent::PhaseChanged(phase) => Some(*phase),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(
            phases,
            vec![
                Phase::Idle,
                Phase::Setup,
                Phase::Pass(1),
                Phase::Pass(2),
                Phase::PostProcess,
                Phase::Done
            ]
        );
        let filtered = events
            .iter()
            .filter(|e| matches!(e, BakeEvent::MeshFiltered(_)))
            .count();
        assert_eq!(filtered, 3);
    }

    #[test]
    fn zero_passes_only_build_atlases() {
        let config = BakeConfig {
            two_pass_count: 0,
            ..two_pass_config(ExecutionMode::Synchronous)
        };
        let (output, events) = bake(three_quads(), config);
        assert_eq!(output.meshes.len(), 3);
        for mesh in output.meshes.iter() {
            assert_eq!(mesh.layout.uvs.len(), 2);
            assert!(mesh.lightmap.pixels().iter().all(|p| *p == 0));
        }
        assert!(!events
            .iter()
            .any(|e| matches!(e, BakeEvent::PassStarted(_) | BakeEvent::MeshBaked { .. })));
        assert!(events.contains(&BakeEvent::AllPassesCompleted));
    }

    #[test]
    fn excluded_mesh_is_absent_from_output() {
        let mut scene = three_quads();
        scene.meshes[1].baking.bake_me = Some(false);
        let config = BakeConfig {
            mesh_filter: crate::config::InclusionFilter::OnlyFlagged,
            ..two_pass_config(ExecutionMode::Synchronous)
        };
        scene.meshes[0].baking.bake_me = Some(true);
        scene.meshes[2].baking.bake_me = Some(true);
        let excluded = scene.meshes[1].id;
        let (output, events) = bake(scene, config);
        assert_eq!(output.meshes.len(), 2);
        assert!(output.mesh(excluded).is_none());
        assert!(!events
            .iter()
            .any(|e| matches!(e, BakeEvent::MeshBaked { mesh, .. } if *mesh == excluded)));
    }

    #[test]
    fn parallel_and_sequential_bakes_agree() {
        let (sequential, _) = bake(three_quads(), two_pass_config(ExecutionMode::Synchronous));
        let (parallel, _) = bake(three_quads(), two_pass_config(ExecutionMode::Parallel));
        for (a, b) in sequential.meshes.iter().zip(parallel.meshes.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.layout, b.layout);
            assert_eq!(a.lightmap, b.lightmap);
        }
    }

    #[test]
    fn invalid_configuration_is_rejected_before_baking() {
        let config = BakeConfig {
            execution_mode: ExecutionMode::Parallel,
            baking_method: BakingMethod::PathTracing,
            ..Default::default()
        };
        assert!(matches!(
            Baker::new(SceneSnapshot::default(), config),
            Err(BakeError::PathTracingInParallelMode)
        ));
    }

    #[test]
    fn empty_scene_finishes() {
        let scene = SceneSnapshot {
            meshes: vec![Mesh::from_triangles("empty", Vec::new(), &[])],
            lights: Vec::new(),
        };
        for mode in [ExecutionMode::Synchronous, ExecutionMode::Parallel] {
            let (output, events) = bake(scene.clone(), two_pass_config(mode));
            assert!(output.meshes.is_empty());
            assert_eq!(events.last(), Some(&BakeEvent::Finished));
        }
    }
}
