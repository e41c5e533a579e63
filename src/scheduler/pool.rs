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

//! Pool of isolated executors fed from a FIFO job queue.

use crate::{
    bake::BakeContext,
    config::{BakeConfig, PostFilter},
    error::BakeError,
    info,
    lightmap::Lightmap,
    scene::SceneSnapshot,
    scheduler::{
        executor::{executor_main, ExecutorMessage, ExecutorResponse, Task, TaskKind},
        BakeEvent, EventSink, PassResults, Phase,
    },
    uvgen::UvLayout,
    warn,
};
use fxhash::FxHashMap;
use std::{
    collections::VecDeque,
    sync::mpsc::{channel, Receiver, Sender},
    thread::JoinHandle,
};
use uuid::Uuid;

/// Bookkeeping of a single [`ExecutorPool::run_queued`] call.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub dispatched: usize,
    /// How many times the in-flight counter dropped to zero with nothing left in the queue.
    pub zero_in_flight_transitions: usize,
    pub completions: usize,
}

/// Lightmap produced by an executor.
pub struct MeshResult {
    pub mesh: usize,
    pub target: Uuid,
    pub pass: u32,
    pub lightmap: Lightmap,
    pub uvs: Option<UvLayout>,
}

struct ExecutorHandle {
    sender: Sender<ExecutorMessage>,
    thread: Option<JoinHandle<()>>,
}

pub struct ExecutorPool {
    executors: Vec<ExecutorHandle>,
    responses: Receiver<ExecutorResponse>,
    /// Stack of idle executors.
    free: Vec<usize>,
    queue: VecDeque<Task>,
    in_flight: usize,
    next_task_id: usize,
}

fn disconnected(executor_id: usize) -> BakeError {
    BakeError::ExecutorFailed {
        executor_id,
        reason: "executor channel disconnected".to_string(),
    }
}

impl ExecutorPool {
    /// Spawns `size` executors, each gets its own copy of the scene and the configuration.
    pub fn new(size: usize, scene: &SceneSnapshot, config: &BakeConfig) -> Result<Self, BakeError> {
        let (response_sender, responses) = channel();
        let mut executors = Vec::with_capacity(size);
        for executor_id in 0..size {
            let (sender, receiver) = channel();
            let response_sender = response_sender.clone();
            let thread = std::thread::Builder::new()
                .name(format!("lightbake-executor-{executor_id}"))
                .spawn(move || executor_main(executor_id, receiver, response_sender))?;
            sender
                .send(ExecutorMessage::Setup {
                    scene: scene.clone(),
                    config: config.clone(),
                })
                .map_err(|_| disconnected(executor_id))?;
            executors.push(ExecutorHandle {
                sender,
                thread: Some(thread),
            });
        }

        Ok(Self {
            executors,
            responses,
            free: (0..size).rev().collect(),
            queue: Default::default(),
            in_flight: 0,
            next_task_id: 0,
        })
    }

    pub fn size(&self) -> usize {
        self.executors.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Queues a mesh job, returns its id.
    pub fn submit_mesh(&mut self, target: Uuid, pass: u32) -> usize {
        let id = self.next_task_id;
        self.next_task_id += 1;
        self.queue.push_back(Task {
            id,
            kind: TaskKind::Mesh,
            target,
            face_index: None,
            pass,
        });
        id
    }

    /// Replaces previous-pass lightmaps of every executor.
    pub fn sync_lightmaps(&self, lightmaps: &FxHashMap<usize, Lightmap>) -> Result<(), BakeError> {
        for (executor_id, executor) in self.executors.iter().enumerate() {
            executor
                .sender
                .send(ExecutorMessage::SyncLightmaps(lightmaps.clone()))
                .map_err(|_| disconnected(executor_id))?;
        }
        Ok(())
    }

    /// Hands queued jobs to idle executors.
    fn drain(&mut self, stats: &mut PoolStats) -> Result<(), BakeError> {
        while !self.queue.is_empty() {
            let Some(executor_id) = self.free.pop() else {
                break;
            };
            let Some(task) = self.queue.pop_front() else {
                break;
            };
            self.executors[executor_id]
                .sender
                .send(ExecutorMessage::Job(task))
                .map_err(|_| disconnected(executor_id))?;
            self.in_flight += 1;
            stats.dispatched += 1;
        }
        Ok(())
    }

    fn busy_executor(&self) -> usize {
        (0..self.executors.len())
            .find(|id| !self.free.contains(id))
            .unwrap_or_default()
    }

    /// Runs every queued job to completion. Returns when the queue is empty and no job is in
    /// flight, or on the first executor failure.
    pub fn run_queued<F>(&mut self, mut on_baked: F) -> Result<PoolStats, BakeError>
    where
        F: FnMut(MeshResult),
    {
        let mut stats = PoolStats::default();
        self.drain(&mut stats)?;

        while self.in_flight > 0 {
            let response = self
                .responses
                .recv()
                .map_err(|_| disconnected(self.busy_executor()))?;
            match response {
                ExecutorResponse::MeshBaked {
                    mesh,
                    target,
                    pass,
                    lightmap,
                    uvs,
                    ..
                } => on_baked(MeshResult {
                    mesh,
                    target,
                    pass,
                    lightmap,
                    uvs,
                }),
                ExecutorResponse::Finished { executor_id, .. } => {
                    self.free.push(executor_id);
                    self.in_flight -= 1;
                    self.drain(&mut stats)?;
                    if self.in_flight == 0 {
                        stats.zero_in_flight_transitions += 1;
                    }
                }
                ExecutorResponse::Failed {
                    executor_id,
                    reason,
                } => return Err(BakeError::ExecutorFailed { executor_id, reason }),
            }
        }

        stats.completions += 1;
        Ok(stats)
    }
}

impl Drop for ExecutorPool {
    fn drop(&mut self) {
        for executor in self.executors.iter() {
            let _ = executor.sender.send(ExecutorMessage::Shutdown);
        }
        for executor in self.executors.iter_mut() {
            if let Some(thread) = executor.thread.take() {
                let _ = thread.join();
            }
        }
    }
}

/// Runs every pass on a pool of `min(worker limit, job count)` executors. Executors are synced
/// with the results of a pass before the next pass starts.
pub(crate) fn run_parallel(
    ctx: &BakeContext,
    events: &mut EventSink,
) -> Result<PassResults, BakeError> {
    let config = &ctx.config;
    let bake_set = ctx.bake_set();
    let pass_count = config.pass_count();
    let mut results = PassResults::default();

    if config.post_filter != PostFilter::None {
        warn!("Post-processing filter is not applied in parallel mode.");
    }

    if pass_count == 0 {
        events.emit(BakeEvent::AllPassesCompleted);
        return Ok(results);
    }

    let size = config.worker_limit.min(bake_set.len());
    let mut pool = if size > 0 {
        Some(ExecutorPool::new(size, &ctx.scene, config)?)
    } else {
        None
    };
    info!("Parallel bake of {} meshes on {size} executors.", bake_set.len());

    for pass in 1..=pass_count {
        events.phase(Phase::Pass(pass));
        events.emit(BakeEvent::PassStarted(pass));

        if let Some(pool) = pool.as_mut() {
            if pass > 1 {
                pool.sync_lightmaps(&results.lightmaps)?;
            }
            for &mesh in bake_set.iter() {
                pool.submit_mesh(ctx.meshes[mesh].id, pass);
            }

            let mut lightmaps = FxHashMap::default();
            let layouts = &mut results.layouts;
            pool.run_queued(|baked| {
                events.emit(BakeEvent::MeshBaked {
                    mesh: baked.target,
                    pass: baked.pass,
                });
                if let Some(uvs) = baked.uvs {
                    layouts.insert(baked.mesh, uvs);
                }
                lightmaps.insert(baked.mesh, baked.lightmap);
            })?;
            results.lightmaps = lightmaps;
        }

        events.emit(BakeEvent::PassCompleted(pass));
    }

    events.emit(BakeEvent::AllPassesCompleted);
    Ok(results)
}
