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

//! Isolated bake executor. Every executor owns private copies of the scene and the configuration
//! and talks to the scheduler only through messages.

use crate::{
    bake::BakeContext,
    config::BakeConfig,
    error::BakeError,
    lightmap::Lightmap,
    log::Log,
    renderer::Renderer,
    scene::SceneSnapshot,
    uvgen::UvLayout,
    warn,
};
use fxhash::FxHashMap;
use std::{
    fmt::{Display, Formatter},
    panic::{self, AssertUnwindSafe},
    sync::{
        mpsc::{Receiver, Sender},
        Arc,
    },
};
use uuid::Uuid;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskKind {
    Mesh,
    /// Reserved, executors acknowledge face jobs without doing anything.
    Face,
}

/// Single bake job.
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub id: usize,
    pub kind: TaskKind,
    pub target: Uuid,
    pub face_index: Option<usize>,
    pub pass: u32,
}

pub enum ExecutorMessage {
    /// Must be the first message, the executor builds its private bake context from it.
    Setup {
        scene: SceneSnapshot,
        config: BakeConfig,
    },
    Job(Task),
    /// Lightmaps of the previous pass, keyed by mesh index.
    SyncLightmaps(FxHashMap<usize, Lightmap>),
    Shutdown,
}

pub enum ExecutorResponse {
    MeshBaked {
        executor_id: usize,
        task_id: usize,
        mesh: usize,
        target: Uuid,
        pass: u32,
        lightmap: Lightmap,
        uvs: Option<UvLayout>,
    },
    /// Job is done (successfully or not, failures are reported before this message).
    Finished { executor_id: usize, task_id: usize },
    Failed { executor_id: usize, reason: String },
}

/// Diagnostic context of an executor, printed in front of every log line of a job.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExecutorContext {
    pub executor_id: usize,
    pub task_id: usize,
}

impl Display for ExecutorContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "executor {} / task {}", self.executor_id, self.task_id)
    }
}

struct ExecutorState {
    ctx: BakeContext,
    previous: FxHashMap<usize, Lightmap>,
}

impl ExecutorState {
    fn run(&self, executor_id: usize, task: &Task) -> Result<Option<ExecutorResponse>, BakeError> {
        match task.kind {
            TaskKind::Face => {
                warn!(
                    "Face job for mesh {} (face {:?}) ignored, face-level jobs are not supported.",
                    task.target, task.face_index
                );
                Ok(None)
            }
            TaskKind::Mesh => {
                let mesh = self
                    .ctx
                    .scene
                    .mesh_index(task.target)
                    .filter(|i| self.ctx.meshes[*i].bake)
                    .ok_or_else(|| {
                        BakeError::InvalidConfig(format!("mesh {} is not in bake set", task.target))
                    })?;
                let rendered =
                    Renderer::new(&self.ctx, Some(&self.previous)).render_mesh(mesh, task.pass);
                Ok(Some(ExecutorResponse::MeshBaked {
                    executor_id,
                    task_id: task.id,
                    mesh,
                    target: task.target,
                    pass: task.pass,
                    lightmap: rendered.lightmap,
                    uvs: self.ctx.layouts[mesh].clone(),
                }))
            }
        }
    }
}

fn panic_reason(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

/// Body of an executor thread. Returns when the scheduler sends [`ExecutorMessage::Shutdown`],
/// drops its sender, or after a failure was reported.
pub fn executor_main(
    executor_id: usize,
    messages: Receiver<ExecutorMessage>,
    responses: Sender<ExecutorResponse>,
) {
    let fail = |reason: String| {
        let _ = responses.send(ExecutorResponse::Failed {
            executor_id,
            reason,
        });
    };

    let mut state = None;

    for message in messages {
        match message {
            ExecutorMessage::Setup { scene, config } => {
                let ctx = panic::catch_unwind(AssertUnwindSafe(|| {
                    BakeContext::new(Arc::new(scene), Arc::new(config))
                }));
                match ctx {
                    Ok(Ok(ctx)) => {
                        state = Some(ExecutorState {
                            ctx,
                            previous: Default::default(),
                        })
                    }
                    Ok(Err(e)) => return fail(e.to_string()),
                    Err(payload) => return fail(panic_reason(payload)),
                }
            }
            ExecutorMessage::Job(task) => {
                let Some(state) = state.as_ref() else {
                    return fail("job received before setup".to_string());
                };

                Log::set_thread_scope(Some(
                    ExecutorContext {
                        executor_id,
                        task_id: task.id,
                    }
                    .to_string(),
                ));
                let result =
                    panic::catch_unwind(AssertUnwindSafe(|| state.run(executor_id, &task)));
                Log::set_thread_scope(None);

                match result {
                    Ok(Ok(baked)) => {
                        if let Some(baked) = baked {
                            if responses.send(baked).is_err() {
                                return;
                            }
                        }
                        let finished = ExecutorResponse::Finished {
                            executor_id,
                            task_id: task.id,
                        };
                        if responses.send(finished).is_err() {
                            return;
                        }
                    }
                    Ok(Err(e)) => return fail(e.to_string()),
                    Err(payload) => return fail(panic_reason(payload)),
                }
            }
            ExecutorMessage::SyncLightmaps(lightmaps) => {
                if let Some(state) = state.as_mut() {
                    state.previous = lightmaps;
                }
            }
            ExecutorMessage::Shutdown => break,
        }
    }
}
