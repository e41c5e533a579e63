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

//! Single-threaded scheduler. Work is split into steps of one mesh each, so a host loop can
//! interleave its own work between steps (cooperative mode does exactly that).

use crate::{
    bake::BakeContext,
    config::ExecutionMode,
    filter::{self, Kernel},
    info,
    lightmap::Lightmap,
    renderer::Renderer,
    scheduler::{BakeEvent, EventSink, PassResults, Phase},
};
use fxhash::FxHashMap;
use std::time::Duration;

pub struct SequentialScheduler<'a> {
    ctx: &'a BakeContext,
    events: &'a mut EventSink,
    phase: Phase,
    bake_set: Vec<usize>,
    cursor: usize,
    pass_count: u32,
    /// Results of the last completed pass.
    previous: FxHashMap<usize, Lightmap>,
    current: FxHashMap<usize, Lightmap>,
    kernel: Option<Kernel>,
}

impl<'a> SequentialScheduler<'a> {
    pub fn new(ctx: &'a BakeContext, events: &'a mut EventSink) -> Self {
        Self {
            ctx,
            events,
            phase: Phase::Setup,
            bake_set: ctx.bake_set(),
            cursor: 0,
            pass_count: ctx.config.pass_count(),
            previous: Default::default(),
            current: Default::default(),
            kernel: Kernel::for_filter(ctx.config.post_filter),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.cursor = 0;
        self.events.phase(phase);
    }

    fn begin_pass(&mut self, pass: u32) {
        info!("Pass {pass} of {} for {} meshes.", self.pass_count, self.bake_set.len());
        self.set_phase(Phase::Pass(pass));
        self.events.emit(BakeEvent::PassStarted(pass));
    }

    fn finish_passes(&mut self) {
        self.events.emit(BakeEvent::AllPassesCompleted);
        if self.kernel.is_some() && !self.previous.is_empty() {
            self.set_phase(Phase::PostProcess);
        } else {
            self.phase = Phase::Done;
        }
    }

    /// Does one unit of work: renders one mesh for the current pass or filters one lightmap.
    /// Returns `false` when there is nothing left to do.
    pub fn step(&mut self) -> bool {
        match self.phase {
            Phase::Idle | Phase::Setup => {
                if self.pass_count == 0 {
                    info!("No lighting passes requested, only UV atlases were built.");
                    self.finish_passes();
                } else {
                    self.begin_pass(1);
                }
            }
            Phase::Pass(pass) => match self.bake_set.get(self.cursor).copied() {
                Some(mesh) => {
                    let rendered =
                        Renderer::new(self.ctx, Some(&self.previous)).render_mesh(mesh, pass);
                    self.current.insert(mesh, rendered.lightmap);
                    self.cursor += 1;
                    self.events.emit(BakeEvent::MeshBaked {
                        mesh: self.ctx.meshes[mesh].id,
                        pass,
                    });
                }
                None => {
                    // Barrier: the next pass reads results of this one for every mesh.
                    self.previous = std::mem::take(&mut self.current);
                    self.events.emit(BakeEvent::PassCompleted(pass));
                    if pass < self.pass_count {
                        self.begin_pass(pass + 1);
                    } else {
                        self.finish_passes();
                    }
                }
            },
            Phase::PostProcess => match self.bake_set.get(self.cursor).copied() {
                Some(mesh) => {
                    if let (Some(kernel), Some(lightmap)) =
                        (self.kernel.as_ref(), self.previous.get_mut(&mesh))
                    {
                        *lightmap = filter::apply(lightmap, kernel);
                        self.events
                            .emit(BakeEvent::MeshFiltered(self.ctx.meshes[mesh].id));
                    }
                    self.cursor += 1;
                }
                None => self.phase = Phase::Done,
            },
            Phase::Done => return false,
        }
        true
    }

    /// Runs all steps. In cooperative mode the thread sleeps for the configured delay and yields
    /// between steps.
    pub(crate) fn run(mut self) -> PassResults {
        let cooperative = self.ctx.config.execution_mode == ExecutionMode::Cooperative;
        let delay = self.ctx.config.cooperative_delay();
        while self.step() {
            if cooperative {
                if delay > Duration::ZERO {
                    std::thread::sleep(delay);
                }
                std::thread::yield_now();
            }
        }
        PassResults {
            lightmaps: self.previous,
            layouts: Default::default(),
        }
    }
}
