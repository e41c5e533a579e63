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

use clap::Parser;
use lightbake::{
    config::{BakingMethod, ExecutionMode, PostFilter, RaycasterBackend, UvMethod},
    err, info,
    log::{Log, MessageKind},
    BakeConfig, BakeError, BakeEvent, Baker, SceneSnapshot,
};
use std::{path::PathBuf, process::ExitCode, sync::mpsc::channel, thread};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Scene snapshot in RON format.
    #[clap(short, long, required_unless_present = "write_default_config")]
    scene: Option<PathBuf>,

    /// Bake configuration in RON format. Defaults are used when not set.
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Output folder.
    #[clap(short, long, default_value = "lightmaps")]
    out: PathBuf,

    /// Writes default configuration to given path and exits.
    #[clap(long)]
    write_default_config: Option<PathBuf>,

    #[clap(long)]
    width: Option<u32>,

    #[clap(long)]
    height: Option<u32>,

    /// uniform-uncentered, uniform-centered or packed.
    #[clap(long)]
    uv_method: Option<UvMethod>,

    /// two-pass or path-tracing.
    #[clap(long)]
    method: Option<BakingMethod>,

    #[clap(long)]
    samples: Option<u32>,

    #[clap(long)]
    depth: Option<u32>,

    /// linear or octree.
    #[clap(long)]
    raycaster: Option<RaycasterBackend>,

    /// synchronous, cooperative or parallel.
    #[clap(long)]
    mode: Option<ExecutionMode>,

    #[clap(long)]
    workers: Option<usize>,

    /// none, box or gauss.
    #[clap(long)]
    filter: Option<PostFilter>,

    #[clap(long)]
    seed: Option<u64>,

    /// Also writes the log into given file.
    #[clap(long)]
    log_file: Option<PathBuf>,

    /// Prints warnings and errors only.
    #[clap(short, long, default_value = "false")]
    quiet: bool,
}

impl Args {
    fn apply_overrides(&self, config: &mut BakeConfig) {
        macro_rules! set {
            ($($arg:ident => $field:ident),*) => {
                $(if let Some(value) = self.$arg.clone() {
                    config.$field = value;
                })*
            };
        }
        set!(
            width => texture_width,
            height => texture_height,
            uv_method => uv_method,
            method => baking_method,
            samples => samples,
            depth => path_tracing_depth,
            raycaster => raycaster,
            mode => execution_mode,
            workers => worker_limit,
            filter => post_filter
        );
        if self.seed.is_some() {
            config.seed = self.seed;
        }
    }
}

fn run(args: Args) -> Result<(), BakeError> {
    if let Some(path) = args.write_default_config.as_ref() {
        BakeConfig::default().save(path)?;
        info!("Default configuration written to {}.", path.display());
        return Ok(());
    }

    let Some(scene_path) = args.scene.as_ref() else {
        return Err(BakeError::InvalidConfig("scene path is not set".to_string()));
    };

    let mut config = match args.config.as_ref() {
        Some(path) => BakeConfig::load(path)?,
        None => BakeConfig::default(),
    };
    args.apply_overrides(&mut config);

    let scene = SceneSnapshot::load(scene_path)?;
    info!(
        "Scene {} loaded: {} meshes, {} lights.",
        scene_path.display(),
        scene.meshes.len(),
        scene.lights.len()
    );

    let (sender, receiver) = channel();
    let mut baker = Baker::new(scene, config)?;
    baker.add_listener(sender);

    let progress = thread::spawn(move || {
        for event in receiver {
            match event {
                BakeEvent::PhaseChanged(phase) => info!("{phase}"),
                BakeEvent::PassCompleted(pass) => info!("Pass {pass} completed."),
                _ => (),
            }
        }
    });

    let output = baker.run();
    // The baker is consumed by now, so the listener channel is closed.
    let _ = progress.join();

    output?.save(&args.out)
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(path) = args.log_file.as_ref() {
        Log::set_file_name(path);
    }
    if args.quiet {
        Log::set_verbosity(MessageKind::Warning);
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            err!("{e}");
            ExitCode::FAILURE
        }
    }
}
