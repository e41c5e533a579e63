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

//! CPU lightmap baker.
//!
//! Takes a read-only [`scene::SceneSnapshot`] (meshes, materials, lights) and a
//! [`config::BakeConfig`], builds a lightmap UV atlas for every mesh and computes texel colors with
//! direct lighting and either a two-pass gather or a path tracer. See [`scheduler::Baker`] for the
//! entry point.

#![allow(clippy::too_many_arguments)]

pub mod bake;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod light;
pub mod lightmap;
pub mod log;
pub mod oracle;
pub mod renderer;
pub mod scene;
pub mod scheduler;
pub mod uvgen;

#[doc(inline)]
pub use lightbake_math as math;

pub use config::BakeConfig;
pub use error::BakeError;
pub use export::BakeOutput;
pub use scene::SceneSnapshot;
pub use scheduler::{BakeEvent, Baker, Phase};
