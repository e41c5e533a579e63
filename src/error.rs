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

use lightbake_math::rectpack::PackError;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Every failure a bake can report. Configuration problems are detected before any mesh is
/// touched, the rest abort a running bake.
#[derive(Debug)]
pub enum BakeError {
    /// Two-pass method supports up to two passes.
    InvalidPassCount(u32),
    /// Path tracing cannot run on isolated executors.
    PathTracingInParallelMode,
    /// Parallel mode requested, but the platform cannot spawn executor threads.
    ParallelUnavailable,
    /// Selected backend was compiled out. Holds the name of the cargo feature that enables it.
    BackendUnavailable(&'static str),
    /// Face-level jobs are reserved, but not implemented.
    UnsupportedTaskGranularity,
    /// Any other invalid option value.
    InvalidConfig(String),
    /// Atlas packer was unable to place faces of a mesh.
    PackingFailed { mesh: Uuid, reason: PackError },
    /// An executor panicked or returned an error, the bake is aborted.
    ExecutorFailed { executor_id: usize, reason: String },
    Io(std::io::Error),
    Ron(ron::Error),
    RonSpanned(ron::error::SpannedError),
    Image(image::ImageError),
}

impl Display for BakeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BakeError::InvalidPassCount(count) => {
                write!(f, "Two-pass method pass count must be in [0; 2], got {count}.")
            }
            BakeError::PathTracingInParallelMode => {
                write!(f, "Path tracing cannot be used in parallel execution mode.")
            }
            BakeError::ParallelUnavailable => {
                write!(f, "Parallel execution is not available on this platform.")
            }
            BakeError::BackendUnavailable(feature) => {
                write!(
                    f,
                    "Selected backend is unavailable, rebuild with `{feature}` feature enabled."
                )
            }
            BakeError::UnsupportedTaskGranularity => {
                write!(f, "Face-level task granularity is not supported.")
            }
            BakeError::InvalidConfig(reason) => write!(f, "Invalid configuration: {reason}."),
            BakeError::PackingFailed { mesh, reason } => {
                write!(f, "Unable to pack UV atlas of mesh {mesh}: {reason}.")
            }
            BakeError::ExecutorFailed {
                executor_id,
                reason,
            } => write!(f, "Executor {executor_id} failed: {reason}."),
            BakeError::Io(e) => write!(f, "Io error: {e}"),
            BakeError::Ron(e) => write!(f, "Serialization error: {e}"),
            BakeError::RonSpanned(e) => write!(f, "Deserialization error: {e}"),
            BakeError::Image(e) => write!(f, "Image error: {e}"),
        }
    }
}

impl std::error::Error for BakeError {}

impl From<std::io::Error> for BakeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ron::Error> for BakeError {
    fn from(e: ron::Error) -> Self {
        Self::Ron(e)
    }
}

impl From<ron::error::SpannedError> for BakeError {
    fn from(e: ron::error::SpannedError) -> Self {
        Self::RonSpanned(e)
    }
}

impl From<image::ImageError> for BakeError {
    fn from(e: image::ImageError) -> Self {
        Self::Image(e)
    }
}
