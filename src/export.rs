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

//! Bake results and their on-disk layout.
//!
//! ```text
//! <dir>/config.ron
//! <dir>/<mesh uuid>/lightmap.rgba   raw RGBA8 texels, rows top to bottom
//! <dir>/<mesh uuid>/lightmap.png
//! <dir>/<mesh uuid>/uv.ron
//! <dir>/<mesh uuid>/baking.ron
//! ```

use crate::{
    config::BakeConfig,
    error::BakeError,
    info,
    lightmap::Lightmap,
    uvgen::{AtlasRect, UvLayout},
};
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::Write, path::Path};
use uuid::Uuid;

/// Per-mesh baking parameters as they were used by the bake.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BakingMetadata {
    pub bake_me: bool,
    pub intersect_me: bool,
    pub face_begin: usize,
    pub face_end: usize,
    pub texture_width: u32,
    pub texture_height: u32,
    pub atlas: Option<Vec<AtlasRect>>,
}

pub struct BakedMesh {
    pub id: Uuid,
    pub name: String,
    pub layout: UvLayout,
    pub lightmap: Lightmap,
    pub metadata: BakingMetadata,
}

impl BakedMesh {
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<(), BakeError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        File::create(dir.join("lightmap.rgba"))?.write_all(self.lightmap.pixels())?;
        self.lightmap.save_png(dir.join("lightmap.png"))?;
        save_ron(dir.join("uv.ron"), &self.layout)?;
        save_ron(dir.join("baking.ron"), &self.metadata)?;
        Ok(())
    }
}

fn save_ron<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<(), BakeError> {
    let file = File::create(path)?;
    ron::ser::to_writer_pretty(file, value, PrettyConfig::default())?;
    Ok(())
}

/// Result of a bake: one entry per baked mesh, in scene order.
pub struct BakeOutput {
    pub config: BakeConfig,
    pub meshes: Vec<BakedMesh>,
}

impl BakeOutput {
    pub fn mesh(&self, id: Uuid) -> Option<&BakedMesh> {
        self.meshes.iter().find(|m| m.id == id)
    }

    /// Writes the configuration and every baked mesh into `dir`, creating it when needed.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<(), BakeError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        self.config.save(dir.join("config.ron"))?;
        for mesh in self.meshes.iter() {
            mesh.save(dir.join(mesh.id.to_string()))?;
        }
        info!("{} lightmaps saved to {}.", self.meshes.len(), dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        config::ExecutionMode,
        scheduler::test::{bake, three_quads, two_pass_config},
    };

    #[test]
    fn output_is_written_to_disk() {
        let (output, _) = bake(three_quads(), two_pass_config(ExecutionMode::Synchronous));
        let dir = std::env::temp_dir().join(format!("lightbake-export-{}", Uuid::new_v4()));
        output.save(&dir).unwrap();

        assert_eq!(BakeConfig::load(dir.join("config.ron")).unwrap(), output.config);
        for mesh in output.meshes.iter() {
            let mesh_dir = dir.join(mesh.id.to_string());
            let raw = std::fs::read(mesh_dir.join("lightmap.rgba")).unwrap();
            assert_eq!(raw, mesh.lightmap.pixels());
            assert!(mesh_dir.join("lightmap.png").exists());

            let uv: UvLayout =
                ron::de::from_reader(File::open(mesh_dir.join("uv.ron")).unwrap()).unwrap();
            assert_eq!(uv.uvs.len(), mesh.layout.uvs.len());
            let metadata: BakingMetadata =
                ron::de::from_reader(File::open(mesh_dir.join("baking.ron")).unwrap()).unwrap();
            assert_eq!(metadata.texture_width, 16);
            assert_eq!(metadata.face_end, 2);
        }

        std::fs::remove_dir_all(dir).unwrap();
    }
}
