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

use crate::error::BakeError;
use nalgebra::{Vector2, Vector3};
use std::path::Path;

/// RGBA8 texel buffer of a single mesh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lightmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Lightmap {
    /// Creates a transparent black lightmap.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Wraps existing pixels. Returns `None` if buffer size does not match.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        (pixels.len() == width as usize * height as usize * 4).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Byte offset of a texel, `None` when the texel is outside of the map.
    #[inline]
    pub fn texel_offset(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            None
        } else {
            Some((y as usize * self.width as usize + x as usize) * 4)
        }
    }

    /// Writes an opaque color, channels are clamped to `[0; 1]`. Writes outside of the map are
    /// dropped, the return value tells whether the texel was written.
    pub fn write(&mut self, x: i64, y: i64, color: Vector3<f32>) -> bool {
        match self.texel_offset(x, y) {
            Some(i) => {
                for (k, c) in color.iter().enumerate() {
                    self.pixels[i + k] = (c.clamp(0.0, 1.0) * 255.0).round() as u8;
                }
                self.pixels[i + 3] = 255;
                true
            }
            None => false,
        }
    }

    /// Color of a texel in `[0; 1]`.
    pub fn read(&self, x: i64, y: i64) -> Option<Vector3<f32>> {
        self.texel_offset(x, y).map(|i| {
            Vector3::new(
                self.pixels[i] as f32 / 255.0,
                self.pixels[i + 1] as f32 / 255.0,
                self.pixels[i + 2] as f32 / 255.0,
            )
        })
    }

    /// Nearest texel at lightmap UV coordinates, clamped to the map edges.
    pub fn sample(&self, uv: Vector2<f32>) -> Vector3<f32> {
        let x = (uv.x * self.width as f32).floor() as i64;
        let y = (uv.y * self.height as f32).floor() as i64;
        let x = x.clamp(0, self.width as i64 - 1);
        let y = y.clamp(0, self.height as i64 - 1);
        self.read(x, y).unwrap_or_else(Vector3::zeros)
    }

    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), BakeError> {
        image::save_buffer(
            path,
            &self.pixels,
            self.width,
            self.height,
            image::ColorType::Rgba8,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn out_of_range_writes_are_dropped() {
        let mut lightmap = Lightmap::new(4, 2);
        let before = lightmap.clone();
        assert!(!lightmap.write(-1, 0, Vector3::repeat(1.0)));
        assert!(!lightmap.write(4, 0, Vector3::repeat(1.0)));
        assert!(!lightmap.write(0, 2, Vector3::repeat(1.0)));
        assert_eq!(lightmap, before);
    }

    #[test]
    fn first_texel_is_writable() {
        let mut lightmap = Lightmap::new(2, 2);
        assert!(lightmap.write(0, 0, Vector3::new(1.0, 0.5, 2.0)));
        assert_eq!(&lightmap.pixels()[0..4], &[255, 128, 255, 255]);
        let color = lightmap.read(0, 0).unwrap();
        assert_eq!(color.x, 1.0);
    }

    #[test]
    fn sample_clamps_to_edges() {
        let mut lightmap = Lightmap::new(2, 1);
        lightmap.write(1, 0, Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(lightmap.sample(Vector2::new(0.9, 0.5)), Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(lightmap.sample(Vector2::new(1.0, 1.0)), Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(lightmap.sample(Vector2::new(0.1, 0.5)), Vector3::zeros());
    }

    #[test]
    fn pixel_buffer_size_is_checked() {
        assert!(Lightmap::from_pixels(2, 2, vec![0; 16]).is_some());
        assert!(Lightmap::from_pixels(2, 2, vec![0; 15]).is_none());
    }
}
