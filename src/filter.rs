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

//! Convolution filters that smooth baked lightmaps.

use crate::{config::PostFilter, lightmap::Lightmap};

/// Square convolution kernel with odd side length.
#[derive(Clone, Debug, PartialEq)]
pub struct Kernel {
    size: usize,
    weights: Vec<f32>,
}

impl Kernel {
    pub fn box3x3() -> Self {
        Self {
            size: 3,
            #[rustfmt::skip]
            weights: vec![
                0.075, 0.125, 0.075,
                0.125, 0.200, 0.125,
                0.075, 0.125, 0.075,
            ],
        }
    }

    /// Normalized gaussian kernel of `size` (odd) with given `sigma`, centered at the middle texel.
    pub fn gauss(size: usize, sigma: f32) -> Self {
        let size = size | 1;
        let center = (size / 2) as f32;
        let mut weights = Vec::with_capacity(size * size);
        for y in 0..size {
            for x in 0..size {
                let dx = (x as f32 - center) / sigma;
                let dy = (y as f32 - center) / sigma;
                weights.push((-0.5 * (dx * dx + dy * dy)).exp());
            }
        }
        let sum = weights.iter().sum::<f32>();
        weights.iter_mut().for_each(|w| *w /= sum);
        Self { size, weights }
    }

    pub fn for_filter(filter: PostFilter) -> Option<Self> {
        match filter {
            PostFilter::None => None,
            PostFilter::Box => Some(Self::box3x3()),
            PostFilter::Gauss => Some(Self::gauss(5, 1.0)),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn radius(&self) -> usize {
        self.size / 2
    }

    pub fn weight(&self, x: usize, y: usize) -> f32 {
        self.weights[y * self.size + x]
    }
}

/// Convolves RGB channels of the lightmap with the kernel. Texels closer to the border than the
/// kernel radius are copied as is, alpha is never changed.
pub fn apply(lightmap: &Lightmap, kernel: &Kernel) -> Lightmap {
    let (width, height) = (lightmap.width() as i64, lightmap.height() as i64);
    let radius = kernel.radius() as i64;
    let source = lightmap.pixels();
    let mut output = lightmap.clone();

    for y in radius..height - radius {
        for x in radius..width - radius {
            let mut rgb = [0.0f32; 3];
            for ky in -radius..=radius {
                for kx in -radius..=radius {
                    let Some(offset) = lightmap.texel_offset(x + kx, y + ky) else {
                        continue;
                    };
                    let w = kernel.weight((kx + radius) as usize, (ky + radius) as usize);
                    for (c, acc) in rgb.iter_mut().enumerate() {
                        *acc += source[offset + c] as f32 * w;
                    }
                }
            }
            if let Some(offset) = output.texel_offset(x, y) {
                let pixels = output.pixels_mut();
                for (c, value) in rgb.iter().enumerate() {
                    pixels[offset + c] = value.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }

    output
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn checker(size: u32) -> Lightmap {
        let mut map = Lightmap::new(size, size);
        for y in 0..size as i64 {
            for x in 0..size as i64 {
                let v = if (x + y) % 2 == 0 { 1.0 } else { 0.0 };
                map.write(x, y, nalgebra::Vector3::repeat(v));
            }
        }
        map
    }

    #[test]
    fn kernels_are_normalized() {
        for kernel in [Kernel::box3x3(), Kernel::gauss(5, 1.0)] {
            let sum = kernel.weights.iter().sum::<f32>();
            assert_relative_eq!(sum, 1.0, epsilon = 1.0e-5);
        }
    }

    #[test]
    fn gauss_kernel_is_symmetric_and_peaks_in_the_middle() {
        let kernel = Kernel::gauss(5, 1.0);
        assert_eq!(kernel.radius(), 2);
        for y in 0..5 {
            for x in 0..5 {
                assert_relative_eq!(kernel.weight(x, y), kernel.weight(4 - x, 4 - y));
                assert_relative_eq!(kernel.weight(x, y), kernel.weight(y, x));
                assert!(kernel.weight(x, y) <= kernel.weight(2, 2));
            }
        }
    }

    #[test]
    fn no_filter_for_none() {
        assert!(Kernel::for_filter(PostFilter::None).is_none());
        assert_eq!(Kernel::for_filter(PostFilter::Box).unwrap().size(), 3);
        assert_eq!(Kernel::for_filter(PostFilter::Gauss).unwrap().size(), 5);
    }

    #[test]
    fn uniform_map_is_unchanged() {
        let mut map = Lightmap::new(8, 8);
        map.pixels_mut()
            .chunks_mut(4)
            .for_each(|t| t.copy_from_slice(&[100, 150, 200, 255]));
        for filter in [PostFilter::Box, PostFilter::Gauss] {
            let kernel = Kernel::for_filter(filter).unwrap();
            assert_eq!(apply(&map, &kernel), map);
        }
    }

    #[test]
    fn borders_and_alpha_are_preserved() {
        let mut map = checker(9);
        // Transparent texel inside the filtered area.
        let offset = map.texel_offset(4, 4).unwrap();
        map.pixels_mut()[offset + 3] = 0;

        let kernel = Kernel::gauss(5, 1.0);
        let filtered = apply(&map, &kernel);
        for y in 0..9 {
            for x in 0..9 {
                let i = map.texel_offset(x, y).unwrap();
                let border = x < 2 || y < 2 || x >= 7 || y >= 7;
                if border {
                    assert_eq!(filtered.pixels()[i..i + 4], map.pixels()[i..i + 4]);
                } else {
                    assert_ne!(filtered.pixels()[i], map.pixels()[i]);
                }
                assert_eq!(filtered.pixels()[i + 3], map.pixels()[i + 3]);
            }
        }
    }

    #[test]
    fn box_filter_smooths_checker() {
        let filtered = apply(&checker(5), &Kernel::box3x3());
        let i = filtered.texel_offset(2, 2).unwrap();
        // Center and corners are white: 0.2 + 4 * 0.075 = 0.5.
        assert!((127..=128).contains(&filtered.pixels()[i]));
    }
}
