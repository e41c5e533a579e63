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

//! Growing rectangle packer.
//!
//! Packing starts with a 1x1 bin. Free space inside the bin is managed by a binary split tree:
//! a free node that receives a rectangle is split into two nodes, the split axis is chosen so the
//! bigger leftover stays in one piece. When no free node can hold the next rectangle, the bin is
//! doubled along its shorter side and the new half becomes another free root. Rectangles should be
//! fed in descending height order to keep waste low.

use crate::Rect;
use nalgebra::Scalar;
use num_traits::{NumAssign, One, Zero};
use std::fmt::{Display, Formatter};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PackError {
    /// The bin was doubled `growths` times and the rectangle still does not fit.
    GrowthLimitReached { growths: usize },
    /// Rectangle has negative or non-comparable (NaN) size.
    InvalidSize,
}

impl Display for PackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PackError::GrowthLimitReached { growths } => {
                write!(f, "bin growth limit reached after {growths} growths")
            }
            PackError::InvalidSize => write!(f, "rectangle has invalid size"),
        }
    }
}

impl std::error::Error for PackError {}

#[derive(Copy, Clone, Debug, PartialEq)]
struct PackNode<T>
where
    T: NumAssign + Scalar + PartialOrd + Copy,
{
    bounds: Rect<T>,
    filled: bool,
    split: bool,
    left: usize,
    right: usize,
}

impl<T> PackNode<T>
where
    T: NumAssign + Scalar + PartialOrd + Copy,
{
    fn new(bounds: Rect<T>) -> Self {
        Self {
            bounds,
            filled: false,
            split: false,
            left: 0,
            right: 0,
        }
    }
}

/// See module docs.
pub struct GrowingPacker<T>
where
    T: NumAssign + Scalar + PartialOrd + Copy,
{
    nodes: Vec<PackNode<T>>,
    roots: Vec<usize>,
    width: T,
    height: T,
    growths: usize,
    growth_limit: usize,
    unvisited: Vec<usize>,
}

impl<T> GrowingPacker<T>
where
    T: NumAssign + Scalar + PartialOrd + Copy,
{
    /// Creates a packer with a 1x1 bin that may be doubled at most `growth_limit` times.
    pub fn new(growth_limit: usize) -> Self {
        let root = PackNode::new(Rect::new(T::zero(), T::zero(), T::one(), T::one()));
        Self {
            nodes: vec![root],
            roots: vec![0],
            width: T::one(),
            height: T::one(),
            growths: 0,
            growth_limit,
            unvisited: Default::default(),
        }
    }

    #[inline]
    pub fn width(&self) -> T {
        self.width
    }

    #[inline]
    pub fn height(&self) -> T {
        self.height
    }

    #[inline]
    pub fn growths(&self) -> usize {
        self.growths
    }

    /// Places a rectangle of the given size, growing the bin when needed.
    pub fn pack(&mut self, w: T, h: T) -> Result<Rect<T>, PackError> {
        if !(w >= T::zero() && h >= T::zero()) {
            return Err(PackError::InvalidSize);
        }
        loop {
            if let Some(rect) = self.find_free(w, h) {
                return Ok(rect);
            }
            if self.growths >= self.growth_limit {
                return Err(PackError::GrowthLimitReached {
                    growths: self.growths,
                });
            }
            self.grow();
        }
    }

    fn grow(&mut self) {
        let strip = if self.width <= self.height {
            let strip = Rect::new(self.width, T::zero(), self.width, self.height);
            self.width += self.width;
            strip
        } else {
            let strip = Rect::new(T::zero(), self.height, self.width, self.height);
            self.height += self.height;
            strip
        };
        self.roots.push(self.nodes.len());
        self.nodes.push(PackNode::new(strip));
        self.growths += 1;
    }

    fn spawn(&mut self, bounds: Rect<T>) -> usize {
        self.nodes.push(PackNode::new(bounds));
        self.nodes.len() - 1
    }

    fn find_free(&mut self, w: T, h: T) -> Option<Rect<T>> {
        self.unvisited.clear();
        self.unvisited.extend(self.roots.iter().rev());

        while let Some(node_index) = self.unvisited.pop() {
            let node = self.nodes[node_index];
            if node.split {
                self.unvisited.push(node.right);
                self.unvisited.push(node.left);
            } else if !node.filled && node.bounds.w() >= w && node.bounds.h() >= h {
                if node.bounds.w() == w && node.bounds.h() == h {
                    self.nodes[node_index].filled = true;
                    return Some(node.bounds);
                }

                let bounds = node.bounds;
                let (left_bounds, right_bounds) = if bounds.w() - w > bounds.h() - h {
                    (
                        Rect::new(bounds.x(), bounds.y(), w, bounds.h()),
                        Rect::new(bounds.x() + w, bounds.y(), bounds.w() - w, bounds.h()),
                    )
                } else {
                    (
                        Rect::new(bounds.x(), bounds.y(), bounds.w(), h),
                        Rect::new(bounds.x(), bounds.y() + h, bounds.w(), bounds.h() - h),
                    )
                };

                let left = self.spawn(left_bounds);
                let right = self.spawn(right_bounds);

                let node = &mut self.nodes[node_index];
                node.split = true;
                node.left = left;
                node.right = right;

                self.unvisited.push(left);
            }
        }

        None
    }
}

/// Number of bin doublings that is enough to pack rectangles with the given total area and
/// longest side. Logarithmic in the area, with headroom for split-tree fragmentation.
pub fn growth_budget(total_area: f32, max_side: f32) -> usize {
    let needed = 4.0 * (total_area + max_side * max_side);
    let log = if needed > 1.0 {
        needed.log2().ceil() as usize
    } else {
        0
    };
    2 * log + 16
}
