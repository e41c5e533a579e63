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

//! Loose triangle octree. Every leaf stores indices of triangles whose bounds touch the leaf, so a
//! triangle may be referenced by several leaves and query results may contain duplicates.

use crate::{aabb::AxisAlignedBoundingBox, ray::Ray};
use nalgebra::Vector3;

#[derive(Clone, Debug)]
pub enum OctreeNode {
    Leaf {
        indices: Vec<u32>,
        bounds: AxisAlignedBoundingBox,
    },
    Branch {
        bounds: AxisAlignedBoundingBox,
        leaves: [usize; 8],
    },
}

#[derive(Default, Clone, Debug)]
pub struct Octree {
    nodes: Vec<OctreeNode>,
    root: usize,
}

impl Octree {
    /// Builds the tree. A node is split while it holds more than `split_threshold` triangles.
    /// There is no depth limit: a child that would receive the same triangle set as its parent
    /// becomes a leaf, so the depth never exceeds the triangle count.
    pub fn new(triangles: &[[Vector3<f32>; 3]], split_threshold: usize) -> Self {
        if triangles.is_empty() {
            return Self::default();
        }

        let mut bounds = AxisAlignedBoundingBox::default();
        for triangle in triangles {
            for pt in triangle.iter() {
                bounds.add_point(*pt);
            }
        }

        // Flat scenes give zero-thickness bounds, give them some volume.
        let inflation = 2.0 * f32::EPSILON * (1.0 + bounds.size().amax());
        bounds.inflate(Vector3::repeat(inflation));

        let triangle_bounds = triangles
            .iter()
            .map(|t| AxisAlignedBoundingBox::from_points(t))
            .collect::<Vec<_>>();

        let indices = (0..triangles.len() as u32).collect::<Vec<_>>();

        let mut nodes = Vec::new();
        let root = build_recursive(&mut nodes, &triangle_bounds, bounds, indices, split_threshold);

        Self { nodes, root }
    }

    pub fn ray_query(&self, ray: &Ray, buffer: &mut Vec<u32>) {
        buffer.clear();
        if !self.nodes.is_empty() {
            self.ray_recursive_query(self.root, ray, buffer);
        }
    }

    fn ray_recursive_query(&self, node: usize, ray: &Ray, buffer: &mut Vec<u32>) {
        match &self.nodes[node] {
            OctreeNode::Leaf { indices, bounds } => {
                if !indices.is_empty() && ray.box_intersection(bounds).is_some() {
                    buffer.extend_from_slice(indices)
                }
            }
            OctreeNode::Branch { bounds, leaves } => {
                if ray.box_intersection(bounds).is_some() {
                    for leaf in leaves {
                        self.ray_recursive_query(*leaf, ray, buffer)
                    }
                }
            }
        }
    }

    pub fn nodes(&self) -> &[OctreeNode] {
        &self.nodes
    }

    /// Maximum distance from the root to a leaf, zero for empty tree or tree with single leaf.
    pub fn depth(&self) -> usize {
        fn depth_recursive(tree: &Octree, node: usize) -> usize {
            match &tree.nodes[node] {
                OctreeNode::Leaf { .. } => 0,
                OctreeNode::Branch { leaves, .. } => {
                    1 + leaves
                        .iter()
                        .map(|leaf| depth_recursive(tree, *leaf))
                        .max()
                        .unwrap_or_default()
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            depth_recursive(self, self.root)
        }
    }
}

fn build_recursive(
    nodes: &mut Vec<OctreeNode>,
    triangle_bounds: &[AxisAlignedBoundingBox],
    bounds: AxisAlignedBoundingBox,
    indices: Vec<u32>,
    split_threshold: usize,
) -> usize {
    if indices.len() <= split_threshold {
        let index = nodes.len();
        nodes.push(OctreeNode::Leaf { bounds, indices });
        return index;
    }

    let mut leaves = [0; 8];
    for (leaf, leaf_bounds) in leaves.iter_mut().zip(bounds.split()) {
        let leaf_indices = indices
            .iter()
            .copied()
            .filter(|i| triangle_bounds[*i as usize].is_intersects_aabb(&leaf_bounds))
            .collect::<Vec<_>>();

        *leaf = if leaf_indices.len() == indices.len() {
            let index = nodes.len();
            nodes.push(OctreeNode::Leaf {
                bounds: leaf_bounds,
                indices: leaf_indices,
            });
            index
        } else {
            build_recursive(
                nodes,
                triangle_bounds,
                leaf_bounds,
                leaf_indices,
                split_threshold,
            )
        };
    }

    let index = nodes.len();
    nodes.push(OctreeNode::Branch { leaves, bounds });
    index
}
