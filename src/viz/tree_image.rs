//! Raster rendering of a fitted decision tree.
//!
//! Layout is the classic recursive one: leaves claim evenly spaced
//! horizontal slots in left-to-right order, every split sits at the midpoint
//! of its children, and depth maps to the vertical axis. Edges are drawn
//! first so node boxes paint over them. Leaves are colored on a blue-orange
//! gradient over the tree's leaf-value range; split nodes stay gray.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::error::{Error, Result};
use crate::estimators::{DecisionTree, TreeNode};

pub const TREE_IMAGE_WIDTH: u32 = 1024;
pub const TREE_IMAGE_HEIGHT: u32 = 768;

const MARGIN: f32 = 24.0;
const NODE_WIDTH: f32 = 26.0;
const NODE_HEIGHT: f32 = 16.0;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const EDGE_COLOR: Rgb<u8> = Rgb([120, 120, 120]);
const SPLIT_FILL: Rgb<u8> = Rgb([210, 210, 210]);
const OUTLINE: Rgb<u8> = Rgb([60, 60, 60]);

/// A positioned node, ready to draw.
struct PlacedNode {
    x: f32,
    y: f32,
    leaf_value: Option<f64>,
    parent: Option<usize>,
}

fn leaf_count(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => leaf_count(left) + leaf_count(right),
    }
}

fn tree_depth(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 0,
        TreeNode::Split { left, right, .. } => 1 + tree_depth(left).max(tree_depth(right)),
    }
}

fn leaf_value_range(node: &TreeNode, min: &mut f64, max: &mut f64) {
    match node {
        TreeNode::Leaf { value, .. } => {
            *min = min.min(*value);
            *max = max.max(*value);
        }
        TreeNode::Split { left, right, .. } => {
            leaf_value_range(left, min, max);
            leaf_value_range(right, min, max);
        }
    }
}

/// Walk the tree, assigning slots to leaves and midpoints to splits.
/// Returns the placed node's x coordinate.
fn place(
    node: &TreeNode,
    depth: usize,
    next_slot: &mut usize,
    slot_width: f32,
    level_height: f32,
    parent: Option<usize>,
    placed: &mut Vec<PlacedNode>,
) -> f32 {
    let y = MARGIN + depth as f32 * level_height;
    match node {
        TreeNode::Leaf { value, .. } => {
            let x = MARGIN + (*next_slot as f32 + 0.5) * slot_width;
            *next_slot += 1;
            placed.push(PlacedNode {
                x,
                y,
                leaf_value: Some(*value),
                parent,
            });
            x
        }
        TreeNode::Split { left, right, .. } => {
            // Reserve our index before recursing so children can point at it.
            let index = placed.len();
            placed.push(PlacedNode {
                x: 0.0,
                y,
                leaf_value: None,
                parent,
            });
            let left_x = place(left, depth + 1, next_slot, slot_width, level_height, Some(index), placed);
            let right_x = place(right, depth + 1, next_slot, slot_width, level_height, Some(index), placed);
            let x = (left_x + right_x) / 2.0;
            placed[index].x = x;
            x
        }
    }
}

fn leaf_color(value: f64, min: f64, max: f64) -> Rgb<u8> {
    let t = if max > min {
        ((value - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        0.5
    };
    // Blue at the low end, orange at the high end
    let r = (60.0 + t * (235.0 - 60.0)) as u8;
    let g = (110.0 + t * (150.0 - 110.0)) as u8;
    let b = (220.0 - t * (220.0 - 40.0)) as u8;
    Rgb([r, g, b])
}

/// Render a fitted tree to a fixed-size image.
pub fn render_tree(tree: &DecisionTree) -> Result<RgbImage> {
    let root = tree.root().ok_or(Error::NotFitted)?;

    let leaves = leaf_count(root);
    let depth = tree_depth(root);
    let slot_width = (TREE_IMAGE_WIDTH as f32 - 2.0 * MARGIN) / leaves as f32;
    let level_height =
        (TREE_IMAGE_HEIGHT as f32 - 2.0 * MARGIN - NODE_HEIGHT) / depth.max(1) as f32;

    let mut placed = Vec::new();
    let mut next_slot = 0;
    place(root, 0, &mut next_slot, slot_width, level_height, None, &mut placed);

    let mut min_value = f64::INFINITY;
    let mut max_value = f64::NEG_INFINITY;
    leaf_value_range(root, &mut min_value, &mut max_value);

    let mut img = RgbImage::from_pixel(TREE_IMAGE_WIDTH, TREE_IMAGE_HEIGHT, BACKGROUND);

    for node in &placed {
        if let Some(parent) = node.parent {
            let p = &placed[parent];
            draw_line_segment_mut(&mut img, (p.x, p.y), (node.x, node.y), EDGE_COLOR);
        }
    }

    let half_w = NODE_WIDTH / 2.0;
    for node in &placed {
        let fill = match node.leaf_value {
            Some(value) => leaf_color(value, min_value, max_value),
            None => SPLIT_FILL,
        };
        let x0 = (node.x - half_w).max(0.0) as i32;
        let y0 = node.y.max(0.0) as i32;
        let rect = Rect::at(x0, y0).of_size(NODE_WIDTH as u32, NODE_HEIGHT as u32);
        draw_filled_rect_mut(&mut img, rect, fill);
        draw_hollow_rect_mut(&mut img, rect, OUTLINE);
    }

    Ok(img)
}

/// Encode an image as PNG and wrap it in standard base64.
pub fn encode_png_base64(img: &RgbImage) -> Result<String> {
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| Error::Render(format!("png encoding failed: {e}")))?;
    Ok(BASE64.encode(&buffer))
}
