//! Rendering of fitted estimators for the graph endpoints.

pub mod tree_image;

pub use tree_image::{encode_png_base64, render_tree, TREE_IMAGE_HEIGHT, TREE_IMAGE_WIDTH};
