//! Layout operators: the depth-to-space engine and the pixel-shuffle reference it is checked
//! against.

pub mod depth_to_space;
pub mod pixel_shuffle;
