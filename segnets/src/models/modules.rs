//! Layers shared by the segmentation models.

mod activation;
mod enet_blocks;
mod pyramid_pooling;
mod refine_blocks;
mod utils;

pub use activation::*;
pub use enet_blocks::*;
pub use pyramid_pooling::*;
pub use refine_blocks::*;
pub use utils::*;
