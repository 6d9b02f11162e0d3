pub mod background;
pub mod block_aggregator;
pub mod color_classifier;
pub mod frame;
pub mod heat_map;
pub mod hsi;
pub mod mask_filter;
pub mod motion_gate;
pub mod pixel;

pub mod utils {
    pub mod image_helper;
}
