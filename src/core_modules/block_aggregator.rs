// THEORY:
// The block aggregator is the reporting layer. Pixel masks are too fine and too
// noisy to hand to an operator, so the frame is cut into a regular grid of
// non-overlapping blocks (8x8 by default) and each block is judged as a whole:
//
// 1.  **Spatial Pooling**: every block counts how many of its cells are set in
//     the confirmed mask.
// 2.  **Majority Vote**: a block is flagged when strictly more than half of its
//     cells are set. Blocks on the right and bottom edge may be clipped; they
//     vote against their own, smaller pixel count.
// 3.  **Annotation**: flagged blocks are outlined with a 1-pixel rectangle from
//     the block's top-left corner to top-left + block size, on a copy of the
//     frame. The input frame is never modified, so flame and smoke passes can
//     be chained, each drawing onto the previous pass's output.
//
// Blocks are recomputed every frame; nothing here carries state.

use crate::core_modules::frame::Frame;
use crate::core_modules::mask_filter::Mask;
use crate::core_modules::pixel::pixel::Bgr;
use crate::error::{DetectionError, Result};
use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

pub const DEFAULT_BLOCK_SIZE: u32 = 8;

/// A point on the pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// One grid cell of the block partition and its vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub top_left: Point,
    /// Width in pixels after clipping to the frame.
    pub width: u32,
    /// Height in pixels after clipping to the frame.
    pub height: u32,
    /// The unclipped grid spacing.
    pub size: u32,
    /// Number of set mask cells inside the block.
    pub set_count: u32,
}

impl Block {
    pub fn pixel_count(&self) -> u32 {
        self.width * self.height
    }

    /// Strictly more than half of the block's cells are set.
    pub fn is_flagged(&self) -> bool {
        self.set_count * 2 > self.pixel_count()
    }

    /// Opposite rectangle corner used for drawing. May lie outside the frame.
    pub fn bottom_right(&self) -> Point {
        Point {
            x: self.top_left.x.saturating_add(self.size),
            y: self.top_left.y.saturating_add(self.size),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BlockAggregator {
    block_size: u32,
}

impl Default for BlockAggregator {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl BlockAggregator {
    pub fn new(block_size: u32) -> Result<Self> {
        if block_size == 0 {
            return Err(DetectionError::InvalidConfig("block size must be positive".into()));
        }
        Ok(Self { block_size })
    }

    /// Every block of the partition with its set-cell count, row by row.
    pub fn blocks(&self, mask: &Mask) -> Vec<Block> {
        let (width, height) = mask.dimensions();
        let size = self.block_size;
        let capacity = width.div_ceil(size) as usize * height.div_ceil(size) as usize;
        let mut blocks = Vec::with_capacity(capacity);

        for y in (0..height).step_by(size as usize) {
            for x in (0..width).step_by(size as usize) {
                let block_width = size.min(width - x);
                let block_height = size.min(height - y);

                let mut set_count = 0;
                for row in y..y + block_height {
                    for col in x..x + block_width {
                        if mask.get_pixel(col, row).0[0] != 0 {
                            set_count += 1;
                        }
                    }
                }

                blocks.push(Block {
                    top_left: Point { x, y },
                    width: block_width,
                    height: block_height,
                    size,
                    set_count,
                });
            }
        }
        blocks
    }

    /// Only the blocks that win the majority vote.
    pub fn flagged_blocks(&self, mask: &Mask) -> Vec<Block> {
        self.blocks(mask)
            .into_iter()
            .filter(Block::is_flagged)
            .collect()
    }

    /// Returns a copy of `frame` with each block outlined in `color`.
    ///
    /// Rectangle edges that fall past the frame are not drawn.
    pub fn draw(&self, frame: &Frame, blocks: &[Block], color: Bgr) -> Frame {
        let mut annotated = frame.clone();
        for block in blocks {
            let Point { x, y } = block.top_left;
            if x >= frame.width() || y >= frame.height() {
                continue;
            }
            // Spans stop one past the frame so off-frame edges stay undrawn.
            let span_x = block.size.min(frame.width() - x).saturating_add(1);
            let span_y = block.size.min(frame.height() - y).saturating_add(1);
            let rect = Rect::at(x as i32, y as i32).of_size(span_x, span_y);
            draw_hollow_rect_mut(annotated.as_image_mut(), rect, Rgb(color.to_array()));
        }
        annotated
    }

    /// Flags blocks of `mask` and outlines them on a copy of `frame`.
    pub fn aggregate(&self, frame: &Frame, mask: &Mask, color: Bgr) -> Result<(Frame, Vec<Block>)> {
        if mask.dimensions() != frame.dimensions() {
            return Err(DetectionError::ShapeMismatch {
                expected_width: frame.width(),
                expected_height: frame.height(),
                actual_width: mask.width(),
                actual_height: mask.height(),
            });
        }
        let flagged = self.flagged_blocks(mask);
        let annotated = self.draw(frame, &flagged, color);
        Ok((annotated, flagged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::mask_filter::MASK_SET;
    use crate::core_modules::pixel::pixel::{FLAME_COLOR, Pixel, SMOKE_COLOR};
    use image::Luma;

    fn mask_with_cells_set(size: u32, count: u32) -> Mask {
        let mut mask = Mask::new(size, size);
        for i in 0..count {
            mask.put_pixel(i % 8, i / 8, Luma([MASK_SET]));
        }
        mask
    }

    #[test]
    fn exactly_half_is_not_flagged() {
        let mask = mask_with_cells_set(16, 32);
        let aggregator = BlockAggregator::default();
        assert!(aggregator.flagged_blocks(&mask).is_empty());

        let blocks = aggregator.blocks(&mask);
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].set_count, 32);
    }

    #[test]
    fn one_more_than_half_is_flagged() {
        let mask = mask_with_cells_set(16, 33);
        let flagged = BlockAggregator::default().flagged_blocks(&mask);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].top_left, Point { x: 0, y: 0 });
        assert_eq!(flagged[0].bottom_right(), Point { x: 8, y: 8 });
    }

    #[test]
    fn clipped_edge_blocks_vote_on_their_own_size() {
        // 12x12: the right column of blocks is 4 pixels wide (32 cells).
        let mut mask = Mask::new(12, 12);
        for i in 0..17 {
            mask.put_pixel(8 + i % 4, i / 4, Luma([MASK_SET]));
        }
        let flagged = BlockAggregator::default().flagged_blocks(&mask);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].top_left, Point { x: 8, y: 0 });
        assert_eq!(flagged[0].pixel_count(), 32);
    }

    #[test]
    fn annotation_draws_outline_on_copy() {
        let frame = Frame::black(16, 16).unwrap();
        let mask = mask_with_cells_set(16, 64);
        let (annotated, flagged) = BlockAggregator::default()
            .aggregate(&frame, &mask, FLAME_COLOR)
            .unwrap();

        assert_eq!(flagged.len(), 1);
        assert_eq!(annotated.pixel(0, 0), FLAME_COLOR);
        assert_eq!(annotated.pixel(8, 8), FLAME_COLOR);
        assert_eq!(annotated.pixel(8, 3), FLAME_COLOR);
        assert_eq!(annotated.pixel(4, 4), Pixel::default());
        assert_eq!(annotated.pixel(9, 9), Pixel::default());
        assert!(frame.pixels().all(|p| p.is_black()));
    }

    #[test]
    fn passes_compose() {
        let frame = Frame::black(16, 16).unwrap();
        let aggregator = BlockAggregator::default();

        let flame = mask_with_cells_set(16, 64);
        let mut smoke = Mask::new(16, 16);
        for y in 8..16 {
            for x in 8..16 {
                smoke.put_pixel(x, y, Luma([MASK_SET]));
            }
        }

        let (first, _) = aggregator.aggregate(&frame, &flame, FLAME_COLOR).unwrap();
        let (second, _) = aggregator.aggregate(&first, &smoke, SMOKE_COLOR).unwrap();
        assert_eq!(second.pixel(0, 0), FLAME_COLOR);
        assert_eq!(second.pixel(15, 8), SMOKE_COLOR);
        assert_eq!(second.pixel(3, 8), FLAME_COLOR);
    }

    #[test]
    fn outline_is_clipped_at_frame_edge() {
        let frame = Frame::black(12, 12).unwrap();
        let mask = Mask::from_pixel(12, 12, Luma([MASK_SET]));
        let (annotated, flagged) = BlockAggregator::default()
            .aggregate(&frame, &mask, SMOKE_COLOR)
            .unwrap();
        assert_eq!(flagged.len(), 4);
        assert_eq!(annotated.pixel(11, 8), SMOKE_COLOR);
    }

    #[test]
    fn zero_block_size_is_rejected() {
        assert!(matches!(
            BlockAggregator::new(0),
            Err(DetectionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn oversized_block_covers_whole_frame() {
        let aggregator = BlockAggregator::new(u32::MAX).unwrap();
        let frame = Frame::black(6, 4).unwrap();
        let mask = Mask::from_pixel(6, 4, Luma([MASK_SET]));

        let (annotated, flagged) = aggregator.aggregate(&frame, &mask, FLAME_COLOR).unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].pixel_count(), 24);
        assert_eq!(flagged[0].bottom_right(), Point { x: u32::MAX, y: u32::MAX });
        assert_eq!(annotated.pixel(0, 0), FLAME_COLOR);
        assert_eq!(annotated.pixel(5, 0), FLAME_COLOR);
        assert_eq!(annotated.pixel(5, 3), Pixel::default());
    }

    #[test]
    fn rejects_mismatched_mask() {
        let frame = Frame::black(16, 16).unwrap();
        let mask = Mask::new(8, 8);
        assert!(BlockAggregator::default().aggregate(&frame, &mask, FLAME_COLOR).is_err());
    }
}
