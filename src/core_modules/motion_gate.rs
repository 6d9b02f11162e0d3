// THEORY:
// The motion gate restricts color analysis to what is currently moving. It
// owns the background model, cleans the model's foreground mask with a median
// despeckle, and blacks out every pixel outside the cleaned mask. Static
// flame-colored or grey objects (a red wall, a concrete floor) therefore never
// reach the color rules.
//
// Each `gate` call advances the background model by one frame, so the
// pipeline calls it exactly once per frame.

use crate::core_modules::background::BackgroundModel;
use crate::core_modules::frame::Frame;
use crate::core_modules::mask_filter::{Mask, MaskFilter};
use crate::error::{DetectionError, Result};

/// Output of one gating step.
#[derive(Debug, Clone)]
pub struct GatedFrame {
    /// The frame with every non-moving pixel zeroed.
    pub frame: Frame,
    /// The despeckled foreground mask used for gating.
    pub motion_mask: Mask,
}

pub struct MotionGate<B: BackgroundModel> {
    background: B,
    aperture: u32,
}

impl<B: BackgroundModel> MotionGate<B> {
    pub fn new(background: B, aperture: u32) -> Self {
        Self {
            background,
            aperture,
        }
    }

    pub fn gate<F: MaskFilter + ?Sized>(
        &mut self,
        frame: &Frame,
        filter: &F,
    ) -> Result<GatedFrame> {
        let raw = self.background.apply(frame);
        if raw.dimensions() != frame.dimensions() {
            return Err(DetectionError::ForegroundMaskMismatch {
                expected_width: frame.width(),
                expected_height: frame.height(),
                actual_width: raw.width(),
                actual_height: raw.height(),
            });
        }

        let motion_mask = filter.despeckle(&raw, self.aperture);
        let gated = frame.masked(&motion_mask)?;
        Ok(GatedFrame {
            frame: gated,
            motion_mask,
        })
    }

    pub fn background(&self) -> &B {
        &self.background
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::background::MockBackgroundModel;
    use crate::core_modules::mask_filter::{ImageprocFilter, MASK_SET};
    use crate::core_modules::pixel::pixel::Pixel;
    use image::Luma;

    #[test]
    fn keeps_moving_region_only() {
        let model = MockBackgroundModel::with_pattern(|_, frame| {
            let mut mask = Mask::new(frame.width(), frame.height());
            for y in 0..4 {
                for x in 0..4 {
                    mask.put_pixel(x, y, Luma([MASK_SET]));
                }
            }
            mask
        });
        let mut gate = MotionGate::new(model, 3);
        let frame = Frame::filled(8, 8, Pixel::new(1, 2, 3)).unwrap();

        let gated = gate.gate(&frame, &ImageprocFilter).unwrap();
        assert_eq!(gated.frame.pixel(1, 1), Pixel::new(1, 2, 3));
        assert_eq!(gated.frame.pixel(6, 6), Pixel::default());
        assert_eq!(frame.pixel(6, 6), Pixel::new(1, 2, 3));
    }

    #[test]
    fn isolated_foreground_speck_is_dropped() {
        let model = MockBackgroundModel::with_pattern(|_, frame| {
            let mut mask = Mask::new(frame.width(), frame.height());
            mask.put_pixel(4, 4, Luma([MASK_SET]));
            mask
        });
        let mut gate = MotionGate::new(model, 3);
        let frame = Frame::filled(8, 8, Pixel::new(9, 9, 9)).unwrap();

        let gated = gate.gate(&frame, &ImageprocFilter).unwrap();
        assert!(gated.frame.pixels().all(|p| p.is_black()));
    }

    #[test]
    fn advances_background_once_per_call() {
        let mut gate = MotionGate::new(MockBackgroundModel::new(), 3);
        let frame = Frame::black(4, 4).unwrap();
        for _ in 0..3 {
            gate.gate(&frame, &ImageprocFilter).unwrap();
        }
        assert_eq!(gate.background().frames_seen(), 3);
    }

    #[test]
    fn rejects_wrongly_sized_foreground() {
        let model = MockBackgroundModel::with_pattern(|_, _| Mask::new(2, 2));
        let mut gate = MotionGate::new(model, 3);
        let frame = Frame::black(4, 4).unwrap();
        assert!(matches!(
            gate.gate(&frame, &ImageprocFilter),
            Err(DetectionError::ForegroundMaskMismatch { .. })
        ));
    }
}
