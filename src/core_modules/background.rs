// THEORY:
// Background subtraction is the first gate of the detector: color rules only
// ever look at pixels that are currently moving. The detector treats the
// background model as an opaque, stateful capability with one method,
// `apply(frame) -> foreground mask`, so any algorithm can be plugged in.
//
// Statefulness is the key contract. A model learns from every frame it sees,
// so it must be fed every frame exactly once and in order. Skipping or
// replaying frames makes its statistics drift away from the real scene.
//
// Two implementations ship with the crate:
// 1.  `RunningGaussianModel`: an adaptive per-pixel Gaussian. Each pixel keeps
//     a running B, G, R mean and one shared variance. A pixel is foreground
//     when its squared Mahalanobis distance to the mean exceeds the variance
//     threshold. The learning rate starts at 1 and settles at 1/history, so the
//     model converges quickly at start-up and then adapts slowly, like the
//     single-component case of a Gaussian mixture model.
// 2.  `MockBackgroundModel`: a deterministic double driven by a closure, used
//     in tests and for replaying synthetic scenes.

use crate::core_modules::frame::Frame;
use crate::core_modules::mask_filter::{MASK_SET, Mask, mask_from_predicate};
use image::Luma;
use tracing::{debug, warn};

/// A stateful foreground/background segmenter.
pub trait BackgroundModel: Send {
    /// Learns from `frame` and returns its foreground mask, same size as the frame.
    fn apply(&mut self, frame: &Frame) -> Mask;
}

impl<B: BackgroundModel + ?Sized> BackgroundModel for Box<B> {
    fn apply(&mut self, frame: &Frame) -> Mask {
        (**self).apply(frame)
    }
}

/// Tuning for `RunningGaussianModel`.
#[derive(Debug, Clone)]
pub struct GaussianModelConfig {
    /// Number of frames the learning rate averages over once warmed up.
    pub history: u32,
    /// Squared Mahalanobis distance above which a pixel is foreground.
    pub variance_threshold: f32,
    pub initial_variance: f32,
    pub min_variance: f32,
    pub max_variance: f32,
}

impl Default for GaussianModelConfig {
    fn default() -> Self {
        Self {
            history: 500,
            variance_threshold: 16.0,
            initial_variance: 15.0,
            min_variance: 4.0,
            max_variance: 75.0,
        }
    }
}

/// Adaptive single-Gaussian background model.
pub struct RunningGaussianModel {
    config: GaussianModelConfig,
    dimensions: Option<(u32, u32)>,
    means: Vec<[f32; 3]>,
    variances: Vec<f32>,
    frames_seen: u64,
}

impl RunningGaussianModel {
    pub fn new() -> Self {
        Self::with_config(GaussianModelConfig::default())
    }

    pub fn with_config(config: GaussianModelConfig) -> Self {
        Self {
            config,
            dimensions: None,
            means: Vec::new(),
            variances: Vec::new(),
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    fn seed(&mut self, frame: &Frame) {
        self.dimensions = Some(frame.dimensions());
        self.means = frame
            .pixels()
            .map(|pixel| {
                let (b, g, r) = pixel.computed();
                [b, g, r]
            })
            .collect();
        self.variances = vec![self.config.initial_variance; self.means.len()];
        self.frames_seen = 1;
    }

    fn learning_rate(&self) -> f32 {
        let window = self.frames_seen.min(self.config.history.max(1) as u64);
        1.0 / window as f32
    }
}

impl Default for RunningGaussianModel {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundModel for RunningGaussianModel {
    fn apply(&mut self, frame: &Frame) -> Mask {
        match self.dimensions {
            None => {
                self.seed(frame);
                debug!(width = frame.width(), height = frame.height(), "background model seeded");
                return Mask::new(frame.width(), frame.height());
            }
            Some(dimensions) if dimensions != frame.dimensions() => {
                warn!(
                    ?dimensions,
                    actual = ?frame.dimensions(),
                    "frame size changed, reseeding background model"
                );
                self.seed(frame);
                return Mask::new(frame.width(), frame.height());
            }
            Some(_) => {}
        }

        self.frames_seen += 1;
        let alpha = self.learning_rate();
        let threshold = self.config.variance_threshold;
        let (min_variance, max_variance) = (self.config.min_variance, self.config.max_variance);

        let foreground: Vec<bool> = frame
            .pixels()
            .zip(self.means.iter_mut().zip(self.variances.iter_mut()))
            .map(|(pixel, (mean, variance))| {
                let (b, g, r) = pixel.computed();
                let deltas = [b - mean[0], g - mean[1], r - mean[2]];
                let distance = deltas.iter().map(|d| d * d).sum::<f32>();
                let is_foreground = distance > threshold * *variance;

                for (m, d) in mean.iter_mut().zip(deltas) {
                    *m += alpha * d;
                }
                *variance = (*variance + alpha * (distance - *variance))
                    .clamp(min_variance, max_variance);

                is_foreground
            })
            .collect();

        mask_from_predicate(frame.width(), frame.height(), foreground)
    }
}

type ForegroundPattern = Box<dyn FnMut(u64, &Frame) -> Mask + Send>;

/// Deterministic background model driven by a closure over
/// (zero-based frame index, frame).
pub struct MockBackgroundModel {
    pattern: ForegroundPattern,
    frames_seen: u64,
}

impl MockBackgroundModel {
    /// Every pixel is foreground on every frame.
    pub fn new() -> Self {
        Self::with_pattern(|_, frame| {
            Mask::from_pixel(frame.width(), frame.height(), Luma([MASK_SET]))
        })
    }

    /// Foreground wherever the frame has a non-black pixel.
    pub fn nonzero() -> Self {
        Self::with_pattern(|_, frame| {
            mask_from_predicate(
                frame.width(),
                frame.height(),
                frame.pixels().map(|pixel| !pixel.is_black()),
            )
        })
    }

    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: FnMut(u64, &Frame) -> Mask + Send + 'static,
    {
        Self {
            pattern: Box::new(pattern),
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl Default for MockBackgroundModel {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundModel for MockBackgroundModel {
    fn apply(&mut self, frame: &Frame) -> Mask {
        let mask = (self.pattern)(self.frames_seen, frame);
        self.frames_seen += 1;
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::mask_filter::count_set;
    use crate::core_modules::pixel::pixel::Pixel;

    fn grey(value: u8) -> Frame {
        Frame::filled(16, 16, Pixel::new(value, value, value)).unwrap()
    }

    #[test]
    fn first_frame_is_all_background() {
        let mut model = RunningGaussianModel::new();
        let mask = model.apply(&grey(100));
        assert_eq!(mask.dimensions(), (16, 16));
        assert_eq!(count_set(&mask), 0);
        assert_eq!(model.frames_seen(), 1);
    }

    #[test]
    fn static_scene_stays_background() {
        let mut model = RunningGaussianModel::new();
        for _ in 0..20 {
            let mask = model.apply(&grey(100));
            assert_eq!(count_set(&mask), 0);
        }
    }

    #[test]
    fn new_object_is_foreground() {
        let mut model = RunningGaussianModel::new();
        for _ in 0..10 {
            model.apply(&grey(40));
        }

        let mut frame = grey(40);
        for y in 4..8 {
            for x in 4..8 {
                frame.put_pixel(x, y, Pixel::new(100, 110, 200));
            }
        }
        let mask = model.apply(&frame);
        assert_eq!(count_set(&mask), 16);
        assert_eq!(mask.get_pixel(5, 5).0[0], MASK_SET);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn persistent_change_is_absorbed() {
        let mut model = RunningGaussianModel::with_config(GaussianModelConfig {
            history: 5,
            ..Default::default()
        });
        model.apply(&grey(40));
        for _ in 0..60 {
            model.apply(&grey(120));
        }
        assert_eq!(count_set(&model.apply(&grey(120))), 0);
    }

    #[test]
    fn size_change_reseeds() {
        let mut model = RunningGaussianModel::new();
        model.apply(&grey(40));
        model.apply(&grey(40));
        let small = Frame::filled(4, 4, Pixel::new(200, 200, 200)).unwrap();
        let mask = model.apply(&small);
        assert_eq!(mask.dimensions(), (4, 4));
        assert_eq!(count_set(&mask), 0);
        assert_eq!(model.frames_seen(), 1);
    }

    #[test]
    fn mock_counts_frames_and_follows_pattern() {
        let mut model = MockBackgroundModel::with_pattern(|index, frame| {
            let value = if index % 2 == 0 { MASK_SET } else { 0 };
            Mask::from_pixel(frame.width(), frame.height(), Luma([value]))
        });
        assert_eq!(count_set(&model.apply(&grey(1))), 256);
        assert_eq!(count_set(&model.apply(&grey(1))), 0);
        assert_eq!(model.frames_seen(), 2);
    }

    #[test]
    fn mock_nonzero_marks_lit_pixels() {
        let mut frame = Frame::black(4, 4).unwrap();
        frame.put_pixel(2, 1, Pixel::new(0, 0, 1));
        let mut model = MockBackgroundModel::nonzero();
        let mask = model.apply(&frame);
        assert_eq!(count_set(&mask), 1);
        assert_eq!(mask.get_pixel(2, 1).0[0], MASK_SET);
    }

    #[test]
    fn boxed_models_are_models() {
        let mut model: Box<dyn BackgroundModel> = Box::new(MockBackgroundModel::new());
        assert_eq!(count_set(&model.apply(&grey(1))), 256);
    }
}
