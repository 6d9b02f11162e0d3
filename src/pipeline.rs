// THEORY:
// The `pipeline` module is the top-level API of the detector. It wires the
// layers together and owns everything that lives longer than one frame:
// the motion gate's background model, the two heat maps, and the locked-in
// frame dimensions.
//
// Per frame:
//   motion gate -> color rules (flame, smoke) -> dilation -> heat accumulation
//   -> confirmation (heat above threshold AND color present now) -> block vote
//   -> annotated copy of the frame (flame in red, then smoke in blue)
//
// Lifecycle is one-way: no active state until dimensions are known (explicit
// `video_info_initialize`, configured dimensions, or the first frame), then
// active for good. Frames of any other size are rejected before the background
// model or the heat maps see them.

use crate::core_modules::background::{BackgroundModel, RunningGaussianModel};
use crate::core_modules::block_aggregator::{Block, BlockAggregator, DEFAULT_BLOCK_SIZE};
use crate::core_modules::color_classifier::{FlameRule, smoke_mask};
use crate::core_modules::frame::Frame;
use crate::core_modules::heat_map::{Heat, HeatMap};
use crate::core_modules::mask_filter::{ImageprocFilter, Mask, MaskFilter, count_set, mask_and};
use crate::core_modules::motion_gate::MotionGate;
use crate::core_modules::pixel::pixel::{FLAME_COLOR, SMOKE_COLOR};
use crate::error::{DetectionError, Result};
use std::fmt;
use tracing::{debug, info, warn};

/// Thresholds used when no frame rate is known.
pub const DEFAULT_FLAME_THRESHOLD: f64 = 50.0;
pub const DEFAULT_SMOKE_THRESHOLD: f64 = 50.0;

/// Seconds of sustained evidence each class needs, converted to frames.
const FLAME_SECONDS: f64 = 2.0;
const SMOKE_SECONDS: f64 = 1.5;

/// Per-class confirmation thresholds, in heat units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionThresholds {
    pub flame: f64,
    pub smoke: f64,
}

impl DetectionThresholds {
    pub fn from_frame_rate(frame_rate: f64) -> Self {
        Self {
            flame: FLAME_SECONDS * frame_rate,
            smoke: SMOKE_SECONDS * frame_rate,
        }
    }
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            flame: DEFAULT_FLAME_THRESHOLD,
            smoke: DEFAULT_SMOKE_THRESHOLD,
        }
    }
}

/// Configuration for the DetectionPipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Source frame rate. Drives the thresholds; `None` keeps the 50/50 defaults.
    pub frame_rate: Option<f64>,
    /// (width, height). When set, the pipeline is active from construction.
    pub dimensions: Option<(u32, u32)>,
    pub flame_rule: FlameRule,
    /// Heat added where a class mask is set.
    pub increment: Heat,
    /// Heat removed where a class mask is unset.
    pub decrement: Heat,
    pub flame_dilations: u32,
    pub smoke_dilations: u32,
    /// Median aperture for the motion mask and the despeckled color rules.
    pub despeckle_aperture: u32,
    pub block_size: u32,
    /// Heat ceiling as a multiple of each class threshold. `None` (the default)
    /// lets counters grow until they saturate. A ceiling shortens how long a
    /// long-burning region stays confirmed once its color turns intermittent.
    pub heat_ceiling_factor: Option<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_rate: None,
            dimensions: None,
            flame_rule: FlameRule::RgbRatio,
            increment: 3,
            decrement: 1,
            flame_dilations: 3,
            smoke_dilations: 1,
            despeckle_aperture: 3,
            block_size: DEFAULT_BLOCK_SIZE,
            heat_ceiling_factor: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(frame_rate) = self.frame_rate {
            validate_frame_rate(frame_rate)?;
        }
        if let Some((width, height)) = self.dimensions {
            validate_dimensions(width, height)?;
        }
        if self.increment == 0 {
            return Err(DetectionError::InvalidConfig("increment must be positive".into()));
        }
        if self.despeckle_aperture % 2 == 0 {
            return Err(DetectionError::InvalidConfig(format!(
                "despeckle aperture must be odd, got {}",
                self.despeckle_aperture
            )));
        }
        if let Some(factor) = self.heat_ceiling_factor {
            if !factor.is_finite() || factor <= 1.0 {
                return Err(DetectionError::InvalidConfig(format!(
                    "heat ceiling factor must be a finite value above 1, got {factor}"
                )));
            }
        }
        Ok(())
    }

    pub fn thresholds(&self) -> DetectionThresholds {
        self.frame_rate
            .map(DetectionThresholds::from_frame_rate)
            .unwrap_or_default()
    }
}

fn validate_frame_rate(frame_rate: f64) -> Result<()> {
    if frame_rate.is_finite() && frame_rate > 0.0 {
        Ok(())
    } else {
        Err(DetectionError::InvalidFrameRate(frame_rate))
    }
}

fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        Err(DetectionError::InvalidDimensions { width, height })
    } else {
        Ok(())
    }
}

/// Snapshot of the pipeline's tunables and locked-in state.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineParameters {
    pub thresholds: DetectionThresholds,
    pub frame_rate: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl fmt::Display for PipelineParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_unset<T: fmt::Display>(value: Option<T>) -> String {
            value.map_or_else(|| "unset".to_string(), |v| v.to_string())
        }
        write!(
            f,
            "flame threshold: {}, smoke threshold: {}, fps: {}, height: {}, width: {}",
            self.thresholds.flame,
            self.thresholds.smoke,
            or_unset(self.frame_rate),
            or_unset(self.height),
            or_unset(self.width),
        )
    }
}

/// Everything the pipeline produced for one frame.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    /// Zero-based index of this frame since the pipeline was created.
    pub frame_index: u64,
    /// The input frame with flame blocks in red and smoke blocks in blue.
    pub annotated: Frame,
    /// Despeckled foreground mask from the motion gate.
    pub motion_mask: Mask,
    /// Confirmed flame pixels (dilated color mask AND heat above threshold).
    pub flame_mask: Mask,
    /// Confirmed smoke pixels.
    pub smoke_mask: Mask,
    pub flame_blocks: Vec<Block>,
    pub smoke_blocks: Vec<Block>,
}

impl FrameAnalysis {
    pub fn has_flame(&self) -> bool {
        !self.flame_blocks.is_empty()
    }

    pub fn has_smoke(&self) -> bool {
        !self.smoke_blocks.is_empty()
    }
}

struct ActiveState {
    width: u32,
    height: u32,
    flame_heat: HeatMap,
    smoke_heat: HeatMap,
}

impl ActiveState {
    fn new(
        width: u32,
        height: u32,
        thresholds: &DetectionThresholds,
        config: &PipelineConfig,
    ) -> Self {
        let heat_map = |threshold: f64| {
            let heat = HeatMap::new(width, height);
            match config.heat_ceiling_factor {
                Some(factor) => heat.with_ceiling((factor * threshold).ceil() as Heat),
                None => heat,
            }
        };
        Self {
            width,
            height,
            flame_heat: heat_map(thresholds.flame),
            smoke_heat: heat_map(thresholds.smoke),
        }
    }
}

/// The flame and smoke detector for one video stream.
///
/// One instance per stream: the background model and heat maps are per-stream
/// state and must see every frame of that stream, in order.
pub struct DetectionPipeline<
    B: BackgroundModel = RunningGaussianModel,
    F: MaskFilter = ImageprocFilter,
> {
    config: PipelineConfig,
    thresholds: DetectionThresholds,
    /// `None` until the frame size is locked in.
    active: Option<ActiveState>,
    motion_gate: MotionGate<B>,
    filter: F,
    aggregator: BlockAggregator,
    frames_processed: u64,
}

impl DetectionPipeline {
    /// A pipeline with the adaptive Gaussian background model.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_components(config, RunningGaussianModel::new(), ImageprocFilter)
    }
}

impl<B: BackgroundModel> DetectionPipeline<B, ImageprocFilter> {
    pub fn with_background(config: PipelineConfig, background: B) -> Result<Self> {
        Self::with_components(config, background, ImageprocFilter)
    }
}

impl<B: BackgroundModel, F: MaskFilter> DetectionPipeline<B, F> {
    pub fn with_components(config: PipelineConfig, background: B, filter: F) -> Result<Self> {
        config.validate()?;
        let aggregator = BlockAggregator::new(config.block_size)?;
        let thresholds = config.thresholds();
        let active = config
            .dimensions
            .map(|(width, height)| ActiveState::new(width, height, &thresholds, &config));

        let pipeline = Self {
            motion_gate: MotionGate::new(background, config.despeckle_aperture),
            aggregator,
            filter,
            thresholds,
            active,
            config,
            frames_processed: 0,
        };
        if pipeline.is_active() {
            info!("pipeline active: {}", pipeline.parameters());
        }
        Ok(pipeline)
    }

    /// Locks in frame size and frame rate before the first frame.
    ///
    /// Fails without changing anything if the values are invalid or the
    /// pipeline is already active.
    pub fn video_info_initialize(
        &mut self,
        height: u32,
        width: u32,
        frame_rate: f64,
    ) -> Result<()> {
        if self.is_active() {
            return Err(DetectionError::AlreadyInitialized);
        }
        validate_dimensions(width, height)?;
        validate_frame_rate(frame_rate)?;

        self.config.frame_rate = Some(frame_rate);
        self.config.dimensions = Some((width, height));
        self.thresholds = DetectionThresholds::from_frame_rate(frame_rate);
        self.active = Some(ActiveState::new(width, height, &self.thresholds, &self.config));
        info!("pipeline active: {}", self.parameters());
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Locked-in (width, height), once active.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.active.as_ref().map(|active| (active.width, active.height))
    }

    pub fn thresholds(&self) -> DetectionThresholds {
        self.thresholds
    }

    pub fn parameters(&self) -> PipelineParameters {
        let dimensions = self.dimensions();
        PipelineParameters {
            thresholds: self.thresholds,
            frame_rate: self.config.frame_rate,
            width: dimensions.map(|(width, _)| width),
            height: dimensions.map(|(_, height)| height),
        }
    }

    pub fn flame_heat(&self) -> Option<&HeatMap> {
        self.active.as_ref().map(|active| &active.flame_heat)
    }

    pub fn smoke_heat(&self) -> Option<&HeatMap> {
        self.active.as_ref().map(|active| &active.smoke_heat)
    }

    pub fn background(&self) -> &B {
        self.motion_gate.background()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Runs one frame and returns its annotated copy.
    pub fn process(&mut self, frame: &Frame) -> Result<Frame> {
        self.analyze(frame).map(|analysis| analysis.annotated)
    }

    /// Runs one frame and returns the annotated copy plus every intermediate mask.
    pub fn analyze(&mut self, frame: &Frame) -> Result<FrameAnalysis> {
        let Self {
            config,
            thresholds,
            active,
            motion_gate,
            filter,
            aggregator,
            frames_processed,
        } = self;
        let filter = &*filter;

        let active = lock_dimensions(active, thresholds, config, frame)?;

        let gated = motion_gate.gate(frame, filter)?;

        let flame_color = config
            .flame_rule
            .mask(&gated.frame, filter, config.despeckle_aperture);
        let flame_color = filter.dilate(&flame_color, config.flame_dilations);

        let smoke_color = smoke_mask(&gated.frame, filter, config.despeckle_aperture);
        let smoke_color = filter.dilate(&smoke_color, config.smoke_dilations);

        active
            .flame_heat
            .accumulate(&flame_color, config.increment, config.decrement)?;
        active
            .smoke_heat
            .accumulate(&smoke_color, config.increment, config.decrement)?;

        let flame_confirmed = active.flame_heat.confirmed(thresholds.flame);
        let smoke_confirmed = active.smoke_heat.confirmed(thresholds.smoke);
        let flame_mask = mask_and(&flame_color, &flame_confirmed);
        let smoke_mask = mask_and(&smoke_color, &smoke_confirmed);

        let (flame_annotated, flame_blocks) =
            aggregator.aggregate(frame, &flame_mask, FLAME_COLOR)?;
        let (annotated, smoke_blocks) =
            aggregator.aggregate(&flame_annotated, &smoke_mask, SMOKE_COLOR)?;

        let frame_index = *frames_processed;
        *frames_processed += 1;

        debug!(
            frame_index,
            moving = count_set(&gated.motion_mask),
            flame_pixels = count_set(&flame_mask),
            smoke_pixels = count_set(&smoke_mask),
            flame_blocks = flame_blocks.len(),
            smoke_blocks = smoke_blocks.len(),
            "frame analyzed"
        );

        Ok(FrameAnalysis {
            frame_index,
            annotated,
            motion_mask: gated.motion_mask,
            flame_mask,
            smoke_mask,
            flame_blocks,
            smoke_blocks,
        })
    }
}

/// Activates the pipeline on first sight of a frame, or checks the frame
/// against the locked-in size.
fn lock_dimensions<'a>(
    active: &'a mut Option<ActiveState>,
    thresholds: &DetectionThresholds,
    config: &PipelineConfig,
    frame: &Frame,
) -> Result<&'a mut ActiveState> {
    let active = active.get_or_insert_with(|| {
        let (width, height) = frame.dimensions();
        info!(
            width,
            height,
            flame_threshold = thresholds.flame,
            smoke_threshold = thresholds.smoke,
            "pipeline active from first frame"
        );
        ActiveState::new(width, height, thresholds, config)
    });

    if frame.dimensions() != (active.width, active.height) {
        warn!(
            expected = ?(active.width, active.height),
            actual = ?frame.dimensions(),
            "rejecting frame"
        );
        return Err(DetectionError::ShapeMismatch {
            expected_width: active.width,
            expected_height: active.height,
            actual_width: frame.width(),
            actual_height: frame.height(),
        });
    }
    Ok(active)
}
