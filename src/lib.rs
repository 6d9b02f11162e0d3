// THEORY:
// This file is the entry point for the `pyro_vision` library crate. It exposes
// `DetectionPipeline` and its configuration and output types as the high-level
// interface of the flame and smoke detector, plus `PipelineHandle` for callers
// that live in an async runtime.
//
// The building blocks under `core_modules` (color rules, background models,
// heat maps, block aggregation) stay public so that callers can plug in their
// own background model or mask filter, or reuse a single stage on its own.

pub mod actor;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use actor::PipelineHandle;
pub use core_modules::background::{BackgroundModel, MockBackgroundModel, RunningGaussianModel};
pub use core_modules::block_aggregator::{Block, Point};
pub use core_modules::color_classifier::FlameRule;
pub use core_modules::frame::Frame;
pub use core_modules::pixel::pixel::Pixel;
pub use error::{DetectionError, Result};
pub use pipeline::{
    DetectionPipeline, DetectionThresholds, FrameAnalysis, PipelineConfig, PipelineParameters,
};
