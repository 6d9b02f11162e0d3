// THEORY:
// The color classifier turns a (motion-gated) frame into binary masks of
// "could be flame" and "could be smoke" pixels. It is purely per-pixel and
// stateless; all memory lives in the heat maps downstream.
//
// Three rules are provided:
// 1.  Flame, HSI based (`FlameRule::Hsi`): a coarse, permissive gate on hue,
//     saturation and intensity. Despeckled with a median filter.
// 2.  Flame, RGB ratio based (`FlameRule::RgbRatio`): the stricter rule the
//     default pipeline runs. Requires a red > green > blue ordering, per-channel
//     reference levels, and an intensity that grows as red falls away from 255.
//     Left unfiltered here; the pipeline dilates it afterwards.
// 3.  Smoke: near-grey pixels (small chroma) that are not dark. Despeckled.

use crate::core_modules::frame::Frame;
use crate::core_modules::hsi::{Hsi, to_hsi};
use crate::core_modules::mask_filter::{Mask, MaskFilter, mask_from_predicate};
use crate::core_modules::pixel::pixel::Pixel;
use std::f32::consts::PI;

pub const FLAME_HUE_MAX: f32 = 60.0 * PI / 180.0;
pub const FLAME_SATURATION_MAX: f32 = 0.65;
pub const FLAME_INTENSITY_MIN: f32 = 127.0;

pub const RED_REFERENCE: f32 = 190.0;
pub const GREEN_REFERENCE: f32 = 100.0;
pub const BLUE_REFERENCE: f32 = 140.0;
pub const INTENSITY_REFERENCE: f32 = (RED_REFERENCE + GREEN_REFERENCE + BLUE_REFERENCE) / 3.0;

pub const SMOKE_CHROMA_MAX: u8 = 25;
pub const SMOKE_LOW_BAND: (f32, f32) = (70.0, 190.0);
pub const SMOKE_HIGH_BAND: (f32, f32) = (190.0, 255.0);

/// Which flame color rule to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlameRule {
    /// Hue <= 60°, saturation <= 0.65, intensity >= 127, then despeckled.
    Hsi,
    /// Red/green/blue ordering and reference ratios. Not despeckled.
    #[default]
    RgbRatio,
}

impl FlameRule {
    pub fn mask<F: MaskFilter + ?Sized>(&self, frame: &Frame, filter: &F, aperture: u32) -> Mask {
        match self {
            FlameRule::Hsi => flame_mask_hsi(frame, filter, aperture),
            FlameRule::RgbRatio => flame_mask_rgb_ratio(frame),
        }
    }
}

pub fn is_flame_hsi(hsi: &Hsi) -> bool {
    hsi.hue <= FLAME_HUE_MAX
        && hsi.saturation <= FLAME_SATURATION_MAX
        && hsi.intensity >= FLAME_INTENSITY_MIN
}

pub fn is_flame_rgb_ratio(pixel: &Pixel) -> bool {
    let (b, g, r) = pixel.computed();
    let intensity = pixel.intensity();

    pixel.red >= pixel.green
        && pixel.green > pixel.blue
        && r > RED_REFERENCE
        && g > GREEN_REFERENCE
        && b < BLUE_REFERENCE
        && intensity * RED_REFERENCE >= (255.0 - r) * INTENSITY_REFERENCE
}

pub fn is_smoke(pixel: &Pixel, hsi: &Hsi) -> bool {
    let i = hsi.intensity;
    let in_low_band = i >= SMOKE_LOW_BAND.0 && i <= SMOKE_LOW_BAND.1;
    let in_high_band = i >= SMOKE_HIGH_BAND.0 && i <= SMOKE_HIGH_BAND.1;
    pixel.chroma() < SMOKE_CHROMA_MAX && (in_low_band || in_high_band)
}

/// Rule A over a whole frame, despeckled with `aperture`.
pub fn flame_mask_hsi<F: MaskFilter + ?Sized>(frame: &Frame, filter: &F, aperture: u32) -> Mask {
    let raw = mask_from_predicate(
        frame.width(),
        frame.height(),
        to_hsi(frame).map(|hsi| is_flame_hsi(&hsi)),
    );
    filter.despeckle(&raw, aperture)
}

/// Rule B over a whole frame, unfiltered.
pub fn flame_mask_rgb_ratio(frame: &Frame) -> Mask {
    mask_from_predicate(
        frame.width(),
        frame.height(),
        frame.pixels().map(|pixel| is_flame_rgb_ratio(&pixel)),
    )
}

/// Smoke rule over a whole frame, despeckled with `aperture`.
pub fn smoke_mask<F: MaskFilter + ?Sized>(frame: &Frame, filter: &F, aperture: u32) -> Mask {
    let raw = mask_from_predicate(
        frame.width(),
        frame.height(),
        frame
            .pixels()
            .zip(to_hsi(frame))
            .map(|(pixel, hsi)| is_smoke(&pixel, &hsi)),
    );
    filter.despeckle(&raw, aperture)
}
