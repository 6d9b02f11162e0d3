// THEORY:
// Hue/Saturation/Intensity is the color space both flame and smoke rules are
// tuned in. The transform here is the closed-form trigonometric RGB->HSI
// conversion with two "+1" guards (one in the saturation denominator, one under
// the hue square root) that keep all-black and grey pixels finite. The guards
// shift saturation and hue slightly for dark pixels, and the classification
// thresholds were fitted with them in place, so they must stay.
//
// `to_hsi` is lazy: it yields one `Hsi` per pixel in row-major order as the
// caller pulls, and like any iterator it can be consumed only once.

use crate::core_modules::frame::Frame;
use crate::core_modules::pixel::pixel::Pixel;
use std::f32::consts::PI;

pub type Hue = f32;
pub type Saturation = f32;
pub type Intensity = f32;

/// A single pixel in HSI form. Hue is in radians, [0, 2π).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsi {
    pub hue: Hue,
    pub saturation: Saturation,
    pub intensity: Intensity,
}

impl Hsi {
    pub fn from_pixel(pixel: Pixel) -> Self {
        let (b, g, r) = pixel.computed();

        let intensity = (b + g + r) / 3.0;

        let minimum = r.min(g).min(b);
        let saturation = 1.0 - (3.0 / (r + g + b + 1.0)) * minimum;

        let numerator = 0.5 * ((r - g) + (r - b));
        let denominator = ((r - g) * (r - g) + (r - b) * (g - b) + 1.0).sqrt();
        let theta = (numerator / denominator).clamp(-1.0, 1.0).acos();
        let hue = if b > g { 2.0 * PI - theta } else { theta };

        Self {
            hue,
            saturation,
            intensity,
        }
    }
}

/// Lazily converts every pixel of `frame` to HSI, row-major.
pub fn to_hsi(frame: &Frame) -> impl Iterator<Item = Hsi> + '_ {
    frame.pixels().map(Hsi::from_pixel)
}
