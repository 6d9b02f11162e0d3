// THEORY:
// A `Frame` is one time step of the incoming video: a fixed grid of 3-channel,
// 8-bit pixels. Like `Pixel`, it is a "dumb" container. It validates its own
// shape once, at construction, so every later stage can rely on
// `data.len() == width * height * 3` without re-checking.
//
// Storage is an `image::RgbImage` whose samples are kept in B, G, R order to
// match the external capture convention. The `image` crate does not care about
// the meaning of the three samples, and keeping it as the backing store lets
// the annotation stage draw straight onto the buffer with `imageproc`.
//
// Frames are never mutated in place by the detector: masking and annotation
// always produce a new `Frame`.

use crate::core_modules::pixel::pixel::{CHANNELS, Pixel};
use crate::error::{DetectionError, Result};
use image::{GrayImage, Rgb, RgbImage};

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Builds a frame from an interleaved B, G, R buffer.
    ///
    /// `channels` is the channel count the producer claims the buffer has;
    /// anything other than 3 is rejected before the buffer is looked at.
    pub fn from_raw(width: u32, height: u32, channels: usize, data: Vec<u8>) -> Result<Self> {
        if channels != CHANNELS {
            return Err(DetectionError::MalformedFrame(format!(
                "expected {CHANNELS} channels, got {channels}"
            )));
        }
        if width == 0 || height == 0 {
            return Err(DetectionError::InvalidDimensions { width, height });
        }
        let expected_len = width as usize * height as usize * CHANNELS;
        if data.len() != expected_len {
            return Err(DetectionError::MalformedFrame(format!(
                "buffer holds {} bytes, {width}x{height}x{CHANNELS} needs {expected_len}",
                data.len()
            )));
        }
        RgbImage::from_raw(width, height, data)
            .map(|image| Self { image })
            .ok_or_else(|| DetectionError::MalformedFrame("buffer rejected by image".into()))
    }

    /// Wraps an image whose samples are already in B, G, R order.
    pub fn from_bgr_image(image: RgbImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectionError::InvalidDimensions { width, height });
        }
        Ok(Self { image })
    }

    /// Converts a conventional R, G, B image into a frame.
    pub fn from_rgb_image(rgb: &RgbImage) -> Result<Self> {
        let mut image = rgb.clone();
        for pixel in image.pixels_mut() {
            pixel.0.swap(0, 2);
        }
        Self::from_bgr_image(image)
    }

    /// A frame where every pixel has the same value.
    pub fn filled(width: u32, height: u32, pixel: Pixel) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(DetectionError::InvalidDimensions { width, height });
        }
        Ok(Self {
            image: RgbImage::from_pixel(width, height, Rgb(pixel.to_array())),
        })
    }

    pub fn black(width: u32, height: u32) -> Result<Self> {
        Self::filled(width, height, Pixel::default())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        Pixel::from_bgr_slice(&self.image.get_pixel(x, y).0)
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Pixel) {
        self.image.put_pixel(x, y, Rgb(pixel.to_array()));
    }

    /// Row-major iterator over every pixel.
    pub fn pixels(&self) -> impl Iterator<Item = Pixel> + '_ {
        self.image.pixels().map(|p| Pixel::from_bgr_slice(&p.0))
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub(crate) fn as_image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    /// Copy of the frame in conventional R, G, B order, for encoders and viewers.
    pub fn to_rgb_image(&self) -> RgbImage {
        let mut rgb = self.image.clone();
        for pixel in rgb.pixels_mut() {
            pixel.0.swap(0, 2);
        }
        rgb
    }

    /// Returns a copy with every pixel zeroed where `mask` is unset.
    pub fn masked(&self, mask: &GrayImage) -> Result<Frame> {
        if mask.dimensions() != self.dimensions() {
            return Err(DetectionError::ForegroundMaskMismatch {
                expected_width: self.width(),
                expected_height: self.height(),
                actual_width: mask.width(),
                actual_height: mask.height(),
            });
        }
        let mut image = self.image.clone();
        for (pixel, keep) in image.pixels_mut().zip(mask.pixels()) {
            if keep.0[0] == 0 {
                pixel.0 = [0; CHANNELS];
            }
        }
        Ok(Frame { image })
    }
}
