// THEORY:
// Masks are plain `GrayImage`s holding 0 (unset) or 255 (set). The detector
// needs two neighbourhood operations on them:
//
// - despeckle: a median filter; on a binary mask a 3x3 median keeps a pixel set
//   only when at least 5 of the 9 cells in its window are set
// - dilate:    growth by a 3x3 square structuring element, repeated N times
//
// Both are external collaborators as far as the detector is concerned, so they
// sit behind the `MaskFilter` trait. `ImageprocFilter` is the stock
// implementation. Masks are only ever combined with `mask_and` or replaced
// wholesale.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::median_filter;
use imageproc::morphology::dilate;

pub type Mask = GrayImage;

pub const MASK_SET: u8 = 255;
pub const MASK_UNSET: u8 = 0;

/// Noise reduction and morphology over binary masks.
pub trait MaskFilter: Send {
    /// Median filter with a square `aperture` (odd, e.g. 3 for 3x3).
    fn despeckle(&self, mask: &Mask, aperture: u32) -> Mask;

    /// Dilates `mask` with a 3x3 square structuring element, `iterations` times.
    fn dilate(&self, mask: &Mask, iterations: u32) -> Mask;
}

/// `MaskFilter` backed by `imageproc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageprocFilter;

impl MaskFilter for ImageprocFilter {
    fn despeckle(&self, mask: &Mask, aperture: u32) -> Mask {
        let radius = aperture / 2;
        if radius == 0 {
            return mask.clone();
        }
        median_filter(mask, radius, radius)
    }

    fn dilate(&self, mask: &Mask, iterations: u32) -> Mask {
        let mut grown = mask.clone();
        for _ in 0..iterations {
            grown = dilate(&grown, Norm::LInf, 1);
        }
        grown
    }
}

/// Cell-wise logical AND of two congruent masks.
pub fn mask_and(a: &Mask, b: &Mask) -> Mask {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let mut out = Mask::new(a.width(), a.height());
    for ((dst, lhs), rhs) in out.pixels_mut().zip(a.pixels()).zip(b.pixels()) {
        if lhs.0[0] != 0 && rhs.0[0] != 0 {
            *dst = Luma([MASK_SET]);
        }
    }
    out
}

/// Builds a mask from one boolean per cell, row-major.
pub fn mask_from_predicate<I>(width: u32, height: u32, cells: I) -> Mask
where
    I: IntoIterator<Item = bool>,
{
    let mut mask = Mask::new(width, height);
    for (dst, set) in mask.pixels_mut().zip(cells) {
        if set {
            *dst = Luma([MASK_SET]);
        }
    }
    mask
}

pub fn count_set(mask: &Mask) -> usize {
    mask.pixels().filter(|p| p.0[0] != 0).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_dot(size: u32, x: u32, y: u32) -> Mask {
        let mut mask = Mask::new(size, size);
        mask.put_pixel(x, y, Luma([MASK_SET]));
        mask
    }

    #[test]
    fn despeckle_removes_isolated_pixel() {
        let mask = single_dot(9, 4, 4);
        let filtered = ImageprocFilter.despeckle(&mask, 3);
        assert_eq!(count_set(&filtered), 0);
    }

    #[test]
    fn despeckle_keeps_solid_region() {
        let mut mask = Mask::new(9, 9);
        for y in 2..7 {
            for x in 2..7 {
                mask.put_pixel(x, y, Luma([MASK_SET]));
            }
        }
        let filtered = ImageprocFilter.despeckle(&mask, 3);
        assert_eq!(filtered.get_pixel(4, 4).0[0], MASK_SET);
        assert_eq!(filtered.get_pixel(0, 0).0[0], MASK_UNSET);
    }

    #[test]
    fn dilate_grows_one_pixel_per_iteration() {
        let mask = single_dot(11, 5, 5);
        let once = ImageprocFilter.dilate(&mask, 1);
        assert_eq!(count_set(&once), 9);

        let thrice = ImageprocFilter.dilate(&mask, 3);
        assert_eq!(count_set(&thrice), 49);
        assert_eq!(thrice.get_pixel(2, 2).0[0], MASK_SET);
        assert_eq!(thrice.get_pixel(1, 1).0[0], MASK_UNSET);
    }

    #[test]
    fn dilate_clips_at_border() {
        let mask = single_dot(4, 0, 0);
        let grown = ImageprocFilter.dilate(&mask, 1);
        assert_eq!(count_set(&grown), 4);
    }

    #[test]
    fn mask_and_requires_both() {
        let a = mask_from_predicate(2, 2, [true, true, false, false]);
        let b = mask_from_predicate(2, 2, [true, false, true, false]);
        let both = mask_and(&a, &b);
        assert_eq!(both.as_raw(), &vec![255, 0, 0, 0]);
    }
}
