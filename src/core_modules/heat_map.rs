// THEORY:
// The `HeatMap` is the memory of the detector. Color rules fire on single
// frames and flicker constantly; the heat map converts that flicker into a
// stable signal by keeping one non-negative counter per pixel:
//
// - every frame the class mask is set, the counter rises by `increment`
// - every frame it is unset, the counter falls by `decrement`, never below 0
//
// A pixel is confirmed once its counter is strictly above the class threshold.
// With the default increment of 3 and decrement of 1 the counter drifts upward
// only while a pixel is set in more than a quarter of recent frames.
//
// Counters saturate instead of overflowing and can be clamped at a ceiling so
// that a fire that burns for hours does not take hours to "cool" again.
//
// Storage is a dense, row-major `Vec<u32>` owned by a single pipeline instance.

use crate::core_modules::mask_filter::{Mask, mask_from_predicate};
use crate::error::{DetectionError, Result};

pub type Heat = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatMap {
    width: u32,
    height: u32,
    cells: Vec<Heat>,
    ceiling: Option<Heat>,
}

impl HeatMap {
    /// A zero-filled map with no ceiling.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![0; width as usize * height as usize],
            ceiling: None,
        }
    }

    pub fn with_ceiling(mut self, ceiling: Heat) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn ceiling(&self) -> Option<Heat> {
        self.ceiling
    }

    pub fn get(&self, x: u32, y: u32) -> Heat {
        self.cells[y as usize * self.width as usize + x as usize]
    }

    pub fn cells(&self) -> &[Heat] {
        &self.cells
    }

    pub fn max(&self) -> Heat {
        self.cells.iter().copied().max().unwrap_or(0)
    }

    /// Adds `increment` where `mask` is set and subtracts `decrement` elsewhere,
    /// floored at zero. The map is left untouched if `mask` has the wrong size.
    pub fn accumulate(&mut self, mask: &Mask, increment: Heat, decrement: Heat) -> Result<()> {
        if mask.dimensions() != (self.width, self.height) {
            return Err(DetectionError::ShapeMismatch {
                expected_width: self.width,
                expected_height: self.height,
                actual_width: mask.width(),
                actual_height: mask.height(),
            });
        }

        let ceiling = self.ceiling.unwrap_or(Heat::MAX);
        for (cell, value) in self.cells.iter_mut().zip(mask.pixels()) {
            *cell = if value.0[0] > 0 {
                cell.saturating_add(increment).min(ceiling)
            } else {
                cell.saturating_sub(decrement)
            };
        }
        Ok(())
    }

    /// Mask of cells whose heat is strictly above `threshold`.
    pub fn confirmed(&self, threshold: f64) -> Mask {
        mask_from_predicate(
            self.width,
            self.height,
            self.cells.iter().map(|&heat| heat as f64 > threshold),
        )
    }
}
