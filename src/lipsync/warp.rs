//! Vowel mouth-opening warp.
//!
//! A vowel stretches the mouth region vertically: the ROI content is resized
//! into the band that the expanded box gains above the original mouth, then
//! feathered into the frame. Consonants leave the frame alone.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use super::locator::MouthRoi;

/// Weight of the resized mouth in the blend; the frame keeps the rest.
pub const BLEND_ALPHA: f32 = 0.7;

const VOWELS: [char; 11] = ['a', 'e', 'i', 'o', 'u', 'ɑ', 'æ', 'ʌ', 'ɔ', 'ə', 'ɨ'];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WarpOutcome {
    /// Consonant, frame untouched
    Passthrough,
    /// Vowel warp blended into the frame
    Blended,
    /// Vowel, but the warp region was empty or did not fit
    Skipped,
}

pub fn is_vowel(symbol: &str) -> bool {
    symbol
        .chars()
        .next()
        .and_then(|c| c.to_lowercase().next())
        .is_some_and(|c| VOWELS.contains(&c))
}

/// Warp `frame` in place for the phoneme `symbol`.
pub fn warp_mouth(frame: &mut RgbImage, roi: MouthRoi, symbol: &str, expand_factor: f64) -> WarpOutcome {
    if !is_vowel(symbol) {
        return WarpOutcome::Passthrough;
    }

    let (frame_w, frame_h) = frame.dimensions();
    let Some(roi) = roi.clip(frame_w, frame_h) else {
        return WarpOutcome::Skipped;
    };

    let target = (roi.height as f64 * (1.0 + expand_factor)).round() as u32;
    let offset = target.saturating_sub(roi.height) / 2;
    let new_y = roi.y.saturating_sub(offset);
    let new_h = (frame_h - new_y).min(target);
    let band = new_h.saturating_sub(roi.height);
    if band == 0 {
        log::trace!("Warp band empty for ROI {:?}", roi);
        return WarpOutcome::Skipped;
    }

    let mouth = imageops::crop_imm(frame, roi.x, roi.y, roi.width, roi.height).to_image();
    let resized = imageops::resize(&mouth, roi.width, band, FilterType::Triangle);

    // Blend only when the resized block exactly covers the target band
    if resized.dimensions() != (roi.width, band)
        || roi.x + roi.width > frame_w
        || new_y + band > frame_h
    {
        log::debug!(
            "Skipping blend: resized {:?} vs region {}x{} at ({}, {})",
            resized.dimensions(),
            roi.width,
            band,
            roi.x,
            new_y
        );
        return WarpOutcome::Skipped;
    }

    for (dx, dy, src) in resized.enumerate_pixels() {
        let dst = frame.get_pixel_mut(roi.x + dx, new_y + dy);
        *dst = blend(*src, *dst);
    }
    WarpOutcome::Blended
}

fn blend(warped: Rgb<u8>, existing: Rgb<u8>) -> Rgb<u8> {
    let mix = |a: u8, b: u8| {
        (BLEND_ALPHA * a as f32 + (1.0 - BLEND_ALPHA) * b as f32)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    Rgb([
        mix(warped[0], existing[0]),
        mix(warped[1], existing[1]),
        mix(warped[2], existing[2]),
    ])
}
