//! Interleaved 16-bit PCM helpers: conversion, gain, edge fades.
//!
//! Conversions truncate toward zero (`value * 32767` cast to `i16`), no
//! dithering. Rust's float → int `as` cast saturates, so out-of-range input
//! pins to the rails instead of wrapping.

use crate::dsp::I16_SCALE;

/// Output is always interleaved stereo.
pub const CHANNELS: usize = 2;

/// Bytes per interleaved stereo frame of 16-bit samples.
pub const BYTES_PER_FRAME: usize = CHANNELS * core::mem::size_of::<i16>();

#[inline]
pub fn to_i16(x: f64) -> i16 {
    (x * I16_SCALE) as i16
}

#[inline]
pub fn scale_i16(s: i16, gain: f64) -> i16 {
    (f64::from(s) * gain) as i16
}

/// Multiply every sample by `gain`. `gain >= 1.0` is a no-op.
pub fn apply_gain(block: &mut [i16], gain: f64) {
    if gain >= 1.0 {
        return;
    }
    for s in block.iter_mut() {
        *s = scale_i16(*s, gain);
    }
}

/// Number of frames a fade of `fade_ms` spans at `sample_rate`.
#[inline]
pub fn fade_frames(sample_rate: u32, fade_ms: u32) -> usize {
    (u64::from(sample_rate) * u64::from(fade_ms) / 1000) as usize
}

/// Linear fade-in over the first `fade` frames and fade-out over the last
/// `fade` frames of an interleaved block.
///
/// The two ramps are independent (no crossfade). If the block is shorter
/// than two fades they overlap and both apply. Both channels of a frame get
/// the same gain.
pub fn apply_edge_fades(block: &mut [i16], fade: usize) {
    let frames = block.len() / CHANNELS;
    if fade == 0 || frames == 0 {
        return;
    }
    let n = fade.min(frames);

    for i in 0..n {
        let g = i as f64 / fade as f64;
        for s in &mut block[i * CHANNELS..(i + 1) * CHANNELS] {
            *s = scale_i16(*s, g);
        }
    }

    for i in 0..n {
        let g = (fade - i) as f64 / fade as f64;
        let frame = frames - n + i;
        for s in &mut block[frame * CHANNELS..(frame + 1) * CHANNELS] {
            *s = scale_i16(*s, g);
        }
    }
}
