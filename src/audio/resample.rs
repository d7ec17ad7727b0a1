//! Sample-rate conversion from the device's native rate to the target rate.
//!
//! The high-quality path uses rubato's sinc resampler; a linear fallback with
//! a small low-pass FIR keeps the pipeline working when rubato is disabled or
//! rejects the rate.

use crate::log_debug;
#[cfg(feature = "high-quality-audio")]
use anyhow::Result;
#[cfg(feature = "high-quality-audio")]
use rubato::{InterpolationParameters, InterpolationType, Resampler, SincFixedIn, WindowFunction};
use std::f32::consts::PI;
#[cfg(feature = "high-quality-audio")]
use std::sync::atomic::{AtomicBool, Ordering};

// Practical ratio bounds (~0.01x .. 8x around a 16 kHz target).
pub(super) const MIN_DEVICE_RATE: u32 = 2_000;
pub(super) const MAX_DEVICE_RATE: u32 = 1_600_000;

#[cfg(feature = "high-quality-audio")]
static RESAMPLER_WARNING_SHOWN: AtomicBool = AtomicBool::new(false);

/// Convert one device-rate frame to the target rate, padding or truncating so
/// the result is exactly `target_len` samples. Keeping frames length-stable
/// lets the endpointing clock advance by a fixed step per frame.
pub(super) fn convert_frame_to_target(
    frame: Vec<f32>,
    device_rate: u32,
    target_rate: u32,
    target_len: usize,
) -> Vec<f32> {
    if frame.is_empty() {
        return frame;
    }
    let mut converted = if device_rate == target_rate {
        frame
    } else {
        resample_to_rate(&frame, device_rate, target_rate)
    };
    converted.resize(target_len, 0.0);
    converted
}

/// Resample a full buffer from `device_rate` to `target_rate`.
pub(super) fn resample_to_rate(input: &[f32], device_rate: u32, target_rate: u32) -> Vec<f32> {
    if input.is_empty() || device_rate == 0 || device_rate == target_rate {
        return input.to_vec();
    }

    #[cfg(feature = "high-quality-audio")]
    {
        match resample_with_rubato(input, device_rate, target_rate) {
            Ok(output) => return output,
            Err(err) => {
                if !RESAMPLER_WARNING_SHOWN.swap(true, Ordering::AcqRel) {
                    log_debug(&format!(
                        "high-quality resampler failed ({err}); falling back to basic path"
                    ));
                }
            }
        }
    }

    basic_resample(input, device_rate, target_rate)
}

#[cfg(feature = "high-quality-audio")]
fn resample_with_rubato(input: &[f32], device_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if !(MIN_DEVICE_RATE..=MAX_DEVICE_RATE).contains(&device_rate) {
        anyhow::bail!("device rate {device_rate} outside supported bounds");
    }
    let ratio = target_rate as f64 / device_rate as f64;
    let params = InterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: InterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let chunk = input.len().min(1024).max(8);
    let mut resampler = SincFixedIn::<f32>::new(ratio, 8.0, params, chunk, 1)?;
    let mut output = Vec::with_capacity((input.len() as f64 * ratio).ceil() as usize);
    for block in input.chunks(chunk) {
        let mut frame = block.to_vec();
        frame.resize(chunk, 0.0);
        let processed = resampler.process(&[frame], None)?;
        if let Some(channel) = processed.into_iter().next() {
            output.extend(channel);
        }
    }
    let expected = (input.len() as f64 * ratio).round() as usize;
    output.truncate(expected.max(1));
    Ok(output)
}

/// Linear interpolation with a low-pass FIR ahead of downsampling to limit
/// aliasing.
pub(super) fn basic_resample(input: &[f32], device_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = target_rate as f64 / device_rate as f64;
    if ratio < 1.0 {
        let cutoff = 0.45 * ratio as f32;
        let filtered = low_pass_fir(input, cutoff);
        resample_linear(&filtered, ratio)
    } else {
        resample_linear(input, ratio)
    }
}

pub(super) fn resample_linear(input: &[f32], ratio: f64) -> Vec<f32> {
    let out_len = ((input.len() as f64) * ratio).round().max(1.0) as usize;
    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src = i as f64 / ratio;
        let idx = src.floor() as usize;
        let frac = (src - idx as f64) as f32;
        let a = input.get(idx).copied().unwrap_or(0.0);
        let b = input.get(idx + 1).copied().unwrap_or(a);
        output.push(a + (b - a) * frac);
    }
    output
}

/// Windowed-sinc low-pass; `cutoff` is a fraction of the input sample rate.
pub(super) fn low_pass_fir(input: &[f32], cutoff: f32) -> Vec<f32> {
    const TAPS: usize = 33;
    let mid = (TAPS / 2) as isize;
    let mut kernel = [0.0f32; TAPS];
    let mut sum = 0.0f32;
    for (i, tap) in kernel.iter_mut().enumerate() {
        let n = i as isize - mid;
        let sinc = if n == 0 {
            2.0 * cutoff
        } else {
            (2.0 * PI * cutoff * n as f32).sin() / (PI * n as f32)
        };
        // Hamming window
        let window = 0.54 - 0.46 * (2.0 * PI * i as f32 / (TAPS - 1) as f32).cos();
        *tap = sinc * window;
        sum += *tap;
    }
    if sum.abs() > f32::EPSILON {
        for tap in kernel.iter_mut() {
            *tap /= sum;
        }
    }

    let mut output = Vec::with_capacity(input.len());
    for i in 0..input.len() {
        let mut acc = 0.0f32;
        for (k, tap) in kernel.iter().enumerate() {
            let idx = i as isize + k as isize - mid;
            if idx >= 0 && (idx as usize) < input.len() {
                acc += input[idx as usize] * tap;
            }
        }
        output.push(acc);
    }
    output
}
