//! Whole-frame post-processing over packed RGB8 buffers.
//!
//! Filters run in a fixed order: bloom, vignette, color grading, chromatic
//! aberration, lens distortion. A filter whose magnitude is zero is skipped
//! outright so the frame bytes stay untouched.

use crate::config::{ColorGrading, PostFx};
use crate::error::{ChartAnimError, ChartAnimResult};

pub fn apply(post: &PostFx, frame: &mut Vec<u8>, width: u32, height: u32) -> ChartAnimResult<()> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| ChartAnimError::evaluation("postfx buffer size overflow"))?;
    if frame.len() != expected {
        return Err(ChartAnimError::evaluation(
            "postfx expects a frame matching width*height*3",
        ));
    }

    if post.bloom_enabled && post.bloom_radius > 0 && post.bloom_intensity > 0.0 {
        bloom(frame, width, height, post.bloom_radius, post.bloom_intensity)?;
    }
    if post.vignette_enabled && post.vignette_strength > 0.0 {
        vignette(frame, width, height, post.vignette_strength);
    }
    if let Some(grading) = &post.color_grading {
        if grading.brightness != 1.0 || grading.contrast != 1.0 || grading.saturation != 1.0 {
            color_grade(frame, grading);
        }
    }
    if post.chromatic_aberration_enabled && post.chromatic_aberration_offset > 0.0 {
        chromatic_aberration(frame, width, height, post.chromatic_aberration_offset);
    }
    if post.lens_distortion_enabled && post.lens_distortion_k != 0.0 {
        lens_distortion(frame, width, height, post.lens_distortion_k);
    }
    Ok(())
}

/// Blend the gaussian-blurred frame over the original by `intensity`.
fn bloom(
    frame: &mut [u8],
    width: u32,
    height: u32,
    radius: u32,
    intensity: f64,
) -> ChartAnimResult<()> {
    let sigma = radius as f32 / 2.0;
    let blurred = blur_rgb8(frame, width, height, radius, sigma.max(0.5))?;
    let t = intensity.clamp(0.0, 1.0);
    for (dst, src) in frame.iter_mut().zip(blurred.iter()) {
        let a = f64::from(*dst);
        let b = f64::from(*src);
        *dst = (a + (b - a) * t).round().clamp(0.0, 255.0) as u8;
    }
    Ok(())
}

/// Darken toward the corners: each pixel scaled by
/// `1 - strength * (r / r_max)^2`.
fn vignette(frame: &mut [u8], width: u32, height: u32, strength: f64) {
    let cx = f64::from(width) / 2.0;
    let cy = f64::from(height) / 2.0;
    let r_max_sq = cx * cx + cy * cy;
    for y in 0..height as usize {
        let dy = y as f64 - cy;
        for x in 0..width as usize {
            let dx = x as f64 - cx;
            let factor = (1.0 - strength * (dx * dx + dy * dy) / r_max_sq).clamp(0.0, 1.0);
            let i = (y * width as usize + x) * 3;
            for c in 0..3 {
                frame[i + c] = (f64::from(frame[i + c]) * factor).round() as u8;
            }
        }
    }
}

fn luma(r: f64, g: f64, b: f64) -> f64 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Brightness scales toward black, contrast pivots on the frame's mean luma,
/// saturation pivots on each pixel's own luma. All neutral at 1.0.
fn color_grade(frame: &mut [u8], grading: &ColorGrading) {
    let mean = if grading.contrast != 1.0 {
        let sum: f64 = frame
            .chunks_exact(3)
            .map(|px| luma(f64::from(px[0]), f64::from(px[1]), f64::from(px[2])))
            .sum();
        sum / (frame.len() / 3) as f64
    } else {
        0.0
    };

    for px in frame.chunks_exact_mut(3) {
        let mut r = f64::from(px[0]);
        let mut g = f64::from(px[1]);
        let mut b = f64::from(px[2]);

        if grading.brightness != 1.0 {
            r *= grading.brightness;
            g *= grading.brightness;
            b *= grading.brightness;
        }
        if grading.contrast != 1.0 {
            r = mean + (r - mean) * grading.contrast;
            g = mean + (g - mean) * grading.contrast;
            b = mean + (b - mean) * grading.contrast;
        }
        if grading.saturation != 1.0 {
            let gray = luma(r, g, b);
            r = gray + (r - gray) * grading.saturation;
            g = gray + (g - gray) * grading.saturation;
            b = gray + (b - gray) * grading.saturation;
        }
        px[0] = r.round().clamp(0.0, 255.0) as u8;
        px[1] = g.round().clamp(0.0, 255.0) as u8;
        px[2] = b.round().clamp(0.0, 255.0) as u8;
    }
}

/// Shift the red channel left and the blue channel right by `offset` pixels.
/// Columns with no shifted source keep their original value. Offsets that
/// round to less than a pixel are a no-op.
fn chromatic_aberration(frame: &mut Vec<u8>, width: u32, height: u32, offset: f64) {
    let off = offset.round() as usize;
    let w = width as usize;
    if off == 0 || off >= w {
        return;
    }
    let src = frame.clone();
    for y in 0..height as usize {
        let row = y * w;
        for x in 0..w {
            let i = (row + x) * 3;
            if x + off < w {
                frame[i] = src[(row + x + off) * 3];
            }
            if x >= off {
                frame[i + 2] = src[(row + x - off) * 3 + 2];
            }
        }
    }
}

/// Radial source remap: `factor = 1 + k * r^2` over the normalized radius.
/// Negative `k` bows outward (barrel), positive pinches (pincushion).
fn lens_distortion(frame: &mut Vec<u8>, width: u32, height: u32, k: f64) {
    let w = width as usize;
    let h = height as usize;
    let cx = w as f64 / 2.0;
    let cy = h as f64 / 2.0;
    let r_max = (cx * cx + cy * cy).sqrt();
    let src = frame.clone();
    for y in 0..h {
        let dy = (y as f64 - cy) / r_max;
        for x in 0..w {
            let dx = (x as f64 - cx) / r_max;
            let factor = 1.0 + k * (dx * dx + dy * dy);
            let sx = ((cx + dx * factor * r_max) as i64).clamp(0, w as i64 - 1) as usize;
            let sy = ((cy + dy * factor * r_max) as i64).clamp(0, h as i64 - 1) as usize;
            let di = (y * w + x) * 3;
            let si = (sy * w + sx) * 3;
            frame[di..di + 3].copy_from_slice(&src[si..si + 3]);
        }
    }
}

/// Separable gaussian blur over RGB8, fixed-point Q16 weights.
pub fn blur_rgb8(
    src: &[u8],
    width: u32,
    height: u32,
    radius: u32,
    sigma: f32,
) -> ChartAnimResult<Vec<u8>> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| ChartAnimError::evaluation("blur buffer size overflow"))?;
    if src.len() != expected {
        return Err(ChartAnimError::evaluation(
            "blur_rgb8 expects src matching width*height*3",
        ));
    }
    if radius == 0 {
        return Ok(src.to_vec());
    }

    let kernel = gaussian_kernel_q16(radius, sigma)?;
    let mut tmp = vec![0u8; expected];
    let mut out = vec![0u8; expected];
    horizontal_pass(src, &mut tmp, width, height, &kernel);
    vertical_pass(&tmp, &mut out, width, height, &kernel);
    Ok(out)
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> ChartAnimResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![1 << 16]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(ChartAnimError::validation("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0_f64;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }
    if sum <= 0.0 {
        return Err(ChartAnimError::evaluation("gaussian kernel sum is zero"));
    }

    // quantize to Q16 and push any rounding drift into the center tap so the
    // weights sum to exactly one
    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        let mid_val = i64::from(weights[mid]);
        weights[mid] = (mid_val + delta).clamp(0, 65536) as u32;
    }
    Ok(weights)
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 3];
            for (ki, &kw) in k.iter().enumerate() {
                let dx = ki as i32 - radius;
                let sx = (x + dx).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 3;
                for c in 0..3 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 3;
            for c in 0..3 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 3];
            for (ki, &kw) in k.iter().enumerate() {
                let dy = ki as i32 - radius;
                let sy = (y + dy).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * 3;
                for c in 0..3 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 3;
            for c in 0..3 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    v.min(255) as u8
}
