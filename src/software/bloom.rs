//! CPU glow chain: luminance threshold, separable Gaussian blur and the
//! additive composite.

use crate::backend::CompositeParams;

use super::frame_buffer::FrameBuffer;

/// Width of the soft knee above the threshold.
const THRESHOLD_KNEE: f32 = 0.01;

#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[inline]
fn luminance(p: &[f32; 4]) -> f32 {
    0.2126 * p[0] + 0.7152 * p[1] + 0.0722 * p[2]
}

/// Keep only pixels brighter than `threshold`, with a soft knee.
pub fn threshold(fb: &mut FrameBuffer, threshold: f32) {
    for p in fb.pixels_mut() {
        let weight = smoothstep(threshold, threshold + THRESHOLD_KNEE, luminance(p));
        p[0] *= weight;
        p[1] *= weight;
        p[2] *= weight;
    }
}

/// Normalized 1D Gaussian kernel covering `radius` pixels on each side.
/// A radius under half a pixel gives the identity kernel.
pub fn gaussian_kernel(radius: f32) -> Vec<f32> {
    if !radius.is_finite() || radius < 0.5 {
        return vec![1.0];
    }
    let taps = radius.ceil() as i32;
    let sigma = (radius / 2.0).max(0.5);
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (-taps..=taps)
        .map(|i| (-((i * i) as f32) / two_sigma_sq).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

/// One blur direction, sampling with clamp-to-edge. `scratch` is reused.
fn blur_pass(fb: &mut FrameBuffer, kernel: &[f32], horizontal: bool, scratch: &mut Vec<[f32; 4]>) {
    let (width, height) = (fb.width() as i32, fb.height() as i32);
    let half = (kernel.len() / 2) as i32;

    scratch.clear();
    scratch.extend_from_slice(fb.pixels());
    let src = &*scratch;
    let dst = fb.pixels_mut();

    for y in 0..height {
        for x in 0..width {
            let mut acc = [0.0f32; 4];
            for (k, weight) in kernel.iter().enumerate() {
                let offset = k as i32 - half;
                let (sx, sy) = if horizontal {
                    ((x + offset).clamp(0, width - 1), y)
                } else {
                    (x, (y + offset).clamp(0, height - 1))
                };
                let s = &src[(sy * width + sx) as usize];
                for c in 0..4 {
                    acc[c] += s[c] * weight;
                }
            }
            dst[(y * width + x) as usize] = acc;
        }
    }
}

/// Separable Gaussian blur in place.
pub fn blur(fb: &mut FrameBuffer, radius: f32, scratch: &mut Vec<[f32; 4]>) {
    let kernel = gaussian_kernel(radius);
    if kernel.len() == 1 {
        return;
    }
    blur_pass(fb, &kernel, true, scratch);
    blur_pass(fb, &kernel, false, scratch);
}

/// `out = (base_weight * base + glow_weight * glow) * exposure`, opaque.
/// All three buffers must share one size.
pub fn composite(base: &FrameBuffer, glow: &FrameBuffer, out: &mut FrameBuffer, params: &CompositeParams) {
    for ((o, b), g) in out.pixels_mut().iter_mut().zip(base.pixels()).zip(glow.pixels()) {
        for c in 0..3 {
            let mut v = (params.base_weight * b[c] + params.glow_weight * g[c]) * params.exposure;
            if params.clamp {
                v = v.clamp(0.0, 1.0);
            }
            o[c] = v;
        }
        o[3] = 1.0;
    }
}

/// `out.rgb += weight * glow.rgb`. Alpha is left alone.
pub fn add_glow(glow: &FrameBuffer, out: &mut FrameBuffer, weight: f32, clamp: bool) {
    for (o, g) in out.pixels_mut().iter_mut().zip(glow.pixels()) {
        for c in 0..3 {
            let mut v = o[c] + weight * g[c];
            if clamp {
                v = v.clamp(0.0, 1.0);
            }
            o[c] = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_normalized_and_symmetric() {
        let kernel = gaussian_kernel(4.0);
        assert_eq!(kernel.len(), 9);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!((kernel[0] - kernel[8]).abs() < 1e-7);
        assert!(kernel[4] > kernel[3]);
    }

    #[test]
    fn test_zero_radius_is_identity() {
        assert_eq!(gaussian_kernel(0.0), vec![1.0]);

        let mut fb = FrameBuffer::new("glow", 3, 1);
        fb.set_pixel(1, 0, [1.0, 1.0, 1.0, 1.0]);
        let before = fb.pixels().to_vec();
        blur(&mut fb, 0.0, &mut Vec::new());
        assert_eq!(fb.pixels(), before.as_slice());
    }

    #[test]
    fn test_blur_spreads_and_preserves_energy() {
        let mut fb = FrameBuffer::new("glow", 21, 21);
        fb.set_pixel(10, 10, [1.0, 0.5, 0.25, 1.0]);
        let before = fb.total_energy();
        blur(&mut fb, 3.0, &mut Vec::new());

        assert!(fb.pixel(12, 10)[0] > 0.0);
        assert!(fb.pixel(10, 10)[0] < 1.0);
        assert!((fb.total_energy() - before).abs() < 1e-3);
    }

    #[test]
    fn test_threshold_cuts_dark_pixels() {
        let mut fb = FrameBuffer::new("glow", 2, 1);
        fb.set_pixel(0, 0, [0.2, 0.2, 0.2, 1.0]);
        fb.set_pixel(1, 0, [0.9, 0.9, 0.9, 1.0]);
        threshold(&mut fb, 0.5);
        assert_eq!(fb.pixel(0, 0)[0], 0.0);
        assert_eq!(fb.pixel(1, 0)[0], 0.9);
    }

    #[test]
    fn test_composite_weights() {
        let mut base = FrameBuffer::new("base", 1, 1);
        let mut glow = FrameBuffer::new("glow", 1, 1);
        let mut out = FrameBuffer::new("out", 1, 1);
        base.clear([0.5, 0.0, 0.0, 1.0]);
        glow.clear([0.25, 0.5, 0.0, 1.0]);

        let params = CompositeParams {
            base_weight: 1.0,
            glow_weight: 2.0,
            exposure: 1.0,
            clamp: false,
        };
        composite(&base, &glow, &mut out, &params);
        assert_eq!(out.pixel(0, 0), [1.0, 1.0, 0.0, 1.0]);

        composite(&base, &glow, &mut out, &CompositeParams { clamp: true, exposure: 2.0, ..params });
        assert_eq!(out.pixel(0, 0), [1.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_add_glow_accumulates() {
        let mut glow = FrameBuffer::new("group", 1, 1);
        let mut out = FrameBuffer::new("out", 1, 1);
        glow.clear([0.5, 0.25, 0.0, 0.3]);
        out.clear([0.5, 0.0, 0.1, 1.0]);

        add_glow(&glow, &mut out, 0.0, false);
        assert_eq!(out.pixel(0, 0), [0.5, 0.0, 0.1, 1.0]);

        add_glow(&glow, &mut out, 2.0, false);
        assert_eq!(out.pixel(0, 0), [1.5, 0.5, 0.1, 1.0]);

        add_glow(&glow, &mut out, 1.0, true);
        assert_eq!(out.pixel(0, 0), [1.0, 0.75, 0.1, 1.0]);
    }
}
