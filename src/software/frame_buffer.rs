//! Floating-point RGBA pixel buffer with an attached depth buffer.

use image::{Rgba, RgbaImage};

/// Depth value a cleared buffer holds (far plane).
pub const FAR_DEPTH: f32 = 1.0;

/// HDR pixel buffer. Channels are linear and unbounded until snapshot.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    label: String,
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
    depth: Vec<f32>,
}

impl FrameBuffer {
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        let count = width as usize * height as usize;
        Self {
            label: label.into(),
            width,
            height,
            pixels: vec![[0.0; 4]; count],
            depth: vec![FAR_DEPTH; count],
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Fill with `color` and reset depth.
    pub fn clear(&mut self, color: [f32; 4]) {
        self.pixels.fill(color);
        self.depth.fill(FAR_DEPTH);
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Pixel at (x, y). Out of range reads return transparent black.
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        if x >= self.width || y >= self.height {
            return [0.0; 4];
        }
        self.pixels[self.index(x, y)]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: [f32; 4]) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.pixels[i] = color;
        }
    }

    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [[f32; 4]] {
        &mut self.pixels
    }

    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return FAR_DEPTH;
        }
        self.depth[self.index(x, y)]
    }

    /// Depth-tested fragment write with source-over alpha blending.
    /// Returns false when the fragment was rejected.
    pub fn write_fragment(&mut self, x: u32, y: u32, depth: f32, color: [f32; 4]) -> bool {
        if x >= self.width || y >= self.height || !(0.0..=1.0).contains(&depth) {
            return false;
        }
        let i = self.index(x, y);
        if depth >= self.depth[i] {
            return false;
        }

        let a = color[3].clamp(0.0, 1.0);
        if a <= 0.0 {
            return false;
        }
        let dst = self.pixels[i];
        self.pixels[i] = [
            color[0] * a + dst[0] * (1.0 - a),
            color[1] * a + dst[1] * (1.0 - a),
            color[2] * a + dst[2] * (1.0 - a),
            a + dst[3] * (1.0 - a),
        ];
        self.depth[i] = depth;
        true
    }

    /// Sum of RGB over every pixel.
    pub fn total_energy(&self) -> f64 {
        self.pixels
            .iter()
            .map(|p| (p[0] + p[1] + p[2]) as f64)
            .sum()
    }

    /// Quantize to 8-bit RGBA, clamping to 0..1.
    pub fn to_rgba8(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let p = self.pixels[self.index(x, y)];
            Rgba([quantize(p[0]), quantize(p[1]), quantize(p[2]), quantize(p[3])])
        })
    }
}

#[inline]
fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_and_read() {
        let mut fb = FrameBuffer::new("test", 4, 3);
        fb.clear([0.5, 0.25, 1.0, 1.0]);
        assert_eq!(fb.pixel(3, 2), [0.5, 0.25, 1.0, 1.0]);
        assert_eq!(fb.pixel(4, 0), [0.0; 4]);
        assert_eq!(fb.depth_at(0, 0), FAR_DEPTH);
    }

    #[test]
    fn test_depth_test_rejects_farther() {
        let mut fb = FrameBuffer::new("test", 2, 2);
        fb.clear([0.0, 0.0, 0.0, 1.0]);
        assert!(fb.write_fragment(0, 0, 0.5, [1.0, 0.0, 0.0, 1.0]));
        assert!(!fb.write_fragment(0, 0, 0.7, [0.0, 1.0, 0.0, 1.0]));
        assert!(fb.write_fragment(0, 0, 0.2, [0.0, 0.0, 1.0, 1.0]));
        assert_eq!(fb.pixel(0, 0), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_transparent_fragment_is_dropped() {
        let mut fb = FrameBuffer::new("test", 1, 1);
        fb.clear([0.2, 0.2, 0.2, 1.0]);
        assert!(!fb.write_fragment(0, 0, 0.5, [1.0, 1.0, 1.0, 0.0]));
        assert_eq!(fb.depth_at(0, 0), FAR_DEPTH);
        assert_eq!(fb.pixel(0, 0), [0.2, 0.2, 0.2, 1.0]);
    }

    #[test]
    fn test_to_rgba8_clamps_hdr() {
        let mut fb = FrameBuffer::new("test", 1, 1);
        fb.clear([4.0, 0.5, -1.0, 1.0]);
        let image = fb.to_rgba8();
        assert_eq!(image.get_pixel(0, 0).0, [255, 128, 0, 255]);
    }
}
