//! Discrete Wavelet Transformation
pub mod filter;
pub mod one_dimension;
pub mod signal;

use std::slice::Chunks;

use crate::error::{Result, Stage, WsqError};
use crate::raster::Raster;
use crate::tree::WaveletNode;
pub use crate::dwt::filter::Filter;
pub use crate::dwt::one_dimension::{LineLayout, TwoChannelSubbandCoder};

/// Shift and scale applied to the pixels before the transform. Both travel
/// in the frame header so a decoder can undo them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub shift: f32,
    pub scale: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    pub data: Vec<f64>,
    pub width: usize,
    pub height: usize,
}

impl FloatImage {
    fn new(width: usize, height: usize) -> FloatImage {
        FloatImage {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn rows(&self) -> Chunks<'_, f64> {
        self.data.chunks(self.width.max(1))
    }

    /// Centres the raster on its mean and scales it into roughly +/-128.
    pub fn from_raster(raster: &Raster) -> Result<(FloatImage, Normalization)> {
        let pixels = raster.pixels();
        log::debug!(
            "Creating FloatImage from raster with size({},{})",
            raster.width(),
            raster.height()
        );

        let mut sum: u64 = 0;
        let mut low = u8::MAX;
        let mut high = u8::MIN;
        for &pixel in pixels {
            low = low.min(pixel);
            high = high.max(pixel);
            sum = sum.checked_add(u64::from(pixel)).ok_or_else(|| {
                WsqError::invariant(Stage::Normalize, "pixel sum overflowed the accumulator")
            })?;
        }

        let shift = (sum as f64 / pixels.len() as f64) as f32;
        let low_diff = shift - f32::from(low);
        let high_diff = f32::from(high) - shift;
        let scale = low_diff.max(high_diff) / 128.0;

        let mut image = FloatImage::new(raster.width(), raster.height());
        for (dst, &pixel) in image.data.iter_mut().zip(pixels) {
            *dst = f64::from(pixel);
        }
        image.normalize(shift, scale);
        Ok((image, Normalization { shift, scale }))
    }

    /// `(v - midpoint) / rescale` on every sample, in single precision. A
    /// zero `rescale` (flat image) maps everything to zero.
    pub fn normalize(&mut self, midpoint: f32, rescale: f32) {
        for v in self.data.iter_mut() {
            *v = if rescale == 0.0 {
                0.0
            } else {
                f64::from((*v as f32 - midpoint) / rescale)
            };
        }
    }

    /// Runs the analysis bank over every wavelet node in index order, rows
    /// first, then columns. Later nodes consume the output of earlier ones.
    pub fn decompose(&mut self, nodes: &[WaveletNode], coder: &TwoChannelSubbandCoder) {
        let width = self.width;
        let mut scratch = vec![0.0; self.data.len()];
        for node in nodes {
            let base = node.y * width + node.x;
            let rows = LineLayout {
                dst_start: 0,
                src_start: base,
                lines: node.leny,
                len: node.lenx,
                pitch: width,
                stride: 1,
            };
            coder.analysis(&mut scratch, &self.data, &rows, node.invert_row);
            let cols = LineLayout {
                dst_start: base,
                src_start: 0,
                lines: node.lenx,
                len: node.leny,
                pitch: 1,
                stride: width,
            };
            coder.analysis(&mut self.data, &scratch, &cols, node.invert_col);
        }
        log::debug!("Decomposed {} wavelet nodes", nodes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::SubbandTree;

    const EPSILON: f64 = 0.001;

    #[test]
    fn test_from_raster_normalization() {
        let raster = Raster::new(vec![0, 64, 128, 255], 2, 2, 500).unwrap();
        let (image, norm) = FloatImage::from_raster(&raster).unwrap();
        assert_eq!(norm.shift, 111.75);
        // max - mean dominates: (255 - 111.75) / 128
        assert_eq!(norm.scale, (255.0f32 - 111.75) / 128.0);
        assert!((image.data[3] - 128.0).abs() < EPSILON);
        assert!(image.data[0] < 0.0);
        assert_eq!(image.rows().count(), 2);
    }

    #[test]
    fn test_flat_raster_normalizes_to_zero() {
        let raster = Raster::new(vec![128; 16 * 16], 16, 16, 500).unwrap();
        let (image, norm) = FloatImage::from_raster(&raster).unwrap();
        assert_eq!(norm.shift, 128.0);
        assert_eq!(norm.scale, 0.0);
        assert!(image.data.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_decompose_concentrates_energy_in_lowpass() {
        let width = 64;
        let height = 64;
        let pixels = (0..width * height)
            .map(|i| {
                let (x, y) = ((i % width) as f64, (i / width) as f64);
                (128.0 + 100.0 * (x / 10.0).sin() * (y / 13.0).cos()) as u8
            })
            .collect();
        let raster = Raster::new(pixels, width, height, 500).unwrap();
        let (mut image, _) = FloatImage::from_raster(&raster).unwrap();
        let tree = SubbandTree::build(width, height);
        image.decompose(&tree.wavelet, &TwoChannelSubbandCoder::default());

        let energy = |node: &WaveletNode| {
            let mut total = 0.0;
            for y in node.y..node.y + node.leny {
                for x in node.x..node.x + node.lenx {
                    total += image.data[y * width + x].powi(2);
                }
            }
            total / node.area() as f64
        };
        assert!(energy(&tree.wavelet[19]) > energy(&tree.wavelet[2]));
        assert!(image.data.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_decompose_is_deterministic() {
        let width = 17;
        let height = 17;
        let pixels: Vec<u8> = (0..width * height).map(|i| (i * 37 % 251) as u8).collect();
        let raster = Raster::new(pixels, width, height, 500).unwrap();
        let tree = SubbandTree::build(width, height);
        let run = || {
            let (mut image, _) = FloatImage::from_raster(&raster).unwrap();
            image.decompose(&tree.wavelet, &TwoChannelSubbandCoder::default());
            image.data
        };
        assert_eq!(run(), run());
    }
}
