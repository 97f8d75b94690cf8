//! Module for quantization in the WSQ
//!
//! Bit-rate allocation follows the FBI WSQ standard: every subband
//! above a small variance floor gets a provisional step size, then a global
//! proportionality constant `q` is solved iteratively while subbands whose
//! allocated bit rate would be non-positive are removed from the set.
pub mod variance;

use crate::dwt::FloatImage;
use crate::error::{Result, Stage, WsqError};
use crate::tree::{SubbandTree, NUM_SUBBANDS, Q_TREE_LEN};
pub use crate::quantization::variance::SubbandStats;

/// Subbands with a smaller variance are not coded at all.
pub const VARIANCE_THRESHOLD: f32 = 1.01;

/// First subband of block 2 and block 3.
const START_BLOCK_2: usize = 19;
const START_BLOCK_3: usize = 52;
/// First subband of the second and third size regions (`m` table).
const START_REGION_2: usize = 4;
const START_REGION_3: usize = 51;

/// Perceptual weights. Only the eight subbands of block 3 deviate from 1.
fn weight(subband: usize) -> f32 {
    match subband {
        52 | 56 => 1.32,
        53 | 55 | 58 | 59 => 1.08,
        54 | 57 => 1.42,
        _ => 1.0,
    }
}

/// Subband size relative to the image: the reciprocal of `m` in the FBI
/// standard.
fn inverse_m(subband: usize) -> f32 {
    if subband < START_REGION_2 {
        1.0 / 1024.0
    } else if subband < START_REGION_3 {
        1.0 / 256.0
    } else {
        1.0 / 16.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuantizationParams {
    pub bitrate: f32,
    /// Bin width per subband; zero marks a dropped subband.
    pub step: [f32; Q_TREE_LEN],
    pub zero_bin: [f32; Q_TREE_LEN],
}

impl QuantizationParams {
    /// Solves the bit allocation for `bitrate` given the subband variances.
    pub fn allocate(bitrate: f32, stats: &SubbandStats) -> QuantizationParams {
        let var = &stats.variance;
        let mut step = [0.0f32; Q_TREE_LEN];
        let mut sigma = [0.0f32; NUM_SUBBANDS];

        for subband in 0..NUM_SUBBANDS {
            step[subband] = if var[subband] < VARIANCE_THRESHOLD {
                0.0
            } else if subband < START_REGION_2 {
                1.0
            } else {
                10.0 / (weight(subband) * f64::from(var[subband]).ln() as f32)
            };
        }

        // an infinite variance leaves a zero provisional step, which would
        // pin q at zero
        let initial: Vec<usize> = (0..NUM_SUBBANDS)
            .filter(|&subband| var[subband] >= VARIANCE_THRESHOLD && step[subband] > 0.0)
            .collect();
        for &subband in &initial {
            sigma[subband] = f64::from(var[subband]).sqrt() as f32;
        }

        let mut active = initial.clone();
        let q = loop {
            if active.is_empty() {
                break f32::INFINITY;
            }
            let s = active.iter().fold(0.0f32, |acc, &k| acc + inverse_m(k));
            let p = active.iter().fold(1.0f32, |acc, &k| {
                acc * f64::from(sigma[k] / step[k]).powf(f64::from(inverse_m(k))) as f32
            });
            let q = (2f64.powf(f64::from(bitrate / s - 1.0)) as f32 / 2.5)
                / f64::from(p).powf(f64::from(1.0f32 / s)) as f32;

            // subbands whose allocated bit rate is non-positive; a NaN ratio
            // is not flagged
            let non_positive = |k: usize| f64::from(step[k] / q) >= 5.0 * f64::from(sigma[k]);
            let kept: Vec<usize> = active.iter().copied().filter(|&k| !non_positive(k)).collect();
            if kept.len() == active.len() {
                break q;
            }
            log::debug!("Dropping {} subbands at q={q}", active.len() - kept.len());
            active = kept;
        };

        let mut zero_bin = [0.0f32; Q_TREE_LEN];
        for subband in 0..NUM_SUBBANDS {
            if initial.contains(&subband) {
                step[subband] /= q;
            } else {
                step[subband] = 0.0;
            }
            zero_bin[subband] = 1.2 * step[subband];
        }

        QuantizationParams {
            bitrate,
            step,
            zero_bin,
        }
    }

    pub fn is_coded(&self, subband: usize) -> bool {
        subband < NUM_SUBBANDS && self.step[subband] != 0.0
    }
}

/// Sample counts of the three entropy-coded blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSizes(pub [usize; 3]);

impl BlockSizes {
    /// Extents of the three blocks before any subband is dropped: block 1 is
    /// node 14, block 2 the rest of node 1, block 3 nodes 2 and 3.
    pub fn nominal(tree: &SubbandTree) -> BlockSizes {
        let w = &tree.wavelet;
        BlockSizes([
            w[14].area(),
            w[5].leny * w[1].lenx + w[4].area(),
            w[2].area() + w[3].area(),
        ])
    }

    /// Pixels of the high/high quarter of the first decomposition, which no
    /// block carries.
    pub fn discarded(tree: &SubbandTree) -> usize {
        tree.quant[NUM_SUBBANDS..].iter().map(|leaf| leaf.area()).sum()
    }

    pub fn compute(tree: &SubbandTree, params: &QuantizationParams) -> BlockSizes {
        let mut sizes = Self::nominal(tree).0;
        for subband in 0..NUM_SUBBANDS {
            if params.is_coded(subband) {
                continue;
            }
            let block = if subband < START_BLOCK_2 {
                0
            } else if subband < START_BLOCK_3 {
                1
            } else {
                2
            };
            sizes[block] -= tree.quant[subband].area();
        }
        BlockSizes(sizes)
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizedImage {
    pub samples: Vec<i32>,
    pub blocks: BlockSizes,
}

impl QuantizedImage {
    /// Samples of block `index` (0, 1 or 2).
    pub fn block(&self, index: usize) -> &[i32] {
        let start: usize = self.blocks.0[..index].iter().sum();
        &self.samples[start..start + self.blocks.0[index]]
    }
}

/// Quantizes every coded subband in index order, row-major within each.
pub fn quantize(
    image: &FloatImage,
    tree: &SubbandTree,
    params: &QuantizationParams,
) -> Result<QuantizedImage> {
    let mut samples = Vec::with_capacity(image.data.len());
    for subband in (0..NUM_SUBBANDS).filter(|&s| params.is_coded(s)) {
        let leaf = &tree.quant[subband];
        let step = f64::from(params.step[subband]);
        let half_zero = params.zero_bin[subband] / 2.0;
        let (lower, upper) = (f64::from(-half_zero), f64::from(half_zero));
        for row in leaf.y..leaf.y + leaf.leny {
            let start = row * image.width + leaf.x;
            for &v in &image.data[start..start + leaf.lenx] {
                let bin = if lower <= v && v <= upper {
                    0
                } else if v > 0.0 {
                    ((v - upper) / step + 1.0) as i32
                } else {
                    ((v + upper) / step - 1.0) as i32
                };
                samples.push(bin);
            }
        }
    }

    let blocks = BlockSizes::compute(tree, params);
    if blocks.total() != samples.len() {
        return Err(WsqError::invariant(
            Stage::Quantize,
            format!(
                "block sizes {:?} sum to {} but {} samples were quantized",
                blocks.0,
                blocks.total(),
                samples.len()
            ),
        ));
    }
    log::debug!("Quantized {} samples into blocks {:?}", samples.len(), blocks.0);
    Ok(QuantizedImage { samples, blocks })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn stats(f: impl Fn(usize) -> f32) -> SubbandStats {
        let mut variance = [0.0f32; Q_TREE_LEN];
        for (i, v) in variance.iter_mut().enumerate() {
            *v = f(i);
        }
        SubbandStats { variance }
    }

    #[test]
    fn test_low_variance_subbands_are_dropped() {
        let params = QuantizationParams::allocate(2.2, &stats(|i| if i % 2 == 0 { 0.5 } else { 400.0 }));
        for subband in 0..NUM_SUBBANDS {
            if subband % 2 == 0 {
                assert_eq!(params.step[subband], 0.0);
                assert!(!params.is_coded(subband));
            }
        }
        assert!(params.is_coded(1));
    }

    #[test]
    fn test_zero_bin_is_wider_than_step() {
        let params = QuantizationParams::allocate(0.75, &stats(|i| 50.0 + i as f32 * 10.0));
        for subband in 0..NUM_SUBBANDS {
            assert!((params.zero_bin[subband] - 1.2 * params.step[subband]).abs() < EPSILON);
        }
        for subband in NUM_SUBBANDS..Q_TREE_LEN {
            assert_eq!(params.step[subband], 0.0);
            assert!(!params.is_coded(subband));
        }
    }

    #[test]
    fn test_coarse_subbands_share_one_step() {
        let params = QuantizationParams::allocate(2.2, &stats(|i| 1000.0 / (1.0 + i as f32)));
        let first = params.step[0];
        assert!(first > 0.0);
        for subband in 1..START_REGION_2 {
            assert_eq!(params.step[subband], first);
        }
    }

    #[test]
    fn test_higher_bitrate_gives_finer_steps() {
        // large enough that no subband is dropped at either rate
        let s = stats(|_| 5000.0);
        let coarse = QuantizationParams::allocate(0.75, &s);
        let fine = QuantizationParams::allocate(2.2, &s);
        assert!(fine.step[0] < coarse.step[0]);
        assert!(fine.step[59] < coarse.step[59]);
        assert!(coarse.is_coded(59));
    }

    #[test]
    fn test_undefined_variances_are_not_coded() {
        let s = stats(|i| match i {
            0..=3 => f32::NAN,
            5 => f32::INFINITY,
            _ => 400.0,
        });
        let params = QuantizationParams::allocate(1.5, &s);
        for subband in 0..=3 {
            assert_eq!(params.step[subband], 0.0);
            assert_eq!(params.zero_bin[subband], 0.0);
        }
        assert_eq!(params.step[5], 0.0);
        assert!(params.step.iter().all(|step| step.is_finite()));
        assert!(params.is_coded(10));
    }

    #[test]
    fn test_all_flat_drops_everything() {
        let params = QuantizationParams::allocate(2.2, &stats(|_| 0.0));
        assert!(params.step.iter().all(|s| *s == 0.0));
        assert!(params.zero_bin.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_nominal_blocks_tile_the_image() {
        for (w, h) in [(1, 1), (2, 5), (16, 16), (17, 17), (33, 8), (500, 411)] {
            let tree = SubbandTree::build(w, h);
            let nominal = BlockSizes::nominal(&tree);
            assert_eq!(nominal.total() + BlockSizes::discarded(&tree), w * h, "{w}x{h}");
        }
    }

    #[test]
    fn test_quantize_bins() {
        let tree = SubbandTree::build(32, 32);
        let mut step = [0.0f32; Q_TREE_LEN];
        let mut zero_bin = [0.0f32; Q_TREE_LEN];
        step[0] = 2.0;
        zero_bin[0] = 2.4;
        let params = QuantizationParams {
            bitrate: 2.2,
            step,
            zero_bin,
        };
        let leaf = tree.quant[0];
        assert_eq!((leaf.lenx, leaf.leny), (1, 1));
        let values = [0.0, 1.1, -1.1, 1.3, 3.0, 3.5, -1.3, -3.5, 100.0];
        for (input, expected) in values.iter().zip([0, 0, 0, 1, 1, 2, -1, -2, 50]) {
            let mut image = FloatImage {
                data: vec![0.0; 32 * 32],
                width: 32,
                height: 32,
            };
            image.data[leaf.y * 32 + leaf.x] = *input;
            let quantized = quantize(&image, &tree, &params).unwrap();
            assert_eq!(quantized.samples, vec![expected], "input {input}");
            assert_eq!(quantized.blocks, BlockSizes([1, 0, 0]));
        }
    }

    #[test]
    fn test_block_slices() {
        let quantized = QuantizedImage {
            samples: vec![1, 2, 3, 4, 5, 6],
            blocks: BlockSizes([1, 3, 2]),
        };
        assert_eq!(quantized.block(0), &[1]);
        assert_eq!(quantized.block(1), &[2, 3, 4]);
        assert_eq!(quantized.block(2), &[5, 6]);
    }
}
