//! Per-subband variance of the decomposed image.
use crate::dwt::FloatImage;
use crate::tree::{QuantNode, Q_TREE_LEN};

/// Below this summed variance of the four coarsest subbands the image is
/// considered low-detail and every subband is measured over its full extent.
pub const CROP_THRESHOLD: f32 = 20000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SubbandStats {
    pub variance: [f32; Q_TREE_LEN],
}

impl SubbandStats {
    pub fn analyse(image: &FloatImage, leaves: &[QuantNode; Q_TREE_LEN]) -> SubbandStats {
        let mut variance = [0.0f32; Q_TREE_LEN];

        let mut coarse_sum = 0.0f32;
        for (leaf, var) in leaves.iter().zip(variance.iter_mut()).take(4) {
            *var = window_variance(image, &crop(leaf));
            coarse_sum += *var;
        }

        if coarse_sum < CROP_THRESHOLD {
            log::debug!("Low-detail image (coarse variance {coarse_sum}), using full subbands");
            for (leaf, var) in leaves.iter().zip(variance.iter_mut()) {
                *var = window_variance(image, leaf);
            }
        } else {
            for (leaf, var) in leaves.iter().zip(variance.iter_mut()).skip(4) {
                *var = window_variance(image, &crop(leaf));
            }
        }
        SubbandStats { variance }
    }
}

/// Central window of a leaf: skips an eighth of the width on the left and
/// 9/32 of the height on top, keeping 3/4 by 7/16.
fn crop(leaf: &QuantNode) -> QuantNode {
    QuantNode {
        x: leaf.x + leaf.lenx / 8,
        y: leaf.y + (9 * leaf.leny) / 32,
        lenx: (3 * leaf.lenx) / 4,
        leny: (7 * leaf.leny) / 16,
    }
}

/// Sample variance over `window`, accumulated in single precision. An empty
/// window yields NaN and a single sample NaN or infinity; callers treat
/// both as below the coding threshold.
fn window_variance(image: &FloatImage, window: &QuantNode) -> f32 {
    let n = window.area();
    let mut sum = 0.0f32;
    let mut squares = 0.0f32;
    for row in window.y..window.y + window.leny {
        let start = row * image.width + window.x;
        for &v in &image.data[start..start + window.lenx] {
            sum = (f64::from(sum) + v) as f32;
            squares = (f64::from(squares) + v * v) as f32;
        }
    }
    let mean_square = (sum * sum) / n as f32;
    (squares - mean_square) / (n as f32 - 1.0)
}
