//! Subband topology of the WSQ decomposition.
//!
//! The image is split into 20 wavelet nodes (the W-tree) and 64 quantization
//! leaves (the Q-tree). Node and leaf indices are fixed by the FBI WSQ
//! standard: decoders rebuild the same trees from the frame dimensions
//! and read subbands in index order, so every index below is part of the wire
//! format.
//!
//! W-tree roles:
//!
//! | node    | region                                                       |
//! |---------|--------------------------------------------------------------|
//! | 0       | whole image, first decomposition                             |
//! | 1, 2, 3 | low/low, high-x and high-y quarters of node 0                |
//! | 4, 5    | high-x and high-y quarters of node 1 (decomposed again)      |
//! | 6..=9   | children of node 4                                           |
//! | 10..=13 | children of node 5                                           |
//! | 14      | low/low quarter of node 1                                    |
//! | 15..=18 | children of node 14                                          |
//! | 19      | low/low quarter of node 15, the coarsest scale               |
//!
//! Q-tree roles: leaves 0..4 split node 19, 4..19 split node 14, 19..35 node
//! 4, 35..51 node 5, 51 is the high/high quarter of node 1, 52..60 split
//! nodes 2 and 3, and 60..64 split the high/high quarter of node 0, which is
//! never coded.

pub const W_TREE_LEN: usize = 20;
pub const Q_TREE_LEN: usize = 64;
/// Leaves at and past this index are discarded by the encoder.
pub const NUM_SUBBANDS: usize = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaveletNode {
    pub x: usize,
    pub y: usize,
    pub lenx: usize,
    pub leny: usize,
    /// Highpass half of the row split is stored first.
    pub invert_row: bool,
    /// Highpass half of the column split is stored first.
    pub invert_col: bool,
}

impl WaveletNode {
    pub fn area(&self) -> usize {
        self.lenx * self.leny
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuantNode {
    pub x: usize,
    pub y: usize,
    pub lenx: usize,
    pub leny: usize,
}

impl QuantNode {
    pub fn area(&self) -> usize {
        self.lenx * self.leny
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubbandTree {
    pub wavelet: [WaveletNode; W_TREE_LEN],
    pub quant: [QuantNode; Q_TREE_LEN],
}

impl SubbandTree {
    pub fn build(width: usize, height: usize) -> Self {
        let wavelet = build_wavelet_tree(width, height);
        let quant = build_quant_tree(&wavelet);
        log::debug!("Built subband trees for {width}x{height}");
        SubbandTree { wavelet, quant }
    }
}

/// Splits `len` in two, handing an odd pixel to the first half unless
/// `favor_second` is set. Returns `(first, second)`.
fn halves(len: usize, favor_second: bool) -> (usize, usize) {
    if len % 2 == 0 {
        (len / 2, len / 2)
    } else if favor_second {
        ((len - 1) / 2, (len + 1) / 2)
    } else {
        ((len + 1) / 2, (len - 1) / 2)
    }
}

fn build_wavelet_tree(width: usize, height: usize) -> [WaveletNode; W_TREE_LEN] {
    let mut w = [WaveletNode::default(); W_TREE_LEN];

    for node in [2, 4, 7, 9, 11, 13, 16, 18] {
        w[node].invert_row = true;
    }
    for node in [3, 5, 8, 9, 12, 13, 17, 18] {
        w[node].invert_col = true;
    }

    split4(&mut w, 0, 1, width, height, 0, 0, false);

    let (lenx, lenx2) = halves(w[1].lenx, false);
    let (leny, leny2) = halves(w[1].leny, false);

    split4(&mut w, 4, 6, lenx2, leny, lenx, 0, true);
    split4(&mut w, 5, 10, lenx, leny2, 0, leny, true);
    split4(&mut w, 14, 15, lenx, leny, 0, 0, true);

    w[19].x = 0;
    w[19].y = 0;
    w[19].lenx = halves(w[15].lenx, false).0;
    w[19].leny = halves(w[15].leny, false).0;

    w
}

/// Records node `parent` and quarters it into `first..first + 4`. The fourth
/// child is only recorded when `record_fourth` is set; the top-level split
/// leaves its high/high quarter undescribed.
#[allow(clippy::too_many_arguments)]
fn split4(
    w: &mut [WaveletNode; W_TREE_LEN],
    parent: usize,
    first: usize,
    lenx: usize,
    leny: usize,
    x: usize,
    y: usize,
    record_fourth: bool,
) {
    w[parent].x = x;
    w[parent].y = y;
    w[parent].lenx = lenx;
    w[parent].leny = leny;

    w[first].x = x;
    w[first + 2].x = x;
    w[first].y = y;
    w[first + 1].y = y;

    let (left, right) = halves(lenx, parent == 4);
    w[first].lenx = left;
    w[first + 1].lenx = right;
    w[first + 1].x = left + x;
    if record_fourth {
        w[first + 3].lenx = right;
        w[first + 3].x = w[first + 1].x;
    }
    w[first + 2].lenx = left;

    let (top, bottom) = halves(leny, parent == 5);
    w[first].leny = top;
    w[first + 2].leny = bottom;
    w[first + 2].y = top + y;
    if record_fourth {
        w[first + 3].leny = bottom;
        w[first + 3].y = w[first + 2].y;
    }
    w[first + 1].leny = top;
}

fn build_quant_tree(w: &[WaveletNode; W_TREE_LEN]) -> [QuantNode; Q_TREE_LEN] {
    let mut q = [QuantNode::default(); Q_TREE_LEN];
    // Order matters: node 5's leaves overwrite 48..=50 and node 19's
    // overwrite leaf 3.
    split16(&mut q, 3, &w[14], false, false);
    split16(&mut q, 19, &w[4], false, true);
    split16(&mut q, 48, &w[0], false, false);
    split16(&mut q, 35, &w[5], true, false);
    split4_leaves(&mut q, 0, w[19].lenx, w[19].leny, w[19].x, w[19].y);
    q
}

/// Quarters a region into leaves `start..start + 4` (upper-left, upper-right,
/// lower-left, lower-right), odd pixels going to the left and top.
fn split4_leaves(
    q: &mut [QuantNode; Q_TREE_LEN],
    start: usize,
    lenx: usize,
    leny: usize,
    x: usize,
    y: usize,
) {
    let p = start;
    let (left, right) = halves(lenx, false);
    let (top, bottom) = halves(leny, false);

    q[p].x = x;
    q[p + 2].x = x;
    q[p].y = y;
    q[p + 1].y = y;

    q[p].lenx = left;
    q[p + 1].lenx = right;
    q[p + 2].lenx = left;
    q[p + 3].lenx = right;
    q[p + 1].x = x + left;
    q[p + 3].x = q[p + 1].x;

    q[p].leny = top;
    q[p + 1].leny = top;
    q[p + 2].leny = bottom;
    q[p + 3].leny = bottom;
    q[p + 2].y = y + top;
    q[p + 3].y = q[p + 2].y;
}

/// Splits a wavelet node into 16 leaves, four per quarter. `invert_row` and
/// `invert_col` give the odd pixel of the first split to the second half.
fn split16(
    q: &mut [QuantNode; Q_TREE_LEN],
    start: usize,
    node: &WaveletNode,
    invert_row: bool,
    invert_col: bool,
) {
    let (x, y) = (node.x, node.y);
    let (tempx, temp2x) = halves(node.lenx, invert_col);
    let (tempy, temp2y) = halves(node.leny, invert_row);
    let p = start;

    // upper-left quarter
    split4_leaves(q, p, tempx, tempy, x, y);

    // upper-right quarter, odd pixel on the right
    let (left, right) = halves(temp2x, true);
    q[p + 4].x = x + tempx;
    q[p + 6].x = q[p + 4].x;
    q[p + 4].y = y;
    q[p + 5].y = y;
    q[p + 6].y = q[p + 2].y;
    q[p + 7].y = q[p + 2].y;
    q[p + 4].leny = q[p].leny;
    q[p + 5].leny = q[p].leny;
    q[p + 6].leny = q[p + 2].leny;
    q[p + 7].leny = q[p + 2].leny;
    q[p + 4].lenx = left;
    q[p + 5].lenx = right;
    q[p + 6].lenx = left;
    q[p + 7].lenx = right;
    q[p + 5].x = q[p + 4].x + left;
    q[p + 7].x = q[p + 5].x;

    // lower-left quarter, odd pixel at the bottom
    let (top, bottom) = halves(temp2y, true);
    q[p + 8].x = x;
    q[p + 9].x = q[p + 1].x;
    q[p + 10].x = x;
    q[p + 11].x = q[p + 1].x;
    q[p + 8].y = y + tempy;
    q[p + 9].y = q[p + 8].y;
    q[p + 8].lenx = q[p].lenx;
    q[p + 9].lenx = q[p + 1].lenx;
    q[p + 10].lenx = q[p].lenx;
    q[p + 11].lenx = q[p + 1].lenx;
    q[p + 8].leny = top;
    q[p + 9].leny = top;
    q[p + 10].leny = bottom;
    q[p + 11].leny = bottom;
    q[p + 10].y = q[p + 8].y + top;
    q[p + 11].y = q[p + 10].y;

    // lower-right quarter
    q[p + 12].x = q[p + 4].x;
    q[p + 13].x = q[p + 5].x;
    q[p + 14].x = q[p + 4].x;
    q[p + 15].x = q[p + 5].x;
    q[p + 12].y = q[p + 8].y;
    q[p + 13].y = q[p + 8].y;
    q[p + 14].y = q[p + 10].y;
    q[p + 15].y = q[p + 10].y;
    q[p + 12].lenx = q[p + 4].lenx;
    q[p + 13].lenx = q[p + 5].lenx;
    q[p + 14].lenx = q[p + 4].lenx;
    q[p + 15].lenx = q[p + 5].lenx;
    q[p + 12].leny = q[p + 8].leny;
    q[p + 13].leny = q[p + 8].leny;
    q[p + 14].leny = q[p + 10].leny;
    q[p + 15].leny = q[p + 10].leny;
}
