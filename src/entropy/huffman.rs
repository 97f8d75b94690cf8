//! Length-limited canonical Huffman tables built from symbol counts.
use crate::error::{Result, Stage, WsqError};

/// Longest code length a table may carry.
pub const MAX_HUFFBITS: usize = 16;
/// Number of codable symbols.
pub const MAX_HUFFCOUNTS: usize = 256;
/// Histogram length: the codable symbols plus one reserved bucket.
pub const HISTOGRAM_LEN: usize = MAX_HUFFCOUNTS + 1;

/// Symbol counts, indexed by symbol. The last bucket always holds 1 and
/// claims the all-ones codeword of the longest length so no real symbol
/// receives it.
pub type Histogram = [u64; HISTOGRAM_LEN];

pub fn empty_histogram() -> Histogram {
    let mut counts = [0u64; HISTOGRAM_LEN];
    counts[MAX_HUFFCOUNTS] = 1;
    counts
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    /// Number of codes of each length 1..=16.
    bits: [u8; MAX_HUFFBITS],
    /// Symbols ordered by code length, then by symbol.
    values: Vec<u8>,
    /// (code, length) per symbol; length 0 means no code.
    codes: [(u16, u8); MAX_HUFFCOUNTS],
}

impl HuffmanTable {
    pub fn from_histogram(counts: &Histogram) -> Result<Self> {
        let sizes = code_sizes(*counts);

        let mut lengths = [0u32; 2 * MAX_HUFFBITS];
        let mut adjust = false;
        for (symbol, &size) in sizes.iter().enumerate() {
            if size == 0 {
                continue;
            }
            if size > lengths.len() {
                return Err(WsqError::invariant(
                    Stage::Huffman,
                    format!("symbol {symbol} has a code length of {size}"),
                ));
            }
            if symbol < MAX_HUFFCOUNTS {
                lengths[size - 1] += 1;
                adjust |= size > MAX_HUFFBITS;
            }
        }
        if adjust {
            log::debug!("Huffman code lengths exceed {MAX_HUFFBITS} bits, rebalancing");
            // the reserved symbol takes part so the tree stays complete
            lengths[sizes[MAX_HUFFCOUNTS] - 1] += 1;
            limit_lengths(&mut lengths)?;
        }

        let mut bits = [0u8; MAX_HUFFBITS];
        for (dst, &count) in bits.iter_mut().zip(lengths.iter()) {
            *dst = u8::try_from(count).map_err(|_| {
                WsqError::invariant(Stage::Huffman, format!("{count} codes share one length"))
            })?;
        }

        let mut values = Vec::new();
        for size in 1..=2 * MAX_HUFFBITS {
            for (symbol, _) in sizes[..MAX_HUFFCOUNTS]
                .iter()
                .enumerate()
                .filter(|(_, s)| **s == size)
            {
                values.push(symbol as u8);
            }
        }

        let codes = assign_codes(&bits, &values)?;
        Ok(HuffmanTable {
            bits,
            values,
            codes,
        })
    }

    pub fn bits(&self) -> &[u8; MAX_HUFFBITS] {
        &self.bits
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(code, length)` of `symbol`.
    pub fn code(&self, symbol: u8) -> Result<(u16, u8)> {
        match self.codes[symbol as usize] {
            (_, 0) => Err(WsqError::invariant(
                Stage::Huffman,
                format!("no code for symbol {symbol}"),
            )),
            code => Ok(code),
        }
    }
}

/// Canonical codes in increasing length, then table order. An all-ones code
/// would collide with the marker prefix and is rejected.
fn assign_codes(bits: &[u8; MAX_HUFFBITS], values: &[u8]) -> Result<[(u16, u8); MAX_HUFFCOUNTS]> {
    let mut codes = [(0u16, 0u8); MAX_HUFFCOUNTS];
    let mut symbols = values.iter();
    let mut code: u32 = 0;
    for length in 1..=MAX_HUFFBITS as u8 {
        for _ in 0..bits[length as usize - 1] {
            let symbol = *symbols.next().ok_or_else(|| {
                WsqError::invariant(Stage::Huffman, "length counts exceed the symbol list")
            })?;
            if code == (1 << length) - 1 {
                return Err(WsqError::invariant(
                    Stage::Huffman,
                    format!("symbol {symbol} was assigned the all-ones code of length {length}"),
                ));
            }
            codes[symbol as usize] = (code as u16, length);
            code += 1;
        }
        code <<= 1;
    }
    Ok(codes)
}

/// Merges the two least frequent nodes until one remains; every merge adds
/// one bit to all symbols below both nodes.
fn code_sizes(mut freq: Histogram) -> [usize; HISTOGRAM_LEN] {
    let mut sizes = [0usize; HISTOGRAM_LEN];
    let mut others: [Option<usize>; HISTOGRAM_LEN] = [None; HISTOGRAM_LEN];

    while let Some((mut v1, mut v2)) = least_frequent(&freq) {
        freq[v1] += freq[v2];
        freq[v2] = 0;

        sizes[v1] += 1;
        while let Some(next) = others[v1] {
            v1 = next;
            sizes[v1] += 1;
        }
        others[v1] = Some(v2);

        sizes[v2] += 1;
        while let Some(next) = others[v2] {
            v2 = next;
            sizes[v2] += 1;
        }
    }
    sizes
}

/// The two smallest non-zero counts, smallest first. On equal counts the
/// higher symbol is taken as the smaller one. `None` once fewer than two
/// nodes remain.
fn least_frequent(freq: &Histogram) -> Option<(usize, usize)> {
    let mut nonzero = freq.iter().enumerate().filter(|(_, f)| **f != 0);
    let (mut value1, &f1) = nonzero.next()?;
    let mut code1 = f1;
    let mut code2 = u64::MAX;
    let mut value2 = None;

    for (i, &f) in nonzero {
        if value2.is_none() {
            code2 = f;
            value2 = Some(i);
        }
        if code1 < f && code2 < f {
            continue;
        }
        if f < code1 || (f == code1 && i > value1) {
            code2 = code1;
            value2 = Some(value1);
            code1 = f;
            value1 = i;
            continue;
        }
        // tie against the first slot's symbol, not the second
        if f < code2 || (f == code2 && i > value1) {
            code2 = f;
            value2 = Some(i);
        }
    }
    value2.map(|v2| (value1, v2))
}

/// Moves codes longer than 16 bits up the tree: each pair at the deepest
/// length becomes one code a level up plus two codes below the nearest
/// shorter leaf, which is split. The reserved symbol is then dropped from
/// the longest remaining length.
fn limit_lengths(lengths: &mut [u32; 2 * MAX_HUFFBITS]) -> Result<()> {
    let broken = || WsqError::invariant(Stage::Huffman, "code length histogram is not a full tree");

    for i in (MAX_HUFFBITS..2 * MAX_HUFFBITS).rev() {
        while lengths[i] > 0 {
            let mut j = i - 2;
            while lengths[j] == 0 {
                j = j.checked_sub(1).ok_or_else(broken)?;
            }
            lengths[i] = lengths[i].checked_sub(2).ok_or_else(broken)?;
            lengths[i - 1] += 1;
            lengths[j + 1] += 2;
            lengths[j] -= 1;
        }
    }

    let longest = (0..MAX_HUFFBITS)
        .rev()
        .find(|&i| lengths[i] > 0)
        .ok_or_else(broken)?;
    lengths[longest] -= 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(pairs: &[(usize, u64)]) -> Histogram {
        let mut counts = empty_histogram();
        for &(symbol, count) in pairs {
            counts[symbol] = count;
        }
        counts
    }

    fn kraft_sum(table: &HuffmanTable) -> f64 {
        table
            .bits()
            .iter()
            .enumerate()
            .map(|(i, &n)| f64::from(n) * 0.5f64.powi(i as i32 + 1))
            .sum()
    }

    #[test]
    fn test_empty_histogram_gives_empty_table() {
        let table = HuffmanTable::from_histogram(&empty_histogram()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.bits(), &[0; MAX_HUFFBITS]);
        assert!(table.code(180).is_err());
    }

    #[test]
    fn test_single_symbol() {
        let table = HuffmanTable::from_histogram(&histogram(&[(180, 40)])).unwrap();
        assert_eq!(table.values(), &[180]);
        assert_eq!(table.bits()[0], 1);
        assert_eq!(table.code(180).unwrap(), (0, 1));
    }

    #[test]
    fn test_frequent_symbols_get_shorter_codes() {
        let table =
            HuffmanTable::from_histogram(&histogram(&[(1, 5), (180, 100), (181, 20), (179, 20), (101, 1)]))
                .unwrap();
        let len = |s| table.code(s).unwrap().1;
        assert!(len(180) <= len(181));
        assert!(len(181) <= len(1));
        assert!(len(1) <= len(101));
        assert_eq!(table.values()[0], 180);
        // the reserved codeword keeps the code space strictly incomplete
        assert!(kraft_sum(&table) < 1.0);
    }

    #[test]
    fn test_canonical_order() {
        let table = HuffmanTable::from_histogram(&histogram(&[(10, 8), (20, 8), (30, 8), (40, 8)])).unwrap();
        let mut previous: Option<(u16, u8)> = None;
        for &symbol in table.values() {
            let (code, len) = table.code(symbol).unwrap();
            if let Some((prev_code, prev_len)) = previous {
                assert!(len > prev_len || (len == prev_len && code == prev_code + 1));
            }
            previous = Some((code, len));
        }
    }

    #[test]
    fn test_long_codes_are_limited() {
        // fibonacci counts force a maximally skewed tree
        let mut pairs = Vec::new();
        let (mut a, mut b) = (1u64, 1u64);
        for symbol in 1..=30 {
            pairs.push((symbol, a));
            (a, b) = (b, a + b);
        }
        let table = HuffmanTable::from_histogram(&histogram(&pairs)).unwrap();
        assert_eq!(table.values().len(), 30);
        for symbol in 1..=30u8 {
            let (code, len) = table.code(symbol).unwrap();
            assert!((1..=MAX_HUFFBITS as u8).contains(&len));
            assert_ne!(u32::from(code), (1u32 << len) - 1);
        }
        assert!(kraft_sum(&table) <= 1.0);
    }

    #[test]
    fn test_no_all_ones_code() {
        let pairs: Vec<(usize, u64)> = (107..=254).map(|s| (s, (s as u64 % 7) + 1)).collect();
        let table = HuffmanTable::from_histogram(&histogram(&pairs)).unwrap();
        for &symbol in table.values() {
            let (code, len) = table.code(symbol).unwrap();
            assert_ne!(u32::from(code), (1u32 << len) - 1);
        }
    }

    #[test]
    fn test_least_frequent_tie_prefers_higher_symbol() {
        let counts = histogram(&[(3, 2), (7, 2), (9, 5)]);
        assert_eq!(least_frequent(&counts), Some((MAX_HUFFCOUNTS, 7)));
        let mut counts = counts;
        counts[MAX_HUFFCOUNTS] = 0;
        assert_eq!(least_frequent(&counts), Some((7, 3)));
    }
}
