//! Module for entropy coding of quantized blocks using Huffman Tables
//!
//! A block is scanned as a sequence of tokens: in-range coefficients map to
//! one symbol, zero runs up to 100 map to their length, and everything else
//! is an escape symbol followed by 8 or 16 raw bits.
//!
//! | symbol    | meaning                                        |
//! |-----------|------------------------------------------------|
//! | 1..=100   | zero run of that length                        |
//! | 101 / 102 | positive / negative coefficient, 8 raw bits    |
//! | 103 / 104 | positive / negative coefficient, 16 raw bits   |
//! | 105 / 106 | zero run, 8 / 16 raw bits                      |
//! | 107..=254 | coefficient `v` in -73..=74, coded as `v + 180`|
pub mod bitio;
pub mod huffman;

use crate::entropy::bitio::BitWriter;
use crate::entropy::huffman::{empty_histogram, Histogram, HuffmanTable};
use crate::error::{Result, Stage, WsqError};

/// Largest coefficient coded without an escape.
pub const MAX_COEFF: i32 = 74;
/// Longest zero run coded without an escape.
pub const MAX_ZERO_RUN: u32 = 100;
const COEFF_OFFSET: i32 = 180;

pub mod markers {
    /// Start of image
    pub const SOI: u16 = 0xFFA0;
    /// End of image
    pub const EOI: u16 = 0xFFA1;
    /// Start of frame
    pub const SOF: u16 = 0xFFA2;
    /// Start of block
    pub const SOB: u16 = 0xFFA3;
    /// Define transform table
    pub const DTT: u16 = 0xFFA4;
    /// Define quantization table
    pub const DQT: u16 = 0xFFA5;
    /// Define Huffman table(s)
    pub const DHT: u16 = 0xFFA6;
    /// Comment
    pub const COM: u16 = 0xFFA8;
}

mod symbols {
    pub const POS_ESC_8: u8 = 101;
    pub const NEG_ESC_8: u8 = 102;
    pub const POS_ESC_16: u8 = 103;
    pub const NEG_ESC_16: u8 = 104;
    pub const RUN_ESC_8: u8 = 105;
    pub const RUN_ESC_16: u8 = 106;
}

/// One Huffman symbol, optionally followed by raw bits `(value, count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub symbol: u8,
    pub raw: Option<(u16, u8)>,
}

impl Token {
    fn plain(symbol: u8) -> Self {
        Token { symbol, raw: None }
    }

    fn escaped(symbol: u8, value: u32, count: u8) -> Self {
        Token {
            symbol,
            raw: Some((value as u16, count)),
        }
    }

    fn coefficient(v: i32) -> Result<Self> {
        use symbols::*;
        let magnitude = v.unsigned_abs();
        if magnitude > u32::from(u16::MAX) {
            return Err(WsqError::invariant(
                Stage::Huffman,
                format!("coefficient {v} exceeds the 16-bit escape range"),
            ));
        }
        let token = if v > MAX_COEFF {
            if v > 255 {
                Token::escaped(POS_ESC_16, magnitude, 16)
            } else {
                Token::escaped(POS_ESC_8, magnitude, 8)
            }
        } else if v < 1 - MAX_COEFF {
            if v < -255 {
                Token::escaped(NEG_ESC_16, magnitude, 16)
            } else {
                Token::escaped(NEG_ESC_8, magnitude, 8)
            }
        } else {
            Token::plain((v + COEFF_OFFSET) as u8)
        };
        Ok(token)
    }

    fn zero_run(length: u32) -> Result<Self> {
        use symbols::*;
        if length <= MAX_ZERO_RUN {
            Ok(Token::plain(length as u8))
        } else if length <= 0xFF {
            Ok(Token::escaped(RUN_ESC_8, length, 8))
        } else if length <= 0xFFFF {
            Ok(Token::escaped(RUN_ESC_16, length, 16))
        } else {
            Err(WsqError::invariant(
                Stage::Huffman,
                format!("zero run of {length} exceeds the 16-bit escape range"),
            ))
        }
    }
}

/// Feeds the tokens of `block` to `sink` in stream order. Zero runs are cut
/// at 65535 samples.
pub fn tokenize(block: &[i32], mut sink: impl FnMut(Token)) -> Result<()> {
    let mut run: Option<u32> = None;
    for &v in block {
        match run {
            Some(length) if v == 0 && length < 0xFFFF => run = Some(length + 1),
            Some(length) => {
                sink(Token::zero_run(length)?);
                if v == 0 {
                    run = Some(1);
                } else {
                    sink(Token::coefficient(v)?);
                    run = None;
                }
            }
            None if v == 0 => run = Some(1),
            None => sink(Token::coefficient(v)?),
        }
    }
    if let Some(length) = run {
        sink(Token::zero_run(length)?);
    }
    Ok(())
}

/// Symbol counts over all `blocks`, which share one table.
pub fn histogram(blocks: &[&[i32]]) -> Result<Histogram> {
    let mut counts = empty_histogram();
    for block in blocks {
        tokenize(block, |token| counts[token.symbol as usize] += 1)?;
    }
    Ok(counts)
}

/// Appends the coded bits of `block` to `output`, padded to a whole byte.
pub fn compress_block(output: &mut Vec<u8>, block: &[i32], table: &HuffmanTable) -> Result<()> {
    let start = output.len();
    let mut writer = BitWriter::new(output);
    let mut missing = None;
    tokenize(block, |token| {
        if missing.is_some() {
            return;
        }
        match table.code(token.symbol) {
            Ok((code, length)) => {
                writer.write_bits(code, length);
                if let Some((value, count)) = token.raw {
                    writer.write_bits(value, count);
                }
            }
            Err(e) => missing = Some(e),
        }
    })?;
    writer.flush();
    if let Some(e) = missing {
        return Err(e);
    }
    log::trace!("Compressed {} samples into {} bytes", block.len(), output.len() - start);
    Ok(())
}
