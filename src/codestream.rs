//! Marker segments of a WSQ file.
//!
//! Every multi-byte field is big-endian. Real-valued table entries are stored
//! as a decimal exponent byte plus an unsigned magnitude: the value is scaled
//! by ten until the next step would reach the field's limit, so that
//! `value ~= magnitude / 10^exponent` with as many digits as fit.
use byteorder::{BigEndian, WriteBytesExt};

use crate::dwt::{Filter, Normalization};
use crate::entropy::huffman::{HuffmanTable, MAX_HUFFBITS};
use crate::entropy::{compress_block, markers};
use crate::error::{Result, Stage, WsqError};
use crate::quantization::QuantizationParams;
use crate::tree::{NUM_SUBBANDS, Q_TREE_LEN};

/// Largest payload of a single COM segment.
pub const MAX_COMMENT_LEN: usize = u16::MAX as usize - 2;

const DTT_LEN: u16 = 58;
const DQT_LEN: u16 = 389;
const SOF_LEN: u16 = 17;
const SOB_LEN: u16 = 3;
/// Bin centre parameter `C`, stored as 44 / 10^2.
const BIN_CENTRE_EXPONENT: u8 = 2;
const BIN_CENTRE: u16 = 44;
/// Pixel bounds and encoder identification of the frame header.
const BLACK: u8 = 0;
const WHITE: u8 = 255;
const SOFTWARE_VERSION: u8 = 2;
const SOFTWARE_ID: u16 = 0x2B8E;

/// Fields of the NIST comment written ahead of the tables.
#[derive(Debug, Clone, PartialEq)]
pub struct NistComment {
    pub width: usize,
    pub height: usize,
    pub ppi: u32,
    pub bitrate: f32,
}

impl NistComment {
    /// `KEY VALUE` lines, form-url-encoded, each ending in a newline. The
    /// first entry counts all entries including itself.
    pub fn text(&self) -> String {
        let entries = [
            ("PIX_WIDTH", self.width.to_string()),
            ("PIX_HEIGHT", self.height.to_string()),
            ("PIX_DEPTH", "8".to_string()),
            ("PPI", self.ppi.to_string()),
            ("LOSSY", "1".to_string()),
            ("COLORSPACE", "GRAY".to_string()),
            ("COMPRESSION", "WSQ".to_string()),
            ("WSQ_BITRATE", format!("{:?}", self.bitrate)),
        ];
        let mut text = format!("NIST_COM {}\n", entries.len() + 1);
        for (key, value) in entries {
            text.push_str(&form_urlencode(key));
            text.push(' ');
            text.push_str(&form_urlencode(&value));
            text.push('\n');
        }
        text
    }
}

/// `application/x-www-form-urlencoded` escaping of UTF-8 text.
fn form_urlencode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'-' | b'*' | b'_' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Output buffer that knows how to lay out each segment.
#[derive(Debug, Default)]
pub struct Codestream {
    buf: Vec<u8>,
}

impl Codestream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn start_of_image(&mut self) -> Result<()> {
        self.buf.write_u16::<BigEndian>(markers::SOI)?;
        Ok(())
    }

    pub fn end_of_image(&mut self) -> Result<()> {
        self.buf.write_u16::<BigEndian>(markers::EOI)?;
        Ok(())
    }

    pub fn comment(&mut self, text: &[u8]) -> Result<()> {
        let len = u16::try_from(text.len() + 2).map_err(|_| {
            WsqError::invariant(
                Stage::Serialize,
                format!("comment of {} bytes does not fit one segment", text.len()),
            )
        })?;
        self.buf.write_u16::<BigEndian>(markers::COM)?;
        self.buf.write_u16::<BigEndian>(len)?;
        self.buf.extend_from_slice(text);
        Ok(())
    }

    /// Upper halves of both analysis filters, lowpass first.
    pub fn transform_table(&mut self, lowpass: &Filter, highpass: &Filter) -> Result<()> {
        self.buf.write_u16::<BigEndian>(markers::DTT)?;
        self.buf.write_u16::<BigEndian>(DTT_LEN)?;
        self.buf.write_u8(lowpass.len() as u8)?;
        self.buf.write_u8(highpass.len() as u8)?;
        for &tap in lowpass.upper_half().iter().chain(highpass.upper_half()) {
            let sign = u8::from(tap < 0.0);
            let (exponent, magnitude) = scale_u32(tap.abs()).ok_or_else(|| {
                WsqError::invariant(
                    Stage::Serialize,
                    format!("filter coefficient {tap} is too large to encode"),
                )
            })?;
            self.buf.write_u8(sign)?;
            self.buf.write_u8(exponent)?;
            self.buf.write_u32::<BigEndian>(magnitude)?;
        }
        Ok(())
    }

    /// Step and zero-bin width of all 64 subbands; dropped and uncoded
    /// subbands are written as zero.
    pub fn quantization_table(&mut self, params: &QuantizationParams) -> Result<()> {
        self.buf.write_u16::<BigEndian>(markers::DQT)?;
        self.buf.write_u16::<BigEndian>(DQT_LEN)?;
        self.buf.write_u8(BIN_CENTRE_EXPONENT)?;
        self.buf.write_u16::<BigEndian>(BIN_CENTRE)?;
        for subband in 0..Q_TREE_LEN {
            let (step, zero_bin) = if subband < NUM_SUBBANDS && params.step[subband] != 0.0 {
                (params.step[subband], params.zero_bin[subband])
            } else {
                (0.0, 0.0)
            };
            for (name, value) in [("step", step), ("zero bin", zero_bin)] {
                let (exponent, magnitude) = scale_u16(value).ok_or_else(|| {
                    WsqError::invariant(
                        Stage::Serialize,
                        format!("{name} {value} of subband {subband} is too large to encode"),
                    )
                })?;
                self.buf.write_u8(exponent)?;
                self.buf.write_u16::<BigEndian>(magnitude)?;
            }
        }
        Ok(())
    }

    pub fn frame_header(&mut self, width: usize, height: usize, norm: &Normalization) -> Result<()> {
        let dimension = |value: usize, name: &str| {
            u16::try_from(value).map_err(|_| {
                WsqError::invariant(Stage::Serialize, format!("{name} {value} does not fit 16 bits"))
            })
        };
        let height = dimension(height, "height")?;
        let width = dimension(width, "width")?;

        self.buf.write_u16::<BigEndian>(markers::SOF)?;
        self.buf.write_u16::<BigEndian>(SOF_LEN)?;
        self.buf.write_u8(BLACK)?;
        self.buf.write_u8(WHITE)?;
        self.buf.write_u16::<BigEndian>(height)?;
        self.buf.write_u16::<BigEndian>(width)?;
        for (name, value) in [("shift", norm.shift), ("scale", norm.scale)] {
            let (exponent, magnitude) = scale_u16(value).ok_or_else(|| {
                WsqError::invariant(Stage::Serialize, format!("{name} {value} is too large to encode"))
            })?;
            self.buf.write_u8(exponent)?;
            self.buf.write_u16::<BigEndian>(magnitude)?;
        }
        self.buf.write_u8(SOFTWARE_VERSION)?;
        self.buf.write_u16::<BigEndian>(SOFTWARE_ID)?;
        Ok(())
    }

    pub fn huffman_table(&mut self, id: u8, table: &HuffmanTable) -> Result<()> {
        let len = 3 + MAX_HUFFBITS + table.values().len();
        self.buf.write_u16::<BigEndian>(markers::DHT)?;
        self.buf.write_u16::<BigEndian>(len as u16)?;
        self.buf.write_u8(id)?;
        self.buf.extend_from_slice(table.bits());
        self.buf.extend_from_slice(table.values());
        Ok(())
    }

    pub fn block_header(&mut self, table_id: u8) -> Result<()> {
        self.buf.write_u16::<BigEndian>(markers::SOB)?;
        self.buf.write_u16::<BigEndian>(SOB_LEN)?;
        self.buf.write_u8(table_id)?;
        Ok(())
    }

    pub fn block(&mut self, samples: &[i32], table: &HuffmanTable) -> Result<()> {
        compress_block(&mut self.buf, samples, table)
    }
}

/// Exponent and 32-bit magnitude of a non-negative value, `None` if it is
/// already at the limit.
fn scale_u32(value: f64) -> Option<(u8, u32)> {
    const LIMIT: f64 = 4294967295.0;
    if value == 0.0 {
        return Some((0, 0));
    }
    if value >= LIMIT {
        return None;
    }
    let mut scaled = value;
    let mut exponent = 0u8;
    while scaled < LIMIT {
        scaled *= 10.0;
        exponent += 1;
    }
    Some((exponent - 1, (scaled / 10.0 + 0.5).floor() as u32))
}

/// Single precision counterpart of [`scale_u32`] for 16-bit fields.
fn scale_u16(value: f32) -> Option<(u8, u16)> {
    const LIMIT: f32 = 65535.0;
    if value == 0.0 {
        return Some((0, 0));
    }
    if value >= LIMIT {
        return None;
    }
    let mut scaled = value;
    let mut exponent = 0u8;
    while scaled < LIMIT {
        scaled *= 10.0;
        exponent += 1;
    }
    Some((exponent - 1, (scaled / 10.0 + 0.5).floor() as u16))
}
