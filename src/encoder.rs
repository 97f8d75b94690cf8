//! Validated configuration and the end-to-end encode pipeline.
use std::io::{Read, Write};

use crate::codestream::{Codestream, NistComment, MAX_COMMENT_LEN};
use crate::dwt::{FloatImage, TwoChannelSubbandCoder};
use crate::entropy::histogram;
use crate::entropy::huffman::HuffmanTable;
use crate::error::{Result, WsqError};
use crate::quantization::{quantize, QuantizationParams, SubbandStats};
use crate::raster::Raster;
use crate::tree::SubbandTree;

pub const MIN_QUALITY: f32 = 0.75;
pub const MAX_QUALITY: f32 = 2.2;
pub const DEFAULT_QUALITY: f32 = MAX_QUALITY;
pub const DEFAULT_PPI: u32 = 500;
/// Dimensions are stored as 16-bit fields in the frame header.
pub const MAX_DIMENSION: usize = u16::MAX as usize;

/// Progress reported by [`Encoder::encode_observed`], in pipeline order.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum EncodeEvent {
    Normalized { shift: f32, scale: f32 },
    Decomposed,
    VariancesComputed,
    Quantized { coded_subbands: usize, block_sizes: [usize; 3] },
    HeadersWritten { bytes: usize },
    BlockWritten { block: usize, bytes: usize },
    Finished { bytes: usize },
}

#[derive(Debug, Clone)]
pub struct EncoderBuilder {
    width: usize,
    height: usize,
    quality: f32,
    ppi: u32,
    include_metadata: bool,
    comment: String,
}

impl EncoderBuilder {
    /// Target bit rate in bits per pixel, 0.75 to 2.2 inclusive.
    pub fn quality(mut self, quality: f32) -> Result<Self> {
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
            return Err(WsqError::config(format!(
                "quality {quality} is outside {MIN_QUALITY}..={MAX_QUALITY}"
            )));
        }
        self.quality = quality;
        Ok(self)
    }

    pub fn ppi(mut self, ppi: u32) -> Result<Self> {
        if ppi == 0 {
            return Err(WsqError::config("ppi must be positive"));
        }
        self.ppi = ppi;
        Ok(self)
    }

    /// Whether the NIST comment describing the image precedes the tables.
    pub fn include_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Result<Self> {
        let comment = comment.into();
        if comment.len() > MAX_COMMENT_LEN {
            return Err(WsqError::config(format!(
                "comment of {} bytes exceeds {MAX_COMMENT_LEN}",
                comment.len()
            )));
        }
        self.comment = comment;
        Ok(self)
    }

    pub fn build(self) -> Encoder {
        Encoder {
            width: self.width,
            height: self.height,
            quality: self.quality,
            ppi: self.ppi,
            include_metadata: self.include_metadata,
            comment: self.comment,
            coder: TwoChannelSubbandCoder::default(),
        }
    }
}

/// Immutable WSQ encoder for one image size. Each call owns its buffers, so
/// one encoder can serve many threads.
#[derive(Debug, Clone)]
pub struct Encoder {
    width: usize,
    height: usize,
    quality: f32,
    ppi: u32,
    include_metadata: bool,
    comment: String,
    coder: TwoChannelSubbandCoder,
}

impl Encoder {
    pub fn builder(width: usize, height: usize) -> Result<EncoderBuilder> {
        for (name, value) in [("width", width), ("height", height)] {
            if value == 0 || value > MAX_DIMENSION {
                return Err(WsqError::config(format!(
                    "{name} {value} is outside 1..={MAX_DIMENSION}"
                )));
            }
        }
        Ok(EncoderBuilder {
            width,
            height,
            quality: DEFAULT_QUALITY,
            ppi: DEFAULT_PPI,
            include_metadata: true,
            comment: String::new(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    pub fn ppi(&self) -> u32 {
        self.ppi
    }

    /// Encodes `pixels`, row-major with one byte per pixel.
    pub fn encode(&self, pixels: &[u8]) -> Result<Vec<u8>> {
        self.encode_observed(pixels, &mut |_| {})
    }

    /// Reads `input` to the end, encodes it and writes the result to
    /// `output`. Nothing is written unless encoding succeeds, and `output`
    /// is flushed on every path. The first error wins.
    pub fn encode_stream(&self, mut input: impl Read, mut output: impl Write) -> Result<()> {
        let mut pixels = Vec::with_capacity(self.width * self.height);
        let written = input
            .read_to_end(&mut pixels)
            .map_err(WsqError::from)
            .and_then(|_| self.encode(&pixels))
            .and_then(|bytes| Ok(output.write_all(&bytes)?));
        let flushed = output.flush();
        written?;
        flushed?;
        Ok(())
    }

    /// [`Encoder::encode`] reporting each finished stage to `observer`.
    pub fn encode_observed(
        &self,
        pixels: &[u8],
        observer: &mut dyn FnMut(&EncodeEvent),
    ) -> Result<Vec<u8>> {
        let raster = Raster::new(pixels.to_vec(), self.width, self.height, self.ppi)?;
        self.run(&raster, observer)
    }

    /// Encodes a raster of the configured size. Its own ppi is written to
    /// the metadata.
    pub fn encode_raster(&self, raster: &Raster) -> Result<Vec<u8>> {
        if (raster.width(), raster.height()) != (self.width, self.height) {
            return Err(WsqError::config(format!(
                "raster is {}x{}, encoder expects {}x{}",
                raster.width(),
                raster.height(),
                self.width,
                self.height
            )));
        }
        self.run(raster, &mut |_| {})
    }

    fn run(&self, raster: &Raster, observer: &mut dyn FnMut(&EncodeEvent)) -> Result<Vec<u8>> {
        let (width, height) = (raster.width(), raster.height());

        let (mut image, norm) = FloatImage::from_raster(raster)?;
        log::info!("Pixels normalized with shift {} and scale {}", norm.shift, norm.scale);
        observer(&EncodeEvent::Normalized {
            shift: norm.shift,
            scale: norm.scale,
        });

        let tree = SubbandTree::build(width, height);
        image.decompose(&tree.wavelet, &self.coder);
        log::info!("WSQ decomposition of image finished");
        observer(&EncodeEvent::Decomposed);

        let stats = SubbandStats::analyse(&image, &tree.quant);
        log::info!("Subband variances computed");
        observer(&EncodeEvent::VariancesComputed);

        let params = QuantizationParams::allocate(self.quality, &stats);
        let quantized = quantize(&image, &tree, &params)?;
        let coded_subbands = params.step.iter().filter(|s| **s != 0.0).count();
        log::info!(
            "Quantized {coded_subbands} subbands into blocks of {:?} samples",
            quantized.blocks.0
        );
        observer(&EncodeEvent::Quantized {
            coded_subbands,
            block_sizes: quantized.blocks.0,
        });

        let mut stream = Codestream::new();
        stream.start_of_image()?;
        if self.include_metadata {
            let nist = NistComment {
                width,
                height,
                ppi: raster.ppi(),
                bitrate: self.quality,
            };
            stream.comment(nist.text().as_bytes())?;
            stream.comment(self.comment.as_bytes())?;
        } else if !self.comment.is_empty() {
            stream.comment(self.comment.as_bytes())?;
        }
        stream.transform_table(self.coder.lowpass(), self.coder.highpass())?;
        stream.quantization_table(&params)?;
        stream.frame_header(width, height, &norm)?;
        log::info!("SOI, tables and frame header written");
        observer(&EncodeEvent::HeadersWritten {
            bytes: stream.len(),
        });

        // block 1 has its own table, blocks 2 and 3 share the second one
        let groups: [(u8, &[usize]); 2] = [(0, &[0]), (1, &[1, 2])];
        for (table_id, blocks) in groups {
            let samples: Vec<&[i32]> = blocks.iter().map(|&b| quantized.block(b)).collect();
            let table = HuffmanTable::from_histogram(&histogram(&samples)?)?;
            stream.huffman_table(table_id, &table)?;
            log::info!("Huffman table {table_id} generated and written");
            for (&block, block_samples) in blocks.iter().zip(samples) {
                let start = stream.len();
                stream.block_header(table_id)?;
                stream.block(block_samples, &table)?;
                log::info!("Block {} compressed and written", block + 1);
                observer(&EncodeEvent::BlockWritten {
                    block,
                    bytes: stream.len() - start,
                });
            }
        }

        stream.end_of_image()?;
        let bytes = stream.into_bytes();
        log::info!("Encoded {width}x{height} image into {} bytes", bytes.len());
        observer(&EncodeEvent::Finished { bytes: bytes.len() });
        Ok(bytes)
    }
}
