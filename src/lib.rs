//! Wavelet Scalar Quantization (WSQ) encoder for 8-bit grayscale
//! fingerprint images.
//!
//! ```no_run
//! use wsq_encoder::Encoder;
//!
//! # fn main() -> wsq_encoder::Result<()> {
//! let pixels = vec![128u8; 500 * 500];
//! let encoder = Encoder::builder(500, 500)?.quality(0.75)?.build();
//! let wsq = encoder.encode(&pixels)?;
//! # Ok(())
//! # }
//! ```
pub mod codestream;
pub mod dwt;
pub mod encoder;
pub mod entropy;
pub mod error;
pub mod quantization;
pub mod raster;
pub mod tree;

pub use crate::encoder::{EncodeEvent, Encoder, EncoderBuilder};
pub use crate::error::{Result, Stage, WsqError};
pub use crate::raster::Raster;
