//! Error type shared by every stage of the encoder.
use thiserror::Error;

/// Pipeline stage that detected a broken invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalize,
    Quantize,
    Huffman,
    Serialize,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Normalize => "normalize",
            Stage::Quantize => "quantize",
            Stage::Huffman => "huffman",
            Stage::Serialize => "serialize",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WsqError {
    /// Invalid builder parameter or pixel buffer that does not match the
    /// configured dimensions.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An algorithmic invariant failed. Fatal for the current encode call.
    #[error("internal invariant violated during {stage}: {detail}")]
    InternalInvariant { stage: Stage, detail: String },

    /// Reading the input or writing the output failed.
    #[error("sink error: {0}")]
    Sink(#[from] std::io::Error),
}

impl WsqError {
    pub(crate) fn config(detail: impl Into<String>) -> Self {
        WsqError::Configuration(detail.into())
    }

    pub(crate) fn invariant(stage: Stage, detail: impl Into<String>) -> Self {
        WsqError::InternalInvariant {
            stage,
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WsqError>;
