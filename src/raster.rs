//! 8-bit grayscale source image.
use crate::error::{Result, WsqError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: usize,
    height: usize,
    ppi: u32,
    pixels: Vec<u8>,
}

impl Raster {
    /// Wraps `pixels` (row-major, one byte per pixel). The buffer length must
    /// be exactly `width * height`.
    pub fn new(pixels: Vec<u8>, width: usize, height: usize, ppi: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(WsqError::config(format!(
                "raster dimensions must be positive, got {width}x{height}"
            )));
        }
        let expected = width
            .checked_mul(height)
            .ok_or_else(|| WsqError::config(format!("{width}x{height} overflows usize")))?;
        if pixels.len() != expected {
            return Err(WsqError::config(format!(
                "pixel buffer holds {} bytes, {width}x{height} needs {expected}",
                pixels.len()
            )));
        }
        Ok(Raster {
            width,
            height,
            ppi,
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn ppi(&self) -> u32 {
        self.ppi
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_accepts_matching_buffer() {
        let raster = Raster::new(vec![7; 12], 4, 3, 500).unwrap();
        assert_eq!(raster.width(), 4);
        assert_eq!(raster.height(), 3);
        assert_eq!(raster.ppi(), 500);
        assert_eq!(raster.pixels().len(), 12);
    }

    #[test]
    fn test_new_rejects_length_mismatch() {
        let err = Raster::new(vec![0; 11], 4, 3, 500).unwrap_err();
        assert!(matches!(err, WsqError::Configuration(_)));
    }

    #[test]
    fn test_new_rejects_zero_dimension() {
        assert!(Raster::new(vec![], 0, 3, 500).is_err());
        assert!(Raster::new(vec![], 3, 0, 500).is_err());
    }
}
