//! MSB-first bit packing for entropy-coded blocks.
//!
//! Every `0xFF` byte in block data is followed by a stuffed `0x00` so that a
//! reader never mistakes coded bits for a marker.

/// Appends packed bits to a borrowed output buffer.
pub struct BitWriter<'a> {
    output: &'a mut Vec<u8>,
    buf: u8,
    bits_used: u8,
}

impl<'a> BitWriter<'a> {
    pub fn new(output: &'a mut Vec<u8>) -> Self {
        Self {
            output,
            buf: 0,
            bits_used: 0,
        }
    }

    /// Write the low `count` bits (0-16) of `value`, most significant first.
    pub fn write_bits(&mut self, value: u16, count: u8) {
        debug_assert!(count <= 16);
        for i in (0..count).rev() {
            let bit = (value >> i) & 1;
            self.buf = (self.buf << 1) | bit as u8;
            self.bits_used += 1;
            if self.bits_used == 8 {
                self.emit_byte(self.buf);
                self.buf = 0;
                self.bits_used = 0;
            }
        }
    }

    /// Pads the last partial byte with 1-bits and writes it out.
    pub fn flush(mut self) {
        if self.bits_used > 0 {
            let remaining = 8 - self.bits_used;
            let byte = (self.buf << remaining) | ((1u8 << remaining) - 1);
            self.emit_byte(byte);
        }
    }

    fn emit_byte(&mut self, byte: u8) {
        self.output.push(byte);
        if byte == 0xFF {
            self.output.push(0x00);
        }
    }
}
