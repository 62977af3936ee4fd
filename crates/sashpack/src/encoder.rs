//! Building wire buffers, one homogeneous stream at a time.

/// A growable four-stream buffer that materialises the wire layout on
/// [`finalize`](Encoder::finalize).
///
/// Pushes into the individual streams may arrive in any order; only the
/// relative order within a stream is significant.
#[derive(Debug, Default)]
pub struct Encoder {
    words: Vec<u32>,
    halves: Vec<u16>,
    bytes: Vec<u8>,
    text: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total byte length of the finalised buffer, header included.
    pub fn byte_len(&self) -> usize {
        12 + self.words.len() * 4 + self.halves.len() * 2 + self.bytes.len() + self.text.len()
    }

    pub fn push_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    /// Append a raw run to the byte stream.
    pub fn push_bytes(&mut self, run: &[u8]) {
        self.bytes.extend_from_slice(run);
    }

    pub fn push_u16(&mut self, value: u16) {
        self.halves.push(value);
    }

    pub fn push_u32(&mut self, value: u32) {
        self.words.push(value);
    }

    /// 64-bit values travel as two words, low half first.
    pub fn push_u64(&mut self, value: u64) {
        self.push_u32((value & 0xFFFF_FFFF) as u32);
        self.push_u32((value >> 32) as u32);
    }

    /// 128-bit values travel as two 64-bit halves, low half first.
    pub fn push_u128(&mut self, value: u128) {
        self.push_u64((value & 0xFFFF_FFFF_FFFF_FFFF) as u64);
        self.push_u64((value >> 64) as u64);
    }

    /// A string is a `u32` length in the word stream plus UTF-8 text bytes.
    pub fn push_str(&mut self, value: &str) {
        self.push_u32(value.len() as u32);
        self.text.extend_from_slice(value.as_bytes());
    }

    /// Append another encoder's streams after this one's.
    pub fn extend(&mut self, other: &Encoder) {
        self.words.extend_from_slice(&other.words);
        self.halves.extend_from_slice(&other.halves);
        self.bytes.extend_from_slice(&other.bytes);
        self.text.extend_from_slice(&other.text);
    }

    /// Materialise the buffer: a 12-byte header holding the u16, u8, and
    /// text section offsets, then the four sections back to back.
    pub fn finalize(self) -> Vec<u8> {
        let u16_offset = 12 + self.words.len() * 4;
        let u8_offset = u16_offset + self.halves.len() * 2;
        let str_offset = u8_offset + self.bytes.len();

        let mut out = Vec::with_capacity(str_offset + self.text.len());
        out.extend_from_slice(&(u16_offset as u32).to_le_bytes());
        out.extend_from_slice(&(u8_offset as u32).to_le_bytes());
        out.extend_from_slice(&(str_offset as u32).to_le_bytes());

        for word in &self.words {
            out.extend_from_slice(&word.to_le_bytes());
        }
        for half in &self.halves {
            out.extend_from_slice(&half.to_le_bytes());
        }
        out.extend_from_slice(&self.bytes);
        out.extend_from_slice(&self.text);

        out
    }
}
