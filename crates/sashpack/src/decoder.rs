//! Reading wire buffers produced by [`Encoder`](crate::Encoder).

use bytemuck::pod_read_unaligned;

use crate::types::Error;
use crate::types::Result;

/// A borrowed view over the four sections of a wire buffer.
///
/// Each stream is consumed independently; exhausting one stream does not
/// affect the others. The buffer is not required to be aligned — scalar
/// reads go through unaligned loads.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoder<'a> {
    words: &'a [u8],
    halves: &'a [u8],
    bytes: &'a [u8],
    text: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Parse the section header and split the buffer into streams.
    ///
    /// Rejects buffers shorter than the header and headers whose offsets
    /// are out of order, out of bounds, or not a whole number of words /
    /// halves.
    pub fn from_bytes(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < 12 {
            return Err(Error::MessageTooShort { expected: 12, actual: buf.len() });
        }

        let u16_offset: u32 = pod_read_unaligned(&buf[0..4]);
        let u8_offset: u32 = pod_read_unaligned(&buf[4..8]);
        let str_offset: u32 = pod_read_unaligned(&buf[8..12]);

        let total_len = buf.len();
        let bad = u16_offset < 12
            || u8_offset < u16_offset
            || str_offset < u8_offset
            || str_offset as usize > total_len
            || (u16_offset - 12) % 4 != 0
            || (u8_offset - u16_offset) % 2 != 0;
        if bad {
            return Err(Error::InvalidHeader { u16_offset, u8_offset, str_offset, total_len });
        }

        Ok(Self {
            words: &buf[12..u16_offset as usize],
            halves: &buf[u16_offset as usize..u8_offset as usize],
            bytes: &buf[u8_offset as usize..str_offset as usize],
            text: &buf[str_offset as usize..],
        })
    }

    pub fn take_u8(&mut self) -> Result<u8> {
        let (&first, rest) = self.bytes.split_first().ok_or(Error::BytesExhausted)?;
        self.bytes = rest;
        Ok(first)
    }

    /// Take `n` raw bytes from the byte stream.
    pub fn take_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let (run, rest) = self.bytes.split_at_checked(n).ok_or(Error::BytesExhausted)?;
        self.bytes = rest;
        Ok(run)
    }

    pub fn skip_bytes(&mut self, n: usize) -> Result<()> {
        self.take_bytes(n).map(|_| ())
    }

    pub fn take_u16(&mut self) -> Result<u16> {
        let (half, rest) = self.halves.split_at_checked(2).ok_or(Error::HalvesExhausted)?;
        self.halves = rest;
        Ok(pod_read_unaligned(half))
    }

    pub fn take_u32(&mut self) -> Result<u32> {
        let (word, rest) = self.words.split_at_checked(4).ok_or(Error::WordsExhausted)?;
        self.words = rest;
        Ok(pod_read_unaligned(word))
    }

    /// 64-bit values travel as two words, low half first.
    pub fn take_u64(&mut self) -> Result<u64> {
        let low = self.take_u32()? as u64;
        let high = self.take_u32()? as u64;
        Ok((high << 32) | low)
    }

    /// 128-bit values travel as two 64-bit halves, low half first.
    pub fn take_u128(&mut self) -> Result<u128> {
        let low = self.take_u64()? as u128;
        let high = self.take_u64()? as u128;
        Ok((high << 64) | low)
    }

    /// A string is a `u32` length in the word stream plus UTF-8 text bytes.
    pub fn take_str(&mut self) -> Result<&'a str> {
        let len = self.take_u32()? as usize;
        let actual = self.text.len();
        let (run, rest) = self
            .text
            .split_at_checked(len)
            .ok_or(Error::TextTooShort { expected: len, actual })?;
        let s = std::str::from_utf8(run)
            .map_err(|e| Error::InvalidUtf8 { position: e.valid_up_to() })?;
        self.text = rest;
        Ok(s)
    }

    /// True while at least one whole word remains in the word stream.
    pub fn has_more_words(&self) -> bool {
        self.words.len() >= 4
    }

    /// Bytes remaining in the byte stream.
    pub fn remaining_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// True once every stream has been fully consumed.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.halves.is_empty() && self.bytes.is_empty() && self.text.is_empty()
    }
}
