//! Streaming MD5 digest used to fingerprint bundle payloads and firmware
//! assets.
//!
//! The digest is a content fingerprint for file names and deduplication,
//! not a security boundary. It is computed incrementally so callers can
//! feed bytes as they arrive (for example while draining a download)
//! without buffering the whole message.

use std::io::{ErrorKind, Read};

use crate::error::Result;

/// Initial state words (RFC 1321 section 3.3).
const INITIAL_STATE: [u32; 4] = [0x6745_2301, 0xefcd_ab89, 0x98ba_dcfe, 0x1032_5476];

/// Per-step additive constants, in step order across all four rounds.
#[rustfmt::skip]
const SINE_TABLE: [u32; 64] = [
    0xd76a_a478, 0xe8c7_b756, 0x2420_70db, 0xc1bd_ceee,
    0xf57c_0faf, 0x4787_c62a, 0xa830_4613, 0xfd46_9501,
    0x6980_98d8, 0x8b44_f7af, 0xffff_5bb1, 0x895c_d7be,
    0x6b90_1122, 0xfd98_7193, 0xa679_438e, 0x49b4_0821,
    0xf61e_2562, 0xc040_b340, 0x265e_5a51, 0xe9b6_c7aa,
    0xd62f_105d, 0x0244_1453, 0xd8a1_e681, 0xe7d3_fbc8,
    0x21e1_cde6, 0xc337_07d6, 0xf4d5_0d87, 0x455a_14ed,
    0xa9e3_e905, 0xfcef_a3f8, 0x676f_02d9, 0x8d2a_4c8a,
    0xfffa_3942, 0x8771_f681, 0x6d9d_6122, 0xfde5_380c,
    0xa4be_ea44, 0x4bde_cfa9, 0xf6bb_4b60, 0xbebf_bc70,
    0x289b_7ec6, 0xeaa1_27fa, 0xd4ef_3085, 0x0488_1d05,
    0xd9d4_d039, 0xe6db_99e5, 0x1fa2_7cf8, 0xc4ac_5665,
    0xf429_2244, 0x432a_ff97, 0xab94_23a7, 0xfc93_a039,
    0x655b_59c3, 0x8f0c_cc92, 0xffef_f47d, 0x8584_5dd1,
    0x6fa8_7e4f, 0xfe2c_e6e0, 0xa301_4314, 0x4e08_11a1,
    0xf753_7e82, 0xbd3a_f235, 0x2ad7_d2bb, 0xeb86_d391,
];

/// Per-step left-rotation amounts, in step order across all four rounds.
#[rustfmt::skip]
const SHIFTS: [u32; 64] = [
    7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22, 7, 12, 17, 22,
    5,  9, 14, 20, 5,  9, 14, 20, 5,  9, 14, 20, 5,  9, 14, 20,
    4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23, 4, 11, 16, 23,
    6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21, 6, 10, 15, 21,
];

/// Incremental MD5 state.
///
/// Feed any number of chunks through [`Md5::append`], then call
/// [`Md5::finish`] exactly once per logical message. Finishing resets the
/// state, so the same instance can start hashing a new message afterwards.
#[derive(Debug, Clone)]
pub struct Md5 {
    state: [u32; 4],
    buffer: [u8; 64],
    buffer_len: usize,
    message_len: u64,
}

impl Md5 {
    /// Create a fresh digest state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: INITIAL_STATE,
            buffer: [0; 64],
            buffer_len: 0,
            message_len: 0,
        }
    }

    /// Reset to the initial constants, discarding any pending input.
    pub fn reset(&mut self) {
        self.state = INITIAL_STATE;
        self.buffer_len = 0;
        self.message_len = 0;
    }

    /// Absorb a chunk of any length.
    ///
    /// Complete 64-byte blocks are processed immediately; the remainder is
    /// buffered until the next `append` or [`Md5::finish`].
    pub fn append(&mut self, chunk: &[u8]) {
        self.message_len = self.message_len.wrapping_add(chunk.len() as u64);

        let mut offset = 0;
        while offset < chunk.len() {
            let space = 64 - self.buffer_len;
            let take = space.min(chunk.len() - offset);
            self.buffer[self.buffer_len..self.buffer_len + take]
                .copy_from_slice(&chunk[offset..offset + take]);
            self.buffer_len += take;
            offset += take;

            if self.buffer_len == 64 {
                let block = self.buffer;
                self.process_block(&block);
                self.buffer_len = 0;
            }
        }
    }

    /// Pad and process the final block(s), returning the 16-byte digest.
    ///
    /// The state is reset afterwards; appending again starts a new message.
    pub fn finish(&mut self) -> [u8; 16] {
        let bit_len = self.message_len.wrapping_mul(8);

        self.buffer[self.buffer_len] = 0x80;
        self.buffer_len += 1;

        if self.buffer_len > 56 {
            self.buffer[self.buffer_len..].fill(0);
            let block = self.buffer;
            self.process_block(&block);
            self.buffer_len = 0;
        }

        self.buffer[self.buffer_len..56].fill(0);
        self.buffer[56..64].copy_from_slice(&bit_len.to_le_bytes());
        let block = self.buffer;
        self.process_block(&block);

        let mut digest = [0u8; 16];
        for (chunk, word) in digest.chunks_exact_mut(4).zip(self.state.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }

        self.reset();
        digest
    }

    /// Finish and format the digest as a 32-character lowercase hex string.
    pub fn finish_hex(&mut self) -> String {
        hex::encode(self.finish())
    }

    fn process_block(&mut self, block: &[u8; 64]) {
        let mut words = [0u32; 16];
        for (word, bytes) in words.iter_mut().zip(block.chunks_exact(4)) {
            *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }

        let [mut a, mut b, mut c, mut d] = self.state;

        for step in 0..64 {
            let (mix, index) = match step / 16 {
                0 => ((b & c) | (!b & d), step),
                1 => ((d & b) | (!d & c), (5 * step + 1) % 16),
                2 => (b ^ c ^ d, (3 * step + 5) % 16),
                _ => (c ^ (b | !d), (7 * step) % 16),
            };
            let rotated = a
                .wrapping_add(mix)
                .wrapping_add(words[index])
                .wrapping_add(SINE_TABLE[step])
                .rotate_left(SHIFTS[step]);
            a = d;
            d = c;
            c = b;
            b = b.wrapping_add(rotated);
        }

        self.state[0] = self.state[0].wrapping_add(a);
        self.state[1] = self.state[1].wrapping_add(b);
        self.state[2] = self.state[2].wrapping_add(c);
        self.state[3] = self.state[3].wrapping_add(d);
    }
}

impl Default for Md5 {
    fn default() -> Self {
        Self::new()
    }
}

/// Digest of a fully drained byte source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDigest {
    /// Lowercase hex digest of everything read.
    pub digest_hex: String,
    /// Total number of bytes read.
    pub size_bytes: u64,
}

/// Single-shot digest of an in-memory buffer.
#[must_use]
pub fn md5(data: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.append(data);
    hasher.finish()
}

/// Single-shot hex digest of an in-memory buffer.
#[must_use]
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(md5(data))
}

/// Drain a byte source through the digest engine, counting bytes as they
/// pass.
///
/// # Errors
///
/// Returns an error if the underlying reader fails; partial digest state
/// is discarded in that case.
pub fn digest_reader<R: Read>(mut reader: R) -> Result<StreamDigest> {
    let mut hasher = Md5::new();
    let mut buf = [0u8; 8192];
    let mut size_bytes: u64 = 0;

    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => {
                hasher.append(&buf[..read]);
                size_bytes += read as u64;
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }

    Ok(StreamDigest {
        digest_hex: hasher.finish_hex(),
        size_bytes,
    })
}
