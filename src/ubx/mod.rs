//! UBX framing.
//!
//! [`encode`] wraps a message body into a frame, [`decode`] scans arbitrary
//! input for the next frame with a valid checksum. Both are pure functions
//! and may be used from any number of tasks at once.

pub mod endian;
pub mod types;

use heapless::Vec;

use crate::error::{Error, Result};
use endian::{uint16_decode, uint16_encode};
use types::*;

/// Running UBX checksum, `ck_a += byte; ck_b += ck_a`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumCalc {
    ck_a: u8,
    ck_b: u8,
}

impl ChecksumCalc {
    pub fn update(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            self.push(byte);
        }
    }

    pub fn push(&mut self, byte: u8) {
        self.ck_a = self.ck_a.wrapping_add(byte);
        self.ck_b = self.ck_b.wrapping_add(self.ck_a);
    }

    pub fn result(&self) -> (u8, u8) {
        (self.ck_a, self.ck_b)
    }
}

/// Frame `body` as message `class`/`id` into `out`.
///
/// `out` must hold at least `body.len() + UBX_PROTOCOL_OVERHEAD` bytes.
/// Returns the length of the frame.
pub fn encode(class: u8, id: u8, body: &[u8], out: &mut [u8]) -> Result<usize> {
    let total_len = body.len() + UBX_PROTOCOL_OVERHEAD;
    if body.len() > u16::MAX as usize || out.len() < total_len {
        return Err(Error::InvalidParameter);
    }

    let [len_lo, len_hi] = uint16_encode(body.len() as u16);
    out[..HEADER_LEN].copy_from_slice(&[SYNC_CHAR_1, SYNC_CHAR_2, class, id, len_lo, len_hi]);
    out[HEADER_LEN..HEADER_LEN + body.len()].copy_from_slice(body);

    let mut checksum = ChecksumCalc::default();
    checksum.update(&out[2..HEADER_LEN + body.len()]);
    let (ck_a, ck_b) = checksum.result();
    out[total_len - 2] = ck_a;
    out[total_len - 1] = ck_b;

    Ok(total_len)
}

/// [`encode`] into a new vector of capacity `N`.
pub fn encode_to_vec<const N: usize>(class: u8, id: u8, body: &[u8]) -> Result<Vec<u8, N>> {
    let mut buf = Vec::new();
    buf.resize(body.len() + UBX_PROTOCOL_OVERHEAD, 0)
        .map_err(|_| Error::InvalidParameter)?;
    encode(class, id, body, &mut buf)?;
    Ok(buf)
}

/// Find the next complete, checksum-valid frame in `input`.
///
/// Up to `body.len()` bytes of the frame body are copied into `body`; longer
/// bodies are still consumed in full and their real length is reported in
/// [`UbxFrame::body_len`]. Garbage and frames with a bad checksum are skipped.
///
/// On error every byte of `input` has been examined:
/// [`Error::NotFound`] means no frame was in progress at the end of the input,
/// [`Error::Timeout`] means the input ended part way through a frame.
pub fn decode<'a>(input: &'a [u8], body: &mut [u8]) -> Result<UbxFrame<'a>> {
    let mut scanner = Scanner::new();

    for (i, &byte) in input.iter().enumerate() {
        if let Some((class, id, body_len)) = scanner.feed(byte, body) {
            return Ok(UbxFrame {
                class,
                id,
                body_len,
                remaining: &input[i + 1..],
            });
        }
    }

    if scanner.state == DecodeState::Sync1 {
        Err(Error::NotFound)
    } else {
        Err(Error::Timeout)
    }
}

struct Scanner {
    state: DecodeState,
    class: u8,
    id: u8,
    len_lo: u8,
    body_len: usize,
    received: usize,
    checksum: ChecksumCalc,
}

impl Scanner {
    fn new() -> Self {
        Self {
            state: DecodeState::Sync1,
            class: 0,
            id: 0,
            len_lo: 0,
            body_len: 0,
            received: 0,
            checksum: ChecksumCalc::default(),
        }
    }

    fn restart(&mut self) {
        *self = Self::new();
    }

    /// Drop the frame in progress. The mismatching byte is discarded and
    /// scanning resumes with the byte after it.
    fn checksum_mismatch(&mut self) {
        debug!(
            "UBX checksum mismatch for class {} id {}, resyncing",
            self.class,
            self.id
        );
        self.restart();
    }

    /// Feed one byte, returning class, id and body length once a frame
    /// completes with a valid checksum.
    fn feed(&mut self, byte: u8, body: &mut [u8]) -> Option<(u8, u8, usize)> {
        match self.state {
            DecodeState::Sync1 => {
                if byte == SYNC_CHAR_1 {
                    self.state = DecodeState::Sync2;
                }
            }
            DecodeState::Sync2 => {
                if byte == SYNC_CHAR_2 {
                    self.state = DecodeState::Class;
                } else {
                    // The stray byte may itself start the next frame.
                    self.restart();
                    return self.feed(byte, body);
                }
            }
            DecodeState::Class => {
                self.checksum.push(byte);
                self.class = byte;
                self.state = DecodeState::Id;
            }
            DecodeState::Id => {
                self.checksum.push(byte);
                self.id = byte;
                self.state = DecodeState::LengthLow;
            }
            DecodeState::LengthLow => {
                self.checksum.push(byte);
                self.len_lo = byte;
                self.state = DecodeState::LengthHigh;
            }
            DecodeState::LengthHigh => {
                self.checksum.push(byte);
                self.body_len = uint16_decode([self.len_lo, byte]) as usize;
                self.state = if self.body_len == 0 {
                    DecodeState::ChecksumA
                } else {
                    DecodeState::Body
                };
            }
            DecodeState::Body => {
                self.checksum.push(byte);
                if let Some(slot) = body.get_mut(self.received) {
                    *slot = byte;
                }
                self.received += 1;
                if self.received == self.body_len {
                    self.state = DecodeState::ChecksumA;
                }
            }
            DecodeState::ChecksumA => {
                if byte == self.checksum.result().0 {
                    self.state = DecodeState::ChecksumB;
                } else {
                    self.checksum_mismatch();
                }
            }
            DecodeState::ChecksumB => {
                if byte == self.checksum.result().1 {
                    return Some((self.class, self.id, self.body_len));
                }
                self.checksum_mismatch();
            }
        }
        None
    }
}
