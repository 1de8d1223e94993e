//! A UBX frame on the wire:
//!
//!     Sync       |  Class   |  Id      |  Length       |  Body           |  Checksum
//!     0xB5 0x62  |  1 byte  |  1 byte  |  u16, LE     |  Length bytes   |  ck_a ck_b
//!
//! The checksum covers class, id, length and body.

pub const SYNC_CHAR_1: u8 = 0xB5;
pub const SYNC_CHAR_2: u8 = 0x62;
/// Sync, class, id and length.
pub const HEADER_LEN: usize = 6;
pub const CHECKSUM_LEN: usize = 2;
/// Bytes a frame adds around its body.
pub const UBX_PROTOCOL_OVERHEAD: usize = HEADER_LEN + CHECKSUM_LEN;

/// A frame found by [`decode`](super::decode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UbxFrame<'a> {
    pub class: u8,
    pub id: u8,
    /// Body length announced by the frame, even if the body buffer given to
    /// the decoder was shorter.
    pub body_len: usize,
    /// Input following the frame.
    pub remaining: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DecodeState {
    Sync1,
    Sync2,
    Class,
    Id,
    LengthLow,
    LengthHigh,
    Body,
    ChecksumA,
    ChecksumB,
}
