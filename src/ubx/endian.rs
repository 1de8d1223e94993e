//! Little-endian field helpers.
//!
//! UBX fields are little-endian on every host. Values are moved through
//! native byte order and swapped by hand when the host is big-endian, so the
//! same code serves hosts of either byte order.

/// Whether the host stores the least significant byte first.
pub fn is_little_endian() -> bool {
    u16::from_ne_bytes([1, 0]) == 1
}

fn swap16(v: u16) -> u16 {
    (v >> 8) | (v << 8)
}

fn swap32(v: u32) -> u32 {
    ((v & 0x0000_00FF) << 24)
        | ((v & 0x0000_FF00) << 8)
        | ((v & 0x00FF_0000) >> 8)
        | ((v & 0xFF00_0000) >> 24)
}

fn swap64(v: u64) -> u64 {
    ((swap32(v as u32) as u64) << 32) | swap32((v >> 32) as u32) as u64
}

pub fn uint16_decode(bytes: [u8; 2]) -> u16 {
    let v = u16::from_ne_bytes(bytes);
    if is_little_endian() {
        v
    } else {
        swap16(v)
    }
}

pub fn uint32_decode(bytes: [u8; 4]) -> u32 {
    let v = u32::from_ne_bytes(bytes);
    if is_little_endian() {
        v
    } else {
        swap32(v)
    }
}

pub fn int32_decode(bytes: [u8; 4]) -> i32 {
    uint32_decode(bytes) as i32
}

pub fn uint64_decode(bytes: [u8; 8]) -> u64 {
    let v = u64::from_ne_bytes(bytes);
    if is_little_endian() {
        v
    } else {
        swap64(v)
    }
}

pub fn uint16_encode(v: u16) -> [u8; 2] {
    let v = if is_little_endian() { v } else { swap16(v) };
    v.to_ne_bytes()
}

pub fn uint32_encode(v: u32) -> [u8; 4] {
    let v = if is_little_endian() { v } else { swap32(v) };
    v.to_ne_bytes()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn swaps() {
        assert_eq!(swap16(0x1234), 0x3412);
        assert_eq!(swap32(0x1234_5678), 0x7856_3412);
        assert_eq!(swap64(0x0102_0304_0506_0708), 0x0807_0605_0403_0201);
    }

    #[test]
    fn host_byte_order() {
        assert_eq!(is_little_endian(), cfg!(target_endian = "little"));
    }

    #[test]
    fn wire_order_is_little_endian() {
        assert_eq!(uint16_encode(0x0102), [0x02, 0x01]);
        assert_eq!(uint32_encode(0x0102_0304), [0x04, 0x03, 0x02, 0x01]);
        assert_eq!(uint16_decode([0x34, 0x12]), 0x1234);
        assert_eq!(uint32_decode([0x78, 0x56, 0x34, 0x12]), 0x1234_5678);
        assert_eq!(int32_decode([0xFE, 0xFF, 0xFF, 0xFF]), -2);
        assert_eq!(
            uint64_decode([0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]),
            0x0102_0304_0506_0708
        );
    }
}
