//! The RGD key hash.
//!
//! This is Bob Jenkins' `lookup2` hash. It defines the on-disk key space
//! shared with the game engine, so it must match bit for bit.

use attrib_ll_store::normalize_name;

const GOLDEN_RATIO: u32 = 0x9e37_79b9;

#[inline]
fn mix(a: &mut u32, b: &mut u32, c: &mut u32) {
    *a = a.wrapping_sub(*b).wrapping_sub(*c) ^ (*c >> 13);
    *b = b.wrapping_sub(*c).wrapping_sub(*a) ^ (*a << 8);
    *c = c.wrapping_sub(*a).wrapping_sub(*b) ^ (*b >> 13);
    *a = a.wrapping_sub(*b).wrapping_sub(*c) ^ (*c >> 12);
    *b = b.wrapping_sub(*c).wrapping_sub(*a) ^ (*a << 16);
    *c = c.wrapping_sub(*a).wrapping_sub(*b) ^ (*b >> 5);
    *a = a.wrapping_sub(*b).wrapping_sub(*c) ^ (*c >> 3);
    *b = b.wrapping_sub(*c).wrapping_sub(*a) ^ (*a << 10);
    *c = c.wrapping_sub(*a).wrapping_sub(*b) ^ (*b >> 15);
}

#[inline]
fn word(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Hash `bytes`, continuing from a previous hash value `seed`.
pub fn hash_with_seed(bytes: &[u8], seed: u32) -> u32 {
    let mut a = GOLDEN_RATIO;
    let mut b = GOLDEN_RATIO;
    let mut c = seed;

    let mut blocks = bytes.chunks_exact(12);
    for block in &mut blocks {
        a = a.wrapping_add(word(&block[0..4]));
        b = b.wrapping_add(word(&block[4..8]));
        c = c.wrapping_add(word(&block[8..12]));
        mix(&mut a, &mut b, &mut c);
    }

    c = c.wrapping_add(bytes.len() as u32);
    // The low byte of c holds the length, so tail bytes 8..11 start at bit 8.
    for (i, &byte) in blocks.remainder().iter().enumerate() {
        let byte = byte as u32;
        match i {
            0..=3 => a = a.wrapping_add(byte << (8 * i)),
            4..=7 => b = b.wrapping_add(byte << (8 * (i - 4))),
            _ => c = c.wrapping_add(byte << (8 * (i - 7))),
        }
    }
    mix(&mut a, &mut b, &mut c);
    c
}

/// Hash raw bytes (the full length, embedded zeros included).
pub fn hash(bytes: &[u8]) -> u32 {
    hash_with_seed(bytes, 0)
}

/// Hash the UTF-8 bytes of a string.
pub fn hash_str(s: &str) -> u32 {
    hash(s.as_bytes())
}

/// Hash a file name case-insensitively, with `/` and `\` treated alike.
pub fn hash_filename(name: &str) -> u32 {
    hash(normalize_name(name).as_bytes())
}
