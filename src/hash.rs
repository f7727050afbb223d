//! Structural hashing (spec §4.6): a change detector, not a cryptographic
//! digest. Each field folds its type name and parameters into a 32-bit
//! avalanche mixer; containers fold in every child's hash in order.

/// Mix a running hash with a new 32-bit value. Stable across runs and
/// platforms (no reliance on `RandomState` or ASLR).
pub fn khash(seed: u32, value: u32) -> u32 {
    let mut h = seed ^ value;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// FNV-1a over raw bytes, folded through [`khash`] so the result has the
/// same avalanche properties as any other mixed-in value.
pub fn khash_bytes(seed: u32, bytes: &[u8]) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for &b in bytes {
        h ^= b as u32;
        h = h.wrapping_mul(0x0100_0193);
    }
    khash(seed, h)
}

pub fn khash_str(seed: u32, s: &str) -> u32 {
    khash_bytes(seed, s.as_bytes())
}

pub fn khash_u64(seed: u32, value: u64) -> u32 {
    let h = khash(0, (value & 0xFFFF_FFFF) as u32);
    let h = khash(h, (value >> 32) as u32);
    khash(seed, h)
}

pub fn khash_i64(seed: u32, value: i64) -> u32 {
    khash_u64(seed, value as u64)
}
