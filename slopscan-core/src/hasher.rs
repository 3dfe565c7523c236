//! Character-trigram feature hashing
//!
//! FNV-1a over the three code points of a window, reduced to a bin index.

/// 32-bit FNV offset basis
pub const FNV_OFFSET_BASIS: u32 = 2_166_136_261;

/// 32-bit FNV prime
pub const FNV_PRIME: u32 = 16_777_619;

/// Hash the trigram starting at `start` into a bin in `[0, dim)`.
///
/// Callers guarantee `start + 2 < text.len()`.
pub fn hash_trigram(text: &[char], start: usize, dim: usize) -> usize {
    let mut hash = FNV_OFFSET_BASIS;
    for &c in &text[start..start + 3] {
        hash ^= c as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash as usize % dim.max(1)
}
