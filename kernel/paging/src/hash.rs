//! Hashing of packed pagetable keys

/// The 64-bit finalizer of MurmurHash3.
///
/// Every input bit affects every output bit which spreads the very regular page aligned keys evenly over the table.
#[inline]
pub const fn murmur_finalize(key: u64) -> u64 {
    let mut h = key;
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51afd7ed558ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ceb9fe1a85ec53);
    h ^= h >> 33;
    h
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_zero_is_a_fixed_point() {
        assert_eq!(murmur_finalize(0), 0);
    }

    #[test]
    fn test_known_value() {
        // reference value of fmix64(1)
        assert_eq!(murmur_finalize(1), 0xb456bcfc34c2cb2c);
    }

    #[test]
    fn test_neighbouring_pages_spread_out() {
        let a = murmur_finalize(0x1000 | 0x800);
        let b = murmur_finalize(0x2000 | 0x800);
        assert_ne!(a & 0xff, b & 0xff);
        assert!((a ^ b).count_ones() > 16);
    }
}
